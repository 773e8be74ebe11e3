//! Wardline: bed reservation and OPD queue core for hospital services
//!
//! Wardline coordinates a scarce, countable resource (hospital beds) through
//! a provisional-hold lifecycle without over-booking, and advances the OPD
//! walk-in token queue consistently under concurrent access. Everything else
//! in the hospital product (auth, CRUD screens, payments, chat, delivery of
//! realtime events) lives outside this crate.

pub mod api;
pub mod config;
pub mod error;
pub mod events;
pub mod inventory;
pub mod opd;
pub mod reservation;
