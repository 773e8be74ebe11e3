//! HTTP surface consumed by the hospital-services UI

pub mod rest;
