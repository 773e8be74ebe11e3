use std::fmt;

use crate::config::ConfigError;
use crate::inventory::InventoryError;
use crate::reservation::ReservationError;

#[derive(Debug)]
pub enum WardError {
    Inventory(InventoryError),
    Reservation(ReservationError),
    Config(ConfigError),
}

impl fmt::Display for WardError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WardError::Inventory(err) => write!(f, "Inventory error: {}", err),
            WardError::Reservation(err) => write!(f, "Reservation error: {}", err),
            WardError::Config(err) => write!(f, "Config error: {}", err),
        }
    }
}

impl std::error::Error for WardError {}

impl From<InventoryError> for WardError {
    fn from(err: InventoryError) -> Self {
        WardError::Inventory(err)
    }
}

impl From<ReservationError> for WardError {
    fn from(err: ReservationError) -> Self {
        WardError::Reservation(err)
    }
}

impl From<ConfigError> for WardError {
    fn from(err: ConfigError) -> Self {
        WardError::Config(err)
    }
}
