use std::io;

use thiserror::Error;

use crate::frame::DecodeError;
use crate::port::PortOccupancy;

#[derive(Debug, Error)]
pub enum Error {
    #[error("{}", _0)]
    PortOccupied(PortOccupancy),
    #[error("Error checking port availability: {}", _0)]
    Inspection(String),
    #[error("Error when opening serial port {}: {}", _0, _1)]
    SerialOpen(String, serialport::Error),
    #[error("Serial error: {}", _0)]
    Serial(#[from] serialport::Error),
    #[error("I/O error: {}", _0)]
    Io(#[from] io::Error),
    #[error("Error while parsing the response: {}", _0)]
    Decode(#[from] DecodeError),
}

impl Error {
    /// Returns a hint on how the user can resolve the error, if there is one
    pub fn remediation(&self) -> Option<&'static str> {
        match self {
            Error::PortOccupied(occupancy) => Some(occupancy.remediation()),
            Error::Inspection(_) => {
                Some("Check that `fuser` is installed and that you may inspect the device.")
            }
            _ => None,
        }
    }
}
