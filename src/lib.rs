//! Diagnoses Z-Stack radio modules (CC2652, CC2530, CC2538) attached over UART.
//!
//! A check makes sure no other process holds the serial device, sends a single MT request and
//! decodes the `SYS_VERSION` reply.

pub mod check;
pub mod chip;
mod error;
pub mod frame;
pub mod port;
pub mod transport;

pub use check::{Config, Report};
pub use chip::ChipVariant;
pub use error::Error;
pub use frame::{decode, Decoded, DecodeError, Request, TrailingData, VersionFrame};
pub use port::{Fuser, PortInspector, PortOccupancy};
pub use transport::{SerialPort, Transport};
