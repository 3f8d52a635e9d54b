//! Runs a single check against a module: inspect the port, exchange one request, decode the reply

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use log::{debug, info};

use crate::frame::{self, Command, Decoded, Request};
use crate::port::PortInspector;
use crate::transport::Transport;
use crate::Error;

pub const DEFAULT_BAUD_RATE: u32 = 115_200;
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(1);
/// Time the module gets to answer before the reply is read
pub const SETTLE_DELAY: Duration = Duration::from_millis(500);
/// Maximum number of bytes read when nothing is pending after the settle delay
pub const READ_CAP: usize = 64;

/// The module answered as expected
pub const EXIT_OK: i32 = 0;
/// The port is busy, could not be inspected or the transport failed
pub const EXIT_FAILURE: i32 = 1;
/// The reply could not be decoded
pub const EXIT_DECODE_FAILURE: i32 = 2;
/// The module did not reply
pub const EXIT_NO_RESPONSE: i32 = 3;

/// Settings for a single check
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Config {
    /// Path of the serial device
    pub device: PathBuf,
    pub baud_rate: u32,
    pub read_timeout: Duration,
    pub settle_delay: Duration,
    pub read_cap: usize,
    /// The request to send
    pub request: Request,
    /// Dump the bytes sent and received as hex
    pub debug: bool,
}

impl Config {
    /// Returns a config for `device` that sends the version request with default settings
    pub fn new<P: Into<PathBuf>>(device: P) -> Config {
        Config {
            device: device.into(),
            baud_rate: DEFAULT_BAUD_RATE,
            read_timeout: DEFAULT_READ_TIMEOUT,
            settle_delay: SETTLE_DELAY,
            read_cap: READ_CAP,
            request: Request::default(),
            debug: false,
        }
    }
}

/// The outcome of a check that got as far as exchanging a request
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Report {
    pub request: Request,
    /// Raw bytes received in reply
    pub response: Vec<u8>,
    /// The decoded reply. Always set for a version request, otherwise only when the reply carries
    /// a version frame.
    pub decoded: Option<Decoded>,
}

impl Report {
    /// Returns the process exit code that matches this outcome.
    ///
    /// A module that stays silent still ends the run normally with its diagnostic printed, but
    /// exits with `EXIT_NO_RESPONSE` so scripts can tell it apart from a healthy module.
    pub fn exit_code(&self) -> i32 {
        if self.response.is_empty() {
            return EXIT_NO_RESPONSE;
        }

        match (&self.request, &self.decoded) {
            (Request::Version, Some(Decoded::Version { .. })) => EXIT_OK,
            (Request::Version, _) => EXIT_DECODE_FAILURE,
            _ => EXIT_OK,
        }
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.response.is_empty() {
            return writeln!(f, "No response received. The module might not be working.");
        }

        match self.request {
            Request::Version => {}
            Request::Reset => writeln!(f, "Reset response: {}", hex::encode(&self.response))?,
            Request::Custom(_) => writeln!(f, "Response: {}", hex::encode(&self.response))?,
        }

        match &self.decoded {
            Some(Decoded::Version { frame, .. }) => writeln!(f, "{}", frame)?,
            Some(Decoded::UnrecognizedChip { raw, .. }) => {
                writeln!(f, "Unknown chip detected. Skipping specialized parsing.")?;
                writeln!(f, "Raw response: {}", hex::encode(raw))?;
            }
            Some(Decoded::NoResponse) | None => {}
        }

        if let Some(trailing) = self.decoded.as_ref().and_then(Decoded::trailing) {
            writeln!(f, "Additional asynchronous data detected. Skipping:")?;
            writeln!(f, "Raw data: {}", trailing)?;
        }

        Ok(())
    }
}

/// Checks the module described by `config`.
///
/// The port is inspected with `inspector` first; `connect` is only called once the port is known
/// to be free. A short version frame is returned as `Error::Decode`.
pub fn run<I, T, F>(config: &Config, inspector: &I, connect: F) -> Result<Report, Error>
where
    I: PortInspector,
    T: Transport,
    F: FnOnce(&Config) -> Result<T, Error>,
{
    debug!("Checking availability of {}", config.device.display());

    let occupancy = inspector.inspect(&config.device)?;

    if !occupancy.is_free() {
        return Err(Error::PortOccupied(occupancy));
    }

    let request = config.request.to_vec()?;
    let response = {
        let mut transport = connect(config)?;

        info!("Sending {} byte request", request.len());

        transport.exchange(&request)?
    };

    let decoded = match config.request {
        Request::Version => Some(frame::decode(&response)?),
        _ => frame::decode(&response)
            .ok()
            .filter(|decoded| matches!(decoded, Decoded::Version { .. })),
    };

    Ok(Report {
        request: config.request.clone(),
        response,
        decoded,
    })
}
