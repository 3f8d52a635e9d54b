use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use structopt::clap::AppSettings;
use structopt::StructOpt;

use znp::check::{Config, READ_CAP, SETTLE_DELAY};
use znp::Request;

/// Bytes given on the command line as a hex string
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct HexBytes(pub Vec<u8>);

impl FromStr for HexBytes {
    type Err = hex::FromHexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let digits = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .unwrap_or(s);

        hex::decode(digits).map(HexBytes)
    }
}

#[derive(StructOpt, Debug)]
#[structopt(
    name = "znp-check",
    about = "Check the version, reset or send a custom command to a CC2652P, CC2530 or CC2538 Zigbee module over UART",
    setting = AppSettings::DisableVersion
)]
pub struct Opts {
    /// Serial port where the Zigbee module is connected (e.g. /dev/ttyMOD4)
    #[structopt(parse(from_os_str))]
    pub port: PathBuf,

    /// Baud rate for serial communication
    #[structopt(
        env = "BAUD_RATE",
        short = "b",
        long = "baudrate",
        default_value = "115200"
    )]
    pub baud_rate: u32,

    /// Timeout for waiting for a response, in seconds
    #[structopt(
        env = "READ_TIMEOUT",
        short = "t",
        long = "timeout",
        default_value = "1"
    )]
    pub timeout: u64,

    /// Send a reset request to the module
    #[structopt(short = "r", long = "reset", conflicts_with_all = &["version", "custom-command"])]
    pub reset: bool,

    /// Send a version request to the module (the default)
    #[structopt(long = "version", conflicts_with = "custom-command")]
    pub version: bool,

    /// Send a custom command to the module in hex format (e.g. fe01210100)
    #[structopt(long = "custom-command")]
    pub custom_command: Option<HexBytes>,

    /// Enable debug output, including hex dumps of sent and received bytes
    #[structopt(short = "d", long = "debug")]
    pub debug: bool,
}

impl Opts {
    /// The request selected by the flags, the version request unless told otherwise
    pub fn request(&self) -> Request {
        if let Some(HexBytes(bytes)) = &self.custom_command {
            Request::Custom(bytes.clone())
        } else if self.reset {
            Request::Reset
        } else {
            Request::Version
        }
    }

    pub fn to_config(&self) -> Config {
        Config {
            device: self.port.clone(),
            baud_rate: self.baud_rate,
            read_timeout: Duration::from_secs(self.timeout),
            settle_delay: SETTLE_DELAY,
            read_cap: READ_CAP,
            request: self.request(),
            debug: self.debug,
        }
    }
}
