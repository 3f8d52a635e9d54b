use std::env;
use std::process;

use anyhow::Context;
use log::LevelFilter;
use structopt::StructOpt;

use znp::check::{self, EXIT_DECODE_FAILURE, EXIT_FAILURE};
use znp::{Error, Fuser, Request, SerialPort};

mod cli;

/// Creates a logger with a timestamp that honors `RUST_LOG` and raises this crate to the debug
/// level when `debug` is set
fn init_logger(debug: bool) {
    let mut builder = pretty_env_logger::formatted_timed_builder();

    if let Ok(filters) = env::var("RUST_LOG") {
        builder.parse_filters(&filters);
    }

    if debug {
        builder
            .filter_module("znp", LevelFilter::Debug)
            .filter_module("znp_check", LevelFilter::Debug);
    }

    builder.init();
}

fn main() -> Result<(), anyhow::Error> {
    // Parse the command-line arguments
    let opts = cli::Opts::from_args();

    init_logger(opts.debug);

    let config = opts.to_config();

    if config.request == Request::Reset {
        println!("Sending reset command...");
    }

    let report = match check::run(&config, &Fuser, SerialPort::open) {
        Ok(report) => report,
        Err(err @ Error::PortOccupied(_)) | Err(err @ Error::Inspection(_)) => {
            println!("{}", err);

            if let Some(hint) = err.remediation() {
                println!("{}", hint);
            }

            process::exit(EXIT_FAILURE);
        }
        Err(err @ Error::Decode(_)) => {
            println!("{}", err);

            process::exit(EXIT_DECODE_FAILURE);
        }
        Err(err) => {
            return Err(err).with_context(|| {
                format!("Could not check the module on {}", config.device.display())
            })
        }
    };

    print!("{}", report);

    process::exit(report.exit_code());
}
