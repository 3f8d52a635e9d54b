//! Finds out which processes hold a serial device open

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Command;

use log::{debug, trace};

use crate::Error;

/// A process that holds the device open
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Holder {
    pub pid: u32,
    /// The process name, if it could be resolved
    pub name: Option<String>,
}

/// The processes holding a device, as seen at the time of inspection.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct PortOccupancy {
    pub device: PathBuf,
    pub holders: Vec<Holder>,
}

impl PortOccupancy {
    /// Returns `true` when no process holds the device
    pub fn is_free(&self) -> bool {
        self.holders.is_empty()
    }

    /// Returns a hint on how to release the device
    pub fn remediation(&self) -> &'static str {
        let node = self
            .holders
            .iter()
            .any(|holder| holder.name.as_deref() == Some("node"));

        if node {
            "The process 'node' is running on the port and might be related to zigbee2mqtt.\n\
             Please try stopping the zigbee2mqtt service using: systemctl stop zigbee2mqtt"
        } else {
            "Please stop the process or release the port manually."
        }
    }
}

impl fmt::Display for PortOccupancy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let pids: Vec<String> = self.holders.iter().map(|h| h.pid.to_string()).collect();
        let names: Vec<&str> = self
            .holders
            .iter()
            .filter_map(|h| h.name.as_deref())
            .collect();

        write!(
            f,
            "The port {} is occupied by process ID(s): {} ({})",
            self.device.display(),
            pids.join(", "),
            names.join(", ")
        )
    }
}

/// Something that can tell which processes hold a device open.
pub trait PortInspector {
    fn inspect(&self, device: &Path) -> Result<PortOccupancy, Error>;
}

/// Inspects ports with the `fuser` utility and resolves names with `ps`.
#[derive(Debug, Default, Copy, Clone)]
pub struct Fuser;

impl Fuser {
    /// Looks up the command name of `pid`, returning `None` on any failure
    fn process_name(pid: u32) -> Option<String> {
        let pid_arg = pid.to_string();
        let output = Command::new("ps")
            .args(&["-p", pid_arg.as_str(), "-o", "comm="])
            .output()
            .ok()?;
        let name = String::from_utf8_lossy(&output.stdout).trim().to_owned();

        if name.is_empty() {
            debug!("Could not resolve process name of pid {}", pid);
            None
        } else {
            Some(name)
        }
    }
}

impl PortInspector for Fuser {
    fn inspect(&self, device: &Path) -> Result<PortOccupancy, Error> {
        trace!("Running fuser on {}", device.display());

        let output = Command::new("fuser")
            .arg(device)
            .output()
            .map_err(|err| Error::Inspection(format!("could not run fuser: {}", err)))?;

        // fuser exits with 1 when no process uses the file
        match output.status.code() {
            Some(0) | Some(1) => {}
            _ => {
                return Err(Error::Inspection(format!(
                    "fuser failed with {}: {}",
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                )))
            }
        }

        let holders = parse_fuser_pids(&String::from_utf8_lossy(&output.stdout))
            .into_iter()
            .map(|pid| Holder {
                pid,
                name: Fuser::process_name(pid),
            })
            .collect();

        Ok(PortOccupancy {
            device: device.to_path_buf(),
            holders,
        })
    }
}

/// Parses the pids printed by `fuser` on stdout.
///
/// Some versions append access letters to each pid, so only the leading digits of each token are
/// used.
pub fn parse_fuser_pids(stdout: &str) -> Vec<u32> {
    stdout
        .split_whitespace()
        .filter_map(|token| {
            let end = token
                .find(|c: char| !c.is_ascii_digit())
                .unwrap_or_else(|| token.len());

            token[..end].parse().ok()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn occupancy(names: &[Option<&str>]) -> PortOccupancy {
        PortOccupancy {
            device: PathBuf::from("/dev/ttyUSB0"),
            holders: names
                .iter()
                .enumerate()
                .map(|(i, name)| Holder {
                    pid: 1000 + i as u32,
                    name: name.map(str::to_owned),
                })
                .collect(),
        }
    }

    #[test]
    fn it_should_parse_fuser_pids() {
        assert_eq!(parse_fuser_pids(" 1234 5678\n"), vec![1234, 5678]);
        assert_eq!(parse_fuser_pids("  812m 90f"), vec![812, 90]);
        assert_eq!(parse_fuser_pids(""), Vec::<u32>::new());
        assert_eq!(parse_fuser_pids("/dev/ttyUSB0:"), Vec::<u32>::new());
    }

    #[test]
    fn it_should_be_free_without_holders() {
        assert!(occupancy(&[]).is_free());
        assert!(!occupancy(&[None]).is_free());
    }

    #[test]
    fn it_should_suggest_stopping_zigbee2mqtt_for_node() {
        let hint = occupancy(&[Some("bash"), Some("node")]).remediation();

        assert!(hint.contains("systemctl stop zigbee2mqtt"));
    }

    #[test]
    fn it_should_suggest_manual_release_otherwise() {
        let hint = occupancy(&[Some("minicom"), None]).remediation();

        assert_eq!(hint, "Please stop the process or release the port manually.");
    }

    #[test]
    fn it_should_list_pids_and_resolved_names() {
        let text = occupancy(&[Some("node"), None]).to_string();

        assert_eq!(
            text,
            "The port /dev/ttyUSB0 is occupied by process ID(s): 1000, 1001 (node)"
        );
    }
}
