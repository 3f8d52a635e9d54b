//! MT request frames and the `SYS_VERSION` response decoder

use std::fmt;
use std::io::{self, Read, Write};

use byteorder::ReadBytesExt;
use thiserror::Error;

use crate::chip::{ChipVariant, PREFIX_LEN, SOF};
use crate::Error;

/// Length of a `SYS_VERSION` response up to and including the revision field
pub const VERSION_FRAME_LEN: usize = 14;

/// `SYS_VERSION` request
pub const SYS_VERSION_REQ: [u8; 5] = [SOF, 0x00, 0x21, 0x02, 0x23];

/// `SYS_RESET_REQ` request for a hard reset
pub const SYS_RESET_REQ: [u8; 6] = [SOF, 0x01, 0x41, 0x00, 0x00, 0x40];

/// Calculates the MT frame check sequence over `bytes`, which should exclude the start-of-frame
/// marker
pub fn fcs(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0, |acc, byte| acc ^ byte)
}

/// An interface for serializing a request to a writer in the MT wire format.
pub trait Command {
    fn to_writer<W: Write>(&self, writer: W) -> Result<(), Error>;

    /// Serializes the request into a new buffer
    fn to_vec(&self) -> Result<Vec<u8>, Error> {
        let mut buf = Vec::new();

        self.to_writer(&mut buf)?;

        Ok(buf)
    }
}

/// The request sent to the module during a check.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Request {
    /// Query the firmware version
    Version,
    /// Hard-reset the module
    Reset,
    /// Send user supplied bytes verbatim
    Custom(Vec<u8>),
}

impl Default for Request {
    fn default() -> Request {
        Request::Version
    }
}

impl Command for Request {
    fn to_writer<W: Write>(&self, mut writer: W) -> Result<(), Error> {
        match self {
            Request::Version => writer.write_all(&SYS_VERSION_REQ)?,
            Request::Reset => writer.write_all(&SYS_RESET_REQ)?,
            Request::Custom(bytes) => writer.write_all(bytes)?,
        }

        Ok(())
    }
}

#[derive(Error, Debug, Clone, Eq, PartialEq)]
pub enum DecodeError {
    #[error(
        "{} version response is {} bytes long, expected at least {}",
        variant,
        len,
        VERSION_FRAME_LEN
    )]
    ShortFrame { variant: ChipVariant, len: usize },
}

/// A decoded `SYS_VERSION` response
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct VersionFrame {
    /// The chip family the response prefix belongs to
    pub variant: ChipVariant,
    /// MT transport protocol revision
    pub transport_version: u8,
    /// Product ID
    pub product_id: u8,
    pub major_release: u8,
    pub minor_release: u8,
    pub maintenance_release: u8,
    /// Opaque firmware revision blob
    pub revision: [u8; 5],
}

impl VersionFrame {
    /// Reads the version fields that follow the 4-byte prefix from `reader`
    pub fn from_reader<R: Read>(variant: ChipVariant, mut reader: R) -> io::Result<Self> {
        let transport_version = reader.read_u8()?;
        let product_id = reader.read_u8()?;
        let major_release = reader.read_u8()?;
        let minor_release = reader.read_u8()?;
        let maintenance_release = reader.read_u8()?;

        let mut revision = [0u8; 5];
        reader.read_exact(&mut revision)?;

        Ok(VersionFrame {
            variant,
            transport_version,
            product_id,
            major_release,
            minor_release,
            maintenance_release,
            revision,
        })
    }

    /// Returns the Z-Stack version as `major.minor.maintenance`
    pub fn stack_version(&self) -> String {
        format!(
            "{}.{}.{}",
            self.major_release, self.minor_release, self.maintenance_release
        )
    }
}

impl fmt::Display for VersionFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "SYS Version response detected for {}:", self.variant)?;
        writeln!(f, "Transport Version: {}", self.transport_version)?;
        writeln!(
            f,
            "Product ID: {} ({} Zigbee Module)",
            self.product_id, self.variant
        )?;
        writeln!(f, "Major Release: {}", self.major_release)?;
        writeln!(f, "Minor Release: {}", self.minor_release)?;
        writeln!(f, "Maintenance Release: {}", self.maintenance_release)?;
        writeln!(
            f,
            "Stack Version: {} (Z-Stack compatibility)",
            self.stack_version()
        )?;
        write!(f, "Revision: {}", hex::encode(self.revision))
    }
}

/// Bytes that follow the version fields in a response.
///
/// The module may interleave unsolicited notifications with its reply, so these are reported
/// rather than treated as corruption.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct TrailingData(Vec<u8>);

impl TrailingData {
    /// Collects everything past `VERSION_FRAME_LEN` in `response`
    pub fn after_frame(response: &[u8]) -> TrailingData {
        TrailingData(response.get(VERSION_FRAME_LEN..).unwrap_or_default().to_vec())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for TrailingData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(&self.0))
    }
}

/// The result of decoding a response
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Decoded {
    /// The response carried a version frame from a known chip
    Version {
        frame: VersionFrame,
        trailing: TrailingData,
    },
    /// The prefix did not match any known chip
    UnrecognizedChip { raw: Vec<u8>, trailing: TrailingData },
    /// Nothing was received
    NoResponse,
}

impl Decoded {
    /// Returns the trailing bytes, if there are any
    pub fn trailing(&self) -> Option<&TrailingData> {
        match self {
            Decoded::Version { trailing, .. } | Decoded::UnrecognizedChip { trailing, .. }
                if !trailing.is_empty() =>
            {
                Some(trailing)
            }
            _ => None,
        }
    }
}

/// Decodes a raw `SYS_VERSION` response.
///
/// A response with a known prefix but fewer than `VERSION_FRAME_LEN` bytes is rejected with
/// `DecodeError::ShortFrame` instead of being partially read.
pub fn decode(response: &[u8]) -> Result<Decoded, DecodeError> {
    if response.is_empty() {
        return Ok(Decoded::NoResponse);
    }

    let trailing = TrailingData::after_frame(response);

    let variant = match ChipVariant::from_prefix(response) {
        Some(variant) => variant,
        None => {
            return Ok(Decoded::UnrecognizedChip {
                raw: response.to_vec(),
                trailing,
            })
        }
    };

    let short = || DecodeError::ShortFrame {
        variant,
        len: response.len(),
    };

    let fields = response
        .get(PREFIX_LEN..VERSION_FRAME_LEN)
        .ok_or_else(short)?;
    let frame = VersionFrame::from_reader(variant, fields).map_err(|_| short())?;

    Ok(Decoded::Version { frame, trailing })
}

#[cfg(test)]
mod tests {
    use assert_hex::*;
    use hex_literal::hex;

    use super::*;

    fn version_frame(variant: ChipVariant) -> VersionFrame {
        VersionFrame {
            variant,
            transport_version: 2,
            product_id: 5,
            major_release: 2,
            minor_release: 1,
            maintenance_release: 3,
            revision: hex!("AA BB CC DD EE"),
        }
    }

    #[test]
    fn it_should_serialize_the_version_request() {
        let buf = Request::Version.to_vec().unwrap();

        assert_eq_hex!(buf, hex!("FE 00 21 02 23"));
    }

    #[test]
    fn it_should_serialize_the_reset_request() {
        let buf = Request::Reset.to_vec().unwrap();

        assert_eq_hex!(buf, hex!("FE 01 41 00 00 40"));
    }

    #[test]
    fn it_should_serialize_custom_requests_verbatim() {
        let buf = Request::Custom(hex!("FE 01 21 01 00").to_vec()).to_vec().unwrap();

        assert_eq_hex!(buf, hex!("FE 01 21 01 00"));
    }

    #[test]
    fn it_should_end_requests_with_their_fcs() {
        assert_eq_hex!(fcs(&SYS_VERSION_REQ[1..4]), SYS_VERSION_REQ[4]);
        assert_eq_hex!(fcs(&SYS_RESET_REQ[1..5]), SYS_RESET_REQ[5]);
    }

    #[test]
    fn it_should_decode_fields_for_every_known_prefix() {
        for variant in ChipVariant::ALL.iter().copied() {
            let mut input = variant.prefix().to_vec();
            input.extend_from_slice(&hex!("02 05 02 01 03 AA BB CC DD EE"));

            let decoded = decode(&input).unwrap();

            assert_eq!(
                decoded,
                Decoded::Version {
                    frame: version_frame(variant),
                    trailing: TrailingData::default(),
                }
            );
        }
    }

    #[test]
    fn it_should_decode_a_cc2652_version_response() {
        let input = hex!("FE 0A 61 02 02 05 02 01 03 AA BB CC DD EE");

        match decode(&input).unwrap() {
            Decoded::Version { frame, trailing } => {
                assert_eq!(frame.variant, ChipVariant::Cc2652);
                assert_eq!(frame.transport_version, 2);
                assert_eq!(frame.product_id, 5);
                assert_eq!(frame.stack_version(), "2.1.3");
                assert_eq_hex!(frame.revision, hex!("AA BB CC DD EE"));
                assert!(trailing.is_empty());
            }
            other => panic!("expected a version frame, got {:?}", other),
        }
    }

    #[test]
    fn it_should_surface_trailing_async_data() {
        let input = hex!("FE 0A 61 02 02 05 02 01 03 AA BB CC DD EE 11 22");
        let decoded = decode(&input).unwrap();

        assert_eq!(
            decoded,
            Decoded::Version {
                frame: version_frame(ChipVariant::Cc2652),
                trailing: TrailingData(hex!("11 22").to_vec()),
            }
        );
        assert_eq_hex!(decoded.trailing().unwrap().as_bytes(), hex!("11 22"));
        assert_eq!(decoded.trailing().unwrap().to_string(), "1122");
    }

    #[test]
    fn it_should_surface_trailing_data_for_unknown_chips() {
        let input = hex!("00 01 02 03 04 05 06 07 08 09 0A 0B 0C 0D 0E 0F");
        let decoded = decode(&input).unwrap();

        assert_eq_hex!(decoded.trailing().unwrap().as_bytes(), hex!("0E 0F"));
    }

    #[test]
    fn it_should_report_unrecognized_chips_with_raw_bytes() {
        let input = hex!("00 01 02 03");

        assert_eq!(
            decode(&input).unwrap(),
            Decoded::UnrecognizedChip {
                raw: input.to_vec(),
                trailing: TrailingData::default(),
            }
        );
    }

    #[test]
    fn it_should_not_panic_on_short_unknown_responses() {
        assert!(matches!(
            decode(&hex!("FE")).unwrap(),
            Decoded::UnrecognizedChip { .. }
        ));
        assert!(matches!(
            decode(&hex!("FE 0A 61")).unwrap(),
            Decoded::UnrecognizedChip { .. }
        ));
    }

    #[test]
    fn it_should_return_no_response_for_empty_input() {
        assert_eq!(decode(&[]).unwrap(), Decoded::NoResponse);
        assert_eq!(Decoded::NoResponse.trailing(), None);
    }

    #[test]
    fn it_should_reject_short_matched_frames() {
        let input = hex!("FE 0E 61 02 02 05 02");

        assert_eq!(
            decode(&input),
            Err(DecodeError::ShortFrame {
                variant: ChipVariant::Cc2530,
                len: 7,
            })
        );
        assert_eq!(
            decode(&hex!("FE 10 61 02")),
            Err(DecodeError::ShortFrame {
                variant: ChipVariant::Cc2538,
                len: 4,
            })
        );
    }

    #[test]
    fn it_should_decode_deterministically() {
        let input = hex!("FE 10 61 02 01 02 03 04 05 06 07 08 09 0A FF");

        assert_eq!(decode(&input), decode(&input));
    }

    #[test]
    fn it_should_display_the_version_report() {
        let text = version_frame(ChipVariant::Cc2538).to_string();

        assert!(text.starts_with("SYS Version response detected for CC2538:"));
        assert!(text.contains("Stack Version: 2.1.3"));
        assert!(text.ends_with("Revision: aabbccddee"));
    }
}
