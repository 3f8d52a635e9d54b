//! Chip families that answer the MT `SYS_VERSION` request

use std::fmt;

use num_enum::IntoPrimitive;

/// MT start-of-frame marker
pub const SOF: u8 = 0xFE;

/// Length of the prefix used to classify a version response
pub const PREFIX_LEN: usize = 4;

/// A known Z-Stack radio module family.
///
/// The discriminant is the MT length byte the family puts in its `SYS_VERSION` response, which is
/// the only byte that differs between the three prefixes.
#[repr(u8)]
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, IntoPrimitive)]
pub enum ChipVariant {
    Cc2652 = 0x0A,
    Cc2530 = 0x0E,
    Cc2538 = 0x10,
}

impl ChipVariant {
    /// All known variants, in the order their prefixes are matched
    pub const ALL: [ChipVariant; 3] = [
        ChipVariant::Cc2652,
        ChipVariant::Cc2530,
        ChipVariant::Cc2538,
    ];

    /// Returns the 4-byte frame prefix of a `SYS_VERSION` response from this chip
    pub fn prefix(self) -> [u8; PREFIX_LEN] {
        [SOF, self.into(), 0x61, 0x02]
    }

    /// Classifies `bytes` by its prefix, returning `None` when no known prefix matches
    pub fn from_prefix(bytes: &[u8]) -> Option<ChipVariant> {
        ChipVariant::ALL
            .iter()
            .copied()
            .find(|variant| bytes.starts_with(&variant.prefix()))
    }

    /// The marketing name of the chip family
    pub fn name(self) -> &'static str {
        match self {
            ChipVariant::Cc2652 => "CC2652",
            ChipVariant::Cc2530 => "CC2530",
            ChipVariant::Cc2538 => "CC2538",
        }
    }
}

impl fmt::Display for ChipVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
