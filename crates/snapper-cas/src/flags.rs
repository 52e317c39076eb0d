//! Asset flag bitset carried in asset metadata.

use std::convert::Infallible;
use std::fmt;
use std::ops::BitOr;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Asset flags, stored as an integer column by the metadata layer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetFlags(i64);

impl AssetFlags {
    pub const NORMAL: AssetFlags = AssetFlags(0);
    pub const MAPTILE: AssetFlags = AssetFlags(1);
    pub const REWRITABLE: AssetFlags = AssetFlags(2);
    pub const COLLECTABLE: AssetFlags = AssetFlags(4);

    const NAMED: [(AssetFlags, &'static str); 3] = [
        (AssetFlags::MAPTILE, "Maptile"),
        (AssetFlags::REWRITABLE, "Rewritable"),
        (AssetFlags::COLLECTABLE, "Collectable"),
    ];

    pub const fn from_bits(bits: i64) -> Self {
        AssetFlags(bits)
    }

    pub const fn bits(self) -> i64 {
        self.0
    }

    pub const fn contains(self, other: AssetFlags) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for AssetFlags {
    type Output = AssetFlags;

    fn bitor(self, rhs: AssetFlags) -> AssetFlags {
        AssetFlags(self.0 | rhs.0)
    }
}

/// Parses a comma separated list such as `"maptile, Collectable"`.
///
/// Matching is case-insensitive and unknown names are ignored.
impl FromStr for AssetFlags {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let flags = s
            .split(',')
            .filter_map(|part| {
                let part = part.trim();
                AssetFlags::NAMED
                    .iter()
                    .find(|(_, name)| name.eq_ignore_ascii_case(part))
                    .map(|(flag, _)| *flag)
            })
            .fold(AssetFlags::NORMAL, BitOr::bitor);
        Ok(flags)
    }
}

impl fmt::Display for AssetFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = AssetFlags::NAMED
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| *name)
            .collect();
        write!(f, "{}", names.join(","))
    }
}
