//! Locale flags for root file entries
//!
//! Every root block carries a 32-bit locale mask. A block applies to a
//! request when the two masks share at least one bit.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{BitAnd, BitOr, BitOrAssign};
use std::str::FromStr;

/// Locale mask attached to root blocks and lookup requests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocaleFlags(u32);

/// Named single-bit locales, in bit order
const NAMED: &[(&str, LocaleFlags)] = &[
    ("Unk_1", LocaleFlags::UNK_1),
    ("enUS", LocaleFlags::ENUS),
    ("koKR", LocaleFlags::KOKR),
    ("Unk_8", LocaleFlags::UNK_8),
    ("frFR", LocaleFlags::FRFR),
    ("deDE", LocaleFlags::DEDE),
    ("zhCN", LocaleFlags::ZHCN),
    ("esES", LocaleFlags::ESES),
    ("zhTW", LocaleFlags::ZHTW),
    ("enGB", LocaleFlags::ENGB),
    ("enCN", LocaleFlags::ENCN),
    ("enTW", LocaleFlags::ENTW),
    ("esMX", LocaleFlags::ESMX),
    ("ruRU", LocaleFlags::RURU),
    ("ptBR", LocaleFlags::PTBR),
    ("itIT", LocaleFlags::ITIT),
    ("ptPT", LocaleFlags::PTPT),
];

impl LocaleFlags {
    /// Every locale
    pub const ALL: Self = Self(0xFFFF_FFFF);
    /// No locale; invalid on a root block
    pub const NONE: Self = Self(0);
    /// Unnamed bit 0
    pub const UNK_1: Self = Self(0x1);
    /// English (United States)
    pub const ENUS: Self = Self(0x2);
    /// Korean (Korea)
    pub const KOKR: Self = Self(0x4);
    /// Unnamed bit 3
    pub const UNK_8: Self = Self(0x8);
    /// French (France)
    pub const FRFR: Self = Self(0x10);
    /// German (Germany)
    pub const DEDE: Self = Self(0x20);
    /// Chinese (Simplified)
    pub const ZHCN: Self = Self(0x40);
    /// Spanish (Spain)
    pub const ESES: Self = Self(0x80);
    /// Chinese (Traditional)
    pub const ZHTW: Self = Self(0x100);
    /// English (Great Britain)
    pub const ENGB: Self = Self(0x200);
    /// English (China)
    pub const ENCN: Self = Self(0x400);
    /// English (Taiwan)
    pub const ENTW: Self = Self(0x800);
    /// Spanish (Mexico)
    pub const ESMX: Self = Self(0x1000);
    /// Russian (Russia)
    pub const RURU: Self = Self(0x2000);
    /// Portuguese (Brazil)
    pub const PTBR: Self = Self(0x4000);
    /// Italian (Italy)
    pub const ITIT: Self = Self(0x8000);
    /// Portuguese (Portugal)
    pub const PTPT: Self = Self(0x0001_0000);

    /// Create locale flags from a raw mask
    pub const fn new(bits: u32) -> Self {
        Self(bits)
    }

    /// Raw mask value
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// True when no bit is set
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// True when the masks share at least one bit
    pub const fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    /// True when every bit of `other` is also set here
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for LocaleFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for LocaleFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for LocaleFlags {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

impl From<u32> for LocaleFlags {
    fn from(bits: u32) -> Self {
        Self(bits)
    }
}

impl fmt::Display for LocaleFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Self::ALL {
            return f.write_str("All");
        }
        if self.is_empty() {
            return f.write_str("None");
        }

        let mut known = Self::NONE;
        let mut first = true;
        for (name, flag) in NAMED {
            if self.contains(*flag) {
                if !first {
                    f.write_str("|")?;
                }
                f.write_str(name)?;
                known |= *flag;
                first = false;
            }
        }

        let rest = self.0 & !known.0;
        if rest != 0 {
            if !first {
                f.write_str("|")?;
            }
            write!(f, "{rest:#x}")?;
        }
        Ok(())
    }
}

impl FromStr for LocaleFlags {
    type Err = String;

    /// Parses a locale name (`enUS`, case-insensitive), `All`, `None`,
    /// or a hex mask such as `0x202`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
            return u32::from_str_radix(hex, 16)
                .map(Self)
                .map_err(|e| format!("invalid locale mask {s}: {e}"));
        }
        if s.eq_ignore_ascii_case("all") {
            return Ok(Self::ALL);
        }
        if s.eq_ignore_ascii_case("none") {
            return Ok(Self::NONE);
        }
        NAMED
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(s))
            .map(|(_, flag)| *flag)
            .ok_or_else(|| format!("unknown locale: {s}"))
    }
}
