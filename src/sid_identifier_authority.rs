use core::fmt::{self, Display};

/// The 6-byte, big-endian identifier authority of a SID.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SidIdentifierAuthority {
    /// Raw big-endian bytes, as stored in the binary SID.
    pub value: [u8; 6],
}

impl SidIdentifierAuthority {
    /// `S-1-0` (null authority).
    pub const NULL_AUTHORITY: Self = Self::from_u64(0);
    /// `S-1-1` (world authority, *Everyone*).
    pub const WORLD_AUTHORITY: Self = Self::from_u64(1);
    /// `S-1-2` (local authority).
    pub const LOCAL_AUTHORITY: Self = Self::from_u64(2);
    /// `S-1-3` (creator authority).
    pub const CREATOR_AUTHORITY: Self = Self::from_u64(3);
    /// `S-1-5` (NT authority).
    pub const NT_AUTHORITY: Self = Self::from_u64(5);
    /// `S-1-15` (application packages and capabilities).
    pub const APP_PACKAGE_AUTHORITY: Self = Self::from_u64(15);
    /// `S-1-16` (mandatory integrity labels).
    pub const MANDATORY_LABEL_AUTHORITY: Self = Self::from_u64(16);

    /// Builds an authority from the low 48 bits of `value`.
    #[inline]
    #[must_use]
    pub const fn from_u64(value: u64) -> Self {
        let be = value.to_be_bytes();
        Self {
            value: [be[2], be[3], be[4], be[5], be[6], be[7]],
        }
    }

    /// Returns the authority as an integer.
    #[inline]
    #[must_use]
    pub const fn as_u64(&self) -> u64 {
        let v = self.value;
        u64::from_be_bytes([0, 0, v[0], v[1], v[2], v[3], v[4], v[5]])
    }
}

impl From<[u8; 6]> for SidIdentifierAuthority {
    #[inline]
    fn from(value: [u8; 6]) -> Self {
        Self { value }
    }
}

impl From<SidIdentifierAuthority> for [u8; 6] {
    #[inline]
    fn from(value: SidIdentifierAuthority) -> Self {
        value.value
    }
}

impl Display for SidIdentifierAuthority {
    /// Decimal when the value fits in 32 bits, `0x` hex otherwise.
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = self.as_u64();
        if value <= 0xFFFF_FFFF {
            write!(f, "{value}")
        } else {
            write!(f, "0x{value:X}")
        }
    }
}
