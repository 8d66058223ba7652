use core::fmt::{self, Display};

use num_enum::{IntoPrimitive, TryFromPrimitive};

/// Token information class, numbered as the OS numbers `TOKEN_INFORMATION_CLASS`.
///
/// Only the classes this crate can decode are listed.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, TryFromPrimitive, IntoPrimitive,
)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u32)]
pub enum QueryClass {
    /// `TokenUser`: the token owner.
    User = 1,
    /// `TokenGroups`: group memberships.
    Groups = 2,
    /// `TokenPrivileges`.
    Privileges = 3,
    /// `TokenRestrictedSids`.
    RestrictedSids = 11,
    /// `TokenCapabilities`: app container capabilities.
    Capabilities = 30,
    /// `TokenUserClaimAttributes`.
    UserClaims = 33,
    /// `TokenDeviceClaimAttributes`.
    DeviceClaims = 34,
    /// `TokenSecurityAttributes`.
    SecurityAttributes = 39,
}

/// In-memory layout a [`QueryClass`] returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordShape {
    /// One `SID_AND_ATTRIBUTES` (`TOKEN_USER`).
    User,
    /// Counted `SID_AND_ATTRIBUTES` array (`TOKEN_GROUPS`).
    Groups,
    /// Counted `LUID_AND_ATTRIBUTES` array (`TOKEN_PRIVILEGES`).
    Privileges,
    /// `TOKEN_SECURITY_ATTRIBUTES_INFORMATION`.
    SecurityAttributes,
    /// `CLAIM_SECURITY_ATTRIBUTES_INFORMATION`.
    ClaimAttributes,
}

impl QueryClass {
    /// Every class, in numeric order.
    pub const ALL: [Self; 8] = [
        Self::User,
        Self::Groups,
        Self::Privileges,
        Self::RestrictedSids,
        Self::Capabilities,
        Self::UserClaims,
        Self::DeviceClaims,
        Self::SecurityAttributes,
    ];

    /// Layout of the records this class returns.
    #[inline]
    #[must_use]
    pub const fn shape(self) -> RecordShape {
        match self {
            Self::User => RecordShape::User,
            Self::Groups | Self::RestrictedSids | Self::Capabilities => RecordShape::Groups,
            Self::Privileges => RecordShape::Privileges,
            Self::SecurityAttributes => RecordShape::SecurityAttributes,
            Self::UserClaims | Self::DeviceClaims => RecordShape::ClaimAttributes,
        }
    }

    /// Raw class number.
    #[inline]
    #[must_use]
    pub const fn raw(self) -> u32 {
        self as u32
    }
}

impl Display for QueryClass {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::User => "User",
            Self::Groups => "Groups",
            Self::Privileges => "Privileges",
            Self::RestrictedSids => "Restricted SIDs",
            Self::Capabilities => "Capabilities",
            Self::UserClaims => "User claims",
            Self::DeviceClaims => "Device claims",
            Self::SecurityAttributes => "Security attributes",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_numbers_round_trip() {
        for class in QueryClass::ALL {
            assert_eq!(QueryClass::try_from(class.raw()).ok(), Some(class));
        }
        assert!(QueryClass::try_from(4).is_err());
    }

    #[test]
    fn group_like_classes_share_a_shape() {
        assert_eq!(QueryClass::RestrictedSids.shape(), RecordShape::Groups);
        assert_eq!(QueryClass::Capabilities.shape(), RecordShape::Groups);
        assert_eq!(QueryClass::DeviceClaims.shape(), RecordShape::ClaimAttributes);
    }
}
