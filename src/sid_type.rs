use num_enum::{IntoPrimitive, TryFromPrimitive};

/// Account type reported by an account-name lookup (`SID_NAME_USE`).
///
/// See Microsoft docs for [SID_NAME_USE](https://learn.microsoft.com/en-us/windows/win32/api/winnt/ne-winnt-sid_name_use).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive, IntoPrimitive)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(i32)]
pub enum SidType {
    /// A user account.
    User = 1,
    /// A group account.
    Group = 2,
    /// A domain.
    Domain = 3,
    /// An alias (local group).
    Alias = 4,
    /// A well-known group (e.g. Everyone).
    WellKnownGroup = 5,
    /// A deleted account.
    DeletedAccount = 6,
    /// Not a valid account SID.
    Invalid = 7,
    /// Type could not be determined.
    Unknown = 8,
    /// A machine account.
    Computer = 9,
    /// A mandatory integrity label.
    Label = 10,
    /// A logon session.
    LogonSession = 11,
}
