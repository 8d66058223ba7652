//! Well-known SIDs of the host environment and their display names.
//!
//! Source: https://learn.microsoft.com/windows/win32/secauthz/well-known-sids
//!
//! This is the fourth resolution strategy: it only names SIDs the account,
//! package and capability lookups could not.

use crate::{Sid, SidIdentifierAuthority};

/// One row of a [`WellKnownTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WellKnownEntry {
    /// Identifier authority the SID must have.
    pub authority: SidIdentifierAuthority,
    /// Sub-authorities to match.
    pub sub_authorities: &'static [u32],
    /// When `true`, any SID whose sub-authorities start with
    /// `sub_authorities` matches (session-specific SIDs).
    pub prefix: bool,
    /// Display name.
    pub name: &'static str,
}

impl WellKnownEntry {
    const fn exact(
        authority: SidIdentifierAuthority,
        sub_authorities: &'static [u32],
        name: &'static str,
    ) -> Self {
        Self {
            authority,
            sub_authorities,
            prefix: false,
            name,
        }
    }

    const fn prefix(
        authority: SidIdentifierAuthority,
        sub_authorities: &'static [u32],
        name: &'static str,
    ) -> Self {
        Self {
            authority,
            sub_authorities,
            prefix: true,
            name,
        }
    }

    /// `true` if `sid` is named by this entry.
    #[inline]
    #[must_use]
    pub fn matches(&self, sid: &Sid) -> bool {
        if self.prefix {
            sid.starts_with(self.authority, self.sub_authorities)
        } else {
            sid.identifier_authority() == self.authority
                && sid.sub_authorities() == self.sub_authorities
        }
    }
}

const NULL: SidIdentifierAuthority = SidIdentifierAuthority::NULL_AUTHORITY;
const WORLD: SidIdentifierAuthority = SidIdentifierAuthority::WORLD_AUTHORITY;
const LOCAL: SidIdentifierAuthority = SidIdentifierAuthority::LOCAL_AUTHORITY;
const CREATOR: SidIdentifierAuthority = SidIdentifierAuthority::CREATOR_AUTHORITY;
const NT: SidIdentifierAuthority = SidIdentifierAuthority::NT_AUTHORITY;
const APP: SidIdentifierAuthority = SidIdentifierAuthority::APP_PACKAGE_AUTHORITY;
const LABEL: SidIdentifierAuthority = SidIdentifierAuthority::MANDATORY_LABEL_AUTHORITY;

/// The built-in table.
pub const DEFAULT_ENTRIES: &[WellKnownEntry] = &[
    WellKnownEntry::exact(NULL, &[0], "Nobody"),
    WellKnownEntry::exact(WORLD, &[0], "Everyone"),
    WellKnownEntry::exact(LOCAL, &[0], "LOCAL"),
    WellKnownEntry::exact(LOCAL, &[1], "CONSOLE LOGON"),
    WellKnownEntry::exact(CREATOR, &[0], "CREATOR OWNER"),
    WellKnownEntry::exact(CREATOR, &[1], "CREATOR GROUP"),
    WellKnownEntry::exact(CREATOR, &[4], "OWNER RIGHTS"),
    WellKnownEntry::exact(NT, &[2], "NETWORK"),
    WellKnownEntry::exact(NT, &[4], "INTERACTIVE"),
    WellKnownEntry::exact(NT, &[6], "SERVICE"),
    WellKnownEntry::exact(NT, &[7], "ANONYMOUS LOGON"),
    WellKnownEntry::exact(NT, &[11], "Authenticated Users"),
    WellKnownEntry::exact(NT, &[14], "REMOTE INTERACTIVE LOGON"),
    WellKnownEntry::exact(NT, &[15], "This Organization"),
    WellKnownEntry::exact(NT, &[18], "Local System"),
    WellKnownEntry::exact(NT, &[19], "Local Service"),
    WellKnownEntry::exact(NT, &[20], "Network Service"),
    WellKnownEntry::exact(NT, &[32, 544], "BUILTIN\\Administrators"),
    WellKnownEntry::exact(NT, &[32, 545], "BUILTIN\\Users"),
    WellKnownEntry::exact(NT, &[32, 546], "BUILTIN\\Guests"),
    WellKnownEntry::exact(NT, &[64, 10], "NTLM Authentication"),
    WellKnownEntry::exact(NT, &[113], "Local account"),
    WellKnownEntry::exact(NT, &[114], "Local account and member of Administrators group"),
    WellKnownEntry::prefix(NT, &[5], "Logon Session"),
    WellKnownEntry::prefix(NT, &[90, 0], "Window Manager\\DWM"),
    WellKnownEntry::prefix(NT, &[96, 0], "Font Driver Host\\UMFD"),
    WellKnownEntry::exact(APP, &[2, 1], "ALL APPLICATION PACKAGES"),
    WellKnownEntry::exact(APP, &[2, 2], "ALL RESTRICTED APPLICATION PACKAGES"),
    WellKnownEntry::exact(LABEL, &[0], "Untrusted Mandatory Level"),
    WellKnownEntry::exact(LABEL, &[4096], "Low Mandatory Level"),
    WellKnownEntry::exact(LABEL, &[8192], "Medium Mandatory Level"),
    WellKnownEntry::exact(LABEL, &[8448], "Medium Plus Mandatory Level"),
    WellKnownEntry::exact(LABEL, &[12288], "High Mandatory Level"),
    WellKnownEntry::exact(LABEL, &[16384], "System Mandatory Level"),
    WellKnownEntry::exact(LABEL, &[20480], "Protected Process Mandatory Level"),
];

/// Ordered set of well-known entries; the first match wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WellKnownTable {
    entries: &'static [WellKnownEntry],
}

impl WellKnownTable {
    /// Table backed by [`DEFAULT_ENTRIES`].
    pub const DEFAULT: Self = Self::new(DEFAULT_ENTRIES);

    /// Table over caller-provided entries.
    #[inline]
    #[must_use]
    pub const fn new(entries: &'static [WellKnownEntry]) -> Self {
        Self { entries }
    }

    /// Display name of `sid`, if the table knows it.
    #[inline]
    #[must_use]
    pub fn lookup(&self, sid: &Sid) -> Option<&'static str> {
        self.entries
            .iter()
            .find(|entry| entry.matches(sid))
            .map(|entry| entry.name)
    }
}

impl Default for WellKnownTable {
    #[inline]
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, reason = "Unwrap is not an issue in test")]
mod tests {
    use super::*;

    fn name_of(text: &str) -> Option<&'static str> {
        WellKnownTable::DEFAULT.lookup(&text.parse().unwrap())
    }

    #[test]
    fn exact_entries() {
        assert_eq!(name_of("S-1-5-18"), Some("Local System"));
        assert_eq!(name_of("S-1-1-0"), Some("Everyone"));
        assert_eq!(name_of("S-1-16-12288"), Some("High Mandatory Level"));
        assert_eq!(name_of("S-1-5-18-1"), None);
    }

    #[test]
    fn prefix_entries_cover_session_sids() {
        assert_eq!(name_of("S-1-5-96-0-3"), Some("Font Driver Host\\UMFD"));
        assert_eq!(name_of("S-1-5-90-0-1"), Some("Window Manager\\DWM"));
        assert_eq!(name_of("S-1-5-5-0-123456"), Some("Logon Session"));
        assert_eq!(name_of("S-1-5-21-1-2-3-500"), None);
    }

    #[test]
    fn custom_table() {
        static ENTRIES: &[WellKnownEntry] = &[WellKnownEntry::exact(
            SidIdentifierAuthority::NT_AUTHORITY,
            &[18],
            "SYSTEM",
        )];
        let table = WellKnownTable::new(ENTRIES);
        assert_eq!(table.lookup(&"S-1-5-18".parse().unwrap()), Some("SYSTEM"));
        assert_eq!(table.lookup(&"S-1-1-0".parse().unwrap()), None);
    }
}
