//! `DOMAIN\Name` pairs produced by account lookups.

use core::fmt::{self, Display};
use core::str::FromStr;

use thiserror::Error;

/// Parsing errors for `DOMAIN\Name`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainParsingError {
    /// Input contained more than one `\` separator.
    #[error("Too many '\\' separators")]
    TooManySeparators,
    /// The name part is empty.
    #[error("Name is empty")]
    EmptyName,
}

/// Account name with its (possibly empty) authority domain.
///
/// An empty domain is displayed as the bare name, which is how lookups report
/// accounts such as `Everyone`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DomainAndName {
    /// The domain part (before the `\`).
    pub domain: String,
    /// The name part (after the `\`).
    pub name: String,
}

impl DomainAndName {
    /// Non-validating constructor (domain, then name).
    #[inline]
    pub fn new<D: Into<String>, N: Into<String>>(domain: D, name: N) -> Self {
        Self {
            domain: domain.into(),
            name: name.into(),
        }
    }
}

impl Display for DomainAndName {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.domain.is_empty() {
            f.write_str(&self.name)
        } else {
            write!(f, "{}\\{}", self.domain, self.name)
        }
    }
}

impl FromStr for DomainAndName {
    type Err = DomainParsingError;

    /// Accepts `DOMAIN\Name` or a bare `Name`.
    #[inline]
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut iter = s.splitn(3, '\\');
        let first = iter.next().unwrap_or_default();
        let (domain, name) = match (iter.next(), iter.next()) {
            (None, _) => ("", first),
            (Some(name), None) => (first, name),
            (Some(_), Some(_)) => return Err(DomainParsingError::TooManySeparators),
        };
        if name.is_empty() {
            return Err(DomainParsingError::EmptyName);
        }
        Ok(Self::new(domain, name))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, reason = "Unwrap is not an issue in test")]
mod tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn round_trip(domain in r"[^\x00\\]*", name in r"[^\x00\\]+") {
            let input = if domain.is_empty() { name.clone() } else { format!("{domain}\\{name}") };
            let parsed = DomainAndName::from_str(&input).unwrap();
            prop_assert_eq!(parsed.to_string(), input);
            prop_assert_eq!(parsed.name, name);
        }
    }

    #[test]
    fn separators_and_empty_name() {
        assert_eq!(
            DomainAndName::from_str("A\\B\\C"),
            Err(DomainParsingError::TooManySeparators)
        );
        assert_eq!(
            DomainAndName::from_str("DOMAIN\\"),
            Err(DomainParsingError::EmptyName)
        );
        assert_eq!(
            DomainAndName::from_str("NT AUTHORITY\\SYSTEM").unwrap().to_string(),
            "NT AUTHORITY\\SYSTEM"
        );
    }
}
