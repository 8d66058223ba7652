//! Text rendering of decoded attribute values.

use core::fmt::{self, Display};

use num_enum::TryFromPrimitive;

use crate::{PackageClaimFlags, Value};

/// Shown for a principal whose name is not known yet.
pub const UNRESOLVED_PLACEHOLDER: &str = "(unresolved)";

/// Attribute name of the package claim.
pub const PACKAGE_CLAIM_NAME: &str = "WIN://PKG";

/// Rendered value, possibly waiting for an asynchronous name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DisplayText {
    text: String,
    pending: bool,
}

impl DisplayText {
    /// Final text.
    #[inline]
    #[must_use]
    pub const fn ready(text: String) -> Self {
        Self {
            text,
            pending: false,
        }
    }

    /// Placeholder for a value whose name is being resolved.
    #[inline]
    #[must_use]
    pub fn pending() -> Self {
        Self {
            text: UNRESOLVED_PLACEHOLDER.to_owned(),
            pending: true,
        }
    }

    /// The text.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// `true` while the text is a placeholder.
    #[inline]
    #[must_use]
    pub const fn is_pending(&self) -> bool {
        self.pending
    }

    /// Replaces the text with a resolved name.
    ///
    /// Returns `false` (and changes nothing) when the text already reads `text`.
    pub(crate) fn resolve(&mut self, text: &str) -> bool {
        if !self.pending && self.text == text {
            return false;
        }
        text.clone_into(&mut self.text);
        self.pending = false;
        true
    }
}

impl Display for DisplayText {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// `PackageOrigin` carried in the high half of a package claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive)]
#[repr(u32)]
pub enum PackageOrigin {
    /// Origin not known.
    Unknown = 0,
    /// Unsigned package.
    Unsigned = 1,
    /// Shipped with the OS.
    Inbox = 2,
    /// Installed from the Store.
    Store = 3,
    /// Unsigned developer package.
    DeveloperUnsigned = 4,
    /// Signed developer package.
    DeveloperSigned = 5,
    /// Line-of-business package.
    LineOfBusiness = 6,
}

impl Display for PackageOrigin {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Unknown => "Unknown",
            Self::Unsigned => "Unsigned",
            Self::Inbox => "Inbox",
            Self::Store => "Store",
            Self::DeveloperUnsigned => "Developer unsigned",
            Self::DeveloperSigned => "Developer signed",
            Self::LineOfBusiness => "Line of business",
        })
    }
}

const PACKAGE_FLAG_NAMES: [(PackageClaimFlags, &str); 9] = [
    (PackageClaimFlags::PACKAGED_APPLICATION, "Packaged application"),
    (PackageClaimFlags::SHARED_ENTITY, "Shared entity"),
    (PackageClaimFlags::FULL_TRUST, "Full trust"),
    (PackageClaimFlags::NATIVE_SERVICE, "Native service"),
    (PackageClaimFlags::MULTIPLE_INSTANCES_ALLOWED, "Multiple instances allowed"),
    (PackageClaimFlags::BREAKAWAY_INHIBITED, "Breakaway inhibited"),
    (PackageClaimFlags::RUNTIME_BROKER, "Runtime broker"),
    (PackageClaimFlags::UNIVERSAL_CONSOLE, "Universal console"),
    (PackageClaimFlags::WIN32_ALACARTE_PROCESS, "Win32 alacarte process"),
];

/// Renders a package claim value as `Origin: <origin>; Flags: <flags>`.
#[must_use]
#[inline]
pub fn format_package_claim(value: u64) -> String {
    #[expect(clippy::cast_possible_truncation, reason = "splitting into halves")]
    let (flags, origin) = (value as u32, (value >> 32) as u32);
    let mut out = String::from("Origin: ");
    match PackageOrigin::try_from(origin) {
        Ok(origin) => out.push_str(&origin.to_string()),
        Err(_) => out.push_str("(Unknown)"),
    }
    out.push_str("; Flags: ");
    let known = PackageClaimFlags::from_bits_truncate(flags);
    let mut names: Vec<&str> = PACKAGE_FLAG_NAMES
        .iter()
        .filter(|(flag, _)| known.contains(*flag))
        .map(|(_, name)| *name)
        .collect();
    if flags & !PackageClaimFlags::all().bits() != 0 {
        names.push("(Unknown)");
    }
    if names.is_empty() {
        out.push_str("(None)");
    } else {
        out.push_str(&names.join(", "));
    }
    out
}

/// Renders one attribute value.
///
/// `context_name` is the attribute name; it only matters for the package
/// claim. Principals render as [`UNRESOLVED_PLACEHOLDER`] and are marked
/// pending: their name arrives later through the resolution queue.
#[must_use]
#[inline]
pub fn format_value(context_name: &str, value: &Value) -> DisplayText {
    let text = match value {
        Value::UInt64(raw) if context_name.eq_ignore_ascii_case(PACKAGE_CLAIM_NAME) => {
            format_package_claim(*raw)
        }
        Value::Int64(number) => format!("{number} ({number:#x})"),
        Value::UInt64(number) => format!("{number} ({number:#x})"),
        Value::Text(text) => text.clone(),
        Value::VersionedName { version, name } => format!("Version {version}: {name}"),
        Value::Principal(_) => return DisplayText::pending(),
        Value::MalformedPrincipal(_) => "(Invalid SID)".to_owned(),
        Value::Boolean(flag) => String::from(if *flag { "True" } else { "False" }),
        Value::OpaqueBytes(_) => "(Octet string)".to_owned(),
    };
    DisplayText::ready(text)
}
