//! Owned, typed model of decoded token records.
//!
//! Nothing here borrows from the [`crate::RawRecordBuffer`] it was decoded from.

use core::fmt::{self, Display};

use bitflags::bitflags;
use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::Sid;

bitflags! {
    /// `SE_GROUP_*` attributes of a group entry.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    pub struct GroupAttributes: u32 {
        /// Cannot be disabled.
        const MANDATORY = 0x0000_0001;
        /// Enabled unless adjusted.
        const ENABLED_BY_DEFAULT = 0x0000_0002;
        /// Currently enabled.
        const ENABLED = 0x0000_0004;
        /// May be assigned as owner of new objects.
        const OWNER = 0x0000_0008;
        /// Only matches deny ACEs.
        const USE_FOR_DENY_ONLY = 0x0000_0010;
        /// Mandatory integrity label.
        const INTEGRITY = 0x0000_0020;
        /// Integrity label is enforced.
        const INTEGRITY_ENABLED = 0x0000_0040;
        /// Domain-local group.
        const RESOURCE = 0x2000_0000;
        /// Logon session SID.
        const LOGON_ID = 0xC000_0000;

        const _ = !0;
    }
}

bitflags! {
    /// `SE_PRIVILEGE_*` attributes of a privilege entry.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    pub struct PrivilegeAttributes: u32 {
        /// Enabled unless adjusted.
        const ENABLED_BY_DEFAULT = 0x0000_0001;
        /// Currently enabled.
        const ENABLED = 0x0000_0002;
        /// Removed from the token.
        const REMOVED = 0x0000_0004;
        /// Used to gain access to an object.
        const USED_FOR_ACCESS = 0x8000_0000;

        const _ = !0;
    }
}

bitflags! {
    /// `TOKEN_SECURITY_ATTRIBUTE_*` / `CLAIM_SECURITY_ATTRIBUTE_*` flags.
    ///
    /// The high 16 bits are reserved for custom flags and are kept as is.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    pub struct AttributeFlags: u32 {
        /// Not inherited by child processes.
        const NON_INHERITABLE = 0x0001;
        /// String comparisons are case sensitive.
        const CASE_SENSITIVE = 0x0002;
        /// Only used in deny ACEs.
        const USE_FOR_DENY_ONLY = 0x0004;
        /// Disabled unless enabled by policy.
        const DISABLED_BY_DEFAULT = 0x0008;
        /// Currently disabled.
        const DISABLED = 0x0010;
        /// Must be present.
        const MANDATORY = 0x0020;
        /// Ignored by access checks.
        const COMPARE_IGNORE = 0x0040;

        const _ = !0;
    }
}

impl AttributeFlags {
    /// Mask of the application-defined bits.
    pub const CUSTOM_MASK: u32 = 0xFFFF_0000;

    /// The application-defined bits.
    #[inline]
    #[must_use]
    pub const fn custom(self) -> u32 {
        self.bits() & Self::CUSTOM_MASK
    }
}

bitflags! {
    /// `PSM_ACTIVATION_TOKEN_*` flags carried in the low half of a package claim.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct PackageClaimFlags: u32 {
        /// Packaged application.
        const PACKAGED_APPLICATION = 0x0001;
        /// Shared entity.
        const SHARED_ENTITY = 0x0002;
        /// Full trust.
        const FULL_TRUST = 0x0004;
        /// Native service.
        const NATIVE_SERVICE = 0x0008;
        /// Multiple instances allowed.
        const MULTIPLE_INSTANCES_ALLOWED = 0x0010;
        /// Breakaway inhibited.
        const BREAKAWAY_INHIBITED = 0x0020;
        /// Runtime broker.
        const RUNTIME_BROKER = 0x0040;
        /// Universal console.
        const UNIVERSAL_CONSOLE = 0x0200;
        /// Win32 alacarte process.
        const WIN32_ALACARTE_PROCESS = 0x0001_0000;
    }
}

/// Locally unique identifier of a privilege.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Luid {
    /// Low 32 bits.
    pub low_part: u32,
    /// High 32 bits.
    pub high_part: i32,
}

impl Luid {
    /// The LUID as one 64-bit number.
    #[inline]
    #[must_use]
    #[expect(clippy::cast_sign_loss, reason = "the high part is reinterpreted bitwise")]
    pub const fn as_u64(self) -> u64 {
        ((self.high_part as u32 as u64) << 32) | self.low_part as u64
    }
}

impl Display for Luid {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.as_u64())
    }
}

/// Raw value-kind tag of a security attribute or claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive, IntoPrimitive)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u16)]
pub enum ValueKind {
    /// No value type.
    Invalid = 0x00,
    /// Signed 64-bit integers.
    Int64 = 0x01,
    /// Unsigned 64-bit integers.
    UInt64 = 0x02,
    /// Counted or NUL-terminated strings.
    String = 0x03,
    /// Fully qualified binary names (version plus name).
    Fqbn = 0x04,
    /// Security identifiers.
    Sid = 0x05,
    /// Booleans stored as 64-bit integers.
    Boolean = 0x06,
    /// Opaque octet strings.
    OctetString = 0x10,
}

impl Display for ValueKind {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Invalid => "Invalid",
            Self::Int64 => "Int64",
            Self::UInt64 => "UInt64",
            Self::String => "String",
            Self::Fqbn => "FQBN",
            Self::Sid => "SID",
            Self::Boolean => "Boolean",
            Self::OctetString => "Octet string",
        })
    }
}

/// One decoded attribute value. The variant is fixed by the record's [`ValueKind`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Value {
    /// Signed integer.
    Int64(i64),
    /// Unsigned integer.
    UInt64(u64),
    /// String.
    Text(String),
    /// Fully qualified binary name.
    VersionedName {
        /// Version number.
        version: u64,
        /// Binary name.
        name: String,
    },
    /// Principal identifier, resolved to a name asynchronously.
    Principal(Sid),
    /// SID value whose octets do not start with a valid SID.
    MalformedPrincipal(Vec<u8>),
    /// Boolean.
    Boolean(bool),
    /// Uninterpreted octets.
    OpaqueBytes(Vec<u8>),
}

impl Value {
    /// Kind tag this value was decoded from.
    #[inline]
    #[must_use]
    pub const fn kind(&self) -> ValueKind {
        match self {
            Self::Int64(_) => ValueKind::Int64,
            Self::UInt64(_) => ValueKind::UInt64,
            Self::Text(_) => ValueKind::String,
            Self::VersionedName { .. } => ValueKind::Fqbn,
            Self::Principal(_) | Self::MalformedPrincipal(_) => ValueKind::Sid,
            Self::Boolean(_) => ValueKind::Boolean,
            Self::OpaqueBytes(_) => ValueKind::OctetString,
        }
    }

    /// The principal, for [`Value::Principal`].
    #[inline]
    #[must_use]
    pub const fn principal(&self) -> Option<&Sid> {
        match self {
            Self::Principal(sid) => Some(sid),
            _ => None,
        }
    }
}

/// Group membership (also used for the token user, restricted SIDs and capabilities).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GroupEntry {
    /// The group.
    pub sid: Sid,
    /// `SE_GROUP_*` attributes.
    pub attributes: GroupAttributes,
    /// Decoded from the restricted SID list.
    pub restricted: bool,
}

/// One privilege held by the token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PrivilegeEntry {
    /// Privilege identifier.
    pub luid: Luid,
    /// `SE_PRIVILEGE_*` attributes.
    pub attributes: PrivilegeAttributes,
}

/// Security attribute or claim.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AttributeEntry {
    /// Attribute name.
    pub name: String,
    /// Value kind tag.
    pub kind: ValueKind,
    /// Attribute flags.
    pub flags: AttributeFlags,
    /// Values, in record order.
    pub values: Vec<Value>,
}

/// One decoded record.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Entry {
    /// Group-like entry.
    Group(GroupEntry),
    /// Privilege.
    Privilege(PrivilegeEntry),
    /// Security attribute or claim.
    Attribute(AttributeEntry),
}

impl Entry {
    /// Resolvable principals as `(value position, sid)`; groups use position 0.
    #[inline]
    pub fn principals(&self) -> impl Iterator<Item = (usize, &Sid)> {
        let (group, values) = match self {
            Self::Group(group) => (Some(&group.sid), [].as_slice()),
            Self::Privilege(_) => (None, [].as_slice()),
            Self::Attribute(attribute) => (None, attribute.values.as_slice()),
        };
        group.map(|sid| (0, sid)).into_iter().chain(
            values
                .iter()
                .enumerate()
                .filter_map(|(position, value)| Some((position, value.principal()?))),
        )
    }
}

/// Position of one displayable slot inside a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EntryIndex {
    /// Entry position.
    pub entry: usize,
    /// Value position inside the entry (0 for groups and privileges).
    pub value: usize,
}

impl EntryIndex {
    /// Index of value `value` of entry `entry`.
    #[inline]
    #[must_use]
    pub const fn new(entry: usize, value: usize) -> Self {
        Self { entry, value }
    }
}
