//! # Windows access token inspection
//!
//! Reads the variable-length records the kernel returns for an access token,
//! decodes them into an owned, typed model and resolves the security
//! principals they mention into display names without blocking the caller.
//!
//! The crate provides:
//! - [`query`] / [`query_with`]: the probe, grow and retry loop for records
//!   whose size is only known once a call has been refused, on top of any
//!   [`RawQuery`] subject.
//! - [`decode()`]: bounds-checked interpretation of group, privilege,
//!   restricted SID, capability, claim and security attribute records into
//!   [`Entry`] values.
//! - [`format_value`]: text rendering of attribute values, including the
//!   package claim (`WIN://PKG`).
//! - [`ResolutionQueue`]: a worker pool running the [`NameLookup`] chain,
//!   coalescing requests for the same [`Sid`] and caching results.
//! - [`SnapshotAssembler`] / [`Snapshot`]: one view of a subject whose
//!   principal names are filled in as they arrive.
//! - [`Sid`], [`SidIdentifierAuthority`], [`DomainAndName`], [`SidType`]: the
//!   principal identifier model.
//!
//! ## Windows-only functionality
//! *Available behind `cfg(windows)`.*
//!
//! - [`TokenSubject`] opens process and thread tokens and implements
//!   [`RawQuery`] over `GetTokenInformation`.
//! - [`SystemNameLookup`] resolves accounts, AppContainer packages and
//!   capabilities through the OS.
//!
//! ## Examples
//! ### Decode and render a privilege record
//! ```rust
//! use win_token_inspector::{Entry, QueryClass, RawRecordBuffer, decode};
//!
//! // TOKEN_PRIVILEGES with one enabled privilege (LUID 0x17).
//! let bytes = [1, 0, 0, 0, 0x17, 0, 0, 0, 0, 0, 0, 0, 2, 0, 0, 0];
//! let entries = decode(QueryClass::Privileges, RawRecordBuffer::from_bytes(&bytes)).unwrap();
//! let Entry::Privilege(privilege) = &entries[0] else { unreachable!() };
//! assert_eq!(privilege.luid.to_string(), "0x17");
//! ```
//!
//! ### (Windows) Snapshot the current process
//! ```no_run
//! # #[cfg(windows)]
//! # {
//! use std::time::Duration;
//! use win_token_inspector::{InspectorConfig, SnapshotAssembler, TokenSubject};
//!
//! let assembler = SnapshotAssembler::system(InspectorConfig::DEFAULT).unwrap();
//! let token = TokenSubject::current_process().unwrap();
//! let mut snapshot = assembler.build_snapshot(&token).unwrap();
//! while snapshot.wait_update(Duration::from_secs(1), |index, name| {
//!     println!("{index:?} => {name}");
//! }) {}
//! # }
//! ```

#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_auto_cfg, doc_cfg))]

mod config;
mod decode;
mod domain_and_name;
mod error;
mod format;
mod model;
mod query;
mod resolve;
mod sid;
mod sid_identifier_authority;
mod sid_type;
mod snapshot;
#[cfg(windows)]
mod subject;
#[cfg(test)]
mod test_support;
pub mod well_known;

pub use config::{
    ClassPolicy, ClassRequest, DEFAULT_CLASSES, InspectorConfig, PlatformSupport, QueryConfig,
};
pub use decode::decode;
/// Pair `DOMAIN\Name` returned by account lookups.
pub use domain_and_name::{DomainAndName, DomainParsingError};
pub use error::{DecodeError, OpenError, QueryError};
pub use format::{
    DisplayText, PACKAGE_CLAIM_NAME, PackageOrigin, UNRESOLVED_PLACEHOLDER, format_package_claim,
    format_value,
};
pub use model::{
    AttributeEntry, AttributeFlags, Entry, EntryIndex, GroupAttributes, GroupEntry, Luid,
    PackageClaimFlags, PrivilegeAttributes, PrivilegeEntry, Value, ValueKind,
};
pub use query::{
    QueryClass, RawQuery, RawQueryResult, RawRecordBuffer, RecordShape, query, query_with,
};
#[cfg(windows)]
pub use resolve::{CAPABILITY_NAMES, SystemNameLookup};
pub use resolve::{
    NameKind, NameLookup, NoLookup, ResolutionQueue, ResolutionRequest, ResolvedName, ResultSink,
    resolve_name,
};
pub use sid::{
    InvalidSidFormat, MAX_SUBAUTHORITY_COUNT, MIN_SUBAUTHORITY_COUNT, SID_HEAD_SIZE, Sid,
};
/// Identifier authority component of a SID (6-byte value).
///
/// See also: [`Sid::identifier_authority`].
pub use sid_identifier_authority::SidIdentifierAuthority;
/// Rust representation of `SID_NAME_USE`.
pub use sid_type::SidType;
pub use snapshot::{Snapshot, SnapshotAssembler, SnapshotError};
#[cfg(windows)]
pub use subject::{SubjectKind, TokenSubject};
pub use well_known::WellKnownTable;
