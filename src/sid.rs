//! Owned Windows Security Identifier (SID).
//!
//! A [`Sid`] is the principal identifier carried by group entries and
//! SID-typed attribute values. It is always validated on construction and
//! keeps its sub-authorities inline, so copying one out of a kernel record
//! never aliases the record buffer.
//!
//! Binary layout (matches the OS):
//! `u8 revision`, `u8 sub_authority_count`, `[u8; 6] identifier_authority`
//! (big-endian), then `sub_authority_count` little-endian `u32` values.

use core::fmt::{self, Debug, Display};
use core::str::FromStr;

use arrayvec::ArrayVec;
pub use parsing::InvalidSidFormat;
use parsing::SidComponents;
pub use parsing::{MAX_SUBAUTHORITY_COUNT, MIN_SUBAUTHORITY_COUNT};

use crate::SidIdentifierAuthority;

/// Size of the fixed SID header (revision, count, authority).
pub const SID_HEAD_SIZE: usize = 8;

/// Owned, validated Security Identifier.
///
/// # Examples
/// ```rust
/// # use win_token_inspector::{Sid, SidIdentifierAuthority};
/// let sid = Sid::try_new(SidIdentifierAuthority::NT_AUTHORITY, [32, 544]).unwrap();
/// assert_eq!(sid.to_string(), "S-1-5-32-544");
/// assert_eq!(sid.to_bytes(), [1, 2, 0, 0, 0, 0, 0, 5, 32, 0, 0, 0, 32, 2, 0, 0]);
/// ```
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Sid {
    revision: u8,
    identifier_authority: SidIdentifierAuthority,
    sub_authority: ArrayVec<u32, { MAX_SUBAUTHORITY_COUNT as usize }>,
}

impl Debug for Sid {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Sid").field(&format_args!("{self}")).finish()
    }
}

impl Sid {
    /// The only revision in use.
    pub const REVISION: u8 = 1;

    /// Builds a revision-1 SID from its parts.
    ///
    /// Returns `None` when `sub_authority` is empty or longer than 15.
    #[must_use]
    #[inline]
    pub fn try_new<S: AsRef<[u32]>>(
        identifier_authority: SidIdentifierAuthority,
        sub_authority: S,
    ) -> Option<Self> {
        let sub_authority = sub_authority.as_ref();
        if !Self::count_is_valid(sub_authority.len()) {
            return None;
        }
        let sub_authority = ArrayVec::try_from(sub_authority).ok()?;
        Some(Self {
            revision: Self::REVISION,
            identifier_authority,
            sub_authority,
        })
    }

    const fn count_is_valid(count: usize) -> bool {
        MIN_SUBAUTHORITY_COUNT as usize <= count && count <= MAX_SUBAUTHORITY_COUNT as usize
    }

    /// Binary length of a SID with `count` sub-authorities.
    #[inline]
    #[must_use]
    pub const fn size_for_count(count: u8) -> usize {
        SID_HEAD_SIZE + count as usize * size_of::<u32>()
    }

    /// Reads a SID from the start of `bytes`, which may be longer than the SID.
    ///
    /// Returns the SID and the number of bytes it occupies.
    ///
    /// # Errors
    /// [`InvalidSidFormat::BadLayout`] when the header is not a revision-1 SID
    /// header or the declared sub-authorities do not fit in `bytes`.
    #[inline]
    pub fn read_prefix(bytes: &[u8]) -> Result<(Self, usize), InvalidSidFormat> {
        let Some((head, tail)) = bytes.split_first_chunk::<SID_HEAD_SIZE>() else {
            return Err(InvalidSidFormat::BadLayout);
        };
        let [revision, count, authority @ ..] = *head;
        if revision != Self::REVISION || !Self::count_is_valid(usize::from(count)) {
            return Err(InvalidSidFormat::BadLayout);
        }
        let body_len = usize::from(count) * size_of::<u32>();
        let body = tail.get(..body_len).ok_or(InvalidSidFormat::BadLayout)?;
        let sub_authority = body
            .chunks_exact(size_of::<u32>())
            .map(|chunk| {
                let mut word = [0u8; 4];
                word.copy_from_slice(chunk);
                u32::from_le_bytes(word)
            })
            .collect();
        Ok((
            Self {
                revision,
                identifier_authority: SidIdentifierAuthority::from(authority),
                sub_authority,
            },
            SID_HEAD_SIZE + body_len,
        ))
    }

    /// Parses a binary SID occupying exactly `bytes`.
    ///
    /// # Errors
    /// [`InvalidSidFormat::BadLayout`] if `bytes` is not exactly one valid SID.
    #[inline]
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, InvalidSidFormat> {
        let (sid, len) = Self::read_prefix(bytes)?;
        if len == bytes.len() {
            Ok(sid)
        } else {
            Err(InvalidSidFormat::BadLayout)
        }
    }

    /// Serialises the SID into its binary layout.
    #[must_use]
    #[inline]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.binary_len());
        out.push(self.revision);
        out.push(self.sub_authority_count());
        out.extend_from_slice(&self.identifier_authority.value);
        for sub in &self.sub_authority {
            out.extend_from_slice(&sub.to_le_bytes());
        }
        out
    }

    /// Length of [`Sid::to_bytes`].
    #[inline]
    #[must_use]
    pub fn binary_len(&self) -> usize {
        Self::size_for_count(self.sub_authority_count())
    }

    /// SID revision (always 1 for validated SIDs).
    #[inline]
    #[must_use]
    pub const fn revision(&self) -> u8 {
        self.revision
    }

    /// Identifier authority component.
    #[inline]
    #[must_use]
    pub const fn identifier_authority(&self) -> SidIdentifierAuthority {
        self.identifier_authority
    }

    /// Sub-authorities, in order.
    #[inline]
    #[must_use]
    pub fn sub_authorities(&self) -> &[u32] {
        &self.sub_authority
    }

    #[expect(
        clippy::cast_possible_truncation,
        reason = "the count is bounded by MAX_SUBAUTHORITY_COUNT"
    )]
    fn sub_authority_count(&self) -> u8 {
        self.sub_authority.len() as u8
    }

    /// Relative identifier (last sub-authority).
    #[inline]
    #[must_use]
    pub fn rid(&self) -> u32 {
        self.sub_authority.last().copied().unwrap_or_default()
    }

    /// `true` if this SID has `authority` and its sub-authorities start with `prefix`.
    #[inline]
    #[must_use]
    pub fn starts_with(&self, authority: SidIdentifierAuthority, prefix: &[u32]) -> bool {
        self.identifier_authority == authority && self.sub_authority.starts_with(prefix)
    }
}

impl Display for Sid {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "S-{}-{}", self.revision, self.identifier_authority)?;
        for sub in &self.sub_authority {
            write!(f, "-{sub}")?;
        }
        Ok(())
    }
}

impl FromStr for Sid {
    type Err = InvalidSidFormat;

    #[inline]
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let SidComponents {
            revision,
            identifier_authority,
            sub_authority,
        } = s.parse()?;
        Ok(Self {
            revision,
            identifier_authority: identifier_authority.into(),
            sub_authority,
        })
    }
}

impl TryFrom<&[u8]> for Sid {
    type Error = InvalidSidFormat;

    #[inline]
    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        Self::from_bytes(value)
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for Sid {
    #[inline]
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for Sid {
    #[inline]
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = <std::borrow::Cow<'de, str>>::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

#[allow(clippy::unwrap_used, reason = "Unwrap is not an issue in test")]
#[cfg(test)]
pub(crate) mod test {
    use super::*;
    use crate::sid_identifier_authority::test::arb_identifier_authority;
    use proptest::prelude::*;

    prop_compose! {
        pub fn arb_sid()
            (authority in arb_identifier_authority(),
             subs in proptest::collection::vec(any::<u32>(), 1..=15))
            -> Sid {
            Sid::try_new(authority, subs).unwrap()
        }
    }

    #[test]
    fn rejects_out_of_range_counts() {
        assert!(Sid::try_new(SidIdentifierAuthority::NT_AUTHORITY, []).is_none());
        assert!(Sid::try_new(SidIdentifierAuthority::NT_AUTHORITY, [0u32; 16]).is_none());
    }

    #[test]
    fn read_prefix_reports_length_and_ignores_trailing_bytes() {
        let mut bytes = "S-1-5-21-1-2-3-1001".parse::<Sid>().unwrap().to_bytes();
        let len = bytes.len();
        bytes.extend_from_slice(&[0xAA; 7]);
        let (sid, used) = Sid::read_prefix(&bytes).unwrap();
        assert_eq!(used, len);
        assert_eq!(sid.rid(), 1001);
        assert_eq!(Sid::from_bytes(&bytes), Err(InvalidSidFormat::BadLayout));
    }

    #[test]
    fn read_prefix_rejects_truncated_body() {
        // Declares two sub-authorities but carries only one.
        let bytes = [1u8, 2, 0, 0, 0, 0, 0, 5, 32, 0, 0, 0];
        assert_eq!(Sid::read_prefix(&bytes), Err(InvalidSidFormat::BadLayout));
        let bad_revision = [2u8, 1, 0, 0, 0, 0, 0, 5, 18, 0, 0, 0];
        assert_eq!(Sid::read_prefix(&bad_revision), Err(InvalidSidFormat::BadLayout));
    }

    proptest! {
        #[test]
        fn display_parse_round_trip(sid in arb_sid()) {
            let text = sid.to_string();
            prop_assert!(text.starts_with("S-1-"), "unexpected prefix: {}", text);
            prop_assert_eq!(text.matches('-').count(), sid.sub_authorities().len() + 2);
            prop_assert_eq!(text.parse::<Sid>().unwrap(), sid);
        }

        #[test]
        fn binary_round_trip(sid in arb_sid()) {
            let bytes = sid.to_bytes();
            prop_assert_eq!(bytes.len(), sid.binary_len());
            prop_assert_eq!(Sid::from_bytes(&bytes).unwrap(), sid);
        }
    }

    #[cfg(feature = "serde")]
    #[test]
    fn serde_uses_string_form() {
        let sid: Sid = "S-1-5-18".parse().unwrap();
        let json = serde_json::to_string(&sid).unwrap();
        assert_eq!(json, "\"S-1-5-18\"");
        assert_eq!(serde_json::from_str::<Sid>(&json).unwrap(), sid);
    }
}
