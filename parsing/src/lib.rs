//! Textual `S-R-A-S1-…` parsing shared by the `win-token-inspector` crate.
#![cfg_attr(not(feature = "std"), no_std)]

use core::str::FromStr;

use arrayvec::ArrayVec;
use thiserror::Error;

/// Lowest number of sub-authorities a valid SID carries.
pub const MIN_SUBAUTHORITY_COUNT: u8 = 1;
/// Highest number of sub-authorities a valid SID carries.
pub const MAX_SUBAUTHORITY_COUNT: u8 = 15;

/// Largest identifier authority value (48 bits).
const MAX_AUTHORITY: u64 = 0xFFFF_FFFF_FFFF;

/// Raw components of a SID read from its string form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SidComponents {
    /// The SID revision value, generally 1.
    pub revision: u8,
    /// The identifier authority as 6 big-endian bytes.
    pub identifier_authority: [u8; 6],
    /// The SID sub-authority values.
    pub sub_authority: ArrayVec<u32, { MAX_SUBAUTHORITY_COUNT as usize }>,
}

/// Error returned when a SID string is malformed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum InvalidSidFormat {
    /// The string does not start with `S-`.
    #[error("SID string must start with \"S-\"")]
    MissingPrefix,
    /// A component is missing or is not a decimal (or `0x` hex authority) number.
    #[error("invalid SID component at position {0}")]
    BadComponent(usize),
    /// The identifier authority does not fit in 48 bits.
    #[error("identifier authority out of range")]
    AuthorityOutOfRange,
    /// Fewer than 1 or more than 15 sub-authorities.
    #[error("invalid sub-authority count {0}")]
    SubAuthorityCount(usize),
    /// Binary form is not a valid SID.
    #[error("invalid binary SID layout")]
    BadLayout,
}

fn parse_authority(text: &str) -> Result<u64, InvalidSidFormat> {
    let value = match text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
    {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => text.parse::<u64>(),
    }
    .map_err(|_| InvalidSidFormat::BadComponent(2))?;
    if value > MAX_AUTHORITY {
        return Err(InvalidSidFormat::AuthorityOutOfRange);
    }
    Ok(value)
}

impl FromStr for SidComponents {
    type Err = InvalidSidFormat;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split('-');
        if !parts
            .next()
            .is_some_and(|head| head.eq_ignore_ascii_case("s"))
        {
            return Err(InvalidSidFormat::MissingPrefix);
        }
        let revision = parts
            .next()
            .and_then(|part| part.parse::<u8>().ok())
            .ok_or(InvalidSidFormat::BadComponent(1))?;
        let authority = parts
            .next()
            .ok_or(InvalidSidFormat::BadComponent(2))
            .and_then(parse_authority)?;
        let mut identifier_authority = [0u8; 6];
        for (slot, byte) in identifier_authority
            .iter_mut()
            .zip(authority.to_be_bytes().into_iter().skip(2))
        {
            *slot = byte;
        }

        let mut sub_authority = ArrayVec::new();
        let mut count = 0usize;
        for (position, part) in parts.enumerate() {
            let value = part
                .parse::<u32>()
                .map_err(|_| InvalidSidFormat::BadComponent(position + 3))?;
            count += 1;
            // Past the limit only the count matters.
            sub_authority.try_push(value).ok();
        }
        if count < MIN_SUBAUTHORITY_COUNT as usize || count > MAX_SUBAUTHORITY_COUNT as usize {
            return Err(InvalidSidFormat::SubAuthorityCount(count));
        }

        Ok(Self {
            revision,
            identifier_authority,
            sub_authority,
        })
    }
}
