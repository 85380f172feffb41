//  Copyright 2024 The Tari Project
//  SPDX-License-Identifier: BSD-3-Clause

//! Chain positions exchanged with the node: points, tips and the fixed chain parameters of a connection.

use std::{
    fmt,
    fmt::{Display, Formatter},
    str::FromStr,
};

use thiserror::Error;

/// The hash of a block header. The node identifies every non-origin point by one of these.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct HeaderHash([u8; HeaderHash::LEN]);

impl HeaderHash {
    pub const LEN: usize = 32;

    pub const fn new(bytes: [u8; Self::LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl TryFrom<&[u8]> for HeaderHash {
    type Error = HeaderHashError;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        let bytes = <[u8; Self::LEN]>::try_from(bytes).map_err(|_| HeaderHashError::InvalidLength(bytes.len()))?;
        Ok(Self(bytes))
    }
}

impl FromStr for HeaderHash {
    type Err = HeaderHashError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s)?;
        Self::try_from(bytes.as_slice())
    }
}

impl Display for HeaderHash {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for HeaderHash {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "HeaderHash({})", self.to_hex())
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum HeaderHashError {
    #[error("Header hash must be {} bytes but got {0}", HeaderHash::LEN)]
    InvalidLength(usize),
    #[error("Header hash is not valid hex: {0}")]
    InvalidHex(#[from] hex::FromHexError),
}

/// A position on the chain. Points are only ever compared for equality, there is no ordering between them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Point {
    /// The genesis position, before the first block
    Origin,
    Specific { slot: u64, hash: HeaderHash },
}

impl Point {
    pub fn new(slot: u64, hash: HeaderHash) -> Self {
        Point::Specific { slot, hash }
    }

    pub fn slot(&self) -> Option<u64> {
        match self {
            Point::Origin => None,
            Point::Specific { slot, .. } => Some(*slot),
        }
    }
}

impl Default for Point {
    fn default() -> Self {
        Point::Origin
    }
}

impl Display for Point {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Point::Origin => f.write_str("origin"),
            Point::Specific { slot, hash } => write!(f, "{}@{}", hash, slot),
        }
    }
}

/// The node's current chain head. The block number is carried along as received and is not interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tip {
    pub point: Point,
    pub block_no: u64,
}

impl Tip {
    pub fn new(point: Point, block_no: u64) -> Self {
        Self { point, block_no }
    }
}

impl Display for Tip {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} (block #{})", self.point, self.block_no)
    }
}

/// Parameters of the chain the connection was negotiated for. They are fixed for the lifetime of the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainParameters {
    pub epoch_slots: u64,
    pub network_magic: u32,
}

impl ChainParameters {
    pub fn new(epoch_slots: u64, network_magic: u32) -> Self {
        Self {
            epoch_slots,
            network_magic,
        }
    }

    /// Returns the epoch containing the given point, or None for the origin
    pub fn epoch_of(&self, point: &Point) -> Option<u64> {
        point.slot().and_then(|slot| slot.checked_div(self.epoch_slots))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn it_parses_a_header_hash_from_hex() {
        let hex = "ab".repeat(HeaderHash::LEN);
        let hash = hex.parse::<HeaderHash>().unwrap();
        assert_eq!(hash.as_bytes(), &[0xab; HeaderHash::LEN]);
        assert_eq!(hash.to_string(), hex);
    }

    #[test]
    fn it_rejects_a_short_header_hash() {
        let err = "abcd".parse::<HeaderHash>().unwrap_err();
        assert_eq!(err, HeaderHashError::InvalidLength(2));
    }

    #[test]
    fn it_calculates_the_epoch_of_a_point() {
        let params = ChainParameters::new(21_600, 42);
        let point = Point::new(43_201, HeaderHash::new([0; HeaderHash::LEN]));
        assert_eq!(params.epoch_of(&point), Some(2));
        assert_eq!(params.epoch_of(&Point::Origin), None);
        assert_eq!(ChainParameters::new(0, 42).epoch_of(&point), None);
    }
}
