// Path: crates/types/src/ids.rs
//! Fixed-size identifiers that cross the RPC boundary as raw bytes.

use crate::error::VmError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The length in bytes of a content identifier.
pub const ID_LEN: usize = 32;
/// The length in bytes of a node identifier.
pub const NODE_ID_LEN: usize = 20;

/// A 32-byte content hash identifying a block, chain, subnet, asset or summary.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Id(pub [u8; ID_LEN]);

impl Id {
    /// The all-zero identifier.
    pub const EMPTY: Id = Id([0u8; ID_LEN]);

    /// Decodes an identifier from a wire byte slice, rejecting any length other than 32.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, VmError> {
        let arr: [u8; ID_LEN] = bytes.try_into().map_err(|_| VmError::InvalidId {
            expected: ID_LEN,
            got: bytes.len(),
        })?;
        Ok(Self(arr))
    }

    /// Returns the raw bytes for encoding onto the wire.
    pub fn to_vec(&self) -> Vec<u8> {
        self.0.to_vec()
    }
}

impl AsRef<[u8]> for Id {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<[u8; ID_LEN]> for Id {
    fn from(bytes: [u8; ID_LEN]) -> Self {
        Self(bytes)
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Id({})", self)
    }
}

/// A 20-byte identifier of a peer node.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub [u8; NODE_ID_LEN]);

impl NodeId {
    /// Decodes a node identifier from a wire byte slice, rejecting any length other than 20.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, VmError> {
        let arr: [u8; NODE_ID_LEN] = bytes.try_into().map_err(|_| VmError::InvalidId {
            expected: NODE_ID_LEN,
            got: bytes.len(),
        })?;
        Ok(Self(arr))
    }

    /// Returns the raw bytes for encoding onto the wire.
    pub fn to_vec(&self) -> Vec<u8> {
        self.0.to_vec()
    }
}

impl AsRef<[u8]> for NodeId {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<[u8; NODE_ID_LEN]> for NodeId {
    fn from(bytes: [u8; NODE_ID_LEN]) -> Self {
        Self(bytes)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeID-{}", hex::encode(self.0))
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_from_slice_checks_length() {
        let id = Id::from_slice(&[7u8; 32]).unwrap();
        assert_eq!(id, Id([7u8; 32]));
        assert_eq!(id.to_vec(), vec![7u8; 32]);

        let err = Id::from_slice(&[1u8; 31]).unwrap_err();
        assert_eq!(
            err,
            VmError::InvalidId {
                expected: 32,
                got: 31
            }
        );
        assert!(Id::from_slice(&[]).is_err());
    }

    #[test]
    fn node_id_from_slice_checks_length() {
        let node = NodeId::from_slice(&[3u8; 20]).unwrap();
        assert_eq!(node.as_ref(), &[3u8; 20]);
        assert!(NodeId::from_slice(&[3u8; 32]).is_err());
    }

    #[test]
    fn display_is_hex() {
        let mut raw = [0u8; 32];
        raw[31] = 0xab;
        let id = Id(raw);
        assert!(id.to_string().ends_with("ab"));
        assert_eq!(id.to_string().len(), 64);
        assert_eq!(Id::EMPTY.to_string(), "0".repeat(64));
    }
}
