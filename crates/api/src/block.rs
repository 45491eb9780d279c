//! The basic unit of data handled by the block service.

use bytes::Bytes;
use sha2::Digest;

pub use cid::Cid;

/// Multicodec code of raw binary payloads.
pub const RAW_CODEC: u64 = 0x55;

/// Multihash code of sha2-256.
pub const SHA2_256: u64 = 0x12;

/// An immutable pair of content identifier and raw payload.
///
/// The payload is expected to hash to the digest carried by the identifier.
/// That is checked at entry points by a [crate::CidValidator] for the
/// identifier, but payloads fetched from remote tiers are trusted as-is.
#[derive(Clone, PartialEq, Eq)]
pub struct Block {
    cid: Cid,
    data: Bytes,
}

impl std::fmt::Debug for Block {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Block")
            .field("cid", &self.cid.to_string())
            .field("len", &self.data.len())
            .finish()
    }
}

impl Block {
    /// Construct a block from a payload, deriving a CIDv1 raw sha2-256
    /// identifier.
    pub fn new(data: Bytes) -> Self {
        let digest = sha2::Sha256::digest(&data);
        let hash = cid::multihash::Multihash::<64>::wrap(SHA2_256, &digest)
            .expect("sha2-256 digest always fits a 64 byte multihash");
        Self {
            cid: Cid::new_v1(RAW_CODEC, hash),
            data,
        }
    }

    /// Construct a block from a payload and an identifier the caller
    /// vouches for. The payload is not re-hashed.
    pub fn new_with_cid(data: Bytes, cid: Cid) -> Self {
        Self { cid, data }
    }

    /// The identifier of this block.
    pub fn cid(&self) -> &Cid {
        &self.cid
    }

    /// The raw payload of this block.
    pub fn data(&self) -> &Bytes {
        &self.data
    }

    /// Split the block into identifier and payload.
    pub fn into_parts(self) -> (Cid, Bytes) {
        (self.cid, self.data)
    }
}
