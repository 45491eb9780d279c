//! Content identifier validation ("hash security").
//!
//! Every entry point of the block service runs identifiers through a
//! [CidValidator] before performing any I/O. The default [HashSecurity]
//! validator rejects identifiers built on hash functions that are not
//! considered collision resistant, and digests too short to be safe.

use crate::*;
use std::sync::Arc;

/// Admits or rejects a content identifier.
pub trait CidValidator: 'static + Send + Sync + std::fmt::Debug {
    /// Returns [TbsError::InvalidCid] if the identifier must not be used.
    fn validate(&self, cid: &Cid) -> TbsResult<()>;
}

/// Trait-object [CidValidator].
pub type DynCidValidator = Arc<dyn CidValidator>;

/// Multihash code of the identity "hash".
pub const IDENTITY: u64 = 0x00;

/// Digests shorter than this are rejected for every real hash function.
pub const MINIMUM_DIGEST_LEN: usize = 20;

/// Inlined identity payloads longer than this are rejected.
pub const MAXIMUM_IDENTITY_LEN: usize = 128;

const ALLOWED_HASHES: &[u64] = &[
    IDENTITY,
    SHA2_256,
    0x13,   // sha2-512
    0x14,   // sha3-512
    0x15,   // sha3-384
    0x16,   // sha3-256
    0x17,   // sha3-224
    0x19,   // shake-256
    0x1a,   // keccak-224
    0x1b,   // keccak-256
    0x1c,   // keccak-384
    0x1d,   // keccak-512
    0x1e,   // blake3
    0x56,   // dbl-sha2-256
    0xb220, // blake2b-256
    0xb230, // blake2b-384
    0xb240, // blake2b-512
    0xb260, // blake2s-256
];

/// The default [CidValidator].
#[derive(Debug, Default, Clone, Copy)]
pub struct HashSecurity;

impl HashSecurity {
    /// Construct the default validator as a trait-object.
    pub fn create() -> DynCidValidator {
        let out: DynCidValidator = Arc::new(HashSecurity);
        out
    }
}

impl CidValidator for HashSecurity {
    fn validate(&self, cid: &Cid) -> TbsResult<()> {
        let hash = cid.hash();
        let reject = |reason: &str| TbsError::InvalidCid {
            cid: *cid,
            reason: reason.into(),
        };

        if !ALLOWED_HASHES.contains(&hash.code()) {
            return Err(reject(
                "potentially insecure hash functions not allowed",
            ));
        }

        let len = hash.digest().len();
        if hash.code() == IDENTITY {
            if len > MAXIMUM_IDENTITY_LEN {
                return Err(reject("identity digest too long"));
            }
        } else if len < MINIMUM_DIGEST_LEN {
            return Err(reject("digest too short"));
        }

        Ok(())
    }
}
