//! Test utilities associated with blocks.

use bytes::Bytes;
use tbs_api::{Block, Cid};

use crate::random_bytes;

/// Create a block holding 64 random bytes.
pub fn random_block() -> Block {
    Block::new(Bytes::from(random_bytes(64)))
}

/// Create `count` distinct random blocks.
pub fn random_blocks(count: usize) -> Vec<Block> {
    (0..count).map(|_| random_block()).collect()
}

/// The identifiers of the given blocks, in order.
pub fn cids_of(blocks: &[Block]) -> Vec<Cid> {
    blocks.iter().map(|b| *b.cid()).collect()
}

/// An identifier using md5, which hash security validation rejects.
pub fn insecure_cid() -> Cid {
    let hash = cid::multihash::Multihash::<64>::wrap(0xd5, &random_bytes(16))
        .expect("md5 digest fits a 64 byte multihash");
    Cid::new_v1(tbs_api::RAW_CODEC, hash)
}
