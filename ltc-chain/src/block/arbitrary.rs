use std::sync::Arc;

use crate::work::difficulty::CompactDifficulty;

use super::*;

use chrono::{TimeZone, Utc};
use proptest::{
    arbitrary::{any, Arbitrary},
    collection::vec,
    prelude::*,
};

impl Arbitrary for Header {
    type Parameters = ();

    fn arbitrary_with(_args: ()) -> Self::Strategy {
        (
            // version is interpreted as i32 in the spec, so we are limited to i32::MAX here
            (4u32..(i32::MAX as u32)),
            any::<Hash>(),
            any::<merkle::Root>(),
            // time is interpreted as u32 in the spec, but rust timestamps are i64
            (0i64..(u32::MAX as i64)),
            any::<CompactDifficulty>(),
            (0u32..(u32::MAX)),
        )
            .prop_map(
                |(
                    version,
                    previous_block_hash,
                    merkle_root,
                    timestamp,
                    difficulty_threshold,
                    nonce,
                )| {
                    Header::new(
                        version,
                        previous_block_hash,
                        merkle_root,
                        Utc.timestamp(timestamp, 0),
                        difficulty_threshold,
                        nonce,
                    )
                },
            )
            .boxed()
    }

    type Strategy = BoxedStrategy<Self>;
}

impl Arbitrary for Block {
    type Parameters = ();

    fn arbitrary_with(_args: ()) -> Self::Strategy {
        (any::<Header>(), vec(any::<Arc<Transaction>>(), 0..10))
            .prop_map(|(header, transactions)| Self {
                header,
                transactions,
            })
            .boxed()
    }

    type Strategy = BoxedStrategy<Self>;
}

impl Block {
    /// Returns a strategy for building a chain of `count` blocks with
    /// increasing height, each correctly pointing back at its predecessor.
    ///
    /// The produced blocks do not carry valid proof-of-work or a correctly
    /// computed Merkle root; they exist to exercise header-chain bookkeeping,
    /// not full consensus validation.
    pub fn partial_chain_strategy(count: usize) -> BoxedStrategy<Vec<Arc<Self>>> {
        vec(any::<Block>(), count)
            .prop_map(|mut blocks| {
                let mut previous_block_hash = Hash([0; 32]);
                for block in blocks.iter_mut() {
                    let mut header = block.header;
                    header.previous_block_hash = previous_block_hash;
                    block.header = header;
                    previous_block_hash = block.hash();
                }
                blocks.into_iter().map(Arc::new).collect()
            })
            .boxed()
    }
}
