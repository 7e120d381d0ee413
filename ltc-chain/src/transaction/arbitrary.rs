use proptest::{arbitrary::any, collection::vec, prelude::*};

use crate::{cached::Cached, transparent};

use super::Transaction;

impl Arbitrary for Transaction {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_args: ()) -> Self::Strategy {
        (
            any::<i32>(),
            vec(any::<transparent::Input>(), 1..10),
            vec(any::<transparent::Output>(), 0..10),
            any::<super::LockTime>(),
        )
            .prop_map(|(version, inputs, outputs, locktime)| Transaction {
                version,
                inputs,
                outputs,
                locktime,
                hash: Cached::new(),
            })
            .boxed()
    }
}
