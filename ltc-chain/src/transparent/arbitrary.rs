use proptest::{collection::vec, prelude::*};

use crate::{block, cached::Cached};

use super::{CoinbaseData, Input, OutPoint};

impl Arbitrary for CoinbaseData {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_args: ()) -> Self::Strategy {
        vec(any::<u8>(), 0..95).prop_map(CoinbaseData).boxed()
    }
}

impl Arbitrary for Input {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_args: ()) -> Self::Strategy {
        prop_oneof![
            (any::<OutPoint>(), any::<super::Script>(), any::<u32>()).prop_map(
                |(outpoint, unlock_script, sequence)| Input::PrevOut {
                    outpoint,
                    unlock_script,
                    sequence,
                }
            ),
            (any::<block::Height>(), any::<CoinbaseData>(), any::<u32>()).prop_map(
                |(height, data, sequence)| Input::Coinbase {
                    height: Some(Cached::from(height)),
                    data,
                    sequence,
                }
            ),
        ]
        .boxed()
    }
}
