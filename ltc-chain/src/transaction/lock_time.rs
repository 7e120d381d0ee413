use std::io;

use chrono::{DateTime, TimeZone, Utc};
#[cfg(any(test, feature = "proptest-impl"))]
use proptest::prelude::*;
use serde::{Deserialize, Serialize};

use crate::block::Height;
use crate::serialization::{BitcoinDeserialize, BitcoinSerialize, SerializationError};

/// The Bitcoin-inherited transaction locktime: either a block height or a
/// Unix timestamp, distinguished by the `LOCKTIME_THRESHOLD` the wire value
/// falls above or below.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LockTime {
    /// The transaction may be mined in any block at this height or above.
    Height(Height),
    /// The transaction may be mined in any block whose timestamp is at or
    /// after this time.
    Time(DateTime<Utc>),
}

impl LockTime {
    /// Wire values below this threshold are interpreted as block heights;
    /// values at or above it are interpreted as Unix timestamps.
    pub const LOCKTIME_THRESHOLD: u32 = 500_000_000;

    /// A locktime of zero: the transaction has no locktime restriction.
    pub fn unlocked() -> LockTime {
        LockTime::Height(Height(0))
    }
}

#[cfg(any(test, feature = "proptest-impl"))]
impl Arbitrary for LockTime {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_args: ()) -> Self::Strategy {
        prop_oneof![
            (0..LockTime::LOCKTIME_THRESHOLD).prop_map(|n| LockTime::Height(Height(n))),
            (LockTime::LOCKTIME_THRESHOLD..=u32::MAX)
                .prop_map(|n| LockTime::Time(Utc.timestamp(n as i64, 0))),
        ]
        .boxed()
    }
}

impl BitcoinSerialize for LockTime {
    fn bitcoin_serialize<W: io::Write>(&self, mut writer: W) -> Result<(), io::Error> {
        let value = match self {
            LockTime::Height(height) => height.value(),
            LockTime::Time(time) => time.timestamp() as u32,
        };
        value.bitcoin_serialize(&mut writer)
    }
}

impl BitcoinDeserialize for LockTime {
    fn bitcoin_deserialize<R: io::Read>(mut reader: R) -> Result<Self, SerializationError>
    where
        Self: Sized,
    {
        let value = u32::bitcoin_deserialize(&mut reader)?;
        if value < LockTime::LOCKTIME_THRESHOLD {
            Ok(LockTime::Height(Height(value)))
        } else {
            Ok(LockTime::Time(Utc.timestamp(value as i64, 0)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn height_round_trips() {
        let locktime = LockTime::Height(Height(500_000));
        let mut bytes = Vec::new();
        locktime.bitcoin_serialize(&mut bytes).unwrap();
        let decoded = LockTime::bitcoin_deserialize(&bytes[..]).unwrap();
        assert_eq!(locktime, decoded);
    }

    #[test]
    fn time_round_trips() {
        let locktime = LockTime::Time(Utc.timestamp(1_600_000_000, 0));
        let mut bytes = Vec::new();
        locktime.bitcoin_serialize(&mut bytes).unwrap();
        let decoded = LockTime::bitcoin_deserialize(&bytes[..]).unwrap();
        assert_eq!(locktime, decoded);
    }

    #[test]
    fn threshold_selects_variant() {
        let just_below = LockTime::bitcoin_deserialize(
            &(LockTime::LOCKTIME_THRESHOLD - 1).to_le_bytes()[..],
        )
        .unwrap();
        assert!(matches!(just_below, LockTime::Height(_)));

        let at_threshold =
            LockTime::bitcoin_deserialize(&LockTime::LOCKTIME_THRESHOLD.to_le_bytes()[..])
                .unwrap();
        assert!(matches!(at_threshold, LockTime::Time(_)));
    }
}
