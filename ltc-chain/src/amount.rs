//! A validated monetary amount, denominated in satoshis (the smallest
//! indivisible unit of LTC).

use std::{convert::TryFrom, fmt, io, marker::PhantomData};

#[cfg(any(test, feature = "proptest-impl"))]
use proptest_derive::Arbitrary;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::serialization::{BitcoinDeserialize, BitcoinSerialize, SerializationError};

/// The number of satoshis in one whole coin.
pub const COIN: i64 = 100_000_000;

/// The maximum number of satoshis that can ever exist: 84 million LTC.
pub const MAX_MONEY: i64 = 84_000_000 * COIN;

/// Alias matching the error-type name callers reach for at the call site.
pub type Error = AmountError;

/// Marker type for amounts that must not be negative.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[cfg_attr(any(test, feature = "proptest-impl"), derive(Arbitrary))]
pub struct NonNegative;

/// Marker type for amounts that may be negative, used for balance deltas.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[cfg_attr(any(test, feature = "proptest-impl"), derive(Arbitrary))]
pub struct NegativeAllowed;

#[derive(Error, Clone, Debug, Eq, PartialEq)]
pub enum AmountError {
    #[error("amount {0} is outside the valid range for this constraint")]
    OutOfRange(i64),
}

/// A validated amount of satoshis, constrained by the `C` marker type.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[cfg_attr(any(test, feature = "proptest-impl"), derive(Arbitrary))]
pub struct Amount<C = NonNegative>(i64, PhantomData<C>);

impl<C> fmt::Debug for Amount<C> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_tuple("Amount").field(&self.0).finish()
    }
}

impl<C> fmt::Display for Amount<C> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Amount<NonNegative> {
    pub fn try_new(satoshis: i64) -> Result<Self, AmountError> {
        if (0..=MAX_MONEY).contains(&satoshis) {
            Ok(Amount(satoshis, PhantomData))
        } else {
            Err(AmountError::OutOfRange(satoshis))
        }
    }
}

impl Amount<NegativeAllowed> {
    pub fn try_new(satoshis: i64) -> Result<Self, AmountError> {
        if (-MAX_MONEY..=MAX_MONEY).contains(&satoshis) {
            Ok(Amount(satoshis, PhantomData))
        } else {
            Err(AmountError::OutOfRange(satoshis))
        }
    }
}

impl<C> Amount<C> {
    pub fn satoshis(self) -> i64 {
        self.0
    }
}

impl TryFrom<i64> for Amount<NonNegative> {
    type Error = AmountError;
    fn try_from(satoshis: i64) -> Result<Self, Self::Error> {
        Amount::<NonNegative>::try_new(satoshis)
    }
}

impl TryFrom<i64> for Amount<NegativeAllowed> {
    type Error = AmountError;
    fn try_from(satoshis: i64) -> Result<Self, Self::Error> {
        Amount::<NegativeAllowed>::try_new(satoshis)
    }
}

impl<C> BitcoinSerialize for Amount<C> {
    fn bitcoin_serialize<W: io::Write>(&self, mut writer: W) -> Result<(), io::Error> {
        writer.write_all(&self.0.to_le_bytes())
    }
}

impl BitcoinDeserialize for Amount<NonNegative> {
    fn bitcoin_deserialize<R: io::Read>(mut reader: R) -> Result<Self, SerializationError> {
        let satoshis = i64::bitcoin_deserialize(&mut reader)?;
        Amount::try_new(satoshis).map_err(|_| SerializationError::Parse("amount out of range"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_negative_nonnegative_amount() {
        assert!(Amount::<NonNegative>::try_new(-1).is_err());
    }

    #[test]
    fn rejects_amount_above_max_money() {
        assert!(Amount::<NonNegative>::try_new(MAX_MONEY + 1).is_err());
    }

    #[test]
    fn round_trips_through_wire() {
        let amount = Amount::<NonNegative>::try_new(5_000_000_000).unwrap();
        let mut bytes = Vec::new();
        amount.bitcoin_serialize(&mut bytes).unwrap();
        let decoded = Amount::<NonNegative>::bitcoin_deserialize(&bytes[..]).unwrap();
        assert_eq!(amount, decoded);
    }
}
