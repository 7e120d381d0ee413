//! Constants for block subsidy and halving.

use ltc_chain::{amount::COIN, block::Height, parameters::SUBSIDY_HALVING_INTERVAL};

/// The largest block subsidy, paid before the first halving: 50 LTC.
pub const MAX_BLOCK_SUBSIDY: u64 = (50 * COIN) as u64;

pub const HALVING_INTERVAL: Height = Height(SUBSIDY_HALVING_INTERVAL);
