use std::fmt;

#[cfg(any(test, feature = "proptest-impl"))]
use proptest_derive::Arbitrary;
use serde::{Deserialize, Serialize};

/// The height of a block above the genesis block (which is height 0).
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[cfg_attr(any(test, feature = "proptest-impl"), derive(Arbitrary))]
pub struct Height(pub u32);

impl Height {
    /// The height of the genesis block.
    pub const MIN: Height = Height(0);

    pub fn value(&self) -> u32 {
        self.0
    }

    /// Returns the height one below this one, or `None` at genesis.
    pub fn previous(&self) -> Option<Height> {
        self.0.checked_sub(1).map(Height)
    }

    /// Returns the height one above this one, or `None` on overflow.
    pub fn next(&self) -> Option<Height> {
        self.0.checked_add(1).map(Height)
    }
}

impl fmt::Display for Height {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for Height {
    fn from(h: u32) -> Self {
        Height(h)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn previous_and_next() {
        assert_eq!(Height::MIN.previous(), None);
        assert_eq!(Height(5).previous(), Some(Height(4)));
        assert_eq!(Height(5).next(), Some(Height(6)));
    }
}
