//! Small `Debug`/`Display` helpers shared across the chain types.

use std::fmt;

/// Wraps a `Display` value so it can be used where `Debug` is expected,
/// e.g. inside `f.debug_struct(..).field(..)` calls for hashes.
pub struct DisplayToDebug<T>(pub T);

impl<T: fmt::Display> fmt::Debug for DisplayToDebug<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}
