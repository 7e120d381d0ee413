//! The wire protocol: message types and their framing.

pub mod external;
