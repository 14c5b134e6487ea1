//! Protocol constants.

/// The data URI prefix that marks a transaction payload as an ethscription creation.
pub const SVG_DATA_URI_PREFIX: &str = "data:image/svg+xml,";

/// The byte length of an ethscription id (the creating transaction hash).
///
/// Transfer payloads are made of one or more consecutive segments of this length.
pub const HASH_ID_LEN: usize = 32;
