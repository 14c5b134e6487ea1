//! Calldata sniffing.
//!
//! Ethscription actions carry no schema: the shape of the raw calldata alone decides what a
//! transaction might be. [`sniff_input`] applies the calldata rules in their fixed precedence
//! order. Whether a batch candidate is accepted, and whether an opaque payload turns out to be a
//! contract interaction, is decided later against the ledger and the transaction receipt.

use crate::{HASH_ID_LEN, SVG_DATA_URI_PREFIX};
use alloy_primitives::B256;

/// The shape of a transaction's calldata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputShape {
    /// No calldata.
    Empty,
    /// A data URI creating a new ethscription. Holds the cleaned payload.
    Creation(String),
    /// A single ethscription id.
    DirectTransfer(B256),
    /// Several consecutive ethscription ids. Only accepted when the first one is known.
    BatchCandidate(Vec<B256>),
    /// Anything else.
    Opaque,
}

/// Decodes calldata as UTF-8 and removes every NUL character.
///
/// Invalid sequences are replaced rather than rejected, so the same bytes always clean to the
/// same string and therefore to the same content digest.
pub fn clean_payload(input: &[u8]) -> String {
    String::from_utf8_lossy(input).replace('\0', "")
}

/// Classifies raw calldata by shape.
pub fn sniff_input(input: &[u8]) -> InputShape {
    if input.is_empty() {
        return InputShape::Empty;
    }

    let cleaned = clean_payload(input);
    if cleaned.starts_with(SVG_DATA_URI_PREFIX) {
        return InputShape::Creation(cleaned);
    }

    match input.len() {
        HASH_ID_LEN => InputShape::DirectTransfer(B256::from_slice(input)),
        len if len % HASH_ID_LEN == 0 => InputShape::BatchCandidate(
            input.chunks_exact(HASH_ID_LEN).map(B256::from_slice).collect(),
        ),
        _ => InputShape::Opaque,
    }
}
