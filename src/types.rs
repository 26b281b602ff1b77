//!
//! Shared identifier types and helpers used throughout the crate.

use std::collections::BTreeMap;

use rand_core::{OsRng, RngCore};

/// Length of a replica (app) id: one per client installation, naming its
/// log file.
pub const APP_ID_LEN: usize = 2;

/// Length of an item id.
pub const ITEM_ID_LEN: usize = 3;

/// Length of the local and sync auth tokens.
pub const TOKEN_LEN: usize = 10;

/// Map from replica id to the byte length of that replica's log file.
/// An absent key reads as offset 0; equality against an earlier snapshot
/// detects "no change since last scan".
pub type OffsetMap = BTreeMap<String, u64>;

/// Offset recorded for `app_id`, defaulting to 0 for unknown replicas.
pub fn offset_of(offs: &OffsetMap, app_id: &str) -> u64 {
    offs.get(app_id).copied().unwrap_or(0)
}

fn is_ascii_alnum(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_alphanumeric())
}

pub fn is_valid_app_id(s: &str) -> bool {
    s.len() == APP_ID_LEN && is_ascii_alnum(s)
}

pub fn is_valid_token(s: &str) -> bool {
    s.len() == TOKEN_LEN && is_ascii_alnum(s)
}

const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

/// Random alphanumeric string from the OS entropy source. Used for item
/// ids, freshly minted app ids and the local auth token.
pub fn random_string(len: usize) -> String {
    (0..len)
        .map(|_| ALPHABET[OsRng.next_u32() as usize % ALPHABET.len()] as char)
        .collect()
}
