//!
//! Store maintenance behind the admin tooling: dumping a data directory
//! under one or more candidate keys, and re-encrypting a plaintext
//! command stream into a fresh replica log. Records never change in
//! place; re-encryption always produces a new replica id's file.

use crate::crypto::CommandCipher;
use crate::error::{CryptoError, ReplayError};
use crate::store::Store;
use crate::types::OffsetMap;

/// Decrypt every record in the store, oldest first, trying each key in
/// turn. Without `force` an undecryptable record fails the dump; with it
/// the record is logged and skipped.
pub fn dump(store: &Store, keys: &[[u8; 32]], force: bool) -> Result<Vec<String>, ReplayError> {
    let ciphers: Vec<CommandCipher> = keys.iter().map(CommandCipher::new).collect();

    let mut lines = Vec::new();
    for record in store.replay(&OffsetMap::new())? {
        let record = record?;
        let plaintext = ciphers
            .iter()
            .find_map(|cipher| cipher.decrypt(&record.line, &record.app_id, record.offset).ok());
        match plaintext {
            Some(line) => lines.push(line),
            None if force => {
                tracing::warn!(
                    app_id = %record.app_id,
                    offset = record.offset,
                    "skipping record no key authenticates"
                );
            }
            None => {
                return Err(ReplayError::Auth {
                    app_id: record.app_id,
                    offset: record.offset,
                })
            }
        }
    }
    Ok(lines)
}

/// Encrypt plaintext commands into consecutive records of a new log for
/// `app_id`, each bound to the offset it will occupy.
pub fn encrypt_stream<I, S>(
    cipher: &CommandCipher,
    app_id: &str,
    lines: I,
) -> Result<String, CryptoError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut log = String::new();
    for line in lines {
        let record = cipher.encrypt(line.as_ref().trim(), app_id, log.len() as u64)?;
        log.push_str(&record);
    }
    Ok(log)
}
