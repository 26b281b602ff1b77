//!
//! Error types for the log core, one enum per failure domain.

/// Failures of the record envelope codec. `Auth` is non-recoverable for
/// that record under the key and associated data it was tried with.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CryptoError {
    /// The authentication tag does not match the record, key and
    /// `(replica, offset)` pair.
    #[error("record failed authentication")]
    Auth,
    /// The record does not even have the `iv tag ciphertext` shape.
    #[error("malformed record: {0}")]
    Malformed(&'static str),
    /// The cipher refused to seal the plaintext.
    #[error("sealing record failed")]
    Seal,
}

/// Failures of the command grammar and the date parsers. During log
/// replay these indicate corruption and are fatal.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("empty command")]
    Empty,
    #[error("unknown command mnemonic {0:?}")]
    UnknownMnemonic(char),
    #[error("not enough arguments for command {0:?}")]
    NotEnoughArguments(char),
    #[error("duplicate key in order group")]
    DuplicateKey,
    #[error("unrecognized date format")]
    Date,
    #[error("invalid scheduled tag {0:?}")]
    ScheduledTag(String),
}

/// Failures of order-diff construction and application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum OrderError {
    #[error("duplicate key in diff group")]
    DuplicateKey,
    #[error("orders are not permutations of each other")]
    NotAPermutation,
}

/// Failures of the log store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    /// A log file violates the record framing; replay cannot continue.
    #[error("log {app_id:?} is corrupt at offset {offset}: {reason}")]
    Corrupt {
        app_id: String,
        offset: u64,
        reason: &'static str,
    },
}

/// Failures of the merge engine.
#[derive(Debug, thiserror::Error)]
pub enum MergeError {
    #[error(transparent)]
    Store(#[from] StoreError),
    /// The payload starts past our end-of-file for this replica; grafting
    /// it would commit bytes we cannot witness as a continuation of our
    /// own prefix.
    #[error("payload for {0:?} starts past local end-of-file")]
    Gap(String),
}

/// Failures while rebuilding the projection from the log, or while
/// committing commands to it.
#[derive(Debug, thiserror::Error)]
pub enum ReplayError {
    #[error(transparent)]
    Store(#[from] StoreError),
    /// A committed record fails authentication under its own
    /// `(replica, offset)`; the log is corrupt or the key is wrong.
    #[error("record {app_id}:{offset} cannot be authenticated")]
    Auth { app_id: String, offset: u64 },
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Crypto(#[from] CryptoError),
}

/// Failures of a client sync round.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// The remote advertised byte ranges we have no witness for.
    #[error("remote payload leaves a gap in the local log")]
    Gap,
    #[error("server returned HTTP status {0}")]
    Http(u16),
    #[error(transparent)]
    Network(#[from] reqwest::Error),
    #[error(transparent)]
    Store(#[from] StoreError),
    /// The leaky bucket is dry; the attempt is rescheduled.
    #[error("sync attempts are rate limited")]
    RateLimited,
}

impl From<MergeError> for SyncError {
    fn from(err: MergeError) -> Self {
        match err {
            MergeError::Store(err) => SyncError::Store(err),
            MergeError::Gap(_) => SyncError::Gap,
        }
    }
}

/// Failures while reading or minting configuration files.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("malformed config file: {0}")]
    Json(#[from] serde_json::Error),
}

/// A UI session or sync request presented no valid credentials.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("not authenticated")]
pub struct Unauthenticated;
