#![forbid(unsafe_code)]
#![deny(clippy::all)]

//!
//! gtd-core is the replicated core of a small GTD-style task keeper: an
//! append-only, end-to-end encrypted, multi-writer command log, the merge
//! protocol that reconciles logs between replicas, and the deterministic
//! projection user interfaces render from.
//!
//! Every replica owns exactly one log file under `data/` and replays the
//! union of all files to derive its state. Records bind their own replica
//! id and byte offset into the AEAD associated data, so bytes can be
//! copied between replicas verbatim but never relocated. Servers only
//! ever see ciphertext.

// Shared identifier types, offset maps, random strings.
pub mod types;

// The error taxonomy, one enum per failure domain.
pub mod error;

// On-disk layout: base dir, lock file, config files.
pub mod config;

// The record envelope codec (AES-256-GCM, time-bearing nonce).
pub mod crypto;

// Anchored-group order diffs and their application.
pub mod order;

// Scheduled tags, natural dates, the midnight render alarm.
pub mod dates;

// The command grammar and the projected state it folds into.
pub mod domain;

// Per-replica log files, advisory locks, merged replay.
pub mod store;

// Reconciliation of offset views between replicas.
pub mod merge;

// Leaky-bucket rate limiter guarding sync re-entry.
pub mod bucket;

// The state manager behind the daemon.
pub mod daemon;

// Store maintenance: dumping and re-encryption.
pub mod admin;

// Framed JSON protocol between UIs and the daemon.
pub mod proto;

// The pull/push synchronization protocol.
pub mod sync;

pub use crypto::{hash_password, CommandCipher};
pub use domain::command::Command;
pub use domain::state::{render, RenderedState, State};
pub use store::{LockFile, Store};
pub use types::OffsetMap;
