//!
//! The local transport between UIs and the daemon: JSON messages behind
//! a fixed-width decimal length prefix, an optional HMAC
//! challenge-response before anything else is accepted, and the one-shot
//! status-probe output format.

use std::io::{self, Read, Write};

use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::domain::state::{RenderedState, TagSummary};
use crate::types::{random_string, TOKEN_LEN};

const FRAME_LEN_DIGITS: usize = 10;

/// Messages a UI sends to the daemon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "msg", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Ask for a fresh render of one tag.
    RequestState { tag: String },
    /// Commit encoded commands to the daemon's replica log.
    PushCommands { cmds: Vec<String> },
    /// Answer an authentication challenge.
    AuthResponse { mac: String },
}

/// Messages the daemon sends to a UI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "msg", rename_all = "snake_case")]
pub enum ServerMessage {
    State { state: RenderedState },
    /// Advisory: something changed, re-request state.
    NewState,
    AuthChallenge { nonce: String },
    Authenticated,
}

/// Write one length-prefixed JSON frame.
pub fn write_frame<W: Write, T: Serialize>(writer: &mut W, message: &T) -> io::Result<()> {
    let payload = serde_json::to_vec(message)?;
    write!(writer, "{:0width$}", payload.len(), width = FRAME_LEN_DIGITS)?;
    writer.write_all(&payload)
}

/// Read one length-prefixed JSON frame.
pub fn read_frame<R: Read, T: for<'de> Deserialize<'de>>(reader: &mut R) -> io::Result<T> {
    let mut prefix = [0u8; FRAME_LEN_DIGITS];
    reader.read_exact(&mut prefix)?;
    let length: usize = std::str::from_utf8(&prefix)
        .ok()
        .and_then(|digits| digits.parse().ok())
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "bad frame length"))?;

    let mut payload = vec![0u8; length];
    reader.read_exact(&mut payload)?;
    Ok(serde_json::from_slice(&payload)?)
}

type HmacSha256 = Hmac<Sha256>;

/// A fresh challenge nonce.
pub fn auth_nonce() -> String {
    random_string(TOKEN_LEN)
}

/// The MAC a UI answers a challenge nonce with.
pub fn auth_mac(local_auth: &str, nonce: &str) -> String {
    let mut mac = HmacSha256::new_from_slice(local_auth.as_bytes())
        .expect("HMAC accepts keys of any length");
    mac.update(nonce.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Constant-time check of a challenge response.
pub fn verify_auth(local_auth: &str, nonce: &str, mac_hex: &str) -> bool {
    let Ok(presented) = hex::decode(mac_hex) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(local_auth.as_bytes()) else {
        return false;
    };
    mac.update(nonce.as_bytes());
    mac.verify_slice(&presented).is_ok()
}

/// Status-probe line: `tag:count` for every queried tag, space
/// separated, `tag:?` for names the daemon does not know.
pub fn format_tag_counts(tags: &[TagSummary], query: &[String]) -> String {
    query
        .iter()
        .map(|name| match tags.iter().find(|tag| &tag.name == name) {
            Some(tag) => format!("{}:{}", name, tag.count),
            None => format!("{}:?", name),
        })
        .collect::<Vec<_>>()
        .join(" ")
}
