//!
//! The pull/push synchronization protocol. Both sides exchange offset
//! maps and raw byte ranges only; nothing on the wire is ever decrypted
//! or interpreted beyond shape checks.

use serde::{Deserialize, Serialize};

use crate::merge::SyncData;
use crate::types::{is_valid_app_id, OffsetMap};

pub mod client;
pub mod server;

pub use client::{Scheduler, SyncClient};
pub use server::router;

/// `POST .../pull` body: the client's view of every replica's length.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequest {
    pub offs: OffsetMap,
}

/// Pull response: the server's offsets plus everything the client lacks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullResponse {
    pub offs: OffsetMap,
    pub data: SyncData,
}

/// `POST .../push` body: everything the server lacks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushRequest {
    pub data: SyncData,
}

/// Shape checks past what deserialization already enforces: replica ids
/// are exactly two alphanumerics. Offsets are non-negative by type.
pub fn validate_offs(offs: &OffsetMap) -> bool {
    offs.keys().all(|app_id| is_valid_app_id(app_id))
}

/// Same for push payloads; byte strings must also be non-empty.
pub fn validate_data(data: &SyncData) -> bool {
    data.iter()
        .all(|(app_id, (_, bytes))| is_valid_app_id(app_id) && !bytes.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_pull(raw: &str) -> Option<PullRequest> {
        serde_json::from_str(raw)
            .ok()
            .filter(|request: &PullRequest| validate_offs(&request.offs))
    }

    fn parse_push(raw: &str) -> Option<PushRequest> {
        serde_json::from_str(raw)
            .ok()
            .filter(|request: &PushRequest| validate_data(&request.data))
    }

    #[test]
    fn test_parse_pull_good() {
        let request = parse_pull(r#"{"offs": {"00": 190582, "ab": 1, "Q8": 193491}}"#).unwrap();
        assert_eq!(request.offs.len(), 3);
        assert_eq!(request.offs["ab"], 1);

        assert!(parse_pull(r#"{"offs": {}}"#).is_some());
    }

    #[test]
    fn test_parse_pull_bad() {
        for raw in [
            r#"{}"#,
            r#"{"offs": 10}"#,
            r#"{"offs": {"foo": 1}}"#,
            r#"{"offs": {"ab": "100"}}"#,
            r#"{"offs": {"ab": -38}}"#,
        ] {
            assert!(parse_pull(raw).is_none(), "{}", raw);
        }
    }

    #[test]
    fn test_parse_push_good() {
        let request =
            parse_push(r#"{"data": {"ab": [102, "abc abc ..."], "Q8": [1024818, "foo"]}}"#)
                .unwrap();
        assert_eq!(request.data["ab"], (102, "abc abc ...".to_string()));
    }

    #[test]
    fn test_parse_push_bad() {
        for raw in [
            r#"{}"#,
            r#"{"data": 102}"#,
            r#"{"data": {"foo": [1, "abc"]}}"#,
            r#"{"data": {"Qa": 42}}"#,
            r#"{"data": {"Qa": [1]}}"#,
            r#"{"data": {"Qa": ["1", "2"]}}"#,
            r#"{"data": {"Qa": [1, 2]}}"#,
            r#"{"data": {"Qa": [1, ""]}}"#,
        ] {
            assert!(parse_push(raw).is_none(), "{}", raw);
        }
    }
}
