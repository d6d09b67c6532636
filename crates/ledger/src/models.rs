//! Row types persisted by the ledger
//!
//! JSON field names follow the public API contract (`endpoint`,
//! `inboundType`, ...) while the Rust names follow the domain.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A registered remote node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub country_code: String,

    #[serde(default)]
    pub city_name: String,

    /// Optional human-readable label
    #[serde(rename = "extName", default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,

    /// Network address, unique across the registry
    #[serde(rename = "endpoint")]
    pub address: String,

    /// Protocol kind the node serves ("inbound type")
    #[serde(rename = "inboundType")]
    pub protocol: String,

    #[serde(default)]
    pub active: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl Node {
    pub fn new(address: impl Into<String>, country_code: impl Into<String>, protocol: impl Into<String>) -> Self {
        Self {
            country_code: country_code.into(),
            city_name: String::new(),
            label: None,
            address: address.into(),
            protocol: protocol.into(),
            active: true,
            created_at: None,
        }
    }

    pub fn with_city(mut self, city: impl Into<String>) -> Self {
        self.city_name = city.into();
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }
}

/// A user's provisioned credential on one node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
    pub user_id: String,
    #[serde(rename = "endpoint")]
    pub node: String,
    #[serde(rename = "inbound")]
    pub protocol: String,
    pub created_at: DateTime<Utc>,
}

/// Identity of a pending retry row
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryKey {
    pub user_id: String,
    #[serde(rename = "endpoint")]
    pub node: String,
    #[serde(rename = "inbound")]
    pub protocol: String,
}

impl RetryKey {
    pub fn new(user_id: impl Into<String>, node: impl Into<String>, protocol: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            node: node.into(),
            protocol: protocol.into(),
        }
    }
}

/// A failed delete to be recorded (or re-recorded) for retry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryFailure {
    pub key: RetryKey,
    pub error: String,
}

impl RetryFailure {
    pub fn new(key: RetryKey, error: impl Into<String>) -> Self {
        Self {
            key,
            error: error.into(),
        }
    }
}

/// A delete that failed at least once and awaits the cleanup sweep
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingRetry {
    #[serde(flatten)]
    pub key: RetryKey,
    pub attempts: u32,
    pub last_attempt: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    #[serde(rename = "errorMessage")]
    pub last_error: String,
}

/// Per-node statistics row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeStats {
    #[serde(rename = "endpoint")]
    pub address: String,
    pub country_code: String,
    pub city_name: String,
    #[serde(rename = "extName", default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(rename = "inboundType")]
    pub protocol: String,
    pub active: bool,
    pub users_count: u64,
}

/// One user with every node it is assigned to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDetail {
    pub user_id: String,
    pub nodes_count: usize,
    pub created_at: DateTime<Utc>,
    pub nodes: Vec<UserNodeInfo>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserNodeInfo {
    pub endpoint: String,
    pub country_code: String,
    pub city_name: String,
    pub inbound: String,
    pub created_at: DateTime<Utc>,
}

/// One node with every user assigned to it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeUsers {
    pub endpoint: String,
    pub country_code: String,
    pub city_name: String,
    pub inbound_type: String,
    pub active: bool,
    pub users_count: usize,
    pub users: Vec<NodeUserInfo>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeUserInfo {
    pub user_id: String,
    pub inbound: String,
    pub created_at: DateTime<Utc>,
}

/// Groups rows by key while keeping the order keys were first seen.
///
/// Groups live in a `Vec`; the map only stores each key's position, so
/// iteration order never depends on hashing.
#[derive(Debug)]
pub(crate) struct OrderedGroups<T> {
    groups: Vec<T>,
    index: HashMap<String, usize>,
}

impl<T> OrderedGroups<T> {
    pub(crate) fn new() -> Self {
        Self {
            groups: Vec::new(),
            index: HashMap::new(),
        }
    }

    pub(crate) fn entry(&mut self, key: &str, make: impl FnOnce() -> T) -> &mut T {
        let pos = match self.index.get(key) {
            Some(&pos) => pos,
            None => {
                self.groups.push(make());
                let pos = self.groups.len() - 1;
                self.index.insert(key.to_string(), pos);
                pos
            }
        };
        &mut self.groups[pos]
    }

    pub(crate) fn into_vec(self) -> Vec<T> {
        self.groups
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordered_groups_keep_first_seen_order() {
        let mut groups: OrderedGroups<(String, Vec<u32>)> = OrderedGroups::new();
        for (key, value) in [("b", 1), ("a", 2), ("b", 3), ("c", 4), ("a", 5)] {
            groups
                .entry(key, || (key.to_string(), Vec::new()))
                .1
                .push(value);
        }

        let out = groups.into_vec();
        let keys: Vec<&str> = out.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["b", "a", "c"]);
        assert_eq!(out[0].1, vec![1, 3]);
        assert_eq!(out[1].1, vec![2, 5]);
    }

    #[test]
    fn test_node_json_contract() {
        let json = r#"{"countryCode":"DE","cityName":"Berlin","endpoint":"10.0.0.1","inboundType":"vless","active":true}"#;
        let node: Node = serde_json::from_str(json).unwrap();
        assert_eq!(node.address, "10.0.0.1");
        assert_eq!(node.protocol, "vless");
        assert!(node.label.is_none());
        assert_eq!(serde_json::to_string(&node).unwrap(), json);
    }

    #[test]
    fn test_pending_retry_json_is_flat() {
        let row = PendingRetry {
            key: RetryKey::new("u1", "n1", "trojan"),
            attempts: 2,
            last_attempt: DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
            created_at: DateTime::from_timestamp(1_600_000_000, 0).unwrap(),
            last_error: "timeout".to_string(),
        };

        let value = serde_json::to_value(&row).unwrap();
        assert_eq!(value["userId"], "u1");
        assert_eq!(value["endpoint"], "n1");
        assert_eq!(value["inbound"], "trojan");
        assert_eq!(value["attempts"], 2);
        assert_eq!(value["errorMessage"], "timeout");
    }
}
