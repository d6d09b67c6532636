//! Meridian Ledger: durable bookkeeping for credential provisioning
//!
//! # Overview
//!
//! The ledger holds three tables:
//!
//! - **nodes**: the registry of remote nodes (address, location, protocol, active flag)
//! - **assignments**: which user holds a credential on which node/protocol
//! - **pending_retries**: delete attempts that failed and await the cleanup sweep
//!
//! Every batch write runs in a single short transaction. Callers never hold a
//! transaction open across a network call; node calls and ledger writes are
//! sequenced, not coupled.
//!
//! # Example
//!
//! ```no_run
//! use meridian_ledger::{Ledger, Node, RetryFailure, RetryKey, SqliteLedger};
//!
//! # async fn example() -> meridian_ledger::Result<()> {
//! let ledger = SqliteLedger::open("meridian.db").await?;
//!
//! ledger.upsert_nodes(&[Node::new("10.0.0.5", "DE", "vless")]).await?;
//!
//! let key = RetryKey::new("user-1", "10.0.0.5", "vless");
//! ledger.record_pending_retry(&RetryFailure::new(key, "connection refused")).await?;
//!
//! assert_eq!(ledger.count_pending_retries().await?, 1);
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use std::collections::BTreeMap;

pub mod backends;
pub mod error;
pub mod models;

#[cfg(feature = "sqlite")]
pub use backends::sqlite::SqliteLedger;

pub use error::{LedgerError, Result};
pub use models::{
    Assignment, Node, NodeStats, NodeUserInfo, NodeUsers, PendingRetry, RetryFailure, RetryKey,
    UserDetail, UserNodeInfo,
};

/// Persistent store for nodes, assignments and pending retries
#[async_trait]
pub trait Ledger: Send + Sync {
    // ----- node registry -----

    /// Insert nodes, replacing attributes of any address already registered
    async fn upsert_nodes(&self, nodes: &[Node]) -> Result<()>;

    /// Update registered nodes by address; returns the number of rows touched
    async fn update_nodes(&self, nodes: &[Node]) -> Result<u64>;

    /// Delete nodes by address; returns the number of rows removed
    async fn delete_nodes(&self, addresses: &[String]) -> Result<u64>;

    /// All nodes in registration order, optionally only the active ones
    async fn list_nodes(&self, active_only: bool) -> Result<Vec<Node>>;

    async fn get_node(&self, address: &str) -> Result<Option<Node>>;

    // ----- assignments -----

    /// Insert a batch of assignments atomically.
    ///
    /// A row that already exists for the same (user, node, protocol) is
    /// refreshed instead of duplicated.
    async fn insert_assignments(&self, rows: &[Assignment]) -> Result<()>;

    async fn assignments_for_user(&self, user_id: &str) -> Result<Vec<Assignment>>;

    async fn delete_assignments_for_user(&self, user_id: &str) -> Result<u64>;

    /// Delete every assignment of `user_id` on `node`, whatever the protocol
    async fn delete_assignment(&self, user_id: &str, node: &str) -> Result<u64>;

    // ----- pending retries -----

    /// Record failures atomically.
    ///
    /// Each key is inserted with `attempts = 1`, or, when it already exists,
    /// has its attempt counter incremented and its error and timestamp
    /// overwritten in the same statement.
    async fn record_pending_retries(&self, failures: &[RetryFailure]) -> Result<()>;

    async fn record_pending_retry(&self, failure: &RetryFailure) -> Result<()> {
        self.record_pending_retries(std::slice::from_ref(failure))
            .await
    }

    /// Every pending retry, newest first
    async fn list_pending_retries(&self) -> Result<Vec<PendingRetry>>;

    /// Remove exactly one pending retry; returns rows removed (0 or 1)
    async fn remove_pending_retry(&self, key: &RetryKey) -> Result<u64>;

    /// Remove every pending retry for (user, node) across all protocols
    async fn remove_pending_retries_for(&self, user_id: &str, node: &str) -> Result<u64>;

    // ----- statistics -----

    async fn count_pending_retries(&self) -> Result<u64>;

    /// Number of distinct users holding at least one assignment
    async fn count_users(&self) -> Result<u64>;

    /// Assignment counts keyed by protocol
    async fn users_by_protocol(&self) -> Result<BTreeMap<String, u64>>;

    /// Registry nodes with their distinct user counts, active nodes first
    async fn node_stats(&self) -> Result<Vec<NodeStats>>;

    /// Users with their assignments, newest first, grouped by user
    async fn list_users(&self) -> Result<Vec<UserDetail>>;

    /// Registry nodes with their assigned users, grouped by node
    async fn list_nodes_with_users(&self) -> Result<Vec<NodeUsers>>;
}
