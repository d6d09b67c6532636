//! SQLite backend implementation
//!
//! Provides persistent storage using SQLite with WAL mode for concurrency.
//! Timestamps are stored as Unix epoch milliseconds.

use crate::error::{LedgerError, Result};
use crate::models::{
    Assignment, Node, NodeStats, NodeUserInfo, NodeUsers, OrderedGroups, PendingRetry,
    RetryFailure, RetryKey, UserDetail, UserNodeInfo,
};
use crate::Ledger;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteRow,
};
use sqlx::Row;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info};

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS nodes (
        address TEXT PRIMARY KEY NOT NULL,
        country_code TEXT NOT NULL,
        city_name TEXT NOT NULL DEFAULT '',
        label TEXT,
        protocol TEXT NOT NULL,
        active BOOLEAN NOT NULL DEFAULT 1,
        created_at INTEGER NOT NULL DEFAULT 0
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS assignments (
        user_id TEXT NOT NULL,
        node TEXT NOT NULL,
        protocol TEXT NOT NULL,
        created_at INTEGER NOT NULL DEFAULT 0,
        PRIMARY KEY (user_id, node, protocol)
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_assignments_node ON assignments (node)",
    r#"
    CREATE TABLE IF NOT EXISTS pending_retries (
        user_id TEXT NOT NULL,
        node TEXT NOT NULL,
        protocol TEXT NOT NULL,
        attempts INTEGER NOT NULL DEFAULT 1,
        last_attempt INTEGER NOT NULL DEFAULT 0,
        created_at INTEGER NOT NULL DEFAULT 0,
        last_error TEXT NOT NULL DEFAULT '',
        PRIMARY KEY (user_id, node, protocol)
    )
    "#,
];

/// SQLite-backed ledger
pub struct SqliteLedger {
    pool: SqlitePool,
}

impl SqliteLedger {
    /// Open or create a SQLite database at the specified path
    ///
    /// Creates the schema if it does not exist yet.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path.as_ref())
            .journal_mode(SqliteJournalMode::Wal)
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        let ledger = Self { pool };
        ledger.init_schema().await?;

        info!("Ledger opened at {}", path.as_ref().display());
        Ok(ledger)
    }

    async fn init_schema(&self) -> Result<()> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        debug!("Ledger schema initialized");
        Ok(())
    }
}

fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

fn from_millis(ms: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms)
        .ok_or_else(|| LedgerError::Corrupt(format!("timestamp out of range: {}", ms)))
}

fn row_to_node(row: &SqliteRow) -> Result<Node> {
    Ok(Node {
        address: row.try_get("address")?,
        country_code: row.try_get("country_code")?,
        city_name: row.try_get("city_name")?,
        label: row.try_get("label")?,
        protocol: row.try_get("protocol")?,
        active: row.try_get("active")?,
        created_at: Some(from_millis(row.try_get("created_at")?)?),
    })
}

fn row_to_assignment(row: &SqliteRow) -> Result<Assignment> {
    Ok(Assignment {
        user_id: row.try_get("user_id")?,
        node: row.try_get("node")?,
        protocol: row.try_get("protocol")?,
        created_at: from_millis(row.try_get("created_at")?)?,
    })
}

fn row_to_pending(row: &SqliteRow) -> Result<PendingRetry> {
    let attempts: i64 = row.try_get("attempts")?;
    Ok(PendingRetry {
        key: RetryKey {
            user_id: row.try_get("user_id")?,
            node: row.try_get("node")?,
            protocol: row.try_get("protocol")?,
        },
        attempts: u32::try_from(attempts)
            .map_err(|_| LedgerError::Corrupt(format!("attempt counter: {}", attempts)))?,
        last_attempt: from_millis(row.try_get("last_attempt")?)?,
        created_at: from_millis(row.try_get("created_at")?)?,
        last_error: row.try_get("last_error")?,
    })
}

#[async_trait]
impl Ledger for SqliteLedger {
    async fn upsert_nodes(&self, nodes: &[Node]) -> Result<()> {
        let now = now_millis();
        let mut tx = self.pool.begin().await?;

        for node in nodes {
            sqlx::query(
                "INSERT INTO nodes (address, country_code, city_name, label, protocol, active, created_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?)
                 ON CONFLICT (address) DO UPDATE SET
                     country_code = excluded.country_code,
                     city_name = excluded.city_name,
                     label = excluded.label,
                     protocol = excluded.protocol,
                     active = excluded.active",
            )
            .bind(&node.address)
            .bind(&node.country_code)
            .bind(&node.city_name)
            .bind(&node.label)
            .bind(&node.protocol)
            .bind(node.active)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        debug!("Upserted {} nodes", nodes.len());
        Ok(())
    }

    async fn update_nodes(&self, nodes: &[Node]) -> Result<u64> {
        let mut tx = self.pool.begin().await?;
        let mut touched = 0;

        for node in nodes {
            let result = sqlx::query(
                "UPDATE nodes
                 SET country_code = ?, city_name = ?, label = ?, protocol = ?, active = ?
                 WHERE address = ?",
            )
            .bind(&node.country_code)
            .bind(&node.city_name)
            .bind(&node.label)
            .bind(&node.protocol)
            .bind(node.active)
            .bind(&node.address)
            .execute(&mut *tx)
            .await?;
            touched += result.rows_affected();
        }

        tx.commit().await?;
        Ok(touched)
    }

    async fn delete_nodes(&self, addresses: &[String]) -> Result<u64> {
        let mut tx = self.pool.begin().await?;
        let mut removed = 0;

        for address in addresses {
            let result = sqlx::query("DELETE FROM nodes WHERE address = ?")
                .bind(address)
                .execute(&mut *tx)
                .await?;
            removed += result.rows_affected();
        }

        tx.commit().await?;
        Ok(removed)
    }

    async fn list_nodes(&self, active_only: bool) -> Result<Vec<Node>> {
        let sql = if active_only {
            "SELECT address, country_code, city_name, label, protocol, active, created_at
             FROM nodes WHERE active = 1 ORDER BY rowid ASC"
        } else {
            "SELECT address, country_code, city_name, label, protocol, active, created_at
             FROM nodes ORDER BY rowid ASC"
        };

        let rows = sqlx::query(sql).fetch_all(&self.pool).await?;
        rows.iter().map(row_to_node).collect()
    }

    async fn get_node(&self, address: &str) -> Result<Option<Node>> {
        let row = sqlx::query(
            "SELECT address, country_code, city_name, label, protocol, active, created_at
             FROM nodes WHERE address = ?",
        )
        .bind(address)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_node).transpose()
    }

    async fn insert_assignments(&self, rows: &[Assignment]) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        for row in rows {
            sqlx::query(
                "INSERT INTO assignments (user_id, node, protocol, created_at) VALUES (?, ?, ?, ?)
                 ON CONFLICT (user_id, node, protocol) DO UPDATE SET created_at = excluded.created_at",
            )
            .bind(&row.user_id)
            .bind(&row.node)
            .bind(&row.protocol)
            .bind(row.created_at.timestamp_millis())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn assignments_for_user(&self, user_id: &str) -> Result<Vec<Assignment>> {
        let rows = sqlx::query(
            "SELECT user_id, node, protocol, created_at FROM assignments
             WHERE user_id = ?
             ORDER BY created_at ASC, rowid ASC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_assignment).collect()
    }

    async fn delete_assignments_for_user(&self, user_id: &str) -> Result<u64> {
        let result = sqlx::query("DELETE FROM assignments WHERE user_id = ?")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn delete_assignment(&self, user_id: &str, node: &str) -> Result<u64> {
        let result = sqlx::query("DELETE FROM assignments WHERE user_id = ? AND node = ?")
            .bind(user_id)
            .bind(node)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn record_pending_retries(&self, failures: &[RetryFailure]) -> Result<()> {
        if failures.is_empty() {
            return Ok(());
        }

        let now = now_millis();
        let mut tx = self.pool.begin().await?;

        for failure in failures {
            sqlx::query(
                "INSERT INTO pending_retries (user_id, node, protocol, attempts, last_attempt, created_at, last_error)
                 VALUES (?, ?, ?, 1, ?, ?, ?)
                 ON CONFLICT (user_id, node, protocol) DO UPDATE SET
                     attempts = attempts + 1,
                     last_attempt = excluded.last_attempt,
                     last_error = excluded.last_error",
            )
            .bind(&failure.key.user_id)
            .bind(&failure.key.node)
            .bind(&failure.key.protocol)
            .bind(now)
            .bind(now)
            .bind(&failure.error)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        debug!("Recorded {} pending retries", failures.len());
        Ok(())
    }

    async fn list_pending_retries(&self) -> Result<Vec<PendingRetry>> {
        let rows = sqlx::query(
            "SELECT user_id, node, protocol, attempts, last_attempt, created_at, last_error
             FROM pending_retries
             ORDER BY created_at DESC, rowid DESC",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_pending).collect()
    }

    async fn remove_pending_retry(&self, key: &RetryKey) -> Result<u64> {
        let result = sqlx::query(
            "DELETE FROM pending_retries WHERE user_id = ? AND node = ? AND protocol = ?",
        )
        .bind(&key.user_id)
        .bind(&key.node)
        .bind(&key.protocol)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn remove_pending_retries_for(&self, user_id: &str, node: &str) -> Result<u64> {
        let result = sqlx::query("DELETE FROM pending_retries WHERE user_id = ? AND node = ?")
            .bind(user_id)
            .bind(node)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn count_pending_retries(&self) -> Result<u64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM pending_retries")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }

    async fn count_users(&self) -> Result<u64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(DISTINCT user_id) FROM assignments")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }

    async fn users_by_protocol(&self) -> Result<BTreeMap<String, u64>> {
        let rows = sqlx::query(
            "SELECT protocol, COUNT(*) AS count FROM assignments GROUP BY protocol",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut counts = BTreeMap::new();
        for row in rows {
            let protocol: String = row.try_get("protocol")?;
            let count: i64 = row.try_get("count")?;
            counts.insert(protocol, count as u64);
        }
        Ok(counts)
    }

    async fn node_stats(&self) -> Result<Vec<NodeStats>> {
        let rows = sqlx::query(
            "SELECT
                n.address, n.country_code, n.city_name, n.label, n.protocol, n.active,
                COUNT(DISTINCT a.user_id) AS users_count
             FROM nodes n
             LEFT JOIN assignments a ON n.address = a.node
             GROUP BY n.address, n.country_code, n.city_name, n.label, n.protocol, n.active
             ORDER BY n.active DESC, users_count DESC, n.address ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(NodeStats {
                    address: row.try_get("address")?,
                    country_code: row.try_get("country_code")?,
                    city_name: row.try_get("city_name")?,
                    label: row.try_get("label")?,
                    protocol: row.try_get("protocol")?,
                    active: row.try_get("active")?,
                    users_count: row.try_get::<i64, _>("users_count")? as u64,
                })
            })
            .collect()
    }

    async fn list_users(&self) -> Result<Vec<UserDetail>> {
        let rows = sqlx::query(
            "SELECT a.user_id, a.node, n.country_code, n.city_name, a.protocol, a.created_at
             FROM assignments a
             LEFT JOIN nodes n ON a.node = n.address
             ORDER BY a.created_at DESC, a.rowid DESC",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut users: OrderedGroups<UserDetail> = OrderedGroups::new();
        for row in &rows {
            let user_id: String = row.try_get("user_id")?;
            let created_at = from_millis(row.try_get("created_at")?)?;

            let user = users.entry(&user_id, || UserDetail {
                user_id: user_id.clone(),
                nodes_count: 0,
                created_at,
                nodes: Vec::new(),
            });

            user.nodes.push(UserNodeInfo {
                endpoint: row.try_get("node")?,
                country_code: row
                    .try_get::<Option<String>, _>("country_code")?
                    .unwrap_or_default(),
                city_name: row
                    .try_get::<Option<String>, _>("city_name")?
                    .unwrap_or_default(),
                inbound: row.try_get("protocol")?,
                created_at,
            });
            user.nodes_count += 1;
        }

        Ok(users.into_vec())
    }

    async fn list_nodes_with_users(&self) -> Result<Vec<NodeUsers>> {
        let rows = sqlx::query(
            "SELECT n.address, n.country_code, n.city_name, n.protocol AS inbound_type, n.active,
                    a.user_id, a.protocol, a.created_at
             FROM nodes n
             LEFT JOIN assignments a ON n.address = a.node
             ORDER BY n.country_code ASC, n.city_name ASC, n.address ASC, a.created_at DESC",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut nodes: OrderedGroups<NodeUsers> = OrderedGroups::new();
        for row in &rows {
            let address: String = row.try_get("address")?;
            let country_code: String = row.try_get("country_code")?;
            let city_name: String = row.try_get("city_name")?;
            let inbound_type: String = row.try_get("inbound_type")?;
            let active: bool = row.try_get("active")?;

            let node = nodes.entry(&address, || NodeUsers {
                endpoint: address.clone(),
                country_code,
                city_name,
                inbound_type,
                active,
                users_count: 0,
                users: Vec::new(),
            });

            if let Some(user_id) = row.try_get::<Option<String>, _>("user_id")? {
                let created_at: i64 = row.try_get("created_at")?;
                node.users.push(NodeUserInfo {
                    user_id,
                    inbound: row.try_get("protocol")?,
                    created_at: from_millis(created_at)?,
                });
                node.users_count += 1;
            }
        }

        Ok(nodes.into_vec())
    }
}
