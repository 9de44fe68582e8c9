//! PostgreSQL object store
//!
//! Objects are kept as JSONB bodies in a single table keyed by
//! `(kind, namespace, name)`. Every write is announced with `pg_notify` on
//! [`EVENT_CHANNEL`], and each store listens on that channel, so watchers in
//! every process sharing the database see every write. Notifications sent
//! while a listener is reconnecting are lost; control loops resync
//! periodically to pick those up.

use async_trait::async_trait;
use chrono::Utc;
use gantry_core::domain::{Kind, Object, ObjectKey};
use sqlx::{
    PgPool,
    postgres::{PgListener, PgPoolOptions},
};
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, error, warn};

use crate::error::StoreError;
use crate::store::{EventType, ObjectStore, WatchEvent};

const EVENT_CAPACITY: usize = 1024;

/// Postgres notification channel carrying JSON-encoded [`WatchEvent`]s
pub const EVENT_CHANNEL: &str = "gantry_objects";

const LISTEN_RETRY_DELAY: Duration = Duration::from_secs(5);

pub async fn create_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(Duration::from_secs(5))
        .connect(database_url)
        .await
}

pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS objects (
            kind VARCHAR(64) NOT NULL,
            namespace VARCHAR(255) NOT NULL,
            name VARCHAR(255) NOT NULL,
            resource_version BIGINT NOT NULL,
            owner_kind VARCHAR(64),
            owner_name VARCHAR(255),
            body JSONB NOT NULL,
            created_at TIMESTAMPTZ NOT NULL,
            updated_at TIMESTAMPTZ NOT NULL,
            PRIMARY KEY (kind, namespace, name)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_objects_owner ON objects(namespace, owner_kind, owner_name)",
    )
    .execute(pool)
    .await?;

    tracing::info!("Database migrations completed successfully");
    Ok(())
}

#[derive(sqlx::FromRow)]
struct BodyRow {
    body: serde_json::Value,
}

#[derive(sqlx::FromRow)]
struct VersionRow {
    resource_version: i64,
}

pub struct PgStore {
    pool: PgPool,
    events: broadcast::Sender<WatchEvent>,
}

impl PgStore {
    /// Wraps the pool and starts forwarding database notifications to
    /// watchers. Must be called from within a Tokio runtime.
    pub fn new(pool: PgPool) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        tokio::spawn(forward_notifications(pool.clone(), events.clone()));
        Self { pool, events }
    }

    /// Connect and run migrations
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = create_pool(database_url).await?;
        run_migrations(&pool).await?;
        Ok(Self::new(pool))
    }

    /// Announces a committed write. The write already happened, so a failed
    /// notification is only logged.
    async fn notify(&self, object: &Object, event: EventType) {
        let payload = match serde_json::to_string(&WatchEvent::new(object, event)) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(key = %object.key(), "Failed to encode watch event: {}", e);
                return;
            }
        };

        if let Err(e) = sqlx::query("SELECT pg_notify($1, $2)")
            .bind(EVENT_CHANNEL)
            .bind(payload)
            .execute(&self.pool)
            .await
        {
            warn!(key = %object.key(), "Failed to publish watch event: {}", e);
        }
    }

    async fn current_version(&self, kind: Kind, key: &ObjectKey) -> Result<Option<u64>, StoreError> {
        let row = sqlx::query_as::<_, VersionRow>(
            "SELECT resource_version FROM objects WHERE kind = $1 AND namespace = $2 AND name = $3",
        )
        .bind(kind.as_str())
        .bind(&key.namespace)
        .bind(&key.name)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.resource_version as u64))
    }
}

#[async_trait]
impl ObjectStore for PgStore {
    async fn get(&self, kind: Kind, key: &ObjectKey) -> Result<Option<Object>, StoreError> {
        let row = sqlx::query_as::<_, BodyRow>(
            "SELECT body FROM objects WHERE kind = $1 AND namespace = $2 AND name = $3",
        )
        .bind(kind.as_str())
        .bind(&key.namespace)
        .bind(&key.name)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(serde_json::from_value(row.body)?)),
            None => Ok(None),
        }
    }

    async fn create(&self, mut object: Object) -> Result<Object, StoreError> {
        let kind = object.kind();
        let key = object.key();
        let now = Utc::now();

        let meta = object.meta_mut();
        meta.resource_version = 1;
        meta.created_at = Some(now);
        let owner = meta.owner.clone();
        let body = serde_json::to_value(&object)?;

        let result = sqlx::query(
            r#"
            INSERT INTO objects (kind, namespace, name, resource_version, owner_kind, owner_name, body, created_at, updated_at)
            VALUES ($1, $2, $3, 1, $4, $5, $6, $7, $7)
            ON CONFLICT (kind, namespace, name) DO NOTHING
            "#,
        )
        .bind(kind.as_str())
        .bind(&key.namespace)
        .bind(&key.name)
        .bind(owner.as_ref().map(|o| o.kind.as_str()))
        .bind(owner.as_ref().map(|o| o.name.clone()))
        .bind(body)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::AlreadyExists { kind, key });
        }

        self.notify(&object, EventType::Created).await;
        Ok(object)
    }

    async fn update(&self, mut object: Object) -> Result<Object, StoreError> {
        let kind = object.kind();
        let key = object.key();
        let expected = object.meta().resource_version;

        object.meta_mut().resource_version = expected + 1;
        let owner = object.meta().owner.clone();
        let body = serde_json::to_value(&object)?;

        let result = sqlx::query(
            r#"
            UPDATE objects
            SET resource_version = $4, owner_kind = $5, owner_name = $6, body = $7, updated_at = $8
            WHERE kind = $1 AND namespace = $2 AND name = $3 AND resource_version = $9
            "#,
        )
        .bind(kind.as_str())
        .bind(&key.namespace)
        .bind(&key.name)
        .bind((expected + 1) as i64)
        .bind(owner.as_ref().map(|o| o.kind.as_str()))
        .bind(owner.as_ref().map(|o| o.name.clone()))
        .bind(body)
        .bind(Utc::now())
        .bind(expected as i64)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return match self.current_version(kind, &key).await? {
                Some(actual) => Err(StoreError::Conflict {
                    kind,
                    key,
                    expected,
                    actual,
                }),
                None => Err(StoreError::NotFound { kind, key }),
            };
        }

        self.notify(&object, EventType::Updated).await;
        Ok(object)
    }

    async fn delete(&self, kind: Kind, key: &ObjectKey) -> Result<(), StoreError> {
        let row = sqlx::query_as::<_, BodyRow>(
            "DELETE FROM objects WHERE kind = $1 AND namespace = $2 AND name = $3 RETURNING body",
        )
        .bind(kind.as_str())
        .bind(&key.namespace)
        .bind(&key.name)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => {
                let object: Object = serde_json::from_value(row.body)?;
                self.notify(&object, EventType::Deleted).await;
                Ok(())
            }
            None => Err(StoreError::NotFound {
                kind,
                key: key.clone(),
            }),
        }
    }

    async fn list(&self, kind: Kind, namespace: Option<&str>) -> Result<Vec<Object>, StoreError> {
        let rows = sqlx::query_as::<_, BodyRow>(
            r#"
            SELECT body FROM objects
            WHERE kind = $1 AND ($2::TEXT IS NULL OR namespace = $2)
            ORDER BY namespace, name
            "#,
        )
        .bind(kind.as_str())
        .bind(namespace)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| serde_json::from_value(row.body).map_err(StoreError::from))
            .collect()
    }

    fn watch(&self) -> broadcast::Receiver<WatchEvent> {
        self.events.subscribe()
    }
}

/// Listens on [`EVENT_CHANNEL`] and rebroadcasts every event to local
/// watchers for the life of the process.
async fn forward_notifications(pool: PgPool, events: broadcast::Sender<WatchEvent>) {
    loop {
        if let Err(e) = listen(&pool, &events).await {
            error!("Watch event listener failed: {}", e);
            tokio::time::sleep(LISTEN_RETRY_DELAY).await;
        }
    }
}

async fn listen(pool: &PgPool, events: &broadcast::Sender<WatchEvent>) -> Result<(), sqlx::Error> {
    let mut listener = PgListener::connect_with(pool).await?;
    listener.listen(EVENT_CHANNEL).await?;
    debug!(channel = EVENT_CHANNEL, "Listening for watch events");

    loop {
        let notification = listener.recv().await?;
        match decode_event(notification.payload()) {
            // No receivers is normal between subscriptions
            Some(event) => {
                let _ = events.send(event);
            }
            None => warn!(
                payload = notification.payload(),
                "Ignoring malformed watch event"
            ),
        }
    }
}

fn decode_event(payload: &str) -> Option<WatchEvent> {
    serde_json::from_str(payload).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use gantry_core::domain::{ObjectMeta, Pipeline, PipelineSpec};
    use std::collections::BTreeMap;

    fn pipeline() -> Object {
        Object::from(Pipeline {
            metadata: ObjectMeta::new("default", "run").with_owner(Kind::WorkflowTemplate, "ci"),
            spec: PipelineSpec {
                template_name: "ci".to_string(),
                inputs: BTreeMap::new(),
            },
        })
    }

    #[test]
    fn test_event_survives_notification_payload() {
        let event = WatchEvent::new(&pipeline(), EventType::Updated);
        let payload = serde_json::to_string(&event).unwrap();

        let decoded = decode_event(&payload).unwrap();
        assert_eq!(decoded, event);
        assert_eq!(
            decoded.owner_key(),
            Some((Kind::WorkflowTemplate, ObjectKey::new("default", "ci")))
        );
    }

    #[test]
    fn test_malformed_payload_is_ignored() {
        assert!(decode_event("").is_none());
        assert!(decode_event(r#"{"kind":"Pipeline"}"#).is_none());
    }
}
