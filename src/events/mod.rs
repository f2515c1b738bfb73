//! Audit trail: domain events on a broadcast bus, persisted by a background listener
//! into `activity_log` and the hash-chained `event_store`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use sqlx::SqlitePool;
use tokio::sync::broadcast;
use uuid::Uuid;

pub mod loggable;
pub use loggable::{Loggable, Severity};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainEvent<T> {
    pub id: Uuid,
    pub name: String,
    pub occurred_at: DateTime<Utc>,
    pub actor_id: Option<Uuid>,
    pub subject_id: Option<String>,
    pub payload: T,
}

impl<T> DomainEvent<T> {
    pub fn new(name: impl Into<String>, actor_id: Option<Uuid>, subject_id: Option<String>, payload: T) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            occurred_at: Utc::now(),
            actor_id,
            subject_id,
            payload,
        }
    }
}

pub type EventBus = broadcast::Sender<Value>;

pub fn init_event_bus() -> (EventBus, broadcast::Receiver<Value>) {
    broadcast::channel(1024)
}

/// Caller details attached to audit entries.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RequestContext {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
}

impl RequestContext {
    pub fn from_headers(headers: &axum::http::HeaderMap) -> Self {
        let ip = headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .map(|s| s.split(',').next().unwrap_or(s).trim().to_string())
            .or_else(|| {
                headers
                    .get("x-real-ip")
                    .and_then(|v| v.to_str().ok())
                    .map(String::from)
            });

        let user_agent = headers
            .get(axum::http::header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(String::from);

        Self { ip, user_agent }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityPayload {
    #[serde(rename = "new")]
    pub current: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<RequestContext>,
    pub severity: Severity,
}

pub fn log_activity<T: Loggable>(event_bus: &EventBus, action: &str, actor_id: Option<Uuid>, entity: &T) {
    log_activity_with_context(event_bus, action, actor_id, entity, None, None);
}

/// Publishes `<entity_type>.<action>` with the entity's current and previous state.
/// Send failures (no listener) are ignored.
pub fn log_activity_with_context<T: Loggable>(
    event_bus: &EventBus,
    action: &str,
    actor_id: Option<Uuid>,
    entity: &T,
    old_entity: Option<&T>,
    context: Option<RequestContext>,
) {
    let payload = ActivityPayload {
        current: redact(serde_json::to_value(entity).unwrap_or_default()),
        old: old_entity.map(|e| redact(serde_json::to_value(e).unwrap_or_default())),
        context,
        severity: entity.severity_for_action(action),
    };

    let event = DomainEvent::new(
        format!("{}.{}", T::entity_type(), action),
        actor_id,
        Some(entity.subject_id()),
        serde_json::to_value(&payload).unwrap_or_default(),
    );

    let _ = event_bus.send(serde_json::to_value(event).unwrap_or_default());
}

const REDACTED_FIELDS: [&str; 2] = ["password_hash", "temp_password"];

// Credentials never reach the audit tables.
fn redact(mut value: Value) -> Value {
    if let Some(object) = value.as_object_mut() {
        for field in REDACTED_FIELDS {
            object.remove(field);
        }
    }
    value
}

fn describe(name: &str) -> &'static str {
    match name {
        "staff_id.created" => "Staff id added",
        "staff_id.updated" => "Staff id updated",
        "staff_id.deleted" => "Staff id deleted",
        "staff_id.imported" => "Staff id imported",
        "user.registered" => "New user registered",
        "user.created" => "User created by administrator",
        "user.login" => "User logged in",
        "user.logout" => "User logged out",
        "user.disabled" => "User disabled",
        "user.enabled" => "User enabled",
        "user.deleted" => "User deleted",
        "user.password_reset" => "Password reset",
        "user.password_changed" => "Password changed",
        "user.scope_synced" => "User scope synced from staff record",
        "feature.created" => "Feature added",
        "feature.updated" => "Feature permissions updated",
        "feature.deleted" => "Feature removed",
        _ => "System event",
    }
}

/// Drains the bus until every sender is dropped.
pub async fn start_activity_listener(mut rx: broadcast::Receiver<Value>, pool: SqlitePool) {
    tracing::info!("activity listener started");
    loop {
        let event = match rx.recv().await {
            Ok(event) => event,
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "activity listener lagged");
                continue;
            }
            Err(broadcast::error::RecvError::Closed) => break,
        };

        if let Err(err) = persist_event(&pool, &event).await {
            tracing::error!(error = %err, "failed to persist activity event");
        }
    }
}

async fn persist_event(pool: &SqlitePool, event: &Value) -> Result<(), sqlx::Error> {
    let name = event.get("name").and_then(|v| v.as_str()).unwrap_or("unknown");
    let actor_id = event
        .get("actor_id")
        .and_then(|v| v.as_str())
        .and_then(|s| Uuid::parse_str(s).ok())
        .map(|id| id.to_string());
    let subject_id = event.get("subject_id").and_then(|v| v.as_str()).map(String::from);
    let occurred_at = event
        .get("occurred_at")
        .and_then(|v| v.as_str())
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(Utc::now);
    let severity = event
        .get("payload")
        .and_then(|p| p.get("severity"))
        .and_then(|s| s.as_str())
        .unwrap_or(Severity::Important.as_str());
    let payload = serde_json::to_string(event).unwrap_or_default();

    sqlx::query(
        r#"
        INSERT INTO activity_log (id, event_name, description, actor_id, subject_id, occurred_at, properties, severity)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(Uuid::new_v4().to_string())
    .bind(name)
    .bind(describe(name))
    .bind(&actor_id)
    .bind(&subject_id)
    .bind(occurred_at)
    .bind(&payload)
    .bind(severity)
    .execute(pool)
    .await?;

    let mut tx = pool.begin().await?;
    let prev_hash: Option<String> = sqlx::query_scalar("SELECT hash FROM event_store ORDER BY seq DESC LIMIT 1")
        .fetch_optional(&mut *tx)
        .await?;
    let hash = chain_hash(prev_hash.as_deref(), &payload);

    sqlx::query(
        r#"
        INSERT INTO event_store (id, event_name, occurred_at, actor_id, subject_id, payload, severity, prev_hash, hash)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(Uuid::new_v4().to_string())
    .bind(name)
    .bind(occurred_at)
    .bind(&actor_id)
    .bind(&subject_id)
    .bind(&payload)
    .bind(severity)
    .bind(&prev_hash)
    .bind(&hash)
    .execute(&mut *tx)
    .await?;
    tx.commit().await?;

    Ok(())
}

/// SHA-256 over the previous link's hash followed by the payload, hex encoded.
pub fn chain_hash(prev_hash: Option<&str>, payload: &str) -> String {
    let mut hasher = Sha256::new();
    if let Some(prev) = prev_hash {
        hasher.update(prev.as_bytes());
    }
    hasher.update(payload.as_bytes());
    hex::encode(hasher.finalize())
}

/// Walks `event_store` in insertion order and recomputes every link.
/// Returns the sequence number of the first broken link, if any.
pub async fn verify_chain(pool: &SqlitePool) -> Result<Option<i64>, sqlx::Error> {
    let rows: Vec<(i64, String, Option<String>, String)> =
        sqlx::query_as("SELECT seq, payload, prev_hash, hash FROM event_store ORDER BY seq ASC")
            .fetch_all(pool)
            .await?;

    let mut previous: Option<String> = None;
    for (seq, payload, prev_hash, hash) in rows {
        if prev_hash != previous || chain_hash(previous.as_deref(), &payload) != hash {
            return Ok(Some(seq));
        }
        previous = Some(hash);
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize)]
    struct Account {
        id: &'static str,
        password_hash: &'static str,
    }

    impl Loggable for Account {
        fn entity_type() -> &'static str {
            "user"
        }

        fn subject_id(&self) -> String {
            self.id.to_string()
        }
    }

    #[test]
    fn published_events_carry_name_and_drop_credentials() {
        let (bus, mut rx) = init_event_bus();
        let account = Account {
            id: "u1",
            password_hash: "secret",
        };
        log_activity(&bus, "deleted", None, &account);

        let event = rx.try_recv().unwrap();
        assert_eq!(event["name"], "user.deleted");
        assert_eq!(event["subject_id"], "u1");
        assert_eq!(event["payload"]["severity"], "critical");
        assert!(event["payload"]["new"].get("password_hash").is_none());
    }

    #[test]
    fn chain_hash_depends_on_previous_link() {
        let first = chain_hash(None, "a");
        assert_ne!(chain_hash(Some(&first), "b"), chain_hash(None, "b"));
        assert_eq!(first.len(), 64);
    }
}
