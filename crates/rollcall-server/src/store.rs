//! Postgres event store
//!
//! Tables are described in `schema.sql`. Column names for the per-category
//! URL and counter fields come from a fixed mapping, never from input.

use async_trait::async_trait;
use rollcall_core::{
    Attendee, AttendeeId, DocumentCategory, DocumentTemplate, EventId, EventRecord, EventStore,
    SelectionFilter, StoreError,
};
use serde_json::{Map, Value};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::types::Json;
use sqlx::{PgPool, Row};
use std::collections::BTreeMap;
use tracing::{debug, info, instrument};

use crate::config::DatabaseConfig;

/// DDL applied by [`PgEventStore::ensure_schema`]
pub const SCHEMA: &str = include_str!("schema.sql");

/// Per-attendee URL column for a category
#[must_use]
pub fn url_column(category: DocumentCategory) -> &'static str {
    match category {
        DocumentCategory::Invitation => "invitation_url",
        DocumentCategory::IdentityCard => "id_card_url",
    }
}

/// Event-level counter column for a category
#[must_use]
pub fn counter_column(category: DocumentCategory) -> &'static str {
    match category {
        DocumentCategory::Invitation => "invitations_generated",
        DocumentCategory::IdentityCard => "id_cards_generated",
    }
}

/// Selection query for eligible attendees; `$1` is the event id
#[must_use]
pub fn eligible_query(filter: &SelectionFilter) -> String {
    let mut sql = format!(
        "SELECT a.id, a.full_name, a.email, a.sub_group, a.secondary_id, a.attributes \
         FROM attendees a \
         JOIN attendee_events ae ON ae.attendee_id = a.id \
         WHERE ae.event_id = $1 AND ae.{} IS NULL",
        url_column(filter.category)
    );
    if filter.require_no_secondary_id {
        sql.push_str(" AND a.secondary_id IS NULL");
    }
    sql.push_str(" ORDER BY a.full_name, a.id");
    sql
}

/// Flatten a JSON attribute object into template strings
#[must_use]
pub fn attribute_strings(attributes: Map<String, Value>) -> BTreeMap<String, String> {
    attributes
        .into_iter()
        .filter_map(|(key, value)| match value {
            Value::Null => None,
            Value::String(s) => Some((key, s)),
            other => Some((key, other.to_string())),
        })
        .collect()
}

fn store_error(e: sqlx::Error) -> StoreError {
    match e {
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            StoreError::Unavailable(e.to_string())
        }
        sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) | sqlx::Error::ColumnNotFound(_) => {
            StoreError::Decode(e.to_string())
        }
        other => StoreError::Query(other.to_string()),
    }
}

fn attendee_from_row(row: &PgRow) -> Result<Attendee, sqlx::Error> {
    let attributes: Option<Json<Map<String, Value>>> = row.try_get("attributes")?;
    Ok(Attendee {
        id: AttendeeId::new(row.try_get::<String, _>("id")?),
        full_name: row.try_get("full_name")?,
        email: row.try_get("email")?,
        sub_group: row.try_get("sub_group")?,
        secondary_id: row.try_get("secondary_id")?,
        attributes: attributes
            .map(|Json(map)| attribute_strings(map))
            .unwrap_or_default(),
    })
}

/// `EventStore` over a Postgres pool
#[derive(Debug, Clone)]
pub struct PgEventStore {
    pool: PgPool,
}

impl PgEventStore {
    /// Connect a pool
    ///
    /// # Errors
    /// - `StoreError::Unavailable` if the database cannot be reached
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&config.url)
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        info!(max_connections = config.max_connections, "connected to event store");
        Ok(Self { pool })
    }

    /// Wrap an existing pool
    #[must_use]
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create missing tables
    ///
    /// # Errors
    /// - `StoreError::Query` if the DDL fails
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        sqlx::raw_sql(SCHEMA)
            .execute(&self.pool)
            .await
            .map_err(store_error)?;
        debug!("event store schema ensured");
        Ok(())
    }
}

#[async_trait]
impl EventStore for PgEventStore {
    #[instrument(skip(self), fields(event_id = %event))]
    async fn find_event(&self, event: &EventId) -> Result<Option<EventRecord>, StoreError> {
        let row = sqlx::query("SELECT id, name FROM events WHERE id = $1")
            .bind(event.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(store_error)?;

        row.map(|row| {
            Ok(EventRecord {
                id: EventId::new(row.try_get::<String, _>("id")?),
                name: row.try_get("name")?,
            })
        })
        .transpose()
        .map_err(store_error)
    }

    async fn find_template(
        &self,
        event: &EventId,
        category: DocumentCategory,
    ) -> Result<Option<DocumentTemplate>, StoreError> {
        let markup: Option<String> = sqlx::query_scalar(
            "SELECT markup FROM document_templates WHERE event_id = $1 AND category = $2",
        )
        .bind(event.as_str())
        .bind(category.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(store_error)?;

        Ok(markup.map(|markup| DocumentTemplate::new(category, markup)))
    }

    #[instrument(skip(self, filter), fields(event_id = %event, category = %filter.category))]
    async fn eligible_attendees(
        &self,
        event: &EventId,
        filter: &SelectionFilter,
    ) -> Result<Vec<Attendee>, StoreError> {
        let rows = sqlx::query(&eligible_query(filter))
            .bind(event.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(store_error)?;

        let attendees = rows
            .iter()
            .map(attendee_from_row)
            .collect::<Result<Vec<_>, _>>()
            .map_err(store_error)?;
        debug!(count = attendees.len(), "eligible attendees loaded");
        Ok(attendees)
    }

    async fn record_document_url(
        &self,
        event: &EventId,
        attendee: &AttendeeId,
        category: DocumentCategory,
        url: &str,
    ) -> Result<(), StoreError> {
        let sql = format!(
            "UPDATE attendee_events SET {} = $3 WHERE event_id = $1 AND attendee_id = $2",
            url_column(category)
        );
        let result = sqlx::query(&sql)
            .bind(event.as_str())
            .bind(attendee.as_str())
            .bind(url)
            .execute(&self.pool)
            .await
            .map_err(store_error)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Query(format!(
                "attendee {attendee} is not registered for event {event}"
            )));
        }
        Ok(())
    }

    async fn increment_generated(
        &self,
        event: &EventId,
        category: DocumentCategory,
        by: u64,
    ) -> Result<(), StoreError> {
        let by = i64::try_from(by)
            .map_err(|_| StoreError::Query(format!("increment {by} out of range")))?;
        let column = counter_column(category);
        let sql = format!("UPDATE events SET {column} = {column} + $2 WHERE id = $1");
        let result = sqlx::query(&sql)
            .bind(event.as_str())
            .bind(by)
            .execute(&self.pool)
            .await
            .map_err(store_error)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Query(format!("event {event} vanished")));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn eligible_query_excludes_generated_documents() {
        let sql = eligible_query(&SelectionFilter::missing(DocumentCategory::Invitation));
        assert!(sql.contains("ae.invitation_url IS NULL"));
        assert!(!sql.contains("secondary_id IS NULL"));
    }

    #[test]
    fn identity_card_query_requires_missing_secondary_id() {
        let filter = SelectionFilter::missing(DocumentCategory::IdentityCard).without_secondary_id();
        let sql = eligible_query(&filter);
        assert!(sql.contains("ae.id_card_url IS NULL"));
        assert!(sql.contains("a.secondary_id IS NULL"));
    }

    #[test]
    fn counters_map_to_event_columns() {
        assert_eq!(
            counter_column(DocumentCategory::Invitation),
            "invitations_generated"
        );
        assert_eq!(
            counter_column(DocumentCategory::IdentityCard),
            "id_cards_generated"
        );
    }

    #[test]
    fn schema_declares_every_mapped_column() {
        for category in DocumentCategory::ALL {
            assert!(SCHEMA.contains(url_column(category)));
            assert!(SCHEMA.contains(counter_column(category)));
        }
    }

    #[test]
    fn attributes_become_strings() {
        let map = json!({"table": 12, "diet": "vegan", "vip": true, "gone": null});
        let Value::Object(map) = map else {
            panic!("object expected")
        };
        let attrs = attribute_strings(map);
        assert_eq!(attrs.get("table").map(String::as_str), Some("12"));
        assert_eq!(attrs.get("diet").map(String::as_str), Some("vegan"));
        assert_eq!(attrs.get("vip").map(String::as_str), Some("true"));
        assert!(!attrs.contains_key("gone"));
    }
}
