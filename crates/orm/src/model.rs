//! The entity trait and the model operations built on the pre-built SQL.
//!
//! Entities are key-value rows behind a typed wrapper: fields that were never
//! set resolve to their declared defaults on read, and `save` materializes
//! defaults (including generated identifiers and timestamps) before running
//! the INSERT. Every write demands exactly one affected row.

use std::time::{SystemTime, UNIX_EPOCH};

use serde_json::Value;
use uuid::Uuid;

use crate::db::{Database, Row};
use crate::error::OrmError;
use crate::schema::Schema;

/// Milliseconds-then-random identifier: 15 zero-padded digits of the current
/// millisecond timestamp, 32 hex characters of a v4 UUID, and a `000` tail.
/// Unique per call and roughly ordered by creation time.
pub fn next_id() -> String {
    let millis = SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_millis()).unwrap_or_default();
    format!("{millis:015}{}000", Uuid::new_v4().simple())
}

/// Current time as fractional seconds since the epoch, the representation the
/// `created_at` columns use.
pub fn now_timestamp() -> f64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs_f64()).unwrap_or_default()
}

/// A table-backed record type. Implementations supply the schema and the row
/// storage; reads, writes and the persistence operations are provided.
pub trait Entity: Sized + Send {
    fn schema() -> &'static Schema;

    fn from_row(row: Row) -> Self;

    fn row(&self) -> &Row;

    fn row_mut(&mut self) -> &mut Row;

    /// Reads a field, falling back to its declared static default without
    /// mutating the entity. Unset fields without a default read as null.
    fn get(&self, name: &str) -> Value {
        if let Some(value) = self.row().get(name) {
            return value.clone();
        }
        Self::schema()
            .field(name)
            .and_then(|field| field.static_default().cloned())
            .unwrap_or(Value::Null)
    }

    fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.row_mut().insert(name.into(), value.into());
    }

    /// The primary key value, null when unset.
    fn id(&self) -> Value {
        self.get(Self::schema().primary_key().name())
    }

    fn text(&self, name: &str) -> String {
        match self.get(name) {
            Value::String(s) => s,
            Value::Null => String::new(),
            other => other.to_string(),
        }
    }

    fn flag(&self, name: &str) -> bool {
        self.get(name).as_bool().unwrap_or(false)
    }

    fn number(&self, name: &str) -> f64 {
        self.get(name).as_f64().unwrap_or(0.0)
    }
}

fn ensure_single_row(affected: u64) -> Result<(), OrmError> {
    if affected == 1 {
        Ok(())
    } else {
        Err(OrmError::AffectedRows { actual: affected })
    }
}

fn primary_key_value<E: Entity>(entity: &E) -> Result<Value, OrmError> {
    let pk = E::schema().primary_key();
    match entity.row().get(pk.name()) {
        Some(value) if !value.is_null() => Ok(value.clone()),
        _ => Err(OrmError::MissingPrimaryKey { name: pk.name() }),
    }
}

/// Inserts the entity. Unset fields are resolved to their defaults first;
/// generated defaults (identifiers, timestamps) are invoked fresh and written
/// back into the entity so the caller sees what was stored.
pub async fn save<E, D>(db: &D, entity: &mut E) -> Result<(), OrmError>
where
    E: Entity,
    D: Database + ?Sized,
{
    let schema = E::schema();
    for field in schema.fields() {
        if !entity.row().contains_key(field.name()) {
            if let Some(value) = field.resolve_default() {
                entity.row_mut().insert(field.name().to_string(), value);
            }
        }
    }

    let params = schema.fields().iter().map(|field| entity.get(field.name())).collect();
    let affected = db.execute(schema.insert_sql(), params).await?;
    ensure_single_row(affected)
}

/// Updates every non-key column of the row identified by the primary key.
pub async fn update<E, D>(db: &D, entity: &E) -> Result<(), OrmError>
where
    E: Entity,
    D: Database + ?Sized,
{
    let schema = E::schema();
    let id = primary_key_value(entity)?;

    let mut params: Vec<Value> = schema
        .fields()
        .iter()
        .filter(|field| !field.is_primary_key())
        .map(|field| entity.get(field.name()))
        .collect();
    params.push(id);

    let affected = db.execute(schema.update_sql(), params).await?;
    ensure_single_row(affected)
}

/// Deletes the row identified by the primary key.
pub async fn remove<E, D>(db: &D, entity: &E) -> Result<(), OrmError>
where
    E: Entity,
    D: Database + ?Sized,
{
    let schema = E::schema();
    let id = primary_key_value(entity)?;
    let affected = db.execute(schema.delete_sql(), vec![id]).await?;
    ensure_single_row(affected)
}

pub async fn find_by_id<E, D>(db: &D, id: &str) -> Result<Option<E>, OrmError>
where
    E: Entity,
    D: Database + ?Sized,
{
    let schema = E::schema();
    let row = db.fetch_optional(schema, schema.select_by_id_sql(), vec![Value::from(id)]).await?;
    Ok(row.map(E::from_row))
}

pub async fn find_all<E, D>(db: &D) -> Result<Vec<E>, OrmError>
where
    E: Entity,
    D: Database + ?Sized,
{
    let schema = E::schema();
    let rows = db.fetch_all(schema, schema.select_sql(), Vec::new()).await?;
    Ok(rows.into_iter().map(E::from_row).collect())
}

/// Filtered select. `clause` is appended as a WHERE condition when non-empty,
/// `order_by` as an ORDER BY column list, and `limit` as an `OFFSET, COUNT`
/// pair. Not a query DSL: callers hold the clause strings next to the schema
/// they belong to.
pub async fn find_where<E, D>(
    db: &D,
    clause: &str,
    mut params: Vec<Value>,
    order_by: Option<&str>,
    limit: Option<(u64, u64)>,
) -> Result<Vec<E>, OrmError>
where
    E: Entity,
    D: Database + ?Sized,
{
    let schema = E::schema();
    let mut sql = schema.select_sql().to_string();
    if !clause.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(clause);
    }
    if let Some(order) = order_by {
        sql.push_str(" ORDER BY ");
        sql.push_str(order);
    }
    if let Some((offset, count)) = limit {
        sql.push_str(" LIMIT ?, ?");
        params.push(Value::from(offset));
        params.push(Value::from(count));
    }

    let rows = db.fetch_all(schema, &sql, params).await?;
    Ok(rows.into_iter().map(E::from_row).collect())
}

/// Row count for a (possibly filtered) table.
pub async fn count<E, D>(db: &D, clause: &str, params: Vec<Value>) -> Result<u64, OrmError>
where
    E: Entity,
    D: Database + ?Sized,
{
    let schema = E::schema();
    let mut sql = format!("SELECT COUNT(*) FROM `{}`", schema.table());
    if !clause.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(clause);
    }
    let total = db.fetch_scalar(&sql, params).await?;
    Ok(total.max(0) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MockDatabase;
    use crate::field::Field;
    use once_cell::sync::Lazy;
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    static NOTE_SCHEMA: Lazy<Schema> = Lazy::new(|| {
        Schema::new(
            "notes",
            vec![
                Field::varchar("id", 50).primary_key().default_fn(|| Value::from(next_id())),
                Field::varchar("title", 50),
                Field::varchar("image", 500).default_value("about:blank"),
                Field::bool("pinned"),
                Field::double("created_at").default_fn(|| Value::from(now_timestamp())),
            ],
        )
    });

    struct Note {
        row: Row,
    }

    impl Note {
        fn new() -> Self {
            Self { row: Row::new() }
        }
    }

    impl Entity for Note {
        fn schema() -> &'static Schema {
            &NOTE_SCHEMA
        }

        fn from_row(row: Row) -> Self {
            Self { row }
        }

        fn row(&self) -> &Row {
            &self.row
        }

        fn row_mut(&mut self) -> &mut Row {
            &mut self.row
        }
    }

    #[test]
    fn next_id_shape_and_uniqueness() {
        let a = next_id();
        let b = next_id();
        assert_eq!(a.len(), 50);
        assert_eq!(b.len(), 50);
        assert_ne!(a, b);
        assert!(a.ends_with("000"));
        // leading 15 chars are a zero-padded millisecond timestamp
        assert!(a[..15].chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn get_falls_back_without_mutating() {
        let note = Note::new();
        assert_eq!(note.get("image"), json!("about:blank"));
        assert_eq!(note.get("title"), Value::Null);
        assert!(note.row().is_empty());
    }

    #[tokio::test]
    async fn save_generates_primary_key_and_defaults() {
        let captured: Arc<Mutex<Vec<Value>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&captured);

        let mut db = MockDatabase::new();
        db.expect_execute()
            .withf(|sql, _| sql.starts_with("INSERT INTO `notes`"))
            .returning(move |_, params| {
                *sink.lock().unwrap() = params;
                Ok(1)
            });

        let mut note = Note::new();
        note.set("title", "hello");
        save(&db, &mut note).await.unwrap();

        let id = note.text("id");
        assert_eq!(id.len(), 50);
        assert_eq!(note.get("image"), json!("about:blank"));
        assert!(note.number("created_at") > 0.0);

        let params = captured.lock().unwrap();
        assert_eq!(params.len(), NOTE_SCHEMA.fields().len());
        assert_eq!(params[0], Value::from(id));
        assert_eq!(params[1], json!("hello"));
    }

    #[tokio::test]
    async fn generated_defaults_differ_between_saves() {
        let mut db = MockDatabase::new();
        db.expect_execute().returning(|_, _| Ok(1));

        let mut first = Note::new();
        let mut second = Note::new();
        save(&db, &mut first).await.unwrap();
        save(&db, &mut second).await.unwrap();

        assert_ne!(first.text("id"), second.text("id"));
    }

    #[tokio::test]
    async fn save_fails_unless_one_row_affected() {
        let mut db = MockDatabase::new();
        db.expect_execute().returning(|_, _| Ok(0));

        let mut note = Note::new();
        let err = save(&db, &mut note).await.unwrap_err();
        assert!(matches!(err, OrmError::AffectedRows { actual: 0 }));
    }

    #[tokio::test]
    async fn update_requires_primary_key() {
        let db = MockDatabase::new();
        let note = Note::new();
        let err = update(&db, &note).await.unwrap_err();
        assert!(matches!(err, OrmError::MissingPrimaryKey { name: "id" }));
    }

    #[tokio::test]
    async fn update_binds_primary_key_last() {
        let mut db = MockDatabase::new();
        db.expect_execute()
            .withf(|sql, params| {
                sql.starts_with("UPDATE `notes` SET") && params.last() == Some(&json!("note-1"))
            })
            .returning(|_, _| Ok(1));

        let mut note = Note::new();
        note.set("id", "note-1");
        note.set("title", "renamed");
        update(&db, &note).await.unwrap();
    }

    #[tokio::test]
    async fn remove_deletes_by_id() {
        let mut db = MockDatabase::new();
        db.expect_execute()
            .withf(|sql, params| {
                sql == "DELETE FROM `notes` WHERE `id` = ?" && *params == vec![json!("note-1")]
            })
            .returning(|_, _| Ok(1));

        let mut note = Note::new();
        note.set("id", "note-1");
        remove(&db, &note).await.unwrap();
    }

    #[tokio::test]
    async fn saved_entity_round_trips_through_find_by_id() {
        let stored: Arc<Mutex<Row>> = Arc::new(Mutex::new(Row::new()));

        let sink = Arc::clone(&stored);
        let mut db = MockDatabase::new();
        db.expect_execute().returning(move |_, params| {
            let mut row = Row::new();
            for (field, value) in NOTE_SCHEMA.fields().iter().zip(params) {
                row.insert(field.name().to_string(), value);
            }
            *sink.lock().unwrap() = row;
            Ok(1)
        });

        let source = Arc::clone(&stored);
        db.expect_fetch_optional()
            .withf(|_, sql, _| sql.ends_with("WHERE `id` = ?"))
            .returning(move |_, _, _| Ok(Some(source.lock().unwrap().clone())));

        let mut note = Note::new();
        note.set("title", "round trip");
        note.set("pinned", true);
        save(&db, &mut note).await.unwrap();

        let loaded: Note = find_by_id(&db, &note.text("id")).await.unwrap().unwrap();
        assert_eq!(loaded.row(), note.row());
        assert_eq!(loaded.get("image"), json!("about:blank"));
    }

    #[tokio::test]
    async fn find_where_appends_clause_order_and_limit() {
        let mut db = MockDatabase::new();
        db.expect_fetch_all()
            .withf(|_, sql, params| {
                sql == "SELECT `id`, `title`, `image`, `pinned`, `created_at` FROM `notes` \
                        WHERE `pinned` = ? ORDER BY `created_at` DESC LIMIT ?, ?"
                    && *params == vec![json!(true), json!(0), json!(10)]
            })
            .returning(|_, _, _| Ok(Vec::new()));

        let found: Vec<Note> =
            find_where(&db, "`pinned` = ?", vec![json!(true)], Some("`created_at` DESC"), Some((0, 10)))
                .await
                .unwrap();
        assert!(found.is_empty());
    }

    #[tokio::test]
    async fn count_uses_scalar_query() {
        let mut db = MockDatabase::new();
        db.expect_fetch_scalar()
            .withf(|sql, _| sql == "SELECT COUNT(*) FROM `notes`")
            .returning(|_, _| Ok(3));

        assert_eq!(count::<Note, _>(&db, "", Vec::new()).await.unwrap(), 3);
    }
}
