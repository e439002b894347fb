//! The database handle behind every model operation.
//!
//! [`Database`] is the seam between the mapper and the driver: model
//! operations speak pre-built SQL plus JSON-typed parameters, and the handle
//! turns those into sqlx calls against a MySQL pool. Tests mock the trait
//! instead of standing up a server.

use async_trait::async_trait;
use serde_json::Value;
use sqlx::mysql::{MySqlConnectOptions, MySqlPoolOptions, MySqlRow};
use sqlx::query::Query;
use sqlx::{MySql, MySqlPool, Row as _};
use tracing::debug;

use crate::error::OrmError;
use crate::field::FieldType;
use crate::schema::Schema;

/// One fetched row, keyed by field name.
pub type Row = serde_json::Map<String, Value>;

/// Connection settings for [`MySqlDb::connect`]. The pool bounds are explicit:
/// the pool is the only thing limiting concurrent database use.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct DbConfig {
    pub host: String,
    #[serde(default = "DbConfig::default_port")]
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
    #[serde(default = "DbConfig::default_min_connections")]
    pub min_connections: u32,
    #[serde(default = "DbConfig::default_max_connections")]
    pub max_connections: u32,
}

impl DbConfig {
    fn default_port() -> u16 {
        3306
    }

    fn default_min_connections() -> u32 {
        1
    }

    fn default_max_connections() -> u32 {
        10
    }
}

/// Executes parameterized SQL on behalf of the model operations.
#[cfg_attr(any(test, feature = "mocks"), mockall::automock)]
#[async_trait]
pub trait Database: Send + Sync {
    /// Runs a statement and returns the number of affected rows.
    async fn execute(&self, sql: &str, params: Vec<Value>) -> Result<u64, OrmError>;

    /// Runs a query and decodes every row through the schema's field types.
    async fn fetch_all(
        &self,
        schema: &'static Schema,
        sql: &str,
        params: Vec<Value>,
    ) -> Result<Vec<Row>, OrmError>;

    /// Runs a query expected to match at most one row.
    async fn fetch_optional(
        &self,
        schema: &'static Schema,
        sql: &str,
        params: Vec<Value>,
    ) -> Result<Option<Row>, OrmError>;

    /// Runs a scalar query, e.g. `SELECT COUNT(*) ...`.
    async fn fetch_scalar(&self, sql: &str, params: Vec<Value>) -> Result<i64, OrmError>;
}

/// The production handle: a bounded `sqlx` MySQL pool. Built once at startup,
/// shared by reference, closed on shutdown.
#[derive(Debug)]
pub struct MySqlDb {
    pool: MySqlPool,
}

impl MySqlDb {
    pub async fn connect(config: &DbConfig) -> Result<Self, OrmError> {
        let options = MySqlConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .username(&config.user)
            .password(&config.password)
            .database(&config.database);

        let pool = MySqlPoolOptions::new()
            .min_connections(config.min_connections)
            .max_connections(config.max_connections)
            .connect_with(options)
            .await?;

        Ok(Self { pool })
    }

    /// Waits for checked-out connections to be returned, then closes them.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn bind_value<'q>(
    query: Query<'q, MySql, sqlx::mysql::MySqlArguments>,
    value: &Value,
    sql: &str,
) -> Result<Query<'q, MySql, sqlx::mysql::MySqlArguments>, OrmError> {
    match value {
        Value::Null => Ok(query.bind(None::<String>)),
        Value::Bool(b) => Ok(query.bind(*b)),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(query.bind(i))
            } else if let Some(f) = n.as_f64() {
                Ok(query.bind(f))
            } else {
                Err(OrmError::UnsupportedValue { sql: sql.to_string() })
            }
        }
        Value::String(s) => Ok(query.bind(s.clone())),
        Value::Array(_) | Value::Object(_) => Err(OrmError::UnsupportedValue { sql: sql.to_string() }),
    }
}

fn decode_row(schema: &Schema, row: &MySqlRow) -> Result<Row, OrmError> {
    let mut decoded = Row::new();
    for field in schema.fields() {
        let name = field.name();
        let value = match field.field_type() {
            FieldType::VarChar(_) | FieldType::Text => {
                row.try_get::<Option<String>, _>(name)?.map(Value::from).unwrap_or(Value::Null)
            }
            FieldType::Bool => row.try_get::<Option<bool>, _>(name)?.map(Value::from).unwrap_or(Value::Null),
            FieldType::Double => row.try_get::<Option<f64>, _>(name)?.map(Value::from).unwrap_or(Value::Null),
        };
        decoded.insert(name.to_string(), value);
    }
    Ok(decoded)
}

#[async_trait]
impl Database for MySqlDb {
    async fn execute(&self, sql: &str, params: Vec<Value>) -> Result<u64, OrmError> {
        debug!(sql, params = params.len(), "execute");
        let mut query = sqlx::query(sql);
        for param in &params {
            query = bind_value(query, param, sql)?;
        }
        let result = query.execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    async fn fetch_all(
        &self,
        schema: &'static Schema,
        sql: &str,
        params: Vec<Value>,
    ) -> Result<Vec<Row>, OrmError> {
        debug!(sql, params = params.len(), "fetch_all");
        let mut query = sqlx::query(sql);
        for param in &params {
            query = bind_value(query, param, sql)?;
        }
        let rows = query.fetch_all(&self.pool).await?;
        rows.iter().map(|row| decode_row(schema, row)).collect()
    }

    async fn fetch_optional(
        &self,
        schema: &'static Schema,
        sql: &str,
        params: Vec<Value>,
    ) -> Result<Option<Row>, OrmError> {
        debug!(sql, params = params.len(), "fetch_optional");
        let mut query = sqlx::query(sql);
        for param in &params {
            query = bind_value(query, param, sql)?;
        }
        let row = query.fetch_optional(&self.pool).await?;
        row.as_ref().map(|row| decode_row(schema, row)).transpose()
    }

    async fn fetch_scalar(&self, sql: &str, params: Vec<Value>) -> Result<i64, OrmError> {
        debug!(sql, params = params.len(), "fetch_scalar");
        let mut query = sqlx::query(sql);
        for param in &params {
            query = bind_value(query, param, sql)?;
        }
        let row = query.fetch_one(&self.pool).await?;
        Ok(row.try_get::<i64, _>(0)?)
    }
}
