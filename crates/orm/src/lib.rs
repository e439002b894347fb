//! A minimal declarative mapper for the weblog application.
//!
//! Entities declare a table name and ordered field descriptors; the schema
//! pre-builds parameterized SELECT/INSERT/UPDATE/DELETE statements at
//! construction time, and the model operations run them through a bounded
//! MySQL pool. This is intentionally not a general ORM: lookups go by
//! primary key, full scans, or a caller-supplied WHERE clause, nothing more.

mod db;
mod error;
mod field;
mod model;
mod schema;

pub use db::{Database, DbConfig, MySqlDb, Row};
pub use error::OrmError;
pub use field::{Field, FieldDefault, FieldType};
pub use model::{count, find_all, find_by_id, find_where, next_id, now_timestamp, remove, save, update, Entity};
pub use schema::Schema;

#[cfg(any(test, feature = "mocks"))]
pub use db::MockDatabase;
