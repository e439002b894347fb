use thiserror::Error;

#[derive(Debug, Error)]
pub enum OrmError {
    #[error("database error: {source}")]
    Database {
        #[from]
        source: sqlx::Error,
    },

    #[error("expected exactly 1 affected row, got {actual}")]
    AffectedRows { actual: u64 },

    #[error("entity has no value for primary key `{name}`")]
    MissingPrimaryKey { name: &'static str },

    #[error("unsupported parameter value for `{sql}`")]
    UnsupportedValue { sql: String },
}
