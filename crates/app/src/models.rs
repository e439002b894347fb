//! The persisted entities: users, blogs and comments.
//!
//! Each schema mirrors the external table definition: varchar-sized string
//! columns, boolean flags and fractional-second timestamps. Primary keys
//! default to a generated identifier and `created_at` to the current time,
//! both resolved fresh at save time.

use once_cell::sync::Lazy;
use serde_json::Value;
use weblog_orm::{next_id, now_timestamp, Entity, Field, Row, Schema};

fn generated_id() -> Value {
    Value::from(next_id())
}

fn timestamp() -> Value {
    Value::from(now_timestamp())
}

static USER_SCHEMA: Lazy<Schema> = Lazy::new(|| {
    Schema::new(
        "users",
        vec![
            Field::varchar("id", 50).primary_key().default_fn(generated_id),
            Field::varchar("email", 50),
            Field::varchar("passwd", 50),
            Field::bool("admin"),
            Field::varchar("name", 50),
            Field::varchar("image", 500),
            Field::double("created_at").default_fn(timestamp),
        ],
    )
});

static BLOG_SCHEMA: Lazy<Schema> = Lazy::new(|| {
    Schema::new(
        "blogs",
        vec![
            Field::varchar("id", 50).primary_key().default_fn(generated_id),
            Field::varchar("user_id", 50),
            Field::varchar("user_name", 50),
            Field::varchar("user_image", 500),
            Field::varchar("name", 50),
            Field::varchar("summary", 200),
            Field::text("content"),
            Field::double("created_at").default_fn(timestamp),
        ],
    )
});

static COMMENT_SCHEMA: Lazy<Schema> = Lazy::new(|| {
    Schema::new(
        "comments",
        vec![
            Field::varchar("id", 50).primary_key().default_fn(generated_id),
            Field::varchar("blog_id", 50),
            Field::varchar("user_id", 50),
            Field::varchar("user_name", 50),
            Field::varchar("user_image", 500),
            Field::text("content"),
            Field::double("created_at").default_fn(timestamp),
        ],
    )
});

macro_rules! entity {
    ($name:ident, $schema:ident) => {
        pub struct $name {
            row: Row,
        }

        impl $name {
            pub fn new() -> Self {
                Self { row: Row::new() }
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl Entity for $name {
            fn schema() -> &'static Schema {
                &$schema
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

        impl std::fmt::Debug for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.debug_struct(stringify!($name)).field("row", &self.row).finish()
            }
        }
    };
}

entity!(User, USER_SCHEMA);
entity!(Blog, BLOG_SCHEMA);
entity!(Comment, COMMENT_SCHEMA);

impl User {
    pub fn email(&self) -> String {
        self.text("email")
    }

    pub fn passwd(&self) -> String {
        self.text("passwd")
    }

    pub fn is_admin(&self) -> bool {
        self.flag("admin")
    }

    pub fn name(&self) -> String {
        self.text("name")
    }

    pub fn image(&self) -> String {
        self.text("image")
    }
}
