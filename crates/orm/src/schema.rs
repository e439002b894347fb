//! Entity schemas and the SQL pre-built from them.
//!
//! A [`Schema`] is constructed once per entity (held in a `Lazy` static) and
//! derives the parameterized SELECT/INSERT/UPDATE/DELETE statements from its
//! field list at construction time. Request handling never assembles column
//! lists again.

use crate::field::Field;

/// Table name plus ordered field descriptors, with the SQL statements the
/// mapper needs pre-built. Exactly one field must be the primary key.
pub struct Schema {
    table: &'static str,
    fields: Vec<Field>,
    primary_key: usize,
    select: String,
    select_by_id: String,
    insert: String,
    update_by_id: String,
    delete_by_id: String,
}

impl Schema {
    /// Builds the schema and its SQL.
    ///
    /// # Panics
    ///
    /// Panics unless exactly one field is flagged as the primary key. Schemas
    /// are declared at startup; a bad declaration is a programmer error.
    pub fn new(table: &'static str, fields: Vec<Field>) -> Self {
        let mut primary_keys = fields.iter().enumerate().filter(|(_, f)| f.is_primary_key());
        let primary_key = match (primary_keys.next(), primary_keys.next()) {
            (Some((index, _)), None) => index,
            (None, _) => panic!("schema `{table}` has no primary key"),
            (Some(_), Some(_)) => panic!("schema `{table}` has more than one primary key"),
        };

        let pk_name = fields[primary_key].name();
        let columns = fields.iter().map(|f| format!("`{}`", f.name())).collect::<Vec<_>>().join(", ");
        let placeholders = fields.iter().map(|_| "?").collect::<Vec<_>>().join(", ");
        let assignments = fields
            .iter()
            .filter(|f| !f.is_primary_key())
            .map(|f| format!("`{}` = ?", f.name()))
            .collect::<Vec<_>>()
            .join(", ");

        let select = format!("SELECT {columns} FROM `{table}`");
        let select_by_id = format!("{select} WHERE `{pk_name}` = ?");
        let insert = format!("INSERT INTO `{table}` ({columns}) VALUES ({placeholders})");
        let update_by_id = format!("UPDATE `{table}` SET {assignments} WHERE `{pk_name}` = ?");
        let delete_by_id = format!("DELETE FROM `{table}` WHERE `{pk_name}` = ?");

        Self { table, fields, primary_key, select, select_by_id, insert, update_by_id, delete_by_id }
    }

    pub fn table(&self) -> &'static str {
        self.table
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name() == name)
    }

    pub fn primary_key(&self) -> &Field {
        &self.fields[self.primary_key]
    }

    pub fn select_sql(&self) -> &str {
        &self.select
    }

    pub fn select_by_id_sql(&self) -> &str {
        &self.select_by_id
    }

    pub fn insert_sql(&self) -> &str {
        &self.insert
    }

    pub fn update_sql(&self) -> &str {
        &self.update_by_id
    }

    pub fn delete_sql(&self) -> &str {
        &self.delete_by_id
    }
}

impl std::fmt::Debug for Schema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Schema").field("table", &self.table).field("fields", &self.fields).finish()
    }
}
