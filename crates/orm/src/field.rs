//! Column descriptors for mapped entities.
//!
//! A [`Field`] carries everything the mapper needs to know about one column:
//! its name, SQL type, key role and default. Defaults come in two flavors:
//! a static value used as-is, and a generator function invoked fresh on
//! every save (timestamps, generated identifiers).

use serde_json::Value;

/// The SQL type of a column, as far as the mapper cares about it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    VarChar(u16),
    Bool,
    Double,
    Text,
}

impl FieldType {
    /// Column definition fragment, e.g. `varchar(50)`.
    pub fn ddl(&self) -> String {
        match self {
            FieldType::VarChar(len) => format!("varchar({len})"),
            FieldType::Bool => "boolean".to_string(),
            FieldType::Double => "real".to_string(),
            FieldType::Text => "text".to_string(),
        }
    }
}

/// How an unset field resolves at save time.
#[derive(Debug)]
pub enum FieldDefault {
    None,
    Value(Value),
    Generated(fn() -> Value),
}

/// One column of a mapped entity. Immutable once the owning
/// [`Schema`](crate::Schema) has been constructed.
pub struct Field {
    name: &'static str,
    ty: FieldType,
    primary_key: bool,
    nullable: bool,
    default: FieldDefault,
}

impl Field {
    fn new(name: &'static str, ty: FieldType) -> Self {
        Self { name, ty, primary_key: false, nullable: false, default: FieldDefault::None }
    }

    pub fn varchar(name: &'static str, len: u16) -> Self {
        Self::new(name, FieldType::VarChar(len))
    }

    pub fn bool(name: &'static str) -> Self {
        Self::new(name, FieldType::Bool)
    }

    pub fn double(name: &'static str) -> Self {
        Self::new(name, FieldType::Double)
    }

    pub fn text(name: &'static str) -> Self {
        Self::new(name, FieldType::Text)
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// A static default, used as-is whenever the field is unset.
    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = FieldDefault::Value(value.into());
        self
    }

    /// A generated default, invoked fresh on each save and never cached.
    pub fn default_fn(mut self, f: fn() -> Value) -> Self {
        self.default = FieldDefault::Generated(f);
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn field_type(&self) -> FieldType {
        self.ty
    }

    pub fn is_primary_key(&self) -> bool {
        self.primary_key
    }

    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    /// The static default, if one is declared. Generated defaults are not
    /// visible here: they only materialize at save time.
    pub fn static_default(&self) -> Option<&Value> {
        match &self.default {
            FieldDefault::Value(value) => Some(value),
            _ => None,
        }
    }

    /// Resolves the declared default: clones a static value, invokes a
    /// generator. Returns `None` for fields without a default.
    pub fn resolve_default(&self) -> Option<Value> {
        match &self.default {
            FieldDefault::None => None,
            FieldDefault::Value(value) => Some(value.clone()),
            FieldDefault::Generated(f) => Some(f()),
        }
    }
}

impl std::fmt::Debug for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Field")
            .field("name", &self.name)
            .field("ddl", &self.ty.ddl())
            .field("primary_key", &self.primary_key)
            .field("nullable", &self.nullable)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn static_default_is_used_as_is() {
        let field = Field::varchar("image", 500).default_value("about:blank");
        assert_eq!(field.resolve_default(), Some(json!("about:blank")));
        assert_eq!(field.static_default(), Some(&json!("about:blank")));
    }

    #[test]
    fn generated_default_is_invoked_fresh() {
        fn counter() -> Value {
            use std::sync::atomic::{AtomicU64, Ordering};
            static NEXT: AtomicU64 = AtomicU64::new(0);
            Value::from(NEXT.fetch_add(1, Ordering::Relaxed))
        }

        let field = Field::varchar("id", 50).primary_key().default_fn(counter);
        let first = field.resolve_default();
        let second = field.resolve_default();
        assert_ne!(first, second);
        // generators never show up as a static default
        assert_eq!(field.static_default(), None);
    }

    #[test]
    fn ddl_fragments() {
        assert_eq!(Field::varchar("name", 50).field_type().ddl(), "varchar(50)");
        assert_eq!(Field::bool("admin").field_type().ddl(), "boolean");
        assert_eq!(Field::double("created_at").field_type().ddl(), "real");
        assert_eq!(Field::text("content").field_type().ddl(), "text");
    }
}
