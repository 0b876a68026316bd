use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    error::{Result, ShiftError},
    operation::Operation,
};

/// Postgres truncates identifiers at 63 bytes, and the expand phase names
/// its view schema `{schema}_{name}`. Capping the name leaves room for the
/// schema prefix so the view schema never silently collides.
const MAX_NAME_LEN: usize = 55;

/// Wire form of a migration request: the name plus the untyped operations
/// payload, exactly as the caller posted it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawMigration {
    pub name: String,
    #[serde(default)]
    pub operations: Value,
}

/// A named, ordered, immutable sequence of schema-change operations.
///
/// Names are unique per schema and impose the total order used for history
/// tracking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Migration {
    pub name: String,
    pub operations: Vec<Operation>,
}

impl Migration {
    /// Parse and structurally validate a raw request. Every failure here is
    /// a client error: nothing has touched the database yet.
    pub fn parse(raw: RawMigration) -> Result<Self> {
        let name = raw.name.trim();

        if name.is_empty() {
            return Err(ShiftError::InvalidMigration(
                "migration name must not be empty".to_owned(),
            ));
        }

        if name.len() > MAX_NAME_LEN {
            return Err(ShiftError::InvalidMigration(format!(
                "migration name `{name}` is longer than {MAX_NAME_LEN} bytes"
            )));
        }

        if !name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(ShiftError::InvalidMigration(format!(
                "migration name `{name}` contains characters outside [a-zA-Z0-9_-]"
            )));
        }

        let operations: Vec<Operation> = serde_json::from_value(raw.operations)
            .map_err(|err| ShiftError::InvalidMigration(format!("operations: {err}")))?;

        if operations.is_empty() {
            return Err(ShiftError::InvalidMigration(
                "migration must contain at least one operation".to_owned(),
            ));
        }

        let migration = Self {
            name: name.to_owned(),
            operations,
        };

        migration.validate()?;

        Ok(migration)
    }

    pub fn validate(&self) -> Result<()> {
        for operation in &self.operations {
            operation.validate()?;
        }

        Ok(())
    }

    /// Operations payload in the form the state store persists.
    pub fn operations_value(&self) -> Result<Value> {
        Ok(serde_json::to_value(&self.operations)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(name: &str, operations: Value) -> RawMigration {
        RawMigration {
            name: name.to_owned(),
            operations,
        }
    }

    #[test]
    fn parses_create_table_request() {
        let migration = Migration::parse(raw(
            "0001_create_foo_table",
            json!([{
                "create_table": {
                    "name": "foo",
                    "columns": [{"name": "id", "type": "serial", "pk": true}]
                }
            }]),
        ))
        .unwrap();

        assert_eq!(migration.name, "0001_create_foo_table");
        assert_eq!(migration.operations.len(), 1);
    }

    #[test]
    fn rejects_empty_name() {
        let err = Migration::parse(raw("  ", json!([]))).unwrap_err();
        assert!(matches!(err, ShiftError::InvalidMigration(_)));
    }

    #[test]
    fn rejects_name_with_invalid_characters() {
        let err = Migration::parse(raw("0001;drop", json!([]))).unwrap_err();
        assert!(matches!(err, ShiftError::InvalidMigration(_)));
    }

    #[test]
    fn rejects_name_longer_than_identifier_budget() {
        let long = "0001_".to_owned() + &"x".repeat(MAX_NAME_LEN);
        let err = Migration::parse(raw(&long, json!([]))).unwrap_err();
        assert!(matches!(err, ShiftError::InvalidMigration(_)));

        let exact = "x".repeat(MAX_NAME_LEN);
        let migration = Migration::parse(raw(
            &exact,
            json!([{"raw_sql": {"up": "SELECT 1", "down": "SELECT 1"}}]),
        ))
        .unwrap();
        assert_eq!(migration.name.len(), MAX_NAME_LEN);
    }

    #[test]
    fn rejects_empty_operations() {
        let err = Migration::parse(raw("0001_noop", json!([]))).unwrap_err();
        assert!(matches!(err, ShiftError::InvalidMigration(_)));
    }

    #[test]
    fn rejects_unknown_operation_kind() {
        let err = Migration::parse(raw(
            "0001_bad",
            json!([{"transmogrify_table": {"name": "foo"}}]),
        ))
        .unwrap_err();

        assert!(matches!(err, ShiftError::InvalidMigration(_)));
    }

    #[test]
    fn missing_operations_field_is_invalid() {
        let err = Migration::parse(RawMigration {
            name: "0001_missing".to_owned(),
            operations: Value::Null,
        })
        .unwrap_err();

        assert!(matches!(err, ShiftError::InvalidMigration(_)));
    }
}
