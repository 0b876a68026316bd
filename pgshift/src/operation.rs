use serde::{Deserialize, Serialize};

use crate::error::{Result, ShiftError};

/// Column definition inside `create_table` / `add_column`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: String,
    #[serde(default)]
    pub pk: bool,
    #[serde(default = "default_nullable")]
    pub nullable: bool,
    #[serde(default)]
    pub unique: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
}

fn default_nullable() -> bool {
    true
}

impl Column {
    fn definition_sql(&self) -> String {
        let mut sql = format!("{} {}", quote_ident(&self.name), self.data_type);

        if self.pk {
            sql.push_str(" PRIMARY KEY");
        } else {
            if !self.nullable {
                sql.push_str(" NOT NULL");
            }
            if self.unique {
                sql.push_str(" UNIQUE");
            }
        }

        if let Some(default) = &self.default {
            sql.push_str(&format!(" DEFAULT {default}"));
        }

        sql
    }

    fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(ShiftError::InvalidMigration(
                "column name must not be empty".to_owned(),
            ));
        }

        if self.data_type.trim().is_empty() {
            return Err(ShiftError::InvalidMigration(format!(
                "column `{}` has no type",
                self.name
            )));
        }

        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateTable {
    pub name: String,
    pub columns: Vec<Column>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DropTable {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddColumn {
    pub table: String,
    pub column: Column,
    /// SQL expression used to backfill existing rows during the expand
    /// phase, e.g. `'unknown'` or `lower(email)`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub up: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DropColumn {
    pub table: String,
    pub column: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawSql {
    pub up: String,
    pub down: String,
}

/// One schema-change directive within a migration.
///
/// The wire format is externally tagged, so a request carries
/// `{"create_table": {...}}`, `{"add_column": {...}}` and so on. An unknown
/// tag fails deserialization and therefore never reaches an engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    CreateTable(CreateTable),
    DropTable(DropTable),
    AddColumn(AddColumn),
    DropColumn(DropColumn),
    RawSql(RawSql),
}

/// Pending batched backfill for a freshly added column.
#[derive(Debug, Clone, PartialEq)]
pub struct Backfill {
    pub table: String,
    pub column: String,
    pub expression: String,
}

impl Operation {
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::CreateTable(op) => {
                require_ident("table name", &op.name)?;

                if op.columns.is_empty() {
                    return Err(ShiftError::InvalidMigration(format!(
                        "table `{}` must have at least one column",
                        op.name
                    )));
                }

                let mut seen = std::collections::HashSet::new();
                for column in &op.columns {
                    column.validate()?;

                    if !seen.insert(column.name.as_str()) {
                        return Err(ShiftError::InvalidMigration(format!(
                            "duplicate column `{}` in table `{}`",
                            column.name, op.name
                        )));
                    }
                }

                Ok(())
            }
            Self::DropTable(op) => require_ident("table name", &op.name),
            Self::AddColumn(op) => {
                require_ident("table name", &op.table)?;
                op.column.validate()?;

                if op.column.pk {
                    return Err(ShiftError::InvalidMigration(format!(
                        "column `{}` cannot be added as a primary key",
                        op.column.name
                    )));
                }

                Ok(())
            }
            Self::DropColumn(op) => {
                require_ident("table name", &op.table)?;
                require_ident("column name", &op.column)
            }
            Self::RawSql(op) => {
                if op.up.trim().is_empty() {
                    return Err(ShiftError::InvalidMigration(
                        "raw_sql `up` must not be empty".to_owned(),
                    ));
                }
                if op.down.trim().is_empty() {
                    return Err(ShiftError::InvalidMigration(
                        "raw_sql `down` must not be empty".to_owned(),
                    ));
                }

                Ok(())
            }
        }
    }

    /// DDL applied when the migration starts. Contract-phase operations
    /// (`drop_table`, `drop_column`) change nothing here: the old objects
    /// stay in place and only disappear from the expand view.
    pub fn expand_sql(&self, schema: &str) -> Vec<String> {
        match self {
            Self::CreateTable(op) => {
                let columns = op
                    .columns
                    .iter()
                    .map(Column::definition_sql)
                    .collect::<Vec<_>>()
                    .join(", ");

                vec![format!(
                    "CREATE TABLE {}.{} ({columns})",
                    quote_ident(schema),
                    quote_ident(&op.name)
                )]
            }
            Self::AddColumn(op) => {
                // Added nullable and without a default; constraints land in
                // the contract phase, after the backfill has run.
                vec![format!(
                    "ALTER TABLE {}.{} ADD COLUMN {} {}",
                    quote_ident(schema),
                    quote_ident(&op.table),
                    quote_ident(&op.column.name),
                    op.column.data_type
                )]
            }
            Self::RawSql(op) => vec![op.up.clone()],
            Self::DropTable(_) | Self::DropColumn(_) => vec![],
        }
    }

    /// DDL applied when the migration completes.
    pub fn contract_sql(&self, schema: &str) -> Vec<String> {
        match self {
            Self::DropTable(op) => vec![format!(
                "DROP TABLE {}.{}",
                quote_ident(schema),
                quote_ident(&op.name)
            )],
            Self::DropColumn(op) => vec![format!(
                "ALTER TABLE {}.{} DROP COLUMN {}",
                quote_ident(schema),
                quote_ident(&op.table),
                quote_ident(&op.column)
            )],
            Self::AddColumn(op) => {
                let table = format!("{}.{}", quote_ident(schema), quote_ident(&op.table));
                let column = quote_ident(&op.column.name);
                let mut statements = Vec::new();

                if let Some(default) = &op.column.default {
                    statements.push(format!(
                        "ALTER TABLE {table} ALTER COLUMN {column} SET DEFAULT {default}"
                    ));
                }
                if !op.column.nullable {
                    statements.push(format!(
                        "ALTER TABLE {table} ALTER COLUMN {column} SET NOT NULL"
                    ));
                }
                if op.column.unique {
                    statements.push(format!("ALTER TABLE {table} ADD UNIQUE ({column})"));
                }

                statements
            }
            Self::CreateTable(_) | Self::RawSql(_) => vec![],
        }
    }

    /// DDL applied when the migration rolls back. Callers run these in
    /// reverse operation order.
    pub fn revert_sql(&self, schema: &str) -> Vec<String> {
        match self {
            Self::CreateTable(op) => vec![format!(
                "DROP TABLE IF EXISTS {}.{}",
                quote_ident(schema),
                quote_ident(&op.name)
            )],
            Self::AddColumn(op) => vec![format!(
                "ALTER TABLE {}.{} DROP COLUMN IF EXISTS {}",
                quote_ident(schema),
                quote_ident(&op.table),
                quote_ident(&op.column.name)
            )],
            Self::RawSql(op) => vec![op.down.clone()],
            Self::DropTable(_) | Self::DropColumn(_) => vec![],
        }
    }

    pub fn backfill(&self) -> Option<Backfill> {
        match self {
            Self::AddColumn(op) => op.up.as_ref().map(|expression| Backfill {
                table: op.table.clone(),
                column: op.column.name.clone(),
                expression: expression.clone(),
            }),
            _ => None,
        }
    }

    /// Table this operation touches, if any. Used to scope the expand view.
    pub fn table(&self) -> Option<&str> {
        match self {
            Self::CreateTable(op) => Some(&op.name),
            Self::DropTable(op) => Some(&op.name),
            Self::AddColumn(op) => Some(&op.table),
            Self::DropColumn(op) => Some(&op.table),
            Self::RawSql(_) => None,
        }
    }

    /// Table the expand view must hide entirely.
    pub fn drops_table(&self) -> Option<&str> {
        match self {
            Self::DropTable(op) => Some(&op.name),
            _ => None,
        }
    }

    /// Column the expand view must hide from its table.
    pub fn drops_column(&self) -> Option<(&str, &str)> {
        match self {
            Self::DropColumn(op) => Some((&op.table, &op.column)),
            _ => None,
        }
    }
}

pub(crate) fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

fn require_ident(what: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(ShiftError::InvalidMigration(format!(
            "{what} must not be empty"
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn create_foo() -> Operation {
        serde_json::from_value(json!({
            "create_table": {
                "name": "foo",
                "columns": [{"name": "id", "type": "serial", "pk": true}]
            }
        }))
        .unwrap()
    }

    #[test]
    fn create_table_expand_sql() {
        let op = create_foo();

        assert_eq!(
            op.expand_sql("public"),
            vec![r#"CREATE TABLE "public"."foo" ("id" serial PRIMARY KEY)"#]
        );
        assert!(op.contract_sql("public").is_empty());
        assert_eq!(
            op.revert_sql("public"),
            vec![r#"DROP TABLE IF EXISTS "public"."foo""#]
        );
    }

    #[test]
    fn add_column_phases() {
        let op: Operation = serde_json::from_value(json!({
            "add_column": {
                "table": "foo",
                "column": {"name": "bar", "type": "text", "nullable": false, "default": "'n/a'"},
                "up": "'n/a'"
            }
        }))
        .unwrap();

        assert_eq!(
            op.expand_sql("public"),
            vec![r#"ALTER TABLE "public"."foo" ADD COLUMN "bar" text"#]
        );
        assert_eq!(
            op.contract_sql("public"),
            vec![
                r#"ALTER TABLE "public"."foo" ALTER COLUMN "bar" SET DEFAULT 'n/a'"#,
                r#"ALTER TABLE "public"."foo" ALTER COLUMN "bar" SET NOT NULL"#,
            ]
        );
        assert_eq!(
            op.backfill(),
            Some(Backfill {
                table: "foo".to_owned(),
                column: "bar".to_owned(),
                expression: "'n/a'".to_owned(),
            })
        );
    }

    #[test]
    fn drop_table_is_contract_phase() {
        let op: Operation =
            serde_json::from_value(json!({"drop_table": {"name": "foo"}})).unwrap();

        assert!(op.expand_sql("public").is_empty());
        assert_eq!(op.contract_sql("public"), vec![r#"DROP TABLE "public"."foo""#]);
        assert!(op.revert_sql("public").is_empty());
        assert_eq!(op.drops_table(), Some("foo"));
    }

    #[test]
    fn raw_sql_round_trip() {
        let op: Operation = serde_json::from_value(json!({
            "raw_sql": {"up": "CREATE INDEX idx ON foo (id)", "down": "DROP INDEX idx"}
        }))
        .unwrap();

        assert_eq!(op.expand_sql("public"), vec!["CREATE INDEX idx ON foo (id)"]);
        assert_eq!(op.revert_sql("public"), vec!["DROP INDEX idx"]);
    }

    #[test]
    fn validation_rejects_duplicate_columns() {
        let op: Operation = serde_json::from_value(json!({
            "create_table": {
                "name": "foo",
                "columns": [
                    {"name": "id", "type": "serial"},
                    {"name": "id", "type": "text"}
                ]
            }
        }))
        .unwrap();

        assert!(matches!(
            op.validate().unwrap_err(),
            ShiftError::InvalidMigration(_)
        ));
    }

    #[test]
    fn validation_rejects_pk_add_column() {
        let op: Operation = serde_json::from_value(json!({
            "add_column": {
                "table": "foo",
                "column": {"name": "id2", "type": "serial", "pk": true}
            }
        }))
        .unwrap();

        assert!(matches!(
            op.validate().unwrap_err(),
            ShiftError::InvalidMigration(_)
        ));
    }

    #[test]
    fn quoting_escapes_embedded_quotes() {
        assert_eq!(quote_ident(r#"we"ird"#), r#""we""ird""#);
    }
}
