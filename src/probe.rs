//! Schema Probe.
//!
//! Deployed tables are not guaranteed to match what this crate expects:
//! migrations have not always run, and the list column has been created as
//! an array, as JSON and as plain text in different places. The probe looks
//! at the catalog, heals what it can, and reports what it found.

use std::collections::{BTreeSet, HashMap};
use std::sync::{PoisonError, RwLock};

use diesel::prelude::*;
use diesel::sql_types::Text;

use crate::canonical::list::ListEncoding;
use crate::records::{Column, ColumnKind, TableDef};
use crate::strategy::raw::quote_identifier;

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum ListColumnType {
    NativeArray,
    Json,
    DelimitedText,
    Unknown,
}

impl ListColumnType {
    pub fn classify(declared_type: &str) -> Self {
        let declared = declared_type.trim().to_ascii_uppercase();
        if declared.contains("[]") || declared.contains("ARRAY") {
            ListColumnType::NativeArray
        } else if declared.contains("JSON") {
            ListColumnType::Json
        } else if declared.is_empty()
            || ["TEXT", "CHAR", "CLOB"].iter().any(|t| declared.contains(t))
        {
            ListColumnType::DelimitedText
        } else {
            ListColumnType::Unknown
        }
    }

    /// The encoding a writer that trusts this probe result should use.
    pub fn encoding(self) -> ListEncoding {
        match self {
            ListColumnType::NativeArray => ListEncoding::NativeArray,
            ListColumnType::DelimitedText => ListEncoding::Delimited,
            ListColumnType::Json | ListColumnType::Unknown => ListEncoding::Json,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct SchemaInfo {
    pub table: &'static str,
    pub exists: bool,
    pub list_column_type: ListColumnType,
    pub columns: BTreeSet<String>,
}

impl SchemaInfo {
    fn missing(table: &'static str) -> Self {
        Self {
            table,
            exists: false,
            list_column_type: ListColumnType::Unknown,
            columns: BTreeSet::new(),
        }
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.contains(name)
    }
}

#[derive(QueryableByName, Debug)]
struct ColumnInfo {
    #[diesel(sql_type = Text)]
    name: String,
    #[diesel(sql_type = Text)]
    declared_type: String,
}

fn load_columns(
    conn: &mut SqliteConnection,
    table: &str,
) -> QueryResult<Vec<ColumnInfo>> {
    diesel::sql_query(
        "SELECT name, type AS declared_type FROM pragma_table_info(?)",
    )
    .bind::<Text, _>(table)
    .load::<ColumnInfo>(conn)
}

fn column_ddl(column: &Column) -> String {
    let name = quote_identifier(column.name);
    match column.kind {
        ColumnKind::Id => format!("{name} INTEGER PRIMARY KEY AUTOINCREMENT"),
        ColumnKind::Key => format!("{name} INTEGER NOT NULL"),
        ColumnKind::Flag => format!("{name} BOOLEAN NOT NULL DEFAULT 0"),
        ColumnKind::Choice | ColumnKind::Image => format!("{name} TEXT"),
        // SQLite has no array type; the check keeps the column to array
        // literals.
        ColumnKind::List => format!(
            "{name} TEXT ARRAY NOT NULL DEFAULT '{{}}' CHECK ({name} LIKE '{{%}}')"
        ),
        ColumnKind::Number => format!("{name} DOUBLE"),
        ColumnKind::Text => format!("{name} TEXT NOT NULL DEFAULT ''"),
        ColumnKind::Timestamp => {
            format!("{name} TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP")
        }
    }
}

/// `ALTER TABLE ... ADD COLUMN` cannot add primary keys or non-constant
/// defaults, so healed columns are looser than created ones.
fn heal_ddl(column: &Column) -> Option<String> {
    let name = quote_identifier(column.name);
    let ty = match column.kind {
        ColumnKind::Id => return None,
        ColumnKind::Key => "INTEGER",
        ColumnKind::Flag => "BOOLEAN NOT NULL DEFAULT 0",
        ColumnKind::Choice | ColumnKind::Image => "TEXT",
        ColumnKind::List => "TEXT ARRAY DEFAULT '{}'",
        ColumnKind::Number => "DOUBLE",
        ColumnKind::Text => "TEXT DEFAULT ''",
        ColumnKind::Timestamp => "TIMESTAMP",
    };
    Some(format!("{name} {ty}"))
}

fn unique_key_ddl(table: &TableDef) -> String {
    let keys = table
        .key_columns()
        .map(|column| quote_identifier(column.name))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "CREATE UNIQUE INDEX IF NOT EXISTS {} ON {} ({keys})",
        quote_identifier(&format!("{}_natural_key", table.name)),
        quote_identifier(table.name),
    )
}

pub fn default_table_ddl(table: &TableDef) -> String {
    let columns = table
        .columns
        .iter()
        .map(column_ddl)
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "CREATE TABLE IF NOT EXISTS {} ({columns})",
        quote_identifier(table.name)
    )
}

fn create_table(
    conn: &mut SqliteConnection,
    table: &TableDef,
) -> QueryResult<()> {
    diesel::sql_query(default_table_ddl(table)).execute(conn)?;
    diesel::sql_query(unique_key_ddl(table)).execute(conn)?;
    Ok(())
}

/// Adds whatever known columns are missing. Each step is best-effort.
fn heal_table(
    conn: &mut SqliteConnection,
    table: &TableDef,
    present: &BTreeSet<String>,
) {
    for column in table.columns {
        if present.contains(column.name) {
            continue;
        }
        let Some(ddl) = heal_ddl(column) else {
            tracing::warn!(
                table = table.name,
                column = column.name,
                "column is missing and cannot be added; using rowid"
            );
            continue;
        };
        let sql = format!(
            "ALTER TABLE {} ADD COLUMN {ddl}",
            quote_identifier(table.name)
        );
        match diesel::sql_query(sql).execute(conn) {
            Ok(_) => tracing::info!(
                table = table.name,
                column = column.name,
                "added missing column"
            ),
            Err(error) => tracing::warn!(
                table = table.name,
                column = column.name,
                %error,
                "could not add missing column"
            ),
        }
    }

    if let Err(error) = diesel::sql_query(unique_key_ddl(table)).execute(conn)
    {
        tracing::warn!(
            table = table.name,
            %error,
            "could not enforce a unique natural key"
        );
    }
}

/// Probes `table`, creating it with the default schema if it is missing.
/// Never fails: if the table cannot be read or created the result says
/// `exists: false`.
#[tracing::instrument(skip_all, fields(table = table.name))]
pub fn probe(conn: &mut SqliteConnection, table: &TableDef) -> SchemaInfo {
    let mut found = match load_columns(conn, table.name) {
        Ok(found) => found,
        Err(error) => {
            tracing::error!(%error, "could not read table metadata");
            return SchemaInfo::missing(table.name);
        }
    };

    if found.is_empty() {
        tracing::warn!("table does not exist, creating it");
        if let Err(error) = create_table(conn, table) {
            tracing::error!(%error, "could not create table");
            return SchemaInfo::missing(table.name);
        }
    } else {
        let present = found.iter().map(|c| c.name.clone()).collect();
        heal_table(conn, table, &present);
    }

    found = match load_columns(conn, table.name) {
        Ok(found) if !found.is_empty() => found,
        Ok(_) => return SchemaInfo::missing(table.name),
        Err(error) => {
            tracing::error!(%error, "could not read table metadata");
            return SchemaInfo::missing(table.name);
        }
    };

    let list_column_type = found
        .iter()
        .find(|c| c.name == table.list_column)
        .map(|c| ListColumnType::classify(&c.declared_type))
        .unwrap_or(ListColumnType::Unknown);

    let info = SchemaInfo {
        table: table.name,
        exists: true,
        list_column_type,
        columns: found.into_iter().map(|c| c.name).collect(),
    };
    tracing::debug!(
        list_column_type = ?info.list_column_type,
        columns = info.columns.len(),
        "probed"
    );
    info
}

/// Probe results for the lifetime of a process. Entries are filled on first
/// use and dropped when a write suggests the table changed underneath us.
/// Negative results are never cached.
#[derive(Default, Debug)]
pub struct SchemaCache {
    tables: RwLock<HashMap<&'static str, SchemaInfo>>,
}

impl SchemaCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cached(&self, table: &str) -> Option<SchemaInfo> {
        self.tables
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(table)
            .cloned()
    }

    pub fn get_or_probe(
        &self,
        conn: &mut SqliteConnection,
        table: &TableDef,
    ) -> SchemaInfo {
        if let Some(info) = self.cached(table.name) {
            return info;
        }
        // Concurrent callers may both probe; they converge on the same
        // answer.
        let info = probe(conn, table);
        if info.exists {
            self.tables
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .insert(table.name, info.clone());
        }
        info
    }

    pub fn invalidate(&self, table: &str) {
        self.tables
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(table);
    }

    pub fn reprobe(
        &self,
        conn: &mut SqliteConnection,
        table: &TableDef,
    ) -> SchemaInfo {
        self.invalidate(table.name);
        self.get_or_probe(conn, table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{Entity, Match, Team};

    fn conn() -> SqliteConnection {
        SqliteConnection::establish(":memory:").unwrap()
    }

    #[test]
    fn classifies_declared_types() {
        use ListColumnType::*;
        assert_eq!(ListColumnType::classify("TEXT ARRAY"), NativeArray);
        assert_eq!(ListColumnType::classify("text[]"), NativeArray);
        assert_eq!(ListColumnType::classify("JSONB"), Json);
        assert_eq!(ListColumnType::classify("json"), Json);
        assert_eq!(ListColumnType::classify("TEXT"), DelimitedText);
        assert_eq!(ListColumnType::classify("varchar(255)"), DelimitedText);
        assert_eq!(ListColumnType::classify(""), DelimitedText);
        assert_eq!(ListColumnType::classify("BLOB"), Unknown);
    }

    #[test]
    fn creates_missing_table() {
        let mut conn = conn();
        let info = probe(&mut conn, &Team::TABLE);

        assert!(info.exists);
        assert_eq!(info.list_column_type, ListColumnType::NativeArray);
        for column in Team::TABLE.columns {
            assert!(info.has_column(column.name), "{}", column.name);
        }

        let info = probe(&mut conn, &Match::TABLE);
        assert!(info.exists);
        assert!(info.has_column("match_number"));
    }

    #[test]
    fn heals_legacy_table() {
        let mut conn = conn();
        diesel::sql_query(
            "CREATE TABLE teams (id INTEGER PRIMARY KEY, team_number INTEGER, \
             coral_levels JSON, notes TEXT)",
        )
        .execute(&mut conn)
        .unwrap();

        let info = probe(&mut conn, &Team::TABLE);
        assert!(info.exists);
        assert_eq!(info.list_column_type, ListColumnType::Json);
        assert!(info.has_column("drivetrain"));
        assert!(info.has_column("updated_at"));
    }

    #[test]
    fn reports_unprovisioned_storage() {
        let mut conn = conn();
        diesel::sql_query("PRAGMA query_only = ON")
            .execute(&mut conn)
            .unwrap();

        let info = probe(&mut conn, &Team::TABLE);
        assert!(!info.exists);

        let cache = SchemaCache::new();
        assert!(!cache.get_or_probe(&mut conn, &Team::TABLE).exists);
        assert_eq!(cache.cached("teams"), None);
    }

    #[test]
    fn cache_holds_until_invalidated() {
        let mut conn = conn();
        let cache = SchemaCache::new();
        let first = cache.get_or_probe(&mut conn, &Team::TABLE);
        assert_eq!(first.list_column_type, ListColumnType::NativeArray);

        diesel::sql_query("DROP TABLE teams").execute(&mut conn).unwrap();
        diesel::sql_query(
            "CREATE TABLE teams (id INTEGER PRIMARY KEY, team_number INTEGER \
             UNIQUE, coral_levels TEXT)",
        )
        .execute(&mut conn)
        .unwrap();

        let cached = cache.get_or_probe(&mut conn, &Team::TABLE);
        assert_eq!(cached, first);

        let fresh = cache.reprobe(&mut conn, &Team::TABLE);
        assert_eq!(fresh.list_column_type, ListColumnType::DelimitedText);
    }
}
