//! Raw SQL strategies. Statements are built against the columns the probe
//! actually found, and every value is a bound parameter.

use diesel::prelude::*;
use diesel::query_builder::{BoxedSqlQuery, SqlQuery};
use diesel::sql_types::{Bool, Double, Integer, Nullable, Text};
use diesel::sqlite::Sqlite;
use itertools::Itertools;

use crate::canonical::list::ListEncoding;
use crate::probe::SchemaInfo;
use crate::records::{ColumnKind, Entity, Stored};
use crate::strategy::{PersistenceStrategy, SqlValue, StrategyKind};

type Statement = BoxedSqlQuery<'static, Sqlite, SqlQuery>;

pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn bind(query: Statement, value: SqlValue) -> Statement {
    match value {
        SqlValue::Int(n) => query.bind::<Integer, _>(n),
        SqlValue::Bool(b) => query.bind::<Bool, _>(b),
        SqlValue::Real(n) => query.bind::<Nullable<Double>, _>(n),
        SqlValue::Text(s) => query.bind::<Nullable<Text>, _>(s),
    }
}

fn statement(
    sql: String,
    values: impl IntoIterator<Item = SqlValue>,
) -> Statement {
    tracing::trace!(%sql, "raw statement");
    values
        .into_iter()
        .fold(diesel::sql_query(sql).into_boxed::<Sqlite>(), bind)
}

fn missing_column(table: &str, column: &str) -> diesel::result::Error {
    diesel::result::Error::QueryBuilderError(
        format!("table `{table}` has no `{column}` column").into(),
    )
}

/// Every known column as text. Columns the table lacks come back as NULL,
/// and a missing surrogate id falls back to the rowid.
fn select_list<E: Entity>(schema: &SchemaInfo) -> String {
    E::TABLE
        .columns
        .iter()
        .map(|column| {
            let alias = quote_identifier(column.name);
            if !schema.has_column(column.name) {
                if column.kind == ColumnKind::Id {
                    format!("CAST(rowid AS TEXT) AS {alias}")
                } else {
                    format!("NULL AS {alias}")
                }
            } else if column.kind == ColumnKind::Number {
                // A plain cast keeps only 15 significant digits.
                format!(
                    "CASE typeof({alias}) WHEN 'real' \
                     THEN printf('%!.17g', {alias}) \
                     ELSE CAST({alias} AS TEXT) END AS {alias}"
                )
            } else {
                format!("CAST({alias} AS TEXT) AS {alias}")
            }
        })
        .join(", ")
}

fn where_clause(
    schema: &SchemaInfo,
    filters: &[(&'static str, SqlValue)],
) -> QueryResult<String> {
    if filters.is_empty() {
        return Ok(String::new());
    }
    let conditions = filters
        .iter()
        .map(|(name, _)| {
            if schema.has_column(name) {
                Ok(format!("{} = ?", quote_identifier(name)))
            } else {
                Err(missing_column(schema.table, name))
            }
        })
        .collect::<QueryResult<Vec<_>>>()?;
    Ok(format!(" WHERE {}", conditions.join(" AND ")))
}

/// Loads and materializes every row of `E` matching `filters` (column
/// equality), ordered by natural key.
pub fn load_where<E: Entity>(
    conn: &mut SqliteConnection,
    schema: &SchemaInfo,
    filters: Vec<(&'static str, SqlValue)>,
) -> QueryResult<Vec<Stored<E>>> {
    let order = E::TABLE
        .key_columns()
        .filter(|column| schema.has_column(column.name))
        .map(|column| quote_identifier(column.name))
        .join(", ");
    let mut sql = format!(
        "SELECT {} FROM {}{}",
        select_list::<E>(schema),
        quote_identifier(E::TABLE.name),
        where_clause(schema, &filters)?,
    );
    if !order.is_empty() {
        sql.push_str(" ORDER BY ");
        sql.push_str(&order);
    }

    let rows = statement(sql, filters.into_iter().map(|(_, value)| value))
        .load::<E::Row>(conn)?;
    Ok(rows.into_iter().map(E::materialize).collect())
}

/// Sets a single column on the row with `key`. Returns the number of rows
/// changed.
pub fn set_column<E: Entity>(
    conn: &mut SqliteConnection,
    schema: &SchemaInfo,
    key: E::Key,
    column: &'static str,
    value: SqlValue,
) -> QueryResult<usize> {
    if !schema.has_column(column) {
        return Err(missing_column(schema.table, column));
    }
    let filters = E::key_values(key);
    let sql = format!(
        "UPDATE {} SET {} = ?{}{}",
        quote_identifier(E::TABLE.name),
        quote_identifier(column),
        touch_updated_at(schema),
        where_clause(schema, &filters)?,
    );
    let values = std::iter::once(value)
        .chain(filters.into_iter().map(|(_, value)| value));
    statement(sql, values).execute(conn)
}

fn touch_updated_at(schema: &SchemaInfo) -> &'static str {
    if schema.has_column("updated_at") {
        ", \"updated_at\" = CURRENT_TIMESTAMP"
    } else {
        ""
    }
}

/// Drops values for columns the table does not have.
fn present_values(
    schema: &SchemaInfo,
    values: Vec<(&'static str, SqlValue)>,
) -> Vec<(&'static str, SqlValue)> {
    values
        .into_iter()
        .filter(|(name, _)| {
            let present = schema.has_column(name);
            if !present {
                tracing::warn!(
                    table = schema.table,
                    column = name,
                    "column is missing, value not stored"
                );
            }
            present
        })
        .collect()
}

/// Raw SQL with the list column written in a fixed encoding. Reads are
/// tolerant of any encoding.
#[derive(Debug, Clone, Copy)]
pub struct RawSql {
    encoding: ListEncoding,
}

impl RawSql {
    pub fn new(encoding: ListEncoding) -> Self {
        Self { encoding }
    }
}

impl<E: Entity> PersistenceStrategy<E> for RawSql {
    fn kind(&self) -> StrategyKind {
        match self.encoding {
            ListEncoding::Json => StrategyKind::RawJson,
            _ => StrategyKind::RawNativeArray,
        }
    }

    fn find_by_key(
        &self,
        conn: &mut SqliteConnection,
        schema: &SchemaInfo,
        key: E::Key,
    ) -> QueryResult<Option<Stored<E>>> {
        let mut rows = load_where::<E>(conn, schema, E::key_values(key))?;
        if rows.len() > 1 {
            tracing::warn!(
                table = schema.table,
                %key,
                count = rows.len(),
                "natural key is not unique, using the first row"
            );
        }
        Ok(if rows.is_empty() {
            None
        } else {
            Some(rows.swap_remove(0))
        })
    }

    fn insert(
        &self,
        conn: &mut SqliteConnection,
        schema: &SchemaInfo,
        record: &E,
    ) -> QueryResult<Stored<E>> {
        let key = record.key();
        let mut values = E::key_values(key);
        values.extend(record.attribute_values(self.encoding));
        let values = present_values(schema, values);

        let mut columns =
            values.iter().map(|(name, _)| quote_identifier(name)).collect_vec();
        let mut placeholders = vec!["?"; values.len()];
        for timestamp in ["created_at", "updated_at"] {
            if schema.has_column(timestamp) {
                columns.push(quote_identifier(timestamp));
                placeholders.push("CURRENT_TIMESTAMP");
            }
        }

        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            quote_identifier(E::TABLE.name),
            columns.join(", "),
            placeholders.join(", "),
        );
        statement(sql, values.into_iter().map(|(_, value)| value))
            .execute(conn)?;

        PersistenceStrategy::<E>::find_by_key(self, conn, schema, key)?
            .ok_or(diesel::result::Error::NotFound)
    }

    fn update(
        &self,
        conn: &mut SqliteConnection,
        schema: &SchemaInfo,
        record: &E,
    ) -> QueryResult<Stored<E>> {
        let key = record.key();
        let values =
            present_values(schema, record.attribute_values(self.encoding));
        let filters = E::key_values(key);

        let assignments = values
            .iter()
            .map(|(name, _)| format!("{} = ?", quote_identifier(name)))
            .join(", ");
        let sql = format!(
            "UPDATE {} SET {}{}{}",
            quote_identifier(E::TABLE.name),
            assignments,
            touch_updated_at(schema),
            where_clause(schema, &filters)?,
        );
        let binds = values
            .into_iter()
            .chain(filters)
            .map(|(_, value)| value);
        let changed = statement(sql, binds).execute(conn)?;
        if changed == 0 {
            return Err(diesel::result::Error::NotFound);
        }

        PersistenceStrategy::<E>::find_by_key(self, conn, schema, key)?
            .ok_or(diesel::result::Error::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::probe;
    use crate::records::Team;

    fn setup() -> (SqliteConnection, SchemaInfo) {
        let mut conn = SqliteConnection::establish(":memory:").unwrap();
        let schema = probe(&mut conn, &Team::TABLE);
        (conn, schema)
    }

    #[test]
    fn quotes_identifiers() {
        assert_eq!(quote_identifier("teams"), "\"teams\"");
        assert_eq!(quote_identifier("we\"ird"), "\"we\"\"ird\"");
    }

    #[test]
    fn values_with_quotes_are_bound_not_interpolated() {
        let (mut conn, schema) = setup();
        let raw = RawSql::new(ListEncoding::NativeArray);

        let mut team = Team::new(254);
        team.notes = "it's \"fast\"'); DROP TABLE teams; --".to_string();
        team.coral_levels = vec!["L'4".to_string(), "\"L3\"".to_string()];
        let stored = raw.insert(&mut conn, &schema, &team).unwrap();

        assert_eq!(stored.record, team);
        let all = load_where::<Team>(&mut conn, &schema, vec![]).unwrap();
        assert_eq!(all.len(), 1);
    }

    #[test]
    fn update_keeps_identity() {
        let (mut conn, schema) = setup();
        let raw = RawSql::new(ListEncoding::Json);

        let mut team = Team::new(1334);
        let inserted = raw.insert(&mut conn, &schema, &team);
        // The default table only accepts array literals.
        assert!(inserted.is_err());

        let native = RawSql::new(ListEncoding::NativeArray);
        let inserted = native.insert(&mut conn, &schema, &team).unwrap();
        team.notes = "updated".to_string();
        let updated = native.update(&mut conn, &schema, &team).unwrap();
        assert_eq!(updated.id, inserted.id);
        assert_eq!(updated.record.notes, "updated");
    }

    #[test]
    fn reals_keep_full_precision() {
        let (mut conn, schema) = setup();
        let raw = RawSql::new(ListEncoding::NativeArray);

        let mut team = Team::new(3);
        team.robot_width = Some(0.1 + 0.2);
        team.robot_length = Some(1.0 / 3.0);
        team.robot_height = Some(30.0);
        let stored = raw.insert(&mut conn, &schema, &team).unwrap();
        assert_eq!(stored.record, team);
    }

    #[test]
    fn update_of_missing_row_is_not_found() {
        let (mut conn, schema) = setup();
        let raw = RawSql::new(ListEncoding::NativeArray);
        assert!(matches!(
            raw.update(&mut conn, &schema, &Team::new(1)),
            Err(diesel::result::Error::NotFound)
        ));
    }

    #[test]
    fn set_column_touches_one_row() {
        let (mut conn, schema) = setup();
        let raw = RawSql::new(ListEncoding::NativeArray);
        raw.insert(&mut conn, &schema, &Team::new(1)).unwrap();
        raw.insert(&mut conn, &schema, &Team::new(2)).unwrap();

        let changed = set_column::<Team>(
            &mut conn,
            &schema,
            2,
            "image_url",
            SqlValue::Text(Some("/img/2.png".to_string())),
        )
        .unwrap();
        assert_eq!(changed, 1);

        let rows = load_where::<Team>(&mut conn, &schema, vec![]).unwrap();
        assert_eq!(rows[0].record.image_url, None);
        assert_eq!(rows[1].record.image_url.as_deref(), Some("/img/2.png"));
    }
}
