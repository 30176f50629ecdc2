//! PostgreSQL execution of compiled queries
//!
//! Compiled SQL names its parameters (`@p0`, `@p1`, ...). PostgreSQL expects
//! positional `$1, $2, ...`, so placeholders are rewritten before binding and
//! values are bound in parameter-bag order. Result columns are decoded by
//! their PostgreSQL type name into [`SqlValue`]s.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use query_object::{ParameterBag, QueryError, QueryExecutor, ResultRow};
use sqlx::postgres::{PgArguments, PgColumn, PgPool, PgRow};
use sqlx::query::Query;
use sqlx::{Column, Postgres, Row, TypeInfo};
use std::collections::HashMap;
use type_mapping::SqlValue;
use uuid::Uuid;

type PgQuery<'q> = Query<'q, Postgres, PgArguments>;

/// [`QueryExecutor`] over a PostgreSQL connection pool
#[derive(Debug, Clone)]
pub struct PgExecutor {
    pool: PgPool,
}

impl PgExecutor {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl QueryExecutor for PgExecutor {
    async fn execute(&self, sql: &str, parameters: &ParameterBag) -> Result<Vec<ResultRow>, QueryError> {
        let statement = rewrite_placeholders(sql, parameters)?;
        tracing::debug!(statement = %statement, parameters = parameters.len(), "Executing query");

        let mut query = sqlx::query(&statement);
        for value in parameters.values() {
            query = bind_value(query, value);
        }

        let rows = query.fetch_all(&self.pool).await.map_err(QueryError::execution)?;
        crate::debug_log!("Decoding {} rows", rows.len());

        rows.iter().map(decode_row).collect()
    }
}

/// Replace named placeholders with `$1, $2, ...` in parameter-bag order
pub fn rewrite_placeholders(sql: &str, parameters: &ParameterBag) -> Result<String, QueryError> {
    let positions: HashMap<&str, usize> = parameters
        .iter()
        .enumerate()
        .map(|(index, (name, _))| (name, index + 1))
        .collect();
    let prefix = parameters.prefix();
    if prefix.is_empty() {
        return Err(QueryError::unsupported("Param", "parameter prefix is empty"));
    }

    let mut rewritten = String::with_capacity(sql.len());
    let mut rest = sql;

    while let Some(start) = rest.find(prefix) {
        let after = &rest[start + prefix.len()..];
        let digits = after.bytes().take_while(u8::is_ascii_digit).count();
        rewritten.push_str(&rest[..start]);

        if digits == 0 {
            rewritten.push_str(prefix);
            rest = after;
            continue;
        }

        let name = &rest[start..start + prefix.len() + digits];
        let position = positions.get(name).ok_or_else(|| {
            QueryError::unsupported("Param", format!("placeholder {} has no bound value", name))
        })?;
        rewritten.push('$');
        rewritten.push_str(&position.to_string());
        rest = &after[digits..];
    }

    rewritten.push_str(rest);
    Ok(rewritten)
}

// Shared parameter binding, one PostgreSQL type per SqlValue kind
fn bind_value<'q>(query: PgQuery<'q>, value: &SqlValue) -> PgQuery<'q> {
    match value {
        SqlValue::Null => query.bind(Option::<String>::None),
        SqlValue::Bool(b) => query.bind(*b),
        SqlValue::Int(i) => query.bind(*i),
        SqlValue::Float(f) => query.bind(*f),
        SqlValue::Decimal(d) => match d.parse::<sqlx::types::Decimal>() {
            Ok(decimal) => query.bind(decimal),
            Err(_) => query.bind(d.clone()),
        },
        SqlValue::Text(s) => query.bind(s.clone()),
        SqlValue::Uuid(u) => query.bind(*u),
        SqlValue::Timestamp(ts) => query.bind(*ts),
        SqlValue::Date(d) => query.bind(*d),
        SqlValue::Json(j) => query.bind(j.clone()),
        SqlValue::List(_) => query.bind(serde_json::to_value(value).unwrap_or(serde_json::Value::Null)),
    }
}

fn decode_row(row: &PgRow) -> Result<ResultRow, QueryError> {
    let mut result = ResultRow::new();
    for column in row.columns() {
        result.insert(column.name(), decode_column(row, column)?);
    }
    crate::trace_log!("Decoded row with {} columns", result.len());
    Ok(result)
}

fn decode_column(row: &PgRow, column: &PgColumn) -> Result<SqlValue, QueryError> {
    let index = column.ordinal();
    let decoded = match column.type_info().name() {
        "BOOL" => row.try_get::<Option<bool>, _>(index).map(SqlValue::from),
        "INT2" => row.try_get::<Option<i16>, _>(index).map(SqlValue::from),
        "INT4" => row.try_get::<Option<i32>, _>(index).map(SqlValue::from),
        "INT8" => row.try_get::<Option<i64>, _>(index).map(SqlValue::from),
        "FLOAT4" => row.try_get::<Option<f32>, _>(index).map(SqlValue::from),
        "FLOAT8" => row.try_get::<Option<f64>, _>(index).map(SqlValue::from),
        "NUMERIC" => row
            .try_get::<Option<sqlx::types::Decimal>, _>(index)
            .map(|d| d.map_or(SqlValue::Null, |d| SqlValue::Decimal(d.to_string()))),
        "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" => row.try_get::<Option<String>, _>(index).map(SqlValue::from),
        "UUID" => row.try_get::<Option<Uuid>, _>(index).map(SqlValue::from),
        "TIMESTAMPTZ" => row.try_get::<Option<DateTime<Utc>>, _>(index).map(SqlValue::from),
        "TIMESTAMP" => row.try_get::<Option<NaiveDateTime>, _>(index).map(SqlValue::from),
        "DATE" => row.try_get::<Option<NaiveDate>, _>(index).map(SqlValue::from),
        "JSON" | "JSONB" => row.try_get::<Option<serde_json::Value>, _>(index).map(SqlValue::from),
        other => {
            return Err(QueryError::row_shape(
                column.name(),
                format!("unsupported column type {}", other),
            ));
        }
    };
    decoded.map_err(QueryError::execution)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bag(count: usize) -> ParameterBag {
        let mut parameters = ParameterBag::new("@p");
        for i in 0..count {
            parameters.push(SqlValue::Int(i as i64));
        }
        parameters
    }

    #[test]
    fn test_placeholders_become_positional() {
        let sql = "SELECT * FROM orders Extend0 WHERE (Extend0.id = @p0) AND (Extend0.total > @p1)";
        assert_eq!(
            rewrite_placeholders(sql, &bag(2)).unwrap(),
            "SELECT * FROM orders Extend0 WHERE (Extend0.id = $1) AND (Extend0.total > $2)"
        );
    }

    #[test]
    fn test_multi_digit_placeholders() {
        let sql = "(Extend0.id IN (@p1, @p10, @p11))";
        assert_eq!(
            rewrite_placeholders(sql, &bag(12)).unwrap(),
            "(Extend0.id IN ($2, $11, $12))"
        );
    }

    #[test]
    fn test_unbound_placeholder_is_rejected() {
        assert!(matches!(
            rewrite_placeholders("Extend0.id = @p3", &bag(1)),
            Err(QueryError::UnsupportedConstruct { .. })
        ));
    }

    #[test]
    fn test_custom_prefix() {
        let mut parameters = ParameterBag::new(":v");
        parameters.push(SqlValue::Text("paid".into()));
        assert_eq!(
            rewrite_placeholders("T0.status = :v0", &parameters).unwrap(),
            "T0.status = $1"
        );
    }
}
