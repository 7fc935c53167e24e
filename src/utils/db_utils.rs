use chrono::{NaiveDate, NaiveDateTime};
use serde_json::{Map, Value};
use sqlx::MySqlPool;

use crate::error::ApiError;

/// Value bound into a dynamically built statement.
#[derive(Debug, PartialEq)]
pub enum SqlValue {
    String(String),
    I64(i64),
    U64(u64),
    F64(f64),
    Bool(bool),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    Null,
}

#[derive(Debug)]
pub struct SqlUpdate {
    pub sql: String,
    pub values: Vec<SqlValue>,
}

fn to_sql_value(value: &Value) -> Result<SqlValue, ApiError> {
    Ok(match value {
        Value::String(s) => {
            if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
                SqlValue::Date(d)
            } else if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S") {
                SqlValue::DateTime(dt)
            } else {
                SqlValue::String(s.clone())
            }
        }
        Value::Number(n) => {
            if let Some(u) = n.as_u64() {
                SqlValue::U64(u)
            } else if let Some(i) = n.as_i64() {
                SqlValue::I64(i)
            } else if let Some(f) = n.as_f64() {
                SqlValue::F64(f)
            } else {
                return Err(ApiError::bad_request("Unsupported number"));
            }
        }
        Value::Bool(b) => SqlValue::Bool(*b),
        Value::Null => SqlValue::Null,
        _ => return Err(ApiError::bad_request("Unsupported JSON value type")),
    })
}

/// Builds `UPDATE table SET a = ?, b = ? WHERE id = ?` from a JSON object.
///
/// Only keys listed in `allowed` may appear; they become column names.
pub fn build_update_sql(
    table: &str,
    payload: &Value,
    allowed: &[&str],
    id_column: &str,
    id_value: u64,
) -> Result<SqlUpdate, ApiError> {
    let obj: &Map<String, Value> = payload
        .as_object()
        .ok_or_else(|| ApiError::bad_request("Payload must be a JSON object"))?;

    if obj.is_empty() {
        return Err(ApiError::bad_request("No fields provided for update"));
    }

    if let Some(unknown) = obj.keys().find(|k| !allowed.contains(&k.as_str())) {
        return Err(ApiError::bad_request(format!("Unknown field '{unknown}'")));
    }

    let set_clause = obj
        .keys()
        .map(|k| format!("{} = ?", k))
        .collect::<Vec<_>>()
        .join(", ");

    let sql = format!("UPDATE {} SET {} WHERE {} = ?", table, set_clause, id_column);

    let mut values = Vec::with_capacity(obj.len() + 1);
    for value in obj.values() {
        values.push(to_sql_value(value)?);
    }
    values.push(SqlValue::U64(id_value));

    Ok(SqlUpdate { sql, values })
}

pub async fn execute_update(pool: &MySqlPool, update: SqlUpdate) -> Result<u64, sqlx::Error> {
    let mut query = sqlx::query(&update.sql);

    for value in update.values {
        query = match value {
            SqlValue::String(v) => query.bind(v),
            SqlValue::I64(v) => query.bind(v),
            SqlValue::U64(v) => query.bind(v),
            SqlValue::F64(v) => query.bind(v),
            SqlValue::Bool(v) => query.bind(v),
            SqlValue::Date(v) => query.bind(v),
            SqlValue::DateTime(v) => query.bind(v),
            SqlValue::Null => query.bind(None::<String>),
        };
    }

    let result = query.execute(pool).await?;
    Ok(result.rows_affected())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const COLUMNS: &[&str] = &["name", "status", "end_date", "is_active"];

    #[test]
    fn test_builds_set_clause_in_key_order() {
        let update = build_update_sql(
            "projects",
            &json!({"name": "Apollo", "end_date": "2025-12-31", "is_active": false}),
            COLUMNS,
            "id",
            4,
        )
        .unwrap();

        assert_eq!(
            update.sql,
            "UPDATE projects SET end_date = ?, is_active = ?, name = ? WHERE id = ?"
        );
        assert_eq!(
            update.values,
            vec![
                SqlValue::Date(NaiveDate::from_ymd_opt(2025, 12, 31).unwrap()),
                SqlValue::Bool(false),
                SqlValue::String("Apollo".into()),
                SqlValue::U64(4),
            ]
        );
    }

    #[test]
    fn test_rejects_columns_outside_whitelist() {
        let err = build_update_sql("projects", &json!({"id = 1; --": 1}), COLUMNS, "id", 4)
            .unwrap_err();
        assert!(err.to_string().starts_with("Unknown field"));
    }

    #[test]
    fn test_rejects_empty_and_non_object_payloads() {
        assert!(build_update_sql("projects", &json!({}), COLUMNS, "id", 4).is_err());
        assert!(build_update_sql("projects", &json!([1, 2]), COLUMNS, "id", 4).is_err());
        assert!(build_update_sql("projects", &json!({"name": [1]}), COLUMNS, "id", 4).is_err());
    }
}
