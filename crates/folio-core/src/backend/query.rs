//! Table query builder
//!
//! A `Query` describes a filtered, ordered, limited read against one table.
//! It renders to PostgREST query parameters for the HTTP backend and can be
//! evaluated directly against rows for the in-memory backend.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde_json::Value;

use super::Row;

/// Comparison operator of a filter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    Neq,
    Gte,
}

impl FilterOp {
    fn as_str(&self) -> &'static str {
        match self {
            FilterOp::Eq => "eq",
            FilterOp::Neq => "neq",
            FilterOp::Gte => "gte",
        }
    }
}

/// A single column filter
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub column: String,
    pub op: FilterOp,
    pub value: Value,
}

/// A single ordering key
#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub column: String,
    pub ascending: bool,
    /// `None` keeps the Postgres default (nulls last ascending, first descending)
    pub nulls_first: Option<bool>,
}

impl Order {
    fn effective_nulls_first(&self) -> bool {
        self.nulls_first.unwrap_or(!self.ascending)
    }
}

/// Read query against one table
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub table: String,
    pub columns: String,
    pub filters: Vec<Filter>,
    pub orders: Vec<Order>,
    pub limit: Option<usize>,
}

impl Query {
    /// Start a query selecting every column of `table`
    pub fn table(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            columns: "*".to_string(),
            filters: Vec::new(),
            orders: Vec::new(),
            limit: None,
        }
    }

    /// Select specific columns or embedded relations (e.g. `*, projects(title)`)
    pub fn select(mut self, columns: impl Into<String>) -> Self {
        self.columns = columns.into();
        self
    }

    pub fn eq(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter(column, FilterOp::Eq, value)
    }

    pub fn neq(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter(column, FilterOp::Neq, value)
    }

    pub fn gte(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter(column, FilterOp::Gte, value)
    }

    fn filter(mut self, column: impl Into<String>, op: FilterOp, value: impl Into<Value>) -> Self {
        self.filters.push(Filter {
            column: column.into(),
            op,
            value: value.into(),
        });
        self
    }

    pub fn order(mut self, column: impl Into<String>, ascending: bool) -> Self {
        self.orders.push(Order {
            column: column.into(),
            ascending,
            nulls_first: None,
        });
        self
    }

    pub fn order_nulls(
        mut self,
        column: impl Into<String>,
        ascending: bool,
        nulls_first: bool,
    ) -> Self {
        self.orders.push(Order {
            column: column.into(),
            ascending,
            nulls_first: Some(nulls_first),
        });
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Render as PostgREST query-string parameters
    pub fn to_params(&self) -> Vec<(String, String)> {
        let mut params = vec![("select".to_string(), self.columns.replace(' ', ""))];

        for filter in &self.filters {
            params.push((
                filter.column.clone(),
                format!("{}.{}", filter.op.as_str(), render_value(&filter.value)),
            ));
        }

        if !self.orders.is_empty() {
            let rendered: Vec<String> = self
                .orders
                .iter()
                .map(|order| {
                    let mut part = format!(
                        "{}.{}",
                        order.column,
                        if order.ascending { "asc" } else { "desc" }
                    );
                    match order.nulls_first {
                        Some(true) => part.push_str(".nullsfirst"),
                        Some(false) => part.push_str(".nullslast"),
                        None => {}
                    }
                    part
                })
                .collect();
            params.push(("order".to_string(), rendered.join(",")));
        }

        if let Some(limit) = self.limit {
            params.push(("limit".to_string(), limit.to_string()));
        }

        params
    }

    /// Whether `row` passes every filter
    pub fn matches(&self, row: &Row) -> bool {
        self.filters.iter().all(|filter| {
            let cell = row.get(&filter.column).unwrap_or(&Value::Null);
            match filter.op {
                FilterOp::Eq => values_equal(cell, &filter.value),
                FilterOp::Neq => !values_equal(cell, &filter.value),
                FilterOp::Gte => {
                    !cell.is_null()
                        && compare_values(cell, &filter.value) != Ordering::Less
                }
            }
        })
    }

    /// Filter, sort, and limit `rows` the way the remote store would
    pub fn apply(&self, rows: impl IntoIterator<Item = Row>) -> Vec<Row> {
        let mut selected: Vec<Row> = rows.into_iter().filter(|r| self.matches(r)).collect();

        selected.sort_by(|a, b| {
            for order in &self.orders {
                let left = a.get(&order.column).unwrap_or(&Value::Null);
                let right = b.get(&order.column).unwrap_or(&Value::Null);
                let ordering = match (left.is_null(), right.is_null()) {
                    (true, true) => Ordering::Equal,
                    (true, false) if order.effective_nulls_first() => Ordering::Less,
                    (true, false) => Ordering::Greater,
                    (false, true) if order.effective_nulls_first() => Ordering::Greater,
                    (false, true) => Ordering::Less,
                    (false, false) => {
                        let natural = compare_values(left, right);
                        if order.ascending { natural } else { natural.reverse() }
                    }
                };
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            Ordering::Equal
        });

        if let Some(limit) = self.limit {
            selected.truncate(limit);
        }
        selected
    }
}

fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        other => other.to_string(),
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    if a == b {
        return true;
    }
    match (a, b) {
        (Value::String(s), Value::Number(n)) | (Value::Number(n), Value::String(s)) => {
            *s == n.to_string()
        }
        _ => false,
    }
}

fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Order two non-null cells; timestamps compare as instants
pub(crate) fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            let (x, y) = (x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0));
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::String(x), Value::String(y)) => match (parse_timestamp(x), parse_timestamp(y)) {
            (Some(x), Some(y)) => x.cmp(&y),
            _ => x.cmp(y),
        },
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        _ => a.to_string().cmp(&b.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: Value) -> Row {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_to_params_renders_postgrest_syntax() {
        let query = Query::table("projects")
            .select("*, projects(title)")
            .eq("status", "published")
            .gte("visited_at", "2024-01-01T00:00:00Z")
            .order_nulls("project_date", false, false)
            .order("created_at", false)
            .limit(5);

        let params = query.to_params();
        assert_eq!(params[0], ("select".into(), "*,projects(title)".into()));
        assert!(params.contains(&("status".into(), "eq.published".into())));
        assert!(params.contains(&("visited_at".into(), "gte.2024-01-01T00:00:00Z".into())));
        assert!(params.contains(&(
            "order".into(),
            "project_date.desc.nullslast,created_at.desc".into()
        )));
        assert!(params.contains(&("limit".into(), "5".into())));
    }

    #[test]
    fn test_matches_eq_and_neq() {
        let query = Query::table("t").eq("status", "new").neq("slug", "a");
        assert!(query.matches(&row(json!({"status": "new", "slug": "b"}))));
        assert!(!query.matches(&row(json!({"status": "new", "slug": "a"}))));
        assert!(!query.matches(&row(json!({"status": "published", "slug": "b"}))));
    }

    #[test]
    fn test_eq_matches_numeric_ids_against_strings() {
        let query = Query::table("t").eq("id", "42");
        assert!(query.matches(&row(json!({"id": 42}))));
    }

    #[test]
    fn test_gte_is_inclusive_and_timestamp_aware() {
        let query = Query::table("visits").gte("visited_at", "2024-01-08T00:00:00.000Z");
        assert!(query.matches(&row(json!({"visited_at": "2024-01-08T00:00:00+00:00"}))));
        assert!(query.matches(&row(json!({"visited_at": "2024-01-09T00:00:00Z"}))));
        assert!(!query.matches(&row(json!({"visited_at": "2024-01-07T23:59:59Z"}))));
        assert!(!query.matches(&row(json!({"visited_at": null}))));
    }

    #[test]
    fn test_apply_orders_with_nulls_last_then_tiebreak() {
        let rows = vec![
            row(json!({"id": "a", "project_date": null, "created_at": "2024-03-01T00:00:00Z"})),
            row(json!({"id": "b", "project_date": "2022", "created_at": "2024-01-01T00:00:00Z"})),
            row(json!({"id": "c", "project_date": "2023", "created_at": "2024-02-01T00:00:00Z"})),
            row(json!({"id": "d", "project_date": "2023", "created_at": "2024-04-01T00:00:00Z"})),
        ];
        let query = Query::table("projects")
            .order_nulls("project_date", false, false)
            .order("created_at", false);

        let ids: Vec<String> = query
            .apply(rows)
            .into_iter()
            .map(|r| r["id"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(ids, vec!["d", "c", "b", "a"]);
    }

    #[test]
    fn test_apply_respects_limit() {
        let rows = (0..10).map(|i| row(json!({"n": i})));
        let result = Query::table("t").order("n", true).limit(3).apply(rows);
        assert_eq!(result.len(), 3);
        assert_eq!(result[0]["n"], json!(0));
    }
}
