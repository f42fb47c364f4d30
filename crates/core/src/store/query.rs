//! Query model for PostgREST-style row selection.
//!
//! A [`Query`] renders to the query-string pairs PostgREST expects
//! (`select=...`, `column=op.value`, `order=...`, `limit=...`). The same
//! model can be evaluated against JSON rows, which is what the in-memory
//! store does.

use std::cmp::Ordering;
use std::str::FromStr;

use serde_json::{Map, Value};

/// Comparison operators supported by the REST surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    Neq,
    Gt,
    Gte,
    Lt,
    Lte,
    Like,
    ILike,
    Is,
    In,
}

impl FilterOp {
    pub fn as_str(self) -> &'static str {
        match self {
            FilterOp::Eq => "eq",
            FilterOp::Neq => "neq",
            FilterOp::Gt => "gt",
            FilterOp::Gte => "gte",
            FilterOp::Lt => "lt",
            FilterOp::Lte => "lte",
            FilterOp::Like => "like",
            FilterOp::ILike => "ilike",
            FilterOp::Is => "is",
            FilterOp::In => "in",
        }
    }
}

impl FromStr for FilterOp {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "eq" => Ok(FilterOp::Eq),
            "neq" => Ok(FilterOp::Neq),
            "gt" => Ok(FilterOp::Gt),
            "gte" => Ok(FilterOp::Gte),
            "lt" => Ok(FilterOp::Lt),
            "lte" => Ok(FilterOp::Lte),
            "like" => Ok(FilterOp::Like),
            "ilike" => Ok(FilterOp::ILike),
            "is" => Ok(FilterOp::Is),
            "in" => Ok(FilterOp::In),
            other => Err(format!("unknown filter operator: {other}")),
        }
    }
}

/// A row predicate.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Condition {
        column: String,
        op: FilterOp,
        value: Value,
    },
    /// Matches when any of the inner filters match.
    Or(Vec<Filter>),
}

impl Filter {
    pub fn new(column: impl Into<String>, op: FilterOp, value: impl Into<Value>) -> Self {
        Filter::Condition {
            column: column.into(),
            op,
            value: value.into(),
        }
    }

    pub fn eq(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(column, FilterOp::Eq, value)
    }

    pub fn neq(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(column, FilterOp::Neq, value)
    }

    pub fn gt(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(column, FilterOp::Gt, value)
    }

    pub fn gte(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(column, FilterOp::Gte, value)
    }

    pub fn lt(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(column, FilterOp::Lt, value)
    }

    pub fn lte(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(column, FilterOp::Lte, value)
    }

    pub fn like(column: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self::new(column, FilterOp::Like, pattern.into())
    }

    pub fn ilike(column: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self::new(column, FilterOp::ILike, pattern.into())
    }

    pub fn is_null(column: impl Into<String>) -> Self {
        Self::new(column, FilterOp::Is, Value::Null)
    }

    pub fn in_list<I, V>(column: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let items = values.into_iter().map(Into::into).collect();
        Self::new(column, FilterOp::In, Value::Array(items))
    }

    pub fn or(filters: Vec<Filter>) -> Self {
        Filter::Or(filters)
    }

    /// Renders the filter as a query-string pair.
    pub fn to_param(&self) -> (String, String) {
        match self {
            Filter::Condition { column, op, value } => (
                column.clone(),
                format!("{}.{}", op.as_str(), render_value(*op, value)),
            ),
            Filter::Or(filters) => ("or".to_string(), format!("({})", render_group(filters))),
        }
    }

    /// Form used inside an `or=(...)` group.
    fn render_inline(&self) -> String {
        match self {
            Filter::Condition { column, op, value } => {
                format!("{}.{}.{}", column, op.as_str(), render_value(*op, value))
            }
            Filter::Or(filters) => format!("or({})", render_group(filters)),
        }
    }

    /// Evaluates the filter against a JSON row. Comparisons involving a
    /// missing or null field are false, as in SQL.
    pub fn matches(&self, row: &Value) -> bool {
        match self {
            Filter::Or(filters) => filters.iter().any(|f| f.matches(row)),
            Filter::Condition { column, op, value } => {
                let field = lookup(row, column).unwrap_or(&Value::Null);
                match op {
                    FilterOp::Is => match value {
                        Value::Null => field.is_null(),
                        other => field == other,
                    },
                    _ if field.is_null() => false,
                    FilterOp::Eq => compare_values(field, value) == Some(Ordering::Equal),
                    FilterOp::Neq => {
                        matches!(compare_values(field, value), Some(o) if o != Ordering::Equal)
                    }
                    FilterOp::Gt => compare_values(field, value) == Some(Ordering::Greater),
                    FilterOp::Gte => matches!(
                        compare_values(field, value),
                        Some(Ordering::Greater | Ordering::Equal)
                    ),
                    FilterOp::Lt => compare_values(field, value) == Some(Ordering::Less),
                    FilterOp::Lte => matches!(
                        compare_values(field, value),
                        Some(Ordering::Less | Ordering::Equal)
                    ),
                    FilterOp::Like => match (field.as_str(), value.as_str()) {
                        (Some(text), Some(pattern)) => like_match(text, pattern),
                        _ => false,
                    },
                    FilterOp::ILike => match (field.as_str(), value.as_str()) {
                        (Some(text), Some(pattern)) => {
                            like_match(&text.to_lowercase(), &pattern.to_lowercase())
                        }
                        _ => false,
                    },
                    FilterOp::In => match value {
                        Value::Array(items) => items
                            .iter()
                            .any(|item| compare_values(field, item) == Some(Ordering::Equal)),
                        _ => false,
                    },
                }
            }
        }
    }
}

fn render_group(filters: &[Filter]) -> String {
    filters
        .iter()
        .map(Filter::render_inline)
        .collect::<Vec<_>>()
        .join(",")
}

fn render_value(op: FilterOp, value: &Value) -> String {
    match (op, value) {
        (FilterOp::In, Value::Array(items)) => format!(
            "({})",
            items
                .iter()
                .map(render_list_item)
                .collect::<Vec<_>>()
                .join(",")
        ),
        (_, v) => render_scalar(v),
    }
}

fn render_scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

fn render_list_item(value: &Value) -> String {
    match value {
        Value::String(s) if s.contains([',', '(', ')', '"', ' ']) => {
            format!("\"{}\"", s.replace('"', "\\\""))
        }
        other => render_scalar(other),
    }
}

/// Resolves a dotted path (`sala.nombre`) inside a JSON row.
pub fn lookup<'a>(row: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(row, |value, key| value.get(key))
}

/// Orders two JSON scalars. Numbers compare numerically, also against
/// numeric strings (query-string values arrive as text).
pub fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::Number(x), Value::String(y)) => x.as_f64()?.partial_cmp(&y.parse::<f64>().ok()?),
        (Value::String(x), Value::Number(y)) => x.parse::<f64>().ok()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::String(y)) => Some(x.to_string().as_str().cmp(y.as_str())),
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        _ => None,
    }
}

/// SQL `LIKE` with `%` (and PostgREST's `*`) as the multi-character wildcard
/// and `_` as the single-character wildcard.
pub fn like_match(text: &str, pattern: &str) -> bool {
    let text: Vec<char> = text.chars().collect();
    let pattern: Vec<char> = pattern.chars().collect();

    // matched[j] == pattern[..j] matches text[..i]
    let mut matched = vec![false; pattern.len() + 1];
    matched[0] = true;
    for j in 1..=pattern.len() {
        matched[j] = matched[j - 1] && matches!(pattern[j - 1], '%' | '*');
    }

    for c in &text {
        let mut next = vec![false; pattern.len() + 1];
        for j in 1..=pattern.len() {
            next[j] = match pattern[j - 1] {
                '%' | '*' => next[j - 1] || matched[j],
                '_' => matched[j - 1],
                p => matched[j - 1] && p == *c,
            };
        }
        matched = next;
    }

    matched[pattern.len()]
}

/// A sort key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub column: String,
    pub ascending: bool,
}

impl Order {
    pub fn asc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            ascending: true,
        }
    }

    pub fn desc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            ascending: false,
        }
    }

    pub fn render(&self) -> String {
        format!(
            "{}.{}",
            self.column,
            if self.ascending { "asc" } else { "desc" }
        )
    }

    /// Compares two rows on this key. Nulls sort last ascending and first
    /// descending, matching Postgres defaults.
    pub fn compare(&self, a: &Value, b: &Value) -> Ordering {
        let left = lookup(a, &self.column).filter(|v| !v.is_null());
        let right = lookup(b, &self.column).filter(|v| !v.is_null());
        let ordering = match (left, right) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Greater,
            (Some(_), None) => Ordering::Less,
            (Some(x), Some(y)) => compare_values(x, y).unwrap_or(Ordering::Equal),
        };
        if self.ascending {
            ordering
        } else {
            ordering.reverse()
        }
    }
}

impl FromStr for Order {
    type Err = String;

    /// Parses `column`, `column.asc` or `column.desc`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.rsplit_once('.') {
            Some((column, "asc")) if !column.is_empty() => Ok(Order::asc(column)),
            Some((column, "desc")) if !column.is_empty() => Ok(Order::desc(column)),
            _ if !s.is_empty() => Ok(Order::asc(s)),
            _ => Err("empty order".to_string()),
        }
    }
}

/// Stable multi-key sort of JSON rows.
pub fn sort_rows(rows: &mut [Value], order: &[Order]) {
    if order.is_empty() {
        return;
    }
    rows.sort_by(|a, b| {
        order
            .iter()
            .map(|key| key.compare(a, b))
            .find(|o| *o != Ordering::Equal)
            .unwrap_or(Ordering::Equal)
    });
}

/// Direction of an embedded relationship.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    /// `foreign_key` is a column of the parent row pointing at the target.
    ToOne,
    /// `foreign_key` is a column of the target rows pointing at the parent.
    ToMany,
}

/// A related resource embedded into each selected row.
#[derive(Debug, Clone, PartialEq)]
pub struct Embed {
    pub alias: String,
    pub table: String,
    pub foreign_key: String,
    pub relation: Relation,
    pub select: Select,
}

/// Column list plus embedded relationships.
#[derive(Debug, Clone, PartialEq)]
pub struct Select {
    pub columns: Vec<String>,
    pub embeds: Vec<Embed>,
}

impl Default for Select {
    fn default() -> Self {
        Self::all()
    }
}

impl Select {
    /// `select=*`
    pub fn all() -> Self {
        Self {
            columns: vec!["*".to_string()],
            embeds: Vec::new(),
        }
    }

    pub fn columns<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            embeds: Vec::new(),
        }
    }

    /// Embeds the single row referenced by `foreign_key` under `alias`.
    pub fn to_one(
        mut self,
        alias: impl Into<String>,
        table: impl Into<String>,
        foreign_key: impl Into<String>,
        select: Select,
    ) -> Self {
        self.embeds.push(Embed {
            alias: alias.into(),
            table: table.into(),
            foreign_key: foreign_key.into(),
            relation: Relation::ToOne,
            select,
        });
        self
    }

    /// Tables reached through embeds, nested ones included, without
    /// duplicates.
    pub fn embedded_tables(&self) -> Vec<&str> {
        let mut tables: Vec<&str> = Vec::new();
        for embed in &self.embeds {
            for table in std::iter::once(embed.table.as_str()).chain(embed.select.embedded_tables()) {
                if !tables.contains(&table) {
                    tables.push(table);
                }
            }
        }
        tables
    }

    /// Embeds the rows of `table` whose `foreign_key` references this row.
    pub fn to_many(
        mut self,
        alias: impl Into<String>,
        table: impl Into<String>,
        foreign_key: impl Into<String>,
        select: Select,
    ) -> Self {
        self.embeds.push(Embed {
            alias: alias.into(),
            table: table.into(),
            foreign_key: foreign_key.into(),
            relation: Relation::ToMany,
            select,
        });
        self
    }

    /// Renders the `select` parameter, e.g. `*,sala:sala!sala_id(nombre)`.
    pub fn render(&self) -> String {
        let mut parts: Vec<String> = self.columns.clone();
        parts.extend(self.embeds.iter().map(|embed| {
            format!(
                "{}:{}!{}({})",
                embed.alias,
                embed.table,
                embed.foreign_key,
                embed.select.render()
            )
        }));
        if parts.is_empty() {
            "*".to_string()
        } else {
            parts.join(",")
        }
    }

    fn selects_everything(&self) -> bool {
        self.columns.is_empty() || self.columns.iter().any(|c| c == "*")
    }

    /// Keeps only the selected columns and embed aliases of `row`.
    pub fn project(&self, row: &Value) -> Value {
        let Value::Object(source) = row else {
            return row.clone();
        };
        if self.selects_everything() {
            return row.clone();
        }
        let mut projected = Map::new();
        let keys = self
            .columns
            .iter()
            .chain(self.embeds.iter().map(|e| &e.alias));
        for key in keys {
            if let Some(value) = source.get(key) {
                projected.insert(key.clone(), value.clone());
            }
        }
        Value::Object(projected)
    }
}

/// A read against one table.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub table: String,
    pub select: Select,
    pub filters: Vec<Filter>,
    pub order: Vec<Order>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            select: Select::all(),
            filters: Vec::new(),
            order: Vec::new(),
            limit: None,
        }
    }

    pub fn select(mut self, select: Select) -> Self {
        self.select = select;
        self
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn eq(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter(Filter::eq(column, value))
    }

    pub fn neq(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter(Filter::neq(column, value))
    }

    pub fn gte(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter(Filter::gte(column, value))
    }

    pub fn lte(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter(Filter::lte(column, value))
    }

    pub fn order_by(mut self, order: Order) -> Self {
        self.order.push(order);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// True when every filter accepts the row.
    pub fn matches(&self, row: &Value) -> bool {
        self.filters.iter().all(|f| f.matches(row))
    }

    /// Query-string pairs in PostgREST form.
    pub fn to_params(&self) -> Vec<(String, String)> {
        let mut params = vec![("select".to_string(), self.select.render())];
        params.extend(self.filters.iter().map(Filter::to_param));
        if !self.order.is_empty() {
            let order = self
                .order
                .iter()
                .map(Order::render)
                .collect::<Vec<_>>()
                .join(",");
            params.push(("order".to_string(), order));
        }
        if let Some(limit) = self.limit {
            params.push(("limit".to_string(), limit.to_string()));
        }
        params
    }
}
