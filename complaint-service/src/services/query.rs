//! Query construction for list endpoints.
//!
//! Raw query parameters become a [`QuerySpec`]; a [`QueryBuilder`] then runs
//! the fixed pipeline search → filter → sort → paginate → fields against a
//! per-resource [`QuerySchema`] and yields a [`QueryPlan`]. Plans are
//! storage-agnostic: MongoDB compiles them with [`Predicate::to_document`],
//! the in-memory store evaluates them with [`Predicate::matches`].

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use mongodb::bson::{self, doc, Bson, Document};
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::HashMap;

use super::error::ServiceError;

pub const RESERVED_KEYS: [&str; 5] = ["searchTerm", "sort", "limit", "page", "fields"];

pub const DEFAULT_PAGE: u64 = 1;
pub const DEFAULT_LIMIT: u64 = 10;
/// Largest skip or limit a store driver accepts (BSON int64).
pub const MAX_WINDOW: u64 = i64::MAX as u64;

/// Field flags.
pub const FILTER: u8 = 0b0001;
pub const SORT: u8 = 0b0010;
pub const SEARCH: u8 = 0b0100;
pub const SELECT: u8 = 0b1000;

/// Per-request listing parameters, split into reserved keys and filters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QuerySpec {
    pub search_term: Option<String>,
    pub sort: Option<String>,
    pub page: Option<String>,
    pub limit: Option<String>,
    pub fields: Option<String>,
    /// Remaining `key=value` pairs, ordered by key.
    pub filters: Vec<(String, String)>,
}

impl QuerySpec {
    pub fn from_params(params: HashMap<String, String>) -> Self {
        let mut spec = QuerySpec::default();

        for (key, value) in params {
            let value = value.trim().to_string();
            let slot = match key.as_str() {
                "searchTerm" => &mut spec.search_term,
                "sort" => &mut spec.sort,
                "page" => &mut spec.page,
                "limit" => &mut spec.limit,
                "fields" => &mut spec.fields,
                _ => {
                    spec.filters.push((key, value));
                    continue;
                }
            };
            if !value.is_empty() {
                *slot = Some(value);
            }
        }

        spec.filters.sort();
        spec
    }

    pub fn page(&self) -> u64 {
        coerce_positive(self.page.as_deref(), DEFAULT_PAGE).min(MAX_WINDOW)
    }

    pub fn limit(&self) -> u64 {
        coerce_positive(self.limit.as_deref(), DEFAULT_LIMIT).min(MAX_WINDOW)
    }
}

fn coerce_positive(raw: Option<&str>, default: u64) -> u64 {
    raw.and_then(|v| v.parse::<u64>().ok())
        .filter(|v| *v > 0)
        .unwrap_or(default)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Free text; exact-match filters compare the whole string.
    Text,
    /// Enumerated or identifier-like strings.
    Keyword,
    Number,
    Bool,
    DateTime,
}

#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
    flags: u8,
}

impl FieldSpec {
    pub const fn new(name: &'static str, kind: FieldKind, flags: u8) -> Self {
        Self { name, kind, flags }
    }

    pub fn filterable(&self) -> bool {
        self.flags & FILTER != 0
    }

    pub fn sortable(&self) -> bool {
        self.flags & SORT != 0
    }

    pub fn searchable(&self) -> bool {
        self.flags & SEARCH != 0
    }

    pub fn selectable(&self) -> bool {
        self.flags & SELECT != 0
    }
}

/// Closed set of fields a list endpoint exposes to callers.
#[derive(Debug)]
pub struct QuerySchema {
    pub fields: &'static [FieldSpec],
    /// Stripped from every result that has no explicit field selection.
    pub hidden: &'static [&'static str],
}

impl QuerySchema {
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeOp {
    Gt,
    Gte,
    Lt,
    Lte,
    Ne,
}

impl RangeOp {
    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "gt" => Some(RangeOp::Gt),
            "gte" => Some(RangeOp::Gte),
            "lt" => Some(RangeOp::Lt),
            "lte" => Some(RangeOp::Lte),
            "ne" => Some(RangeOp::Ne),
            _ => None,
        }
    }

    fn operator(&self) -> &'static str {
        match self {
            RangeOp::Gt => "$gt",
            RangeOp::Gte => "$gte",
            RangeOp::Lt => "$lt",
            RangeOp::Lte => "$lte",
            RangeOp::Ne => "$ne",
        }
    }
}

/// Engine-agnostic filter tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Eq(String, Bson),
    Range(String, RangeOp, Bson),
    /// Case-insensitive substring match on the raw (unescaped) term.
    Contains(String, String),
    In(String, Vec<Bson>),
    Any(Vec<Predicate>),
    All(Vec<Predicate>),
}

impl Predicate {
    pub fn eq(field: &str, value: impl Into<Bson>) -> Self {
        Predicate::Eq(field.to_string(), value.into())
    }

    pub fn always() -> Self {
        Predicate::All(Vec::new())
    }

    /// Conjunction that flattens nested `All` nodes.
    pub fn and(self, other: Predicate) -> Self {
        let mut parts = match self {
            Predicate::All(parts) => parts,
            p => vec![p],
        };
        match other {
            Predicate::All(more) => parts.extend(more),
            p => parts.push(p),
        }
        Predicate::All(parts)
    }

    pub fn to_document(&self) -> Document {
        match self {
            Predicate::Eq(field, value) => doc! { field: value.clone() },
            Predicate::Range(field, op, value) => {
                doc! { field: { op.operator(): value.clone() } }
            }
            Predicate::Contains(field, term) => doc! {
                field: { "$regex": regex::escape(term), "$options": "i" }
            },
            Predicate::In(field, values) => doc! { field: { "$in": values.clone() } },
            Predicate::Any(parts) if parts.is_empty() => {
                doc! { "_id": { "$exists": false } }
            }
            Predicate::Any(parts) => doc! {
                "$or": parts.iter().map(|p| Bson::Document(p.to_document())).collect::<Vec<_>>()
            },
            Predicate::All(parts) => match parts.as_slice() {
                [] => Document::new(),
                [single] => single.to_document(),
                _ => doc! {
                    "$and": parts.iter().map(|p| Bson::Document(p.to_document())).collect::<Vec<_>>()
                },
            },
        }
    }

    /// Evaluate against a stored document with MongoDB's matching rules for
    /// the subset of operators this tree can express.
    pub fn matches(&self, document: &Document) -> bool {
        match self {
            Predicate::Eq(field, expected) => lookup(document, field)
                .map(|actual| bson_equals_or_contains(actual, expected))
                .unwrap_or(matches!(expected, Bson::Null)),
            Predicate::Range(field, RangeOp::Ne, expected) => !lookup(document, field)
                .map(|actual| bson_equals_or_contains(actual, expected))
                .unwrap_or(matches!(expected, Bson::Null)),
            Predicate::Range(field, op, bound) => match lookup(document, field) {
                Some(Bson::Array(items)) => items.iter().any(|item| in_range(item, *op, bound)),
                Some(actual) => in_range(actual, *op, bound),
                None => false,
            },
            Predicate::Contains(field, term) => {
                let needle = term.to_lowercase();
                match lookup(document, field) {
                    Some(Bson::String(s)) => s.to_lowercase().contains(&needle),
                    Some(Bson::Array(items)) => items.iter().any(|item| {
                        matches!(item, Bson::String(s) if s.to_lowercase().contains(&needle))
                    }),
                    _ => false,
                }
            }
            Predicate::In(field, values) => lookup(document, field)
                .map(|actual| values.iter().any(|v| bson_equals_or_contains(actual, v)))
                .unwrap_or(false),
            Predicate::Any(parts) => parts.iter().any(|p| p.matches(document)),
            Predicate::All(parts) => parts.iter().all(|p| p.matches(document)),
        }
    }
}

fn lookup<'a>(document: &'a Document, path: &str) -> Option<&'a Bson> {
    let mut parts = path.split('.');
    let mut current = document.get(parts.next()?)?;
    for part in parts {
        current = match current {
            Bson::Document(inner) => inner.get(part)?,
            _ => return None,
        };
    }
    Some(current)
}

fn bson_equals_or_contains(actual: &Bson, expected: &Bson) -> bool {
    match actual {
        Bson::Array(items) if !matches!(expected, Bson::Array(_)) => {
            items.iter().any(|item| bson_equal(item, expected))
        }
        _ => bson_equal(actual, expected),
    }
}

fn bson_equal(a: &Bson, b: &Bson) -> bool {
    match (as_f64(a), as_f64(b)) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

fn in_range(actual: &Bson, op: RangeOp, bound: &Bson) -> bool {
    match compare_same_type(actual, bound) {
        Some(ordering) => match op {
            RangeOp::Gt => ordering == Ordering::Greater,
            RangeOp::Gte => ordering != Ordering::Less,
            RangeOp::Lt => ordering == Ordering::Less,
            RangeOp::Lte => ordering != Ordering::Greater,
            RangeOp::Ne => ordering != Ordering::Equal,
        },
        None => false,
    }
}

fn as_f64(value: &Bson) -> Option<f64> {
    match value {
        Bson::Int32(n) => Some(f64::from(*n)),
        Bson::Int64(n) => Some(*n as f64),
        Bson::Double(n) => Some(*n),
        _ => None,
    }
}

/// Ordering between values of the same BSON type class; `None` across classes.
fn compare_same_type(a: &Bson, b: &Bson) -> Option<Ordering> {
    if let (Some(x), Some(y)) = (as_f64(a), as_f64(b)) {
        return x.partial_cmp(&y);
    }
    match (a, b) {
        (Bson::String(x), Bson::String(y)) => Some(x.cmp(y)),
        (Bson::DateTime(x), Bson::DateTime(y)) => Some(x.cmp(y)),
        (Bson::Boolean(x), Bson::Boolean(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

/// Total order for sorting: missing/null < numbers < strings < booleans < dates.
fn sort_compare(a: Option<&Bson>, b: Option<&Bson>) -> Ordering {
    fn rank(value: Option<&Bson>) -> u8 {
        match value {
            None | Some(Bson::Null) => 0,
            Some(Bson::Int32(_)) | Some(Bson::Int64(_)) | Some(Bson::Double(_)) => 1,
            Some(Bson::String(_)) => 2,
            Some(Bson::Boolean(_)) => 4,
            Some(Bson::DateTime(_)) => 5,
            Some(_) => 3,
        }
    }

    match (a, b) {
        (Some(x), Some(y)) => compare_same_type(x, y).unwrap_or_else(|| rank(a).cmp(&rank(b))),
        _ => rank(a).cmp(&rank(b)),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    pub field: String,
    pub descending: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Projection {
    Include(Vec<String>),
    Exclude(Vec<String>),
}

impl Projection {
    pub fn to_document(&self) -> Document {
        match self {
            Projection::Include(fields) => fields.iter().map(|f| (f.clone(), Bson::Int32(1))).collect(),
            Projection::Exclude(fields) => fields.iter().map(|f| (f.clone(), Bson::Int32(0))).collect(),
        }
    }

    pub fn apply(&self, document: Document) -> Document {
        match self {
            Projection::Include(fields) => document
                .into_iter()
                .filter(|(key, _)| key == "_id" || fields.iter().any(|f| f == key))
                .collect(),
            Projection::Exclude(fields) => document
                .into_iter()
                .filter(|(key, _)| !fields.iter().any(|f| f == key))
                .collect(),
        }
    }
}

/// Fully resolved fetch: filter, order, window and projection.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryPlan {
    pub filter: Predicate,
    pub sort: Vec<SortKey>,
    pub page: u64,
    pub limit: u64,
    pub skip: u64,
    pub projection: Projection,
}

impl QueryPlan {
    /// Filter used for counting: search and filter stages only.
    pub fn count_filter(&self) -> &Predicate {
        &self.filter
    }

    pub fn sort_document(&self) -> Document {
        self.sort
            .iter()
            .map(|key| {
                (
                    key.field.clone(),
                    Bson::Int32(if key.descending { -1 } else { 1 }),
                )
            })
            .collect()
    }

    pub fn pagination(&self, total: u64) -> Pagination {
        Pagination::new(self.page, self.limit, total)
    }

    /// Execute the plan over already-loaded documents.
    pub fn apply_in_memory(&self, documents: Vec<Document>) -> Page {
        let mut matching: Vec<Document> = documents
            .into_iter()
            .filter(|doc| self.filter.matches(doc))
            .collect();
        let total = matching.len() as u64;

        matching.sort_by(|a, b| {
            for key in &self.sort {
                let ordering = sort_compare(lookup(a, &key.field), lookup(b, &key.field));
                let ordering = if key.descending {
                    ordering.reverse()
                } else {
                    ordering
                };
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            Ordering::Equal
        });

        let items = matching
            .into_iter()
            .skip(self.skip as usize)
            .take(self.limit as usize)
            .map(|doc| crate::utils::document_to_json(self.projection.apply(doc)))
            .collect();

        Page { items, total }
    }
}

/// One page of projected records plus the unpaginated match count.
#[derive(Debug, Clone, Default)]
pub struct Page {
    pub items: Vec<serde_json::Value>,
    pub total: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: u64,
    pub limit: u64,
    pub total: u64,
    pub total_pages: u64,
    pub has_next_page: bool,
    pub has_prev_page: bool,
}

impl Pagination {
    pub fn new(page: u64, limit: u64, total: u64) -> Self {
        let limit = limit.max(1);
        let total_pages = total.div_ceil(limit);
        Self {
            page,
            limit,
            total,
            total_pages,
            has_next_page: page < total_pages,
            has_prev_page: page > 1,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct QueryResult {
    pub data: Vec<serde_json::Value>,
    pub pagination: Pagination,
}

/// A collection that can execute query plans.
#[async_trait]
pub trait ListStore: Send + Sync {
    async fn fetch_page(&self, plan: &QueryPlan) -> Result<Page, ServiceError>;
}

/// Run a plan against a store and attach the pagination summary.
pub async fn execute<S>(store: &S, plan: &QueryPlan) -> Result<QueryResult, ServiceError>
where
    S: ListStore + ?Sized,
{
    let page = store.fetch_page(plan).await?;
    Ok(QueryResult {
        pagination: plan.pagination(page.total),
        data: page.items,
    })
}

/// Fluent pipeline over a [`QuerySpec`]; stages are meant to be called in
/// declaration order.
pub struct QueryBuilder<'a> {
    schema: &'a QuerySchema,
    spec: &'a QuerySpec,
    filter: Predicate,
    sort: Vec<SortKey>,
    page: u64,
    limit: u64,
    projection: Projection,
}

impl<'a> QueryBuilder<'a> {
    pub fn new(schema: &'a QuerySchema, spec: &'a QuerySpec) -> Self {
        Self {
            schema,
            spec,
            filter: Predicate::always(),
            sort: Vec::new(),
            page: DEFAULT_PAGE,
            limit: DEFAULT_LIMIT,
            projection: Projection::Exclude(hidden_fields(schema)),
        }
    }

    /// Base restriction that every later stage narrows.
    pub fn scope(mut self, predicate: Predicate) -> Self {
        self.filter = self.filter.and(predicate);
        self
    }

    pub fn search(mut self, fields: &[&str]) -> Self {
        if let Some(term) = self.spec.search_term.as_deref() {
            let clauses: Vec<Predicate> = fields
                .iter()
                .filter(|f| self.schema.field(f).map(|spec| spec.searchable()).unwrap_or(false))
                .map(|f| Predicate::Contains(f.to_string(), term.to_string()))
                .collect();
            if !clauses.is_empty() {
                self.filter = self.filter.and(Predicate::Any(clauses));
            }
        }
        self
    }

    pub fn filter(mut self) -> Result<Self, ServiceError> {
        for (key, raw) in &self.spec.filters {
            let (field, op) = match split_operator(key) {
                Some(parts) => parts,
                None => {
                    return Err(ServiceError::bad_request(format!(
                        "Malformed filter key '{}'",
                        key
                    )))
                }
            };

            let Some(spec) = self.schema.field(field).filter(|f| f.filterable()) else {
                tracing::debug!(key = %key, "Ignoring filter on unknown field");
                continue;
            };

            let op = match op {
                Some(raw_op) => Some(RangeOp::parse(raw_op).ok_or_else(|| {
                    ServiceError::bad_request(format!(
                        "Unsupported operator '{}' on '{}'",
                        raw_op, field
                    ))
                })?),
                None => None,
            };

            let value = parse_value(spec, raw)?;
            let predicate = match op {
                Some(op) => Predicate::Range(field.to_string(), op, value),
                None => Predicate::Eq(field.to_string(), value),
            };
            self.filter = self.filter.and(predicate);
        }
        Ok(self)
    }

    pub fn sort(mut self) -> Self {
        let requested: Vec<SortKey> = self
            .spec
            .sort
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .filter_map(|token| {
                let (field, descending) = match token.strip_prefix('-') {
                    Some(field) => (field, true),
                    None => (token, false),
                };
                match self.schema.field(field) {
                    Some(spec) if spec.sortable() => Some(SortKey {
                        field: field.to_string(),
                        descending,
                    }),
                    _ => {
                        tracing::debug!(field = %field, "Dropping sort on unknown field");
                        None
                    }
                }
            })
            .collect();

        self.sort = if requested.is_empty() {
            vec![SortKey {
                field: "createdAt".to_string(),
                descending: true,
            }]
        } else {
            requested
        };
        self
    }

    pub fn paginate(mut self) -> Self {
        self.page = self.spec.page();
        self.limit = self.spec.limit();
        self
    }

    pub fn fields(mut self) -> Self {
        let selected: Vec<String> = self
            .spec
            .fields
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|f| {
                self.schema
                    .field(f)
                    .map(|spec| spec.selectable())
                    .unwrap_or(false)
            })
            .map(str::to_string)
            .collect();

        self.projection = if selected.is_empty() {
            Projection::Exclude(hidden_fields(self.schema))
        } else {
            Projection::Include(selected)
        };
        self
    }

    pub fn build(self) -> QueryPlan {
        QueryPlan {
            filter: self.filter,
            sort: self.sort,
            page: self.page,
            limit: self.limit,
            skip: (self.page - 1).saturating_mul(self.limit).min(MAX_WINDOW),
            projection: self.projection,
        }
    }
}

fn hidden_fields(schema: &QuerySchema) -> Vec<String> {
    schema.hidden.iter().map(|f| f.to_string()).collect()
}

/// `field` or `field[op]`.
fn split_operator(key: &str) -> Option<(&str, Option<&str>)> {
    match key.split_once('[') {
        None => Some((key, None)),
        Some((field, rest)) => {
            let op = rest.strip_suffix(']')?;
            if field.is_empty() || op.is_empty() || op.contains(['[', ']']) {
                return None;
            }
            Some((field, Some(op)))
        }
    }
}

fn parse_value(field: &FieldSpec, raw: &str) -> Result<Bson, ServiceError> {
    let invalid = || {
        ServiceError::bad_request(format!(
            "Invalid value '{}' for field '{}'",
            raw, field.name
        ))
    };

    match field.kind {
        FieldKind::Text | FieldKind::Keyword => Ok(Bson::String(raw.to_string())),
        FieldKind::Number => {
            if let Ok(n) = raw.parse::<i64>() {
                Ok(Bson::Int64(n))
            } else {
                raw.parse::<f64>()
                    .ok()
                    .filter(|n| n.is_finite())
                    .map(Bson::Double)
                    .ok_or_else(invalid)
            }
        }
        FieldKind::Bool => match raw {
            "true" => Ok(Bson::Boolean(true)),
            "false" => Ok(Bson::Boolean(false)),
            _ => Err(invalid()),
        },
        FieldKind::DateTime => parse_datetime(raw)
            .map(|dt| Bson::DateTime(bson::DateTime::from_chrono(dt)))
            .ok_or_else(invalid),
    }
}

fn parse_datetime(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}
