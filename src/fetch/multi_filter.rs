//! Multi-filter fan-out over the paginator
//!
//! Each filter addresses its own cursor space, so filters paginate
//! concurrently. Results are concatenated in filter order and then
//! stable-sorted once.

use super::paginator::{PageRequest, Paginator};
use crate::client::QueryClient;
use crate::error::QueryError;
use crate::graph::Record;
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use futures::future::try_join_all;
use serde_json::{Map, Value};
use std::cmp::Ordering;
use tracing::{debug, instrument};

/// One member of a filter set.
///
/// `resolve` runs once before the filter's pagination starts and returns
/// the variables merged into every page request (e.g. a category slug
/// looked up into a category id).
#[async_trait]
pub trait FetchFilter: Send + Sync {
    async fn resolve(&self, client: &dyn QueryClient) -> Result<Map<String, Value>, QueryError>;
}

/// A filter whose variables are known up front
#[derive(Debug, Clone, Default)]
pub struct StaticFilter(pub Map<String, Value>);

impl StaticFilter {
    pub fn new(name: impl Into<String>, value: impl Into<Value>) -> Self {
        let mut vars = Map::new();
        vars.insert(name.into(), value.into());
        Self(vars)
    }
}

#[async_trait]
impl FetchFilter for StaticFilter {
    async fn resolve(&self, _client: &dyn QueryClient) -> Result<Map<String, Value>, QueryError> {
        Ok(self.0.clone())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

/// Total ordering applied after concatenation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortSpec {
    /// Top-level timestamp field (RFC 3339)
    pub field: String,
    pub direction: SortDirection,
}

impl SortSpec {
    pub fn new(field: impl Into<String>, direction: SortDirection) -> Self {
        Self {
            field: field.into(),
            direction,
        }
    }

    /// Stable sort by full-precision timestamp.
    ///
    /// Records whose field is missing or not a timestamp go last in both
    /// directions, keeping their relative order.
    pub fn sort(&self, records: &mut [Record]) {
        records.sort_by(|a, b| {
            match (timestamp(a, &self.field), timestamp(b, &self.field)) {
                (Some(x), Some(y)) => match self.direction {
                    SortDirection::Asc => x.cmp(&y),
                    SortDirection::Desc => y.cmp(&x),
                },
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            }
        });
    }
}

fn timestamp(record: &Record, field: &str) -> Option<DateTime<FixedOffset>> {
    record
        .get(field)
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
}

/// Runs one pagination per filter and merges the results.
pub struct MultiFilterFetcher<'a> {
    client: &'a dyn QueryClient,
    sort: Option<SortSpec>,
}

impl<'a> MultiFilterFetcher<'a> {
    pub fn new(client: &'a dyn QueryClient) -> Self {
        Self { client, sort: None }
    }

    pub fn with_sort(mut self, sort: SortSpec) -> Self {
        self.sort = Some(sort);
        self
    }

    /// Fetch `request` once per filter; an empty filter list is a single
    /// unfiltered fetch. The first failing filter fails the whole fetch.
    #[instrument(level = "debug", skip_all, fields(connection = %request.connection, filters = filters.len()))]
    pub async fn fetch(
        &self,
        request: &PageRequest,
        filters: &[Box<dyn FetchFilter>],
    ) -> Result<Vec<Record>, QueryError> {
        let batches = if filters.is_empty() {
            vec![Paginator::new(self.client).paginate(request).await?]
        } else {
            try_join_all(filters.iter().map(|filter| async move {
                let variables = filter.resolve(self.client).await?;
                let filtered = request.clone().with_variables(variables);
                Paginator::new(self.client).paginate(&filtered).await
            }))
            .await?
        };

        let mut records: Vec<Record> = batches.into_iter().flatten().collect();
        debug!(records = records.len(), "filters merged");

        if let Some(sort) = &self.sort {
            sort.sort(&mut records);
        }
        Ok(records)
    }
}
