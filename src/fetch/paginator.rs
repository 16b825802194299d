//! Cursor-based pagination driver
//!
//! Drives one connection (`pageInfo { endCursor hasNextPage } nodes`) to
//! completion or to a soft result limit. The limit is checked between
//! pages only, so the final page may push the total past the limit by up
//! to one page; callers that need an exact count truncate themselves.

use crate::client::QueryClient;
use crate::error::QueryError;
use crate::graph::Record;
use serde_json::{Map, Value};
use tracing::{debug, instrument};

/// Page size ceiling imposed by the remote API
pub const MAX_PAGE_SIZE: usize = 100;

/// One paginated collection fetch.
#[derive(Debug, Clone)]
pub struct PageRequest {
    /// Query document
    pub document: String,
    /// Variables sent with every page (cursor and size are added per page)
    pub variables: Map<String, Value>,
    /// Dotted path from the response data to the connection object
    pub connection: String,
    pub cursor_variable: String,
    pub size_variable: String,
    /// Requested page size, clamped into `[1, MAX_PAGE_SIZE]`
    pub page_size: Option<usize>,
    /// Soft cap on accumulated records
    pub result_limit: Option<usize>,
}

impl PageRequest {
    pub fn new(document: impl Into<String>, connection: impl Into<String>) -> Self {
        Self {
            document: document.into(),
            variables: Map::new(),
            connection: connection.into(),
            cursor_variable: "after".to_string(),
            size_variable: "first".to_string(),
            page_size: None,
            result_limit: None,
        }
    }

    pub fn with_variable(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.variables.insert(name.into(), value.into());
        self
    }

    pub fn with_variables(mut self, variables: Map<String, Value>) -> Self {
        self.variables.extend(variables);
        self
    }

    pub fn with_cursor_variable(mut self, name: impl Into<String>) -> Self {
        self.cursor_variable = name.into();
        self
    }

    pub fn with_size_variable(mut self, name: impl Into<String>) -> Self {
        self.size_variable = name.into();
        self
    }

    pub fn with_page_size(mut self, page_size: Option<usize>) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn with_result_limit(mut self, limit: Option<usize>) -> Self {
        self.result_limit = limit;
        self
    }

    /// Page size actually sent to the remote
    pub fn effective_page_size(&self) -> usize {
        self.page_size
            .unwrap_or(MAX_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE)
    }
}

/// Outcome of a completed pagination.
#[derive(Debug, Clone)]
pub struct Pagination {
    pub records: Vec<Record>,
    /// Full response data of the last page (for enclosing objects)
    pub last_data: Value,
    pub pages: usize,
}

struct Page {
    nodes: Vec<Record>,
    end_cursor: Option<String>,
    has_next_page: bool,
}

/// Pages through a connection with a borrowed client.
pub struct Paginator<'a> {
    client: &'a dyn QueryClient,
}

impl<'a> Paginator<'a> {
    pub fn new(client: &'a dyn QueryClient) -> Self {
        Self { client }
    }

    /// Fetch every record of the connection (up to the soft limit).
    ///
    /// Any client failure aborts the whole pagination; records from
    /// earlier pages are discarded.
    pub async fn paginate(&self, request: &PageRequest) -> Result<Vec<Record>, QueryError> {
        Ok(self.run(request).await?.records)
    }

    #[instrument(level = "debug", skip(self, request), fields(connection = %request.connection))]
    pub async fn run(&self, request: &PageRequest) -> Result<Pagination, QueryError> {
        let page_size = request.effective_page_size();
        let mut cursor: Option<String> = None;
        let mut records: Vec<Record> = Vec::new();
        let mut pages = 0;

        loop {
            let mut variables = request.variables.clone();
            variables.insert(
                request.cursor_variable.clone(),
                cursor.clone().map(Value::String).unwrap_or(Value::Null),
            );
            variables.insert(request.size_variable.clone(), Value::from(page_size));

            let data = self
                .client
                .execute(&request.document, &Value::Object(variables))
                .await?;
            let page = parse_page(&data, &request.connection)?;
            pages += 1;
            records.extend(page.nodes);

            debug!(
                page = pages,
                accumulated = records.len(),
                has_next_page = page.has_next_page,
                "fetched page"
            );

            let reached_limit = request
                .result_limit
                .is_some_and(|limit| records.len() >= limit);
            if !page.has_next_page || reached_limit {
                return Ok(Pagination {
                    records,
                    last_data: data,
                    pages,
                });
            }

            match page.end_cursor {
                Some(next) => cursor = Some(next),
                None => {
                    return Err(QueryError::malformed(
                        format!("{}.pageInfo.endCursor", request.connection),
                        "hasNextPage is true but endCursor is null",
                    ))
                }
            }
        }
    }
}

/// Navigate a dotted path inside a JSON value.
pub(crate) fn value_at<'v>(data: &'v Value, path: &str) -> Option<&'v Value> {
    path.split('.')
        .filter(|s| !s.is_empty())
        .try_fold(data, |current, segment| current.get(segment))
}

fn parse_page(data: &Value, connection: &str) -> Result<Page, QueryError> {
    let conn = value_at(data, connection)
        .filter(|v| v.is_object())
        .ok_or_else(|| QueryError::malformed(connection, "connection missing from response"))?;

    let page_info = conn
        .get("pageInfo")
        .ok_or_else(|| QueryError::malformed(format!("{}.pageInfo", connection), "missing"))?;
    let has_next_page = page_info
        .get("hasNextPage")
        .and_then(Value::as_bool)
        .ok_or_else(|| {
            QueryError::malformed(format!("{}.pageInfo.hasNextPage", connection), "not a boolean")
        })?;
    let end_cursor = page_info
        .get("endCursor")
        .and_then(Value::as_str)
        .map(str::to_string);

    let raw_nodes = conn
        .get("nodes")
        .and_then(Value::as_array)
        .ok_or_else(|| QueryError::malformed(format!("{}.nodes", connection), "not an array"))?;

    let mut nodes = Vec::with_capacity(raw_nodes.len());
    for node in raw_nodes {
        match node {
            Value::Object(map) => nodes.push(map.clone()),
            // The remote returns null for entries the token cannot see
            Value::Null => {}
            _ => {
                return Err(QueryError::malformed(
                    format!("{}.nodes", connection),
                    "node is not an object",
                ))
            }
        }
    }

    Ok(Page {
        nodes,
        end_cursor,
        has_next_page,
    })
}
