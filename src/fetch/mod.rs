//! Collection fetching: cursor pagination and multi-filter fan-out

mod multi_filter;
mod paginator;

pub use multi_filter::{FetchFilter, MultiFilterFetcher, SortDirection, SortSpec, StaticFilter};
pub use paginator::{PageRequest, Pagination, Paginator, MAX_PAGE_SIZE};
pub(crate) use paginator::value_at;
