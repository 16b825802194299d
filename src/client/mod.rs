//! Remote query client
//!
//! The aggregation core depends only on [`QueryClient`]; the reqwest-backed
//! [`HttpQueryClient`] talks to the GitHub GraphQL endpoint.

mod http;
mod traits;

pub use http::{HttpClientFactory, HttpQueryClient, GITHUB_GRAPHQL_ENDPOINT};
pub use traits::{ClientFactory, QueryClient};
