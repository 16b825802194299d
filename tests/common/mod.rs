//! Common test utilities for octograph integration tests
//!
//! Provides a scripted GitHub GraphQL stand-in, an asset fetcher that
//! never touches the network, and fixture builders.

pub mod fixtures;
pub mod mock_github;

pub use fixtures::{discussion, page_of, user};
pub use mock_github::{FakeAssetFetcher, MockGithub, MockGithubFactory};
