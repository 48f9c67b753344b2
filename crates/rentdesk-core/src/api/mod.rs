//! REST adapter: request/response plumbing shared by the stores.

pub mod auth;
pub mod error;
pub mod query;
pub mod resource;
pub mod transport;

#[cfg(test)]
pub(crate) mod testing;

pub use auth::{KeyringTokens, MemoryTokens, StoredTokens, TokenError, TokenSource};
pub use error::ApiError;
pub use query::{cache_key, encode_query, overlay_params, QueryFilters};
pub use resource::{decode_list, decode_member, ListPage, PageMeta, Resource, ResourceClient};
pub use transport::{ApiRequest, HttpTransport, Transport};
pub use reqwest::Method;
