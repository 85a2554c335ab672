//! Pocket ID admin API client.
//!
//! # Architecture
//!
//! - [`IdentityApi`] - Resource-shaped CRUD seam the reconciliation engine is
//!   written against. Absence is `Ok(None)`, never an error.
//! - [`PocketIdClient`] - The HTTP implementation (`X-API-KEY` auth, JSON bodies)
//! - [`retry`] - Transport-level retry with exponential backoff and jitter
//! - [`logo`] - Out-of-band OIDC client logo download and validation
//!
//! Transient failures (connect errors, 408/429/5xx) are retried inside the
//! client, so callers only ever see the final outcome of an operation.

pub mod error;
pub mod logo;
pub mod pocketid;
pub mod retry;

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use reqwest::redirect;

pub use error::{ApiError, LogoError};
pub use pocketid::PocketIdClient;
pub use reqwest::StatusCode;
pub use retry::RetryConfig;

pub use pocketctl_types;
use pocketctl_types::{
    ExternalId, GroupRequest, OidcClientRequest, RemoteGroup, RemoteOidcClient, RemoteUser,
    StableName, UserRequest,
};

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

const CONNECT_TIMEOUT_SECS: u64 = 10;
const TCP_KEEPALIVE_SECS: u64 = 60;
const POOL_MAX_IDLE_PER_HOST: usize = 16;
const POOL_IDLE_TIMEOUT_SECS: u64 = 90;
const MAX_REDIRECTS: usize = 5;

/// Future returned by every [`IdentityApi`] operation.
pub type ApiFut<'a, T> = Pin<Box<dyn Future<Output = Result<T, ApiError>> + Send + 'a>>;

/// Typed CRUD facade over the identity provider.
///
/// `get_*` looks an object up by primary key and `find_*` by its stable name
/// (username, group name, client name). Deletes and membership removals treat
/// an already-absent object as success.
pub trait IdentityApi: Send + Sync {
    fn get_user<'a>(&'a self, id: &'a ExternalId) -> ApiFut<'a, Option<RemoteUser>>;
    fn find_user<'a>(&'a self, username: &'a StableName) -> ApiFut<'a, Option<RemoteUser>>;
    fn create_user<'a>(&'a self, request: &'a UserRequest) -> ApiFut<'a, RemoteUser>;
    fn update_user<'a>(
        &'a self,
        id: &'a ExternalId,
        request: &'a UserRequest,
    ) -> ApiFut<'a, RemoteUser>;
    fn delete_user<'a>(&'a self, id: &'a ExternalId) -> ApiFut<'a, ()>;

    fn get_group<'a>(&'a self, id: &'a ExternalId) -> ApiFut<'a, Option<RemoteGroup>>;
    fn find_group<'a>(&'a self, name: &'a StableName) -> ApiFut<'a, Option<RemoteGroup>>;
    fn create_group<'a>(&'a self, request: &'a GroupRequest) -> ApiFut<'a, RemoteGroup>;
    fn update_group<'a>(
        &'a self,
        id: &'a ExternalId,
        request: &'a GroupRequest,
    ) -> ApiFut<'a, RemoteGroup>;
    fn delete_group<'a>(&'a self, id: &'a ExternalId) -> ApiFut<'a, ()>;

    fn get_oidc_client<'a>(&'a self, id: &'a ExternalId)
    -> ApiFut<'a, Option<RemoteOidcClient>>;
    fn find_oidc_client<'a>(
        &'a self,
        name: &'a StableName,
    ) -> ApiFut<'a, Option<RemoteOidcClient>>;
    fn create_oidc_client<'a>(
        &'a self,
        request: &'a OidcClientRequest,
    ) -> ApiFut<'a, RemoteOidcClient>;
    fn update_oidc_client<'a>(
        &'a self,
        id: &'a ExternalId,
        request: &'a OidcClientRequest,
    ) -> ApiFut<'a, RemoteOidcClient>;
    fn delete_oidc_client<'a>(&'a self, id: &'a ExternalId) -> ApiFut<'a, ()>;

    /// Adds (`present = true`) or removes a user's group membership.
    fn set_user_membership<'a>(
        &'a self,
        user: &'a ExternalId,
        group: &'a ExternalId,
        present: bool,
    ) -> ApiFut<'a, ()>;
    /// True when the user's group names contain the group's name. Either
    /// object being absent reads as "not a member".
    fn has_user_membership<'a>(
        &'a self,
        user: &'a ExternalId,
        group: &'a ExternalId,
    ) -> ApiFut<'a, bool>;

    fn set_client_membership<'a>(
        &'a self,
        client: &'a ExternalId,
        group: &'a ExternalId,
        present: bool,
    ) -> ApiFut<'a, ()>;
    fn has_client_membership<'a>(
        &'a self,
        client: &'a ExternalId,
        group: &'a ExternalId,
    ) -> ApiFut<'a, bool>;

    /// Downloads the image at `logo_url` and uploads it as the client's logo.
    fn upload_client_logo<'a>(&'a self, id: &'a ExternalId, logo_url: &'a str)
    -> ApiFut<'a, ()>;
}

/// Build the shared HTTP client. Clone it rather than building one per call;
/// clones share the connection pool.
pub fn http_client(timeout: Duration) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .user_agent(concat!("pocketctl/", env!("CARGO_PKG_VERSION")))
        .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
        .timeout(timeout)
        .redirect(redirect::Policy::limited(MAX_REDIRECTS))
        .tcp_keepalive(Some(Duration::from_secs(TCP_KEEPALIVE_SECS)))
        .pool_max_idle_per_host(POOL_MAX_IDLE_PER_HOST)
        .pool_idle_timeout(Some(Duration::from_secs(POOL_IDLE_TIMEOUT_SECS)))
        .build()
}
