//! HTTP implementation of [`IdentityApi`] against the Pocket ID admin API.

use std::time::Duration;

use futures_util::StreamExt;
use reqwest::multipart::{Form, Part};
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use url::Url;

use pocketctl_types::{
    ApiKey, ExternalId, GroupRequest, OidcClientRequest, RemoteGroup, RemoteOidcClient,
    RemoteUser, StableName, UserRequest,
};

use crate::logo::download_logo;
use crate::retry::{Replay, RetryConfig, RetryOutcome, send_with_retry};
use crate::{ApiError, ApiFut, IdentityApi, http_client};

const API_KEY_HEADER: &str = "X-API-KEY";
const MAX_ERROR_BODY_BYTES: usize = 32 * 1024;

const USERS_PATH: &str = "/api/users";
const GROUPS_PATH: &str = "/api/groups";
const OIDC_CLIENTS_PATH: &str = "/api/oidc/clients";

/// List responses are either a bare array or a paginated envelope.
#[derive(serde::Deserialize)]
#[serde(untagged)]
enum ListBody<T> {
    Bare(Vec<T>),
    Paged { data: Vec<T> },
}

impl<T> ListBody<T> {
    fn into_items(self) -> Vec<T> {
        match self {
            Self::Bare(items) | Self::Paged { data: items } => items,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PocketIdClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: ApiKey,
    retry: RetryConfig,
}

impl PocketIdClient {
    /// Creates a client for `endpoint` (scheme and host, optionally a path
    /// prefix). A trailing `/` is trimmed.
    pub fn new(endpoint: &str, api_key: ApiKey, timeout: Duration) -> Result<Self, ApiError> {
        let trimmed = endpoint.trim().trim_end_matches('/');
        let parsed = Url::parse(trimmed).map_err(|e| ApiError::InvalidEndpoint {
            endpoint: endpoint.to_string(),
            reason: e.to_string(),
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ApiError::InvalidEndpoint {
                endpoint: endpoint.to_string(),
                reason: format!("unsupported scheme {:?}", parsed.scheme()),
            });
        }
        let http = http_client(timeout).map_err(|e| ApiError::InvalidEndpoint {
            endpoint: endpoint.to_string(),
            reason: format!("failed to build HTTP client: {e}"),
        })?;

        Ok(Self {
            http,
            endpoint: trimmed.to_string(),
            api_key,
            retry: RetryConfig::default(),
        })
    }

    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http
            .request(method, format!("{}{path}", self.endpoint))
            .header(API_KEY_HEADER, self.api_key.expose_secret())
    }

    /// Sends with retry. Non-2xx responses are returned, not turned into
    /// errors, so callers can special-case 404. A `POST` is only resent when
    /// the server cannot have created anything.
    async fn execute<B>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<Response, ApiError>
    where
        B: Serialize + Sync + ?Sized,
    {
        let replay = Replay::for_method(&method);
        let build = || {
            let request = self.request(method.clone(), path);
            match body {
                Some(body) => request.json(body),
                None => request,
            }
        };
        match send_with_retry(build, replay, &self.retry).await {
            RetryOutcome::Success(response) | RetryOutcome::HttpError(response) => Ok(response),
            RetryOutcome::ConnectionError { attempts, source } => Err(ApiError::Transport {
                path: path.to_string(),
                attempts,
                source,
            }),
        }
    }

    async fn get_optional<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>, ApiError> {
        let response = self.execute::<()>(Method::GET, path, None).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = check_response(response).await?;
        decode(path, response).await.map(Some)
    }

    // TODO: follow `pagination.totalPages` once list endpoints are queried with
    // page parameters; today only the first page of a paginated envelope is read.
    async fn list<T: DeserializeOwned>(&self, path: &str) -> Result<Vec<T>, ApiError> {
        let response = self.execute::<()>(Method::GET, path, None).await?;
        let response = check_response(response).await?;
        decode::<ListBody<T>>(path, response)
            .await
            .map(ListBody::into_items)
    }

    async fn send_json<B, T>(&self, method: Method, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + Sync,
        T: DeserializeOwned,
    {
        let response = self.execute(method, path, Some(body)).await?;
        let response = check_response(response).await?;
        decode(path, response).await
    }

    /// `DELETE` where an absent target counts as done.
    async fn delete_path(&self, path: &str) -> Result<(), ApiError> {
        let response = self.execute::<()>(Method::DELETE, path, None).await?;
        if response.status() == StatusCode::NOT_FOUND {
            tracing::debug!(path, "Delete target already absent");
            return Ok(());
        }
        check_response(response).await.map(drop)
    }

    async fn post_empty(&self, path: &str) -> Result<(), ApiError> {
        let response = self.execute::<()>(Method::POST, path, None).await?;
        check_response(response).await.map(drop)
    }

    async fn find_by<T, F>(&self, path: &str, matches: F) -> Result<Option<T>, ApiError>
    where
        T: DeserializeOwned,
        F: Fn(&T) -> bool,
    {
        let items: Vec<T> = self.list(path).await?;
        Ok(items.into_iter().find(|item| matches(item)))
    }

    async fn upload_logo(&self, id: &ExternalId, logo_url: &str) -> Result<(), ApiError> {
        let logo = download_logo(&self.http, logo_url, &self.retry).await?;
        let path = format!("{OIDC_CLIENTS_PATH}/{id}/logo");
        let build = || {
            let part = Part::bytes(logo.bytes.clone()).file_name(logo.file_name.clone());
            self.request(Method::PUT, &path).multipart(Form::new().part("file", part))
        };
        let response = match send_with_retry(build, Replay::Idempotent, &self.retry).await {
            RetryOutcome::Success(response) | RetryOutcome::HttpError(response) => response,
            RetryOutcome::ConnectionError { attempts, source } => {
                return Err(ApiError::Transport {
                    path,
                    attempts,
                    source,
                });
            }
        };
        check_response(response).await.map(drop)
    }
}

async fn check_response(response: Response) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_client_error() || status.is_server_error() {
        let body = read_capped_error_body(response).await;
        return Err(ApiError::Status { status, body });
    }
    Ok(response)
}

async fn decode<T: DeserializeOwned>(path: &str, response: Response) -> Result<T, ApiError> {
    response.json::<T>().await.map_err(|source| ApiError::Decode {
        path: path.to_string(),
        source,
    })
}

async fn read_capped_error_body(response: Response) -> String {
    let mut body = Vec::new();
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let Ok(chunk) = chunk else { break };
        body.extend_from_slice(&chunk);
        if body.len() > MAX_ERROR_BODY_BYTES {
            body.truncate(MAX_ERROR_BODY_BYTES);
            let text = String::from_utf8_lossy(&body);
            return format!("{text}...(truncated)");
        }
    }
    String::from_utf8_lossy(&body).into_owned()
}

impl IdentityApi for PocketIdClient {
    fn get_user<'a>(&'a self, id: &'a ExternalId) -> ApiFut<'a, Option<RemoteUser>> {
        Box::pin(async move { self.get_optional(&format!("{USERS_PATH}/{id}")).await })
    }

    fn find_user<'a>(&'a self, username: &'a StableName) -> ApiFut<'a, Option<RemoteUser>> {
        Box::pin(async move {
            self.find_by(USERS_PATH, |user: &RemoteUser| {
                user.username == username.as_str()
            })
            .await
        })
    }

    fn create_user<'a>(&'a self, request: &'a UserRequest) -> ApiFut<'a, RemoteUser> {
        Box::pin(async move { self.send_json(Method::POST, USERS_PATH, request).await })
    }

    fn update_user<'a>(
        &'a self,
        id: &'a ExternalId,
        request: &'a UserRequest,
    ) -> ApiFut<'a, RemoteUser> {
        Box::pin(async move {
            self.send_json(Method::PUT, &format!("{USERS_PATH}/{id}"), request)
                .await
        })
    }

    fn delete_user<'a>(&'a self, id: &'a ExternalId) -> ApiFut<'a, ()> {
        Box::pin(async move { self.delete_path(&format!("{USERS_PATH}/{id}")).await })
    }

    fn get_group<'a>(&'a self, id: &'a ExternalId) -> ApiFut<'a, Option<RemoteGroup>> {
        Box::pin(async move { self.get_optional(&format!("{GROUPS_PATH}/{id}")).await })
    }

    fn find_group<'a>(&'a self, name: &'a StableName) -> ApiFut<'a, Option<RemoteGroup>> {
        Box::pin(async move {
            self.find_by(GROUPS_PATH, |group: &RemoteGroup| {
                group.group_name == name.as_str()
            })
            .await
        })
    }

    fn create_group<'a>(&'a self, request: &'a GroupRequest) -> ApiFut<'a, RemoteGroup> {
        Box::pin(async move { self.send_json(Method::POST, GROUPS_PATH, request).await })
    }

    fn update_group<'a>(
        &'a self,
        id: &'a ExternalId,
        request: &'a GroupRequest,
    ) -> ApiFut<'a, RemoteGroup> {
        Box::pin(async move {
            self.send_json(Method::PUT, &format!("{GROUPS_PATH}/{id}"), request)
                .await
        })
    }

    fn delete_group<'a>(&'a self, id: &'a ExternalId) -> ApiFut<'a, ()> {
        Box::pin(async move { self.delete_path(&format!("{GROUPS_PATH}/{id}")).await })
    }

    fn get_oidc_client<'a>(
        &'a self,
        id: &'a ExternalId,
    ) -> ApiFut<'a, Option<RemoteOidcClient>> {
        Box::pin(async move {
            self.get_optional(&format!("{OIDC_CLIENTS_PATH}/{id}"))
                .await
        })
    }

    fn find_oidc_client<'a>(
        &'a self,
        name: &'a StableName,
    ) -> ApiFut<'a, Option<RemoteOidcClient>> {
        Box::pin(async move {
            self.find_by(OIDC_CLIENTS_PATH, |client: &RemoteOidcClient| {
                client.client_name == name.as_str()
            })
            .await
        })
    }

    fn create_oidc_client<'a>(
        &'a self,
        request: &'a OidcClientRequest,
    ) -> ApiFut<'a, RemoteOidcClient> {
        Box::pin(async move {
            self.send_json(Method::POST, OIDC_CLIENTS_PATH, request)
                .await
        })
    }

    fn update_oidc_client<'a>(
        &'a self,
        id: &'a ExternalId,
        request: &'a OidcClientRequest,
    ) -> ApiFut<'a, RemoteOidcClient> {
        Box::pin(async move {
            self.send_json(Method::PUT, &format!("{OIDC_CLIENTS_PATH}/{id}"), request)
                .await
        })
    }

    fn delete_oidc_client<'a>(&'a self, id: &'a ExternalId) -> ApiFut<'a, ()> {
        Box::pin(async move {
            self.delete_path(&format!("{OIDC_CLIENTS_PATH}/{id}"))
                .await
        })
    }

    fn set_user_membership<'a>(
        &'a self,
        user: &'a ExternalId,
        group: &'a ExternalId,
        present: bool,
    ) -> ApiFut<'a, ()> {
        Box::pin(async move {
            let path = format!("{USERS_PATH}/{user}/groups/{group}");
            if present {
                self.post_empty(&path).await
            } else {
                self.delete_path(&path).await
            }
        })
    }

    fn has_user_membership<'a>(
        &'a self,
        user: &'a ExternalId,
        group: &'a ExternalId,
    ) -> ApiFut<'a, bool> {
        Box::pin(async move {
            let Some(user) = self.get_user(user).await? else {
                return Ok(false);
            };
            let Some(group) = self.get_group(group).await? else {
                return Ok(false);
            };
            Ok(user.user_groups.contains(&group.group_name))
        })
    }

    fn set_client_membership<'a>(
        &'a self,
        client: &'a ExternalId,
        group: &'a ExternalId,
        present: bool,
    ) -> ApiFut<'a, ()> {
        Box::pin(async move {
            let path = format!("{OIDC_CLIENTS_PATH}/{client}/groups/{group}");
            if present {
                self.post_empty(&path).await
            } else {
                self.delete_path(&path).await
            }
        })
    }

    fn has_client_membership<'a>(
        &'a self,
        client: &'a ExternalId,
        group: &'a ExternalId,
    ) -> ApiFut<'a, bool> {
        Box::pin(async move {
            let Some(client) = self.get_oidc_client(client).await? else {
                return Ok(false);
            };
            let Some(group) = self.get_group(group).await? else {
                return Ok(false);
            };
            Ok(client.group_names.contains(&group.group_name))
        })
    }

    fn upload_client_logo<'a>(
        &'a self,
        id: &'a ExternalId,
        logo_url: &'a str,
    ) -> ApiFut<'a, ()> {
        Box::pin(async move { self.upload_logo(id, logo_url).await })
    }
}
