use futures_util::future::BoxFuture;
use tracing::{debug, warn};

use pocketctl_client::{ApiFut, IdentityApi};
use pocketctl_types::{
    ConnectionDetails, ExternalId, OidcClientObservation, OidcClientRequest, OidcClientSpec,
    RemoteOidcClient, ResourceKind, StableName, same_multiset,
};

use crate::ManagedKind;

pub struct OidcClientKind;

fn request(spec: &OidcClientSpec) -> OidcClientRequest {
    OidcClientRequest {
        client_name: spec.name.clone(),
        redirect_uris: spec.callback_urls.clone(),
        post_logout_uris: spec.logout_callback_urls.clone(),
        launch_url: spec.launch_url.clone(),
        is_public: spec.is_public,
        require_pkce: spec.pkce_enabled,
        custom_claims: spec.custom_claims.clone(),
    }
}

impl ManagedKind for OidcClientKind {
    type Spec = OidcClientSpec;
    type Observation = OidcClientObservation;
    type Remote = RemoteOidcClient;

    const KIND: ResourceKind = ResourceKind::OidcClient;

    fn spec_stable_name(spec: &OidcClientSpec) -> &str {
        &spec.name
    }

    fn remote_id(remote: &RemoteOidcClient) -> ExternalId {
        ExternalId::from_remote(remote.id.as_str())
    }

    fn observe(remote: &RemoteOidcClient) -> OidcClientObservation {
        OidcClientObservation::from(remote)
    }

    /// Callback URL lists compare as multisets. The logo and custom claims
    /// are not compared; Pocket ID does not echo claims for clients.
    fn is_up_to_date(spec: &OidcClientSpec, remote: &RemoteOidcClient) -> bool {
        spec.name == remote.client_name
            && spec.launch_url == remote.launch_url
            && spec.is_public == remote.is_public
            && spec.pkce_enabled == remote.require_pkce
            && same_multiset(&spec.callback_urls, &remote.redirect_uris)
            && same_multiset(&spec.logout_callback_urls, &remote.post_logout_uris)
    }

    /// Confidential clients publish their id and secret. Public clients
    /// have no secret.
    fn connection_details(remote: &RemoteOidcClient) -> ConnectionDetails {
        let mut details = ConnectionDetails::new();
        if remote.is_public {
            return details;
        }
        if let Some(secret) = remote.client_secret.as_deref()
            && !secret.is_empty()
        {
            details.insert(ConnectionDetails::CLIENT_ID, remote.id.as_str());
            details.insert(ConnectionDetails::CLIENT_SECRET, secret);
        }
        details
    }

    fn get<'a>(
        api: &'a dyn IdentityApi,
        id: &'a ExternalId,
    ) -> ApiFut<'a, Option<RemoteOidcClient>> {
        api.get_oidc_client(id)
    }

    fn discover<'a>(
        api: &'a dyn IdentityApi,
        key: &'a StableName,
    ) -> ApiFut<'a, Option<RemoteOidcClient>> {
        api.find_oidc_client(key)
    }

    fn create<'a>(
        api: &'a dyn IdentityApi,
        spec: &'a OidcClientSpec,
    ) -> ApiFut<'a, RemoteOidcClient> {
        Box::pin(async move { api.create_oidc_client(&request(spec)).await })
    }

    fn update<'a>(
        api: &'a dyn IdentityApi,
        id: &'a ExternalId,
        spec: &'a OidcClientSpec,
    ) -> ApiFut<'a, RemoteOidcClient> {
        Box::pin(async move { api.update_oidc_client(id, &request(spec)).await })
    }

    fn delete<'a>(api: &'a dyn IdentityApi, id: &'a ExternalId) -> ApiFut<'a, ()> {
        api.delete_oidc_client(id)
    }

    fn converge_out_of_band<'a>(
        api: &'a dyn IdentityApi,
        id: &'a ExternalId,
        spec: &'a OidcClientSpec,
    ) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            let Some(logo_url) = spec.logo_url.as_deref().filter(|url| !url.trim().is_empty())
            else {
                return;
            };
            match api.upload_client_logo(id, logo_url).await {
                Ok(()) => debug!(id = %id, logo_url, "Uploaded OIDC client logo"),
                Err(e) => warn!(id = %id, logo_url, "Failed to upload OIDC client logo: {e}"),
            }
        })
    }
}
