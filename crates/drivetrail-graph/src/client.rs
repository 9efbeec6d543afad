//! Microsoft Graph API client
//!
//! Provides a typed HTTP client for the Graph endpoints Drivetrail
//! consumes. Handles the bearer header, base URL construction, deadline,
//! and classification of every non-success outcome into [`GatewayError`].
//!
//! ## Usage
//!
//! ```rust,no_run
//! use drivetrail_graph::client::GraphClient;
//!
//! # async fn example() {
//! let client = GraphClient::new("bearer-credential-here");
//! match client.probe_identity().await {
//!     probe => println!("{probe:?}"),
//! }
//! # }
//! ```

use std::time::Duration;

use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, warn};

use drivetrail_core::domain::newtypes::DriveId;
use drivetrail_core::ports::provider::{GatewayError, IdentityProbe, Principal, ProbeFailure};

use crate::error::{classify_response, classify_transport};

/// Base URL for Microsoft Graph API v1.0
const GRAPH_BASE_URL: &str = "https://graph.microsoft.com/v1.0";

/// Deadline applied to every request; an expired deadline surfaces as a
/// transient error and never advances any cursor.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

// ============================================================================
// Graph API response types
// ============================================================================

/// Response from the /me endpoint
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MeResponse {
    /// User ID
    id: Option<String>,
    /// User's principal name (typically the sign-in address)
    user_principal_name: Option<String>,
    /// User's email (mail field), fallback for the principal name
    mail: Option<String>,
}

/// Response from the /me/drive endpoint
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DriveResponse {
    /// Drive ID
    id: Option<String>,
}

// ============================================================================
// GraphClient
// ============================================================================

/// HTTP client for Microsoft Graph API calls
///
/// Wraps `reqwest::Client` with the bearer credential and base URL
/// construction. The credential is supplied by configuration and never
/// refreshed here; when it goes stale every call starts returning
/// [`GatewayError::AuthInvalid`] and the credential gate shuts the
/// pipeline down.
pub struct GraphClient {
    /// The underlying HTTP client
    client: Client,
    /// Base URL for API requests
    base_url: String,
    /// Bearer credential passed on every request
    bearer: String,
}

impl GraphClient {
    /// Creates a new GraphClient with the given bearer credential
    pub fn new(bearer: impl Into<String>) -> Self {
        Self::with_base_url(bearer, GRAPH_BASE_URL)
    }

    /// Creates a new GraphClient with a custom base URL (useful for testing)
    pub fn with_base_url(bearer: impl Into<String>, base_url: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url: base_url.into(),
            bearer: bearer.into(),
        }
    }

    /// Returns the base URL for API requests
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Creates an authenticated request builder for the given method and path
    ///
    /// Automatically prepends the base URL and adds the Authorization header.
    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        self.client.request(method, &url).bearer_auth(&self.bearer)
    }

    /// Creates an authenticated request builder for an absolute URL
    ///
    /// Pagination links from the provider are absolute, so they bypass the
    /// base URL entirely.
    pub fn request_url(&self, method: Method, url: &str) -> RequestBuilder {
        self.client.request(method, url).bearer_auth(&self.bearer)
    }

    /// Sends a request and classifies every non-success outcome
    pub(crate) async fn send(
        &self,
        builder: RequestBuilder,
        what: &str,
    ) -> Result<Response, GatewayError> {
        let response = builder
            .send()
            .await
            .map_err(|e| classify_transport(e, what))?;

        if response.status().is_success() {
            Ok(response)
        } else {
            Err(classify_response(response, what).await)
        }
    }

    /// Sends a request and decodes a JSON body
    pub(crate) async fn send_json<T: DeserializeOwned>(
        &self,
        builder: RequestBuilder,
        what: &str,
    ) -> Result<T, GatewayError> {
        self.send(builder, what)
            .await?
            .json::<T>()
            .await
            .map_err(|e| GatewayError::Fatal(format!("{what}: undecodable payload: {e}")))
    }

    // ========================================================================
    // Identity probe
    // ========================================================================

    /// Minimal authenticated read probing credential validity
    ///
    /// `GET /me`, with the outcome derived from the status code alone:
    /// 200 yields the principal, 401 means expired, 403 means forbidden,
    /// transport failure means nothing reached the provider, anything else
    /// is unknown. Never returns an error; the result union is total.
    pub async fn probe_identity(&self) -> IdentityProbe {
        debug!("Probing identity via /me");

        let response = match self.request(Method::GET, "/me").send().await {
            Ok(response) => response,
            Err(err) => {
                warn!(error = %err, "Identity probe did not reach the provider");
                return IdentityProbe::Invalid(ProbeFailure::Transport);
            }
        };

        match response.status() {
            StatusCode::OK => match response.json::<MeResponse>().await {
                Ok(me) => {
                    let principal_name = me
                        .user_principal_name
                        .or(me.mail)
                        .unwrap_or_else(|| "unknown".to_string());
                    IdentityProbe::Valid(Principal {
                        user_id: me.id.unwrap_or_default(),
                        principal_name,
                    })
                }
                Err(err) => {
                    warn!(error = %err, "Identity probe returned an undecodable body");
                    IdentityProbe::Invalid(ProbeFailure::Unknown)
                }
            },
            StatusCode::UNAUTHORIZED => IdentityProbe::Invalid(ProbeFailure::Expired),
            StatusCode::FORBIDDEN => IdentityProbe::Invalid(ProbeFailure::Forbidden),
            status => {
                warn!(%status, "Identity probe returned an unexpected status");
                IdentityProbe::Invalid(ProbeFailure::Unknown)
            }
        }
    }

    /// Resolves the id of the caller's default drive via `GET /me/drive`
    pub async fn resolve_default_drive(&self) -> Result<DriveId, GatewayError> {
        debug!("Resolving default drive via /me/drive");

        let drive: DriveResponse = self
            .send_json(self.request(Method::GET, "/me/drive"), "resolve drive")
            .await?;

        let id = drive
            .id
            .ok_or_else(|| GatewayError::Fatal("resolve drive: response carried no id".into()))?;

        DriveId::new(id).map_err(|e| GatewayError::Fatal(format!("resolve drive: {e}")))
    }
}
