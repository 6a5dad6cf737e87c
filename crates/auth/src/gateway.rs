// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Outgoing API calls with bearer attachment and retry-once-after-refresh.

use std::sync::Arc;

use reqwest::header::{HeaderValue, AUTHORIZATION};
use reqwest::{Method, Request, RequestBuilder, Response, StatusCode};
use tracing::{debug, warn};

use crate::client::AuthClient;
use crate::error::AuthError;
use crate::event::LogoutReason;
use crate::single_flight::RefreshCoordinator;
use crate::validator::TokenValidator;
use crate::vault::SessionVault;

fn is_auth_failure(status: StatusCode) -> bool {
    status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN
}

/// Set the bearer header on `req` if `vault` holds a valid access token.
/// Returns the token that was attached.
pub(crate) fn attach_bearer(
    vault: &SessionVault,
    validator: &TokenValidator,
    req: &mut Request,
) -> Option<String> {
    let token =
        vault.access_token().ok().flatten().filter(|t| validator.is_valid(Some(t.as_str())))?;
    let value = HeaderValue::from_str(&format!("Bearer {token}")).ok()?;
    req.headers_mut().insert(AUTHORIZATION, value);
    Some(token)
}

/// Wraps every API call made on behalf of the signed-in user.
pub struct RequestGateway {
    http: reqwest::Client,
    vault: Arc<SessionVault>,
    validator: TokenValidator,
    coordinator: Arc<RefreshCoordinator>,
    client: Arc<AuthClient>,
}

impl RequestGateway {
    pub fn new(
        http: reqwest::Client,
        vault: Arc<SessionVault>,
        validator: TokenValidator,
        coordinator: Arc<RefreshCoordinator>,
        client: Arc<AuthClient>,
    ) -> Self {
        Self { http, vault, validator, coordinator, client }
    }

    /// Start building a request on the gateway's HTTP client.
    pub fn request(&self, method: Method, url: &str) -> RequestBuilder {
        self.http.request(method, url)
    }

    /// Set the bearer header if a valid access token is stored.
    ///
    /// Returns the token that was attached.
    pub fn attach(&self, req: &mut Request) -> Option<String> {
        attach_bearer(&self.vault, &self.validator, req)
    }

    /// Build and execute.
    pub async fn send(&self, builder: RequestBuilder) -> Result<Response, AuthError> {
        let req = builder.build().map_err(AuthError::network)?;
        self.execute(req).await
    }

    /// Execute `req`, refreshing and resending exactly once on 401/403.
    ///
    /// Non-authorization responses, including other error statuses, are
    /// returned untouched. A request whose body cannot be cloned is not
    /// resent.
    pub async fn execute(&self, req: Request) -> Result<Response, AuthError> {
        let mut pending = req;
        let mut retried = false;

        loop {
            let retry = if retried { None } else { pending.try_clone() };
            let epoch = self.vault.epoch();
            let sent_token = self.attach(&mut pending);
            let url = pending.url().clone();

            let resp = self.http.execute(pending).await?;
            let status = resp.status();
            if !is_auth_failure(status) {
                return Ok(resp);
            }

            if retried {
                warn!(%url, %status, "request rejected again after refresh, giving up");
                return Err(AuthError::AuthorizationFailure { status: status.as_u16() });
            }
            let Some(next) = retry else {
                debug!(%url, %status, "request body not replayable, not retrying");
                return Err(AuthError::AuthorizationFailure { status: status.as_u16() });
            };
            retried = true;

            if self.token_changed_since(sent_token.as_deref()) {
                debug!(%url, "access token already replaced by a concurrent refresh");
            } else if let Err(e) = self.coordinator.refresh().await {
                if self.vault.epoch() != epoch && self.token_changed_since(sent_token.as_deref()) {
                    debug!(%url, "new session started during refresh, resending with it");
                } else {
                    warn!(%url, err = %e, "refresh after authorization failure failed, logging out");
                    self.client.logout_with_reason(LogoutReason::RefreshFailed, epoch).await;
                    return Err(AuthError::AuthorizationFailure { status: status.as_u16() });
                }
            }

            pending = next;
        }
    }

    /// A valid access token other than the one we sent is already stored.
    fn token_changed_since(&self, sent: Option<&str>) -> bool {
        match self.vault.access_token().ok().flatten() {
            Some(current) => {
                sent != Some(current.as_str()) && self.validator.is_valid(Some(current.as_str()))
            }
            None => false,
        }
    }
}
