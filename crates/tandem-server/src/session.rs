//! Bearer-session extractor.
//!
//! Sessions are issued outside this server (or by `tandem-server
//! issue-session` in development). The store only knows the SHA-256 digest
//! of each token, so a leaked database does not leak usable credentials.

use axum::{
  extract::FromRequestParts,
  http::{HeaderMap, header, request::Parts},
};
use sha2::{Digest, Sha256};
use tandem_core::store::ChatStore;
use uuid::Uuid;

use crate::{AppState, error::ApiError};

/// The authenticated caller. Handlers receive it as an argument and pass the
/// id on to every store call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Session {
  pub user_id: Uuid,
}

/// Hex SHA-256 digest of a bearer token, as stored in the sessions table.
pub fn token_digest(token: &str) -> String { hex::encode(Sha256::digest(token.as_bytes())) }

/// The token from an `Authorization: Bearer <token>` header.
fn bearer_token(headers: &HeaderMap) -> Option<&str> {
  let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
  let token = value.strip_prefix("Bearer ")?.trim();
  (!token.is_empty()).then_some(token)
}

impl<S> FromRequestParts<AppState<S>> for Session
where
  S: ChatStore + 'static,
{
  type Rejection = ApiError;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &AppState<S>,
  ) -> Result<Self, Self::Rejection> {
    let token = bearer_token(&parts.headers).ok_or(ApiError::Unauthorized)?;
    let user_id = state
      .store
      .session_user(token_digest(token))
      .await
      .map_err(ApiError::from_store)?
      .ok_or(ApiError::Unauthorized)?;
    Ok(Session { user_id })
  }
}
