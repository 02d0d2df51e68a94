//! Axum extractors for the triage API
//!
//! Every rejection is a [`NayaError`], so clients always get the same
//! `{code, message, details}` body, whether the request failed on JSON,
//! on credentials or in the service.

use crate::core::auth::{AuthContext, AuthPolicy, Session};
use crate::core::error::{NayaError, ValidationError};
use crate::server::host::ServerHost;
use axum::Json;
use axum::extract::{FromRequest, FromRequestParts, Request};
use axum::http::request::Parts;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use uuid::Uuid;

/// JSON body whose rejection renders as a `INVALID_JSON` error
pub struct JsonBody<T>(pub T);

impl<S, T> FromRequest<S> for JsonBody<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = NayaError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(JsonBody(value)),
            Err(rejection) => Err(ValidationError::InvalidJson {
                message: rejection.body_text(),
            }
            .into()),
        }
    }
}

/// Session of a caller allowed to triage orders (manager or admin)
///
/// Missing credentials reject with 401, another role with 403.
#[derive(Debug, Clone)]
pub struct ManagerSession(pub Session);

impl FromRequestParts<Arc<ServerHost>> for ManagerSession {
    type Rejection = NayaError;

    async fn from_request_parts(parts: &mut Parts, host: &Arc<ServerHost>) -> Result<Self, Self::Rejection> {
        let context = host.auth.authenticate(&parts.headers).await?;
        let action = format!("{} {}", parts.method, parts.uri.path());
        AuthPolicy::triage().authorize(&context, &action)?;

        match context {
            AuthContext::User(session) => Ok(ManagerSession(session)),
            // authorize() never lets an anonymous caller through a role policy
            AuthContext::Anonymous => Err(crate::core::error::AuthError::MissingCredentials.into()),
        }
    }
}

/// Session of the caller, if any; guests are allowed
///
/// Credentials that are present but wrong still reject with 401.
#[derive(Debug, Clone)]
pub struct OptionalSession(pub Option<Session>);

impl FromRequestParts<Arc<ServerHost>> for OptionalSession {
    type Rejection = NayaError;

    async fn from_request_parts(parts: &mut Parts, host: &Arc<ServerHost>) -> Result<Self, Self::Rejection> {
        let context = host.auth.authenticate(&parts.headers).await?;
        Ok(OptionalSession(context.session().cloned()))
    }
}

/// Parse an id taken from the path
pub fn parse_id(raw: &str) -> Result<Uuid, NayaError> {
    Uuid::parse_str(raw).map_err(|_| {
        ValidationError::InvalidUuid {
            value: raw.to_string(),
        }
        .into()
    })
}
