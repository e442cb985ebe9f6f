use axum::http::HeaderValue;
use base64::{Engine as _, engine::general_purpose};
use serde::Deserialize;
use std::collections::HashMap;
use thiserror::Error;

pub mod audit;
pub mod components;

pub use audit::*;

/// Header injected by the hosting platform's authentication layer.
pub const CLIENT_PRINCIPAL_HEADER: &str = "x-ms-client-principal";

const OBJECT_ID_CLAIMS: &[&str] = &[
    "http://schemas.microsoft.com/identity/claims/objectidentifier",
    "oid",
];

const UPN_CLAIMS: &[&str] = &[
    "http://schemas.xmlsoap.org/ws/2005/05/identity/claims/upn",
    "upn",
    "preferred_username",
];

/// The authenticated caller, as asserted by the edge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerIdentity {
    /// Directory object id, stable across renames
    pub subject_key: String,
    /// Login name, if the assertion carried one
    pub display_principal: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentityError {
    #[error("missing identity header")]
    MissingHeader,
    #[error("malformed identity assertion")]
    Malformed,
    #[error("identity assertion has no object id")]
    MissingObjectId,
}

impl From<IdentityError> for crate::error::AppError {
    fn from(err: IdentityError) -> Self {
        crate::error::AppError::Unauthenticated(err.to_string())
    }
}

#[derive(Debug, Deserialize)]
struct ClientPrincipal {
    #[serde(default)]
    claims: Vec<Claim>,
}

#[derive(Debug, Deserialize)]
struct Claim {
    typ: String,
    val: String,
}

/// Decode the client principal header into a [`CallerIdentity`].
///
/// Only this header is trusted; it is set by the platform after sign-in and
/// stripped from inbound client requests.
pub fn extract_caller_identity(header: Option<&HeaderValue>) -> Result<CallerIdentity, IdentityError> {
    let raw = header.ok_or(IdentityError::MissingHeader)?;
    let encoded = raw.to_str().map_err(|_| IdentityError::Malformed)?.trim();
    if encoded.is_empty() {
        return Err(IdentityError::MissingHeader);
    }

    let decoded = general_purpose::STANDARD
        .decode(encoded)
        .or_else(|_| general_purpose::STANDARD_NO_PAD.decode(encoded.trim_end_matches('=')))
        .map_err(|_| IdentityError::Malformed)?;
    let principal: ClientPrincipal =
        serde_json::from_slice(&decoded).map_err(|_| IdentityError::Malformed)?;

    let mut claims: HashMap<&str, &str> = HashMap::new();
    for claim in &principal.claims {
        claims.entry(claim.typ.as_str()).or_insert(claim.val.as_str());
    }

    let first_of = |types: &[&str]| {
        types
            .iter()
            .filter_map(|t| claims.get(t))
            .map(|v| v.trim())
            .find(|v| !v.is_empty())
            .map(str::to_string)
    };

    let subject_key = first_of(OBJECT_ID_CLAIMS).ok_or(IdentityError::MissingObjectId)?;
    let display_principal = first_of(UPN_CLAIMS);

    Ok(CallerIdentity {
        subject_key,
        display_principal,
    })
}
