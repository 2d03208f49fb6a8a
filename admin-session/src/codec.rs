//! Decoding and validation of the bearer credential.
//!
//! The credential is a three-segment `header.payload.signature` string. Only the payload is read;
//! the signature is never checked here because the issuing service re-verifies the token on every
//! privileged call.

use crate::internal::claims::Claims;
use crate::store::SessionStore;
use base64::alphabet;
use base64::engine::general_purpose::GeneralPurposeConfig;
use base64::engine::{DecodePaddingMode, GeneralPurpose};
use base64::Engine;
use thiserror::Error;
use time::OffsetDateTime;
use tracing::{debug, info};

//--------------------------------------------------------------------------------------------------
// Decoding
//--------------------------------------------------------------------------------------------------

const SEGMENT_SEPARATOR: char = '.';

// Issuers differ on whether they pad the segments
const SEGMENT_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Read the claims out of a credential. Never fails loudly: anything malformed is `None`.
pub fn decode(token: &str) -> Option<Claims> {
    let mut segments = token.split(SEGMENT_SEPARATOR);
    let (Some(_header), Some(payload), Some(_signature), None) = (
        segments.next(),
        segments.next(),
        segments.next(),
        segments.next(),
    ) else {
        debug!("Credential does not have three segments");
        return None;
    };

    let bytes = match SEGMENT_ENGINE.decode(payload) {
        Ok(bytes) => bytes,
        Err(err) => {
            debug!("Credential payload is not base64url: {}", err);
            return None;
        }
    };

    // The payload is UTF-8 JSON; multi-byte names must come through intact
    let text = match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(err) => {
            debug!("Credential payload is not UTF-8: {}", err);
            return None;
        }
    };

    match serde_json::from_str::<Claims>(&text) {
        Ok(claims) => Some(claims),
        Err(err) => {
            debug!("Credential payload is not a claims object: {}", err);
            None
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Validation
//--------------------------------------------------------------------------------------------------

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ClaimsError {
    #[error("no credential")]
    Missing,

    #[error("credential carries neither a subject nor an email")]
    NoIdentity,

    #[error("credential has expired")]
    Expired,
}

/// Pure check of decoded claims against `now`. A missing `exp` never expires.
pub fn validate_claims(claims: &Claims, now: OffsetDateTime) -> Result<(), ClaimsError> {
    if !claims.has_identity() {
        return Err(ClaimsError::NoIdentity);
    }
    match claims.exp() {
        Some(exp) if exp.is_before(now) => Err(ClaimsError::Expired),
        _ => Ok(()),
    }
}

/// Validity check used at the session boundary. An expired credential is removed from `store`.
pub fn is_valid(claims: Option<&Claims>, store: &SessionStore) -> bool {
    is_valid_at(claims, store, OffsetDateTime::now_utc())
}

pub fn is_valid_at(claims: Option<&Claims>, store: &SessionStore, now: OffsetDateTime) -> bool {
    check_at(claims, store, now).is_ok()
}

pub(crate) fn check_at(
    claims: Option<&Claims>,
    store: &SessionStore,
    now: OffsetDateTime,
) -> Result<(), ClaimsError> {
    let Some(claims) = claims else {
        return Err(ClaimsError::Missing);
    };

    let result = validate_claims(claims, now);
    if result == Err(ClaimsError::Expired) {
        info!("Stored credential has expired, removing it");
        store.clear();
    }
    result
}

//--------------------------------------------------------------------------------------------------
