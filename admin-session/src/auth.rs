use crate::codec::{decode, validate_claims};
use crate::failure::Failure;
use crate::gateway::RequestGateway;
use crate::session::Session;
use crate::types::ApiResponse;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;
use tracing::{info, warn};

//--------------------------------------------------------------------------------------------------
// Identity service endpoints
//--------------------------------------------------------------------------------------------------

pub const LOGIN_PATH: &str = "/auth/login";
pub const LOGOUT_PATH: &str = "/auth/logout";

#[derive(Serialize, Clone)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

impl std::fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginRequest")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Deserialize)]
struct LoginData {
    token: String,
}

/// Exchanges credentials for a token, stores it and returns the resulting session.
///
/// A token the identity service hands back that we cannot read is refused rather than stored, so
/// the guard never sees a credential it would immediately reject.
pub async fn login(gateway: &RequestGateway, request: &LoginRequest) -> Result<Session, Failure> {
    let response: ApiResponse<LoginData> = gateway.post(LOGIN_PATH, request).await?;

    let Some(data) = response.data else {
        warn!("Login response for {} carried no token", request.email);
        return Err(Failure::session_invalid("Login response did not include a token"));
    };

    let Some(claims) = decode(&data.token) else {
        warn!("Login for {} returned an unreadable token", request.email);
        return Err(Failure::session_invalid("Received an invalid session token"));
    };

    if let Err(err) = validate_claims(&claims, OffsetDateTime::now_utc()) {
        warn!("Login for {} returned an unusable token: {}", request.email, err);
        return Err(Failure::session_invalid("Received an invalid session token"));
    }

    gateway.store().set(&data.token);
    info!("Logged in as {}", request.email);

    let session = Session::from_claims(&claims);
    Ok(match gateway.store().profile_override() {
        Some(profile) => session.with_override(&profile),
        None => session,
    })
}

/// Tells the identity service, then clears the local session whatever it answered.
pub async fn logout(gateway: &RequestGateway) {
    if gateway.store().get().is_some() {
        if let Err(failure) = gateway.post::<Value, _>(LOGOUT_PATH, &Value::Null).await {
            warn!("Logout request failed, clearing local session anyway: {}", failure);
        }
    }
    gateway.store().clear();
    info!("Logged out");
}

//--------------------------------------------------------------------------------------------------
