//--------------------------------------------------------------------------------------------------

pub mod auth;
pub mod codec;
pub mod failure;
pub mod gateway;
pub mod guard;
pub mod internal;
pub mod overlay;
pub mod session;
pub mod store;
mod types;

pub use codec::{decode, is_valid, validate_claims, ClaimsError};
pub use failure::{Failure, FailureKind};
pub use gateway::{GatewayConfig, RequestGateway};
pub use guard::{AccessGuard, GuardState, Navigator};
pub use internal::claims::{Claims, SubjectId};
pub use overlay::{Banner, BulkSource, EditOverlay, OverlayError, OverlayRecord};
pub use session::{ProfileOverride, Session};
pub use store::SessionStore;
pub use types::*;

//--------------------------------------------------------------------------------------------------
