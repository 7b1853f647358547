//! Session data types.

use serde::{Deserialize, Serialize};

use drukmart_core::{Email, UserId};

/// Keys under which values are stored in the session.
pub mod session_keys {
    /// The authenticated user ([`super::CurrentUser`]).
    pub const CURRENT_USER: &str = "current_user";
}

/// The authenticated user, as stored in the session.
///
/// How this gets written into the session (login flow) is outside this
/// API's scope; every protected handler reads it through the
/// `RequireAuth` extractor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentUser {
    pub id: UserId,
    pub email: Email,
}
