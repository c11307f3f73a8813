use serde::{Deserialize, Serialize};

pub use lms_common::identity::{Identity, Role};

/// Body of `POST auth/login`.
#[derive(Debug, Serialize)]
pub struct LoginRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

/// Shapes the auth endpoints answer with.
///
/// Most deployments return the identity itself with `token` inline; some
/// wrap it as `{ token, user }`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum AuthEnvelope {
    Flat(Identity),
    Wrapped { token: String, user: Identity },
}

impl AuthEnvelope {
    pub fn into_identity(self) -> Identity {
        match self {
            AuthEnvelope::Flat(identity) => identity,
            AuthEnvelope::Wrapped { token, mut user } => {
                if !token.is_empty() {
                    user.token = token;
                }
                user
            }
        }
    }
}
