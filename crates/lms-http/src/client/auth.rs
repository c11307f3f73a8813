//! Bearer credential lookup from durable storage.
//!
//! Read order: the `token` field of the stored identity, then the bare
//! `token` entry. A `user` entry that does not decode as a full identity
//! is ignored, the same way the session store ignores it. Nothing is cached; every request reads storage again
//! so logout or rotation applies to the very next call.

use crate::error::{ApiError, Result};
use lms_common::{keys, load_identity, DurableStore};

/// Where a credential was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    /// `token` field of the stored identity.
    Identity,
    /// Bare `token` entry.
    BareToken,
}

/// Bearer credential for one outgoing request.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    pub token: String,
    pub source: CredentialSource,
}

impl Credential {
    pub fn header_value(&self) -> String {
        format!("Bearer {}", self.token)
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("token", &"<redacted>")
            .field("source", &self.source)
            .finish()
    }
}

/// Find the credential to attach, if any.
pub fn resolve_credential(store: &dyn DurableStore) -> Result<Option<Credential>> {
    let identity = load_identity(store).map_err(|e| ApiError::Storage(e.to_string()))?;

    if let Some(identity) = identity.filter(|i| i.has_credential()) {
        return Ok(Some(Credential {
            token: identity.token,
            source: CredentialSource::Identity,
        }));
    }

    let bare = store
        .get(keys::TOKEN)
        .map_err(|e| ApiError::Storage(e.to_string()))?
        .filter(|t| !t.is_empty());

    Ok(bare.map(|token| Credential {
        token,
        source: CredentialSource::BareToken,
    }))
}
