//! Operations the CLI exposes, kept out of `main` so they can be tested.

use crate::session::{Result, SessionStore};
use lms_http::ApiRequest;
use serde_json::{Map, Value};
use tracing::{info, warn};

/// Send an authenticated request and decode the reply.
///
/// An empty success body decodes to `Value::Null`. A 401 means the stored
/// credential is no longer accepted, so the local session is dropped before
/// the server error is returned. A failed logout is only logged.
pub async fn call_api(
    session: &SessionStore,
    method: &str,
    path: &str,
    body: Option<&Value>,
) -> Result<Value> {
    let mut request = ApiRequest::new().with_method(method.to_uppercase());
    if let Some(body) = body {
        request = request.with_json(body)?;
    }

    let response = match session.api().fetch(path, request).await {
        Ok(response) => response,
        Err(e) => {
            if e.is_unauthorized() && session.is_authenticated() {
                warn!("Server rejected the stored credential, logging out");
                if let Err(logout_err) = session.logout() {
                    warn!("Logout after rejected credential failed: {}", logout_err);
                }
            }
            return Err(e.into());
        }
    };

    if response.body.is_empty() {
        return Ok(Value::Null);
    }
    Ok(response.json()?)
}

/// Parse `key=value` pairs.
///
/// Values that parse as JSON keep their type (`streak=3`, `tags=["a"]`);
/// anything else is taken as a string.
pub fn parse_fields(pairs: &[String]) -> anyhow::Result<Map<String, Value>> {
    let mut fields = Map::new();
    for pair in pairs {
        let Some((key, raw)) = pair.split_once('=') else {
            anyhow::bail!("expected key=value, got '{}'", pair);
        };
        let key = key.trim();
        if key.is_empty() {
            anyhow::bail!("empty key in '{}'", pair);
        }
        let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
        fields.insert(key.to_string(), value);
    }
    Ok(fields)
}

/// Apply `key=value` pairs to the signed-in identity.
pub fn update_profile(session: &SessionStore, pairs: &[String]) -> anyhow::Result<Value> {
    let fields = parse_fields(pairs)?;
    match session.update_user(Value::Object(fields))? {
        Some(identity) => {
            info!("Profile updated for {}", identity.email);
            Ok(serde_json::to_value(identity)?)
        }
        None => anyhow::bail!("not logged in"),
    }
}
