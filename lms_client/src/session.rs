//! Session store: who is currently using the client.
//!
//! The store is the only writer of the durable session entry (`user` and
//! `token`). The request dispatcher reads the same storage on every call, so
//! the two never talk to each other directly.
//!
//! Every mutation writes durable storage and the in-memory state under the
//! same lock, so a reader never observes one without the other. Network
//! calls made by `login` and `register` are not serialized: when two
//! overlap, whichever response is committed last wins.

use crate::models::{AuthEnvelope, Identity, LoginRequest, Role};
use lms_common::{keys, load_identity, DurableStore};
use lms_http::{ApiClient, ApiError};
use parking_lot::RwLock;
use serde_json::{Map, Value};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

pub const LOGIN_PATH: &str = "auth/login";
pub const REGISTER_PATH: &str = "auth/register";

pub type Result<T> = std::result::Result<T, SessionError>;

#[derive(Error, Debug)]
pub enum SessionError {
    /// Transport or server failure, server payload intact.
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("identity has no credential")]
    MissingCredential,

    #[error("invalid identity: {0}")]
    InvalidIdentity(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SessionError {
    pub fn api_error(&self) -> Option<&ApiError> {
        match self {
            SessionError::Api(e) => Some(e),
            _ => None,
        }
    }
}

fn storage_err(e: anyhow::Error) -> SessionError {
    SessionError::Storage(e.to_string())
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    /// Durable storage not consulted yet.
    Initializing,
    Authenticated(Identity),
    Anonymous,
}

impl SessionState {
    pub fn identity(&self) -> Option<&Identity> {
        match self {
            SessionState::Authenticated(identity) => Some(identity),
            _ => None,
        }
    }
}

pub struct SessionStore {
    api: ApiClient,
    storage: Arc<dyn DurableStore>,
    state: RwLock<SessionState>,
}

impl SessionStore {
    /// Store sharing `api`'s durable storage, still `Initializing`.
    pub fn new(api: ApiClient) -> Self {
        let storage = api.storage().clone();
        Self {
            api,
            storage,
            state: RwLock::new(SessionState::Initializing),
        }
    }

    /// `new` followed by `init`.
    pub fn open(api: ApiClient) -> Self {
        let store = Self::new(api);
        store.init();
        store
    }

    /// Read durable storage once and leave `Initializing`.
    ///
    /// Later calls return the current state without touching storage.
    /// Unreadable or corrupt entries are treated as no session.
    pub fn init(&self) -> SessionState {
        let mut state = self.state.write();
        if *state != SessionState::Initializing {
            return state.clone();
        }

        *state = match self.restore() {
            Some(identity) => {
                info!("Restored session for {} ({})", identity.email, identity.role);
                SessionState::Authenticated(identity)
            }
            None => {
                debug!("No stored session, starting anonymous");
                SessionState::Anonymous
            }
        };
        state.clone()
    }

    fn restore(&self) -> Option<Identity> {
        let mut identity = match load_identity(self.storage.as_ref()) {
            Ok(Some(identity)) => identity,
            Ok(None) => return None,
            Err(e) => {
                warn!("Failed to read stored session: {}", e);
                return None;
            }
        };

        if !identity.has_credential() {
            match self.storage.get(keys::TOKEN) {
                Ok(Some(token)) if !token.is_empty() => identity.token = token,
                _ => {
                    warn!("Stored identity has no credential, ignoring it");
                    return None;
                }
            }
        }

        Some(identity)
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<Identity> {
        let body = LoginRequest { email, password };
        let envelope: AuthEnvelope = self.api.post_json(LOGIN_PATH, &body).await?;
        let identity = self.commit(envelope.into_identity())?;
        info!("Logged in as {} ({})", identity.email, identity.role);
        Ok(identity)
    }

    /// Create an account and sign in as it.
    ///
    /// `extra` is merged into the request body after the core fields, so
    /// role-specific onboarding data rides along.
    pub async fn register(
        &self,
        name: &str,
        email: &str,
        password: &str,
        role: Role,
        extra: Map<String, Value>,
    ) -> Result<Identity> {
        let mut body = Map::new();
        body.insert("name".into(), Value::from(name));
        body.insert("email".into(), Value::from(email));
        body.insert("password".into(), Value::from(password));
        body.insert("role".into(), Value::from(role.as_str()));
        body.extend(extra);

        let envelope: AuthEnvelope = self.api.post_json(REGISTER_PATH, &body).await?;
        let identity = self.commit(envelope.into_identity())?;
        info!("Registered {} as {}", identity.email, identity.role);
        Ok(identity)
    }

    /// Forget the current identity locally. No network call; the
    /// credential stays valid server-side.
    ///
    /// If the durable entry cannot be removed the session is left unchanged.
    pub fn logout(&self) -> Result<()> {
        let mut state = self.state.write();
        self.storage
            .remove_many(&[keys::USER, keys::TOKEN])
            .map_err(storage_err)?;
        *state = SessionState::Anonymous;
        info!("Logged out");
        Ok(())
    }

    /// Shallow-merge `partial` into the current identity and persist it.
    ///
    /// Returns `Ok(None)` without changing anything when nobody is signed
    /// in. A merge that would produce an invalid identity is rejected and
    /// leaves the session as it was.
    pub fn update_user(&self, partial: Value) -> Result<Option<Identity>> {
        let Value::Object(fields) = partial else {
            return Err(SessionError::InvalidIdentity(
                "update must be a JSON object".into(),
            ));
        };

        let mut state = self.state.write();
        let SessionState::Authenticated(current) = &*state else {
            debug!("update_user ignored: no authenticated session");
            return Ok(None);
        };

        let mut merged = match serde_json::to_value(current)? {
            Value::Object(map) => map,
            _ => return Err(SessionError::InvalidIdentity("identity is not an object".into())),
        };
        merged.extend(fields);

        let updated: Identity = serde_json::from_value(Value::Object(merged))
            .map_err(|e| SessionError::InvalidIdentity(e.to_string()))?;
        self.persist(&updated)?;

        *state = SessionState::Authenticated(updated.clone());
        debug!("Updated identity for {}", updated.email);
        Ok(Some(updated))
    }

    /// Drop the in-memory identity without touching durable storage.
    ///
    /// For instances scoped to a single request or task.
    pub fn teardown(&self) {
        *self.state.write() = SessionState::Anonymous;
    }

    pub fn state(&self) -> SessionState {
        self.state.read().clone()
    }

    pub fn identity(&self) -> Option<Identity> {
        self.state.read().identity().cloned()
    }

    pub fn token(&self) -> Option<String> {
        self.state.read().identity().map(|i| i.token.clone())
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(*self.state.read(), SessionState::Authenticated(_))
    }

    pub fn is_loading(&self) -> bool {
        matches!(*self.state.read(), SessionState::Initializing)
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    fn commit(&self, identity: Identity) -> Result<Identity> {
        let mut state = self.state.write();
        self.persist(&identity)?;
        *state = SessionState::Authenticated(identity.clone());
        Ok(identity)
    }

    /// Caller must hold the state write lock.
    fn persist(&self, identity: &Identity) -> Result<()> {
        if !identity.has_credential() {
            return Err(SessionError::MissingCredential);
        }
        let serialized = serde_json::to_string(identity)?;
        self.storage
            .set_many(&[
                (keys::USER, serialized.as_str()),
                (keys::TOKEN, identity.token.as_str()),
            ])
            .map_err(storage_err)
    }
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match &*self.state.read() {
            SessionState::Initializing => "initializing".to_string(),
            SessionState::Anonymous => "anonymous".to_string(),
            SessionState::Authenticated(identity) => format!("authenticated({})", identity.email),
        };
        f.debug_struct("SessionStore")
            .field("api", &self.api)
            .field("state", &state)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use lms_common::MemoryStore;
    use lms_http::client::resolve_credential;
    use lms_http::{ApiNetwork, ApiRequest, ApiResponse, ClientConfig};
    use serde_json::json;
    use std::sync::Mutex;

    /// Memory-backed store whose removals always fail.
    #[derive(Default)]
    struct StuckStore {
        inner: MemoryStore,
    }

    impl DurableStore for StuckStore {
        fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
            self.inner.get(key)
        }

        fn set(&self, key: &str, value: &str) -> anyhow::Result<()> {
            self.inner.set(key, value)
        }

        fn remove(&self, _key: &str) -> anyhow::Result<()> {
            anyhow::bail!("read-only filesystem")
        }
    }

    /// Answers by path; unknown paths get 404.
    struct StubNetwork {
        routes: Vec<(&'static str, u16, Value)>,
        seen: Mutex<Vec<(String, ApiRequest)>>,
    }

    #[async_trait]
    impl ApiNetwork for StubNetwork {
        async fn fetch(&self, url: &str, req: ApiRequest) -> lms_http::Result<ApiResponse> {
            self.seen.lock().unwrap().push((url.to_string(), req));
            for (suffix, status, body) in &self.routes {
                if url.ends_with(suffix) {
                    return Ok(ApiResponse::new(*status, body.to_string()));
                }
            }
            Ok(ApiResponse::new(404, r#"{"message":"not found"}"#))
        }
    }

    fn student(token: &str) -> Value {
        json!({"_id": "1", "name": "A", "email": "a@x.com", "role": "student", "token": token})
    }

    fn setup(routes: Vec<(&'static str, u16, Value)>) -> (SessionStore, Arc<MemoryStore>, Arc<StubNetwork>) {
        let storage = Arc::new(MemoryStore::new());
        let network = Arc::new(StubNetwork {
            routes,
            seen: Mutex::new(Vec::new()),
        });
        let api = ApiClient::with_network(
            ClientConfig::default().with_base_url("http://x/api/"),
            network.clone(),
            storage.clone(),
        )
        .unwrap();
        (SessionStore::open(api), storage, network)
    }

    fn stored_user(storage: &MemoryStore) -> Option<Value> {
        storage
            .get(keys::USER)
            .unwrap()
            .map(|raw| serde_json::from_str(&raw).unwrap())
    }

    #[test]
    fn test_new_store_is_initializing_until_init() {
        let storage = Arc::new(MemoryStore::new());
        let api = ApiClient::with_network(
            ClientConfig::default(),
            Arc::new(StubNetwork {
                routes: vec![],
                seen: Mutex::new(Vec::new()),
            }),
            storage,
        )
        .unwrap();
        let store = SessionStore::new(api);
        assert!(store.is_loading());
        assert_eq!(store.init(), SessionState::Anonymous);
        assert!(!store.is_loading());
    }

    #[test]
    fn test_init_restores_stored_identity() {
        let (store, storage, _) = setup(vec![]);
        storage.set(keys::USER, &student("t1").to_string()).unwrap();

        // Already initialized; a second init must not re-read storage.
        assert_eq!(store.init(), SessionState::Anonymous);

        let fresh = SessionStore::open(store.api().clone());
        assert!(fresh.is_authenticated());
        assert_eq!(fresh.token().as_deref(), Some("t1"));
    }

    #[test]
    fn test_init_with_corrupt_entry_is_anonymous() {
        let (store, storage, _) = setup(vec![]);
        storage.set(keys::USER, "definitely not json").unwrap();
        storage.set(keys::TOKEN, "t1").unwrap();

        let fresh = SessionStore::open(store.api().clone());
        assert_eq!(fresh.state(), SessionState::Anonymous);
    }

    #[test]
    fn test_init_fills_missing_credential_from_bare_token() {
        let (store, storage, _) = setup(vec![]);
        storage.set(keys::USER, &student("").to_string()).unwrap();
        storage.set(keys::TOKEN, "t2").unwrap();

        let fresh = SessionStore::open(store.api().clone());
        assert_eq!(fresh.token().as_deref(), Some("t2"));

        storage.remove(keys::TOKEN).unwrap();
        let fresh = SessionStore::open(store.api().clone());
        assert!(!fresh.is_authenticated());
    }

    #[tokio::test]
    async fn test_login_persists_before_returning() {
        let (store, storage, network) = setup(vec![("auth/login", 200, student("abc"))]);

        let identity = store.login("a@x.com", "p").await.unwrap();
        assert_eq!(identity.token, "abc");
        assert_eq!(store.token(), storage.get(keys::TOKEN).unwrap());
        assert_eq!(stored_user(&storage).unwrap()["token"], "abc");

        let seen = network.seen.lock().unwrap();
        let (url, req) = seen.last().unwrap();
        assert_eq!(url, "http://x/api/auth/login");
        let body: Value = serde_json::from_slice(&req.body).unwrap();
        assert_eq!(body, json!({"email": "a@x.com", "password": "p"}));
    }

    #[tokio::test]
    async fn test_failed_login_keeps_existing_session() {
        let (store, storage, _) = setup(vec![
            ("auth/login", 401, json!({"message": "Invalid credentials"})),
        ]);
        storage.set(keys::USER, &student("old").to_string()).unwrap();
        storage.set(keys::TOKEN, "old").unwrap();
        let store = SessionStore::open(store.api().clone());

        let err = store.login("a@x.com", "wrong").await.unwrap_err();
        let api_err = err.api_error().unwrap();
        assert!(api_err.is_unauthorized());
        assert_eq!(api_err.server_message().as_deref(), Some("Invalid credentials"));

        assert_eq!(store.token().as_deref(), Some("old"));
        assert_eq!(storage.get(keys::TOKEN).unwrap().as_deref(), Some("old"));
    }

    #[tokio::test]
    async fn test_login_without_credential_is_rejected() {
        let (store, storage, _) = setup(vec![("auth/login", 200, student(""))]);

        let err = store.login("a@x.com", "p").await.unwrap_err();
        assert!(matches!(err, SessionError::MissingCredential));
        assert!(!store.is_authenticated());
        assert!(storage.is_empty());
    }

    #[tokio::test]
    async fn test_register_sends_extra_fields_and_returns_identity() {
        let (store, storage, network) = setup(vec![(
            "auth/register",
            201,
            json!({"_id": "5", "name": "I", "email": "i@x.com", "role": "instructor", "token": "t5"}),
        )]);

        let mut extra = Map::new();
        extra.insert("expertise".into(), json!(["rust"]));
        let identity = store
            .register("I", "i@x.com", "p", Role::Instructor, extra)
            .await
            .unwrap();

        assert_eq!(identity.role, Role::Instructor);
        assert_eq!(storage.get(keys::TOKEN).unwrap().as_deref(), Some("t5"));

        let seen = network.seen.lock().unwrap();
        let body: Value = serde_json::from_slice(&seen.last().unwrap().1.body).unwrap();
        assert_eq!(body["role"], "instructor");
        assert_eq!(body["expertise"], json!(["rust"]));
    }

    #[tokio::test]
    async fn test_register_failure_payload_is_unmodified() {
        let payload = json!({"errors": [{"field": "email", "msg": "already registered"}]});
        let (store, _, _) = setup(vec![("auth/register", 400, payload.clone())]);

        let err = store
            .register("A", "a@x.com", "p", Role::Student, Map::new())
            .await
            .unwrap_err();
        assert_eq!(err.api_error().unwrap().payload().unwrap(), payload);
        assert_eq!(store.state(), SessionState::Anonymous);
    }

    #[tokio::test]
    async fn test_logout_clears_everything() {
        let (store, storage, _) = setup(vec![("auth/login", 200, student("abc"))]);
        store.login("a@x.com", "p").await.unwrap();

        store.logout().unwrap();
        assert_eq!(store.state(), SessionState::Anonymous);
        assert!(storage.get(keys::USER).unwrap().is_none());
        assert!(storage.get(keys::TOKEN).unwrap().is_none());

        // Logging out while anonymous is fine too
        store.logout().unwrap();
        assert_eq!(store.state(), SessionState::Anonymous);
    }

    #[tokio::test]
    async fn test_update_user_merges_and_persists() {
        let (store, storage, _) = setup(vec![("auth/login", 200, student("abc"))]);
        let before = store.login("a@x.com", "p").await.unwrap();

        let updated = store
            .update_user(json!({"bio": "Learning Rust", "streak": 3}))
            .unwrap()
            .unwrap();

        assert_eq!(updated.bio.as_deref(), Some("Learning Rust"));
        assert_eq!(updated.streak, Some(3));
        assert_eq!(updated.name, before.name);
        assert_eq!(updated.token, before.token);
        assert_eq!(store.identity(), Some(updated.clone()));
        assert_eq!(stored_user(&storage).unwrap(), serde_json::to_value(&updated).unwrap());
    }

    #[test]
    fn test_update_user_while_anonymous_is_noop() {
        let (store, storage, _) = setup(vec![]);
        for _ in 0..2 {
            assert!(store.update_user(json!({"name": "B"})).unwrap().is_none());
            assert_eq!(store.state(), SessionState::Anonymous);
            assert!(storage.is_empty());
        }
    }

    #[tokio::test]
    async fn test_update_user_rejects_invalid_merge() {
        let (store, storage, _) = setup(vec![("auth/login", 200, student("abc"))]);
        let before = store.login("a@x.com", "p").await.unwrap();
        let stored_before = storage.get(keys::USER).unwrap();

        let err = store.update_user(json!({"role": "superuser"})).unwrap_err();
        assert!(matches!(err, SessionError::InvalidIdentity(_)));

        let err = store.update_user(json!({"token": ""})).unwrap_err();
        assert!(matches!(err, SessionError::MissingCredential));

        assert!(store.update_user(json!("bio")).is_err());

        assert_eq!(store.identity(), Some(before));
        assert_eq!(storage.get(keys::USER).unwrap(), stored_before);
    }

    #[tokio::test]
    async fn test_teardown_keeps_durable_entry() {
        let (store, storage, _) = setup(vec![("auth/login", 200, student("abc"))]);
        store.login("a@x.com", "p").await.unwrap();

        store.teardown();
        assert!(!store.is_authenticated());
        assert!(!store.is_loading());
        assert_eq!(storage.get(keys::TOKEN).unwrap().as_deref(), Some("abc"));
    }

    #[tokio::test]
    async fn test_failed_logout_keeps_session_and_storage_in_step() {
        let storage = Arc::new(StuckStore::default());
        let network = Arc::new(StubNetwork {
            routes: vec![("auth/login", 200, student("abc"))],
            seen: Mutex::new(Vec::new()),
        });
        let api = ApiClient::with_network(
            ClientConfig::default().with_base_url("http://x/api/"),
            network,
            storage.clone(),
        )
        .unwrap();
        let store = SessionStore::open(api);
        store.login("a@x.com", "p").await.unwrap();

        let err = store.logout().unwrap_err();
        assert!(matches!(err, SessionError::Storage(_)));

        assert!(store.is_authenticated());
        assert_eq!(store.token().as_deref(), Some("abc"));
        let credential = resolve_credential(storage.as_ref()).unwrap().unwrap();
        assert_eq!(credential.token, "abc");
    }

    #[test]
    fn test_partial_record_is_ignored_by_store_and_dispatcher() {
        let (store, storage, _) = setup(vec![]);
        storage.set(keys::USER, r#"{"token":"abc"}"#).unwrap();

        let fresh = SessionStore::open(store.api().clone());
        assert_eq!(fresh.state(), SessionState::Anonymous);
        assert!(resolve_credential(storage.as_ref()).unwrap().is_none());
    }
}
