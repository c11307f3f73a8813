//! Centralized storage layout for the LMS client
//!
//! Directory layout:
//! ```text
//! lms_client/
//! ├── sessions/        # One durable session file per API origin
//! └── logs/            # Client log files
//! ```

pub mod identity;
pub mod storage;

pub use identity::{load_identity, Identity, Role};
pub use storage::{keys, load_json, DurableStore, JsonFileStore, MemoryStore};

use std::path::{Path, PathBuf};
use tracing::info;

/// Environment variable overriding the storage root.
pub const ROOT_ENV: &str = "LMS_CLIENT_ROOT";

/// Get the client root directory from environment, platform data dir, or default
pub fn client_root() -> PathBuf {
    // 1. Check environment variable
    if let Ok(val) = std::env::var(ROOT_ENV) {
        if !val.trim().is_empty() {
            return PathBuf::from(val);
        }
    }

    // 2. Platform data directory
    if let Some(dir) = dirs::data_dir() {
        return dir.join("lms_client");
    }

    // 3. Default fallback
    PathBuf::from("lms_data")
}

/// Durable session files directory
pub fn sessions_dir() -> PathBuf {
    client_root().join("sessions")
}

/// Log files directory
pub fn logs_dir() -> PathBuf {
    client_root().join("logs")
}

/// Ensure a single directory exists
pub fn ensure_dir(path: &Path) -> anyhow::Result<()> {
    if !path.exists() {
        std::fs::create_dir_all(path)?;
        info!("Created directory: {:?}", path);
    }
    Ok(())
}

/// Initialize the complete directory structure
/// Call this once at startup before opening any session file
pub fn init_structure() -> anyhow::Result<PathBuf> {
    let root = client_root();

    ensure_dir(&root)?;
    ensure_dir(&sessions_dir())?;
    ensure_dir(&logs_dir())?;

    let canonical = std::fs::canonicalize(&root).unwrap_or_else(|_| root.clone());
    info!("Client directory structure initialized at: {:?}", canonical);

    Ok(canonical)
}

/// Filesystem-safe name for the origin of an API base URL.
///
/// Durable storage is scoped per origin, so two base URLs that differ only
/// in path share a session: `http://x/api/` and `http://x/v2/` both map to
/// `http_x_80`.
pub fn origin_slug(base_url: &str) -> String {
    match url::Url::parse(base_url) {
        Ok(parsed) => {
            let host = parsed.host_str().unwrap_or("local");
            let port = parsed
                .port_or_known_default()
                .map(|p| p.to_string())
                .unwrap_or_default();
            sanitize(&format!("{}_{}_{}", parsed.scheme(), host, port))
        }
        Err(_) => sanitize(base_url),
    }
}

/// Session file for a given API base URL under `root`
pub fn session_path_in(root: &Path, base_url: &str) -> PathBuf {
    root.join("sessions")
        .join(format!("{}.json", origin_slug(base_url)))
}

/// Session file for a given API base URL under the default root
pub fn session_path(base_url: &str) -> PathBuf {
    session_path_in(&client_root(), base_url)
}

fn sanitize(raw: &str) -> String {
    let slug: String = raw
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '.' {
                c.to_ascii_lowercase()
            } else {
                '-'
            }
        })
        .collect();
    let slug = slug.trim_matches('-').to_string();
    if slug.is_empty() {
        "default".to_string()
    } else {
        slug
    }
}
