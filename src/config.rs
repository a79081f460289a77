use std::env;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the REST backend, without a trailing slash.
    pub api_base_url: String,
    /// WebSocket URL of the signaling relay.
    pub signaling_url: String,
    /// Directory for client-local storage. `None` means in-memory only.
    pub storage_dir: Option<PathBuf>,
}

impl ClientConfig {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let api_base_url = env::var("TELECARE_API_URL")
            .unwrap_or_else(|_| "http://127.0.0.1:5000/api".to_string());
        let signaling_url = env::var("TELECARE_SIGNALING_URL")
            .unwrap_or_else(|_| "ws://127.0.0.1:5000/signaling".to_string());
        let storage_dir = env::var("TELECARE_STORAGE_DIR").ok().map(PathBuf::from);

        Self::with_storage_dir(api_base_url, signaling_url, storage_dir)
    }

    pub fn new(api_base_url: impl Into<String>, signaling_url: impl Into<String>) -> Self {
        Self::with_storage_dir(api_base_url.into(), signaling_url.into(), None)
    }

    fn with_storage_dir(
        api_base_url: String,
        signaling_url: String,
        storage_dir: Option<PathBuf>,
    ) -> Self {
        Self {
            api_base_url: api_base_url.trim_end_matches('/').to_string(),
            signaling_url: signaling_url.trim_end_matches('/').to_string(),
            storage_dir,
        }
    }
}
