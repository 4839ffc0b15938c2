use std::path::PathBuf;

use tower_http::services::ServeDir;

use crate::auth::AuthConfig;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub auth: AuthConfig,
    pub root: PathBuf,
    pub files: ServeDir,
}

impl AppState {
    pub fn new(auth: AuthConfig, root: PathBuf) -> Self {
        let files = ServeDir::new(&root);
        Self { auth, root, files }
    }
}
