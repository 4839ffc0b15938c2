mod files;
mod health;

pub use files::{Entry, read_entries, resolve_path, serve_files};
pub use health::{Healthz, healthz_route};
