mod config;
mod middleware;

pub use config::{AuthConfig, DEFAULT_HASH, DEFAULT_REALM, DEFAULT_USER};
pub use middleware::{
    AuthError, AuthState, Credentials, auth_middleware_fn, authenticate, parse_credentials,
    verify_password,
};
