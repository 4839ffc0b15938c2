use std::sync::Arc;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use base64::{Engine as _, engine::GeneralPurpose};
use http::{HeaderValue, header};
use thiserror::Error;
use tracing::{debug, error, warn};

use super::config::AuthConfig;
use crate::error::AppError;
use crate::state::AppState;

const BASE64_ENGINE: GeneralPurpose = base64::engine::general_purpose::STANDARD;
const BCRYPT_PREFIXES: [&str; 4] = ["$2a$", "$2b$", "$2x$", "$2y$"];

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("base64 decode error: {0}")]
    Base64Decode(#[from] base64::DecodeError),
    #[error("bcrypt error: {0}")]
    Bcrypt(#[from] bcrypt::BcryptError),
    #[error("missing ':' between username and password")]
    MissingSeparator,
    #[error("failed to convert to string: {0}")]
    ToString(#[from] http::header::ToStrError),
    #[error("unsupported authorization scheme")]
    UnsupportedScheme,
    #[error("failed to convert to UTF-8: {0}")]
    UTF8(#[from] std::string::FromUtf8Error),
}

/// Decoded Basic credentials
#[derive(Debug, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// Authentication state after checking credentials
#[derive(Debug, PartialEq, Eq)]
pub enum AuthState {
    Request,
    Success,
    Failed,
}

/// Parse an `Authorization: Basic ...` header value
pub fn parse_credentials(value: &HeaderValue) -> Result<Credentials, AuthError> {
    let header_str = value.to_str()?;
    let (scheme, digest) = header_str
        .trim()
        .split_once(' ')
        .ok_or(AuthError::UnsupportedScheme)?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return Err(AuthError::UnsupportedScheme);
    }
    let decoded = String::from_utf8(BASE64_ENGINE.decode(digest.trim())?)?;
    // passwords may contain ':'
    let (username, password) = decoded
        .split_once(':')
        .ok_or(AuthError::MissingSeparator)?;
    Ok(Credentials {
        username: username.to_string(),
        password: password.to_string(),
    })
}

/// Check a password against a crypt(3) style hash or a bcrypt hash
pub fn verify_password(password: &str, hash: &str) -> Result<bool, AuthError> {
    if BCRYPT_PREFIXES.iter().any(|prefix| hash.starts_with(prefix)) {
        return Ok(bcrypt::verify(password, hash)?);
    }
    Ok(pwhash::unix::verify(password, hash))
}

/// Authenticate a request against the configured credentials
pub fn authenticate(config: &AuthConfig, request: &Request) -> AuthState {
    let header_value = match request.headers().get(header::AUTHORIZATION) {
        None => return AuthState::Request,
        Some(v) => v,
    };
    let credentials = match parse_credentials(header_value) {
        Ok(credentials) => credentials,
        Err(err) => {
            debug!(%err, "invalid authorization header");
            return AuthState::Request;
        }
    };
    let hash = match config.secret(&credentials.username) {
        None => return AuthState::Failed,
        Some(hash) => hash,
    };
    match verify_password(&credentials.password, hash) {
        Ok(true) => AuthState::Success,
        Ok(false) => AuthState::Failed,
        Err(err) => {
            error!(%err, "failed to verify password");
            AuthState::Failed
        }
    }
}

/// Axum middleware function for authentication
pub async fn auth_middleware_fn(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    match authenticate(&state.auth, &request) {
        AuthState::Success => next.run(request).await,
        AuthState::Request => AppError::Unauthorized {
            challenge: state.auth.challenge(),
        }
        .into_response(),
        AuthState::Failed => {
            warn!(path = %request.uri().path(), "authentication failed");
            AppError::Unauthorized {
                challenge: state.auth.challenge(),
            }
            .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use axum::body::Body;

    use super::*;
    use crate::auth::config::DEFAULT_HASH;

    const SHA512_HUNTER2: &str = "$6$saltsalt$8iYtNHxjWRl.NF6oNZ5tF.iKFlQREaXBLlSmZKP6dy9l5z3vsooWNW0/GZ6Nej73/TFug6pIPSqbJoCT6dfnj.";

    fn basic(credentials: &str) -> HeaderValue {
        let encoded = BASE64_ENGINE.encode(credentials);
        HeaderValue::from_str(&format!("Basic {encoded}")).unwrap()
    }

    fn request_with(value: Option<HeaderValue>) -> Request {
        let mut builder = http::Request::builder().uri("/app.log");
        if let Some(value) = value {
            builder = builder.header(header::AUTHORIZATION, value);
        }
        builder.body(Body::empty()).unwrap()
    }

    #[test]
    fn parse_basic_credentials() {
        let credentials = parse_credentials(&basic("joaquim:amazon")).unwrap();
        assert_eq!(credentials.username, "joaquim");
        assert_eq!(credentials.password, "amazon");
    }

    #[test]
    fn parse_password_with_colon() {
        let credentials = parse_credentials(&basic("joaquim:a:b:c")).unwrap();
        assert_eq!(credentials.password, "a:b:c");
    }

    #[test]
    fn parse_scheme_case_insensitive() {
        let encoded = BASE64_ENGINE.encode("joaquim:amazon");
        let value = HeaderValue::from_str(&format!("bAsIc {encoded}")).unwrap();
        assert!(parse_credentials(&value).is_ok());
    }

    #[test]
    fn parse_rejects_other_schemes() {
        let value = HeaderValue::from_static("Bearer abcdef");
        assert!(matches!(
            parse_credentials(&value),
            Err(AuthError::UnsupportedScheme)
        ));
        let value = HeaderValue::from_static("Basic");
        assert!(matches!(
            parse_credentials(&value),
            Err(AuthError::UnsupportedScheme)
        ));
    }

    #[test]
    fn parse_rejects_malformed_digest() {
        let value = HeaderValue::from_static("Basic !!!not-base64!!!");
        assert!(matches!(
            parse_credentials(&value),
            Err(AuthError::Base64Decode(_))
        ));
        assert!(matches!(
            parse_credentials(&basic("no-separator")),
            Err(AuthError::MissingSeparator)
        ));
    }

    #[test]
    fn verify_md5_crypt() {
        assert!(verify_password("amazon", DEFAULT_HASH).unwrap());
        assert!(!verify_password("amazonx", DEFAULT_HASH).unwrap());
    }

    #[test]
    fn verify_sha512_crypt() {
        assert!(verify_password("hunter2", SHA512_HUNTER2).unwrap());
        assert!(!verify_password("hunter3", SHA512_HUNTER2).unwrap());
    }

    #[test]
    fn verify_bcrypt() {
        let hash = bcrypt::hash("secret", 4).unwrap();
        assert!(verify_password("secret", &hash).unwrap());
        assert!(!verify_password("public", &hash).unwrap());
    }

    #[test]
    fn verify_unknown_format_never_matches() {
        assert!(!verify_password("amazon", "$1$testhash").unwrap());
        assert!(!verify_password("amazon", "plaintext").unwrap());
    }

    #[test]
    fn authenticate_states() {
        let config = AuthConfig::default();
        assert_eq!(authenticate(&config, &request_with(None)), AuthState::Request);
        assert_eq!(
            authenticate(
                &config,
                &request_with(Some(HeaderValue::from_static("Digest x")))
            ),
            AuthState::Request
        );
        assert_eq!(
            authenticate(&config, &request_with(Some(basic("joaquim:amazon")))),
            AuthState::Success
        );
        assert_eq!(
            authenticate(&config, &request_with(Some(basic("joaquim:wrong")))),
            AuthState::Failed
        );
        assert_eq!(
            authenticate(&config, &request_with(Some(basic("mallory:amazon")))),
            AuthState::Failed
        );
    }

    #[test]
    fn authenticate_invalid_configured_bcrypt_hash_fails() {
        let config = AuthConfig {
            password_hash: "$2y$broken".to_string(),
            ..AuthConfig::default()
        };
        assert_eq!(
            authenticate(&config, &request_with(Some(basic("joaquim:amazon")))),
            AuthState::Failed
        );
    }
}
