pub const USER_VAR: &str = "AUTH_USER";
pub const HASH_VAR: &str = "AUTH_HASH";
pub const REALM_VAR: &str = "AUTH_REALM";

pub const DEFAULT_USER: &str = "joaquim";
/// MD5-crypt of `amazon`
pub const DEFAULT_HASH: &str = "$1$neD1XEAG$WylfbCkcn9psU0o467.AM1";
pub const DEFAULT_REALM: &str = "amazon-server-logs.com";

/// Authentication configuration, a single user and its password hash
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthConfig {
    pub user: String,
    pub password_hash: String,
    pub realm: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            user: DEFAULT_USER.to_string(),
            password_hash: DEFAULT_HASH.to_string(),
            realm: DEFAULT_REALM.to_string(),
        }
    }
}

impl AuthConfig {
    /// Resolve from `AUTH_USER`, `AUTH_HASH` and `AUTH_REALM`
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolve with an arbitrary lookup. Unset or empty values fall back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let resolve = |key: &str, default: &str| {
            lookup(key)
                .filter(|value| !value.is_empty())
                .unwrap_or_else(|| default.to_string())
        };
        Self {
            user: resolve(USER_VAR, DEFAULT_USER),
            password_hash: resolve(HASH_VAR, DEFAULT_HASH),
            realm: resolve(REALM_VAR, DEFAULT_REALM),
        }
    }

    /// Stored hash for `user`, `None` for anyone but the configured user
    pub fn secret(&self, user: &str) -> Option<&str> {
        (user == self.user).then_some(self.password_hash.as_str())
    }

    pub fn uses_default_credentials(&self) -> bool {
        self.user == DEFAULT_USER && self.password_hash == DEFAULT_HASH
    }

    pub(crate) fn challenge(&self) -> String {
        format!("Basic realm=\"{}\"", self.realm)
    }
}
