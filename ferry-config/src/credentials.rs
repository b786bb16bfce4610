use std::fmt;

use ferry_core::error::{FerryError, Result};

pub const USER_ENV: &str = "TARGET_USER";
pub const PASSWORD_ENV: &str = "TARGET_PASSWORD";

/// Username/password for the target registry.
#[derive(Clone, PartialEq, Eq)]
pub struct RegistryAuth {
    pub username: String,
    pub password: String,
}

impl RegistryAuth {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Read `TARGET_USER` and `TARGET_PASSWORD` from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str| {
            lookup(key)
                .filter(|value| !value.is_empty())
                .ok_or_else(|| FerryError::Credentials(format!("{} is not set", key)))
        };
        Ok(Self::new(read(USER_ENV)?, read(PASSWORD_ENV)?))
    }
}

impl fmt::Debug for RegistryAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryAuth")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_reads_both_variables() {
        let auth = RegistryAuth::from_lookup(lookup_from(&[
            (USER_ENV, "mirror"),
            (PASSWORD_ENV, "hunter2"),
        ]))
        .expect("should resolve credentials");
        assert_eq!(auth, RegistryAuth::new("mirror", "hunter2"));
    }

    #[test]
    fn test_missing_password_is_credentials_error() {
        let err = RegistryAuth::from_lookup(lookup_from(&[(USER_ENV, "mirror")]))
            .expect_err("missing password should fail");
        assert!(matches!(err, FerryError::Credentials(msg) if msg.contains(PASSWORD_ENV)));
    }

    #[test]
    fn test_empty_user_counts_as_missing() {
        let err = RegistryAuth::from_lookup(lookup_from(&[(USER_ENV, ""), (PASSWORD_ENV, "x")]))
            .expect_err("empty user should fail");
        assert!(matches!(err, FerryError::Credentials(_)));
    }

    #[test]
    fn test_debug_hides_password() {
        let rendered = format!("{:?}", RegistryAuth::new("mirror", "hunter2"));
        assert!(!rendered.contains("hunter2"));
    }
}
