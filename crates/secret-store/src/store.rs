use async_trait::async_trait;
use rand::Rng;
use rand::distributions::Alphanumeric;

use crate::Result;

/// Name prefix for provisioning step list blobs.
pub const PROVISIONING_STEPS_SECRET_PREFIX: &str = "stp-";

/// Name prefix for accumulated subscription parameter blobs.
pub const PARAMETERS_SECRET_PREFIX: &str = "prm-";

const SECRET_NAME_SUFFIX_LEN: usize = 12;

/// Generates a fresh secret name as `{prefix}{random alphanumeric suffix}`.
///
/// Callers never pick their own names, so independently generated names
/// do not collide in practice.
pub fn generate_secret_name(prefix: &str) -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(SECRET_NAME_SUFFIX_LEN)
        .map(char::from)
        .collect();
    format!("{}{}", prefix, suffix)
}

/// Opaque key → value store for large or sensitive blobs.
///
/// All implementations must be thread-safe (Send + Sync). Values are
/// opaque strings; callers serialize structured content themselves.
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Retrieves a secret value by name.
    ///
    /// Fails with `SecretStoreError::NotFound` if the name is unknown.
    async fn get(&self, name: &str) -> Result<String>;

    /// Stores a secret value under the given name, overwriting any
    /// previous value.
    async fn set(&self, name: &str, value: &str) -> Result<()>;

    /// Deletes a secret. Deleting an unknown name is not an error.
    async fn delete(&self, name: &str) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_names_carry_prefix() {
        let name = generate_secret_name(PROVISIONING_STEPS_SECRET_PREFIX);
        assert!(name.starts_with("stp-"));
        assert_eq!(name.len(), "stp-".len() + SECRET_NAME_SUFFIX_LEN);
    }

    #[test]
    fn generated_names_are_unique() {
        let a = generate_secret_name(PARAMETERS_SECRET_PREFIX);
        let b = generate_secret_name(PARAMETERS_SECRET_PREFIX);
        assert_ne!(a, b);
    }
}
