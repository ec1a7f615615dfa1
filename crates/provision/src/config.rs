//! Provisioning service configuration.
//!
//! Assembled once at process start and passed into the orchestrator's
//! constructor; business logic never reads the environment directly.

/// Default management endpoint for template deployments.
pub const DEFAULT_ARM_MANAGEMENT_BASE_URL: &str = "https://management.azure.com";

/// Immutable configuration of the provisioning service.
///
/// Reads from environment variables:
/// - `GALLERY_SERVICE_BASE_URL` — base URL of the downstream application
///   registration service (PaaS bootstrap webhook)
/// - `GALLERY_SERVICE_KEY` — API key for the registration service
/// - `JUMPBOX_ARM_TEMPLATE_URL` — template deployed by the IaaS bootstrap
///   step
/// - `ARM_MANAGEMENT_BASE_URL` — management endpoint for deployments
#[derive(Debug, Clone)]
pub struct ProvisionConfig {
    pub gallery_base_url: Option<String>,
    pub gallery_api_key: Option<String>,
    pub jumpbox_template_url: Option<String>,
    pub arm_management_base_url: String,
}

impl ProvisionConfig {
    /// Loads configuration from environment variables, falling back to
    /// defaults.
    pub fn from_env() -> Self {
        Self {
            gallery_base_url: std::env::var("GALLERY_SERVICE_BASE_URL").ok(),
            gallery_api_key: std::env::var("GALLERY_SERVICE_KEY").ok(),
            jumpbox_template_url: std::env::var("JUMPBOX_ARM_TEMPLATE_URL").ok(),
            arm_management_base_url: std::env::var("ARM_MANAGEMENT_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_ARM_MANAGEMENT_BASE_URL.to_string()),
        }
    }
}

impl Default for ProvisionConfig {
    fn default() -> Self {
        Self {
            gallery_base_url: None,
            gallery_api_key: None,
            jumpbox_template_url: None,
            arm_management_base_url: DEFAULT_ARM_MANAGEMENT_BASE_URL.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let config = ProvisionConfig::default();
        assert!(config.gallery_base_url.is_none());
        assert!(config.gallery_api_key.is_none());
        assert!(config.jumpbox_template_url.is_none());
        assert_eq!(
            config.arm_management_base_url,
            DEFAULT_ARM_MANAGEMENT_BASE_URL
        );
    }
}
