use serde::{Deserialize, Serialize};
use ztmf_common::env;

pub const DEFAULT_REGION: &str = "us-east-1";

/// S3 client settings.
///
/// Without static keys the default AWS credential chain is used, which is what
/// a task role provides in deployed environments.
#[derive(Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub endpoint: Option<String>,
    pub region: String,
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
    pub path_style: bool,
}

impl std::fmt::Debug for StorageConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageConfig")
            .field("endpoint", &self.endpoint)
            .field("region", &self.region)
            .field("static_credentials", &self.access_key.is_some())
            .field("path_style", &self.path_style)
            .finish()
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            region: DEFAULT_REGION.to_string(),
            access_key: None,
            secret_key: None,
            path_style: false,
        }
    }
}

impl StorageConfig {
    pub fn from_env() -> ztmf_common::Result<Self> {
        Ok(Self {
            endpoint: env::var("S3_ENDPOINT"),
            region: env::first_of(&["S3_REGION", "AWS_REGION"])
                .unwrap_or_else(|| DEFAULT_REGION.to_string()),
            access_key: env::first_of(&["S3_ACCESS_KEY", "AWS_ACCESS_KEY_ID"]),
            secret_key: env::first_of(&["S3_SECRET_KEY", "AWS_SECRET_ACCESS_KEY"]),
            path_style: env::flag("S3_PATH_STYLE", false)?,
        })
    }

    /// Local S3-compatible endpoint with static credentials.
    pub fn for_endpoint(
        endpoint: impl Into<String>,
        access_key: impl Into<String>,
        secret_key: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: Some(endpoint.into()),
            region: DEFAULT_REGION.to_string(),
            access_key: Some(access_key.into()),
            secret_key: Some(secret_key.into()),
            path_style: true,
        }
    }

    pub fn has_static_credentials(&self) -> bool {
        self.access_key.is_some() && self.secret_key.is_some()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn endpoint_config_uses_path_style() {
        let config = StorageConfig::for_endpoint("http://localhost:9000", "key", "secret");
        assert!(config.path_style);
        assert!(config.has_static_credentials());
        assert!(!format!("{config:?}").contains("secret"));
    }

    #[test]
    #[serial]
    fn falls_back_to_aws_variables() {
        std::env::remove_var("S3_REGION");
        std::env::remove_var("S3_ACCESS_KEY");
        std::env::remove_var("S3_SECRET_KEY");
        std::env::set_var("AWS_REGION", "us-gov-west-1");
        std::env::set_var("AWS_ACCESS_KEY_ID", "AKIA");

        let config = StorageConfig::from_env().unwrap();
        assert_eq!(config.region, "us-gov-west-1");
        assert_eq!(config.access_key.as_deref(), Some("AKIA"));

        std::env::remove_var("AWS_REGION");
        std::env::remove_var("AWS_ACCESS_KEY_ID");
    }
}
