use std::{
    env,
    fs::File,
    io::{ErrorKind, Read},
    path::Path,
    time::Duration,
};

use color_eyre::{Result, eyre::Context};
use serde::Deserialize;
use tracing::{info, warn};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    /// Idle workspaces older than this are dropped.
    pub workspace_idle_secs: u64,
}

impl ServerConfig {
    pub fn workspace_idle(&self) -> Duration {
        Duration::from_secs(self.workspace_idle_secs)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:3030".to_string(),
            workspace_idle_secs: 3600,
        }
    }
}

/// Identity pool and user pool the session tokens belong to.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CognitoConfig {
    pub identity_pool_id: String,
    pub provider_region: String,
    pub user_pool_id: String,
}

/// Where and what to invoke.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AwsConfig {
    pub region: String,
    pub function_name: String,
    pub prompt: String,
}

impl Default for AwsConfig {
    fn default() -> Self {
        Self {
            region: "us-east-1".to_string(),
            function_name: "myLambdaFunction".to_string(),
            prompt: "PROMPT#123".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub cookie: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie: "id_token".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CredentialsConfig {
    pub cache: bool,
    pub refresh_margin_secs: u64,
}

impl CredentialsConfig {
    pub fn refresh_margin(&self) -> Duration {
        Duration::from_secs(self.refresh_margin_secs)
    }
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            cache: false,
            refresh_margin_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResponseOrder {
    /// Only the newest submission may replace the displayed response.
    #[default]
    LatestSubmitted,
    /// Whichever submission resolves last wins.
    LastResolved,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct FlowPolicy {
    pub surface_failures: bool,
    pub response_order: ResponseOrder,
}

impl Default for FlowPolicy {
    fn default() -> Self {
        Self {
            surface_failures: true,
            response_order: ResponseOrder::LatestSubmitted,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub cognito: CognitoConfig,
    pub aws: AwsConfig,
    pub session: SessionConfig,
    pub credentials: CredentialsConfig,
    pub flow: FlowPolicy,
}

impl AppConfig {
    /// Reads the config file if present, then applies environment overrides.
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = match Self::read_file(path)? {
            Some(text) => Self::parse(&text)?,
            None => {
                info!("No config file at {:?}, using defaults", path);
                Self::default()
            }
        };

        config.apply_env(|key| env::var(key).ok());
        Ok(config)
    }

    pub fn parse(text: &str) -> Result<Self> {
        toml::from_str(text).wrap_err("Malformed config file")
    }

    fn read_file(path: &Path) -> Result<Option<String>> {
        let mut config_text = String::new();

        match File::open(path) {
            Ok(mut f) => {
                f.read_to_string(&mut config_text)
                    .wrap_err_with(|| format!("Cannot read config file at {:?}", path))?;
                Ok(Some(config_text))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => {
                Err(e).wrap_err_with(|| format!("Cannot open config file at {:?}", path))
            }
        }
    }

    fn apply_env<F>(&mut self, var: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let overrides = [
            ("COGNITO_IDENTITY_POOL_ID", &mut self.cognito.identity_pool_id),
            ("COGNITO_REGION", &mut self.cognito.provider_region),
            ("COGNITO_USER_POOL_ID", &mut self.cognito.user_pool_id),
            ("BIND_ADDRESS", &mut self.server.bind),
        ];

        for (key, slot) in overrides {
            match var(key) {
                Some(value) if !value.is_empty() => {
                    info!("{key} set from environment");
                    *slot = value;
                }
                Some(_) => warn!("{key} is set but empty, ignoring"),
                None => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let config = AppConfig::parse("").unwrap();

        assert_eq!(config.aws.region, "us-east-1");
        assert_eq!(config.aws.function_name, "myLambdaFunction");
        assert_eq!(config.aws.prompt, "PROMPT#123");
        assert_eq!(config.session.cookie, "id_token");
        assert_eq!(config.server.workspace_idle_secs, 3600);
        assert!(!config.credentials.cache);
        assert!(config.flow.surface_failures);
        assert_eq!(config.flow.response_order, ResponseOrder::LatestSubmitted);
    }

    #[test]
    fn sections_override_defaults() {
        let config = AppConfig::parse(
            r#"
            [cognito]
            identity_pool_id = "us-east-1:pool"
            provider_region = "eu-west-1"
            user_pool_id = "eu-west-1_abc"

            [flow]
            surface_failures = false
            response_order = "last-resolved"
            "#,
        )
        .unwrap();

        assert_eq!(config.cognito.identity_pool_id, "us-east-1:pool");
        assert_eq!(config.cognito.provider_region, "eu-west-1");
        assert!(!config.flow.surface_failures);
        assert_eq!(config.flow.response_order, ResponseOrder::LastResolved);
        assert_eq!(config.aws.region, "us-east-1");
    }

    #[test]
    fn malformed_file_is_rejected() {
        assert!(AppConfig::parse("[flow]\nresponse_order = \"random\"").is_err());
    }

    #[test]
    fn env_overrides_file_values() {
        let env: HashMap<&str, &str> = [
            ("COGNITO_IDENTITY_POOL_ID", "us-east-1:from-env"),
            ("COGNITO_USER_POOL_ID", ""),
        ]
        .into_iter()
        .collect();

        let mut config = AppConfig::default();
        config.cognito.user_pool_id = "from-file".to_string();
        config.apply_env(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.cognito.identity_pool_id, "us-east-1:from-env");
        assert_eq!(config.cognito.user_pool_id, "from-file");
        assert_eq!(config.server.bind, "127.0.0.1:3030");
    }

    #[test]
    fn missing_file_loads_defaults() {
        let config = AppConfig::load(Path::new("/nonexistent/service_prompt.toml")).unwrap();
        assert_eq!(config.aws.function_name, "myLambdaFunction");
    }
}
