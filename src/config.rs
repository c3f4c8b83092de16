//! Configuration management

use std::{collections::BTreeMap, env, path::Path, path::PathBuf, sync::Arc};

use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::client::{ClientRegistry, ClientSettings};
use crate::collaborator::CollaboratorRegistry;
use crate::token::{FileTokenStore, MemoryTokenStore, TokenStore};
use crate::{Error, Result};

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Environment files to load before processing config.
    /// Paths support ~ expansion. Loaded in order, later files override earlier.
    /// Variables are set into the process environment for `${VAR}` resolution.
    pub env_files: Vec<String>,
    /// Token storage configuration
    pub token_storage: TokenStorageConfig,
    /// OAuth2 clients keyed by identifier
    pub clients: BTreeMap<String, ClientSettings>,
}

/// Where issued tokens are persisted
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "snake_case")]
pub enum TokenStorageConfig {
    /// Process memory (lost on exit)
    Memory,
    /// One JSON file per client under `directory` (default ~/.oauth2-grant/tokens)
    File {
        /// Storage directory, supports ~ expansion
        #[serde(default)]
        directory: Option<String>,
    },
}

impl Default for TokenStorageConfig {
    fn default() -> Self {
        Self::File { directory: None }
    }
}

impl TokenStorageConfig {
    /// Open the configured store
    pub fn open(&self) -> Result<Arc<dyn TokenStore>> {
        match self {
            Self::Memory => Ok(Arc::new(MemoryTokenStore::new())),
            Self::File { directory: None } => Ok(Arc::new(FileTokenStore::default_location()?)),
            Self::File {
                directory: Some(dir),
            } => Ok(Arc::new(FileTokenStore::new(PathBuf::from(expand_home(dir)))?)),
        }
    }
}

impl Config {
    /// Load configuration from file and environment
    ///
    /// # Errors
    ///
    /// Returns an error if the config file does not exist or cannot be parsed.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::new();

        // Load from file if provided
        if let Some(p) = path {
            if !p.exists() {
                return Err(Error::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            figment = figment.merge(Yaml::file(p));
        }

        // Merge environment variables (OAUTH2_GRANT_ prefix)
        figment = figment.merge(Env::prefixed("OAUTH2_GRANT_").split("__"));

        let mut config: Self = figment
            .extract()
            .map_err(|e| Error::Config(e.to_string()))?;

        // Load env files into process environment (before env var expansion)
        config.load_env_files();

        config.expand_env_vars()?;

        Ok(config)
    }

    /// Validate every client against `collaborators` and build the lookup
    pub fn client_registry(&self, collaborators: &CollaboratorRegistry) -> Result<ClientRegistry> {
        ClientRegistry::from_settings(&self.clients, collaborators)
    }

    /// Load environment files into the process environment.
    /// Supports ~ expansion. Files that don't exist are silently skipped.
    fn load_env_files(&self) {
        for path_str in &self.env_files {
            let expanded = expand_home(path_str);

            let path = Path::new(&expanded);
            if path.exists() {
                match dotenvy::from_path(path) {
                    Ok(()) => {
                        tracing::info!("Loaded env file: {expanded}");
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load env file {expanded}: {e}");
                    }
                }
            } else {
                tracing::debug!("Env file not found (skipped): {expanded}");
            }
        }
    }

    /// Expand ${VAR} and ${VAR:-default} patterns in client settings
    fn expand_env_vars(&mut self) -> Result<()> {
        // Pattern: ${VAR} or ${VAR:-default}
        let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)(?::-([^}]*))?\}")
            .map_err(|e| Error::Config(e.to_string()))?;

        for client in self.clients.values_mut() {
            for value in [
                &mut client.authorization_url,
                &mut client.token_url,
            ] {
                *value = Self::expand_string(&re, value);
            }
            for value in [
                &mut client.client_id,
                &mut client.client_secret,
                &mut client.resource_owner_url,
                &mut client.username,
                &mut client.password,
            ]
            .into_iter()
            .flatten()
            {
                *value = Self::expand_string(&re, value);
            }
        }

        Ok(())
    }

    /// Expand environment variables in a string
    fn expand_string(re: &Regex, value: &str) -> String {
        re.replace_all(value, |caps: &regex::Captures| {
            let var_name = &caps[1];
            let default = caps.get(2).map_or("", |m| m.as_str());
            env::var(var_name).unwrap_or_else(|_| default.to_string())
        })
        .into_owned()
    }
}

fn expand_home(path: &str) -> String {
    if path.starts_with('~') {
        if let Some(home) = dirs::home_dir() {
            return path.replacen('~', &home.display().to_string(), 1);
        }
    }
    path.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    const YAML: &str = r#"
token_storage:
  backend: memory
clients:
  svc1:
    client_secret: "${OAUTH2_GRANT_TEST_SECRET:-fallback}"
    authorization_url: https://auth/a
    token_url: https://auth/t
    scopes: [read, write]
    grant_type: client_credentials
    collaborators:
      http_client: reqwest
"#;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn load_from_yaml_expands_defaults() {
        let file = write_config(YAML);
        let config = Config::load(Some(file.path())).unwrap();

        let svc1 = &config.clients["svc1"];
        assert_eq!(svc1.client_secret.as_deref(), Some("fallback"));
        assert_eq!(svc1.scopes, vec!["read".to_string(), "write".to_string()]);
        assert!(matches!(config.token_storage, TokenStorageConfig::Memory));
    }

    #[test]
    fn missing_file_is_a_config_error() {
        let err = Config::load(Some(Path::new("/nonexistent/oauth2-grant.yaml"))).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn client_registry_validates_collaborators() {
        let file = write_config(YAML);
        let config = Config::load(Some(file.path())).unwrap();

        let registry = config
            .client_registry(&CollaboratorRegistry::with_defaults())
            .unwrap();
        assert_eq!(registry.ids(), vec!["svc1"]);

        let err = config
            .client_registry(&CollaboratorRegistry::new())
            .unwrap_err();
        assert!(matches!(err, Error::UnknownCollaborator { .. }));
    }

    #[test]
    fn expand_string_prefers_environment() {
        let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)(?::-([^}]*))?\}").unwrap();
        let value = Config::expand_string(&re, "${PATH:-none}");
        assert_ne!(value, "none");
        assert_eq!(
            Config::expand_string(&re, "${OAUTH2_GRANT_UNSET_FOR_TEST:-x}"),
            "x"
        );
    }

    #[test]
    fn test_load_env_files_sets_env_vars() {
        let dir = tempfile::tempdir().unwrap();
        let env_path = dir.path().join("test.env");
        let mut f = std::fs::File::create(&env_path).unwrap();
        writeln!(f, "OAUTH2_GRANT_TEST_ENV_FILE_KEY=from_env_file").unwrap();
        drop(f);

        let config = Config {
            env_files: vec![env_path.to_string_lossy().to_string()],
            ..Default::default()
        };
        config.load_env_files();

        assert_eq!(
            env::var("OAUTH2_GRANT_TEST_ENV_FILE_KEY").unwrap(),
            "from_env_file"
        );
    }

    #[test]
    fn test_load_env_files_skips_missing() {
        let config = Config {
            env_files: vec!["/nonexistent/path/.env".to_string()],
            ..Default::default()
        };
        config.load_env_files();
    }

    #[test]
    fn file_storage_opens_in_configured_directory() {
        let dir = tempfile::tempdir().unwrap();
        let storage = TokenStorageConfig::File {
            directory: Some(dir.path().join("tokens").to_string_lossy().to_string()),
        };
        storage.open().unwrap();
        assert!(dir.path().join("tokens").is_dir());
    }

    #[test]
    fn default_storage_is_file() {
        let config: Config = serde_yaml::from_str("clients: {}").unwrap();
        assert!(matches!(
            config.token_storage,
            TokenStorageConfig::File { directory: None }
        ));
    }
}
