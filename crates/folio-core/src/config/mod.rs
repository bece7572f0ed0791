//! Configuration management with file persistence

use anyhow::{Context, anyhow};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::PathBuf;

/// Folio configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub backend: BackendConfig,
    pub storage: StorageConfig,
    pub metrics: MetricsConfig,
    pub site: SiteConfig,
    pub contact: ContactConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    pub url: String,
    #[serde(skip)]
    pub anon_key: Option<String>,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub bucket: String,
    pub project_folder: String,
    pub experience_folder: String,
    pub max_image_mb: u64,
    pub max_photo_mb: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    pub cooldown_hours: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    pub categories: Vec<String>,
    pub home_project_limit: usize,
    pub related_limit: usize,
    pub new_experience_feed: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContactConfig {
    pub endpoint: String,
    pub service_id: String,
    pub template_id: String,
    pub public_key: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: BackendConfig {
                url: "http://localhost:54321".to_string(),
                anon_key: None,
                timeout_secs: 30,
            },
            storage: StorageConfig {
                bucket: "portfolio-images".to_string(),
                project_folder: "projects".to_string(),
                experience_folder: "testimonials".to_string(),
                max_image_mb: 5,
                max_photo_mb: 2,
            },
            metrics: MetricsConfig { cooldown_hours: 24 },
            site: SiteConfig {
                categories: vec![
                    "Diseño Gráfico".to_string(),
                    "Desarrollo Web".to_string(),
                    "Aplicaciones Moviles".to_string(),
                    "Videojuegos".to_string(),
                ],
                home_project_limit: 6,
                related_limit: 4,
                new_experience_feed: 5,
            },
            contact: ContactConfig {
                endpoint: "https://api.emailjs.com/api/v1.0/email/send".to_string(),
                service_id: String::new(),
                template_id: String::new(),
                public_key: String::new(),
            },
        }
    }
}

impl BackendConfig {
    /// Backend URL, with `SUPABASE_URL` taking precedence over the file
    pub fn resolved_url(&self) -> String {
        env::var("SUPABASE_URL").unwrap_or_else(|_| self.url.clone())
    }

    pub fn resolved_anon_key(&self) -> anyhow::Result<Option<String>> {
        self.enforce_env_only()?;

        Ok(env::var("FOLIO_ANON_KEY")
            .or_else(|_| env::var("SUPABASE_ANON_KEY"))
            .ok())
    }

    pub fn redacted_anon_key(&self) -> anyhow::Result<Option<String>> {
        self.resolved_anon_key().map(|opt| {
            opt.map(|key| {
                if key.len() <= 4 {
                    "***".to_string()
                } else {
                    let suffix = &key[key.len() - 4..];
                    format!("***{}", suffix)
                }
            })
        })
    }

    pub fn enforce_env_only(&self) -> anyhow::Result<()> {
        if self.anon_key.is_some() {
            return Err(anyhow!(
                "Backend keys must be provided via environment variables, not stored in configuration"
            ));
        }
        Ok(())
    }
}

impl StorageConfig {
    pub fn max_image_bytes(&self) -> u64 {
        self.max_image_mb * 1024 * 1024
    }

    pub fn max_photo_bytes(&self) -> u64 {
        self.max_photo_mb * 1024 * 1024
    }
}

impl Config {
    /// Get the config directory path
    pub fn config_dir() -> anyhow::Result<PathBuf> {
        let dir = if let Ok(custom_dir) = env::var("FOLIO_CONFIG_DIR") {
            PathBuf::from(custom_dir)
        } else {
            dirs::config_dir()
                .ok_or_else(|| anyhow!("Could not determine config directory"))?
                .join("folio")
        };
        Ok(dir)
    }

    /// Get the config file path
    pub fn config_path() -> anyhow::Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Path of the local persisted state (session, tracking timestamps)
    pub fn state_path() -> anyhow::Result<PathBuf> {
        Ok(Self::config_dir()?.join("state.json"))
    }

    /// Load configuration from file, or create default if it doesn't exist
    pub fn load() -> anyhow::Result<Self> {
        let path = Self::config_path()?;

        if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            let config: Config = toml::from_str(&contents)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
            config.validate()?;
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }

    /// Save configuration to file
    pub fn save(&self) -> anyhow::Result<()> {
        self.validate()?;

        let dir = Self::config_dir()?;
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create config directory: {}", dir.display()))?;

        let path = Self::config_path()?;
        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(&path, contents)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        self.backend.enforce_env_only()?;
        if self.storage.bucket.trim().is_empty() {
            return Err(anyhow!("storage.bucket cannot be empty"));
        }
        if self.metrics.cooldown_hours < 0 {
            return Err(anyhow!("metrics.cooldown_hours must be non-negative"));
        }
        if self.site.categories.is_empty() {
            return Err(anyhow!("site.categories must list at least one category"));
        }
        Ok(())
    }

    /// Get a configuration value by key
    pub fn get(&self, key: &str) -> anyhow::Result<String> {
        match key {
            "backend.url" => Ok(self.backend.url.clone()),
            "backend.timeout_secs" => Ok(self.backend.timeout_secs.to_string()),

            "storage.bucket" => Ok(self.storage.bucket.clone()),
            "storage.project_folder" => Ok(self.storage.project_folder.clone()),
            "storage.experience_folder" => Ok(self.storage.experience_folder.clone()),
            "storage.max_image_mb" => Ok(self.storage.max_image_mb.to_string()),
            "storage.max_photo_mb" => Ok(self.storage.max_photo_mb.to_string()),

            "metrics.cooldown_hours" => Ok(self.metrics.cooldown_hours.to_string()),

            "site.categories" => Ok(self.site.categories.join(", ")),
            "site.home_project_limit" => Ok(self.site.home_project_limit.to_string()),
            "site.related_limit" => Ok(self.site.related_limit.to_string()),
            "site.new_experience_feed" => Ok(self.site.new_experience_feed.to_string()),

            "contact.endpoint" => Ok(self.contact.endpoint.clone()),
            "contact.service_id" => Ok(self.contact.service_id.clone()),
            "contact.template_id" => Ok(self.contact.template_id.clone()),
            "contact.public_key" => Ok(self.contact.public_key.clone()),

            // Anon key is env-only; show it redacted
            "backend.anon_key" | "anon_key" => match self.backend.redacted_anon_key()? {
                Some(redacted) => Ok(redacted),
                None => Ok("(not set - use FOLIO_ANON_KEY or SUPABASE_ANON_KEY env var)".to_string()),
            },

            _ => Err(anyhow!(
                "Unknown configuration key: {}. Use `folio config list` to see available keys.",
                key
            )),
        }
    }

    /// Set a configuration value by key
    pub fn set(&mut self, key: &str, value: &str) -> anyhow::Result<()> {
        match key {
            "backend.url" => {
                if !value.starts_with("http://") && !value.starts_with("https://") {
                    return Err(anyhow!("backend.url must start with http:// or https://"));
                }
                self.backend.url = value.trim_end_matches('/').to_string();
            }
            "backend.timeout_secs" => {
                self.backend.timeout_secs = value
                    .parse()
                    .with_context(|| format!("Invalid timeout_secs value: {}", value))?;
            }

            "storage.bucket" => {
                if value.trim().is_empty() {
                    return Err(anyhow!("storage.bucket cannot be empty"));
                }
                self.storage.bucket = value.to_string();
            }
            "storage.project_folder" => self.storage.project_folder = value.to_string(),
            "storage.experience_folder" => self.storage.experience_folder = value.to_string(),
            "storage.max_image_mb" => {
                let mb: u64 = value
                    .parse()
                    .with_context(|| format!("Invalid max_image_mb value: {}", value))?;
                if mb == 0 {
                    return Err(anyhow!("storage.max_image_mb must be at least 1"));
                }
                self.storage.max_image_mb = mb;
            }
            "storage.max_photo_mb" => {
                let mb: u64 = value
                    .parse()
                    .with_context(|| format!("Invalid max_photo_mb value: {}", value))?;
                if mb == 0 {
                    return Err(anyhow!("storage.max_photo_mb must be at least 1"));
                }
                self.storage.max_photo_mb = mb;
            }

            "metrics.cooldown_hours" => {
                let hours: i64 = value
                    .parse()
                    .with_context(|| format!("Invalid cooldown_hours value: {}", value))?;
                if hours < 0 {
                    return Err(anyhow!("Cooldown must be non-negative"));
                }
                self.metrics.cooldown_hours = hours;
            }

            "site.categories" => {
                let categories: Vec<String> = value
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect();
                if categories.is_empty() {
                    return Err(anyhow!("site.categories must list at least one category"));
                }
                self.site.categories = categories;
            }
            "site.home_project_limit" => {
                self.site.home_project_limit = value
                    .parse()
                    .with_context(|| format!("Invalid home_project_limit value: {}", value))?;
            }
            "site.related_limit" => {
                self.site.related_limit = value
                    .parse()
                    .with_context(|| format!("Invalid related_limit value: {}", value))?;
            }
            "site.new_experience_feed" => {
                self.site.new_experience_feed = value
                    .parse()
                    .with_context(|| format!("Invalid new_experience_feed value: {}", value))?;
            }

            "contact.endpoint" => self.contact.endpoint = value.to_string(),
            "contact.service_id" => self.contact.service_id = value.to_string(),
            "contact.template_id" => self.contact.template_id = value.to_string(),
            "contact.public_key" => self.contact.public_key = value.to_string(),

            "backend.anon_key" | "anon_key" => {
                return Err(anyhow!(
                    "Backend keys cannot be stored in configuration. \
                     Set the FOLIO_ANON_KEY or SUPABASE_ANON_KEY environment variable instead."
                ));
            }

            _ => {
                return Err(anyhow!(
                    "Unknown configuration key: {}. Use `folio config list` to see available keys.",
                    key
                ));
            }
        }
        Ok(())
    }

    /// List all configuration keys and their values
    pub fn list(&self) -> anyhow::Result<Vec<(String, String)>> {
        let keys = vec![
            "backend.url",
            "backend.timeout_secs",
            "backend.anon_key",
            "storage.bucket",
            "storage.project_folder",
            "storage.experience_folder",
            "storage.max_image_mb",
            "storage.max_photo_mb",
            "metrics.cooldown_hours",
            "site.categories",
            "site.home_project_limit",
            "site.related_limit",
            "site.new_experience_feed",
            "contact.endpoint",
            "contact.service_id",
            "contact.template_id",
            "contact.public_key",
        ];

        keys.into_iter()
            .map(|key| {
                let value = self.get(key)?;
                Ok((key.to_string(), value))
            })
            .collect()
    }

    /// Reset configuration to defaults
    pub fn reset() -> anyhow::Result<()> {
        let path = Self::config_path()?;
        if path.exists() {
            fs::remove_file(&path)
                .with_context(|| format!("Failed to remove config file: {}", path.display()))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();

        assert!(config.backend.anon_key.is_none());
        assert_eq!(config.storage.bucket, "portfolio-images");
        assert_eq!(config.storage.max_image_bytes(), 5 * 1024 * 1024);
        assert_eq!(config.storage.max_photo_bytes(), 2 * 1024 * 1024);
        assert_eq!(config.metrics.cooldown_hours, 24);
        assert_eq!(config.site.categories.len(), 4);
        assert_eq!(config.site.related_limit, 4);
    }

    #[test]
    fn test_config_set_and_get() {
        let mut config = Config::default();
        config.set("backend.url", "https://abc.supabase.co/").unwrap();
        assert_eq!(config.get("backend.url").unwrap(), "https://abc.supabase.co");

        config.set("site.categories", "Web, , Games").unwrap();
        assert_eq!(config.site.categories, vec!["Web", "Games"]);

        config.set("metrics.cooldown_hours", "12").unwrap();
        assert_eq!(config.get("metrics.cooldown_hours").unwrap(), "12");
    }

    #[test]
    fn test_config_set_rejects_bad_values() {
        let mut config = Config::default();
        assert!(config.set("backend.url", "ftp://nope").is_err());
        assert!(config.set("storage.max_image_mb", "0").is_err());
        assert!(config.set("metrics.cooldown_hours", "-1").is_err());
        assert!(config.set("site.categories", " , ").is_err());
        assert!(config.set("no.such.key", "1").is_err());
    }

    #[test]
    fn test_anon_key_cannot_be_stored() {
        let mut config = Config::default();
        assert!(config.set("backend.anon_key", "secret").is_err());

        config.backend.anon_key = Some("secret".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_list_covers_every_key() {
        let config = Config::default();
        let listed = config.list().unwrap();
        assert_eq!(listed.len(), 17);
        assert!(listed.iter().any(|(k, _)| k == "storage.bucket"));
    }

    #[test]
    fn test_config_toml_roundtrip_skips_anon_key() {
        let config = Config::default();
        let serialized = toml::to_string_pretty(&config).unwrap();
        assert!(!serialized.contains("anon_key"));

        let parsed: Config = toml::from_str(&serialized).unwrap();
        assert_eq!(parsed.storage.bucket, config.storage.bucket);
        assert_eq!(parsed.site.categories, config.site.categories);
    }
}
