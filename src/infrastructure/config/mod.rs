use std::path::PathBuf;

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::domain::error::{AppError, Result};
use crate::domain::mapping::{default_entries, FieldMapping, FieldMappingEntry};

pub const ENV_PREFIX: &str = "SHEET_INTAKE_";
pub const CONFIG_PATH_ENV: &str = "SHEET_INTAKE_CONFIG";
pub const DEFAULT_CONFIG_FILE: &str = "sheet-intake.toml";

/// 10 MiB
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub max_upload_bytes: u64,
    pub upload_dir: PathBuf,
    pub log_filter: String,
    pub mapping: Vec<FieldMappingEntry>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3001,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            upload_dir: std::env::temp_dir().join("sheet-intake-uploads"),
            log_filter: "info".to_string(),
            mapping: default_entries(),
        }
    }
}

impl AppConfig {
    /// Defaults, then the TOML file, then `SHEET_INTAKE_*` environment variables.
    /// `.env` is loaded first so it can feed the environment layer.
    pub fn load() -> Result<Self> {
        let _ = dotenvy::dotenv();
        let path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());
        Self::from_figment(Self::figment(&path))
    }

    pub fn figment(config_path: &str) -> Figment {
        Figment::from(Serialized::defaults(AppConfig::default()))
            .merge(Toml::file(config_path))
            .merge(Env::prefixed(ENV_PREFIX).ignore(&["config"]))
    }

    pub fn from_figment(figment: Figment) -> Result<Self> {
        let config: AppConfig = figment
            .extract()
            .map_err(|e| AppError::ConfigError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.port == 0 {
            return Err(AppError::ConfigError("port must be > 0".to_string()));
        }
        if self.max_upload_bytes == 0 {
            return Err(AppError::ConfigError(
                "max_upload_bytes must be > 0".to_string(),
            ));
        }
        if self.host.trim().is_empty() {
            return Err(AppError::ConfigError("host must not be empty".to_string()));
        }
        self.field_mapping().map(|_| ())
    }

    /// Build the immutable mapping table from the configured entries.
    pub fn field_mapping(&self) -> Result<FieldMapping> {
        FieldMapping::from_entries(&self.mapping)
    }

    pub fn bind_address(&self) -> (String, u16) {
        (self.host.clone(), self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::mapping::FieldKind;

    fn from_toml(toml: &str) -> Result<AppConfig> {
        AppConfig::from_figment(
            Figment::from(Serialized::defaults(AppConfig::default())).merge(Toml::string(toml)),
        )
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_upload_bytes, 10_485_760);
        assert_eq!(config.field_mapping().unwrap(), FieldMapping::default());
    }

    #[test]
    fn test_toml_overrides_defaults() {
        let config = from_toml(
            r#"
            port = 8080
            max_upload_bytes = 1024
            "#,
        )
        .unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.max_upload_bytes, 1024);
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.mapping, default_entries());
    }

    #[test]
    fn test_toml_mapping_replaces_table() {
        let config = from_toml(
            r#"
            [[mapping]]
            header = "Price"
            field = "purchasePrice"
            kind = "number"

            [[mapping]]
            header = "Tax"
            field = "taxRate"
            kind = "number"
            "#,
        )
        .unwrap();
        let mapping = config.field_mapping().unwrap();
        assert_eq!(mapping.len(), 2);
        assert_eq!(mapping.kind_of("taxRate"), Some(FieldKind::Number));
        assert!(mapping.rule_for_header("采购价").is_none());
    }

    #[test]
    fn test_rejects_invalid_values() {
        assert!(matches!(from_toml("port = 0"), Err(AppError::ConfigError(_))));
        assert!(matches!(
            from_toml("max_upload_bytes = 0"),
            Err(AppError::ConfigError(_))
        ));
        assert!(matches!(
            from_toml("port = \"not a number\""),
            Err(AppError::ConfigError(_))
        ));
    }

    #[test]
    fn test_rejects_mapping_without_tax_rate() {
        let result = from_toml(
            r#"
            [[mapping]]
            header = "采购价"
            field = "purchasePrice"
            kind = "number"
            "#,
        );
        assert!(matches!(result, Err(AppError::ConfigError(msg)) if msg.contains("taxRate")));
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let path = std::env::temp_dir().join(format!("absent-{}.toml", uuid::Uuid::new_v4()));
        let figment = Figment::from(Serialized::defaults(AppConfig::default()))
            .merge(Toml::file(&path));
        let config = AppConfig::from_figment(figment).unwrap();
        assert_eq!(config.port, 3001);
    }
}
