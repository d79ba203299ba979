//! Configuration loader.

use std::fs;
use std::path::Path;

use regex::Regex;

use crate::error::ConfigError;
use crate::schema::Config;

/// Configuration loader with environment variable substitution.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Config, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.display().to_string()));
        }
        let content = fs::read_to_string(path)?;
        Self::load_str(&content)
    }

    /// Load configuration from a file, falling back to defaults when it is absent.
    pub fn load_or_default(path: &Path) -> Result<Config, ConfigError> {
        match Self::load(path) {
            Err(ConfigError::NotFound(_)) => Ok(Config::default()),
            other => other,
        }
    }

    /// Load configuration from a string.
    pub fn load_str(content: &str) -> Result<Config, ConfigError> {
        let expanded = Self::expand_env_vars(content)?;
        let config: Config = toml::from_str(&expanded)?;
        Ok(config)
    }

    /// Expand environment variables in the format `${VAR}`.
    fn expand_env_vars(content: &str) -> Result<String, ConfigError> {
        let mut result = content.to_string();
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| ConfigError::InvalidValue {
            field: "env pattern".to_string(),
            message: e.to_string(),
        })?;

        for cap in re.captures_iter(content) {
            let var_name = &cap[1];
            let var_value = std::env::var(var_name)
                .map_err(|_| ConfigError::EnvVarNotSet(var_name.to_string()))?;
            result = result.replace(&cap[0], &var_value);
        }

        Ok(result)
    }

    /// Expand shell-style paths (e.g., `~/.reqflow`).
    pub fn expand_path(path: &str) -> String {
        shellexpand::tilde(path).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_empty_config() {
        let config = ConfigLoader::load_str("").unwrap();
        assert_eq!(config.submitter.min_wait_secs, 2);
        assert_eq!(config.poller.poll_interval_secs, 15);
    }

    #[test]
    fn test_load_submitter_section() {
        let content = r#"
            [submitter]
            batch_size = 3
            min_wait_secs = 1
            max_wait_secs = 8
            max_loops = 5
        "#;
        let config = ConfigLoader::load_str(content).unwrap();
        assert_eq!(config.submitter.batch_size, 3);
        assert_eq!(config.submitter.max_wait_secs, 8);
        assert_eq!(config.submitter.max_loops, 5);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[poller]").unwrap();
        writeln!(file, "poll_interval_secs = 30").unwrap();

        let config = ConfigLoader::load(file.path()).unwrap();
        assert_eq!(config.poller.poll_interval_secs, 30);
    }

    #[test]
    fn test_load_nonexistent_file() {
        let result = ConfigLoader::load(Path::new("/nonexistent/path/reqflow.toml"));
        assert!(matches!(result, Err(ConfigError::NotFound(_))));
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let config = ConfigLoader::load_or_default(Path::new("/nonexistent/reqflow.toml")).unwrap();
        assert_eq!(config.retry.max_retries, 3);
    }

    #[test]
    fn test_load_invalid_toml() {
        let result = ConfigLoader::load_str("invalid = [unclosed");
        assert!(matches!(result, Err(ConfigError::TomlParse(_))));
    }

    #[test]
    fn test_expand_env_vars() {
        // SAFETY: test-only variable name, not read anywhere else.
        unsafe {
            std::env::set_var("REQFLOW_TEST_CATALOG", "12345");
        }
        let content = "[provider]\ncatalog = \"${REQFLOW_TEST_CATALOG}\"";
        let config = ConfigLoader::load_str(content).unwrap();
        assert_eq!(config.provider.catalog, "12345");
        unsafe {
            std::env::remove_var("REQFLOW_TEST_CATALOG");
        }
    }

    #[test]
    fn test_expand_env_vars_not_set() {
        let content = "value = \"${REQFLOW_NONEXISTENT_VAR_12345}\"";
        let result = ConfigLoader::expand_env_vars(content);
        assert!(matches!(result, Err(ConfigError::EnvVarNotSet(_))));
    }

    #[test]
    fn test_expand_env_vars_no_vars() {
        let content = "value = \"no variables here\"";
        let expanded = ConfigLoader::expand_env_vars(content).unwrap();
        assert_eq!(expanded, content);
    }

    #[test]
    fn test_expand_path_with_tilde() {
        let expanded = ConfigLoader::expand_path("~/reqflow.db");
        assert!(!expanded.starts_with('~'));
        assert!(expanded.ends_with("/reqflow.db"));
    }

    #[test]
    fn test_load_templates() {
        let content = r#"
            [[templates]]
            command = "REQUEST_TSY"
            request_name = "TsyBondStatic"
            title = "Treasury static"
            identifiers = ["91282CMV0"]
            fields = ["SECURITY_DES", "MATURITY"]
        "#;
        let config = ConfigLoader::load_str(content).unwrap();
        assert_eq!(config.templates.len(), 1);
        assert_eq!(config.templates[0].identifier_type, "CUSIP");
        assert_eq!(config.templates[0].output_format, "text/csv");
    }
}
