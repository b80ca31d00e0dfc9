use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use std::path::Path;

use super::{types::Config, ConfigError};

/// Prefix for environment variable overrides, e.g. `SUBJECTIFY_LOOKUP__MAX_ATTEMPTS`.
pub const ENV_PREFIX: &str = "SUBJECTIFY_";

/// Load configuration with environment variable overrides.
///
/// Without a file, defaults are used as the base layer. A file that was
/// asked for but does not exist is an error.
pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    load_with_env_prefix(path, ENV_PREFIX)
}

fn load_with_env_prefix(path: Option<&Path>, prefix: &str) -> Result<Config, ConfigError> {
    let mut figment = Figment::from(Serialized::defaults(Config::default()));

    if let Some(path) = path {
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()));
        }
        figment = figment.merge(Toml::file(path));
    }

    figment
        .merge(Env::prefixed(prefix).split("__"))
        .extract()
        .map_err(|e| ConfigError::ParseError(e.to_string()))
}

/// Load configuration from TOML string (useful for testing)
pub fn load_config_from_str(toml_str: &str) -> Result<Config, ConfigError> {
    toml::from_str(toml_str).map_err(|e| ConfigError::ParseError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_config_from_str_valid() {
        let toml = r#"
[lookup]
max_attempts = 4

[batch]
workers = 16
"#;
        let config = load_config_from_str(toml).unwrap();
        assert_eq!(config.lookup.max_attempts, 4);
        assert_eq!(config.batch.workers, 16);
    }

    #[test]
    fn test_load_config_from_str_wrong_type() {
        let toml = r#"
[batch]
workers = "many"
"#;
        let result = load_config_from_str(toml);
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_load_config_file_not_found() {
        let result = load_config(Some(Path::new("/nonexistent/subjectify.toml")));
        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn test_load_config_without_file() {
        let config = load_with_env_prefix(None, "SUBJECTIFY_TEST_NO_FILE_").unwrap();
        assert_eq!(config.lookup.timeout_ms, 10_000);
        assert_eq!(config.batch.workers, 4);
    }

    #[test]
    fn test_load_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(
            temp_file,
            r#"
[service]
base_url = "http://127.0.0.1:9999/classify"

[resolver]
ambiguity_threshold = 0.2
"#
        )
        .unwrap();

        let config = load_with_env_prefix(Some(temp_file.path()), "SUBJECTIFY_TEST_FILE_").unwrap();
        assert_eq!(config.service.base_url, "http://127.0.0.1:9999/classify");
        assert_eq!(config.resolver.ambiguity_threshold, 0.2);
        // Untouched sections keep their defaults
        assert_eq!(config.lookup.max_attempts, 3);
    }

    #[test]
    fn test_env_overrides_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(
            temp_file,
            r#"
[lookup]
max_attempts = 2
"#
        )
        .unwrap();

        std::env::set_var("SUBJECTIFY_TEST_ENV_LOOKUP__MAX_ATTEMPTS", "7");
        std::env::set_var("SUBJECTIFY_TEST_ENV_BATCH__WORKERS", "9");
        let config = load_with_env_prefix(Some(temp_file.path()), "SUBJECTIFY_TEST_ENV_").unwrap();
        std::env::remove_var("SUBJECTIFY_TEST_ENV_LOOKUP__MAX_ATTEMPTS");
        std::env::remove_var("SUBJECTIFY_TEST_ENV_BATCH__WORKERS");

        assert_eq!(config.lookup.max_attempts, 7);
        assert_eq!(config.batch.workers, 9);
    }
}
