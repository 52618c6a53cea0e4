//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use crate::config::env::EnvSnapshot;
use crate::config::schema::{HelmetConfig, ServerConfig};
use crate::config::validation::validate_config;
use crate::error::{Error, Result};

/// Load a configuration overlay from a TOML file and validate it.
///
/// Missing fields keep their defaults; capability fields can only be set
/// in code afterwards.
pub fn load_config(path: &Path) -> Result<ServerConfig> {
    load_config_with_env(path, EnvSnapshot::default())
}

/// Like [`load_config`], but env-derived defaults come from `env`.
///
/// Sections the file sets win; sections it omits fall back to defaults
/// derived from the snapshot, so `WEB_HOST` still yields a CSP when the
/// file says nothing about security headers.
pub fn load_config_with_env(path: &Path, env: EnvSnapshot) -> Result<ServerConfig> {
    let content = fs::read_to_string(path).map_err(|e| Error::ConfigFile {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;

    let value: toml::Value = toml::from_str(&content).map_err(|e| Error::ConfigFile {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    let file_sets_helmet = value.get("helmet").is_some();

    let mut config: ServerConfig = value.try_into().map_err(|e| Error::ConfigFile {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;

    if !file_sets_helmet {
        config.helmet = Some(HelmetConfig::derive(&env));
    }
    config.env = env;

    validate_config(&config).map_err(Error::Config)?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    #[test]
    fn loads_a_valid_overlay() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
            port = 4200

            [compress]
            quality = 9
            "#
        )
        .unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.port, 4200);
        assert_eq!(config.compress.quality, 9);
    }

    #[test]
    fn missing_file_reports_the_path() {
        let err = load_config(Path::new("/nonexistent/server.toml")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/server.toml"));
    }

    #[test]
    fn invalid_overlay_fails_validation() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
            protocol = "https"
            "#
        )
        .unwrap();

        let err = load_config(file.path()).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn env_snapshot_reaches_omitted_sections() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "port = 4300").unwrap();

        let env = EnvSnapshot {
            web_host: Some("example.com".to_string()),
            ..EnvSnapshot::default()
        };
        let config = load_config_with_env(file.path(), env).unwrap();

        let helmet = config.helmet.unwrap();
        assert!(helmet.content_security_policy.is_some());
        assert!(config.env.web_host.is_some());
    }
}
