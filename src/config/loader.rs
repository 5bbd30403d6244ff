//! Configuration loading from disk.

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::config::schema::{LoadedConfig, RawDocument, RuleTable, DEFAULT_PORT};
use crate::config::validation::{parse_non_negative, validate_endpoint, EndpointOutcome};

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid 'port' in configuration: {0}")]
    InvalidPort(String),

    #[error("invalid configuration schema: {0}")]
    InvalidSchema(&'static str),

    #[error("failed to create request directory {path}: {source}")]
    DirectoryCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Load and validate configuration from a JSON file.
///
/// Endpoint-level problems are logged and the endpoint skipped or coerced; only
/// document-level problems fail the load. Directories named by
/// `request_file_path` are created as a side effect.
pub fn load_config(path: &Path) -> Result<LoadedConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_config(&content)
}

/// Validate an already-read document.
pub fn parse_config(content: &str) -> Result<LoadedConfig, ConfigError> {
    let document: RawDocument = serde_json::from_str(content)?;

    let port = parse_port(document.port.as_ref())?;

    let endpoints = match document.endpoints {
        Some(Value::Array(endpoints)) => endpoints,
        Some(_) => return Err(ConfigError::InvalidSchema("'endpoints' should be an array")),
        None => return Err(ConfigError::InvalidSchema("missing 'endpoints'")),
    };

    let mut warnings = Vec::new();
    let mut rules = Vec::with_capacity(endpoints.len());
    let mut disabled = 0usize;

    for (position, record) in endpoints.iter().enumerate() {
        match validate_endpoint(position, record, &mut warnings) {
            EndpointOutcome::Accepted(rule) => {
                if let Some(dir) = &rule.request_file_path {
                    ensure_directory(dir)?;
                }
                rules.push(rule);
            }
            EndpointOutcome::Disabled => disabled += 1,
            EndpointOutcome::Skipped => {}
        }
    }

    for warning in &warnings {
        tracing::warn!("{}", warning);
    }

    tracing::debug!(
        rules = rules.len(),
        disabled,
        skipped = endpoints.len() - rules.len() - disabled,
        "Configuration validated"
    );

    Ok(LoadedConfig {
        port,
        table: RuleTable::new(rules),
    })
}

fn parse_port(value: Option<&Value>) -> Result<u16, ConfigError> {
    let Some(value) = value else {
        return Ok(DEFAULT_PORT);
    };
    parse_non_negative(value)
        .and_then(|n| u16::try_from(n).ok())
        .ok_or_else(|| ConfigError::InvalidPort(value.to_string()))
}

fn ensure_directory(dir: &Path) -> Result<(), ConfigError> {
    if dir.is_dir() {
        return Ok(());
    }
    fs::create_dir_all(dir).map_err(|source| ConfigError::DirectoryCreate {
        path: dir.to_path_buf(),
        source,
    })?;
    tracing::info!(path = %dir.display(), "Created request directory");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn loads_minimal_document() {
        let loaded = parse_config(
            r#"{"port":8080,"endpoints":[{"method":"GET","path":"/health","response_code":200}]}"#,
        )
        .unwrap();
        assert_eq!(loaded.port, 8080);
        assert_eq!(loaded.table.len(), 1);
        let rule = loaded.table.matching("GET", "/health")[0];
        assert_eq!(rule.response_code, 200);
        assert_eq!(rule.delay, Duration::ZERO);
    }

    #[test]
    fn port_defaults_and_accepts_strings() {
        assert_eq!(parse_config(r#"{"endpoints":[]}"#).unwrap().port, 8080);
        assert_eq!(parse_config(r#"{"port":"9000","endpoints":[]}"#).unwrap().port, 9000);
    }

    #[test]
    fn rejects_invalid_port() {
        for doc in [
            r#"{"port":"http","endpoints":[]}"#,
            r#"{"port":-1,"endpoints":[]}"#,
            r#"{"port":70000,"endpoints":[]}"#,
        ] {
            assert!(matches!(parse_config(doc), Err(ConfigError::InvalidPort(_))), "{}", doc);
        }
    }

    #[test]
    fn rejects_bad_schema() {
        assert!(matches!(
            parse_config(r#"{"port":8080}"#),
            Err(ConfigError::InvalidSchema(_))
        ));
        assert!(matches!(
            parse_config(r#"{"endpoints":{"method":"GET"}}"#),
            Err(ConfigError::InvalidSchema(_))
        ));
        assert!(matches!(parse_config("[]"), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn reports_parse_failure() {
        assert!(matches!(
            parse_config(r#"{"endpoints": [ "#),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn skips_disabled_and_incomplete_endpoints() {
        let loaded = parse_config(
            r#"{"endpoints":[
                {"method":"GET","path":"/a","enabled":false},
                {"path":"/b"},
                {"method":"get","path":"/c"}
            ]}"#,
        )
        .unwrap();
        assert_eq!(loaded.table.len(), 1);
        assert!(loaded.table.matching("GET", "/a").is_empty());
        assert_eq!(loaded.table.matching("GET", "/c").len(), 1);
    }

    #[test]
    fn missing_file_is_read_error() {
        let err = load_config(Path::new("/definitely/not/here/settings.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn creates_request_directories() {
        let dir = tempfile::tempdir().unwrap();
        let uploads = dir.path().join("uploads").join("nested");
        let doc = serde_json::json!({
            "endpoints": [{
                "method": "POST",
                "path": "/upload",
                "request_file_path": uploads.to_string_lossy()
            }]
        });
        let config_path = dir.path().join("settings.json");
        fs::write(&config_path, doc.to_string()).unwrap();

        let loaded = load_config(&config_path).unwrap();
        assert!(uploads.is_dir());
        assert_eq!(
            loaded.table.matching("POST", "/upload")[0].request_file_path,
            Some(uploads)
        );
    }

    #[test]
    fn directory_failure_aborts_load() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        fs::write(&blocker, b"x").unwrap();
        let doc = serde_json::json!({
            "endpoints": [{
                "method": "POST",
                "path": "/upload",
                "request_file_path": blocker.join("sub").to_string_lossy()
            }]
        });
        let err = parse_config(&doc.to_string()).unwrap_err();
        assert!(matches!(err, ConfigError::DirectoryCreate { .. }));
    }

    #[test]
    fn loading_twice_is_equivalent() {
        let doc = r#"{"endpoints":[
            {"method":"GET","path":"/a","response_code":201,"delay":5},
            {"method":"GET","path":"/a","response_code":202}
        ]}"#;
        assert_eq!(parse_config(doc).unwrap(), parse_config(doc).unwrap());
    }
}
