//! Configuration schema definitions.
//!
//! Two layers live here:
//! - the raw document shape as it comes off disk ([`RawDocument`], [`RawEndpoint`]),
//!   kept loose so that bad values can be coerced instead of rejected;
//! - the validated runtime types ([`Rule`], [`RuleTable`]) plus the process
//!   settings that come from the command line ([`ServerSettings`]).

use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;

/// Port used when the document does not name one.
pub const DEFAULT_PORT: u16 = 8080;

/// Status code used when an endpoint's `response_code` is missing or unusable.
pub const DEFAULT_RESPONSE_CODE: u16 = 200;

/// `response_code` value meaning "accept, write nothing, close".
pub const DROP_SENTINEL: u16 = 0;

/// Top-level configuration document as parsed from JSON.
///
/// Fields stay as [`Value`] so that type errors become validation decisions
/// (default or reject) rather than parse failures.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawDocument {
    pub port: Option<Value>,
    pub endpoints: Option<Value>,
}

/// One endpoint record from the `endpoints` array.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawEndpoint {
    pub method: Option<Value>,
    pub path: Option<Value>,
    pub enabled: Option<Value>,
    pub response_file: Option<Value>,
    pub request_file_path: Option<Value>,
    pub response_code: Option<Value>,
    pub delay: Option<Value>,
}

/// A validated endpoint rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    /// Uppercased, trimmed HTTP method.
    pub method: String,

    /// Trimmed request target, matched exactly.
    pub path: String,

    /// File whose bytes become the response body.
    pub response_file: Option<PathBuf>,

    /// Directory that receives persisted request bodies.
    pub request_file_path: Option<PathBuf>,

    /// Status to answer with; [`DROP_SENTINEL`] drops the connection.
    pub response_code: u16,

    /// Artificial latency before responding.
    pub delay: Duration,
}

impl Rule {
    /// Build a rule with defaults for everything but the key.
    pub fn new(method: impl AsRef<str>, path: impl AsRef<str>) -> Self {
        Self {
            method: method.as_ref().trim().to_uppercase(),
            path: path.as_ref().trim().to_string(),
            response_file: None,
            request_file_path: None,
            response_code: DEFAULT_RESPONSE_CODE,
            delay: Duration::ZERO,
        }
    }

    /// Whether this rule closes the connection instead of answering.
    pub fn drops_connection(&self) -> bool {
        self.response_code == DROP_SENTINEL
    }

    /// Whether this rule matches the given method and request target.
    pub fn matches(&self, method: &str, target: &str) -> bool {
        self.method == method && self.path == target
    }
}

/// Ordered set of active rules, built once per load and never mutated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleTable {
    rules: Vec<Rule>,
}

impl RuleTable {
    pub fn new(rules: Vec<Rule>) -> Self {
        Self { rules }
    }

    /// All rules for `(method, target)`, in document order.
    pub fn matching(&self, method: &str, target: &str) -> Vec<&Rule> {
        self.rules
            .iter()
            .filter(|rule| rule.matches(method, target))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Rule> {
        self.rules.iter()
    }
}

impl FromIterator<Rule> for RuleTable {
    fn from_iter<I: IntoIterator<Item = Rule>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

/// Result of a successful load: the port the document asks for and its rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedConfig {
    pub port: u16,
    pub table: RuleTable,
}

/// Process-level settings supplied on the command line.
#[derive(Debug, Clone)]
pub struct ServerSettings {
    /// Path of the JSON configuration document.
    pub config_path: PathBuf,

    /// Interface to bind; the port comes from the document.
    pub bind_ip: IpAddr,

    /// Maximum concurrent connections (backpressure).
    pub max_connections: usize,

    /// Upper bound on a request body read for persistence.
    pub max_body_bytes: usize,

    /// How long in-flight requests may run after a shutdown signal.
    pub shutdown_grace: Duration,

    /// Seed for the duplicate-rule tie-break. `None` seeds from entropy.
    pub seed: Option<u64>,

    /// Prometheus exporter address, if enabled.
    pub metrics_address: Option<std::net::SocketAddr>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            config_path: PathBuf::from("settings.json"),
            bind_ip: IpAddr::from([0, 0, 0, 0]),
            max_connections: 10_000,
            max_body_bytes: 16 * 1024 * 1024,
            shutdown_grace: Duration::from_secs(10),
            seed: None,
            metrics_address: None,
        }
    }
}

/// Listener configuration derived from settings and the loaded port.
#[derive(Debug, Clone)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Maximum concurrent connections (backpressure).
    pub max_connections: usize,
}

impl ListenerConfig {
    pub fn new(settings: &ServerSettings, port: u16) -> Self {
        Self {
            bind_address: std::net::SocketAddr::new(settings.bind_ip, port).to_string(),
            max_connections: settings.max_connections,
        }
    }
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: format!("0.0.0.0:{}", DEFAULT_PORT),
            max_connections: 10_000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rule_new_normalizes_key() {
        let rule = Rule::new("  get ", " /health ");
        assert_eq!(rule.method, "GET");
        assert_eq!(rule.path, "/health");
        assert_eq!(rule.response_code, DEFAULT_RESPONSE_CODE);
        assert!(!rule.drops_connection());
    }

    #[test]
    fn table_keeps_duplicates_in_order() {
        let mut first = Rule::new("GET", "/a");
        first.response_code = 201;
        let mut second = Rule::new("GET", "/a");
        second.response_code = 202;
        let table: RuleTable = vec![first, Rule::new("POST", "/a"), second]
            .into_iter()
            .collect();

        let found = table.matching("GET", "/a");
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].response_code, 201);
        assert_eq!(found[1].response_code, 202);
        assert!(table.matching("GET", "/A").is_empty());
    }

    #[test]
    fn listener_config_uses_document_port() {
        let settings = ServerSettings {
            bind_ip: IpAddr::from([127, 0, 0, 1]),
            ..ServerSettings::default()
        };
        let config = ListenerConfig::new(&settings, 9191);
        assert_eq!(config.bind_address, "127.0.0.1:9191");
    }
}
