//! Effective configuration and its layered resolution
//!
//! Precedence, highest first:
//! 1. explicit [`ConfigOverrides`]
//! 2. environment variables (`NEURALLOG_URL`, `NEURALLOG_NAMESPACE`)
//! 3. the first configuration file that exists and parses
//! 4. built-in defaults
//!
//! Each layer is a [`ConfigSource`] returning an optional [`PartialConfig`];
//! the resolver folds them from lowest to highest precedence.

use super::error::{NeuralLogError, Result};
use super::log_level::LogLevel;
use super::serializer::{JsonSerializer, ObjectSerializer};
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

pub const DEFAULT_SERVER_URL: &str = "http://localhost:3030";
pub const DEFAULT_NAMESPACE: &str = "default";

pub const ENV_SERVER_URL: &str = "NEURALLOG_URL";
pub const ENV_NAMESPACE: &str = "NEURALLOG_NAMESPACE";

/// Candidate file names, searched in this order in each directory.
pub const CONFIG_FILE_NAMES: [&str; 3] = [".neurallogrc", ".neurallogrc.json", "neurallog.config.json"];

const LOG_LEVEL_PREFIX: &str = "logLevel.";
const HEADER_PREFIX: &str = "header.";

/// Configuration contributed by a single source.
///
/// Empty strings count as unset.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PartialConfig {
    pub server_url: Option<String>,
    pub namespace: Option<String>,
    pub log_levels: HashMap<String, LogLevel>,
    pub headers: HashMap<String, String>,
}

impl PartialConfig {
    pub fn is_empty(&self) -> bool {
        self.server_url.is_none()
            && self.namespace.is_none()
            && self.log_levels.is_empty()
            && self.headers.is_empty()
    }

    /// Overlay `other` on top of `self`; map entries override per key
    pub fn merge(&mut self, other: PartialConfig) {
        if let Some(url) = non_empty(other.server_url) {
            self.server_url = Some(url);
        }
        if let Some(namespace) = non_empty(other.namespace) {
            self.namespace = Some(namespace);
        }
        self.log_levels.extend(other.log_levels);
        self.headers.extend(other.headers);
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Resolved, read-only configuration shared by a dispatcher and its transport.
#[derive(Clone)]
pub struct EffectiveConfig {
    server_url: String,
    namespace: String,
    log_levels: HashMap<String, LogLevel>,
    headers: HashMap<String, String>,
    serializer: Arc<dyn ObjectSerializer>,
}

impl EffectiveConfig {
    /// Start from the built-in defaults, bypassing files and environment
    pub fn builder() -> ConfigOverrides {
        ConfigOverrides::new()
    }

    fn from_partial(partial: PartialConfig, serializer: Option<Arc<dyn ObjectSerializer>>) -> Self {
        Self {
            server_url: partial
                .server_url
                .unwrap_or_else(|| DEFAULT_SERVER_URL.to_string()),
            namespace: partial
                .namespace
                .unwrap_or_else(|| DEFAULT_NAMESPACE.to_string()),
            log_levels: partial.log_levels,
            headers: partial.headers,
            serializer: serializer.unwrap_or_else(|| Arc::new(JsonSerializer::new())),
        }
    }

    pub fn server_url(&self) -> &str {
        &self.server_url
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn log_levels(&self) -> &HashMap<String, LogLevel> {
        &self.log_levels
    }

    pub fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    pub fn serializer(&self) -> Arc<dyn ObjectSerializer> {
        Arc::clone(&self.serializer)
    }

    /// Threshold for a log name; INFO when not configured
    pub fn level_for(&self, log_name: &str) -> LogLevel {
        self.log_levels.get(log_name).copied().unwrap_or_default()
    }
}

impl Default for EffectiveConfig {
    fn default() -> Self {
        Self::from_partial(PartialConfig::default(), None)
    }
}

impl fmt::Debug for EffectiveConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EffectiveConfig")
            .field("server_url", &self.server_url)
            .field("namespace", &self.namespace)
            .field("log_levels", &self.log_levels)
            .field("headers", &self.headers)
            .field("serializer", &self.serializer.name())
            .finish()
    }
}

/// Programmatic settings, the highest-precedence layer.
///
/// # Example
///
/// ```
/// use neurallog::{ConfigOverrides, LogLevel};
///
/// let config = ConfigOverrides::new()
///     .namespace("payments")
///     .log_level("checkout", LogLevel::Debug)
///     .build();
///
/// assert_eq!(config.namespace(), "payments");
/// assert_eq!(config.level_for("checkout"), LogLevel::Debug);
/// assert_eq!(config.level_for("other"), LogLevel::Info);
/// ```
#[derive(Clone, Default)]
#[must_use = "builder methods return a new value"]
pub struct ConfigOverrides {
    partial: PartialConfig,
    serializer: Option<Arc<dyn ObjectSerializer>>,
}

impl ConfigOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn server_url(mut self, url: impl Into<String>) -> Self {
        self.partial.server_url = Some(url.into());
        self
    }

    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.partial.namespace = Some(namespace.into());
        self
    }

    pub fn log_level(mut self, log_name: impl Into<String>, level: LogLevel) -> Self {
        self.partial.log_levels.insert(log_name.into(), level);
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.partial.headers.insert(name.into(), value.into());
        self
    }

    pub fn serializer(mut self, serializer: Arc<dyn ObjectSerializer>) -> Self {
        self.serializer = Some(serializer);
        self
    }

    /// Apply onto the defaults only, without files or environment
    pub fn build(self) -> EffectiveConfig {
        let mut partial = PartialConfig::default();
        partial.merge(self.partial);
        EffectiveConfig::from_partial(partial, self.serializer)
    }
}

impl fmt::Debug for ConfigOverrides {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigOverrides")
            .field("partial", &self.partial)
            .field("serializer", &self.serializer.as_ref().map(|s| s.name().to_string()))
            .finish()
    }
}

/// One layer of configuration.
pub trait ConfigSource {
    fn name(&self) -> &str;

    /// `None` when the source has nothing to contribute
    fn load(&self) -> Option<PartialConfig>;
}

/// Where environment variables are read from.
#[derive(Debug, Clone, Default)]
pub enum Environment {
    #[default]
    Process,
    Fixed(HashMap<String, String>),
}

impl Environment {
    pub fn var(&self, key: &str) -> Option<String> {
        match self {
            Environment::Process => std::env::var(key).ok(),
            Environment::Fixed(vars) => vars.get(key).cloned(),
        }
    }
}

/// Reads `NEURALLOG_URL` and `NEURALLOG_NAMESPACE`.
#[derive(Debug, Clone, Default)]
pub struct EnvSource {
    env: Environment,
}

impl EnvSource {
    pub fn new(env: Environment) -> Self {
        Self { env }
    }
}

impl ConfigSource for EnvSource {
    fn name(&self) -> &str {
        "environment"
    }

    fn load(&self) -> Option<PartialConfig> {
        let partial = PartialConfig {
            server_url: non_empty(self.env.var(ENV_SERVER_URL)),
            namespace: non_empty(self.env.var(ENV_NAMESPACE)),
            ..PartialConfig::default()
        };
        (!partial.is_empty()).then_some(partial)
    }
}

/// First configuration file that exists and parses, searched per directory.
#[derive(Debug, Clone)]
pub struct FileSource {
    search_dirs: Vec<PathBuf>,
}

impl FileSource {
    pub fn new(search_dirs: Vec<PathBuf>) -> Self {
        Self { search_dirs }
    }

    /// Working directory first, then the home directory
    pub fn default_search_dirs() -> Vec<PathBuf> {
        std::env::current_dir()
            .ok()
            .into_iter()
            .chain(dirs::home_dir())
            .collect()
    }

    pub fn candidates(&self) -> impl Iterator<Item = PathBuf> + '_ {
        self.search_dirs
            .iter()
            .flat_map(|dir| CONFIG_FILE_NAMES.iter().map(move |name| dir.join(name)))
    }

    /// The winning candidate and its contents
    pub fn find(&self) -> Option<(PathBuf, PartialConfig)> {
        self.candidates()
            .filter(|path| path.is_file())
            .find_map(|path| parse_candidate(&path).ok().map(|partial| (path, partial)))
    }
}

impl ConfigSource for FileSource {
    fn name(&self) -> &str {
        "file"
    }

    fn load(&self) -> Option<PartialConfig> {
        self.find().map(|(_, partial)| partial)
    }
}

struct DefaultsSource;

impl ConfigSource for DefaultsSource {
    fn name(&self) -> &str {
        "defaults"
    }

    fn load(&self) -> Option<PartialConfig> {
        Some(PartialConfig {
            server_url: Some(DEFAULT_SERVER_URL.to_string()),
            namespace: Some(DEFAULT_NAMESPACE.to_string()),
            ..PartialConfig::default()
        })
    }
}

/// Structured configuration document.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JsonConfigFile {
    server_url: Option<String>,
    namespace: Option<String>,
    #[serde(default)]
    log_levels: HashMap<String, String>,
    #[serde(default)]
    headers: HashMap<String, String>,
}

/// Parse one candidate file, choosing the format from its extension.
///
/// `.json` files are structured documents; anything else is read as flat
/// `key=value` lines.
pub fn parse_candidate(path: &Path) -> Result<PartialConfig> {
    let display = path.display().to_string();
    let content =
        std::fs::read_to_string(path).map_err(|e| NeuralLogError::config_parse(&display, e.to_string()))?;

    let is_json = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

    if is_json {
        parse_json(&content).map_err(|e| NeuralLogError::config_parse(display, e.to_string()))
    } else {
        Ok(parse_flat(&content))
    }
}

fn parse_json(content: &str) -> std::result::Result<PartialConfig, serde_json::Error> {
    let file: JsonConfigFile = serde_json::from_str(content)?;
    Ok(PartialConfig {
        server_url: non_empty(file.server_url),
        namespace: non_empty(file.namespace),
        log_levels: parse_levels(file.log_levels),
        headers: file.headers,
    })
}

// Unknown level names are dropped silently.
fn parse_levels(raw: HashMap<String, String>) -> HashMap<String, LogLevel> {
    raw.into_iter()
        .filter_map(|(name, level)| LogLevel::from_str(&level).ok().map(|level| (name, level)))
        .collect()
}

fn parse_flat(content: &str) -> PartialConfig {
    let mut partial = PartialConfig::default();
    let mut levels = HashMap::new();

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
            continue;
        }
        let Some(split) = line.find(['=', ':']) else {
            continue;
        };
        let key = line[..split].trim();
        let value = line[split + 1..].trim();

        if let Some(name) = key.strip_prefix(LOG_LEVEL_PREFIX) {
            levels.insert(name.to_string(), value.to_string());
        } else if let Some(name) = key.strip_prefix(HEADER_PREFIX) {
            partial.headers.insert(name.to_string(), value.to_string());
        } else if key == "serverUrl" {
            partial.server_url = non_empty(Some(value.to_string()));
        } else if key == "namespace" {
            partial.namespace = non_empty(Some(value.to_string()));
        }
    }

    partial.log_levels = parse_levels(levels);
    partial
}

/// Folds every configuration layer into an [`EffectiveConfig`].
#[derive(Debug, Clone, Default)]
pub struct ConfigResolver {
    search_dirs: Option<Vec<PathBuf>>,
    env: Environment,
}

impl ConfigResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the working-directory/home search order
    #[must_use]
    pub fn with_search_dirs(mut self, dirs: Vec<PathBuf>) -> Self {
        self.search_dirs = Some(dirs);
        self
    }

    /// Read variables from a fixed map instead of the process environment
    #[must_use]
    pub fn with_env(mut self, vars: HashMap<String, String>) -> Self {
        self.env = Environment::Fixed(vars);
        self
    }

    /// Sources from lowest to highest precedence, excluding explicit overrides
    pub fn sources(&self) -> Vec<Box<dyn ConfigSource>> {
        let dirs = self
            .search_dirs
            .clone()
            .unwrap_or_else(FileSource::default_search_dirs);
        vec![
            Box::new(DefaultsSource),
            Box::new(FileSource::new(dirs)),
            Box::new(EnvSource::new(self.env.clone())),
        ]
    }

    pub fn resolve(&self, overrides: Option<&ConfigOverrides>) -> EffectiveConfig {
        let mut layers: Vec<PartialConfig> = self.sources().iter().filter_map(|s| s.load()).collect();
        layers.extend(overrides.map(|o| o.partial.clone()));

        let partial = layers.into_iter().fold(PartialConfig::default(), |mut acc, layer| {
            acc.merge(layer);
            acc
        });
        EffectiveConfig::from_partial(partial, overrides.and_then(|o| o.serializer.clone()))
    }
}
