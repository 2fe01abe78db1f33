//! TOML-based configuration for ShipSync.
//!
//! One file describes both sides of the sync: the canonical `source`
//! repository and the public `destination` mirror, plus the mapping that
//! turns a source commit into a mirror commit and back.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::errors::{ConfigError, CoreError};
use crate::filter::{
    FilterChain, MoveDirectories, RedactMessage, StripExceptDirectories, StripPaths,
    TrackingTrailer,
};
use crate::git::Repository;
use crate::sync_config::{ExportConfig, ImportConfig, DEFAULT_BRANCH_PREFIX};

/// Starter configuration written by `shipsync init`.
pub const SAMPLE_CONFIG: &str = r#"# ShipSync configuration

[source]
path = "/srv/monorepo"
remote = "origin"
branch = "main"

[destination]
path = "/srv/mirror"
remote = "origin"
branch = "main"
pull_ref_template = "refs/pull/{id}/head"

[mapping]
directories = { "libs/widget/" = "" }
strip_paths = ["**/__internal__/**"]
tracking_trailer = "shipsync-source-id"

[[redact]]
pattern = "(?im)^internal-ticket: \\S+$"
replacement = ""

[logging]
level = "info"

[branches]
prefix = "shipsync"
"#;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Top-level application configuration loaded from a TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Canonical repository.
    pub source: RepoConfig,

    /// Public mirror.
    pub destination: DestinationConfig,

    /// Path and message mapping between the two repositories.
    #[serde(default)]
    pub mapping: MappingConfig,

    /// Message redaction rules, applied in order in both directions.
    #[serde(default)]
    pub redact: Vec<RedactRule>,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub branches: BranchConfig,
}

// ---------------------------------------------------------------------------
// Repositories
// ---------------------------------------------------------------------------

/// A local checkout taking part in the sync.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepoConfig {
    /// Path to the working tree.
    pub path: PathBuf,

    /// Remote used for fetching and pushing. Default `origin`.
    #[serde(default = "default_remote")]
    pub remote: String,

    /// Branch that sync branches start from. Default `main`.
    #[serde(default = "default_branch")]
    pub branch: String,
}

/// The mirror checkout, which also receives pull requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DestinationConfig {
    pub path: PathBuf,

    #[serde(default = "default_remote")]
    pub remote: String,

    #[serde(default = "default_branch")]
    pub branch: String,

    /// Ref a pull request head is fetched from; `{id}` is the PR number.
    #[serde(default = "default_pull_ref_template")]
    pub pull_ref_template: String,
}

fn default_remote() -> String {
    "origin".into()
}
fn default_branch() -> String {
    "main".into()
}
fn default_pull_ref_template() -> String {
    "refs/pull/{id}/head".into()
}

// ---------------------------------------------------------------------------
// Mapping
// ---------------------------------------------------------------------------

/// How paths and messages change when crossing from source to mirror.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MappingConfig {
    /// Source path prefix to mirror path prefix. When non-empty, source
    /// paths outside every listed prefix are not exported.
    #[serde(default)]
    pub directories: BTreeMap<String, String>,

    /// Glob patterns for source paths that are never exported.
    #[serde(default)]
    pub strip_paths: Vec<String>,

    /// Trailer recording the source commit id on exported commits.
    #[serde(default = "default_tracking_trailer")]
    pub tracking_trailer: String,
}

fn default_tracking_trailer() -> String {
    "shipsync-source-id".into()
}

impl Default for MappingConfig {
    fn default() -> Self {
        Self {
            directories: BTreeMap::new(),
            strip_paths: Vec::new(),
            tracking_trailer: default_tracking_trailer(),
        }
    }
}

/// A regex replacement applied to commit messages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedactRule {
    pub pattern: String,
    #[serde(default)]
    pub replacement: String,
}

// ---------------------------------------------------------------------------
// Logging & branches
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Minimum tracing level: trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".into()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BranchConfig {
    /// Prefix of generated sync branch names.
    #[serde(default = "default_branch_prefix")]
    pub prefix: String,
}

fn default_branch_prefix() -> String {
    DEFAULT_BRANCH_PREFIX.into()
}

impl Default for BranchConfig {
    fn default() -> Self {
        Self {
            prefix: default_branch_prefix(),
        }
    }
}

// ---------------------------------------------------------------------------
// Loading & validation
// ---------------------------------------------------------------------------

impl AppConfig {
    /// Load an [`AppConfig`] from a TOML file at the given path.
    ///
    /// This does **not** validate the result; see [`validate`](Self::validate).
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        info!(path = %path.display(), "loading configuration");

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()));
        }

        let contents = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&contents)?;

        debug!("configuration parsed successfully");
        Ok(config)
    }

    /// Parse an [`AppConfig`] from TOML text.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        toml::from_str(contents).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Validate that all required fields are present and sane.
    pub fn validate(&self) -> Result<(), ConfigError> {
        non_empty("source.path", &self.source.path.to_string_lossy())?;
        non_empty("source.remote", &self.source.remote)?;
        non_empty("source.branch", &self.source.branch)?;
        non_empty("destination.path", &self.destination.path.to_string_lossy())?;
        non_empty("destination.remote", &self.destination.remote)?;
        non_empty("destination.branch", &self.destination.branch)?;

        if !self.destination.pull_ref_template.contains("{id}") {
            return Err(invalid(
                "destination.pull_ref_template",
                "template must contain '{id}'",
            ));
        }

        if self.mapping.strip_paths.iter().any(|p| p.trim().is_empty()) {
            return Err(invalid(
                "mapping.strip_paths",
                "patterns must not be empty",
            ));
        }

        let mut targets: Vec<&String> = self.mapping.directories.values().collect();
        targets.sort();
        if let Some(pair) = targets.windows(2).find(|w| w[0] == w[1]) {
            return Err(invalid(
                "mapping.directories",
                &format!("destination prefix '{}' is mapped more than once", pair[0]),
            ));
        }

        let trailer = &self.mapping.tracking_trailer;
        if trailer.is_empty() || trailer.contains(':') || trailer.chars().any(char::is_whitespace) {
            return Err(invalid(
                "mapping.tracking_trailer",
                "trailer must be a non-empty token without whitespace or ':'",
            ));
        }

        for (i, rule) in self.redact.iter().enumerate() {
            if let Err(e) = regex_lite::Regex::new(&rule.pattern) {
                return Err(invalid(&format!("redact[{}].pattern", i), &e.to_string()));
            }
        }

        let prefix = &self.branches.prefix;
        if prefix.is_empty() || prefix.chars().any(char::is_whitespace) {
            return Err(invalid(
                "branches.prefix",
                "prefix must be non-empty and contain no whitespace",
            ));
        }

        Ok(())
    }

    /// Convenience: load and validate in one call.
    pub fn load_and_validate<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config = Self::load_from_file(path)?;
        config.validate()?;
        Ok(config)
    }
}

fn invalid(field: &str, detail: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.into(),
        detail: detail.into(),
    }
}

fn non_empty(field: &str, value: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(invalid(field, "must not be empty"));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Filters & sync configs
// ---------------------------------------------------------------------------

impl AppConfig {
    fn redaction(&self) -> Result<RedactMessage, ConfigError> {
        RedactMessage::new(
            self.redact
                .iter()
                .map(|r| (r.pattern.as_str(), r.replacement.as_str())),
        )
        .map_err(|e| invalid("redact", &e.to_string()))
    }

    fn directory_mapping(&self) -> MoveDirectories {
        MoveDirectories::new(
            self.mapping
                .directories
                .iter()
                .map(|(s, d)| (s.clone(), d.clone())),
        )
    }

    /// Mirror to source: reverse directory mapping, then redaction.
    pub fn ingress_filter(&self) -> Result<FilterChain, ConfigError> {
        Ok(FilterChain::new()
            .then(self.directory_mapping().reversed())
            .then(self.redaction()?))
    }

    /// Source to mirror: strip paths, directory mapping, redaction, then
    /// the tracking trailer.
    pub fn egress_filter(&self) -> Result<FilterChain, ConfigError> {
        let mapped: Vec<String> = self.mapping.directories.keys().cloned().collect();
        Ok(FilterChain::new()
            .then(StripPaths::new(self.mapping.strip_paths.clone()))
            .then(StripExceptDirectories::new(mapped))
            .then(self.directory_mapping())
            .then(self.redaction()?)
            .then(TrackingTrailer::new(self.mapping.tracking_trailer.clone())))
    }

    /// Bind the mirror as reader and the canonical repository as writer
    /// for importing pull request `pull_request`.
    pub fn import_config(&self, pull_request: u64) -> Result<ImportConfig, CoreError> {
        Ok(ImportConfig {
            pull_request,
            reader: Repository::open(&self.destination.path)?,
            writer: Repository::open(&self.source.path)?,
            remote: self.destination.remote.clone(),
            pull_ref_template: self.destination.pull_ref_template.clone(),
            base_branch: self.destination.branch.clone(),
            target_branch: self.source.branch.clone(),
            branch_prefix: self.branches.prefix.clone(),
            filter: Box::new(self.ingress_filter()?),
        })
    }

    /// Bind the canonical repository as reader and the mirror as writer.
    pub fn export_config(&self) -> Result<ExportConfig, CoreError> {
        Ok(ExportConfig {
            reader: Repository::open(&self.source.path)?,
            writer: Repository::open(&self.destination.path)?,
            source_branch: self.source.branch.clone(),
            target_branch: self.destination.branch.clone(),
            tracking_trailer: self.mapping.tracking_trailer.clone(),
            branch_prefix: self.branches.prefix.clone(),
            filter: Box::new(self.egress_filter()?),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commit::tests::{header, text_diff};
    use crate::commit::Commit;
    use crate::errors::RepoError;
    use crate::filter::CommitFilter;
    use std::io::Write;

    fn sample() -> AppConfig {
        AppConfig::from_toml_str(SAMPLE_CONFIG).expect("failed to parse sample config")
    }

    fn minimal_toml() -> &'static str {
        r#"
[source]
path = "/nonexistent/shipsync/src"

[destination]
path = "/nonexistent/shipsync/dst"
"#
    }

    fn assert_invalid(config: &AppConfig, expected: &str) {
        let result = config.validate();
        assert!(
            matches!(result, Err(ConfigError::InvalidValue { ref field, .. }) if field == expected),
            "expected invalid '{}', got {:?}",
            expected,
            result
        );
    }

    #[test]
    fn test_parse_sample_config() {
        let config = sample();
        assert_eq!(config.source.path, PathBuf::from("/srv/monorepo"));
        assert_eq!(config.destination.pull_ref_template, "refs/pull/{id}/head");
        assert_eq!(config.mapping.directories["libs/widget/"], "");
        assert_eq!(config.redact.len(), 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_defaults() {
        let config: AppConfig = toml::from_str(minimal_toml()).unwrap();
        assert_eq!(config.source.remote, "origin");
        assert_eq!(config.destination.branch, "main");
        assert_eq!(config.destination.pull_ref_template, "refs/pull/{id}/head");
        assert_eq!(config.mapping.tracking_trailer, "shipsync-source-id");
        assert!(config.mapping.directories.is_empty());
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.branches.prefix, "shipsync");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shipsync.toml");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(SAMPLE_CONFIG.as_bytes()).unwrap();

        let config = AppConfig::load_and_validate(&path).expect("load failed");
        assert_eq!(config.branches.prefix, "shipsync");
    }

    #[test]
    fn test_file_not_found() {
        let result = AppConfig::load_from_file("/nonexistent/shipsync.toml");
        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn test_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shipsync.toml");
        std::fs::write(&path, "[source\npath = 1").unwrap();
        let result = AppConfig::load_from_file(&path);
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = sample();
        config.source.branch = String::new();
        assert_invalid(&config, "source.branch");

        let mut config = sample();
        config.destination.pull_ref_template = "refs/pull/head".into();
        assert_invalid(&config, "destination.pull_ref_template");

        let mut config = sample();
        config.mapping.tracking_trailer = "source id".into();
        assert_invalid(&config, "mapping.tracking_trailer");

        let mut config = sample();
        config.mapping.tracking_trailer = "source-id:".into();
        assert_invalid(&config, "mapping.tracking_trailer");

        let mut config = sample();
        config.redact[0].pattern = "(unclosed".into();
        assert_invalid(&config, "redact[0].pattern");

        let mut config = sample();
        config.mapping.strip_paths.push(" ".into());
        assert_invalid(&config, "mapping.strip_paths");

        let mut config = sample();
        config.branches.prefix = "ship sync".into();
        assert_invalid(&config, "branches.prefix");
    }

    #[test]
    fn test_validate_rejects_ambiguous_mapping() {
        let mut config = sample();
        config
            .mapping
            .directories
            .insert("libs/other/".into(), "".into());
        assert_invalid(&config, "mapping.directories");
    }

    #[test]
    fn test_egress_filter() {
        let config = sample();
        let commit = Commit::new(
            header("abc123", &["p"], "Add widget\n\nInternal-Ticket: OPS-1\n"),
            vec![
                text_diff("libs/widget/src/a.ts"),
                text_diff("libs/widget/__internal__/b.ts"),
                text_diff("services/api/c.rs"),
            ],
        );

        let out = config.egress_filter().unwrap().apply(commit);

        let paths: Vec<&str> = out.diffs().iter().map(|d| d.path.as_str()).collect();
        assert_eq!(paths, vec!["src/a.ts"]);
        assert_eq!(
            out.header().message,
            "Add widget\n\nshipsync-source-id: abc123"
        );
    }

    #[test]
    fn test_ingress_filter() {
        let config = sample();
        let commit = Commit::new(
            header("f00d", &["p"], "Fix typo"),
            vec![text_diff("src/a.ts")],
        );

        let out = config.ingress_filter().unwrap().apply(commit);

        assert_eq!(out.diffs()[0].path, "libs/widget/src/a.ts");
        assert_eq!(out.header().message, "Fix typo");
    }

    #[test]
    fn test_import_config_requires_repositories() {
        let config: AppConfig = toml::from_str(minimal_toml()).unwrap();
        let result = config.import_config(1);
        assert!(matches!(
            result,
            Err(CoreError::Repo(RepoError::RepositoryNotFound(_)))
        ));
    }
}
