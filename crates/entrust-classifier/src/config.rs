//! Configuration loading and classifier factory.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use entrust_core::aggregate::TimeRange;
use entrust_core::catalogue::{load_catalogue, Catalogue};
use entrust_core::service::ServiceConfig;
use entrust_core::traits::CaseClassifier;

use crate::mock::MockClassifier;
use crate::openai::OpenAiClassifier;

/// Which backend maps free-text cases to EPAs.
///
/// Note: Custom Debug impl masks API keys to prevent accidental exposure in logs.
#[derive(Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClassifierConfig {
    OpenAI {
        api_key: String,
        #[serde(default)]
        base_url: Option<String>,
        #[serde(default)]
        model: Option<String>,
    },
    Mock {
        /// Extra keyword → EPA code entries on top of the built-in table.
        #[serde(default)]
        keywords: BTreeMap<String, String>,
    },
}

impl std::fmt::Debug for ClassifierConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClassifierConfig::OpenAI {
                api_key: _,
                base_url,
                model,
            } => f
                .debug_struct("OpenAI")
                .field("api_key", &"***")
                .field("base_url", base_url)
                .field("model", model)
                .finish(),
            ClassifierConfig::Mock { keywords } => f
                .debug_struct("Mock")
                .field("keywords", &keywords.len())
                .finish(),
        }
    }
}

/// Top-level entrust configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntrustConfig {
    #[serde(default)]
    pub classifier: Option<ClassifierConfig>,
    /// Classifications below this confidence are rejected.
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f64,
    /// Max retries on transient classifier errors.
    #[serde(default = "default_retries")]
    pub max_retries: u32,
    /// Initial delay between retries in milliseconds.
    #[serde(default = "default_retry_delay")]
    pub retry_delay_ms: u64,
    /// EPA catalogue file; the built-in surgical catalogue when unset.
    #[serde(default)]
    pub catalogue: Option<PathBuf>,
    #[serde(default)]
    pub default_range: TimeRange,
}

fn default_min_confidence() -> f64 {
    0.5
}
fn default_retries() -> u32 {
    3
}
fn default_retry_delay() -> u64 {
    1000
}

impl Default for EntrustConfig {
    fn default() -> Self {
        Self {
            classifier: None,
            min_confidence: default_min_confidence(),
            max_retries: default_retries(),
            retry_delay_ms: default_retry_delay(),
            catalogue: None,
            default_range: TimeRange::default(),
        }
    }
}

impl EntrustConfig {
    pub fn service_config(&self) -> ServiceConfig {
        ServiceConfig {
            min_confidence: self.min_confidence,
            max_retries: self.max_retries,
            retry_delay: Duration::from_millis(self.retry_delay_ms),
        }
    }

    /// The configured catalogue, or the built-in one.
    pub fn load_catalogue(&self) -> Result<Catalogue> {
        match &self.catalogue {
            Some(path) => load_catalogue(path),
            None => Ok(Catalogue::surgical()),
        }
    }
}

/// Resolve environment variable references like `${VAR_NAME}` in a string.
fn resolve_env_vars(s: &str) -> String {
    let mut result = s.to_string();
    while let Some(start) = result.find("${") {
        let Some(end) = result[start..].find('}') else {
            break;
        };
        let var_name = &result[start + 2..start + end];
        let value = std::env::var(var_name).unwrap_or_default();
        result = format!("{}{}{}", &result[..start], value, &result[start + end + 1..]);
    }
    result
}

fn resolve_classifier_config(config: &ClassifierConfig) -> ClassifierConfig {
    match config {
        ClassifierConfig::OpenAI {
            api_key,
            base_url,
            model,
        } => ClassifierConfig::OpenAI {
            api_key: resolve_env_vars(api_key),
            base_url: base_url.as_deref().map(resolve_env_vars),
            model: model.as_deref().map(resolve_env_vars),
        },
        ClassifierConfig::Mock { keywords } => ClassifierConfig::Mock {
            keywords: keywords.clone(),
        },
    }
}

/// Load configuration from well-known paths.
///
/// Search order:
/// 1. `entrust.toml` in the current directory
/// 2. `~/.config/entrust/config.toml`
///
/// `ENTRUST_OPENAI_KEY` overrides (or supplies) the OpenAI API key.
pub fn load_config() -> Result<EntrustConfig> {
    load_config_from(None)
}

/// Load config from an explicit path, or search the default locations.
pub fn load_config_from(path: Option<&Path>) -> Result<EntrustConfig> {
    let config_path = match path {
        Some(p) if p.exists() => Some(p.to_path_buf()),
        Some(p) => anyhow::bail!("config file not found: {}", p.display()),
        None => {
            let local = PathBuf::from("entrust.toml");
            if local.exists() {
                Some(local)
            } else {
                config_dir()
                    .map(|dir| dir.join("config.toml"))
                    .filter(|global| global.exists())
            }
        }
    };

    let mut config = match config_path {
        Some(path) => {
            tracing::debug!(path = %path.display(), "loading config");
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read config: {}", path.display()))?;
            parse_config_str(&content)
                .with_context(|| format!("failed to parse config: {}", path.display()))?
        }
        None => EntrustConfig::default(),
    };

    if let Ok(key) = std::env::var("ENTRUST_OPENAI_KEY") {
        match &mut config.classifier {
            Some(ClassifierConfig::OpenAI { api_key, .. }) => *api_key = key,
            Some(ClassifierConfig::Mock { .. }) => {
                tracing::debug!("ENTRUST_OPENAI_KEY set but mock classifier configured, ignoring");
            }
            None => {
                config.classifier = Some(ClassifierConfig::OpenAI {
                    api_key: key,
                    base_url: None,
                    model: None,
                })
            }
        }
    }

    Ok(config)
}

/// Parse a TOML string into a config, expanding `${VAR}` references.
pub fn parse_config_str(content: &str) -> Result<EntrustConfig> {
    let mut config: EntrustConfig = toml::from_str(content)?;
    config.classifier = config.classifier.as_ref().map(resolve_classifier_config);
    if !(0.0..=1.0).contains(&config.min_confidence) {
        anyhow::bail!(
            "min_confidence must be between 0 and 1, got {}",
            config.min_confidence
        );
    }
    Ok(config)
}

fn config_dir() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(|h| PathBuf::from(h).join(".config").join("entrust"))
}

/// Create a classifier instance from its configuration.
pub fn create_classifier(config: &ClassifierConfig) -> Result<Arc<dyn CaseClassifier>> {
    match config {
        ClassifierConfig::OpenAI {
            api_key,
            base_url,
            model,
        } => {
            if api_key.trim().is_empty() {
                anyhow::bail!("OpenAI classifier configured without an API key");
            }
            let classifier = OpenAiClassifier::new(api_key, base_url.clone(), model.clone())?;
            Ok(Arc::new(classifier))
        }
        ClassifierConfig::Mock { keywords } => {
            let mock = if keywords.is_empty() {
                MockClassifier::surgical()
            } else {
                MockClassifier::with_extra(keywords.clone())
            };
            Ok(Arc::new(mock))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_env_vars_basic() {
        std::env::set_var("_ENTRUST_TEST_VAR", "hello");
        assert_eq!(resolve_env_vars("${_ENTRUST_TEST_VAR}"), "hello");
        assert_eq!(
            resolve_env_vars("prefix_${_ENTRUST_TEST_VAR}_suffix"),
            "prefix_hello_suffix"
        );
        assert_eq!(resolve_env_vars("${unterminated"), "${unterminated");
        std::env::remove_var("_ENTRUST_TEST_VAR");
    }

    #[test]
    fn default_config() {
        let config = EntrustConfig::default();
        assert!(config.classifier.is_none());
        assert_eq!(config.min_confidence, 0.5);
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.default_range, TimeRange::All);
        assert_eq!(config.load_catalogue().unwrap().len(), 18);
        assert_eq!(config.service_config().retry_delay, Duration::from_secs(1));
    }

    #[test]
    fn parse_openai_config() {
        std::env::set_var("_ENTRUST_TEST_KEY", "sk-from-env");
        let toml_str = r#"
min_confidence = 0.7
default_range = "6m"

[classifier]
type = "openai"
api_key = "${_ENTRUST_TEST_KEY}"
model = "gpt-4o"
"#;
        let config = parse_config_str(toml_str).unwrap();
        std::env::remove_var("_ENTRUST_TEST_KEY");

        assert_eq!(config.min_confidence, 0.7);
        assert_eq!(config.default_range, TimeRange::SixMonths);
        match &config.classifier {
            Some(ClassifierConfig::OpenAI { api_key, model, .. }) => {
                assert_eq!(api_key, "sk-from-env");
                assert_eq!(model.as_deref(), Some("gpt-4o"));
            }
            other => panic!("unexpected classifier: {other:?}"),
        }
    }

    #[test]
    fn debug_masks_api_key() {
        let config = ClassifierConfig::OpenAI {
            api_key: "sk-secret".into(),
            base_url: None,
            model: None,
        };
        let debug = format!("{config:?}");
        assert!(!debug.contains("sk-secret"));
        assert!(debug.contains("***"));
    }

    #[test]
    fn reject_out_of_range_confidence() {
        assert!(parse_config_str("min_confidence = 1.5").is_err());
    }

    #[test]
    fn load_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("entrust.toml");
        std::fs::write(&path, "max_retries = 1\n[classifier]\ntype = \"mock\"\n").unwrap();
        let config = load_config_from(Some(&path)).unwrap();
        assert_eq!(config.max_retries, 1);
        assert!(matches!(config.classifier, Some(ClassifierConfig::Mock { .. })));

        assert!(load_config_from(Some(&dir.path().join("missing.toml"))).is_err());
    }

    #[tokio::test]
    async fn create_mock_classifier() {
        let mut keywords = BTreeMap::new();
        keywords.insert("whipple".to_string(), "EPA-13".to_string());
        let classifier = create_classifier(&ClassifierConfig::Mock { keywords }).unwrap();
        assert_eq!(classifier.name(), "mock");

        let missing_key = ClassifierConfig::OpenAI {
            api_key: " ".into(),
            base_url: None,
            model: None,
        };
        assert!(create_classifier(&missing_key).is_err());
    }
}
