use crate::error::{ReportError, Result};
use crate::schema::SheetLocation;
use log::debug;
use serde::{Deserialize, Deserializer, Serialize};
use std::path::{Path, PathBuf};

pub const API_KEY_ENV_VAR: &str = "STRIPE_API_KEY";
pub const DEFAULT_CREDENTIALS_FILE: &str = "creds.json";

/// What the collector does when an invoice or customer lookup fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LookupFailurePolicy {
    /// Abort the whole run
    Abort,
    /// Record the subscription with "N/A" fields when the invoice or customer no longer exists
    #[default]
    Degrade,
}

/// Raw contents of the JSON config file.
#[derive(Debug, Clone, Default, Deserialize)]
struct ConfigFile {
    stripe_api_key: Option<String>,
    spreadsheet_id: Option<String>,
    #[serde(default, deserialize_with = "deserialize_tab_id")]
    sheet_id: Option<i64>,
    google_cloud_creds_path: Option<PathBuf>,
    lookup_failure_policy: Option<LookupFailurePolicy>,
    clear_stale_rows: Option<bool>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReportConfig {
    pub processor_api_key: String,
    pub spreadsheet_id: String,
    pub tab_id: i64,
    pub credentials_path: PathBuf,
    pub lookup_failure_policy: LookupFailurePolicy,
    pub clear_stale_rows: bool,
}

impl ReportConfig {
    /// Loads the config file, letting `STRIPE_API_KEY` override the key it contains.
    pub fn load(path: &Path) -> Result<Self> {
        let env_key = std::env::var(API_KEY_ENV_VAR).ok();
        Self::load_with_api_key(path, env_key)
    }

    pub fn load_with_api_key(path: &Path, api_key_override: Option<String>) -> Result<Self> {
        if !path.exists() {
            return Err(ReportError::Configuration(format!(
                "Configuration file not found: {}",
                path.display()
            )));
        }

        let contents = std::fs::read_to_string(path)?;
        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
        debug!("Loaded configuration from {}", path.display());

        Self::from_json(&contents, base_dir, api_key_override)
    }

    /// Parses and validates config JSON. Relative credential paths resolve against `base_dir`.
    pub fn from_json(
        contents: &str,
        base_dir: &Path,
        api_key_override: Option<String>,
    ) -> Result<Self> {
        let file: ConfigFile = serde_json::from_str(contents).map_err(|e| {
            ReportError::Configuration(format!("Invalid configuration file: {}", e))
        })?;

        let processor_api_key = non_empty(api_key_override)
            .or_else(|| non_empty(file.stripe_api_key))
            .ok_or_else(|| ReportError::Configuration("Stripe API key is not set".to_string()))?;

        let spreadsheet_id = non_empty(file.spreadsheet_id).ok_or_else(|| {
            ReportError::Configuration("spreadsheet_id is not set".to_string())
        })?;

        let tab_id = file
            .sheet_id
            .ok_or_else(|| ReportError::Configuration("sheet_id is not set".to_string()))?;

        let credentials = file
            .google_cloud_creds_path
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CREDENTIALS_FILE));
        let credentials_path = if credentials.is_absolute() {
            credentials
        } else {
            base_dir.join(credentials)
        };

        Ok(Self {
            processor_api_key,
            spreadsheet_id,
            tab_id,
            credentials_path,
            lookup_failure_policy: file.lookup_failure_policy.unwrap_or_default(),
            clear_stale_rows: file.clear_stale_rows.unwrap_or(true),
        })
    }

    pub fn sheet_location(&self) -> SheetLocation {
        SheetLocation {
            spreadsheet_id: self.spreadsheet_id.clone(),
            tab_id: self.tab_id,
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Tab ids are numeric but are often pasted into config files as strings.
fn deserialize_tab_id<'de, D>(deserializer: D) -> std::result::Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum TabId {
        Number(i64),
        Text(String),
    }

    match Option::<TabId>::deserialize(deserializer)? {
        None => Ok(None),
        Some(TabId::Number(n)) => Ok(Some(n)),
        Some(TabId::Text(s)) if s.trim().is_empty() => Ok(None),
        Some(TabId::Text(s)) => s
            .trim()
            .parse::<i64>()
            .map(Some)
            .map_err(|_| serde::de::Error::custom(format!("sheet_id '{}' is not numeric", s))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const FULL_CONFIG: &str = r#"{
        "stripe_api_key": "sk_test_123",
        "spreadsheet_id": "sheet-abc",
        "sheet_id": 42,
        "google_cloud_creds_path": "keys/service.json"
    }"#;

    #[test]
    fn test_parses_full_config_with_defaults() {
        let config = ReportConfig::from_json(FULL_CONFIG, Path::new("/etc/report"), None).unwrap();

        assert_eq!(config.processor_api_key, "sk_test_123");
        assert_eq!(config.spreadsheet_id, "sheet-abc");
        assert_eq!(config.tab_id, 42);
        assert_eq!(
            config.credentials_path,
            PathBuf::from("/etc/report/keys/service.json")
        );
        assert_eq!(config.lookup_failure_policy, LookupFailurePolicy::Degrade);
        assert!(config.clear_stale_rows);
    }

    #[test]
    fn test_env_key_overrides_file_key() {
        let config = ReportConfig::from_json(
            FULL_CONFIG,
            Path::new("."),
            Some("sk_live_env".to_string()),
        )
        .unwrap();
        assert_eq!(config.processor_api_key, "sk_live_env");
    }

    #[test]
    fn test_string_tab_id_and_default_credentials() {
        let json = r#"{"stripe_api_key": "k", "spreadsheet_id": "s", "sheet_id": "1234",
                       "lookup_failure_policy": "abort", "clear_stale_rows": false}"#;
        let config = ReportConfig::from_json(json, Path::new("/srv"), None).unwrap();

        assert_eq!(config.tab_id, 1234);
        assert_eq!(config.credentials_path, PathBuf::from("/srv/creds.json"));
        assert_eq!(config.lookup_failure_policy, LookupFailurePolicy::Abort);
        assert!(!config.clear_stale_rows);
    }

    #[test]
    fn test_missing_values_are_configuration_errors() {
        let cases = [
            (r#"{"spreadsheet_id": "s", "sheet_id": 1}"#, "Stripe API key"),
            (r#"{"stripe_api_key": "k", "spreadsheet_id": " ", "sheet_id": 1}"#, "spreadsheet_id"),
            (r#"{"stripe_api_key": "k", "spreadsheet_id": "s"}"#, "sheet_id"),
        ];

        for (json, expected) in cases {
            match ReportConfig::from_json(json, Path::new("."), None) {
                Err(ReportError::Configuration(msg)) => {
                    assert!(msg.contains(expected), "'{}' should mention {}", msg, expected)
                }
                other => panic!("expected configuration error, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_non_numeric_tab_id_rejected() {
        let json = r#"{"stripe_api_key": "k", "spreadsheet_id": "s", "sheet_id": "abc"}"#;
        assert!(matches!(
            ReportConfig::from_json(json, Path::new("."), None),
            Err(ReportError::Configuration(_))
        ));
    }

    #[test]
    fn test_load_missing_file() {
        let err = ReportConfig::load_with_api_key(Path::new("/nonexistent/config.json"), None)
            .unwrap_err();
        assert!(matches!(err, ReportError::Configuration(_)));
    }

    #[test]
    fn test_load_resolves_credentials_next_to_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let mut file = std::fs::File::create(&path).unwrap();
        write!(
            file,
            r#"{{"stripe_api_key": "k", "spreadsheet_id": "s", "sheet_id": 7}}"#
        )
        .unwrap();

        let config = ReportConfig::load_with_api_key(&path, None).unwrap();
        assert_eq!(config.credentials_path, dir.path().join("creds.json"));
        assert_eq!(
            config.sheet_location(),
            SheetLocation {
                spreadsheet_id: "s".to_string(),
                tab_id: 7
            }
        );
    }
}
