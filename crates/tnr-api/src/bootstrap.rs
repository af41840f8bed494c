//! # Registry Bootstrap
//!
//! Reads the registry configuration at startup and assembles [`AppState`].
//!
//! ## Bootstrap Sequence
//!
//! 1. **Load Registry Config**: parse the YAML named by `REGISTRY_CONFIG`
//!    and validate it. Invalid files abort startup.
//! 2. **Build Engine**: fee schedule from the province fee rules, name
//!    normalizer with any extra decoration tokens.
//! 3. **Wire Dispatcher**: Postgres audit chain when a pool exists, else the
//!    in-memory chain; webhook notifications when a URL is configured
//!    (`NOTIFY_WEBHOOK_URL` overrides the file), else log-only.
//! 4. **Log Banner**.
//!
//! Without `REGISTRY_CONFIG` the service starts with no fee rules, so every
//! fee-liable submission fails with `FEE_NOT_CONFIGURED`.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tnr_core::{CompanyTypeId, ProvinceId};
use tnr_state::{FeeRule, FeeSchedule, NameNormalizer, WorkflowEngine};

use crate::dispatch::{
    AuditSink, DispatchError, LogTransport, MemoryAuditLog, NotificationTransport, PgAuditSink,
    SideEffectDispatcher, WebhookTransport,
};
use crate::state::{AppConfig, AppState};

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors during registry bootstrap.
#[derive(Debug, thiserror::Error)]
pub enum BootstrapError {
    /// Registry config file not found at the given path.
    #[error("registry config not found: {path}")]
    ConfigNotFound { path: String },

    /// Registry config failed validation.
    #[error("invalid registry config: {errors:?}")]
    InvalidConfig { errors: Vec<String> },

    /// Notification transport could not be built.
    #[error("notification transport error: {0}")]
    Transport(#[from] DispatchError),

    /// IO error during bootstrap.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Registry config file
// ---------------------------------------------------------------------------

/// One fee line of a province.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FeeLine {
    pub name: String,
    pub amount: u64,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

/// A province and its fee schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProvinceConfig {
    pub id: u64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub fees: Vec<FeeLine>,
}

/// The registry configuration file.
///
/// ```yaml
/// provinces:
///   - id: 1
///     name: Baghdad
///     fees:
///       - { name: reservation, amount: 3000 }
///       - { name: publication, amount: 2000 }
/// company_types: [1, 2, 3]
/// decoration_tokens: [holding]
/// notify_webhook_url: https://notify.example.org/hook
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegistryConfig {
    #[serde(default)]
    pub provinces: Vec<ProvinceConfig>,
    /// Known company-type ids. Empty accepts any.
    #[serde(default)]
    pub company_types: Vec<u64>,
    /// Extra entity-decoration tokens for the name normalizer.
    #[serde(default)]
    pub decoration_tokens: Vec<String>,
    #[serde(default)]
    pub notify_webhook_url: Option<String>,
}

impl RegistryConfig {
    /// Read and validate a config file.
    pub fn load(path: &Path) -> Result<Self, BootstrapError> {
        if !path.exists() {
            return Err(BootstrapError::ConfigNotFound {
                path: path.display().to_string(),
            });
        }
        let text = std::fs::read_to_string(path)?;
        Self::parse(&text)
    }

    /// Parse and validate YAML text.
    pub fn parse(text: &str) -> Result<Self, BootstrapError> {
        let config: Self = serde_yaml::from_str(text).map_err(|e| BootstrapError::InvalidConfig {
            errors: vec![format!("YAML parse error: {e}")],
        })?;
        let errors = config.validate();
        if !errors.is_empty() {
            return Err(BootstrapError::InvalidConfig { errors });
        }
        Ok(config)
    }

    /// Every problem with the config. Empty when valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        let mut seen = BTreeSet::new();
        for province in &self.provinces {
            if province.id == 0 {
                errors.push("province id 0 is reserved".to_string());
            } else if !seen.insert(province.id) {
                errors.push(format!("province {} is listed more than once", province.id));
            }
            for fee in &province.fees {
                if fee.name.trim().is_empty() {
                    errors.push(format!("province {}: fee rule without a name", province.id));
                }
            }
            let total = province
                .fees
                .iter()
                .filter(|f| f.active)
                .try_fold(0u64, |acc, f| acc.checked_add(f.amount));
            if total.is_none() {
                errors.push(format!("province {}: active fees overflow", province.id));
            }
        }
        if self.company_types.contains(&0) {
            errors.push("company type id 0 is reserved".to_string());
        }
        if self.decoration_tokens.iter().any(|t| t.trim().is_empty()) {
            errors.push("decoration tokens must not be blank".to_string());
        }
        if let Some(raw) = &self.notify_webhook_url {
            if let Err(e) = url::Url::parse(raw) {
                errors.push(format!("notify_webhook_url: {e}"));
            }
        }
        errors
    }

    pub fn fee_schedule(&self) -> FeeSchedule {
        self.provinces
            .iter()
            .flat_map(|p| {
                p.fees.iter().map(move |f| FeeRule {
                    province_id: ProvinceId(p.id),
                    name: f.name.clone(),
                    amount: f.amount,
                    active: f.active,
                })
            })
            .collect()
    }

    pub fn normalizer(&self) -> NameNormalizer {
        NameNormalizer::default().with_extra_tokens(self.decoration_tokens.iter())
    }

    pub fn company_type_ids(&self) -> impl Iterator<Item = CompanyTypeId> + '_ {
        self.company_types.iter().copied().map(CompanyTypeId)
    }
}

// ---------------------------------------------------------------------------
// Public entry point
// ---------------------------------------------------------------------------

/// Bootstrap the application state from `REGISTRY_CONFIG` and
/// `NOTIFY_WEBHOOK_URL`.
pub fn bootstrap(config: AppConfig, db_pool: Option<sqlx::PgPool>) -> Result<AppState, BootstrapError> {
    let path = std::env::var("REGISTRY_CONFIG").ok().map(PathBuf::from);
    let webhook = std::env::var("NOTIFY_WEBHOOK_URL")
        .ok()
        .filter(|v| !v.trim().is_empty());
    bootstrap_from(config, path.as_deref(), webhook, db_pool)
}

/// [`bootstrap`] with explicit inputs instead of environment variables.
pub fn bootstrap_from(
    config: AppConfig,
    registry_path: Option<&Path>,
    webhook_override: Option<String>,
    db_pool: Option<sqlx::PgPool>,
) -> Result<AppState, BootstrapError> {
    let registry = match registry_path {
        Some(path) => RegistryConfig::load(path)?,
        None => RegistryConfig::default(),
    };

    let engine = WorkflowEngine::new(registry.normalizer(), Arc::new(registry.fee_schedule()));

    let audit: Arc<dyn AuditSink> = match &db_pool {
        Some(pool) => Arc::new(PgAuditSink::new(pool.clone())),
        None => Arc::new(MemoryAuditLog::new()),
    };
    let webhook = webhook_override.or_else(|| registry.notify_webhook_url.clone());
    let transport: Arc<dyn NotificationTransport> = match &webhook {
        Some(raw) => {
            let url = url::Url::parse(raw).map_err(|e| BootstrapError::InvalidConfig {
                errors: vec![format!("notify webhook url: {e}")],
            })?;
            Arc::new(WebhookTransport::new(url)?)
        }
        None => Arc::new(LogTransport),
    };

    log_banner(&config, registry_path, &registry, webhook.is_some(), db_pool.is_some());

    Ok(AppState::with_config(config)
        .with_engine(engine)
        .with_dispatcher(SideEffectDispatcher::new(audit, transport))
        .with_company_types(registry.company_type_ids())
        .with_db_pool(db_pool))
}

// ---------------------------------------------------------------------------
// Banner
// ---------------------------------------------------------------------------

fn log_banner(
    config: &AppConfig,
    path: Option<&Path>,
    registry: &RegistryConfig,
    webhook: bool,
    database: bool,
) {
    let fee_provinces = registry
        .provinces
        .iter()
        .filter(|p| p.fees.iter().any(|f| f.active && f.amount > 0))
        .count();
    tracing::info!(
        config = %path.map(|p| p.display().to_string()).unwrap_or_else(|| "<none>".to_string()),
        provinces = registry.provinces.len(),
        fee_provinces,
        company_types = registry.company_types.len(),
        extra_decoration_tokens = registry.decoration_tokens.len(),
        notifications = if webhook { "webhook" } else { "log" },
        audit = if database { "postgres" } else { "memory" },
        auth = if config.auth_token.is_some() { "token" } else { "disabled" },
        "registry bootstrapped"
    );
    if path.is_none() {
        tracing::warn!("REGISTRY_CONFIG not set: no fee rules loaded, fee-liable submissions will be refused");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp_config(dir: &Path, content: &str) -> PathBuf {
        let path = dir.join("registry.yaml");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(content.as_bytes()).unwrap();
        path
    }

    const VALID: &str = r#"
provinces:
  - id: 1
    name: Baghdad
    fees:
      - name: reservation
        amount: 3000
      - name: publication
        amount: 2000
      - name: legacy surcharge
        amount: 900
        active: false
  - id: 2
    name: Basra
company_types: [1, 2]
decoration_tokens: [holding]
"#;

    #[test]
    fn load_valid_config() {
        let tmp = tempfile::tempdir().unwrap();
        let path = write_temp_config(tmp.path(), VALID);
        let registry = RegistryConfig::load(&path).unwrap();
        assert_eq!(registry.provinces.len(), 2);
        assert_eq!(
            tnr_state::fee::quote_fee(&registry.fee_schedule(), ProvinceId(1)).unwrap(),
            5000
        );
        assert_eq!(
            tnr_state::fee::quote_fee(&registry.fee_schedule(), ProvinceId(2)).unwrap(),
            0
        );
        assert!(registry.normalizer().is_decoration("holding"));
    }

    #[test]
    fn missing_file_is_config_not_found() {
        match RegistryConfig::load(Path::new("/nonexistent/registry.yaml")) {
            Err(BootstrapError::ConfigNotFound { path }) => assert!(path.contains("nonexistent")),
            other => panic!("expected ConfigNotFound, got: {other:?}"),
        }
    }

    #[test]
    fn invalid_yaml_reports_parse_error() {
        match RegistryConfig::parse("provinces: [") {
            Err(BootstrapError::InvalidConfig { errors }) => {
                assert!(errors[0].contains("YAML parse error"))
            }
            other => panic!("expected InvalidConfig, got: {other:?}"),
        }
    }

    #[test]
    fn unknown_field_is_rejected() {
        assert!(RegistryConfig::parse("provinces: []\nfee_currency: IQD\n").is_err());
    }

    #[test]
    fn validation_collects_every_problem() {
        let yaml = r#"
provinces:
  - id: 0
  - id: 3
    fees:
      - { name: "", amount: 10 }
  - id: 3
company_types: [0]
notify_webhook_url: "not a url"
"#;
        match RegistryConfig::parse(yaml) {
            Err(BootstrapError::InvalidConfig { errors }) => {
                assert!(errors.iter().any(|e| e.contains("province id 0")));
                assert!(errors.iter().any(|e| e.contains("more than once")));
                assert!(errors.iter().any(|e| e.contains("without a name")));
                assert!(errors.iter().any(|e| e.contains("company type id 0")));
                assert!(errors.iter().any(|e| e.contains("notify_webhook_url")));
            }
            other => panic!("expected InvalidConfig, got: {other:?}"),
        }
    }

    #[test]
    fn bootstrap_without_config_has_no_fees() {
        let state = bootstrap_from(AppConfig::default(), None, None, None).unwrap();
        assert_eq!(state.engine.quote_fee(ProvinceId(1)).unwrap(), 0);
        assert!(state.knows_company_type(CompanyTypeId(99)));
    }

    #[test]
    fn bootstrap_applies_registry() {
        let tmp = tempfile::tempdir().unwrap();
        let path = write_temp_config(tmp.path(), VALID);
        let state = bootstrap_from(AppConfig::default(), Some(&path), None, None).unwrap();
        assert_eq!(state.engine.quote_fee(ProvinceId(1)).unwrap(), 5000);
        assert!(state.knows_company_type(CompanyTypeId(2)));
        assert!(!state.knows_company_type(CompanyTypeId(9)));
    }

    #[test]
    fn bootstrap_rejects_bad_webhook_override() {
        let result = bootstrap_from(AppConfig::default(), None, Some("::nope".into()), None);
        assert!(matches!(result, Err(BootstrapError::InvalidConfig { .. })));
    }
}
