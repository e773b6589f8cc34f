use crate::directory::{load_contacts, Contact, ContactDirectory, FileDirectory, InMemoryDirectory};
use crate::engine::EngineConfig;
use crate::response::Disposition;
use crate::setup::SetupStatus;
use anyhow::{anyhow, bail, Context};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub screening: ScreeningConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub diagnostics: DiagnosticsConfig,
    #[serde(default)]
    pub contacts: ContactsConfig,
    #[serde(default)]
    pub setup: SetupStatus,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ScreeningConfig {
    #[serde(default = "default_fail_safe")]
    pub fail_safe: Disposition,
    #[serde(default = "default_lookup_timeout_ms")]
    pub lookup_timeout_ms: u64,
    /// Directory lookups allowed to run at once, counting ones that timed out
    /// but have not returned yet.
    #[serde(default = "default_max_pending_lookups")]
    pub max_pending_lookups: usize,
}

fn default_fail_safe() -> Disposition {
    Disposition::Allow
}

fn default_lookup_timeout_ms() -> u64 {
    2000
}

fn default_max_pending_lookups() -> usize {
    64
}

impl Default for ScreeningConfig {
    fn default() -> Self {
        Self {
            fail_safe: default_fail_safe(),
            lookup_timeout_ms: default_lookup_timeout_ms(),
            max_pending_lookups: default_max_pending_lookups(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl LoggingConfig {
    pub fn level_filter(&self) -> anyhow::Result<log::LevelFilter> {
        self.level
            .parse::<log::LevelFilter>()
            .map_err(|_| anyhow!("Unknown log level: {}", self.level))
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DiagnosticsConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_true")]
    pub redact_numbers: bool,
    #[serde(default = "default_summary_interval")]
    pub summary_interval_seconds: u64,
}

fn default_true() -> bool {
    true
}

fn default_summary_interval() -> u64 {
    60
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            redact_numbers: true,
            summary_interval_seconds: default_summary_interval(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct ContactsConfig {
    /// TOML file of `[[contacts]]` entries.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    /// Read `file` on every lookup instead of once at startup.
    #[serde(default)]
    pub reload_on_lookup: bool,
    #[serde(default)]
    pub entries: Vec<Contact>,
}

impl Config {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn default_path() -> &'static str {
        "/etc/call-screener.toml"
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.screening.lookup_timeout_ms == 0 {
            bail!("screening.lookup_timeout_ms must be greater than zero");
        }
        if self.screening.max_pending_lookups == 0 {
            bail!("screening.max_pending_lookups must be greater than zero");
        }
        if self.diagnostics.summary_interval_seconds == 0 {
            bail!("diagnostics.summary_interval_seconds must be greater than zero");
        }
        if self.contacts.reload_on_lookup && self.contacts.file.is_none() {
            bail!("contacts.reload_on_lookup needs contacts.file");
        }
        self.logging.level_filter()?;
        Ok(())
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize configuration")
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            fail_safe: self.screening.fail_safe,
            redact_numbers: self.diagnostics.redact_numbers,
        }
    }

    pub fn lookup_timeout(&self) -> Duration {
        Duration::from_millis(self.screening.lookup_timeout_ms)
    }

    /// Inline entries plus, when configured, the contacts file read once.
    pub fn load_contacts(&self) -> anyhow::Result<InMemoryDirectory> {
        let mut directory = InMemoryDirectory::from_contacts(self.contacts.entries.clone());
        if let Some(file) = &self.contacts.file {
            let contacts = load_contacts(file)
                .with_context(|| format!("Failed to load contacts file: {file}"))?;
            for contact in contacts {
                directory.insert(contact);
            }
        }
        Ok(directory)
    }

    /// The directory screening runs against.
    ///
    /// With `reload_on_lookup` the contacts file is the only source and a
    /// broken file surfaces as a lookup failure on each call.
    pub fn contact_directory(&self) -> anyhow::Result<Arc<dyn ContactDirectory>> {
        match (&self.contacts.file, self.contacts.reload_on_lookup) {
            (None, true) => bail!("contacts.reload_on_lookup needs contacts.file"),
            (Some(file), true) => {
                if !self.contacts.entries.is_empty() {
                    log::warn!(
                        "Ignoring {} inline contacts: reload_on_lookup uses {} only",
                        self.contacts.entries.len(),
                        file
                    );
                }
                Ok(Arc::new(FileDirectory::new(file)))
            }
            _ => {
                let directory = self.load_contacts()?;
                log::info!("Loaded {} contact numbers", directory.len());
                Ok(Arc::new(directory))
            }
        }
    }

    /// Configuration written by `--generate-config`.
    pub fn sample() -> Self {
        let mut config = Self::default();
        config.contacts.entries = vec![Contact::new("Example Contact", "+1 (555) 123-4567")];
        config
    }
}
