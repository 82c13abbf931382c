/// Default log base for services that were not given one.
pub const DEFAULT_LOG_BASE_ID: i64 = 600;

/// Construction-time settings of a storage business service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageServiceConfig {
    pub log_base_id: i64,
}

impl Default for StorageServiceConfig {
    fn default() -> Self {
        Self {
            log_base_id: DEFAULT_LOG_BASE_ID,
        }
    }
}

impl StorageServiceConfig {
    pub fn with_log_base_id(mut self, log_base_id: i64) -> Self {
        self.log_base_id = log_base_id;
        self
    }

    /// Defaults overridden by `KEYSTONE_LOG_BASE_ID`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(raw) = lookup("KEYSTONE_LOG_BASE_ID") {
            match raw.trim().parse::<i64>() {
                Ok(id) => config.log_base_id = id,
                Err(_) => tracing::warn!(
                    value = %raw,
                    default = DEFAULT_LOG_BASE_ID,
                    "invalid KEYSTONE_LOG_BASE_ID, using default"
                ),
            }
        }
        config
    }
}
