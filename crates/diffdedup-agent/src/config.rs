//! Agent configuration.

use anyhow::{ensure, Context, Result};
use diffdedup_core::{ConfigError, EmitPolicy};
use diffdedup_proto::{json_dedup, JsonDedup};

/// Agent configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentConfig {
    /// JSON pointer to the cluster key inside each payload
    pub key_pointer: Option<String>,

    /// JSON pointer to an integer sort field (falls back to `sortIndex`)
    pub sort_pointer: Option<String>,

    /// How in-place representative changes are emitted
    pub policy: EmitPolicy,

    /// Capacity of the input and output channels
    pub channel_capacity: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            key_pointer: None,
            sort_pointer: None,
            policy: EmitPolicy::Update,
            channel_capacity: 64,
        }
    }
}

impl AgentConfig {
    /// Load configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `DIFFDEDUP_KEY_POINTER`: JSON pointer to the cluster key (required to
    ///   build the operator)
    /// - `DIFFDEDUP_SORT_POINTER`: JSON pointer to an integer sort field
    /// - `DIFFDEDUP_POLICY`: "update" or "reinsert"
    /// - `DIFFDEDUP_CHANNEL_CAPACITY`: bounded channel size
    ///
    /// # Errors
    ///
    /// Returns error if a variable is present but invalid.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns error if a variable is present but invalid.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(pointer) = lookup("DIFFDEDUP_KEY_POINTER") {
            config.key_pointer = Some(pointer);
        }

        if let Some(pointer) = lookup("DIFFDEDUP_SORT_POINTER") {
            config.sort_pointer = Some(pointer);
        }

        if let Some(policy) = lookup("DIFFDEDUP_POLICY") {
            config.policy = policy.parse().context("Invalid DIFFDEDUP_POLICY")?;
        }

        if let Some(capacity) = lookup("DIFFDEDUP_CHANNEL_CAPACITY") {
            config.channel_capacity = capacity
                .trim()
                .parse()
                .context("Invalid DIFFDEDUP_CHANNEL_CAPACITY")?;
            ensure!(
                config.channel_capacity > 0,
                "DIFFDEDUP_CHANNEL_CAPACITY must be at least 1"
            );
        }

        Ok(config)
    }

    /// Build the operator described by this configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingKeyFn`] if no key pointer is set.
    pub fn build_dedup(&self) -> Result<JsonDedup, ConfigError> {
        json_dedup(
            self.key_pointer.as_deref(),
            self.sort_pointer.as_deref(),
            self.policy,
        )
    }
}
