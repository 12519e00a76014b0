//! Bridge configuration.
//!
//! Every field has a default, so an empty TOML document is a valid
//! configuration:
//!
//! ```toml
//! module_name = "octave"
//! reverse_builtin = "lua_call"
//! default_max_results = 256
//! error_prefix = "oct_error"
//! ```

use serde::Deserialize;
use thiserror::Error;

use crate::forward::DEFAULT_MAX_RESULTS;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid bridge configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid bridge configuration: `{0}` must not be empty")]
    EmptyName(&'static str),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BridgeConfig {
    /// Lua global (and `package.loaded` key) holding the module table.
    pub module_name: String,
    /// Name of the reverse-call builtin in the numeric runtime.
    pub reverse_builtin: String,
    /// Results captured by `eval`/`feval` when the caller gives no limit.
    pub default_max_results: usize,
    /// Tag prepended to every error raised in Lua.
    pub error_prefix: String,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            module_name: "octave".into(),
            reverse_builtin: "lua_call".into(),
            default_max_results: DEFAULT_MAX_RESULTS,
            error_prefix: "oct_error".into(),
        }
    }
}

impl BridgeConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: BridgeConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.module_name.is_empty() {
            return Err(ConfigError::EmptyName("module_name"));
        }
        if self.reverse_builtin.is_empty() {
            return Err(ConfigError::EmptyName("reverse_builtin"));
        }
        Ok(())
    }
}
