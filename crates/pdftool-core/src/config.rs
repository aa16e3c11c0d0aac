//! Options controlling how documents are composed and written

use serde::{Deserialize, Serialize};

use crate::error::PdfToolError;

/// Producer string written when the caller does not override it
pub const DEFAULT_PRODUCER: &str = "pdftool";

/// Knobs shared by every composition operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComposeOptions {
    /// Decode independent inputs on the rayon pool (default: true)
    #[serde(default = "default_true")]
    pub parallel: bool,
    /// Flate-compress unfiltered streams on save (default: true)
    #[serde(default = "default_true")]
    pub compress: bool,
    /// `/Producer` entry of the output Info dictionary
    #[serde(default = "default_producer")]
    pub producer: Option<String>,
}

fn default_true() -> bool {
    true
}

fn default_producer() -> Option<String> {
    Some(DEFAULT_PRODUCER.to_string())
}

impl Default for ComposeOptions {
    fn default() -> Self {
        Self {
            parallel: true,
            compress: true,
            producer: default_producer(),
        }
    }
}

impl ComposeOptions {
    /// Parse options from a TOML fragment; missing keys take their defaults
    ///
    /// ```
    /// use pdftool_core::ComposeOptions;
    ///
    /// let options = ComposeOptions::from_toml_str("parallel = false").unwrap();
    /// assert!(!options.parallel);
    /// assert!(options.compress);
    /// ```
    pub fn from_toml_str(s: &str) -> Result<Self, PdfToolError> {
        toml::from_str(s).map_err(|e| PdfToolError::InvalidConfig(e.to_string()))
    }

    /// Sequential, uncompressed output; handy for inspecting content streams
    pub fn plain() -> Self {
        Self {
            parallel: false,
            compress: false,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_empty_toml_gives_defaults() {
        let options = ComposeOptions::from_toml_str("").unwrap();
        assert_eq!(options, ComposeOptions::default());
        assert_eq!(options.producer.as_deref(), Some("pdftool"));
    }

    #[test]
    fn test_toml_overrides() {
        let toml = r#"
            parallel = false
            compress = false
            producer = "Acme Composer"
        "#;
        let options = ComposeOptions::from_toml_str(toml).unwrap();
        assert!(!options.parallel);
        assert!(!options.compress);
        assert_eq!(options.producer.as_deref(), Some("Acme Composer"));
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let result = ComposeOptions::from_toml_str("parallel = \"sometimes\"");
        assert!(matches!(result, Err(PdfToolError::InvalidConfig(_))));
    }
}
