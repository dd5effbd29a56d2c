//! Controller configuration.
//!
//! ```
//! use scriptfn::ControllerConfig;
//!
//! let config = ControllerConfig::from_json_str(
//!     r#"{ "names": { "separator": "," }, "parameters": { "base": "p", "start_index": 1 } }"#,
//! ).unwrap();
//! assert_eq!(config.names.separator(), ",");
//! assert_eq!(config.parameters.generate(2), vec!["p1", "p2"]);
//! assert_eq!(config.functions.base, "f");
//! ```

use serde::{Deserialize, Serialize};

use crate::errors::FunctionError;
use crate::names::{NameListFormat, NamingConvention};

/// Settings shared by a vector controller and the elements it creates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// String form of parameter names, function names and gradient lists
    pub names: NameListFormat,
    /// Default parameter names
    pub parameters: NamingConvention,
    /// Default function names of vector elements
    pub functions: NamingConvention,
    /// Whether assigning an element with another dimension changes the
    /// vector's parameter count
    pub adopt_element_dimension: bool,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            names: NameListFormat::default(),
            parameters: NamingConvention::parameters(),
            functions: NamingConvention::functions(),
            adopt_element_dimension: true,
        }
    }
}

impl ControllerConfig {
    /// Parses a JSON configuration; missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, FunctionError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Serializes the configuration as pretty-printed JSON.
    pub fn to_json_string(&self) -> Result<String, FunctionError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ControllerConfig::from_json_str("{}").unwrap();
        assert_eq!(config, ControllerConfig::default());
        assert!(config.adopt_element_dimension);
        assert_eq!(config.parameters.base, "x");
    }

    #[test]
    fn test_round_trip() {
        let mut config = ControllerConfig::default();
        config.adopt_element_dimension = false;
        config.functions.width = Some(2);
        let json = config.to_json_string().unwrap();
        assert_eq!(ControllerConfig::from_json_str(&json).unwrap(), config);
    }

    #[test]
    fn test_empty_separator_rejected() {
        let err = ControllerConfig::from_json_str(r#"{ "names": { "separator": "" } }"#);
        assert!(matches!(err, Err(FunctionError::Serialization(_))));
    }
}
