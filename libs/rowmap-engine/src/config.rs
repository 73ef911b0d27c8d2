use serde::Deserialize;

use crate::error::ConfigError;
use crate::normalize::NameCase;

/// Mapper configuration, parsed from TOML.
///
/// ```toml
/// name_case = "snake"
/// lenient = false
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MapperConfig {
    /// Built-in normalizer applied to declared field names.
    #[serde(default)]
    pub name_case: NameCase,

    /// Default for sessions created from this mapper: discard columns
    /// that have no destination field instead of failing.
    #[serde(default = "default_lenient")]
    pub lenient: bool,
}

fn default_lenient() -> bool {
    false
}

impl Default for MapperConfig {
    fn default() -> Self {
        Self {
            name_case: NameCase::default(),
            lenient: default_lenient(),
        }
    }
}

impl MapperConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_string(),
            source,
        })?;
        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(toml_str: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(toml_str)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_document() {
        let config = MapperConfig::parse("").unwrap();
        assert_eq!(config, MapperConfig::default());
        assert_eq!(config.name_case, NameCase::Lower);
        assert!(!config.lenient);
    }

    #[test]
    fn test_parse_values() {
        let config = MapperConfig::parse("name_case = \"snake\"\nlenient = true\n").unwrap();
        assert_eq!(config.name_case, NameCase::Snake);
        assert!(config.lenient);
    }

    #[test]
    fn test_unknown_case_is_rejected() {
        assert!(matches!(
            MapperConfig::parse("name_case = \"kebab\""),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        let err = MapperConfig::load("/nonexistent/rowmap.toml").unwrap_err();
        assert!(err.to_string().contains("/nonexistent/rowmap.toml"));
    }
}
