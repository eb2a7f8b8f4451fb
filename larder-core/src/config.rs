//! Configuration types

use crate::*;
use serde::{Deserialize, Serialize};

/// Tuning for the suggestion cache.
///
/// Missing fields in a TOML document fall back to [`SuggestConfig::default`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SuggestConfig {
    /// Capacity per (tenant, field type) scope before LFU eviction kicks in.
    pub max_size: usize,
    /// `cleanup_low_frequency` removes entries used fewer times than this.
    pub min_frequency_threshold: u64,
    /// Number of entries reported in `CacheStatistics::top_values`.
    pub top_values_limit: usize,
    /// Result count when a suggestion request names no limit.
    pub default_suggestion_limit: usize,
    /// Separator between location names in a path.
    pub path_delimiter: String,
    /// Longest parent chain the path resolver will follow.
    pub max_path_depth: usize,
}

impl SuggestConfig {
    pub const DEFAULT_MAX_SIZE: usize = 100;
    pub const DEFAULT_MIN_FREQUENCY_THRESHOLD: u64 = 2;
    pub const DEFAULT_TOP_VALUES_LIMIT: usize = 20;
    pub const DEFAULT_SUGGESTION_LIMIT: usize = 10;
    pub const DEFAULT_PATH_DELIMITER: &'static str = " > ";
    pub const DEFAULT_MAX_PATH_DEPTH: usize = 64;

    /// Parse a TOML document and validate the result.
    pub fn from_toml_str(source: &str) -> LarderResult<Self> {
        let config: Self = toml::from_str(source).map_err(|e| ConfigError::Parse {
            reason: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    ///
    /// Validates:
    /// - all sizes and limits are positive
    /// - path_delimiter is not empty
    pub fn validate(&self) -> LarderResult<()> {
        let positive = [
            ("max_size", self.max_size),
            ("top_values_limit", self.top_values_limit),
            ("default_suggestion_limit", self.default_suggestion_limit),
            ("max_path_depth", self.max_path_depth),
        ];
        for (field, value) in positive {
            if value == 0 {
                return Err(invalid(field, value.to_string(), "must be greater than 0"));
            }
        }

        if self.min_frequency_threshold == 0 {
            return Err(invalid(
                "min_frequency_threshold",
                "0".to_string(),
                "must be greater than 0",
            ));
        }

        if self.path_delimiter.is_empty() {
            return Err(invalid(
                "path_delimiter",
                String::new(),
                "must not be empty",
            ));
        }

        Ok(())
    }
}

fn invalid(field: &str, value: String, reason: &str) -> LarderError {
    LarderError::Config(ConfigError::InvalidValue {
        field: field.to_string(),
        value,
        reason: reason.to_string(),
    })
}

impl Default for SuggestConfig {
    fn default() -> Self {
        Self {
            max_size: Self::DEFAULT_MAX_SIZE,
            min_frequency_threshold: Self::DEFAULT_MIN_FREQUENCY_THRESHOLD,
            top_values_limit: Self::DEFAULT_TOP_VALUES_LIMIT,
            default_suggestion_limit: Self::DEFAULT_SUGGESTION_LIMIT,
            path_delimiter: Self::DEFAULT_PATH_DELIMITER.to_string(),
            max_path_depth: Self::DEFAULT_MAX_PATH_DEPTH,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = SuggestConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_size, 100);
        assert_eq!(config.min_frequency_threshold, 2);
        assert_eq!(config.path_delimiter, " > ");
    }

    #[test]
    fn test_zero_max_size_rejected() {
        let config = SuggestConfig {
            max_size: 0,
            ..SuggestConfig::default()
        };
        let err = config.validate().expect_err("zero max_size should fail");
        assert!(matches!(
            err,
            LarderError::Config(ConfigError::InvalidValue { ref field, .. }) if field == "max_size"
        ));
    }

    #[test]
    fn test_zero_default_limit_rejected() {
        let config = SuggestConfig {
            default_suggestion_limit: 0,
            ..SuggestConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_delimiter_rejected() {
        let config = SuggestConfig {
            path_delimiter: String::new(),
            ..SuggestConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_toml_fills_defaults() {
        let config = SuggestConfig::from_toml_str("max_size = 25\npath_delimiter = \" / \"\n")
            .expect("config should parse");
        assert_eq!(config.max_size, 25);
        assert_eq!(config.path_delimiter, " / ");
        assert_eq!(config.top_values_limit, 20);
    }

    #[test]
    fn test_from_toml_rejects_garbage() {
        let err = SuggestConfig::from_toml_str("max_size = \"lots\"").expect_err("should fail");
        assert!(matches!(err, LarderError::Config(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_from_toml_validates() {
        assert!(SuggestConfig::from_toml_str("max_size = 0").is_err());
    }
}
