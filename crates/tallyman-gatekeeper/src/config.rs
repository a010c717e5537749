//! Gatekeeper configuration

use serde::{Deserialize, Serialize};

/// Configuration for readiness rules and opportunity filtering
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateConfig {
    /// Confidence below this blocks analysis
    pub min_confidence: f64,

    /// Confidence below this limits analysis
    pub limited_confidence: f64,

    /// Metrics that must be present and finite
    pub required_metrics: Vec<String>,

    /// Metrics whose absence limits analysis
    pub advisory_metrics: Vec<String>,

    /// Balance check tolerance as a share of total assets
    pub balance_tolerance_ratio: f64,

    /// Balance check tolerance floor in whole currency units
    pub balance_tolerance_floor: f64,

    /// Warn when the currency-unit scale was not confirmed
    pub require_validated_unit_scale: bool,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            min_confidence: 0.40,
            limited_confidence: 0.70,
            required_metrics: vec!["total_assets".to_string(), "net_assets".to_string()],
            advisory_metrics: vec!["turnover".to_string(), "profit_before_tax".to_string()],
            balance_tolerance_ratio: 0.01,
            balance_tolerance_floor: 1.0,
            require_validated_unit_scale: true,
        }
    }
}

impl GateConfig {
    /// Create a lenient configuration (fewer warnings, lower confidence bar)
    pub fn lenient() -> Self {
        Self {
            min_confidence: 0.25,
            limited_confidence: 0.50,
            required_metrics: vec!["total_assets".to_string()],
            advisory_metrics: Vec::new(),
            balance_tolerance_ratio: 0.05,
            balance_tolerance_floor: 10.0,
            require_validated_unit_scale: false,
        }
    }

    /// Create a strict configuration (higher confidence bar, tighter balance)
    pub fn strict() -> Self {
        Self {
            min_confidence: 0.60,
            limited_confidence: 0.85,
            required_metrics: vec![
                "total_assets".to_string(),
                "net_assets".to_string(),
                "total_liabilities".to_string(),
            ],
            advisory_metrics: vec![
                "turnover".to_string(),
                "profit_before_tax".to_string(),
                "cash".to_string(),
            ],
            balance_tolerance_ratio: 0.001,
            balance_tolerance_floor: 1.0,
            require_validated_unit_scale: true,
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if !(0.0..=1.0).contains(&self.min_confidence) {
            return Err("min_confidence must be in [0.0, 1.0]".to_string());
        }
        if !(0.0..=1.0).contains(&self.limited_confidence) {
            return Err("limited_confidence must be in [0.0, 1.0]".to_string());
        }
        if self.limited_confidence < self.min_confidence {
            return Err("limited_confidence must not be below min_confidence".to_string());
        }
        if self.balance_tolerance_ratio < 0.0 || self.balance_tolerance_floor < 0.0 {
            return Err("balance tolerances must not be negative".to_string());
        }
        Ok(())
    }

    /// Tolerance for the balance check at a given total-assets figure
    pub fn balance_tolerance(&self, total_assets: f64) -> f64 {
        (total_assets.abs() * self.balance_tolerance_ratio).max(self.balance_tolerance_floor)
    }

    /// Load configuration from TOML string
    pub fn from_toml(toml_str: &str) -> Result<Self, String> {
        toml::from_str(toml_str).map_err(|e| format!("Failed to parse TOML: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = GateConfig::default();
        assert_eq!(config.min_confidence, 0.40);
        assert_eq!(config.limited_confidence, 0.70);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_presets_valid() {
        assert!(GateConfig::lenient().validate().is_ok());
        assert!(GateConfig::strict().validate().is_ok());
    }

    #[test]
    fn test_inverted_thresholds_rejected() {
        let mut config = GateConfig::default();
        config.limited_confidence = 0.3;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_balance_tolerance_floor() {
        let config = GateConfig::default();
        assert_eq!(config.balance_tolerance(50.0), 1.0);
        assert_eq!(config.balance_tolerance(1_000_000.0), 10_000.0);
    }

    #[test]
    fn test_from_toml() {
        let config = GateConfig::from_toml(
            r#"
            min_confidence = 0.5
            limited_confidence = 0.8
            required_metrics = ["total_assets"]
            advisory_metrics = []
            balance_tolerance_ratio = 0.02
            balance_tolerance_floor = 5.0
            require_validated_unit_scale = false
            "#,
        )
        .unwrap();
        assert_eq!(config.required_metrics, vec!["total_assets".to_string()]);
    }
}
