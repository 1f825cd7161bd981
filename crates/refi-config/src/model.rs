//! Model configuration types.
//!
//! This module defines the single configuration value that drives one
//! valuation run: loan terms, short-rate process parameters, transaction
//! costs, lattice size, and the policy switches that resolve modelling
//! choices (rate dynamics, lender valuation, table retention).
//!
//! Rates are entered in **annual** terms and converted to periodic rates
//! with [`ModelConfig::periodic_contract_rate`] and friends.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult, Validate, ValidationError};
use crate::trigger::TriggerSearchConfig;

// =============================================================================
// POLICY ENUMS
// =============================================================================

/// Short-rate dynamics used to build the lattice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateDynamics {
    /// Log of the rate follows the binomial walk; rates stay positive.
    #[default]
    Lognormal,
    /// Rate level follows the binomial walk; rates may go negative unless
    /// an explicit floor is configured.
    Normal,
}

/// How the lender's market value (`LM`) is rolled back through the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LenderValuation {
    /// Lender value follows the scheduled payments and discounted
    /// continuation at every interior node, ignoring the borrower's exercise.
    ///
    /// The terminal slice is seeded with the borrower's liability `M`, which
    /// is `(1 + α) B` at exercise nodes. Exercise therefore reaches the lender
    /// only through the horizon, cost included, while interior exercise nodes
    /// are rolled back as if the loan ran on.
    #[default]
    Realized,
    /// Lender receives the outstanding balance wherever the borrower's
    /// optimal policy is to refinance.
    BorrowerExercise,
}

/// Which parts of the value tables survive a solve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Retention {
    /// Keep every node, O(N²) memory.
    #[default]
    FullTree,
    /// Keep two rolling slices and the root, O(N) memory.
    RootOnly,
}

// =============================================================================
// MODEL CONFIGURATION
// =============================================================================

/// Configuration for a single refinancing-option valuation.
///
/// Contract, market and floor rates are annual; the engine divides them by
/// `periods_per_year`. Drift and volatility are per lattice step.
///
/// # Example
///
/// ```rust
/// use refi_config::{ModelConfig, Validate};
///
/// let config = ModelConfig::chen_ling_1989()
///     .with_contract_rate(0.105)
///     .with_time_periods(24);
///
/// assert!(config.is_valid());
/// assert!((config.periodic_contract_rate() - 0.105 / 12.0).abs() < 1e-15);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Original principal `P0`.
    pub initial_balance: f64,

    /// Annual contract rate of the existing loan.
    pub contract_rate: f64,

    /// Original term in periods.
    pub original_term: u32,

    /// Loan age in periods at the valuation date.
    pub current_time: u32,

    /// Annual market rate at the valuation date.
    pub initial_rate: f64,

    /// Drift of the short-rate process per period.
    pub drift_mean: f64,

    /// Volatility of the short-rate process per period. Relative (of
    /// `ln r`) under lognormal dynamics, absolute periodic rate under normal.
    pub volatility: f64,

    /// Probability of an up-move.
    pub prob_up: f64,

    /// Refinancing cost as a fraction of the outstanding balance.
    pub refinancing_cost_pct: f64,

    /// Number of lattice steps to simulate.
    pub time_periods: u32,

    /// Periods per year.
    pub periods_per_year: u32,

    /// Short-rate dynamics.
    #[serde(default)]
    pub rate_dynamics: RateDynamics,

    /// Optional annual floor on node rates (normal dynamics only).
    #[serde(default)]
    pub rate_floor: Option<f64>,

    /// Lender valuation policy.
    #[serde(default)]
    pub lender_valuation: LenderValuation,

    /// Value-table retention.
    #[serde(default)]
    pub retention: Retention,

    /// Default settings for the trigger-rate search.
    #[serde(default)]
    pub trigger_search: TriggerSearchConfig,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self::chen_ling_1989()
    }
}

impl ModelConfig {
    /// Chen & Ling (1989) Table 1 setting: 8-year monthly loan at 10%,
    /// market at 8%, 15% volatility, 2% refinancing cost, 12 steps.
    pub fn chen_ling_1989() -> Self {
        Self {
            initial_balance: 100.0,
            contract_rate: 0.10,
            original_term: 96,
            current_time: 0,
            initial_rate: 0.08,
            drift_mean: 0.0,
            volatility: 0.15,
            prob_up: 0.5,
            refinancing_cost_pct: 0.02,
            time_periods: 12,
            periods_per_year: 12,
            rate_dynamics: RateDynamics::Lognormal,
            rate_floor: None,
            lender_valuation: LenderValuation::Realized,
            retention: Retention::FullTree,
            trigger_search: TriggerSearchConfig::default(),
        }
    }

    /// Wide differential: 12% contract against a 6% market, 10% volatility,
    /// six steps. Refinancing immediately is optimal.
    pub fn demo_refinance() -> Self {
        Self {
            contract_rate: 0.12,
            initial_rate: 0.06,
            volatility: 0.10,
            time_periods: 6,
            ..Self::chen_ling_1989()
        }
    }

    /// No differential: contract and market both at 8%. Waiting is optimal.
    pub fn demo_wait() -> Self {
        Self {
            contract_rate: 0.08,
            initial_rate: 0.08,
            volatility: 0.10,
            time_periods: 6,
            ..Self::chen_ling_1989()
        }
    }

    /// Parses a JSON document and validates it.
    pub fn from_json_str(s: &str) -> ConfigResult<Self> {
        let config: Self = serde_json::from_str(s)?;
        config.validate_or_error()?;
        Ok(config)
    }

    /// Parses a TOML document and validates it.
    pub fn from_toml_str(s: &str) -> ConfigResult<Self> {
        let config: Self = toml::from_str(s)?;
        config.validate_or_error()?;
        Ok(config)
    }

    /// Loads a `.json` or `.toml` file and validates it.
    pub fn from_path(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let display = path.display().to_string();
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);

        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: display.clone(),
            message: e.to_string(),
        })?;

        match extension.as_deref() {
            Some("json") => Self::from_json_str(&contents),
            Some("toml") => Self::from_toml_str(&contents),
            _ => Err(ConfigError::UnsupportedFormat { path: display }),
        }
    }

    /// Serializes to pretty JSON.
    pub fn to_json_string(&self) -> ConfigResult<String> {
        serde_json::to_string_pretty(self).map_err(ConfigError::from)
    }

    // -------------------------------------------------------------------------
    // Builders
    // -------------------------------------------------------------------------

    /// Sets the initial principal.
    pub fn with_initial_balance(mut self, balance: f64) -> Self {
        self.initial_balance = balance;
        self
    }

    /// Sets the annual contract rate.
    pub fn with_contract_rate(mut self, rate: f64) -> Self {
        self.contract_rate = rate;
        self
    }

    /// Sets the original term in periods.
    pub fn with_original_term(mut self, periods: u32) -> Self {
        self.original_term = periods;
        self
    }

    /// Sets the loan age at valuation.
    pub fn with_current_time(mut self, periods: u32) -> Self {
        self.current_time = periods;
        self
    }

    /// Sets the annual market rate.
    pub fn with_initial_rate(mut self, rate: f64) -> Self {
        self.initial_rate = rate;
        self
    }

    /// Sets the per-period drift.
    pub fn with_drift_mean(mut self, drift: f64) -> Self {
        self.drift_mean = drift;
        self
    }

    /// Sets the per-period volatility.
    pub fn with_volatility(mut self, volatility: f64) -> Self {
        self.volatility = volatility;
        self
    }

    /// Sets the up-move probability.
    pub fn with_prob_up(mut self, p: f64) -> Self {
        self.prob_up = p;
        self
    }

    /// Sets the refinancing cost fraction.
    pub fn with_refinancing_cost_pct(mut self, alpha: f64) -> Self {
        self.refinancing_cost_pct = alpha;
        self
    }

    /// Sets the number of lattice steps.
    pub fn with_time_periods(mut self, steps: u32) -> Self {
        self.time_periods = steps;
        self
    }

    /// Sets the number of periods per year.
    pub fn with_periods_per_year(mut self, m: u32) -> Self {
        self.periods_per_year = m;
        self
    }

    /// Sets the short-rate dynamics.
    pub fn with_rate_dynamics(mut self, dynamics: RateDynamics) -> Self {
        self.rate_dynamics = dynamics;
        self
    }

    /// Sets an explicit annual rate floor (normal dynamics only).
    pub fn with_rate_floor(mut self, floor: f64) -> Self {
        self.rate_floor = Some(floor);
        self
    }

    /// Sets the lender valuation policy.
    pub fn with_lender_valuation(mut self, policy: LenderValuation) -> Self {
        self.lender_valuation = policy;
        self
    }

    /// Sets the table retention policy.
    pub fn with_retention(mut self, retention: Retention) -> Self {
        self.retention = retention;
        self
    }

    /// Sets the default trigger search settings.
    pub fn with_trigger_search(mut self, search: TriggerSearchConfig) -> Self {
        self.trigger_search = search;
        self
    }

    // -------------------------------------------------------------------------
    // Periodic conversions
    // -------------------------------------------------------------------------

    /// Contract rate per period, `c0`.
    pub fn periodic_contract_rate(&self) -> f64 {
        self.contract_rate / f64::from(self.periods_per_year)
    }

    /// Market rate per period, `r0`.
    pub fn periodic_initial_rate(&self) -> f64 {
        self.initial_rate / f64::from(self.periods_per_year)
    }

    /// Rate floor per period, if configured.
    pub fn periodic_rate_floor(&self) -> Option<f64> {
        self.rate_floor
            .map(|floor| floor / f64::from(self.periods_per_year))
    }

    /// Annual interest-rate differential, contract minus market.
    pub fn rate_differential(&self) -> f64 {
        self.contract_rate - self.initial_rate
    }
}

impl Validate for ModelConfig {
    fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        let finite = [
            ("initial_balance", self.initial_balance),
            ("contract_rate", self.contract_rate),
            ("initial_rate", self.initial_rate),
            ("drift_mean", self.drift_mean),
            ("volatility", self.volatility),
            ("prob_up", self.prob_up),
            ("refinancing_cost_pct", self.refinancing_cost_pct),
        ];
        for (field, value) in finite {
            if !value.is_finite() {
                errors.push(ValidationError::with_rule(
                    field,
                    format!("{field} must be finite, got {value}"),
                    "finite",
                ));
            }
        }
        if !errors.is_empty() {
            return errors;
        }

        if self.initial_balance <= 0.0 {
            errors.push(ValidationError::with_rule(
                "initial_balance",
                format!("Initial balance must be positive, got {}", self.initial_balance),
                "positive_balance",
            ));
        }

        if self.contract_rate < 0.0 {
            errors.push(ValidationError::with_rule(
                "contract_rate",
                format!("Contract rate cannot be negative, got {}", self.contract_rate),
                "non_negative_rate",
            ));
        }

        if self.periods_per_year == 0 {
            errors.push(ValidationError::with_rule(
                "periods_per_year",
                "Periods per year must be at least 1",
                "positive_frequency",
            ));
        } else {
            let m = f64::from(self.periods_per_year);
            match self.rate_dynamics {
                RateDynamics::Lognormal if self.initial_rate <= 0.0 => {
                    errors.push(ValidationError::with_rule(
                        "initial_rate",
                        format!(
                            "Lognormal dynamics need a positive initial rate, got {}",
                            self.initial_rate
                        ),
                        "lognormal_positive_rate",
                    ));
                }
                RateDynamics::Normal if self.initial_rate / m <= -1.0 => {
                    errors.push(ValidationError::with_rule(
                        "initial_rate",
                        "Periodic initial rate must exceed -100%",
                        "discountable_rate",
                    ));
                }
                _ => {}
            }

            if let Some(floor) = self.rate_floor {
                if self.rate_dynamics == RateDynamics::Lognormal {
                    errors.push(ValidationError::with_rule(
                        "rate_floor",
                        "Rate floor only applies to normal dynamics",
                        "floor_requires_normal",
                    ));
                } else if !floor.is_finite() || floor / m <= -1.0 {
                    errors.push(ValidationError::with_rule(
                        "rate_floor",
                        format!("Periodic rate floor must be finite and exceed -100%, got {floor}"),
                        "discountable_rate",
                    ));
                }
            }
        }

        if self.original_term == 0 {
            errors.push(ValidationError::with_rule(
                "original_term",
                "Original term must be at least 1 period",
                "positive_term",
            ));
        }

        if self.time_periods == 0 {
            errors.push(ValidationError::with_rule(
                "time_periods",
                "Time periods must be at least 1",
                "positive_steps",
            ));
        }

        if u64::from(self.current_time) + u64::from(self.time_periods)
            > u64::from(self.original_term)
        {
            errors.push(ValidationError::with_rule(
                "time_periods",
                format!(
                    "current_time ({}) + time_periods ({}) exceeds original_term ({})",
                    self.current_time, self.time_periods, self.original_term
                ),
                "horizon_within_term",
            ));
        }

        if self.prob_up <= 0.0 || self.prob_up >= 1.0 {
            errors.push(ValidationError::with_rule(
                "prob_up",
                format!("Up probability must lie in (0, 1), got {}", self.prob_up),
                "open_unit_interval",
            ));
        }

        if self.volatility < 0.0 {
            errors.push(ValidationError::with_rule(
                "volatility",
                format!("Volatility cannot be negative, got {}", self.volatility),
                "non_negative_volatility",
            ));
        }

        if self.refinancing_cost_pct < 0.0 {
            errors.push(ValidationError::with_rule(
                "refinancing_cost_pct",
                format!(
                    "Refinancing cost cannot be negative, got {}",
                    self.refinancing_cost_pct
                ),
                "non_negative_cost",
            ));
        }

        errors.extend(self.trigger_search.validate().into_iter().map(|mut e| {
            e.field = format!("trigger_search.{}", e.field);
            e
        }));

        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::io::Write;

    #[test]
    fn test_presets_are_valid() {
        assert!(ModelConfig::chen_ling_1989().is_valid());
        assert!(ModelConfig::demo_refinance().is_valid());
        assert!(ModelConfig::demo_wait().is_valid());
        assert_eq!(ModelConfig::default(), ModelConfig::chen_ling_1989());
    }

    #[test]
    fn test_periodic_conversion() {
        let config = ModelConfig::demo_refinance();
        assert_relative_eq!(config.periodic_contract_rate(), 0.01, epsilon = 1e-15);
        assert_relative_eq!(config.periodic_initial_rate(), 0.005, epsilon = 1e-15);
        assert_relative_eq!(config.rate_differential(), 0.06, epsilon = 1e-15);
    }

    #[test]
    fn test_rejects_bad_probability() {
        for p in [0.0, 1.0, -0.2, 1.5] {
            let config = ModelConfig::chen_ling_1989().with_prob_up(p);
            let err = config.validate_or_error().unwrap_err();
            assert_eq!(err.invalid_fields(), vec!["prob_up"]);
        }
    }

    #[test]
    fn test_rejects_non_positive_balance() {
        let config = ModelConfig::chen_ling_1989().with_initial_balance(0.0);
        assert!(!config.is_valid());
    }

    #[test]
    fn test_rejects_horizon_past_term() {
        let config = ModelConfig::chen_ling_1989()
            .with_original_term(24)
            .with_current_time(18)
            .with_time_periods(12);
        let errors = config.validate();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].rule.as_deref(), Some("horizon_within_term"));
    }

    #[test]
    fn test_rejects_zero_steps_and_negative_vol() {
        let config = ModelConfig::chen_ling_1989()
            .with_time_periods(0)
            .with_volatility(-0.1);
        let fields: Vec<String> = config.validate().into_iter().map(|e| e.field).collect();
        assert!(fields.contains(&"time_periods".to_string()));
        assert!(fields.contains(&"volatility".to_string()));
    }

    #[test]
    fn test_rejects_non_finite() {
        let config = ModelConfig::chen_ling_1989().with_volatility(f64::NAN);
        let errors = config.validate();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "volatility");
    }

    #[test]
    fn test_lognormal_requires_positive_rate() {
        let config = ModelConfig::chen_ling_1989().with_initial_rate(0.0);
        assert!(!config.is_valid());

        let normal = config.with_rate_dynamics(RateDynamics::Normal);
        assert!(normal.is_valid());
    }

    #[test]
    fn test_floor_requires_normal_dynamics() {
        let config = ModelConfig::chen_ling_1989().with_rate_floor(0.0);
        assert!(!config.is_valid());

        let normal = config.with_rate_dynamics(RateDynamics::Normal);
        assert!(normal.is_valid());
        assert_eq!(normal.periodic_rate_floor(), Some(0.0));
    }

    #[test]
    fn test_zero_contract_rate_is_valid() {
        let config = ModelConfig::chen_ling_1989().with_contract_rate(0.0);
        assert!(config.is_valid());
    }

    #[test]
    fn test_json_round_trip_with_defaults() {
        let json = r#"{
            "initial_balance": 100.0,
            "contract_rate": 0.12,
            "original_term": 96,
            "current_time": 0,
            "initial_rate": 0.06,
            "drift_mean": 0.0,
            "volatility": 0.10,
            "prob_up": 0.5,
            "refinancing_cost_pct": 0.02,
            "time_periods": 6,
            "periods_per_year": 12
        }"#;

        let config = ModelConfig::from_json_str(json).unwrap();
        assert_eq!(config, ModelConfig::demo_refinance());
        assert_eq!(config.rate_dynamics, RateDynamics::Lognormal);
        assert_eq!(config.lender_valuation, LenderValuation::Realized);

        let back = ModelConfig::from_json_str(&config.to_json_string().unwrap()).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn test_json_missing_required_field() {
        let err = ModelConfig::from_json_str(r#"{"initial_balance": 100.0}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Deserialization(_)));
    }

    #[test]
    fn test_json_invalid_values_fail_validation() {
        let mut config = ModelConfig::demo_wait();
        config.prob_up = 1.2;
        let json = serde_json::to_string(&config).unwrap();
        let err = ModelConfig::from_json_str(&json).unwrap_err();
        assert_eq!(err.invalid_fields(), vec!["prob_up"]);
    }

    #[test]
    fn test_toml_with_policies() {
        let toml = r#"
            initial_balance = 250000.0
            contract_rate = 0.065
            original_term = 360
            current_time = 24
            initial_rate = 0.05
            drift_mean = 0.0
            volatility = 0.0002
            prob_up = 0.5
            refinancing_cost_pct = 0.015
            time_periods = 60
            periods_per_year = 12
            rate_dynamics = "normal"
            rate_floor = 0.0
            lender_valuation = "borrower_exercise"
            retention = "root_only"

            [trigger_search]
            step = 0.001
        "#;

        let config = ModelConfig::from_toml_str(toml).unwrap();
        assert_eq!(config.rate_dynamics, RateDynamics::Normal);
        assert_eq!(config.lender_valuation, LenderValuation::BorrowerExercise);
        assert_eq!(config.retention, Retention::RootOnly);
        assert_eq!(config.rate_floor, Some(0.0));
        assert_relative_eq!(config.trigger_search.step, 0.001);
    }

    #[test]
    fn test_from_path_dispatches_on_extension() {
        let dir = tempfile::tempdir().unwrap();

        let json_path = dir.path().join("model.json");
        let mut file = std::fs::File::create(&json_path).unwrap();
        file.write_all(ModelConfig::demo_wait().to_json_string().unwrap().as_bytes())
            .unwrap();
        assert_eq!(
            ModelConfig::from_path(&json_path).unwrap(),
            ModelConfig::demo_wait()
        );

        let yaml_path = dir.path().join("model.yaml");
        std::fs::write(&yaml_path, "initial_balance: 100").unwrap();
        assert!(matches!(
            ModelConfig::from_path(&yaml_path),
            Err(ConfigError::UnsupportedFormat { .. })
        ));

        let missing = dir.path().join("missing.toml");
        assert!(matches!(
            ModelConfig::from_path(&missing),
            Err(ConfigError::Io { .. })
        ));
    }
}
