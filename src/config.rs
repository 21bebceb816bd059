pub mod parse;

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::fs::File;
use log::warn;
use crate::dosing::Regimen;
use crate::mic::{same_mic, MicDistribution, MicFrequency};
use crate::error::{PTAError, PTAResult};

/// Shortest and longest dosing interval accepted, in hours.
pub const MIN_INTERVAL_H: f64 = 1.0;
pub const MAX_INTERVAL_H: f64 = 24.0;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub population: PopulationConfig,
    pub regimens: Vec<Regimen>,
    pub mics: Vec<f64>,
    pub mic_distribution: MicDistribution,
    #[serde(default)]
    pub simulation: SimulationConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PopulationConfig {
    pub fraction_unbound: ParameterConfig,
    pub volume_of_distribution: ParameterConfig,  // L
    pub clearance: ParameterConfig,               // L/h
}

/// Arithmetic-scale description of one lognormally distributed PK parameter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParameterConfig {
    pub mean: f64,
    pub sd: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bounds: Option<(f64, f64)>, // Sampled values are clamped into [lower, upper]
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub patients: usize,
    pub target: f64,              // Required %fT>MIC
    pub seed: Option<u64>,
    pub attainment_goal: f64,     // PTA/CFR fraction regarded as adequate
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputScale {
    Fraction,
    Percent,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub scale: OutputScale,
}

impl ParameterConfig {
    pub fn new(mean: f64, sd: f64) -> Self {
        Self { mean, sd, bounds: None }
    }

    pub fn with_bounds(mut self, lower: f64, upper: f64) -> Self {
        self.bounds = Some((lower, upper));
        self
    }

    fn validate(&self, name: &str) -> PTAResult<()> {
        if !self.mean.is_finite() || self.mean <= 0.0 {
            return Err(PTAError::invalid_parameter(
                name,
                format!("mean must be positive and finite, got {}", self.mean),
            ));
        }
        if !self.sd.is_finite() || self.sd < 0.0 {
            return Err(PTAError::invalid_parameter(
                name,
                format!("standard deviation must be non-negative, got {}", self.sd),
            ));
        }
        if let Some((lower, upper)) = self.bounds {
            if !(lower > 0.0 && lower < upper && upper.is_finite()) {
                return Err(PTAError::invalid_parameter(
                    name,
                    format!("bounds must satisfy 0 < lower < upper, got ({}, {})", lower, upper),
                ));
            }
        }
        Ok(())
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            patients: 5000,
            target: 55.0,
            seed: None,
            attainment_goal: 0.95,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self { scale: OutputScale::Fraction }
    }
}

impl OutputScale {
    pub fn apply(self, probability: f64) -> f64 {
        match self {
            OutputScale::Fraction => probability,
            OutputScale::Percent => probability * 100.0,
        }
    }

    pub fn unit(self) -> &'static str {
        match self {
            OutputScale::Fraction => "fraction",
            OutputScale::Percent => "%",
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let mic_distribution = MicDistribution::from_sorted(vec![
            MicFrequency::new(0.125, 0.0),
            MicFrequency::new(0.25, 0.0),
            MicFrequency::new(0.5, 0.0),
            MicFrequency::new(1.0, 0.011),
            MicFrequency::new(2.0, 0.338),
            MicFrequency::new(4.0, 0.599),
            MicFrequency::new(8.0, 0.023),
            MicFrequency::new(16.0, 0.026),
            MicFrequency::new(32.0, 0.003),
        ]);

        Self {
            population: PopulationConfig {
                fraction_unbound: ParameterConfig::new(0.073, 0.032),
                volume_of_distribution: ParameterConfig::new(7.8, 5.4),
                clearance: ParameterConfig::new(0.83, 0.83),
            },
            regimens: vec![Regimen::new(2000.0, 24.0)],
            mics: vec![0.125, 0.25, 0.5, 1.0, 2.0, 4.0, 8.0, 16.0, 32.0],
            mic_distribution,
            simulation: SimulationConfig::default(),
            output: OutputConfig::default(),
        }
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> PTAResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Config = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> PTAResult<()> {
        let file = File::create(path)?;
        serde_json::to_writer_pretty(file, self)?;
        Ok(())
    }

    /// Checks every invariant and puts the MIC list into ascending order.
    pub fn validate(&mut self) -> PTAResult<()> {
        self.population.fraction_unbound.validate("fraction_unbound")?;
        self.population.volume_of_distribution.validate("volume_of_distribution")?;
        self.population.clearance.validate("clearance")?;

        if self.population.fraction_unbound.mean > 1.0 {
            warn!(
                "Mean fraction unbound {} exceeds 1; free concentrations will exceed total",
                self.population.fraction_unbound.mean
            );
        }

        self.validate_regimens()?;
        self.validate_mics()?;
        self.mic_distribution.validate()?;
        self.mic_distribution.check_against(&self.mics)?;

        let sim = &self.simulation;
        if sim.patients == 0 {
            return Err(PTAError::Validation(
                "At least one patient must be simulated".to_string()
            ));
        }
        if !(0.0..=100.0).contains(&sim.target) {
            return Err(PTAError::Validation(
                format!("Target %fT>MIC must lie in [0, 100], got {}", sim.target)
            ));
        }
        if !(sim.attainment_goal > 0.0 && sim.attainment_goal <= 1.0) {
            return Err(PTAError::Validation(
                format!("Attainment goal must lie in (0, 1], got {}", sim.attainment_goal)
            ));
        }

        Ok(())
    }

    fn validate_regimens(&self) -> PTAResult<()> {
        if self.regimens.is_empty() {
            return Err(PTAError::Validation(
                "At least one dosing regimen must be specified".to_string()
            ));
        }

        for (i, regimen) in self.regimens.iter().enumerate() {
            if !regimen.dose.is_finite() || regimen.dose <= 0.0 {
                return Err(PTAError::Validation(
                    format!("Dose must be positive, got {} mg", regimen.dose)
                ));
            }
            if !(MIN_INTERVAL_H..=MAX_INTERVAL_H).contains(&regimen.interval) {
                return Err(PTAError::Validation(format!(
                    "Dosing interval must be between {} and {} h, got {} h",
                    MIN_INTERVAL_H, MAX_INTERVAL_H, regimen.interval
                )));
            }
            if self.regimens[..i].contains(regimen) {
                return Err(PTAError::Validation(
                    format!("Duplicate regimen {}", regimen.label())
                ));
            }
        }

        Ok(())
    }

    fn validate_mics(&mut self) -> PTAResult<()> {
        if self.mics.is_empty() {
            return Err(PTAError::Validation(
                "At least one MIC value must be specified".to_string()
            ));
        }
        if let Some(&bad) = self.mics.iter().find(|m| !m.is_finite() || **m <= 0.0) {
            return Err(PTAError::Validation(
                format!("MIC values must be positive, got {}", bad)
            ));
        }

        self.mics.sort_by(f64::total_cmp);
        if let Some(pair) = self.mics.windows(2).find(|w| same_mic(w[0], w[1])) {
            return Err(PTAError::Validation(
                format!("Duplicate MIC value {}", pair[0])
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let mut config = Config::default();
        config.validate().unwrap();
        assert_eq!(config.mics.len(), 9);
        assert_eq!(config.simulation.patients, 5000);
    }

    #[test]
    fn test_non_positive_mean_rejected() {
        let mut config = Config::default();
        config.population.clearance = ParameterConfig::new(0.0, 0.1);
        let err = config.validate().unwrap_err();
        assert!(matches!(err, PTAError::InvalidParameter { ref name, .. } if name == "clearance"));
    }

    #[test]
    fn test_interval_out_of_range_rejected() {
        let mut config = Config::default();
        config.regimens = vec![Regimen::new(1000.0, 48.0)];
        assert!(matches!(config.validate(), Err(PTAError::Validation(_))));
    }

    #[test]
    fn test_duplicate_regimen_rejected() {
        let mut config = Config::default();
        config.regimens = vec![Regimen::new(1000.0, 12.0), Regimen::new(1000.0, 12.0)];
        assert!(matches!(config.validate(), Err(PTAError::Validation(_))));
    }

    #[test]
    fn test_mics_sorted_on_validation() {
        let mut config = Config::default();
        config.mics = vec![32.0, 1.0, 16.0, 0.5, 0.125, 8.0, 2.0, 0.25, 4.0];
        config.validate().unwrap();
        assert_eq!(config.mics, vec![0.125, 0.25, 0.5, 1.0, 2.0, 4.0, 8.0, 16.0, 32.0]);
    }

    #[test]
    fn test_distribution_mic_missing_from_list() {
        let mut config = Config::default();
        config.mics = vec![1.0, 2.0, 4.0];
        assert!(matches!(config.validate(), Err(PTAError::MismatchedMICSet { .. })));
    }

    #[test]
    fn test_bad_bounds_rejected() {
        let mut config = Config::default();
        config.population.fraction_unbound = ParameterConfig::new(0.1, 0.05).with_bounds(0.5, 0.2);
        assert!(matches!(config.validate(), Err(PTAError::InvalidParameter { .. })));
    }

    #[test]
    fn test_json_round_trip_keeps_distribution_validated() {
        let json = r#"{
            "population": {
                "fraction_unbound": {"mean": 0.1, "sd": 0.02},
                "volume_of_distribution": {"mean": 50.0, "sd": 10.0},
                "clearance": {"mean": 5.0, "sd": 1.0, "bounds": [0.5, 20.0]}
            },
            "regimens": [{"dose": 2000.0, "interval": 24.0}],
            "mics": [1.0, 2.0],
            "mic_distribution": [{"mic": 1.0, "fraction": 0.4}, {"mic": 2.0, "fraction": 0.5}]
        }"#;
        let parsed: Result<Config, _> = serde_json::from_str(json);
        assert!(parsed.is_err());

        let fixed = json.replace("0.5}]", "0.6}]");
        let mut config: Config = serde_json::from_str(&fixed).unwrap();
        config.validate().unwrap();
        assert_eq!(config.population.clearance.bounds, Some((0.5, 20.0)));
        assert_eq!(config.simulation.target, 55.0);
        assert_eq!(config.output.scale, OutputScale::Fraction);
    }

    #[test]
    fn test_bundled_config_loads() {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/configs/four_regimens.json");
        let config = Config::from_file(path).unwrap();
        assert_eq!(config.regimens.len(), 4);
        assert_eq!(config.simulation.seed, Some(20240101));
        assert_eq!(config.output.scale, OutputScale::Percent);
        assert_eq!(config.population.fraction_unbound.bounds, Some((0.001, 1.0)));
    }
}
