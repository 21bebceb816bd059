use serde::{Deserialize, Serialize};
use crate::config::{ParameterConfig, PopulationConfig};
use crate::models::{OneCompartmentModel, Patient};
use crate::error::PTAResult;
use super::LogNormalParams;

/// Empirical moments of a sampled cohort next to the configured targets.
#[derive(Debug, Serialize, Deserialize)]
pub struct PopulationSummary {
    pub n_patients: usize,
    pub fraction_unbound: ParameterSummary,
    pub volume_of_distribution: ParameterSummary,
    pub clearance: ParameterSummary,
    pub half_life: Moments,  // h, derived from CL and V
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ParameterSummary {
    pub target_mean: f64,
    pub target_sd: f64,
    pub implied_mean: f64,  // Moments of the fitted lognormal, before any bounds
    pub implied_sd: f64,
    pub mean: f64,
    pub sd: f64,
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Moments {
    pub mean: f64,
    pub sd: f64,
    pub min: f64,
    pub max: f64,
}

impl Moments {
    pub fn of(values: &[f64]) -> Self {
        Self {
            mean: mean(values),
            sd: std_dev(values),
            min: values.iter().copied().fold(f64::INFINITY, f64::min),
            max: values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        }
    }
}

impl ParameterSummary {
    fn new(config: &ParameterConfig, values: &[f64]) -> PTAResult<Self> {
        let implied = LogNormalParams::from_moments(config.mean, config.sd)?;
        let sampled = Moments::of(values);
        Ok(Self {
            target_mean: config.mean,
            target_sd: config.sd,
            implied_mean: implied.mean(),
            implied_sd: implied.sd(),
            mean: sampled.mean,
            sd: sampled.sd,
            min: sampled.min,
            max: sampled.max,
        })
    }

    /// Relative deviation of the empirical mean from the target.
    pub fn mean_error(&self) -> f64 {
        (self.mean - self.target_mean).abs() / self.target_mean
    }
}

impl PopulationSummary {
    pub fn from_patients(patients: &[Patient], population: &PopulationConfig) -> PTAResult<Self> {
        let fu: Vec<f64> = patients.iter().map(|p| p.fraction_unbound).collect();
        let v: Vec<f64> = patients.iter().map(|p| p.volume_of_distribution).collect();
        let cl: Vec<f64> = patients.iter().map(|p| p.clearance).collect();
        let half_lives = patients.iter()
            .map(|p| OneCompartmentModel::new(p).map(|m| m.half_life()))
            .collect::<PTAResult<Vec<f64>>>()?;

        Ok(Self {
            n_patients: patients.len(),
            fraction_unbound: ParameterSummary::new(&population.fraction_unbound, &fu)?,
            volume_of_distribution: ParameterSummary::new(&population.volume_of_distribution, &v)?,
            clearance: ParameterSummary::new(&population.clearance, &cl)?,
            half_life: Moments::of(&half_lives),
        })
    }
}

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

pub fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        0.0
    } else {
        let mean_val = mean(values);
        let variance = values.iter()
            .map(|v| (v - mean_val).powi(2))
            .sum::<f64>() / (values.len() - 1) as f64;
        variance.sqrt()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_mean_and_sd() {
        let values = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert_relative_eq!(mean(&values), 5.0);
        assert_relative_eq!(std_dev(&values), (32.0_f64 / 7.0).sqrt(), epsilon = 1e-12);
        assert_eq!(std_dev(&[3.0]), 0.0);
        assert_eq!(mean(&[]), 0.0);
    }

    #[test]
    fn test_summary_from_patients() {
        let population = PopulationConfig {
            fraction_unbound: ParameterConfig::new(0.1, 0.0),
            volume_of_distribution: ParameterConfig::new(50.0, 0.0),
            clearance: ParameterConfig::new(5.0, 0.0),
        };
        let patients = vec![Patient::new(0.1, 40.0, 4.0), Patient::new(0.1, 60.0, 6.0)];
        let summary = PopulationSummary::from_patients(&patients, &population).unwrap();

        assert_eq!(summary.n_patients, 2);
        assert_relative_eq!(summary.clearance.implied_mean, 5.0, epsilon = 1e-9);
        assert_relative_eq!(summary.clearance.implied_sd, 0.0, epsilon = 1e-9);
        // Both patients have k = 0.1/h
        assert_relative_eq!(summary.half_life.mean, 2.0_f64.ln() / 0.1, epsilon = 1e-9);
        assert_relative_eq!(summary.half_life.sd, 0.0, epsilon = 1e-9);
        assert_relative_eq!(summary.volume_of_distribution.mean, 50.0);
        assert_eq!(summary.volume_of_distribution.min, 40.0);
        assert_eq!(summary.clearance.max, 6.0);
        assert_relative_eq!(summary.clearance.mean_error(), 0.0);
    }
}
