use rand::Rng;
use rand_distr::{Distribution, LogNormal};
use serde::Serialize;
use crate::config::{ParameterConfig, PopulationConfig};
use crate::models::Patient;
use crate::error::{PTAError, PTAResult};

/// Location and scale of the normal variable underlying a lognormal distribution.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LogNormalParams {
    pub location: f64,
    pub scale: f64,
}

impl LogNormalParams {
    /// Moment matching: exp(Normal(location, scale)) has the given arithmetic mean and SD.
    pub fn from_moments(mean: f64, sd: f64) -> PTAResult<Self> {
        if !mean.is_finite() || mean <= 0.0 {
            return Err(PTAError::invalid_parameter(
                "mean",
                format!("lognormal mean must be positive, got {}", mean),
            ));
        }
        if !sd.is_finite() || sd < 0.0 {
            return Err(PTAError::invalid_parameter(
                "sd",
                format!("standard deviation must be non-negative, got {}", sd),
            ));
        }

        let cv = sd / mean;
        let variance_ratio = 1.0 + cv * cv;
        let scale = variance_ratio.ln().sqrt();
        let location = mean.ln() - scale * scale / 2.0;

        if !scale.is_finite() || !location.is_finite() {
            return Err(PTAError::invalid_parameter(
                "sd",
                format!("coefficient of variation {} is too large for a lognormal fit", cv),
            ));
        }

        Ok(Self { location, scale })
    }

    /// Arithmetic mean implied by these parameters.
    pub fn mean(&self) -> f64 {
        (self.location + self.scale * self.scale / 2.0).exp()
    }

    pub fn sd(&self) -> f64 {
        let s2 = self.scale * self.scale;
        ((s2.exp() - 1.0) * (2.0 * self.location + s2).exp()).sqrt()
    }

    pub fn distribution(&self) -> PTAResult<LogNormal<f64>> {
        LogNormal::new(self.location, self.scale).map_err(|_| PTAError::Random)
    }
}

/// Draws one PK parameter, clamping into optional bounds.
#[derive(Debug, Clone)]
pub struct ParameterSampler {
    params: LogNormalParams,
    distribution: LogNormal<f64>,
    bounds: Option<(f64, f64)>,
}

impl ParameterSampler {
    pub fn new(name: &str, config: &ParameterConfig) -> PTAResult<Self> {
        let params = LogNormalParams::from_moments(config.mean, config.sd).map_err(|e| match e {
            PTAError::InvalidParameter { reason, .. } => PTAError::invalid_parameter(name, reason),
            other => other,
        })?;

        Ok(Self {
            params,
            distribution: params.distribution()?,
            bounds: config.bounds,
        })
    }

    pub fn params(&self) -> LogNormalParams {
        self.params
    }

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        let value = self.distribution.sample(rng);
        match self.bounds {
            Some((lower, upper)) => value.max(lower).min(upper),
            None => value,
        }
    }
}

/// Independent lognormal draws of fraction unbound, volume and clearance.
#[derive(Debug, Clone)]
pub struct PatientSampler {
    fraction_unbound: ParameterSampler,
    volume_of_distribution: ParameterSampler,
    clearance: ParameterSampler,
}

impl PatientSampler {
    pub fn new(population: &PopulationConfig) -> PTAResult<Self> {
        Ok(Self {
            fraction_unbound: ParameterSampler::new("fraction_unbound", &population.fraction_unbound)?,
            volume_of_distribution: ParameterSampler::new(
                "volume_of_distribution",
                &population.volume_of_distribution,
            )?,
            clearance: ParameterSampler::new("clearance", &population.clearance)?,
        })
    }

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Patient {
        Patient {
            fraction_unbound: self.fraction_unbound.sample(rng),
            volume_of_distribution: self.volume_of_distribution.sample(rng),
            clearance: self.clearance.sample(rng),
        }
    }

    pub fn sample_cohort<R: Rng + ?Sized>(&self, n: usize, rng: &mut R) -> Vec<Patient> {
        (0..n).map(|_| self.sample(rng)).collect()
    }

    pub fn parameters(&self) -> [(&'static str, LogNormalParams); 3] {
        [
            ("fraction_unbound", self.fraction_unbound.params()),
            ("volume_of_distribution", self.volume_of_distribution.params()),
            ("clearance", self.clearance.params()),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use crate::simulation::population::{mean, std_dev};

    #[test]
    fn test_moment_matching_formulas() {
        let params = LogNormalParams::from_moments(7.8, 5.4).unwrap();
        let ratio: f64 = 1.0 + 5.4 * 5.4 / (7.8 * 7.8);
        assert_relative_eq!(params.scale, ratio.ln().sqrt(), epsilon = 1e-12);
        assert_relative_eq!(params.location, 7.8_f64.ln() - ratio.ln() / 2.0, epsilon = 1e-12);
        assert_relative_eq!(params.mean(), 7.8, epsilon = 1e-9);
        assert_relative_eq!(params.sd(), 5.4, epsilon = 1e-9);
    }

    #[test]
    fn test_zero_sd_is_degenerate() {
        let params = LogNormalParams::from_moments(50.0, 0.0).unwrap();
        assert_eq!(params.scale, 0.0);
        assert_relative_eq!(params.location, 50.0_f64.ln(), epsilon = 1e-12);

        let sampler = ParameterSampler::new("volume_of_distribution", &ParameterConfig::new(50.0, 0.0)).unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..100 {
            assert_relative_eq!(sampler.sample(&mut rng), 50.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_non_positive_mean_rejected() {
        assert!(matches!(
            LogNormalParams::from_moments(0.0, 1.0),
            Err(PTAError::InvalidParameter { .. })
        ));
        assert!(matches!(
            LogNormalParams::from_moments(-2.0, 1.0),
            Err(PTAError::InvalidParameter { .. })
        ));

        let err = ParameterSampler::new("clearance", &ParameterConfig::new(-1.0, 0.1)).unwrap_err();
        assert!(matches!(err, PTAError::InvalidParameter { ref name, .. } if name == "clearance"));
    }

    #[test]
    fn test_overflowing_sd_names_parameter() {
        let err = ParameterSampler::new("clearance", &ParameterConfig::new(1.0, 1e200)).unwrap_err();
        assert!(matches!(err, PTAError::InvalidParameter { ref name, .. } if name == "clearance"));

        let err = LogNormalParams::from_moments(1e-200, 1.0).unwrap_err();
        assert!(matches!(err, PTAError::InvalidParameter { .. }));
    }

    #[test]
    fn test_sampled_moments_match_targets() {
        let sampler = ParameterSampler::new("clearance", &ParameterConfig::new(0.83, 0.83)).unwrap();
        let mut rng = StdRng::seed_from_u64(42);
        let draws: Vec<f64> = (0..200_000).map(|_| sampler.sample(&mut rng)).collect();

        assert!(draws.iter().all(|&x| x > 0.0));
        assert_relative_eq!(mean(&draws), 0.83, max_relative = 0.02);
        assert_relative_eq!(std_dev(&draws), 0.83, max_relative = 0.05);
    }

    #[test]
    fn test_bounds_clamp_samples() {
        let config = ParameterConfig::new(0.5, 0.5).with_bounds(0.2, 1.0);
        let sampler = ParameterSampler::new("fraction_unbound", &config).unwrap();
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..10_000 {
            let value = sampler.sample(&mut rng);
            assert!((0.2..=1.0).contains(&value));
        }
    }

    #[test]
    fn test_patient_sampler_is_reproducible() {
        let population = crate::config::Config::default().population;
        let sampler = PatientSampler::new(&population).unwrap();

        let a = sampler.sample_cohort(50, &mut StdRng::seed_from_u64(99));
        let b = sampler.sample_cohort(50, &mut StdRng::seed_from_u64(99));
        let c = sampler.sample_cohort(50, &mut StdRng::seed_from_u64(100));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
