//! MIC prevalence distribution.
//!
//! A [`MicDistribution`] is validated when it is built (or deserialized), so
//! the CFR aggregator can trust that fractions are non-negative and sum to one.

use serde::{Deserialize, Serialize};
use crate::error::{PTAError, PTAResult};

/// Allowed deviation of the summed prevalence fractions from 1.0.
pub const DISTRIBUTION_TOLERANCE: f64 = 1e-6;

const MIC_RELATIVE_TOLERANCE: f64 = 1e-9;

/// Two MIC values refer to the same dilution step.
pub fn same_mic(a: f64, b: f64) -> bool {
    (a - b).abs() <= MIC_RELATIVE_TOLERANCE * a.abs().max(b.abs())
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MicFrequency {
    pub mic: f64,       // mg/L
    pub fraction: f64,  // Prevalence among isolates
}

impl MicFrequency {
    pub fn new(mic: f64, fraction: f64) -> Self {
        Self { mic, fraction }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<MicFrequency>", into = "Vec<MicFrequency>")]
pub struct MicDistribution {
    entries: Vec<MicFrequency>,
}

impl MicDistribution {
    pub fn new(mut entries: Vec<MicFrequency>) -> PTAResult<Self> {
        entries.sort_by(|a, b| a.mic.total_cmp(&b.mic));
        let distribution = Self { entries };
        distribution.validate()?;
        Ok(distribution)
    }

    /// Builds a distribution from entries already known to be valid and ordered.
    pub(crate) fn from_sorted(entries: Vec<MicFrequency>) -> Self {
        Self { entries }
    }

    pub fn validate(&self) -> PTAResult<()> {
        if self.entries.is_empty() {
            return Err(PTAError::MalformedDistribution(
                "distribution has no MIC entries".to_string()
            ));
        }

        for entry in &self.entries {
            if !entry.mic.is_finite() || entry.mic <= 0.0 {
                return Err(PTAError::MalformedDistribution(
                    format!("MIC must be positive, got {}", entry.mic)
                ));
            }
            if !entry.fraction.is_finite() || entry.fraction < 0.0 {
                return Err(PTAError::MalformedDistribution(
                    format!("fraction for MIC {} must be non-negative, got {}", entry.mic, entry.fraction)
                ));
            }
        }

        if let Some(pair) = self.entries.windows(2).find(|w| same_mic(w[0].mic, w[1].mic)) {
            return Err(PTAError::MalformedDistribution(
                format!("MIC {} listed more than once", pair[0].mic)
            ));
        }

        let total = self.total();
        if (total - 1.0).abs() > DISTRIBUTION_TOLERANCE {
            return Err(PTAError::MalformedDistribution(
                format!("fractions sum to {}, expected 1.0", total)
            ));
        }

        Ok(())
    }

    /// Every weighted MIC must be one of the simulated MICs.
    pub fn check_against(&self, mics: &[f64]) -> PTAResult<()> {
        match self.entries.iter().find(|e| !mics.iter().any(|&m| same_mic(m, e.mic))) {
            Some(missing) => Err(PTAError::MismatchedMICSet { mic: missing.mic }),
            None => Ok(()),
        }
    }

    pub fn entries(&self) -> &[MicFrequency] {
        &self.entries
    }

    pub fn fraction(&self, mic: f64) -> Option<f64> {
        self.entries.iter()
            .find(|e| same_mic(e.mic, mic))
            .map(|e| e.fraction)
    }

    pub fn total(&self) -> f64 {
        self.entries.iter().map(|e| e.fraction).sum()
    }

    /// MIC50 / MIC90 style quantile: smallest MIC whose cumulative prevalence reaches `q`.
    pub fn quantile(&self, q: f64) -> Option<f64> {
        let mut cumulative = 0.0;
        for entry in &self.entries {
            cumulative += entry.fraction;
            if cumulative + DISTRIBUTION_TOLERANCE >= q {
                return Some(entry.mic);
            }
        }
        None
    }
}

impl TryFrom<Vec<MicFrequency>> for MicDistribution {
    type Error = PTAError;

    fn try_from(entries: Vec<MicFrequency>) -> PTAResult<Self> {
        MicDistribution::new(entries)
    }
}

impl From<MicDistribution> for Vec<MicFrequency> {
    fn from(distribution: MicDistribution) -> Self {
        distribution.entries
    }
}
