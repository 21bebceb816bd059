use super::Patient;
use crate::dosing::Regimen;
use crate::error::{ensure_finite, PTAError, PTAResult};

/// One-compartment model with first-order elimination and instantaneous input,
/// evaluated on unbound drug.
#[derive(Debug, Clone)]
pub struct OneCompartmentModel {
    fu: f64,
    v: f64,
    ke: f64,
}

impl OneCompartmentModel {
    pub fn new(patient: &Patient) -> PTAResult<Self> {
        let Patient { fraction_unbound: fu, volume_of_distribution: v, clearance: cl } = *patient;

        if !fu.is_finite() || fu < 0.0 {
            return Err(PTAError::InvalidPKParameter(
                format!("fraction unbound must be non-negative, got {}", fu)
            ));
        }
        if !v.is_finite() || v <= 0.0 {
            return Err(PTAError::InvalidPKParameter(
                format!("volume of distribution must be positive, got {} L", v)
            ));
        }

        let ke = cl / v;
        if !ke.is_finite() || ke <= 0.0 {
            return Err(PTAError::InvalidPKParameter(
                format!("elimination rate constant must be positive, got {} 1/h (CL={}, V={})", ke, cl, v)
            ));
        }

        Ok(Self { fu, v, ke })
    }

    pub fn elimination_rate(&self) -> f64 {
        self.ke
    }

    pub fn half_life(&self) -> f64 {
        std::f64::consts::LN_2 / self.ke
    }

    /// Free concentration immediately after a dose.
    pub fn peak_free_concentration(&self, dose: f64) -> f64 {
        dose * self.fu / self.v
    }

    /// Hours after the dose during which the free concentration stays above `mic`.
    pub fn time_above(&self, dose: f64, mic: f64) -> f64 {
        let c0 = self.peak_free_concentration(dose);
        if c0 <= mic {
            return 0.0;
        }
        (c0 / mic).ln() / self.ke
    }

    /// %fT>MIC over one dosing interval, in [0, 100].
    pub fn ft_above_mic(&self, regimen: &Regimen, mic: f64) -> PTAResult<f64> {
        if !mic.is_finite() || mic <= 0.0 {
            return Err(PTAError::invalid_parameter("mic", format!("must be positive, got {}", mic)));
        }
        if !regimen.dose.is_finite() || regimen.dose <= 0.0 {
            return Err(PTAError::invalid_parameter("dose", format!("must be positive, got {}", regimen.dose)));
        }
        if !regimen.interval.is_finite() || regimen.interval <= 0.0 {
            return Err(PTAError::invalid_parameter(
                "interval",
                format!("must be positive, got {}", regimen.interval),
            ));
        }

        let t_mic = self.time_above(regimen.dose, mic);
        let percent = (100.0 * t_mic / regimen.interval).clamp(0.0, 100.0);
        ensure_finite("%fT>MIC", percent)
    }
}
