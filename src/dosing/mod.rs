use serde::{Deserialize, Serialize};
use std::fmt;

/// A fixed dose repeated every `interval` hours.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Regimen {
    pub dose: f64,      // mg
    pub interval: f64,  // h
}

impl Regimen {
    pub fn new(dose: f64, interval: f64) -> Self {
        Self { dose, interval }
    }

    pub fn label(&self) -> String {
        format!("{} mg q{}h", self.dose, self.interval)
    }

    pub fn daily_dose(&self) -> f64 {
        self.dose * 24.0 / self.interval
    }
}

impl fmt::Display for Regimen {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}
