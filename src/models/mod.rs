pub mod one_compartment;

use serde::{Deserialize, Serialize};

pub use one_compartment::OneCompartmentModel;

/// PK parameters of one simulated patient.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Patient {
    pub fraction_unbound: f64,
    pub volume_of_distribution: f64,  // L
    pub clearance: f64,               // L/h
}

impl Patient {
    pub fn new(fraction_unbound: f64, volume_of_distribution: f64, clearance: f64) -> Self {
        Self {
            fraction_unbound,
            volume_of_distribution,
            clearance,
        }
    }
}
