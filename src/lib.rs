//! Monte Carlo probability of target attainment (PTA) and cumulative fraction
//! of response (CFR) for antimicrobial dosing regimens.
//!
//! Population PK parameters are sampled from lognormal distributions, each
//! simulated patient's %fT>MIC is computed with a one-compartment model, and
//! the resulting PTA matrix is weighted by an MIC prevalence distribution.

pub mod config;
pub mod dosing;
pub mod error;
pub mod mic;
pub mod models;
pub mod output;
pub mod simulation;

pub use crate::config::Config;
pub use crate::error::{PTAError, PTAResult};
pub use crate::simulation::{PtaSimulator, SimulationResults};
