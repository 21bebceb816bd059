use serde::Serialize;
use crate::dosing::Regimen;
use crate::mic::MicDistribution;
use crate::error::{ensure_finite, PTAError, PTAResult};
use super::{PtaMatrix, PtaRow};

/// CFR = sum over MICs of PTA(MIC) x prevalence(MIC).
///
/// The row may cover more MICs than the distribution weights, but not fewer.
pub fn cumulative_fraction_response(row: &PtaRow<'_>, distribution: &MicDistribution) -> PTAResult<f64> {
    let mut cfr = 0.0;
    for entry in distribution.entries() {
        let pta = row.pta(entry.mic)
            .ok_or(PTAError::MismatchedMICSet { mic: entry.mic })?;
        cfr += pta * entry.fraction;
    }
    ensure_finite("CFR", cfr)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CfrEntry {
    pub regimen: Regimen,
    pub label: String,
    pub cfr: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CfrResult {
    entries: Vec<CfrEntry>,
}

impl CfrResult {
    pub fn from_matrix(matrix: &PtaMatrix, distribution: &MicDistribution) -> PTAResult<Self> {
        let entries = matrix.rows()
            .map(|row| {
                Ok(CfrEntry {
                    regimen: *row.regimen,
                    label: row.regimen.label(),
                    cfr: cumulative_fraction_response(&row, distribution)?,
                })
            })
            .collect::<PTAResult<Vec<_>>>()?;

        Ok(Self { entries })
    }

    pub fn entries(&self) -> &[CfrEntry] {
        &self.entries
    }
}
