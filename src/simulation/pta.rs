use serde::Serialize;
use crate::dosing::Regimen;
use crate::mic::same_mic;

/// Probability of target attainment for every (regimen, MIC) pair.
///
/// Values are fractions in [0, 1]. Rows follow the configured regimen order,
/// columns the ascending MIC list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PtaMatrix {
    regimens: Vec<Regimen>,
    mics: Vec<f64>,
    values: Vec<Vec<f64>>,
    patients: usize,
    target: f64,
}

/// One regimen's PTA-versus-MIC curve.
#[derive(Debug, Clone, Copy)]
pub struct PtaRow<'a> {
    pub regimen: &'a Regimen,
    pub mics: &'a [f64],
    pub values: &'a [f64],
}

impl PtaMatrix {
    pub(crate) fn new(
        regimens: Vec<Regimen>,
        mics: Vec<f64>,
        values: Vec<Vec<f64>>,
        patients: usize,
        target: f64,
    ) -> Self {
        debug_assert_eq!(regimens.len(), values.len());
        debug_assert!(values.iter().all(|row| row.len() == mics.len()));
        Self { regimens, mics, values, patients, target }
    }

    pub fn regimens(&self) -> &[Regimen] {
        &self.regimens
    }

    pub fn mics(&self) -> &[f64] {
        &self.mics
    }

    pub fn patients(&self) -> usize {
        self.patients
    }

    pub fn target(&self) -> f64 {
        self.target
    }

    pub fn row(&self, regimen_index: usize) -> Option<PtaRow<'_>> {
        Some(PtaRow {
            regimen: self.regimens.get(regimen_index)?,
            mics: &self.mics,
            values: self.values.get(regimen_index)?,
        })
    }

    pub fn rows(&self) -> impl Iterator<Item = PtaRow<'_>> {
        self.regimens.iter()
            .zip(&self.values)
            .map(move |(regimen, values)| PtaRow { regimen, mics: &self.mics, values })
    }

    pub fn get(&self, regimen_index: usize, mic: f64) -> Option<f64> {
        self.row(regimen_index)?.pta(mic)
    }
}

impl<'a> PtaRow<'a> {
    pub fn pta(&self, mic: f64) -> Option<f64> {
        self.mics.iter()
            .position(|&m| same_mic(m, mic))
            .map(|i| self.values[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = (f64, f64)> + 'a {
        let (mics, values) = (self.mics, self.values);
        mics.iter().copied().zip(values.iter().copied())
    }

    /// Highest MIC whose PTA reaches `goal`.
    pub fn breakpoint(&self, goal: f64) -> Option<f64> {
        self.iter()
            .filter(|&(_, pta)| pta >= goal)
            .map(|(mic, _)| mic)
            .last()
    }
}
