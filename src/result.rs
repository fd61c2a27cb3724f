use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use crate::spectrum::Spectrum;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultBus {
    pub name: String,
    /// Earth potential rise, RMS over the solved frequencies.
    pub uepr: f64,
    /// Earth current, RMS over the solved frequencies.
    pub ia: f64,
    pub uepr_freq: Spectrum<Complex64>,
    pub ia_freq: Spectrum<Complex64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultBranch {
    pub name: String,
    /// Shield current, RMS over the solved frequencies.
    pub i_s: f64,
    pub i_s_freq: Spectrum<Complex64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultReductionFactor {
    pub fault_bus: String,
    pub values: Spectrum<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultGroundingImpedance {
    pub fault_bus: String,
    pub values: Spectrum<Complex64>,
}

/// Conditions that did not stop a run but left part of it uncomputed or suspect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SolveWarning {
    UnreachableSource { source: String, bus: String },
    FrequencyFailed { frequency: f64, reason: String },
    ReductionFactorOutOfRange { frequency: f64, value: f64 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaultResult {
    pub fault: String,
    pub fault_bus: String,
    pub buses: Vec<ResultBus>,
    pub branches: Vec<ResultBranch>,
    pub reduction_factor: ResultReductionFactor,
    pub grounding_impedance: ResultGroundingImpedance,
    #[serde(default)]
    pub warnings: Vec<SolveWarning>,
}

impl FaultResult {
    pub fn bus(&self, name: &str) -> Option<&ResultBus> {
        self.buses.iter().find(|bus| bus.name == name)
    }

    pub fn branch(&self, name: &str) -> Option<&ResultBranch> {
        self.branches.iter().find(|branch| branch.name == name)
    }

    pub fn reduction_factor_at(&self, hz: f64) -> Option<f64> {
        self.reduction_factor.values.get_hz(hz).copied()
    }

    pub fn grounding_impedance_at(&self, hz: f64) -> Option<Complex64> {
        self.grounding_impedance.values.get_hz(hz).copied()
    }
}

/// Root-sum-square of the magnitudes in `values`.
pub(crate) fn rms(values: &Spectrum<Complex64>) -> f64 {
    values.values().map(|z| z.norm_sqr()).sum::<f64>().sqrt()
}
