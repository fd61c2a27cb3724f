use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use crate::errors::{GroundingError, GroundingResult};

pub const ZERO: Complex64 = Complex64::new(0.0, 0.0);
pub const ONE: Complex64 = Complex64::new(1.0, 0.0);

/// Analysis frequency in hertz. Totally ordered so it can key a map.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Frequency(f64);

impl Frequency {
    pub fn new(hz: f64) -> Result<Self, GroundingError> {
        match hz >= 0.0 && hz.is_finite() {
            // `+ 0.0` folds -0.0 into 0.0
            true => Ok(Self(hz + 0.0)),
            false => Err(GroundingError::InvalidFrequency(hz)),
        }
    }

    pub fn hz(self) -> f64 {
        self.0
    }

    pub fn list(values: &[f64]) -> Result<Vec<Self>, GroundingError> {
        values.iter().map(|&hz| Self::new(hz)).collect()
    }
}

impl TryFrom<f64> for Frequency {
    type Error = GroundingError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Frequency> for f64 {
    fn from(value: Frequency) -> f64 {
        value.0
    }
}

impl PartialEq for Frequency {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Frequency {}

impl PartialOrd for Frequency {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Frequency {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl Hash for Frequency {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.to_bits().hash(state);
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Evaluated impedance. `Open` is the not-a-number sentinel: no conduction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Impedance {
    Finite(Complex64),
    Open,
}

impl Impedance {
    /// Maps an evaluated formula value onto an impedance; any NaN component means open.
    pub fn from_evaluated(z: Complex64) -> Self {
        match z.re.is_nan() || z.im.is_nan() {
            true => Self::Open,
            false => Self::Finite(z),
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open)
    }

    pub fn finite(&self) -> Option<Complex64> {
        match self {
            Self::Finite(z) => Some(*z),
            Self::Open => None,
        }
    }
}

/// Division that refuses a zero-magnitude divisor instead of producing inf/NaN.
pub fn checked_div(numerator: Complex64, denominator: Complex64, context: &str) -> GroundingResult<Complex64> {
    match denominator.norm() == 0.0 {
        true => Err(GroundingError::arithmetic(format!("division by zero in {context}"))),
        false => Ok(numerator / denominator),
    }
}

pub fn combine_series(a: Impedance, b: Impedance) -> Impedance {
    match (a, b) {
        (Impedance::Finite(za), Impedance::Finite(zb)) => Impedance::Finite(za + zb),
        _ => Impedance::Open,
    }
}

pub fn combine_series_many(impedances: &[Impedance]) -> Impedance {
    impedances
        .iter()
        .fold(Impedance::Finite(ZERO), |acc, &z| combine_series(acc, z))
}

pub fn combine_parallel(a: Impedance, b: Impedance) -> GroundingResult<Impedance> {
    combine_parallel_many(&[a, b])
}

/// Reciprocal-sum rule. Open branches drop out; a lone finite branch is
/// returned untouched so no rounding is introduced.
pub fn combine_parallel_many(impedances: &[Impedance]) -> GroundingResult<Impedance> {
    let finite: Vec<Complex64> = impedances.iter().filter_map(Impedance::finite).collect();
    match finite.as_slice() {
        [] => Ok(Impedance::Open),
        [z] => Ok(Impedance::Finite(*z)),
        many => {
            let mut admittance_sum = ZERO;
            for &z in many {
                admittance_sum += checked_div(ONE, z, "parallel combination")?;
            }
            checked_div(ONE, admittance_sum, "parallel combination").map(Impedance::Finite)
        }
    }
}
