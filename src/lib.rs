//! Grounding analysis of power networks under fault conditions.
//!
//! Buses and branches carry impedance formulas over earth resistivity,
//! frequency and length. For an active fault the [`FaultSolver`] computes,
//! per frequency, the reduction factor (the share of fault current
//! returning through soil), the grounding impedance at the fault bus, and
//! the resulting earth potential rise and currents across the network.

pub mod component;
pub mod errors;
pub mod formula;
pub mod graph;
pub mod network;
pub mod paths;
pub mod reduce;
pub mod result;
pub mod solver;
pub mod spectrum;
pub mod units;

pub use component::{Branch, BranchType, Bus, BusType, Fault, Source};
pub use errors::{ErrorKind, FormulaError, GroundingError, GroundingResult};
pub use formula::{evaluate, Formula, Parameters};
pub use network::Network;
pub use paths::{Path, PathSegment};
pub use result::{FaultResult, ResultBranch, ResultBus, ResultGroundingImpedance, ResultReductionFactor, SolveWarning};
pub use solver::{run_fault, FaultSolver};
pub use spectrum::Spectrum;
pub use units::{Frequency, Impedance};
