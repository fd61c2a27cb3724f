use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use crate::errors::{GroundingError, GroundingResult};
use crate::formula::{Formula, Parameters, LENGTH, RESISTIVITY};
use crate::spectrum::Spectrum;
use crate::units::{Frequency, Impedance, ZERO};

/// Frequencies at which a formula could not be evaluated, with the reason.
pub type FrequencyFailures = Vec<(Frequency, GroundingError)>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusType {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub system_type: String,
    pub voltage_level: f64,
    pub impedance_formula: Formula,
}

impl BusType {
    pub fn new(name: &str, system_type: &str, voltage_level: f64, impedance_formula: &str) -> GroundingResult<Self> {
        Ok(Self {
            name: name.to_string(),
            description: None,
            system_type: system_type.to_string(),
            voltage_level,
            impedance_formula: Formula::parse(impedance_formula)?,
        })
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BranchType {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub carry_current: bool,
    pub self_impedance_formula: Formula,
    pub mutual_impedance_formula: Formula,
}

impl BranchType {
    pub fn new(name: &str, carry_current: bool, self_impedance: &str, mutual_impedance: &str) -> GroundingResult<Self> {
        Ok(Self {
            name: name.to_string(),
            description: None,
            carry_current,
            self_impedance_formula: Formula::parse(self_impedance)?,
            mutual_impedance_formula: Formula::parse(mutual_impedance)?,
        })
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }
}

/// Evaluates `formula` at every frequency into `cache`. A missing variable
/// fails the whole refresh; arithmetic failures only drop that frequency.
fn refresh(
    formula: &Formula,
    frequencies: &[Frequency],
    parameters: &Parameters,
    cache: &mut Spectrum<Impedance>,
    owner: &str,
) -> GroundingResult<FrequencyFailures> {
    formula.require(parameters)?;
    cache.clear();
    let mut failures = Vec::new();
    for &f in frequencies {
        match formula.evaluate_at(f, parameters) {
            Ok(z) => {
                cache.insert(f, Impedance::from_evaluated(z));
            }
            Err(GroundingError::Arithmetic { context, frequency }) => failures.push((
                f,
                GroundingError::Arithmetic {
                    context: format!("{owner}: {context}"),
                    frequency,
                },
            )),
            Err(e) => return Err(e),
        }
    }
    Ok(failures)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bus {
    pub name: String,
    pub bus_type: BusType,
    #[serde(default)]
    pub description: Option<String>,
    pub specific_earth_resistance: f64,
    #[serde(default)]
    pub impedance: Spectrum<Impedance>,
}

impl Bus {
    pub fn new(name: &str, bus_type: BusType, specific_earth_resistance: f64) -> Self {
        Self {
            name: name.to_string(),
            bus_type,
            description: None,
            specific_earth_resistance,
            impedance: Spectrum::new(),
        }
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    pub fn parameters(&self) -> Parameters {
        Parameters::from([(RESISTIVITY.to_string(), self.specific_earth_resistance)])
    }

    pub fn impedance_at(&self, frequency: Frequency) -> Option<Impedance> {
        self.impedance.get(frequency).copied()
    }

    /// Fails when the impedance formula names a variable this bus cannot supply.
    pub(crate) fn check_formula(&self) -> GroundingResult<()> {
        self.bus_type.impedance_formula.require(&self.parameters())
    }

    pub(crate) fn refresh_impedance(&mut self, frequencies: &[Frequency]) -> GroundingResult<FrequencyFailures> {
        let parameters = self.parameters();
        let owner = format!("bus `{}`", self.name);
        refresh(&self.bus_type.impedance_formula, frequencies, &parameters, &mut self.impedance, &owner)
    }
}

fn default_coefficient() -> f64 {
    1.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Branch {
    pub name: String,
    pub branch_type: BranchType,
    #[serde(default)]
    pub description: Option<String>,
    pub from_bus: String,
    pub to_bus: String,
    pub length: f64,
    pub specific_earth_resistance: f64,
    #[serde(default = "default_coefficient")]
    pub parallel_coefficient: f64,
    #[serde(default)]
    pub self_impedance: Spectrum<Impedance>,
    #[serde(default)]
    pub mutual_impedance: Spectrum<Impedance>,
}

impl Branch {
    pub fn new(
        name: &str,
        branch_type: BranchType,
        from_bus: &str,
        to_bus: &str,
        length: f64,
        specific_earth_resistance: f64,
    ) -> Self {
        Self {
            name: name.to_string(),
            branch_type,
            description: None,
            from_bus: from_bus.to_string(),
            to_bus: to_bus.to_string(),
            length,
            specific_earth_resistance,
            parallel_coefficient: default_coefficient(),
            self_impedance: Spectrum::new(),
            mutual_impedance: Spectrum::new(),
        }
    }

    pub fn with_parallel_coefficient(mut self, coefficient: f64) -> Self {
        self.parallel_coefficient = coefficient;
        self
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    pub fn parameters(&self) -> Parameters {
        Parameters::from([
            (RESISTIVITY.to_string(), self.specific_earth_resistance),
            (LENGTH.to_string(), self.length),
        ])
    }

    pub fn self_impedance_at(&self, frequency: Frequency) -> Option<Impedance> {
        self.self_impedance.get(frequency).copied()
    }

    pub fn mutual_impedance_at(&self, frequency: Frequency) -> Option<Impedance> {
        self.mutual_impedance.get(frequency).copied()
    }

    pub(crate) fn check_formulas(&self) -> GroundingResult<()> {
        let parameters = self.parameters();
        self.branch_type.self_impedance_formula.require(&parameters)?;
        self.branch_type.mutual_impedance_formula.require(&parameters)
    }

    pub(crate) fn refresh_impedances(&mut self, frequencies: &[Frequency]) -> GroundingResult<FrequencyFailures> {
        let parameters = self.parameters();
        let owner = format!("branch `{}`", self.name);
        let mut failures = refresh(
            &self.branch_type.self_impedance_formula,
            frequencies,
            &parameters,
            &mut self.self_impedance,
            &owner,
        )?;
        failures.extend(refresh(
            &self.branch_type.mutual_impedance_formula,
            frequencies,
            &parameters,
            &mut self.mutual_impedance,
            &owner,
        )?);
        Ok(failures)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub bus: String,
    pub values: Spectrum<Complex64>,
}

impl Source {
    pub fn new(name: &str, bus: &str, values: Spectrum<Complex64>) -> Self {
        Self {
            name: name.to_string(),
            description: None,
            bus: bus.to_string(),
            values,
        }
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    /// Injected current at `frequency`; zero when the source defines none.
    pub fn current(&self, frequency: Frequency) -> Complex64 {
        self.values.get(frequency).copied().unwrap_or(ZERO)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fault {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub bus: String,
    pub scalings: Spectrum<f64>,
    #[serde(default)]
    active: bool,
}

impl Fault {
    pub fn new(name: &str, bus: &str, scalings: Spectrum<f64>) -> Self {
        Self {
            name: name.to_string(),
            description: None,
            bus: bus.to_string(),
            scalings,
            active: false,
        }
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    /// Scaling applied to every source at `frequency`; zero when undefined.
    pub fn scaling(&self, frequency: Frequency) -> f64 {
        self.scalings.get(frequency).copied().unwrap_or(0.0)
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub(crate) fn set_active(&mut self, active: bool) {
        self.active = active;
    }
}
