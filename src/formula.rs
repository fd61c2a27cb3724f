//! Impedance formulas.
//!
//! A formula is compiled once into an expression tree and evaluated per
//! frequency. Recognized names: `rho`, `f`, `l`, the imaginary unit `j`
//! (or `I`), the constants `pi` and `E`, and the functions `sqrt`, `exp`,
//! `ln`/`log` and `abs`. Any other identifier is a free parameter that
//! the caller supplies. The whole-formula text `NaN` marks a
//! non-conducting element.

use chumsky::error::SimpleReason;
use chumsky::prelude::*;
use miette::SourceSpan;
use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::f64::consts::{E, PI};
use crate::errors::{FormulaError, GroundingError, GroundingResult};
use crate::spectrum::Spectrum;
use crate::units::{Frequency, ZERO, ONE};

/// Values for the free variables of a formula, held constant across frequencies.
pub type Parameters = HashMap<String, f64>;

pub const RESISTIVITY: &str = "rho";
pub const LENGTH: &str = "l";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Function {
    Sqrt,
    Exp,
    Ln,
    Abs,
}

impl Function {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "sqrt" => Some(Self::Sqrt),
            "exp" => Some(Self::Exp),
            "ln" | "log" => Some(Self::Ln),
            "abs" => Some(Self::Abs),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    ImaginaryUnit,
    Frequency,
    Variable(String),
    Neg(Box<Expr>),
    Binary(BinOp, Box<Expr>, Box<Expr>),
    Call(Function, Box<Expr>),
}

impl Expr {
    fn binary(op: BinOp, lhs: Expr, rhs: Expr) -> Self {
        Self::Binary(op, Box::new(lhs), Box::new(rhs))
    }

    fn name(name: &str) -> Self {
        match name {
            "f" => Self::Frequency,
            "j" | "I" => Self::ImaginaryUnit,
            "pi" => Self::Number(PI),
            "E" => Self::Number(E),
            other => Self::Variable(other.to_string()),
        }
    }

    fn collect_variables<'a>(&'a self, out: &mut BTreeSet<&'a str>) {
        match self {
            Self::Variable(name) => {
                out.insert(name);
            }
            Self::Neg(inner) | Self::Call(_, inner) => inner.collect_variables(out),
            Self::Binary(_, lhs, rhs) => {
                lhs.collect_variables(out);
                rhs.collect_variables(out);
            }
            Self::Number(_) | Self::ImaginaryUnit | Self::Frequency => {}
        }
    }
}

fn parser() -> impl Parser<char, Expr, Error = Simple<char>> {
    let expr = recursive(|expr| {
        let frac = just('.').chain(text::digits(10));
        let exponent = just('e')
            .or(just('E'))
            .chain(just('+').or(just('-')).or_not())
            .chain::<char, _, _>(text::digits(10));
        let mantissa = text::int(10)
            .chain::<char, _, _>(frac.clone().or_not().flatten())
            .or(frac);
        let number = mantissa
            .chain::<char, _, _>(exponent.or_not().flatten())
            .collect::<String>()
            .try_map(|digits: String, span| {
                digits
                    .parse::<f64>()
                    .map(Expr::Number)
                    .map_err(|e| Simple::custom(span, e.to_string()))
            })
            .labelled("number");

        let call_or_name = text::ident()
            .then(
                expr.clone()
                    .delimited_by(just('(').padded(), just(')'))
                    .or_not(),
            )
            .try_map(|(name, argument): (String, Option<Expr>), span| match argument {
                Some(argument) => Function::from_name(&name)
                    .map(|function| Expr::Call(function, Box::new(argument)))
                    .ok_or_else(|| Simple::custom(span, format!("unknown function `{name}`"))),
                None => Ok(Expr::name(&name)),
            });

        let atom = number
            .or(call_or_name)
            .or(expr.clone().delimited_by(just('('), just(')')))
            .padded();

        let power_op = just("**").ignored().or(just('^').ignored()).padded();
        let unary = recursive(|unary| {
            let power = atom
                .then(power_op.ignore_then(unary.clone()).or_not())
                .map(|(base, exponent)| match exponent {
                    Some(exponent) => Expr::binary(BinOp::Pow, base, exponent),
                    None => base,
                });
            just('-')
                .padded()
                .ignore_then(unary.clone())
                .map(|operand| Expr::Neg(Box::new(operand)))
                .or(just('+').padded().ignore_then(unary))
                .or(power)
        });

        let product_op = just('*')
            .to(BinOp::Mul)
            .or(just('/').to(BinOp::Div))
            .padded();
        let product = unary
            .clone()
            .then(product_op.then(unary).repeated())
            .foldl(|lhs, (op, rhs)| Expr::binary(op, lhs, rhs));

        let sum_op = just('+')
            .to(BinOp::Add)
            .or(just('-').to(BinOp::Sub))
            .padded();
        product
            .clone()
            .then(sum_op.then(product).repeated())
            .foldl(|lhs, (op, rhs)| Expr::binary(op, lhs, rhs))
    });

    expr.padded().then_ignore(end())
}

#[derive(Debug, Clone)]
enum Compiled {
    NotANumber,
    Expression(Expr),
}

/// A compiled impedance formula. Serializes as its source text.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Formula {
    text: String,
    compiled: Compiled,
}

impl PartialEq for Formula {
    fn eq(&self, other: &Self) -> bool {
        self.text == other.text
    }
}

impl TryFrom<String> for Formula {
    type Error = FormulaError;

    fn try_from(text: String) -> Result<Self, Self::Error> {
        Self::parse(&text)
    }
}

impl From<Formula> for String {
    fn from(formula: Formula) -> String {
        formula.text
    }
}

impl std::str::FromStr for Formula {
    type Err = FormulaError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        Self::parse(text)
    }
}

impl Formula {
    pub fn parse(text: &str) -> Result<Self, FormulaError> {
        let trimmed = text.trim();
        if trimmed == "NaN" || trimmed == "nan" {
            return Ok(Self {
                text: text.to_string(),
                compiled: Compiled::NotANumber,
            });
        }
        if trimmed.is_empty() {
            return Err(FormulaError {
                formula: text.to_string(),
                message: "formula is empty".to_string(),
                span: (0, text.len()).into(),
            });
        }

        match parser().parse(text) {
            Ok(expr) => Ok(Self {
                text: text.to_string(),
                compiled: Compiled::Expression(expr),
            }),
            Err(errors) => Err(describe(text, errors)),
        }
    }

    /// The not-a-number formula. Evaluates to `NaN + NaN·j` everywhere.
    pub fn not_a_number() -> Self {
        Self {
            text: "NaN".to_string(),
            compiled: Compiled::NotANumber,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn is_not_a_number(&self) -> bool {
        matches!(self.compiled, Compiled::NotANumber)
    }

    /// Free variables the caller must supply, sorted by name.
    pub fn variables(&self) -> Vec<String> {
        let mut names = BTreeSet::new();
        if let Compiled::Expression(expr) = &self.compiled {
            expr.collect_variables(&mut names);
        }
        names.into_iter().map(str::to_string).collect()
    }

    /// Fails with the first free variable `parameters` does not supply.
    pub fn require(&self, parameters: &Parameters) -> GroundingResult<()> {
        match self.variables().into_iter().find(|name| !parameters.contains_key(name)) {
            Some(variable) => Err(GroundingError::MissingVariable {
                variable,
                formula: self.text.clone(),
            }),
            None => Ok(()),
        }
    }

    pub fn evaluate_at(&self, frequency: Frequency, parameters: &Parameters) -> GroundingResult<Complex64> {
        match &self.compiled {
            Compiled::NotANumber => Ok(Complex64::new(f64::NAN, f64::NAN)),
            Compiled::Expression(expr) => self
                .eval(expr, frequency.hz(), parameters)
                .map_err(|e| e.at_frequency(frequency.hz())),
        }
    }

    pub fn evaluate(&self, frequencies: &[Frequency], parameters: &Parameters) -> GroundingResult<Spectrum<Complex64>> {
        if frequencies.is_empty() {
            return Err(GroundingError::EmptyFrequencies);
        }
        self.require(parameters)?;
        frequencies
            .iter()
            .map(|&f| self.evaluate_at(f, parameters).map(|z| (f, z)))
            .collect()
    }

    fn eval(&self, expr: &Expr, hz: f64, parameters: &Parameters) -> GroundingResult<Complex64> {
        let value = match expr {
            Expr::Number(value) => Complex64::new(*value, 0.0),
            Expr::ImaginaryUnit => Complex64::i(),
            Expr::Frequency => Complex64::new(hz, 0.0),
            Expr::Variable(name) => match parameters.get(name) {
                Some(value) => Complex64::new(*value, 0.0),
                None => {
                    return Err(GroundingError::MissingVariable {
                        variable: name.clone(),
                        formula: self.text.clone(),
                    })
                }
            },
            Expr::Neg(inner) => -self.eval(inner, hz, parameters)?,
            Expr::Binary(op, lhs, rhs) => {
                let a = self.eval(lhs, hz, parameters)?;
                let b = self.eval(rhs, hz, parameters)?;
                match op {
                    BinOp::Add => a + b,
                    BinOp::Sub => a - b,
                    BinOp::Mul => a * b,
                    BinOp::Div => match b.norm() == 0.0 {
                        true => return Err(self.arithmetic("division by zero")),
                        false => a / b,
                    },
                    BinOp::Pow => self.power(a, b)?,
                }
            }
            Expr::Call(function, argument) => {
                let z = self.eval(argument, hz, parameters)?;
                match function {
                    Function::Sqrt => z.sqrt(),
                    Function::Exp => z.exp(),
                    Function::Ln => match z.norm() == 0.0 {
                        true => return Err(self.arithmetic("logarithm of zero")),
                        false => z.ln(),
                    },
                    Function::Abs => Complex64::new(z.norm(), 0.0),
                }
            }
        };
        Ok(value)
    }

    fn power(&self, base: Complex64, exponent: Complex64) -> GroundingResult<Complex64> {
        if base.norm() == 0.0 {
            return match exponent {
                e if e == ZERO => Ok(ONE),
                e if e.re > 0.0 => Ok(ZERO),
                _ => Err(self.arithmetic("zero raised to a non-positive power")),
            };
        }
        let value = match exponent.im == 0.0 {
            true if exponent.re.fract() == 0.0 && exponent.re.abs() <= i32::MAX as f64 => {
                base.powi(exponent.re as i32)
            }
            true => base.powf(exponent.re),
            false => base.powc(exponent),
        };
        Ok(value)
    }

    fn arithmetic(&self, what: &str) -> GroundingError {
        GroundingError::arithmetic(format!("{what} in `{}`", self.text))
    }
}

/// Free-function form: compile, then evaluate at every frequency.
pub fn evaluate(formula: &str, frequencies: &[f64], parameters: &Parameters) -> GroundingResult<Spectrum<Complex64>> {
    if frequencies.is_empty() {
        return Err(GroundingError::EmptyFrequencies);
    }
    let formula = Formula::parse(formula)?;
    formula.evaluate(&Frequency::list(frequencies)?, parameters)
}

fn describe(text: &str, errors: Vec<Simple<char>>) -> FormulaError {
    let byte_offset = |char_index: usize| {
        text.char_indices()
            .nth(char_index)
            .map(|(offset, _)| offset)
            .unwrap_or(text.len())
    };
    let Some(error) = errors.into_iter().next() else {
        return FormulaError {
            formula: text.to_string(),
            message: "could not parse formula".to_string(),
            span: (0, text.len()).into(),
        };
    };

    let message = match error.reason() {
        SimpleReason::Custom(message) => message.clone(),
        SimpleReason::Unclosed { delimiter, .. } => format!("unclosed `{delimiter}`"),
        SimpleReason::Unexpected => match error.found() {
            Some(found) => format!("unexpected `{found}`"),
            None => "unexpected end of formula".to_string(),
        },
    };
    let start = byte_offset(error.span().start);
    let end = byte_offset(error.span().end).max(start);
    FormulaError {
        formula: text.to_string(),
        message,
        span: SourceSpan::from((start, end - start)),
    }
}
