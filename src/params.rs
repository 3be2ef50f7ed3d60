use std::fmt::Debug;

use thiserror::Error;

#[non_exhaustive]
#[derive(Error, Debug, PartialEq)]
pub enum ParameterError {
    #[error("Got {names} parameter names but {values} values")]
    LengthMismatch { names: usize, values: usize },
    #[error("Parameter `{0}` is missing")]
    Missing(&'static str),
    #[error("Expected at least {expected} parameter values, got {found}")]
    TooFewValues { expected: usize, found: usize },
}

/// An ordered list of named parameter values, as proposed by an outer sampler.
///
/// Names and values always stay paired. Models resolve the values they need
/// once, through [`ModelParams::from_parameters`], instead of indexing into
/// the list during simulation.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParameterSet {
    names: Vec<String>,
    values: Vec<f64>,
}

impl ParameterSet {
    pub fn new(names: Vec<String>, values: Vec<f64>) -> Result<Self, ParameterError> {
        if names.len() != values.len() {
            return Err(ParameterError::LengthMismatch {
                names: names.len(),
                values: values.len(),
            });
        }
        Ok(Self { names, values })
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.names
            .iter()
            .position(|item| item == name)
            .map(|idx| self.values[idx])
    }

    /// Replace the value of an existing parameter. Returns false if the name
    /// is unknown.
    pub fn set(&mut self, name: &str, value: f64) -> bool {
        match self.names.iter().position(|item| item == name) {
            Some(idx) => {
                self.values[idx] = value;
                true
            }
            None => false,
        }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.names
            .iter()
            .map(String::as_str)
            .zip(self.values.iter().copied())
    }
}

impl<S: Into<String>> FromIterator<(S, f64)> for ParameterSet {
    fn from_iter<T: IntoIterator<Item = (S, f64)>>(iter: T) -> Self {
        let (names, values) = iter
            .into_iter()
            .map(|(name, value)| (name.into(), value))
            .unzip();
        Self { names, values }
    }
}

/// Typed parameters of an epidemic model.
pub trait ModelParams: Copy + Debug + Send + Sync + 'static {
    /// Resolve the typed parameters from a named parameter list.
    fn from_parameters(parameters: &ParameterSet) -> Result<Self, ParameterError>;

    /// The probability that a recovered case is reported, if the model has one.
    fn reporting_rate(&self) -> Option<f64>;
}

/// Parameters of the SIR model with negative binomial offspring.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SirParams {
    /// Reproduction number at the start of a simulation window.
    pub reproduction_number: f64,
    /// Dispersion `k` of the offspring distribution. Small values mean
    /// strong superspreading.
    pub dispersion: f64,
    /// Per-unit-time rate of I -> R transitions.
    pub recovery_rate: f64,
    pub reporting_rate: Option<f64>,
}

impl SirParams {
    pub const REPRODUCTION_NUMBER: &'static str = "R0";
    pub const DISPERSION: &'static str = "k";
    pub const RECOVERY_RATE: &'static str = "rateI2R";
    pub const REPORTING_RATE: &'static str = "reporting";

    /// Resolve parameters from the positional convention
    /// `[R, k, recovery rate, (reporting rate)]`.
    pub fn from_positional(values: &[f64]) -> Result<Self, ParameterError> {
        let &[reproduction_number, dispersion, recovery_rate, ..] = values else {
            return Err(ParameterError::TooFewValues {
                expected: 3,
                found: values.len(),
            });
        };
        Ok(Self {
            reproduction_number,
            dispersion,
            recovery_rate,
            reporting_rate: values.get(3).copied(),
        })
    }
}

impl ModelParams for SirParams {
    fn from_parameters(parameters: &ParameterSet) -> Result<Self, ParameterError> {
        let lookup = |name: &'static str| {
            parameters
                .get(name)
                .ok_or(ParameterError::Missing(name))
        };
        Ok(Self {
            reproduction_number: lookup(Self::REPRODUCTION_NUMBER)?,
            dispersion: lookup(Self::DISPERSION)?,
            recovery_rate: lookup(Self::RECOVERY_RATE)?,
            reporting_rate: parameters.get(Self::REPORTING_RATE),
        })
    }

    fn reporting_rate(&self) -> Option<f64> {
        self.reporting_rate
    }
}
