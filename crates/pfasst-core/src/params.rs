//! Ordered problem parameters with per-level values.
//!
//! A parameter is either a single value shared by every level or a list
//! with one entry per level (finest first). Lists shorter than the level
//! hierarchy repeat their last entry.

use indexmap::IndexMap;

use crate::error::ProblemError;

/// A single problem parameter.
#[derive(Clone, Debug, PartialEq)]
pub enum ParamValue {
    /// One floating-point value for every level.
    Float(f64),
    /// One integer value for every level.
    Int(i64),
    /// Floating-point values per level, finest first.
    Floats(Vec<f64>),
    /// Integer values per level, finest first.
    Ints(Vec<i64>),
}

impl ParamValue {
    fn levels(&self) -> usize {
        match self {
            Self::Float(_) | Self::Int(_) => 1,
            Self::Floats(v) => v.len(),
            Self::Ints(v) => v.len(),
        }
    }

    fn float_at(&self, level: usize) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v),
            Self::Int(v) => Some(*v as f64),
            Self::Floats(v) => v.get(level).or_else(|| v.last()).copied(),
            Self::Ints(v) => v.get(level).or_else(|| v.last()).map(|i| *i as f64),
        }
    }

    fn int_at(&self, level: usize) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            Self::Ints(v) => v.get(level).or_else(|| v.last()).copied(),
            Self::Float(_) | Self::Floats(_) => None,
        }
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<Vec<f64>> for ParamValue {
    fn from(v: Vec<f64>) -> Self {
        Self::Floats(v)
    }
}

impl From<Vec<i64>> for ParamValue {
    fn from(v: Vec<i64>) -> Self {
        Self::Ints(v)
    }
}

/// Insertion-ordered map of problem parameters.
///
/// # Examples
///
/// ```
/// use pfasst_core::ProblemParams;
///
/// let params = ProblemParams::new()
///     .with("nu", 0.1)
///     .with("nvars", vec![255_i64, 127]);
/// assert_eq!(params.levels(), 2);
/// assert_eq!(params.get_usize("nvars", 1).unwrap(), 127);
/// assert_eq!(params.get_f64("nu", 1).unwrap(), 0.1);
/// ```
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ProblemParams {
    entries: IndexMap<String, ParamValue>,
}

impl ProblemParams {
    /// An empty parameter set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: &str, value: impl Into<ParamValue>) -> Self {
        self.insert(key, value);
        self
    }

    /// Insert or replace a parameter.
    pub fn insert(&mut self, key: &str, value: impl Into<ParamValue>) {
        self.entries.insert(key.to_string(), value.into());
    }

    /// Raw access to a parameter.
    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.entries.get(key)
    }

    /// Whether `key` is present.
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Number of levels implied by the longest per-level list (at least 1).
    pub fn levels(&self) -> usize {
        self.entries
            .values()
            .map(ParamValue::levels)
            .max()
            .unwrap_or(1)
            .max(1)
    }

    /// The floating-point value of `key` on `level`.
    pub fn get_f64(&self, key: &str, level: usize) -> Result<f64, ProblemError> {
        let value = self.require(key)?;
        value
            .float_at(level)
            .ok_or_else(|| ProblemError::InvalidParameter {
                key: key.to_string(),
                reason: "empty per-level list".to_string(),
            })
    }

    /// The non-negative integer value of `key` on `level`.
    pub fn get_usize(&self, key: &str, level: usize) -> Result<usize, ProblemError> {
        let value = self.require(key)?;
        let raw = value
            .int_at(level)
            .ok_or_else(|| ProblemError::InvalidParameter {
                key: key.to_string(),
                reason: "expected an integer".to_string(),
            })?;
        usize::try_from(raw).map_err(|_| ProblemError::InvalidParameter {
            key: key.to_string(),
            reason: format!("expected a non-negative integer, got {raw}"),
        })
    }

    /// Like [`get_f64`](Self::get_f64) but falls back to `default` when absent.
    pub fn get_f64_or(&self, key: &str, level: usize, default: f64) -> Result<f64, ProblemError> {
        if self.contains(key) {
            self.get_f64(key, level)
        } else {
            Ok(default)
        }
    }

    fn require(&self, key: &str) -> Result<&ParamValue, ProblemError> {
        self.entries
            .get(key)
            .ok_or_else(|| ProblemError::MissingParameter {
                key: key.to_string(),
            })
    }
}
