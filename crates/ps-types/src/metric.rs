//! Performance measurements and the partial order used to rank them.
//!
//! A [`Metric`] is either a single integer counter or a fixed-arity tuple of
//! counters. Tuples are ordered component-wise: `a > b` only when every
//! component of `a` is greater than the matching component of `b`, so two
//! tuples can be incomparable. Callers must not assume a total order.
//!
//! Averaging uses a fixed division policy: [`Metric::Scalar`] divides with
//! integer division truncating toward zero (throughput-style counters), tuple
//! components divide as `f64`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::SweepError;

/// Outcome of comparing two metrics under the component-wise partial order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricOrdering {
    Greater,
    Less,
    EqualOrIncomparable,
}

/// Capabilities every measurement must provide to be compared and averaged.
pub trait Measure: Sized {
    fn gt(&self, other: &Self) -> bool;
    fn ge(&self, other: &Self) -> bool;
    fn lt(&self, other: &Self) -> bool;
    fn le(&self, other: &Self) -> bool;

    /// Component-wise sum.
    fn try_add(&self, other: &Self) -> Result<Self, SweepError>;

    /// Divide every component by a positive sample count.
    fn divide(&self, count: usize) -> Result<Self, SweepError>;

    /// Bracketed literal, inverse of parsing.
    fn to_text(&self) -> String;

    fn compare(&self, other: &Self) -> MetricOrdering {
        if self.gt(other) {
            MetricOrdering::Greater
        } else if self.lt(other) {
            MetricOrdering::Less
        } else {
            MetricOrdering::EqualOrIncomparable
        }
    }
}

/// One performance measurement of an experiment run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Metric {
    Scalar(i64),
    Pair(f64, f64),
    Triple(f64, f64, f64),
}

impl Metric {
    /// Parse a bracketed literal such as `[12]` or `[1.5,2,3]`.
    pub fn parse_text(text: &str) -> Result<Self, SweepError> {
        text.parse()
    }

    /// Number of components.
    pub fn arity(&self) -> usize {
        match self {
            Self::Scalar(_) => 1,
            Self::Pair(..) => 2,
            Self::Triple(..) => 3,
        }
    }

    /// False when a tuple component is NaN or infinite.
    pub fn is_finite(&self) -> bool {
        match *self {
            Self::Scalar(_) => true,
            Self::Pair(a, b) => a.is_finite() && b.is_finite(),
            Self::Triple(a, b, c) => a.is_finite() && b.is_finite() && c.is_finite(),
        }
    }

    /// Average of `samples`: their sum divided by their count.
    ///
    /// Returns `Ok(None)` for an empty slice.
    pub fn average(samples: &[Metric]) -> Result<Option<Metric>, SweepError> {
        let Some((first, rest)) = samples.split_first() else {
            return Ok(None);
        };
        let mut sum = *first;
        for sample in rest {
            sum = sum.try_add(sample)?;
        }
        sum.divide(samples.len()).map(Some)
    }

    fn holds(
        &self,
        other: &Self,
        int_rel: fn(&i64, &i64) -> bool,
        real_rel: fn(&f64, &f64) -> bool,
    ) -> bool {
        match (self, other) {
            (Self::Scalar(a), Self::Scalar(b)) => int_rel(a, b),
            (Self::Pair(a1, a2), Self::Pair(b1, b2)) => real_rel(a1, b1) && real_rel(a2, b2),
            (Self::Triple(a1, a2, a3), Self::Triple(b1, b2, b3)) => {
                real_rel(a1, b1) && real_rel(a2, b2) && real_rel(a3, b3)
            }
            _ => false,
        }
    }
}

impl Measure for Metric {
    fn gt(&self, other: &Self) -> bool {
        self.holds(other, <i64 as PartialOrd>::gt, <f64 as PartialOrd>::gt)
    }

    fn ge(&self, other: &Self) -> bool {
        self.holds(other, <i64 as PartialOrd>::ge, <f64 as PartialOrd>::ge)
    }

    fn lt(&self, other: &Self) -> bool {
        self.holds(other, <i64 as PartialOrd>::lt, <f64 as PartialOrd>::lt)
    }

    fn le(&self, other: &Self) -> bool {
        self.holds(other, <i64 as PartialOrd>::le, <f64 as PartialOrd>::le)
    }

    fn try_add(&self, other: &Self) -> Result<Self, SweepError> {
        match (self, other) {
            (Self::Scalar(a), Self::Scalar(b)) => a.checked_add(*b).map(Self::Scalar).ok_or_else(|| {
                SweepError::malformed_metric(format!("overflow adding {self} and {other}"))
            }),
            (Self::Pair(a1, a2), Self::Pair(b1, b2)) => Ok(Self::Pair(a1 + b1, a2 + b2)),
            (Self::Triple(a1, a2, a3), Self::Triple(b1, b2, b3)) => {
                Ok(Self::Triple(a1 + b1, a2 + b2, a3 + b3))
            }
            _ => Err(SweepError::malformed_metric(format!(
                "cannot add {self} and {other}: arity {} vs {}",
                self.arity(),
                other.arity()
            ))),
        }
    }

    fn divide(&self, count: usize) -> Result<Self, SweepError> {
        if count == 0 {
            return Err(SweepError::malformed_metric(format!(
                "cannot divide {self} by a zero sample count"
            )));
        }
        let real = count as f64;
        match self {
            Self::Scalar(v) => {
                let divisor = i64::try_from(count).map_err(|_| {
                    SweepError::malformed_metric(format!("sample count {count} out of range"))
                })?;
                Ok(Self::Scalar(v / divisor))
            }
            Self::Pair(a, b) => Ok(Self::Pair(a / real, b / real)),
            Self::Triple(a, b, c) => Ok(Self::Triple(a / real, b / real, c / real)),
        }
    }

    fn to_text(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scalar(v) => write!(f, "[{v}]"),
            Self::Pair(a, b) => write!(f, "[{a},{b}]"),
            Self::Triple(a, b, c) => write!(f, "[{a},{b},{c}]"),
        }
    }
}

impl FromStr for Metric {
    type Err = SweepError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let inner = text
            .trim()
            .strip_prefix('[')
            .and_then(|rest| rest.strip_suffix(']'))
            .ok_or_else(|| {
                SweepError::malformed_metric(format!("expected a bracketed list, got '{text}'"))
            })?;

        if inner.trim().is_empty() {
            return Err(SweepError::malformed_metric("metric literal has no elements"));
        }

        let elements: Vec<&str> = inner.split(',').map(str::trim).collect();
        match elements.as_slice() {
            [v] => Ok(Self::Scalar(parse_counter(v)?)),
            [a, b] => Ok(Self::Pair(parse_component(a)?, parse_component(b)?)),
            [a, b, c] => Ok(Self::Triple(
                parse_component(a)?,
                parse_component(b)?,
                parse_component(c)?,
            )),
            other => Err(SweepError::malformed_metric(format!(
                "expected 1 to 3 elements, got {} in '{text}'",
                other.len()
            ))),
        }
    }
}

fn parse_counter(element: &str) -> Result<i64, SweepError> {
    element
        .parse::<i64>()
        .map_err(|e| SweepError::malformed_metric(format!("'{element}' is not an integer: {e}")))
}

fn parse_component(element: &str) -> Result<f64, SweepError> {
    let value = element
        .parse::<f64>()
        .map_err(|e| SweepError::malformed_metric(format!("'{element}' is not a number: {e}")))?;
    if !value.is_finite() {
        return Err(SweepError::malformed_metric(format!("'{element}' is not finite")));
    }
    Ok(value)
}
