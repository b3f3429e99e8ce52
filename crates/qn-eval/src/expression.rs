//! Expression handles and the optional-setting sum types built on them.

use std::fmt;

use crate::Distribution;

/// An opaque expression, evaluated by whatever [`Evaluator`][crate::Evaluator]
/// the run was configured with.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Expression(String);

impl Expression {
    pub fn new(text: impl Into<String>) -> Self {
        Expression(text.into())
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Expression {
    fn from(text: &str) -> Self {
        Expression::new(text)
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ── Priority ──────────────────────────────────────────────────────────────────

/// Selection score of a queued client.
#[derive(Clone, Debug, PartialEq, Default)]
pub enum Priority {
    /// Score is the time the client has waited so far.  A station whose
    /// clients all use this rule serves strictly first-come-first-served.
    #[default]
    Age,
    Expression(Expression),
}

impl Priority {
    /// `""` and `"w"` mean [`Priority::Age`]; anything else is an expression.
    pub fn parse(text: &str) -> Self {
        let t = text.trim();
        if t.is_empty() || t.eq_ignore_ascii_case("w") {
            Priority::Age
        } else {
            Priority::Expression(Expression::new(t))
        }
    }

    #[inline]
    pub fn is_age(&self) -> bool {
        matches!(self, Priority::Age)
    }
}

// ── TimeSource ────────────────────────────────────────────────────────────────

/// Where a duration comes from: a random distribution or an expression.
/// Values are in the owning station's time base.
#[derive(Clone, Debug, PartialEq)]
pub enum TimeSource {
    Distribution(Distribution),
    Expression(Expression),
}

impl TimeSource {
    /// Shorthand for a deterministic duration.
    pub fn fixed(value: f64) -> Self {
        TimeSource::Distribution(Distribution::Fixed(value))
    }

    pub fn expression(text: &str) -> Self {
        TimeSource::Expression(Expression::new(text))
    }
}
