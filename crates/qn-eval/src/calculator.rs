//! `Calculator` — the only path by which stations evaluate and sample.

use qn_client::Client;
use qn_core::{QnError, QnResult, Tick, TimeBase};
use tracing::warn;

use crate::{Distribution, EvalError, Evaluator, Expression, Sampler, TimeSource, Variables};

/// A recovered expression failure, forwarded to the statistics sink.
#[derive(Clone, Debug, PartialEq)]
pub struct CalculationError {
    pub station:    String,
    pub expression: String,
    pub error:      EvalError,
}

/// Wraps the run's evaluator and sampler.
///
/// Every failed evaluation is logged and queued; callers get the fallback
/// documented for the setting being computed.  With `stop_on_error` set the
/// first failure becomes [`QnError::CalculationHalted`] instead.
pub struct Calculator<'a> {
    evaluator:     &'a dyn Evaluator,
    sampler:       &'a mut dyn Sampler,
    stop_on_error: bool,
    errors:        Vec<CalculationError>,
}

impl<'a> Calculator<'a> {
    pub fn new(evaluator: &'a dyn Evaluator, sampler: &'a mut dyn Sampler, stop_on_error: bool) -> Self {
        Self { evaluator, sampler, stop_on_error, errors: Vec::new() }
    }

    pub fn evaluator(&self) -> &dyn Evaluator {
        self.evaluator
    }

    /// Evaluate `expr`, substituting `fallback` on failure.
    pub fn evaluate(
        &mut self,
        expr:     &Expression,
        vars:     &Variables,
        client:   Option<&Client>,
        station:  &str,
        fallback: f64,
    ) -> QnResult<f64> {
        Ok(self.try_evaluate(expr, vars, client, station)?.unwrap_or(fallback))
    }

    /// A condition holds when it evaluates to a non-zero value.  Failures
    /// count as "does not hold".
    pub fn condition(
        &mut self,
        expr:    &Expression,
        vars:    &Variables,
        client:  Option<&Client>,
        station: &str,
    ) -> QnResult<bool> {
        Ok(self.try_evaluate(expr, vars, client, station)?.is_some_and(|v| v != 0.0))
    }

    /// Duration in seconds.  Negative values and failed expressions give 0.
    pub fn duration(
        &mut self,
        source:  &TimeSource,
        vars:    &Variables,
        client:  Option<&Client>,
        station: &str,
        base:    TimeBase,
    ) -> QnResult<f64> {
        let raw = match source {
            TimeSource::Distribution(d) => self.sampler.sample(d),
            TimeSource::Expression(e) => self.evaluate(e, vars, client, station, 0.0)?,
        };
        Ok((raw * base.secs()).max(0.0))
    }

    /// [`duration`][Self::duration] converted to ticks.
    pub fn duration_ticks(
        &mut self,
        source:  &TimeSource,
        vars:    &Variables,
        client:  Option<&Client>,
        station: &str,
        base:    TimeBase,
    ) -> QnResult<u64> {
        Ok(Tick::ticks_for_secs(self.duration(source, vars, client, station, base)?))
    }

    /// Waiting tolerance in seconds.  `None` means the client never reneges,
    /// which is also the outcome of a negative value or a failed expression.
    pub fn tolerance(
        &mut self,
        source:  &TimeSource,
        vars:    &Variables,
        client:  Option<&Client>,
        station: &str,
        base:    TimeBase,
    ) -> QnResult<Option<f64>> {
        let raw = match source {
            TimeSource::Distribution(d) => Some(self.sampler.sample(d)),
            TimeSource::Expression(e) => self.try_evaluate(e, vars, client, station)?,
        };
        Ok(raw.filter(|v| *v >= 0.0).map(|v| v * base.secs()))
    }

    #[inline]
    pub fn sample(&mut self, dist: &Distribution) -> f64 {
        self.sampler.sample(dist)
    }

    /// Drain the failures recorded since the last call.
    pub fn take_errors(&mut self) -> Vec<CalculationError> {
        std::mem::take(&mut self.errors)
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    fn try_evaluate(
        &mut self,
        expr:    &Expression,
        vars:    &Variables,
        client:  Option<&Client>,
        station: &str,
    ) -> QnResult<Option<f64>> {
        match self.evaluator.evaluate(expr, vars, client) {
            Ok(v) => Ok(Some(v)),
            Err(error) => {
                warn!(station, expression = %expr, %error, "calculation error");
                if self.stop_on_error {
                    return Err(QnError::CalculationHalted {
                        station:    station.to_owned(),
                        expression: expr.to_string(),
                        reason:     error.to_string(),
                    });
                }
                self.errors.push(CalculationError {
                    station:    station.to_owned(),
                    expression: expr.to_string(),
                    error,
                });
                Ok(None)
            }
        }
    }
}
