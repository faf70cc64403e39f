//! Observability hooks for equation systems and solvers.
//!
//! Tracers exist so clients can watch a solve without the library paying
//! for it when nobody watches. The equation-system hooks are attached
//! with `with_tracer` and their call sites compile away entirely when the
//! `tracers` feature is disabled. The solver hooks are a generic
//! parameter, so passing [`NullSolverTracer`] monomorphizes every call
//! into nothing.

use std::fmt::Debug;

use crate::assignment::Assignment;

/// Hooks fired by an equation system around each evaluation, in order:
/// `pre_evaluation`, `post_evaluation`, then exactly one of
/// `box_evaluation` (a box was applied) or `no_box_evaluation`.
pub trait EquationSystemTracer<U, V> {
    fn pre_evaluation(&self, rho: &dyn Assignment<U, V>, u: &U) {
        let _ = (rho, u);
    }

    fn post_evaluation(&self, rho: &dyn Assignment<U, V>, u: &U, raw: &V) {
        let _ = (rho, u, raw);
    }

    fn box_evaluation(&self, rho: &dyn Assignment<U, V>, u: &U, raw: &V, boxed: &V) {
        let _ = (rho, u, raw, boxed);
    }

    fn no_box_evaluation(&self, rho: &dyn Assignment<U, V>, u: &U, raw: &V) {
        let _ = (rho, u, raw);
    }
}

/// Hooks fired by a solver: `initialized` exactly once before any
/// evaluation, `evaluated` once per dequeue, `completed` once at the end.
pub trait FixpointSolverTracer<U, V> {
    fn initialized(&self, rho: &dyn Assignment<U, V>) {
        let _ = rho;
    }

    fn evaluated(&self, rho: &dyn Assignment<U, V>, u: &U, v: &V) {
        let _ = (rho, u, v);
    }

    fn completed(&self, rho: &dyn Assignment<U, V>) {
        let _ = rho;
    }
}

/// The tracer that observes nothing.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct NullSystemTracer;

impl<U, V> EquationSystemTracer<U, V> for NullSystemTracer {}

/// The solver tracer that observes nothing. Calls through it vanish
/// under monomorphization.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct NullSolverTracer;

impl<U, V> FixpointSolverTracer<U, V> for NullSolverTracer {}

/// An equation-system tracer reporting every evaluation through the
/// [`log`] facade under the `fixpoint-solver` target.
#[derive(Clone, Copy, Debug, Default)]
pub struct LoggingSystemTracer;

impl<U, V> EquationSystemTracer<U, V> for LoggingSystemTracer
where
    U: Debug,
    V: Debug,
{
    fn pre_evaluation(&self, _rho: &dyn Assignment<U, V>, u: &U) {
        log::debug!(target: "fixpoint-solver", "evaluating {u:?}");
    }

    fn post_evaluation(&self, _rho: &dyn Assignment<U, V>, u: &U, raw: &V) {
        log::debug!(target: "fixpoint-solver", "evaluated {u:?} to {raw:?}");
    }

    fn box_evaluation(&self, _rho: &dyn Assignment<U, V>, u: &U, raw: &V, boxed: &V) {
        log::debug!(target: "fixpoint-solver", "boxed {u:?}: {raw:?} became {boxed:?}");
    }

    fn no_box_evaluation(&self, _rho: &dyn Assignment<U, V>, u: &U, raw: &V) {
        log::debug!(target: "fixpoint-solver", "no box at {u:?}, keeping {raw:?}");
    }
}

/// A solver tracer reporting the run through the [`log`] facade under
/// the `fixpoint-solver` target.
#[derive(Clone, Copy, Debug, Default)]
pub struct LoggingSolverTracer;

impl<U, V> FixpointSolverTracer<U, V> for LoggingSolverTracer
where
    U: Debug,
    V: Debug,
{
    fn initialized(&self, _rho: &dyn Assignment<U, V>) {
        log::debug!(target: "fixpoint-solver", "solver initialized");
    }

    fn evaluated(&self, _rho: &dyn Assignment<U, V>, u: &U, v: &V) {
        log::debug!(target: "fixpoint-solver", "solver evaluated {u:?} -> {v:?}");
    }

    fn completed(&self, _rho: &dyn Assignment<U, V>) {
        log::debug!(target: "fixpoint-solver", "solver completed");
    }
}

/// Fires an equation-system tracer hook. Expands to nothing without the
/// `tracers` feature, stripping the call site at zero cost.
macro_rules! system_trace {
    ($system:expr, $method:ident($($arg:expr),* $(,)?)) => {
        #[cfg(feature = "tracers")]
        {
            if let Some(tracer) = $system.tracer.as_ref() {
                tracer.$method($($arg),*);
            }
        }
    };
}

pub(crate) use system_trace;
