use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;

use crate::{
    Assignment, Domain, FiniteEquationSystem, FixpointSolverTracer, FnDomain, MutableAssignment,
};

mod graph;

/// The four-point lattice `⊥ < a, b < ⊤`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Flat {
    Bottom,
    A,
    B,
    Top,
}

pub(crate) fn flat_lteq(x: &Flat, y: &Flat) -> bool {
    matches!((x, y), (Flat::Bottom, _) | (_, Flat::Top)) || x == y
}

pub(crate) fn flat_join(x: Flat, y: Flat) -> Flat {
    match (x, y) {
        (Flat::Bottom, v) | (v, Flat::Bottom) => v,
        (v, w) if v == w => v,
        _ => Flat::Top,
    }
}

pub(crate) fn flat_domain() -> impl Domain<Flat> {
    FnDomain::new(flat_lteq, flat_join)
}

/// Integers ordered as usual, joined by `max`.
pub(crate) fn max_domain() -> impl Domain<i64> {
    FnDomain::new(|x: &i64, y: &i64| x <= y, i64::max)
}

/// A solver tracer remembering every `evaluated` event.
pub(crate) struct RecordingSolverTracer<U, V> {
    pub(crate) evaluations: RefCell<Vec<(U, V)>>,
}

impl<U, V> RecordingSolverTracer<U, V> {
    pub(crate) fn new() -> Self {
        Self {
            evaluations: RefCell::new(Vec::new()),
        }
    }
}

impl<U, V> FixpointSolverTracer<U, V> for RecordingSolverTracer<U, V>
where
    U: Clone,
    V: Clone,
{
    fn evaluated(&self, _rho: &dyn Assignment<U, V>, u: &U, v: &V) {
        self.evaluations.borrow_mut().push((u.clone(), v.clone()));
    }
}

/// Unwraps the error of a build that must fail. Systems carry function
/// objects and have no `Debug`, so `unwrap_err` is not available.
pub(crate) fn build_error<T, U>(result: Result<T, crate::SystemError<U>>) -> crate::SystemError<U>
where
    U: Debug,
{
    match result {
        Err(error) => error,
        Ok(_) => panic!("expected the build to fail"),
    }
}

/// Asserts that `rho` solves every equation of the system.
pub(crate) fn assert_fixpoint<U, V, S>(eqs: &S, rho: &MutableAssignment<U, V>)
where
    S: FiniteEquationSystem<U, V>,
    U: Clone + Eq + Hash + Debug,
    V: Clone + PartialEq + Debug,
{
    for u in eqs.unknowns() {
        assert_eq!(eqs.apply(rho, u), rho.get(u), "unknown {u:?} is not stable");
    }
}

/// Collects the bindings of `rho` for whole-assignment comparisons.
pub(crate) fn bindings_of<U, V>(rho: &MutableAssignment<U, V>) -> HashMap<U, V>
where
    U: Clone + Eq + Hash,
    V: Clone,
{
    rho.bindings().map(|(u, v)| (u.clone(), v.clone())).collect()
}
