//! Worklist fixpoint iterators.
//!
//! All three solvers share one skeleton: dequeue an unknown, evaluate
//! its right-hand side, and on change write the new value and enqueue
//! the unknowns it influences. They differ in scheduling — FIFO,
//! priority with restart, or FIFO over a dynamically discovered unknown
//! set. Worklists never deduplicate: convergence does not rely on
//! uniqueness, and re-evaluating an already stable unknown is harmless.
//!
//! Termination is the caller's responsibility. A solver stops when the
//! combined body and boxes stabilize from the start assignment; on a
//! domain with infinite ascending chains that is what widening boxes
//! are for.

use std::collections::{BinaryHeap, HashMap, VecDeque};
use std::hash::Hash;

use indexmap::IndexSet;

use crate::algebra::UnknownOrdering;
use crate::assignment::{Assignment, InputAssignment, MutableAssignment};
use crate::system::{EquationSystem, FiniteEquationSystem};
use crate::tracer::FixpointSolverTracer;

/// Solves a finite system with a FIFO worklist seeded with every
/// unknown.
///
/// Returns the final assignment: for every unknown `x`,
/// `ρ(x) = eqs.apply(ρ, x)` once the worklist drains.
pub fn work_list_solve<U, V, S, T>(
    eqs: &S,
    start: &InputAssignment<U, V>,
    tracer: &T,
) -> MutableAssignment<U, V>
where
    S: FiniteEquationSystem<U, V> + ?Sized,
    T: FixpointSolverTracer<U, V>,
    U: Clone + Eq + Hash,
    V: Clone + PartialEq,
{
    let mut rho = MutableAssignment::new(start.clone());
    tracer.initialized(&rho);
    let mut worklist: VecDeque<U> = eqs.unknowns().iter().cloned().collect();
    while let Some(x) = worklist.pop_front() {
        let new = eqs.apply(&rho, &x);
        tracer.evaluated(&rho, &x, &new);
        if new != rho.get(&x) {
            worklist.extend(eqs.infl(&x));
            rho.set(x, new);
        }
    }
    tracer.completed(&rho);
    rho
}

/// Solves a finite system with a max-heap worklist ordered by
/// `ordering`, with restart semantics.
///
/// After every evaluation of `x` the `restart` predicate sees the new
/// and the old value; when it answers `true`, every unknown strictly
/// above `x` is reset to its start value. The worklist is left alone —
/// reset unknowns are re-enqueued as their dependencies fire.
pub fn priority_work_list_solve<U, V, S, O, R, T>(
    eqs: &S,
    start: &InputAssignment<U, V>,
    ordering: &O,
    restart: R,
    tracer: &T,
) -> MutableAssignment<U, V>
where
    S: FiniteEquationSystem<U, V> + ?Sized,
    O: UnknownOrdering<U>,
    R: Fn(&V, &V) -> bool,
    T: FixpointSolverTracer<U, V>,
    U: Clone + Eq + Hash,
    V: Clone + PartialEq,
{
    // The heap wants a total order; ranking the unknowns once up front
    // turns the preorder witness into one. Ties land in arbitrary but
    // fixed relative positions, which a preorder permits.
    let mut ranked: Vec<U> = eqs.unknowns().to_vec();
    ranked.sort_by(|a, b| ordering.cmp(a, b));
    let rank: HashMap<U, usize> = ranked
        .into_iter()
        .enumerate()
        .map(|(position, u)| (u, position))
        .collect();

    let mut rho = MutableAssignment::new(start.clone());
    tracer.initialized(&rho);
    let mut worklist: BinaryHeap<Prioritized<U>> = eqs
        .unknowns()
        .iter()
        .map(|u| Prioritized {
            rank: rank[u],
            unknown: u.clone(),
        })
        .collect();
    while let Some(Prioritized { unknown: x, .. }) = worklist.pop() {
        let new = eqs.apply(&rho, &x);
        tracer.evaluated(&rho, &x, &new);
        let old = rho.get(&x);
        if restart(&new, &old) {
            for y in eqs.unknowns() {
                if ordering.gt(y, &x) {
                    rho.set(y.clone(), start.get(y));
                }
            }
        }
        if new != old {
            for y in eqs.infl(&x) {
                let rank = rank.get(&y).copied().expect("influence outside the unknown set");
                worklist.push(Prioritized { rank, unknown: y });
            }
            rho.set(x, new);
        }
    }
    tracer.completed(&rho);
    rho
}

/// Solves for the unknowns reachable from `wanted`, discovering the
/// unknown set as evaluation proceeds.
///
/// Dependencies reported by the system drive everything: an unseen
/// dependency is materialized at its start value and enqueued for a
/// first evaluation, and the influence relation is accumulated from the
/// reported sets rather than declared up front. The result is total
/// over every unknown reachable from `wanted`.
pub fn local_work_list_solve<U, V, S, W, T>(
    eqs: &S,
    wanted: W,
    start: &InputAssignment<U, V>,
    tracer: &T,
) -> MutableAssignment<U, V>
where
    S: EquationSystem<U, V> + ?Sized,
    W: IntoIterator<Item = U>,
    T: FixpointSolverTracer<U, V>,
    U: Clone + Eq + Hash,
    V: Clone + PartialEq,
{
    let mut rho = MutableAssignment::new(start.clone());
    tracer.initialized(&rho);
    // Insertion-ordered buckets keep re-evaluation order deterministic.
    let mut influence: HashMap<U, IndexSet<U>> = HashMap::new();
    let mut worklist: VecDeque<U> = wanted.into_iter().collect();
    while let Some(x) = worklist.pop_front() {
        let (new, deps) = eqs.apply_with_dependencies(&rho, &x);
        tracer.evaluated(&rho, &x, &new);
        for y in deps {
            if !rho.is_defined_at(&y) {
                rho.set(y.clone(), start.get(&y));
                worklist.push_back(y.clone());
            }
            influence.entry(y).or_default().insert(x.clone());
        }
        if new != rho.get(&x) {
            if let Some(dependents) = influence.get(&x) {
                worklist.extend(dependents.iter().cloned());
            }
            rho.set(x, new);
        }
    }
    tracer.completed(&rho);
    rho
}

struct Prioritized<U> {
    rank: usize,
    unknown: U,
}

impl<U> PartialEq for Prioritized<U> {
    fn eq(&self, other: &Self) -> bool {
        self.rank == other.rank
    }
}

impl<U> Eq for Prioritized<U> {}

impl<U> PartialOrd for Prioritized<U> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl<U> Ord for Prioritized<U> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.rank.cmp(&other.rank)
    }
}
