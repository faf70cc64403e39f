//! Equation systems: a body plus everything a solver needs to schedule
//! it.
//!
//! The solver-facing surface is the pair of traits [`EquationSystem`]
//! (enough for the local solver, which discovers unknowns as it goes) and
//! [`FiniteEquationSystem`] (adds the enumerated unknown set and the
//! static influence relation the finite solvers schedule with).
//! [`FiniteSystem`] is the concrete flat implementation; graph-shaped
//! systems live in [`crate::graph`]. Decorations are non-destructive:
//! every `with_…` returns a new system and leaves the receiver intact.

use std::collections::HashSet;
use std::fmt::Debug;
use std::hash::Hash;
use std::rc::Rc;

use crate::algebra::Magma;
use crate::assignment::{Assignment, InputAssignment, PartialAssignment, RecordingAssignment};
use crate::body::Body;
use crate::boxes::BoxAssignment;
use crate::error::SystemError;
use crate::tracer::system_trace;
use crate::tracer::EquationSystemTracer;

/// An equation system `x = F_x(ρ)` over opaque unknowns and values.
pub trait EquationSystem<U, V> {
    /// Evaluates the right-hand side of `u` against `rho`.
    fn apply(&self, rho: &dyn Assignment<U, V>, u: &U) -> V;

    /// Evaluates the right-hand side of `u` and reports every unknown
    /// whose value in `rho` may have been consulted. Supersets are
    /// allowed; an under-approximation breaks the solvers.
    fn apply_with_dependencies(&self, rho: &dyn Assignment<U, V>, u: &U) -> (V, Vec<U>);

    /// The assignment a solve of this system starts from by default.
    fn initial(&self) -> InputAssignment<U, V>;

    /// Whether `u` is an input unknown of the system.
    fn is_input_unknown(&self, u: &U) -> bool;
}

/// An equation system over a finite, enumerated unknown set.
pub trait FiniteEquationSystem<U, V>: EquationSystem<U, V> {
    fn unknowns(&self) -> &[U];

    /// The unknowns whose right-hand sides may change when `ρ(u)` does.
    fn infl(&self, u: &U) -> Vec<U>;
}

/// A flat finite equation system: a body, an unknown set and an
/// influence relation, with optional boxes layered on top.
pub struct FiniteSystem<U, V> {
    pub(crate) body: Body<U, V>,
    pub(crate) dependencies: Option<Rc<dyn Fn(&dyn Assignment<U, V>, &U) -> Vec<U>>>,
    pub(crate) boxes: BoxAssignment<U, V>,
    pub(crate) initial: InputAssignment<U, V>,
    pub(crate) input_unknowns: Rc<dyn Fn(&U) -> bool>,
    pub(crate) unknowns: Vec<U>,
    pub(crate) influence: Rc<dyn Fn(&U) -> Vec<U>>,
    pub(crate) diagonal: bool,
    pub(crate) tracer: Option<Rc<dyn EquationSystemTracer<U, V>>>,
}

impl<U, V> Clone for FiniteSystem<U, V>
where
    U: Clone,
{
    fn clone(&self) -> Self {
        Self {
            body: self.body.clone(),
            dependencies: self.dependencies.clone(),
            boxes: self.boxes.clone(),
            initial: self.initial.clone(),
            input_unknowns: Rc::clone(&self.input_unknowns),
            unknowns: self.unknowns.clone(),
            influence: Rc::clone(&self.influence),
            diagonal: self.diagonal,
            tracer: self.tracer.clone(),
        }
    }
}

impl<U, V> FiniteSystem<U, V>
where
    U: Clone + PartialEq,
    V: Clone,
{
    fn evaluate(&self, rho: &dyn Assignment<U, V>, u: &U) -> V {
        system_trace!(self, pre_evaluation(rho, u));
        let raw = self.body.eval(rho, u);
        system_trace!(self, post_evaluation(rho, u, &raw));
        match self.boxes.get(u) {
            Some(bx) => {
                let old = rho.get(u);
                #[cfg(feature = "tracers")]
                let raw_before_box = raw.clone();
                let boxed = bx.apply(&old, raw);
                system_trace!(self, box_evaluation(rho, u, &raw_before_box, &boxed));
                boxed
            }
            None => {
                system_trace!(self, no_box_evaluation(rho, u, &raw));
                raw
            }
        }
    }

    /// Cross-checks an explicitly declared dependency set against what
    /// the body actually reads. Boxes are excluded on purpose: replaying
    /// them would advance stateful counters.
    #[cfg(debug_assertions)]
    fn check_declared_dependencies(&self, rho: &dyn Assignment<U, V>, u: &U, declared: &[U]) {
        let proxy = RecordingAssignment::new(rho);
        let _ = self.body.eval(&proxy, u);
        for observed in proxy.into_observed() {
            assert!(
                declared.contains(&observed),
                "declared dependency set under-approximates the unknowns the body reads",
            );
        }
    }
}

impl<U, V> EquationSystem<U, V> for FiniteSystem<U, V>
where
    U: Clone + PartialEq,
    V: Clone,
{
    fn apply(&self, rho: &dyn Assignment<U, V>, u: &U) -> V {
        self.evaluate(rho, u)
    }

    fn apply_with_dependencies(&self, rho: &dyn Assignment<U, V>, u: &U) -> (V, Vec<U>) {
        match &self.dependencies {
            Some(dependencies) => {
                let v = self.evaluate(rho, u);
                let mut deps = dependencies(rho, u);
                // A box reads the current value of its unknown.
                if self.boxes.is_defined_at(u) && !deps.contains(u) {
                    deps.push(u.clone());
                }
                #[cfg(debug_assertions)]
                self.check_declared_dependencies(rho, u, &deps);
                (v, deps)
            }
            None => {
                let proxy = RecordingAssignment::new(rho);
                let v = self.evaluate(&proxy, u);
                (v, proxy.into_observed())
            }
        }
    }

    fn initial(&self) -> InputAssignment<U, V> {
        self.initial.clone()
    }

    fn is_input_unknown(&self, u: &U) -> bool {
        (self.input_unknowns)(u)
    }
}

impl<U, V> FiniteEquationSystem<U, V> for FiniteSystem<U, V>
where
    U: Clone + PartialEq,
    V: Clone,
{
    fn unknowns(&self) -> &[U] {
        &self.unknowns
    }

    fn infl(&self, u: &U) -> Vec<U> {
        let mut dependents = (self.influence)(u);
        if self.diagonal && !dependents.contains(u) {
            dependents.push(u.clone());
        }
        dependents
    }
}

impl<U, V> FiniteSystem<U, V>
where
    U: Clone + PartialEq + 'static,
    V: Clone + 'static,
{
    /// Combines `init` into the body wherever it is defined:
    /// `F'(ρ)(x) = comb(init(x), F(ρ)(x))`.
    pub fn with_base_assignment(
        &self,
        init: impl PartialAssignment<U, V> + 'static,
        comb: impl Magma<V> + 'static,
    ) -> Self {
        let mut system = self.clone();
        system.body = system.body.with_base_assignment(init, comb);
        system
    }

    /// Installs a per-unknown box over the body. The assignment is
    /// copied defensively, so a stateful one keeps its counters local to
    /// the returned system. A non-idempotent assignment makes every
    /// unknown influence itself.
    pub fn with_boxes(&self, boxes: &BoxAssignment<U, V>) -> Self {
        if boxes.is_empty() {
            return self.clone();
        }
        let mut system = self.clone();
        if !system.boxes.is_empty() {
            // Earlier boxes sink into the body so the new ones apply on
            // top of them; their self-reads move into the declared
            // dependency sets.
            let folded = system.body.with_box_assignment(&system.boxes);
            system.body = folded;
            if let Some(dependencies) = &system.dependencies {
                let dependencies = Rc::clone(dependencies);
                system.dependencies =
                    Some(Rc::new(move |rho: &dyn Assignment<U, V>, u: &U| {
                        let mut deps = dependencies(rho, u);
                        if !deps.contains(u) {
                            deps.push(u.clone());
                        }
                        deps
                    }));
            }
        }
        system.boxes = boxes.copy();
        if !boxes.boxes_are_idempotent() {
            system.diagonal = true;
        }
        system
    }

    /// Attaches a tracer fired around every evaluation.
    pub fn with_tracer(&self, tracer: impl EquationSystemTracer<U, V> + 'static) -> Self {
        let mut system = self.clone();
        system.tracer = Some(Rc::new(tracer));
        system
    }
}

/// Builds a [`FiniteSystem`] directly from its parts.
pub struct FiniteSystemBuilder<U, V> {
    body: Body<U, V>,
    initial: Option<InputAssignment<U, V>>,
    unknowns: Vec<U>,
    inputs: Option<Vec<U>>,
    influence: Option<Rc<dyn Fn(&U) -> Vec<U>>>,
    dependencies: Option<Rc<dyn Fn(&dyn Assignment<U, V>, &U) -> Vec<U>>>,
}

impl<U, V> FiniteSystemBuilder<U, V>
where
    U: Clone + Eq + Hash + Debug + 'static,
    V: Clone + 'static,
{
    pub fn new(body: Body<U, V>) -> Self {
        Self {
            body,
            initial: None,
            unknowns: Vec::new(),
            inputs: None,
            influence: None,
            dependencies: None,
        }
    }

    pub fn unknowns(&mut self, unknowns: impl IntoIterator<Item = U>) -> &mut Self {
        self.unknowns.extend(unknowns);
        self
    }

    /// Declares the input unknowns. When never called, every unknown
    /// counts as an input.
    pub fn inputs(&mut self, inputs: impl IntoIterator<Item = U>) -> &mut Self {
        self.inputs.get_or_insert_with(Vec::new).extend(inputs);
        self
    }

    pub fn initial(&mut self, initial: InputAssignment<U, V>) -> &mut Self {
        self.initial = Some(initial);
        self
    }

    /// The static influence relation: `influence(x)` lists the unknowns
    /// whose right-hand sides must be re-evaluated when `ρ(x)` changes.
    /// Defaults to the empty relation.
    pub fn influence(&mut self, influence: impl Fn(&U) -> Vec<U> + 'static) -> &mut Self {
        self.influence = Some(Rc::new(influence));
        self
    }

    /// An explicit dependency function, overriding the recording proxy.
    /// Debug builds cross-check it against what the body actually reads.
    pub fn dependencies(
        &mut self,
        dependencies: impl Fn(&dyn Assignment<U, V>, &U) -> Vec<U> + 'static,
    ) -> &mut Self {
        self.dependencies = Some(Rc::new(dependencies));
        self
    }

    pub fn build(&self) -> Result<FiniteSystem<U, V>, SystemError<U>> {
        let initial = self.initial.clone().ok_or(SystemError::MissingInitial)?;

        let mut seen = HashSet::new();
        for u in &self.unknowns {
            if !seen.insert(u.clone()) {
                return Err(SystemError::DuplicateUnknown(u.clone()));
            }
        }

        let input_unknowns: Rc<dyn Fn(&U) -> bool> = match &self.inputs {
            Some(inputs) => {
                for u in inputs {
                    if !seen.contains(u) {
                        return Err(SystemError::UnknownInput(u.clone()));
                    }
                }
                let inputs: HashSet<U> = inputs.iter().cloned().collect();
                Rc::new(move |u| inputs.contains(u))
            }
            None => Rc::new(|_| true),
        };

        Ok(FiniteSystem {
            body: self.body.clone(),
            dependencies: self.dependencies.clone(),
            boxes: BoxAssignment::empty(),
            initial,
            input_unknowns,
            unknowns: self.unknowns.clone(),
            influence: self
                .influence
                .clone()
                .unwrap_or_else(|| Rc::new(|_| Vec::new())),
            diagonal: false,
            tracer: None,
        })
    }
}
