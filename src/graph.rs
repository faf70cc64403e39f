//! Equation systems presented as directed hypergraphs.
//!
//! Every equation is contributed by *hyper-edges*: an edge reads any
//! number of source unknowns and feeds one target. The right-hand side
//! of an unknown is the witness join of its ingoing edge actions, and
//! the influence relation falls out of the edge structure for free.
//! The payoff of the presentation is *localization*: widening and
//! narrowing can be inserted on exactly the back edges selected by an
//! unknown ordering, instead of at every unknown.

use std::collections::{HashMap, HashSet};
use std::fmt::Debug;
use std::hash::Hash;
use std::rc::Rc;

use derive_more::{From, Into};

use crate::algebra::{Domain, Magma, UnknownOrdering};
use crate::assignment::{Assignment, InputAssignment, PartialAssignment};
use crate::body::Body;
use crate::boxes::BoxAssignment;
use crate::error::SystemError;
use crate::system::{EquationSystem, FiniteEquationSystem, FiniteSystem};
use crate::tracer::system_trace;
use crate::tracer::EquationSystemTracer;

/// ID of a hyper-edge, assigned in insertion order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, From, Into)]
pub struct EdgeId(pub usize);

pub(crate) struct EdgeData<U, V> {
    target: U,
    sources: Vec<U>,
    action: Rc<dyn Fn(&dyn Assignment<U, V>) -> V>,
}

impl<U, V> Clone for EdgeData<U, V>
where
    U: Clone,
{
    fn clone(&self) -> Self {
        Self {
            target: self.target.clone(),
            sources: self.sources.clone(),
            action: Rc::clone(&self.action),
        }
    }
}

/// A finite equation system derived from a hypergraph.
pub struct GraphSystem<U, V> {
    edges: Vec<EdgeData<U, V>>,
    outgoing: HashMap<U, Vec<EdgeId>>,
    ingoing: HashMap<U, Vec<EdgeId>>,
    unknowns: Vec<U>,
    inputs: HashSet<U>,
    initial: InputAssignment<U, V>,
    domain: Rc<dyn Domain<V>>,
    tracer: Option<Rc<dyn EquationSystemTracer<U, V>>>,
}

impl<U, V> Clone for GraphSystem<U, V>
where
    U: Clone,
{
    fn clone(&self) -> Self {
        Self {
            edges: self.edges.clone(),
            outgoing: self.outgoing.clone(),
            ingoing: self.ingoing.clone(),
            unknowns: self.unknowns.clone(),
            inputs: self.inputs.clone(),
            initial: self.initial.clone(),
            domain: Rc::clone(&self.domain),
            tracer: self.tracer.clone(),
        }
    }
}

impl<U, V> GraphSystem<U, V>
where
    U: Clone + Eq + Hash,
    V: Clone,
{
    pub fn target(&self, e: EdgeId) -> &U {
        &self.edges[e.0].target
    }

    pub fn sources(&self, e: EdgeId) -> &[U] {
        &self.edges[e.0].sources
    }

    /// Evaluates the action of edge `e` against `rho`.
    pub fn edge_action(&self, rho: &dyn Assignment<U, V>, e: EdgeId) -> V {
        (self.edges[e.0].action)(rho)
    }

    pub fn outgoing(&self, u: &U) -> &[EdgeId] {
        self.outgoing.get(u).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn ingoing(&self, u: &U) -> &[EdgeId] {
        self.ingoing.get(u).map(Vec::as_slice).unwrap_or(&[])
    }

    /// The join of the ingoing edge actions; an unknown with no defining
    /// edges is stationary and evaluates to its own current value.
    fn evaluate_raw(&self, rho: &dyn Assignment<U, V>, x: &U) -> V {
        let mut acc: Option<V> = None;
        for e in self.ingoing(x) {
            let contribution = (self.edges[e.0].action)(rho);
            acc = Some(match acc {
                None => contribution,
                Some(v) => self.domain.upper_bound(v, contribution),
            });
        }
        acc.unwrap_or_else(|| rho.get(x))
    }

    /// The sources of the ingoing edges of `x`, deduplicated in first
    /// appearance order.
    fn static_dependencies(&self, x: &U) -> Vec<U> {
        let mut deps = Vec::new();
        for e in self.ingoing(x) {
            for s in &self.edges[e.0].sources {
                if !deps.contains(s) {
                    deps.push(s.clone());
                }
            }
        }
        deps
    }
}

impl<U, V> EquationSystem<U, V> for GraphSystem<U, V>
where
    U: Clone + Eq + Hash,
    V: Clone,
{
    fn apply(&self, rho: &dyn Assignment<U, V>, u: &U) -> V {
        system_trace!(self, pre_evaluation(rho, u));
        let raw = self.evaluate_raw(rho, u);
        system_trace!(self, post_evaluation(rho, u, &raw));
        system_trace!(self, no_box_evaluation(rho, u, &raw));
        raw
    }

    fn apply_with_dependencies(&self, rho: &dyn Assignment<U, V>, u: &U) -> (V, Vec<U>) {
        (self.apply(rho, u), self.static_dependencies(u))
    }

    fn initial(&self) -> InputAssignment<U, V> {
        self.initial.clone()
    }

    fn is_input_unknown(&self, u: &U) -> bool {
        self.inputs.contains(u)
    }
}

impl<U, V> FiniteEquationSystem<U, V> for GraphSystem<U, V>
where
    U: Clone + Eq + Hash,
    V: Clone,
{
    fn unknowns(&self) -> &[U] {
        &self.unknowns
    }

    fn infl(&self, u: &U) -> Vec<U> {
        let mut dependents = Vec::new();
        for e in self.outgoing(u) {
            let target = &self.edges[e.0].target;
            if !dependents.contains(target) {
                dependents.push(target.clone());
            }
        }
        dependents
    }
}

impl<U, V> GraphSystem<U, V>
where
    U: Clone + Eq + Hash + 'static,
    V: Clone + 'static,
{
    /// Attaches a tracer fired around every evaluation.
    pub fn with_tracer(&self, tracer: impl EquationSystemTracer<U, V> + 'static) -> Self {
        let mut system = self.clone();
        system.tracer = Some(Rc::new(tracer));
        system
    }

    /// Forgets the edge structure, keeping the derived body, dependency
    /// and influence functions.
    pub fn to_finite(&self) -> FiniteSystem<U, V> {
        let graph = Rc::new(self.clone());
        let body = {
            let graph = Rc::clone(&graph);
            Body::from_fn(move |rho: &dyn Assignment<U, V>, x: &U| graph.evaluate_raw(rho, x))
        };
        let dependencies: Rc<dyn Fn(&dyn Assignment<U, V>, &U) -> Vec<U>> = {
            let graph = Rc::clone(&graph);
            // A stationary unknown reads itself, so the flat dependency
            // set must say so.
            Rc::new(move |_rho: &dyn Assignment<U, V>, x: &U| {
                if graph.ingoing(x).is_empty() {
                    vec![x.clone()]
                } else {
                    graph.static_dependencies(x)
                }
            })
        };
        let influence: Rc<dyn Fn(&U) -> Vec<U>> = {
            let graph = Rc::clone(&graph);
            Rc::new(move |u: &U| graph.infl(u))
        };
        let inputs = self.inputs.clone();

        FiniteSystem {
            body,
            dependencies: Some(dependencies),
            boxes: BoxAssignment::empty(),
            initial: self.initial.clone(),
            input_unknowns: Rc::new(move |u| inputs.contains(u)),
            unknowns: self.unknowns.clone(),
            influence,
            diagonal: false,
            tracer: self.tracer.clone(),
        }
    }

    /// Installs a per-unknown box over the whole body. The rewrite is
    /// per unknown, not per edge, so the result is flat.
    pub fn with_boxes(&self, boxes: &BoxAssignment<U, V>) -> FiniteSystem<U, V> {
        self.to_finite().with_boxes(boxes)
    }

    /// Combines `init` into the derived body wherever it is defined.
    /// The result is flat.
    pub fn with_base_assignment(
        &self,
        init: impl PartialAssignment<U, V> + 'static,
        comb: impl Magma<V> + 'static,
    ) -> FiniteSystem<U, V> {
        self.to_finite().with_base_assignment(init, comb)
    }

    /// Inserts boxes on back edges only: an edge gets the box of its
    /// target `x` when some source `s` satisfies `x ≤ s` under
    /// `ordering`. With a non-idempotent assignment the edge structure
    /// is rewritten too — each boxed edge gains its target as a source
    /// and as an outgoing edge of the target — so that the box re-fires
    /// when the value it reads changes. An idempotent assignment leaves
    /// the structure untouched.
    pub fn with_localized_boxes(
        &self,
        boxes: &BoxAssignment<U, V>,
        ordering: impl UnknownOrdering<U> + 'static,
    ) -> Self {
        if boxes.is_empty() {
            return self.clone();
        }
        let boxes = boxes.copy();
        let idempotent = boxes.boxes_are_idempotent();
        let mut system = self.clone();
        for (index, edge) in system.edges.iter_mut().enumerate() {
            let x = edge.target.clone();
            let Some(bx) = boxes.get(&x) else {
                continue;
            };
            if !edge.sources.iter().any(|s| ordering.lteq(&x, s)) {
                continue;
            }
            let inner = Rc::clone(&edge.action);
            let target = x.clone();
            edge.action = Rc::new(move |rho: &dyn Assignment<U, V>| {
                bx.apply(&rho.get(&target), inner(rho))
            });
            if !idempotent {
                if !edge.sources.contains(&x) {
                    edge.sources.push(x.clone());
                }
                let outgoing = system.outgoing.entry(x.clone()).or_default();
                if !outgoing.contains(&EdgeId(index)) {
                    outgoing.push(EdgeId(index));
                }
            }
        }
        system
    }

    /// Localized warrowing: per edge the contribution is paired with a
    /// "wants widening" flag (back edge whose contribution is not below
    /// the current value), the pairs are reduced with `(⊔, ∨)`, and the
    /// reduced pair picks the widening, the narrowing, or neither.
    ///
    /// The comparisons cannot be factored back into per-edge actions, so
    /// the result is flat. Influence gains the diagonal unless both
    /// assignments are idempotent.
    ///
    /// This construction is experimental: it composes widening and
    /// narrowing more aggressively than the classic two-phase scheme,
    /// and its convergence has not been established for non-monotone
    /// bodies.
    pub fn with_localized_warrowing(
        &self,
        widenings: &BoxAssignment<U, V>,
        narrowings: &BoxAssignment<U, V>,
        ordering: impl UnknownOrdering<U> + 'static,
    ) -> FiniteSystem<U, V> {
        let widenings = widenings.copy();
        let narrowings = narrowings.copy();
        let diagonal =
            !(widenings.boxes_are_idempotent() && narrowings.boxes_are_idempotent());
        let graph = Rc::new(self.clone());

        let body = {
            let graph = Rc::clone(&graph);
            Body::from_fn(move |rho: &dyn Assignment<U, V>, x: &U| {
                let mut edges = graph.ingoing(x).iter();
                let Some(first) = edges.next() else {
                    return rho.get(x);
                };
                let old = rho.get(x);
                let contribute = |e: EdgeId| {
                    let edge = &graph.edges[e.0];
                    let contribution = (edge.action)(rho);
                    let widen = edge.sources.iter().any(|s| ordering.lteq(x, s))
                        && !graph.domain.lteq(&contribution, &old);
                    (contribution, widen)
                };
                let (mut result, mut any_widen) = contribute(*first);
                for e in edges {
                    let (contribution, widen) = contribute(*e);
                    result = graph.domain.upper_bound(result, contribution);
                    any_widen = any_widen || widen;
                }
                if any_widen {
                    match widenings.get(x) {
                        Some(bx) => bx.apply(&old, result),
                        None => result,
                    }
                } else if graph.domain.lt(&result, &old) {
                    match narrowings.get(x) {
                        Some(bx) => bx.apply(&old, result),
                        None => result,
                    }
                } else {
                    result
                }
            })
        };
        let dependencies: Rc<dyn Fn(&dyn Assignment<U, V>, &U) -> Vec<U>> = {
            let graph = Rc::clone(&graph);
            // The warrowed body always reads the current value of `x`.
            Rc::new(move |_rho: &dyn Assignment<U, V>, x: &U| {
                let mut deps = graph.static_dependencies(x);
                if !deps.contains(x) {
                    deps.push(x.clone());
                }
                deps
            })
        };
        let influence: Rc<dyn Fn(&U) -> Vec<U>> = {
            let graph = Rc::clone(&graph);
            Rc::new(move |u: &U| graph.infl(u))
        };
        let inputs = self.inputs.clone();

        FiniteSystem {
            body,
            dependencies: Some(dependencies),
            boxes: BoxAssignment::empty(),
            initial: self.initial.clone(),
            input_unknowns: Rc::new(move |u| inputs.contains(u)),
            unknowns: self.unknowns.clone(),
            influence,
            diagonal,
            tracer: self.tracer.clone(),
        }
    }
}

/// Builds a [`GraphSystem`] edge by edge, validating the structure.
pub struct GraphSystemBuilder<U, V> {
    unknowns: Vec<U>,
    inputs: Vec<U>,
    edges: Vec<EdgeData<U, V>>,
    initial: Option<InputAssignment<U, V>>,
    domain: Rc<dyn Domain<V>>,
}

impl<U, V> GraphSystemBuilder<U, V>
where
    U: Clone + Eq + Hash + Debug + 'static,
    V: Clone + 'static,
{
    pub fn new(domain: impl Domain<V> + 'static) -> Self {
        Self {
            unknowns: Vec::new(),
            inputs: Vec::new(),
            edges: Vec::new(),
            initial: None,
            domain: Rc::new(domain),
        }
    }

    pub fn unknowns(&mut self, unknowns: impl IntoIterator<Item = U>) -> &mut Self {
        self.unknowns.extend(unknowns);
        self
    }

    pub fn input(&mut self, u: U) -> &mut Self {
        self.inputs.push(u);
        self
    }

    pub fn inputs(&mut self, inputs: impl IntoIterator<Item = U>) -> &mut Self {
        self.inputs.extend(inputs);
        self
    }

    pub fn initial(&mut self, initial: InputAssignment<U, V>) -> &mut Self {
        self.initial = Some(initial);
        self
    }

    /// Adds a hyper-edge feeding `target` from `sources`. The action
    /// must consult exactly the sources it declares — the dependency
    /// sets the system reports are derived from the declaration.
    pub fn edge(
        &mut self,
        target: U,
        sources: Vec<U>,
        action: impl Fn(&dyn Assignment<U, V>) -> V + 'static,
    ) -> EdgeId {
        let id = EdgeId(self.edges.len());
        self.edges.push(EdgeData {
            target,
            sources,
            action: Rc::new(action),
        });
        id
    }

    pub fn build(&self) -> Result<GraphSystem<U, V>, SystemError<U>> {
        let initial = self.initial.clone().ok_or(SystemError::MissingInitial)?;

        let mut declared = HashSet::new();
        for u in &self.unknowns {
            if !declared.insert(u.clone()) {
                return Err(SystemError::DuplicateUnknown(u.clone()));
            }
        }
        for u in &self.inputs {
            if !declared.contains(u) {
                return Err(SystemError::UnknownInput(u.clone()));
            }
        }

        let mut outgoing: HashMap<U, Vec<EdgeId>> = HashMap::new();
        let mut ingoing: HashMap<U, Vec<EdgeId>> = HashMap::new();
        for (index, edge) in self.edges.iter().enumerate() {
            if !declared.contains(&edge.target) {
                return Err(SystemError::UnknownEdgeTarget(edge.target.clone()));
            }
            let id = EdgeId(index);
            for s in &edge.sources {
                if !declared.contains(s) {
                    return Err(SystemError::UnknownEdgeSource(s.clone()));
                }
                let outgoing = outgoing.entry(s.clone()).or_default();
                if !outgoing.contains(&id) {
                    outgoing.push(id);
                }
            }
            ingoing.entry(edge.target.clone()).or_default().push(id);
        }

        Ok(GraphSystem {
            edges: self.edges.clone(),
            outgoing,
            ingoing,
            unknowns: self.unknowns.clone(),
            inputs: self.inputs.iter().cloned().collect(),
            initial,
            domain: Rc::clone(&self.domain),
            tracer: None,
        })
    }
}
