//! Mappings from unknowns to values.
//!
//! Three flavors exist. An *input* assignment is a total, immutable
//! function and is what solvers start from. A *partial* assignment is
//! defined on a subset of the unknowns and answers membership queries;
//! base assignments and box selections are partial. The *mutable*
//! assignment is the solver's working state: explicit bindings layered
//! over a shared input-assignment fallback.

use std::cell::RefCell;
use std::collections::HashMap;
use std::hash::Hash;
use std::rc::Rc;

/// A total, read-only view of an assignment `ρ : U → V`.
pub trait Assignment<U, V> {
    fn get(&self, u: &U) -> V;
}

/// A total assignment backed by a shared function. Cloning is cheap and
/// clones observe the same function.
pub struct InputAssignment<U, V> {
    f: Rc<dyn Fn(&U) -> V>,
}

impl<U, V> Clone for InputAssignment<U, V> {
    fn clone(&self) -> Self {
        Self {
            f: Rc::clone(&self.f),
        }
    }
}

impl<U, V> InputAssignment<U, V> {
    pub fn from_fn(f: impl Fn(&U) -> V + 'static) -> Self {
        Self { f: Rc::new(f) }
    }

    /// The assignment sending every unknown to `v`.
    pub fn constant(v: V) -> Self
    where
        V: Clone + 'static,
    {
        Self::from_fn(move |_| v.clone())
    }
}

impl<U, V> Assignment<U, V> for InputAssignment<U, V> {
    fn get(&self, u: &U) -> V {
        (self.f)(u)
    }
}

/// An assignment defined on a subset of the unknowns.
pub trait PartialAssignment<U, V> {
    fn get(&self, u: &U) -> Option<V>;

    fn is_defined_at(&self, u: &U) -> bool {
        self.get(u).is_some()
    }
}

/// A [`PartialAssignment`] backed by a function returning `None`
/// outside its domain.
pub struct FnPartialAssignment<F>(pub F);

impl<U, V, F> PartialAssignment<U, V> for FnPartialAssignment<F>
where
    F: Fn(&U) -> Option<V>,
{
    fn get(&self, u: &U) -> Option<V> {
        (self.0)(u)
    }
}

impl<U, V> PartialAssignment<U, V> for HashMap<U, V>
where
    U: Eq + Hash,
    V: Clone,
{
    fn get(&self, u: &U) -> Option<V> {
        HashMap::get(self, u).cloned()
    }

    fn is_defined_at(&self, u: &U) -> bool {
        self.contains_key(u)
    }
}

/// The solver's working state: explicit bindings over a fallback.
///
/// Reading an unknown with no explicit binding yields the fallback's
/// value and does *not* create a binding; only [`set`](Self::set) binds.
/// Single-owner — a solver creates one per run and hands it back as the
/// result.
pub struct MutableAssignment<U, V> {
    bindings: HashMap<U, V>,
    fallback: InputAssignment<U, V>,
}

impl<U, V> MutableAssignment<U, V>
where
    U: Clone + Eq + Hash,
    V: Clone,
{
    pub fn new(fallback: InputAssignment<U, V>) -> Self {
        Self {
            bindings: HashMap::new(),
            fallback,
        }
    }

    /// Records an explicit binding for `u`.
    pub fn set(&mut self, u: U, v: V) {
        self.bindings.insert(u, v);
    }

    /// Whether an explicit binding has been recorded for `u`.
    pub fn is_defined_at(&self, u: &U) -> bool {
        self.bindings.contains_key(u)
    }

    /// The explicitly bound unknowns, in no particular order.
    pub fn bindings(&self) -> impl Iterator<Item = (&U, &V)> {
        self.bindings.iter()
    }

    pub fn into_bindings(self) -> HashMap<U, V> {
        self.bindings
    }

    /// An immutable total view of the current state. Later writes to
    /// `self` are not visible through the snapshot.
    pub fn snapshot(&self) -> InputAssignment<U, V>
    where
        U: 'static,
        V: 'static,
    {
        let bindings = self.bindings.clone();
        let fallback = self.fallback.clone();
        InputAssignment::from_fn(move |u| {
            bindings
                .get(u)
                .cloned()
                .unwrap_or_else(|| fallback.get(u))
        })
    }
}

impl<U, V> Assignment<U, V> for MutableAssignment<U, V>
where
    U: Clone + Eq + Hash,
    V: Clone,
{
    fn get(&self, u: &U) -> V {
        self.bindings
            .get(u)
            .cloned()
            .unwrap_or_else(|| self.fallback.get(u))
    }
}

/// A proxy that records every unknown consulted through it. One
/// evaluation of a body against the proxy yields the body's value
/// together with its dependency set.
pub struct RecordingAssignment<'a, U, V> {
    inner: &'a dyn Assignment<U, V>,
    observed: RefCell<Vec<U>>,
}

impl<'a, U, V> RecordingAssignment<'a, U, V> {
    pub fn new(inner: &'a dyn Assignment<U, V>) -> Self {
        Self {
            inner,
            observed: RefCell::new(Vec::new()),
        }
    }

    /// The consulted unknowns, in consultation order, duplicates kept.
    pub fn into_observed(self) -> Vec<U> {
        self.observed.into_inner()
    }
}

impl<U, V> Assignment<U, V> for RecordingAssignment<'_, U, V>
where
    U: Clone,
{
    fn get(&self, u: &U) -> V {
        self.observed.borrow_mut().push(u.clone());
        self.inner.get(u)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn reading_through_the_fallback_does_not_bind() {
        let mut rho = MutableAssignment::new(InputAssignment::constant(7));
        assert_eq!(rho.get(&"x"), 7);
        assert!(!rho.is_defined_at(&"x"));

        rho.set("x", 8);
        assert_eq!(rho.get(&"x"), 8);
        assert!(rho.is_defined_at(&"x"));
    }

    #[test]
    fn snapshots_are_immutable_views() {
        let mut rho = MutableAssignment::new(InputAssignment::constant(0));
        rho.set('a', 1);
        let snapshot = rho.snapshot();
        rho.set('a', 2);

        assert_eq!(snapshot.get(&'a'), 1);
        assert_eq!(snapshot.get(&'b'), 0);
        assert_eq!(rho.get(&'a'), 2);
    }

    #[test]
    fn recording_proxy_observes_reads() {
        let rho = InputAssignment::from_fn(|u: &u32| u * 10);
        let proxy = RecordingAssignment::new(&rho);
        assert_eq!(proxy.get(&1), 10);
        assert_eq!(proxy.get(&3), 30);
        assert_eq!(proxy.get(&1), 10);
        assert_eq!(proxy.into_observed(), vec![1, 3, 1]);
    }
}
