//! Right-hand sides of equation systems.
//!
//! A [`Body`] maps an assignment snapshot to a new value for each
//! unknown. Bodies are pure: evaluating one never mutates the assignment
//! it reads. Decorators compose new bodies out of old ones without
//! touching the originals.

use std::fmt;
use std::rc::Rc;

use crate::algebra::Magma;
use crate::assignment::{Assignment, PartialAssignment, RecordingAssignment};
use crate::boxes::BoxAssignment;

enum BodyRepr<U, V> {
    Identity,
    Fn(Rc<dyn Fn(&dyn Assignment<U, V>, &U) -> V>),
}

/// The right-hand side `F : ρ ↦ (u ↦ v)` of an equation system,
/// evaluated per unknown.
pub struct Body<U, V> {
    repr: BodyRepr<U, V>,
}

impl<U, V> Clone for Body<U, V> {
    fn clone(&self) -> Self {
        let repr = match &self.repr {
            BodyRepr::Identity => BodyRepr::Identity,
            BodyRepr::Fn(f) => BodyRepr::Fn(Rc::clone(f)),
        };
        Self { repr }
    }
}

impl<U, V> fmt::Debug for Body<U, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.repr {
            BodyRepr::Identity => f.write_str("Body::identity"),
            BodyRepr::Fn(f_ptr) => write!(f, "Body::from_fn({:p})", Rc::as_ptr(f_ptr)),
        }
    }
}

/// Bodies compare by their function object: all identity bodies are one
/// value, and wrapped functions are equal only to their own clones.
impl<U, V> PartialEq for Body<U, V> {
    fn eq(&self, other: &Self) -> bool {
        match (&self.repr, &other.repr) {
            (BodyRepr::Identity, BodyRepr::Identity) => true,
            (BodyRepr::Fn(a), BodyRepr::Fn(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl<U, V> Body<U, V> {
    /// The body returning its input assignment unchanged. Zero-sized;
    /// every call yields the same singleton value.
    pub fn identity() -> Self {
        Self {
            repr: BodyRepr::Identity,
        }
    }

    pub fn from_fn(f: impl Fn(&dyn Assignment<U, V>, &U) -> V + 'static) -> Self {
        Self {
            repr: BodyRepr::Fn(Rc::new(f)),
        }
    }

    pub fn is_identity(&self) -> bool {
        matches!(self.repr, BodyRepr::Identity)
    }

    pub fn eval(&self, rho: &dyn Assignment<U, V>, u: &U) -> V {
        match &self.repr {
            BodyRepr::Identity => rho.get(u),
            BodyRepr::Fn(f) => f(rho, u),
        }
    }

    /// Evaluates the body once against a recording proxy, returning the
    /// value together with every unknown consulted to produce it.
    pub fn eval_with_dependencies(&self, rho: &dyn Assignment<U, V>, u: &U) -> (V, Vec<U>)
    where
        U: Clone,
    {
        let proxy = RecordingAssignment::new(rho);
        let v = self.eval(&proxy, u);
        (v, proxy.into_observed())
    }
}

impl<U, V> Body<U, V>
where
    U: 'static,
    V: Clone + 'static,
{
    /// Post-composes the assigned boxes: where `boxes` is defined at `x`
    /// the new body computes `B(x)(ρ(x), F(ρ)(x))`, elsewhere it is
    /// unchanged. Decorating with an empty assignment returns the body
    /// itself.
    pub fn with_box_assignment(&self, boxes: &BoxAssignment<U, V>) -> Self {
        if boxes.is_empty() {
            return self.clone();
        }
        let boxes = boxes.copy();
        let inner = self.clone();
        Self::from_fn(move |rho: &dyn Assignment<U, V>, u: &U| {
            let raw = inner.eval(rho, u);
            match boxes.get(u) {
                Some(bx) => bx.apply(&rho.get(u), raw),
                None => raw,
            }
        })
    }

    /// Combines a base value into the body wherever `init` is defined:
    /// `F'(ρ)(x) = comb(init(x), F(ρ)(x))`.
    pub fn with_base_assignment(
        &self,
        init: impl PartialAssignment<U, V> + 'static,
        comb: impl Magma<V> + 'static,
    ) -> Self {
        let inner = self.clone();
        Self::from_fn(move |rho: &dyn Assignment<U, V>, u: &U| {
            let v = inner.eval(rho, u);
            match init.get(u) {
                Some(base) => comb.op(base, v),
                None => v,
            }
        })
    }
}

#[cfg(test)]
mod test {
    use std::collections::HashMap;

    use super::*;
    use crate::assignment::InputAssignment;
    use crate::boxes::ValueBox;

    #[test]
    fn identity_reads_through() {
        let rho = InputAssignment::from_fn(|u: &u32| u + 1);
        let body = Body::identity();
        assert_eq!(body.eval(&rho, &3), 4);
    }

    #[test]
    fn identities_are_one_value() {
        assert_eq!(Body::<u32, i64>::identity(), Body::identity());
        assert!(Body::<u32, i64>::identity() != Body::from_fn(|rho, u| rho.get(u)));
    }

    #[test]
    fn base_assignment_combines_where_defined() {
        let rho = InputAssignment::constant(10);
        let body: Body<&str, i64> = Body::identity()
            .with_base_assignment(HashMap::from([("x", 5)]), |base: i64, v| base + v);

        assert_eq!(body.eval(&rho, &"x"), 15);
        assert_eq!(body.eval(&rho, &"y"), 10);
    }

    #[test]
    fn empty_box_assignment_is_the_identity_decoration() {
        let body: Body<u32, i64> = Body::from_fn(|rho, u| rho.get(u));
        assert_eq!(body.with_box_assignment(&BoxAssignment::empty()), body);
    }

    #[test]
    fn box_assignment_applies_where_defined() {
        let rho = InputAssignment::constant(2);
        let boxes = BoxAssignment::selective(
            HashMap::from([("x", ValueBox::from_fn(|old: &i64, new| old * new))]),
            true,
        );
        let body: Body<&str, i64> =
            Body::from_fn(|rho, u| rho.get(u) + 1).with_box_assignment(&boxes);

        assert_eq!(body.eval(&rho, &"x"), 6);
        assert_eq!(body.eval(&rho, &"y"), 3);
    }

    #[test]
    fn dependencies_cover_consulted_unknowns() {
        let rho = InputAssignment::from_fn(|u: &u32| i64::from(*u));
        let body: Body<u32, i64> = Body::from_fn(|rho, _| rho.get(&1) + rho.get(&2));
        let (v, deps) = body.eval_with_dependencies(&rho, &0);

        assert_eq!(v, 3);
        assert_eq!(deps, vec![1, 2]);
    }
}
