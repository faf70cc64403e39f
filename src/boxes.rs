//! Boxes — binary "combine old with new" operators — and their
//! per-unknown assignments.
//!
//! A box `β : V × V → V` interprets as "given the value currently stored
//! for an unknown and the value the body just computed, produce the value
//! to store". Widenings and narrowings are boxes; so is plain
//! replacement. A box is *idempotent* when `β(x, β(x, y)) = β(x, y)` for
//! all `x, y`; solvers exploit idempotence, so a [`BoxAssignment`]
//! carries the flag globally.

use std::cell::RefCell;
use std::collections::HashMap;
use std::hash::Hash;
use std::rc::Rc;

use crate::algebra::Domain;

/// A binary operator combining an old value with a freshly computed one.
/// Cloning is cheap and clones share the underlying function.
pub struct ValueBox<V> {
    f: Rc<dyn Fn(&V, V) -> V>,
}

impl<V> Clone for ValueBox<V> {
    fn clone(&self) -> Self {
        Self {
            f: Rc::clone(&self.f),
        }
    }
}

impl<V> ValueBox<V> {
    pub fn from_fn(f: impl Fn(&V, V) -> V + 'static) -> Self {
        Self { f: Rc::new(f) }
    }

    pub fn apply(&self, old: &V, new: V) -> V {
        (self.f)(old, new)
    }

    /// Keeps the freshly computed value. Idempotent.
    pub fn right() -> Self
    where
        V: 'static,
    {
        Self::from_fn(|_, new| new)
    }

    /// Keeps the old value. Idempotent.
    pub fn left() -> Self
    where
        V: Clone + 'static,
    {
        Self::from_fn(|old: &V, _| old.clone())
    }

    /// The join box `β(old, new) = old ⊔ new`. Idempotent whenever the
    /// witness upper bound is.
    pub fn from_domain(domain: impl Domain<V> + 'static) -> Self
    where
        V: Clone + 'static,
    {
        Self::from_fn(move |old: &V, new| domain.upper_bound(old.clone(), new))
    }

    /// The warrowing of a widening and a narrowing: widens when the new
    /// value is not below the old one, otherwise narrows. Idempotent iff
    /// both parts are.
    pub fn warrowing(
        widening: ValueBox<V>,
        narrowing: ValueBox<V>,
        domain: impl Domain<V> + 'static,
    ) -> Self
    where
        V: 'static,
    {
        Self::from_fn(move |old, new| {
            if domain.lteq(&new, old) {
                narrowing.apply(old, new)
            } else {
                widening.apply(old, new)
            }
        })
    }
}

/// A source of box assignments that closes over mutable state, e.g.
/// per-unknown application counters. [`instantiate`](Self::instantiate)
/// must deep-copy that state so distinct solves never share it.
pub trait StatefulBoxes<U, V> {
    fn instantiate(&self) -> BoxAssignment<U, V>;

    fn boxes_are_idempotent(&self) -> bool;
}

enum Repr<U, V> {
    Empty,
    Pure {
        select: Rc<dyn Fn(&U) -> Option<ValueBox<V>>>,
        idempotent: bool,
    },
    Stateful(Rc<dyn StatefulBoxes<U, V>>),
}

impl<U, V> Clone for Repr<U, V> {
    fn clone(&self) -> Self {
        match self {
            Repr::Empty => Repr::Empty,
            Repr::Pure { select, idempotent } => Repr::Pure {
                select: Rc::clone(select),
                idempotent: *idempotent,
            },
            Repr::Stateful(s) => Repr::Stateful(Rc::clone(s)),
        }
    }
}

/// A per-unknown selection of boxes.
///
/// The assignment is a sum of a *pure* variant, for which
/// [`copy`](Self::copy) is the identity, and a *stateful* variant, for
/// which `copy` instantiates fresh internal state. Decorators always work
/// on a defensive `copy`, so the stateful contract holds as long as a
/// system decorated with a stateful assignment is decorated freshly for
/// each solve. Querying a stateful assignment that was never copied is a
/// contract violation and aborts.
pub struct BoxAssignment<U, V> {
    repr: Repr<U, V>,
}

impl<U, V> Clone for BoxAssignment<U, V> {
    fn clone(&self) -> Self {
        Self {
            repr: self.repr.clone(),
        }
    }
}

impl<U, V> BoxAssignment<U, V> {
    /// The assignment defined nowhere. Decorating with it is the
    /// identity.
    pub fn empty() -> Self {
        Self { repr: Repr::Empty }
    }

    pub fn from_fn(
        select: impl Fn(&U) -> Option<ValueBox<V>> + 'static,
        idempotent: bool,
    ) -> Self {
        Self {
            repr: Repr::Pure {
                select: Rc::new(select),
                idempotent,
            },
        }
    }

    /// The same box at every unknown.
    pub fn uniform(bx: ValueBox<V>, idempotent: bool) -> Self
    where
        U: 'static,
        V: 'static,
    {
        Self::from_fn(move |_| Some(bx.clone()), idempotent)
    }

    /// Boxes for exactly the unknowns in `boxes`.
    pub fn selective(boxes: HashMap<U, ValueBox<V>>, idempotent: bool) -> Self
    where
        U: Eq + Hash + 'static,
        V: 'static,
    {
        let boxes = Rc::new(boxes);
        Self::from_fn(move |u| boxes.get(u).cloned(), idempotent)
    }

    pub fn stateful(source: impl StatefulBoxes<U, V> + 'static) -> Self {
        Self {
            repr: Repr::Stateful(Rc::new(source)),
        }
    }

    /// A delayed widening: each unknown is widened for its first `delay`
    /// box applications and narrowed afterwards. Stateful — the counters
    /// live in each copy — and never idempotent.
    pub fn cautious(widening: ValueBox<V>, narrowing: ValueBox<V>, delay: usize) -> Self
    where
        U: Clone + Eq + Hash + 'static,
        V: 'static,
    {
        Self::stateful(CautiousBoxes {
            widening,
            narrowing,
            delay,
        })
    }

    /// The copy a solve must work on: the identity for pure assignments,
    /// a fresh instantiation of the internal state for stateful ones.
    pub fn copy(&self) -> Self {
        match &self.repr {
            Repr::Empty | Repr::Pure { .. } => self.clone(),
            Repr::Stateful(source) => source.instantiate(),
        }
    }

    /// The box for `u`, if one is assigned.
    ///
    /// # Panics
    ///
    /// Panics on a stateful assignment that was never
    /// [`copy`](Self::copy)-ed: its boxes do not exist until the state is
    /// instantiated.
    pub fn get(&self, u: &U) -> Option<ValueBox<V>> {
        match &self.repr {
            Repr::Empty => None,
            Repr::Pure { select, .. } => select(u),
            Repr::Stateful(_) => {
                panic!("a stateful box assignment must be copied before use")
            }
        }
    }

    pub fn is_defined_at(&self, u: &U) -> bool {
        self.get(u).is_some()
    }

    pub fn is_empty(&self) -> bool {
        matches!(self.repr, Repr::Empty)
    }

    /// True only when every box this assignment yields is idempotent.
    pub fn boxes_are_idempotent(&self) -> bool {
        match &self.repr {
            Repr::Empty => true,
            Repr::Pure { idempotent, .. } => *idempotent,
            Repr::Stateful(source) => source.boxes_are_idempotent(),
        }
    }
}

struct CautiousBoxes<V> {
    widening: ValueBox<V>,
    narrowing: ValueBox<V>,
    delay: usize,
}

impl<U, V> StatefulBoxes<U, V> for CautiousBoxes<V>
where
    U: Clone + Eq + Hash + 'static,
    V: 'static,
{
    fn instantiate(&self) -> BoxAssignment<U, V> {
        let counters: Rc<RefCell<HashMap<U, usize>>> = Rc::new(RefCell::new(HashMap::new()));
        let widening = self.widening.clone();
        let narrowing = self.narrowing.clone();
        let delay = self.delay;
        BoxAssignment::from_fn(
            move |u: &U| {
                let counters = Rc::clone(&counters);
                let widening = widening.clone();
                let narrowing = narrowing.clone();
                let u = u.clone();
                Some(ValueBox::from_fn(move |old, new| {
                    let mut counters = counters.borrow_mut();
                    let applications = counters.entry(u.clone()).or_insert(0);
                    *applications += 1;
                    if *applications <= delay {
                        widening.apply(old, new)
                    } else {
                        narrowing.apply(old, new)
                    }
                }))
            },
            false,
        )
    }

    fn boxes_are_idempotent(&self) -> bool {
        false
    }
}
