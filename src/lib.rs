//! Generic fixpoint solver library.
//!
//! This crate computes solutions of recursive equation systems
//! `x = F_x(ρ)` over a client-chosen space of *unknowns* and *values* —
//! the shape a static analyzer gives a program-analysis problem after
//! abstraction. The crate does not know anything about programs or
//! abstract domains: values are opaque apart from equality, and every
//! extra capability an operation needs (an upper bound, a combine, an
//! ordering on unknowns) is handed in as an explicit witness.
//!
//! Functionality is centered on equation systems and the solvers that
//! iterate them. An [`EquationSystem`] exposes the right-hand side of
//! each unknown as a function of an assignment, knows its dependencies,
//! and is closed under a small algebra of transformations: combining a
//! *base assignment* into the body, wrapping unknowns in *boxes*
//! (widening/narrowing operators, see [`ValueBox`]), and — on
//! hypergraph systems built with [`GraphSystemBuilder`] — *localized*
//! box and warrowing insertion, which rewrites both the per-edge
//! actions and the dependency structure so that widening is paid only
//! on back edges.
//!
//! Three worklist solvers consume systems: [`work_list_solve`] iterates
//! a finite system FIFO-style, [`priority_work_list_solve`] schedules by
//! an unknown ordering and supports restarting the unknowns above a
//! freshly changed one, and [`local_work_list_solve`] solves for a
//! wanted set over an unknown space discovered during evaluation.
//!
//! ```
//! use fixpoint_solver::{
//!     work_list_solve, Assignment, EquationSystem, FnDomain, GraphSystemBuilder,
//!     InputAssignment, NullSolverTracer,
//! };
//!
//! // Two unknowns over a bit-set lattice: x collects 0b01, and y joins
//! // x's value with its own constant contribution 0b10.
//! let domain = FnDomain::new(|x: &u32, y: &u32| x & !y == 0, |x, y| x | y);
//! let mut builder = GraphSystemBuilder::new(domain);
//! builder.unknowns(["x", "y"]);
//! builder.initial(InputAssignment::constant(0));
//! builder.edge("x", vec![], |_| 0b01);
//! builder.edge("y", vec!["x"], |rho| rho.get(&"x"));
//! builder.edge("y", vec![], |_| 0b10);
//! let eqs = builder.build().unwrap();
//!
//! let rho = work_list_solve(&eqs, &eqs.initial(), &NullSolverTracer);
//! assert_eq!(rho.get(&"x"), 0b01);
//! assert_eq!(rho.get(&"y"), 0b11);
//! ```
//!
//! # Internals
//!
//! Solvers own a [`MutableAssignment`]: explicit bindings layered over
//! the start assignment, so unseen unknowns read their start value
//! without allocating a binding. Change propagation follows the
//! *influence* relation — statically declared for finite systems,
//! derived from edge targets for graph systems, accumulated from
//! reported dependency sets by the local solver. Worklists keep
//! duplicates; convergence never relies on uniqueness.
//!
//! Everything is single-threaded and synchronous: a solver runs to
//! quiescence on the calling thread and hands the assignment back.
//! Termination is a property of the client's boxes — on domains with
//! infinite ascending chains, solve under a widening (see
//! [`BoxAssignment`] and the localized variants on [`GraphSystem`]).
//!
//! Observability is opt-in and free when unused: equation-system tracer
//! call sites vanish when the `tracers` feature is disabled, and solver
//! tracers are generic parameters, so [`NullSolverTracer`]
//! monomorphizes to nothing.

mod algebra;
mod assignment;
mod body;
mod boxes;
mod error;
mod graph;
mod solver;
mod system;
mod tracer;

pub use crate::algebra::{Domain, FnDomain, Magma, NaturalOrdering, UnknownOrdering};
pub use crate::assignment::{
    Assignment, FnPartialAssignment, InputAssignment, MutableAssignment, PartialAssignment,
    RecordingAssignment,
};
pub use crate::body::Body;
pub use crate::boxes::{BoxAssignment, StatefulBoxes, ValueBox};
pub use crate::error::SystemError;
pub use crate::graph::{EdgeId, GraphSystem, GraphSystemBuilder};
pub use crate::solver::{local_work_list_solve, priority_work_list_solve, work_list_solve};
pub use crate::system::{
    EquationSystem, FiniteEquationSystem, FiniteSystem, FiniteSystemBuilder,
};
pub use crate::tracer::{
    EquationSystemTracer, FixpointSolverTracer, LoggingSolverTracer, LoggingSystemTracer,
    NullSolverTracer, NullSystemTracer,
};

#[cfg(test)]
mod test;
