//! Construction-time failures.

use std::fmt;

use thiserror::Error;

/// Rejections raised while building an equation system. Solving itself
/// has no recoverable errors: a well-built system either converges or
/// iterates forever, and contract violations abort.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SystemError<U>
where
    U: fmt::Debug,
{
    #[error("edge target {0:?} is not a declared unknown")]
    UnknownEdgeTarget(U),

    #[error("edge source {0:?} is not a declared unknown")]
    UnknownEdgeSource(U),

    #[error("input unknown {0:?} is not a declared unknown")]
    UnknownInput(U),

    #[error("unknown {0:?} is declared more than once")]
    DuplicateUnknown(U),

    #[error("no initial assignment was provided")]
    MissingInitial,
}
