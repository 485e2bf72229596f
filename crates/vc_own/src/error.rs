use thiserror::Error;

// -----------------------------------------------------------------------------
// Error

/// A weak handle was promoted after its object had already been destroyed.
///
/// Returned by [`SharedPtr::from_weak`](crate::SharedPtr::from_weak) and the
/// matching [`TryFrom`] conversion.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("weak reference promoted after its object was destroyed")]
pub struct DeadReference;
