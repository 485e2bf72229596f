//! Shared ownership with separable weak observation.
//!
//! A group of [`SharedPtr`]s shares one control block that counts strong
//! and weak handles. The object dies with the last strong handle; the
//! block goes away once the last handle of either kind is gone.
//!
//! There are two kinds of block:
//!
//! - [`SharedPtr::new`] stores the object inside the block, one allocation
//!   for both.
//! - [`SharedPtr::from_box`] and the `from_raw*` constructors wrap an
//!   object that already has its own storage, released by a
//!   [`Deleter`](vc_ptr::Deleter).
//!
//! Objects that implement [`SharedFromThis`] and are built through the
//! `*_tracked` constructors can hand out handles to themselves that join
//! the existing group.

// -----------------------------------------------------------------------------
// Modules

mod block;
mod strong;
mod this;
mod weak;

#[cfg(test)]
mod tests;

// -----------------------------------------------------------------------------
// Exports

pub use strong::SharedPtr;
pub use this::{SelfRef, SharedFromThis};
pub use weak::WeakPtr;
