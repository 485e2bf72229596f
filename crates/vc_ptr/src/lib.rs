//! This crate provides the low-level pieces that owning pointers are built on.
//!
//! Nothing here counts references or decides when an object dies. It only
//! answers *how*: how to observe an object without write access, how to
//! release an object given a pointer to it, and how to build and tear down
//! a value inside storage that outlives it.
//!
//! **ConstNonNull**
//!
//! [`ConstNonNull<T>`] is similar to [`NonNull<T>`](core::ptr::NonNull): a non-null
//! pointer that cannot be used to obtain mutable references directly.
//!
//! **Deleter**
//!
//! [`Deleter<T>`] is the delete-by-pointer capability. [`DefaultDeleter`]
//! releases `Box` allocations, [`NoopDeleter`] releases nothing, and any
//! `FnMut(NonNull<T>)` closure can stand in for a custom policy.
//!
//! **Slot**
//!
//! [`Slot<T>`] is the construct/destroy-in-place capability: uninitialized
//! storage for one `T` whose value is dropped explicitly, never implicitly.
#![expect(unsafe_code, reason = "Raw pointers are inherently unsafe.")]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![no_std]

extern crate alloc;

// -----------------------------------------------------------------------------
// Modules

mod deleter;
mod non_null;
mod slot;

// -----------------------------------------------------------------------------
// Top-level exports

pub use deleter::{DefaultDeleter, Deleter, NoopDeleter};
pub use non_null::ConstNonNull;
pub use slot::Slot;
