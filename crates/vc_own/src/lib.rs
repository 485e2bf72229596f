#![doc = include_str!("../README.md")]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![expect(unsafe_code, reason = "Owning pointers manage object lifetimes by hand.")]
#![no_std]

// -----------------------------------------------------------------------------
// no_std support

#[cfg(feature = "std")]
extern crate std;

extern crate alloc;

// -----------------------------------------------------------------------------
// Modules

mod error;

pub mod intrusive;
pub mod shared;
pub mod unique;

// -----------------------------------------------------------------------------
// Top-level exports

pub use error::DeadReference;
pub use intrusive::{IntrusivePtr, RefCount, RefCounted};
pub use shared::{SelfRef, SharedFromThis, SharedPtr, WeakPtr};
pub use unique::UniquePtr;
