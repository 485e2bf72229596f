//! Control blocks: the ledger behind [`SharedPtr`](super::SharedPtr) and
//! [`WeakPtr`](super::WeakPtr).
//!
//! A block starts with a [`ControlBlock`] header and is followed by the
//! storage strategy of its variant. Handles only ever see the header; the
//! variant is reached through the header's [`BlockVTable`].

use alloc::boxed::Box;
use core::cell::Cell;
use core::ptr::NonNull;

use vc_ptr::{Deleter, Slot};

use super::this::{SharedFromThis, install_self_ref};

/// Type-erased pointer to the header of a live block.
pub(crate) type BlockPtr = NonNull<ControlBlock>;

// -----------------------------------------------------------------------------
// BlockVTable

/// Per-variant operations of a control block.
pub(crate) struct BlockVTable {
    /// Ends the life of the managed object. The block storage stays.
    destroy_object: unsafe fn(BlockPtr),
    /// Frees the block allocation. The object must already be gone.
    deallocate: unsafe fn(BlockPtr),
    /// Points the object's self back-reference at this block.
    ///
    /// `None` for objects that do not observe their own ownership.
    bind_self: Option<unsafe fn(BlockPtr)>,
}

// -----------------------------------------------------------------------------
// ControlBlock

/// Strong and weak counters shared by every handle of one ownership group.
///
/// The strong count starts at one and reaches zero at most once. After
/// that only weak handles remain, and [`try_inc_strong`](Self::try_inc_strong)
/// refuses to resurrect the object.
#[repr(C)]
pub(crate) struct ControlBlock {
    strong: Cell<usize>,
    weak: Cell<usize>,
    vtable: &'static BlockVTable,
}

impl ControlBlock {
    #[inline]
    const fn new(vtable: &'static BlockVTable) -> Self {
        Self {
            strong: Cell::new(1),
            weak: Cell::new(0),
            vtable,
        }
    }

    #[inline(always)]
    pub fn strong_count(&self) -> usize {
        self.strong.get()
    }

    #[inline(always)]
    pub fn weak_count(&self) -> usize {
        self.weak.get()
    }

    #[inline(always)]
    pub fn total_count(&self) -> usize {
        self.strong_count() + self.weak_count()
    }

    /// Adds a strong reference on behalf of a handle that already holds one.
    #[inline]
    pub fn inc_strong(&self) {
        #[cfg(any(feature = "debug", debug_assertions))]
        assert!(self.strong.get() != 0, "strong count raised from zero");

        self.strong.set(self.strong.get() + 1);
    }

    /// Adds a strong reference unless the object is already dead.
    ///
    /// Check and increment happen in one step, so no caller can observe a
    /// live count and then bump a dead one.
    #[inline]
    pub fn try_inc_strong(&self) -> bool {
        match self.strong.get() {
            0 => false,
            n => {
                self.strong.set(n + 1);
                true
            }
        }
    }

    #[inline]
    fn dec_strong(&self) -> usize {
        #[cfg(any(feature = "debug", debug_assertions))]
        assert!(self.strong.get() != 0, "strong count underflow");

        let n = self.strong.get() - 1;
        self.strong.set(n);
        n
    }

    #[inline]
    pub fn inc_weak(&self) {
        self.weak.set(self.weak.get() + 1);
    }

    #[inline]
    fn dec_weak(&self) -> usize {
        #[cfg(any(feature = "debug", debug_assertions))]
        assert!(self.weak.get() != 0, "weak count underflow");

        let n = self.weak.get() - 1;
        self.weak.set(n);
        n
    }
}

// -----------------------------------------------------------------------------
// Release

/// Gives up one strong reference.
///
/// When it was the last one the object is destroyed, and the block is freed
/// if no weak reference is left. The order is strict: destroy the object
/// (which drops any back-reference it holds), re-check both counters, free.
/// Nothing reads the block after it is freed.
///
/// # Safety
/// `block` must be live and the caller must own one strong reference to it.
pub(crate) unsafe fn release_strong(block: BlockPtr) {
    // SAFETY: the caller's strong reference keeps the block alive.
    let header = unsafe { block.as_ref() };
    if header.dec_strong() != 0 {
        return;
    }

    let vtable = header.vtable;

    // Pin the block while the object is torn down: a weak back-reference
    // dropped by the object must not free the storage under our feet.
    header.inc_weak();

    // SAFETY: the strong count just reached zero, which happens once.
    unsafe { (vtable.destroy_object)(block) };

    if header.dec_weak() == 0 {
        log::trace!("control block {block:p} released with its object");
        // SAFETY: both counters are zero and no handle refers to the block.
        unsafe { (vtable.deallocate)(block) };
    }
}

/// Gives up one weak reference, freeing the block if it was the last
/// reference of any kind.
///
/// # Safety
/// `block` must be live and the caller must own one weak reference to it.
pub(crate) unsafe fn release_weak(block: BlockPtr) {
    // SAFETY: the caller's weak reference keeps the block alive.
    let header = unsafe { block.as_ref() };
    let vtable = header.vtable;

    header.dec_weak();
    if header.total_count() == 0 {
        log::trace!("control block {block:p} released by its last weak handle");
        // SAFETY: both counters are zero and no handle refers to the block.
        unsafe { (vtable.deallocate)(block) };
    }
}

/// Re-installs the self back-reference of a tracked object.
///
/// # Safety
/// `block` must be live with a strong count above zero.
#[inline]
pub(crate) unsafe fn rebind(block: BlockPtr) {
    // SAFETY: upheld by the caller.
    if let Some(bind) = unsafe { block.as_ref() }.vtable.bind_self {
        unsafe { bind(block) };
    }
}

// -----------------------------------------------------------------------------
// PointerBlock

/// Block for an object allocated on its own, released through a [`Deleter`].
///
/// This path costs two allocations: the object's, made by the caller, and
/// the block's.
#[repr(C)]
pub(crate) struct PointerBlock<T: ?Sized, D> {
    header: ControlBlock,
    ptr: NonNull<T>,
    deleter: D,
}

impl<T: ?Sized, D: Deleter<T>> PointerBlock<T, D> {
    pub const VTABLE: &'static BlockVTable = &BlockVTable {
        destroy_object: Self::destroy_object,
        deallocate: Self::deallocate,
        bind_self: None,
    };

    /// Allocates a block owning `ptr`. The strong count starts at one.
    pub fn allocate(ptr: NonNull<T>, deleter: D, vtable: &'static BlockVTable) -> BlockPtr {
        let block = Box::new(Self {
            header: ControlBlock::new(vtable),
            ptr,
            deleter,
        });
        NonNull::from(Box::leak(block)).cast()
    }

    unsafe fn destroy_object(block: BlockPtr) {
        let this = block.cast::<Self>().as_ptr();
        // SAFETY: `block` was allocated as `Self` and the object is live.
        unsafe {
            let ptr = (*this).ptr;
            (*this).deleter.delete(ptr);
        }
    }

    unsafe fn deallocate(block: BlockPtr) {
        // SAFETY: `block` came from `Box::leak` in `allocate`.
        drop(unsafe { Box::from_raw(block.cast::<Self>().as_ptr()) });
    }
}

impl<T: SharedFromThis, D: Deleter<T>> PointerBlock<T, D> {
    pub const TRACKED_VTABLE: &'static BlockVTable = &BlockVTable {
        destroy_object: Self::destroy_object,
        deallocate: Self::deallocate,
        bind_self: Some(Self::bind_self),
    };

    unsafe fn bind_self(block: BlockPtr) {
        // SAFETY: `block` was allocated as `Self` and the object is live.
        unsafe {
            let object = (*block.cast::<Self>().as_ptr()).ptr;
            install_self_ref(block, object);
        }
    }
}

// -----------------------------------------------------------------------------
// InlineBlock

/// Block that stores its object inline: one allocation for both.
///
/// Destroying the object runs its destructor in place; the memory goes
/// away later, with the block.
#[repr(C)]
pub(crate) struct InlineBlock<T> {
    header: ControlBlock,
    value: Slot<T>,
}

impl<T> InlineBlock<T> {
    pub const VTABLE: &'static BlockVTable = &BlockVTable {
        destroy_object: Self::destroy_object,
        deallocate: Self::deallocate,
        bind_self: None,
    };

    /// Allocates a block and constructs `value` inside it.
    ///
    /// Returns the block and a pointer to the object it now holds.
    /// The strong count starts at one.
    pub fn allocate(value: T, vtable: &'static BlockVTable) -> (BlockPtr, NonNull<T>) {
        let raw = Box::into_raw(Box::<Self>::new_uninit()).cast::<Self>();

        // SAFETY: `raw` is a fresh allocation valid for writes, and the
        // header is written before anything reads it.
        let block = unsafe {
            (&raw mut (*raw).header).write(ControlBlock::new(vtable));
            (*raw).value.write(value);
            NonNull::new_unchecked(raw).cast::<ControlBlock>()
        };

        // SAFETY: the block is live, so is its value.
        (block, unsafe { Self::object(block) })
    }

    /// # Safety
    /// `block` must have been allocated as `Self` and not freed.
    #[inline]
    unsafe fn object(block: BlockPtr) -> NonNull<T> {
        let this = block.cast::<Self>().as_ptr();
        // SAFETY: in bounds of a live allocation.
        Slot::as_non_null(unsafe { NonNull::new_unchecked(&raw mut (*this).value) })
    }

    unsafe fn destroy_object(block: BlockPtr) {
        let this = block.cast::<Self>().as_ptr();
        // SAFETY: `block` was allocated as `Self` and the value is live.
        unsafe { Slot::drop_in_place(NonNull::new_unchecked(&raw mut (*this).value)) };
    }

    unsafe fn deallocate(block: BlockPtr) {
        // SAFETY: `block` came from a `Box` in `allocate`. `Slot` does not
        // drop its value, which is already gone.
        drop(unsafe { Box::from_raw(block.cast::<Self>().as_ptr()) });
    }
}

impl<T: SharedFromThis> InlineBlock<T> {
    pub const TRACKED_VTABLE: &'static BlockVTable = &BlockVTable {
        destroy_object: Self::destroy_object,
        deallocate: Self::deallocate,
        bind_self: Some(Self::bind_self),
    };

    unsafe fn bind_self(block: BlockPtr) {
        // SAFETY: `block` was allocated as `Self` and the value is live.
        unsafe { install_self_ref(block, Self::object(block)) };
    }
}
