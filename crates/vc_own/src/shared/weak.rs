use core::fmt;
use core::mem;

use vc_ptr::ConstNonNull;

use super::SharedPtr;
use super::block::{BlockPtr, release_weak};

/// A non-owning handle to an object under shared ownership.
///
/// A `WeakPtr` keeps the control block's storage alive, never the object.
/// It answers whether the object is still alive and can be promoted to a
/// [`SharedPtr`] while it is.
///
/// Weak handles come from an existing [`SharedPtr`] (see
/// [`SharedPtr::downgrade`]) or another `WeakPtr`. The only other value is
/// the empty handle from [`Default`], which belongs to no ownership group.
///
/// # Examples
///
/// ```
/// use vc_own::SharedPtr;
///
/// let strong = SharedPtr::new(5);
/// let weak = strong.downgrade();
/// assert_eq!(*weak.lock(), 5);
///
/// drop(strong);
/// assert!(weak.expired());
/// assert!(weak.lock().is_null());
/// ```
pub struct WeakPtr<T: ?Sized> {
    pub(super) block: Option<BlockPtr>,
    pub(super) ptr: Option<ConstNonNull<T>>,
}

impl<T: ?Sized> WeakPtr<T> {
    #[inline(always)]
    pub(super) const fn empty() -> Self {
        Self {
            block: None,
            ptr: None,
        }
    }

    /// Creates a weak handle on `block`, observing `ptr`.
    ///
    /// # Safety
    /// `block` must be live.
    #[inline]
    pub(super) unsafe fn from_block(block: BlockPtr, ptr: ConstNonNull<T>) -> Self {
        // SAFETY: upheld by the caller.
        unsafe { block.as_ref() }.inc_weak();
        Self {
            block: Some(block),
            ptr: Some(ptr),
        }
    }

    /// Whether the object is gone, or this handle is empty.
    #[inline]
    pub fn expired(&self) -> bool {
        self.use_count() == 0
    }

    /// Attempts to promote to a strong handle.
    ///
    /// Returns an empty [`SharedPtr`] if the object is gone. Use
    /// [`SharedPtr::from_weak`] to get an error instead.
    #[inline]
    pub fn lock(&self) -> SharedPtr<T> {
        SharedPtr::from_weak(self).unwrap_or_default()
    }

    /// Number of strong handles to the object, 0 when empty.
    #[inline]
    pub fn use_count(&self) -> usize {
        match self.block {
            // SAFETY: our weak reference keeps the block alive.
            Some(block) => unsafe { block.as_ref() }.strong_count(),
            None => 0,
        }
    }

    /// Number of weak handles to the object, this one included; 0 when empty.
    #[inline]
    pub fn weak_count(&self) -> usize {
        match self.block {
            // SAFETY: our weak reference keeps the block alive.
            Some(block) => unsafe { block.as_ref() }.weak_count(),
            None => 0,
        }
    }

    /// Releases this handle, leaving it empty.
    #[inline]
    pub fn reset(&mut self) {
        *self = Self::empty();
    }

    /// Exchanges the targets of two handles without touching any counter.
    #[inline]
    pub fn swap(&mut self, other: &mut Self) {
        mem::swap(self, other);
    }

    /// Whether both handles belong to the same ownership group.
    ///
    /// Two empty handles are in the same (absent) group.
    #[inline]
    pub fn owner_eq<U: ?Sized>(&self, other: &WeakPtr<U>) -> bool {
        self.block == other.block
    }
}

impl<T: ?Sized> Default for WeakPtr<T> {
    #[inline]
    fn default() -> Self {
        Self::empty()
    }
}

impl<T: ?Sized> Clone for WeakPtr<T> {
    #[inline]
    fn clone(&self) -> Self {
        match (self.block, self.ptr) {
            // SAFETY: our weak reference keeps the block alive.
            (Some(block), Some(ptr)) => unsafe { Self::from_block(block, ptr) },
            _ => Self::empty(),
        }
    }
}

impl<T: ?Sized> Drop for WeakPtr<T> {
    #[inline]
    fn drop(&mut self) {
        if let Some(block) = self.block {
            // SAFETY: we own one weak reference.
            unsafe { release_weak(block) };
        }
    }
}

impl<T: ?Sized> From<&SharedPtr<T>> for WeakPtr<T> {
    #[inline]
    fn from(shared: &SharedPtr<T>) -> Self {
        shared.downgrade()
    }
}

impl<T: ?Sized> fmt::Debug for WeakPtr<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(WeakPtr)")
    }
}
