use alloc::boxed::Box;
use core::ptr::NonNull;

/// A policy for destroying an object given only a pointer to it.
///
/// Owning pointers store their deleter next to the pointer. Stateless
/// policies are zero-sized, so they cost nothing to store.
///
/// Besides the two unit policies provided here, any `FnMut(NonNull<T>)`
/// closure is a deleter.
///
/// # Examples
///
/// ```
/// use core::cell::Cell;
/// use core::ptr::NonNull;
/// use vc_ptr::{DefaultDeleter, Deleter};
///
/// let freed = Cell::new(0);
/// let mut counting = |ptr: NonNull<u32>| {
///     freed.set(freed.get() + 1);
///     unsafe { DefaultDeleter.delete(ptr) }
/// };
///
/// let ptr = NonNull::from(Box::leak(Box::new(7u32)));
/// unsafe { counting.delete(ptr) };
/// assert_eq!(freed.get(), 1);
/// ```
pub trait Deleter<T: ?Sized> {
    /// Destroys the object behind `ptr` and releases its storage.
    ///
    /// # Safety
    /// - `ptr` must point to a live object that this policy knows how to
    ///   release (for [`DefaultDeleter`], one produced by `Box::into_raw`).
    /// - The object must not be accessed through any pointer afterwards.
    unsafe fn delete(&mut self, ptr: NonNull<T>);
}

// -----------------------------------------------------------------------------
// DefaultDeleter

/// Releases objects allocated through [`Box`].
///
/// Works for unsized pointees as well, so a boxed slice or `str` is
/// released in one call.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DefaultDeleter;

impl<T: ?Sized> Deleter<T> for DefaultDeleter {
    #[inline]
    unsafe fn delete(&mut self, ptr: NonNull<T>) {
        // SAFETY: the caller guarantees `ptr` came from `Box::into_raw`.
        drop(unsafe { Box::from_raw(ptr.as_ptr()) });
    }
}

// -----------------------------------------------------------------------------
// NoopDeleter

/// Leaves the object untouched.
///
/// Useful for handing out owning pointers to objects whose storage is
/// managed elsewhere, such as statics.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NoopDeleter;

impl<T: ?Sized> Deleter<T> for NoopDeleter {
    #[inline(always)]
    unsafe fn delete(&mut self, _ptr: NonNull<T>) {}
}

// -----------------------------------------------------------------------------
// Closures

impl<T: ?Sized, F> Deleter<T> for F
where
    F: FnMut(NonNull<T>),
{
    #[inline]
    unsafe fn delete(&mut self, ptr: NonNull<T>) {
        self(ptr)
    }
}

#[cfg(test)]
mod tests {
    use super::{DefaultDeleter, Deleter, NoopDeleter};
    use alloc::boxed::Box;
    use alloc::rc::Rc;
    use alloc::vec;
    use core::cell::Cell;
    use core::ptr::NonNull;

    struct Tracked(Rc<Cell<usize>>);

    impl Drop for Tracked {
        fn drop(&mut self) {
            self.0.set(self.0.get() + 1);
        }
    }

    #[test]
    fn default_deleter_drops_box() {
        let drops = Rc::new(Cell::new(0));
        let ptr = NonNull::from(Box::leak(Box::new(Tracked(drops.clone()))));

        unsafe { DefaultDeleter.delete(ptr) };
        assert_eq!(drops.get(), 1);
    }

    #[test]
    fn default_deleter_drops_slice() {
        let drops = Rc::new(Cell::new(0));
        let items = vec![Tracked(drops.clone()), Tracked(drops.clone())];
        let ptr = NonNull::from(Box::leak(items.into_boxed_slice()));

        unsafe { DefaultDeleter.delete(ptr) };
        assert_eq!(drops.get(), 2);
    }

    #[test]
    fn noop_deleter_keeps_object() {
        let value = 5;
        unsafe { NoopDeleter.delete(NonNull::from(&value)) };
        assert_eq!(value, 5);
    }

    #[test]
    fn unit_policies_are_zero_sized() {
        assert_eq!(size_of::<DefaultDeleter>(), 0);
        assert_eq!(size_of::<NoopDeleter>(), 0);
    }
}
