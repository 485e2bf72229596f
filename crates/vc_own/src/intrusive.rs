//! Reference counting with the counter stored inside the object.
//!
//! An [`IntrusivePtr`] is a single pointer: the count lives in the object,
//! reached through [`RefCounted::ref_count`]. Because of that, any plain
//! reference to a counted object can be turned back into an owning handle
//! with [`IntrusivePtr::from_raw`].

use alloc::boxed::Box;
use core::cell::Cell;
use core::fmt;
use core::marker::PhantomData;
use core::mem;
use core::ops::Deref;
use core::ptr::NonNull;

use vc_ptr::{DefaultDeleter, Deleter};

// -----------------------------------------------------------------------------
// RefCount

/// A reference counter embedded in a counted object.
///
/// Starts at zero; the first [`IntrusivePtr`] takes it to one. Cloning a
/// `RefCount` yields a fresh zero counter: a copy of an object is not owned
/// by the handles of the original.
pub struct RefCount(Cell<usize>);

impl RefCount {
    #[inline]
    pub const fn new() -> Self {
        Self(Cell::new(0))
    }

    #[inline(always)]
    pub fn get(&self) -> usize {
        self.0.get()
    }

    #[inline]
    pub fn inc(&self) {
        self.0.set(self.0.get() + 1);
    }

    /// Decrements the counter and returns the new value.
    #[inline]
    pub fn dec(&self) -> usize {
        #[cfg(any(feature = "debug", debug_assertions))]
        assert!(self.0.get() != 0, "intrusive count underflow");

        let n = self.0.get() - 1;
        self.0.set(n);
        n
    }
}

impl Default for RefCount {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for RefCount {
    #[inline]
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl fmt::Debug for RefCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("RefCount").field(&self.get()).finish()
    }
}

// -----------------------------------------------------------------------------
// RefCounted

/// Objects that carry their own reference count.
///
/// # Examples
///
/// ```
/// use vc_own::{IntrusivePtr, RefCount, RefCounted};
///
/// struct Texture {
///     refs: RefCount,
///     id: u32,
/// }
///
/// impl RefCounted for Texture {
///     fn ref_count(&self) -> &RefCount {
///         &self.refs
///     }
/// }
///
/// let a = IntrusivePtr::new(Texture { refs: RefCount::new(), id: 3 });
/// let b = a.clone();
/// assert_eq!(b.use_count(), 2);
/// assert_eq!(b.id, 3);
/// ```
pub trait RefCounted {
    /// The embedded counter.
    fn ref_count(&self) -> &RefCount;

    /// Destroys the object once its count reaches zero.
    ///
    /// The default releases a [`Box`] allocation, which is what
    /// [`IntrusivePtr::new`] and [`IntrusivePtr::from_box`] produce.
    ///
    /// # Safety
    /// `this` must point to a live object with a count of zero, which is not
    /// accessed afterwards.
    #[inline]
    unsafe fn destroy(this: NonNull<Self>) {
        // SAFETY: upheld by the caller.
        unsafe { DefaultDeleter.delete(this) }
    }
}

// -----------------------------------------------------------------------------
// IntrusivePtr

/// A reference-counted handle whose counter lives in the object.
///
/// Counters are plain cells: handles cannot cross threads.
pub struct IntrusivePtr<T: ?Sized + RefCounted> {
    ptr: Option<NonNull<T>>,
    _marker: PhantomData<T>,
}

impl<T: RefCounted> IntrusivePtr<T> {
    /// Allocates `value` and takes the first reference to it.
    #[inline]
    pub fn new(value: T) -> Self {
        Self::from_box(Box::new(value))
    }
}

impl<T: ?Sized + RefCounted> IntrusivePtr<T> {
    /// Creates an empty handle.
    #[inline(always)]
    pub const fn null() -> Self {
        Self {
            ptr: None,
            _marker: PhantomData,
        }
    }

    /// Takes a reference to a boxed object.
    ///
    /// `T::destroy` must release `Box` allocations, as the default does.
    #[inline]
    pub fn from_box(boxed: Box<T>) -> Self {
        // SAFETY: the object is fresh and live.
        unsafe { Self::from_raw(NonNull::from(Box::leak(boxed))) }
    }

    /// Takes one more reference to the object behind `ptr`.
    ///
    /// Unlike the other owning pointers this is fine to call on an object
    /// that other handles already own: they all share its counter.
    ///
    /// # Safety
    /// `ptr` must point to a live object that `T::destroy` can release.
    #[inline]
    pub unsafe fn from_raw(ptr: NonNull<T>) -> Self {
        // SAFETY: upheld by the caller.
        unsafe { ptr.as_ref() }.ref_count().inc();
        Self {
            ptr: Some(ptr),
            _marker: PhantomData,
        }
    }

    /// Drops this handle's reference, leaving it empty.
    #[inline]
    pub fn reset(&mut self) {
        *self = Self::null();
    }

    /// Points this handle at `ptr`, taking a reference to it.
    ///
    /// The new reference is taken before the old one is dropped, so
    /// resetting to the current object keeps it alive.
    ///
    /// # Safety
    /// A non-null `ptr` must satisfy the requirements of
    /// [`from_raw`](Self::from_raw).
    pub unsafe fn reset_raw(&mut self, ptr: Option<NonNull<T>>) {
        let next = match ptr {
            // SAFETY: upheld by the caller.
            Some(ptr) => unsafe { Self::from_raw(ptr) },
            None => Self::null(),
        };
        *self = next;
    }

    #[inline]
    pub fn swap(&mut self, other: &mut Self) {
        mem::swap(self, other);
    }

    #[inline]
    pub fn get(&self) -> Option<&T> {
        // SAFETY: our reference keeps the object alive.
        self.ptr.map(|ptr| unsafe { ptr.as_ref() })
    }

    #[inline(always)]
    pub fn as_ptr(&self) -> Option<NonNull<T>> {
        self.ptr
    }

    /// The object's reference count, 0 when empty.
    #[inline]
    pub fn use_count(&self) -> usize {
        self.get().map_or(0, |value| value.ref_count().get())
    }

    /// Whether this handle is empty or its object holds no reference.
    #[inline]
    pub fn is_null(&self) -> bool {
        self.use_count() == 0
    }

    /// Whether both handles point to the same object.
    #[inline]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        self.ptr.map(NonNull::cast::<u8>) == other.ptr.map(NonNull::cast::<u8>)
    }
}

impl<T: ?Sized + RefCounted> Clone for IntrusivePtr<T> {
    #[inline]
    fn clone(&self) -> Self {
        match self.ptr {
            // SAFETY: our reference keeps the object alive.
            Some(ptr) => unsafe { Self::from_raw(ptr) },
            None => Self::null(),
        }
    }
}

impl<T: ?Sized + RefCounted> Drop for IntrusivePtr<T> {
    #[inline]
    fn drop(&mut self) {
        let Some(ptr) = self.ptr else {
            return;
        };
        // SAFETY: our reference keeps the object alive until here.
        if unsafe { ptr.as_ref() }.ref_count().dec() == 0 {
            // SAFETY: that was the last reference.
            unsafe { T::destroy(ptr) };
        }
    }
}

impl<T: ?Sized + RefCounted> Default for IntrusivePtr<T> {
    #[inline]
    fn default() -> Self {
        Self::null()
    }
}

impl<T: ?Sized + RefCounted> Deref for IntrusivePtr<T> {
    type Target = T;

    /// # Panics
    /// If the handle is empty.
    #[inline]
    #[track_caller]
    fn deref(&self) -> &T {
        match self.get() {
            Some(value) => value,
            None => panic!("dereferenced an empty `IntrusivePtr`"),
        }
    }
}

impl<T: ?Sized + RefCounted + fmt::Debug> fmt::Debug for IntrusivePtr<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.get() {
            Some(value) => f.debug_tuple("IntrusivePtr").field(&value).finish(),
            None => f.write_str("IntrusivePtr(null)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{IntrusivePtr, RefCount, RefCounted};
    use alloc::boxed::Box;
    use alloc::format;
    use alloc::rc::Rc;
    use core::cell::Cell;
    use core::ptr::NonNull;

    #[derive(Debug)]
    struct Mesh {
        refs: RefCount,
        drops: Rc<Cell<usize>>,
    }

    impl Mesh {
        fn new(drops: &Rc<Cell<usize>>) -> Self {
            Self {
                refs: RefCount::new(),
                drops: drops.clone(),
            }
        }
    }

    impl RefCounted for Mesh {
        fn ref_count(&self) -> &RefCount {
            &self.refs
        }
    }

    impl Drop for Mesh {
        fn drop(&mut self) {
            self.drops.set(self.drops.get() + 1);
        }
    }

    #[test]
    fn counts_and_destroys_at_zero() {
        let drops = Rc::new(Cell::new(0));
        let a = IntrusivePtr::new(Mesh::new(&drops));
        assert_eq!(a.use_count(), 1);

        let b = a.clone();
        assert_eq!(a.use_count(), 2);
        assert!(a.ptr_eq(&b));

        drop(a);
        assert_eq!((b.use_count(), drops.get()), (1, 0));

        drop(b);
        assert_eq!(drops.get(), 1);
    }

    #[test]
    fn handle_from_plain_reference() {
        let drops = Rc::new(Cell::new(0));
        let a = IntrusivePtr::new(Mesh::new(&drops));

        let plain: &Mesh = &a;
        let b = unsafe { IntrusivePtr::from_raw(NonNull::from(plain)) };
        assert_eq!(a.use_count(), 2);

        drop(a);
        drop(b);
        assert_eq!(drops.get(), 1);
    }

    #[test]
    fn reset_raw_to_same_object_keeps_it() {
        let drops = Rc::new(Cell::new(0));
        let mut a = IntrusivePtr::from_box(Box::new(Mesh::new(&drops)));
        let same = a.as_ptr();

        unsafe { a.reset_raw(same) };
        assert_eq!(a.use_count(), 1);
        assert_eq!(drops.get(), 0);

        unsafe { a.reset_raw(None) };
        assert!(a.is_null());
        assert_eq!(drops.get(), 1);
    }

    #[test]
    fn empty_handle() {
        let mut empty = IntrusivePtr::<Mesh>::default();
        assert!(empty.is_null());
        assert_eq!(empty.use_count(), 0);
        assert!(empty.ptr_eq(&IntrusivePtr::null()));
        assert_eq!(format!("{empty:?}"), "IntrusivePtr(null)");

        let drops = Rc::new(Cell::new(0));
        let mut full = IntrusivePtr::new(Mesh::new(&drops));
        empty.swap(&mut full);
        assert!(full.is_null());
        assert!(!empty.is_null());

        empty.reset();
        assert_eq!(drops.get(), 1);
    }

    #[test]
    fn cloned_counter_starts_fresh() {
        let refs = RefCount::new();
        refs.inc();
        refs.inc();
        assert_eq!(refs.clone().get(), 0);
        assert_eq!(refs.dec(), 1);
    }

    struct Pooled {
        refs: RefCount,
        returned: Rc<Cell<usize>>,
    }

    impl RefCounted for Pooled {
        fn ref_count(&self) -> &RefCount {
            &self.refs
        }

        unsafe fn destroy(this: NonNull<Self>) {
            let boxed = unsafe { Box::from_raw(this.as_ptr()) };
            boxed.returned.set(boxed.returned.get() + 1);
        }
    }

    #[test]
    fn custom_destroy() {
        let returned = Rc::new(Cell::new(0));
        let a = IntrusivePtr::new(Pooled {
            refs: RefCount::new(),
            returned: returned.clone(),
        });
        let b = a.clone();
        drop((a, b));
        assert_eq!(returned.get(), 1);
    }
}
