//! Exclusive ownership with a pluggable deleter.

use alloc::boxed::Box;
use core::fmt;
use core::marker::PhantomData;
use core::mem::{self, ManuallyDrop};
use core::ops::{Deref, DerefMut, Index, IndexMut};
use core::ptr::{self, NonNull};
use core::slice::SliceIndex;

use vc_ptr::{DefaultDeleter, Deleter};

/// A pointer that exclusively owns its object.
///
/// The object is released through `D` when the pointer is dropped or reset.
/// With a zero-sized deleter such as [`DefaultDeleter`] the pointer is
/// exactly as large as a raw pointer.
///
/// Ownership moves with the value; there is no copy.
///
/// # Examples
///
/// ```
/// use vc_own::UniquePtr;
///
/// let mut numbers = UniquePtr::from_box(vec![1, 2, 3].into_boxed_slice());
/// numbers[0] = 10;
/// assert_eq!(numbers[..], [10, 2, 3]);
///
/// let raw = numbers.release();
/// assert!(numbers.is_null());
/// let numbers = unsafe { UniquePtr::<[i32]>::from_raw(raw.unwrap()) };
/// assert_eq!(numbers.len(), 3);
/// ```
pub struct UniquePtr<T: ?Sized, D: Deleter<T> = DefaultDeleter> {
    ptr: Option<NonNull<T>>,
    deleter: D,
    _marker: PhantomData<T>,
}

// SAFETY: a `UniquePtr` behaves like a `Box<T>` carrying a `D`.
unsafe impl<T: ?Sized + Send, D: Deleter<T> + Send> Send for UniquePtr<T, D> {}

// SAFETY: a `UniquePtr` behaves like a `Box<T>` carrying a `D`.
unsafe impl<T: ?Sized + Sync, D: Deleter<T> + Sync> Sync for UniquePtr<T, D> {}

// -----------------------------------------------------------------------------
// Construction

impl<T> UniquePtr<T> {
    /// Allocates `value` and takes ownership of it.
    #[inline]
    pub fn new(value: T) -> Self {
        Self::from_box(Box::new(value))
    }
}

impl<T: ?Sized> UniquePtr<T> {
    /// Takes ownership of a boxed object.
    #[inline]
    pub fn from_box(boxed: Box<T>) -> Self {
        Self {
            ptr: Some(NonNull::from(Box::leak(boxed))),
            deleter: DefaultDeleter,
            _marker: PhantomData,
        }
    }

    /// Gives the object back as a [`Box`], or `None` when empty.
    #[inline]
    pub fn into_box(mut self) -> Option<Box<T>> {
        // SAFETY: with the default deleter the object came from a `Box`.
        self.release().map(|ptr| unsafe { Box::from_raw(ptr.as_ptr()) })
    }

    /// Destroys the current object and takes ownership of `boxed`.
    #[inline]
    pub fn reset_with(&mut self, boxed: Box<T>) {
        // SAFETY: a fresh box is owned by nothing else and fits the
        // default deleter.
        unsafe { self.reset_raw(Some(NonNull::from(Box::leak(boxed)))) }
    }
}

impl<T: ?Sized, D: Deleter<T> + Default> UniquePtr<T, D> {
    /// Creates an empty pointer.
    #[inline]
    pub fn null() -> Self {
        Self {
            ptr: None,
            deleter: D::default(),
            _marker: PhantomData,
        }
    }

    /// Takes ownership of `ptr`, released by a default `D`.
    ///
    /// # Safety
    /// See [`from_raw_with_deleter`](Self::from_raw_with_deleter).
    #[inline]
    pub unsafe fn from_raw(ptr: NonNull<T>) -> Self {
        // SAFETY: upheld by the caller.
        unsafe { Self::from_raw_with_deleter(ptr, D::default()) }
    }
}

impl<T: ?Sized, D: Deleter<T>> UniquePtr<T, D> {
    /// Takes ownership of `ptr`, released by `deleter`.
    ///
    /// # Safety
    /// - `ptr` must point to a live object that `deleter` can release.
    /// - Nothing else may own the object.
    #[inline]
    pub const unsafe fn from_raw_with_deleter(ptr: NonNull<T>, deleter: D) -> Self {
        Self {
            ptr: Some(ptr),
            deleter,
            _marker: PhantomData,
        }
    }

    /// Splits the pointer into its object and deleter without releasing
    /// anything.
    pub(crate) fn into_parts(self) -> (Option<NonNull<T>>, D) {
        let this = ManuallyDrop::new(self);
        // SAFETY: `this` is never dropped, so the deleter is moved out once.
        let deleter = unsafe { ptr::read(&this.deleter) };
        (this.ptr, deleter)
    }
}

// -----------------------------------------------------------------------------
// Modifiers

impl<T: ?Sized, D: Deleter<T>> UniquePtr<T, D> {
    /// Gives up ownership without destroying the object.
    ///
    /// The pointer is left empty; the caller is now responsible for the
    /// object.
    #[inline]
    #[must_use = "the released object leaks unless it is released by hand"]
    pub fn release(&mut self) -> Option<NonNull<T>> {
        self.ptr.take()
    }

    /// Destroys the object and leaves the pointer empty.
    #[inline]
    pub fn reset(&mut self) {
        if let Some(old) = self.ptr.take() {
            // SAFETY: we owned the object.
            unsafe { self.deleter.delete(old) };
        }
    }

    /// Replaces the owned object with `ptr`, destroying the old one.
    ///
    /// Nothing happens when `ptr` is the object already owned. The new
    /// pointer is in place before the old object is destroyed.
    ///
    /// # Safety
    /// A non-null `ptr` must satisfy the requirements of
    /// [`from_raw_with_deleter`](Self::from_raw_with_deleter) for the
    /// current deleter.
    pub unsafe fn reset_raw(&mut self, ptr: Option<NonNull<T>>) {
        if ptr.map(NonNull::cast::<u8>) == self.ptr.map(NonNull::cast::<u8>) {
            return;
        }

        if let Some(old) = mem::replace(&mut self.ptr, ptr) {
            // SAFETY: we owned the old object.
            unsafe { self.deleter.delete(old) };
        }
    }

    /// Exchanges objects and deleters.
    #[inline]
    pub fn swap(&mut self, other: &mut Self) {
        mem::swap(self, other);
    }
}

// -----------------------------------------------------------------------------
// Observers

impl<T: ?Sized, D: Deleter<T>> UniquePtr<T, D> {
    #[inline]
    pub fn get(&self) -> Option<&T> {
        // SAFETY: we own the object.
        self.ptr.map(|ptr| unsafe { ptr.as_ref() })
    }

    #[inline]
    pub fn get_mut(&mut self) -> Option<&mut T> {
        // SAFETY: we own the object, and `&mut self` makes the borrow unique.
        self.ptr.map(|mut ptr| unsafe { ptr.as_mut() })
    }

    #[inline(always)]
    pub fn as_ptr(&self) -> Option<NonNull<T>> {
        self.ptr
    }

    #[inline(always)]
    pub fn deleter(&self) -> &D {
        &self.deleter
    }

    #[inline(always)]
    pub fn deleter_mut(&mut self) -> &mut D {
        &mut self.deleter
    }

    #[inline(always)]
    pub fn is_null(&self) -> bool {
        self.ptr.is_none()
    }
}

// -----------------------------------------------------------------------------
// Traits

impl<T: ?Sized, D: Deleter<T>> Drop for UniquePtr<T, D> {
    #[inline]
    fn drop(&mut self) {
        self.reset();
    }
}

impl<T: ?Sized, D: Deleter<T>> Deref for UniquePtr<T, D> {
    type Target = T;

    /// # Panics
    /// If the pointer is empty.
    #[inline]
    #[track_caller]
    fn deref(&self) -> &T {
        match self.get() {
            Some(value) => value,
            None => null_deref(),
        }
    }
}

impl<T: ?Sized, D: Deleter<T>> DerefMut for UniquePtr<T, D> {
    /// # Panics
    /// If the pointer is empty.
    #[inline]
    #[track_caller]
    fn deref_mut(&mut self) -> &mut T {
        match self.get_mut() {
            Some(value) => value,
            None => null_deref(),
        }
    }
}

#[cold]
#[track_caller]
fn null_deref() -> ! {
    panic!("dereferenced an empty `UniquePtr`")
}

impl<T, I: SliceIndex<[T]>, D: Deleter<[T]>> Index<I> for UniquePtr<[T], D> {
    type Output = I::Output;

    #[inline]
    #[track_caller]
    fn index(&self, index: I) -> &I::Output {
        &(**self)[index]
    }
}

impl<T, I: SliceIndex<[T]>, D: Deleter<[T]>> IndexMut<I> for UniquePtr<[T], D> {
    #[inline]
    #[track_caller]
    fn index_mut(&mut self, index: I) -> &mut I::Output {
        &mut (**self)[index]
    }
}

impl<T: ?Sized, D: Deleter<T> + Default> Default for UniquePtr<T, D> {
    #[inline]
    fn default() -> Self {
        Self::null()
    }
}

impl<T: ?Sized> From<Box<T>> for UniquePtr<T> {
    #[inline]
    fn from(boxed: Box<T>) -> Self {
        Self::from_box(boxed)
    }
}

impl<T: ?Sized + fmt::Debug, D: Deleter<T>> fmt::Debug for UniquePtr<T, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.get() {
            Some(value) => f.debug_tuple("UniquePtr").field(&value).finish(),
            None => f.write_str("UniquePtr(null)"),
        }
    }
}

impl<T: ?Sized, D: Deleter<T>> fmt::Pointer for UniquePtr<T, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.ptr {
            Some(ptr) => fmt::Pointer::fmt(&ptr, f),
            None => fmt::Pointer::fmt(&ptr::null::<u8>(), f),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::UniquePtr;
    use alloc::boxed::Box;
    use alloc::format;
    use alloc::string::String;
    use alloc::vec;
    use core::cell::Cell;
    use core::ptr::NonNull;
    use vc_ptr::{DefaultDeleter, Deleter, NoopDeleter};

    #[test]
    fn as_small_as_a_pointer() {
        assert_eq!(size_of::<UniquePtr<u32>>(), size_of::<*const u32>());
        assert_eq!(size_of::<UniquePtr<[u32]>>(), size_of::<*const [u32]>());
        assert_eq!(size_of::<UniquePtr<u32, NoopDeleter>>(), size_of::<*const u32>());
    }

    #[test]
    fn owns_and_mutates() {
        let mut name = UniquePtr::new(String::from("vc"));
        name.push_str("_own");
        assert_eq!(*name, "vc_own");
        assert_eq!(format!("{name:?}"), "UniquePtr(\"vc_own\")");

        let boxed = name.into_box();
        assert_eq!(boxed.as_deref().map(String::as_str), Some("vc_own"));
    }

    #[test]
    fn empty_pointer() {
        let mut empty = UniquePtr::<i32>::null();
        assert!(empty.is_null());
        assert!(empty.get().is_none());
        assert!(empty.release().is_none());
        assert!(empty.into_box().is_none());
        assert_eq!(format!("{:?}", UniquePtr::<i32>::default()), "UniquePtr(null)");
    }

    #[test]
    #[should_panic(expected = "dereferenced an empty `UniquePtr`")]
    fn deref_empty_panics() {
        let empty = UniquePtr::<i32>::null();
        let _value: i32 = *empty;
    }

    #[test]
    fn release_then_adopt() {
        let mut a = UniquePtr::new(3);
        let raw = a.release();
        assert!(a.is_null());

        let b = unsafe { UniquePtr::<i32>::from_raw(raw.unwrap()) };
        assert_eq!(*b, 3);
        assert_eq!(b.as_ptr(), raw);
    }

    #[test]
    fn custom_deleter_runs_once_per_object() {
        let deleted = Cell::new(0);
        let deleter = |ptr: NonNull<i32>| {
            deleted.set(deleted.get() + 1);
            unsafe { DefaultDeleter.delete(ptr) }
        };

        let first = NonNull::from(Box::leak(Box::new(1)));
        let second = NonNull::from(Box::leak(Box::new(2)));

        let mut owner = unsafe { UniquePtr::from_raw_with_deleter(first, deleter) };

        // Same object: nothing happens.
        unsafe { owner.reset_raw(Some(first)) };
        assert_eq!(deleted.get(), 0);
        assert_eq!(*owner, 1);

        unsafe { owner.reset_raw(Some(second)) };
        assert_eq!(deleted.get(), 1);
        assert_eq!(*owner, 2);

        owner.reset();
        assert!(owner.is_null());
        assert_eq!(deleted.get(), 2);

        drop(owner);
        assert_eq!(deleted.get(), 2);
    }

    #[test]
    fn reset_with_and_swap() {
        let mut a = UniquePtr::new(1);
        let mut b = UniquePtr::null();

        a.swap(&mut b);
        assert!(a.is_null());
        assert_eq!(b.get(), Some(&1));

        a.reset_with(Box::new(5));
        assert_eq!(*a, 5);
    }

    #[test]
    fn slice_indexing() {
        let mut values = UniquePtr::from_box(vec![1, 2, 3, 4].into_boxed_slice());
        values[1] = 20;
        assert_eq!(values[1], 20);
        assert_eq!(values[2..], [3, 4]);
        assert_eq!(values.len(), 4);
    }

    #[test]
    fn deleter_access() {
        let ptr = NonNull::from(Box::leak(Box::new(9u8)));
        let mut owner = unsafe { UniquePtr::from_raw_with_deleter(ptr, NoopDeleter) };
        assert_eq!(owner.deleter(), &NoopDeleter);
        *owner.deleter_mut() = NoopDeleter;

        if let Some(value) = owner.get_mut() {
            *value += 1;
        }
        assert_eq!(*owner, 10);

        // The no-op deleter leaves the allocation to us.
        drop(owner);
        drop(unsafe { Box::from_raw(ptr.as_ptr()) });
    }
}
