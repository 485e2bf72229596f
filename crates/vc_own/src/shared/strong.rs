use alloc::boxed::Box;
use core::fmt;
use core::hash::{Hash, Hasher};
use core::marker::PhantomData;
use core::mem;
use core::ops::Deref;
use core::ptr::NonNull;

use vc_ptr::{ConstNonNull, DefaultDeleter, Deleter};

use super::block::{BlockPtr, InlineBlock, PointerBlock, rebind, release_strong};
use super::{SharedFromThis, WeakPtr};
use crate::error::DeadReference;
use crate::unique::UniquePtr;

/// A reference-counted handle with shared ownership.
///
/// A `SharedPtr` holds two independent things: a strong reference to a
/// control block, which decides how long the owned object lives, and an
/// observed pointer, which is what the handle dereferences to. They usually
/// agree; an aliasing handle (see [`map`](Self::map)) observes a part of
/// the object, or something the object keeps alive, while still owning the
/// whole.
///
/// The object is destroyed when the last strong handle goes away. The
/// control block lives on while [`WeakPtr`]s to it remain.
///
/// Counters are plain cells: handles cannot cross threads.
///
/// # Examples
///
/// ```
/// use vc_own::SharedPtr;
///
/// let a = SharedPtr::new(String::from("shared"));
/// let b = a.clone();
/// assert_eq!(a.use_count(), 2);
/// assert_eq!(*b, "shared");
///
/// let first = a.map(|s| &s.as_bytes()[0]);
/// drop(a);
/// drop(b);
/// assert_eq!(*first, b's');
/// ```
pub struct SharedPtr<T: ?Sized> {
    block: Option<BlockPtr>,
    ptr: Option<ConstNonNull<T>>,
    _marker: PhantomData<T>,
}

// -----------------------------------------------------------------------------
// Construction

impl<T> SharedPtr<T> {
    /// Places `value` under shared ownership with a single allocation.
    ///
    /// The control block and the object share storage. This is the
    /// preferred way to create a `SharedPtr`.
    ///
    /// A [`SelfRef`](super::SelfRef) inside `value` stays unbound; use
    /// [`new_tracked`](Self::new_tracked) for that.
    ///
    /// # Examples
    ///
    /// ```
    /// use vc_own::SharedPtr;
    ///
    /// let five = SharedPtr::new(5);
    /// assert_eq!(*five, 5);
    /// assert_eq!(five.use_count(), 1);
    /// ```
    pub fn new(value: T) -> Self {
        let (block, object) = InlineBlock::allocate(value, InlineBlock::<T>::VTABLE);
        Self::from_parts(block, object.into())
    }
}

impl<T: ?Sized> SharedPtr<T> {
    /// Creates an empty handle.
    #[inline(always)]
    pub const fn null() -> Self {
        Self {
            block: None,
            ptr: None,
            _marker: PhantomData,
        }
    }

    /// Adopts a block whose strong count already accounts for this handle.
    #[inline(always)]
    const fn from_parts(block: BlockPtr, ptr: ConstNonNull<T>) -> Self {
        Self {
            block: Some(block),
            ptr: Some(ptr),
            _marker: PhantomData,
        }
    }

    /// Takes one more strong reference on `block`.
    ///
    /// # Safety
    /// `block` must be live with a strong count above zero.
    #[inline]
    unsafe fn share(block: BlockPtr, ptr: ConstNonNull<T>) -> Self {
        // SAFETY: upheld by the caller.
        unsafe {
            block.as_ref().inc_strong();
            rebind(block);
        }
        Self::from_parts(block, ptr)
    }

    /// Takes shared ownership of a boxed object.
    ///
    /// The box becomes the object's storage, and a control block is
    /// allocated next to it. A [`SelfRef`](super::SelfRef) inside the object
    /// stays unbound; see [`from_box_tracked`](Self::from_box_tracked).
    #[inline]
    pub fn from_box(boxed: Box<T>) -> Self {
        // SAFETY: the pointer comes straight from `Box`.
        unsafe { Self::from_raw(NonNull::from(Box::leak(boxed))) }
    }

    /// Takes shared ownership of an object allocated by [`Box`].
    ///
    /// # Safety
    /// `ptr` must come from [`Box::into_raw`] (or equivalent) and must not
    /// be owned by anything else.
    #[inline]
    pub unsafe fn from_raw(ptr: NonNull<T>) -> Self {
        // SAFETY: upheld by the caller.
        unsafe { Self::from_raw_with_deleter(ptr, DefaultDeleter) }
    }

    /// Takes shared ownership of `ptr`, released by `deleter` when the last
    /// strong handle goes away.
    ///
    /// # Safety
    /// - `ptr` must point to a live object that `deleter` can release.
    /// - Nothing else may own the object.
    ///
    /// # Examples
    ///
    /// ```
    /// use core::ptr::NonNull;
    /// use vc_own::SharedPtr;
    /// use vc_ptr::NoopDeleter;
    ///
    /// static ANSWER: u32 = 42;
    ///
    /// let shared = unsafe {
    ///     SharedPtr::from_raw_with_deleter(NonNull::from(&ANSWER), NoopDeleter)
    /// };
    /// assert_eq!(*shared, 42);
    /// ```
    pub unsafe fn from_raw_with_deleter<D>(ptr: NonNull<T>, deleter: D) -> Self
    where
        D: Deleter<T> + 'static,
    {
        let block = PointerBlock::allocate(ptr, deleter, PointerBlock::<T, D>::VTABLE);
        Self::from_parts(block, ptr.into())
    }

    /// Creates a handle that shares `owner`'s ownership but observes `ptr`.
    ///
    /// The object of `owner` stays alive as long as the returned handle (or
    /// any copy of it) does. Aliasing an empty handle yields an empty handle.
    ///
    /// Prefer the safe [`map`](Self::map) when `ptr` points into the object.
    ///
    /// # Safety
    /// `ptr` must stay valid for reads for as long as `owner`'s object lives.
    ///
    /// # Examples
    ///
    /// ```
    /// use vc_own::SharedPtr;
    /// use vc_ptr::ConstNonNull;
    ///
    /// let pair = SharedPtr::new((1, 2));
    /// let second = unsafe { SharedPtr::aliasing(&pair, ConstNonNull::from_ref(&pair.1)) };
    ///
    /// drop(pair);
    /// assert_eq!(*second, 2);
    /// ```
    pub unsafe fn aliasing<U: ?Sized>(owner: &SharedPtr<U>, ptr: ConstNonNull<T>) -> Self {
        match owner.block {
            // SAFETY: `owner` holds a strong reference to `block`.
            Some(block) => unsafe { Self::share(block, ptr) },
            None => Self::null(),
        }
    }

    /// Creates an aliasing handle onto a part of the object.
    ///
    /// The whole object stays alive while the result does.
    ///
    /// `T` must not borrow anything: a reference reached through a borrowed
    /// object lives only as long as that borrow, which the result would not
    /// know about. Use [`aliasing`](Self::aliasing) for such objects.
    ///
    /// ```compile_fail
    /// use vc_own::SharedPtr;
    ///
    /// let escaped;
    /// {
    ///     let local = 5;
    ///     let borrowed = SharedPtr::new(&local);
    ///     escaped = borrowed.map(|r| &**r);
    /// }
    /// assert_eq!(*escaped, 5);
    /// ```
    pub fn map<U: ?Sized>(&self, f: impl FnOnce(&T) -> &U) -> SharedPtr<U>
    where
        T: 'static,
    {
        match self.get() {
            Some(value) => {
                let ptr = ConstNonNull::from_ref(f(value));
                // SAFETY: `ptr` was borrowed from the object, which the
                // result keeps alive.
                unsafe { SharedPtr::aliasing(self, ptr) }
            }
            None => SharedPtr::null(),
        }
    }

    /// Promotes a weak handle.
    ///
    /// # Errors
    /// [`DeadReference`] if the object is already gone or `weak` is empty.
    ///
    /// # Examples
    ///
    /// ```
    /// use vc_own::{DeadReference, SharedPtr};
    ///
    /// let strong = SharedPtr::new(1);
    /// let weak = strong.downgrade();
    /// assert!(SharedPtr::from_weak(&weak).is_ok());
    ///
    /// drop(strong);
    /// assert_eq!(SharedPtr::from_weak(&weak), Err(DeadReference));
    /// ```
    pub fn from_weak(weak: &WeakPtr<T>) -> Result<Self, DeadReference> {
        let (Some(block), Some(ptr)) = (weak.block, weak.ptr) else {
            return Err(DeadReference);
        };

        // SAFETY: `weak` keeps the block alive.
        if !unsafe { block.as_ref() }.try_inc_strong() {
            return Err(DeadReference);
        }

        // SAFETY: the strong count is now non-zero.
        unsafe { rebind(block) };
        Ok(Self::from_parts(block, ptr))
    }

    /// Creates a weak handle on this object.
    ///
    /// A weak handle from an empty `SharedPtr` is empty.
    #[inline]
    pub fn downgrade(&self) -> WeakPtr<T> {
        match (self.block, self.ptr) {
            // SAFETY: our strong reference keeps the block alive.
            (Some(block), Some(ptr)) => unsafe { WeakPtr::from_block(block, ptr) },
            _ => WeakPtr::default(),
        }
    }
}

impl<T: SharedFromThis> SharedPtr<T> {
    /// Like [`new`](Self::new), and binds the object's [`SelfRef`](super::SelfRef).
    pub fn new_tracked(value: T) -> Self {
        let (block, object) = InlineBlock::allocate(value, InlineBlock::<T>::TRACKED_VTABLE);
        let this = Self::from_parts(block, object.into());
        // SAFETY: the block is fresh, with one strong reference.
        unsafe { rebind(block) };
        this
    }

    /// Like [`from_box`](Self::from_box), and binds the object's [`SelfRef`](super::SelfRef).
    #[inline]
    pub fn from_box_tracked(boxed: Box<T>) -> Self {
        // SAFETY: the pointer comes straight from `Box`.
        unsafe { Self::from_raw_tracked(NonNull::from(Box::leak(boxed)), DefaultDeleter) }
    }

    /// Like [`from_raw_with_deleter`](Self::from_raw_with_deleter), and binds
    /// the object's [`SelfRef`](super::SelfRef).
    ///
    /// # Safety
    /// See [`from_raw_with_deleter`](Self::from_raw_with_deleter).
    pub unsafe fn from_raw_tracked<D>(ptr: NonNull<T>, deleter: D) -> Self
    where
        D: Deleter<T> + 'static,
    {
        let block = PointerBlock::allocate(ptr, deleter, PointerBlock::<T, D>::TRACKED_VTABLE);
        let this = Self::from_parts(block, ptr.into());
        // SAFETY: the block is fresh, with one strong reference.
        unsafe { rebind(block) };
        this
    }
}

// -----------------------------------------------------------------------------
// Modifiers

impl<T: ?Sized> SharedPtr<T> {
    /// Releases this handle, leaving it empty.
    ///
    /// If it was the last strong handle the object is destroyed now.
    #[inline]
    pub fn reset(&mut self) {
        *self = Self::null();
    }

    /// Releases this handle and takes shared ownership of `boxed` instead.
    #[inline]
    pub fn reset_with(&mut self, boxed: Box<T>) {
        *self = Self::from_box(boxed);
    }

    /// Exchanges the targets of two handles without touching any counter.
    #[inline]
    pub fn swap(&mut self, other: &mut Self) {
        mem::swap(self, other);
    }

    /// Moves the target out of this handle, leaving it empty.
    ///
    /// No counter changes.
    #[inline]
    pub fn take(&mut self) -> Self {
        mem::replace(self, Self::null())
    }
}

// -----------------------------------------------------------------------------
// Observers

impl<T: ?Sized> SharedPtr<T> {
    /// Returns the observed object, or `None` for an empty handle.
    #[inline]
    pub fn get(&self) -> Option<&T> {
        // SAFETY: our strong reference keeps the observed object alive.
        self.ptr.map(|ptr| unsafe { ptr.as_ref() })
    }

    /// Returns the observed pointer.
    #[inline(always)]
    pub fn as_ptr(&self) -> Option<ConstNonNull<T>> {
        self.ptr
    }

    /// Number of strong handles in this ownership group, 0 when empty.
    #[inline]
    pub fn use_count(&self) -> usize {
        match self.block {
            // SAFETY: our strong reference keeps the block alive.
            Some(block) => unsafe { block.as_ref() }.strong_count(),
            None => 0,
        }
    }

    /// Number of weak handles in this ownership group, 0 when empty.
    ///
    /// The back-reference of a tracked object counts as one.
    #[inline]
    pub fn weak_count(&self) -> usize {
        match self.block {
            // SAFETY: our strong reference keeps the block alive.
            Some(block) => unsafe { block.as_ref() }.weak_count(),
            None => 0,
        }
    }

    /// Whether this handle is empty.
    #[inline(always)]
    pub fn is_null(&self) -> bool {
        self.ptr.is_none()
    }

    /// Whether this is the only strong handle to its object.
    #[inline]
    pub fn is_unique(&self) -> bool {
        self.use_count() == 1
    }

    /// Whether both handles belong to the same ownership group, whatever
    /// they observe.
    #[inline]
    pub fn owner_eq<U: ?Sized>(&self, other: &SharedPtr<U>) -> bool {
        self.block == other.block
    }
}

// -----------------------------------------------------------------------------
// Traits

impl<T: ?Sized> Drop for SharedPtr<T> {
    #[inline]
    fn drop(&mut self) {
        if let Some(block) = self.block {
            // SAFETY: we own one strong reference.
            unsafe { release_strong(block) };
        }
    }
}

impl<T: ?Sized> Clone for SharedPtr<T> {
    #[inline]
    fn clone(&self) -> Self {
        match (self.block, self.ptr) {
            // SAFETY: our strong reference keeps the block alive.
            (Some(block), Some(ptr)) => unsafe { Self::share(block, ptr) },
            _ => Self::null(),
        }
    }
}

impl<T: ?Sized> Default for SharedPtr<T> {
    #[inline]
    fn default() -> Self {
        Self::null()
    }
}

impl<T: ?Sized> Deref for SharedPtr<T> {
    type Target = T;

    /// # Panics
    /// If the handle is empty.
    #[inline]
    #[track_caller]
    fn deref(&self) -> &T {
        match self.get() {
            Some(value) => value,
            None => null_deref(),
        }
    }
}

#[cold]
#[track_caller]
fn null_deref() -> ! {
    panic!("dereferenced an empty `SharedPtr`")
}

impl<T: ?Sized> TryFrom<&WeakPtr<T>> for SharedPtr<T> {
    type Error = DeadReference;

    #[inline]
    fn try_from(weak: &WeakPtr<T>) -> Result<Self, Self::Error> {
        Self::from_weak(weak)
    }
}

impl<T: ?Sized> From<Box<T>> for SharedPtr<T> {
    #[inline]
    fn from(boxed: Box<T>) -> Self {
        Self::from_box(boxed)
    }
}

impl<T: ?Sized, D: Deleter<T> + 'static> From<UniquePtr<T, D>> for SharedPtr<T> {
    /// Moves the object and its deleter under shared ownership.
    fn from(unique: UniquePtr<T, D>) -> Self {
        match unique.into_parts() {
            // SAFETY: the unique pointer owned the object through `deleter`.
            (Some(ptr), deleter) => unsafe { Self::from_raw_with_deleter(ptr, deleter) },
            (None, _) => Self::null(),
        }
    }
}

/// Handles compare equal when they observe the same address, whatever
/// their ownership group.
impl<T: ?Sized, U: ?Sized> PartialEq<SharedPtr<U>> for SharedPtr<T> {
    #[inline]
    fn eq(&self, other: &SharedPtr<U>) -> bool {
        match (self.ptr, other.ptr) {
            (Some(a), Some(b)) => a.addr_eq(b),
            (None, None) => true,
            _ => false,
        }
    }
}

impl<T: ?Sized> Eq for SharedPtr<T> {}

impl<T: ?Sized> Hash for SharedPtr<T> {
    #[inline]
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.ptr.hash(state);
    }
}

impl<T: ?Sized + fmt::Debug> fmt::Debug for SharedPtr<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.get() {
            Some(value) => f.debug_tuple("SharedPtr").field(&value).finish(),
            None => f.write_str("SharedPtr(null)"),
        }
    }
}

impl<T: ?Sized> fmt::Pointer for SharedPtr<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.ptr {
            Some(ptr) => fmt::Pointer::fmt(&ptr, f),
            None => fmt::Pointer::fmt(&core::ptr::null::<u8>(), f),
        }
    }
}
