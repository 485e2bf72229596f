use core::fmt;
use core::hash::{Hash, Hasher};
use core::ptr::NonNull;

/// A read-only `NonNull<T>`.
///
/// Shared handles use it as the *observed* pointer: the address they
/// dereference to, which is never written through.
///
/// # Examples
///
/// ```
/// use vc_ptr::ConstNonNull;
///
/// let x = 10;
///
/// let ptr = ConstNonNull::from_ref(&x);
///
/// assert_eq!(unsafe { *ptr.as_ref() }, 10);
/// ```
#[repr(transparent)]
pub struct ConstNonNull<T: ?Sized>(NonNull<T>);

impl<T: ?Sized> ConstNonNull<T> {
    /// Create a new `ConstNonNull` or return `None` if `ptr` is null.
    ///
    /// # Examples
    ///
    /// ```
    /// use vc_ptr::ConstNonNull;
    ///
    /// let x = 0u32;
    /// assert!(ConstNonNull::new(&raw const x).is_some());
    /// assert!(ConstNonNull::new(core::ptr::null::<u32>()).is_none());
    /// ```
    #[inline]
    pub const fn new(ptr: *const T) -> Option<Self> {
        match NonNull::new(ptr.cast_mut()) {
            Some(x) => Some(Self(x)),
            None => None,
        }
    }

    /// Create a new `ConstNonNull` without checking for null.
    ///
    /// # Safety
    ///
    /// `ptr` must be non-null.
    #[inline(always)]
    pub const unsafe fn new_unchecked(ptr: *const T) -> Self {
        unsafe { Self(NonNull::new_unchecked(ptr.cast_mut())) }
    }

    /// Wraps an existing `NonNull`, giving up write access through it.
    #[inline(always)]
    pub const fn from_non_null(ptr: NonNull<T>) -> Self {
        Self(ptr)
    }

    /// Converts a reference to a `ConstNonNull` pointer.
    #[inline(always)]
    pub const fn from_ref(r: &T) -> Self {
        Self(NonNull::from_ref(r))
    }

    /// Return an immutable reference to the value.
    ///
    /// # Safety
    ///
    /// The pointer must be
    /// [convertible to a reference](https://doc.rust-lang.org/stable/core/ptr/index.html#pointer-to-reference-conversion)
    /// for the whole of the chosen lifetime `'a`.
    #[inline(always)]
    pub const unsafe fn as_ref<'a>(&self) -> &'a T {
        // SAFETY: See `NonNull::as_ref`
        unsafe { self.0.as_ref() }
    }

    /// Acquires the underlying `*const` pointer.
    #[inline(always)]
    pub const fn as_ptr(self) -> *const T {
        self.0.as_ptr()
    }

    /// Acquires the underlying `NonNull`.
    ///
    /// Writing through the result is only allowed if the pointer was
    /// created from a writable source.
    #[inline(always)]
    pub const fn as_non_null(self) -> NonNull<T> {
        self.0
    }

    /// Casts to a pointer of another type, dropping any metadata.
    #[inline(always)]
    pub const fn cast<U>(self) -> ConstNonNull<U> {
        ConstNonNull(self.0.cast())
    }

    /// Compares addresses, ignoring pointee types and metadata.
    ///
    /// Two pointers into the same place compare equal even if one is a
    /// `ConstNonNull<[u8]>` and the other a `ConstNonNull<u8>`.
    ///
    /// # Examples
    ///
    /// ```
    /// use vc_ptr::ConstNonNull;
    ///
    /// let pair = (1u8, 2u8);
    /// let whole = ConstNonNull::from_ref(&pair);
    /// let first = ConstNonNull::from_ref(&pair.0);
    /// let second = ConstNonNull::from_ref(&pair.1);
    ///
    /// assert!(whole.addr_eq(first));
    /// assert!(!whole.addr_eq(second));
    /// ```
    #[inline]
    pub fn addr_eq<U: ?Sized>(self, other: ConstNonNull<U>) -> bool {
        self.0.cast::<u8>() == other.0.cast::<u8>()
    }
}

impl<T: ?Sized> From<NonNull<T>> for ConstNonNull<T> {
    #[inline(always)]
    fn from(value: NonNull<T>) -> Self {
        Self(value)
    }
}

impl<T: ?Sized> From<&T> for ConstNonNull<T> {
    #[inline(always)]
    fn from(value: &T) -> Self {
        Self::from_ref(value)
    }
}

impl<T: ?Sized> Clone for ConstNonNull<T> {
    #[inline(always)]
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: ?Sized> Copy for ConstNonNull<T> {}

impl<T: ?Sized> PartialEq for ConstNonNull<T> {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.addr_eq(*other)
    }
}

impl<T: ?Sized> Eq for ConstNonNull<T> {}

impl<T: ?Sized> Hash for ConstNonNull<T> {
    #[inline]
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.cast::<u8>().hash(state);
    }
}

impl<T: ?Sized> fmt::Pointer for ConstNonNull<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Pointer::fmt(&self.as_ptr(), f)
    }
}

impl<T: ?Sized> fmt::Debug for ConstNonNull<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Pointer::fmt(&self.as_ptr(), f)
    }
}
