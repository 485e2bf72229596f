use core::fmt;
use core::mem::MaybeUninit;
use core::ptr::NonNull;

/// Storage sized and aligned for one `T`, constructed and destroyed in place.
///
/// A `Slot` never drops its content by itself: the owner decides when the
/// value dies with [`drop_in_place`](Self::drop_in_place), and may keep the
/// storage around afterwards. This is what lets a single allocation hold
/// both bookkeeping and a value whose lifetime ends before the allocation's.
///
/// # Examples
///
/// ```
/// use core::ptr::NonNull;
/// use vc_ptr::Slot;
///
/// let mut slot = Slot::new(String::from("inline"));
/// let ptr = NonNull::from(&mut slot);
///
/// assert_eq!(unsafe { Slot::as_non_null(ptr).as_ref() }, "inline");
/// unsafe { Slot::drop_in_place(ptr) };
/// ```
#[repr(transparent)]
pub struct Slot<T>(MaybeUninit<T>);

impl<T> Slot<T> {
    /// Creates a slot holding nothing.
    #[inline(always)]
    pub const fn uninit() -> Self {
        Self(MaybeUninit::uninit())
    }

    /// Creates a slot with `value` constructed in it.
    #[inline(always)]
    pub const fn new(value: T) -> Self {
        Self(MaybeUninit::new(value))
    }

    /// Constructs `value` in an empty slot.
    ///
    /// If the slot already held a value, that value is leaked.
    #[inline]
    pub fn write(&mut self, value: T) -> &mut T {
        self.0.write(value)
    }

    /// Returns a reference to the value.
    ///
    /// # Safety
    /// The slot must hold a value.
    #[inline(always)]
    pub const unsafe fn assume_init_ref(&self) -> &T {
        // SAFETY: the caller guarantees initialization.
        unsafe { self.0.assume_init_ref() }
    }

    /// Projects a pointer to the slot onto a pointer to its value.
    ///
    /// The result keeps the provenance of `slot`, so it may be written
    /// through when `slot` may.
    #[inline(always)]
    pub const fn as_non_null(slot: NonNull<Self>) -> NonNull<T> {
        slot.cast()
    }

    /// Runs the destructor of the value in place, leaving the slot empty.
    ///
    /// # Safety
    /// - `slot` must be valid for writes and hold a value.
    /// - The value must not be accessed afterwards.
    #[inline]
    pub unsafe fn drop_in_place(slot: NonNull<Self>) {
        // SAFETY: upheld by the caller.
        unsafe { Self::as_non_null(slot).drop_in_place() }
    }
}

impl<T> fmt::Debug for Slot<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Slot<{}>", core::any::type_name::<T>())
    }
}
