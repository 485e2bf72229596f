//! Objects that can hand out shared pointers to themselves.

use core::cell::Cell;
use core::fmt;
use core::ptr::NonNull;

use vc_ptr::ConstNonNull;

use super::block::BlockPtr;
use super::{SharedPtr, WeakPtr};

// -----------------------------------------------------------------------------
// SelfRef

/// A weak back-reference from an object to its own ownership group.
///
/// Embed one in a type and implement [`SharedFromThis`] to let the object
/// produce [`SharedPtr`]s to itself that join the existing strong count.
///
/// The back-reference is weak, so an object never keeps itself alive. It
/// starts unbound and is bound by the `*_tracked` constructors of
/// [`SharedPtr`]; copies, promotions and aliases of a tracked handle bind it
/// again to the same group.
///
/// Cloning a `SelfRef` yields an unbound one: a copy of an object is a new
/// object with no owner yet.
pub struct SelfRef<T: ?Sized> {
    weak: Cell<WeakPtr<T>>,
}

impl<T: ?Sized> SelfRef<T> {
    /// Creates an unbound back-reference.
    #[inline]
    pub const fn new() -> Self {
        Self {
            weak: Cell::new(WeakPtr::empty()),
        }
    }

    /// Returns a copy of the back-reference.
    ///
    /// Empty if the object was never placed under tracked shared ownership.
    pub fn weak(&self) -> WeakPtr<T> {
        let weak = self.weak.take();
        let copy = weak.clone();
        self.weak.set(weak);
        copy
    }

    /// Promotes the back-reference.
    ///
    /// Empty if the object is unbound or is being destroyed.
    #[inline]
    pub fn shared(&self) -> SharedPtr<T> {
        self.weak().lock()
    }

    /// Whether a shared pointer construction has bound this back-reference.
    pub fn is_bound(&self) -> bool {
        let weak = self.weak.take();
        let bound = weak.block.is_some();
        self.weak.set(weak);
        bound
    }
}

impl<T: ?Sized> Default for SelfRef<T> {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ?Sized> Clone for SelfRef<T> {
    #[inline]
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<T: ?Sized> fmt::Debug for SelfRef<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SelfRef")
            .field("bound", &self.is_bound())
            .finish()
    }
}

// -----------------------------------------------------------------------------
// SharedFromThis

/// Opt-in capability for objects that observe their own shared ownership.
///
/// Only the `*_tracked` constructors bind the back-reference:
/// [`SharedPtr::new_tracked`], [`SharedPtr::from_box_tracked`] and
/// [`SharedPtr::from_raw_tracked`]. The plain constructors accept any `T`
/// and leave it unbound, even when `T` implements this trait; such an object
/// answers [`shared_from_this`](Self::shared_from_this) with an empty handle.
///
/// ```
/// use vc_own::{SelfRef, SharedFromThis, SharedPtr};
///
/// struct Node {
///     this: SelfRef<Node>,
/// }
///
/// impl SharedFromThis for Node {
///     fn self_ref(&self) -> &SelfRef<Self> {
///         &self.this
///     }
/// }
///
/// let plain = SharedPtr::new(Node { this: SelfRef::new() });
/// assert!(plain.shared_from_this().is_null());
///
/// let tracked = SharedPtr::new_tracked(Node { this: SelfRef::new() });
/// assert!(tracked.shared_from_this().owner_eq(&tracked));
/// ```
///
/// # Examples
///
/// ```
/// use vc_own::{SelfRef, SharedFromThis, SharedPtr};
///
/// struct Node {
///     this: SelfRef<Node>,
///     id: u32,
/// }
///
/// impl SharedFromThis for Node {
///     fn self_ref(&self) -> &SelfRef<Self> {
///         &self.this
///     }
/// }
///
/// let a = SharedPtr::new_tracked(Node { this: SelfRef::new(), id: 7 });
/// let b = a.clone();
///
/// let me = b.shared_from_this();
/// assert_eq!(me.id, 7);
/// assert_eq!(a.use_count(), 3);
/// ```
pub trait SharedFromThis {
    /// The embedded back-reference.
    fn self_ref(&self) -> &SelfRef<Self>;

    /// Returns a new strong handle in this object's ownership group.
    ///
    /// Empty if the object is not under tracked shared ownership, or is
    /// being destroyed.
    #[inline]
    fn shared_from_this(&self) -> SharedPtr<Self> {
        self.self_ref().shared()
    }

    /// Returns a new weak handle in this object's ownership group.
    #[inline]
    fn weak_from_this(&self) -> WeakPtr<Self> {
        self.self_ref().weak()
    }
}

/// Points the back-reference of `object` at `block`.
///
/// A back-reference already bound to `block` is left untouched.
///
/// # Safety
/// `block` must be live, own `object`, and have a strong count above zero.
pub(crate) unsafe fn install_self_ref<T: SharedFromThis>(block: BlockPtr, object: NonNull<T>) {
    // SAFETY: the object is alive while the strong count is non-zero.
    let slot = unsafe { object.as_ref() }.self_ref();

    let current = slot.weak.take();
    if current.block == Some(block) {
        slot.weak.set(current);
        return;
    }

    if !current.expired() {
        log::warn!(
            "`{}` at {object:p} is owned by two control blocks, rebinding its self reference",
            core::any::type_name::<T>(),
        );
    }

    // SAFETY: upheld by the caller.
    let weak = unsafe { WeakPtr::from_block(block, ConstNonNull::from_non_null(object)) };
    slot.weak.set(weak);

    // The old reference goes last: dropping it may free another block.
    drop(current);
}
