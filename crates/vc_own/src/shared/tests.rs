use alloc::boxed::Box;
use alloc::rc::Rc;
use core::cell::Cell;
use core::ptr::NonNull;

use vc_ptr::{DefaultDeleter, Deleter};

use super::{SelfRef, SharedFromThis, SharedPtr, WeakPtr};

// -----------------------------------------------------------------------------
// Helpers

/// Counts how many times the object died.
struct Witness {
    drops: Rc<Cell<usize>>,
    value: i32,
}

impl Witness {
    fn new(drops: &Rc<Cell<usize>>, value: i32) -> Self {
        Self {
            drops: drops.clone(),
            value,
        }
    }
}

impl Drop for Witness {
    fn drop(&mut self) {
        self.drops.set(self.drops.get() + 1);
    }
}

/// Counts how many times the control block was freed.
///
/// A pointer-owning block drops its deleter together with its storage, so a
/// deleter carrying this guard reports the moment the block goes away.
struct Freed(Rc<Cell<usize>>);

impl Drop for Freed {
    fn drop(&mut self) {
        self.0.set(self.0.get() + 1);
    }
}

fn counted_deleter<T: 'static>(freed: &Rc<Cell<usize>>) -> impl FnMut(NonNull<T>) + use<T> {
    let guard = Freed(freed.clone());
    move |ptr| {
        let _guard = &guard;
        unsafe { DefaultDeleter.delete(ptr) }
    }
}

fn counted<T: 'static>(value: T, freed: &Rc<Cell<usize>>) -> SharedPtr<T> {
    let ptr = NonNull::from(Box::leak(Box::new(value)));
    unsafe { SharedPtr::from_raw_with_deleter(ptr, counted_deleter(freed)) }
}

struct Node {
    this: SelfRef<Node>,
    witness: Witness,
}

impl SharedFromThis for Node {
    fn self_ref(&self) -> &SelfRef<Self> {
        &self.this
    }
}

fn node(drops: &Rc<Cell<usize>>, value: i32) -> Node {
    Node {
        this: SelfRef::new(),
        witness: Witness::new(drops, value),
    }
}

// -----------------------------------------------------------------------------
// Object lifetime

#[test]
fn object_dies_once_whatever_the_release_order() {
    let orders = [
        [0, 1, 2],
        [0, 2, 1],
        [1, 0, 2],
        [1, 2, 0],
        [2, 0, 1],
        [2, 1, 0],
    ];

    for order in orders {
        let drops = Rc::new(Cell::new(0));
        let first = SharedPtr::new(Witness::new(&drops, 1));
        let mut handles = [first.clone(), first.clone(), first];

        for (released, &index) in order.iter().enumerate() {
            assert_eq!(drops.get(), 0);
            handles[index].reset();

            let remaining = 2 - released;
            for handle in handles.iter().filter(|h| !h.is_null()) {
                assert_eq!(handle.use_count(), remaining);
            }
        }

        assert_eq!(drops.get(), 1);
        drop(handles);
        assert_eq!(drops.get(), 1);
    }
}

#[test]
fn moves_do_not_touch_counts() {
    let drops = Rc::new(Cell::new(0));
    let mut a = SharedPtr::new(Witness::new(&drops, 1));
    let b = a.clone();

    let c = a.take();
    assert!(a.is_null());
    assert_eq!(c.use_count(), 2);

    let d = c;
    drop(b);
    assert_eq!(d.use_count(), 1);
    assert_eq!(drops.get(), 0);

    drop(d);
    assert_eq!(drops.get(), 1);
}

// -----------------------------------------------------------------------------
// Block lifetime

#[test]
fn block_outlives_object_while_weak_handles_remain() {
    let drops = Rc::new(Cell::new(0));
    let freed = Rc::new(Cell::new(0));

    let strong = counted(Witness::new(&drops, 1), &freed);
    let w1 = strong.downgrade();
    let w2 = w1.clone();

    drop(strong);
    assert_eq!((drops.get(), freed.get()), (1, 0));

    drop(w1);
    assert_eq!((drops.get(), freed.get()), (1, 0));

    drop(w2);
    assert_eq!((drops.get(), freed.get()), (1, 1));
}

#[test]
fn block_dies_with_object_when_no_weak_handle_is_left() {
    let drops = Rc::new(Cell::new(0));
    let freed = Rc::new(Cell::new(0));

    let strong = counted(Witness::new(&drops, 1), &freed);
    let weak = strong.downgrade();
    let copy = strong.clone();

    drop(weak);
    drop(strong);
    assert_eq!((drops.get(), freed.get()), (0, 0));

    drop(copy);
    assert_eq!((drops.get(), freed.get()), (1, 1));
}

// -----------------------------------------------------------------------------
// Promotion

#[test]
fn expired_weak_never_promotes() {
    let drops = Rc::new(Cell::new(0));
    let strong = SharedPtr::new(Witness::new(&drops, 1));
    let weak = strong.downgrade();
    drop(strong);

    assert!(weak.expired());
    for _ in 0..3 {
        assert!(weak.lock().is_null());
        assert!(SharedPtr::from_weak(&weak).is_err());
    }
    assert_eq!(weak.use_count(), 0);
    assert_eq!(drops.get(), 1);
}

#[test]
fn lock_round_trip() {
    let strong = SharedPtr::new(42);
    let weak = strong.downgrade();
    let before = strong.use_count();

    let locked = weak.lock();
    assert_eq!(locked.as_ptr(), strong.as_ptr());
    assert!(locked == strong);
    assert_eq!(strong.use_count(), before + 1);
}

#[test]
fn weak_handles_only_come_from_existing_handles() {
    let empty = SharedPtr::<i32>::null();
    let from_empty: WeakPtr<i32> = empty.downgrade();
    assert!(from_empty.expired());
    assert!(from_empty.owner_eq(&WeakPtr::<i32>::default()));

    let strong = SharedPtr::new(1);
    let weak = WeakPtr::from(&strong);
    assert!(weak.lock().owner_eq(&strong));
}

// -----------------------------------------------------------------------------
// Aliasing

struct Parent {
    witness: Witness,
    child: i32,
}

#[test]
fn alias_keeps_parent_alive() {
    let drops = Rc::new(Cell::new(0));
    let parent = SharedPtr::new(Parent {
        witness: Witness::new(&drops, 1),
        child: 11,
    });
    let parent_weak = parent.downgrade();
    let child = parent.map(|p| &p.child);

    drop(parent);
    assert_eq!(drops.get(), 0);
    assert!(!parent_weak.expired());
    assert_eq!(*child, 11);
    assert_eq!(child.use_count(), 1);
    assert_eq!(parent_weak.lock().witness.value, 1);

    drop(child);
    assert_eq!(drops.get(), 1);
    assert!(parent_weak.expired());
}

#[test]
fn alias_of_empty_is_empty() {
    let empty = SharedPtr::<Parent>::null();
    let child = empty.map(|p| &p.child);
    assert!(child.is_null());
    assert_eq!(child.use_count(), 0);
}

// -----------------------------------------------------------------------------
// Self reference

#[test]
fn self_handle_joins_existing_group() {
    let drops = Rc::new(Cell::new(0));
    let a = SharedPtr::new_tracked(node(&drops, 1));
    let b = a.clone();
    assert_eq!(b.use_count(), 2);

    let me = a.shared_from_this();
    assert_eq!(me.use_count(), 3);
    assert!(me.owner_eq(&b));

    drop((a, b, me));
    assert_eq!(drops.get(), 1);
}

#[test]
fn rebinding_keeps_a_single_back_reference() {
    let drops = Rc::new(Cell::new(0));
    let a = SharedPtr::new_tracked(node(&drops, 1));
    assert_eq!(a.weak_count(), 1);

    let b = a.clone();
    let c = b.downgrade().lock();
    let d = a.map(|n| &n.witness);
    assert_eq!(a.weak_count(), 1);
    assert_eq!(a.use_count(), 4);
    assert_eq!(d.value, 1);
    assert!(a.weak_from_this().lock() == c);

    drop((a, b, c, d));
    assert_eq!(drops.get(), 1);
}

#[test]
fn back_reference_does_not_keep_block_alive() {
    let drops = Rc::new(Cell::new(0));
    let freed = Rc::new(Cell::new(0));

    let ptr = NonNull::from(Box::leak(Box::new(node(&drops, 1))));
    let a = unsafe { SharedPtr::from_raw_tracked(ptr, counted_deleter(&freed)) };
    assert!(a.this.is_bound());
    let b = a.shared_from_this();
    assert_eq!(b.use_count(), 2);

    drop(a);
    drop(b);
    assert_eq!((drops.get(), freed.get()), (1, 1));
}

#[test]
fn back_reference_and_outside_weak_handle() {
    let drops = Rc::new(Cell::new(0));
    let freed = Rc::new(Cell::new(0));

    let ptr = NonNull::from(Box::leak(Box::new(node(&drops, 1))));
    let a = unsafe { SharedPtr::from_raw_tracked(ptr, counted_deleter(&freed)) };
    let outside = a.weak_from_this();
    assert_eq!(a.weak_count(), 2);

    drop(a);
    assert_eq!((drops.get(), freed.get()), (1, 0));
    assert_eq!(outside.weak_count(), 1);

    drop(outside);
    assert_eq!((drops.get(), freed.get()), (1, 1));
}

// -----------------------------------------------------------------------------
// Scenario

struct Holder {
    value: i32,
    witness: Witness,
}

#[test]
fn inline_integer_holder() {
    let drops = Rc::new(Cell::new(0));
    let original = SharedPtr::new(Holder {
        value: 5,
        witness: Witness::new(&drops, 5),
    });
    let weak = original.downgrade();

    let first = original.clone();
    let second = first.clone();
    assert_eq!(original.use_count(), 3);

    drop(first);
    drop(second);
    assert_eq!(original.use_count(), 1);
    assert_eq!(original.value, 5);
    assert_eq!(original.witness.value, 5);
    assert_eq!(drops.get(), 0);

    drop(original);
    assert_eq!(drops.get(), 1);
    assert!(weak.expired());
    assert!(weak.lock().is_null());
}
