//! Construction is all-or-nothing under allocation failure.

use oovtable::{
    Base1, Base1PublicData, Derived1, Derived2, Error, Handle, Heap, HeapConfig, Result,
};

/// Inject a failure at every allocation index until construction succeeds, checking that
/// each failed attempt leaves the heap empty. Returns the number of allocations construction
/// needs.
fn fail_at_every_allocation<T>(construct: impl Fn(&mut Heap) -> Result<Handle<T>>) -> usize {
    let mut index = 0;
    loop {
        let mut heap = Heap::new();
        heap.fail_after(index);
        match construct(&mut heap) {
            Ok(_) => return index,
            Err(err) => {
                assert_eq!(err, Error::OutOfMemory, "failure at allocation {index}");
                assert_eq!(heap.live_objects(), 0, "objects leaked at allocation {index}");
                assert_eq!(heap.live_blocks(), 0, "blocks leaked at allocation {index}");
            }
        }
        index += 1;
        assert!(index < 16, "construction never succeeded");
    }
}

#[test]
fn base1_constructors_roll_back() {
    assert_eq!(fail_at_every_allocation(Base1::new), 2);

    let data = Base1PublicData { val1: 5, val2: 6 };
    assert_eq!(
        fail_at_every_allocation(|heap| Base1::with_public_data(heap, &data)),
        2
    );
    assert_eq!(
        fail_at_every_allocation(|heap| Base1::with_values(heap, 5, 6)),
        2
    );
}

#[test]
fn derived1_rolls_back() {
    assert_eq!(fail_at_every_allocation(Derived1::new), 4);
}

#[test]
fn derived2_rolls_back() {
    assert_eq!(fail_at_every_allocation(Derived2::new), 4);
}

#[test]
fn failed_construction_does_not_disturb_live_objects() {
    let mut heap = Heap::new();
    let survivor = Derived1::new(&mut heap).unwrap();

    heap.fail_after(2);
    assert_eq!(Derived2::new(&mut heap), Err(Error::OutOfMemory));
    assert_eq!((heap.live_objects(), heap.live_blocks()), (1, 3));

    let base1 = Derived1::cast_to_base1(survivor);
    assert_eq!(Base1::type_string(&heap, base1), "derived1");
    Base1::delete(&mut heap, base1);
    assert_eq!((heap.live_objects(), heap.live_blocks()), (0, 0));
}

#[test]
fn capacity_limits_construction() {
    let mut heap = Heap::with_config(HeapConfig::new().with_capacity(6));
    let first = Derived1::new(&mut heap).unwrap();
    assert_eq!(Derived1::new(&mut heap), Err(Error::OutOfMemory));
    assert_eq!((heap.live_objects(), heap.live_blocks()), (1, 3));

    let base1 = Base1::new(&mut heap).unwrap();
    assert_eq!(Base1::new(&mut heap), Err(Error::OutOfMemory));

    Derived1::delete(&mut heap, first);
    Base1::delete(&mut heap, base1);
    assert!(Derived2::new(&mut heap).is_ok());
}

#[test]
fn deleted_slots_are_reused_without_reviving_handles() {
    let mut heap = Heap::new();
    let old = Derived1::new(&mut heap).unwrap();
    Derived1::delete(&mut heap, old);

    let new = Derived1::new(&mut heap).unwrap();
    assert_ne!(old, new);
    assert!(!heap.contains(old));
    assert_eq!(Derived1::increase_val4(&mut heap, old), Err(Error::InvalidArgument));
    assert_eq!(heap.get(new).unwrap().val4, 500);
}
