//! `Derived2`: composes a [`Derived1`].
//!
//! Overrides `delete` and `type_string` on every inherited interface and replaces
//! `increase_val4`. Everything else, including the state string, comes from `Derived1`.
//! `Derived2` adds no virtual operations of its own, so it has no private block.

use crate::base1::{Base1, Base1VTable};
use crate::base2::{Base2, Base2VTable};
use crate::define_class;
use crate::derived1::{Derived1, Derived1VTable};
use crate::error::{Result, ResultCode};
use crate::heap::{Handle, Heap};
use crate::vtable::VTable;

define_class! {
    /// Field layout of a `Derived2`.
    pub class Derived2 : derived1 as Derived1 {}
}

static DERIVED2_VTABLE: Derived1VTable = Derived1VTable {
    base1: Base1VTable {
        delete: Some(base1_delete),
        type_string: Some(base1_type_string),
        ..Base1VTable::EMPTY
    },
    base2: Base2VTable {
        delete: Some(base2_delete),
        type_string: Some(base2_type_string),
        ..Base2VTable::EMPTY
    },
    delete: Some(derived1_delete),
    increase_val4: Some(derived1_increase_val4),
};

fn type_string_internal(_heap: &Heap, _this: Handle<Derived2>) -> &'static str {
    "derived2"
}

fn base1_delete(heap: &mut Heap, this: Handle<Base1>) {
    Derived2::delete(heap, Derived2::from_base1(this));
}

fn base1_type_string(heap: &Heap, this: Handle<Base1>) -> &'static str {
    type_string_internal(heap, Derived2::from_base1(this))
}

fn base2_delete(heap: &mut Heap, this: Handle<Base2>) {
    Derived2::delete(heap, Derived2::from_base2(this));
}

fn base2_type_string(heap: &Heap, this: Handle<Base2>) -> &'static str {
    type_string_internal(heap, Derived2::from_base2(this))
}

fn derived1_delete(heap: &mut Heap, this: Handle<Derived1>) {
    Derived2::delete(heap, Derived2::from_derived1(this));
}

fn derived1_increase_val4(heap: &mut Heap, this: Handle<Derived1>) -> Result<()> {
    let derived1 = heap.get_mut(this)?;
    derived1.val4 = derived1.val4.wrapping_add(20);
    Ok(())
}

impl Derived2 {
    /// Create a `Derived2` with default values.
    pub fn new(heap: &mut Heap) -> Result<Handle<Derived2>> {
        let this = heap.allocate::<Derived2>()?;
        if let Err(err) = Derived2::init(heap, this) {
            log::error!("init failed, rc({})", ResultCode::from(err));
            heap.free(this);
            return Err(err);
        }
        Ok(this)
    }

    /// Initialize an allocated `Derived2`.
    ///
    /// On error nothing needs to be cleaned up.
    pub fn init(heap: &mut Heap, this: Handle<Derived2>) -> Result<()> {
        heap.get(this)?;
        let derived1 = Derived2::cast_to_derived1(this);

        Derived1::init(heap, derived1)?;
        if let Err(err) = Derived1::set_vtable(heap, derived1, DERIVED2_VTABLE) {
            Derived1::friend_delete(heap, derived1);
            return Err(err);
        }

        let derived1 = &mut heap.get_mut(this)?.derived1;
        derived1.base2.val1 = 999;
        derived1.val4 = 700;
        Ok(())
    }

    /// Delete the object, releasing every embedded private block. A no-op if it does not
    /// resolve.
    pub fn delete(heap: &mut Heap, this: Handle<Derived2>) {
        if heap.get(this).is_err() {
            return;
        }
        Derived1::friend_delete(heap, Derived2::cast_to_derived1(this));
        heap.free(this);
    }

    /// Up-cast to the `Base1` inside the embedded `Derived1`
    pub const fn cast_to_base1(this: Handle<Derived2>) -> Handle<Base1> {
        Derived1::cast_to_base1(Derived2::cast_to_derived1(this))
    }

    /// Up-cast to the `Base2` inside the embedded `Derived1`
    pub const fn cast_to_base2(this: Handle<Derived2>) -> Handle<Base2> {
        Derived1::cast_to_base2(Derived2::cast_to_derived1(this))
    }

    pub const fn from_base1(base1: Handle<Base1>) -> Handle<Derived2> {
        Derived2::from_derived1(Derived1::from_base1(base1))
    }

    pub const fn from_base2(base2: Handle<Base2>) -> Handle<Derived2> {
        Derived2::from_derived1(Derived1::from_base2(base2))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::text;

    #[test]
    fn defaults_and_overrides() {
        let mut heap = Heap::new();
        let this = Derived2::new(&mut heap).unwrap();
        let derived1 = Derived2::cast_to_derived1(this);
        let base1 = Derived2::cast_to_base1(this);
        let base2 = Derived2::cast_to_base2(this);

        assert_eq!((heap.live_objects(), heap.live_blocks()), (1, 3));
        assert_eq!(Base1::type_string(&heap, base1), "derived2");
        assert_eq!(Base2::type_string(&heap, base2), "derived2");

        let mut buffer = [0u8; 256];
        Base1::string(&heap, base1, &mut buffer).unwrap();
        assert_eq!(
            text::as_str(&buffer),
            "b1_val1(1) b1_val2(2) b1_val3(42) b2_val1(999) d1_val4(700)"
        );

        Derived1::increase_val4(&mut heap, derived1).unwrap();
        Base2::increase_val1(&mut heap, base2).unwrap();
        let inner = &heap.get(this).unwrap().derived1;
        assert_eq!(inner.val4, 720);
        assert_eq!(inner.base2.val1, 1004);
    }

    #[test]
    fn every_delete_path_releases_the_whole_object() {
        let mut heap = Heap::new();
        let handles = [
            Derived2::new(&mut heap).unwrap(),
            Derived2::new(&mut heap).unwrap(),
            Derived2::new(&mut heap).unwrap(),
            Derived2::new(&mut heap).unwrap(),
        ];

        Base1::delete(&mut heap, Derived2::cast_to_base1(handles[0]));
        Base2::delete(&mut heap, Derived2::cast_to_base2(handles[1]));
        Derived1::delete(&mut heap, Derived2::cast_to_derived1(handles[2]));
        Derived2::delete(&mut heap, handles[3]);
        assert_eq!((heap.live_objects(), heap.live_blocks()), (0, 0));

        Derived2::delete(&mut heap, handles[3]);
        assert_eq!(
            Base1::string_size(&heap, Derived2::cast_to_base1(handles[0])),
            Err(Error::InvalidArgument)
        );
    }

    #[test]
    fn chained_casts_sum_offsets() {
        let mut heap = Heap::new();
        let this = Derived2::new(&mut heap).unwrap();
        let base2 = Derived2::cast_to_base2(this);
        assert_eq!(
            base2.offset(),
            core::mem::offset_of!(Derived2, derived1) + core::mem::offset_of!(Derived1, base2)
        );
        assert_eq!(Derived2::from_base2(base2), this);
        assert_eq!(Derived2::from_base1(Derived2::cast_to_base1(this)), this);
        Derived2::delete(&mut heap, this);
    }
}
