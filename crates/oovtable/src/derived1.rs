//! `Derived1`: composes a [`Base1`] and a [`Base2`].
//!
//! Overrides on the `Base1` side: `delete`, `type_string`, `string`, `string_size`
//! (`increase_val3` is inherited). On the `Base2` side the same four plus the abstract
//! `increase_val1`. Adds `increase_val4`.

use crate::base1::{Base1, Base1VTable};
use crate::base2::{Base2, Base2VTable};
use crate::define_class;
use crate::error::{Error, Result, ResultCode};
use crate::heap::{BlockId, Handle, Heap};
use crate::proc::virtuals;
use crate::text;
use crate::vtable::{Inherit, VTable};

const DERIVED1_STR_SIZE: usize = 256;

define_class! {
    /// Field layout of a `Derived1`, visible to composing classes.
    pub class Derived1 : base1 as Base1, base2 as Base2 {
        private: Option<BlockId>,
        pub val4: u32,
    }
}

#[virtuals(Derived1, internal, extends(base1: Base1, base2: Base2))]
pub trait Derived1Virtuals {
    /// Delete the object. A no-op if it does not resolve.
    fn delete(heap: &mut Heap, this: Handle<Derived1>);

    /// Increase `val4`.
    fn increase_val4(heap: &mut Heap, this: Handle<Derived1>) -> Result<()>;
}

static DERIVED1_VTABLE: Derived1VTable = Derived1VTable {
    base1: Base1VTable {
        delete: Some(base1_delete),
        type_string: Some(base1_type_string),
        string: Some(base1_string),
        string_size: Some(base1_string_size),
        ..Base1VTable::EMPTY
    },
    base2: Base2VTable {
        delete: Some(base2_delete),
        type_string: Some(base2_type_string),
        string: Some(base2_string),
        string_size: Some(base2_string_size),
        increase_val1: Some(base2_increase_val1),
    },
    delete: Some(private_delete),
    increase_val4: Some(increase_val4_internal),
};

fn type_string_internal(_heap: &Heap, _this: Handle<Derived1>) -> &'static str {
    "derived1"
}

fn string_size_internal(heap: &Heap, this: Handle<Derived1>) -> Result<usize> {
    heap.get(this)?;
    Ok(DERIVED1_STR_SIZE)
}

fn string_internal(heap: &Heap, this: Handle<Derived1>, buffer: &mut [u8]) -> Result<()> {
    let min_size = string_size_internal(heap, this)?;
    if buffer.len() < min_size {
        log::error!("invalid input, buffer_size({}) < {min_size}", buffer.len());
        return Err(Error::InvalidArgument);
    }

    let derived1 = heap.get(this)?;
    text::write_into(
        buffer,
        format_args!(
            "b1_val1({}) b1_val2({}) b1_val3({}) b2_val1({}) d1_val4({})",
            derived1.base1.public_data.val1,
            derived1.base1.public_data.val2,
            derived1.base1.val3,
            derived1.base2.val1,
            derived1.val4
        ),
    );
    Ok(())
}

fn increase_val4_internal(heap: &mut Heap, this: Handle<Derived1>) -> Result<()> {
    let derived1 = heap.get_mut(this)?;
    derived1.val4 = derived1.val4.wrapping_mul(3);
    Ok(())
}

fn base1_delete(heap: &mut Heap, this: Handle<Base1>) {
    Derived1::delete(heap, Derived1::from_base1(this));
}

fn base1_type_string(heap: &Heap, this: Handle<Base1>) -> &'static str {
    type_string_internal(heap, Derived1::from_base1(this))
}

fn base1_string(heap: &Heap, this: Handle<Base1>, buffer: &mut [u8]) -> Result<()> {
    string_internal(heap, Derived1::from_base1(this), buffer)
}

fn base1_string_size(heap: &Heap, this: Handle<Base1>) -> Result<usize> {
    string_size_internal(heap, Derived1::from_base1(this))
}

fn base2_delete(heap: &mut Heap, this: Handle<Base2>) {
    Derived1::delete(heap, Derived1::from_base2(this));
}

fn base2_type_string(heap: &Heap, this: Handle<Base2>) -> &'static str {
    type_string_internal(heap, Derived1::from_base2(this))
}

fn base2_string(heap: &Heap, this: Handle<Base2>, buffer: &mut [u8]) -> Result<()> {
    string_internal(heap, Derived1::from_base2(this), buffer)
}

fn base2_string_size(heap: &Heap, this: Handle<Base2>) -> Result<usize> {
    string_size_internal(heap, Derived1::from_base2(this))
}

fn base2_increase_val1(heap: &mut Heap, this: Handle<Base2>) -> Result<()> {
    let base2 = heap.get_mut(this)?;
    base2.val1 = base2.val1.wrapping_add(5);
    Ok(())
}

fn private_delete(heap: &mut Heap, this: Handle<Derived1>) {
    Derived1::friend_delete(heap, this);
    heap.free(this);
}

/// Which embedded bases have been initialized, for unwinding
#[derive(Default)]
struct Initialized {
    base1: bool,
    base2: bool,
}

impl Derived1 {
    /// Create a `Derived1` with default values.
    pub fn new(heap: &mut Heap) -> Result<Handle<Derived1>> {
        let this = heap.allocate::<Derived1>()?;
        if let Err(err) = Derived1::init(heap, this) {
            log::error!("init failed, rc({})", ResultCode::from(err));
            heap.free(this);
            return Err(err);
        }
        Ok(this)
    }

    /// Initialize an allocated `Derived1`, embedded or not.
    ///
    /// The embedded bases are initialized first and receive the `Derived1` overrides. On error
    /// everything initialized so far is released and nothing needs to be cleaned up.
    pub fn init(heap: &mut Heap, this: Handle<Derived1>) -> Result<()> {
        heap.get(this)?;

        let mut initialized = Initialized::default();
        let result = Derived1::init_parts(heap, this, &mut initialized);
        if result.is_err() {
            if initialized.base2 {
                Base2::friend_delete(heap, Derived1::cast_to_base2(this));
            }
            if initialized.base1 {
                Base1::friend_delete(heap, Derived1::cast_to_base1(this));
            }
        }
        result
    }

    fn init_parts(
        heap: &mut Heap,
        this: Handle<Derived1>,
        initialized: &mut Initialized,
    ) -> Result<()> {
        let base1 = Derived1::cast_to_base1(this);
        let base2 = Derived1::cast_to_base2(this);

        Base1::init(heap, base1)?;
        initialized.base1 = true;
        Base1::set_vtable(heap, base1, DERIVED1_VTABLE.base1)?;

        Base2::init(heap, base2)?;
        initialized.base2 = true;
        Base2::set_vtable(heap, base2, DERIVED1_VTABLE.base2)?;

        heap.get_mut(this)?.val4 = 500;
        Derived1::attach_vtable(heap, this, DERIVED1_VTABLE)
    }

    /// Install the overrides of a composing class.
    ///
    /// Empty slots inherit the `Derived1` implementation. The nested base tables are handed to
    /// [`Base1::set_vtable`] and [`Base2::set_vtable`], which fill what is still empty from the
    /// bases' own implementations.
    pub fn set_vtable(
        heap: &mut Heap,
        this: Handle<Derived1>,
        mut overrides: Derived1VTable,
    ) -> Result<()> {
        heap.get(this)?;
        overrides.inherit_from(&DERIVED1_VTABLE, Inherit::Strict)?;
        Base1::set_vtable(heap, Derived1::cast_to_base1(this), overrides.base1)?;
        Base2::set_vtable(heap, Derived1::cast_to_base2(this), overrides.base2)?;
        Derived1::install_vtable(heap, this, overrides)?;
        log::debug!("installed {overrides:?} for {this:?}");
        Ok(())
    }

    /// Release what a `Derived1` owns, including its bases' private blocks, without freeing
    /// the object itself.
    pub fn friend_delete(heap: &mut Heap, this: Handle<Derived1>) {
        Base1::friend_delete(heap, Derived1::cast_to_base1(this));
        Base2::friend_delete(heap, Derived1::cast_to_base2(this));
        Derived1::detach_vtable(heap, this);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_and_overrides() {
        let mut heap = Heap::new();
        let this = Derived1::new(&mut heap).unwrap();
        let base1 = Derived1::cast_to_base1(this);
        let base2 = Derived1::cast_to_base2(this);

        assert_eq!((heap.live_objects(), heap.live_blocks()), (1, 3));
        assert_eq!(heap.get(this).unwrap().val4, 500);
        assert_eq!(Base1::type_string(&heap, base1), "derived1");
        assert_eq!(Base2::type_string(&heap, base2), "derived1");
        assert_eq!(Base1::string_size(&heap, base1), Ok(256));
        assert_eq!(Base2::string_size(&heap, base2), Ok(256));

        let mut buffer = [0u8; 256];
        Base2::string(&heap, base2, &mut buffer).unwrap();
        assert_eq!(
            text::as_str(&buffer),
            "b1_val1(1) b1_val2(2) b1_val3(42) b2_val1(7) d1_val4(500)"
        );
    }

    #[test]
    fn counters() {
        let mut heap = Heap::new();
        let this = Derived1::new(&mut heap).unwrap();
        let base1 = Derived1::cast_to_base1(this);
        let base2 = Derived1::cast_to_base2(this);

        Base1::increase_val3(&mut heap, base1).unwrap();
        Base2::increase_val1(&mut heap, base2).unwrap();
        Derived1::increase_val4(&mut heap, this).unwrap();

        let derived1 = heap.get(this).unwrap();
        assert_eq!(derived1.base1.val3, 84);
        assert_eq!(derived1.base2.val1, 12);
        assert_eq!(derived1.val4, 1500);
    }

    #[test]
    fn delete_through_either_base() {
        let mut heap = Heap::new();
        let first = Derived1::new(&mut heap).unwrap();
        let second = Derived1::new(&mut heap).unwrap();

        Base1::delete(&mut heap, Derived1::cast_to_base1(first));
        assert_eq!((heap.live_objects(), heap.live_blocks()), (1, 3));
        Base2::delete(&mut heap, Derived1::cast_to_base2(second));
        assert_eq!((heap.live_objects(), heap.live_blocks()), (0, 0));

        assert_eq!(Base1::type_string(&heap, Derived1::cast_to_base1(first)), "");
        assert_eq!(
            Derived1::increase_val4(&mut heap, second),
            Err(Error::InvalidArgument)
        );
    }

    #[test]
    fn set_vtable_rejects_dead_objects() {
        let mut heap = Heap::new();
        let this = Derived1::new(&mut heap).unwrap();
        Derived1::delete(&mut heap, this);
        assert_eq!(
            Derived1::set_vtable(&mut heap, this, Derived1VTable::EMPTY),
            Err(Error::InvalidArgument)
        );
    }
}
