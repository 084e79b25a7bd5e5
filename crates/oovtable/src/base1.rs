//! `Base1`: a concrete base class.
//!
//! Public surface: the constructors, the public-data accessors, the static
//! [`Base1::val1_description`] and the virtual operations. Classes composing a `Base1` also use
//! the friend surface: [`Base1::init`], [`Base1::set_vtable`] and [`Base1::friend_delete`].

use crate::define_class;
use crate::error::{Error, Result, ResultCode};
use crate::heap::{BlockId, Handle, Heap};
use crate::proc::virtuals;
use crate::text;
use crate::vtable::{Inherit, VTable};

/// Size reported by `string_size` for `Base1` objects
const BASE1_STR_SIZE: usize = 128;

/// Data any holder of a `Base1` handle may read and overwrite (as a whole)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Base1PublicData {
    pub val1: u8,
    pub val2: u32,
}

define_class! {
    /// Field layout of a `Base1`, visible to composing classes.
    pub class Base1 {
        private: Option<BlockId>,
        pub public_data: Base1PublicData,
        pub val3: u32,
    }
}

#[virtuals(Base1, internal)]
pub trait Base1Virtuals {
    /// Delete the object. A no-op if it does not resolve.
    ///
    /// Deleting through the handle of an embedded base releases the whole composing object.
    fn delete(heap: &mut Heap, this: Handle<Base1>);

    /// Name of the object's most-derived class, `""` if it does not resolve.
    fn type_string(heap: &Heap, this: Handle<Base1>) -> &'static str;

    /// Write the object's state into `buffer`, NUL-terminated.
    ///
    /// `buffer` must be at least `string_size` bytes long.
    fn string(heap: &Heap, this: Handle<Base1>, buffer: &mut [u8]) -> Result<()>;

    /// Minimum buffer length for `string`.
    fn string_size(heap: &Heap, this: Handle<Base1>) -> Result<usize>;

    /// Double `val3`.
    fn increase_val3(heap: &mut Heap, this: Handle<Base1>) -> Result<()>;
}

static BASE1_VTABLE: Base1VTable = Base1VTable {
    delete: Some(private_delete),
    type_string: Some(type_string_internal),
    string: Some(string_internal),
    string_size: Some(string_size_internal),
    increase_val3: Some(increase_val3_internal),
};

fn type_string_internal(_heap: &Heap, _this: Handle<Base1>) -> &'static str {
    "base1"
}

fn string_size_internal(heap: &Heap, this: Handle<Base1>) -> Result<usize> {
    heap.get(this)?;
    Ok(BASE1_STR_SIZE)
}

fn string_internal(heap: &Heap, this: Handle<Base1>, buffer: &mut [u8]) -> Result<()> {
    let min_size = Base1::string_size(heap, this)?;
    if buffer.len() < min_size {
        log::error!("invalid input, buffer_size({}) < {min_size}", buffer.len());
        return Err(Error::InvalidArgument);
    }

    let base1 = heap.get(this)?;
    text::write_into(
        buffer,
        format_args!(
            "val1({}) val2({}) val3({})",
            base1.public_data.val1, base1.public_data.val2, base1.val3
        ),
    );
    Ok(())
}

fn increase_val3_internal(heap: &mut Heap, this: Handle<Base1>) -> Result<()> {
    let base1 = heap.get_mut(this)?;
    base1.val3 = base1.val3.wrapping_mul(2);
    Ok(())
}

/// Delete for a `Base1` allocated on its own
fn private_delete(heap: &mut Heap, this: Handle<Base1>) {
    Base1::friend_delete(heap, this);
    heap.free(this);
}

impl Base1 {
    /// Create a `Base1` with default values.
    pub fn new(heap: &mut Heap) -> Result<Handle<Base1>> {
        let this = heap.allocate::<Base1>()?;
        if let Err(err) = Base1::init(heap, this) {
            log::error!("init failed, rc({})", ResultCode::from(err));
            heap.free(this);
            return Err(err);
        }
        Ok(this)
    }

    /// Create a `Base1` whose public data is a copy of `public_data`.
    pub fn with_public_data(heap: &mut Heap, public_data: &Base1PublicData) -> Result<Handle<Base1>> {
        let this = Base1::new(heap)?;
        heap.get_mut(this)?.public_data = *public_data;
        Ok(this)
    }

    /// Create a `Base1` with the given `val1` and `val3`.
    pub fn with_values(heap: &mut Heap, val1: u8, val3: u32) -> Result<Handle<Base1>> {
        let this = Base1::new(heap)?;
        let base1 = heap.get_mut(this)?;
        base1.public_data.val1 = val1;
        base1.val3 = val3;
        Ok(this)
    }

    /// Static method: description of `val1`.
    pub fn val1_description() -> &'static str {
        "Value 1"
    }

    /// Copy of the object's public data. Changing the copy does not change the object.
    pub fn get_public_data(heap: &Heap, this: Handle<Base1>) -> Result<Base1PublicData> {
        Ok(heap.get(this)?.public_data)
    }

    /// Overwrite all of the object's public data.
    pub fn set_public_data(
        heap: &mut Heap,
        this: Handle<Base1>,
        public_data: &Base1PublicData,
    ) -> Result<()> {
        heap.get_mut(this)?.public_data = *public_data;
        Ok(())
    }

    /// Initialize an allocated `Base1`, embedded or not.
    ///
    /// Must be called before the object is used. On error nothing needs to be cleaned up.
    pub fn init(heap: &mut Heap, this: Handle<Base1>) -> Result<()> {
        let base1 = heap.get_mut(this)?;
        base1.public_data = Base1PublicData { val1: 1, val2: 2 };
        base1.val3 = 42;
        Base1::attach_vtable(heap, this, BASE1_VTABLE)
    }

    /// Install the overrides of a composing class.
    ///
    /// Empty slots in `overrides` inherit the `Base1` implementation.
    pub fn set_vtable(
        heap: &mut Heap,
        this: Handle<Base1>,
        mut overrides: Base1VTable,
    ) -> Result<()> {
        overrides.inherit_from(&BASE1_VTABLE, Inherit::Strict)?;
        Base1::install_vtable(heap, this, overrides)?;
        log::debug!("installed {overrides:?} for {this:?}");
        Ok(())
    }

    /// Release what a `Base1` owns without freeing the object itself.
    ///
    /// For composing classes, which manage the enclosing allocation.
    pub fn friend_delete(heap: &mut Heap, this: Handle<Base1>) {
        Base1::detach_vtable(heap, this);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let mut heap = Heap::new();
        let this = Base1::new(&mut heap).unwrap();
        assert_eq!(
            Base1::get_public_data(&heap, this).unwrap(),
            Base1PublicData { val1: 1, val2: 2 }
        );
        assert_eq!(heap.get(this).unwrap().val3, 42);
        assert_eq!(Base1::type_string(&heap, this), "base1");
        assert_eq!(Base1::string_size(&heap, this), Ok(128));
        assert_eq!(Base1::val1_description(), "Value 1");
        assert!(Base1::installed_vtable(&heap, this).unwrap().is_resolved());
    }

    #[test]
    fn constructors_apply_values() {
        let mut heap = Heap::new();
        let data = Base1PublicData { val1: 9, val2: 99 };
        let with_data = Base1::with_public_data(&mut heap, &data).unwrap();
        assert_eq!(Base1::get_public_data(&heap, with_data).unwrap(), data);
        assert_eq!(heap.get(with_data).unwrap().val3, 42);

        let with_values = Base1::with_values(&mut heap, 3, 4).unwrap();
        let base1 = heap.get(with_values).unwrap();
        assert_eq!(base1.public_data, Base1PublicData { val1: 3, val2: 2 });
        assert_eq!(base1.val3, 4);
    }

    #[test]
    fn public_data_is_copied() {
        let mut heap = Heap::new();
        let this = Base1::new(&mut heap).unwrap();
        let mut data = Base1::get_public_data(&heap, this).unwrap();
        data.val1 = 53;
        assert_eq!(Base1::get_public_data(&heap, this).unwrap().val1, 1);

        Base1::set_public_data(&mut heap, this, &data).unwrap();
        data.val2 = 1000;
        assert_eq!(
            Base1::get_public_data(&heap, this).unwrap(),
            Base1PublicData { val1: 53, val2: 2 }
        );
    }

    #[test]
    fn string_and_buffer_contract() {
        let mut heap = Heap::new();
        let this = Base1::new(&mut heap).unwrap();

        let mut short = [0u8; 127];
        assert_eq!(Base1::string(&heap, this, &mut short), Err(Error::InvalidArgument));

        let mut buffer = [0xffu8; 128];
        Base1::string(&heap, this, &mut buffer).unwrap();
        assert_eq!(text::as_str(&buffer), "val1(1) val2(2) val3(42)");

        Base1::increase_val3(&mut heap, this).unwrap();
        Base1::increase_val3(&mut heap, this).unwrap();
        Base1::string(&heap, this, &mut buffer).unwrap();
        assert_eq!(text::as_str(&buffer), "val1(1) val2(2) val3(168)");
    }

    #[test]
    fn delete_releases_everything() {
        let mut heap = Heap::new();
        let this = Base1::new(&mut heap).unwrap();
        assert_eq!((heap.live_objects(), heap.live_blocks()), (1, 1));

        Base1::delete(&mut heap, this);
        assert_eq!((heap.live_objects(), heap.live_blocks()), (0, 0));

        // Dead handle
        Base1::delete(&mut heap, this);
        assert_eq!(Base1::type_string(&heap, this), "");
        assert_eq!(Base1::string_size(&heap, this), Err(Error::InvalidArgument));
        assert_eq!(Base1::increase_val3(&mut heap, this), Err(Error::InvalidArgument));
        assert_eq!(Base1::get_public_data(&heap, this), Err(Error::InvalidArgument));
    }

    #[test]
    fn set_vtable_keeps_defaults_for_empty_slots() {
        fn type_string(_heap: &Heap, _this: Handle<Base1>) -> &'static str {
            "custom"
        }

        let mut heap = Heap::new();
        let this = Base1::new(&mut heap).unwrap();
        let overrides = Base1VTable {
            type_string: Some(type_string),
            ..Base1VTable::EMPTY
        };
        Base1::set_vtable(&mut heap, this, overrides).unwrap();
        assert_eq!(Base1::type_string(&heap, this), "custom");
        assert_eq!(Base1::string_size(&heap, this), Ok(128));

        Base1::delete(&mut heap, this);
        assert_eq!(heap.live_objects(), 0);
    }

    #[test]
    fn install_refuses_unresolved_tables() {
        let mut heap = Heap::new();
        let this = Base1::new(&mut heap).unwrap();
        assert_eq!(
            Base1::install_vtable(&mut heap, this, Base1VTable::EMPTY),
            Err(Error::InvalidArgument)
        );
        assert_eq!(Base1::type_string(&heap, this), "base1");
        assert!(Base1::installed_vtable(&heap, this).unwrap().is_resolved());

        Base1::delete(&mut heap, this);
        assert_eq!((heap.live_objects(), heap.live_blocks()), (0, 0));
    }

    #[test]
    fn init_failure_leaves_nothing_behind() {
        let mut heap = Heap::new();
        heap.fail_after(1);
        assert_eq!(Base1::new(&mut heap), Err(Error::OutOfMemory));
        assert_eq!((heap.live_objects(), heap.live_blocks()), (0, 0));
    }
}
