//! `Base2`: an abstract base class.
//!
//! `increase_val1` has no implementation here, so a `Base2` is only ever created embedded in a
//! class that supplies one. There is no public constructor.

use crate::define_class;
use crate::error::{Error, Result};
use crate::heap::{BlockId, Handle, Heap};
use crate::proc::virtuals;
use crate::text;
use crate::vtable::{Inherit, VTable};

const BASE2_STR_SIZE: usize = 64;

define_class! {
    /// Field layout of a `Base2`, visible to composing classes.
    pub class Base2 {
        private: Option<BlockId>,
        pub val1: u32,
    }
}

#[virtuals(Base2, internal)]
pub trait Base2Virtuals {
    /// Delete the object. A no-op if it does not resolve.
    fn delete(heap: &mut Heap, this: Handle<Base2>);

    /// Name of the object's most-derived class, `""` if it does not resolve.
    fn type_string(heap: &Heap, this: Handle<Base2>) -> &'static str;

    /// Write the object's state into `buffer`, NUL-terminated.
    ///
    /// `buffer` must be at least `string_size` bytes long.
    fn string(heap: &Heap, this: Handle<Base2>, buffer: &mut [u8]) -> Result<()>;

    /// Minimum buffer length for `string`.
    fn string_size(heap: &Heap, this: Handle<Base2>) -> Result<usize>;

    /// Increase `val1`. Abstract: composing classes must supply it.
    fn increase_val1(heap: &mut Heap, this: Handle<Base2>) -> Result<()>;
}

static BASE2_VTABLE: Base2VTable = Base2VTable {
    delete: Some(private_delete),
    type_string: Some(type_string_internal),
    string: Some(string_internal),
    string_size: Some(string_size_internal),
    increase_val1: None,
};

fn type_string_internal(_heap: &Heap, _this: Handle<Base2>) -> &'static str {
    "base2"
}

fn string_size_internal(heap: &Heap, this: Handle<Base2>) -> Result<usize> {
    heap.get(this)?;
    Ok(BASE2_STR_SIZE)
}

fn string_internal(heap: &Heap, this: Handle<Base2>, buffer: &mut [u8]) -> Result<()> {
    let min_size = Base2::string_size(heap, this)?;
    if buffer.len() < min_size {
        log::error!("invalid input, buffer_size({}) < {min_size}", buffer.len());
        return Err(Error::InvalidArgument);
    }

    let base2 = heap.get(this)?;
    text::write_into(buffer, format_args!("val1({})", base2.val1));
    Ok(())
}

fn private_delete(heap: &mut Heap, this: Handle<Base2>) {
    Base2::friend_delete(heap, this);
    heap.free(this);
}

impl Base2 {
    pub fn get_val1(heap: &Heap, this: Handle<Base2>) -> Result<u32> {
        Ok(heap.get(this)?.val1)
    }

    /// Initialize an allocated `Base2`.
    ///
    /// The installed table still lacks `increase_val1` until [`Base2::set_vtable`] supplies it.
    /// On error nothing needs to be cleaned up.
    pub fn init(heap: &mut Heap, this: Handle<Base2>) -> Result<()> {
        heap.get_mut(this)?.val1 = 7;
        Base2::attach_vtable(heap, this, BASE2_VTABLE)
    }

    /// Install the overrides of a composing class.
    ///
    /// Empty slots in `overrides` inherit the `Base2` implementation; `increase_val1` has none
    /// to inherit and must be supplied.
    pub fn set_vtable(
        heap: &mut Heap,
        this: Handle<Base2>,
        mut overrides: Base2VTable,
    ) -> Result<()> {
        overrides.inherit_from(&BASE2_VTABLE, Inherit::Strict)?;
        Base2::install_vtable(heap, this, overrides)?;
        log::debug!("installed {overrides:?} for {this:?}");
        Ok(())
    }

    /// Release what a `Base2` owns without freeing the object itself.
    pub fn friend_delete(heap: &mut Heap, this: Handle<Base2>) {
        Base2::detach_vtable(heap, this);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn increase_val1(heap: &mut Heap, this: Handle<Base2>) -> Result<()> {
        heap.get_mut(this)?.val1 += 1;
        Ok(())
    }

    fn standalone(heap: &mut Heap) -> Handle<Base2> {
        let this = heap.allocate::<Base2>().unwrap();
        Base2::init(heap, this).unwrap();
        this
    }

    #[test]
    fn abstract_slot_is_unresolved_after_init() {
        let mut heap = Heap::new();
        let this = standalone(&mut heap);
        assert_eq!(Base2::get_val1(&heap, this), Ok(7));
        assert_eq!(Base2::type_string(&heap, this), "base2");
        assert_eq!(
            Base2::installed_vtable(&heap, this).unwrap().first_unresolved(),
            Some("increase_val1")
        );
        assert_eq!(Base2::increase_val1(&mut heap, this), Err(Error::InvalidArgument));
        assert_eq!(Base2::get_val1(&heap, this), Ok(7));

        Base2::delete(&mut heap, this);
        assert_eq!((heap.live_objects(), heap.live_blocks()), (0, 0));
    }

    #[test]
    fn strict_set_vtable_requires_the_abstract_slot() {
        let mut heap = Heap::new();
        let this = standalone(&mut heap);
        assert_eq!(
            Base2::set_vtable(&mut heap, this, Base2VTable::EMPTY),
            Err(Error::InvalidArgument)
        );

        let overrides = Base2VTable {
            increase_val1: Some(increase_val1),
            ..Base2VTable::EMPTY
        };
        Base2::set_vtable(&mut heap, this, overrides).unwrap();
        Base2::increase_val1(&mut heap, this).unwrap();
        assert_eq!(Base2::get_val1(&heap, this), Ok(8));

        let mut buffer = [0u8; 64];
        Base2::string(&heap, this, &mut buffer).unwrap();
        assert_eq!(text::as_str(&buffer), "val1(8)");
        assert_eq!(
            Base2::string(&heap, this, &mut buffer[..63]),
            Err(Error::InvalidArgument)
        );

        Base2::delete(&mut heap, this);
        assert_eq!(heap.live_objects(), 0);
    }
}
