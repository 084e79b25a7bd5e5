//! Virtual tables and dispatch.
//!
//! A class with virtual operations keeps its table in a private block: a heap block only the
//! class's own code names, referenced from the object's `private` field. Dispatch goes
//! object -> private block -> table -> slot, and every hop is checked before the call.
//!
//! Tables are reconciled against a parent table before they are installed. An empty slot
//! takes the parent's entry; in [`Inherit::Strict`] mode a slot that is still empty afterwards
//! is an error.
//!
//! The private field is only reachable from the class's module, and the runtime helpers below
//! take an accessor to it. `#[virtuals]` wraps them in non-`pub` associated functions
//! (`attach_vtable`, `install_vtable`, `detach_vtable`, `installed_vtable`), so no other
//! module can reach a class's block:
//!
//! ```compile_fail
//! use oovtable::{Base1, Heap};
//!
//! let mut heap = Heap::new();
//! let base1 = Base1::new(&mut heap).unwrap();
//! let _ = heap.get_mut(base1).unwrap().private.take();
//! ```
//!
//! ```compile_fail
//! use oovtable::{Base1, Base1VTable, Heap, VTable};
//!
//! let mut heap = Heap::new();
//! let base1 = Base1::new(&mut heap).unwrap();
//! Base1::install_vtable(&mut heap, base1, Base1VTable::EMPTY).unwrap();
//! ```

use core::fmt;

use crate::error::{Error, Result};
use crate::heap::{BlockId, Handle, Heap, Object};

/// How to treat slots left empty after inheriting from the parent table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Inherit {
    /// Every slot must end up filled
    Strict,
    /// Empty slots are allowed to stay empty
    Lenient,
}

/// A table of optional operation slots, generated by `#[virtuals]`.
pub trait VTable: Copy + Default + fmt::Debug + 'static {
    /// Table with every slot (and every nested table) empty
    const EMPTY: Self;

    /// Names of the table's own slots, in declaration order
    const SLOTS: &'static [&'static str];

    /// Fill empty slots from `parent`.
    ///
    /// Nested base tables are always reconciled leniently; `mode` applies to own slots.
    fn inherit_from(&mut self, parent: &Self, mode: Inherit) -> Result<()>;

    /// First own slot that is still empty
    fn first_unresolved(&self) -> Option<&'static str>;

    fn is_resolved(&self) -> bool {
        self.first_unresolved().is_none()
    }
}

/// A class whose objects dispatch through a table in their private block.
pub trait Virtual: Object {
    type VTable: VTable;
}

/// Read access to a class's private field
pub type Private<C> = fn(&C) -> Option<BlockId>;

/// Write access to a class's private field
pub type PrivateMut<C> = fn(&mut C) -> &mut Option<BlockId>;

/// Reconcile `child` against `parent`.
///
/// Either table missing is `InvalidArgument`.
pub fn inherit<V: VTable>(parent: Option<&V>, child: Option<&mut V>, mode: Inherit) -> Result<()> {
    let (Some(parent), Some(child)) = (parent, child) else {
        log::error!("invalid input, missing table to inherit between");
        return Err(Error::InvalidArgument);
    };
    child.inherit_from(parent, mode)
}

/// Error for a slot left empty by strict reconciliation
#[doc(hidden)]
pub fn unresolved(table: &'static str, slot: &'static str) -> Error {
    log::error!("invalid input, {table}::{slot} is unresolved");
    Error::InvalidArgument
}

/// Resolve a slot of the table installed for `this`.
///
/// Fails with `InvalidArgument` when the object does not resolve, has no private block, the
/// block does not hold a `C::VTable`, or the selected slot is empty.
#[doc(hidden)]
pub fn lookup<C, F>(
    heap: &Heap,
    this: Handle<C>,
    private: Private<C>,
    slot: &'static str,
    select: impl FnOnce(&C::VTable) -> Option<F>,
) -> Result<F>
where
    C: Virtual,
{
    let Some(block) = private(heap.get(this)?) else {
        log::error!("invalid input, {this:?} has no private block");
        return Err(Error::InvalidArgument);
    };
    let vtable = heap.block::<C::VTable>(block)?;
    select(vtable).ok_or_else(|| {
        log::error!("invalid input, {this:?} has no `{slot}` entry");
        Error::InvalidArgument
    })
}

/// Give a freshly allocated object its private block, holding `vtable`.
///
/// The table may still have empty slots: an abstract class attaches its own defaults and
/// relies on the composing class to fill them through `install`.
#[doc(hidden)]
pub fn attach<C: Virtual>(
    heap: &mut Heap,
    this: Handle<C>,
    private: PrivateMut<C>,
    vtable: C::VTable,
) -> Result<()> {
    if private(heap.get_mut(this)?).is_some() {
        log::error!("invalid input, {this:?} already has a private block");
        return Err(Error::InvalidArgument);
    }

    let block = heap.alloc_block(vtable)?;
    match heap.get_mut(this) {
        Ok(object) => {
            *private(object) = Some(block);
            Ok(())
        }
        Err(err) => {
            heap.free_block(block);
            Err(err)
        }
    }
}

/// Replace the table in the private block of `this`.
///
/// Every own slot of `vtable` must be filled.
#[doc(hidden)]
pub fn install<C: Virtual>(
    heap: &mut Heap,
    this: Handle<C>,
    private: PrivateMut<C>,
    vtable: C::VTable,
) -> Result<()> {
    if let Some(slot) = vtable.first_unresolved() {
        return Err(unresolved(core::any::type_name::<C::VTable>(), slot));
    }
    let Some(block) = *private(heap.get_mut(this)?) else {
        log::error!("invalid input, {this:?} has no private block");
        return Err(Error::InvalidArgument);
    };
    *heap.block_mut::<C::VTable>(block)? = vtable;
    Ok(())
}

/// Release the private block of `this`, if it has one.
#[doc(hidden)]
pub fn detach<C: Virtual>(heap: &mut Heap, this: Handle<C>, private: PrivateMut<C>) -> bool {
    let block = match heap.get_mut(this) {
        Ok(object) => private(object).take(),
        Err(_) => None,
    };
    block.is_some_and(|block| heap.free_block(block))
}

/// The table currently installed for `this`
#[doc(hidden)]
pub fn installed<C: Virtual>(
    heap: &Heap,
    this: Handle<C>,
    private: Private<C>,
) -> Result<C::VTable> {
    lookup(heap, this, private, "table", |vtable: &C::VTable| Some(*vtable))
}
