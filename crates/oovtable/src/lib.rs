//! Static object model with table-based virtual dispatch
//!
//! Classes are plain `#[repr(C)]` structs. Inheritance is composition: a derived class embeds
//! each of its bases by value, and multiple embedded bases give multiple inheritance. Every
//! object lives in a [`Heap`] and is reached through a typed [`Handle`]; casting between a
//! class and an embedded base is arithmetic on the handle's offset.
//!
//! Virtual operations dispatch through a per-object table kept in a private block that only
//! the class's own module names. A composing class overrides a base's operations by handing
//! the base a sparse table; empty slots inherit the base's implementation, and a slot with no
//! implementation anywhere (an abstract operation) is refused.
//!
//! ## Declaring a class
//! ```ignore
//! use oovtable::proc::virtuals;
//! use oovtable::{BlockId, Handle, Heap, Result, define_class};
//!
//! define_class! {
//!     pub class Counter : base2 as Base2 {
//!         private: Option<BlockId>,
//!         pub count: u32,
//!     }
//! }
//!
//! #[virtuals(Counter, extends(base2: Base2))]
//! pub trait CounterVirtuals {
//!     fn delete(heap: &mut Heap, this: Handle<Counter>);
//!     fn bump(heap: &mut Heap, this: Handle<Counter>) -> Result<()>;
//! }
//! ```
//!
//! ## The hierarchy
//!
//! | Class | Composes | Notes |
//! |-------|----------|-------|
//! | [`Base1`] | | concrete, three constructors |
//! | [`Base2`] | | abstract (`increase_val1`), no constructor |
//! | [`Derived1`] | `Base1`, `Base2` | supplies `increase_val1`, adds `increase_val4` |
//! | [`Derived2`] | `Derived1` | overrides type strings, deletes and `increase_val4` |

pub mod base1;
pub mod base2;
pub mod decl;
pub mod derived1;
pub mod derived2;
pub mod error;
pub mod heap;
pub mod text;
pub mod vtable;

/// Proc-macro approach - re-exports from oovtable-macro crate
pub mod proc {
    pub use oovtable_macro::virtuals;
}

// Re-export paste for use by declarative macros
#[doc(hidden)]
pub use paste::paste;

pub use base1::{Base1, Base1PublicData, Base1VTable};
pub use base2::{Base2, Base2VTable};
pub use derived1::{Derived1, Derived1VTable};
pub use derived2::Derived2;
pub use error::{Error, Result, ResultCode};
pub use heap::{AllocId, BlockId, Handle, Heap, HeapConfig, Object};
pub use vtable::{Inherit, VTable, Virtual};
