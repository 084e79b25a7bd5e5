//! Declarative class layout.
//!
//! `define_class!` lays out a class as a `#[repr(C)]` struct with its composed bases embedded
//! by value, in declaration order and ahead of the class's own fields, and generates:
//! - `impl Object`, which lets a [`Handle`](crate::Handle) to any embedded base resolve
//! - `cast_to_<field>` up-casts and `from_<field>` down-casts between the class and each base
//!
//! Offsets come from `offset_of!`, so a cast is pure handle arithmetic and a round trip
//! returns the handle it started from.
//!
//! # Example
//! ```ignore
//! define_class! {
//!     pub class Derived1 : base1 as Base1, base2 as Base2 {
//!         private: Option<BlockId>,
//!         pub val4: u32,
//!     }
//! }
//!
//! let base2 = Derived1::cast_to_base2(derived1);
//! assert_eq!(Derived1::from_base2(base2), derived1);
//! ```

/// Define a class with composed bases.
///
/// # Syntax
/// ```ignore
/// define_class! {
///     /// Docs for the class
///     pub class Name : field as Base, other as OtherBase {
///         private: Option<BlockId>,
///         pub value: u32,
///     }
/// }
/// ```
///
/// The base list and the field list are both optional; a class without fields is zero-sized
/// and its handles still resolve. Every field type must implement `Default`; a fresh
/// allocation is the all-default value of the struct.
#[macro_export]
macro_rules! define_class {
    (
        $(#[$meta:meta])*
        $vis:vis class $name:ident $(: $($base_field:ident as $base:ident),+ $(,)?)? {
            $(
                $(#[$field_meta:meta])*
                $field_vis:vis $field_name:ident : $field_ty:ty
            ),* $(,)?
        }
    ) => {
        $crate::paste! {
            $(#[$meta])*
            #[repr(C)]
            #[derive(Default)]
            $vis struct $name {
                $($(
                    #[doc = concat!("Embedded `", stringify!($base), "` sub-object")]
                    pub $base_field: $base,
                )+)?
                $(
                    $(#[$field_meta])*
                    $field_vis $field_name: $field_ty,
                )*
            }

            impl $crate::Object for $name {
                fn as_any(&self) -> &dyn ::core::any::Any {
                    self
                }

                fn locate(
                    &self,
                    offset: usize,
                    ty: ::core::any::TypeId,
                ) -> ::core::option::Option<&dyn ::core::any::Any> {
                    if offset == 0 && ty == ::core::any::TypeId::of::<$name>() {
                        return ::core::option::Option::Some(self);
                    }
                    $($(
                        if let ::core::option::Option::Some(inner) =
                            offset.checked_sub(::std::mem::offset_of!($name, $base_field))
                            && (inner == 0 || inner < ::core::mem::size_of::<$base>())
                            && let ::core::option::Option::Some(found) =
                                $crate::Object::locate(&self.$base_field, inner, ty)
                        {
                            return ::core::option::Option::Some(found);
                        }
                    )+)?
                    ::core::option::Option::None
                }

                fn locate_mut(
                    &mut self,
                    offset: usize,
                    ty: ::core::any::TypeId,
                ) -> ::core::option::Option<&mut dyn ::core::any::Any> {
                    if offset == 0 && ty == ::core::any::TypeId::of::<$name>() {
                        return ::core::option::Option::Some(self);
                    }
                    $($(
                        if let ::core::option::Option::Some(inner) =
                            offset.checked_sub(::std::mem::offset_of!($name, $base_field))
                            && (inner == 0 || inner < ::core::mem::size_of::<$base>())
                            && let ::core::option::Option::Some(found) =
                                $crate::Object::locate_mut(&mut self.$base_field, inner, ty)
                        {
                            return ::core::option::Option::Some(found);
                        }
                    )+)?
                    ::core::option::Option::None
                }
            }

            impl $name {
                $($(
                    #[doc = concat!("Up-cast to the embedded `", stringify!($base), "`")]
                    #[inline]
                    pub const fn [<cast_to_ $base_field>](
                        this: $crate::Handle<$name>,
                    ) -> $crate::Handle<$base> {
                        this.embedded(::std::mem::offset_of!($name, $base_field))
                    }

                    #[doc = concat!("Down-cast from an embedded `", stringify!($base), "`")]
                    #[inline]
                    pub const fn [<from_ $base_field>](
                        base: $crate::Handle<$base>,
                    ) -> $crate::Handle<$name> {
                        base.enclosing(::std::mem::offset_of!($name, $base_field))
                    }
                )+)?
            }
        }
    };
}
