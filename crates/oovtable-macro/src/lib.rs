//! Procedural macros for oovtable
//!
//! Provides:
//! - `#[virtuals(Class)]` - Declare the virtual operations of a class (generates its vtable
//!   struct, the `Virtual` binding and one dispatch function per operation)
//!
//! ## Operation shape
//!
//! Operations are plain functions: the first parameter is the heap (`&Heap` or `&mut Heap`),
//! the second is the handle of the object being dispatched on (`this: Handle<Class>`), and any
//! further parameters are passed through unchanged.
//!
//! ## Composed bases
//!
//! `extends(field: Base, ...)` embeds the vtable of each composed base as a nested field named
//! after the base's field in the class. Nested tables are reconciled leniently (an empty slot
//! there is filled later by the base's own strict reconciliation), own slots follow the mode the
//! caller asks for.

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use syn::{
    Attribute, FnArg, Ident, ItemTrait, Pat, ReturnType, Token, TraitItem, Type,
    parse::{Parse, ParseStream, Parser},
    parse_macro_input,
    punctuated::Punctuated,
    spanned::Spanned,
};

/// Returns the path to the oovtable crate.
///
/// When `internal` is true (used inside the oovtable crate itself), this returns `crate`.
/// When `internal` is false (external crates), this returns `::oovtable`.
fn crate_path(internal: bool) -> TokenStream2 {
    if internal {
        quote! { crate }
    } else {
        quote! { ::oovtable }
    }
}

// =============================================================================
// Configuration
// =============================================================================

/// A composed base: `field: Class`
#[derive(Clone, Debug)]
struct BaseSpec {
    /// Name of the embedded field in the class (and of the nested vtable field)
    field: Ident,
    /// Class of the embedded base
    class: Ident,
}

impl Parse for BaseSpec {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        let field = input.parse()?;
        input.parse::<Token![:]>()?;
        let class = input.parse()?;
        Ok(BaseSpec { field, class })
    }
}

/// Configuration for vtable generation
#[derive(Clone, Debug, Default)]
struct VTableConfig {
    /// Class whose operations are declared
    class: Option<Ident>,
    /// Composed bases, in declaration order
    bases: Vec<BaseSpec>,
    /// Internal mode: use `crate::` instead of `::oovtable::` for paths
    internal: bool,
}

/// Parse `virtuals` attribute options into a VTableConfig
///
/// Accepted form: `Class [, internal] [, extends(field: Base, ...)]`.
fn parse_virtuals_config(attr: TokenStream2) -> Result<VTableConfig, syn::Error> {
    let mut config = VTableConfig::default();
    let tokens: Vec<_> = attr.into_iter().collect();

    let mut i = 0;
    while i < tokens.len() {
        match &tokens[i] {
            proc_macro2::TokenTree::Ident(ident) => {
                let name = ident.to_string();
                match name.as_str() {
                    "internal" => {
                        config.internal = true;
                        i += 1;
                    }
                    "extends" => {
                        // Expect: extends(field: Base, ...)
                        i += 1;
                        let Some(proc_macro2::TokenTree::Group(group)) = tokens.get(i) else {
                            return Err(syn::Error::new(
                                ident.span(),
                                "expected '(field: Base, ...)' after 'extends'",
                            ));
                        };
                        let bases = Punctuated::<BaseSpec, Token![,]>::parse_terminated
                            .parse2(group.stream())?;
                        if bases.is_empty() {
                            return Err(syn::Error::new(
                                group.span(),
                                "'extends(...)' needs at least one base",
                            ));
                        }
                        config.bases.extend(bases);
                        i += 1;
                    }
                    _ if config.class.is_none() => {
                        config.class = Some(ident.clone());
                        i += 1;
                    }
                    _ => {
                        return Err(syn::Error::new(
                            ident.span(),
                            format!(
                                "unknown option '{}', expected 'internal' or 'extends(...)'",
                                name
                            ),
                        ));
                    }
                }
            }
            proc_macro2::TokenTree::Punct(punct) if punct.as_char() == ',' => {
                i += 1; // Skip commas
            }
            other => {
                return Err(syn::Error::new(
                    other.span(),
                    "unexpected token in virtuals options",
                ));
            }
        }
    }

    for (n, base) in config.bases.iter().enumerate() {
        if config.bases[..n].iter().any(|b| b.field == base.field) {
            return Err(syn::Error::new(
                base.field.span(),
                format!("base field '{}' is listed twice", base.field),
            ));
        }
    }

    Ok(config)
}

// =============================================================================
// Validation
// =============================================================================

/// Validate an operation signature
fn validate_operation(method: &syn::TraitItemFn) -> Result<(), syn::Error> {
    let name = &method.sig.ident;
    let span = name.span();

    if method.default.is_some() {
        return Err(syn::Error::new(
            span,
            format!(
                "operation '{}': default bodies are not supported, implementations live in the vtable",
                name
            ),
        ));
    }
    if method.sig.asyncness.is_some() || method.sig.constness.is_some() {
        return Err(syn::Error::new(
            span,
            format!("operation '{}': async and const operations are not supported", name),
        ));
    }
    if !method.sig.generics.params.is_empty() {
        return Err(syn::Error::new(
            span,
            format!("operation '{}': generic operations are not supported", name),
        ));
    }

    let mut typed = 0;
    for arg in &method.sig.inputs {
        match arg {
            FnArg::Receiver(receiver) => {
                return Err(syn::Error::new(
                    receiver.span(),
                    format!(
                        "operation '{}': takes the heap and a handle explicitly, not self",
                        name
                    ),
                ));
            }
            FnArg::Typed(pat_type) => {
                if !matches!(&*pat_type.pat, Pat::Ident(_)) {
                    return Err(syn::Error::new(
                        pat_type.pat.span(),
                        format!("operation '{}': parameters must be plain identifiers", name),
                    ));
                }
                typed += 1;
            }
        }
    }
    if typed < 2 {
        return Err(syn::Error::new(
            span,
            format!(
                "operation '{}': expected at least (heap, this) parameters, found {}",
                name, typed
            ),
        ));
    }

    if let Some(FnArg::Typed(heap)) = method.sig.inputs.first()
        && !matches!(&*heap.ty, Type::Reference(_))
    {
        return Err(syn::Error::new(
            heap.ty.span(),
            format!("operation '{}': the first parameter must borrow the heap", name),
        ));
    }

    Ok(())
}

/// Validate a trait definition
fn validate_trait(input: &ItemTrait) -> Result<(), syn::Error> {
    if !input.generics.params.is_empty() {
        return Err(syn::Error::new(
            input.generics.span(),
            "generic virtual declarations are not supported",
        ));
    }

    for item in &input.items {
        match item {
            TraitItem::Fn(method) => validate_operation(method)?,
            other => {
                return Err(syn::Error::new(
                    other.span(),
                    "only operations may be declared in a virtuals block",
                ));
            }
        }
    }

    Ok(())
}

// =============================================================================
// Code generation
// =============================================================================

/// A parsed operation
struct Operation {
    name: Ident,
    docs: Vec<Attribute>,
    params: Vec<(Ident, Type)>,
    output: ReturnType,
}

impl Operation {
    fn from_trait_item(method: &syn::TraitItemFn) -> Self {
        let params = method
            .sig
            .inputs
            .iter()
            .filter_map(|arg| match arg {
                FnArg::Typed(pat_type) => match &*pat_type.pat {
                    Pat::Ident(pat_ident) => {
                        Some((pat_ident.ident.clone(), (*pat_type.ty).clone()))
                    }
                    _ => None,
                },
                FnArg::Receiver(_) => None,
            })
            .collect();

        Operation {
            name: method.sig.ident.clone(),
            docs: doc_attrs(&method.attrs),
            params,
            output: method.sig.output.clone(),
        }
    }
}

fn doc_attrs(attrs: &[Attribute]) -> Vec<Attribute> {
    attrs
        .iter()
        .filter(|attr| attr.path().is_ident("doc"))
        .cloned()
        .collect()
}

/// True when the operation returns a `Result`, so dispatch failures can be reported in-band
fn is_fallible(output: &ReturnType) -> bool {
    match output {
        ReturnType::Default => false,
        ReturnType::Type(_, ty) => match &**ty {
            Type::Path(type_path) => type_path
                .path
                .segments
                .last()
                .is_some_and(|segment| segment.ident == "Result"),
            _ => false,
        },
    }
}

/// Associated functions generated on every class, unavailable as operation names
const RESERVED: &[&str] = &[
    "private_field",
    "private_field_mut",
    "attach_vtable",
    "install_vtable",
    "detach_vtable",
    "installed_vtable",
];

fn virtuals_internal(config: VTableConfig, input: ItemTrait) -> Result<TokenStream2, syn::Error> {
    validate_trait(&input)?;

    let Some(class) = config.class.clone() else {
        return Err(syn::Error::new(
            input.ident.span(),
            "expected the class name as the first option, e.g. #[virtuals(Base1)]",
        ));
    };

    let krate = crate_path(config.internal);
    let vis = &input.vis;
    let vtable_name = format_ident!("{}VTable", class);
    let vtable_str = vtable_name.to_string();

    let operations: Vec<Operation> = input
        .items
        .iter()
        .filter_map(|item| match item {
            TraitItem::Fn(method) => Some(Operation::from_trait_item(method)),
            _ => None,
        })
        .collect();

    for (n, op) in operations.iter().enumerate() {
        if RESERVED.iter().any(|reserved| op.name == reserved) {
            return Err(syn::Error::new(
                op.name.span(),
                format!("operation '{}' clashes with a generated function", op.name),
            ));
        }
        if config.bases.iter().any(|base| base.field == op.name) {
            return Err(syn::Error::new(
                op.name.span(),
                format!("operation '{}' clashes with a base field", op.name),
            ));
        }
        if operations[..n].iter().any(|other| other.name == op.name) {
            return Err(syn::Error::new(
                op.name.span(),
                format!("operation '{}' is declared twice", op.name),
            ));
        }
    }

    let base_fields: Vec<&Ident> = config.bases.iter().map(|base| &base.field).collect();
    let base_classes: Vec<&Ident> = config.bases.iter().map(|base| &base.class).collect();
    let base_strs: Vec<String> = base_fields.iter().map(|f| f.to_string()).collect();

    let slot_names: Vec<&Ident> = operations.iter().map(|op| &op.name).collect();
    let slot_strs: Vec<String> = slot_names.iter().map(|n| n.to_string()).collect();

    let slot_fields = operations.iter().map(|op| {
        let name = &op.name;
        let docs = &op.docs;
        let param_names = op.params.iter().map(|(n, _)| n);
        let param_types = op.params.iter().map(|(_, t)| t);
        let output = &op.output;
        quote! {
            #(#docs)*
            pub #name: ::core::option::Option<fn(#(#param_names: #param_types),*) #output>
        }
    });

    let dispatchers = operations.iter().map(|op| {
        let name = &op.name;
        let name_str = name.to_string();
        let docs = &op.docs;
        let output = &op.output;
        let param_names: Vec<&Ident> = op.params.iter().map(|(n, _)| n).collect();
        let param_types = op.params.iter().map(|(_, t)| t);
        let heap = param_names[0];
        let this = param_names[1];

        let on_error = if is_fallible(output) {
            quote! { ::core::result::Result::Err(::core::convert::From::from(err)) }
        } else {
            quote! {{
                let _ = err;
                ::core::default::Default::default()
            }}
        };

        quote! {
            #(#docs)*
            #vis fn #name(#(#param_names: #param_types),*) #output {
                let slot = match #krate::vtable::lookup(
                    &*#heap,
                    #this,
                    #class::private_field,
                    #name_str,
                    |vtable: &#vtable_name| vtable.#name,
                ) {
                    ::core::result::Result::Ok(slot) => slot,
                    ::core::result::Result::Err(err) => return #on_error,
                };
                slot(#(#param_names),*)
            }
        }
    });

    let trait_docs = doc_attrs(&input.attrs);
    let struct_doc = format!("Virtual table of [`{}`]", class);

    Ok(quote! {
        #[doc = #struct_doc]
        #(#trait_docs)*
        #[derive(Clone, Copy, Default)]
        #vis struct #vtable_name {
            #(
                #[doc = concat!("Overrides for the embedded `", #base_strs, "`")]
                pub #base_fields: <#base_classes as #krate::Virtual>::VTable,
            )*
            #(#slot_fields,)*
        }

        impl #krate::VTable for #vtable_name {
            const EMPTY: Self = Self {
                #(
                    #base_fields: <<#base_classes as #krate::Virtual>::VTable as #krate::VTable>::EMPTY,
                )*
                #(#slot_names: ::core::option::Option::None,)*
            };

            const SLOTS: &'static [&'static str] = &[#(#slot_strs),*];

            fn inherit_from(
                &mut self,
                parent: &Self,
                mode: #krate::Inherit,
            ) -> #krate::Result<()> {
                #(
                    #krate::VTable::inherit_from(
                        &mut self.#base_fields,
                        &parent.#base_fields,
                        #krate::Inherit::Lenient,
                    )?;
                )*
                #(
                    if self.#slot_names.is_none() {
                        self.#slot_names = parent.#slot_names;
                        if mode == #krate::Inherit::Strict && self.#slot_names.is_none() {
                            return ::core::result::Result::Err(
                                #krate::vtable::unresolved(#vtable_str, #slot_strs),
                            );
                        }
                    }
                )*
                ::core::result::Result::Ok(())
            }

            fn first_unresolved(&self) -> ::core::option::Option<&'static str> {
                #(
                    if self.#slot_names.is_none() {
                        return ::core::option::Option::Some(#slot_strs);
                    }
                )*
                ::core::option::Option::None
            }
        }

        impl ::core::fmt::Debug for #vtable_name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                f.debug_struct(#vtable_str)
                    #(.field(#base_strs, &self.#base_fields))*
                    #(.field(
                        #slot_strs,
                        &format_args!("{}", if self.#slot_names.is_some() { "set" } else { "empty" }),
                    ))*
                    .finish()
            }
        }

        impl #krate::Virtual for #class {
            type VTable = #vtable_name;
        }

        // Private block access, visible only in the class's own module
        #[allow(dead_code)]
        impl #class {
            #[inline]
            fn private_field(object: &#class) -> ::core::option::Option<#krate::BlockId> {
                object.private
            }

            #[inline]
            fn private_field_mut(
                object: &mut #class,
            ) -> &mut ::core::option::Option<#krate::BlockId> {
                &mut object.private
            }

            /// Allocate the private block of a fresh object, holding `vtable`.
            fn attach_vtable(
                heap: &mut #krate::Heap,
                this: #krate::Handle<#class>,
                vtable: #vtable_name,
            ) -> #krate::Result<()> {
                #krate::vtable::attach(heap, this, #class::private_field_mut, vtable)
            }

            /// Replace the installed table. Every own slot of `vtable` must be filled.
            fn install_vtable(
                heap: &mut #krate::Heap,
                this: #krate::Handle<#class>,
                vtable: #vtable_name,
            ) -> #krate::Result<()> {
                #krate::vtable::install(heap, this, #class::private_field_mut, vtable)
            }

            /// Release the private block, if any.
            fn detach_vtable(heap: &mut #krate::Heap, this: #krate::Handle<#class>) -> bool {
                #krate::vtable::detach(heap, this, #class::private_field_mut)
            }

            fn installed_vtable(
                heap: &#krate::Heap,
                this: #krate::Handle<#class>,
            ) -> #krate::Result<#vtable_name> {
                #krate::vtable::installed(heap, this, #class::private_field)
            }
        }

        impl #class {
            #(#dispatchers)*
        }
    })
}

/// Declare the virtual operations of a class.
///
/// The trait is consumed and replaced by:
/// - `{Class}VTable`: one optional function pointer per operation, preceded by the nested
///   tables of any composed bases
/// - `impl Virtual for Class`: binds the table type
/// - non-`pub` associated functions reaching the class's `private` field: `attach_vtable`,
///   `install_vtable` (refuses a table with an empty own slot), `detach_vtable` and
///   `installed_vtable`. Only the class's own module can call them.
/// - one dispatch function per operation on `Class`, which resolves the installed table and
///   forwards. An unresolvable object or an empty slot yields `Err(InvalidArgument)` for
///   operations returning `Result`, and `Default::default()` otherwise.
///
/// The class must have a field `private: Option<BlockId>`.
///
/// # Example
///
/// ```ignore
/// use oovtable::proc::virtuals;
///
/// #[virtuals(Shape)]
/// pub trait ShapeVirtuals {
///     fn area(heap: &Heap, this: Handle<Shape>) -> Result<u32>;
///     fn delete(heap: &mut Heap, this: Handle<Shape>);
/// }
///
/// // Composing two bases
/// #[virtuals(Square, extends(shape: Shape, named: Named))]
/// pub trait SquareVirtuals {
///     fn delete(heap: &mut Heap, this: Handle<Square>);
/// }
/// ```
#[proc_macro_attribute]
pub fn virtuals(attr: TokenStream, item: TokenStream) -> TokenStream {
    let input = parse_macro_input!(item as ItemTrait);

    let config = match parse_virtuals_config(attr.into()) {
        Ok(config) => config,
        Err(err) => return err.to_compile_error().into(),
    };

    match virtuals_internal(config, input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}
