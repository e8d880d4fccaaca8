use proc_macro2::{Span, TokenStream as TokenStream2};
use quote::quote;
use syn::parse::{Error, Result};
use syn::{Meta, NestedMeta};
use uuid::Uuid;

/// InterfaceArgs is the parsed content of `#[interface(..)]`.
#[derive(Debug, PartialEq)]
pub(crate) struct InterfaceArgs {
    /// The IID, as its big-endian 128-bit value.
    pub(crate) iid: u128,
    pub(crate) bases: Vec<syn::Path>,
    pub(crate) agile: bool,
}

impl InterfaceArgs {
    /// Parse the attribute arguments: an IID string, followed by optional `bases(..)` and
    /// `agile`, in any order.
    pub(crate) fn from_nested(args: Vec<NestedMeta>) -> Result<Self> {
        let mut iid = None;
        let mut bases = vec![];
        let mut agile = false;

        for arg in args {
            match arg {
                NestedMeta::Lit(syn::Lit::Str(s)) if iid.is_none() => {
                    let uuid = Uuid::parse_str(&s.value()).map_err(|e| {
                        Error::new_spanned(&s, format!("invalid interface identifier: {}", e))
                    })?;
                    iid = Some(uuid.as_u128());
                }
                NestedMeta::Meta(Meta::List(list)) if list.path.is_ident("bases") => {
                    for nested in list.nested {
                        match nested {
                            NestedMeta::Meta(Meta::Path(path)) => {
                                if is_iunknown(&path) {
                                    return Err(Error::new_spanned(
                                        path,
                                        "IUnknown is always a base and must not be listed",
                                    ));
                                }
                                bases.push(path);
                            }
                            other => {
                                return Err(Error::new_spanned(
                                    other,
                                    "bases(..) must contain only interface type names",
                                ))
                            }
                        }
                    }
                }
                NestedMeta::Meta(Meta::Path(path)) if path.is_ident("agile") => {
                    agile = true;
                }
                other => {
                    return Err(Error::new_spanned(
                        other,
                        "valid #[interface(..)] arguments are \"<iid>\", bases(..), and agile",
                    ))
                }
            }
        }

        let iid = iid.ok_or_else(|| {
            Error::new(
                Span::call_site(),
                "#[interface(..)] requires an interface identifier string",
            )
        })?;
        Ok(InterfaceArgs { iid, bases, agile })
    }
}

fn is_iunknown(path: &syn::Path) -> bool {
    path.segments
        .last()
        .map(|seg| seg.ident == "IUnknown")
        .unwrap_or(false)
}

/// InterfaceItem is an interface struct, checked for a suitable layout, with its arguments.
#[derive(Debug)]
pub(crate) struct InterfaceItem {
    args: InterfaceArgs,
    itemstruct: syn::ItemStruct,
}

impl InterfaceItem {
    pub(crate) fn new(args: InterfaceArgs, itemstruct: syn::ItemStruct) -> Result<Self> {
        if !itemstruct.generics.params.is_empty() {
            return Err(Error::new_spanned(
                &itemstruct.generics,
                "interface structs cannot be generic",
            ));
        }
        if !has_c_layout(&itemstruct.attrs) {
            return Err(Error::new_spanned(
                &itemstruct.ident,
                "interface structs must be #[repr(C)] or #[repr(transparent)]",
            ));
        }
        Ok(InterfaceItem { args, itemstruct })
    }

    /// Convert this item into a TokenStream containing the struct and its trait impls.
    pub(crate) fn into_tokens(self) -> TokenStream2 {
        let InterfaceItem { args, itemstruct } = self;
        let ident = &itemstruct.ident;
        let iid = args.iid;

        let bases = args.bases.iter().map(|base| {
            quote! {
                unsafe impl ::comrc_ptr::Inherits<#base> for #ident {}
            }
        });

        let agile = if args.agile {
            quote! {
                unsafe impl ::core::marker::Send for #ident {}
                unsafe impl ::core::marker::Sync for #ident {}
            }
        } else {
            quote! {}
        };

        quote! {
            #itemstruct

            unsafe impl ::comrc_ptr::Interface for #ident {
                const IID: ::comrc_ptr::Iid = ::comrc_ptr::Iid::from_u128(#iid);
            }

            #(#bases)*

            #agile
        }
    }
}

/// Check for `#[repr(C)]` or `#[repr(transparent)]`, possibly alongside other repr hints.
fn has_c_layout(attrs: &[syn::Attribute]) -> bool {
    attrs
        .iter()
        .filter(|attr| attr.path.is_ident("repr"))
        .filter_map(|attr| match attr.parse_meta() {
            Ok(Meta::List(list)) => Some(list.nested),
            _ => None,
        })
        .flatten()
        .any(|nested| match nested {
            NestedMeta::Meta(Meta::Path(path)) => path.is_ident("C") || path.is_ident("transparent"),
            _ => false,
        })
}
