use proc_macro::TokenStream;
use proc_macro2::{Span, TokenStream as TokenStream2};
use syn::parse::Error;

mod interface;

use interface::{InterfaceArgs, InterfaceItem};

/// Declare a `#[repr(C)]` struct as a COM-style interface.
///
/// See the `comrc-ptr` crate for documentation; this macro is re-exported there.
#[proc_macro_attribute]
pub fn interface(attr: TokenStream, item: TokenStream) -> TokenStream {
    let args = syn::parse_macro_input!(attr as syn::AttributeArgs);
    interface2(args, TokenStream2::from(item)).into()
}

fn interface2(args: syn::AttributeArgs, existing: TokenStream2) -> TokenStream2 {
    let itemstruct = match syn::parse2::<syn::ItemStruct>(existing.clone()) {
        Ok(itemstruct) => itemstruct,
        Err(_) => {
            return with_error(
                existing,
                Error::new(Span::call_site(), "#[interface] can only be applied to a struct"),
            )
        }
    };

    let parsed = InterfaceArgs::from_nested(args)
        .and_then(|args| InterfaceItem::new(args, itemstruct));
    match parsed {
        Ok(item) => item.into_tokens(),
        Err(err) => with_error(existing, err),
    }
}

/// Return a token stream containing the existing content as well as a compile_error!() invocation
/// for the given error.  Keeping the existing content avoids a cascade of "not found" errors for
/// the struct itself.
fn with_error(mut existing: TokenStream2, error: Error) -> TokenStream2 {
    existing.extend(error.to_compile_error());
    existing
}
