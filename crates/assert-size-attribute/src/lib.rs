//! assert-size-attribute
//!
//! A thin attribute wrapper over `static_assertions::assert_eq_size!`,
//! so a wire struct can pin its packed size right where it is declared:
//!
//! ```ignore
//! #[assert_eq_size([u8; 4])]
//! pub struct OpcodeHeader { ... }
//! ```
//!
//! Wire structs in this workspace must match a legacy client byte for
//! byte; a field edit that changes the size becomes a compile error
//! instead of a malformed packet.

use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, ItemStruct, Type};

/// Emits the annotated struct unchanged, followed by a compile-time
/// size assertion against the given type.
#[proc_macro_attribute]
pub fn assert_eq_size(expected: TokenStream, item: TokenStream) -> TokenStream {
    let item = parse_macro_input!(item as ItemStruct);
    let expected = parse_macro_input!(expected as Type);
    let subject = item.ident.clone();

    TokenStream::from(quote! {
        #item

        static_assertions::assert_eq_size!(#subject, #expected);
    })
}
