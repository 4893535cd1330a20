//! `#[procedure]` expansion
//!
//! Input:
//! ```ignore
//! #[procedure]
//! async fn add(a: i64, b: i64) -> Result<i64> {
//!     Ok(a + b)
//! }
//! ```
//!
//! Generated output:
//! ```ignore
//! fn add() -> Box<dyn svcrpc_server::Procedure> {
//!     async fn inner_procedure((a, b,): (i64, i64,)) -> Result<i64> {
//!         Ok(a + b)
//!     }
//!     svcrpc_server::from_typed_fn(inner_procedure)
//! }
//! ```
//!
//! The positional params are deserialized as one tuple, so argument order on
//! the wire is argument order in the signature.

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::spanned::Spanned;
use syn::{parse_macro_input, FnArg, ItemFn, ReturnType};

pub fn procedure_impl(input: TokenStream) -> TokenStream {
    let input_fn = parse_macro_input!(input as ItemFn);
    match expand(input_fn) {
        Ok(tokens) => tokens.into(),
        Err(error) => error.to_compile_error().into(),
    }
}

fn expand(input_fn: ItemFn) -> syn::Result<TokenStream2> {
    let sig = &input_fn.sig;
    if sig.asyncness.is_none() {
        return Err(syn::Error::new(
            sig.fn_token.span(),
            "#[procedure] requires an async fn",
        ));
    }
    if !sig.generics.params.is_empty() {
        return Err(syn::Error::new(
            sig.generics.span(),
            "#[procedure] does not support generic functions",
        ));
    }
    let return_type = match &sig.output {
        ReturnType::Type(_, ty) => ty,
        ReturnType::Default => {
            return Err(syn::Error::new(
                sig.span(),
                "#[procedure] functions must return svcrpc_core::Result<T>",
            ))
        }
    };

    let mut pats = Vec::new();
    let mut tys = Vec::new();
    for arg in &sig.inputs {
        match arg {
            FnArg::Typed(pat_type) => {
                pats.push(&pat_type.pat);
                tys.push(&pat_type.ty);
            }
            FnArg::Receiver(receiver) => {
                return Err(syn::Error::new(
                    receiver.span(),
                    "#[procedure] cannot be used on methods",
                ))
            }
        }
    }

    let params = if pats.is_empty() {
        quote! { _: () }
    } else {
        quote! { (#(#pats,)*): (#(#tys,)*) }
    };

    let fn_name = &sig.ident;
    let fn_vis = &input_fn.vis;
    let fn_block = &input_fn.block;
    let fn_attrs = &input_fn.attrs;

    Ok(quote! {
        #(#fn_attrs)*
        #fn_vis fn #fn_name() -> ::std::boxed::Box<dyn svcrpc_server::Procedure> {
            async fn inner_procedure(#params) -> #return_type #fn_block

            svcrpc_server::from_typed_fn(inner_procedure)
        }
    })
}
