//! Expansion of `#[injectable]`.

use proc_macro2::TokenStream;
use quote::{format_ident, quote};
use syn::{parse_quote, ItemFn, Path};

use crate::parse::{ArgKind, InjectableAttrs, InjectableFn, InjectableParam};

pub fn expand_injectable(attr: TokenStream, item: TokenStream) -> syn::Result<TokenStream> {
    let attrs: InjectableAttrs = syn::parse2(attr)?;
    let item_fn: ItemFn = syn::parse2(item)?;
    let injectable = InjectableFn::parse(item_fn)?;

    Ok(generate(&attrs, &injectable))
}

fn generate(attrs: &InjectableAttrs, injectable: &InjectableFn) -> TokenStream {
    let krate: Path = attrs
        .krate
        .clone()
        .unwrap_or_else(|| parse_quote!(::kiln_core));

    let item = &injectable.item;
    let fn_name = &item.sig.ident;
    let vis = &item.vis;
    let outer_attrs = &item.attrs;
    let output = &injectable.output;
    let callable_name = attrs
        .name
        .clone()
        .unwrap_or_else(|| fn_name.to_string().trim_start_matches("r#").to_string());

    let body_name = format_ident!("__kiln_{}", fn_name.to_string().trim_start_matches("r#"));
    let mut body = item.clone();
    body.sig.ident = body_name.clone();
    body.attrs.clear();
    body.vis = syn::Visibility::Inherited;

    let parameters = injectable.params.iter().map(|p| declare(&krate, p));
    let bindings = injectable.params.iter().map(bind);
    let idents = injectable.params.iter().map(|p| &p.ident);

    quote! {
        #(#outer_attrs)*
        #vis fn #fn_name() -> #krate::Callable<#output> {
            #[allow(clippy::needless_pass_by_value)]
            #body

            #krate::Callable::builder(#callable_name)
                #(#parameters)*
                .build(|__args: &#krate::Arguments| {
                    #(#bindings)*
                    ::core::result::Result::map_err(
                        #body_name(#(#idents),*),
                        ::core::convert::Into::<#krate::KilnError>::into,
                    )
                })
        }
    }
}

fn declare(krate: &Path, param: &InjectableParam) -> TokenStream {
    let name = param.name();
    let inner = &param.inner;
    match param.kind {
        ArgKind::Owned | ArgKind::Shared => quote! {
            .parameter(#krate::Parameter::new::<#inner>(#name))
        },
        ArgKind::Optional | ArgKind::OptionalShared => quote! {
            .parameter(#krate::Parameter::new::<#inner>(#name).optional())
        },
    }
}

fn bind(param: &InjectableParam) -> TokenStream {
    let name = param.name();
    let ident = &param.ident;
    let ty = &param.ty;
    let inner = &param.inner;
    let extract = match param.kind {
        ArgKind::Owned => quote!(__args.get::<#inner>(#name)),
        ArgKind::Shared => quote!(__args.shared::<#inner>(#name)),
        ArgKind::Optional => quote!(__args.optional::<#inner>(#name)),
        ArgKind::OptionalShared => quote!(__args.optional_shared::<#inner>(#name)),
    };
    quote! {
        let #ident: #ty = #extract?;
    }
}
