//! Parsing for the `#[injectable]` attribute and the function it decorates.

use syn::{
    parse::{Parse, ParseStream},
    punctuated::Punctuated,
    spanned::Spanned,
    Expr, ExprLit, FnArg, GenericArgument, Ident, ItemFn, Lit, Meta, Pat, PatIdent, PatType,
    Path, PathArguments, ReturnType, Token, Type,
};

/// Parsed `#[injectable(...)]` arguments.
#[derive(Debug)]
pub struct InjectableAttrs {
    /// Name of the generated callable; defaults to the function name.
    pub name: Option<String>,
    /// Path to the core crate; defaults to `::kiln_core`.
    pub krate: Option<Path>,
}

impl Parse for InjectableAttrs {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        let mut name = None;
        let mut krate = None;

        let meta_list: Punctuated<Meta, Token![,]> = Punctuated::parse_terminated(input)?;

        for meta in meta_list {
            let nv = match meta {
                Meta::NameValue(nv) => nv,
                other => {
                    return Err(syn::Error::new(other.span(), "expected name = \"value\""));
                }
            };

            let value = match &nv.value {
                Expr::Lit(ExprLit {
                    lit: Lit::Str(s), ..
                }) => s.clone(),
                _ => {
                    return Err(syn::Error::new(
                        nv.value.span(),
                        "expected string literal",
                    ))
                }
            };

            if nv.path.is_ident("name") {
                name = Some(value.value());
            } else if nv.path.is_ident("crate") {
                krate = Some(value.parse::<Path>()?);
            } else {
                return Err(syn::Error::new(nv.path.span(), "unknown attribute"));
            }
        }

        Ok(Self { name, krate })
    }
}

/// How an argument is pulled out of the resolved arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgKind {
    /// `T`: cloned out of the shared value.
    Owned,
    /// `Arc<T>`: the shared value itself.
    Shared,
    /// `Option<T>`: an optional parameter, cloned.
    Optional,
    /// `Option<Arc<T>>`: an optional parameter, shared.
    OptionalShared,
}

/// One function argument.
#[derive(Debug)]
pub struct InjectableParam {
    /// The binding.
    pub ident: Ident,
    /// The declared type, as written.
    pub ty: Type,
    /// The type the resolver provides.
    pub inner: Type,
    /// Extraction mode.
    pub kind: ArgKind,
}

impl InjectableParam {
    fn from_fn_arg(arg: &FnArg) -> syn::Result<Self> {
        let FnArg::Typed(PatType { pat, ty, .. }) = arg else {
            return Err(syn::Error::new(
                arg.span(),
                "injectable functions cannot take self",
            ));
        };

        let Pat::Ident(PatIdent { ident, .. }) = &**pat else {
            return Err(syn::Error::new(
                pat.span(),
                "injectable parameters must be plain identifiers",
            ));
        };

        let (kind, inner) = match generic_argument(ty, "Option") {
            Some(option_inner) => match generic_argument(option_inner, "Arc") {
                Some(arc_inner) => (ArgKind::OptionalShared, arc_inner.clone()),
                None => (ArgKind::Optional, option_inner.clone()),
            },
            None => match generic_argument(ty, "Arc") {
                Some(arc_inner) => (ArgKind::Shared, arc_inner.clone()),
                None => (ArgKind::Owned, (**ty).clone()),
            },
        };

        Ok(Self {
            ident: ident.clone(),
            ty: (**ty).clone(),
            inner,
            kind,
        })
    }

    /// The parameter name the resolver sees.
    pub fn name(&self) -> String {
        let name = self.ident.to_string();
        name.strip_prefix("r#").map_or(name.clone(), str::to_string)
    }
}

/// The decorated function.
#[derive(Debug)]
pub struct InjectableFn {
    /// The function item as written.
    pub item: ItemFn,
    /// Its arguments.
    pub params: Vec<InjectableParam>,
    /// `R` in `Result<R, E>`.
    pub output: Type,
}

impl InjectableFn {
    /// Validates and parses a function item.
    pub fn parse(item: ItemFn) -> syn::Result<Self> {
        let sig = &item.sig;
        if let Some(asyncness) = sig.asyncness {
            return Err(syn::Error::new(
                asyncness.span,
                "injectable functions must be synchronous",
            ));
        }
        if !sig.generics.params.is_empty() {
            return Err(syn::Error::new(
                sig.generics.span(),
                "injectable functions cannot be generic",
            ));
        }

        let params = sig
            .inputs
            .iter()
            .map(InjectableParam::from_fn_arg)
            .collect::<syn::Result<Vec<_>>>()?;

        let output = match &sig.output {
            ReturnType::Type(_, ty) => result_ok_type(ty),
            ReturnType::Default => None,
        }
        .ok_or_else(|| {
            syn::Error::new(
                sig.output.span(),
                "injectable functions must return Result<T, E> or KilnResult<T>",
            )
        })?;

        Ok(Self {
            item,
            params,
            output,
        })
    }
}

// `T` in `Wrapper<T>` when the last path segment is `wrapper`
fn generic_argument<'a>(ty: &'a Type, wrapper: &str) -> Option<&'a Type> {
    let Type::Path(type_path) = ty else {
        return None;
    };
    let segment = type_path.path.segments.last()?;
    if segment.ident != wrapper {
        return None;
    }
    let PathArguments::AngleBracketed(args) = &segment.arguments else {
        return None;
    };
    match args.args.first()? {
        GenericArgument::Type(inner) => Some(inner),
        _ => None,
    }
}

fn result_ok_type(ty: &Type) -> Option<Type> {
    generic_argument(ty, "Result")
        .or_else(|| generic_argument(ty, "KilnResult"))
        .cloned()
}
