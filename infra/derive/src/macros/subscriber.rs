use proc_macro2::TokenStream;
use quote::quote;
use syn::parse::Parser;
use syn::punctuated::Punctuated;
use syn::spanned::Spanned;
use syn::{Attribute, Expr, FnArg, ImplItem, ImplItemFn, ItemImpl, Lit, Meta, Token, Type};

const ATTRIBUTE: &str = "subscribe";

/// One `#[subscribe]` method, ready to be turned into a table entry.
struct HandlerSpec {
    method: syn::Ident,
    event: Type,
    thread_mode: syn::Ident,
    sticky: bool,
}

/// Expands `#[subscriber]` on an inherent impl block.
pub fn expand_subscriber(args: TokenStream, mut input: ItemImpl) -> TokenStream {
    if !args.is_empty() {
        return syn::Error::new(args.span(), "#[subscriber] takes no arguments").to_compile_error();
    }
    if let Some((_, path, _)) = &input.trait_ {
        return syn::Error::new_spanned(path, "#[subscriber] must be placed on an inherent impl block")
            .to_compile_error();
    }

    let mut handlers = Vec::new();
    let mut errors: Option<syn::Error> = None;
    for item in &mut input.items {
        let ImplItem::Fn(method) = item else { continue };
        match take_handler(method) {
            Ok(Some(handler)) => handlers.push(handler),
            Ok(None) => {},
            Err(err) => match errors.as_mut() {
                Some(existing) => existing.combine(err),
                None => errors = Some(err),
            },
        }
    }

    if let Some(err) = errors {
        return err.to_compile_error();
    }
    if handlers.is_empty() {
        return syn::Error::new_spanned(
            &input.self_ty,
            "#[subscriber] impl block has no #[subscribe] methods",
        )
        .to_compile_error();
    }

    let self_ty = &input.self_ty;
    let (impl_generics, _, where_clause) = input.generics.split_for_impl();
    let entries = handlers.iter().map(|handler| {
        let HandlerSpec { method, event, thread_mode, sticky } = handler;
        let name = method.to_string();
        quote! {
            ::herald_event_bus::SubscriberMethod::new(
                #name,
                ::herald_event_bus::ThreadMode::#thread_mode,
                #sticky,
                |subscriber: &Self, event: &#event| subscriber.#method(event),
            )
        }
    });

    quote! {
        #input

        #[automatically_derived]
        impl #impl_generics ::herald_event_bus::Subscriber for #self_ty #where_clause {
            fn subscriber_methods() -> ::std::vec::Vec<::herald_event_bus::SubscriberMethod<Self>> {
                ::std::vec![#(#entries),*]
            }
        }
    }
}

/// Strips the `#[subscribe]` attribute from `method` and validates its shape.
fn take_handler(method: &mut ImplItemFn) -> syn::Result<Option<HandlerSpec>> {
    let Some(position) = method.attrs.iter().position(|attr| attr.path().is_ident(ATTRIBUTE))
    else {
        return Ok(None);
    };
    let attr = method.attrs.remove(position);
    if method.attrs.iter().any(|attr| attr.path().is_ident(ATTRIBUTE)) {
        return Err(syn::Error::new_spanned(&method.sig.ident, "duplicate #[subscribe] attribute"));
    }

    let (thread_mode, sticky) = parse_arguments(&attr)?;
    let event = event_type(method)?;

    Ok(Some(HandlerSpec { method: method.sig.ident.clone(), event, thread_mode, sticky }))
}

fn parse_arguments(attr: &Attribute) -> syn::Result<(syn::Ident, bool)> {
    let mut thread_mode = None;
    let mut sticky = None;

    let metas = match &attr.meta {
        Meta::Path(_) => Punctuated::new(),
        Meta::List(list) => {
            Punctuated::<Meta, Token![,]>::parse_terminated.parse2(list.tokens.clone())?
        },
        Meta::NameValue(nv) => {
            return Err(syn::Error::new_spanned(nv, "expected #[subscribe] or #[subscribe(...)]"));
        },
    };

    for meta in metas {
        match &meta {
            Meta::Path(path) if path.is_ident("sticky") => {
                sticky = Some(set_once(sticky, &meta, true)?);
            },
            Meta::NameValue(nv) if nv.path.is_ident("sticky") => {
                let value = bool_literal(&nv.value, "sticky")?;
                sticky = Some(set_once(sticky, &meta, value)?);
            },
            Meta::NameValue(nv) if nv.path.is_ident("thread_mode") => {
                let mode = thread_mode_variant(&nv.value)?;
                thread_mode = Some(set_once(thread_mode, &meta, mode)?);
            },
            _ => {
                return Err(syn::Error::new_spanned(
                    meta,
                    "unsupported argument; expected `thread_mode = \"...\"` or `sticky`",
                ));
            },
        }
    }

    let thread_mode =
        thread_mode.unwrap_or_else(|| syn::Ident::new("Posting", proc_macro2::Span::call_site()));
    Ok((thread_mode, sticky.unwrap_or(false)))
}

fn thread_mode_variant(value: &Expr) -> syn::Result<syn::Ident> {
    let Expr::Lit(expr) = value else {
        return Err(syn::Error::new_spanned(value, "thread_mode must be a string literal"));
    };
    let Lit::Str(lit) = &expr.lit else {
        return Err(syn::Error::new_spanned(value, "thread_mode must be a string literal"));
    };

    let variant = match lit.value().to_ascii_lowercase().as_str() {
        "posting" => "Posting",
        "main" => "Main",
        "background" => "Background",
        "async" => "Async",
        other => {
            return Err(syn::Error::new_spanned(
                lit,
                format!(
                    "unknown thread mode `{other}`; expected posting, main, background or async"
                ),
            ));
        },
    };
    Ok(syn::Ident::new(variant, lit.span()))
}

fn bool_literal(value: &Expr, label: &str) -> syn::Result<bool> {
    match value {
        Expr::Lit(expr) => match &expr.lit {
            Lit::Bool(lit) => Ok(lit.value),
            _ => Err(syn::Error::new_spanned(value, format!("{label} must be a boolean literal"))),
        },
        _ => Err(syn::Error::new_spanned(value, format!("{label} must be a boolean literal"))),
    }
}

fn set_once<T>(current: Option<T>, meta: &Meta, value: T) -> syn::Result<T> {
    if current.is_some() {
        return Err(syn::Error::new_spanned(meta, "argument specified more than once"));
    }
    Ok(value)
}

/// Extracts `E` from `fn name(&self, event: &E)`.
fn event_type(method: &ImplItemFn) -> syn::Result<Type> {
    let sig = &method.sig;
    if sig.asyncness.is_some() {
        return Err(syn::Error::new_spanned(sig.asyncness, "subscriber methods cannot be async"));
    }
    if !sig.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(&sig.generics, "subscriber methods cannot be generic"));
    }

    let mut inputs = sig.inputs.iter();
    match inputs.next() {
        Some(FnArg::Receiver(receiver))
            if receiver.reference.is_some() && receiver.mutability.is_none() => {},
        _ => {
            return Err(syn::Error::new_spanned(
                &sig.ident,
                "subscriber methods must take `&self` as their first argument",
            ));
        },
    }

    let (Some(FnArg::Typed(arg)), None) = (inputs.next(), inputs.next()) else {
        return Err(syn::Error::new_spanned(
            &sig.inputs,
            "subscriber methods take exactly one event argument besides `&self`",
        ));
    };

    match arg.ty.as_ref() {
        Type::Reference(reference) if reference.mutability.is_none() => {
            Ok(reference.elem.as_ref().clone())
        },
        other => {
            Err(syn::Error::new_spanned(other, "the event argument must be a shared reference `&E`"))
        },
    }
}
