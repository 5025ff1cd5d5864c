extern crate proc_macro;

use heck::ToUpperCamelCase;
use proc_macro::TokenStream;
use proc_macro2::{Span, TokenStream as TokenStream2};
use quote::{format_ident, quote, ToTokens};
use syn::{
    parenthesized, parse::Parse, parse::ParseStream, parse_macro_input, punctuated::Punctuated,
    FnArg, Ident, ItemTrait, LitInt, LitStr, Pat, Result, ReturnType, Token, TraitItem,
    TraitItemFn, Type,
};

const VERBS: &[&str] = &["GET", "POST", "PUT", "DELETE", "PATCH", "HEAD", "OPTIONS", "TRACE"];

const PRIMITIVES: &[&str] = &[
    "i8", "i16", "i32", "i64", "i128", "isize", "u8", "u16", "u32", "u64", "u128", "usize", "f32",
    "f64", "bool", "char",
];

/// Turns a trait into a declarative HTTP client.
///
/// The trait stays as written (minus the helper attributes) and a
/// `<Trait>Client` struct implementing it is generated. The client compiles
/// every method's metadata into a request template once, in `new`, and
/// registers the trait with `rest_kit::registry`.
///
/// ```ignore
/// #[rest_client(prefix = "/users")]
/// pub trait UserApi {
///     #[request(GET, "/{id}", status(404 => NotFound))]
///     fn find(&self, #[path] id: u64) -> rest_kit::Result<User>;
///
///     #[request(POST, consumes = "application/json")]
///     fn create(&self, #[body] user: &NewUser) -> rest_kit::Result<CallFuture<User>>;
/// }
/// ```
#[proc_macro_attribute]
pub fn rest_client(args: TokenStream, input: TokenStream) -> TokenStream {
    let args = parse_macro_input!(args as ClientArgs);
    let item = parse_macro_input!(input as ItemTrait);
    match expand(args, item) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

// --- 1. Attribute arguments ---

#[derive(Default)]
struct ClientArgs {
    prefix: Option<LitStr>,
    consumes: Option<LitStr>,
    client: Option<Ident>,
}

impl Parse for ClientArgs {
    fn parse(input: ParseStream) -> Result<Self> {
        let mut args = ClientArgs::default();
        while !input.is_empty() {
            let key: Ident = input.parse()?;
            input.parse::<Token![=]>()?;
            match key.to_string().as_str() {
                "prefix" => args.prefix = Some(input.parse()?),
                "consumes" => args.consumes = Some(input.parse()?),
                "client" => args.client = Some(input.parse()?),
                other => {
                    return Err(syn::Error::new(
                        key.span(),
                        format!("unknown rest_client argument `{}`", other),
                    ))
                }
            }
            if input.is_empty() {
                break;
            }
            input.parse::<Token![,]>()?;
        }
        Ok(args)
    }
}

/// `key = "value"` with the key written as an identifier or a string.
struct KeyValue {
    key: String,
    key_span: proc_macro2::Span,
    value: LitStr,
}

impl Parse for KeyValue {
    fn parse(input: ParseStream) -> Result<Self> {
        let (key, key_span) = if input.peek(LitStr) {
            let lit: LitStr = input.parse()?;
            (lit.value(), lit.span())
        } else {
            let ident: Ident = input.parse()?;
            (ident.to_string(), ident.span())
        };
        input.parse::<Token![=]>()?;
        Ok(KeyValue {
            key,
            key_span,
            value: input.parse()?,
        })
    }
}

/// `404 => NotFound`
struct StatusArm {
    status: LitInt,
    kind: syn::Path,
}

impl Parse for StatusArm {
    fn parse(input: ParseStream) -> Result<Self> {
        let status = input.parse()?;
        input.parse::<Token![=>]>()?;
        Ok(StatusArm {
            status,
            kind: input.parse()?,
        })
    }
}

#[derive(Default)]
struct RequestArgs {
    verbs: Vec<Ident>,
    path: Option<LitStr>,
    fixed: Vec<KeyValue>,
    query_keys: Vec<LitStr>,
    success: Option<(LitStr, LitStr)>,
    status: Vec<StatusArm>,
    consumes: Option<LitStr>,
}

impl Parse for RequestArgs {
    fn parse(input: ParseStream) -> Result<Self> {
        let mut args = RequestArgs::default();
        while !input.is_empty() {
            if input.peek(LitStr) {
                let path: LitStr = input.parse()?;
                if args.path.is_some() {
                    return Err(syn::Error::new(path.span(), "duplicate request path"));
                }
                args.path = Some(path);
            } else {
                let ident: Ident = input.parse()?;
                match ident.to_string().as_str() {
                    "fixed" => {
                        let content;
                        parenthesized!(content in input);
                        args.fixed
                            .extend(Punctuated::<KeyValue, Token![,]>::parse_terminated(&content)?);
                    }
                    "query" => {
                        let content;
                        parenthesized!(content in input);
                        args.query_keys
                            .extend(Punctuated::<LitStr, Token![,]>::parse_terminated(&content)?);
                    }
                    "success" => {
                        let content;
                        parenthesized!(content in input);
                        args.success = Some(parse_success(&ident, &content)?);
                    }
                    "status" => {
                        let content;
                        parenthesized!(content in input);
                        let arms = Punctuated::<StatusArm, Token![,]>::parse_terminated(&content)?;
                        args.status.extend(arms);
                    }
                    "consumes" => {
                        input.parse::<Token![=]>()?;
                        args.consumes = Some(input.parse()?);
                    }
                    verb if VERBS.contains(&verb.to_ascii_uppercase().as_str()) => {
                        args.verbs.push(ident)
                    }
                    other => {
                        return Err(syn::Error::new(
                            ident.span(),
                            format!("unknown request argument `{}`", other),
                        ))
                    }
                }
            }
            if input.is_empty() {
                break;
            }
            input.parse::<Token![,]>()?;
        }
        Ok(args)
    }
}

fn parse_success(ident: &Ident, content: ParseStream) -> Result<(LitStr, LitStr)> {
    let mut key = None;
    let mut value = None;
    for kv in Punctuated::<KeyValue, Token![,]>::parse_terminated(content)? {
        match kv.key.as_str() {
            "key" => key = Some(kv.value),
            "value" => value = Some(kv.value),
            other => {
                return Err(syn::Error::new(
                    kv.key_span,
                    format!("unknown success argument `{}`", other),
                ))
            }
        }
    }
    match (key, value) {
        (Some(key), Some(value)) => Ok((key, value)),
        _ => Err(syn::Error::new(
            ident.span(),
            "success(...) needs both `key` and `value`",
        )),
    }
}

// --- 2. Per-method model ---

#[derive(Clone, Copy, PartialEq, Eq)]
enum Role {
    Route,
    Query,
    Body,
    Cookie,
    Unbound,
}

struct Param {
    ident: Ident,
    role: Role,
    key: String,
    type_name: String,
}

struct Shape {
    shape: TokenStream2,
    decode: TokenStream2,
    is_async: bool,
}

struct Method {
    sig: syn::Signature,
    request: RequestArgs,
    params: Vec<Param>,
    shape: Shape,
}

/// Removes `#[path]`, `#[query]`, `#[body]` and `#[cookie]` from the
/// parameters and records the binding each one declared.
fn take_params(method: &mut TraitItemFn) -> Result<Vec<Param>> {
    match method.sig.receiver() {
        Some(receiver) if receiver.reference.is_some() && receiver.mutability.is_none() => {}
        _ => {
            return Err(syn::Error::new_spanned(
                &method.sig,
                "rest_client methods must take `&self`",
            ))
        }
    }

    let mut params = Vec::new();
    for arg in method.sig.inputs.iter_mut() {
        let FnArg::Typed(pat_type) = arg else {
            continue;
        };
        let ident = match pat_type.pat.as_ref() {
            Pat::Ident(pat) => pat.ident.clone(),
            other => {
                return Err(syn::Error::new_spanned(
                    other,
                    "rest_client parameters must be plain identifiers",
                ))
            }
        };

        let mut binding: Option<(Role, String)> = None;
        let mut kept = Vec::new();
        for attr in pat_type.attrs.drain(..) {
            let role = if attr.path().is_ident("path") {
                Role::Route
            } else if attr.path().is_ident("query") {
                Role::Query
            } else if attr.path().is_ident("cookie") {
                Role::Cookie
            } else if attr.path().is_ident("body") {
                Role::Body
            } else {
                kept.push(attr);
                continue;
            };
            if binding.is_some() {
                return Err(syn::Error::new_spanned(
                    &attr,
                    "a parameter can carry only one binding attribute",
                ));
            }
            let key = match &attr.meta {
                syn::Meta::Path(_) => ident.to_string(),
                _ => attr.parse_args::<LitStr>()?.value(),
            };
            binding = Some((role, key));
        }
        pat_type.attrs = kept;

        let (role, key) = binding.unwrap_or((Role::Unbound, ident.to_string()));
        params.push(Param {
            ident,
            role,
            key,
            type_name: type_name(&pat_type.ty),
        });
    }
    Ok(params)
}

fn take_request(method: &mut TraitItemFn) -> Result<RequestArgs> {
    let mut request = None;
    let mut kept = Vec::new();
    for attr in method.attrs.drain(..) {
        if attr.path().is_ident("request") {
            if request.is_some() {
                return Err(syn::Error::new_spanned(&attr, "duplicate #[request] attribute"));
            }
            request = Some(match &attr.meta {
                syn::Meta::Path(_) => RequestArgs::default(),
                _ => attr.parse_args::<RequestArgs>()?,
            });
        } else {
            kept.push(attr);
        }
    }
    method.attrs = kept;
    Ok(request.unwrap_or_default())
}

fn type_name(ty: &Type) -> String {
    ty.to_token_stream().to_string().replace(' ', "")
}

/// Extracts the inner type from a generic type like `Result<T>` -> `T`.
fn get_inner_type<'a>(ty: &'a Type, type_name: &str) -> Option<&'a Type> {
    if let Type::Path(type_path) = ty {
        if let Some(segment) = type_path.path.segments.last() {
            if segment.ident == type_name {
                if let syn::PathArguments::AngleBracketed(args) = &segment.arguments {
                    if let Some(syn::GenericArgument::Type(inner)) = args.args.first() {
                        return Some(inner);
                    }
                }
            }
        }
    }
    None
}

/// Name of a non-generic path type, e.g. `String` or `bytes::Bytes` -> `Bytes`.
fn plain_ident(ty: &Type) -> Option<String> {
    if let Type::Path(type_path) = ty {
        if let Some(segment) = type_path.path.segments.last() {
            if segment.arguments.is_none() {
                return Some(segment.ident.to_string());
            }
        }
    }
    None
}

fn analyze_shape(ty: &Type, allow_future: bool) -> Result<Shape> {
    if let Type::Tuple(tuple) = ty {
        if tuple.elems.is_empty() {
            return Ok(Shape {
                shape: quote! { ::rest_kit::ReturnShape::Unit },
                decode: quote! { ::rest_kit::decode::unit },
                is_async: false,
            });
        }
    }

    if let Some(inner) = get_inner_type(ty, "CallFuture") {
        if !allow_future {
            return Err(syn::Error::new_spanned(ty, "CallFuture cannot be nested"));
        }
        let inner = analyze_shape(inner, false)?;
        let inner_shape = inner.shape;
        return Ok(Shape {
            shape: quote! { ::rest_kit::ReturnShape::Future(::std::boxed::Box::new(#inner_shape)) },
            decode: inner.decode,
            is_async: true,
        });
    }

    if let Some(inner) = get_inner_type(ty, "Reply") {
        let inner = analyze_shape(inner, false)?;
        let inner_decode = inner.decode;
        return Ok(Shape {
            shape: inner.shape,
            decode: quote! {
                |response| ::rest_kit::Reply::capture(response, #inner_decode)
            },
            is_async: false,
        });
    }

    if let Some(inner) = get_inner_type(ty, "Vec") {
        if plain_ident(inner).as_deref() == Some("u8") {
            return Ok(Shape {
                shape: quote! { ::rest_kit::ReturnShape::Binary },
                decode: quote! { ::rest_kit::decode::binary_vec },
                is_async: false,
            });
        }
    }

    let (shape, decode) = match plain_ident(ty).as_deref() {
        Some(name) if PRIMITIVES.contains(&name) => (
            quote! { ::rest_kit::ReturnShape::Primitive },
            quote! { ::rest_kit::decode::primitive::<#ty> },
        ),
        Some("String") => (
            quote! { ::rest_kit::ReturnShape::Text },
            quote! { ::rest_kit::decode::text },
        ),
        Some("Bytes") => (
            quote! { ::rest_kit::ReturnShape::Binary },
            quote! { ::rest_kit::decode::binary },
        ),
        _ => (
            quote! { ::rest_kit::ReturnShape::Json },
            quote! { ::rest_kit::decode::json::<#ty> },
        ),
    };
    Ok(Shape {
        shape,
        decode,
        is_async: false,
    })
}

fn return_shape(sig: &syn::Signature) -> Result<Shape> {
    let ReturnType::Type(_, ty) = &sig.output else {
        return Err(syn::Error::new_spanned(
            sig,
            "rest_client methods must return rest_kit::Result<T>",
        ));
    };
    let Some(value) = get_inner_type(ty, "Result") else {
        return Err(syn::Error::new_spanned(
            ty,
            "rest_client methods must return rest_kit::Result<T>",
        ));
    };
    analyze_shape(value, true)
}

// --- 3. Code generation ---

fn verb_tokens(verb: &Ident) -> TokenStream2 {
    let variant = format_ident!(
        "{}",
        verb.to_string().to_ascii_lowercase().to_upper_camel_case(),
        span = verb.span()
    );
    quote! { ::rest_kit::HttpVerb::#variant }
}

fn descriptor_tokens(api: &str, method: &Method) -> TokenStream2 {
    let name = method.sig.ident.to_string();
    let shape = &method.shape.shape;
    let params = method.params.iter().map(|p| {
        let ctor = match p.role {
            Role::Route => quote! { route },
            Role::Query => quote! { query },
            Role::Body => quote! { body },
            Role::Cookie => quote! { cookie },
            Role::Unbound => quote! { unbound },
        };
        let key = &p.key;
        let type_name = &p.type_name;
        quote! { .param(::rest_kit::ParamDescriptor::#ctor(#key, #type_name)) }
    });
    quote! {
        ::rest_kit::MethodDescriptor::new(#api, #name, #shape) #(#params)*
    }
}

fn metadata_tokens(method: &Method, class_consumes: Option<&LitStr>) -> TokenStream2 {
    let request = &method.request;
    let verbs = request.verbs.iter().map(|v| {
        let verb = verb_tokens(v);
        quote! { .verb(#verb) }
    });
    let path = request.path.as_ref().map(|p| quote! { .path(#p) });
    let fixed = request.fixed.iter().map(|kv| {
        let key = &kv.key;
        let value = &kv.value;
        quote! { .fixed(#key, #value) }
    });
    let query_keys = request.query_keys.iter().map(|k| quote! { .query_key(#k) });
    let success = request
        .success
        .as_ref()
        .map(|(key, value)| quote! { .success(#key, #value) });
    let status_errors = if request.status.is_empty() {
        None
    } else {
        let arms = request.status.iter().map(|arm| {
            let status = &arm.status;
            let kind = &arm.kind;
            quote! { .register::<#kind>(#status) }
        });
        Some(quote! { .status_errors(::rest_kit::StatusErrorMapper::new() #(#arms)*) })
    };
    let consumes = request
        .consumes
        .as_ref()
        .or(class_consumes)
        .map(|c| quote! { .consumes(#c) });

    quote! {
        ::rest_kit::MethodMetadata::new()
            #(#verbs)*
            #path
            #(#fixed)*
            #(#query_keys)*
            #success
            #status_errors
            #consumes
    }
}

fn impl_method_tokens(index: usize, method: &Method) -> TokenStream2 {
    let sig = &method.sig;
    let decode = &method.shape.decode;
    // Mixed-site locals never collide with the caller's parameter names.
    let template = Ident::new("template", Span::mixed_site());
    let call = Ident::new("call", Span::mixed_site());

    let mut bindings = Vec::new();
    let mut body = None;
    for param in &method.params {
        let ident = &param.ident;
        let key = &param.key;
        bindings.push(match param.role {
            Role::Route => quote! { #call.route(#key, &#ident); },
            Role::Query => quote! { #call.query(#key, &#ident); },
            Role::Cookie => quote! { #call.cookie(#key, &#ident); },
            Role::Body => {
                body = Some(ident.clone());
                continue;
            }
            Role::Unbound => quote! { let _ = &#ident; },
        });
    }

    let dispatch = match (&body, method.shape.is_async) {
        (Some(body), false) => {
            quote! { self.executor.post_body(#template, #call, &#body, #decode) }
        }
        (Some(body), true) => {
            quote! { self.executor.post_body_async(#template, #call, &#body, #decode) }
        }
        (None, false) => quote! { self.executor.call(#template, #call, #decode) },
        (None, true) => quote! { self.executor.call_async(#template, #call, #decode) },
    };

    quote! {
        #sig {
            let #template = &self.templates[#index];
            #[allow(unused_mut)]
            let mut #call = ::rest_kit::CallContext::new();
            #(#bindings)*
            #dispatch
        }
    }
}

fn expand(args: ClientArgs, mut item: ItemTrait) -> Result<TokenStream2> {
    if !item.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &item.generics,
            "rest_client traits cannot be generic",
        ));
    }

    let trait_ident = item.ident.clone();
    let api = trait_ident.to_string();
    let client_ident = args
        .client
        .clone()
        .unwrap_or_else(|| format_ident!("{}Client", trait_ident));
    let prefix = args.prefix.as_ref().map(LitStr::value).unwrap_or_default();
    let vis = &item.vis;

    let mut methods = Vec::new();
    let mut errors = Vec::new();
    for trait_item in item.items.iter_mut() {
        let TraitItem::Fn(method) = trait_item else {
            continue;
        };
        let parsed = take_request(method).and_then(|request| {
            let params = take_params(method)?;
            let shape = return_shape(&method.sig)?;
            Ok(Method {
                sig: method.sig.clone(),
                request,
                params,
                shape,
            })
        });
        match parsed {
            Ok(m) => methods.push(m),
            Err(e) => errors.push(e),
        }
    }
    let mut errors = errors.into_iter();
    if let Some(mut all) = errors.next() {
        for e in errors {
            all.combine(e);
        }
        return Err(all);
    }

    let descriptors = methods.iter().map(|m| {
        let descriptor = descriptor_tokens(&api, m);
        let metadata = metadata_tokens(m, args.consumes.as_ref());
        quote! { (#descriptor, #metadata) }
    });
    let impls = methods
        .iter()
        .enumerate()
        .map(|(index, m)| impl_method_tokens(index, m));
    let client_doc = format!("HTTP client implementing [`{}`].", api);

    Ok(quote! {
        #item

        #[doc = #client_doc]
        #[derive(Debug, Clone)]
        #vis struct #client_ident {
            executor: ::rest_kit::Executor,
            templates: ::std::vec::Vec<::std::sync::Arc<::rest_kit::RequestTemplate>>,
        }

        impl #client_ident {
            pub const API: &'static str = #api;
            pub const PREFIX: &'static str = #prefix;

            /// Descriptor and metadata of every method, in declaration order.
            pub fn methods(
            ) -> ::std::vec::Vec<(::rest_kit::MethodDescriptor, ::rest_kit::MethodMetadata)> {
                ::std::vec![#(#descriptors),*]
            }

            pub fn new(executor: ::rest_kit::Executor) -> ::rest_kit::Result<Self> {
                let templates = Self::methods()
                    .into_iter()
                    .map(|(descriptor, metadata)| {
                        ::rest_kit::compile(&descriptor, Self::PREFIX, metadata)
                            .map(::std::sync::Arc::new)
                    })
                    .collect::<::rest_kit::Result<::std::vec::Vec<_>>>()?;
                Ok(Self { executor, templates })
            }

            pub fn template(
                &self,
                method: &str,
            ) -> ::std::option::Option<&::std::sync::Arc<::rest_kit::RequestTemplate>> {
                self.templates.iter().find(|t| t.method() == method)
            }

            pub fn executor(&self) -> &::rest_kit::Executor {
                &self.executor
            }
        }

        impl #trait_ident for #client_ident {
            #(#impls)*
        }

        ::rest_kit::inventory::submit! {
            ::rest_kit::registry::ApiRegistration {
                api: #api,
                prefix: #prefix,
                methods: #client_ident::methods,
            }
        }
    })
}
