//! Procedural macros for the docmap project.
//!
//! [`mapped!`] is the schema-registration step: it expands a declarative
//! description of a mapped class into the state-holding struct, a `Mapped`
//! implementation with a lazily-built schema, and a typed accessor pair per
//! field. The generated code paths are rooted at `::docmap`, so the macro is
//! meant to be used through the facade crate.
//!
//! # Grammar
//!
//! ```ignore
//! mapped! {
//!     /// Docs and attributes carry over to the generated struct.
//!     pub struct Person in "people" {
//!         identity id,
//!         name: string = "",
//!         age: int,
//!         salary: decimal(2),
//!         hired_at: datetime,
//!         contact: email,
//!         manager_id: id,
//!         manager: reference(Person, manager_id),
//!     }
//! }
//! ```
//!
//! Fields declared with a default (`= expr`) produce getters returning
//! `MapResult<V>`; fields without produce `MapResult<Option<V>>`. Lifecycle
//! hooks are not generated — classes needing hooks implement `Mapped` by
//! hand.

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use syn::parse::{Parse, ParseStream};
use syn::{
    Attribute, Expr, Ident, LitInt, LitStr, Path, Token, Visibility, braced, parenthesized,
    parse_macro_input,
};

struct MappedDef {
    attrs: Vec<Attribute>,
    vis: Visibility,
    name: Ident,
    collection: LitStr,
    identity: Ident,
    fields: Vec<FieldDef>,
}

enum FieldDef {
    Scalar {
        name: Ident,
        kind: ScalarKind,
        default: Option<Expr>,
    },
    Reference {
        name: Ident,
        target: Path,
        local: Ident,
    },
}

enum ScalarKind {
    Id,
    Str,
    Int,
    Decimal(LitInt),
    DateTime,
    Email,
}

impl Parse for MappedDef {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        let attrs = input.call(Attribute::parse_outer)?;
        let vis: Visibility = input.parse()?;
        input.parse::<Token![struct]>()?;
        let name: Ident = input.parse()?;
        input.parse::<Token![in]>()?;
        let collection: LitStr = input.parse()?;

        let body;
        braced!(body in input);

        let keyword: Ident = body.parse()?;
        if keyword != "identity" {
            return Err(syn::Error::new(
                keyword.span(),
                "expected `identity <name>` as the first entry",
            ));
        }
        let identity: Ident = body.parse()?;
        body.parse::<Token![,]>()?;

        let mut fields = Vec::new();
        while !body.is_empty() {
            fields.push(body.call(parse_field)?);
            if body.is_empty() {
                break;
            }
            body.parse::<Token![,]>()?;
        }

        Ok(MappedDef {
            attrs,
            vis,
            name,
            collection,
            identity,
            fields,
        })
    }
}

fn parse_field(input: ParseStream) -> syn::Result<FieldDef> {
    let name: Ident = input.parse()?;
    input.parse::<Token![:]>()?;
    let kind: Ident = input.parse()?;

    if kind == "reference" {
        let args;
        parenthesized!(args in input);
        let target: Path = args.parse()?;
        args.parse::<Token![,]>()?;
        let local: Ident = args.parse()?;
        return Ok(FieldDef::Reference {
            name,
            target,
            local,
        });
    }

    let scalar = if kind == "id" {
        ScalarKind::Id
    } else if kind == "string" {
        ScalarKind::Str
    } else if kind == "int" {
        ScalarKind::Int
    } else if kind == "datetime" {
        ScalarKind::DateTime
    } else if kind == "email" {
        ScalarKind::Email
    } else if kind == "decimal" {
        let args;
        parenthesized!(args in input);
        ScalarKind::Decimal(args.parse::<LitInt>()?)
    } else {
        return Err(syn::Error::new(
            kind.span(),
            format!("unknown field kind `{kind}`"),
        ));
    };

    let default = if input.peek(Token![=]) {
        input.parse::<Token![=]>()?;
        Some(input.parse::<Expr>()?)
    } else {
        None
    };

    Ok(FieldDef::Scalar {
        name,
        kind: scalar,
        default,
    })
}

/// Declares a mapped class: the struct, its schema, and typed accessors.
#[proc_macro]
pub fn mapped(input: TokenStream) -> TokenStream {
    let def = parse_macro_input!(input as MappedDef);
    expand(&def).into()
}

fn expand(def: &MappedDef) -> TokenStream2 {
    let MappedDef {
        attrs,
        vis,
        name,
        collection,
        identity,
        fields,
    } = def;
    let identity_name = identity.to_string();

    let mut schema_steps = Vec::new();
    let mut accessors = Vec::new();

    for field in fields {
        match field {
            FieldDef::Scalar {
                name: field_ident,
                kind,
                default,
            } => {
                let field_name = field_ident.to_string();
                let setter = format_ident!("set_{}", field_ident);
                let (kind_tokens, codec, value_type) = scalar_parts(kind);
                let (param_type, into_value) = setter_parts(kind, &value_type);

                let spec = match default {
                    Some(default) => quote! {
                        ::docmap::field::FieldSpec::new(#field_name, #kind_tokens)
                            .default_raw(::docmap::field::FieldCodec::encode(
                                &#codec,
                                &::std::convert::Into::into(#default),
                            )?)
                    },
                    None => quote! {
                        ::docmap::field::FieldSpec::new(#field_name, #kind_tokens)
                    },
                };
                schema_steps.push(quote! {
                    builder = builder.field(#spec);
                });

                let getter = match default {
                    Some(_) => quote! {
                        #vis fn #field_ident(&self) -> ::docmap::error::MapResult<#value_type> {
                            self.state.get_required(::docmap::schema::schema_field::<Self>(#field_name)?, &#codec)
                        }
                    },
                    None => quote! {
                        #vis fn #field_ident(
                            &self,
                        ) -> ::docmap::error::MapResult<::std::option::Option<#value_type>> {
                            self.state.get_field(::docmap::schema::schema_field::<Self>(#field_name)?, &#codec)
                        }
                    },
                };
                accessors.push(getter);
                accessors.push(quote! {
                    #vis fn #setter(&self, value: #param_type) -> ::docmap::error::MapResult<()> {
                        self.state.set_field(
                            ::docmap::schema::schema_field::<Self>(#field_name)?,
                            &#codec,
                            &#into_value,
                        )
                    }
                });
            }
            FieldDef::Reference {
                name: field_ident,
                target,
                local,
            } => {
                let field_name = field_ident.to_string();
                let local_name = local.to_string();
                let setter = format_ident!("set_{}", field_ident);
                schema_steps.push(quote! {
                    builder = builder.reference::<#target>(#field_name, #local_name);
                });
                accessors.push(quote! {
                    #vis async fn #field_ident(
                        &self,
                    ) -> ::docmap::error::MapResult<
                        ::std::option::Option<::std::sync::Arc<#target>>,
                    > {
                        ::docmap::reference::get::<#target>(
                            <Self as ::docmap::schema::Mapped>::schema(),
                            #field_name,
                            &self.state,
                        )
                        .await
                    }
                });
                accessors.push(quote! {
                    #vis fn #setter(
                        &self,
                        value: ::std::option::Option<&::std::sync::Arc<#target>>,
                    ) -> ::docmap::error::MapResult<()> {
                        ::docmap::reference::set::<#target>(
                            <Self as ::docmap::schema::Mapped>::schema(),
                            #field_name,
                            &self.state,
                            value,
                        )
                    }
                });
            }
        }
    }

    quote! {
        #(#attrs)*
        #vis struct #name {
            state: ::docmap::state::ObjectState,
        }

        impl ::docmap::schema::Mapped for #name {
            fn schema() -> &'static ::docmap::schema::Schema {
                static SCHEMA: ::std::sync::LazyLock<::docmap::schema::Schema> =
                    ::std::sync::LazyLock::new(|| {
                        let build = || -> ::docmap::error::MapResult<::docmap::schema::Schema> {
                            let mut builder = ::docmap::schema::Schema::builder(#collection)
                                .identity(#identity_name);
                            #(#schema_steps)*
                            builder.build()
                        };
                        match build() {
                            ::std::result::Result::Ok(schema) => schema,
                            ::std::result::Result::Err(error) => ::std::panic!(
                                "invalid schema for `{}`: {}",
                                ::std::stringify!(#name),
                                error,
                            ),
                        }
                    });
                &SCHEMA
            }

            fn state(&self) -> &::docmap::state::ObjectState {
                &self.state
            }

            fn from_state(state: ::docmap::state::ObjectState) -> Self {
                Self { state }
            }
        }

        impl #name {
            /// Creates a detached instance with no identity.
            #vis fn new() -> Self {
                <Self as ::docmap::schema::Mapped>::from_state(
                    ::docmap::state::ObjectState::new(),
                )
            }

            /// The identity assigned by the backend, if this instance was
            /// ever saved or loaded.
            #vis fn #identity(&self) -> ::std::option::Option<::docmap::bson::oid::ObjectId> {
                self.state.identity()
            }

            #(#accessors)*
        }

        impl ::std::default::Default for #name {
            fn default() -> Self {
                Self::new()
            }
        }
    }
}

fn scalar_parts(kind: &ScalarKind) -> (TokenStream2, TokenStream2, TokenStream2) {
    match kind {
        ScalarKind::Id => (
            quote!(::docmap::field::FieldKind::Id),
            quote!(::docmap::field::IdCodec),
            quote!(::docmap::bson::oid::ObjectId),
        ),
        ScalarKind::Str => (
            quote!(::docmap::field::FieldKind::String),
            quote!(::docmap::field::StringCodec),
            quote!(::std::string::String),
        ),
        ScalarKind::Int => (
            quote!(::docmap::field::FieldKind::Int),
            quote!(::docmap::field::IntCodec),
            quote!(i64),
        ),
        ScalarKind::Decimal(precision) => (
            quote!(::docmap::field::FieldKind::Decimal { precision: #precision }),
            quote!(::docmap::field::DecimalCodec { precision: #precision }),
            quote!(::docmap::rust_decimal::Decimal),
        ),
        ScalarKind::DateTime => (
            quote!(::docmap::field::FieldKind::DateTime),
            quote!(::docmap::field::DateTimeCodec),
            quote!(::docmap::chrono::DateTime<::docmap::chrono::Utc>),
        ),
        ScalarKind::Email => (
            quote!(::docmap::field::FieldKind::Email),
            quote!(::docmap::field::EmailCodec),
            quote!(::std::string::String),
        ),
    }
}

fn setter_parts(kind: &ScalarKind, value_type: &TokenStream2) -> (TokenStream2, TokenStream2) {
    match kind {
        // string-valued fields take anything convertible for ergonomics
        ScalarKind::Str | ScalarKind::Email => (
            quote!(impl ::std::convert::Into<::std::string::String>),
            quote!(value.into()),
        ),
        _ => (quote!(#value_type), quote!(value)),
    }
}
