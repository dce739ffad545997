use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, Data, DataEnum, DeriveInput, Fields, FieldsNamed, Ident};

/// Derive persisted field tables.
///
/// # Named structs
///
/// Implements `Reflect`, `Record` and `Persist`. Every named field is
/// persisted except fields marked `#[persist(skip)]` and fields whose name
/// starts with `_`. The struct must implement `Default`, and every persisted
/// field type must implement `Persist`.
///
/// ```ignore
/// #[derive(Default, Persist)]
/// struct Inventory {
///     slots: Vec<Item>,
///     owner: Option<MemberRef<Player>>,
///     #[persist(skip)]
///     dirty: bool,
/// }
/// ```
///
/// `#[persist(base = Parent)]` declares `Parent` as the base type. A custom
/// serializer registered for `Parent` then also handles this type.
///
/// # Fieldless enums
///
/// Implements `Persist`, storing the variant's discriminant.
///
/// ```ignore
/// #[derive(Persist)]
/// enum Faction { Neutral, Ally, Enemy = 10 }
/// ```
#[proc_macro_derive(Persist, attributes(persist))]
pub fn derive_persist(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    if !input.generics.params.is_empty() {
        return syn::Error::new_spanned(
            &input.generics,
            "Persist cannot be derived for generic types",
        )
        .to_compile_error()
        .into();
    }

    let result = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => derive_record(&input, Some(fields)),
            Fields::Unit => derive_record(&input, None),
            Fields::Unnamed(_) => Err(syn::Error::new_spanned(
                &input.ident,
                "Persist requires named fields",
            )),
        },
        Data::Enum(data) => derive_enum(&input.ident, data),
        Data::Union(_) => Err(syn::Error::new_spanned(
            &input.ident,
            "Persist cannot be derived for unions",
        )),
    };

    result
        .unwrap_or_else(|err| err.to_compile_error())
        .into()
}

/// Struct-level `#[persist(...)]` options.
fn parse_base(input: &DeriveInput) -> syn::Result<Option<syn::Path>> {
    let mut base = None;
    for attr in &input.attrs {
        if !attr.path().is_ident("persist") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("base") {
                base = Some(meta.value()?.parse::<syn::Path>()?);
                Ok(())
            } else {
                Err(meta.error("expected `base = Type`"))
            }
        })?;
    }
    Ok(base)
}

/// Field-level `#[persist(skip)]`.
fn is_skipped(field: &syn::Field) -> syn::Result<bool> {
    let mut skip = false;
    for attr in &field.attrs {
        if !attr.path().is_ident("persist") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("skip") {
                skip = true;
                Ok(())
            } else {
                Err(meta.error("expected `skip`"))
            }
        })?;
    }
    Ok(skip)
}

fn derive_record(
    input: &DeriveInput,
    fields: Option<&FieldsNamed>,
) -> syn::Result<proc_macro2::TokenStream> {
    let name = &input.ident;
    let name_str = name.to_string();

    let base = match parse_base(input)? {
        Some(path) => quote! {
            ::core::option::Option::Some(
                <#path as redlilium_persist::Record>::type_descriptor
                    as fn() -> &'static redlilium_persist::TypeDescriptor
            )
        },
        None => quote! { ::core::option::Option::None },
    };

    let mut persisted = Vec::new();
    for field in fields.iter().flat_map(|f| f.named.iter()) {
        let Some(ident) = field.ident.as_ref() else {
            continue;
        };
        if ident.to_string().starts_with('_') || is_skipped(field)? {
            continue;
        }
        persisted.push((ident, &field.ty));
    }

    let field_entries = persisted.iter().map(|(ident, _)| {
        let ident_str = ident.to_string();
        quote! {
            redlilium_persist::Field::new(#ident_str, &self.#ident)
        }
    });

    let set_arms = persisted.iter().map(|(ident, ty)| {
        let ident_str = ident.to_string();
        quote! {
            #ident_str => {
                let kind = value.kind();
                match <#ty as redlilium_persist::Persist>::from_value(value) {
                    ::core::option::Option::Some(v) => {
                        self.#ident = v;
                        ::core::result::Result::Ok(())
                    }
                    ::core::option::Option::None => ::core::result::Result::Err(
                        redlilium_persist::PersistError::FieldError {
                            field: ::std::string::String::from(#ident_str),
                            message: ::std::format!(
                                "{} value does not fit {}",
                                kind,
                                ::core::any::type_name::<#ty>()
                            ),
                        },
                    ),
                }
            }
        }
    });

    Ok(quote! {
        impl redlilium_persist::Reflect for #name {
            fn type_name(&self) -> &'static str {
                #name_str
            }

            fn descriptor(&self) -> &'static redlilium_persist::TypeDescriptor {
                <Self as redlilium_persist::Record>::type_descriptor()
            }

            fn persisted_fields(&self) -> ::std::vec::Vec<redlilium_persist::Field> {
                ::std::vec![#(#field_entries),*]
            }

            #[allow(unreachable_code, unused_variables)]
            fn set_field(
                &mut self,
                name: &str,
                value: redlilium_persist::Value,
            ) -> ::core::result::Result<(), redlilium_persist::PersistError> {
                match name {
                    #(#set_arms)*
                    _ => ::core::result::Result::Err(redlilium_persist::PersistError::UnknownField {
                        record: ::std::string::String::from(#name_str),
                        field: ::std::string::String::from(name),
                    }),
                }
            }

            fn as_any(&self) -> &dyn ::core::any::Any {
                self
            }

            fn as_any_mut(&mut self) -> &mut dyn ::core::any::Any {
                self
            }
        }

        impl redlilium_persist::Record for #name {
            const NAME: &'static str = #name_str;

            fn type_descriptor() -> &'static redlilium_persist::TypeDescriptor {
                static DESCRIPTOR: redlilium_persist::TypeDescriptor =
                    redlilium_persist::TypeDescriptor {
                        name: #name_str,
                        base: #base,
                        construct: <#name as redlilium_persist::Record>::construct_default,
                    };
                &DESCRIPTOR
            }
        }

        impl redlilium_persist::Persist for #name {
            fn field_type() -> redlilium_persist::FieldType {
                redlilium_persist::FieldType::Record(
                    <Self as redlilium_persist::Record>::type_descriptor(),
                )
            }

            fn to_value(&self) -> redlilium_persist::Value {
                redlilium_persist::Value::Record(
                    <Self as redlilium_persist::Record>::to_record_value(self),
                )
            }

            fn from_value(value: redlilium_persist::Value) -> ::core::option::Option<Self> {
                match value {
                    redlilium_persist::Value::Record(record) => ::core::option::Option::Some(
                        <Self as redlilium_persist::Record>::from_record_value(record),
                    ),
                    _ => ::core::option::Option::None,
                }
            }
        }
    })
}

fn derive_enum(name: &Ident, data: &DataEnum) -> syn::Result<proc_macro2::TokenStream> {
    let name_str = name.to_string();

    if data.variants.is_empty() {
        return Err(syn::Error::new_spanned(
            name,
            "Persist cannot be derived for enums without variants",
        ));
    }

    let mut variants = Vec::new();
    for variant in &data.variants {
        if !matches!(variant.fields, Fields::Unit) {
            return Err(syn::Error::new_spanned(
                variant,
                "Persist can only be derived for enums without fields",
            ));
        }
        variants.push(&variant.ident);
    }

    Ok(quote! {
        impl redlilium_persist::Persist for #name {
            fn field_type() -> redlilium_persist::FieldType {
                redlilium_persist::FieldType::Enum(#name_str)
            }

            fn to_value(&self) -> redlilium_persist::Value {
                redlilium_persist::Value::Int(match self {
                    #(Self::#variants => Self::#variants as i64,)*
                })
            }

            fn from_value(value: redlilium_persist::Value) -> ::core::option::Option<Self> {
                let redlilium_persist::Value::Int(discriminant) = value else {
                    return ::core::option::Option::None;
                };
                #(
                    if discriminant == Self::#variants as i64 {
                        return ::core::option::Option::Some(Self::#variants);
                    }
                )*
                ::core::option::Option::None
            }
        }
    })
}
