//! Record derive macro implementation

use heck::ToSnakeCase;
use proc_macro2::TokenStream;
use quote::quote;
use syn::{Data, DeriveInput, Fields, LitStr, Result};

struct StructAttrs {
    table: Option<String>,
    model: Option<String>,
}

fn struct_attrs(input: &DeriveInput) -> Result<StructAttrs> {
    let mut attrs = StructAttrs {
        table: None,
        model: None,
    };
    for attr in &input.attrs {
        if !attr.path().is_ident("orm") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("table") {
                attrs.table = Some(meta.value()?.parse::<LitStr>()?.value());
                Ok(())
            } else if meta.path.is_ident("model") {
                attrs.model = Some(meta.value()?.parse::<LitStr>()?.value());
                Ok(())
            } else {
                Err(meta.error("expected `table` or `model`"))
            }
        })?;
    }
    Ok(attrs)
}

fn column_name(field: &syn::Field) -> Result<Option<String>> {
    let mut column = None;
    for attr in &field.attrs {
        if !attr.path().is_ident("orm") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("column") {
                column = Some(meta.value()?.parse::<LitStr>()?.value());
                Ok(())
            } else {
                Err(meta.error("expected `column`"))
            }
        })?;
    }
    Ok(column)
}

/// Extract the inner type T from Option<T>, or return None if not an Option type.
fn option_inner(ty: &syn::Type) -> Option<&syn::Type> {
    let syn::Type::Path(type_path) = ty else {
        return None;
    };
    let seg = type_path.path.segments.last()?;
    if seg.ident != "Option" {
        return None;
    }
    let syn::PathArguments::AngleBracketed(args) = &seg.arguments else {
        return None;
    };
    if args.args.len() != 1 {
        return None;
    }
    let syn::GenericArgument::Type(inner) = args.args.first()? else {
        return None;
    };
    Some(inner)
}

/// Map a Rust field type onto a `FieldType` variant by its last path segment.
fn field_type(ty: &syn::Type) -> Result<TokenStream> {
    let unsupported = || {
        syn::Error::new_spanned(
            ty,
            "unsupported Record field type; use bool, i16, i32, i64, f32, f64, String, \
             NaiveDate, NaiveDateTime or an Option of one of them",
        )
    };
    let syn::Type::Path(type_path) = ty else {
        return Err(unsupported());
    };
    let seg = type_path.path.segments.last().ok_or_else(unsupported)?;
    let variant = match seg.ident.to_string().as_str() {
        "bool" => quote!(Bool),
        "i16" | "i32" | "i64" => quote!(Int),
        "f32" | "f64" => quote!(Float),
        "String" => quote!(Text),
        "NaiveDate" => quote!(Date),
        "NaiveDateTime" => quote!(Timestamp),
        _ => return Err(unsupported()),
    };
    Ok(quote!(::lazyorm::FieldType::#variant))
}

pub fn expand(input: DeriveInput) -> Result<TokenStream> {
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    &input,
                    "Record can only be derived for structs with named fields",
                ));
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                &input,
                "Record can only be derived for structs",
            ));
        }
    };
    if fields.is_empty() {
        return Err(syn::Error::new_spanned(
            &input,
            "Record needs at least one field",
        ));
    }

    let attrs = struct_attrs(&input)?;
    let table = attrs
        .table
        .unwrap_or_else(|| name.to_string().to_snake_case());
    let model = attrs.model.unwrap_or_else(|| name.to_string());

    let mut descriptors = Vec::with_capacity(fields.len());
    let mut takes = Vec::with_capacity(fields.len());
    let mut values = Vec::with_capacity(fields.len());

    for (ordinal, field) in fields.iter().enumerate() {
        let Some(ident) = field.ident.as_ref() else {
            continue;
        };
        let column = match column_name(field)? {
            Some(column) => column,
            None => ident.to_string(),
        };
        let (ty, nullable) = match option_inner(&field.ty) {
            Some(inner) => (inner, true),
            None => (&field.ty, false),
        };
        let field_type = field_type(ty)?;

        descriptors.push(if nullable {
            quote!(::lazyorm::Field::new(#ordinal, #column, #field_type).nullable())
        } else {
            quote!(::lazyorm::Field::new(#ordinal, #column, #field_type))
        });
        takes.push(quote!(#ident: row.take(#ordinal)?));
        values.push(quote!(::lazyorm::Value::from(::core::clone::Clone::clone(&self.#ident))));
    }

    Ok(quote! {
        impl #impl_generics ::lazyorm::Record for #name #ty_generics #where_clause {
            const MODEL: &'static str = #model;
            const TABLE: &'static str = #table;

            fn fields() -> &'static [::lazyorm::Field] {
                const FIELDS: &[::lazyorm::Field] = &[#(#descriptors),*];
                FIELDS
            }

            fn from_row(mut row: ::lazyorm::MappedRow) -> ::lazyorm::OrmResult<Self> {
                Ok(Self {
                    #(#takes),*
                })
            }
        }

        impl #impl_generics ::lazyorm::ToValues for #name #ty_generics #where_clause {
            fn to_values(&self) -> ::std::vec::Vec<::lazyorm::Value> {
                ::std::vec![#(#values),*]
            }
        }
    })
}
