use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, Attribute, Data, DeriveInput, Fields, LitStr};

/// Derive macro for row scan destinations.
///
/// Generates a `rowmap_api::scan::Scan` impl: the static field table used by
/// the engine's structure cache, and the binder that hands out one decode slot
/// per field for every scanned row.
///
/// The struct must implement `Default` (every row starts from a default instance).
///
/// # Example
///
/// ```ignore
/// #[derive(Scan, Default)]
/// pub struct Person {
///     #[db(rename = "id")]
///     pub person_id: i64,
///
///     pub name: String,
///
///     #[db(flatten)]
///     pub address: Address,
///
///     #[db(skip)]
///     pub cached_label: String,
/// }
/// ```
///
/// Field attributes: `rename = "..."` (column name used verbatim), `skip`,
/// `flatten` (nested struct whose fields are matched as if declared inline).
///
/// Container attribute `#[db(decode)]`: the type implements `Decode` itself
/// and is scanned as a single value. Required for enums.
#[proc_macro_derive(Scan, attributes(db))]
pub fn derive_scan(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match derive_impl(&input) {
        Ok(tokens) => tokens,
        Err(e) => e.to_compile_error().into(),
    }
}

#[derive(Default)]
struct FieldAttrs {
    rename: Option<String>,
    skip: bool,
    flatten: bool,
}

fn derive_impl(input: &DeriveInput) -> Result<TokenStream, syn::Error> {
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    if container_decode(&input.attrs)? {
        let expanded = quote! {
            impl #impl_generics rowmap_api::scan::Scan for #name #ty_generics #where_clause {
                const KIND: rowmap_api::scan::ScanKind = rowmap_api::scan::ScanKind::Decoder;

                fn layout() -> rowmap_api::scan::Layout {
                    rowmap_api::scan::Layout::Decoder {
                        type_name: ::std::any::type_name::<Self>(),
                    }
                }

                fn bind_fields<'__a>(&'__a mut self, _binder: &mut rowmap_api::scan::Binder<'__a>) {}

                fn as_decode(&mut self) -> Option<&mut dyn rowmap_api::decode::Decode> {
                    Some(self)
                }
            }
        };
        return Ok(TokenStream::from(expanded));
    }

    let fields: Vec<&syn::Field> = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => fields.named.iter().collect(),
            Fields::Unit => Vec::new(),
            Fields::Unnamed(_) => {
                return Err(syn::Error::new_spanned(
                    name,
                    "Scan only supports structs with named fields",
                ))
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                name,
                "Scan only supports structs; use #[db(decode)] with a Decode impl for other types",
            ))
        }
    };

    let mut field_def_tokens = Vec::new();
    let mut bind_tokens = Vec::new();

    for field in fields {
        let field_name = field.ident.as_ref().ok_or_else(|| {
            syn::Error::new_spanned(field, "expected named field")
        })?;
        let field_name_str = field_name.to_string();
        let field_name_str = field_name_str.strip_prefix("r#").unwrap_or(&field_name_str);
        let field_ty = &field.ty;

        let attrs = field_attrs(field)?;

        if attrs.skip && (attrs.flatten || attrs.rename.is_some()) {
            return Err(syn::Error::new_spanned(
                field_name,
                "#[db(skip)] cannot be combined with rename or flatten",
            ));
        }
        if attrs.flatten && attrs.rename.is_some() {
            return Err(syn::Error::new_spanned(
                field_name,
                "#[db(flatten)] fields have no column name of their own; remove rename",
            ));
        }

        let rename_expr = match &attrs.rename {
            Some(rename) => quote! { Some(#rename) },
            None => quote! { None },
        };
        let kind_expr = if attrs.flatten {
            quote! {
                rowmap_api::scan::FieldKind::Flatten(
                    <#field_ty as rowmap_api::scan::Scan>::layout
                )
            }
        } else {
            quote! { rowmap_api::scan::FieldKind::Value }
        };
        let skip = attrs.skip;

        field_def_tokens.push(quote! {
            rowmap_api::scan::FieldDef {
                name: #field_name_str,
                rename: #rename_expr,
                skip: #skip,
                kind: #kind_expr,
            }
        });

        if attrs.skip {
            continue;
        }
        bind_tokens.push(if attrs.flatten {
            quote! { __binder.flatten(&mut self.#field_name); }
        } else {
            quote! { __binder.field(&mut self.#field_name); }
        });
    }

    let expanded = quote! {
        impl #impl_generics rowmap_api::scan::Scan for #name #ty_generics #where_clause {
            const KIND: rowmap_api::scan::ScanKind = rowmap_api::scan::ScanKind::Composite;

            fn layout() -> rowmap_api::scan::Layout {
                rowmap_api::scan::Layout::Composite {
                    type_name: ::std::any::type_name::<Self>(),
                    fields: vec![
                        #(#field_def_tokens),*
                    ],
                }
            }

            #[allow(unused_variables)]
            fn bind_fields<'__a>(&'__a mut self, __binder: &mut rowmap_api::scan::Binder<'__a>) {
                #(#bind_tokens)*
            }

            fn as_decode(&mut self) -> Option<&mut dyn rowmap_api::decode::Decode> {
                None
            }
        }
    };

    Ok(TokenStream::from(expanded))
}

/// `#[db(decode)]` on the type itself.
fn container_decode(attrs: &[Attribute]) -> Result<bool, syn::Error> {
    let mut decode = false;
    for attr in attrs {
        if !attr.path().is_ident("db") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("decode") {
                decode = true;
                Ok(())
            } else {
                Err(meta.error("unknown container attribute (expected `decode`)"))
            }
        })?;
    }
    Ok(decode)
}

/// Parse `#[db(...)]` on a field.
fn field_attrs(field: &syn::Field) -> Result<FieldAttrs, syn::Error> {
    let mut out = FieldAttrs::default();
    for attr in &field.attrs {
        if !attr.path().is_ident("db") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("rename") {
                let value: LitStr = meta.value()?.parse()?;
                out.rename = Some(value.value());
            } else if meta.path.is_ident("skip") {
                out.skip = true;
            } else if meta.path.is_ident("flatten") {
                out.flatten = true;
            } else {
                return Err(meta.error(
                    "unknown field attribute (expected `rename`, `skip` or `flatten`)",
                ));
            }
            Ok(())
        })?;
    }
    Ok(out)
}
