//! Procedural macros used by the `pushdown-agg`

use proc_macro::TokenStream;
use quote::quote;
use syn::{Data, DeriveInput, Fields, parse_macro_input};

/// Derive the `metrics_set` method for the struct whose fields are metrics.
///
/// Each field should be a type defined in `crate::exec::physical_operator::metric`
/// that has a `value()` method, the type name is the variant of the `MetricValue`.
/// The generated `MetricsSet` is keyed by the field names
#[proc_macro_derive(MetricsSetBuilder)]
pub fn metrics_set_derive(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    let name = input.ident;

    let insert_metrics = match insert_metrics(&input.data) {
        Ok(tokens) => tokens,
        Err(err) => return err.to_compile_error().into(),
    };

    let expanded = quote!(
        impl #name {
            fn metrics_set(&self) -> crate::exec::physical_operator::metric::MetricsSet {
                let mut metrics = std::collections::BTreeMap::new();
                #insert_metrics
                crate::exec::physical_operator::metric::MetricsSet {
                    name: stringify!(#name),
                    metrics,
                }
            }
        }
    );

    expanded.into()
}

fn insert_metrics(data: &Data) -> syn::Result<proc_macro2::TokenStream> {
    let error_message = "MetricsSetBuilder can only be derived for structs with named fields";
    match data {
        Data::Struct(ds) => match &ds.fields {
            Fields::Named(fields) => {
                let inserts = fields.named.iter().filter_map(|f| {
                    let field_name = f.ident.as_ref()?;
                    let f_ty = &f.ty;
                    Some(quote! {
                        metrics.insert(
                            stringify!(#field_name),
                            crate::exec::physical_operator::metric::MetricValue::#f_ty(self.#field_name.value()),
                        );
                    })
                });
                Ok(quote! {
                    #(#inserts)*
                })
            }
            fields => Err(syn::Error::new_spanned(fields, error_message)),
        },
        Data::Enum(de) => Err(syn::Error::new_spanned(de.enum_token, error_message)),
        Data::Union(du) => Err(syn::Error::new_spanned(du.union_token, error_message)),
    }
}
