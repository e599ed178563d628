extern crate proc_macro;

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use syn::{Data, DeriveInput, Ident};

/// Collect the variant names of a fieldless enum, or produce a compile error pointing at the
/// offending item.
fn fieldless_variants<'a>(
    ast: &'a DeriveInput,
    macro_name: &str,
) -> Result<Vec<&'a Ident>, syn::Error> {
    let Data::Enum(data) = &ast.data else {
        return Err(syn::Error::new_spanned(
            &ast.ident,
            format!("{macro_name} can only be derived for enums"),
        ));
    };

    data.variants
        .iter()
        .map(|variant| {
            if variant.fields.is_empty() {
                Ok(&variant.ident)
            } else {
                Err(syn::Error::new_spanned(
                    variant,
                    format!("{macro_name} only supports fieldless variants"),
                ))
            }
        })
        .collect()
}

fn expand(
    input: TokenStream,
    f: impl FnOnce(&DeriveInput) -> Result<TokenStream2, syn::Error>,
) -> TokenStream {
    let ast: DeriveInput = match syn::parse(input) {
        Ok(ast) => ast,
        Err(err) => return err.to_compile_error().into(),
    };

    match f(&ast) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

/// Implement `std::fmt::Display` for a fieldless enum, writing each variant's name.
#[proc_macro_derive(EnumDisplay)]
pub fn enum_display(input: TokenStream) -> TokenStream {
    expand(input, |ast| {
        let name = &ast.ident;
        let variants = fieldless_variants(ast, "EnumDisplay")?;
        let names = variants.iter().map(ToString::to_string);

        Ok(quote! {
            impl std::fmt::Display for #name {
                fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                    let s = match self {
                        #(Self::#variants => #names,)*
                    };
                    f.write_str(s)
                }
            }
        })
    })
}

/// Implement `std::str::FromStr` for a fieldless enum with `Err = String`. Matching ignores ASCII
/// case, and also ignores `-` and `_` so that `mr-do`, `mr_do` and `MrDo` all parse.
#[proc_macro_derive(EnumFromStr)]
pub fn enum_from_str(input: TokenStream) -> TokenStream {
    expand(input, |ast| {
        let name = &ast.ident;
        let variants = fieldless_variants(ast, "EnumFromStr")?;
        let keys = variants.iter().map(|variant| variant.to_string().to_ascii_lowercase());

        let err_fmt_string = format!("invalid {name} string: '{{}}'");
        Ok(quote! {
            impl std::str::FromStr for #name {
                type Err = String;

                fn from_str(s: &str) -> Result<Self, Self::Err> {
                    let normalized: String = s
                        .chars()
                        .filter(|&c| c != '-' && c != '_')
                        .map(|c| c.to_ascii_lowercase())
                        .collect();
                    match normalized.as_str() {
                        #(#keys => Ok(Self::#variants),)*
                        _ => Err(format!(#err_fmt_string, s)),
                    }
                }
            }
        })
    })
}

/// Implement `serde::Serialize` by serializing the `Display` output as a string.
#[proc_macro_derive(StrSerialize)]
pub fn str_serialize(input: TokenStream) -> TokenStream {
    expand(input, |ast| {
        let ident = &ast.ident;

        Ok(quote! {
            impl serde::Serialize for #ident {
                fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
                where
                    S: serde::Serializer,
                {
                    serializer.collect_str(self)
                }
            }
        })
    })
}

/// Implement `serde::Deserialize` by parsing a string with the type's `FromStr` impl.
#[proc_macro_derive(StrDeserialize)]
pub fn str_deserialize(input: TokenStream) -> TokenStream {
    expand(input, |ast| {
        let ident = &ast.ident;
        let visitor = format_ident!("__{}StrVisitor", ident);
        let expecting = format!("a string naming a {ident}");

        Ok(quote! {
            struct #visitor;

            impl<'de> serde::de::Visitor<'de> for #visitor {
                type Value = #ident;

                fn expecting(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                    formatter.write_str(#expecting)
                }

                fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
                where
                    E: serde::de::Error,
                {
                    v.parse().map_err(E::custom)
                }
            }

            impl<'de> serde::Deserialize<'de> for #ident {
                fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
                where
                    D: serde::Deserializer<'de>,
                {
                    deserializer.deserialize_str(#visitor)
                }
            }
        })
    })
}
