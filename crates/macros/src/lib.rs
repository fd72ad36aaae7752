/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/

use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, ItemEnum, ItemFn, ReturnType};

/// Wraps an async function and emits a `debug!` event with its wall-clock duration.
///
/// Visibility, generics and the where-clause of the annotated function are kept as written.
#[proc_macro_attribute]
pub fn measure_duration(_: TokenStream, input: TokenStream) -> TokenStream {
    let ItemFn {
        attrs,
        vis,
        sig,
        block,
    } = parse_macro_input!(input as ItemFn);

    if sig.asyncness.is_none() {
        return syn::Error::new_spanned(sig.fn_token, "measure_duration expects an async fn")
            .to_compile_error()
            .into();
    }

    let fn_name = &sig.ident;
    let result_type = match &sig.output {
        ReturnType::Default => quote! { () },
        ReturnType::Type(_, ty) => quote! { #ty },
    };

    let expanded = quote! {
        #(#attrs)*
        #vis #sig {
            let start_time = std::time::Instant::now();
            let result: #result_type = async move {
                let output: #result_type = #block;
                output
            }
            .await;
            let elapsed_ms = start_time.elapsed().as_millis();
            ::tracing::debug!(tag = "[Duration]", function = stringify!(#fn_name), duration_ms = %elapsed_ms);
            result
        }
    };

    TokenStream::from(expanded)
}

/// Derives `Debug`, `Serialize` and `thiserror::Error` for an error enum, giving every
/// variant a SCREAMING_SNAKE_CASE display string.
///
/// `serde::Serialize` has to be in scope at the call site.
#[proc_macro_attribute]
pub fn add_error(_: TokenStream, input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as ItemEnum);
    let enum_name = &input.ident;
    let vis = &input.vis;
    let attrs = &input.attrs;

    let variants = input.variants.iter().map(|variant| {
        let variant_screaming_snake_case = convert_to_snake_case(variant.ident.to_string());
        quote! {
            #[error(#variant_screaming_snake_case)]
            #variant,
        }
    });

    let expanded = quote! {
        #(#attrs)*
        #[derive(Debug, Serialize, thiserror::Error)]
        #vis enum #enum_name {
            #(#variants)*
        }
    };

    TokenStream::from(expanded)
}

fn convert_to_snake_case(input: String) -> String {
    let mut result = String::new();
    let mut last_char_was_upper = false;

    for c in input.chars() {
        if c.is_uppercase() {
            if !last_char_was_upper && !result.is_empty() {
                result.push('_');
            }
            last_char_was_upper = true;
        } else {
            last_char_was_upper = false;
        }
        result.push(c.to_ascii_uppercase());
    }

    result
}

#[cfg(test)]
mod tests {
    use super::convert_to_snake_case;

    #[test]
    fn screaming_snake_case_codes() {
        assert_eq!(
            convert_to_snake_case("OrderNotFound".to_string()),
            "ORDER_NOT_FOUND"
        );
        assert_eq!(
            convert_to_snake_case("ExternalAPICallError".to_string()),
            "EXTERNAL_APICALL_ERROR"
        );
        assert_eq!(convert_to_snake_case("RequestTimeout".to_string()), "REQUEST_TIMEOUT");
    }
}
