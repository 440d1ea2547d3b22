use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use syn::{parse_macro_input, spanned::Spanned, FnArg, Ident, ItemFn, Pat, Signature, Type};

/// Transform an asynchronous test into a `#[rocket::async_test]` running
/// against a fresh in-memory store, and inject dependencies.
///
/// Injectable dependencies are [`rocket::local::asynchronous::Client`] and
/// `crate::store::Storage`, both backed by the same store.
///
/// An optional argument logs the client in before the test starts, as one of
/// `admin` (global), `local_admin` or `voter`. The user is created from the
/// matching `UserSpec` example.
#[proc_macro_attribute]
pub fn backend_test(args: TokenStream, input: TokenStream) -> TokenStream {
    let mut item_fn = parse_macro_input!(input as ItemFn);

    // Extract the arguments to inject and reject invalid function signatures.
    let test_args = match check_sig(item_fn.sig.clone()) {
        Ok(args) => args,
        Err(err) => {
            return err.into_compile_error().into();
        }
    };

    // Rename the future so the test can have its original name.
    let name = item_fn.sig.ident.clone();
    let new_name = format_ident!("{}_fut", name);
    item_fn.sig.ident = new_name.clone();

    // Log in the client as the requested user if needed.
    let login = parse_macro_input!(args as Option<Ident>);
    let example = match login.as_ref().map(Ident::to_string).as_deref() {
        None => None,
        Some("admin") => Some(quote! { global_admin_example }),
        Some("local_admin") => Some(quote! { local_admin_example }),
        Some("voter") => Some(quote! { voter_example }),
        Some(_) => {
            return syn::Error::new(
                login.span(),
                "Expected one of `admin`, `local_admin` or `voter`",
            )
            .into_compile_error()
            .into();
        }
    };
    let maybe_login = example
        .map(|example| {
            quote! {
                {
                let spec = crate::model::api::user::UserSpec::#example();
                let user = crate::model::db::user::NewUser::try_from(spec.clone()).unwrap();
                storage.upsert_user(&user).await.unwrap();

                let response = rocket_client
                    .post(uri!(crate::api::auth::login))
                    .header(rocket::http::ContentType::JSON)
                    .body(rocket::serde::json::json!(spec.credentials()).to_string())
                    .dispatch()
                    .await;
                assert_eq!(rocket::http::Status::Ok, response.status());
                }
            }
        })
        .unwrap_or_default();

    // Rewrite the test function.
    quote! {
        #[rocket::async_test]
        async fn #name() {
            /// The test itself.
            #item_fn

            log4rs_test_utils::test_logging::init_logging_once_for(
                ["instapoll_backend"],
                None,
                None,
            );

            let storage = crate::store::Storage::new(crate::store::MemoryStore::default());
            let rocket_client = rocket::local::asynchronous::Client::tracked(
                crate::rocket_for_storage(storage.clone()),
            )
            .await
            .unwrap();

            #maybe_login

            #new_name(#(#test_args),*).await;
        }
    }
    .into()
}

/// Ensure the wrapped test is async, extract parameters to inject, and reject unknown parameters.
fn check_sig(sig: Signature) -> Result<Vec<TokenStream2>, syn::Error> {
    if sig.asyncness.is_none() {
        return Err(syn::Error::new(sig.span(), "Test must be marked `async`"));
    }

    let mut has_client = false;
    let mut has_storage = false;
    let mut args = vec![];

    for input in &sig.inputs {
        if let FnArg::Typed(pat_type) = input {
            if let Pat::Ident(_) = &*pat_type.pat {
                if let Type::Path(type_path) = &*pat_type.ty {
                    // Valid as the last path segment for any type is itself.
                    let type_ident = &type_path.path.segments.last().unwrap().ident;
                    if type_ident == "Client" {
                        if has_client {
                            return Err(syn::Error::new(input.span(), "Test cannot accept more than one `rocket::local::asynchronous::Client`"));
                        }
                        has_client = true;
                        args.push(quote! { rocket_client });
                        continue;
                    } else if type_ident == "Storage" {
                        if has_storage {
                            return Err(syn::Error::new(
                                input.span(),
                                "Test cannot accept more than one `Storage`",
                            ));
                        }
                        has_storage = true;
                        args.push(quote! { storage });
                        continue;
                    }
                }
            }
        }

        return Err(syn::Error::new(
            input.span(),
            "Expected one of `client_ident: Client` or `storage_ident: Storage`",
        ));
    }

    Ok(args)
}
