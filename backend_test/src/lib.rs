use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use syn::{parse_macro_input, spanned::Spanned, FnArg, Ident, ItemFn, Pat, Signature, Type};

/// Transform an asynchronous test into a synchronous one running against a fresh
/// ledger and in-memory index, and inject dependencies.
///
/// Injectable dependencies are [`rocket::local::asynchronous::Client`],
/// [`crate::ledger::LedgerClient`] and [`crate::model::index::Index`], all sharing
/// the same state.
///
/// With an argument of `root`, `admin` or `user`, the client is signed in as the
/// matching test wallet first. `admin` and `user` wallets are registered on the
/// ledger with that role.
#[proc_macro_attribute]
pub fn backend_test(args: TokenStream, input: TokenStream) -> TokenStream {
    let mut item_fn = parse_macro_input!(input as ItemFn);

    // Extract type information and reject invalid function signatures.
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

    // Sign the client in if needed.
    let login = match parse_macro_input!(args as Option<Ident>) {
        None => quote! {},
        Some(arg) if arg == "root" => quote! {
            crate::testing::login(
                &rocket_client,
                &crate::model::auth::examples::TestWallet::root(),
            )
            .await;
        },
        Some(arg) if arg == "admin" || arg == "user" => {
            let (wallet, role) = if arg == "admin" {
                (quote! { admin }, quote! { Admin })
            } else {
                (quote! { user }, quote! { User })
            };
            let name = arg.to_string();
            quote! {
                let wallet = crate::model::auth::examples::TestWallet::#wallet();
                crate::testing::enrol(
                    &ledger,
                    &wallet,
                    #name,
                    crate::model::role::SystemRole::#role,
                )
                .await;
                crate::testing::login(&rocket_client, &wallet).await;
            }
        }
        Some(arg) => {
            return syn::Error::new(arg.span(), "Expected one of `root`, `admin` or `user`")
                .into_compile_error()
                .into();
        }
    };

    // Rewrite the test function.
    quote! {
        #[test]
        fn #name() {
            /// Test setup.
            async fn setup() -> (
                rocket::local::asynchronous::Client,
                crate::ledger::LedgerClient,
                crate::model::index::Index,
            ) {
                let (ledger, index) = crate::testing::ledger_and_index();
                let rocket = crate::rocket_with(
                    rocket::custom(crate::config::test_figment()),
                    ledger.clone(),
                    index.clone(),
                );
                let rocket_client = rocket::local::asynchronous::Client::tracked(rocket)
                    .await
                    .unwrap();

                #login

                (rocket_client, ledger, index)
            }

            /// The test itself.
            #item_fn

            let runtime = rocket::tokio::runtime::Builder::new_multi_thread()
                .thread_name("rocket-worker-test-thread")
                .worker_threads(1)
                .enable_all()
                .build()
                .unwrap();

            runtime.block_on(async {
                #[allow(unused_variables)]
                let (rocket_client, ledger, index) = setup().await;
                #new_name(#(#test_args),*).await;
            });
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
    let mut has_ledger = false;
    let mut has_index = false;
    let mut args = vec![];

    for input in &sig.inputs {
        if let FnArg::Typed(pat_type) = input {
            if let (Pat::Ident(_), Type::Path(type_path)) = (&*pat_type.pat, &*pat_type.ty) {
                // Valid as the last path segment for any type is itself.
                if let Some(segment) = type_path.path.segments.last() {
                    let (seen, injected, full_name) = if segment.ident == "Client" {
                        (
                            &mut has_client,
                            quote! { rocket_client },
                            "rocket::local::asynchronous::Client",
                        )
                    } else if segment.ident == "LedgerClient" {
                        (&mut has_ledger, quote! { ledger.clone() }, "LedgerClient")
                    } else if segment.ident == "Index" {
                        (&mut has_index, quote! { index.clone() }, "Index")
                    } else {
                        return Err(unexpected(input));
                    };
                    if *seen {
                        return Err(syn::Error::new(
                            input.span(),
                            format!("Test cannot accept more than one `{full_name}`"),
                        ));
                    }
                    *seen = true;
                    args.push(injected);
                    continue;
                }
            }
        }

        return Err(unexpected(input));
    }

    Ok(args)
}

fn unexpected(input: &FnArg) -> syn::Error {
    syn::Error::new(
        input.span(),
        "Expected one of `client_ident: Client`, `ledger_ident: LedgerClient` or `index_ident: Index`",
    )
}
