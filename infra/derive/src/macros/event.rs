use proc_macro2::TokenStream;
use quote::quote;
use syn::spanned::Spanned;
use syn::{Data, DeriveInput, Fields, Member, Path};

#[derive(Default)]
struct EventArgs {
    cancelable: bool,
    markers: Vec<Path>,
}

/// Expands `#[derive(Event)]`.
///
/// Struct-level `#[event(cancelable, marker = Trait)]` and field-level
/// `#[event(canceled)]` / `#[event(generic)]` drive the generated impl.
pub fn expand_derive(input: DeriveInput) -> TokenStream {
    match expand(&input) {
        Ok(tokens) => tokens,
        Err(err) => err.to_compile_error(),
    }
}

fn expand(input: &DeriveInput) -> syn::Result<TokenStream> {
    let Data::Struct(data) = &input.data else {
        return Err(syn::Error::new_spanned(&input.ident, "Event can only be derived for structs"));
    };

    let mut args = EventArgs::default();
    for attr in input.attrs.iter().filter(|attr| attr.path().is_ident("event")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("cancelable") {
                args.cancelable = true;
                Ok(())
            } else if meta.path.is_ident("marker") {
                args.markers.push(meta.value()?.parse()?);
                Ok(())
            } else {
                Err(meta.error("unsupported event attribute, expected `cancelable` or `marker = Trait`"))
            }
        })?;
    }

    let (canceled, generic) = tagged_fields(&data.fields)?;
    let cancelable = args.cancelable || canceled.is_some();

    let cancel_impl = match (&canceled, cancelable) {
        (Some(member), _) => quote! {
            fn is_cancelable(&self) -> bool { true }
            fn is_canceled(&self) -> bool { self.#member }
            fn set_canceled(
                &mut self,
                canceled: bool,
            ) -> ::core::result::Result<(), ::kff_event_bus::EventBusError> {
                self.#member = canceled;
                Ok(())
            }
        },
        (None, true) => {
            return Err(syn::Error::new_spanned(
                &input.ident,
                "cancelable events need a `bool` field marked with #[event(canceled)]",
            ));
        },
        (None, false) => quote! {},
    };

    let generic_impl = generic.map(|member| {
        quote! {
            fn generic_type(&self) -> ::core::option::Option<::kff_event_bus::EventType> {
                ::core::option::Option::Some(self.#member)
            }
        }
    });

    let markers = &args.markers;
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    // Declared markers must actually be implemented.
    let marker_checks = (!markers.is_empty()).then(|| {
        quote! {
            const _: () = {
                #[allow(dead_code)]
                fn assert_markers #impl_generics () #where_clause {
                    fn implements<T: ?Sized #( + #markers )*>() {}
                    implements::<#name #ty_generics>();
                }
            };
        }
    });

    Ok(quote! {
        #[automatically_derived]
        impl #impl_generics ::kff_event_bus::Event for #name #ty_generics #where_clause {
            #cancel_impl
            #generic_impl

            fn is_marked(marker: &::kff_event_bus::MarkerType) -> bool {
                marker.is_base() #( || marker.is::<dyn #markers>() )*
            }
        }

        #marker_checks
    })
}

fn tagged_fields(fields: &Fields) -> syn::Result<(Option<Member>, Option<Member>)> {
    let mut canceled = None;
    let mut generic = None;

    for (index, field) in fields.iter().enumerate() {
        let member = field.ident.clone().map_or_else(|| Member::from(index), Member::Named);
        for attr in field.attrs.iter().filter(|attr| attr.path().is_ident("event")) {
            attr.parse_nested_meta(|meta| {
                let slot = if meta.path.is_ident("canceled") {
                    &mut canceled
                } else if meta.path.is_ident("generic") {
                    &mut generic
                } else {
                    return Err(meta.error("expected `canceled` or `generic`"));
                };
                if slot.is_some() {
                    return Err(syn::Error::new(field.span(), "event field tagged more than once"));
                }
                *slot = Some(member.clone());
                Ok(())
            })?;
        }
    }

    Ok((canceled, generic))
}
