use proc_macro2::TokenStream;
use quote::{format_ident, quote};
use syn::{
    Attribute, FnArg, Ident, ImplItem, ImplItemFn, ItemImpl, LitBool, Type, TypeReference,
};

struct HandlerSpec {
    ident: Ident,
    event: Type,
    priority: Ident,
    receive_cancelled: bool,
    generic: Option<Type>,
    is_static: bool,
}

/// Expands `#[subscriber]` on an inherent `impl` block into
/// `Subscriber` and `StaticSubscriber` registration tables.
pub fn expand_subscriber(args: TokenStream, mut input: ItemImpl) -> TokenStream {
    if !args.is_empty() {
        return syn::Error::new_spanned(args, "#[subscriber] takes no arguments").to_compile_error();
    }
    if let Some((_, path, _)) = &input.trait_ {
        return syn::Error::new_spanned(
            path,
            "#[subscriber] must be placed on an inherent impl block",
        )
        .to_compile_error();
    }

    let mut handlers = Vec::new();
    let mut errors = TokenStream::new();
    for item in &mut input.items {
        let ImplItem::Fn(method) = item else { continue };
        let Some(position) = method.attrs.iter().position(is_marker) else { continue };
        let marker = method.attrs.remove(position);
        match parse_handler(&marker, method) {
            Ok(spec) => handlers.push(spec),
            Err(err) => errors.extend(err.to_compile_error()),
        }
    }
    if !errors.is_empty() {
        return quote! { #input #errors };
    }

    let self_ty = &input.self_ty;
    let type_name = quote!(#self_ty).to_string().replace(' ', "");
    let (impl_generics, _, where_clause) = input.generics.split_for_impl();

    let instance: Vec<TokenStream> = handlers
        .iter()
        .filter(|h| !h.is_static)
        .map(|h| {
            let ident = &h.ident;
            let event = &h.event;
            let name = format!("{type_name}::{ident}");
            let options = handler_options(h);
            quote! {
                ::kff_event_bus::HandlerMethod::new(#name, |this: &Self, event: &mut #event| this.#ident(event))
                    #options
            }
        })
        .collect();
    let statics: Vec<TokenStream> = handlers
        .iter()
        .filter(|h| h.is_static)
        .map(|h| {
            let ident = &h.ident;
            let event = &h.event;
            let name = format!("{type_name}::{ident}");
            let options = handler_options(h);
            quote! {
                ::kff_event_bus::HandlerMethod::new(#name, |_: &(), event: &mut #event| Self::#ident(event))
                    #options
            }
        })
        .collect();

    // `Subscriber` requires `Send + Sync`, so types with only static handlers must not get it.
    let subscriber_impl = (!instance.is_empty()).then(|| {
        quote! {
            #[automatically_derived]
            impl #impl_generics ::kff_event_bus::Subscriber for #self_ty #where_clause {
                fn handlers() -> ::std::vec::Vec<::kff_event_bus::HandlerMethod<Self>> {
                    ::std::vec![#(#instance),*]
                }
            }
        }
    });
    let static_impl = (!statics.is_empty()).then(|| {
        quote! {
            #[automatically_derived]
            impl #impl_generics ::kff_event_bus::StaticSubscriber for #self_ty #where_clause {
                fn static_handlers() -> ::std::vec::Vec<::kff_event_bus::HandlerMethod<()>> {
                    ::std::vec![#(#statics),*]
                }
            }
        }
    });

    quote! {
        #input
        #subscriber_impl
        #static_impl
    }
}

fn is_marker(attr: &Attribute) -> bool {
    attr.path().is_ident("subscribe_event")
}

fn handler_options(h: &HandlerSpec) -> TokenStream {
    let priority = &h.priority;
    let receive_cancelled = h.receive_cancelled;
    let generic = h.generic.as_ref().map(|ty| {
        quote! { .generic_filter(::kff_event_bus::EventType::of::<#ty>()) }
    });
    quote! {
        .priority(::kff_event_bus::Priority::#priority)
        .receive_cancelled(#receive_cancelled)
        #generic
    }
}

fn parse_handler(marker: &Attribute, method: &ImplItemFn) -> syn::Result<HandlerSpec> {
    let sig = &method.sig;
    let ident = sig.ident.clone();

    if sig.asyncness.is_some() {
        return Err(syn::Error::new_spanned(
            &sig.ident,
            format!("event handler `{ident}` cannot be async; dispatch is synchronous"),
        ));
    }
    if !sig.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &sig.generics,
            format!("event handler `{ident}` cannot be generic"),
        ));
    }

    let is_static = match sig.receiver() {
        None => true,
        Some(receiver) if receiver.reference.is_some() && receiver.mutability.is_none() => false,
        Some(receiver) => {
            return Err(syn::Error::new_spanned(
                receiver,
                format!("event handler `{ident}` must take `&self` (listeners are shared)"),
            ));
        },
    };

    let params: Vec<&Type> = sig
        .inputs
        .iter()
        .filter_map(|arg| match arg {
            FnArg::Typed(pat) => Some(pat.ty.as_ref()),
            FnArg::Receiver(_) => None,
        })
        .collect();
    let [param] = params.as_slice() else {
        return Err(syn::Error::new_spanned(
            &sig.inputs,
            format!(
                "method `{ident}` has #[subscribe_event] but takes {} value parameters; \
                 event handlers require exactly 1",
                params.len()
            ),
        ));
    };
    let Type::Reference(TypeReference { mutability: Some(_), elem, .. }) = param else {
        return Err(syn::Error::new_spanned(
            param,
            format!("method `{ident}` has #[subscribe_event] but does not take `&mut` to an event"),
        ));
    };

    let mut spec = HandlerSpec {
        ident,
        event: elem.as_ref().clone(),
        priority: format_ident!("Normal"),
        receive_cancelled: false,
        generic: None,
        is_static,
    };

    if matches!(marker.meta, syn::Meta::Path(_)) {
        return Ok(spec);
    }
    marker.parse_nested_meta(|meta| {
        if meta.path.is_ident("priority") {
            let value: Ident = meta.value()?.parse()?;
            spec.priority = priority_variant(&value)?;
        } else if meta.path.is_ident("receive_cancelled") {
            spec.receive_cancelled = if meta.input.peek(syn::Token![=]) {
                meta.value()?.parse::<LitBool>()?.value
            } else {
                true
            };
        } else if meta.path.is_ident("generic") {
            spec.generic = Some(meta.value()?.parse()?);
        } else {
            return Err(meta.error("expected `priority`, `receive_cancelled` or `generic`"));
        }
        Ok(())
    })?;

    Ok(spec)
}

fn priority_variant(value: &Ident) -> syn::Result<Ident> {
    let variant = match value.to_string().to_ascii_lowercase().as_str() {
        "highest" => "Highest",
        "high" => "High",
        "normal" => "Normal",
        "low" => "Low",
        "lowest" => "Lowest",
        _ => {
            return Err(syn::Error::new_spanned(
                value,
                "unknown priority, expected one of Highest, High, Normal, Low, Lowest",
            ));
        },
    };
    Ok(Ident::new(variant, value.span()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use syn::parse_quote;

    fn expand(input: ItemImpl) -> String {
        expand_subscriber(TokenStream::new(), input).to_string()
    }

    #[test]
    fn collects_instance_and_static_handlers() {
        let expanded = expand(parse_quote! {
            impl Watcher {
                #[subscribe_event(priority = HIGH, receive_cancelled)]
                fn on_chat(&self, event: &mut ChatEvent) {}

                #[subscribe_event]
                fn on_tick(event: &mut TickEvent) {}

                fn helper(&self) {}
            }
        });
        assert!(expanded.contains("\"Watcher::on_chat\""));
        assert!(expanded.contains("Priority :: High"));
        assert!(expanded.contains("receive_cancelled (true)"));
        assert!(expanded.contains("Self :: on_tick (event)"));
        assert!(!expanded.contains("subscribe_event"));
        assert!(!expanded.contains("compile_error"));
    }

    #[test]
    fn generic_filter_is_forwarded() {
        let expanded = expand(parse_quote! {
            impl Watcher {
                #[subscribe_event(generic = Block)]
                fn on_registry(&self, event: &mut RegistryEvent) {}
            }
        });
        assert!(expanded.contains("generic_filter (:: kff_event_bus :: EventType :: of :: < Block > ())"));
    }

    #[test]
    fn emits_only_the_tables_that_have_handlers() {
        let statics_only = expand(parse_quote! {
            impl Announcer {
                #[subscribe_event]
                fn on_tick(event: &mut TickEvent) {}
            }
        });
        assert!(statics_only.contains("StaticSubscriber for Announcer"));
        assert!(!statics_only.contains(":: Subscriber for"));

        let instance_only = expand(parse_quote! {
            impl Watcher {
                #[subscribe_event]
                fn on_tick(&self, event: &mut TickEvent) {}
            }
        });
        assert!(instance_only.contains(":: Subscriber for Watcher"));
        assert!(!instance_only.contains("StaticSubscriber"));
    }

    #[test]
    fn rejects_wrong_arity() {
        let expanded = expand(parse_quote! {
            impl Watcher {
                #[subscribe_event]
                fn on_pair(&self, a: &mut ChatEvent, b: &mut ChatEvent) {}
            }
        });
        assert!(expanded.contains("compile_error"));
        assert!(expanded.contains("on_pair"));
        assert!(expanded.contains("takes 2 value parameters"));
    }

    #[test]
    fn rejects_non_event_parameter() {
        let expanded = expand(parse_quote! {
            impl Watcher {
                #[subscribe_event]
                fn on_text(&self, text: String) {}
            }
        });
        assert!(expanded.contains("compile_error"));
        assert!(expanded.contains("on_text"));
    }

    #[test]
    fn rejects_mutable_receiver() {
        let expanded = expand(parse_quote! {
            impl Watcher {
                #[subscribe_event]
                fn on_chat(&mut self, event: &mut ChatEvent) {}
            }
        });
        assert!(expanded.contains("must take `&self`"));
    }

    #[test]
    fn rejects_unknown_priority() {
        let expanded = expand(parse_quote! {
            impl Watcher {
                #[subscribe_event(priority = Urgent)]
                fn on_chat(&self, event: &mut ChatEvent) {}
            }
        });
        assert!(expanded.contains("unknown priority"));
    }

    #[test]
    fn rejects_trait_impls() {
        let expanded = expand(parse_quote! {
            impl Listener for Watcher {}
        });
        assert!(expanded.contains("inherent impl block"));
    }
}
