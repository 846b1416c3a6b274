use proc_macro2::{Ident, Span, TokenStream as TokenStream2};
use quote::{quote, ToTokens};
use syn::ext::IdentExt;
use syn::{Data, DeriveInput, Fields};

use crate::attrs::Level;
use crate::gen::{Chain, CodeGen};

mod attrs;
mod gen;

/// Generate a `proc_macro_derive` entry point that forwards to a
/// `fn(DeriveInput) -> syn::Result<TokenStream2>` handler.
macro_rules! derive_entry {
    ($name:ident, attrs = [ $( $attr:ident ),* $(,)? ], handler = $handler:path) => {
        #[allow(non_snake_case)]
        #[proc_macro_derive($name, attributes( $( $attr ),* ))]
        pub fn $name(input: ::proc_macro::TokenStream) -> ::proc_macro::TokenStream {
            let di: ::syn::DeriveInput = ::syn::parse_macro_input!(input as ::syn::DeriveInput);
            match $handler(di) {
                Ok(ts) => ts.into(),
                Err(e) => e.to_compile_error().into(),
            }
        }
    };
}

derive_entry!(MkStruct, attrs = [mk], handler = expand_mk_struct);

struct FieldRec { name: String, rust_type: String, annotations: Vec<String> }

struct DeclInput {
    input: DeriveInput,
    mod_ident: Ident,
    annotations: Vec<String>,
    fields: Vec<FieldRec>,
}

fn expand_mk_struct(input: DeriveInput) -> syn::Result<TokenStream2> {
    let st = match &input.data {
        Data::Struct(st) => st,
        _ => return Err(syn::Error::new(input.ident.span(), "MkStruct expects a struct")),
    };
    let mut fields = Vec::new();
    match &st.fields {
        Fields::Named(named) => {
            for f in &named.named {
                let Some(ident) = f.ident.as_ref() else { continue };
                fields.push(FieldRec {
                    name: ident.unraw().to_string(),
                    rust_type: f.ty.to_token_stream().to_string(),
                    annotations: attrs::collect(&f.attrs, Level::Field)?,
                });
            }
        }
        Fields::Unnamed(_) => {
            return Err(syn::Error::new(input.ident.span(), "MkStruct expects a struct with named fields"));
        }
        Fields::Unit => {}
    }
    let annotations = attrs::collect(&input.attrs, Level::Type)?;
    let mod_ident = Ident::new(&format!("__mk_decl_{}", input.ident.unraw()), Span::call_site());

    type Full = Chain<DeclModuleGen, Chain<TraitImplGen, InherentGen>>;
    Ok(Full::generate(&DeclInput { input, mod_ident, annotations, fields }))
}

/// Private module holding the `StaticStruct`.
struct DeclModuleGen;
impl CodeGen<DeclInput> for DeclModuleGen {
    type Output = TokenStream2;
    fn generate(i: &DeclInput) -> Self::Output {
        let mod_ident = &i.mod_ident;
        let name = i.input.ident.unraw().to_string();
        let annotations = &i.annotations;
        let fields = i.fields.iter().map(|f| {
            let FieldRec { name, rust_type, annotations } = f;
            quote! {
                ::mk_reflect::StaticField { name: #name, rust_type: #rust_type, annotations: &[ #( #annotations ),* ] }
            }
        });
        quote! {
            #[doc(hidden)]
            #[allow(non_snake_case, non_upper_case_globals)]
            mod #mod_ident {
                pub static DECL: ::mk_reflect::StaticStruct = ::mk_reflect::StaticStruct {
                    name: #name,
                    annotations: &[ #( #annotations ),* ],
                    fields: &[ #( #fields ),* ],
                };
            }
        }
    }
}

struct TraitImplGen;
impl CodeGen<DeclInput> for TraitImplGen {
    type Output = TokenStream2;
    fn generate(i: &DeclInput) -> Self::Output {
        let ident = &i.input.ident;
        let mod_ident = &i.mod_ident;
        let (impl_g, ty_g, where_c) = i.input.generics.split_for_impl();
        quote! {
            impl #impl_g ::mk_reflect::MkReflect for #ident #ty_g #where_c {
                fn mk_decl() -> &'static ::mk_reflect::StaticStruct { &#mod_ident::DECL }
            }
        }
    }
}

struct InherentGen;
impl CodeGen<DeclInput> for InherentGen {
    type Output = TokenStream2;
    fn generate(i: &DeclInput) -> Self::Output {
        let ident = &i.input.ident;
        let mod_ident = &i.mod_ident;
        let (impl_g, ty_g, where_c) = i.input.generics.split_for_impl();
        quote! {
            impl #impl_g #ident #ty_g #where_c {
                pub fn describe_mk() -> &'static ::mk_reflect::StaticStruct { &#mod_ident::DECL }
            }
        }
    }
}
