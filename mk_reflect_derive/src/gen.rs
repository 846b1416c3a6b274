//! Composable code generation steps for the derive.
//!
//! Each step implements `CodeGen<Input>`; `Chain<A, B>` runs both and
//! concatenates the token streams, so an expansion reads as a type:
//!
//! ```ignore
//! type Full = Chain<DeclModuleGen, Chain<TraitImplGen, InherentGen>>;
//! let tokens = Full::generate(&input);
//! ```

use proc_macro2::TokenStream as TokenStream2;

pub trait CodeGen<Input> {
    type Output;
    fn generate(input: &Input) -> Self::Output;
}

pub struct Chain<A, B>(core::marker::PhantomData<(A, B)>);

impl<Input, A, B> CodeGen<Input> for Chain<A, B>
where
    A: CodeGen<Input, Output = TokenStream2>,
    B: CodeGen<Input, Output = TokenStream2>,
{
    type Output = TokenStream2;
    fn generate(input: &Input) -> Self::Output {
        let a = A::generate(input);
        let b = B::generate(input);
        quote::quote! { #a #b }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quote::quote;

    struct Named(&'static str);

    struct FnGen;
    impl CodeGen<Named> for FnGen {
        type Output = TokenStream2;
        fn generate(n: &Named) -> Self::Output {
            let ident = proc_macro2::Ident::new(n.0, proc_macro2::Span::call_site());
            quote! { fn #ident() {} }
        }
    }

    struct ConstGen;
    impl CodeGen<Named> for ConstGen {
        type Output = TokenStream2;
        fn generate(n: &Named) -> Self::Output {
            let s = n.0;
            quote! { const NAME: &str = #s; }
        }
    }

    #[test]
    fn chain_keeps_order() {
        type Both = Chain<FnGen, ConstGen>;
        let s = Both::generate(&Named("decl")).to_string();
        let f = s.find("fn decl").unwrap();
        let c = s.find("const NAME").unwrap();
        assert!(f < c, "{s}");
    }
}
