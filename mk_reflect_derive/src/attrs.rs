//! `#[mk(...)]` attribute parsing.
//!
//! Type level: `#[mk(tag = "vertex")]` becomes `mk::struct(tag=vertex)`; any
//! `name(k = v, ..)` item becomes `mk::name(k=v,..)`.
//! Field level: only `name(..)` / `name` items, e.g.
//! `#[mk(vertex(location = 1, format = "vec3"))]`.

use mk_reflect::annotation::{parse_mk_annotation, MkAnnotation, MkAnnotationKind};
use proc_macro2::Span;
use syn::ext::IdentExt;
use syn::meta::ParseNestedMeta;
use syn::spanned::Spanned;
use syn::{Attribute, Lit};

#[derive(Clone, Copy, PartialEq, Eq)]
pub enum Level { Type, Field }

fn path_name(meta: &ParseNestedMeta) -> syn::Result<String> {
    match meta.path.get_ident() {
        Some(ident) => Ok(ident.unraw().to_string()),
        None => Err(meta.error("expected a single identifier")),
    }
}

/// A value is a literal (`"vec3"`, `1`, `true`) or a bare identifier (`vec3`).
fn parse_value(meta: &ParseNestedMeta) -> syn::Result<String> {
    let input = meta.value()?;
    let value = if input.peek(Lit) {
        match input.parse::<Lit>()? {
            Lit::Str(s) => s.value(),
            Lit::Int(i) => i.base10_digits().to_string(),
            Lit::Float(f) => f.base10_digits().to_string(),
            Lit::Bool(b) => b.value.to_string(),
            other => return Err(syn::Error::new(other.span(), "expected a string, integer, float or bool literal")),
        }
    } else {
        input.call(syn::Ident::parse_any)?.to_string()
    };
    if value.contains('"') {
        return Err(meta.error("annotation values cannot contain '\"'"));
    }
    Ok(value)
}

fn parse_args(meta: &ParseNestedMeta) -> syn::Result<Vec<(String, String)>> {
    let mut args = Vec::new();
    meta.parse_nested_meta(|arg| {
        let key = path_name(&arg)?;
        let value = parse_value(&arg)?;
        args.push((key, value));
        Ok(())
    })?;
    Ok(args)
}

/// Render name + args and run them through the annotation parser so the
/// stored string is the canonical spelling.
fn render(name: &str, args: &[(String, String)], span: Span) -> syn::Result<MkAnnotation> {
    let mut text = format!("mk::{name}");
    if !args.is_empty() {
        let parts: Vec<String> = args.iter().map(|(k, v)| format!("{k}=\"{v}\"")).collect();
        text.push_str(&format!("({})", parts.join(",")));
    }
    let parsed = parse_mk_annotation(&text).map_err(|e| syn::Error::new(span, e.to_string()))?;
    let canonical = parse_mk_annotation(&parsed.canonical()).map_err(|e| syn::Error::new(span, e.to_string()))?;
    check(&canonical, span)?;
    Ok(canonical)
}

/// Reject annotations the reflection pass would reject anyway.
fn check(a: &MkAnnotation, span: Span) -> syn::Result<()> {
    let res = match a.kind {
        MkAnnotationKind::Struct => a.as_struct_tag().map(|_| ()),
        MkAnnotationKind::Vertex => a.as_vertex().map(|_| ()),
        MkAnnotationKind::Resource => a.as_resource().map(|_| ()),
        MkAnnotationKind::Other(_) => Ok(()),
    };
    res.map_err(|e| syn::Error::new(span, e.to_string()))
}

/// Collect every `#[mk(...)]` on an item as canonical annotation strings.
pub fn collect(attrs: &[Attribute], level: Level) -> syn::Result<Vec<String>> {
    let mut struct_args: Vec<(String, String)> = Vec::new();
    let mut struct_span = Span::call_site();
    let mut out = Vec::new();
    for attr in attrs.iter().filter(|a| a.path().is_ident("mk")) {
        attr.parse_nested_meta(|meta| {
            let name = path_name(&meta)?;
            if meta.input.peek(syn::Token![=]) {
                if level == Level::Field {
                    return Err(meta.error("fields take `#[mk(vertex(..))]` or `#[mk(resource(..))]`"));
                }
                struct_span = attr.span();
                let value = parse_value(&meta)?;
                if struct_args.iter().any(|(k, _)| *k == name) {
                    return Err(meta.error(format!("duplicate key '{name}'")));
                }
                struct_args.push((name, value));
            } else if meta.input.peek(syn::token::Paren) {
                let args = parse_args(&meta)?;
                out.push(render(&name, &args, meta.path.span())?.raw);
            } else {
                out.push(render(&name, &[], meta.path.span())?.raw);
            }
            Ok(())
        })?;
    }
    if !struct_args.is_empty() {
        out.insert(0, render("struct", &struct_args, struct_span)?.raw);
    }
    Ok(out)
}
