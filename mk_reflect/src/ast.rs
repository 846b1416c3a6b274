//! Walk clang's `-ast-dump=json` output and pull out records, fields and
//! their attributes.
//!
//! Only `RecordDecl`/`CXXRecordDecl` nodes that are complete, named, and not
//! implicit are collected, and by default only those written in the main
//! file. Annotation text is recovered from the attribute node itself when
//! clang includes it, otherwise from the header source using the attribute's
//! byte range.
//!
//! Clang writes a location's `file` only when it differs from the previously
//! printed location, so the walk visits nodes in dump order and carries the
//! current file along.

use log::{trace, warn};
use serde_json::{Map, Value};

use crate::ir::{AttrIR, FieldIR, HeaderIR, StructIR};

/// Which records a walk keeps.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Scope {
    /// Records declared in the file clang was invoked on.
    #[default]
    MainFile,
    /// Records from the main file and everything it includes.
    AllFiles,
}

/// Current file while walking a dump in order.
#[derive(Debug, Clone)]
pub(crate) struct FileTracker {
    file: Option<String>,
    in_main: bool,
}

impl Default for FileTracker {
    fn default() -> Self { FileTracker { file: None, in_main: true } }
}

impl FileTracker {
    /// Update from one location object; returns whether it lies in the main
    /// file. For macro locations the spelling location decides.
    pub(crate) fn locate(&mut self, loc: &Value) -> bool {
        if let Some(spelling) = loc.get("spellingLoc") {
            let in_main = self.locate(spelling);
            if let Some(expansion) = loc.get("expansionLoc") { self.locate(expansion); }
            return in_main;
        }
        if let Some(file) = loc.get("file").and_then(Value::as_str) {
            self.in_main = loc.get("includedFrom").is_none();
            if self.file.as_deref() != Some(file) {
                trace!("now in {file} (main: {})", self.in_main);
                self.file = Some(file.to_string());
            }
        }
        self.in_main
    }

    /// Visit a node's own `loc` and `range`, in the order clang prints them.
    /// Returns whether the node's location is in the main file.
    pub(crate) fn enter(&mut self, m: &Map<String, Value>) -> bool {
        let mut in_main = self.in_main;
        if let Some(loc) = m.get("loc") { in_main = self.locate(loc); }
        if let Some(range) = m.get("range") {
            let begin = range.get("begin").map(|b| self.locate(b));
            if let Some(end) = range.get("end") { self.locate(end); }
            if m.get("loc").is_none() { in_main = begin.unwrap_or(in_main); }
        }
        in_main
    }

    /// Visit every location below `v` without collecting anything.
    pub(crate) fn skip(&mut self, v: &Value) {
        match v {
            Value::Object(m) => {
                self.enter(m);
                if let Some(Value::Array(inner)) = m.get("inner") {
                    for item in inner { self.skip(item); }
                }
            }
            Value::Array(arr) => {
                for item in arr { self.skip(item); }
            }
            _ => {}
        }
    }

    pub(crate) fn file(&self) -> Option<&str> { self.file.as_deref() }
}

pub fn collect_from_ast(v: &Value, source: Option<&str>) -> HeaderIR {
    collect_from_ast_scoped(v, source, Scope::MainFile)
}

pub fn collect_from_ast_scoped(v: &Value, source: Option<&str>, scope: Scope) -> HeaderIR {
    let mut w = Walker { source, scope, files: FileTracker::default(), ir: HeaderIR::default() };
    w.walk(v);
    w.ir
}

struct Walker<'s> {
    source: Option<&'s str>,
    scope: Scope,
    files: FileTracker,
    ir: HeaderIR,
}

pub(crate) fn str_field<'a>(map: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    map.get(key).and_then(|v| v.as_str())
}

pub(crate) fn flag(map: &Map<String, Value>, key: &str) -> bool {
    map.get(key).and_then(|v| v.as_bool()).unwrap_or(false)
}

pub(crate) fn inner(map: &Map<String, Value>) -> &[Value] {
    map.get("inner").and_then(|x| x.as_array()).map(Vec::as_slice).unwrap_or(&[])
}

fn is_record_def(m: &Map<String, Value>) -> bool {
    matches!(str_field(m, "kind"), Some("RecordDecl" | "CXXRecordDecl"))
        && !str_field(m, "name").unwrap_or("").is_empty()
        && !flag(m, "isImplicit")
        && flag(m, "completeDefinition")
}

impl Walker<'_> {
    fn walk(&mut self, v: &Value) {
        match v {
            Value::Object(m) => {
                let in_main = self.files.enter(m);
                self.node(m, in_main);
            }
            Value::Array(arr) => {
                for item in arr { self.walk(item); }
            }
            _ => {}
        }
    }

    /// A node whose own location has already been visited.
    fn node(&mut self, m: &Map<String, Value>, in_main: bool) {
        if is_record_def(m) {
            self.record(m, in_main);
        } else {
            for item in inner(m) { self.walk(item); }
        }
    }

    fn record(&mut self, m: &Map<String, Value>, in_main: bool) {
        let name = str_field(m, "name").unwrap_or("").to_string();
        let mut st = StructIR { name, attrs: self.legacy_attrs(m), fields: Vec::new() };
        // Nested records land after their parent.
        let slot = self.ir.structs.len();
        for child in inner(m) {
            let Some(c) = child.as_object() else { continue };
            let child_main = self.files.enter(c);
            match str_field(c, "kind") {
                Some(k) if k.ends_with("Attr") => st.attrs.push(self.attr(c, child_main)),
                Some("FieldDecl") => st.fields.push(self.field(c)),
                _ => self.node(c, child_main),
            }
        }
        if in_main || self.scope == Scope::AllFiles {
            trace!("record {} with {} field(s)", st.name, st.fields.len());
            self.ir.structs.insert(slot, st);
        } else {
            trace!("skipping record {} from {}", st.name, self.files.file().unwrap_or("?"));
        }
    }

    fn field(&mut self, m: &Map<String, Value>) -> FieldIR {
        let name = str_field(m, "name").unwrap_or("").to_string();
        let type_name = m
            .get("type")
            .and_then(|t| t.get("qualType"))
            .and_then(|qt| qt.as_str())
            .unwrap_or("")
            .to_string();
        let mut attrs = self.legacy_attrs(m);
        for child in inner(m) {
            let Some(c) = child.as_object() else { continue };
            let child_main = self.files.enter(c);
            if str_field(c, "kind").is_some_and(|k| k.ends_with("Attr")) {
                attrs.push(self.attr(c, child_main));
            } else {
                for item in inner(c) { self.files.skip(item); }
            }
        }
        FieldIR { name, type_name, attrs }
    }

    /// Some clang builds print attributes under an `attributes` key instead of `inner`.
    fn legacy_attrs(&mut self, m: &Map<String, Value>) -> Vec<AttrIR> {
        let Some(Value::Array(attrs)) = m.get("attributes") else { return Vec::new() };
        attrs
            .iter()
            .filter_map(Value::as_object)
            .filter(|a| str_field(a, "kind").is_some_and(|k| k.ends_with("Attr")))
            .map(|a| {
                let in_main = self.files.enter(a);
                self.attr(a, in_main)
            })
            .collect()
    }

    fn attr(&mut self, m: &Map<String, Value>, in_main: bool) -> AttrIR {
        let kind = str_field(m, "kind").unwrap_or("").to_string();
        let annotation = if kind == "AnnotateAttr" {
            let from_node = str_field(m, "annotation").map(str::to_string).or_else(|| string_literal_child(m));
            let from_source = || {
                let src = self.source.filter(|_| in_main)?;
                annotation_from_source(m, src)
            };
            from_node.or_else(from_source)
        } else {
            None
        };
        for item in inner(m) { self.files.skip(item); }
        if kind == "AnnotateAttr" && annotation.is_none() {
            if in_main {
                warn!("AnnotateAttr without recoverable text; pass the header source to resolve it");
            } else {
                warn!("AnnotateAttr in {} has no text in the dump", self.files.file().unwrap_or("an included file"));
            }
        }
        AttrIR { kind, annotation }
    }
}

fn string_literal_child(m: &Map<String, Value>) -> Option<String> {
    inner(m).iter().find_map(|n| {
        let n = n.as_object()?;
        if str_field(n, "kind")? != "StringLiteral" { return None; }
        first_string_literal(str_field(n, "value")?)
    })
}

/// Byte offset of a location, preferring the spelling location for macro expansions.
fn offset_of(loc: &Value) -> Option<(usize, usize)> {
    let loc = loc.get("spellingLoc").unwrap_or(loc);
    let offset = loc.get("offset")?.as_u64()? as usize;
    let tok_len = loc.get("tokLen").and_then(|t| t.as_u64()).unwrap_or(0) as usize;
    Some((offset, tok_len))
}

fn annotation_from_source(m: &Map<String, Value>, source: &str) -> Option<String> {
    let range = m.get("range")?;
    let (begin, _) = offset_of(range.get("begin")?)?;
    let (end, tok_len) = offset_of(range.get("end")?)?;
    let text = source.get(begin..(end + tok_len).min(source.len()))?;
    first_string_literal(text)
}

/// Decode the first C string literal in `text`, joining adjacent literals
/// (`"a" "b"`) the way the compiler does.
pub(crate) fn first_string_literal(text: &str) -> Option<String> {
    let bytes = text.as_bytes();
    let mut i = text.find('"')?;
    let mut out = Vec::new();
    loop {
        i = decode_literal(bytes, i + 1, &mut out)?;
        while bytes.get(i).is_some_and(u8::is_ascii_whitespace) { i += 1; }
        if bytes.get(i) != Some(&b'"') { break; }
    }
    String::from_utf8(out).ok()
}

/// Decode up to the closing quote; returns the index just past it.
fn decode_literal(b: &[u8], mut i: usize, out: &mut Vec<u8>) -> Option<usize> {
    loop {
        match *b.get(i)? {
            b'"' => return Some(i + 1),
            b'\\' => {
                i += 1;
                let c = *b.get(i)?;
                i += 1;
                match c {
                    b'n' => out.push(b'\n'),
                    b't' => out.push(b'\t'),
                    b'r' => out.push(b'\r'),
                    b'a' => out.push(0x07),
                    b'b' => out.push(0x08),
                    b'f' => out.push(0x0c),
                    b'v' => out.push(0x0b),
                    b'0'..=b'7' => {
                        let mut v = u32::from(c - b'0');
                        for _ in 0..2 {
                            match b.get(i) {
                                Some(d @ b'0'..=b'7') => { v = v * 8 + u32::from(d - b'0'); i += 1; }
                                _ => break,
                            }
                        }
                        out.push(u8::try_from(v).ok()?);
                    }
                    b'x' => {
                        let start = i;
                        while b.get(i).is_some_and(u8::is_ascii_hexdigit) { i += 1; }
                        let digits = std::str::from_utf8(&b[start..i]).ok()?;
                        out.push(u8::from_str_radix(digits, 16).ok()?);
                    }
                    // \" \\ \' \? and anything unknown stand for themselves
                    other => out.push(other),
                }
            }
            c => { out.push(c); i += 1; }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emit::emit_cpp_header;
    use serde_json::json;

    #[test]
    fn reads_annotation_key_and_string_literal_child() {
        let ast = json!({
            "kind": "TranslationUnitDecl",
            "inner": [{
                "kind": "CXXRecordDecl", "name": "A", "tagUsed": "struct", "completeDefinition": true,
                "inner": [
                    { "kind": "AnnotateAttr", "annotation": "mk::struct(tag=vertex)" },
                    { "kind": "CXXRecordDecl", "name": "A", "isImplicit": true, "tagUsed": "struct" },
                    { "kind": "FieldDecl", "name": "x", "type": { "qualType": "float[2]" },
                      "inner": [{ "kind": "AnnotateAttr", "inner": [
                          { "kind": "StringLiteral", "value": "\"mk::vertex(location=0)\"" }
                      ]}] }
                ]
            }]
        });
        let ir = collect_from_ast(&ast, None);
        assert_eq!(ir.structs.len(), 1);
        let a = &ir.structs[0];
        assert_eq!(a.attrs[0].annotation.as_deref(), Some("mk::struct(tag=vertex)"));
        assert_eq!(a.fields[0].type_name, "float[2]");
        assert_eq!(a.fields[0].attrs[0].annotation.as_deref(), Some("mk::vertex(location=0)"));
    }

    #[test]
    fn string_literal_values_are_unescaped() {
        let ast = json!({ "kind": "CXXRecordDecl", "name": "G", "completeDefinition": true, "inner": [
            { "kind": "AnnotateAttr", "inner": [
                { "kind": "StringLiteral", "value": r#""mk::resource(kind=uniform,set=0,binding=0,stages=\"vs|fs\")""# }
            ]}
        ]});
        let ir = collect_from_ast(&ast, None);
        assert_eq!(
            ir.structs[0].attrs[0].annotation.as_deref(),
            Some(r#"mk::resource(kind=uniform,set=0,binding=0,stages="vs|fs")"#)
        );
    }

    #[test]
    fn c_escapes_and_adjacent_literals() {
        assert_eq!(first_string_literal(r#"x("a\"b\\c")"#).as_deref(), Some(r#"a"b\c"#));
        assert_eq!(first_string_literal(r#""\x41\102\0103\n""#).as_deref(), Some("AB\u{8}3\n"));
        assert_eq!(first_string_literal(r#"annotate("mk::vertex(" "location=1)")"#).as_deref(), Some("mk::vertex(location=1)"));
        assert_eq!(first_string_literal(r#""unterminated \""#), None);
        assert_eq!(first_string_literal("no literal"), None);
    }

    #[test]
    fn skips_forward_declarations_and_anonymous_records() {
        let ast = json!({ "kind": "TranslationUnitDecl", "inner": [
            { "kind": "RecordDecl", "name": "Fwd", "tagUsed": "struct" },
            { "kind": "RecordDecl", "tagUsed": "struct", "completeDefinition": true },
            { "kind": "RecordDecl", "name": "C", "tagUsed": "struct", "completeDefinition": true,
              "inner": [{ "kind": "FieldDecl", "name": "v", "type": { "qualType": "int" } }] }
        ]});
        let ir = collect_from_ast(&ast, None);
        assert_eq!(ir.structs.iter().map(|s| s.name.as_str()).collect::<Vec<_>>(), vec!["C"]);
    }

    fn annotate_range(src: &str, from: usize) -> Value {
        let begin = from + src[from..].find("annotate(").unwrap();
        let end = begin + src[begin..].find("\")))").unwrap() + 1;
        json!({
            "begin": { "offset": begin, "tokLen": 8 },
            "end": { "offset": end, "tokLen": 1 }
        })
    }

    #[test]
    fn recovers_annotation_from_source_range() {
        let src = "struct __attribute__((annotate(\"mk::struct(tag=vertex)\"))) V { float p; };";
        let ast = json!({ "kind": "TranslationUnitDecl", "inner": [{
            "kind": "CXXRecordDecl", "name": "V", "completeDefinition": true,
            "inner": [{ "kind": "AnnotateAttr", "range": annotate_range(src, 0) }]
        }]});
        let ir = collect_from_ast(&ast, Some(src));
        assert_eq!(ir.structs[0].attrs[0].annotation.as_deref(), Some("mk::struct(tag=vertex)"));
        assert_eq!(collect_from_ast(&ast, None).structs[0].attrs[0].annotation, None);
    }

    #[test]
    fn quoted_values_survive_a_regenerated_header() {
        let text = r#"mk::resource(kind=uniform,set=0,binding=0,stages="vs|fs")"#;
        let ir = HeaderIR {
            structs: vec![StructIR {
                name: "Globals".into(),
                attrs: vec![],
                fields: vec![FieldIR { name: "camera".into(), type_name: "int".into(), attrs: vec![AttrIR::annotate(text)] }],
            }],
        };
        let header = emit_cpp_header(&ir, None);
        let ast = json!({ "kind": "TranslationUnitDecl", "inner": [{
            "kind": "CXXRecordDecl", "name": "Globals", "completeDefinition": true,
            "loc": { "offset": header.find("Globals").unwrap(), "file": "globals.hpp" },
            "inner": [{ "kind": "FieldDecl", "name": "camera", "type": { "qualType": "int" },
                "inner": [{ "kind": "AnnotateAttr", "range": annotate_range(&header, 0) }] }]
        }]});
        let back = collect_from_ast(&ast, Some(&header));
        assert_eq!(back, ir);
        assert_eq!(emit_cpp_header(&back, None), header);
    }

    #[test]
    fn included_records_are_skipped_and_never_read_from_the_main_source() {
        // `Light` comes from an included file; its offsets point into that file.
        let main = "#include \"common.hpp\"\nstruct __attribute__((annotate(\"mk::struct(tag=vertex)\"))) Mesh { float p; };";
        let ast = json!({ "kind": "TranslationUnitDecl", "inner": [
            { "kind": "CXXRecordDecl", "name": "Light", "completeDefinition": true,
              "loc": { "offset": 7, "file": "common.hpp", "includedFrom": { "file": "scene.hpp" } },
              "range": { "begin": { "offset": 0 }, "end": { "offset": 60 } },
              "inner": [{ "kind": "AnnotateAttr", "range": {
                  "begin": { "offset": 10, "tokLen": 8 }, "end": { "offset": 40, "tokLen": 1 } } }] },
            { "kind": "CXXRecordDecl", "name": "Mesh", "completeDefinition": true,
              "loc": { "offset": main.find("Mesh").unwrap(), "file": "scene.hpp" },
              "inner": [{ "kind": "AnnotateAttr", "range": annotate_range(main, 0) }] }
        ]});
        let ir = collect_from_ast(&ast, Some(main));
        assert_eq!(ir.structs.iter().map(|s| s.name.as_str()).collect::<Vec<_>>(), vec!["Mesh"]);
        assert_eq!(ir.structs[0].attrs[0].annotation.as_deref(), Some("mk::struct(tag=vertex)"));

        let all = collect_from_ast_scoped(&ast, Some(main), Scope::AllFiles);
        assert_eq!(all.structs.iter().map(|s| s.name.as_str()).collect::<Vec<_>>(), vec!["Light", "Mesh"]);
        assert_eq!(all.structs[0].attrs[0].annotation, None);
    }

    #[test]
    fn file_is_inherited_from_the_previous_location() {
        let mut files = FileTracker::default();
        assert!(files.locate(&json!({ "offset": 1, "file": "a.hpp" })));
        assert!(!files.locate(&json!({ "offset": 2, "file": "b.hpp", "includedFrom": { "file": "a.hpp" } })));
        assert!(!files.locate(&json!({ "offset": 3 })));
        assert_eq!(files.file(), Some("b.hpp"));
        assert!(files.locate(&json!({
            "spellingLoc": { "offset": 4, "file": "a.hpp" },
            "expansionLoc": { "offset": 9 }
        })));
        assert!(files.locate(&json!({})));
    }

    #[test]
    fn non_annotate_attrs_have_no_text() {
        let ast = json!({ "kind": "CXXRecordDecl", "name": "P", "completeDefinition": true,
            "inner": [{ "kind": "PackedAttr" }, { "kind": "FieldDecl", "name": "a", "type": { "qualType": "int" } }] });
        let ir = collect_from_ast(&ast, None);
        assert_eq!(ir.structs[0].attrs, vec![AttrIR { kind: "PackedAttr".into(), annotation: None }]);
    }
}
