use std::path::Path;

use mk_reflect::emit::emit_cpp_header;
use mk_reflect::{analyze_header, analyze_header_c, analyze_macros, parse_all_mk, reflect, ClangConfig};

fn write_json<T: serde::Serialize>(path: &Path, value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => {
            if let Err(e) = std::fs::write(path, text) {
                println!("cargo:warning=cannot write {}: {}", path.display(), e);
            }
        }
        Err(e) => println!("cargo:warning=cannot serialize {}: {}", path.display(), e),
    }
}

fn main() {
    println!("cargo:rerun-if-env-changed=MK_CLANG_DEMO");
    println!("cargo:rerun-if-env-changed=CLANG");
    println!("cargo:rerun-if-env-changed=CLANG_INCLUDES");
    println!("cargo:rerun-if-env-changed=CLANG_DEFS");

    // Analyzing the header needs a clang on PATH, so it is opt-in
    if std::env::var("MK_CLANG_DEMO").ok().as_deref() != Some("1") {
        println!("cargo:warning=MK_CLANG_DEMO not set; skipping header analysis");
        return;
    }
    let (Ok(manifest_dir), Ok(out_dir)) = (std::env::var("CARGO_MANIFEST_DIR"), std::env::var("OUT_DIR")) else {
        println!("cargo:warning=CARGO_MANIFEST_DIR/OUT_DIR not set");
        return;
    };
    let header = Path::new(&manifest_dir).join("..").join("include").join("demo.hpp");
    println!("cargo:rerun-if-changed={}", header.display());
    let out = Path::new(&out_dir);

    let cfg = ClangConfig::from_env();
    let ir = match analyze_header(&header, &cfg) {
        Ok(ir) => ir,
        Err(e) => {
            println!("cargo:warning=header analysis failed: {}", e);
            return;
        }
    };
    let out_cpp = out.join("generated_demo.hpp");
    if let Err(e) = std::fs::write(&out_cpp, emit_cpp_header(&ir, Some("mk"))) {
        println!("cargo:warning=cannot write {}: {}", out_cpp.display(), e);
    }
    write_json(&out.join("header_ir.json"), &ir);

    // The demo header is valid C too
    match analyze_header_c(&header, &cfg) {
        Ok(c_ir) => write_json(&out.join("c_ir.json"), &c_ir),
        Err(e) => println!("cargo:warning=C analysis failed: {}", e),
    }
    match analyze_macros(&header, &cfg) {
        Ok(macros) => write_json(&out.join("macros.json"), &macros),
        Err(e) => println!("cargo:warning=macro extraction failed: {}", e),
    }

    let parsed = match parse_all_mk(&ir) {
        Ok(p) => p,
        Err(e) => {
            println!("cargo:warning=invalid mk annotations: {}", e);
            return;
        }
    };
    write_json(&out.join("parsed_mk.json"), &parsed);
    match reflect(&parsed) {
        Ok(r) => {
            for d in &r.diagnostics {
                println!("cargo:warning={}: {}", d.location, d.message);
            }
            write_json(&out.join("reflection.json"), &r);
            println!("cargo:warning=reflection written to {}", out.display());
        }
        Err(e) => println!("cargo:warning=reflection failed: {}", e),
    }
}
