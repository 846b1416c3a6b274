use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use log::{debug, info};
use mk_reflect::emit::{emit_cpp_header, emit_rust_module, emit_summary};
use mk_reflect::{
    analyze_ast_json, analyze_c_ast_json, analyze_header, analyze_header_c, analyze_macros, parse_all_mk, reflect, ClangConfig,
    HeaderIR,
};

#[derive(Parser, Debug)]
#[command(name = "mkreflect", version, about = "Reflect mk:: annotations from C/C++ headers")]
struct Cli {
    /// More log output (-v debug, -vv trace); RUST_LOG overrides
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run clang on a header and emit the result
    Analyze {
        header: PathBuf,
        #[command(flatten)]
        clang: ClangArgs,
        #[command(flatten)]
        output: OutputArgs,
    },
    /// Work on a saved `clang -Xclang -ast-dump=json` output
    FromAst {
        ast: PathBuf,
        /// Header the dump was made from; needed to recover annotation text
        #[arg(long)]
        source: Option<PathBuf>,
        #[command(flatten)]
        output: OutputArgs,
    },
    /// Validate annotations only; exits non-zero on errors
    Check {
        /// A header, or a `.json` AST dump
        input: PathBuf,
        #[arg(long)]
        source: Option<PathBuf>,
        #[command(flatten)]
        clang: ClangArgs,
    },
}

#[derive(Args, Debug, Default)]
struct ClangArgs {
    /// Extra include directory (added after CLANG_INCLUDES)
    #[arg(short = 'I', value_name = "DIR")]
    includes: Vec<String>,
    /// Extra define, NAME or NAME=VALUE (added after CLANG_DEFS)
    #[arg(short = 'D', value_name = "DEF")]
    defines: Vec<String>,
}

impl ClangArgs {
    fn config(&self) -> ClangConfig {
        let mut cfg = ClangConfig::from_env();
        cfg.includes.extend(self.includes.iter().cloned());
        cfg.defines.extend(self.defines.iter().cloned());
        cfg
    }
}

#[derive(Args, Debug)]
struct OutputArgs {
    #[arg(long, value_enum, default_value_t = Format::Summary)]
    format: Format,
    /// Namespace for `--format cpp`
    #[arg(long)]
    namespace: Option<String>,
    /// Write to a file instead of stdout
    #[arg(short, long)]
    out: Option<PathBuf>,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum Format {
    /// Raw records and annotation strings as JSON
    Ir,
    /// Vertex layouts, bindings and diagnostics as JSON
    Json,
    Summary,
    Cpp,
    Rust,
    /// Plain C records, enums, typedefs and functions as JSON
    CIr,
    /// Macros the header defines, as JSON (needs clang)
    Macros,
}

fn render(ir: &HeaderIR, format: Format, namespace: Option<&str>) -> Result<String> {
    Ok(match format {
        Format::CIr | Format::Macros => bail!("{format:?} output is not built from annotated records"),
        Format::Ir => serde_json::to_string_pretty(ir)?,
        Format::Cpp => emit_cpp_header(ir, namespace),
        Format::Rust => emit_rust_module(&parse_all_mk(ir)?)?,
        Format::Json => serde_json::to_string_pretty(&reflect(&parse_all_mk(ir)?)?)?,
        Format::Summary => emit_summary(&reflect(&parse_all_mk(ir)?)?),
    })
}

fn load_ast(ast: &Path, source: Option<&Path>) -> Result<HeaderIR> {
    let bytes = std::fs::read(ast).with_context(|| format!("reading {}", ast.display()))?;
    let source = source
        .map(|p| std::fs::read_to_string(p).with_context(|| format!("reading {}", p.display())))
        .transpose()?;
    Ok(analyze_ast_json(&bytes, source.as_deref())?)
}

fn emit(text: String, out: Option<&Path>) -> Result<()> {
    match out {
        Some(path) => {
            std::fs::write(path, text).with_context(|| format!("writing {}", path.display()))?;
            info!("wrote {}", path.display());
        }
        None => {
            print!("{text}");
            if !text.ends_with('\n') { println!(); }
        }
    }
    Ok(())
}

fn check(ir: &HeaderIR) -> Result<String> {
    let r = reflect(&parse_all_mk(ir)?)?;
    let mut out = String::new();
    for d in &r.diagnostics {
        out.push_str(&format!("warning: {}: {}\n", d.location, d.message));
    }
    out.push_str(&format!(
        "ok: {} record(s), {} vertex layout(s), {} binding(s)\n",
        ir.structs.len(),
        r.vertex_layouts.len(),
        r.bindings.len()
    ));
    Ok(out)
}

fn run(cli: Cli) -> Result<()> {
    match cli.cmd {
        Command::Analyze { header, clang, output } => {
            let cfg = clang.config();
            debug!("clang config: {cfg:?}");
            let context = || format!("analyzing {}", header.display());
            let text = match output.format {
                Format::CIr => serde_json::to_string_pretty(&analyze_header_c(&header, &cfg).with_context(context)?)?,
                Format::Macros => serde_json::to_string_pretty(&analyze_macros(&header, &cfg).with_context(context)?)?,
                format => render(&analyze_header(&header, &cfg).with_context(context)?, format, output.namespace.as_deref())?,
            };
            emit(text, output.out.as_deref())
        }
        Command::FromAst { ast, source, output } => {
            let text = match output.format {
                Format::Macros => bail!("macros come from the preprocessor; use `analyze --format macros`"),
                Format::CIr => {
                    let bytes = std::fs::read(&ast).with_context(|| format!("reading {}", ast.display()))?;
                    serde_json::to_string_pretty(&analyze_c_ast_json(&bytes)?)?
                }
                format => render(&load_ast(&ast, source.as_deref())?, format, output.namespace.as_deref())?,
            };
            emit(text, output.out.as_deref())
        }
        Command::Check { input, source, clang } => {
            let ir = if input.extension().is_some_and(|e| e == "json") {
                load_ast(&input, source.as_deref())?
            } else {
                analyze_header(&input, &clang.config()).with_context(|| format!("analyzing {}", input.display()))?
            };
            print!("{}", check(&ir).with_context(|| format!("checking {}", input.display()))?);
            Ok(())
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
    run(cli)
}
