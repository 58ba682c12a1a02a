use clap::Parser;
use compile_js::analyze_program;
use compile_js::compile_program;
use compile_js::dump_hir;
use compile_js::resolve::FsResolver;
use compile_js::CompileOptions;
use diagnostics::files::SimpleFiles;
use diagnostics::render::render_diagnostic_with_options;
use diagnostics::render::RenderOptions;
use diagnostics::Diagnostic;
use estree_js::parse_program_json;
use std::io::IsTerminal;
use std::fs;
use std::io::stdout;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::Level;
use tracing_subscriber::fmt::format::FmtSpan;

#[derive(Parser)]
#[command(name = "compile-js", about = "Compiles an ESTree JSON syntax tree to C")]
struct Cli {
  /// ESTree JSON of the program, as produced by a JavaScript parser.
  input: PathBuf,

  /// JavaScript source the tree was parsed from, for diagnostic snippets.
  #[arg(short, long)]
  source: Option<PathBuf>,

  /// Output destination; omit for stdout.
  #[arg(short, long)]
  output: Option<PathBuf>,

  /// Compile as strict code.
  #[arg(long)]
  strict: bool,

  /// Do not emit `main`; export a module initializer instead.
  #[arg(long)]
  no_main: bool,

  /// Name of the module; defaults to the input file stem.
  #[arg(long)]
  module_name: Option<String>,

  /// Header providing the runtime, placed in the first `#include`.
  #[arg(long, default_value = "jsc-runtime.h")]
  runtime_header: String,

  /// Directory searched for bare `require` specifiers. May be repeated.
  #[arg(long = "search-dir")]
  search_dirs: Vec<PathBuf>,

  /// Print the lowered HIR as JSON instead of generating C.
  #[arg(long)]
  emit_hir: bool,

  /// Emit JSON tracing events to stderr.
  #[arg(long)]
  trace: bool,

  /// When to color diagnostics.
  #[arg(long, value_enum, default_value_t = Color::Auto)]
  color: Color,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
enum Color {
  Auto,
  Always,
  Never,
}

impl Color {
  fn enabled(self) -> bool {
    match self {
      Color::Auto => std::io::stderr().is_terminal(),
      Color::Always => true,
      Color::Never => false,
    }
  }
}

fn init_tracing(enabled: bool) {
  if !enabled {
    return;
  }
  let _ = tracing_subscriber::fmt()
    .with_span_events(FmtSpan::CLOSE)
    .with_max_level(Level::DEBUG)
    .json()
    .with_ansi(false)
    .with_writer(std::io::stderr)
    .try_init();
}

fn report(files: &SimpleFiles, options: RenderOptions, diagnostics: &[Diagnostic]) {
  for diagnostic in diagnostics {
    eprintln!("{}", render_diagnostic_with_options(files, diagnostic, options));
  }
}

fn write_output(dest: Option<&Path>, text: &str) -> std::io::Result<()> {
  match dest {
    Some(p) => fs::write(p, text),
    None => stdout().write_all(text.as_bytes()),
  }
}

fn main() -> ExitCode {
  let args = Cli::parse();
  init_tracing(args.trace);

  let json = match fs::read_to_string(&args.input) {
    Ok(json) => json,
    Err(err) => {
      eprintln!("failed to read {}: {err}", args.input.display());
      return ExitCode::FAILURE;
    }
  };
  let mut program = match parse_program_json(&json) {
    Ok(program) => program,
    Err(err) => {
      eprintln!("{} is not a valid ESTree program: {err}", args.input.display());
      return ExitCode::FAILURE;
    }
  };
  let (source_name, source_text) = match args.source.as_ref() {
    Some(p) => match fs::read_to_string(p) {
      Ok(text) => (p.display().to_string(), text),
      Err(err) => {
        eprintln!("failed to read {}: {err}", p.display());
        return ExitCode::FAILURE;
      }
    },
    None => (args.input.display().to_string(), String::new()),
  };
  let mut files = SimpleFiles::new();
  let file = files.add(source_name, source_text);
  let render = RenderOptions {
    color: args.color.enabled(),
    ..RenderOptions::default()
  };

  let module_name = args.module_name.clone().unwrap_or_else(|| {
    args
      .input
      .file_stem()
      .map(|s| s.to_string_lossy().into_owned())
      .unwrap_or_else(|| "main".to_string())
  });
  let options = CompileOptions {
    strict: args.strict,
    module_name,
    runtime_header: args.runtime_header.clone(),
    emit_main: !args.no_main,
  };
  let from_dir = args
    .input
    .parent()
    .map(Path::to_path_buf)
    .unwrap_or_else(|| PathBuf::from("."));

  let resolver = FsResolver::new(args.search_dirs.clone());
  let text = if args.emit_hir {
    let analysis = analyze_program(&mut program, &options, &resolver, file, &from_dir);
    report(&files, render, &analysis.report.into_diagnostics());
    let Some(module) = analysis.module else {
      return ExitCode::FAILURE;
    };
    match dump_hir(&module) {
      Ok(text) => text,
      Err(err) => {
        eprintln!("failed to serialize HIR: {err}");
        return ExitCode::FAILURE;
      }
    }
  } else {
    match compile_program(&mut program, &options, &resolver, file, &from_dir) {
      Ok(out) => {
        report(&files, render, &out.diagnostics);
        for dep in out.dependencies.iter() {
          tracing::info!(specifier = dep.specifier.as_str(), path = %dep.path.display(), "dependency");
        }
        out.c_source
      }
      Err(diagnostics) => {
        report(&files, render, &diagnostics);
        return ExitCode::FAILURE;
      }
    }
  };

  if let Err(err) = write_output(args.output.as_deref(), &text) {
    eprintln!("failed to write output: {err}");
    return ExitCode::FAILURE;
  }
  ExitCode::SUCCESS
}
