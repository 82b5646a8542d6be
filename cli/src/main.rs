mod render;
mod scan;
mod test_runner;

use std::path::Path;
use std::process;

use clap::{Parser, Subcommand};
use codespan_reporting::diagnostic::Diagnostic;
use codespan_reporting::files::SimpleFiles;
use codespan_reporting::term;
use codespan_reporting::term::termcolor::{ColorChoice, StandardStream};
use stencil::split_lines;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

const SUBCOMMANDS: &[&str] = &["render", "test", "help"];

#[derive(Parser)]
#[command(name = "stencil", version, about = "Line-oriented template copier")]
struct Cli {
    /// Disable colored error output
    #[arg(long, global = true)]
    no_color: bool,

    /// Log what the copier does (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Copy a template, writing the result next to it
    Render(RenderArgs),

    /// Run .test.txt template fixtures
    Test(TestArgs),
}

#[derive(clap::Args)]
struct RenderArgs {
    /// Template file; the output name is this name minus its last extension
    template: String,

    /// Directory bound to `path` inside the template
    path: String,

    /// File names bound to `files` inside the template
    files: Vec<String>,

    /// Print the result instead of writing the output file
    #[arg(long)]
    stdout: bool,
}

#[derive(clap::Args)]
struct TestArgs {
    /// Path to a .test.txt file or directory containing them
    path: String,

    /// Run only tests in these categories (subfolder names). Repeatable.
    #[arg(short, long)]
    category: Vec<String>,

    /// List available categories and exit
    #[arg(long)]
    list_categories: bool,
}

fn main() {
    // Backwards compatibility: if the first positional arg is not a known
    // subcommand, inject "render" so `stencil page.html.tpl dir a b` works.
    let mut args: Vec<String> = std::env::args().collect();
    if let Some(pos) = args.iter().skip(1).position(|a| !a.starts_with('-')) {
        if !SUBCOMMANDS.contains(&args[pos + 1].as_str()) {
            args.insert(pos + 1, "render".to_string());
        }
    }

    let cli = Cli::parse_from(&args);
    init_logging(cli.verbose, cli.no_color);

    match cli.command {
        Command::Render(render_args) => do_render(render_args, cli.no_color),
        Command::Test(test_args) => {
            let path = Path::new(&test_args.path);
            if test_args.list_categories {
                test_runner::list_categories(path);
                return;
            }
            let exit_code = test_runner::run_tests(path, cli.no_color, &test_args.category);
            process::exit(exit_code);
        }
    }
}

fn init_logging(verbose: bool, no_color: bool) {
    let level = if verbose { "debug" } else { "warn" };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_ansi(!no_color)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn do_render(args: RenderArgs, no_color: bool) {
    let color_choice = if no_color {
        ColorChoice::Never
    } else {
        ColorChoice::Auto
    };

    // Resolve the output name before doing any work
    let output = if args.stdout {
        None
    } else {
        match render::output_name(Path::new(&args.template)) {
            Some(name) => Some(name),
            None => {
                eprintln!(
                    "error: '{}' has no extension to strip; the output would overwrite the template",
                    args.template
                );
                process::exit(1);
            }
        }
    };

    // Read source
    let source = match std::fs::read_to_string(&args.template) {
        Ok(s) => render::normalize_newlines(&s),
        Err(e) => {
            eprintln!("error: cannot read '{}': {}", args.template, e);
            process::exit(1);
        }
    };

    // Set up codespan file database
    let mut files = SimpleFiles::new();
    let file_id = files.add(args.template.clone(), source.clone());

    let copier = match render::copier() {
        Ok(copier) => copier,
        Err(e) => {
            eprintln!("error: {}", e);
            process::exit(1);
        }
    };

    let globals = render::template_globals(&args.path, &args.files);
    let lines = split_lines(&source);
    debug!(template = %args.template, lines = lines.len(), "copying template");

    let failure = match output {
        None => match copier.copy(&lines, &globals) {
            Ok(copied) => {
                print!("{}", copied.concat());
                return;
            }
            Err(error) => render::RenderError::Copy(error),
        },
        Some(name) => match render::render_to_file(&copier, &lines, &globals, &name) {
            Ok(()) => {
                info!(output = %name.display(), "wrote output");
                return;
            }
            Err(error) => error,
        },
    };

    match failure {
        render::RenderError::Copy(error) => {
            let writer = StandardStream::stderr(color_choice);
            emit(&writer, &files, &error.to_diagnostic(file_id, &lines));
        }
        other => eprintln!("error: {}", other),
    }
    process::exit(1);
}

fn emit(writer: &StandardStream, files: &SimpleFiles<String, String>, diagnostic: &Diagnostic<usize>) {
    let config = term::Config::default();
    let _ = term::emit_to_write_style(&mut writer.lock(), &config, files, diagnostic);
}
