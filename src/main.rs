use std::io::{IsTerminal, Read};
use std::path::{Path, PathBuf};

use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use miette::{Context, IntoDiagnostic, Result};
use serde_json::{Map, Value};

use locust_core::{DiffResult, LocustConfig, OutputFormat, ParseResult, PluginConfig};
use locust_engine::{analyze, build_forest};
use locust_render::Summary;

#[derive(Parser)]
#[command(
    name = "locust",
    version,
    about = "Structural summaries of git changes",
    long_about = "Locust reports which functions, classes and imports an edit touched,\n\
                   nested the way they are nested in the code.\n\n\
                   The pipeline has three stages that can run separately or together:\n\
                   git (collect a diff), parse (find changed definitions), render (summarize).\n\n\
                   Examples:\n  \
                     locust run main HEAD                   Summarize a branch\n  \
                     locust run HEAD --format markdown      Summarize uncommitted work as a PR comment\n  \
                     locust git HEAD~1 HEAD | locust parse  Run the stages by hand\n  \
                     locust run --diff changes.patch        Summarize a saved unified diff"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to configuration file (default: .locust.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output format for summaries
    #[arg(
        long,
        global = true,
        default_value = "text",
        long_help = "Output format for summaries (render and run).\n\n\
                       Formats:\n  \
                         text      Tree of changed definitions per file (default)\n  \
                         json      Summary document as JSON\n  \
                         markdown  Pull-request comment markup"
    )]
    format: OutputFormat,

    /// Enable verbose output
    #[arg(long, short, global = true)]
    verbose: bool,

    /// When to use colors
    #[arg(long, global = true, default_value = "auto")]
    color: ColorChoice,
}

#[derive(Subcommand)]
enum Command {
    /// Collect the diff between two revisions as JSON
    #[command(long_about = "Collect the diff between two revisions as JSON.\n\n\
        INITIAL defaults to HEAD; use `null` for the empty tree. Without TERMINAL the\n\
        working copy is compared against INITIAL.\n\n\
        Examples:\n  locust git HEAD~1 HEAD\n  locust git main --repo ../service")]
    Git {
        #[command(flatten)]
        revs: Revisions,
        /// Write the result to a file instead of stdout
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Find changed definitions in a diff
    #[command(long_about = "Find changed definitions in a diff.\n\n\
        Reads the JSON written by `locust git` (stdin by default) and prints the\n\
        changed definitions as JSON. Python is analyzed natively; other languages\n\
        go through configured or --plugin analyzers.\n\n\
        Examples:\n  locust git HEAD~1 HEAD | locust parse\n  locust parse --input diff.json --plugin 'node js-locust.js'")]
    Parse {
        /// Read the diff from a file instead of stdin
        #[arg(long, short)]
        input: Option<PathBuf>,
        /// Extra analyzer command, repeatable
        #[arg(long = "plugin", value_name = "CMD")]
        plugins: Vec<String>,
        /// Write the result to a file instead of stdout
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Summarize changed definitions
    #[command(long_about = "Summarize changed definitions.\n\n\
        Reads the JSON written by `locust parse` (stdin by default), nests the changes\n\
        and prints them in --format.\n\n\
        Examples:\n  locust parse -i diff.json | locust render --format markdown\n  \
        locust render -i changes.json --github https://github.com/org/repo")]
    Render {
        /// Read changes from a file instead of stdin
        #[arg(long, short)]
        input: Option<PathBuf>,
        #[command(flatten)]
        summary: SummaryArgs,
    },
    /// Collect, parse and render in one step
    #[command(long_about = "Collect, parse and render in one step.\n\n\
        Examples:\n  locust run main HEAD\n  locust run HEAD --format markdown --github https://github.com/org/repo\n  \
        git diff main > changes.patch && locust run main --diff changes.patch")]
    Run {
        #[command(flatten)]
        revs: Revisions,
        /// Read a unified diff from a file instead of asking git
        #[arg(long)]
        diff: Option<PathBuf>,
        /// Extra analyzer command, repeatable
        #[arg(long = "plugin", value_name = "CMD")]
        plugins: Vec<String>,
        #[command(flatten)]
        summary: SummaryArgs,
    },
    /// Create a default .locust.toml configuration file
    #[command(long_about = "Create a default .locust.toml configuration file.\n\n\
        Generates a commented-out template with all available options.\n\
        Fails if .locust.toml already exists.")]
    Init,
    /// Generate shell completion scripts
    #[command(hide = true)]
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(clap::Args)]
struct Revisions {
    /// Initial revision (`null` for the empty tree)
    #[arg(default_value = "HEAD")]
    initial: String,
    /// Terminal revision (default: the working copy)
    terminal: Option<String>,
    /// Repository path (default: current directory)
    #[arg(long, short, default_value = ".")]
    repo: PathBuf,
}

#[derive(clap::Args)]
struct SummaryArgs {
    /// GitHub repository URL used to link changes (e.g. https://github.com/org/repo)
    #[arg(long)]
    github: Option<String>,
    /// JSON object merged into the summary
    #[arg(long, short)]
    metadata: Option<String>,
    /// Write the summary to a file instead of stdout
    #[arg(long, short)]
    output: Option<PathBuf>,
}

#[derive(Clone, PartialEq, Eq, ValueEnum)]
enum ColorChoice {
    /// Auto-detect based on terminal
    Auto,
    /// Always use colors
    Always,
    /// Never use colors
    Never,
}

fn print_welcome(use_color: bool) {
    let version = env!("CARGO_PKG_VERSION");

    if use_color {
        println!("\x1b[1mlocust\x1b[0m v{version}: which definitions did this change touch?\n");

        println!("Quick start:");
        println!("  \x1b[36mlocust init\x1b[0m                Create a .locust.toml config file");
        println!("  \x1b[36mlocust run main HEAD\x1b[0m       Summarize a branch against main");
        println!("  \x1b[36mlocust run HEAD\x1b[0m            Summarize uncommitted work\n");

        println!("All commands:");
        println!("  \x1b[32mgit\x1b[0m      Collect a diff as JSON");
        println!("  \x1b[32mparse\x1b[0m    Find changed definitions in a diff");
        println!("  \x1b[32mrender\x1b[0m   Summarize changed definitions");
        println!("  \x1b[32mrun\x1b[0m      All three stages in one step");
        println!("  \x1b[32minit\x1b[0m     Create default configuration\n");
    } else {
        println!("locust v{version}: which definitions did this change touch?\n");

        println!("Quick start:");
        println!("  locust init                Create a .locust.toml config file");
        println!("  locust run main HEAD       Summarize a branch against main");
        println!("  locust run HEAD            Summarize uncommitted work\n");

        println!("All commands:");
        println!("  git      Collect a diff as JSON");
        println!("  parse    Find changed definitions in a diff");
        println!("  render   Summarize changed definitions");
        println!("  run      All three stages in one step");
        println!("  init     Create default configuration\n");
    }

    println!("Run 'locust <command> --help' for details.");
}

fn read_input(file: &Option<PathBuf>) -> Result<String> {
    match file {
        Some(path) => std::fs::read_to_string(path)
            .into_diagnostic()
            .wrap_err(format!("reading {}", path.display())),
        None => {
            let mut input = String::new();
            std::io::stdin()
                .read_to_string(&mut input)
                .into_diagnostic()
                .wrap_err("reading stdin")?;
            Ok(input)
        }
    }
}

fn write_output(output: &Option<PathBuf>, content: &str) -> Result<()> {
    match output {
        Some(path) => {
            let mut content = content.to_string();
            if !content.ends_with('\n') {
                content.push('\n');
            }
            std::fs::write(path, content)
                .into_diagnostic()
                .wrap_err(format!("writing {}", path.display()))
        }
        None => {
            if content.ends_with('\n') {
                print!("{content}");
            } else {
                println!("{content}");
            }
            Ok(())
        }
    }
}

/// Turn a `--plugin` command line into a plugin definition.
fn plugin_from_arg(arg: &str) -> Result<PluginConfig> {
    let mut words = arg.split_whitespace();
    let Some(command) = words.next() else {
        miette::bail!("--plugin needs a command");
    };
    Ok(PluginConfig {
        name: arg.to_string(),
        command: command.to_string(),
        args: words.map(str::to_string).collect(),
        timeout_secs: None,
    })
}

fn parse_metadata(raw: &Option<String>) -> Result<Option<Map<String, Value>>> {
    raw.as_deref()
        .map(|s| {
            serde_json::from_str::<Map<String, Value>>(s)
                .into_diagnostic()
                .wrap_err("--metadata must be a JSON object")
        })
        .transpose()
}

fn summarize(result: &ParseResult, args: &SummaryArgs, config: &LocustConfig) -> Result<Summary> {
    let forest = build_forest(&result.changes);
    let mut summary = Summary::from_forest(&forest)
        .with_refs(&result.initial_ref, result.terminal_ref.as_deref());

    if let Some(metadata) = parse_metadata(&args.metadata)? {
        summary = summary.with_metadata(metadata);
    }

    let github = args.github.as_deref().or(config.render.github_url.as_deref());
    if let Some(url) = github {
        if result.terminal_ref.is_some() {
            summary = summary.with_github_links(url, result.terminal_ref.as_deref())?;
        } else {
            log::warn!("not linking to {url}: the working copy has no ref to link to");
        }
    }
    Ok(summary)
}

fn collect_from_patch_file(path: &Path, revs: &Revisions) -> Result<DiffResult> {
    let text = std::fs::read_to_string(path)
        .into_diagnostic()
        .wrap_err(format!("reading {}", path.display()))?;
    let mut patches = locust_difflens::parser::parse_unified_diff(&text)?;
    locust_difflens::parser::attach_sources(&mut patches, &revs.repo)?;
    Ok(DiffResult {
        repo_identity: revs.repo.display().to_string(),
        initial_ref: revs.initial.clone(),
        terminal_ref: revs.terminal.clone(),
        patches,
    })
}

const DEFAULT_CONFIG: &str = r#"# Locust Configuration

[parse]
# Emit imports and uses of imported names as changes
# dependencies = true
# Path prefixes stripped before computing Python module paths
# source_roots = ["src"]
# Files excluded from native analysis
# skip_patterns = ["tests/**", "*_pb2.py"]
# max_concurrency = 8
# plugin_concurrency = 4

[render]
# github_url = "https://github.com/org/repo"
# max_depth = 2
# compressed = true

# External analyzers for other languages. Each is run as
# `command args... <input.json> <output.json>`.
# [[plugins]]
# name = "javascript"
# command = "node"
# args = ["tools/locust-js.js"]
# timeout_secs = 60
"#;

#[tokio::main]
async fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .build(),
        )
    }))
    .into_diagnostic()?;
    human_panic::setup_panic!();

    let cli = Cli::parse();

    let level = if cli.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Warn
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();

    let mut config = match &cli.config {
        Some(path) => LocustConfig::from_file(path)?,
        None => {
            let default_path = Path::new(".locust.toml");
            if default_path.exists() {
                LocustConfig::from_file(default_path)?
            } else {
                LocustConfig::default()
            }
        }
    };

    let use_color = match cli.color {
        ColorChoice::Always => true,
        ColorChoice::Never => false,
        ColorChoice::Auto => std::io::stdout().is_terminal() && std::env::var("NO_COLOR").is_err(),
    };

    if cli.verbose {
        eprintln!("format: {}", cli.format);
        if !config.plugins.is_empty() {
            let names: Vec<&str> = config.plugins.iter().map(|p| p.name.as_str()).collect();
            eprintln!("Plugins: {} configured ({})", names.len(), names.join(", "));
        }
    }

    match cli.command {
        None => {
            print_welcome(use_color);
            return Ok(());
        }
        Some(Command::Git { ref revs, ref output }) => {
            let diff = locust_gitpulse::collect_diff(
                &revs.repo,
                &revs.initial,
                revs.terminal.as_deref(),
            )?;
            if cli.verbose {
                eprintln!("Collected {} patches.", diff.patches.len());
            }
            write_output(output, &serde_json::to_string_pretty(&diff).into_diagnostic()?)?;
        }
        Some(Command::Parse {
            ref input,
            ref plugins,
            ref output,
        }) => {
            for arg in plugins {
                config.plugins.push(plugin_from_arg(arg)?);
            }
            let diff = DiffResult::from_json(&read_input(input)?)?;
            let analysis = analyze(&diff, &config).await;
            if cli.verbose {
                eprintln!("{}", analysis.stats);
            }
            write_output(
                output,
                &serde_json::to_string_pretty(&analysis.result).into_diagnostic()?,
            )?;
        }
        Some(Command::Render {
            ref input,
            ref summary,
        }) => {
            let result = ParseResult::from_json(&read_input(input)?)?;
            let rendered = locust_render::render(
                &summarize(&result, summary, &config)?,
                cli.format,
                &config.render,
            )?;
            write_output(&summary.output, &rendered)?;
        }
        Some(Command::Run {
            ref revs,
            ref diff,
            ref plugins,
            ref summary,
        }) => {
            for arg in plugins {
                config.plugins.push(plugin_from_arg(arg)?);
            }
            let collected = match diff {
                Some(path) => collect_from_patch_file(path, revs)?,
                None => locust_gitpulse::collect_diff(
                    &revs.repo,
                    &revs.initial,
                    revs.terminal.as_deref(),
                )?,
            };
            let analysis = analyze(&collected, &config).await;
            if cli.verbose {
                eprintln!("{}", analysis.stats);
            }
            let rendered = locust_render::render(
                &summarize(&analysis.result, summary, &config)?,
                cli.format,
                &config.render,
            )?;
            write_output(&summary.output, &rendered)?;
        }
        Some(Command::Init) => {
            let path = Path::new(".locust.toml");
            if path.exists() {
                miette::bail!(".locust.toml already exists");
            }
            std::fs::write(path, DEFAULT_CONFIG).into_diagnostic()?;
            println!("Created .locust.toml with default configuration");
        }
        Some(Command::Completions { shell }) => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "locust", &mut std::io::stdout());
        }
    }

    Ok(())
}
