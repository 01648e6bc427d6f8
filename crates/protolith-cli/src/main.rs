use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use protolith_core::{CancellationToken, Config, ModuleRef, Report, Severity};
use protolith_engine::{detect_breaking, lint, report, RuleCatalog, RuleFamily};
use protolith_image::{build_workspace, Image, JsonSyntaxParser, PipelineError, WorkspaceBuild};
use protolith_source::{CachedProvider, DirectoryProvider, LayeredProvider, SourceProvider};

/// Config file looked up in the workspace directory when --config is absent
const CONFIG_FILE: &str = "protolith.toml";

/// Exit status after Ctrl-C
const EXIT_CANCELLED: i32 = 130;

/// Protolith - schema module builder, linter and breaking change detector
#[derive(Parser)]
#[command(name = "protolith")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to config file (default: <workspace>/protolith.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Extra module directories consulted after the workspace, in order
    #[arg(long, global = true)]
    vendor: Vec<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve modules and build the image
    Build {
        /// Workspace directory
        dir: PathBuf,

        /// Write the image JSON here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Run lint rules over the workspace
    Lint {
        /// Workspace directory
        dir: PathBuf,

        #[arg(short, long, value_enum, default_value = "text")]
        format: Format,
    },

    /// Compare the workspace against a previous version
    Breaking {
        /// Workspace directory with the new version
        dir: PathBuf,

        /// Workspace directory with the previous version
        #[arg(short, long)]
        against: PathBuf,

        #[arg(short, long, value_enum, default_value = "text")]
        format: Format,
    },

    /// List the built-in rules
    LsRules {
        /// List breaking rules instead of lint rules
        #[arg(long)]
        breaking: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Text,
    Json,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupted, cancelling");
            on_interrupt.cancel();
        }
    });

    let code = match &cli.command {
        Commands::Build { dir, output } => build_command(&cli, dir, output.as_deref(), &cancel).await?,
        Commands::Lint { dir, format } => lint_command(&cli, dir, *format, &cancel).await?,
        Commands::Breaking { dir, against, format } => {
            breaking_command(&cli, dir, against, *format, &cancel).await?
        }
        Commands::LsRules { breaking } => ls_rules_command(*breaking),
    };

    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}

/// `PROTOLITH_LOG` filter, `warn` by default; `--verbose` forces `debug`
fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_env("PROTOLITH_LOG").unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn load_config(cli: &Cli, dir: &Path) -> Result<Config> {
    if let Some(path) = &cli.config {
        return Ok(Config::from_file(path)?);
    }

    let candidate = dir.join(CONFIG_FILE);
    if candidate.exists() {
        tracing::debug!(path = %candidate.display(), "loading config");
        Ok(Config::from_file(&candidate)?)
    } else {
        if cli.verbose {
            eprintln!("{}", "No config file found, using defaults".yellow());
        }
        Ok(Config::default())
    }
}

/// Workspace directory first, then vendored directories, behind one cache
fn open_provider(cli: &Cli, dir: &Path) -> Result<(DirectoryProvider, CachedProvider)> {
    let workspace = DirectoryProvider::open(dir)?;

    let mut layered = LayeredProvider::new().with_layer(Arc::new(workspace.clone()));
    for vendor in &cli.vendor {
        layered = layered.with_layer(Arc::new(DirectoryProvider::open(vendor)?));
    }
    tracing::debug!(layers = layered.layer_count(), "opened providers");

    Ok((workspace, CachedProvider::new(Arc::new(layered))))
}

/// Configured roots, or every module of the workspace directory
///
/// A name present at several versions contributes its highest one.
fn root_modules(config: &Config, workspace: &DirectoryProvider) -> Result<Vec<ModuleRef>> {
    // modules() is sorted by name then version, so the last entry per name wins
    let available: BTreeMap<String, ModuleRef> = workspace
        .modules()
        .into_iter()
        .map(|m| (m.name.clone(), m))
        .collect();
    if config.workspace.roots.is_empty() {
        return Ok(available.into_values().collect());
    }

    config
        .workspace
        .roots
        .iter()
        .map(|name| {
            available
                .get(name)
                .cloned()
                .ok_or_else(|| anyhow!("Root module {} not found in {}", name, workspace.root().display()))
        })
        .collect()
}

/// Build outcome the commands act on
enum Built {
    Image(WorkspaceBuild),
    Failed(i32),
}

async fn build_dir(cli: &Cli, config: &Config, dir: &Path, cancel: &CancellationToken) -> Result<Built> {
    let (workspace, provider) = open_provider(cli, dir)?;
    let roots = root_modules(config, &workspace)?;

    if cli.verbose {
        let names: Vec<String> = roots.iter().map(|r| r.to_string()).collect();
        eprintln!("{} {}", "Building".cyan(), names.join(", "));
    }

    tracing::info!(dir = %dir.display(), roots = roots.len(), "building workspace");
    let provider: &dyn SourceProvider = &provider;
    match build_workspace(&roots, provider, &JsonSyntaxParser, cancel).await {
        Ok(build) => {
            tracing::info!(files = build.image.len(), "image built");
            Ok(Built::Image(build))
        }
        Err(e) if e.is_cancelled() => {
            eprintln!("{}", "Cancelled".yellow());
            Ok(Built::Failed(EXIT_CANCELLED))
        }
        Err(PipelineError::Build(errors)) => {
            eprintln!("{} {}", "Build failed in".red().bold(), dir.display());
            for error in errors.iter() {
                eprintln!("  {}", error);
            }
            Ok(Built::Failed(1))
        }
        Err(e) => Err(e.into()),
    }
}

async fn build_command(cli: &Cli, dir: &Path, output: Option<&Path>, cancel: &CancellationToken) -> Result<i32> {
    let config = load_config(cli, dir)?;
    let build = match build_dir(cli, &config, dir, cancel).await? {
        Built::Image(build) => build,
        Built::Failed(code) => return Ok(code),
    };

    for warning in build.warnings() {
        eprintln!("{} {}", "warning:".yellow(), warning);
    }

    let json = build.image.to_json()?;
    match output {
        Some(path) => {
            std::fs::write(path, json)?;
            eprintln!(
                "{} {} files to {}",
                "✓ Wrote".green(),
                build.image.len(),
                path.display()
            );
        }
        None => println!("{}", json),
    }
    Ok(0)
}

async fn lint_command(cli: &Cli, dir: &Path, format: Format, cancel: &CancellationToken) -> Result<i32> {
    let config = load_config(cli, dir)?;
    let catalog = RuleCatalog::builtin();
    let rules = catalog.resolve_lint(&config.lint)?;
    tracing::debug!(rules = rules.len(), "resolved lint rules");

    let build = match build_dir(cli, &config, dir, cancel).await? {
        Built::Image(build) => build,
        Built::Failed(code) => return Ok(code),
    };

    let files_checked = build.image.non_import_files().count();
    let mut findings = build.warnings().to_vec();

    tracing::info!("running lint rules");
    match lint(Arc::new(build.image), &rules, cancel).await {
        Ok(found) => findings.extend(found),
        Err(e) if e.is_cancelled() => {
            eprintln!("{}", "Cancelled".yellow());
            return Ok(EXIT_CANCELLED);
        }
        Err(e) => return Err(e.into()),
    }

    let report = Report::from_findings(report(findings, rules.filter())).with_scope(files_checked, rules.len());
    emit(&report, format)
}

async fn breaking_command(
    cli: &Cli,
    dir: &Path,
    against: &Path,
    format: Format,
    cancel: &CancellationToken,
) -> Result<i32> {
    let config = load_config(cli, dir)?;
    let catalog = RuleCatalog::builtin();
    let rules = catalog.resolve_breaking(&config.breaking)?;
    tracing::debug!(rules = rules.len(), "resolved breaking rules");

    let before = match build_dir(cli, &config, against, cancel).await? {
        Built::Image(build) => build.image,
        Built::Failed(code) => return Ok(code),
    };
    let after = match build_dir(cli, &config, dir, cancel).await? {
        Built::Image(build) => build.image,
        Built::Failed(code) => return Ok(code),
    };

    let files_checked = after.non_import_files().count();
    let (before, after): (Arc<Image>, Arc<Image>) = (Arc::new(before), Arc::new(after));

    tracing::info!("running breaking rules");
    let findings = match detect_breaking(before, after, &rules, cancel).await {
        Ok(found) => found,
        Err(e) if e.is_cancelled() => {
            eprintln!("{}", "Cancelled".yellow());
            return Ok(EXIT_CANCELLED);
        }
        Err(e) => return Err(e.into()),
    };

    let report = Report::from_findings(report(findings, rules.filter())).with_scope(files_checked, rules.len());
    emit(&report, format)
}

/// Print the report and return its exit status
fn emit(report: &Report, format: Format) -> Result<i32> {
    match format {
        Format::Json => println!("{}", report.to_json()?),
        Format::Text => {
            print!("{}", report.to_text());
            print_summary(report);
        }
    }
    Ok(report.exit_code())
}

fn print_summary(report: &Report) {
    let summary = &report.summary;
    let errors = if summary.errors > 0 {
        summary.errors.to_string().red().bold()
    } else {
        summary.errors.to_string().green()
    };
    let warnings = if summary.warnings > 0 {
        summary.warnings.to_string().yellow()
    } else {
        summary.warnings.to_string().green()
    };

    if report.findings.is_empty() {
        eprintln!(
            "{} ({} files, {} rules)",
            "✓ No issues found".green().bold(),
            summary.files_checked,
            summary.rules_run
        );
    } else {
        eprintln!(
            "{} errors, {} warnings ({} files, {} rules)",
            errors, warnings, summary.files_checked, summary.rules_run
        );
    }
}

fn ls_rules_command(breaking: bool) -> i32 {
    let catalog = RuleCatalog::builtin();
    if breaking {
        print_family(&catalog.breaking);
    } else {
        print_family(&catalog.lint);
    }
    0
}

fn print_family<C: Clone>(family: &RuleFamily<C>) {
    println!("{}", "Categories:".bold());
    for name in family.category_names() {
        let size = family.category(name).map(|c| c.len()).unwrap_or(0);
        let contains: Vec<&str> = family
            .subsets_of(name)
            .map(|s| s.iter().copied().collect())
            .unwrap_or_default();
        let marker = if name == family.default_category() { " (default)" } else { "" };

        if contains.is_empty() {
            println!("  {}{} - {} rules", name.cyan(), marker, size);
        } else {
            println!("  {}{} - {} rules, contains {}", name.cyan(), marker, size, contains.join(", "));
        }
    }
    println!();

    println!("{}", "Rules:".bold());
    for rule in family.rules() {
        let severity = match rule.severity {
            Severity::Error => "error".red(),
            Severity::Warn => "warn".yellow(),
            Severity::Info => "info".cyan(),
        };
        println!(
            "  {:<44} {:<6} {:<24} {}",
            rule.id,
            severity,
            rule.categories.join(","),
            rule.purpose
        );
    }
}
