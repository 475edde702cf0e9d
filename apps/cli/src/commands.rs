//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use docsetter_core::{AssembleConfig, assemble, build_index, validate_docset};
use docsetter_html::{add_dash_anchors, rewrite_tree};
use docsetter_shared::{
    AppConfig, DiagnosticSink, ErrorPolicy, IndexRecord, TracingDiagnostics, TreeConfig,
    init_config, load_config, load_config_from,
};
use docsetter_storage::IndexStore;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// docsetter: turn a built documentation site into a docset.
#[derive(Parser)]
#[command(
    name = "docsetter",
    version,
    about = "Package statically generated documentation sites as offline docsets.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file to use instead of ~/.docsetter/docsetter.toml.
    #[arg(long, global = true, env = "DOCSETTER_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Make root-relative links in a document tree relative, in place.
    RewriteLinks {
        /// Root of the document tree.
        root: PathBuf,

        /// Only rewrite files whose name ends with this suffix.
        #[arg(long)]
        suffix: Option<String>,

        /// What to do with documents that cannot be decoded: abort or skip.
        #[arg(long)]
        on_markup_error: Option<ErrorPolicy>,
    },

    /// Insert dash anchors before every h1/h2 with an id, in place.
    AddAnchors {
        /// Documents to modify.
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Build a search index from a navigation description.
    Index {
        /// Navigation description (e.g. mkdocs.yml).
        nav: PathBuf,

        /// Index file to (re)create.
        dsidx: PathBuf,

        /// What to do with malformed entries: abort or skip.
        #[arg(long)]
        on_malformed_entry: Option<ErrorPolicy>,
    },

    /// List or search the entries of a search index.
    Search {
        /// Index file to read.
        dsidx: PathBuf,

        /// Substring to look for in entry names. Lists everything when omitted.
        term: Option<String>,

        /// Maximum number of matches.
        #[arg(long, default_value = "50")]
        limit: u32,

        /// Print results as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Assemble a complete docset from a built site.
    Build {
        /// Built site directory.
        site: PathBuf,

        /// Docset name.
        #[arg(short, long)]
        name: String,

        /// Navigation description (defaults to [navigation].file when present).
        #[arg(long)]
        nav: Option<PathBuf>,

        /// Directory the .docset bundle is written to.
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// 16x16 icon.
        #[arg(long)]
        icon: Option<PathBuf>,

        /// 32x32 icon.
        #[arg(long)]
        icon_2x: Option<PathBuf>,
    },

    /// Check the layout and index of an existing docset.
    Validate {
        /// Path to the .docset directory.
        docset: PathBuf,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "docsetter=info",
        1 => "docsetter=debug",
        _ => "docsetter=trace",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config.as_deref();
    match cli.command {
        Command::RewriteLinks {
            root,
            suffix,
            on_markup_error,
        } => {
            let config = resolve_config(config_path)?;
            cmd_rewrite_links(&root, &config, suffix, on_markup_error)
        }
        Command::AddAnchors { files } => cmd_add_anchors(&files),
        Command::Index {
            nav,
            dsidx,
            on_malformed_entry,
        } => {
            let config = resolve_config(config_path)?;
            let policy = on_malformed_entry.unwrap_or(config.navigation.on_malformed_entry);
            cmd_index(&nav, &dsidx, policy).await
        }
        Command::Search {
            dsidx,
            term,
            limit,
            json,
        } => cmd_search(&dsidx, term.as_deref(), limit, json).await,
        Command::Build {
            site,
            name,
            nav,
            out,
            icon,
            icon_2x,
        } => {
            let config = resolve_config(config_path)?;
            let build = BuildArgs {
                site,
                name,
                nav,
                out,
                icon,
                icon_2x,
            };
            cmd_build(build, &config).await
        }
        Command::Validate { docset } => cmd_validate(&docset).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(config_path),
        },
    }
}

fn resolve_config(path: Option<&Path>) -> Result<AppConfig> {
    let config = match path {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    };
    Ok(config)
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

fn cmd_rewrite_links(
    root: &Path,
    config: &AppConfig,
    suffix: Option<String>,
    on_markup_error: Option<ErrorPolicy>,
) -> Result<()> {
    let mut tree = TreeConfig::from(config);
    if let Some(suffix) = suffix {
        tree.suffix = suffix;
    }
    if let Some(policy) = on_markup_error {
        tree.on_markup_error = policy;
    }

    info!(root = %root.display(), suffix = %tree.suffix, "rewriting links");
    let report = rewrite_tree(root, &tree, &TracingDiagnostics)?;

    println!(
        "Rewrote {} links in {} files",
        report.links_rewritten, report.files_written
    );
    for path in &report.skipped {
        println!("  skipped: {}", path.display());
    }
    Ok(())
}

fn cmd_add_anchors(files: &[PathBuf]) -> Result<()> {
    for file in files {
        let added = add_dash_anchors(file)?;
        info!(path = %file.display(), added, "added dash anchors");
        println!("{}: {added} anchors", file.display());
    }
    Ok(())
}

async fn cmd_index(nav: &Path, dsidx: &Path, policy: ErrorPolicy) -> Result<()> {
    info!(nav = %nav.display(), dsidx = %dsidx.display(), "building search index");
    let report = build_index(nav, dsidx, policy, &TracingDiagnostics).await?;

    println!(
        "Indexed {} entries into {} ({} duplicates ignored)",
        report.records_added,
        report.index_path.display(),
        report.duplicates
    );
    Ok(())
}

async fn cmd_search(dsidx: &Path, term: Option<&str>, limit: u32, json: bool) -> Result<()> {
    let store = IndexStore::open_readonly(dsidx).await?;
    let records: Vec<IndexRecord> = match term {
        Some(term) => store.search(term, limit).await?,
        None => store.records().await?,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }

    if records.is_empty() {
        println!("No entries found.");
        return Ok(());
    }
    for record in &records {
        println!("{:<40} {:<8} {}", record.name, record.kind, record.path);
    }
    Ok(())
}

/// Arguments of `docsetter build`, before merging with the config file.
struct BuildArgs {
    site: PathBuf,
    name: String,
    nav: Option<PathBuf>,
    out: Option<PathBuf>,
    icon: Option<PathBuf>,
    icon_2x: Option<PathBuf>,
}

async fn cmd_build(args: BuildArgs, config: &AppConfig) -> Result<()> {
    // An explicit --nav must exist; the configured default is optional.
    let nav = match args.nav {
        Some(nav) => Some(nav),
        None => Some(PathBuf::from(&config.navigation.file)).filter(|p| p.is_file()),
    };
    if nav.is_none() {
        tracing::warn!("no navigation description found, the index will be empty");
    }

    let assemble_config = AssembleConfig {
        name: args.name,
        site_dir: args.site,
        output_dir: args
            .out
            .unwrap_or_else(|| PathBuf::from(&config.docset.output_dir)),
        nav,
        tree: TreeConfig::from(config),
        on_malformed_entry: config.navigation.on_malformed_entry,
        remove: config.docset.remove.clone(),
        icon: args.icon.or_else(|| config.docset.icon.as_ref().map(PathBuf::from)),
        icon_2x: args
            .icon_2x
            .or_else(|| config.docset.icon_2x.as_ref().map(PathBuf::from)),
    };

    info!(
        name = %assemble_config.name,
        site = %assemble_config.site_dir.display(),
        "building docset"
    );

    let reporter = CliProgress::new();
    let result = assemble(&assemble_config, &reporter).await;
    reporter.finish();
    let result = result?;

    println!();
    println!("  Docset created successfully!");
    println!("  Path:     {}", result.docset_path.display());
    println!("  Files:    {}", result.files_processed);
    println!("  Links:    {}", result.links_rewritten);
    println!("  Anchors:  {}", result.anchors_added);
    println!("  Entries:  {}", result.index_records);
    if !result.skipped.is_empty() {
        println!("  Skipped:  {}", result.skipped.len());
    }
    println!();

    Ok(())
}

async fn cmd_validate(docset: &Path) -> Result<()> {
    if !docset.is_dir() {
        return Err(eyre!("'{}' is not a directory", docset.display()));
    }
    let entries = validate_docset(docset).await?;
    println!("{} is valid ({entries} index entries)", docset.display());
    Ok(())
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(path: Option<&Path>) -> Result<()> {
    let config = resolve_config(path)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// Diagnostic sink showing an indicatif spinner, forwarding events to tracing.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
            spinner.set_style(
                style.tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
            );
        }
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }

    fn finish(&self) {
        self.spinner.finish_and_clear();
    }
}

impl DiagnosticSink for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
        TracingDiagnostics.phase(name);
    }

    fn file_rewritten(&self, path: &Path, links_changed: usize) {
        self.spinner
            .set_message(format!("Rewriting {}", path.display()));
        TracingDiagnostics.file_rewritten(path, links_changed);
    }

    fn anchors_added(&self, path: &Path, count: usize) {
        TracingDiagnostics.anchors_added(path, count);
    }

    fn file_skipped(&self, path: &Path, reason: &str) {
        self.spinner
            .suspend(|| TracingDiagnostics.file_skipped(path, reason));
    }

    fn entry_skipped(&self, title: &str, reason: &str) {
        TracingDiagnostics.entry_skipped(title, reason);
    }

    fn entry_malformed(&self, detail: &str) {
        self.spinner
            .suspend(|| TracingDiagnostics.entry_malformed(detail));
    }

    fn record_added(&self, record: &IndexRecord) {
        self.spinner
            .set_message(format!("Indexing {}", record.name));
        tracing::debug!(name = %record.name, path = %record.path, "indexed");
    }
}
