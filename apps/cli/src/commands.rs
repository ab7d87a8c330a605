//! CLI command definitions, routing, and tracing setup.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use contentlist_core::prefs::{self, PrefsUpdate, UpdateOutcome};
use contentlist_core::{HeadingExtractor, RenderOptions, normalize_input, render_with};
use contentlist_shared::{
    AppConfig, ContentListError, OutlinePrefs, PrefKey, SnapshotKind, init_config, load_config,
    resolve_secret,
};
use contentlist_storage::Storage;
use tracing::{info, warn};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// contentlist — anchor article headings and build a navigable outline.
#[derive(Parser)]
#[command(
    name = "contentlist",
    version,
    about = "Anchor article headings and prepend a two-level table of contents.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

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
    /// Render an article: anchor headings and optionally prepend the outline.
    Render {
        /// HTML file to render.
        file: PathBuf,

        /// Article ID whose stored preferences apply.
        #[arg(short, long)]
        article: Option<i64>,

        /// Show the outline regardless of stored preferences.
        #[arg(long)]
        show: bool,

        /// Restrict the outline to root headings regardless of stored preferences.
        #[arg(long)]
        one_level: bool,

        /// Write the result here instead of stdout.
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Print the extracted heading records as JSON.
    Headings {
        /// HTML file to inspect.
        file: PathBuf,
    },

    /// Per-article preference management.
    Prefs {
        /// Prefs subcommand.
        #[command(subcommand)]
        action: PrefsAction,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Preference subcommands.
#[derive(Subcommand)]
pub(crate) enum PrefsAction {
    /// Show stored preferences for an article.
    Show {
        #[arg(short, long)]
        article: i64,
    },
    /// Print the anti-forgery token for an article's update form.
    Token {
        #[arg(short, long)]
        article: i64,
    },
    /// Submit a preference update. An empty value deletes the flag.
    Set {
        #[arg(short, long)]
        article: i64,

        /// Outline visible ("1" to enable, "" to clear).
        #[arg(long)]
        need: Option<String>,

        /// Root headings only ("1" to enable, "" to clear).
        #[arg(long)]
        one_level: Option<String>,

        /// Anti-forgery token issued by `prefs token`.
        #[arg(long)]
        token: Option<String>,

        /// Record kind the update targets.
        #[arg(long, value_enum, default_value = "article")]
        snapshot: SnapshotArg,
    },
}

/// Record kind as accepted on the command line.
#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub(crate) enum SnapshotArg {
    Article,
    Autosave,
    Revision,
}

impl From<SnapshotArg> for SnapshotKind {
    fn from(arg: SnapshotArg) -> Self {
        match arg {
            SnapshotArg::Article => SnapshotKind::Article,
            SnapshotArg::Autosave => SnapshotKind::Autosave,
            SnapshotArg::Revision => SnapshotKind::Revision,
        }
    }
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

/// Initialize tracing based on CLI flags. Logs go to stderr so rendered
/// HTML on stdout stays clean.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = format!(
        "contentlist_cli={level},contentlist_core={level},contentlist_storage={level},contentlist_shared={level}"
    );

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .with_target(false)
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
    match cli.command {
        Command::Render {
            file,
            article,
            show,
            one_level,
            out,
        } => cmd_render(&file, article, show, one_level, out.as_deref()).await,
        Command::Headings { file } => cmd_headings(&file).await,
        Command::Prefs { action } => match action {
            PrefsAction::Show { article } => cmd_prefs_show(article).await,
            PrefsAction::Token { article } => cmd_prefs_token(article).await,
            PrefsAction::Set {
                article,
                need,
                one_level,
                token,
                snapshot,
            } => cmd_prefs_set(article, need, one_level, token, snapshot.into()).await,
        },
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show().await,
        },
    }
}

// ---------------------------------------------------------------------------
// Render commands
// ---------------------------------------------------------------------------

async fn cmd_render(
    file: &Path,
    article: Option<i64>,
    show: bool,
    one_level: bool,
    out: Option<&Path>,
) -> Result<()> {
    let config = load_config()?;
    let content = read_article(file)?;

    let mut outline_prefs = match article {
        Some(article_id) => stored_prefs(&config, article_id).await?,
        None => OutlinePrefs::default(),
    };
    outline_prefs.show_outline |= show;
    outline_prefs.one_level_only |= one_level;

    let rendered = render_with(&content, outline_prefs, &RenderOptions::from(&config));

    info!(
        file = %file.display(),
        headings = rendered.headings.len(),
        outline = rendered.with_outline,
        "article rendered"
    );

    match out {
        Some(path) => {
            std::fs::write(path, &rendered.html).map_err(|e| ContentListError::io(path, e))?;
        }
        None => println!("{}", rendered.html),
    }

    Ok(())
}

async fn cmd_headings(file: &Path) -> Result<()> {
    let config = load_config()?;
    let content = read_article(file)?;

    let options = RenderOptions::from(&config);
    let extraction = HeadingExtractor::new(&options.extract).extract(&content);

    println!("{}", serde_json::to_string_pretty(&extraction.headings)?);
    Ok(())
}

fn read_article(file: &Path) -> Result<String> {
    let bytes = std::fs::read(file).map_err(|e| ContentListError::io(file, e))?;
    Ok(normalize_input(&bytes))
}

/// Stored preferences for `article_id`; defaults when no store exists yet.
async fn stored_prefs(config: &AppConfig, article_id: i64) -> Result<OutlinePrefs> {
    let db_path = config.db_path()?;
    if !db_path.exists() {
        warn!(path = %db_path.display(), "preference store not found, using defaults");
        return Ok(OutlinePrefs::default());
    }

    let storage = Storage::open_readonly(&db_path).await?;
    Ok(prefs::load_prefs(&storage, article_id).await?)
}

// ---------------------------------------------------------------------------
// Preference commands
// ---------------------------------------------------------------------------

async fn cmd_prefs_show(article: i64) -> Result<()> {
    let config = load_config()?;
    let db_path = config.db_path()?;
    if !db_path.exists() {
        println!("No preferences stored (store not found at {}).", db_path.display());
        return Ok(());
    }

    let storage = Storage::open_readonly(&db_path).await?;
    let stored = storage.list_meta(article).await?;
    let resolved = prefs::load_prefs(&storage, article).await?;

    println!();
    println!("  Article:     {article}");
    for (key, value) in &stored {
        println!("  {key}: {value:?}");
    }
    println!("  Outline:     {}", if resolved.show_outline { "shown" } else { "hidden" });
    println!("  One level:   {}", resolved.one_level_only);
    println!();

    Ok(())
}

async fn cmd_prefs_token(article: i64) -> Result<()> {
    let config = load_config()?;
    let secret = resolve_secret(&config)?;
    println!("{}", prefs::issue_token(&secret, article));
    Ok(())
}

async fn cmd_prefs_set(
    article: i64,
    need: Option<String>,
    one_level: Option<String>,
    token: Option<String>,
    snapshot: SnapshotKind,
) -> Result<()> {
    let config = load_config()?;
    let secret = resolve_secret(&config)?;
    let storage = Storage::open(&config.db_path()?).await?;

    let update = PrefsUpdate {
        article_id: article,
        fields: collect_fields(need, one_level),
        token,
        snapshot,
    };

    match prefs::apply_update(&storage, &secret, &update).await {
        Ok(UpdateOutcome::Skipped) => {
            println!("Nothing to update: pass --need and/or --one-level.");
            Ok(())
        }
        Ok(UpdateOutcome::Applied { written, deleted }) => {
            println!("Preferences updated for article {article} ({written} set, {deleted} cleared).");
            Ok(())
        }
        Err(e @ ContentListError::Rejected { .. }) => Err(eyre!("{e}; stored preferences unchanged")),
        Err(e) => Err(e.into()),
    }
}

/// Form fields for an update; `None` when no flag was passed at all.
fn collect_fields(
    need: Option<String>,
    one_level: Option<String>,
) -> Option<BTreeMap<String, String>> {
    let fields: BTreeMap<String, String> = [(PrefKey::Need, need), (PrefKey::OneLevel, one_level)]
        .into_iter()
        .filter_map(|(key, value)| value.map(|v| (key.field_name().to_string(), v)))
        .collect();

    (!fields.is_empty()).then_some(fields)
}

// ---------------------------------------------------------------------------
// Config commands
// ---------------------------------------------------------------------------

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}
