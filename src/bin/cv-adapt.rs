//! CLI binary for cv-adapter.
//!
//! A thin shell over the library: maps flags to `AdapterConfig`, drives a
//! `Session` and writes the results where the user asked.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use cv_adapter::{
    ActionKind, AdapterConfig, CachedDocument, ContentCache, HttpAdaptationClient, PdfPayload,
    ProcessOutput, Session, SessionObserver,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── Spinner observer using indicatif ─────────────────────────────────────────

/// Shows a spinner while the service works and a one-line summary after.
struct SpinnerObserver {
    bar: Mutex<Option<ProgressBar>>,
    enabled: bool,
}

impl SpinnerObserver {
    fn new(enabled: bool) -> Arc<Self> {
        Arc::new(Self {
            bar: Mutex::new(None),
            enabled,
        })
    }
}

impl SessionObserver for SpinnerObserver {
    fn on_loading_start(&self, action: ActionKind) {
        if !self.enabled {
            return;
        }
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  ⏱ {elapsed}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]),
        );
        bar.set_prefix(action.button_label());
        bar.set_message(action.loading_message());
        bar.enable_steady_tick(Duration::from_millis(80));
        if let Ok(mut slot) = self.bar.lock() {
            *slot = Some(bar);
        }
    }

    fn on_loading_end(&self) {
        if let Some(bar) = self.bar.lock().ok().and_then(|mut s| s.take()) {
            bar.finish_and_clear();
        }
    }

    fn on_result(&self, output: &ProcessOutput) {
        if !self.enabled {
            return;
        }
        let secs = output.stats.duration_ms as f64 / 1000.0;
        eprintln!(
            "{} {}  {}",
            green("✔"),
            bold(&output.title),
            dim(&format!("{secs:.1}s")),
        );
        if let (Some(cv), Some(jd)) = (
            output.stats.original_cv_length,
            output.stats.job_description_length,
        ) {
            eprintln!(
                "   {} chars of CV  /  {} chars of job description",
                dim(&cv.to_string()),
                dim(&jd.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Adapt a CV to a LinkedIn posting, Markdown to stdout
  cv-adapt process cv.pdf --job-url https://www.linkedin.com/jobs/view/123

  # Cover letter, saved as cover_letter.md and cover_letter.pdf in ./out
  cv-adapt process cv.pdf --job-url https://uk.indeed.com/viewjob?jk=abc \
      --action cover-letter --markdown --pdf -o out

  # Free-form request steered by instructions
  cv-adapt process cv.txt --job-url https://www.reed.co.uk/jobs/1 \
      --action general-purpose --instructions "Summarise the gaps as bullet points"

  # Re-use a CV cached by an earlier run, edit the result before saving
  cv-adapt process --cached cv.pdf --job-url https://www.linkedin.com/jobs/view/9 \
      --edit --markdown

  # Inspect or wipe the local cache
  cv-adapt cache list
  cv-adapt cache clear --yes

  # Check that the service is up
  cv-adapt health

ENVIRONMENT VARIABLES:
  CV_ADAPT_SERVICE_URL    Root URL of the adaptation service
  CV_ADAPT_CACHE_DIR      Directory of the upload cache
  CV_ADAPT_TIMEOUT        Request timeout in seconds (0 = none)
  EDITOR / VISUAL         Editor used by --edit
  RUST_LOG                Log filter (overrides -v / -q)

CACHE:
  Uploaded files are kept for 7 days (10 most recent) in
  ~/.cache/cv-adapt/cv_original_cache.json on Linux,
  ~/Library/Caches/cv-adapt/ on macOS, %LOCALAPPDATA%\cv-adapt\ on Windows.
"#;

/// Adapt a CV to a job posting with a remote adaptation service.
#[derive(Parser, Debug)]
#[command(
    name = "cv-adapt",
    version,
    about = "Adapt a CV to a job posting, write a cover letter, or run a custom request",
    long_about = "Send a CV (PDF or TXT) and a job-posting URL (LinkedIn, Indeed, Reed) to the \
adaptation service, then review, edit and export the result as Markdown or PDF.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Root URL of the adaptation service.
    #[arg(long, global = true, env = "CV_ADAPT_SERVICE_URL", default_value = "http://localhost:8080")]
    service_url: String,

    /// Directory of the upload cache.
    #[arg(long, global = true, env = "CV_ADAPT_CACHE_DIR")]
    cache_dir: Option<PathBuf>,

    /// Request timeout in seconds; 0 waits indefinitely.
    #[arg(long, global = true, env = "CV_ADAPT_TIMEOUT", default_value_t = 180)]
    timeout: u64,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "CV_ADAPT_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors and results.
    #[arg(short, long, global = true, env = "CV_ADAPT_QUIET")]
    quiet: bool,

    /// Disable the spinner.
    #[arg(long, global = true, env = "CV_ADAPT_NO_PROGRESS")]
    no_progress: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Send a CV and a job URL to the service and export the result.
    Process(ProcessArgs),

    /// Inspect or clear the local upload cache.
    #[command(subcommand)]
    Cache(CacheCommand),

    /// Probe the service's health endpoint.
    Health,
}

#[derive(Args, Debug)]
struct ProcessArgs {
    /// CV file (PDF or TXT, at most 10 MB).
    #[arg(required_unless_present = "cached", conflicts_with = "cached")]
    file: Option<PathBuf>,

    /// Use a previously uploaded file from the cache, by file name.
    #[arg(long, value_name = "NAME")]
    cached: Option<String>,

    /// Job posting URL (linkedin.com, indeed.com or reed.co.uk).
    #[arg(short, long, env = "CV_ADAPT_JOB_URL")]
    job_url: String,

    /// What to ask the service for.
    #[arg(short, long, value_enum, default_value = "adapt-cv")]
    action: ActionArg,

    /// Additional instructions (required for general-purpose).
    #[arg(short, long, conflicts_with = "instructions_file")]
    instructions: Option<String>,

    /// Read additional instructions from a file.
    #[arg(long, value_name = "PATH")]
    instructions_file: Option<PathBuf>,

    /// Directory for exported files.
    #[arg(short, long, default_value = ".")]
    output_dir: PathBuf,

    /// Save the result as Markdown ({name}_{role}.md).
    #[arg(long)]
    markdown: bool,

    /// Save the result as PDF, rendered by the service.
    #[arg(long)]
    pdf: bool,

    /// Open a temporary PDF preview; it is deleted after 60 seconds.
    #[arg(long)]
    preview: bool,

    /// Write a standalone HTML results page to this path.
    #[arg(long, value_name = "PATH")]
    html: Option<PathBuf>,

    /// Edit the rendered result in $EDITOR before exporting.
    #[arg(long)]
    edit: bool,

    /// Print the result as JSON instead of Markdown.
    #[arg(long)]
    json: bool,

    /// Send Markdown instead of HTML to the PDF renderer (older services).
    #[arg(long)]
    pdf_from_markdown: bool,
}

#[derive(Subcommand, Debug)]
enum CacheCommand {
    /// List cached uploads, newest first.
    List {
        /// Print as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Remove every cached upload.
    Clear {
        /// Do not ask for confirmation.
        #[arg(short, long)]
        yes: bool,
    },
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum ActionArg {
    AdaptCv,
    CoverLetter,
    GeneralPurpose,
}

impl From<ActionArg> for ActionKind {
    fn from(v: ActionArg) -> Self {
        match v {
            ActionArg::AdaptCv => ActionKind::AdaptCv,
            ActionArg::CoverLetter => ActionKind::CoverLetter,
            ActionArg::GeneralPurpose => ActionKind::GeneralPurpose,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Library INFO logs would fight with the spinner, so they are only
    // shown when the spinner is off.
    let spinner = matches!(cli.command, Command::Process(ref p) if !p.json)
        && !cli.quiet
        && !cli.no_progress;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || spinner {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    match &cli.command {
        Command::Process(args) => run_process(&cli, args, spinner).await,
        Command::Cache(CacheCommand::List { json }) => run_cache_list(&cli, *json),
        Command::Cache(CacheCommand::Clear { yes }) => run_cache_clear(&cli, *yes),
        Command::Health => run_health(&cli).await,
    }
}

/// Map global CLI args to `AdapterConfig`.
fn build_config(cli: &Cli, pdf_payload: PdfPayload) -> Result<AdapterConfig> {
    let timeout = (cli.timeout > 0).then_some(cli.timeout);
    let mut builder = AdapterConfig::builder()
        .service_url(cli.service_url.clone())
        .request_timeout_secs(timeout)
        .pdf_payload(pdf_payload);
    if let Some(ref dir) = cli.cache_dir {
        builder = builder.cache_dir(dir);
    }
    builder.build().context("Invalid configuration")
}

// ── process ──────────────────────────────────────────────────────────────────

async fn run_process(cli: &Cli, args: &ProcessArgs, spinner: bool) -> Result<()> {
    let payload = if args.pdf_from_markdown {
        PdfPayload::Markdown
    } else {
        PdfPayload::Html
    };
    let config = build_config(cli, payload)?;
    let observer = SpinnerObserver::new(spinner);
    let session = Session::connect(config)
        .context("Failed to start session")?
        .with_observer(observer);

    // ── Inputs ───────────────────────────────────────────────────────────
    if let Some(ref name) = args.cached {
        session
            .select_cached(name)
            .with_context(|| format!("Cannot use cached document '{name}'"))?;
    } else if let Some(ref path) = args.file {
        session
            .select_upload_path(path)
            .with_context(|| format!("Cannot use {}", path.display()))?;
    }

    if !session.set_job_url(&args.job_url) {
        cv_adapter::validate_job_url(&args.job_url, &session.config().allowed_domains)
            .context("Job URL rejected")?;
    }

    let action: ActionKind = args.action.into();
    session.set_action(action);

    let instructions = match (&args.instructions, &args.instructions_file) {
        (Some(text), _) => Some(text.clone()),
        (None, Some(path)) => Some(
            tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read instructions from {}", path.display()))?,
        ),
        (None, None) => None,
    };
    if let Some(text) = instructions {
        session.set_instructions(text);
    }

    // ── Run ──────────────────────────────────────────────────────────────
    let mut output = session.process().await.context("Processing failed")?;

    if args.edit {
        let html = session.current_html().unwrap_or_default();
        let edited = tokio::task::block_in_place(|| edit_in_editor(&html))
            .context("Editing failed")?;
        if edited != html {
            output.markdown = session.edit_content(&edited)?;
            output.html = edited;
            if !cli.quiet {
                eprintln!("{} Edits applied", cyan("◆"));
            }
        }
    }

    // ── Outputs ──────────────────────────────────────────────────────────
    let downloads = session.downloads();
    let mut wrote_file = false;

    if args.markdown {
        let path = downloads
            .export_markdown(&args.output_dir)
            .await
            .context("Markdown export failed")?;
        report_written(cli, &path);
        wrote_file = true;
    }

    if args.pdf {
        let path = downloads
            .download_pdf(&args.output_dir)
            .await
            .context("PDF download failed. Try --markdown instead")?;
        report_written(cli, &path);
        wrote_file = true;
    }

    if let Some(ref path) = args.html {
        let page = session.results_page().unwrap_or_default();
        tokio::fs::write(path, page)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
        report_written(cli, path);
        wrote_file = true;
    }

    if args.json {
        let json = serde_json::to_string_pretty(&output).context("Failed to serialise output")?;
        println!("{json}");
    } else if !wrote_file && !args.preview {
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        handle
            .write_all(output.markdown.as_bytes())
            .context("Failed to write to stdout")?;
        if !output.markdown.ends_with('\n') {
            handle.write_all(b"\n").ok();
        }
    }

    if args.preview {
        let preview = downloads.preview_pdf().await.context("PDF preview failed")?;
        if let Err(e) = preview.open_viewer() {
            eprintln!("{} {}", red("✗"), e);
        }
        if !cli.quiet {
            eprintln!(
                "{} Preview at {}  {}",
                cyan("◆"),
                bold(&preview.path().display().to_string()),
                dim(&format!("(removed in {}s)", preview.remaining().as_secs())),
            );
        }
        preview.expire().await;
    }

    Ok(())
}

fn report_written(cli: &Cli, path: &Path) {
    if !cli.quiet {
        eprintln!("{}  →  {}", green("✔"), bold(&path.display().to_string()));
    }
}

/// Open `html` in the user's editor and return the saved text.
fn edit_in_editor(html: &str) -> Result<String> {
    let editor = std::env::var("VISUAL")
        .or_else(|_| std::env::var("EDITOR"))
        .unwrap_or_else(|_| "vi".to_string());

    let mut tmp = tempfile::Builder::new()
        .prefix("cv-adapt-")
        .suffix(".html")
        .tempfile()
        .context("Failed to create temporary file")?;
    tmp.write_all(html.as_bytes())
        .context("Failed to write temporary file")?;

    let status = std::process::Command::new(&editor)
        .arg(tmp.path())
        .status()
        .with_context(|| format!("Failed to launch editor '{editor}'"))?;
    if !status.success() {
        anyhow::bail!("Editor '{}' exited with {}", editor, status);
    }
    std::fs::read_to_string(tmp.path()).context("Failed to read edited file")
}

// ── cache ────────────────────────────────────────────────────────────────────

fn run_cache_list(cli: &Cli, json: bool) -> Result<()> {
    let config = build_config(cli, PdfPayload::default())?;
    let cache = ContentCache::from_config(&config);
    let docs = cache.list_all();

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&docs).context("Failed to serialise cache")?
        );
        return Ok(());
    }
    if docs.is_empty() {
        eprintln!("{}", dim("Cache is empty"));
        return Ok(());
    }
    for doc in &docs {
        println!("{}", describe(doc));
    }
    Ok(())
}

fn describe(doc: &CachedDocument) -> String {
    let size = doc
        .metadata
        .size_bytes
        .map(human_size)
        .unwrap_or_else(|| "?".to_string());
    let mime = doc.metadata.mime_type.as_deref().unwrap_or("unknown");
    format!(
        "{:<32}  {:>9}  {:<16}  {:<10}  {}",
        doc.file_name,
        size,
        mime,
        age(doc),
        dim(&doc.id)
    )
}

fn human_size(bytes: u64) -> String {
    if bytes >= 1024 * 1024 {
        format!("{:.2} MB", bytes as f64 / 1024.0 / 1024.0)
    } else if bytes >= 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{bytes} B")
    }
}

fn age(doc: &CachedDocument) -> String {
    let elapsed = chrono::Utc::now() - doc.timestamp;
    if elapsed.num_days() > 0 {
        format!("{}d ago", elapsed.num_days())
    } else if elapsed.num_hours() > 0 {
        format!("{}h ago", elapsed.num_hours())
    } else {
        format!("{}m ago", elapsed.num_minutes().max(0))
    }
}

fn run_cache_clear(cli: &Cli, yes: bool) -> Result<()> {
    let config = build_config(cli, PdfPayload::default())?;
    let cache = ContentCache::from_config(&config);
    let count = cache.list_all().len();

    if !yes && !confirm(&format!(
        "Remove {count} cached document(s)? This cannot be undone. [y/N] "
    ))? {
        eprintln!("{}", dim("Aborted"));
        return Ok(());
    }
    if !cache.clear_all() {
        anyhow::bail!("Failed to clear the cache");
    }
    if !cli.quiet {
        eprintln!("{} Cache cleared", green("✔"));
    }
    Ok(())
}

fn confirm(prompt: &str) -> Result<bool> {
    eprint!("{prompt}");
    io::stderr().flush().ok();
    let mut answer = String::new();
    io::stdin()
        .lock()
        .read_line(&mut answer)
        .context("Failed to read confirmation")?;
    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}

// ── health ───────────────────────────────────────────────────────────────────

async fn run_health(cli: &Cli) -> Result<()> {
    let config = build_config(cli, PdfPayload::default())?;
    let client = HttpAdaptationClient::new(&config)?;
    let health = client
        .health()
        .await
        .with_context(|| format!("Service at {} is not reachable", config.service_url))?;

    let version = health.version.as_deref().unwrap_or("unknown");
    if health.is_healthy() {
        println!("{} {}  version {}", green("✔"), health.status, version);
        Ok(())
    } else {
        println!("{} {}  version {}", red("✘"), health.status, version);
        anyhow::bail!("Service reports status '{}'", health.status)
    }
}
