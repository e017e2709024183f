use anyhow::{Context, Result, ensure};
use clap::{Parser, Subcommand, ValueEnum};
use findable::document::{Document, SourceFormat};
use findable::output::{self, SearchReport};
use findable::search::{CancelToken, Query, RelatedTerm, SearchError, SearchMode, SearchSession};
use findable::utils::{self, AppConfig, logging, progress};
use findable::worker::{Command, Event, SearchWorker, read_message, write_message};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::mpsc::{self, RecvTimeoutError, Sender, TryRecvError};
use std::thread;
use std::time::Duration;
use termcolor::ColorChoice;

/// How often `serve` checks stdin for new commands while waiting on events
const SERVE_POLL_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Parser)]
#[command(name = "findable")]
#[command(about = "Incremental search inside a single document")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// More log output on stderr (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Config file to use instead of the one in the app data directory
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Search a document and print the matches
    Search {
        /// Document to search
        file: PathBuf,

        /// Query text (several words form a phrase)
        #[arg(required = true)]
        query: Vec<String>,

        /// shallow or deep (defaults to the configured mode)
        #[arg(short, long, value_parser = parse_mode)]
        mode: Option<SearchMode>,

        /// Scan this many more windows after the first (deep mode)
        #[arg(long, value_name = "N", conflicts_with = "all")]
        more: Option<usize>,

        /// Scan to the end of the document (deep mode)
        #[arg(long)]
        all: bool,

        /// Segments per window, for both modes
        #[arg(short, long, value_name = "N")]
        window: Option<usize>,

        /// Related word to match alongside the query (repeatable)
        #[arg(short, long, value_name = "WORD")]
        related: Vec<String>,

        /// Treat the file as this format instead of guessing from its extension
        #[arg(long, value_enum)]
        format: Option<FormatArg>,

        /// Print a JSON report instead of matching lines
        #[arg(long)]
        json: bool,

        #[arg(long, value_enum, default_value_t = ColorWhen::Auto)]
        color: ColorWhen,
    },
    /// Run a search session over newline-delimited JSON on stdin/stdout
    Serve {
        /// Document to search
        file: PathBuf,

        #[arg(long, value_enum)]
        format: Option<FormatArg>,
    },
    /// List the segments a document is split into
    Segments {
        file: PathBuf,

        #[arg(long, value_enum)]
        format: Option<FormatArg>,

        #[arg(long, value_enum, default_value_t = ColorWhen::Auto)]
        color: ColorWhen,
    },
    /// Show the effective configuration
    Config {
        /// Write the effective configuration to the config file
        #[arg(long)]
        init: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum FormatArg {
    Text,
    Html,
}

impl From<FormatArg> for SourceFormat {
    fn from(format: FormatArg) -> Self {
        match format {
            FormatArg::Text => SourceFormat::Text,
            FormatArg::Html => SourceFormat::Html,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum ColorWhen {
    Auto,
    Always,
    Never,
}

impl From<ColorWhen> for ColorChoice {
    fn from(when: ColorWhen) -> Self {
        match when {
            ColorWhen::Auto => ColorChoice::Auto,
            ColorWhen::Always => ColorChoice::Always,
            ColorWhen::Never => ColorChoice::Never,
        }
    }
}

fn parse_mode(s: &str) -> Result<SearchMode, SearchError> {
    s.parse()
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let config = match &cli.config {
        Some(path) => AppConfig::load_from(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => AppConfig::load()?,
    };

    match cli.command {
        Commands::Search {
            file,
            query,
            mode,
            more,
            all,
            window,
            related,
            format,
            json,
            color,
        } => {
            let mode = mode.unwrap_or(config.default_mode);
            let query = Query::new(query.join(" "), mode)
                .with_related(related.into_iter().map(|word| RelatedTerm::new(word, 1.0)));
            let scan = ScanExtent::from_flags(more, all);
            let document = load_document(&file, format, &config)?;
            run_search(&config, document, query, scan, window, json, color)?;
        }
        Commands::Serve { file, format } => {
            let document = load_document(&file, format, &config)?;
            run_serve(&config, document)?;
        }
        Commands::Segments {
            file,
            format,
            color,
        } => {
            let document = load_document(&file, format, &config)?;
            let mut out = output::stdout(color.into());
            output::print_segments(&mut out, document.segments())?;
        }
        Commands::Config { init } => {
            let path = match cli.config {
                Some(path) => path,
                None => utils::get_config_path()?,
            };
            if init {
                config.save_to(&path)?;
                println!("Wrote config: {}", path.display());
            } else {
                println!("Config file: {}", path.display());
            }
            output::print_json(&mut io::stdout().lock(), &config)?;
        }
    }

    Ok(())
}

fn load_document(path: &Path, format: Option<FormatArg>, config: &AppConfig) -> Result<Document> {
    let segmenter = config.segmenter_config();
    let document = match format {
        Some(format) => Document::open_as(path, format.into(), &segmenter)?,
        None => Document::open(path, &segmenter)?,
    };
    tracing::info!(
        path = %path.display(),
        format = ?document.format(),
        segments = document.len(),
        text_bytes = document.text_len(),
        "document loaded"
    );
    Ok(document)
}

/// How far past the first window a one-shot search goes
#[derive(Clone, Copy)]
enum ScanExtent {
    FirstWindow,
    More(usize),
    ToEnd,
}

impl ScanExtent {
    fn from_flags(more: Option<usize>, all: bool) -> Self {
        match (more, all) {
            (_, true) => ScanExtent::ToEnd,
            (Some(n), false) => ScanExtent::More(n),
            (None, false) => ScanExtent::FirstWindow,
        }
    }
}

fn run_search(
    config: &AppConfig,
    document: Document,
    query: Query,
    scan: ScanExtent,
    window: Option<usize>,
    json: bool,
    color: ColorWhen,
) -> Result<()> {
    let mut session_config = config.session_config();
    if let Some(window) = window {
        ensure!(window > 0, "--window must be at least 1");
        session_config.shallow_window = window;
        session_config.deep_window = window;
    }

    let mode = query.mode;
    let mut session = SearchSession::new(Arc::new(document), session_config);
    session.set_query(query)?;

    if mode == SearchMode::Shallow && !matches!(scan, ScanExtent::FirstWindow) {
        tracing::warn!("scanning further only applies to deep mode");
    }

    match scan {
        ScanExtent::FirstWindow => {}
        ScanExtent::More(n) => {
            for _ in 0..n {
                if !session.can_scan_more() {
                    break;
                }
                session.scan_more()?;
            }
        }
        ScanExtent::ToEnd => {
            let pb = progress::scan_progress(session.document().len(), !json);
            pb.set_position(session.cursor().position() as u64);
            session.scan_to_end_with(&CancelToken::never(), |view| {
                pb.set_position(view.scanned_segments as u64);
            })?;
            pb.finish_and_clear();
        }
    }

    let view = session.view();
    if json {
        let report = SearchReport::new(session.document(), view, session.matches());
        output::print_json(&mut io::stdout().lock(), &report)?;
    } else {
        let mut out = output::stdout(color.into());
        output::print_matches(
            &mut out,
            session.document(),
            session.matches(),
            session.results().current(),
        )?;
        output::print_count(&mut out, &view)?;
    }
    Ok(())
}

fn run_serve(config: &AppConfig, document: Document) -> Result<()> {
    let worker = SearchWorker::spawn(Arc::new(document), config.session_config(), config.debounce())?;

    let (command_tx, command_rx) = mpsc::channel();
    thread::Builder::new()
        .name("findable-stdin".to_string())
        .spawn(move || read_commands(command_tx))
        .context("Failed to spawn stdin reader")?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let mut input_closed = false;

    loop {
        loop {
            match command_rx.try_recv() {
                Ok(Ok(command)) => {
                    if let Err(e) = worker.send(command) {
                        tracing::warn!(error = %e, "command dropped");
                    }
                }
                Ok(Err(message)) => write_message(&mut out, &Event::Error { message })?,
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    if !input_closed {
                        input_closed = true;
                        tracing::debug!("stdin closed, stopping worker");
                        // The worker may already be gone after an explicit Shutdown
                        let _ = worker.send(Command::Shutdown);
                    }
                    break;
                }
            }
        }

        match worker.events().recv_timeout(SERVE_POLL_INTERVAL) {
            Ok(event) => {
                let done = matches!(event, Event::ShuttingDown);
                write_message(&mut out, &event)?;
                if done {
                    break;
                }
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    worker.shutdown();
    Ok(())
}

/// Forward commands from stdin until it closes. Malformed lines are passed on
/// as error messages so the host sees them on stdout.
fn read_commands(commands: Sender<Result<Command, String>>) {
    let stdin = io::stdin();
    let mut input = stdin.lock();

    loop {
        let message = match read_message::<_, Command>(&mut input) {
            Ok(Some(command)) => Ok(command),
            Ok(None) => break,
            Err(e) if e.kind() == io::ErrorKind::InvalidData => {
                Err(format!("Invalid command: {e}"))
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to read stdin");
                break;
            }
        };
        if commands.send(message).is_err() {
            break;
        }
    }
}
