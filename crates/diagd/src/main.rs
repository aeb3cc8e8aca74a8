//! OBD-II diagnostic daemon
//!
//! The `obd-diagd` binary runs the diagnostic pipeline locally.
//!
//! ## Commands
//!
//! - `ask`: Diagnose one message and print the reply
//! - `serve-stdin`: Diagnose every stdin line concurrently, one JSON reply per line
//! - `catalog`: Inspect the loaded trouble-code catalog

use std::collections::BTreeMap;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use diag_core::{
    DiagnosticReply, Enricher, InteractionLog, JsonlInteractionLog, PipelineConfig,
    PipelineOrchestrator, TracingInteractionLog,
};
use obd_catalog::{CatalogHandle, CodeCatalog, CodeCategory, TroubleCode, VehicleContext};
use serde::Serialize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;
use tracing::{info, warn, Level};

#[derive(Parser)]
#[command(name = "obd-diagd")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "OBD-II trouble-code diagnostic assistant", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// TOML config file
    #[arg(short, long, global = true, env = "OBD_CONFIG")]
    config: Option<PathBuf>,

    /// Dataset file replacing the built-in catalog
    #[arg(long, global = true)]
    catalog: Option<PathBuf>,

    /// Reasoning oracle endpoint
    #[arg(long, global = true)]
    oracle_url: Option<String>,

    /// Oracle deadline in milliseconds, retry included
    #[arg(long, global = true)]
    oracle_timeout_ms: Option<u64>,

    /// Disable AI enrichment
    #[arg(long, global = true)]
    no_ai: bool,

    /// Causes shown per reply
    #[arg(long, global = true)]
    max_causes: Option<usize>,

    /// Append interaction records to this JSONL file
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Diagnose a single message
    Ask {
        /// Message text, e.g. "P0171 Toyota Corolla 2015 1.6L"
        #[arg(required = true, num_args = 1..)]
        message: Vec<String>,

        /// Requester identifier
        #[arg(long, default_value = "cli")]
        from: String,

        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Diagnose each stdin line; replies are printed as JSON lines
    ServeStdin {
        /// Requester identifier for every line
        #[arg(long, default_value = "stdin")]
        from: String,
    },

    /// Inspect the catalog
    Catalog {
        #[command(subcommand)]
        action: CatalogAction,
    },
}

#[derive(Subcommand)]
enum CatalogAction {
    /// List every code with its description
    List,

    /// Show one code, optionally resolved for a vehicle
    Show {
        code: String,

        #[arg(long)]
        make: Option<String>,

        #[arg(long)]
        model: Option<String>,

        #[arg(long)]
        year: Option<u16>,

        #[arg(long)]
        engine: Option<String>,
    },

    /// Dataset version, digest and counts
    Stats,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

/// One line of `serve-stdin` output.
#[derive(Debug, Serialize)]
struct ReplyLine<'a> {
    line: usize,
    request_id: uuid::Uuid,
    outcome: &'a diag_core::ReplyOutcome,
    text: String,
}

#[derive(Debug, Serialize)]
struct CatalogStats<'a> {
    version: &'a str,
    digest: &'a str,
    codes: usize,
    overrides: usize,
    categories: BTreeMap<CodeCategory, usize>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // .env is optional
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let config = load_config(&cli)?;
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        diag_core::telemetry::parse_level(&config.log.level)
    };
    diag_core::telemetry::init_tracing(cli.json || config.log.json, level);

    let catalog = load_catalog(&config)?;

    match cli.command {
        Commands::Ask {
            message,
            from,
            format,
        } => cmd_ask(build_pipeline(&config, catalog), &message.join(" "), &from, format).await,
        Commands::ServeStdin { from } => {
            cmd_serve_stdin(Arc::new(build_pipeline(&config, catalog)), &from).await
        }
        Commands::Catalog { action } => cmd_catalog(&catalog, action),
    }
}

/// Environment defaults, then the config file, then command-line flags.
fn load_config(cli: &Cli) -> Result<PipelineConfig> {
    let mut config = match &cli.config {
        Some(path) => PipelineConfig::from_toml_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => PipelineConfig::from_env(),
    };

    if let Some(path) = &cli.catalog {
        config.catalog_path = Some(path.clone());
    }
    if let Some(url) = &cli.oracle_url {
        config.oracle.endpoint = Some(url.clone());
    }
    if let Some(ms) = cli.oracle_timeout_ms {
        config.oracle.timeout_ms = ms;
    }
    if cli.no_ai {
        config.oracle.enabled = false;
    }
    if let Some(n) = cli.max_causes {
        config.max_causes = n;
    }
    if let Some(path) = &cli.log_file {
        config.log.path = Some(path.clone());
    }

    config.validate().context("Invalid configuration")?;
    Ok(config)
}

fn load_catalog(config: &PipelineConfig) -> Result<CodeCatalog> {
    let catalog = match &config.catalog_path {
        Some(path) => CodeCatalog::load(path)
            .with_context(|| format!("Failed to load catalog from {}", path.display()))?,
        None => CodeCatalog::builtin().context("Built-in catalog is invalid")?,
    };
    info!(
        version = catalog.version(),
        digest = catalog.digest().short(),
        codes = catalog.len(),
        "catalog ready"
    );
    Ok(catalog)
}

fn build_pipeline(config: &PipelineConfig, catalog: CodeCatalog) -> PipelineOrchestrator {
    let log: Arc<dyn InteractionLog> = match &config.log.path {
        Some(path) => Arc::new(JsonlInteractionLog::new(path.clone())),
        None => Arc::new(TracingInteractionLog),
    };
    PipelineOrchestrator::new(
        Arc::new(CatalogHandle::new(catalog)),
        Enricher::from_config(config),
        log,
    )
}

fn render(reply: &DiagnosticReply, format: OutputFormat) -> Result<String> {
    Ok(match format {
        OutputFormat::Text => reply.text.to_string(),
        OutputFormat::Json => serde_json::to_string_pretty(reply)?,
    })
}

async fn cmd_ask(
    pipeline: PipelineOrchestrator,
    message: &str,
    from: &str,
    format: OutputFormat,
) -> Result<()> {
    let reply = pipeline.handle(message, from, Utc::now()).await;
    println!("{}", render(&reply, format)?);
    pipeline.flush_logs().await;
    Ok(())
}

async fn cmd_serve_stdin(pipeline: Arc<PipelineOrchestrator>, from: &str) -> Result<()> {
    let interrupt = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "cannot listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };
    serve_lines(
        pipeline,
        BufReader::new(tokio::io::stdin()),
        tokio::io::stdout(),
        from,
        interrupt,
    )
    .await?;
    Ok(())
}

/// Diagnose every non-blank input line concurrently, writing one JSON reply
/// per line to `output`. Stops at end of input or when `interrupt`
/// completes, which cancels requests still in flight. Returns `output` once
/// every reply and interaction record is written.
async fn serve_lines<R, W, I>(
    pipeline: Arc<PipelineOrchestrator>,
    mut input: R,
    output: W,
    from: &str,
    interrupt: I,
) -> Result<W>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
    I: Future<Output = ()>,
{
    let (out_tx, mut out_rx) = mpsc::channel::<String>(64);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // single writer so reply lines never interleave
    let writer = tokio::spawn(async move {
        let mut output = output;
        while let Some(line) = out_rx.recv().await {
            output.write_all(line.as_bytes()).await?;
            output.write_all(b"\n").await?;
            output.flush().await?;
        }
        Ok::<_, std::io::Error>(output)
    });

    let mut tasks = JoinSet::new();
    let mut buf = Vec::new();
    let mut line_no = 0usize;
    tokio::pin!(interrupt);

    loop {
        buf.clear();
        let read = tokio::select! {
            read = input.read_until(b'\n', &mut buf) => read,
            _ = &mut interrupt => {
                warn!(in_flight = tasks.len(), "interrupted, cancelling in-flight requests");
                let _ = shutdown_tx.send(true);
                break;
            }
        };
        match read {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => {
                warn!(error = %e, "input read failed, finishing accepted requests");
                break;
            }
        }
        if std::str::from_utf8(&buf).is_err() {
            warn!(line = line_no + 1, "line is not valid UTF-8, invalid bytes replaced");
        }
        let text = String::from_utf8_lossy(&buf).trim().to_string();
        if text.is_empty() {
            continue;
        }
        line_no += 1;

        let pipeline = Arc::clone(&pipeline);
        let out_tx = out_tx.clone();
        let from = from.to_string();
        let mut shutdown = shutdown_rx.clone();
        let n = line_no;
        tasks.spawn(async move {
            let cancel = async move {
                let _ = shutdown.wait_for(|stop| *stop).await;
            };
            match pipeline.handle_until(&text, &from, Utc::now(), cancel).await {
                Ok(reply) => {
                    let line = ReplyLine {
                        line: n,
                        request_id: reply.request_id,
                        outcome: &reply.outcome,
                        text: reply.text.to_string(),
                    };
                    match serde_json::to_string(&line) {
                        Ok(json) => {
                            let _ = out_tx.send(json).await;
                        }
                        Err(e) => warn!(line = n, error = %e, "failed to encode reply"),
                    }
                }
                Err(e) => warn!(line = n, error = %e, "request dropped"),
            }
        });
    }

    while let Some(joined) = tasks.join_next().await {
        if let Err(e) = joined {
            warn!(error = %e, "request task failed");
        }
    }
    drop(shutdown_tx);
    drop(out_tx);
    let output = writer.await.context("Writer task failed")??;
    pipeline.flush_logs().await;
    info!(requests = line_no, "input closed");
    Ok(output)
}

fn cmd_catalog(catalog: &CodeCatalog, action: CatalogAction) -> Result<()> {
    match action {
        CatalogAction::List => {
            for code in catalog.codes() {
                if let Some(def) = catalog.lookup(code) {
                    println!("{code}  {}", def.description);
                }
            }
        }
        CatalogAction::Show {
            code,
            make,
            model,
            year,
            engine,
        } => {
            let code = TroubleCode::try_from(code.trim())
                .with_context(|| format!("'{code}' is not a valid trouble code"))?;
            let ctx = VehicleContext {
                make,
                model,
                year,
                engine,
            };
            let Some(resolved) = catalog.resolve(&code, &ctx) else {
                bail!("{code} is not in catalog {}", catalog.version());
            };
            let out = serde_json::json!({
                "source": resolved.source,
                "definition": &*resolved.definition,
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        CatalogAction::Stats => {
            let stats = CatalogStats {
                version: catalog.version(),
                digest: catalog.digest().as_str(),
                codes: catalog.len(),
                overrides: catalog.override_count(),
                categories: catalog.category_counts(),
            };
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
    }
    Ok(())
}
