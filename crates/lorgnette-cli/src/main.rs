use std::sync::Arc;
use std::time::Duration;

use facet::Facet;
use figue as args;
use lorgnette::{DotProcessLayout, Session, SessionConfig};
use lorgnette_types::{Breakpoint, ConnectionState, endpoints};
use tracing::{info, warn};

const DEFAULT_BASE_URL: &str = "http://127.0.0.1:9137";
const DEFAULT_POLL_MS: u64 = 100;
const DEFAULT_OUT_PATH: &str = "active-graph.svg";

#[derive(Facet, Debug)]
struct Cli {
    #[facet(flatten)]
    builtins: args::FigueBuiltins,
    #[facet(args::subcommand)]
    command: Command,
}

#[derive(Facet, Debug)]
#[repr(u8)]
enum Command {
    History {
        #[facet(args::named, default)]
        url: Option<String>,
    },
    Snapshot {
        #[facet(args::named, default)]
        url: Option<String>,
        #[facet(args::named, default)]
        index: Option<usize>,
    },
    Continue {
        #[facet(args::named, default)]
        url: Option<String>,
    },
    Watch {
        #[facet(args::named, default)]
        url: Option<String>,
        #[facet(args::named, default)]
        poll_ms: Option<u64>,
        #[facet(args::named, default)]
        out: Option<String>,
        #[facet(args::named, default)]
        dot: Option<String>,
    },
}

fn main() {
    if let Err(err) = run() {
        eprintln!("{err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), String> {
    let figue_config = args::builder::<Cli>()
        .map_err(|e| format!("failed to build CLI schema: {e}"))?
        .cli(|cli| cli.strict())
        .help(|h| {
            h.program_name("lorgnette")
                .description("Inspect a compiler under debug: breakpoints, snapshots, rendered graphs")
                .version(option_env!("CARGO_PKG_VERSION").unwrap_or("dev"))
        })
        .build();
    let cli = args::Driver::new(figue_config)
        .run()
        .into_result()
        .map_err(|e| e.to_string())?;

    match cli.value.command {
        Command::History { url } => run_history(url),
        Command::Snapshot { url, index } => run_snapshot(url, index),
        Command::Continue { url } => run_continue(url),
        Command::Watch {
            url,
            poll_ms,
            out,
            dot,
        } => run_watch(url, poll_ms, out, dot),
    }
}

fn base_url(url: Option<String>) -> String {
    url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
        .trim_end_matches('/')
        .to_string()
}

fn run_history(url: Option<String>) -> Result<(), String> {
    let base_url = base_url(url);
    let body = http_get_text(&format!("{base_url}{}", endpoints::BREAKPOINT_LISTING))?;
    let listing: Vec<Breakpoint> =
        facet_json::from_str(&body).map_err(|e| format!("decode breakpoint listing: {e}"))?;

    let mut last_location: Option<&Breakpoint> = None;
    for (index, breakpoint) in listing.iter().enumerate() {
        // Repeated locations (loop iterations) are dimmed to a dot, the
        // way the viewer groups them.
        let marker = match last_location {
            Some(prev) if prev.same_location(breakpoint) => '.',
            _ => '*',
        };
        last_location = Some(breakpoint);
        println!("{index:>5} {marker} {breakpoint}");
    }
    Ok(())
}

fn run_snapshot(url: Option<String>, index: Option<usize>) -> Result<(), String> {
    let base_url = base_url(url);
    let endpoint = match index {
        Some(index) => endpoints::snapshot(index),
        None => endpoints::SNAPSHOT_LATEST.to_string(),
    };
    let body = http_get_text(&format!("{base_url}{endpoint}"))?;
    let pretty = facet_json::to_string_pretty(
        &facet_json::from_str::<facet_value::Value>(&body)
            .map_err(|e| format!("decode snapshot as json: {e}"))?,
    )
    .map_err(|e| format!("pretty snapshot: {e}"))?;
    println!("{pretty}");
    Ok(())
}

fn run_continue(url: Option<String>) -> Result<(), String> {
    let base_url = base_url(url);
    http_get_text(&format!("{base_url}{}", endpoints::BREAKPOINT_CONTINUE))?;
    println!("continue requested");
    Ok(())
}

fn run_watch(
    url: Option<String>,
    poll_ms: Option<u64>,
    out: Option<String>,
    dot: Option<String>,
) -> Result<(), String> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let base_url = base_url(url);
    let poll_ms = poll_ms.unwrap_or(DEFAULT_POLL_MS);
    let out = out.unwrap_or_else(|| DEFAULT_OUT_PATH.to_string());
    let layout: Arc<dyn lorgnette::LayoutEngine> = match dot {
        Some(program) => Arc::new(DotProcessLayout::with_program(program)),
        None => Arc::new(DotProcessLayout::new()),
    };

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| format!("failed to build tokio runtime: {e}"))?
        .block_on(watch_loop(base_url, poll_ms, out, layout))
}

async fn watch_loop(
    base_url: String,
    poll_ms: u64,
    out: String,
    layout: Arc<dyn lorgnette::LayoutEngine>,
) -> Result<(), String> {
    let config = SessionConfig::new(base_url.clone()).poll_interval(Duration::from_millis(poll_ms));
    let handle = Session::spawn(config, layout);
    let mut view = handle.view();

    info!(%base_url, poll_ms, %out, "watching compiler");

    let mut connection: Option<ConnectionState> = None;
    let mut seen_breakpoints = 0usize;
    let mut written_markup: Option<String> = None;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("stopping");
                return Ok(());
            }
            changed = view.changed() => {
                if changed.is_err() {
                    return Err("session stopped unexpectedly".to_string());
                }
            }
        }

        let current = view.borrow_and_update().clone();

        if connection != Some(current.connection) {
            connection = Some(current.connection);
            info!(state = %current.connection, "connection");
        }
        for breakpoint in &current.history[seen_breakpoints..] {
            info!(%breakpoint, "breakpoint recorded");
        }
        seen_breakpoints = current.history.len();

        if let Some(markup) = &current.active_markup
            && written_markup.as_ref() != Some(markup)
        {
            match std::fs::write(&out, markup) {
                Ok(()) => {
                    info!(
                        path = %out,
                        index = ?current.active_breakpoint,
                        method = ?current.active_method,
                        "wrote active graph"
                    );
                    written_markup = Some(markup.clone());
                }
                Err(error) => warn!(path = %out, %error, "failed to write active graph"),
            }
        }
    }
}

fn http_get_text(url: &str) -> Result<String, String> {
    let response = ureq::get(url)
        .call()
        .map_err(|e| format!("GET {url}: {e}"))?;
    response
        .into_string()
        .map_err(|e| format!("read GET response body: {e}"))
}
