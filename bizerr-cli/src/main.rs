//! # bizerr CLI
//!
//! Raise a business error through the full pipeline and see what a
//! service would log.
//!
//! Usage:
//!   bizerr emit <code> <status> <msg> [options]
//!   bizerr profile [--profile <file.json>]
//!
//! Examples:
//!   bizerr emit E100 FAIL "bad input" --detail orderId=123
//!   bizerr emit E100 FAIL "bad input" --no-stack --channel-code PAY_503 --channel-msg timeout
//!   bizerr --tracing emit E500 FAIL "db down" --effect-panic
//!   bizerr profile --profile profile.json

use anyhow::Context as _;
use bizerr_error::{sink, BizError, Context, ErrorProfile, Level, LogSink};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::mpsc;

#[derive(Parser)]
#[command(name = "bizerr")]
#[command(author, version, about = "bizerr - self-logging business errors")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// JSON file with the service error profile
    #[arg(short, long, global = true)]
    profile: Option<PathBuf>,

    /// Log through tracing instead of plain stderr (filter with RUST_LOG)
    #[arg(long, global = true)]
    tracing: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Construct one error and print it
    Emit(EmitArgs),
    /// Print the effective profile as JSON
    Profile,
}

#[derive(Args)]
struct EmitArgs {
    /// Machine-readable error code
    code: String,

    /// Business status
    status: String,

    /// Human-readable message
    msg: String,

    /// Supplementary detail, e.g. orderId=123
    #[arg(short, long)]
    detail: Option<String>,

    /// info, warn or error
    #[arg(short, long)]
    level: Option<Level>,

    /// Downstream error code
    #[arg(long)]
    channel_code: Option<String>,

    /// Downstream error message
    #[arg(long, requires = "channel_code")]
    channel_msg: Option<String>,

    /// Report this caller instead of resolving it
    #[arg(long)]
    caller: Option<String>,

    /// Do not capture the stack
    #[arg(long)]
    no_stack: bool,

    /// Maximum frames to capture (values <= 0 keep the default)
    #[arg(long, allow_negative_numbers = true)]
    stack_rows: Option<i64>,

    /// Run an async effect that reports the error code
    #[arg(long)]
    effect: bool,

    /// Run an async effect that panics
    #[arg(long, conflicts_with = "effect")]
    effect_panic: bool,
}

fn load_profile(path: Option<&PathBuf>) -> anyhow::Result<ErrorProfile> {
    match path {
        Some(path) => ErrorProfile::load(path)
            .with_context(|| format!("loading profile {}", path.display())),
        None => Ok(ErrorProfile::default()),
    }
}

fn make_sink(use_tracing: bool) -> LogSink {
    if use_tracing {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("bizerr=info")),
            )
            .with_writer(std::io::stderr)
            .init();
        sink::tracing_sink()
    } else {
        sink::stderr_sink()
    }
}

/// Forward every line to `log`, signalling `done` once the panic report of
/// an effect has been written.
fn notify_on_panic_report(log: LogSink, done: mpsc::UnboundedSender<()>) -> LogSink {
    sink::from_fn(move |ctx, args| {
        let line = args.to_string();
        log(ctx, format_args!("{}", line));
        if line.starts_with("SafeGo has panic:") {
            let _ = done.send(());
        }
    })
}

async fn emit(profile: ErrorProfile, log: LogSink, args: EmitArgs) -> anyhow::Result<()> {
    let ctx = Context::background().with_value("cmd", "emit");
    let mut opts = profile.options().with_sink(log.clone());

    if let Some(detail) = args.detail {
        opts = opts.with_detail(detail);
    }
    if let Some(level) = args.level {
        opts = opts.with_level(level);
    }
    if let Some(code) = args.channel_code {
        opts = opts.with_channel(code, args.channel_msg.unwrap_or_default());
    }
    if let Some(caller) = args.caller {
        opts = opts.with_caller_name(caller);
    }
    if args.no_stack {
        opts = opts.with_stack(false);
    }
    if let Some(rows) = args.stack_rows {
        opts = opts.with_stack_rows(rows);
    }

    let (done_tx, mut done) = mpsc::unbounded_channel();
    if args.effect {
        opts = opts.with_async_effect(move |_, err| {
            eprintln!("effect: reported {} ({})", err.code(), err.status());
            let _ = done_tx.send(());
        });
    } else if args.effect_panic {
        opts = opts
            .with_sink(notify_on_panic_report(log, done_tx))
            .with_async_effect(|_, err| panic!("effect failed for {}", err.code()));
    }

    let err = BizError::new(&ctx, args.code, args.status, args.msg, opts)?;

    let waiting = args.effect || args.effect_panic;
    if waiting && tokio::time::timeout(Duration::from_secs(2), done.recv()).await.is_err() {
        eprintln!("effect did not finish within 2s");
    }

    println!("{}", err);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let profile = load_profile(cli.profile.as_ref())?;

    match cli.command {
        Commands::Emit(args) => {
            let log = make_sink(cli.tracing);
            emit(profile, log, args).await?;
        }
        Commands::Profile => {
            println!("{}", profile.to_json()?);
        }
    }

    Ok(())
}
