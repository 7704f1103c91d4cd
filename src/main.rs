use clap::Parser;
use orbweave::{CycleContext, Weaver};
use orbweave_core::{SignalKind, WeaverConfig};
use orbweave_engine::{ActionRegistry, FnAction};
use serde_json::json;
use std::path::Path;

#[derive(Parser)]
#[command(name = "orbweave", about = "Signal routing and dispatch core")]
struct Cli {
    /// Path to the TOML config file (defaults used when absent)
    #[arg(long, default_value = "orbweave.toml")]
    config: String,

    /// Number of cycles to drive before printing the status snapshot
    #[arg(long, default_value_t = 3)]
    cycles: u32,

    /// Submit a demo batch of signals before cycling
    #[arg(long, default_value_t = false)]
    demo: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "orbweave=info".into()),
        )
        .init();

    let cli = Cli::parse();
    let config = WeaverConfig::load_or_default(Path::new(&cli.config));

    // No-op actions so demo plans run end to end. Real collaborators
    // register their own.
    let actions = ActionRegistry::new();
    actions.register(FnAction::noop("post"));
    actions.register(FnAction::noop("page"));
    actions.register(FnAction::noop("record"));

    let weaver = Weaver::with_registry(config, actions);

    if cli.demo {
        weaver.submit_signal(
            SignalKind::Alert,
            "health-check",
            json!({"message": "disk usage at 91%"}),
            None,
            None,
        );
        weaver.submit_signal(
            SignalKind::Webhook,
            "stripe",
            json!({"type": "funding", "amount": 2500}),
            None,
            None,
        );
        weaver.submit_signal(
            SignalKind::Message,
            "general",
            json!({"text": "anyone around?"}),
            None,
            None,
        );
    }

    let ctx = CycleContext::new();
    for n in 0..cli.cycles {
        let status = weaver.run_cycle(&ctx).await;
        tracing::info!(
            "cycle {}: {} caught, {} executed, {} bus-delivered",
            n + 1,
            status.caught,
            status.executed,
            status.bus.delivered
        );
    }

    println!("{}", serde_json::to_string_pretty(&weaver.status())?);
    Ok(())
}
