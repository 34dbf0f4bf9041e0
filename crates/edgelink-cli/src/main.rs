//! `edgelinkd` – EdgeLink gateway daemon
//!
//! This binary wires the gateway core together and keeps it running:
//!
//! 1. Loads `~/.edgelink/config.toml` (or `EDGELINK_CONFIG`), writing the
//!    defaults on first run.
//! 2. Registers the **monitor** app node and subscribes it to heartbeats and
//!    lifecycle events.
//! 3. Connects the monitor to the MQTT broker and starts the heartbeat.
//! 4. Intercepts **Ctrl-C**, stops both and exits.

mod config;

use std::sync::Arc;

use colored::Colorize;
use edgelink_middleware::AdapterMetrics;
use edgelink_monitor::{MonitorPlugin, MonitorPublisher, MqttTransport, PLUGIN_NAME, RumqttTransport};
use edgelink_runtime::{Gateway, init_tracing};
use edgelink_types::NodeType;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

fn main() {
    // ── Structured logging ────────────────────────────────────────────────
    // RUST_LOG filters (default "info"); EDGELINK_LOG_FORMAT=json switches to
    // newline-delimited JSON; OTEL_EXPORTER_OTLP_ENDPOINT enables span export.
    // Installed before the runtime starts.
    let telemetry = init_tracing("edgelinkd");

    print_banner();

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            error!(error = %e, "failed to start the async runtime");
            std::process::exit(1);
        }
    };
    let code = runtime.block_on(run());
    // Runtime first, then the span exporter.
    drop(runtime);
    drop(telemetry);
    if code != 0 {
        std::process::exit(code);
    }
}

async fn run() -> i32 {
    // ── Configuration ─────────────────────────────────────────────────────
    let cfg = match config::load() {
        Ok(Some(cfg)) => {
            println!(
                "  Config loaded from {}",
                config::config_path().display().to_string().bold()
            );
            cfg
        }
        Ok(None) => {
            let mut cfg = config::Config::default();
            match config::save(&cfg) {
                Ok(()) => println!(
                    "  Default config written to {}",
                    config::config_path().display().to_string().bold()
                ),
                Err(e) => warn!(error = %e, "could not write default config"),
            }
            config::apply_env_overrides(&mut cfg);
            cfg
        }
        Err(e) => {
            println!("{}: {}", "Config error".red(), e);
            println!("  Using default configuration.");
            let mut cfg = config::Config::default();
            config::apply_env_overrides(&mut cfg);
            cfg
        }
    };

    // ── Gateway and monitor node ──────────────────────────────────────────
    let gateway = Gateway::new();
    let cancel = CancellationToken::new();

    let metrics = Arc::new(AdapterMetrics::new());
    let publisher = Arc::new(MonitorPublisher::new(
        cfg.monitor.clone(),
        Arc::clone(&metrics),
    ));
    let transport: Arc<dyn MqttTransport> =
        RumqttTransport::spawn(&cfg.monitor, cancel.child_token());
    publisher.set_transport(Some(transport));

    if let Err(e) = gateway
        .add_node_with_metrics(
            &cfg.monitor_node,
            PLUGIN_NAME,
            NodeType::App,
            Arc::new(MonitorPlugin::new(Arc::clone(&publisher))),
            Arc::clone(&metrics),
        )
        .await
    {
        error!(node = %cfg.monitor_node, error = %e, "failed to register monitor node");
        cancel.cancel();
        return 1;
    }
    if let Err(e) = gateway.dispatcher().subscribe(&cfg.monitor_node) {
        error!(node = %cfg.monitor_node, error = %e, "failed to subscribe monitor node");
        cancel.cancel();
        return 1;
    }

    println!(
        "  Monitor {} → mqtt://{}:{} (heartbeat every {} ms)",
        cfg.monitor_node.bold(),
        cfg.monitor.host,
        cfg.monitor.port,
        cfg.heartbeat_interval_ms
    );
    println!("  Press {} to stop.\n", "Ctrl-C".bold().cyan());

    // ── Heartbeat ─────────────────────────────────────────────────────────
    let heartbeat = tokio::spawn(
        Arc::clone(&gateway).run_heartbeat(cfg.heartbeat_interval(), cancel.child_token()),
    );

    // ── Ctrl-C ────────────────────────────────────────────────────────────
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for Ctrl-C; shutting down");
    }
    println!();
    println!("{}", "⚠  Ctrl-C received – shutting down …".yellow().bold());

    cancel.cancel();
    if let Err(e) = heartbeat.await {
        warn!(error = %e, "heartbeat task ended abnormally");
    }

    let sent = metrics.snapshot();
    info!(
        sent = sent.sent_messages_total,
        errors = sent.sent_message_errors_total,
        "monitor stopped"
    );
    println!("{}", "  ✓ Exiting EdgeLink.".green());
    0
}

fn print_banner() {
    let banner = r#"
  ███████╗██████╗  ██████╗ ███████╗██╗     ██╗███╗   ██╗██╗  ██╗
  ██╔════╝██╔══██╗██╔════╝ ██╔════╝██║     ██║████╗  ██║██║ ██╔╝
  █████╗  ██║  ██║██║  ███╗█████╗  ██║     ██║██╔██╗ ██║█████╔╝
  ██╔══╝  ██║  ██║██║   ██║██╔══╝  ██║     ██║██║╚██╗██║██╔═██╗
  ███████╗██████╔╝╚██████╔╝███████╗███████╗██║██║ ╚████║██║  ██╗
  ╚══════╝╚═════╝  ╚═════╝ ╚══════╝╚══════╝╚═╝╚═╝  ╚═══╝╚═╝  ╚═╝
"#;
    println!("{}", banner.bold().cyan());
    println!(
        "  {}  {}\n",
        "Industrial edge gateway".bold(),
        concat!("v", env!("CARGO_PKG_VERSION")).dimmed()
    );
}
