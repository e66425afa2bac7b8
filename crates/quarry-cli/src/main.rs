//! `quarry-cli` – Quarry Command Line Interface
//!
//! This binary drives the mining loop against a simulated demo world.  It:
//!
//! 1. Loads `~/.quarry/config.toml`, writing a default one on first run.
//! 2. Builds the world ports, event bus, statistics and chest registry.
//! 3. Drops the operator into an **interactive REPL** with slash-commands
//!    (`/start`, `/stop`, `/stats`, `/chests`, `/chest add`, `/die`, `/help`).
//! 4. Intercepts **Ctrl-C** to publish a disconnect on the lifecycle topic,
//!    which emergency-stops the loop, and exits.

mod config;
mod repl;

use colored::Colorize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::warn;

use quarry_memory::{ChestRegistry, StatsTracker};
use quarry_middleware::EventBus;
use quarry_runtime::MiningLoop;
use quarry_types::LifecycleSignal;
use quarry_world::{AgentPorts, SimWorld};

fn main() {
    // RUST_LOG filters (default "info"); QUARRY_LOG_FORMAT=json switches to
    // JSON lines.  Operator-facing output still goes through println!.
    let _tracing = quarry_runtime::init_tracing("quarry");

    print_banner();

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("{}: {}", "Failed to start Tokio runtime".red(), e);
            std::process::exit(1);
        }
    };

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
            let cfg = config::Config {
                chests: vec![quarry_types::BlockPos::new(-2, 64, 0)],
                ..Default::default()
            };
            match config::save(&cfg) {
                Ok(()) => println!(
                    "  {} Default config written to {}",
                    "✓".green().bold(),
                    config::config_path().display().to_string().bold()
                ),
                Err(e) => println!("{}: {}", "Error saving config".red(), e),
            }
            cfg
        }
        Err(e) => {
            println!("{}: {}", "Config error".red(), e);
            println!("  Using default configuration.");
            config::Config::default()
        }
    };

    // ── World and loop ────────────────────────────────────────────────────
    let world = Arc::new(SimWorld::demo());
    let bus = EventBus::default();
    let chests = ChestRegistry::with_chests(cfg.chests.iter().copied());
    let mining = MiningLoop::new(
        cfg.mining.clone(),
        AgentPorts::from_shared(world.clone()),
        bus.clone(),
        StatsTracker::new(),
        chests,
    );
    let _watcher = runtime.block_on(async { mining.watch_lifecycle(&bus) });

    // ── Ctrl-C handler ────────────────────────────────────────────────────
    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_clone = shutdown.clone();
    let bus_ctrlc = bus.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        println!();
        println!(
            "{}",
            "⚠  Ctrl-C received – emergency stop …".yellow().bold()
        );
        bus_ctrlc.publish_lifecycle(
            "quarry-cli",
            LifecycleSignal::Disconnect {
                reason: "operator Ctrl-C".to_string(),
            },
        );
        println!("{}", "  ✓ Disconnect published to Event Bus.".green());
        shutdown_clone.store(true, Ordering::SeqCst);
    }) {
        warn!(error = %e, "Failed to install Ctrl-C handler; emergency stop on Ctrl-C will not be available");
    }

    println!();
    println!("  Type {} for a list of commands.\n", "/help".bold().cyan());

    // ── Interactive REPL ──────────────────────────────────────────────────
    let mut shell = repl::Shell {
        runtime: &runtime,
        mining,
        world,
        bus,
        config: cfg,
    };
    shell.run(shutdown);
}

// ─────────────────────────────────────────────────────────────────────────────
// Banner
// ─────────────────────────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!("{}", r#"   ____                          "#.bold().cyan());
    println!("{}", r#"  / __ \__  ______ _____________ "#.bold().cyan());
    println!("{}", r#" / / / / / / / __ `/ ___/ ___/ / / /"#.bold().cyan());
    println!("{}", r#"/ /_/ / /_/ / /_/ / /  / /  / /_/ / "#.bold().cyan());
    println!("{}", r#"\___\_\__,_/\__,_/_/  /_/   \__, /  "#.bold().cyan());
    println!("{}", r#"                           /____/   "#.bold().cyan());
    println!();
    println!(
        "  {} {}",
        "Quarry".bold(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    println!("  Autonomous mining agent");
    println!();
}
