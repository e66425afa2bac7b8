//! REPL – Read-Eval-Print Loop for the Quarry interactive shell.
//!
//! Supported slash-commands:
//!   /help             – show this list
//!   /start            – start mining
//!   /stop             – stop mining gracefully
//!   /stats            – extraction statistics
//!   /state            – current loop state
//!   /chests           – list known chests
//!   /chest add x y z  – register a chest and save it to the config
//!   /die              – kill the simulated agent (emergency stop)
//!   /quit | /exit     – stop mining and exit

use colored::Colorize;
use std::io::{self, BufRead, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use quarry_middleware::EventBus;
use quarry_runtime::{LoopState, MiningLoop};
use quarry_types::{BlockPos, LifecycleSignal};
use quarry_world::SimWorld;
use tokio::runtime::Runtime;

use crate::config::{self, Config};

const STOP_WAIT: Duration = Duration::from_secs(15);

/// One parsed input line.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Help,
    Start,
    Stop,
    Stats,
    State,
    Chests,
    AddChest(BlockPos),
    Die,
    Quit,
}

impl Command {
    pub fn parse(line: &str) -> Result<Command, String> {
        let mut words = line.split_whitespace();
        let head = words.next().unwrap_or_default();
        let rest: Vec<&str> = words.collect();
        let cmd = match (head, rest.as_slice()) {
            ("/help", []) => Command::Help,
            ("/start", []) => Command::Start,
            ("/stop", []) => Command::Stop,
            ("/stats", []) => Command::Stats,
            ("/state", []) => Command::State,
            ("/chests", []) => Command::Chests,
            ("/chest", ["add", x, y, z]) => {
                let pos = format!("{x},{y},{z}")
                    .parse::<BlockPos>()
                    .map_err(|e| e.to_string())?;
                Command::AddChest(pos)
            }
            ("/chest", _) => return Err("usage: /chest add <x> <y> <z>".to_string()),
            ("/die", []) => Command::Die,
            ("/quit" | "/exit", []) => Command::Quit,
            (other, _) => return Err(format!("Unknown command: '{other}'")),
        };
        Ok(cmd)
    }
}

/// Everything the shell commands act on.
pub struct Shell<'rt> {
    pub runtime: &'rt Runtime,
    pub mining: MiningLoop,
    pub world: Arc<SimWorld>,
    pub bus: EventBus,
    pub config: Config,
}

impl Shell<'_> {
    /// Entry point for the interactive REPL.
    ///
    /// `shutdown` is polled each iteration; when set the REPL exits cleanly.
    pub fn run(&mut self, shutdown: Arc<AtomicBool>) {
        let stdin = io::stdin();
        let mut stdout = io::stdout();

        loop {
            if shutdown.load(Ordering::SeqCst) {
                break;
            }

            print!("{} ", "quarry>".bold().cyan());
            stdout.flush().ok();

            let mut line = String::new();
            match stdin.lock().read_line(&mut line) {
                Ok(0) => break, // EOF
                Ok(_) => {}
                Err(e) => {
                    eprintln!("{}: {}", "Read error".red(), e);
                    break;
                }
            }

            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            match Command::parse(line) {
                Ok(Command::Quit) => {
                    self.cmd_stop();
                    println!("{}", "Goodbye.".green());
                    shutdown.store(true, Ordering::SeqCst);
                    break;
                }
                Ok(cmd) => self.dispatch(cmd),
                Err(e) => println!(
                    "{} Type {} for available commands.",
                    e.red(),
                    "/help".bold()
                ),
            }
        }
    }

    fn dispatch(&mut self, cmd: Command) {
        match cmd {
            Command::Help => cmd_help(),
            Command::Start => self.cmd_start(),
            Command::Stop => self.cmd_stop(),
            Command::Stats => self.cmd_stats(),
            Command::State => println!("  State: {}", state_label(&self.mining.state())),
            Command::Chests => self.cmd_chests(),
            Command::AddChest(pos) => self.cmd_add_chest(pos),
            Command::Die => self.cmd_die(),
            Command::Quit => {}
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Command handlers
    // ─────────────────────────────────────────────────────────────────────

    fn cmd_start(&self) {
        if self.mining.is_mining() {
            println!("  {}", "Already mining.".yellow());
            return;
        }
        match self.runtime.block_on(self.mining.start()) {
            Ok(()) => println!(
                "  {} Mining {}. Type {} to stop.",
                "✓".green().bold(),
                "STARTED".green().bold(),
                "/stop".bold()
            ),
            Err(e) => println!("  {}: {}", "Cannot start".red(), e),
        }
    }

    fn cmd_stop(&self) {
        if !self.mining.is_mining() {
            return;
        }
        self.mining.stop();
        print!("  Stopping … ");
        io::stdout().flush().ok();
        let halted = self
            .runtime
            .block_on(tokio::time::timeout(STOP_WAIT, self.mining.halted()));
        match halted {
            Ok(state) => println!("{}", state_label(&state)),
            Err(_) => println!("{}", "still draining".yellow()),
        }
    }

    fn cmd_stats(&self) {
        let snap = self.mining.stats();
        println!("{}", "Extraction Statistics".bold().underline());
        match snap.started_at {
            Some(at) => println!(
                "  Started   : {}",
                at.with_timezone(&chrono::Local).format("%H:%M:%S")
            ),
            None => println!("  Started   : {}", "never".dimmed()),
        }
        println!("  Elapsed   : {:.0}s", snap.elapsed_secs);
        println!(
            "  Extracted : {}",
            snap.total_extracted.to_string().bold()
        );
        println!("  Rate      : {:.1} blocks/min", snap.per_minute);
        for (block, count) in &snap.per_type {
            println!("    • {:<16} {}", block, count);
        }
    }

    fn cmd_chests(&self) {
        let chests = self.mining.chests().all();
        if chests.is_empty() {
            println!(
                "  {} Add one with {}.",
                "No chests known.".yellow(),
                "/chest add x y z".bold()
            );
            return;
        }
        println!("{}", "Known Chests".bold().underline());
        for pos in chests {
            println!("    • {}", pos.to_string().bold());
        }
    }

    fn cmd_add_chest(&mut self, pos: BlockPos) {
        if !self.mining.chests().register(pos) {
            println!("  Chest at {} is already known.", pos.to_string().bold());
            return;
        }
        self.config.chests.push(pos);
        match config::save(&self.config) {
            Ok(()) => println!(
                "  {} Chest at {} saved to {}",
                "✓".green().bold(),
                pos.to_string().bold(),
                config::config_path().display()
            ),
            Err(e) => println!("{}: {}", "Error saving config".red(), e),
        }
    }

    fn cmd_die(&self) {
        self.world.kill();
        self.bus
            .publish_lifecycle("quarry-cli", LifecycleSignal::Death);
        println!("  {} Agent killed.", "☠".red().bold());
    }
}

fn cmd_help() {
    println!();
    println!("{}", "Quarry Commands".bold().underline());
    println!("  {}             – start mining", "/start".bold().cyan());
    println!("  {}              – stop mining gracefully", "/stop".bold().cyan());
    println!("  {}             – extraction statistics", "/stats".bold().cyan());
    println!("  {}             – current loop state", "/state".bold().cyan());
    println!("  {}            – list known chests", "/chests".bold().cyan());
    println!("  {}  – register a chest", "/chest add x y z".bold().cyan());
    println!("  {}               – kill the simulated agent", "/die".bold().cyan());
    println!("  {}       – exit the CLI", "/quit  /exit".bold().cyan());
    println!();
}

fn state_label(state: &LoopState) -> String {
    match state {
        LoopState::Idle => "idle".dimmed().to_string(),
        LoopState::EmergencyStopped { .. } => state.to_string().red().bold().to_string(),
        LoopState::Stopping => state.to_string().yellow().to_string(),
        _ => state.to_string().green().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_commands() {
        assert_eq!(Command::parse("/start"), Ok(Command::Start));
        assert_eq!(Command::parse("  /stats "), Ok(Command::Stats));
        assert_eq!(Command::parse("/exit"), Ok(Command::Quit));
    }

    #[test]
    fn parses_chest_add() {
        assert_eq!(
            Command::parse("/chest add -2 64 10"),
            Ok(Command::AddChest(BlockPos::new(-2, 64, 10)))
        );
    }

    #[test]
    fn rejects_bad_chest_coordinates() {
        assert!(Command::parse("/chest add 1 two 3").is_err());
        assert!(Command::parse("/chest add 1 2").is_err());
    }

    #[test]
    fn rejects_unknown_and_extra_arguments() {
        assert!(Command::parse("/mine").is_err());
        assert!(Command::parse("/start now").is_err());
    }
}
