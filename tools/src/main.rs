//! shipyard-runner: headless driver for the shipyard engine.
//!
//! Usage:
//!   shipyard-runner --build Fighter,Cruiser --upgrade Fighter --wait-ms 5000
//!   shipyard-runner --config shipyard.json --save saves/ships.json --ipc-mode

use anyhow::Result;
use shipyard_core::{
    Ability, SchedulerStats, ShipyardConfig, ShipyardEngine, SubmitOutcome, UpgradeOutcome,
};
use std::env;
use std::io::{self, BufRead, Write};
use std::thread;
use std::time::{Duration, Instant};

#[derive(serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum IpcCommand {
    Submit { unit_type: String },
    Upgrade { name: String },
    Equip { name: String, ability: String },
    Decommission { name: String },
    Snapshot,
    Stats,
    Save,
    Quit,
}

#[derive(serde::Serialize)]
struct UnitView {
    name: String,
    health: u32,
    attack_power: u32,
    abilities: Vec<&'static str>,
}

#[derive(serde::Serialize)]
struct FleetView {
    units: Vec<UnitView>,
    stats: SchedulerStats,
}

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let ipc_mode = args.iter().any(|a| a == "--ipc-mode");
    let wait_ms = parse_arg(&args, "--wait-ms", 5_000u64);

    let mut config = match arg_value(&args, "--config") {
        Some(path) => ShipyardConfig::load(path)?,
        None => ShipyardConfig::reference(),
    };
    if let Some(save) = arg_value(&args, "--save") {
        config.save_path = save.to_string();
    }
    if let Some(ledger) = arg_value(&args, "--ledger") {
        config.ledger_path = Some(ledger.to_string());
    }
    config.build_latency_ms = parse_arg(&args, "--latency-ms", config.build_latency_ms);

    let engine = ShipyardEngine::open(config)?;

    if ipc_mode {
        run_ipc_loop(&engine)?;
    } else {
        run_script(&engine, &args, Duration::from_millis(wait_ms));
    }

    let report = engine.close();
    if !ipc_mode {
        println!();
        println!("=== SHUTDOWN ===");
        println!("  completed: {}", report.completed);
        println!("  dropped:   {}", report.dropped);
        println!("  aborted:   {}", report.aborted);
        if report.timed_out {
            println!("  (forced shutdown after timeout)");
        }
    }
    Ok(())
}

fn run_script(engine: &ShipyardEngine, args: &[String], wait: Duration) {
    println!("Available Units:");
    for t in engine.available_templates() {
        println!("- {} | Health: {} | Attack: {}", t.name, t.base_health, t.base_attack);
    }
    println!();

    let builds = arg_value(args, "--build").unwrap_or("");
    for unit_type in builds.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        match engine.submit(unit_type) {
            SubmitOutcome::Accepted(id) => println!("Building {unit_type}... (task {id})"),
            SubmitOutcome::Rejected(reason) => {
                println!("Cannot build {unit_type}: {}", reason.as_str())
            }
        }
    }

    wait_until_idle(engine, wait);

    println!("\nYour Fleet:");
    println!("{}", engine.fleet_report());

    if let Some(name) = arg_value(args, "--upgrade") {
        match engine.upgrade(name) {
            UpgradeOutcome::Applied { health } => println!("\n{name} upgraded! New Health: {health}"),
            UpgradeOutcome::NotFound => println!("\nUnit '{name}' not found in your fleet."),
        }
        println!("\nYour Fleet:");
        println!("{}", engine.fleet_report());
    }
}

fn wait_until_idle(engine: &ShipyardEngine, wait: Duration) {
    let deadline = Instant::now().checked_add(wait);
    while deadline.map_or(true, |d| Instant::now() < d) {
        let stats = engine.stats();
        if stats.queued == 0 && stats.executing == 0 {
            return;
        }
        thread::sleep(Duration::from_millis(50));
    }
    log::warn!("Builds still pending after {wait:?}");
}

fn run_ipc_loop(engine: &ShipyardEngine) -> Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut handle = stdin.lock();
    let mut buffer = String::new();

    loop {
        buffer.clear();
        let bytes_read = handle.read_line(&mut buffer)?;
        if bytes_read == 0 {
            break; // EOF
        }
        if buffer.trim().is_empty() {
            continue;
        }

        let cmd: IpcCommand = match serde_json::from_str(&buffer) {
            Ok(c) => c,
            Err(e) => {
                let err_json = serde_json::json!({ "error": e.to_string() });
                writeln!(stdout, "{}", err_json)?;
                stdout.flush()?;
                continue;
            }
        };

        let response = match cmd {
            IpcCommand::Quit => break,
            IpcCommand::Submit { unit_type } => match engine.submit(&unit_type) {
                SubmitOutcome::Accepted(task_id) => {
                    serde_json::json!({ "accepted": true, "task_id": task_id })
                }
                SubmitOutcome::Rejected(reason) => {
                    serde_json::json!({ "accepted": false, "reason": reason })
                }
            },
            IpcCommand::Upgrade { name } => serde_json::to_value(engine.upgrade(&name))?,
            IpcCommand::Equip { name, ability } => match ability.parse::<Ability>() {
                Ok(ability) => serde_json::to_value(engine.equip(&name, ability))?,
                Err(e) => serde_json::json!({ "error": e.to_string() }),
            },
            IpcCommand::Decommission { name } => {
                serde_json::json!({ "removed": engine.decommission(&name).is_some() })
            }
            IpcCommand::Snapshot => serde_json::to_value(fleet_view(engine))?,
            IpcCommand::Stats => serde_json::to_value(engine.stats())?,
            IpcCommand::Save => match engine.save_now() {
                Ok(outcome) => serde_json::json!({ "saved": true, "outcome": format!("{outcome:?}") }),
                Err(e) => serde_json::json!({ "saved": false, "error": e.to_string() }),
            },
        };
        writeln!(stdout, "{}", response)?;
        stdout.flush()?;
    }
    Ok(())
}

fn fleet_view(engine: &ShipyardEngine) -> FleetView {
    FleetView {
        units: engine
            .snapshot()
            .iter()
            .map(|u| UnitView {
                name: u.name.clone(),
                health: u.health(),
                attack_power: u.attack_power(),
                abilities: u.abilities().map(Ability::tag).collect(),
            })
            .collect(),
        stats: engine.stats(),
    }
}

fn arg_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2)
        .find(|w| w[0] == flag)
        .map(|w| w[1].as_str())
}

fn parse_arg<T: std::str::FromStr + Copy>(args: &[String], flag: &str, default: T) -> T {
    args.windows(2)
        .find(|w| w[0] == flag)
        .and_then(|w| w[1].parse().ok())
        .unwrap_or(default)
}
