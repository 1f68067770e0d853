//! TimeVault Server: headless operator tool and lock watcher
//!
//! Deploys a single time-locked vault onto a persisted in-memory ledger,
//! runs owner operations against it, and watches its lock status.
//!
//! # Usage
//!
//! ```bash
//! timevault-server --config /path/to/timevault.toml --deploy
//! timevault-server --extend +7200
//! timevault-server --withdraw
//! timevault-server --status
//! timevault-server             # watch until Ctrl-C
//! ```

mod commands;
mod config;
mod daemon;

use anyhow::{Context, Result};
use std::path::PathBuf;
use timevault_core::{Address, Amount, Timestamp};

/// What the invocation asked for
enum Command {
    Watch,
    Check,
    Validate,
    Status,
    Deploy,
    Fund(Address, Amount),
    Extend(String),
    Withdraw,
}

fn main() -> Result<()> {
    // Parse CLI args (minimal, no clap dependency needed)
    let args: Vec<String> = std::env::args().collect();

    let mut config_path = PathBuf::from("/config/timevault.toml");
    let mut command = Command::Watch;
    let mut caller: Option<Address> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" | "-c" => {
                config_path = PathBuf::from(next_arg(&args, &mut i, "--config")?);
            }
            "--check" | "--once" => command = Command::Check,
            "--validate" => command = Command::Validate,
            "--status" => command = Command::Status,
            "--deploy" => command = Command::Deploy,
            "--withdraw" => command = Command::Withdraw,
            "--extend" => {
                command = Command::Extend(next_arg(&args, &mut i, "--extend")?.to_string());
            }
            "--fund" => {
                let address = next_arg(&args, &mut i, "--fund")?
                    .parse::<Address>()
                    .context("--fund: invalid address")?;
                let amount = next_arg(&args, &mut i, "--fund")?
                    .parse::<Amount>()
                    .context("--fund: invalid amount")?;
                command = Command::Fund(address, amount);
            }
            "--caller" => {
                let address = next_arg(&args, &mut i, "--caller")?
                    .parse::<Address>()
                    .context("--caller: invalid address")?;
                caller = Some(address);
            }
            "--help" | "-h" => {
                print_help();
                return Ok(());
            }
            "--version" | "-V" => {
                println!("timevault-server {}", env!("CARGO_PKG_VERSION"));
                return Ok(());
            }
            other => {
                anyhow::bail!("Unknown argument: {}", other);
            }
        }
        i += 1;
    }

    // Load config
    let mut server_config = config::ServerConfig::from_file(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    // Apply env overrides
    server_config.apply_env_overrides();

    // Validate
    server_config
        .validate()
        .context("Configuration validation failed")?;

    // Init logger
    std::env::set_var("RUST_LOG", &server_config.server.log_level);
    env_logger::init();

    let caller = match caller {
        Some(address) => address,
        None => server_config.owner()?,
    };

    match command {
        Command::Validate => {
            println!("✅ Configuration is valid.");
            println!("  Owner:          {}", server_config.vault.owner);
            println!("  Lock:           {} secs", server_config.vault.lock_secs);
            println!("  Funding:        {}", server_config.funding()?);
            println!(
                "  Check interval: {} secs",
                server_config.server.check_interval_secs
            );
            println!("  Genesis:        {} accounts", server_config.genesis.len());
            println!(
                "  State file:     {}",
                server_config.deployment_path().display()
            );
        }
        Command::Status => match commands::status(&server_config, Timestamp::now())? {
            Some(report) => println!("{}", report),
            None => println!("No vault deployed."),
        },
        Command::Deploy => {
            let vault = commands::deploy(&server_config, Timestamp::now())?;
            println!("✅ Vault deployed at {}", vault.address());
            println!("  Unlock time: {}", vault.unlock_time());
            println!("  Balance:     {}", vault.balance());
        }
        Command::Fund(address, amount) => {
            let balance = commands::fund(&server_config, address, amount, Timestamp::now())?;
            println!("✅ {} balance: {}", address, balance);
        }
        Command::Extend(arg) => {
            let unlock = commands::extend(&server_config, caller, &arg, Timestamp::now())?;
            println!("✅ Unlock time extended to {} ({})", unlock, unlock.as_secs());
        }
        Command::Withdraw => {
            let event = commands::withdraw(&server_config, caller, Timestamp::now())?;
            println!("✅ Withdrew {} at {}", event.amount(), event.when());
        }
        Command::Check => {
            let rt = tokio::runtime::Runtime::new().context("Failed to create Tokio runtime")?;
            log::info!("Running single check cycle…");
            let outcome = rt.block_on(daemon::run_check_cycle(
                &server_config,
                Timestamp::now(),
                0,
            ))?;
            match outcome.status {
                Some(status) => println!(
                    "{}{} ({} withdrawal event(s))",
                    status,
                    if outcome.warning { " ⚠️" } else { "" },
                    outcome.new_events.len()
                ),
                None => println!("No vault deployed."),
            }
            log::info!("Done.");
        }
        Command::Watch => {
            let rt = tokio::runtime::Runtime::new().context("Failed to create Tokio runtime")?;

            // Install Ctrl-C handler for graceful shutdown
            let shutdown = rt.block_on(async {
                tokio::select! {
                    result = daemon::run(server_config) => result,
                    _ = tokio::signal::ctrl_c() => {
                        log::info!("Received shutdown signal. Exiting…");
                        Ok(())
                    }
                }
            });

            if let Err(e) = shutdown {
                log::error!("Server error: {:#}", e);
                std::process::exit(1);
            }
        }
    }

    Ok(())
}

/// Advance to the next argument, failing if `flag` is missing its value.
fn next_arg<'a>(args: &'a [String], i: &mut usize, flag: &str) -> Result<&'a str> {
    *i += 1;
    args.get(*i)
        .map(String::as_str)
        .with_context(|| format!("{} requires an argument", flag))
}

fn print_help() {
    println!(
        r#"TimeVault Server: time-locked vault operator and watcher

USAGE:
    timevault-server [OPTIONS] [COMMAND]

OPTIONS:
    -c, --config <PATH>      Config file path (default: /config/timevault.toml)
    --caller <ADDR>          Act as this identity (default: vault.owner)
    -h, --help               Show this help message
    -V, --version            Show version

COMMANDS (default: watch until Ctrl-C):
    --deploy                 Create and fund the vault from config
    --fund <ADDR> <AMOUNT>   Credit an external account ("10 ether", "5 gwei", "1000")
    --extend <TIME>          Extend the lock to a unix timestamp, or +SECS from now
    --withdraw               Withdraw the full balance once unlocked
    --status                 Print vault status and exit
    --check, --once          Run a single watch cycle and exit
    --validate               Validate config file and exit

ENVIRONMENT VARIABLES (override config file):
    TIMEVAULT_DATA_DIR         Data directory path
    TIMEVAULT_CHECK_INTERVAL   Watch interval in seconds
    TIMEVAULT_LOG_LEVEL        Log level (error/warn/info/debug/trace)
    TIMEVAULT_WARNING_WINDOW   Warn this many seconds before unlock
    TIMEVAULT_OWNER            Vault owner address
    TIMEVAULT_LOCK_SECS        Lock duration at deploy, in seconds
    TIMEVAULT_FUNDING          Funding attached at deploy

EXAMPLES:
    # Deploy with a one hour lock
    timevault-server --config timevault.toml --deploy

    # Push the unlock time two hours out
    timevault-server --config timevault.toml --extend +7200

    # Single check (useful for cron jobs)
    timevault-server --config timevault.toml --check
"#
    );
}
