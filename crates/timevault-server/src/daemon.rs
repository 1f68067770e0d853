//! The daemon loop: periodically re-reads the deployment and reports lock status.
//!
//! The watcher never mutates the vault. It reports new withdrawal events and
//! warns when the unlock time is near.

use crate::config::ServerConfig;
use anyhow::{Context, Result};
use std::time::Duration;
use timevault_core::{Deployment, LockStatus, StatusReport, Timestamp, VaultEvent};

/// What one check cycle saw
#[derive(Debug, Clone, PartialEq)]
pub struct CheckOutcome {
    pub status: Option<LockStatus>,
    pub warning: bool,
    pub new_events: Vec<VaultEvent>,
    /// Pass back as `seen_events` on the next cycle
    pub cursor: usize,
}

/// Run the daemon loop. Blocks forever (until shutdown signal).
pub async fn run(config: ServerConfig) -> Result<()> {
    log::info!("TimeVault watcher starting…");
    log::info!("  Label:      {}", config.vault.label);
    log::info!(
        "  Interval:   {} seconds ({:.1} minutes)",
        config.server.check_interval_secs,
        config.server.check_interval_secs as f64 / 60.0
    );
    log::info!("  Data dir:   {}", config.server.data_dir.display());

    std::fs::create_dir_all(&config.server.data_dir).with_context(|| {
        format!(
            "Failed to create data dir: {}",
            config.server.data_dir.display()
        )
    })?;

    let interval = Duration::from_secs(config.server.check_interval_secs);

    // Events already in the log at startup are not re-announced
    let mut seen_events = match Deployment::load(&config.deployment_path()) {
        Ok(Some(deployment)) => deployment.vault.map(|v| v.events().len()).unwrap_or(0),
        _ => 0,
    };

    let mut first = true;
    loop {
        if !first {
            log::debug!(
                "Sleeping {} seconds until next check…",
                config.server.check_interval_secs
            );
            tokio::time::sleep(interval).await;
        }
        first = false;

        match run_check_cycle(&config, Timestamp::now(), seen_events).await {
            Ok(outcome) => seen_events = outcome.cursor,
            Err(e) => log::error!("Check cycle failed: {:#}", e),
        }
    }
}

/// Execute a single check cycle at wall-clock time `wall`.
pub async fn run_check_cycle(
    config: &ServerConfig,
    wall: Timestamp,
    seen_events: usize,
) -> Result<CheckOutcome> {
    let path = config.deployment_path();
    let deployment = Deployment::load(&path)
        .with_context(|| format!("Failed to load deployment: {}", path.display()))?;

    let Some(Deployment {
        ledger,
        vault: Some(vault),
    }) = deployment
    else {
        log::info!("[{}] No vault deployed, nothing to watch.", config.vault.label);
        return Ok(CheckOutcome {
            status: None,
            warning: false,
            new_events: Vec::new(),
            cursor: 0,
        });
    };
    let now = wall.max(ledger.now());

    let new_events = vault.events().since(seen_events).to_vec();
    for event in &new_events {
        match event {
            VaultEvent::Withdrawal { amount, when } => {
                log::info!(
                    "[{}] Withdrawal: {} released to {} at {}",
                    config.vault.label,
                    amount,
                    vault.owner(),
                    when
                );
            }
        }
    }

    let report = StatusReport::new(&vault, now);
    let warning = report.status.warning_due(config.server.warning_window_secs);
    match report.status {
        LockStatus::Locked { .. } if warning => {
            log::warn!(
                "[{}] ⚠️  Vault {} unlocks soon: {}",
                config.vault.label,
                report.vault,
                report.status
            );
        }
        LockStatus::Unlockable => {
            log::warn!(
                "[{}] Vault {} is unlockable: {} awaiting withdrawal",
                config.vault.label,
                report.vault,
                report.balance
            );
        }
        _ => {
            log::info!(
                "[{}] Vault {}: {} (balance {})",
                config.vault.label,
                report.vault,
                report.status,
                report.balance
            );
        }
    }

    Ok(CheckOutcome {
        status: Some(report.status),
        warning,
        new_events,
        cursor: vault.events().len(),
    })
}
