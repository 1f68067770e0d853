//! One-shot operator commands against the persisted deployment.
//!
//! Each command loads `deployment.json`, syncs the ledger clock to wall-clock
//! time, runs one ledger transaction and saves the result. A failed
//! transaction leaves the file untouched.

use crate::config::ServerConfig;
use anyhow::{Context, Result};
use timevault_core::{
    Address, Amount, Deployment, Ledger, StatusReport, Timestamp, Vault, VaultEvent,
};

/// Load the deployment, or start a fresh ledger at `wall` funded from `[[genesis]]`.
pub fn load_or_init(config: &ServerConfig, wall: Timestamp) -> Result<Deployment> {
    let path = config.deployment_path();
    if let Some(deployment) = Deployment::load(&path)
        .with_context(|| format!("Failed to load deployment: {}", path.display()))?
    {
        return Ok(deployment);
    }

    log::info!("No deployment at {}; starting fresh ledger", path.display());
    let mut ledger = Ledger::new(wall);
    for (address, balance) in config.genesis_accounts()? {
        ledger.credit(address, balance)?;
        log::debug!("Genesis: {} = {}", address, balance);
    }
    Ok(Deployment::new(ledger))
}

fn save(config: &ServerConfig, deployment: &Deployment) -> Result<()> {
    let path = config.deployment_path();
    deployment
        .save(&path)
        .with_context(|| format!("Failed to save deployment: {}", path.display()))
}

/// Bring the ledger clock up to wall-clock time. Never moves it backwards.
pub fn sync_clock(ledger: &mut Ledger, wall: Timestamp) {
    if wall < ledger.now() {
        log::warn!(
            "Wall clock {} is behind ledger clock {}; keeping ledger time",
            wall,
            ledger.now()
        );
        return;
    }
    // Cannot fail: wall >= now
    let _ = ledger.set_time(wall);
}

/// Parse an unlock time: absolute unix seconds, or `+SECS` relative to `now`.
pub fn parse_unlock_time(arg: &str, now: Timestamp) -> Result<Timestamp> {
    if let Some(rel) = arg.strip_prefix('+') {
        let secs: u64 = rel
            .parse()
            .with_context(|| format!("Invalid relative time: {}", arg))?;
        return now
            .checked_add_secs(secs)
            .with_context(|| format!("Time overflow: {}", arg));
    }
    let secs: u64 = arg
        .parse()
        .with_context(|| format!("Invalid unix timestamp: {}", arg))?;
    Ok(Timestamp::from_secs(secs))
}

fn take_vault(deployment: &mut Deployment) -> Result<Vault> {
    deployment
        .vault
        .take()
        .context("No vault deployed yet (run with --deploy first)")
}

/// Create and fund the vault from `[vault]` settings.
pub fn deploy(config: &ServerConfig, wall: Timestamp) -> Result<Vault> {
    let mut deployment = load_or_init(config, wall)?;
    if let Some(existing) = &deployment.vault {
        anyhow::bail!("Vault already deployed at {}", existing.address());
    }
    sync_clock(&mut deployment.ledger, wall);

    let owner = config.owner()?;
    let funding = config.funding()?;
    let unlock_time = deployment
        .ledger
        .now()
        .checked_add_secs(config.vault.lock_secs)
        .context("Unlock time overflow")?;

    let vault = deployment
        .ledger
        .deploy(owner, unlock_time, funding)
        .context("Deploy failed")?;
    log::info!(
        "[{}] Vault deployed at {} ({} until {})",
        config.vault.label,
        vault.address(),
        funding,
        unlock_time
    );

    deployment.vault = Some(vault.clone());
    save(config, &deployment)?;
    Ok(vault)
}

/// Credit an external account (a faucet for the in-memory ledger).
pub fn fund(
    config: &ServerConfig,
    address: Address,
    amount: Amount,
    wall: Timestamp,
) -> Result<Amount> {
    let mut deployment = load_or_init(config, wall)?;
    let balance = deployment.ledger.credit(address, amount)?;
    save(config, &deployment)?;
    log::info!("Funded {} with {} (balance {})", address, amount, balance);
    Ok(balance)
}

/// Extend the lock as `caller`.
pub fn extend(
    config: &ServerConfig,
    caller: Address,
    unlock_arg: &str,
    wall: Timestamp,
) -> Result<Timestamp> {
    let mut deployment = load_or_init(config, wall)?;
    sync_clock(&mut deployment.ledger, wall);
    let new_unlock = parse_unlock_time(unlock_arg, deployment.ledger.now())?;

    let mut vault = take_vault(&mut deployment)?;
    deployment
        .ledger
        .extend(&mut vault, caller, new_unlock)
        .context("Extend failed")?;

    deployment.vault = Some(vault);
    save(config, &deployment)?;
    Ok(new_unlock)
}

/// Withdraw as `caller`.
pub fn withdraw(config: &ServerConfig, caller: Address, wall: Timestamp) -> Result<VaultEvent> {
    let mut deployment = load_or_init(config, wall)?;
    sync_clock(&mut deployment.ledger, wall);

    let mut vault = take_vault(&mut deployment)?;
    let event = deployment
        .ledger
        .withdraw(&mut vault, caller)
        .context("Withdraw failed")?;

    deployment.vault = Some(vault);
    save(config, &deployment)?;
    Ok(event)
}

/// Read-only status of the deployed vault, if any.
pub fn status(config: &ServerConfig, wall: Timestamp) -> Result<Option<StatusReport>> {
    let Some(deployment) = Deployment::load(&config.deployment_path())? else {
        return Ok(None);
    };
    let now = wall.max(deployment.ledger.now());
    Ok(deployment
        .vault
        .as_ref()
        .map(|vault| StatusReport::new(vault, now)))
}
