//! EPOCHBOT — Epoch-Boundary Staking Scheduler
//!
//! Entry point. Loads configuration, initialises structured logging,
//! wires the chain clock and stake executor together, and runs the
//! rank→wait→stake→unstake loop with graceful shutdown.

use anyhow::Result;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use epochbot::chain::sidecar::SidecarClient;
use epochbot::chain::wait::WaitOptions;
use epochbot::chain::ChainClock;
use epochbot::config;
use epochbot::executor::{DryRunExecutor, SignerClient, StakeExecutor};
use epochbot::scheduler::Scheduler;
use epochbot::types::{BotError, CycleOutcome};

const BANNER: &str = r#"
 _____ ____   ___   ____ _   _ ____   ___ _____
| ____|  _ \ / _ \ / ___| | | | __ ) / _ \_   _|
|  _| | |_) | | | | |   | |_| |  _ \| | | || |
| |___|  __/| |_| | |___|  _  | |_) | |_| || |
|_____|_|    \___/ \____|_| |_|____/ \___/ |_|

  Epoch-Boundary Staking Scheduler
  v0.1.0
"#;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    // Load configuration from TOML
    let cfg = config::AppConfig::load("config.toml")?;

    // Initialise structured logging
    init_logging();

    // Print startup banner
    println!("{BANNER}");
    info!(
        bot_name = %cfg.bot.name,
        targets = cfg.targets.len(),
        dry_run = cfg.executor.dry_run,
        cycle_interval_secs = cfg.bot.cycle_interval_secs,
        "EPOCHBOT starting up"
    );

    // -- Initialise components -------------------------------------------

    let netuids: Vec<u16> = cfg.targets.iter().map(|t| t.netuid).collect();
    let clock: Arc<dyn ChainClock> =
        Arc::new(SidecarClient::new(&cfg.chain.sidecar_url, netuids)?);

    let executor: Arc<dyn StakeExecutor> = if cfg.executor.dry_run {
        warn!("Dry-run mode — extrinsics will be logged, not submitted");
        Arc::new(DryRunExecutor)
    } else {
        let signer_url = cfg
            .executor
            .signer_url
            .as_deref()
            .ok_or_else(|| BotError::Config("signer_url missing".to_string()))?;
        let auth_token = match cfg.executor.auth_token_env.as_deref() {
            Some(env_name) => Some(config::AppConfig::resolve_env(env_name)?),
            None => None,
        };
        info!(signer_url, "Using remote signer executor");
        Arc::new(SignerClient::new(signer_url, auth_token)?)
    };

    let wait = WaitOptions {
        poll_interval: cfg.chain.poll_interval(),
        report_interval: cfg.chain.report_interval_blocks,
    };

    // Shutdown flag: set by Ctrl+C, observed by the scheduler between poll
    // iterations — never between a deposit and its withdrawal.
    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let flag = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Shutdown signal received.");
                flag.store(true, Ordering::SeqCst);
            }
        });
    }

    let mut scheduler = Scheduler::new(
        clock,
        executor,
        cfg.build_targets(),
        cfg.window,
        wait,
        shutdown.clone(),
    )?;

    // -- Main loop -------------------------------------------------------

    let cycle_sleep = Duration::from_secs(cfg.bot.cycle_interval_secs);
    let idle_sleep = Duration::from_secs(cfg.bot.idle_sleep_secs);
    let backoff = Duration::from_secs(cfg.bot.retry_backoff_secs);

    info!(
        cycle_interval_secs = cfg.bot.cycle_interval_secs,
        "Entering main loop. Press Ctrl+C to stop."
    );

    loop {
        let pause = match scheduler.run_once().await {
            Ok(CycleOutcome::NoneInWindow) => idle_sleep,
            Ok(outcome) => {
                info!(%outcome, "Cycle complete");
                cycle_sleep
            }
            Err(BotError::Interrupted) => break,
            Err(e) => {
                error!(error = %e, "Cycle failed — backing off");
                backoff
            }
        };

        if sleep_unless_shutdown(pause, &shutdown).await {
            break;
        }
    }

    info!("EPOCHBOT shut down cleanly.");
    Ok(())
}

/// Sleep for `duration`, waking early if shutdown is requested.
/// Returns true when shutdown was observed.
async fn sleep_unless_shutdown(duration: Duration, shutdown: &AtomicBool) -> bool {
    const SLICE: Duration = Duration::from_millis(250);
    let mut remaining = duration;
    loop {
        if shutdown.load(Ordering::SeqCst) {
            return true;
        }
        if remaining.is_zero() {
            return false;
        }
        let step = remaining.min(SLICE);
        tokio::time::sleep(step).await;
        remaining -= step;
    }
}

/// Initialise the `tracing` subscriber.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("epochbot=info"));

    let json_logging = std::env::var("EPOCHBOT_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    }
}
