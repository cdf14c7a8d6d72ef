//! `PopLedger` - polling POP3 downloader.
//!
//! Downloads new messages from every account in `accounts.txt`, stores them
//! as `.eml` files and keeps `emails_metadata.json` up to date, once per
//! check interval or whenever `trigger_check.txt` appears.

mod poll;

use anyhow::Context;
use popledger_core::{Config, CycleReport, Ledger, Paths};
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use poll::{Wake, wait_for_next_cycle};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "popledger=info,popledger_core=info,popledger_pop3=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting PopLedger");

    let paths = Paths::resolve();
    paths.ensure_dirs().await.with_context(|| {
        format!(
            "failed to create data directories under {}",
            paths.root.display()
        )
    })?;
    info!("Data directory: {}", paths.root.display());

    let config = Config::load(&paths.settings).await;
    info!(
        "Checking every {}s, timezone {}",
        config.check_interval_secs, config.target_timezone
    );

    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupt received, stopping after the current step");
            let _ = shutdown_tx.send(true);
        }
    });

    let ledger = Ledger::pop3(paths, &config);
    loop {
        match ledger.run_once().await {
            Ok(Some(report)) => log_report(&report),
            Ok(None) => info!("Nothing to do, waiting for accounts"),
            Err(e) => error!("Cycle failed: {e}"),
        }

        let wake = wait_for_next_cycle(
            &ledger.paths().trigger,
            config.check_interval(),
            &mut shutdown_rx,
        )
        .await;
        if wake == Wake::Shutdown {
            break;
        }
    }

    info!("PopLedger stopped");
    Ok(())
}

fn log_report(report: &CycleReport) {
    for account in report.accounts.iter().filter(|a| !a.is_done()) {
        if let Some(e) = &account.error {
            error!(
                "{}: aborted while {}: {e}",
                account.identity,
                account.aborted_at.unwrap_or(account.state)
            );
        }
    }
    if !report.index_saved {
        error!("Metadata index was not saved this cycle");
    }
}
