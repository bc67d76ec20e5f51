//! Reference host for the codetrack core.
//!
//! Boots one or more tabs over a shared local storage, signs each in, and
//! logs every snapshot change until interrupted or until `--run-for`
//! elapses. With a storage path configured the dataset is saved on exit.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

use codetrack_app::{logging, AppCore, SharedStorage, ViewSubscription};
use codetrack_core::{Domain, EngineConfig, UserId};

#[derive(Parser, Debug)]
#[command(name = "codetrack-host")]
#[command(about = "Run the codetrack synchronization core against local storage", long_about = None)]
struct Cli {
    /// Config file path (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Storage file; overrides the config file
    #[arg(short, long)]
    storage: Option<PathBuf>,

    /// Users to sign in, one tab each
    #[arg(short = 'u', long = "user", default_value = "a1")]
    users: Vec<String>,

    /// Stop after this many seconds instead of waiting for Ctrl-C
    #[arg(long)]
    run_for: Option<u64>,

    /// Start from an empty dataset instead of demo data
    #[arg(long)]
    no_seed: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn load_config(cli: &Cli) -> Result<EngineConfig> {
    let mut config = match &cli.config {
        Some(path) => EngineConfig::load_from_file(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => EngineConfig::default(),
    };
    config.merge_with_env().context("applying environment overrides")?;

    if let Some(path) = &cli.storage {
        config.storage.path = Some(path.clone());
    }
    if cli.no_seed {
        config.storage.seed_demo_data = false;
    }
    config.validate().context("validating config")?;
    Ok(config)
}

fn watch(tab: &str, core: &AppCore) -> Vec<ViewSubscription> {
    let label = tab.to_string();
    let users = {
        let label = label.clone();
        core.users().subscribe(move |snapshot| {
            let pending = snapshot.iter().filter(|u| u.is_pending()).count();
            tracing::info!(tab = %label, version = snapshot.version(), users = snapshot.len(), pending, "Users updated");
        })
    };
    let stats = {
        let label = label.clone();
        core.platform_stats().subscribe(move |snapshot| {
            tracing::info!(tab = %label, version = snapshot.version(), stats = snapshot.len(), "Platform stats updated");
        })
    };
    let records = {
        let label = label.clone();
        core.teacher_records().subscribe(move |snapshot| {
            tracing::info!(tab = %label, version = snapshot.version(), assignments = snapshot.len(), "Assignments updated");
        })
    };
    let notifications = {
        let label = label.clone();
        core.notifications().subscribe(move |snapshot| {
            let unread = snapshot.iter().filter(|n| !n.read).count();
            tracing::info!(tab = %label, version = snapshot.version(), unread, "Notifications updated");
        })
    };
    let announcements = core.announcements().subscribe(move |snapshot| {
        tracing::info!(tab = %label, version = snapshot.version(), announcements = snapshot.len(), "Announcements updated");
    });
    vec![users, stats, records, notifications, announcements]
}

fn sign_in(core: &AppCore, storage: &SharedStorage, id: &str) -> Result<()> {
    let user = storage
        .user(&UserId::new(id))
        .with_context(|| format!("unknown user {id}"))?;
    core.session()
        .sign_in(user)
        .with_context(|| format!("signing in {id}"))
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(if cli.verbose { "debug" } else { "info" });

    let config = load_config(&cli)?;
    let storage = SharedStorage::open(&config.storage).context("opening storage")?;

    let mut tabs = Vec::new();
    for id in &cli.users {
        let core = AppCore::with_local_storage(config.clone(), &storage)?;
        let subscriptions = watch(id, &core);
        core.start();
        sign_in(&core, &storage, id)?;
        tabs.push((core, subscriptions));
    }
    tracing::info!(tabs = tabs.len(), "Host running");

    match cli.run_for {
        Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
        None => tokio::signal::ctrl_c().await.context("waiting for Ctrl-C")?,
    }

    for (core, _) in &tabs {
        let status = core.polling().status(Domain::Users);
        tracing::info!(
            user = ?core.session().user_id(),
            fetches = status.fetches,
            failures = status.consecutive_failures,
            "Tab stopped"
        );
        core.shutdown();
    }
    if storage.save().context("saving storage")? {
        tracing::info!("Storage saved");
    }
    Ok(())
}
