use std::{path::PathBuf, sync::Arc};

use anyhow::{bail, Context, Result};
use basket_api::{load_settings_from, MemoryBasket};
use clap::{Parser, Subcommand};
use client_core::{
    AddForm, BasketApi, BasketEvent, CollectionController, RowEditController, RowOutcome,
    RowSnapshot, ViewState,
};
use serde::Serialize;
use tokio::{sync::broadcast::error::RecvError, task::JoinHandle};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

/// Drives one action against a freshly seeded in-memory basket and prints the resulting view.
#[derive(Parser, Debug)]
#[command(name = "basket")]
struct Args {
    #[arg(long, default_value = "basket.toml")]
    config: PathBuf,
    /// Overrides the simulated latency from config and environment.
    #[arg(long)]
    latency_ms: Option<u64>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    List,
    Add { name: String },
    Rename { old_name: String, new_name: String },
    Delete { name: String },
}

#[derive(Serialize)]
struct Report {
    view: ViewState,
    rows: RowSnapshot,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    let args = Args::parse();

    let mut settings = load_settings_from(&args.config)?;
    if let Some(latency_ms) = args.latency_ms {
        settings.latency_ms = latency_ms;
    }
    info!(
        latency_ms = settings.latency_ms,
        seed = settings.seed.len(),
        "basket: starting"
    );

    let api: Arc<dyn BasketApi> = Arc::new(MemoryBasket::from_settings(&settings));
    let (collection, initial_load) = CollectionController::start(api);
    let event_log = spawn_event_log(&collection);
    initial_load.await.context("initial load task failed")?;

    let rows = RowEditController::new(Arc::clone(&collection));
    let failure = match args.command {
        Command::List => None,
        Command::Add { name } => {
            let mut form = AddForm::new(Arc::clone(&collection));
            form.set_value(name);
            if form.submit().await? {
                None
            } else {
                collection.view().await.error
            }
        }
        Command::Rename { old_name, new_name } => {
            rows.begin_edit(&old_name).await?;
            rows.change_draft(new_name).await?;
            outcome_failure(rows.commit().await?)
        }
        Command::Delete { name } => outcome_failure(rows.delete_row(&name).await?),
    };

    let report = Report {
        view: collection.view().await,
        rows: rows.snapshot().await,
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    event_log.abort();

    if let Some(message) = failure {
        bail!(message);
    }
    Ok(())
}

fn outcome_failure(outcome: RowOutcome) -> Option<String> {
    match outcome {
        RowOutcome::Applied => None,
        RowOutcome::Failed(message) => Some(message),
    }
}

fn spawn_event_log(collection: &CollectionController) -> JoinHandle<()> {
    let mut events = collection.subscribe();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(BasketEvent::View(view)) => debug!(
                    items = view.items.len(),
                    is_loading = view.is_loading,
                    is_submitting = view.is_submitting,
                    error = ?view.error,
                    "basket: view changed"
                ),
                Ok(BasketEvent::Row(rows)) => debug!(
                    editing = ?rows.editing.as_ref().map(|edit| &edit.target_name),
                    deleting = rows.deleting.len(),
                    "basket: rows changed"
                ),
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "basket: event log lagged");
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}
