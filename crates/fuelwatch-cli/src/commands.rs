//! Command handlers. Each one works against an already-open [`Store`] and
//! prints a plain-text summary to stdout.

use fuelwatch_core::{AppConfig, FuelGrade, NewSubscription};
use fuelwatch_db::{PoolConfig, Store};
use fuelwatch_pipeline::{spawn_cycle_worker, GradeListing, Services, TriggerSource};
use rust_decimal::Decimal;

pub(crate) async fn open_store(config: &AppConfig) -> anyhow::Result<Store> {
    Ok(Store::connect(&config.database_url, PoolConfig::from_app_config(config)).await?)
}

pub(crate) async fn run_migrate(store: &Store) -> anyhow::Result<()> {
    let applied = store.run_migrations().await?;
    println!("applied {applied} migration(s)");
    Ok(())
}

/// Runs one cycle through the worker so the same one-at-a-time rules apply
/// as in the server.
pub(crate) async fn run_cycle(store: &Store, config: &AppConfig, json: bool) -> anyhow::Result<()> {
    let services = Services::from_config(store.clone(), config)?;
    let (handle, worker) = spawn_cycle_worker(services.runner);

    let report = handle.run_and_wait(TriggerSource::Cli).await?;
    handle.shutdown();
    worker.await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!(
            "cycle {}: ingested {}, matched {}, notified {}, errors {}",
            report.run_id.map_or_else(|| "-".to_owned(), |id| id.to_string()),
            report.ingested,
            report.matched,
            report.notified,
            report.errors.len()
        );
        for error in &report.errors {
            println!("  {error}");
        }
    }

    if report.is_failure() {
        anyhow::bail!("cycle failed");
    }
    Ok(())
}

pub(crate) async fn run_prices(
    store: &Store,
    config: &AppConfig,
    grade: Option<&str>,
    email: Option<&str>,
    k: usize,
) -> anyhow::Result<()> {
    let query = fuelwatch_pipeline::PriceQuery::new(store.clone(), config.cycle.average_speed_kmh);
    let listings = match grade {
        Some(raw) => {
            let grade = raw.parse::<FuelGrade>()?;
            vec![query.for_grade(grade, email, k).await?]
        }
        None => query.for_subscriber(email, k).await?,
    };

    for listing in &listings {
        print_listing(listing);
    }
    Ok(())
}

fn print_listing(listing: &GradeListing) {
    println!("{}", listing.grade);
    if listing.prices.is_empty() {
        println!("  (no prices)");
        return;
    }
    for (rank, row) in listing.prices.iter().enumerate() {
        let travel = match (row.distance_km, row.eta_minutes) {
            (Some(km), Some(min)) => format!("  {km:.1} km, ~{min:.0} min"),
            _ => String::new(),
        };
        println!(
            "  {:>2}. {:<30} €{}  ({}){travel}",
            rank + 1,
            row.record.station,
            row.record.price,
            row.record.freshness_label,
        );
    }
}

pub(crate) async fn run_subscribe(
    store: &Store,
    config: &AppConfig,
    email: &str,
    threshold: Decimal,
    grade: &str,
    address: Option<&str>,
) -> anyhow::Result<()> {
    let new = NewSubscription::new(email, threshold, grade.parse()?)?;
    let services = Services::from_config(store.clone(), config)?;
    let outcome = services.registry.subscribe(&new, address).await?;

    println!(
        "subscribed {} to {} at or below €{}",
        outcome.subscription.email, outcome.subscription.grade, outcome.subscription.threshold
    );
    if address.is_some() && !outcome.location_resolved {
        println!("warning: address could not be resolved; saved without a location");
    }
    Ok(())
}

pub(crate) async fn run_unsubscribe(
    store: &Store,
    config: &AppConfig,
    email: &str,
) -> anyhow::Result<()> {
    Services::from_config(store.clone(), config)?
        .registry
        .unsubscribe(email)
        .await?;
    println!("unsubscribed {email}");
    Ok(())
}

pub(crate) async fn run_locate(
    store: &Store,
    config: &AppConfig,
    email: &str,
    address: &str,
) -> anyhow::Result<()> {
    let subscription = Services::from_config(store.clone(), config)?
        .registry
        .set_location(email, address)
        .await?;
    if let Some(location) = &subscription.location {
        println!(
            "{} located at {:.5}, {:.5}",
            subscription.email, location.latitude, location.longitude
        );
    }
    Ok(())
}

pub(crate) async fn run_runs(store: &Store, limit: i64) -> anyhow::Result<()> {
    let runs = store.list_cycle_runs(limit.clamp(1, 200)).await?;
    if runs.is_empty() {
        println!("no cycle runs recorded");
        return Ok(());
    }
    for run in runs {
        println!(
            "#{:<5} {:<9} {:<9} {}  ingested {:>4}  matched {:>3}  sent {:>3}  errors {:>3}{}",
            run.id,
            run.trigger_source,
            run.status,
            run.started_at.format("%Y-%m-%d %H:%M:%S"),
            run.records_ingested,
            run.alerts_matched,
            run.messages_sent,
            run.error_count,
            run.error_message
                .map(|m| format!("  ({m})"))
                .unwrap_or_default(),
        );
    }
    Ok(())
}
