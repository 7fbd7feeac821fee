//! `adsblog` - CLI for adsblogger
//!
//! This binary runs the flight logger and provides read-only views of the
//! database it writes.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use anyhow::Context;
use clap::Parser;

use adsblogger::cli::{Cli, Command, ConfigCommand, FlightsCommand, RunCommand};
use adsblogger::service::{self, ShutdownHandle};
use adsblogger::storage::date_string;
use adsblogger::{init_logging, Config, Flight, Storage};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbosity());

    let config = Config::load_from(cli.config.clone())?;

    match cli.command {
        Command::Run(run_cmd) => handle_run(config, run_cmd),
        Command::Status(status_cmd) => handle_status(&config, status_cmd.json),
        Command::Records(records_cmd) => handle_records(&config, records_cmd.json),
        Command::Flights(flights_cmd) => handle_flights(&config, &flights_cmd),
        Command::Config(config_cmd) => handle_config(&config, cli.config, config_cmd),
    }
}

fn handle_run(mut config: Config, cmd: RunCommand) -> anyhow::Result<()> {
    if let Some(feed) = cmd.feed {
        config.feed.url = feed;
    }
    if let Some(database) = cmd.database {
        config.storage.database_path = Some(database);
    }
    config.validate()?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;

    runtime.block_on(async {
        let shutdown = ShutdownHandle::new();
        service::install_signal_handlers(shutdown.clone())?;
        service::run(config, shutdown).await
    })?;
    Ok(())
}

fn open_database(config: &Config) -> anyhow::Result<Storage> {
    let path = config.database_path();
    Storage::open_read_only(&path).with_context(|| {
        format!(
            "no readable database at {} (has the logger run?)",
            path.display()
        )
    })
}

fn handle_status(config: &Config, json: bool) -> anyhow::Result<()> {
    let storage = open_database(config)?;
    let stats = storage.stats()?;

    if json {
        let status = serde_json::json!({
            "database_path": storage.path(),
            "database_size_bytes": stats.db_size_bytes,
            "flights": stats.total_flights,
            "records_set": stats.records_set,
            "oldest_flight": stats.oldest_flight,
            "newest_flight": stats.newest_flight,
            "feed_url": config.feed.url,
        });
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        println!("adsblog status");
        println!("--------------");
        println!("Feed:          {}", config.feed.url);
        println!("Database:      {}", storage.path().display());
        println!("Size:          {} bytes", stats.db_size_bytes);
        println!("Flights:       {}", stats.total_flights);
        println!("Records set:   {}", stats.records_set);
        if let (Some(oldest), Some(newest)) = (stats.oldest_flight, stats.newest_flight) {
            println!(
                "Covering:      {} to {}",
                date_string(oldest),
                date_string(newest)
            );
        }
    }
    Ok(())
}

fn handle_records(config: &Config, json: bool) -> anyhow::Result<()> {
    let storage = open_database(config)?;
    let records = storage.all_records()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }

    println!(
        "{:<26} {:<4} {:>12}  {:<10} {:<8} {:<6} {:<9} {}",
        "Metric", "", "Value", "Date", "Hex", "Type", "Reg", "Callsign"
    );
    for record in &records {
        let Some(holder) = &record.holder else {
            println!(
                "{:<26} {:<4} {:>12}",
                record.key.label(),
                record.direction.as_str(),
                "-"
            );
            continue;
        };
        let identity = &holder.identity;
        println!(
            "{:<26} {:<4} {:>12.2}  {:<10} {:<8} {:<6} {:<9} {}",
            record.key.label(),
            record.direction.as_str(),
            holder.value,
            date_string(holder.timestamp),
            identity.hex.as_deref().unwrap_or("-"),
            identity.aircraft_type.as_deref().unwrap_or("-"),
            identity.registration.as_deref().unwrap_or("-"),
            identity.callsign.as_deref().unwrap_or("-"),
        );
    }
    Ok(())
}

fn handle_flights(config: &Config, cmd: &FlightsCommand) -> anyhow::Result<()> {
    let storage = open_database(config)?;
    let flights: Vec<Flight> = match cmd.since {
        Some(since) => storage
            .recent_flights(since)?
            .into_iter()
            .take(cmd.limit)
            .collect(),
        None => storage.latest_flights(cmd.limit)?,
    };

    if cmd.json {
        let rows: Vec<_> = flights
            .iter()
            .map(|flight| {
                serde_json::json!({
                    "id": flight.key(),
                    "time": flight.start,
                    "date": date_string(flight.start),
                    "hex": flight.identity.hex,
                    "registration": flight.identity.registration,
                    "type": flight.identity.aircraft_type,
                    "flight": flight.identity.callsign,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    if flights.is_empty() {
        println!("No flights stored.");
        return Ok(());
    }
    for flight in &flights {
        println!("{}  {}", date_string(flight.start), flight.identity);
    }
    Ok(())
}

fn handle_config(
    config: &Config,
    config_path: Option<std::path::PathBuf>,
    cmd: ConfigCommand,
) -> anyhow::Result<()> {
    match cmd {
        ConfigCommand::Show { json } => {
            if json {
                println!("{}", serde_json::to_string_pretty(config)?);
            } else {
                let overwrite: Vec<String> = config
                    .tracking
                    .always_overwrite
                    .iter()
                    .map(ToString::to_string)
                    .collect();
                println!("Current Configuration");
                println!("=====================");
                println!();
                println!("[Feed]");
                println!("  URL:                {}", config.feed.url);
                println!("  Timeout (s):        {}", config.feed.timeout_secs);
                println!("  Poll interval (ms): {}", config.feed.poll_interval_ms);
                println!();
                println!("[Tracking]");
                println!(
                    "  Uniqueness window:  {}s",
                    config.tracking.uniqueness_window_secs
                );
                println!(
                    "  Status interval:    {}s",
                    config.tracking.status_interval_secs
                );
                println!(
                    "  Flush interval:     {}s",
                    config.tracking.flush_interval_secs
                );
                println!("  Always overwrite:   [{}]", overwrite.join(", "));
                println!();
                println!("[Storage]");
                println!("  Database path:      {}", config.database_path().display());
            }
        }
        ConfigCommand::Path => {
            let path = config_path.unwrap_or_else(Config::default_config_path);
            println!("{}", path.display());
        }
        ConfigCommand::Validate { file } => {
            let path = file
                .or(config_path)
                .unwrap_or_else(Config::default_config_path);
            println!("Validating configuration: {}", path.display());
            match Config::load_from(Some(path)) {
                Ok(_) => println!("Configuration is valid."),
                Err(e) => println!("Configuration error: {e}"),
            }
        }
    }
    Ok(())
}
