//! `pclock` - CLI for punchclock
//!
//! This binary manages users and records clock-in/clock-out events for the
//! logged-in user.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use std::io::BufRead;
use std::sync::Arc;

use anyhow::{bail, Context};
use chrono::Local;
use clap::Parser;

use punchclock::cli::{Cli, Command, ConfigCommand, HistoryCommand, UserCommand};
use punchclock::{
    init_logging, Accounts, AttendanceRecord, AttendanceSession, ClockType, Config, Ledger,
    LocationResolver, SqliteStore, User,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbosity());

    // `config validate` must report errors rather than fail on them
    if let Command::Config(ConfigCommand::Validate { file }) = cli.command {
        return handle_config_validate(file.or(cli.config));
    }

    let config = Config::load_from(cli.config.clone())?;

    match cli.command {
        Command::Config(config_cmd) => handle_config(&config, config_cmd),
        Command::User(user_cmd) => handle_user(&open_store(&config)?, user_cmd),
        Command::Login(cmd) => {
            let password = resolve_password(cmd.password)?;
            let user = Accounts::new(open_store(&config)?).login(&cmd.email, &password)?;
            println!("Logged in as {} <{}>", user.name, user.email);
            Ok(())
        }
        Command::Logout => {
            Accounts::new(open_store(&config)?).logout()?;
            println!("Logged out.");
            Ok(())
        }
        Command::Whoami => {
            match Accounts::new(open_store(&config)?).current_user()? {
                Some(user) => println!("{} <{}>", user.name, user.email),
                None => println!("Not logged in."),
            }
            Ok(())
        }
        Command::In => handle_clock(&config, ClockType::ClockIn).await,
        Command::Out => handle_clock(&config, ClockType::ClockOut).await,
        Command::Today(cmd) => handle_today(&config, cmd.json),
        Command::History(cmd) => handle_history(&config, &cmd),
        Command::Status(cmd) => handle_status(&config, cmd.json),
    }
}

fn open_store(config: &Config) -> anyhow::Result<Arc<SqliteStore>> {
    let path = config.database_path();
    let store = SqliteStore::open(&path)
        .with_context(|| format!("failed to open database at {}", path.display()))?;
    Ok(Arc::new(store))
}

/// Open the store, seed the ledger and start a session for the logged-in user.
fn open_session(config: &Config) -> anyhow::Result<(User, AttendanceSession)> {
    let store = open_store(config)?;
    let user = Accounts::new(store.clone()).require_user()?;

    let ledger = Ledger::new(store);
    ledger.init()?;

    let resolver = LocationResolver::from_config(config)?;
    let mut session = AttendanceSession::new(ledger, resolver);
    session.load_records(&user.id)?;
    Ok((user, session))
}

fn resolve_password(password: Option<String>) -> anyhow::Result<String> {
    if let Some(password) = password {
        return Ok(password);
    }

    eprint!("Password: ");
    let mut line = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .context("failed to read password from stdin")?;
    let password = line.trim_end_matches(['\r', '\n']).to_string();
    if password.is_empty() {
        bail!("password must not be empty");
    }
    Ok(password)
}

fn handle_user(store: &Arc<SqliteStore>, cmd: UserCommand) -> anyhow::Result<()> {
    let accounts = Accounts::new(store.clone());
    match cmd {
        UserCommand::Add {
            email,
            name,
            password,
        } => {
            let password = resolve_password(password)?;
            let user = accounts.register(&email, &name, &password)?;
            println!("Registered {} <{}>", user.name, user.email);
        }
        UserCommand::List { json } => {
            let users = accounts.users()?;
            if json {
                let listed: Vec<_> = users
                    .iter()
                    .map(|u| serde_json::json!({"id": u.id, "email": u.email, "name": u.name}))
                    .collect();
                println!("{}", serde_json::to_string_pretty(&listed)?);
            } else if users.is_empty() {
                println!("No users registered.");
            } else {
                for user in users {
                    println!("{}  {} <{}>", user.id, user.name, user.email);
                }
            }
        }
    }
    Ok(())
}

async fn handle_clock(config: &Config, kind: ClockType) -> anyhow::Result<()> {
    let (user, mut session) = open_session(config)?;

    let record = match kind {
        ClockType::ClockIn => session.clock_in(&user.id).await?,
        ClockType::ClockOut => session.clock_out(&user.id).await?,
    };

    println!(
        "{} at {}",
        match kind {
            ClockType::ClockIn => "Clocked in",
            ClockType::ClockOut => "Clocked out",
        },
        record.timestamp.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S")
    );
    println!(
        "  {} ({:.6}, {:.6})",
        record.location.address, record.location.latitude, record.location.longitude
    );
    Ok(())
}

fn handle_today(config: &Config, json: bool) -> anyhow::Result<()> {
    let (_, session) = open_session(config)?;
    let records: Vec<AttendanceRecord> = session.today_records().into_iter().cloned().collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&records)?);
    } else if records.is_empty() {
        println!("No records today.");
    } else {
        print_records(&records);
    }
    Ok(())
}

fn handle_history(config: &Config, cmd: &HistoryCommand) -> anyhow::Result<()> {
    let (_, session) = open_session(config)?;
    let all = session.records();
    let skip = cmd.limit.map_or(0, |limit| all.len().saturating_sub(limit));
    let records = &all[skip..];

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(records)?);
    } else if records.is_empty() {
        println!("No records.");
    } else {
        print_records(records);
    }
    Ok(())
}

fn print_records(records: &[AttendanceRecord]) {
    for record in records {
        println!(
            "{}  {:<9}  {}",
            record.timestamp.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S"),
            record.kind,
            record.location.address
        );
    }
}

fn handle_status(config: &Config, json: bool) -> anyhow::Result<()> {
    let store = open_store(config)?;
    let stats = store.stats()?;
    let user = Accounts::new(store.clone()).current_user()?;
    let records = Ledger::new(store).count()?;

    if json {
        let status = serde_json::json!({
            "database_path": config.database_path(),
            "schema_version": stats.schema_version,
            "db_size_bytes": stats.db_size_bytes,
            "records": records,
            "current_user": user.as_ref().map(|u| &u.email),
            "location_source": config.location.source,
            "geocoding_enabled": config.geocoding.enabled,
        });
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        println!("pclock status");
        println!("-------------");
        println!("Database:      {}", config.database_path().display());
        println!("Schema:        v{}", stats.schema_version);
        println!("Size:          {} bytes", stats.db_size_bytes);
        println!("Records:       {records}");
        println!(
            "User:          {}",
            user.map_or_else(|| "(not logged in)".to_string(), |u| u.email)
        );
        println!("Location:      {:?}", config.location.source);
        println!(
            "Geocoding:     {}",
            if config.geocoding.enabled {
                config.geocoding.endpoint.as_str()
            } else {
                "disabled"
            }
        );
    }
    Ok(())
}

fn handle_config(config: &Config, cmd: ConfigCommand) -> anyhow::Result<()> {
    match cmd {
        ConfigCommand::Show { json } => {
            if json {
                println!("{}", serde_json::to_string_pretty(config)?);
            } else {
                println!("Current Configuration");
                println!("=====================");
                println!();
                println!("[Storage]");
                println!("  Database path:      {}", config.database_path().display());
                println!();
                println!("[Location]");
                println!("  Source:             {:?}", config.location.source);
                println!("  Command:            {}", config.location.command.join(" "));
                if let Some(fix) = config.fixed_position() {
                    println!("  Fixed position:     {}, {}", fix.latitude, fix.longitude);
                }
                println!("  Timeout (secs):     {}", config.location.timeout_secs);
                println!("  High accuracy:      {}", config.location.high_accuracy);
                println!("  Maximum age (secs): {}", config.location.maximum_age_secs);
                println!();
                println!("[Geocoding]");
                println!("  Enabled:            {}", config.geocoding.enabled);
                println!("  Endpoint:           {}", config.geocoding.endpoint);
                println!("  Language:           {}", config.geocoding.language);
                println!("  Timeout (secs):     {}", config.geocoding.timeout_secs);
                println!("  Fallback address:   {}", config.geocoding.fallback_address);
            }
        }
        ConfigCommand::Path => {
            println!("{}", Config::default_config_path().display());
        }
        ConfigCommand::Validate { file } => return handle_config_validate(file),
    }
    Ok(())
}

fn handle_config_validate(file: Option<std::path::PathBuf>) -> anyhow::Result<()> {
    let path = file.unwrap_or_else(Config::default_config_path);
    println!("Validating configuration: {}", path.display());
    match Config::load_from(Some(path)) {
        Ok(_) => println!("Configuration is valid."),
        Err(e) => println!("Configuration error: {e}"),
    }
    Ok(())
}
