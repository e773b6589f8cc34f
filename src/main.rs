use anyhow::Context;
use call_screener::config::Config;
use call_screener::diagnostics::DiagnosticsCollector;
use call_screener::engine::ScreeningEngine;
use call_screener::normalization::normalize_str;
use call_screener::session::{CallEvent, LoggingResponder, ScreeningOutcome, ScreeningSession};
use call_screener::setup::SetupStatus;
use call_screener::ContactDirectory;
use clap::parser::ValueSource;
use clap::{Arg, ArgMatches, Command};
use log::LevelFilter;
use std::path::Path;
use std::process;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

type Session = ScreeningSession<dyn ContactDirectory, LoggingResponder>;

#[tokio::main]
async fn main() {
    let matches = Command::new("call-screener")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Screens incoming calls against the user's contacts")
        .long_about(
            "Allows calls from numbers saved in the contact directory and rejects the rest.\n\
             Rejected calls still appear in the call log and raise a notification.\n\
             Callers with no identifier are always let through.",
        )
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path")
                .default_value(Config::default_path()),
        )
        .arg(
            Arg::new("generate-config")
                .long("generate-config")
                .value_name("FILE")
                .help("Generate a default configuration file")
                .action(clap::ArgAction::Set),
        )
        .arg(
            Arg::new("test-config")
                .long("test-config")
                .help("Test configuration validity and show the loaded contacts")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("check")
                .long("check")
                .value_name("NUMBER")
                .help("Screen a single caller identifier")
                .action(clap::ArgAction::Set),
        )
        .arg(
            Arg::new("unknown-caller")
                .long("unknown-caller")
                .help("Screen a call that carries no caller identifier")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("normalize")
                .long("normalize")
                .value_name("NUMBER")
                .help("Print the normalized form of a number")
                .action(clap::ArgAction::Set),
        )
        .arg(
            Arg::new("status")
                .long("status")
                .help("Show whether screening preconditions are met")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("stdin")
                .long("stdin")
                .help("Screen one caller identifier per line from stdin (blank line = unknown caller)")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .help("Print screening outcomes as JSON lines")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Enable verbose logging")
                .action(clap::ArgAction::SetTrue),
        )
        .get_matches();

    if let Some(normalize_arg) = matches.get_one::<String>("normalize") {
        let normalized = normalize_str(normalize_arg);
        if normalized.is_empty() {
            println!("(no dialable digits)");
        } else {
            println!("{normalized}");
        }
        return;
    }

    if let Some(generate_path) = matches.get_one::<String>("generate-config") {
        generate_default_config(generate_path);
        return;
    }

    let config = match load_config(&matches) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error loading configuration: {e:#}");
            process::exit(1);
        }
    };

    let log_level = if matches.get_flag("verbose") {
        LevelFilter::Debug
    } else {
        config.logging.level_filter().unwrap_or(LevelFilter::Info)
    };

    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .init();

    if let Err(e) = run(&matches, &config).await {
        eprintln!("❌ {e:#}");
        process::exit(1);
    }
}

async fn run(matches: &ArgMatches, config: &Config) -> anyhow::Result<()> {
    if matches.get_flag("test-config") {
        return test_config(config);
    }

    if matches.get_flag("status") {
        print_status(&config.setup);
        return Ok(());
    }

    let json = matches.get_flag("json");
    let check = matches.get_one::<String>("check");
    let unknown_caller = matches.get_flag("unknown-caller");
    let from_stdin = matches.get_flag("stdin");

    if check.is_none() && !unknown_caller && !from_stdin {
        println!("Nothing to do. Use --check, --unknown-caller, --stdin or --help.");
        return Ok(());
    }

    if !config.setup.state().is_active() {
        log::warn!(
            "Screening preconditions not met: {}",
            config.setup.state().describe()
        );
    }

    let collector = config.diagnostics.enabled.then(|| {
        Arc::new(DiagnosticsCollector::new(
            config.diagnostics.summary_interval_seconds,
        ))
    });

    let mut engine = ScreeningEngine::new(config.engine_config());
    if let Some(collector) = &collector {
        engine = engine.with_diagnostics(collector.clone());
    }

    let session: Session = ScreeningSession::new(
        Arc::new(engine),
        config.contact_directory()?,
        Arc::new(LoggingResponder),
        config.lookup_timeout(),
    )
    .with_max_pending_lookups(config.screening.max_pending_lookups);

    if let Some(number) = check {
        let outcome = session
            .screen_call(CallEvent::new("cli-1", Some(number)))
            .await;
        print_outcome(&outcome, json)?;
    } else if unknown_caller {
        let outcome = session.screen_call(CallEvent::new("cli-1", None)).await;
        print_outcome(&outcome, json)?;
    } else {
        let events = read_call_events().await?;
        log::info!("Screening {} calls from stdin", events.len());
        for outcome in session.screen_calls(events).await {
            print_outcome(&outcome, json)?;
        }
    }

    drop(session);
    if let Some(collector) = collector {
        match Arc::try_unwrap(collector) {
            Ok(collector) => {
                let stats = collector.shutdown().await;
                log::debug!("Final screening stats: {stats:?}");
            }
            Err(collector) => log::debug!("Screening stats: {:?}", collector.snapshot()),
        }
    }

    Ok(())
}

fn load_config(matches: &ArgMatches) -> anyhow::Result<Config> {
    let config_path = matches
        .get_one::<String>("config")
        .map(String::as_str)
        .unwrap_or(Config::default_path());

    // Fall back to built-in defaults only when no config file was asked for.
    let explicit = matches.value_source("config") != Some(ValueSource::DefaultValue);
    if !explicit && !Path::new(config_path).exists() {
        return Ok(Config::default());
    }

    Config::load_from_file(config_path)
}

fn generate_default_config(path: &str) {
    let content = match Config::sample().to_toml_string() {
        Ok(content) => content,
        Err(e) => {
            eprintln!("❌ {e:#}");
            process::exit(1);
        }
    };

    match std::fs::write(path, content) {
        Ok(()) => println!("✅ Default configuration written to: {path}"),
        Err(e) => {
            eprintln!("❌ Failed to write configuration file: {e}");
            process::exit(1);
        }
    }
}

fn test_config(config: &Config) -> anyhow::Result<()> {
    println!("🔍 Testing configuration...");
    println!();
    println!("Fail-safe disposition: {}", config.screening.fail_safe);
    println!("Lookup timeout: {} ms", config.screening.lookup_timeout_ms);
    println!("Max pending lookups: {}", config.screening.max_pending_lookups);
    println!(
        "Diagnostics: {} (numbers {})",
        if config.diagnostics.enabled { "enabled" } else { "disabled" },
        if config.diagnostics.redact_numbers { "redacted" } else { "shown" }
    );

    if config.contacts.reload_on_lookup {
        let file = config
            .contacts
            .file
            .as_deref()
            .context("contacts.reload_on_lookup needs contacts.file")?;
        let snapshot = call_screener::FileDirectory::new(file).snapshot()?;
        println!("Contacts file (read per lookup): {file}");
        println!("Number of contact numbers: {}", snapshot.len());
    } else {
        let directory = config.load_contacts()?;
        println!("Number of contact numbers: {}", directory.len());
        for (i, contact) in directory.contacts().iter().enumerate() {
            println!("  Contact {}: {}", i + 1, contact.display());
        }
    }

    println!();
    print_status(&config.setup);
    println!("✅ Configuration is valid");
    Ok(())
}

fn print_status(status: &SetupStatus) {
    let card = |active: bool, title: &str| {
        println!("{} {}", if active { "✓" } else { "○" }, title);
    };

    card(status.has_permissions(), "Permissions");
    card(status.screening_role_held, "Call-screening role");

    let missing = status.missing_permissions();
    if !missing.is_empty() {
        let names: Vec<&str> = missing.iter().map(|p| p.as_str()).collect();
        println!("  Missing: {}", names.join(", "));
    }
    println!("{}", status.state().describe());
}

fn print_outcome(outcome: &ScreeningOutcome, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string(outcome)?);
        return Ok(());
    }

    let icon = if outcome.response.is_blocking() {
        "🚫"
    } else {
        "✅"
    };
    println!("{icon} {}", outcome.event.summary());
    println!(
        "   disallow={} reject={} skip_call_log={} skip_notification={} ({} ms)",
        outcome.response.disallow,
        outcome.response.reject,
        outcome.response.skip_call_log,
        outcome.response.skip_notification,
        outcome.elapsed_ms
    );
    Ok(())
}

async fn read_call_events() -> anyhow::Result<Vec<CallEvent>> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut events = Vec::new();

    while let Some(line) = lines.next_line().await.context("Failed to read stdin")? {
        let caller = line.trim();
        let call_id = format!("stdin-{}", events.len() + 1);
        let caller = (!caller.is_empty()).then_some(caller);
        events.push(CallEvent::new(call_id, caller));
    }

    Ok(events)
}
