use clap::{Arg, ArgMatches, Command};
use log::LevelFilter;
use mailguard::extension::{LocalAnalysis, MemoryStore, MessageRouter, MessageView, Provider};
use mailguard::heuristics::{
    self, EmailRecord, BODY_KEYWORD_WEIGHT, DISPLAY_NAME_WEIGHT, LINK_WEIGHT, MODEL_NAME,
    SUBJECT_KEYWORD_WEIGHT, SUSPICION_THRESHOLD,
};
use mailguard::server::{self, AppState};
use mailguard::Config;
use std::io::Read;
use std::process;

fn cli() -> Command {
    Command::new("mailguard")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Heuristic phishing detection for email")
        .long_about(
            "MailGuard scores an email's sender, display name, subject, body and links \
             against a fixed heuristic ruleset and explains every point it assigns.\n\
             It can analyze raw message files, JSON records, or serve the same engine \
             over a small REST API.",
        )
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path")
                .default_value("/etc/mailguard.yaml"),
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
                .help("Test configuration validity")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("list-rules")
                .long("list-rules")
                .help("List the heuristic rules and their weights")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("test-email")
                .long("test-email")
                .value_name("FILE")
                .help("Analyze a raw RFC 822 message file")
                .action(clap::ArgAction::Set),
        )
        .arg(
            Arg::new("analyze-json")
                .long("analyze-json")
                .value_name("FILE")
                .help("Analyze a JSON email record ('-' reads stdin)")
                .action(clap::ArgAction::Set),
        )
        .arg(
            Arg::new("provider")
                .long("provider")
                .value_name("NAME")
                .help("Treat --analyze-json input as a scraped message view from gmail or outlook")
                .requires("analyze-json")
                .action(clap::ArgAction::Set),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .help("Print analysis results as JSON")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("api-server")
                .long("api-server")
                .help("Start REST API server for remote email analysis")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Enable verbose logging with per-rule detail")
                .action(clap::ArgAction::SetTrue),
        )
}

#[tokio::main]
async fn main() {
    let matches = cli().get_matches();

    if let Some(generate_path) = matches.get_one::<String>("generate-config") {
        generate_default_config(generate_path);
        return;
    }

    let config_path = matches
        .get_one::<String>("config")
        .map(String::as_str)
        .unwrap_or("/etc/mailguard.yaml");
    let (config, config_found) = match load_config(config_path) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("Error loading configuration: {e:#}");
            process::exit(1);
        }
    };

    // Initialize logger based on verbose flag, falling back to the configured level
    let log_level = if matches.get_flag("verbose") {
        LevelFilter::Debug
    } else {
        config.log_level()
    };
    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .init();

    if !config_found {
        log::warn!("Configuration file '{config_path}' not found, using default configuration");
    }

    if matches.get_flag("test-config") {
        test_config(&config, config_path);
        return;
    }

    if matches.get_flag("list-rules") {
        list_rules();
        return;
    }

    let as_json = matches.get_flag("json");

    if let Some(email_file) = matches.get_one::<String>("test-email") {
        test_email_file(email_file, as_json);
        return;
    }

    if let Some(input) = matches.get_one::<String>("analyze-json") {
        analyze_json(&config, &matches, input, as_json);
        return;
    }

    if matches.get_flag("api-server") {
        let port = std::env::var("PORT").ok();
        let addr = match config.server.socket_addr(port.as_deref()) {
            Ok(addr) => addr,
            Err(e) => {
                log::error!("Invalid server address: {e:#}");
                process::exit(1);
            }
        };
        if let Err(e) = server::serve(addr, AppState::new()).await {
            log::error!("API server error: {e:#}");
            process::exit(1);
        }
        return;
    }

    if let Err(e) = cli().print_help() {
        eprintln!("Error printing help: {e}");
    }
}

fn load_config(path: &str) -> anyhow::Result<(Config, bool)> {
    if std::path::Path::new(path).exists() {
        Ok((Config::from_file(path)?, true))
    } else {
        Ok((Config::default(), false))
    }
}

fn generate_default_config(path: &str) {
    let config = Config::default();
    match config.to_file(path) {
        Ok(()) => {
            println!("Default configuration written to: {path}");
            println!("Please edit the configuration file to suit your needs.");
        }
        Err(e) => {
            eprintln!("Error writing configuration file: {e:#}");
            process::exit(1);
        }
    }
}

fn test_config(config: &Config, path: &str) {
    println!("🔍 Testing configuration: {path}");
    println!();

    if let Err(e) = config.validate() {
        println!("❌ Configuration validation failed:");
        println!("Error: {e:#}");
        process::exit(1);
    }

    println!("API listen address: {}", config.server.listen);
    println!("Log level: {}", config.log_level());
    println!(
        "Cloud analysis: {}",
        if config.preferences.cloud_analysis_enabled {
            "enabled"
        } else {
            "disabled"
        }
    );
    println!(
        "Privacy consent: {}",
        if config.preferences.privacy_consent {
            "granted"
        } else {
            "not granted"
        }
    );
    println!(
        "Whitelisted senders: {}",
        config.preferences.whitelisted_senders.len()
    );
    println!("Blocked senders: {}", config.preferences.blocked_senders.len());
    println!(
        "Keyword rules compiled: {}",
        heuristics::engine().urgency_matcher().rules().count()
    );
    println!("✅ Configuration is valid");
}

fn list_rules() {
    println!("📋 Heuristic ruleset {MODEL_NAME}");
    println!("═══════════════════════════════════════");
    println!("  Suspicious at score >= {SUSPICION_THRESHOLD} (max 100)");
    println!();
    println!(
        "  +{DISPLAY_NAME_WEIGHT:<3} Display name's first word missing from sender address"
    );
    println!(
        "  +{LINK_WEIGHT:<3} Per risky link: invalid URL, '@', IP host, long path, encoded path"
    );
    println!("  +{SUBJECT_KEYWORD_WEIGHT:<3} Subject matches any keyword rule");
    println!("  +{BODY_KEYWORD_WEIGHT:<3} Body matches any keyword rule");
    println!();
    println!("  Keyword rules:");
    for (pattern, label) in heuristics::engine().urgency_matcher().rules() {
        println!("    • {label}");
        println!("      /{pattern}/i");
    }
}

fn read_input(input: &str) -> std::io::Result<String> {
    if input == "-" {
        let mut content = String::new();
        std::io::stdin().read_to_string(&mut content)?;
        Ok(content)
    } else {
        std::fs::read_to_string(input)
    }
}

fn test_email_file(email_file: &str, as_json: bool) {
    let content = match read_input(email_file) {
        Ok(content) => content,
        Err(e) => {
            eprintln!("❌ Error reading email file: {}", e);
            process::exit(1);
        }
    };

    let email = match mailguard::message::parse_message(&content) {
        Ok(email) => email,
        Err(e) => {
            eprintln!("❌ Error parsing email file: {}", e);
            process::exit(1);
        }
    };

    let outcome = heuristics::evaluate(&email);
    if as_json {
        print_json(&outcome);
        return;
    }

    println!("🧪 Testing email file: {}", email_file);
    println!();
    print_email_details(&email);
    let severity = outcome.severity();
    print_verdict(&LocalAnalysis {
        outcome,
        source: mailguard::extension::AnalysisSource::Local,
        severity,
    });
}

fn analyze_json(config: &Config, matches: &ArgMatches, input: &str, as_json: bool) {
    let content = match read_input(input) {
        Ok(content) => content,
        Err(e) => {
            eprintln!("❌ Error reading {}: {}", input, e);
            process::exit(1);
        }
    };

    let router = MessageRouter::new(MemoryStore::new(config.preferences.clone()));

    let (email, analysis) = match matches.get_one::<String>("provider") {
        Some(name) => {
            let provider: Provider = name.parse().unwrap_or_else(|e: String| {
                eprintln!("❌ {}", e);
                process::exit(1);
            });
            let view: MessageView = serde_json::from_str(&content).unwrap_or_else(|e| {
                eprintln!("❌ Invalid message view JSON: {}", e);
                process::exit(1);
            });
            match router.analyze_view(provider, &view) {
                Ok(Some(analysis)) => (None, analysis),
                Ok(None) => {
                    eprintln!("❌ Could not extract a sender address from the message view");
                    process::exit(1);
                }
                Err(e) => {
                    eprintln!("❌ {}", e);
                    process::exit(1);
                }
            }
        }
        None => {
            let email: EmailRecord = serde_json::from_str(&content).unwrap_or_else(|e| {
                eprintln!("❌ Invalid email record JSON: {}", e);
                process::exit(1);
            });
            match router.analyze(&email) {
                Ok(analysis) => (Some(email), analysis),
                Err(e) => {
                    eprintln!("❌ {}", e);
                    process::exit(1);
                }
            }
        }
    };

    if as_json {
        print_json(&analysis);
        return;
    }

    if let Some(email) = &email {
        print_email_details(email);
    }
    print_verdict(&analysis);
}

fn print_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{json}"),
        Err(e) => {
            eprintln!("❌ Failed to serialize result: {}", e);
            process::exit(1);
        }
    }
}

fn print_email_details(email: &EmailRecord) {
    println!("📧 Email Details:");
    println!("   From: {}", email.from);
    if let Some(display_name) = &email.display_name {
        println!("   Display name: {}", display_name);
    }
    println!("   Subject: {}", email.subject);
    println!("   Links: {}", email.links.len());
    println!(
        "   Body: {}",
        if email.body.is_some() {
            "present"
        } else {
            "absent"
        }
    );
    println!();
}

fn print_verdict(analysis: &LocalAnalysis) {
    let outcome = &analysis.outcome;
    if outcome.suspicious {
        println!(
            "🚨 Result: SUSPICIOUS (score {}/100, {})",
            outcome.score,
            analysis.severity.as_str()
        );
    } else {
        println!("✅ Result: NOT SUSPICIOUS (score {}/100)", outcome.score);
    }

    if !outcome.reasons.is_empty() {
        println!("   Reasons:");
        for reason in &outcome.reasons {
            println!("     - {}", reason);
        }
    }
    println!("   Model: {}", outcome.model);
}
