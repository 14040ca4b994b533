use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use georedirect::config::Config;
use georedirect::geo::{GeoIpService, GeoLookup, StaticGeoLookup};
use georedirect::models::{GlobalSettings, RedirectDecision};
use georedirect::redirect::{DebugLog, RedirectEngine, RedirectRequest, VisitSigner};
use georedirect::storage::{self, SettingsStore};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "georedirect-admin")]
#[command(about = "Geo redirect settings management CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print a summary of the current settings
    Show,
    /// Write the settings as JSON
    Export {
        /// Output file (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Replace the settings with a previously exported JSON file
    Import {
        file: PathBuf,
    },
    /// Restore default settings
    Reset,
    /// Print the debug log
    Log,
    /// Dry-run the redirect decision for a synthetic request
    Check {
        /// Absolute URL of the visited page
        #[arg(long)]
        url: String,
        /// Force the visitor country instead of asking the GeoIP database
        #[arg(long)]
        country: Option<String>,
        /// Visitor IP address
        #[arg(long, default_value = "8.8.8.8")]
        ip: String,
        #[arg(long)]
        user_agent: Option<String>,
        /// Evaluate as an admin (matters in development mode)
        #[arg(long)]
        admin: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    let store = storage::open_store(&config.database).await?;

    match cli.command {
        Commands::Show => {
            let settings = store.read_settings().await?;
            print_summary(&settings);
        }
        Commands::Export { output } => {
            let settings = store.read_settings().await?;
            let json = settings.to_json_pretty()?;
            match output {
                Some(path) => {
                    std::fs::write(&path, json + "\n")
                        .with_context(|| format!("failed to write {}", path.display()))?;
                    println!("✓ Exported settings to {}", path.display());
                }
                None => println!("{}", json),
            }
        }
        Commands::Import { file } => {
            let json = std::fs::read_to_string(&file)
                .with_context(|| format!("failed to read {}", file.display()))?;
            let settings = GlobalSettings::from_json(&json)
                .with_context(|| format!("{} is not a valid settings export", file.display()))?;
            store.write_settings(&settings).await?;
            println!(
                "✓ Imported {} rule(s) from {}",
                settings.rules.len(),
                file.display()
            );
        }
        Commands::Reset => {
            store.reset_settings().await?;
            println!("✓ Settings reset to defaults");
        }
        Commands::Log => {
            let settings = store.read_settings().await?;
            if !settings.debug_logging_enabled {
                println!("Debug logging is disabled.");
                return Ok(());
            }
            let content = DebugLog::new(&config.redirect.debug_log_path).read()?;
            if content.is_empty() {
                println!("Debug log is empty.");
            } else {
                print!("{}", content);
            }
        }
        Commands::Check {
            url,
            country,
            ip,
            user_agent,
            admin,
        } => {
            let geo: Arc<dyn GeoLookup> = match country {
                Some(country) => Arc::new(StaticGeoLookup::always(&country)),
                None => Arc::new(GeoIpService::new(config.redirect.geoip_db_path.as_deref())?),
            };

            let mut request = RedirectRequest::new(&url)?.with_header("x-real-ip", &ip)?;
            if let Some(user_agent) = user_agent {
                request = request.with_header("user-agent", &user_agent)?;
            }
            if admin {
                request = request.as_admin();
            }
            request.kind = config
                .redirect
                .classifier()?
                .classify(&request.path, &request.headers);

            let settings = store.read_settings().await?;
            let engine = RedirectEngine::new(geo, &config.site.url);
            let mut visits =
                VisitSigner::new(config.redirect.visit_cookie_secret.as_deref()).tracker(&request.headers);
            let decision = engine.evaluate(&request, &settings, &mut visits);

            println!("Category: {}", decision.category().as_str());
            match decision {
                RedirectDecision::Redirected {
                    status,
                    destination,
                } => println!("Redirect: {} -> {}", status, destination),
                RedirectDecision::NoMatch => println!("No rule matched"),
                RedirectDecision::Skipped { reason } => println!("Skipped: {}", reason),
                RedirectDecision::Error { reason } => {
                    let source = std::error::Error::source(&reason)
                        .map(|s| format!(" ({})", s))
                        .unwrap_or_default();
                    println!("Terminated: {}{}", reason, source);
                }
            }
        }
    }

    Ok(())
}

fn print_summary(settings: &GlobalSettings) {
    let flag = |on: bool| if on { "on" } else { "off" };

    println!("Redirect enabled:        {}", flag(settings.redirect_enabled));
    println!("Development mode:        {}", flag(settings.development_mode));
    println!("Debug logging:           {}", flag(settings.debug_logging_enabled));
    println!("Skip for bots:           {}", flag(settings.skip_for_bots));
    println!("Skip on override param:  {}", flag(settings.skip_if_override_param_present));
    println!("First visit only:        {}", flag(settings.first_visit_only));
    println!("Redirect status:         {}", settings.redirect_status_code);

    if settings.rules.is_empty() {
        println!("\nNo redirect rules configured.");
        return;
    }

    println!();
    println!("{:<4} {:<30} {:<30} {:<8} {}", "#", "Visited", "Target", "Match", "Countries");
    println!("{}", "-".repeat(90));
    for (index, rule) in settings.rules.iter().enumerate() {
        let countries: Vec<&str> = rule.countries.iter().map(String::as_str).collect();
        println!(
            "{:<4} {:<30} {:<30} {:<8} {}",
            index,
            rule.visited_url_pattern,
            rule.target_url_pattern,
            format!("{:?}", rule.match_condition),
            countries.join(",")
        );
    }
}
