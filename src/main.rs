use anyhow::Result;
use clap::Parser;

use coupling_lens::cli::{Cli, Commands};
use coupling_lens::config::{Config, ConfigService};
use coupling_lens::error::{ErrorCode, LensError};
use coupling_lens::models::request::{Command, SessionRequest};
use coupling_lens::service::{Analysis, AppService};
use coupling_lens::session;

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        println!("{}", error_value(&e));
        std::process::exit(1);
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn classify_error(e: &anyhow::Error) -> (String, String) {
    if let Some(le) = e.downcast_ref::<LensError>() {
        (le.code.to_string(), le.message.clone())
    } else {
        (ErrorCode::IoError.to_string(), format!("{e:#}"))
    }
}

fn error_value(e: &anyhow::Error) -> serde_json::Value {
    let (code, message) = classify_error(e);
    serde_json::json!({ "error": { "code": code, "message": message } })
}

fn serialize_output(value: &impl serde::Serialize, pretty: bool) -> Result<String> {
    if pretty {
        Ok(serde_json::to_string_pretty(value)?)
    } else {
        Ok(serde_json::to_string(value)?)
    }
}

fn print_json(value: &impl serde::Serialize, pretty: bool) -> Result<()> {
    println!("{}", serialize_output(value, pretty)?);
    Ok(())
}

/// A flag wins over the config file.
fn service_for(glob: Option<String>, config: &Config) -> AppService {
    AppService::with_glob(glob.or_else(|| config.glob.clone()))
}

// ---------------------------------------------------------------------------
// Dispatcher
// ---------------------------------------------------------------------------

fn run(cli: Cli) -> Result<()> {
    let pretty = cli.pretty;

    let config = ConfigService::load(cli.config.as_deref())?;

    if cli.debug || config.debug {
        coupling_lens::logger::init(&config)?;
    }

    match cli.command {
        Commands::Init { path } => {
            let config_path = if let Some(p) = path {
                ConfigService::generate_at(&p)?;
                p
            } else {
                ConfigService::generate_default()?;
                ConfigService::default_path()
            };
            eprintln!("Configuration file created at: {}", config_path.display());
            Ok(())
        }
        Commands::Facts { dir, glob } => {
            let facts = service_for(glob, &config).collect_facts(&dir)?;
            print_json(&facts, pretty)
        }
        Commands::Weights {
            dir,
            glob,
            min_percent,
        } => {
            let analysis = service_for(glob, &config).analyze(&dir)?;
            print_json(&analysis.weights_report(min_percent)?, pretty)
        }
        Commands::Coupling { dir, glob, a, b } => {
            let analysis = service_for(glob, &config).analyze(&dir)?;
            print_json(&analysis.pair(&a, &b)?, pretty)
        }
        Commands::Cluster { dir, glob, steps } => {
            let analysis = service_for(glob, &config).analyze(&dir)?;
            print_json(&analysis.clusters(steps), pretty)
        }
        Commands::Dendrogram { dir, glob } => {
            let analysis = service_for(glob, &config).analyze(&dir)?;
            print_json(&analysis.dendrogram(), pretty)
        }
        Commands::Modules {
            dir,
            glob,
            cp,
            mode,
        } => {
            let analysis = service_for(glob, &config).analyze(&dir)?;
            let result = analysis.modules(cp.unwrap_or(config.cp), mode.unwrap_or(config.mode))?;
            print_json(&result, pretty)
        }
        Commands::Session { dir, glob } => {
            let analysis = service_for(glob, &config).analyze(&dir)?;
            session::run_session(|req| {
                Ok(handle_request(&analysis, &config, req).unwrap_or_else(|e| error_value(&e)))
            })
        }
    }
}

fn handle_request(
    analysis: &Analysis,
    config: &Config,
    req: SessionRequest,
) -> Result<serde_json::Value> {
    match req.command {
        Command::Facts => Ok(serde_json::to_value(analysis.facts())?),
        Command::Weights => {
            let result = analysis.weights_report(req.min_percent.unwrap_or(0.0))?;
            Ok(serde_json::to_value(result)?)
        }
        Command::Coupling => {
            let (Some(a), Some(b)) = (req.a.as_deref(), req.b.as_deref()) else {
                anyhow::bail!(LensError::new(
                    ErrorCode::InvalidRequest,
                    "coupling requires both \"a\" and \"b\"",
                ));
            };
            Ok(serde_json::to_value(analysis.pair(a, b)?)?)
        }
        Command::Cluster => Ok(serde_json::to_value(analysis.clusters(req.steps))?),
        Command::Dendrogram => Ok(serde_json::to_value(analysis.dendrogram())?),
        Command::Modules => {
            let cp = req.cp.unwrap_or(config.cp);
            let mode = req.mode.unwrap_or(config.mode);
            Ok(serde_json::to_value(analysis.modules(cp, mode)?)?)
        }
    }
}
