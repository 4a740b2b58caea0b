use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use client_core::{
    spawn_wizard, HttpGateway, ReportDocument, WizardController, WizardError, WizardOptions,
};
use shared::domain::{GreeningType, ReportFormat, SessionId};
use storage::{Session, SqliteSessionStore, Storage};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod config;
mod render;
mod repl;

use config::{load_settings, prepare_database_url, Settings};

#[derive(Parser, Debug)]
#[command(about = "Rooftop greening wizard")]
struct Cli {
    /// Computation service root, e.g. http://127.0.0.1:8000/api/v1
    #[arg(long)]
    api_base_url: Option<String>,
    #[arg(long)]
    database_url: Option<String>,
    /// Session to operate on instead of the remembered one.
    #[arg(long)]
    session: Option<String>,
    #[arg(long)]
    baseline_temp: Option<f64>,
    /// Client request timeout; 0 disables it.
    #[arg(long)]
    timeout_seconds: Option<u64>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Resolve an address and start a fresh session around it.
    Start { address: Vec<String> },
    /// Show where the session can resume.
    Status,
    /// Show the rooftop estimate, fetching it on first use.
    Estimate,
    /// Confirm the usable roof area in square meters.
    ApplyArea { value: String },
    /// Edit the greening plan and preview it; `--commit` saves the result.
    Plan {
        #[arg(long = "type", value_parser = parse_greening_type)]
        greening_type: Option<GreeningType>,
        #[arg(long)]
        coverage: Option<f64>,
        #[arg(long)]
        species: Option<String>,
        #[arg(long)]
        trees: Option<u32>,
        #[arg(long)]
        commit: bool,
    },
    /// Show the saved result.
    Result,
    /// Render and save a report document.
    Report {
        #[arg(long, value_enum, default_value_t = FormatArg::Pdf)]
        format: FormatArg,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Clear every slot of the current session.
    Restart,
    /// Switch to a brand new session.
    NewSession,
    /// Interactive mode.
    Repl,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum FormatArg {
    Pdf,
    Excel,
}

impl From<FormatArg> for ReportFormat {
    fn from(value: FormatArg) -> Self {
        match value {
            FormatArg::Pdf => ReportFormat::Pdf,
            FormatArg::Excel => ReportFormat::Excel,
        }
    }
}

fn parse_greening_type(raw: &str) -> Result<GreeningType, String> {
    raw.parse::<GreeningType>().map_err(|e| e.to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let settings = apply_cli_overrides(load_settings(), &cli);

    let database_url = prepare_database_url(&settings.database_url)?;
    let storage = Storage::new(&database_url).await.map_err(|err| {
        error!(%database_url, "failed to open session database: {err:#}");
        err
    })?;

    if let Command::NewSession = cli.command {
        let session_id = SessionId::generate();
        remember_session(&settings.session_file, &session_id)?;
        println!("session {session_id}");
        return Ok(());
    }

    let session_id = resolve_session(&settings)?;
    let gateway = HttpGateway::new(&settings.api_base_url, settings.request_timeout())?;
    info!(
        session = %session_id,
        api = %gateway.base_url(),
        "wizard ready"
    );

    let mut controller = WizardController::new(
        Session::new(storage.session(session_id)),
        Arc::new(gateway),
        WizardOptions {
            baseline_surface_temp_c: settings.baseline_surface_temp_c,
        },
    );

    if let Command::Repl = cli.command {
        return repl::run(spawn_wizard(controller), PathBuf::from(&settings.report_dir)).await;
    }

    match execute(&mut controller, cli.command, &settings).await {
        Ok(()) => Ok(()),
        Err(err) => {
            println!("{}", render::error(&err));
            Err(err.into())
        }
    }
}

fn apply_cli_overrides(mut settings: Settings, cli: &Cli) -> Settings {
    if let Some(v) = &cli.api_base_url {
        settings.api_base_url = v.clone();
    }
    if let Some(v) = &cli.database_url {
        settings.database_url = v.clone();
    }
    if let Some(v) = &cli.session {
        settings.session_id = Some(v.clone());
    }
    if let Some(v) = cli.baseline_temp {
        settings.baseline_surface_temp_c = Some(v);
    }
    if let Some(v) = cli.timeout_seconds {
        settings.request_timeout_seconds = v;
    }
    settings
}

async fn execute(
    controller: &mut WizardController<SqliteSessionStore>,
    command: Command,
    settings: &Settings,
) -> Result<(), WizardError> {
    match command {
        Command::Start { address } => {
            let location = controller.submit_address(&address.join(" ")).await?;
            println!("{}", render::location(&location));
        }
        Command::Status => {
            let step = controller.resume_step().await?;
            println!("session {}", controller.session().store().session_id());
            println!("resume at: {step}");
            println!("{}", render::step_hint(step));
        }
        Command::Estimate => {
            let view = controller.enter_condition_check().await?;
            println!("{}", render::condition_check(&view));
        }
        Command::ApplyArea { value } => {
            let area = controller.apply_area(&value).await?;
            println!("confirmed area: {area} m2");
        }
        Command::Plan {
            greening_type,
            coverage,
            species,
            trees,
            commit,
        } => {
            let mut update = controller.advance_to_planning().await?;
            if let Some(greening_type) = greening_type {
                update = controller.select_greening_type(greening_type)?;
            }
            if let Some(coverage) = coverage {
                update = controller.set_coverage_ratio(coverage)?;
            }
            if let Some(species) = species {
                update = controller.select_species(&species)?;
            }
            if let Some(trees) = trees {
                update = controller.set_tree_count(trees)?;
            }

            let outcome = controller.run_preview(update.ticket).await;
            controller.apply_preview(outcome);
            println!("{}", render::planning(&controller.planning_view()?));

            if commit {
                let view = controller.commit_plan().await?;
                println!("{}", render::result(&view));
            }
        }
        Command::Result => {
            let view = controller.enter_result().await?;
            println!("{}", render::result(&view));
        }
        Command::Report { format, out } => {
            let view = controller.enter_report().await?;
            println!("{}", render::report(&view));
            let document = controller.download_report(format.into()).await?;
            let path = save_report(&document, Path::new(&settings.report_dir), out.as_deref())
                .await?;
            println!("{}\nsaved to {}", render::document(&document), path.display());
        }
        Command::Restart => {
            controller.restart().await?;
            println!("session cleared");
        }
        Command::NewSession | Command::Repl => {}
    }
    Ok(())
}

/// Writes a rendered report. Without `out`, the service-provided file name is
/// used inside `report_dir`.
pub(crate) async fn save_report(
    document: &ReportDocument,
    report_dir: &Path,
    out: Option<&Path>,
) -> Result<PathBuf> {
    let path = match out {
        Some(out) => out.to_path_buf(),
        None => {
            let filename = Path::new(&document.filename)
                .file_name()
                .map(|name| name.to_os_string())
                .unwrap_or_else(|| document.format.default_filename().into());
            report_dir.join(filename)
        }
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("failed to create '{}'", parent.display()))?;
    }
    tokio::fs::write(&path, &document.bytes)
        .await
        .with_context(|| format!("failed to write report '{}'", path.display()))?;
    Ok(path)
}

fn resolve_session(settings: &Settings) -> Result<SessionId> {
    if let Some(raw) = &settings.session_id {
        return Ok(SessionId::parse(raw)?);
    }
    if let Ok(raw) = fs::read_to_string(&settings.session_file) {
        if let Ok(session_id) = SessionId::parse(&raw) {
            return Ok(session_id);
        }
    }
    let session_id = SessionId::generate();
    remember_session(&settings.session_file, &session_id)?;
    info!(session = %session_id, "started new session");
    Ok(session_id)
}

fn remember_session(session_file: &str, session_id: &SessionId) -> Result<()> {
    let path = Path::new(session_file);
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create '{}'", parent.display()))?;
    }
    fs::write(path, session_id.as_str())
        .with_context(|| format!("failed to write session file '{session_file}'"))
}
