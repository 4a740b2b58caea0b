//! Interactive mode: stdin lines become runtime commands, events are printed
//! as they arrive.

use std::path::PathBuf;

use anyhow::Result;
use client_core::{WizardCommand, WizardEvent, WizardHandle};
use shared::domain::{GreeningType, ReportFormat};
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    sync::broadcast::error::RecvError,
};
use tracing::warn;

use crate::{render, save_report};

pub const HELP: &str = "\
commands:
  start <address>        resolve an address and start over
  estimate               show the rooftop estimate
  area <m2>              confirm the roof area
  next                   continue to planning
  plan                   open planning from the saved scenario
  type <grass|sedum|shrub|tree>
  coverage <0..1>
  species <name>
  trees <count>
  show                   show the planning form
  commit                 compute and save the result
  result                 show the saved result
  report                 show the report step
  download <pdf|excel>   save a report document
  restart                clear the session
  quit";

#[derive(Debug, Clone)]
pub enum ReplInput {
    Command(WizardCommand),
    Help,
    Quit,
    Empty,
}

pub fn parse_line(line: &str) -> Result<ReplInput, String> {
    let line = line.trim();
    let (word, rest) = line
        .split_once(char::is_whitespace)
        .map(|(word, rest)| (word, rest.trim()))
        .unwrap_or((line, ""));

    let command = match word {
        "" => return Ok(ReplInput::Empty),
        "help" | "?" => return Ok(ReplInput::Help),
        "quit" | "exit" => return Ok(ReplInput::Quit),
        "start" => WizardCommand::SubmitAddress(rest.to_string()),
        "estimate" => WizardCommand::EnterConditionCheck,
        "area" => WizardCommand::ApplyArea(rest.to_string()),
        "next" => WizardCommand::AdvanceToPlanning,
        "plan" => WizardCommand::EnterPlanning,
        "type" => WizardCommand::SelectGreeningType(
            rest.parse::<GreeningType>().map_err(|e| e.to_string())?,
        ),
        "coverage" => WizardCommand::SetCoverageRatio(
            rest.parse::<f64>()
                .map_err(|_| format!("'{rest}' is not a ratio between 0 and 1"))?,
        ),
        "species" => WizardCommand::SelectSpecies(rest.to_string()),
        "trees" => WizardCommand::SetTreeCount(
            rest.parse::<u32>()
                .map_err(|_| format!("'{rest}' is not a tree count"))?,
        ),
        "show" => WizardCommand::DescribePlanning,
        "commit" => WizardCommand::CommitPlan,
        "result" => WizardCommand::EnterResult,
        "report" => WizardCommand::EnterReport,
        "download" => WizardCommand::DownloadReport(parse_format(rest)?),
        "restart" => WizardCommand::Restart,
        other => return Err(format!("unknown command '{other}'; type `help`")),
    };
    Ok(ReplInput::Command(command))
}

fn parse_format(raw: &str) -> Result<ReportFormat, String> {
    ReportFormat::ALL
        .into_iter()
        .find(|format| format.to_string().eq_ignore_ascii_case(raw))
        .ok_or_else(|| format!("unknown report format '{raw}'; use pdf or excel"))
}

pub async fn run(handle: WizardHandle, report_dir: PathBuf) -> Result<()> {
    let mut events = handle.subscribe();
    let printer = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(WizardEvent::ReportDownloaded(document)) => {
                    match save_report(&document, &report_dir, None).await {
                        Ok(path) => println!("{}\nsaved to {}", render::document(&document), path.display()),
                        Err(err) => println!("error: {err:#}"),
                    }
                }
                Ok(event) => println!("{}", render::event(&event)),
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "event printer fell behind"),
                Err(RecvError::Closed) => break,
            }
        }
    });

    println!("{HELP}");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match parse_line(&line) {
            Ok(ReplInput::Command(command)) => handle.send(command).await?,
            Ok(ReplInput::Help) => println!("{HELP}"),
            Ok(ReplInput::Quit) => break,
            Ok(ReplInput::Empty) => {}
            Err(message) => println!("{message}"),
        }
    }

    handle.shutdown().await?;
    let _ = printer.await;
    Ok(())
}
