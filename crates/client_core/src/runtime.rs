//! Async driver that owns a [`WizardController`] on a single task.
//!
//! Commands are processed one at a time in arrival order. Preview
//! computations run on their own tasks and re-enter the queue tagged with
//! their generation, so the controller decides whether they are still
//! current when they arrive.

use std::sync::Arc;

use anyhow::{anyhow, Result};
use shared::domain::{ConfirmedArea, GreeningType, Location, ReportFormat};
use storage::SessionStore;
use tokio::{
    sync::{broadcast, mpsc},
    task::JoinHandle,
};
use tracing::{debug, info, warn};

use crate::{
    error::{MissingPrerequisite, Recovery, WizardError},
    gateway::{ComputationGateway, ReportDocument},
    preview::{PreviewDisposition, PreviewOutcome, PreviewTicket},
    view::{ConditionCheckView, PlanningView, ReportView, ResultView},
    wizard::{PlanningUpdate, WizardController},
};

const COMMAND_QUEUE_CAPACITY: usize = 64;
const EVENT_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
pub enum WizardCommand {
    SubmitAddress(String),
    EnterConditionCheck,
    ApplyArea(String),
    AdvanceToPlanning,
    EnterPlanning,
    SelectGreeningType(GreeningType),
    SetCoverageRatio(f64),
    SelectSpecies(String),
    SetTreeCount(u32),
    DescribePlanning,
    CommitPlan,
    EnterResult,
    EnterReport,
    DownloadReport(ReportFormat),
    Restart,
}

impl WizardCommand {
    fn name(&self) -> &'static str {
        match self {
            WizardCommand::SubmitAddress(_) => "submit_address",
            WizardCommand::EnterConditionCheck => "enter_condition_check",
            WizardCommand::ApplyArea(_) => "apply_area",
            WizardCommand::AdvanceToPlanning => "advance_to_planning",
            WizardCommand::EnterPlanning => "enter_planning",
            WizardCommand::SelectGreeningType(_) => "select_greening_type",
            WizardCommand::SetCoverageRatio(_) => "set_coverage_ratio",
            WizardCommand::SelectSpecies(_) => "select_species",
            WizardCommand::SetTreeCount(_) => "set_tree_count",
            WizardCommand::DescribePlanning => "describe_planning",
            WizardCommand::CommitPlan => "commit_plan",
            WizardCommand::EnterResult => "enter_result",
            WizardCommand::EnterReport => "enter_report",
            WizardCommand::DownloadReport(_) => "download_report",
            WizardCommand::Restart => "restart",
        }
    }
}

#[derive(Debug, Clone)]
pub enum WizardEvent {
    LocationCommitted(Location),
    ConditionCheck(ConditionCheckView),
    AreaConfirmed(ConfirmedArea),
    Planning(PlanningView),
    PreviewUpdated(PlanningView),
    PreviewDiscarded { generation: u64 },
    ResultReady(ResultView),
    Report(ReportView),
    ReportDownloaded(ReportDocument),
    Restarted,
    /// The requested step is missing an upstream slot.
    Fallback(MissingPrerequisite),
    Error { message: String, recovery: Recovery },
}

enum Inbound {
    Command(WizardCommand),
    Preview(PreviewOutcome),
    Shutdown,
}

pub struct WizardHandle {
    commands: mpsc::Sender<Inbound>,
    events: broadcast::Sender<WizardEvent>,
    task: JoinHandle<()>,
}

impl WizardHandle {
    pub async fn send(&self, command: WizardCommand) -> Result<()> {
        self.commands
            .send(Inbound::Command(command))
            .await
            .map_err(|_| anyhow!("wizard runtime has stopped"))
    }

    pub fn subscribe(&self) -> broadcast::Receiver<WizardEvent> {
        self.events.subscribe()
    }

    /// Stops the runtime after the commands already queued.
    pub async fn shutdown(self) -> Result<()> {
        let _ = self.commands.send(Inbound::Shutdown).await;
        self.task
            .await
            .map_err(|e| anyhow!("wizard runtime task failed: {e}"))
    }
}

pub fn spawn_wizard<S>(controller: WizardController<S>) -> WizardHandle
where
    S: SessionStore + 'static,
{
    let (commands, inbound) = mpsc::channel(COMMAND_QUEUE_CAPACITY);
    let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
    let task = tokio::spawn(run(
        controller,
        inbound,
        commands.downgrade(),
        events.clone(),
    ));
    WizardHandle {
        commands,
        events,
        task,
    }
}

async fn run<S: SessionStore>(
    mut controller: WizardController<S>,
    mut inbound: mpsc::Receiver<Inbound>,
    requeue: mpsc::WeakSender<Inbound>,
    events: broadcast::Sender<WizardEvent>,
) {
    info!("wizard runtime started");
    while let Some(message) = inbound.recv().await {
        match message {
            Inbound::Preview(outcome) => {
                let generation = outcome.generation;
                let event = match controller.apply_preview(outcome) {
                    PreviewDisposition::Applied => match controller.planning_view() {
                        Ok(view) => WizardEvent::PreviewUpdated(view),
                        Err(_) => WizardEvent::PreviewDiscarded { generation },
                    },
                    PreviewDisposition::Stale => WizardEvent::PreviewDiscarded { generation },
                };
                emit(&events, event);
            }
            Inbound::Shutdown => break,
            Inbound::Command(command) => {
                debug!(command = command.name(), "processing wizard command");
                match execute(&mut controller, command).await {
                    Ok((event, ticket)) => {
                        emit(&events, event);
                        if let Some(ticket) = ticket {
                            spawn_preview(controller.gateway(), ticket, &requeue);
                        }
                    }
                    Err(err) => emit(&events, failure_event(err)),
                }
            }
        }
    }
    info!("wizard runtime stopped");
}

async fn execute<S: SessionStore>(
    controller: &mut WizardController<S>,
    command: WizardCommand,
) -> Result<(WizardEvent, Option<PreviewTicket>), WizardError> {
    let planning = |update: PlanningUpdate| (WizardEvent::Planning(update.view), Some(update.ticket));

    Ok(match command {
        WizardCommand::SubmitAddress(address) => (
            WizardEvent::LocationCommitted(controller.submit_address(&address).await?),
            None,
        ),
        WizardCommand::EnterConditionCheck => (
            WizardEvent::ConditionCheck(controller.enter_condition_check().await?),
            None,
        ),
        WizardCommand::ApplyArea(input) => (
            WizardEvent::AreaConfirmed(controller.apply_area(&input).await?),
            None,
        ),
        WizardCommand::AdvanceToPlanning => planning(controller.advance_to_planning().await?),
        WizardCommand::EnterPlanning => planning(controller.enter_planning().await?),
        WizardCommand::SelectGreeningType(greening_type) => {
            planning(controller.select_greening_type(greening_type)?)
        }
        WizardCommand::SetCoverageRatio(value) => planning(controller.set_coverage_ratio(value)?),
        WizardCommand::SelectSpecies(species) => planning(controller.select_species(&species)?),
        WizardCommand::SetTreeCount(count) => planning(controller.set_tree_count(count)?),
        WizardCommand::DescribePlanning => (WizardEvent::Planning(controller.planning_view()?), None),
        WizardCommand::CommitPlan => (WizardEvent::ResultReady(controller.commit_plan().await?), None),
        WizardCommand::EnterResult => (WizardEvent::ResultReady(controller.enter_result().await?), None),
        WizardCommand::EnterReport => (WizardEvent::Report(controller.enter_report().await?), None),
        WizardCommand::DownloadReport(format) => (
            WizardEvent::ReportDownloaded(controller.download_report(format).await?),
            None,
        ),
        WizardCommand::Restart => {
            controller.restart().await?;
            (WizardEvent::Restarted, None)
        }
    })
}

fn spawn_preview(
    gateway: Arc<dyn ComputationGateway>,
    ticket: PreviewTicket,
    requeue: &mpsc::WeakSender<Inbound>,
) {
    let Some(requeue) = requeue.upgrade() else {
        return;
    };
    tokio::spawn(async move {
        let outcome = ticket.run(gateway.as_ref()).await;
        let generation = outcome.generation;
        if requeue.send(Inbound::Preview(outcome)).await.is_err() {
            debug!(generation, "wizard runtime gone; dropping preview");
        }
    });
}

fn failure_event(err: WizardError) -> WizardEvent {
    match err {
        WizardError::MissingPrerequisite(missing) => WizardEvent::Fallback(missing),
        err => {
            warn!(error = %err, "wizard command failed");
            WizardEvent::Error {
                message: err.to_string(),
                recovery: err.recovery(),
            }
        }
    }
}

fn emit(events: &broadcast::Sender<WizardEvent>, event: WizardEvent) {
    if events.send(event).is_err() {
        debug!("no wizard event subscribers");
    }
}

#[cfg(test)]
#[path = "tests/runtime_tests.rs"]
mod tests;
