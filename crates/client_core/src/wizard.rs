use std::{fmt, sync::Arc};

use shared::domain::{
    AreaEstimate, ConfirmedArea, GreeningType, Location, ReportFormat, Scenario,
    SimulationResult,
};
use storage::{CommitBatch, Session, SessionStore, Slot, SlotValue};
use tracing::{debug, info, warn};

use crate::{
    error::{MissingPrerequisite, ValidationError, WizardError},
    gateway::{ComputationGateway, ReportDocument},
    planning::PlanningDraft,
    preview::{PreviewDisposition, PreviewOutcome, PreviewTicket, PreviewTracker},
    view::{ConditionCheckView, EstimateSummary, PlanningView, ReportView, ResultSummary, ResultView},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum WizardStep {
    Entry,
    ConditionCheck,
    PlanningPreview,
    Result,
    ReportReady,
}

impl WizardStep {
    pub const ALL: [WizardStep; 5] = [
        WizardStep::Entry,
        WizardStep::ConditionCheck,
        WizardStep::PlanningPreview,
        WizardStep::Result,
        WizardStep::ReportReady,
    ];

    /// Slots that must be populated before the step can be shown, upstream first.
    pub fn required_slots(self) -> &'static [Slot] {
        match self {
            WizardStep::Entry => &[],
            WizardStep::ConditionCheck => &[Slot::Location],
            WizardStep::PlanningPreview => &[Slot::Location, Slot::ConfirmedArea],
            WizardStep::Result | WizardStep::ReportReady => &[
                Slot::Location,
                Slot::ConfirmedArea,
                Slot::Scenario,
                Slot::Result,
            ],
        }
    }

    /// The step whose commit populates `slot`.
    pub fn producer_of(slot: Slot) -> WizardStep {
        match slot {
            Slot::Location => WizardStep::Entry,
            Slot::AreaEstimate | Slot::ConfirmedArea => WizardStep::ConditionCheck,
            Slot::Scenario | Slot::Result => WizardStep::PlanningPreview,
        }
    }
}

impl fmt::Display for WizardStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WizardStep::Entry => "entry",
            WizardStep::ConditionCheck => "condition-check",
            WizardStep::PlanningPreview => "planning",
            WizardStep::Result => "result",
            WizardStep::ReportReady => "report",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepRoute {
    Ready(WizardStep),
    /// The requested step cannot render; the only way forward is `redirect_to`.
    Fallback(MissingPrerequisite),
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct WizardOptions {
    /// Forwarded to every scenario computation; the engine picks its own when absent.
    pub baseline_surface_temp_c: Option<f64>,
}

/// Result of a planning edit: the refreshed form and the preview it asks for.
#[derive(Debug, Clone)]
pub struct PlanningUpdate {
    pub view: PlanningView,
    pub ticket: PreviewTicket,
}

struct PlanningState {
    location: Location,
    confirmed_area: ConfirmedArea,
    draft: PlanningDraft,
}

/// Session state machine for the rooftop wizard.
///
/// All slot reads and writes go through [`Session`], which applies cascade
/// invalidation. Transient planning state (the editable draft and preview
/// results) lives here and is never persisted.
pub struct WizardController<S> {
    session: Session<S>,
    gateway: Arc<dyn ComputationGateway>,
    options: WizardOptions,
    planning: Option<PlanningState>,
    previews: PreviewTracker,
}

impl<S: SessionStore> WizardController<S> {
    pub fn new(
        session: Session<S>,
        gateway: Arc<dyn ComputationGateway>,
        options: WizardOptions,
    ) -> Self {
        Self {
            session,
            gateway,
            options,
            planning: None,
            previews: PreviewTracker::default(),
        }
    }

    pub fn session(&self) -> &Session<S> {
        &self.session
    }

    pub fn gateway(&self) -> Arc<dyn ComputationGateway> {
        Arc::clone(&self.gateway)
    }

    pub fn options(&self) -> WizardOptions {
        self.options
    }

    /// Whether `step` can render, or where the user has to go instead.
    pub async fn route(&self, step: WizardStep) -> Result<StepRoute, WizardError> {
        for slot in step.required_slots() {
            if !self.session.is_populated(*slot).await? {
                return Ok(StepRoute::Fallback(MissingPrerequisite {
                    requested: step,
                    missing: *slot,
                    redirect_to: WizardStep::producer_of(*slot),
                }));
            }
        }
        Ok(StepRoute::Ready(step))
    }

    /// Furthest step the persisted session supports, for resuming after a restart.
    pub async fn resume_step(&self) -> Result<WizardStep, WizardError> {
        for step in [
            WizardStep::Result,
            WizardStep::PlanningPreview,
            WizardStep::ConditionCheck,
        ] {
            if let StepRoute::Ready(step) = self.route(step).await? {
                return Ok(step);
            }
        }
        Ok(WizardStep::Entry)
    }

    /// Resolves `address` and starts a fresh session around it.
    ///
    /// Nothing is touched unless resolution succeeds. Submitting the same
    /// address again still resets every downstream slot.
    pub async fn submit_address(&mut self, address: &str) -> Result<Location, WizardError> {
        let address = address.trim();
        if address.is_empty() {
            return Err(ValidationError::EmptyAddress.into());
        }

        let location = self
            .gateway
            .resolve_address(address)
            .await
            .inspect_err(|err| warn!(error = %err, "address resolution failed"))?;

        self.session.restart_with(&location).await?;
        self.leave_planning();
        info!(
            normalized_address = %location.normalized_address,
            provider = %location.provider,
            "location committed; session reset"
        );
        Ok(location)
    }

    /// Loads the condition-check step, fetching the rooftop estimate the first
    /// time the step is entered for the current location.
    pub async fn enter_condition_check(&mut self) -> Result<ConditionCheckView, WizardError> {
        self.require(WizardStep::ConditionCheck).await?;
        self.leave_planning();

        let location: Location = self.load_required(WizardStep::ConditionCheck).await?;
        let mut estimate: Option<AreaEstimate> = self.session.load().await?;
        let mut estimate_error = None;
        if estimate.is_none() {
            match self.gateway.estimate_roof_area(location.point).await {
                Ok(fetched) => {
                    self.session.commit(&fetched).await?;
                    info!(confidence = ?fetched.confidence, "rooftop estimate committed");
                    estimate = Some(fetched);
                }
                Err(err) => {
                    warn!(error = %err, "rooftop estimate unavailable");
                    estimate_error = Some(err);
                }
            }
        } else {
            debug!("reusing stored rooftop estimate");
        }

        let confirmed_area: Option<ConfirmedArea> = self.session.load().await?;
        let area_input = confirmed_area
            .map(ConfirmedArea::square_meters)
            .or_else(|| estimate.as_ref().and_then(|e| e.seed_value()))
            .map(|area| area.to_string())
            .unwrap_or_default();

        Ok(ConditionCheckView {
            summary: EstimateSummary::new(estimate.as_ref()),
            location,
            estimate,
            confirmed_area,
            area_input,
            estimate_error,
        })
    }

    /// Validates the typed area and commits it. A changed area clears the
    /// stored result; the stored scenario stays.
    pub async fn apply_area(&mut self, input: &str) -> Result<ConfirmedArea, WizardError> {
        self.require(WizardStep::ConditionCheck).await?;
        let area = parse_area_input(input)?;

        let invalidated = self.session.commit(&area).await?;
        if !invalidated.is_empty() {
            self.leave_planning();
        }
        info!(square_meters = area.square_meters(), ?invalidated, "roof area confirmed");
        Ok(area)
    }

    /// Condition check to planning. Refused while no area has been confirmed.
    pub async fn advance_to_planning(&mut self) -> Result<PlanningUpdate, WizardError> {
        self.require(WizardStep::ConditionCheck).await?;
        if !self.session.is_populated(Slot::ConfirmedArea).await? {
            return Err(ValidationError::AreaNotConfirmed.into());
        }
        self.enter_planning().await
    }

    /// Opens the planning form from the saved scenario (or defaults) and
    /// issues the first preview.
    pub async fn enter_planning(&mut self) -> Result<PlanningUpdate, WizardError> {
        self.require(WizardStep::PlanningPreview).await?;
        let location: Location = self.load_required(WizardStep::PlanningPreview).await?;
        let confirmed_area: ConfirmedArea =
            self.load_required(WizardStep::PlanningPreview).await?;
        let saved: Option<Scenario> = self.session.load().await?;

        self.previews.reset();
        self.planning = Some(PlanningState {
            location,
            confirmed_area,
            draft: PlanningDraft::from_saved(saved.as_ref()),
        });
        info!(restored = saved.is_some(), "entered planning");
        self.edit_plan(|_| Ok(()))
    }

    pub fn select_greening_type(
        &mut self,
        greening_type: GreeningType,
    ) -> Result<PlanningUpdate, WizardError> {
        self.edit_plan(|draft| {
            draft.select_greening_type(greening_type);
            Ok(())
        })
    }

    pub fn set_coverage_ratio(&mut self, value: f64) -> Result<PlanningUpdate, WizardError> {
        self.edit_plan(|draft| draft.set_coverage_ratio(value))
    }

    pub fn select_species(&mut self, species: &str) -> Result<PlanningUpdate, WizardError> {
        self.edit_plan(|draft| draft.select_species(species))
    }

    pub fn set_tree_count(&mut self, count: u32) -> Result<PlanningUpdate, WizardError> {
        self.edit_plan(|draft| draft.set_tree_count(count))
    }

    /// Current planning form, without issuing a preview.
    pub fn planning_view(&self) -> Result<PlanningView, WizardError> {
        let state = self.planning.as_ref().ok_or(WizardError::StepNotActive {
            step: WizardStep::PlanningPreview,
        })?;
        Ok(PlanningView::new(
            state.location.clone(),
            state.confirmed_area,
            &state.draft,
            &self.previews,
        ))
    }

    /// Computes a preview ticket against this controller's gateway.
    pub async fn run_preview(&self, ticket: PreviewTicket) -> PreviewOutcome {
        ticket.run(self.gateway.as_ref()).await
    }

    /// Hands a finished preview back. Outcomes for anything but the latest
    /// edit are dropped.
    pub fn apply_preview(&mut self, outcome: PreviewOutcome) -> PreviewDisposition {
        let generation = outcome.generation;
        if self.planning.is_none() {
            debug!(generation, "planning closed; dropping preview");
            return PreviewDisposition::Stale;
        }
        let disposition = self.previews.apply(outcome);
        match disposition {
            PreviewDisposition::Applied => {
                if let Some(err) = self.previews.error() {
                    warn!(generation, error = %err, "scenario preview failed");
                }
            }
            PreviewDisposition::Stale => warn!(
                generation,
                latest = self.previews.latest_generation(),
                "discarding stale scenario preview"
            ),
        }
        disposition
    }

    /// Planning to result: computes the draft for real and commits scenario
    /// and result as one pair. On failure nothing is written and planning
    /// stays open.
    pub async fn commit_plan(&mut self) -> Result<ResultView, WizardError> {
        let scenario = self.active_planning()?.draft.scenario()?;
        let confirmed_area: ConfirmedArea =
            self.load_required(WizardStep::PlanningPreview).await?;

        let result = self
            .gateway
            .compute_scenario(
                confirmed_area.square_meters(),
                &scenario,
                self.options.baseline_surface_temp_c,
            )
            .await
            .inspect_err(|err| warn!(error = %err, "scenario computation failed"))?;

        self.session
            .commit_batch(CommitBatch::new().with(&scenario)?.with(&result)?)
            .await?;
        self.leave_planning();
        info!(
            greening_type = %scenario.greening_type(),
            green_area_m2 = result.green_area_m2,
            "scenario and result committed"
        );

        let location = self.session.load().await?;
        Ok(ResultView {
            summary: ResultSummary::new(Some(&result)),
            location,
            scenario,
            result,
        })
    }

    pub async fn enter_result(&mut self) -> Result<ResultView, WizardError> {
        self.require(WizardStep::Result).await?;
        self.leave_planning();
        let scenario: Scenario = self.load_required(WizardStep::Result).await?;
        let result: SimulationResult = self.load_required(WizardStep::Result).await?;
        Ok(ResultView {
            location: self.session.load().await?,
            summary: ResultSummary::new(Some(&result)),
            scenario,
            result,
        })
    }

    pub async fn enter_report(&mut self) -> Result<ReportView, WizardError> {
        self.require(WizardStep::ReportReady).await?;
        self.leave_planning();
        let scenario: Scenario = self.load_required(WizardStep::ReportReady).await?;
        let result: SimulationResult = self.load_required(WizardStep::ReportReady).await?;
        Ok(ReportView {
            location: self.session.load().await?,
            summary: ResultSummary::new(Some(&result)),
            scenario,
            result,
            formats: ReportFormat::ALL.to_vec(),
        })
    }

    /// Renders one report format. Does not touch the session; a failure only
    /// affects this attempt.
    pub async fn download_report(
        &self,
        format: ReportFormat,
    ) -> Result<ReportDocument, WizardError> {
        self.require(WizardStep::ReportReady).await?;
        let result: SimulationResult = self.load_required(WizardStep::ReportReady).await?;
        let document = self
            .gateway
            .render_report(format, &result)
            .await
            .inspect_err(|err| warn!(%format, error = %err, "report generation failed"))?;
        info!(%format, filename = %document.filename, bytes = document.bytes.len(), "report rendered");
        Ok(document)
    }

    /// Clears every slot and returns to the entry step.
    pub async fn restart(&mut self) -> Result<(), WizardError> {
        self.session.clear_all().await?;
        self.leave_planning();
        info!("session cleared");
        Ok(())
    }

    fn edit_plan(
        &mut self,
        edit: impl FnOnce(&mut PlanningDraft) -> Result<(), ValidationError>,
    ) -> Result<PlanningUpdate, WizardError> {
        let baseline = self.options.baseline_surface_temp_c;
        let state = self.planning.as_mut().ok_or(WizardError::StepNotActive {
            step: WizardStep::PlanningPreview,
        })?;
        edit(&mut state.draft)?;
        let scenario = state.draft.scenario()?;
        let ticket = self
            .previews
            .issue(state.confirmed_area.square_meters(), scenario, baseline);
        debug!(generation = ticket.generation, "issued scenario preview");

        Ok(PlanningUpdate {
            view: PlanningView::new(
                state.location.clone(),
                state.confirmed_area,
                &state.draft,
                &self.previews,
            ),
            ticket,
        })
    }

    fn active_planning(&self) -> Result<&PlanningState, WizardError> {
        self.planning.as_ref().ok_or(WizardError::StepNotActive {
            step: WizardStep::PlanningPreview,
        })
    }

    fn leave_planning(&mut self) {
        if self.planning.take().is_some() {
            self.previews.reset();
        }
    }

    async fn require(&self, step: WizardStep) -> Result<(), WizardError> {
        match self.route(step).await? {
            StepRoute::Ready(_) => Ok(()),
            StepRoute::Fallback(missing) => {
                info!(%step, missing = %missing.missing, redirect_to = %missing.redirect_to, "missing prerequisite");
                Err(missing.into())
            }
        }
    }

    async fn load_required<T: SlotValue>(&self, step: WizardStep) -> Result<T, WizardError> {
        self.session.load::<T>().await?.ok_or_else(|| {
            MissingPrerequisite {
                requested: step,
                missing: T::SLOT,
                redirect_to: WizardStep::producer_of(T::SLOT),
            }
            .into()
        })
    }
}

/// Parses a typed roof area, tolerating `,` grouping separators.
pub fn parse_area_input(input: &str) -> Result<ConfirmedArea, ValidationError> {
    let trimmed = input.trim();
    let cleaned: String = trimmed.chars().filter(|c| *c != ',').collect();
    cleaned
        .parse::<f64>()
        .ok()
        .and_then(|value| ConfirmedArea::new(value).ok())
        .ok_or_else(|| ValidationError::InvalidArea {
            input: trimmed.to_string(),
        })
}

#[cfg(test)]
#[path = "tests/wizard_tests.rs"]
mod tests;
