use shared::domain::{Scenario, SimulationResult};
use tracing::debug;

use crate::{error::GatewayError, gateway::ComputationGateway};

/// Inputs of one preview computation, tagged with the generation that
/// issued it.
#[derive(Debug, Clone, PartialEq)]
pub struct PreviewTicket {
    pub generation: u64,
    pub roof_area_m2: f64,
    pub scenario: Scenario,
    pub baseline_surface_temp_c: Option<f64>,
}

impl PreviewTicket {
    /// Runs the computation. Nothing is persisted; the outcome only becomes
    /// visible once it is handed back to the issuing tracker.
    pub async fn run(self, gateway: &dyn ComputationGateway) -> PreviewOutcome {
        debug!(generation = self.generation, "running scenario preview");
        let result = gateway
            .compute_scenario(
                self.roof_area_m2,
                &self.scenario,
                self.baseline_surface_temp_c,
            )
            .await;
        PreviewOutcome {
            generation: self.generation,
            result,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PreviewOutcome {
    pub generation: u64,
    pub result: Result<SimulationResult, GatewayError>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreviewDisposition {
    Applied,
    Stale,
}

/// Transient preview state of the planning step.
///
/// Every edit issues a new generation. An outcome is applied only when its
/// generation is still the latest issued one, regardless of arrival order.
#[derive(Debug, Default)]
pub struct PreviewTracker {
    issued: u64,
    pending: bool,
    latest: Option<SimulationResult>,
    error: Option<GatewayError>,
}

impl PreviewTracker {
    pub fn issue(
        &mut self,
        roof_area_m2: f64,
        scenario: Scenario,
        baseline_surface_temp_c: Option<f64>,
    ) -> PreviewTicket {
        self.issued += 1;
        self.pending = true;
        PreviewTicket {
            generation: self.issued,
            roof_area_m2,
            scenario,
            baseline_surface_temp_c,
        }
    }

    /// Forgets the displayed preview. Generations keep counting, so outcomes
    /// issued before the reset still arrive as stale.
    pub fn reset(&mut self) {
        self.pending = false;
        self.latest = None;
        self.error = None;
    }

    pub fn latest_generation(&self) -> u64 {
        self.issued
    }

    pub fn apply(&mut self, outcome: PreviewOutcome) -> PreviewDisposition {
        if outcome.generation != self.issued {
            return PreviewDisposition::Stale;
        }
        self.pending = false;
        match outcome.result {
            Ok(result) => {
                self.latest = Some(result);
                self.error = None;
            }
            Err(err) => {
                self.latest = None;
                self.error = Some(err);
            }
        }
        PreviewDisposition::Applied
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }

    pub fn latest(&self) -> Option<&SimulationResult> {
        self.latest.as_ref()
    }

    pub fn error(&self) -> Option<&GatewayError> {
        self.error.as_ref()
    }
}
