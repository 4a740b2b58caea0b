//! View models emitted for each wizard step.

use shared::domain::{
    AreaEstimate, ConfirmedArea, GreeningType, Location, ReportFormat, Scenario, SimulationResult,
};

use crate::{
    error::GatewayError,
    format::{format_number, format_percent},
    planning::PlanningDraft,
    preview::PreviewTracker,
};

#[derive(Debug, Clone)]
pub struct ConditionCheckView {
    pub location: Location,
    pub estimate: Option<AreaEstimate>,
    pub confirmed_area: Option<ConfirmedArea>,
    /// Text the editable area field starts with; empty when nothing seeds it.
    pub area_input: String,
    pub estimate_error: Option<GatewayError>,
    pub summary: EstimateSummary,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EstimateSummary {
    pub suggested_area: String,
    pub floor_area: String,
    pub availability_percent: String,
}

impl EstimateSummary {
    pub fn new(estimate: Option<&AreaEstimate>) -> Self {
        Self {
            suggested_area: format_number(estimate.and_then(|e| e.roof_area_m2_suggested), 0),
            floor_area: format_number(estimate.and_then(|e| e.floor_area_m2), 0),
            availability_percent: format_percent(estimate.and_then(|e| e.availability_ratio), 0),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PlanningView {
    pub location: Location,
    pub confirmed_area: ConfirmedArea,
    pub greening_type: GreeningType,
    pub coverage_ratio: f64,
    pub species: String,
    pub species_options: &'static [&'static str],
    /// `None` while the selected type does not count trees.
    pub tree_count: Option<u32>,
    pub preview: PreviewView,
}

impl PlanningView {
    pub(crate) fn new(
        location: Location,
        confirmed_area: ConfirmedArea,
        draft: &PlanningDraft,
        previews: &PreviewTracker,
    ) -> Self {
        Self {
            location,
            confirmed_area,
            greening_type: draft.greening_type(),
            coverage_ratio: draft.coverage_ratio(),
            species: draft.species().to_string(),
            species_options: draft.greening_type().species_options(),
            tree_count: draft.editable_tree_count(),
            preview: PreviewView {
                generation: previews.latest_generation(),
                pending: previews.is_pending(),
                result: previews.latest().cloned(),
                error: previews.error().cloned(),
                summary: ResultSummary::new(previews.latest()),
            },
        }
    }
}

/// Projected numbers for the current draft. Never persisted.
#[derive(Debug, Clone)]
pub struct PreviewView {
    pub generation: u64,
    pub pending: bool,
    pub result: Option<SimulationResult>,
    pub error: Option<GatewayError>,
    pub summary: ResultSummary,
}

#[derive(Debug, Clone)]
pub struct ResultView {
    pub location: Option<Location>,
    pub scenario: Scenario,
    pub result: SimulationResult,
    pub summary: ResultSummary,
}

#[derive(Debug, Clone)]
pub struct ReportView {
    pub location: Option<Location>,
    pub scenario: Scenario,
    pub result: SimulationResult,
    pub summary: ResultSummary,
    pub formats: Vec<ReportFormat>,
}

/// Display strings for a computed result; placeholders when there is none.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultSummary {
    pub roof_area: String,
    pub coverage_percent: String,
    pub green_area: String,
    pub co2_absorption: String,
    pub temp_reduction: String,
    pub baseline_surface_temp: String,
    pub after_surface_temp: String,
    pub tree_equivalent_count: String,
}

impl ResultSummary {
    pub fn new(result: Option<&SimulationResult>) -> Self {
        Self {
            roof_area: format_number(result.map(|r| r.roof_area_m2), 0),
            coverage_percent: format_percent(result.map(|r| r.coverage_ratio), 0),
            green_area: format_number(result.map(|r| r.green_area_m2), 0),
            co2_absorption: format_number(result.map(|r| r.co2_absorption_kg_per_year), 0),
            temp_reduction: format_number(result.map(|r| r.temp_reduction_c), 1),
            baseline_surface_temp: format_number(result.map(|r| r.baseline_surface_temp_c), 1),
            after_surface_temp: format_number(result.map(|r| r.after_surface_temp_c), 1),
            tree_equivalent_count: format_number(
                result.map(|r| f64::from(r.tree_equivalent_count)),
                0,
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::sample_result;

    #[test]
    fn summary_formats_result_values() {
        let scenario =
            Scenario::new(GreeningType::Sedum, 0.65, 0, Some("acre".to_string())).expect("scenario");
        let summary = ResultSummary::new(Some(&sample_result(2500.0, &scenario)));

        assert_eq!(summary.roof_area, "2,500");
        assert_eq!(summary.coverage_percent, "65");
        assert_eq!(summary.green_area, "1,625");
        assert_eq!(summary.baseline_surface_temp, "60.0");
    }

    #[test]
    fn missing_result_renders_placeholders_not_zero() {
        let summary = ResultSummary::new(None);
        assert_eq!(summary.green_area, "-");
        assert_eq!(summary.tree_equivalent_count, "-");
        assert_eq!(EstimateSummary::new(None).availability_percent, "-");
    }
}
