//! Plain-text rendering of wizard views for the terminal.

use client_core::{
    view::{ConditionCheckView, PlanningView, ReportView, ResultSummary, ResultView},
    MissingPrerequisite, Recovery, ReportDocument, WizardError, WizardEvent, WizardStep,
};
use shared::domain::Location;

pub fn location(location: &Location) -> String {
    format!(
        "location: {} ({:.6}, {:.6}) via {}",
        location.normalized_address, location.point.lat, location.point.lon, location.provider
    )
}

pub fn condition_check(view: &ConditionCheckView) -> String {
    let mut lines = vec![location(&view.location)];
    match (&view.estimate, &view.estimate_error) {
        (Some(estimate), _) => {
            lines.push(format!(
                "estimate: roof {} m2, floor {} m2, available {}%, confidence {:?}",
                view.summary.suggested_area,
                view.summary.floor_area,
                view.summary.availability_percent,
                estimate.confidence
            ));
            if let Some(note) = &estimate.note {
                lines.push(format!("note: {note}"));
            }
            for candidate in &estimate.candidates {
                lines.push(format!(
                    "  candidate {} {}",
                    candidate.building_id,
                    candidate.name.as_deref().unwrap_or("-")
                ));
            }
        }
        (None, Some(err)) => lines.push(format!("estimate unavailable: {err}")),
        (None, None) => lines.push("estimate: -".to_string()),
    }
    match view.confirmed_area {
        Some(area) => lines.push(format!("confirmed area: {area} m2")),
        None if view.area_input.is_empty() => {
            lines.push("confirmed area: - (enter one with apply-area)".to_string())
        }
        None => lines.push(format!(
            "confirmed area: - (suggested {}; accept with apply-area)",
            view.area_input
        )),
    }
    lines.join("\n")
}

pub fn planning(view: &PlanningView) -> String {
    let mut lines = vec![
        format!("roof area: {} m2", view.confirmed_area),
        format!(
            "plan: {} ({}) coverage {:.0}% species {}",
            view.greening_type.label(),
            view.greening_type,
            view.coverage_ratio * 100.0,
            view.species
        ),
        format!("species options: {}", view.species_options.join(", ")),
    ];
    if let Some(count) = view.tree_count {
        lines.push(format!("trees: {count}"));
    }
    if view.preview.pending {
        lines.push("preview: computing...".to_string());
    } else if let Some(err) = &view.preview.error {
        lines.push(format!("preview failed: {err}"));
    } else {
        lines.push(format!(
            "preview: green {} m2, CO2 {} kg/yr, -{} C",
            view.preview.summary.green_area,
            view.preview.summary.co2_absorption,
            view.preview.summary.temp_reduction
        ));
    }
    lines.join("\n")
}

fn summary(summary: &ResultSummary) -> Vec<String> {
    vec![
        format!(
            "roof {} m2, coverage {}%, green {} m2",
            summary.roof_area, summary.coverage_percent, summary.green_area
        ),
        format!(
            "CO2 absorption {} kg/yr (~{} trees)",
            summary.co2_absorption, summary.tree_equivalent_count
        ),
        format!(
            "surface {} C -> {} C (-{} C)",
            summary.baseline_surface_temp, summary.after_surface_temp, summary.temp_reduction
        ),
    ]
}

pub fn result(view: &ResultView) -> String {
    let mut lines = Vec::new();
    if let Some(location) = &view.location {
        lines.push(self::location(location));
    }
    let greening_type = view.scenario.greening_type();
    let trees = if greening_type.counts_trees() {
        format!(", {} trees", view.scenario.tree_count())
    } else {
        String::new()
    };
    lines.push(format!(
        "scenario: {}{trees}, species {}",
        greening_type.label(),
        view.scenario.species().unwrap_or("-")
    ));
    lines.extend(summary(&view.summary));
    lines.push(format!(
        "engine {} / coefficients {}",
        view.result.engine_version, view.result.coefficient_set_version
    ));
    lines.join("\n")
}

pub fn report(view: &ReportView) -> String {
    let mut lines = summary(&view.summary);
    let formats: Vec<String> = view.formats.iter().map(ToString::to_string).collect();
    lines.push(format!("available formats: {}", formats.join(", ")));
    lines.join("\n")
}

pub fn document(document: &ReportDocument) -> String {
    format!(
        "{} report: {} ({} bytes, {})",
        document.format,
        document.filename,
        document.bytes.len(),
        document.content_type
    )
}

pub fn fallback(missing: &MissingPrerequisite) -> String {
    format!(
        "cannot show {}: {} is missing. {}",
        missing.requested,
        missing.missing,
        step_hint(missing.redirect_to)
    )
}

pub fn step_hint(step: WizardStep) -> &'static str {
    match step {
        WizardStep::Entry => "Start over with `start <address>`.",
        WizardStep::ConditionCheck => "Confirm the roof area with `estimate` and `apply-area`.",
        WizardStep::PlanningPreview => "Plan a scenario with `plan --commit`.",
        WizardStep::Result => "Review the result with `result`.",
        WizardStep::ReportReady => "Download a report with `report`.",
    }
}

pub fn recovery(recovery: Recovery) -> &'static str {
    match recovery {
        Recovery::CorrectInput => "Correct the input and try again.",
        Recovery::Retry => "Try the same action again.",
        Recovery::GoTo(step) => step_hint(step),
    }
}

pub fn error(err: &WizardError) -> String {
    match err {
        WizardError::MissingPrerequisite(missing) => fallback(missing),
        other => format!("error: {other}\n{}", recovery(other.recovery())),
    }
}

pub fn event(event: &WizardEvent) -> String {
    match event {
        WizardEvent::LocationCommitted(location) => self::location(location),
        WizardEvent::ConditionCheck(view) => condition_check(view),
        WizardEvent::AreaConfirmed(area) => format!("confirmed area: {area} m2"),
        WizardEvent::Planning(view) | WizardEvent::PreviewUpdated(view) => planning(view),
        WizardEvent::PreviewDiscarded { generation } => {
            format!("(preview #{generation} superseded)")
        }
        WizardEvent::ResultReady(view) => result(view),
        WizardEvent::Report(view) => report(view),
        WizardEvent::ReportDownloaded(doc) => document(doc),
        WizardEvent::Restarted => "session cleared".to_string(),
        WizardEvent::Fallback(missing) => fallback(missing),
        WizardEvent::Error { message, recovery } => {
            format!("error: {message}\n{}", self::recovery(*recovery))
        }
    }
}
