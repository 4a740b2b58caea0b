use std::sync::Arc;

use storage::MemorySessionStore;

use super::*;
use crate::{
    error::{GatewayError, Recovery},
    test_support::{FakeGateway, Operation, SEOUL_CITY_HALL},
};

fn controller() -> (
    WizardController<MemorySessionStore>,
    Arc<FakeGateway>,
    MemorySessionStore,
) {
    let gateway = Arc::new(FakeGateway::new());
    let store = MemorySessionStore::new();
    let controller = WizardController::new(
        Session::new(store.clone()),
        gateway.clone(),
        WizardOptions::default(),
    );
    (controller, gateway, store)
}

async fn reach_planning(controller: &mut WizardController<MemorySessionStore>) -> PlanningUpdate {
    controller
        .submit_address(SEOUL_CITY_HALL)
        .await
        .expect("address");
    controller
        .enter_condition_check()
        .await
        .expect("condition check");
    controller.apply_area("2,500").await.expect("area");
    controller.advance_to_planning().await.expect("planning")
}

async fn reach_result(controller: &mut WizardController<MemorySessionStore>) -> ResultView {
    reach_planning(controller).await;
    controller.select_species("acre").expect("species");
    controller.commit_plan().await.expect("commit")
}

#[tokio::test]
async fn resolved_address_commits_location_only_and_requires_an_area_to_advance() {
    let (mut controller, gateway, store) = controller();

    let location = controller
        .submit_address(SEOUL_CITY_HALL)
        .await
        .expect("address");
    assert_eq!(location.input_address, SEOUL_CITY_HALL);
    assert_eq!(store.populated_slots().await, vec![Slot::Location]);

    let view = controller
        .enter_condition_check()
        .await
        .expect("condition check");
    assert_eq!(view.area_input, "2500");
    assert!(view.confirmed_area.is_none());
    assert_eq!(gateway.calls(Operation::Estimate), 1);

    let err = controller
        .advance_to_planning()
        .await
        .expect_err("advance without area");
    assert!(matches!(
        err,
        WizardError::Validation(ValidationError::AreaNotConfirmed)
    ));
    assert_eq!(err.recovery(), Recovery::CorrectInput);
    assert!(matches!(
        controller.planning_view(),
        Err(WizardError::StepNotActive { .. })
    ));
    assert_eq!(
        store.populated_slots().await,
        vec![Slot::Location, Slot::AreaEstimate]
    );
}

#[tokio::test]
async fn empty_address_never_reaches_the_gateway() {
    let (mut controller, gateway, _store) = controller();

    let err = controller
        .submit_address("   ")
        .await
        .expect_err("empty address");

    assert!(matches!(
        err,
        WizardError::Validation(ValidationError::EmptyAddress)
    ));
    assert_eq!(gateway.calls(Operation::Resolve), 0);
}

#[tokio::test]
async fn failed_resolution_leaves_every_slot_untouched() {
    let (mut controller, gateway, store) = controller();
    reach_result(&mut controller).await;
    let before = store.populated_slots().await;

    gateway.fail(Operation::Resolve);
    let err = controller
        .submit_address("nowhere")
        .await
        .expect_err("resolution failure");

    assert!(matches!(
        err,
        WizardError::Gateway(GatewayError::Resolution(_))
    ));
    assert_eq!(err.recovery(), Recovery::Retry);
    assert_eq!(store.populated_slots().await, before);
}

#[tokio::test]
async fn resubmitting_an_address_clears_every_downstream_slot() {
    let (mut controller, _gateway, store) = controller();
    reach_result(&mut controller).await;
    assert_eq!(store.populated_slots().await, Slot::ALL.to_vec());

    controller
        .submit_address(SEOUL_CITY_HALL)
        .await
        .expect("same address again");

    assert_eq!(store.populated_slots().await, vec![Slot::Location]);
}

#[tokio::test]
async fn estimate_is_fetched_at_most_once_per_location() {
    let (mut controller, gateway, _store) = controller();
    controller
        .submit_address(SEOUL_CITY_HALL)
        .await
        .expect("address");

    for _ in 0..3 {
        controller
            .enter_condition_check()
            .await
            .expect("condition check");
    }
    assert_eq!(gateway.calls(Operation::Estimate), 1);

    controller
        .submit_address(SEOUL_CITY_HALL)
        .await
        .expect("new location");
    controller
        .enter_condition_check()
        .await
        .expect("condition check");
    assert_eq!(gateway.calls(Operation::Estimate), 2);
}

#[tokio::test]
async fn failed_estimate_is_reported_and_retried_on_the_next_visit() {
    let (mut controller, gateway, store) = controller();
    controller
        .submit_address(SEOUL_CITY_HALL)
        .await
        .expect("address");

    gateway.fail(Operation::Estimate);
    let view = controller
        .enter_condition_check()
        .await
        .expect("condition check renders without an estimate");
    assert!(matches!(
        view.estimate_error,
        Some(GatewayError::Estimation(_))
    ));
    assert_eq!(view.area_input, "");
    assert_eq!(view.summary.suggested_area, "-");
    assert_eq!(store.populated_slots().await, vec![Slot::Location]);

    gateway.recover(Operation::Estimate);
    let view = controller
        .enter_condition_check()
        .await
        .expect("condition check");
    assert!(view.estimate.is_some());
    assert_eq!(gateway.calls(Operation::Estimate), 2);
}

#[tokio::test]
async fn confirmed_area_seeds_the_field_over_the_estimate() {
    let (mut controller, _gateway, _store) = controller();
    controller
        .submit_address(SEOUL_CITY_HALL)
        .await
        .expect("address");
    controller
        .enter_condition_check()
        .await
        .expect("condition check");

    let area = controller.apply_area(" 3,200.5 ").await.expect("area");
    assert_eq!(area.square_meters(), 3200.5);

    let view = controller
        .enter_condition_check()
        .await
        .expect("condition check");
    assert_eq!(view.area_input, "3200.5");
    assert_eq!(view.confirmed_area, Some(area));
}

#[tokio::test]
async fn invalid_area_input_is_rejected_without_committing() {
    let (mut controller, _gateway, store) = controller();
    controller
        .submit_address(SEOUL_CITY_HALL)
        .await
        .expect("address");

    for input in ["", "abc", "0", "-12", "NaN", "inf", "1.2.3"] {
        let err = controller
            .apply_area(input)
            .await
            .expect_err("invalid area");
        assert!(
            matches!(err, WizardError::Validation(ValidationError::InvalidArea { .. })),
            "{input:?} should be rejected, got {err:?}"
        );
    }
    assert!(!store.populated_slots().await.contains(&Slot::ConfirmedArea));
}

#[tokio::test]
async fn committed_plan_writes_scenario_and_result_as_a_pair() {
    let (mut controller, gateway, store) = controller();

    let view = reach_result(&mut controller).await;

    assert_eq!(view.scenario.greening_type(), GreeningType::Sedum);
    assert_eq!(view.scenario.coverage_ratio(), 0.65);
    assert_eq!(view.scenario.tree_count(), 0);
    assert_eq!(view.scenario.species(), Some("acre"));
    assert_eq!(view.result.roof_area_m2, 2500.0);
    assert_eq!(view.result.green_area_m2, 1625.0);
    assert_eq!(view.summary.green_area, "1,625");

    let stored: Option<SimulationResult> = controller.session().load().await.expect("load");
    assert_eq!(stored, Some(view.result.clone()));
    assert_eq!(store.populated_slots().await, Slot::ALL.to_vec());
    assert!(gateway.calls(Operation::Compute) >= 1);
}

#[tokio::test]
async fn failed_commit_writes_neither_slot_and_keeps_planning_open() {
    let (mut controller, gateway, store) = controller();
    reach_planning(&mut controller).await;

    gateway.fail(Operation::Compute);
    let err = controller.commit_plan().await.expect_err("commit failure");

    assert!(matches!(
        err,
        WizardError::Gateway(GatewayError::Computation(_))
    ));
    let slots = store.populated_slots().await;
    assert!(!slots.contains(&Slot::Scenario));
    assert!(!slots.contains(&Slot::Result));
    assert!(controller.planning_view().is_ok());

    gateway.recover(Operation::Compute);
    controller.commit_plan().await.expect("retry");
    let slots = store.populated_slots().await;
    assert!(slots.contains(&Slot::Scenario) && slots.contains(&Slot::Result));
}

#[tokio::test]
async fn changing_the_area_invalidates_the_result_but_not_the_scenario() {
    let (mut controller, _gateway, _store) = controller();
    reach_result(&mut controller).await;

    controller.apply_area("3000").await.expect("new area");

    let route = controller.route(WizardStep::Result).await.expect("route");
    assert_eq!(
        route,
        StepRoute::Fallback(MissingPrerequisite {
            requested: WizardStep::Result,
            missing: Slot::Result,
            redirect_to: WizardStep::PlanningPreview,
        })
    );

    let update = controller.enter_planning().await.expect("planning");
    assert_eq!(update.view.species, "acre");
    assert_eq!(update.ticket.roof_area_m2, 3000.0);
}

#[tokio::test]
async fn switching_to_tree_resets_species_and_starts_counting_trees() {
    let (mut controller, _gateway, _store) = controller();
    let entry = reach_planning(&mut controller).await;
    assert_eq!(entry.view.greening_type, GreeningType::Sedum);
    assert_eq!(entry.view.tree_count, None);

    let update = controller.select_species("acre").expect("species");
    assert_eq!(update.ticket.scenario.species(), Some("acre"));
    assert_eq!(update.ticket.scenario.tree_count(), 0);

    let update = controller
        .select_greening_type(GreeningType::Tree)
        .expect("tree");
    assert_eq!(update.view.species, "sonamu");
    assert_eq!(update.view.species_options, GreeningType::Tree.species_options());
    assert_eq!(update.view.tree_count, Some(10));
    assert_eq!(update.ticket.scenario.species(), Some("sonamu"));
    assert_eq!(update.ticket.scenario.tree_count(), 10);

    let update = controller.set_tree_count(40).expect("tree count");
    assert_eq!(update.ticket.scenario.tree_count(), 40);

    let update = controller
        .select_greening_type(GreeningType::Shrub)
        .expect("shrub");
    assert_eq!(update.view.tree_count, None);
    assert_eq!(update.ticket.scenario.tree_count(), 0);
}

#[tokio::test]
async fn non_tree_scenarios_never_carry_a_tree_count() {
    let (mut controller, _gateway, _store) = controller();
    reach_planning(&mut controller).await;
    controller
        .select_greening_type(GreeningType::Tree)
        .expect("tree");
    controller.set_tree_count(77).expect("tree count");

    for greening_type in [GreeningType::Grass, GreeningType::Sedum, GreeningType::Shrub] {
        let update = controller
            .select_greening_type(greening_type)
            .expect("type");
        assert_eq!(update.ticket.scenario.tree_count(), 0);
        let err = controller.set_tree_count(5).expect_err("not a tree type");
        assert!(matches!(
            err,
            WizardError::Validation(ValidationError::TreeCountNotApplicable { .. })
        ));
    }

    let view = controller.commit_plan().await.expect("commit");
    assert_eq!(view.scenario.greening_type(), GreeningType::Shrub);
    assert_eq!(view.scenario.tree_count(), 0);
    assert_eq!(view.result.tree_count, 0);
}

#[tokio::test]
async fn invalid_planning_edits_keep_the_previous_draft() {
    let (mut controller, _gateway, _store) = controller();
    reach_planning(&mut controller).await;

    assert!(controller.set_coverage_ratio(1.5).is_err());
    assert!(controller.select_species("sonamu").is_err());

    let view = controller.planning_view().expect("view");
    assert_eq!(view.coverage_ratio, 0.65);
    assert_eq!(view.species, "kamtschaticum");
}

#[tokio::test]
async fn stale_preview_never_overwrites_a_newer_edit() {
    let (mut controller, _gateway, _store) = controller();
    let first = reach_planning(&mut controller).await.ticket;
    let second = controller.set_coverage_ratio(0.3).expect("edit").ticket;
    let third = controller.set_coverage_ratio(0.8).expect("edit").ticket;

    let third_outcome = controller.run_preview(third).await;
    let second_outcome = controller.run_preview(second).await;
    let first_outcome = controller.run_preview(first).await;

    assert_eq!(
        controller.apply_preview(third_outcome),
        PreviewDisposition::Applied
    );
    assert_eq!(
        controller.apply_preview(second_outcome),
        PreviewDisposition::Stale
    );
    assert_eq!(
        controller.apply_preview(first_outcome),
        PreviewDisposition::Stale
    );

    let view = controller.planning_view().expect("view");
    let preview = view.preview.result.expect("preview result");
    assert_eq!(preview.coverage_ratio, 0.8);
    assert_eq!(preview.green_area_m2, 2000.0);
    assert_eq!(view.preview.summary.green_area, "2,000");
    assert!(!view.preview.pending);
}

#[tokio::test]
async fn previews_are_never_persisted_and_failures_do_not_block_editing() {
    let (mut controller, gateway, store) = controller();
    let ticket = reach_planning(&mut controller).await.ticket;
    let outcome = controller.run_preview(ticket).await;
    assert_eq!(controller.apply_preview(outcome), PreviewDisposition::Applied);
    assert!(!store.populated_slots().await.contains(&Slot::Result));

    gateway.fail(Operation::Compute);
    let ticket = controller.set_coverage_ratio(0.5).expect("edit").ticket;
    let outcome = controller.run_preview(ticket).await;
    assert_eq!(controller.apply_preview(outcome), PreviewDisposition::Applied);

    let view = controller.planning_view().expect("view");
    assert!(matches!(
        view.preview.error,
        Some(GatewayError::Computation(_))
    ));
    assert!(view.preview.result.is_none());
    controller
        .select_greening_type(GreeningType::Grass)
        .expect("editing continues");
}

#[tokio::test]
async fn preview_arriving_after_planning_closed_is_dropped() {
    let (mut controller, _gateway, _store) = controller();
    let ticket = reach_planning(&mut controller).await.ticket;
    let outcome = controller.run_preview(ticket).await;

    controller
        .enter_condition_check()
        .await
        .expect("back to condition check");

    assert_eq!(controller.apply_preview(outcome), PreviewDisposition::Stale);
}

#[tokio::test]
async fn planning_edits_require_an_open_planning_step() {
    let (mut controller, _gateway, _store) = controller();

    let err = controller
        .set_coverage_ratio(0.4)
        .expect_err("planning not entered");

    assert!(matches!(
        err,
        WizardError::StepNotActive {
            step: WizardStep::PlanningPreview
        }
    ));
    assert_eq!(err.recovery(), Recovery::GoTo(WizardStep::PlanningPreview));
}

#[tokio::test]
async fn report_without_result_falls_back_instead_of_downloading() {
    let (mut controller, gateway, _store) = controller();
    reach_result(&mut controller).await;
    controller.restart().await.expect("restart");

    let route = controller
        .route(WizardStep::ReportReady)
        .await
        .expect("route");
    assert!(matches!(
        route,
        StepRoute::Fallback(MissingPrerequisite {
            missing: Slot::Location,
            redirect_to: WizardStep::Entry,
            ..
        })
    ));

    let err = controller.enter_report().await.expect_err("no result");
    assert_eq!(err.recovery(), Recovery::GoTo(WizardStep::Entry));

    let err = controller
        .download_report(ReportFormat::Pdf)
        .await
        .expect_err("no result");
    assert!(matches!(err, WizardError::MissingPrerequisite(_)));
    assert_eq!(gateway.calls(Operation::Report), 0);
}

#[tokio::test]
async fn report_failures_are_per_format_and_leave_the_session_alone() {
    let (mut controller, gateway, store) = controller();
    reach_result(&mut controller).await;
    let report = controller.enter_report().await.expect("report step");
    assert_eq!(report.formats, vec![ReportFormat::Pdf, ReportFormat::Excel]);
    let before = store.populated_slots().await;

    gateway.fail(Operation::Report);
    let err = controller
        .download_report(ReportFormat::Pdf)
        .await
        .expect_err("renderer down");
    assert!(matches!(err, WizardError::Gateway(GatewayError::Report(_))));

    gateway.recover(Operation::Report);
    let document = controller
        .download_report(ReportFormat::Excel)
        .await
        .expect("excel");
    assert_eq!(document.filename, "rooftop-report.xlsx");
    assert!(!document.bytes.is_empty());
    assert_eq!(store.populated_slots().await, before);
}

#[tokio::test]
async fn corrupt_scenario_slot_falls_back_to_planning_defaults() {
    let (mut controller, _gateway, store) = controller();
    controller
        .submit_address(SEOUL_CITY_HALL)
        .await
        .expect("address");
    controller.apply_area("1200").await.expect("area");
    store
        .set(Slot::Scenario, "{\"greening_type\":\"lava\"}")
        .await
        .expect("raw write");

    let update = controller.enter_planning().await.expect("planning");

    assert_eq!(update.view.greening_type, GreeningType::Sedum);
    assert_eq!(update.view.coverage_ratio, 0.65);
    assert_eq!(update.view.species, "kamtschaticum");
}

#[tokio::test]
async fn resume_step_follows_the_persisted_slots() {
    let (mut controller, _gateway, _store) = controller();
    assert_eq!(controller.resume_step().await.expect("resume"), WizardStep::Entry);

    controller
        .submit_address(SEOUL_CITY_HALL)
        .await
        .expect("address");
    assert_eq!(
        controller.resume_step().await.expect("resume"),
        WizardStep::ConditionCheck
    );

    controller.apply_area("800").await.expect("area");
    assert_eq!(
        controller.resume_step().await.expect("resume"),
        WizardStep::PlanningPreview
    );

    controller.enter_planning().await.expect("planning");
    controller.commit_plan().await.expect("commit");
    assert_eq!(
        controller.resume_step().await.expect("resume"),
        WizardStep::Result
    );
}

#[test]
fn area_input_tolerates_grouping_separators() {
    assert_eq!(
        parse_area_input("12,345.5").expect("area").square_meters(),
        12_345.5
    );
    assert_eq!(
        parse_area_input("-3"),
        Err(ValidationError::InvalidArea {
            input: "-3".to_string()
        })
    );
}
