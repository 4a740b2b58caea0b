use std::{
    collections::HashSet,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex,
    },
};

use async_trait::async_trait;
use shared::domain::{
    AreaEstimate, BuildingCandidate, Confidence, GeoPoint, Location, ReportFormat, Scenario,
    SimulationResult,
};
use tokio::sync::Notify;

use crate::{
    error::GatewayError,
    gateway::{ComputationGateway, ReportDocument},
};

pub const SEOUL_CITY_HALL: &str = "서울시 중구 세종대로 110";

pub fn sample_location(address: &str) -> Location {
    Location {
        input_address: address.to_string(),
        normalized_address: format!("{address} (도로명)"),
        point: GeoPoint {
            lat: 37.566_535,
            lon: 126.977_969,
        },
        provider: "fake".to_string(),
        extra: None,
    }
}

pub fn sample_estimate() -> AreaEstimate {
    AreaEstimate {
        roof_area_m2_suggested: Some(2499.6),
        floor_area_m2: Some(9_800.0),
        availability_ratio: Some(0.7),
        confidence: Confidence::Medium,
        note: None,
        candidates: vec![BuildingCandidate {
            building_id: "11140-100".to_string(),
            name: Some("Seoul City Hall".to_string()),
            address: None,
            distance_m: Some(3.5),
            extra: None,
        }],
    }
}

/// Deterministic engine stand-in: green area is always roof area times coverage.
pub fn sample_result(roof_area_m2: f64, scenario: &Scenario) -> SimulationResult {
    let green_area_m2 = roof_area_m2 * scenario.coverage_ratio();
    let co2_absorption_kg_per_year = green_area_m2 * 0.37;
    let temp_reduction_c = scenario.coverage_ratio() * 2.1;
    SimulationResult {
        roof_area_m2,
        greening_type: scenario.greening_type(),
        coverage_ratio: scenario.coverage_ratio(),
        tree_count: scenario.tree_count(),
        species: scenario.species().map(str::to_string),
        green_area_m2,
        co2_absorption_kg_per_year,
        temp_reduction_c,
        baseline_surface_temp_c: 60.0,
        after_surface_temp_c: 60.0 - temp_reduction_c,
        tree_equivalent_count: (co2_absorption_kg_per_year / 6.6).round() as u32,
        engine_version: "test".to_string(),
        coefficient_set_version: "test".to_string(),
        meta: None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Resolve,
    Estimate,
    Compute,
    Report,
}

/// In-process gateway that counts calls and fails on demand.
#[derive(Default)]
pub struct FakeGateway {
    resolve_calls: AtomicUsize,
    estimate_calls: AtomicUsize,
    compute_calls: AtomicUsize,
    report_calls: AtomicUsize,
    failing: Mutex<HashSet<Operation>>,
    held: Mutex<Option<f64>>,
    release: Notify,
}

impl FakeGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail(&self, operation: Operation) {
        self.failing
            .lock()
            .expect("fake gateway lock")
            .insert(operation);
    }

    pub fn recover(&self, operation: Operation) {
        self.failing
            .lock()
            .expect("fake gateway lock")
            .remove(&operation);
    }

    /// Makes computations for this coverage ratio wait until [`Self::release`].
    pub fn hold_coverage(&self, coverage_ratio: f64) {
        *self.held.lock().expect("fake gateway lock") = Some(coverage_ratio);
    }

    pub fn release(&self) {
        self.release.notify_one();
    }

    pub fn calls(&self, operation: Operation) -> usize {
        let counter = match operation {
            Operation::Resolve => &self.resolve_calls,
            Operation::Estimate => &self.estimate_calls,
            Operation::Compute => &self.compute_calls,
            Operation::Report => &self.report_calls,
        };
        counter.load(Ordering::SeqCst)
    }

    fn failing(&self, operation: Operation) -> bool {
        self.failing
            .lock()
            .expect("fake gateway lock")
            .contains(&operation)
    }
}

#[async_trait]
impl ComputationGateway for FakeGateway {
    async fn resolve_address(&self, address: &str) -> Result<Location, GatewayError> {
        self.resolve_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing(Operation::Resolve) {
            return Err(GatewayError::Resolution(format!("no match for '{address}'")));
        }
        Ok(sample_location(address))
    }

    async fn estimate_roof_area(&self, _point: GeoPoint) -> Result<AreaEstimate, GatewayError> {
        self.estimate_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing(Operation::Estimate) {
            return Err(GatewayError::Estimation("no building at point".to_string()));
        }
        Ok(sample_estimate())
    }

    async fn compute_scenario(
        &self,
        roof_area_m2: f64,
        scenario: &Scenario,
        _baseline_surface_temp_c: Option<f64>,
    ) -> Result<SimulationResult, GatewayError> {
        self.compute_calls.fetch_add(1, Ordering::SeqCst);
        let held = *self.held.lock().expect("fake gateway lock");
        if held == Some(scenario.coverage_ratio()) {
            self.release.notified().await;
        }
        if self.failing(Operation::Compute) {
            return Err(GatewayError::Computation("engine unavailable".to_string()));
        }
        Ok(sample_result(roof_area_m2, scenario))
    }

    async fn render_report(
        &self,
        format: ReportFormat,
        result: &SimulationResult,
    ) -> Result<ReportDocument, GatewayError> {
        self.report_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing(Operation::Report) {
            return Err(GatewayError::Report(format!("{format} renderer crashed")));
        }
        Ok(ReportDocument {
            format,
            filename: format.default_filename().to_string(),
            content_type: format.content_type().to_string(),
            bytes: format!("{format}:{}", result.green_area_m2).into_bytes(),
        })
    }
}
