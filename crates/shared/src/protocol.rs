use serde::{Deserialize, Serialize};

use crate::domain::{Scenario, SimulationResult};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeocodeRequest {
    pub address: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RooftopEstimateRequest {
    pub lat: f64,
    pub lon: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationRequest {
    pub roof_area_m2: f64,
    pub scenario: Scenario,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub baseline_surface_temp_c: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportRequest {
    pub result: SimulationResult,
}
