use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use uuid::Uuid;

/// Free-form provider metadata attached to gateway payloads.
pub type Extra = Map<String, Value>;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(DomainError::EmptySessionId);
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum DomainError {
    #[error("session id must not be empty")]
    EmptySessionId,
    #[error("roof area must be a finite positive number, got {0}")]
    NonPositiveArea(f64),
    #[error("coverage ratio must be within [0, 1], got {0}")]
    CoverageOutOfRange(f64),
    #[error("unknown greening type '{0}'")]
    UnknownGreeningType(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub input_address: String,
    pub normalized_address: String,
    pub point: GeoPoint,
    pub provider: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<Extra>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildingCandidate {
    pub building_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance_m: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<Extra>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AreaEstimate {
    pub roof_area_m2_suggested: Option<f64>,
    pub floor_area_m2: Option<f64>,
    /// Share of the roof usable for greening, 0..=1.
    pub availability_ratio: Option<f64>,
    pub confidence: Confidence,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(default)]
    pub candidates: Vec<BuildingCandidate>,
}

impl AreaEstimate {
    /// Suggested area as the user would first see it: rounded to whole square
    /// meters, and only when the service produced a usable positive number.
    pub fn seed_value(&self) -> Option<f64> {
        self.roof_area_m2_suggested
            .filter(|area| area.is_finite() && *area > 0.0)
            .map(f64::round)
    }
}

/// User-accepted usable roof area in square meters. Always finite and > 0.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct ConfirmedArea(f64);

impl ConfirmedArea {
    pub fn new(square_meters: f64) -> Result<Self, DomainError> {
        if square_meters.is_finite() && square_meters > 0.0 {
            Ok(Self(square_meters))
        } else {
            Err(DomainError::NonPositiveArea(square_meters))
        }
    }

    pub fn square_meters(self) -> f64 {
        self.0
    }
}

impl TryFrom<f64> for ConfirmedArea {
    type Error = DomainError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ConfirmedArea> for f64 {
    fn from(value: ConfirmedArea) -> Self {
        value.0
    }
}

impl fmt::Display for ConfirmedArea {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GreeningType {
    Grass,
    /// Low-growing succulent mat.
    Sedum,
    Shrub,
    Tree,
}

const GRASS_SPECIES: &[&str] = &["default"];
const SEDUM_SPECIES: &[&str] = &["kamtschaticum", "album", "spurium", "acre"];
const SHRUB_SPECIES: &[&str] = &["jopap", "hwasal", "sachul", "hoiyang", "sancheol"];
const TREE_SPECIES: &[&str] = &[
    "sonamu",
    "bokjagi",
    "magamok",
    "kkochsagwa",
    "seomjatnamu",
    "jumok",
];

impl GreeningType {
    pub const ALL: [GreeningType; 4] = [
        GreeningType::Grass,
        GreeningType::Sedum,
        GreeningType::Shrub,
        GreeningType::Tree,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            GreeningType::Grass => "grass",
            GreeningType::Sedum => "sedum",
            GreeningType::Shrub => "shrub",
            GreeningType::Tree => "tree",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            GreeningType::Grass => "ground-cover grass",
            GreeningType::Sedum => "succulent mat",
            GreeningType::Shrub => "shrub",
            GreeningType::Tree => "tree",
        }
    }

    /// Species this type may be planted with; the first entry is the fallback.
    pub fn species_options(self) -> &'static [&'static str] {
        match self {
            GreeningType::Grass => GRASS_SPECIES,
            GreeningType::Sedum => SEDUM_SPECIES,
            GreeningType::Shrub => SHRUB_SPECIES,
            GreeningType::Tree => TREE_SPECIES,
        }
    }

    pub fn default_species(self) -> &'static str {
        self.species_options()[0]
    }

    pub fn allows_species(self, species: &str) -> bool {
        self.species_options().contains(&species)
    }

    pub fn counts_trees(self) -> bool {
        self == GreeningType::Tree
    }
}

impl fmt::Display for GreeningType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for GreeningType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        GreeningType::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| DomainError::UnknownGreeningType(s.to_string()))
    }
}

/// A greening plan. `tree_count` is zero for every type except [`GreeningType::Tree`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ScenarioWire")]
pub struct Scenario {
    greening_type: GreeningType,
    coverage_ratio: f64,
    tree_count: u32,
    species: Option<String>,
}

#[derive(Deserialize)]
struct ScenarioWire {
    greening_type: GreeningType,
    coverage_ratio: f64,
    #[serde(default)]
    tree_count: u32,
    #[serde(default)]
    species: Option<String>,
}

impl TryFrom<ScenarioWire> for Scenario {
    type Error = DomainError;

    fn try_from(wire: ScenarioWire) -> Result<Self, Self::Error> {
        Scenario::new(
            wire.greening_type,
            wire.coverage_ratio,
            wire.tree_count,
            wire.species,
        )
    }
}

impl Scenario {
    pub fn new(
        greening_type: GreeningType,
        coverage_ratio: f64,
        tree_count: u32,
        species: Option<String>,
    ) -> Result<Self, DomainError> {
        if !coverage_ratio.is_finite() || !(0.0..=1.0).contains(&coverage_ratio) {
            return Err(DomainError::CoverageOutOfRange(coverage_ratio));
        }
        let tree_count = if greening_type.counts_trees() {
            tree_count
        } else {
            0
        };
        let species = species.filter(|s| !s.trim().is_empty());

        Ok(Self {
            greening_type,
            coverage_ratio,
            tree_count,
            species,
        })
    }

    pub fn greening_type(&self) -> GreeningType {
        self.greening_type
    }

    pub fn coverage_ratio(&self) -> f64 {
        self.coverage_ratio
    }

    pub fn tree_count(&self) -> u32 {
        self.tree_count
    }

    pub fn species(&self) -> Option<&str> {
        self.species.as_deref()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationResult {
    pub roof_area_m2: f64,
    pub greening_type: GreeningType,
    pub coverage_ratio: f64,
    pub tree_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub species: Option<String>,
    pub green_area_m2: f64,
    pub co2_absorption_kg_per_year: f64,
    pub temp_reduction_c: f64,
    pub baseline_surface_temp_c: f64,
    pub after_surface_temp_c: f64,
    pub tree_equivalent_count: u32,
    pub engine_version: String,
    pub coefficient_set_version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Extra>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportFormat {
    Pdf,
    Excel,
}

impl ReportFormat {
    pub const ALL: [ReportFormat; 2] = [ReportFormat::Pdf, ReportFormat::Excel];

    pub fn default_filename(self) -> &'static str {
        match self {
            ReportFormat::Pdf => "rooftop-report.pdf",
            ReportFormat::Excel => "rooftop-report.xlsx",
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            ReportFormat::Pdf => "application/pdf",
            ReportFormat::Excel => {
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
            }
        }
    }
}

impl fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportFormat::Pdf => f.write_str("pdf"),
            ReportFormat::Excel => f.write_str("excel"),
        }
    }
}
