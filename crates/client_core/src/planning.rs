use shared::domain::{GreeningType, Scenario};

use crate::error::ValidationError;

pub const DEFAULT_GREENING_TYPE: GreeningType = GreeningType::Sedum;
pub const DEFAULT_COVERAGE_RATIO: f64 = 0.65;
pub const DEFAULT_TREE_COUNT: u32 = 10;

/// Editable planning form. Unlike [`Scenario`] it remembers the tree count
/// typed for the tree option while another type is selected; that count is
/// only submitted once the tree type is selected again.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanningDraft {
    greening_type: GreeningType,
    coverage_ratio: f64,
    tree_count: u32,
    species: String,
}

impl Default for PlanningDraft {
    fn default() -> Self {
        Self::from_saved(None)
    }
}

impl PlanningDraft {
    pub fn from_saved(saved: Option<&Scenario>) -> Self {
        let mut draft = match saved {
            Some(scenario) => Self {
                greening_type: scenario.greening_type(),
                coverage_ratio: scenario.coverage_ratio(),
                tree_count: if scenario.greening_type().counts_trees() {
                    scenario.tree_count()
                } else {
                    DEFAULT_TREE_COUNT
                },
                species: scenario
                    .species()
                    .unwrap_or(GreeningType::Tree.default_species())
                    .to_string(),
            },
            None => Self {
                greening_type: DEFAULT_GREENING_TYPE,
                coverage_ratio: DEFAULT_COVERAGE_RATIO,
                tree_count: DEFAULT_TREE_COUNT,
                species: GreeningType::Tree.default_species().to_string(),
            },
        };
        draft.reconcile_species();
        draft
    }

    pub fn greening_type(&self) -> GreeningType {
        self.greening_type
    }

    pub fn coverage_ratio(&self) -> f64 {
        self.coverage_ratio
    }

    pub fn species(&self) -> &str {
        &self.species
    }

    /// Tree count as entered; `None` while the field is not editable.
    pub fn editable_tree_count(&self) -> Option<u32> {
        self.greening_type
            .counts_trees()
            .then_some(self.tree_count)
    }

    pub fn select_greening_type(&mut self, greening_type: GreeningType) {
        self.greening_type = greening_type;
        self.reconcile_species();
    }

    pub fn set_coverage_ratio(&mut self, value: f64) -> Result<(), ValidationError> {
        if !value.is_finite() || !(0.0..=1.0).contains(&value) {
            return Err(ValidationError::CoverageOutOfRange { value });
        }
        self.coverage_ratio = value;
        Ok(())
    }

    pub fn select_species(&mut self, species: &str) -> Result<(), ValidationError> {
        let species = species.trim();
        if !self.greening_type.allows_species(species) {
            return Err(ValidationError::UnknownSpecies {
                greening_type: self.greening_type,
                species: species.to_string(),
            });
        }
        self.species = species.to_string();
        Ok(())
    }

    pub fn set_tree_count(&mut self, count: u32) -> Result<(), ValidationError> {
        if !self.greening_type.counts_trees() {
            return Err(ValidationError::TreeCountNotApplicable {
                greening_type: self.greening_type,
            });
        }
        self.tree_count = count;
        Ok(())
    }

    /// The scenario this form currently describes.
    pub fn scenario(&self) -> Result<Scenario, ValidationError> {
        let tree_count = self.editable_tree_count().unwrap_or(0);
        Scenario::new(
            self.greening_type,
            self.coverage_ratio,
            tree_count,
            Some(self.species.clone()),
        )
        .map_err(|_| ValidationError::CoverageOutOfRange {
            value: self.coverage_ratio,
        })
    }

    fn reconcile_species(&mut self) {
        if !self.greening_type.allows_species(&self.species) {
            self.species = self.greening_type.default_species().to_string();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_sedum_with_first_sedum_species() {
        let draft = PlanningDraft::default();
        assert_eq!(draft.greening_type(), GreeningType::Sedum);
        assert_eq!(draft.coverage_ratio(), 0.65);
        assert_eq!(draft.species(), "kamtschaticum");
        assert_eq!(draft.editable_tree_count(), None);
        assert_eq!(draft.scenario().expect("scenario").tree_count(), 0);
    }

    #[test]
    fn switching_to_tree_resets_foreign_species_and_exposes_tree_count() {
        let saved =
            Scenario::new(GreeningType::Sedum, 0.65, 0, Some("acre".to_string())).expect("saved");
        let mut draft = PlanningDraft::from_saved(Some(&saved));
        assert_eq!(draft.species(), "acre");

        draft.select_greening_type(GreeningType::Tree);

        assert_eq!(draft.species(), "sonamu");
        assert_eq!(draft.editable_tree_count(), Some(DEFAULT_TREE_COUNT));
        assert_eq!(draft.scenario().expect("scenario").tree_count(), DEFAULT_TREE_COUNT);
    }

    #[test]
    fn compatible_species_survives_type_switch() {
        let mut draft = PlanningDraft::default();
        draft.select_greening_type(GreeningType::Shrub);
        draft.select_species("hoiyang").expect("species");
        draft.select_greening_type(GreeningType::Shrub);
        assert_eq!(draft.species(), "hoiyang");
    }

    #[test]
    fn tree_count_is_dropped_for_non_tree_types() {
        let mut draft = PlanningDraft::default();
        draft.select_greening_type(GreeningType::Tree);
        draft.set_tree_count(25).expect("tree count");
        assert_eq!(draft.scenario().expect("scenario").tree_count(), 25);

        draft.select_greening_type(GreeningType::Grass);
        assert_eq!(draft.scenario().expect("scenario").tree_count(), 0);
        assert_eq!(
            draft.set_tree_count(3),
            Err(ValidationError::TreeCountNotApplicable {
                greening_type: GreeningType::Grass
            })
        );

        draft.select_greening_type(GreeningType::Tree);
        assert_eq!(draft.scenario().expect("scenario").tree_count(), 25);
    }

    #[test]
    fn rejects_out_of_range_coverage_and_foreign_species() {
        let mut draft = PlanningDraft::default();
        assert!(draft.set_coverage_ratio(1.2).is_err());
        assert!(draft.set_coverage_ratio(f64::NAN).is_err());
        assert_eq!(draft.coverage_ratio(), 0.65);

        assert!(draft.select_species("sonamu").is_err());
        assert_eq!(draft.species(), "kamtschaticum");
    }
}
