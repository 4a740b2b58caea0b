use shared::domain::GreeningType;
use storage::Slot;
use thiserror::Error;

use crate::wizard::WizardStep;

/// Failure reported by the remote computation service, one variant per operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    #[error("address could not be resolved: {0}")]
    Resolution(String),
    #[error("rooftop area estimate unavailable: {0}")]
    Estimation(String),
    #[error("scenario computation failed: {0}")]
    Computation(String),
    #[error("report generation failed: {0}")]
    Report(String),
}

/// User input rejected before anything reaches the gateway.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("an address is required")]
    EmptyAddress,
    #[error("'{input}' is not a valid roof area; enter a positive number of square meters")]
    InvalidArea { input: String },
    #[error("confirm the roof area before continuing")]
    AreaNotConfirmed,
    #[error("coverage ratio must be within [0, 1], got {value}")]
    CoverageOutOfRange { value: f64 },
    #[error("species '{species}' is not available for {greening_type}")]
    UnknownSpecies {
        greening_type: GreeningType,
        species: String,
    },
    #[error("tree count only applies to the tree greening type (selected: {greening_type})")]
    TreeCountNotApplicable { greening_type: GreeningType },
}

/// A step was requested whose upstream slot is absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("{requested} needs {missing}; continue from {redirect_to}")]
pub struct MissingPrerequisite {
    pub requested: WizardStep,
    pub missing: Slot,
    pub redirect_to: WizardStep,
}

#[derive(Debug, Error)]
pub enum WizardError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error(transparent)]
    MissingPrerequisite(#[from] MissingPrerequisite),
    #[error("the {step} step has not been entered")]
    StepNotActive { step: WizardStep },
    #[error("session storage failure: {0:#}")]
    Storage(#[from] anyhow::Error),
}

/// What the user can do about a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recovery {
    /// Fix the rejected input and try again.
    CorrectInput,
    /// Repeat the same action.
    Retry,
    /// Navigate to the given step.
    GoTo(WizardStep),
}

impl WizardError {
    pub fn recovery(&self) -> Recovery {
        match self {
            WizardError::Validation(_) => Recovery::CorrectInput,
            WizardError::Gateway(_) | WizardError::Storage(_) => Recovery::Retry,
            WizardError::MissingPrerequisite(missing) => Recovery::GoTo(missing.redirect_to),
            WizardError::StepNotActive { step } => Recovery::GoTo(*step),
        }
    }
}
