//! Client side of the rooftop greening wizard: the computation gateway, the
//! session state machine and the async runtime that drives it.

pub mod error;
pub mod format;
pub mod gateway;
pub mod planning;
pub mod preview;
pub mod runtime;
pub mod view;
pub mod wizard;

#[cfg(test)]
mod test_support;

pub use error::{GatewayError, MissingPrerequisite, Recovery, ValidationError, WizardError};
pub use gateway::{ComputationGateway, HttpGateway, ReportDocument};
pub use preview::{PreviewDisposition, PreviewOutcome, PreviewTicket};
pub use runtime::{spawn_wizard, WizardCommand, WizardEvent, WizardHandle};
pub use wizard::{
    parse_area_input, PlanningUpdate, StepRoute, WizardController, WizardOptions, WizardStep,
};
