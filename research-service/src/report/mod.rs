pub mod outline;
pub mod workflow;

pub use outline::{Outline, render_outline};
pub use workflow::{ReportController, ReportStage, ReportWorkflow};
