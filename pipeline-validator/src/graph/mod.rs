// Dependency graph module
// Stage and job ordering from `dependsOn`

pub mod dag;
pub mod error;
pub mod plan;
pub mod resolver;

pub use dag::DependencyGraph;
pub use error::{CycleError, ResolveError};
pub use plan::{ExecutionPlan, PlannedJob, StagePlan};
pub use resolver::{job_scope, DependencyGraphResolver, STAGE_SCOPE};
