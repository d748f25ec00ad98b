//! Maps abstract workflows onto execution sites.
//!
//! [`plan`] runs the whole pipeline: submit directory, refinement
//! ([`engine`]), code generation ([`codegen`]) and optional submission
//! through `pegasus-run` ([`submit`]). [`partition`] and [`rank`] work on
//! DAX files directly.

pub mod codegen;
pub mod engine;
pub mod error;
pub mod options;
pub mod partition;
pub mod planner;
pub mod rank;
pub mod rescue;
pub mod submit;
pub mod submit_dir;
pub mod workflow;

pub use codegen::{CodeGenerator, GeneratorContext, GeneratorKind};
pub use engine::{PlanningContext, RefinementEngine, SiteSelectingEngine};
pub use error::{PlannerError, Result};
pub use options::{ForwardOption, PlannerOptions, RandomDir, split_list};
pub use partition::{Partition, PartitionGraph, Partitioner, write_partitions};
pub use planner::{PlanOutcome, SUCCESS_MESSAGE, plan};
pub use rank::{Ranking, SiteFilter, rank_directory};
pub use workflow::{ExecutableJob, ExecutableWorkflow, JobKind};
