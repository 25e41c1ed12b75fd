pub mod error_mapper;
pub mod polling_engine;
pub mod result_resolver;
pub mod task_submitter;

pub use error_mapper::ErrorMapper;
pub use polling_engine::{
    PollConfig, PollOutcome, PollSchedule, PollingEngine, StandardStatus, StatusInterpreter,
};
pub use result_resolver::ResultResolver;
pub use task_submitter::TaskSubmitter;
