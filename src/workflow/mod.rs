pub mod job_ctx;
pub mod job_flow;
pub mod job_state;

pub use job_ctx::JobCtx;
pub use job_flow::{JobWorkflow, TransitionObserver, WorkflowSettings};
pub use job_state::{ProcessingTimer, WorkflowOutcome, WorkflowSnapshot, WorkflowState};
