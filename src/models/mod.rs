pub mod job;
pub mod loaders;
pub mod resource;
pub mod result_ref;
pub mod task;
pub mod tool;

pub use job::{FileField, JobDescriptor, JobPayload, JobRequest, SourceMedia};
pub use loaders::{load_all_job_files, load_job_descriptor};
pub use resource::{ResourceHandle, ResourceRegistry};
pub use result_ref::{ArtifactKind, ArtifactRef, ArtifactSet, ResultRef};
pub use task::{SubmitResponse, Task, TaskState, TaskStatus};
pub use tool::ToolKind;
