pub mod cache_policy;
pub mod job_naming;

pub use cache_policy::CachePolicy;
pub use job_naming::{JobNaming, MAX_JOB_NAME_LENGTH};
