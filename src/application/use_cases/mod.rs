/// Use cases module containing application business logic orchestration
mod alert_delivery;
mod dedup_cache;
mod job_dispatcher;
mod persistence_writer;
mod process_deployment_event;
mod result_collector;

pub use alert_delivery::AlertDelivery;
pub use dedup_cache::{CacheCheck, DedupCache};
pub use job_dispatcher::{ActiveJob, JobDispatcher};
pub use persistence_writer::PersistenceWriter;
pub use process_deployment_event::{PipelinePorts, ProcessDeploymentEventUseCase};
pub use result_collector::ResultCollector;
