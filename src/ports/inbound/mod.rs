/// Inbound ports (Driving ports) - Use case interfaces
///
/// These ports define the interfaces that external adapters (CLI, HTTP)
/// use to interact with the application core.
pub mod deployment_event_port;

pub use deployment_event_port::DeploymentEventPort;
