/// Outbound adapters - Infrastructure implementations of outbound ports
pub mod clock;
pub mod console;
pub mod filesystem;
pub mod gcp;
pub mod memory;
pub mod process;
