//! Scanner jobs as local subprocesses (`local` backend)
mod local_scanner_runner;

pub use local_scanner_runner::LocalScannerRunner;
