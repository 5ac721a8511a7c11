mod adapter_factory;

pub use adapter_factory::{AdapterFactory, DynPipelinePorts, Pipeline};
