mod buffer_pool;
mod graph;
mod registry;
mod types;

pub use buffer_pool::AudioBufferPool;
pub use graph::DelayGraph;
pub use registry::{WriterEntry, WriterRegistry};
pub use types::{Connection, ConnectionKey, NodeId};
