pub mod audio;
pub mod buffer;
pub mod config;
pub mod controller;
pub mod error;
pub mod graph;
pub mod interpolation;
pub mod line;
pub mod nodes;
pub mod params;
pub mod traits;
pub mod utils;

pub use buffer::{GuardedBuffer, MaskedBuffer, SampleBuffer};
pub use config::{BuiltPatch, GraphPatch};
pub use controller::{DelayTimeController, SystemParamsPolicy};
pub use error::{DelayError, Diagnostic, Diagnostics, Severity};
pub use graph::DelayGraph;
pub use graph::{Connection, ConnectionKey, NodeId};
pub use line::DelayLine;
pub use nodes::{
    DelayReader, DelayWriter, MultiTapDelay, ReadMode, ReaderMode, SingleLineDelay,
    StereoTapDelay,
};
pub use params::DelayParam;
pub use traits::{DelayNode, PortId};
pub use utils::*;
