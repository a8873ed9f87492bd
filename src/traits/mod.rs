use std::any::Any;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::error::{DelayError, Diagnostics};
use crate::graph::{NodeId, WriterRegistry};
use crate::nodes::SharedWriter;
use crate::params::DelayParam;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PortId {
    AudioInput0,
    AudioInput1,
    AudioOutput0,
    AudioOutput1,
    /// Per-sample delay time in milliseconds.
    DelayTimeMod,
}

impl PortId {
    pub fn from_output_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(PortId::AudioOutput0),
            1 => Some(PortId::AudioOutput1),
            _ => None,
        }
    }
}

/// Everything a node learns when the graph announces block parameters.
pub struct PrepareContext<'a> {
    pub block_size: usize,
    pub sample_rate: f32,
    /// This node's position in the processing order.
    pub order: usize,
    /// Bumped every time the processing order is rebuilt.
    pub epoch: u64,
    pub registry: &'a WriterRegistry,
    /// Processing-order position of every node, indexed by `NodeId`.
    pub orders: &'a [usize],
    pub diagnostics: &'a mut Diagnostics,
}

impl PrepareContext<'_> {
    pub fn order_of(&self, node: NodeId) -> Option<usize> {
        self.orders.get(node.0).copied()
    }

    pub fn report(&mut self, source: &str, error: DelayError) {
        self.diagnostics.report(source, error);
    }
}

pub trait DelayNode: Any {
    fn get_ports(&self) -> FxHashMap<PortId, bool>;

    /// Called whenever block size, sample rate or processing order changes.
    fn prepare(&mut self, ctx: &mut PrepareContext<'_>);

    /// Only connected input ports are present in `inputs`.
    fn process(
        &mut self,
        inputs: &FxHashMap<PortId, &[f32]>,
        outputs: &mut FxHashMap<PortId, &mut [f32]>,
        buffer_size: usize,
    );

    fn reset(&mut self);

    fn apply_param(&mut self, param: DelayParam) -> Result<(), DelayError> {
        Err(DelayError::UnsupportedParam {
            node: self.node_type(),
            param: param.name(),
        })
    }

    /// Buffer this node owns and shares with readers, under its name.
    fn shared_writer(&self) -> Option<(String, SharedWriter)> {
        None
    }

    fn as_any_mut(&mut self) -> &mut dyn Any;
    fn as_any(&self) -> &dyn Any;

    fn is_active(&self) -> bool;
    fn set_active(&mut self, active: bool);

    fn should_process(&self) -> bool {
        self.is_active()
    }

    fn node_type(&self) -> &'static str;

    fn name(&self) -> &str {
        self.node_type()
    }
}
