use std::any::Any;

use rustc_hash::FxHashMap;

use crate::traits::{DelayNode, PortId, PrepareContext};

/// Exposes the host input channels as output ports. The graph fills the
/// buffers before any node runs.
#[derive(Debug, Default)]
pub struct GraphInput {
    active: bool,
}

impl GraphInput {
    pub fn new() -> Self {
        Self { active: true }
    }
}

impl DelayNode for GraphInput {
    fn get_ports(&self) -> FxHashMap<PortId, bool> {
        let mut ports = FxHashMap::default();
        ports.insert(PortId::AudioOutput0, true);
        ports.insert(PortId::AudioOutput1, true);
        ports
    }

    fn prepare(&mut self, _ctx: &mut PrepareContext<'_>) {}

    fn process(
        &mut self,
        _inputs: &FxHashMap<PortId, &[f32]>,
        _outputs: &mut FxHashMap<PortId, &mut [f32]>,
        _buffer_size: usize,
    ) {
    }

    fn reset(&mut self) {}

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn is_active(&self) -> bool {
        self.active
    }

    fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    fn node_type(&self) -> &'static str {
        "graph_input"
    }
}
