/// DelayGraph hosts delay nodes and drives them one block at a time.
///
/// Core concepts:
/// - Nodes: processing units implementing [`DelayNode`], each with input and output ports
/// - Connections: routes between ports, each carrying a gain
/// - Buffer Pool: one pre-allocated block buffer per node port
/// - Processing Order: a topological order of all nodes; a node's position in it
///   is its order tag, which readers compare against their writer's tag
/// - Writer Registry: named delay buffers that readers resolve during `prepare`
///
/// The system works by:
/// 1. Construction:
///    - Node 0 is the graph input, fed from the host input channels
///    - Added nodes get port buffers and, if they own a named buffer, a registry entry
///    - Every change to nodes or connections recomputes the order and bumps the epoch
///
/// 2. Preparation:
///    - `prepare` announces block size and sample rate
///    - Writers are prepared first so readers see their final capacity
///    - A graph rebuilt after `prepare` re-prepares itself before the next block
///
/// 3. Runtime Processing:
///    - Host input is copied into the graph input node
///    - For each node in order, connected sources are mixed into its input ports and
///      it writes its output ports
///    - The output node's outputs are copied to the host channels
///
/// Cycles are not supported.
use log::debug;
use rustc_hash::{FxHashMap, FxHashSet};

use super::{
    buffer_pool::AudioBufferPool,
    registry::WriterRegistry,
    types::{Connection, ConnectionKey, NodeId},
};
use crate::error::{DelayError, Diagnostics};
use crate::nodes::GraphInput;
use crate::params::DelayParam;
use crate::traits::PrepareContext;
use crate::utils::buffer_ops::copy_or_silence;
use crate::{DelayNode, PortId};

pub struct DelayGraph {
    pub(crate) nodes: Vec<Box<dyn DelayNode>>,
    pub(crate) connections: FxHashMap<ConnectionKey, Connection>,
    pub(crate) processing_order: Vec<usize>,
    /// Order tag of every node, indexed by node id.
    pub(crate) order_tags: Vec<usize>,
    pub(crate) buffer_size: usize,
    pub(crate) sample_rate: Option<f32>,
    pub(crate) buffer_pool: AudioBufferPool,
    pub(crate) node_buffers: FxHashMap<(NodeId, PortId), usize>,
    pub(crate) input_connections: FxHashMap<NodeId, Vec<(PortId, usize, f32)>>,
    pub(crate) registry: WriterRegistry,
    pub(crate) diagnostics: Diagnostics,
    pub(crate) input_node: NodeId,
    pub(crate) output_node: Option<NodeId>,
    pub(crate) epoch: u64,
    pub(crate) needs_prepare: bool,
}

impl DelayGraph {
    pub fn new(buffer_size: usize) -> Self {
        let mut graph = Self {
            nodes: Vec::new(),
            connections: FxHashMap::default(),
            processing_order: Vec::new(),
            order_tags: Vec::new(),
            buffer_size,
            sample_rate: None,
            buffer_pool: AudioBufferPool::new(buffer_size, 16),
            node_buffers: FxHashMap::default(),
            input_connections: FxHashMap::default(),
            registry: WriterRegistry::new(),
            diagnostics: Diagnostics::new(),
            input_node: NodeId(0),
            output_node: None,
            epoch: 0,
            needs_prepare: true,
        };
        graph.input_node = graph.add_node(Box::new(GraphInput::new()));
        graph
    }

    /// Node fed from the host input channels.
    pub fn input_node(&self) -> NodeId {
        self.input_node
    }

    pub fn set_output_node(&mut self, node: NodeId) {
        self.output_node = Some(node);
    }

    pub fn output_node(&self) -> Option<NodeId> {
        self.output_node
    }

    pub fn add_node(&mut self, node: Box<dyn DelayNode>) -> NodeId {
        let id = NodeId(self.nodes.len());

        for (port, _) in node.get_ports() {
            let buffer_idx = self.buffer_pool.acquire();
            self.node_buffers.insert((id, port), buffer_idx);
        }

        if let Some((name, state)) = node.shared_writer() {
            if let Err(err) = self.registry.register(name, id, state) {
                self.diagnostics.report(node.name(), err);
            }
        }

        self.nodes.push(node);
        self.update_processing_order();
        id
    }

    /// Adds or replaces the connection between two ports.
    pub fn connect(&mut self, connection: Connection) -> Result<ConnectionKey, DelayError> {
        for (node, port) in [
            (connection.from_node, connection.from_port),
            (connection.to_node, connection.to_port),
        ] {
            if node.0 >= self.nodes.len() {
                return Err(DelayError::UnknownNode(node.0.to_string()));
            }
            if !self.node_buffers.contains_key(&(node, port)) {
                return Err(DelayError::UnknownPort {
                    node: node.0,
                    port: format!("{:?}", port),
                });
            }
        }

        let key = ConnectionKey::from(&connection);
        self.connections.insert(key, connection);
        self.rebuild_input_connections();
        self.update_processing_order();
        Ok(key)
    }

    pub fn remove_connection(&mut self, key: &ConnectionKey) -> Option<Connection> {
        let removed = self.connections.remove(key);
        if removed.is_some() {
            self.rebuild_input_connections();
            self.update_processing_order();
        }
        removed
    }

    pub fn get_node(&self, node_id: NodeId) -> Option<&dyn DelayNode> {
        self.nodes.get(node_id.0).map(|node| node.as_ref())
    }

    pub fn get_node_mut(&mut self, node_id: NodeId) -> Option<&mut Box<dyn DelayNode>> {
        self.nodes.get_mut(node_id.0)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn processing_order(&self) -> &[usize] {
        &self.processing_order
    }

    pub fn order_of(&self, node_id: NodeId) -> Option<usize> {
        self.order_tags.get(node_id.0).copied()
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    pub fn registry(&self) -> &WriterRegistry {
        &self.registry
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn diagnostics_mut(&mut self) -> &mut Diagnostics {
        &mut self.diagnostics
    }

    /// Routes a parameter update to a node. Errors are also recorded as
    /// diagnostics; the node has already fallen back to a safe value.
    pub fn set_param(&mut self, node_id: NodeId, param: DelayParam) -> Result<(), DelayError> {
        let Some(node) = self.nodes.get_mut(node_id.0) else {
            let err = DelayError::UnknownNode(node_id.0.to_string());
            self.diagnostics.report("graph", err.clone());
            return Err(err);
        };
        let result = node.apply_param(param);
        self.diagnostics.record(node.name(), result)
    }

    pub fn set_active(&mut self, node_id: NodeId, active: bool) {
        if let Some(node) = self.nodes.get_mut(node_id.0) {
            node.set_active(active);
        }
    }

    fn rebuild_input_connections(&mut self) {
        self.input_connections.clear();
        for connection in self.connections.values() {
            if let Some(&source_idx) = self
                .node_buffers
                .get(&(connection.from_node, connection.from_port))
            {
                self.input_connections
                    .entry(connection.to_node)
                    .or_default()
                    .push((connection.to_port, source_idx, connection.amount));
            }
        }
    }

    fn update_processing_order(&mut self) {
        self.processing_order.clear();
        let mut visited = vec![false; self.nodes.len()];

        // Upstream nodes first; otherwise insertion order.
        for i in 0..self.nodes.len() {
            if !visited[i] {
                self.visit_node(i, &mut visited);
            }
        }

        self.order_tags = vec![0; self.nodes.len()];
        for (position, &node_idx) in self.processing_order.iter().enumerate() {
            self.order_tags[node_idx] = position;
        }

        self.epoch += 1;
        self.needs_prepare = true;
        debug!(
            "processing order rebuilt (epoch {}): {:?}",
            self.epoch, self.processing_order
        );
    }

    fn visit_node(&mut self, index: usize, visited: &mut [bool]) {
        if visited[index] {
            return;
        }

        visited[index] = true;

        let node_id = NodeId(index);
        let mut upstream_nodes: Vec<usize> = self
            .connections
            .values()
            .filter(|conn| conn.to_node == node_id)
            .map(|conn| conn.from_node.0)
            .collect();
        upstream_nodes.sort_unstable();

        for &next_node in &upstream_nodes {
            if !visited[next_node] {
                self.visit_node(next_node, visited);
            }
        }

        self.processing_order.push(index);
    }

    /// Announces block size and sample rate to every node.
    pub fn prepare(&mut self, block_size: usize, sample_rate: f32) -> Result<(), DelayError> {
        if block_size == 0 || !(sample_rate.is_finite() && sample_rate > 0.0) {
            let err = DelayError::InvalidSystemParams {
                block_size,
                sample_rate,
            };
            self.diagnostics.report("graph", err.clone());
            return Err(err);
        }

        if block_size != self.buffer_size {
            self.buffer_pool.resize(block_size);
            self.buffer_size = block_size;
        }
        self.sample_rate = Some(sample_rate);
        self.prepare_nodes();
        Ok(())
    }

    fn prepare_nodes(&mut self) {
        let Some(sample_rate) = self.sample_rate else {
            return;
        };

        let (mut order, readers): (Vec<usize>, Vec<usize>) = self
            .processing_order
            .iter()
            .partition(|&&idx| self.nodes[idx].shared_writer().is_some());
        order.extend(readers);

        for idx in order {
            let mut ctx = PrepareContext {
                block_size: self.buffer_size,
                sample_rate,
                order: self.order_tags[idx],
                epoch: self.epoch,
                registry: &self.registry,
                orders: &self.order_tags,
                diagnostics: &mut self.diagnostics,
            };
            self.nodes[idx].prepare(&mut ctx);
        }
        self.needs_prepare = false;
    }

    /// Processes one block.
    ///
    /// Every channel must be exactly one block long; otherwise, and before the
    /// first `prepare`, the outputs are silenced.
    pub fn process(&mut self, inputs: &[&[f32]], outputs: &mut [&mut [f32]]) {
        let block = self.buffer_size;
        let lengths_match = inputs.iter().all(|channel| channel.len() == block)
            && outputs.iter().all(|channel| channel.len() == block);
        if !lengths_match || self.sample_rate.is_none() {
            for channel in outputs.iter_mut() {
                channel.fill(0.0);
            }
            return;
        }

        if self.needs_prepare {
            self.prepare_nodes();
        }

        for &buffer_idx in self.node_buffers.values() {
            self.buffer_pool.clear(buffer_idx);
        }

        for (channel, data) in inputs.iter().enumerate() {
            let Some(port) = PortId::from_output_index(channel) else {
                break;
            };
            if let Some(&buffer_idx) = self.node_buffers.get(&(self.input_node, port)) {
                self.buffer_pool.copy_in(buffer_idx, data);
            }
        }

        for position in 0..self.processing_order.len() {
            let node_idx = self.processing_order[position];
            self.process_node(node_idx);
        }

        self.write_outputs(outputs);
    }

    fn process_node(&mut self, node_idx: usize) {
        let node_id = NodeId(node_idx);
        let ports = self.nodes[node_idx].get_ports();

        if !self.nodes[node_idx].should_process() {
            for (&port, &is_output) in &ports {
                if is_output {
                    if let Some(&buffer_idx) = self.node_buffers.get(&(node_id, port)) {
                        self.buffer_pool.clear(buffer_idx);
                    }
                }
            }
            return;
        }

        let mut connected = FxHashSet::default();
        if let Some(connections) = self.input_connections.get(&node_id) {
            for &(port, source_idx, amount) in connections {
                if let Some(&dest_idx) = self.node_buffers.get(&(node_id, port)) {
                    self.buffer_pool.mix_into(source_idx, dest_idx, amount);
                    connected.insert(port);
                }
            }
        }

        let mut taken: Vec<(PortId, usize, Vec<f32>)> = ports
            .iter()
            .filter(|(_, &is_output)| is_output)
            .filter_map(|(&port, _)| {
                self.node_buffers
                    .get(&(node_id, port))
                    .map(|&buffer_idx| (port, buffer_idx, self.buffer_pool.take(buffer_idx)))
            })
            .collect();

        {
            let mut inputs: FxHashMap<PortId, &[f32]> = FxHashMap::default();
            for port in &connected {
                if let Some(&buffer_idx) = self.node_buffers.get(&(node_id, *port)) {
                    inputs.insert(*port, self.buffer_pool.copy_out(buffer_idx));
                }
            }

            let mut outputs: FxHashMap<PortId, &mut [f32]> = taken
                .iter_mut()
                .map(|(port, _, buffer)| (*port, buffer.as_mut_slice()))
                .collect();

            self.nodes[node_idx].process(&inputs, &mut outputs, self.buffer_size);
        }

        for (_, buffer_idx, buffer) in taken {
            self.buffer_pool.restore(buffer_idx, buffer);
        }
    }

    fn write_outputs(&self, outputs: &mut [&mut [f32]]) {
        let source = self
            .output_node
            .filter(|node| {
                self.nodes
                    .get(node.0)
                    .is_some_and(|node| node.is_active())
            });

        for (channel, output) in outputs.iter_mut().enumerate() {
            let buffer_idx = source.and_then(|node| {
                PortId::from_output_index(channel)
                    .and_then(|port| self.node_buffers.get(&(node, port)))
                    // Mono sources feed every channel.
                    .or_else(|| self.node_buffers.get(&(node, PortId::AudioOutput0)))
            });
            match buffer_idx {
                Some(&buffer_idx) => copy_or_silence(self.buffer_pool.copy_out(buffer_idx), output),
                None => output.fill(0.0),
            }
        }
    }
}

impl std::fmt::Debug for DelayGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DelayGraph")
            .field("buffer_size", &self.buffer_size)
            .field("sample_rate", &self.sample_rate)
            .field("num_nodes", &self.nodes.len())
            .field("num_connections", &self.connections.len())
            .field("epoch", &self.epoch)
            .finish()
    }
}
