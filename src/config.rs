//! JSON patch format.
//!
//! A patch lists nodes by id, the connections between their ports and the
//! node whose outputs go to the host. The id `"input"` names the graph input.
//!
//! ```json
//! {
//!   "nodes": [
//!     { "id": "w", "type": "writer", "name": "buf1", "max_delay_ms": 500 },
//!     { "id": "r", "type": "reader", "writer": "buf1", "delay_ms": 120 }
//!   ],
//!   "connections": [{ "from": "input", "to": "w" }],
//!   "output": "r"
//! }
//! ```

use log::debug;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::error::DelayError;
use crate::graph::{Connection, DelayGraph, NodeId};
use crate::nodes::{
    DelayReader, DelayWriter, MultiTapDelay, ReadMode, ReaderMode, SingleLineDelay,
    StereoTapDelay,
};
use crate::params::DelayParam;
use crate::traits::{DelayNode, PortId};

/// Reserved id of the graph input node.
pub const INPUT_ID: &str = "input";

const DEFAULT_MAX_DELAY_MS: f32 = 1000.0;
const DEFAULT_DELAY_MS: f32 = 250.0;

fn default_max_delay_ms() -> f32 {
    DEFAULT_MAX_DELAY_MS
}

fn default_delay_ms() -> f32 {
    DEFAULT_DELAY_MS
}

fn default_one() -> usize {
    1
}

fn default_stereo_taps() -> usize {
    StereoTapDelay::DEFAULT_TAPS
}

fn default_amount() -> f32 {
    1.0
}

fn default_from_port() -> PortId {
    PortId::AudioOutput0
}

fn default_to_port() -> PortId {
    PortId::AudioInput0
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphPatch {
    #[serde(default)]
    pub nodes: Vec<PatchNode>,
    #[serde(default)]
    pub connections: Vec<PatchConnection>,
    /// Defaults to the last node in `nodes`.
    #[serde(default)]
    pub output: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatchNode {
    pub id: String,
    #[serde(flatten)]
    pub config: NodeConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NodeConfig {
    Delay(DelayConfig),
    Multitap(MultitapConfig),
    StereoTaps(StereoTapsConfig),
    Writer(WriterConfig),
    Reader(ReaderConfig),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DelayConfig {
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: f32,
    #[serde(default = "default_delay_ms")]
    pub delay_ms: f32,
    #[serde(default)]
    pub mode: ReadMode,
    #[serde(default)]
    pub ramp_ms: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MultitapConfig {
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: f32,
    #[serde(default = "default_delay_ms")]
    pub delay_ms: f32,
    #[serde(default)]
    pub wet_dry: f32,
    #[serde(default)]
    pub feedback: f32,
    #[serde(default = "default_one")]
    pub taps: usize,
    #[serde(default = "default_one")]
    pub feedback_tap: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StereoTapsConfig {
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: f32,
    #[serde(default = "default_delay_ms")]
    pub delay_ms: f32,
    #[serde(default)]
    pub wet_dry: f32,
    #[serde(default)]
    pub feedback: f32,
    #[serde(default = "default_stereo_taps")]
    pub taps: usize,
    /// Defaults to tap 3, or the last tap when there are fewer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback_tap: Option<usize>,
    /// Defaults to tap 4, or the last tap when there are fewer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback_tap_right: Option<usize>,
}

impl StereoTapsConfig {
    /// Tap count and feedback taps in an order that never trips over the
    /// node's defaults: a shrinking count goes last so the feedback taps
    /// already fit it.
    fn tap_params(&self) -> [DelayParam; 3] {
        let last = self.taps.max(1);
        let left = self
            .feedback_tap
            .unwrap_or(StereoTapDelay::DEFAULT_FEEDBACK_LEFT.min(last));
        let right = self
            .feedback_tap_right
            .unwrap_or(StereoTapDelay::DEFAULT_FEEDBACK_RIGHT.min(last));
        let count = DelayParam::TapCount(self.taps);
        let (left, right) = (DelayParam::FeedbackTap(left), DelayParam::FeedbackTapRight(right));
        if self.taps < StereoTapDelay::DEFAULT_TAPS {
            [left, right, count]
        } else {
            [count, left, right]
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WriterConfig {
    /// Buffer name readers refer to. Defaults to the node id.
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReaderConfig {
    pub writer: String,
    #[serde(default = "default_delay_ms")]
    pub delay_ms: f32,
    #[serde(default)]
    pub mode: ReaderMode,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatchConnection {
    pub from: String,
    #[serde(default = "default_from_port")]
    pub from_port: PortId,
    pub to: String,
    #[serde(default = "default_to_port")]
    pub to_port: PortId,
    #[serde(default = "default_amount")]
    pub amount: f32,
}

/// A graph built from a patch, with the patch ids of its nodes.
#[derive(Debug)]
pub struct BuiltPatch {
    pub graph: DelayGraph,
    pub ids: FxHashMap<String, NodeId>,
}

impl BuiltPatch {
    pub fn node(&self, id: &str) -> Option<NodeId> {
        self.ids.get(id).copied()
    }
}

impl NodeConfig {
    /// The node itself and the parameter updates that follow construction.
    fn instantiate(&self, id: &str) -> (Box<dyn DelayNode>, Vec<DelayParam>) {
        match self {
            NodeConfig::Delay(config) => (
                Box::new(SingleLineDelay::new(
                    config.max_delay_ms,
                    config.delay_ms,
                    config.mode,
                )),
                vec![DelayParam::RampMs(config.ramp_ms)],
            ),
            NodeConfig::Multitap(config) => (
                Box::new(MultiTapDelay::new(config.max_delay_ms, config.delay_ms)),
                vec![
                    DelayParam::WetDry(config.wet_dry),
                    DelayParam::Feedback(config.feedback),
                    DelayParam::TapCount(config.taps),
                    DelayParam::FeedbackTap(config.feedback_tap),
                ],
            ),
            NodeConfig::StereoTaps(config) => {
                let mut params = vec![
                    DelayParam::WetDry(config.wet_dry),
                    DelayParam::Feedback(config.feedback),
                ];
                params.extend(config.tap_params());
                (
                    Box::new(StereoTapDelay::new(config.max_delay_ms, config.delay_ms)),
                    params,
                )
            }
            NodeConfig::Writer(config) => (
                Box::new(DelayWriter::new(
                    config.name.as_deref().unwrap_or(id),
                    config.max_delay_ms,
                )),
                Vec::new(),
            ),
            NodeConfig::Reader(config) => (
                Box::new(DelayReader::new(&config.writer, config.delay_ms, config.mode)),
                Vec::new(),
            ),
        }
    }
}

impl GraphPatch {
    pub fn from_json(json: &str) -> Result<Self, DelayError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String, DelayError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Builds the graph. Out-of-range parameter values are replaced by safe
    /// defaults and show up in the graph's diagnostics; unknown or duplicate
    /// ids fail the build.
    pub fn build(&self, block_size: usize) -> Result<BuiltPatch, DelayError> {
        let mut graph = DelayGraph::new(block_size);
        let mut ids = FxHashMap::default();
        ids.insert(INPUT_ID.to_string(), graph.input_node());

        for node in &self.nodes {
            if ids.contains_key(&node.id) {
                return Err(DelayError::Patch(format!("duplicate node id '{}'", node.id)));
            }
            let (instance, params) = node.config.instantiate(&node.id);
            let node_id = graph.add_node(instance);
            for param in params {
                // Failures are already recorded as diagnostics.
                let _ = graph.set_param(node_id, param);
            }
            ids.insert(node.id.clone(), node_id);
        }

        let lookup = |id: &str| {
            ids.get(id)
                .copied()
                .ok_or_else(|| DelayError::UnknownNode(id.to_string()))
        };

        for connection in &self.connections {
            graph.connect(Connection {
                from_node: lookup(&connection.from)?,
                from_port: connection.from_port,
                to_node: lookup(&connection.to)?,
                to_port: connection.to_port,
                amount: connection.amount,
            })?;
        }

        let output = match (&self.output, self.nodes.last()) {
            (Some(id), _) => Some(lookup(id)?),
            (None, Some(last)) => Some(lookup(&last.id)?),
            (None, None) => None,
        };
        if let Some(output) = output {
            graph.set_output_node(output);
        }

        debug!(
            "built patch with {} nodes and {} connections",
            self.nodes.len(),
            self.connections.len()
        );
        Ok(BuiltPatch { graph, ids })
    }
}
