// benches/graph_benchmark.rs
use std::hint::black_box;
use std::time::Instant;

use delay_processor::{
    Connection, DelayGraph, DelayNode, DelayParam, DelayReader, DelayWriter, MultiTapDelay,
    NodeId, PortId, ReadMode, ReaderMode, SingleLineDelay, StereoTapDelay,
};

const BUFFER_SIZE: usize = 1024;
const SAMPLE_RATE: f32 = 44100.0;
const ITERATIONS: usize = 2000;

fn connect(graph: &mut DelayGraph, from: NodeId, to: NodeId) {
    graph
        .connect(Connection {
            from_node: from,
            from_port: PortId::AudioOutput0,
            to_node: to,
            to_port: PortId::AudioInput0,
            amount: 1.0,
        })
        .expect("valid connection");
}

fn single_line_patch(mode: ReadMode) -> DelayGraph {
    let mut graph = DelayGraph::new(BUFFER_SIZE);
    let input = graph.input_node();
    let delay = graph.add_node(Box::new(SingleLineDelay::new(1000.0, 333.3, mode)));
    connect(&mut graph, input, delay);
    graph.set_output_node(delay);
    graph
}

fn multitap_patch() -> DelayGraph {
    let mut graph = DelayGraph::new(BUFFER_SIZE);
    let input = graph.input_node();
    let mut node = MultiTapDelay::new(2000.0, 120.0);
    for param in [
        DelayParam::TapCount(8),
        DelayParam::WetDry(0.5),
        DelayParam::Feedback(0.6),
    ] {
        node.apply_param(param).expect("valid parameter");
    }
    let delay = graph.add_node(Box::new(node));
    connect(&mut graph, input, delay);
    graph.set_output_node(delay);
    graph
}

fn stereo_patch() -> DelayGraph {
    let mut graph = DelayGraph::new(BUFFER_SIZE);
    let input = graph.input_node();
    let delay = graph.add_node(Box::new(StereoTapDelay::new(2000.0, 150.0)));
    connect(&mut graph, input, delay);
    graph.set_output_node(delay);
    graph
}

// Eight readers tapping one writer, half of them ahead of it in the order.
fn writer_reader_patch() -> DelayGraph {
    let mut graph = DelayGraph::new(BUFFER_SIZE);
    let input = graph.input_node();
    for i in 0..4 {
        graph.add_node(Box::new(DelayReader::new(
            "shared",
            50.0 + 40.0 * i as f32,
            ReaderMode::Integer,
        )));
    }
    let writer = graph.add_node(Box::new(DelayWriter::new("shared", 1000.0)));
    connect(&mut graph, input, writer);
    let mut last = writer;
    for i in 0..4 {
        last = graph.add_node(Box::new(DelayReader::new(
            "shared",
            300.0 + 40.0 * i as f32,
            ReaderMode::Interpolated,
        )));
    }
    graph.set_output_node(last);
    graph
}

fn bench(name: &str, mut graph: DelayGraph) {
    graph
        .prepare(BUFFER_SIZE, SAMPLE_RATE)
        .expect("valid system parameters");
    let input: Vec<f32> = (0..BUFFER_SIZE)
        .map(|i| (i as f32 * 0.01).sin())
        .collect();
    let mut left = vec![0.0f32; BUFFER_SIZE];
    let mut right = vec![0.0f32; BUFFER_SIZE];

    let start = Instant::now();
    for _ in 0..ITERATIONS {
        graph.process(
            &[black_box(&input[..])],
            &mut [left.as_mut_slice(), right.as_mut_slice()],
        );
        black_box(&left);
    }
    let elapsed = start.elapsed();
    let per_block = elapsed / ITERATIONS as u32;
    let realtime = (BUFFER_SIZE as f64 / SAMPLE_RATE as f64) / per_block.as_secs_f64();
    println!(
        "{:<24} {:>10.2?} per block  ({:.0}x realtime)",
        name, per_block, realtime
    );
}

fn main() {
    bench("single_line_integer", single_line_patch(ReadMode::Integer));
    bench("single_line_cubic", single_line_patch(ReadMode::Cubic));
    bench("multitap_8", multitap_patch());
    bench("stereo_taps", stereo_patch());
    bench("writer_8_readers", writer_reader_patch());
}
