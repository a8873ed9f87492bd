//! Renders an impulse through a delay patch and prints the echoes.
//!
//! Usage: `delay_render [patch.json] [sample_rate] [block_size]`

use std::env;
use std::fs;

use anyhow::Context;
use delay_processor::GraphPatch;
use log::info;

const DEFAULT_PATCH: &str = r#"{
    "nodes": [
        { "id": "echo", "type": "multitap", "max_delay_ms": 900, "delay_ms": 300,
          "wet_dry": 0.5, "feedback": 0.5, "taps": 2 }
    ],
    "connections": [{ "from": "input", "to": "echo" }]
}"#;

const RENDER_SECONDS: f32 = 2.0;
const THRESHOLD: f32 = 1.0e-4;

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = env::args().skip(1).collect();
    let json = match args.first() {
        Some(path) => {
            fs::read_to_string(path).with_context(|| format!("failed to read patch {}", path))?
        }
        None => DEFAULT_PATCH.to_string(),
    };
    let sample_rate: f32 = match args.get(1) {
        Some(value) => value.parse().context("invalid sample rate")?,
        None => 48_000.0,
    };
    let block_size: usize = match args.get(2) {
        Some(value) => value.parse().context("invalid block size")?,
        None => 128,
    };

    let patch = GraphPatch::from_json(&json)?;
    let mut built = patch.build(block_size)?;
    built.graph.prepare(block_size, sample_rate)?;
    for diagnostic in built.graph.diagnostics().entries() {
        println!("{:?} {}", diagnostic.severity, diagnostic);
    }

    let blocks = ((RENDER_SECONDS * sample_rate) as usize).div_ceil(block_size);
    info!(
        "rendering {} blocks of {} samples at {} Hz",
        blocks, block_size, sample_rate
    );

    let mut input = vec![0.0f32; block_size];
    let mut left = vec![0.0f32; block_size];
    let mut right = vec![0.0f32; block_size];
    for block in 0..blocks {
        input.fill(0.0);
        if block == 0 {
            input[0] = 1.0;
        }
        built
            .graph
            .process(&[&input[..]], &mut [left.as_mut_slice(), right.as_mut_slice()]);

        for (i, (&l, &r)) in left.iter().zip(right.iter()).enumerate() {
            if l.abs() > THRESHOLD || r.abs() > THRESHOLD {
                let t = block * block_size + i;
                println!(
                    "{:>8} ({:>8.2} ms)  L {:+.5}  R {:+.5}",
                    t,
                    t as f32 * 1000.0 / sample_rate,
                    l,
                    r
                );
            }
        }
    }

    Ok(())
}
