/// One-shot effect chains. Each schedules its own stop and release; none
/// are tracked by the engine afterwards.

use rand::rngs::StdRng;
use rand::Rng;
use std::f32::consts::PI;

use super::graph::{FilterKind, NodeId, SignalGraph, Waveform};
use crate::schema::tags::Effect;

/// Build and start `effect` on the given bus. Returns the nodes created.
pub fn play(effect: Effect, graph: &mut SignalGraph, bus: NodeId, rng: &mut StdRng) -> Vec<NodeId> {
    let now = graph.current_time();
    match effect {
        Effect::Page => page_turn(graph, bus, rng),
        Effect::Choice => tone(graph, bus, 400.0, 0.06, now, 0.15),
        Effect::Save => {
            let mut nodes = tone(graph, bus, 600.0, 0.08, now, 0.3);
            nodes.extend(tone(graph, bus, 800.0, 0.08, now + 0.1, 0.3));
            nodes
        }
        Effect::Chapter => tone(graph, bus, 150.0, 0.1, now, 1.5),
        Effect::Resonance => {
            // Metallic partials, each quieter than the last.
            let mut nodes = Vec::new();
            for (i, freq) in [220.0, 440.0, 550.0, 880.0].into_iter().enumerate() {
                nodes.extend(tone(graph, bus, freq, 0.06 / (i + 1) as f32, now, 2.0));
            }
            nodes
        }
    }
}

/// A sine struck at `at` with level `peak`, decaying exponentially over
/// `decay` seconds.
fn tone(graph: &mut SignalGraph, bus: NodeId, freq: f32, peak: f32, at: f64, decay: f64) -> Vec<NodeId> {
    let osc = graph.add_oscillator(Waveform::Sine, freq);
    let gain = graph.add_gain(0.0);
    graph.set_value_at(gain, peak, at);
    graph.exponential_ramp_to(gain, 0.001, at + decay);
    graph.connect(osc, gain);
    graph.connect(gain, bus);
    graph.start_at(osc, at);
    graph.stop_at(osc, at + decay);

    let nodes = vec![osc, gain];
    graph.release_at(nodes.clone(), at + decay);
    nodes
}

/// 150 ms of noise under a half-sine window, band-limited around 2 kHz.
fn page_turn(graph: &mut SignalGraph, bus: NodeId, rng: &mut StdRng) -> Vec<NodeId> {
    let now = graph.current_time();
    let len = (graph.sample_rate() as f64 * 0.15) as usize;
    let samples: Vec<f32> = (0..len)
        .map(|i| {
            let t = i as f32 / len as f32;
            rng.gen_range(-1.0f32..1.0) * (t * PI).sin() * 0.3
        })
        .collect();

    let noise = graph.add_buffer(samples, false);
    let filter = graph.add_filter(FilterKind::Bandpass, 2000.0, 0.5);
    let gain = graph.add_gain(0.08);
    graph.connect(noise, filter);
    graph.connect(filter, gain);
    graph.connect(gain, bus);
    graph.start_at(noise, now);

    let end = now + len as f64 / graph.sample_rate() as f64;
    let nodes = vec![noise, filter, gain];
    graph.release_at(nodes.clone(), end);
    nodes
}
