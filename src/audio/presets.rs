/// Ambient preset graphs.
///
/// Each builder wires its nodes into the background bus and returns every
/// node it created, so the engine can release the whole preset at once.
/// Presets with a recurring part (factory clicks, heartbeat pulses) also
/// return the first task to schedule.

use rand::rngs::StdRng;
use rand::Rng;

use super::graph::{FilterKind, NodeId, SignalGraph, Waveform};
use crate::schema::tags::AmbientPreset;

/// Recurring work an ambient preset needs the engine to schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AmbientTask {
    FactoryClick,
    HeartbeatPulse,
}

pub const FACTORY_FIRST_CLICK_MS: u64 = 500;
pub const HEARTBEAT_PERIOD_MS: u64 = 900;

/// Nodes and follow-up work produced by building a preset.
#[derive(Debug, Clone, Default)]
pub struct PresetGraph {
    pub nodes: Vec<NodeId>,
    /// `(delay_ms, task)` to schedule after the graph is up.
    pub recurring: Option<(u64, AmbientTask)>,
}

/// `len` samples of white noise scaled by `amplitude`.
pub fn noise_buffer(rng: &mut StdRng, len: usize, amplitude: f32) -> Vec<f32> {
    (0..len)
        .map(|_| rng.gen_range(-1.0f32..1.0) * amplitude)
        .collect()
}

pub fn build(
    preset: AmbientPreset,
    graph: &mut SignalGraph,
    bus: NodeId,
    rng: &mut StdRng,
) -> PresetGraph {
    match preset {
        AmbientPreset::Rain => rain(graph, bus, rng),
        AmbientPreset::Factory => factory(graph, bus),
        AmbientPreset::Tension => tension(graph, bus),
        AmbientPreset::Heartbeat => heartbeat(graph, bus),
        AmbientPreset::Silence => silence(graph, bus, rng),
        AmbientPreset::Dark => dark(graph, bus),
    }
}

fn rain(graph: &mut SignalGraph, bus: NodeId, rng: &mut StdRng) -> PresetGraph {
    let now = graph.current_time();
    let two_seconds = graph.sample_rate() as usize * 2;
    let mut nodes = Vec::new();

    for (cutoff, level) in [(600.0, 0.04), (1200.0, 0.02)] {
        let noise = graph.add_buffer(noise_buffer(rng, two_seconds, 1.0), true);
        let filter = graph.add_filter(FilterKind::Lowpass, cutoff, 1.0);
        let gain = graph.add_gain(level);
        graph.connect(noise, filter);
        graph.connect(filter, gain);
        graph.connect(gain, bus);
        graph.start_at(noise, now);
        nodes.extend([noise, filter, gain]);
    }

    // Low wind whose level swells and fades like gusts.
    let wind = graph.add_oscillator(Waveform::Sine, 80.0);
    let wind_gain = graph.add_gain(0.03);
    let lfo = graph.add_oscillator(Waveform::Sine, 0.1);
    let lfo_depth = graph.add_gain(0.015);
    graph.connect(lfo, lfo_depth);
    graph.connect_param(lfo_depth, wind_gain);
    graph.connect(wind, wind_gain);
    graph.connect(wind_gain, bus);
    graph.start_at(wind, now);
    graph.start_at(lfo, now);
    nodes.extend([wind, wind_gain, lfo, lfo_depth]);

    PresetGraph {
        nodes,
        recurring: None,
    }
}

fn factory(graph: &mut SignalGraph, bus: NodeId) -> PresetGraph {
    let now = graph.current_time();
    let drone = graph.add_oscillator(Waveform::Sawtooth, 55.0);
    let filter = graph.add_filter(FilterKind::Lowpass, 120.0, 1.0);
    let gain = graph.add_gain(0.06);
    graph.connect(drone, filter);
    graph.connect(filter, gain);
    graph.connect(gain, bus);
    graph.start_at(drone, now);

    PresetGraph {
        nodes: vec![drone, filter, gain],
        recurring: Some((FACTORY_FIRST_CLICK_MS, AmbientTask::FactoryClick)),
    }
}

/// One machine click. Returns its nodes and the delay until the next one.
pub fn factory_click(graph: &mut SignalGraph, bus: NodeId, rng: &mut StdRng) -> (Vec<NodeId>, u64) {
    let now = graph.current_time();
    let end = now + 0.03;

    let osc = graph.add_oscillator(Waveform::Square, 100.0 + rng.gen_range(0.0f32..200.0));
    let filter = graph.add_filter(FilterKind::Bandpass, 300.0, 1.0);
    let gain = graph.add_gain(0.0);
    graph.set_value_at(gain, 0.03, now);
    graph.exponential_ramp_to(gain, 0.001, end);
    graph.connect(osc, filter);
    graph.connect(filter, gain);
    graph.connect(gain, bus);
    graph.start_at(osc, now);
    graph.stop_at(osc, end);

    let nodes = vec![osc, filter, gain];
    graph.release_at(nodes.clone(), end);
    (nodes, rng.gen_range(300..800))
}

fn tension(graph: &mut SignalGraph, bus: NodeId) -> PresetGraph {
    let now = graph.current_time();
    let mut nodes = Vec::new();

    // Close frequencies beat against each other.
    for (i, freq) in [110.0, 117.0, 123.0].into_iter().enumerate() {
        let osc = graph.add_oscillator(Waveform::Sine, freq);
        let gain = graph.add_gain(0.04);
        let lfo = graph.add_oscillator(Waveform::Sine, 0.08 + i as f32 * 0.02);
        let depth = graph.add_gain(0.02);
        graph.connect(lfo, depth);
        graph.connect_param(depth, gain);
        graph.connect(osc, gain);
        graph.connect(gain, bus);
        graph.start_at(osc, now);
        graph.start_at(lfo, now);
        nodes.extend([osc, gain, lfo, depth]);
    }

    PresetGraph {
        nodes,
        recurring: None,
    }
}

fn heartbeat(graph: &mut SignalGraph, bus: NodeId) -> PresetGraph {
    let now = graph.current_time();
    let mut nodes = heartbeat_pulse(graph, bus);

    let sub = graph.add_oscillator(Waveform::Sine, 40.0);
    let sub_gain = graph.add_gain(0.05);
    graph.connect(sub, sub_gain);
    graph.connect(sub_gain, bus);
    graph.start_at(sub, now);
    nodes.extend([sub, sub_gain]);

    PresetGraph {
        nodes,
        recurring: Some((HEARTBEAT_PERIOD_MS, AmbientTask::HeartbeatPulse)),
    }
}

/// A lub-dub: a strong low thump, then a weaker one 150 ms later.
pub fn heartbeat_pulse(graph: &mut SignalGraph, bus: NodeId) -> Vec<NodeId> {
    let now = graph.current_time();
    let mut nodes = thump(graph, bus, now, (70.0, 35.0, 0.15), (0.15, 0.25));
    nodes.extend(thump(graph, bus, now + 0.15, (55.0, 30.0, 0.1), (0.1, 0.15)));
    graph.release_at(nodes.clone(), now + 0.3);
    nodes
}

/// A sine whose pitch sweeps `(from, to, over)` and whose level decays
/// `(peak, over)`, starting at `at`.
fn thump(
    graph: &mut SignalGraph,
    bus: NodeId,
    at: f64,
    sweep: (f32, f32, f64),
    envelope: (f32, f64),
) -> Vec<NodeId> {
    let (from_hz, to_hz, sweep_time) = sweep;
    let (peak, decay) = envelope;

    let osc = graph.add_oscillator(Waveform::Sine, from_hz);
    graph.set_value_at(osc, from_hz, at);
    graph.exponential_ramp_to(osc, to_hz, at + sweep_time);

    let gain = graph.add_gain(0.0);
    graph.set_value_at(gain, peak, at);
    graph.exponential_ramp_to(gain, 0.001, at + decay);

    graph.connect(osc, gain);
    graph.connect(gain, bus);
    graph.start_at(osc, at);
    graph.stop_at(osc, at + decay);
    vec![osc, gain]
}

fn silence(graph: &mut SignalGraph, bus: NodeId, rng: &mut StdRng) -> PresetGraph {
    let now = graph.current_time();
    let two_seconds = graph.sample_rate() as usize * 2;
    let noise = graph.add_buffer(noise_buffer(rng, two_seconds, 0.01), true);
    let filter = graph.add_filter(FilterKind::Highpass, 8000.0, 1.0);
    let gain = graph.add_gain(0.02);
    graph.connect(noise, filter);
    graph.connect(filter, gain);
    graph.connect(gain, bus);
    graph.start_at(noise, now);

    PresetGraph {
        nodes: vec![noise, filter, gain],
        recurring: None,
    }
}

fn dark(graph: &mut SignalGraph, bus: NodeId) -> PresetGraph {
    let now = graph.current_time();
    let osc = graph.add_oscillator(Waveform::Sine, 60.0);
    let gain = graph.add_gain(0.04);
    graph.connect(osc, gain);
    graph.connect(gain, bus);
    graph.start_at(osc, now);

    PresetGraph {
        nodes: vec![osc, gain],
        recurring: None,
    }
}
