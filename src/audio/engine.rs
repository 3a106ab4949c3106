/// Ambient audio engine — two-bus mixer, one ambient preset at a time,
/// and fire-and-forget one-shot effects.
///
/// Nothing here ever reports an error to the caller. Before the first user
/// gesture every call is a no-op, and if the host cannot open an output the
/// engine stays a no-op for good.
///
/// Time has one source: `advance`. It renders the graph up to each
/// recurring task's due time before running it, so clicks and pulses land
/// on the sample they were scheduled for, and every rendered block goes
/// straight to the host.

use rand::rngs::StdRng;
use rand::SeedableRng;

use super::effects;
use super::graph::{NodeId, SignalGraph};
use super::host::AudioHost;
use super::presets::{self, AmbientTask};
use crate::core::scheduler::{Scheduler, TaskId};
use crate::schema::tags::{AmbientPreset, Effect};

/// Map a 0–100 volume to a linear gain.
pub fn volume_to_gain(volume: u8) -> f32 {
    volume.min(100) as f32 / 100.0
}

/// Lifecycle of the underlying output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioStatus {
    /// Waiting for the first user gesture.
    Locked,
    Ready,
    /// The host failed to open; audio is off for this session.
    Unsupported,
}

/// Samples rendered per host write.
const BLOCK_FRAMES: usize = 512;

/// The live graph plus the bookkeeping for the active preset.
struct Mixer {
    graph: SignalGraph,
    /// Scheduler time at which the graph's frame zero was rendered.
    origin_ms: u64,
    block: Vec<f32>,
    bgm: NodeId,
    sfx: NodeId,
    ambient: Option<AmbientPreset>,
    ambient_nodes: Vec<NodeId>,
    recurring: Option<TaskId>,
}

enum State {
    Locked,
    Ready(Box<Mixer>),
    Unsupported,
}

pub struct AudioEngine {
    host: Box<dyn AudioHost>,
    state: State,
    bgm_volume: u8,
    sfx_volume: u8,
    tasks: Scheduler<AmbientTask>,
    rng: StdRng,
}

impl AudioEngine {
    pub fn new(host: Box<dyn AudioHost>) -> Self {
        Self {
            host,
            state: State::Locked,
            bgm_volume: 40,
            sfx_volume: 60,
            tasks: Scheduler::new(),
            rng: StdRng::seed_from_u64(0),
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn with_volumes(mut self, bgm: u8, sfx: u8) -> Self {
        self.bgm_volume = bgm.min(100);
        self.sfx_volume = sfx.min(100);
        self
    }

    pub fn status(&self) -> AudioStatus {
        match self.state {
            State::Locked => AudioStatus::Locked,
            State::Ready(_) => AudioStatus::Ready,
            State::Unsupported => AudioStatus::Unsupported,
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.state, State::Ready(_))
    }

    /// Open the output on the first user gesture. Later calls do nothing.
    pub fn unlock(&mut self) -> AudioStatus {
        if !matches!(self.state, State::Locked) {
            return self.status();
        }

        self.state = match self.host.open() {
            Ok(config) => {
                let mut graph = SignalGraph::new(config.sample_rate);
                let master = graph.master();
                let bgm = graph.add_gain(volume_to_gain(self.bgm_volume));
                let sfx = graph.add_gain(volume_to_gain(self.sfx_volume));
                graph.connect(bgm, master);
                graph.connect(sfx, master);
                tracing::debug!(sample_rate = config.sample_rate, "audio unlocked");
                State::Ready(Box::new(Mixer {
                    graph,
                    origin_ms: self.tasks.now(),
                    block: vec![0.0; BLOCK_FRAMES],
                    bgm,
                    sfx,
                    ambient: None,
                    ambient_nodes: Vec::new(),
                    recurring: None,
                }))
            }
            Err(e) => {
                tracing::warn!(error = %e, "audio not supported; continuing without sound");
                State::Unsupported
            }
        };
        self.status()
    }

    fn mixer_mut(&mut self) -> Option<&mut Mixer> {
        match &mut self.state {
            State::Ready(mixer) => Some(&mut **mixer),
            _ => None,
        }
    }

    fn mixer(&self) -> Option<&Mixer> {
        match &self.state {
            State::Ready(mixer) => Some(&**mixer),
            _ => None,
        }
    }

    pub fn current_ambient(&self) -> Option<AmbientPreset> {
        self.mixer().and_then(|m| m.ambient)
    }

    /// Handles of every live node belonging to the current preset.
    pub fn ambient_nodes(&self) -> &[NodeId] {
        match self.mixer() {
            Some(mixer) => mixer.ambient_nodes.as_slice(),
            None => &[],
        }
    }

    /// The live graph, once unlocked.
    pub fn graph(&self) -> Option<&SignalGraph> {
        self.mixer().map(|m| &m.graph)
    }

    /// Switch to `preset`. Asking for the preset already playing does
    /// nothing, so re-entering a scene never restarts its bed.
    pub fn play_ambient(&mut self, preset: AmbientPreset) {
        if self.current_ambient() == Some(preset) || !self.is_ready() {
            return;
        }
        self.stop_ambient();

        let Self {
            state, tasks, rng, ..
        } = self;
        let State::Ready(mixer) = state else {
            return;
        };

        let built = presets::build(preset, &mut mixer.graph, mixer.bgm, rng);
        mixer.ambient = Some(preset);
        mixer.ambient_nodes = built.nodes;
        if let Some((delay, task)) = built.recurring {
            mixer.recurring = Some(tasks.schedule(delay, task));
        }
        tracing::debug!(preset = %preset, nodes = mixer.ambient_nodes.len(), "ambient started");
    }

    /// Stop the current preset, cancel its recurring work, and release
    /// every node it owns.
    pub fn stop_ambient(&mut self) {
        let Self { state, tasks, .. } = self;
        let State::Ready(mixer) = state else {
            return;
        };

        tasks.cancel_slot(&mut mixer.recurring);
        for id in mixer.ambient_nodes.drain(..) {
            mixer.graph.release(id);
        }
        if let Some(preset) = mixer.ambient.take() {
            tracing::debug!(preset = %preset, "ambient stopped");
        }
    }

    /// Fire a one-shot effect on the effects bus.
    pub fn play(&mut self, effect: Effect) {
        let Self { state, rng, .. } = self;
        let State::Ready(mixer) = state else {
            return;
        };
        effects::play(effect, &mut mixer.graph, mixer.sfx, rng);
    }

    pub fn bgm_volume(&self) -> u8 {
        self.bgm_volume
    }

    pub fn sfx_volume(&self) -> u8 {
        self.sfx_volume
    }

    pub fn set_bgm_volume(&mut self, volume: u8) {
        self.bgm_volume = volume.min(100);
        let gain = volume_to_gain(self.bgm_volume);
        if let Some(mixer) = self.mixer_mut() {
            let bus = mixer.bgm;
            mixer.graph.set_value(bus, gain);
        }
    }

    pub fn set_sfx_volume(&mut self, volume: u8) {
        self.sfx_volume = volume.min(100);
        let gain = volume_to_gain(self.sfx_volume);
        if let Some(mixer) = self.mixer_mut() {
            let bus = mixer.sfx;
            mixer.graph.set_value(bus, gain);
        }
    }

    /// Current linear gain of the background bus, once unlocked.
    pub fn bgm_gain(&self) -> Option<f32> {
        self.mixer().and_then(|m| m.graph.param_value(m.bgm))
    }

    pub fn sfx_gain(&self) -> Option<f32> {
        self.mixer().and_then(|m| m.graph.param_value(m.sfx))
    }

    /// Number of recurring ambient tasks waiting to fire.
    pub fn pending_tasks(&self) -> usize {
        self.tasks.len()
    }

    /// Let `elapsed_ms` of wall time pass: run due clicks and pulses and
    /// render the span to the host.
    pub fn advance(&mut self, elapsed_ms: u64) {
        let until = self.tasks.now().saturating_add(elapsed_ms);
        while let Some((id, task)) = self.tasks.pop_due(until) {
            let due = self.tasks.now();
            self.render_until(due);
            self.run_task(id, task);
        }
        self.tasks.advance_to(until);
        self.render_until(until);
    }

    fn run_task(&mut self, id: TaskId, task: AmbientTask) {
        let Self {
            state, tasks, rng, ..
        } = self;
        let State::Ready(mixer) = state else {
            return;
        };
        if mixer.recurring != Some(id) {
            return;
        }

        let (nodes, delay) = match task {
            AmbientTask::FactoryClick => presets::factory_click(&mut mixer.graph, mixer.bgm, rng),
            AmbientTask::HeartbeatPulse => (
                presets::heartbeat_pulse(&mut mixer.graph, mixer.bgm),
                presets::HEARTBEAT_PERIOD_MS,
            ),
        };
        mixer.ambient_nodes.extend(nodes);
        mixer.recurring = Some(tasks.schedule(delay, task));
    }

    /// Render the graph forward to scheduler time `ms`, block by block.
    fn render_until(&mut self, ms: u64) {
        let Self { state, host, .. } = self;
        let State::Ready(mixer) = state else {
            return;
        };
        let Mixer {
            graph,
            origin_ms,
            block,
            ambient_nodes,
            ..
        } = &mut **mixer;

        let elapsed = ms.saturating_sub(*origin_ms);
        let target = elapsed.saturating_mul(u64::from(graph.sample_rate())) / 1_000;
        let mut remaining = target.saturating_sub(graph.frames());
        if remaining == 0 {
            return;
        }

        while remaining > 0 {
            let n = remaining.min(block.len() as u64) as usize;
            graph.render(&mut block[..n]);
            host.write(&block[..n]);
            remaining -= n as u64;
        }

        // Clicks and pulses release themselves; forget their handles.
        ambient_nodes.retain(|&id| graph.contains(id));
    }
}
