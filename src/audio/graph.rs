/// Procedural signal graph — oscillators, noise buffers, biquad filters,
/// and gains, rendered sample by sample from the master node.
///
/// Nodes live in a generational arena. A `NodeId` goes stale once its node is
/// released, and every operation on a stale or unknown id is a silent no-op,
/// so releasing twice (or touching a node a one-shot already cleaned up) is
/// always safe.

use std::f64::consts::PI;

/// Handle to a node in a [`SignalGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId {
    index: u32,
    generation: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Waveform {
    Sine,
    Square,
    Sawtooth,
}

impl Waveform {
    /// Sample the waveform at `phase` in [0, 1).
    fn sample(self, phase: f64) -> f32 {
        match self {
            Self::Sine => (2.0 * PI * phase).sin() as f32,
            Self::Square => {
                if phase < 0.5 {
                    1.0
                } else {
                    -1.0
                }
            }
            Self::Sawtooth => (2.0 * phase - 1.0) as f32,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterKind {
    Lowpass,
    Highpass,
    Bandpass,
}

#[derive(Debug, Clone, Copy)]
enum Automation {
    Set { value: f32, time: f64 },
    ExpRamp { value: f32, time: f64 },
}

impl Automation {
    fn time(&self) -> f64 {
        match *self {
            Self::Set { time, .. } | Self::ExpRamp { time, .. } => time,
        }
    }
}

/// A node parameter: a base value, a timeline of automation events, and
/// any number of modulating nodes whose output is added on top.
#[derive(Debug, Clone)]
struct Param {
    value: f32,
    events: Vec<Automation>,
    modulators: Vec<NodeId>,
}

impl Param {
    fn new(value: f32) -> Self {
        Self {
            value,
            events: Vec::new(),
            modulators: Vec::new(),
        }
    }

    fn push(&mut self, event: Automation) {
        let at = self
            .events
            .iter()
            .position(|e| e.time() > event.time())
            .unwrap_or(self.events.len());
        self.events.insert(at, event);
    }

    /// Automated value at time `t`, before modulation.
    fn value_at(&self, t: f64) -> f32 {
        let mut value = self.value;
        let mut anchor = (0.0_f64, self.value);

        for event in &self.events {
            match *event {
                Automation::Set { value: v, time } => {
                    if time > t {
                        break;
                    }
                    value = v;
                    anchor = (time, v);
                }
                Automation::ExpRamp { value: target, time } => {
                    if time <= t {
                        value = target;
                        anchor = (time, target);
                        continue;
                    }
                    let (t0, v0) = anchor;
                    if t > t0 && v0 > 0.0 && target > 0.0 && time > t0 {
                        let frac = (t - t0) / (time - t0);
                        value = v0 * (target / v0).powf(frac as f32);
                    }
                    break;
                }
            }
        }
        value
    }
}

/// Direct-form-I biquad with RBJ cookbook coefficients.
#[derive(Debug, Clone)]
struct Biquad {
    b0: f32,
    b1: f32,
    b2: f32,
    a1: f32,
    a2: f32,
    x1: f32,
    x2: f32,
    y1: f32,
    y2: f32,
}

impl Biquad {
    fn new(kind: FilterKind, frequency: f32, q: f32, sample_rate: f64) -> Self {
        let nyquist = sample_rate * 0.49;
        let f0 = (frequency as f64).clamp(1.0, nyquist);
        let q = (q as f64).max(1e-4);
        let w0 = 2.0 * PI * f0 / sample_rate;
        let (sin, cos) = w0.sin_cos();
        let alpha = sin / (2.0 * q);

        let (b0, b1, b2) = match kind {
            FilterKind::Lowpass => ((1.0 - cos) / 2.0, 1.0 - cos, (1.0 - cos) / 2.0),
            FilterKind::Highpass => ((1.0 + cos) / 2.0, -(1.0 + cos), (1.0 + cos) / 2.0),
            FilterKind::Bandpass => (alpha, 0.0, -alpha),
        };
        let a0 = 1.0 + alpha;
        let a1 = -2.0 * cos;
        let a2 = 1.0 - alpha;

        Self {
            b0: (b0 / a0) as f32,
            b1: (b1 / a0) as f32,
            b2: (b2 / a0) as f32,
            a1: (a1 / a0) as f32,
            a2: (a2 / a0) as f32,
            x1: 0.0,
            x2: 0.0,
            y1: 0.0,
            y2: 0.0,
        }
    }

    fn process(&mut self, x: f32) -> f32 {
        let y = self.b0 * x + self.b1 * self.x1 + self.b2 * self.x2
            - self.a1 * self.y1
            - self.a2 * self.y2;
        self.x2 = self.x1;
        self.x1 = x;
        self.y2 = self.y1;
        self.y1 = y;
        y
    }
}

#[derive(Debug, Clone)]
enum NodeKind {
    Oscillator {
        waveform: Waveform,
        frequency: Param,
        phase: f64,
    },
    Buffer {
        samples: Vec<f32>,
        looping: bool,
        position: usize,
    },
    Filter(Biquad),
    Gain(Param),
}

impl NodeKind {
    fn param(&self) -> Option<&Param> {
        match self {
            Self::Oscillator { frequency, .. } => Some(frequency),
            Self::Gain(gain) => Some(gain),
            _ => None,
        }
    }

    fn param_mut(&mut self) -> Option<&mut Param> {
        match self {
            Self::Oscillator { frequency, .. } => Some(frequency),
            Self::Gain(gain) => Some(gain),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
struct Node {
    kind: NodeKind,
    inputs: Vec<NodeId>,
    start: f64,
    stop: Option<f64>,
}

impl Node {
    fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            inputs: Vec::new(),
            start: f64::INFINITY,
            stop: None,
        }
    }

    fn sounding(&self, t: f64) -> bool {
        t >= self.start && self.stop.map_or(true, |s| t < s)
    }

    fn process(&mut self, input: f32, modulation: f32, t: f64, sample_rate: f64) -> f32 {
        let sounding = self.sounding(t);
        match &mut self.kind {
            NodeKind::Oscillator {
                waveform,
                frequency,
                phase,
            } => {
                if !sounding {
                    return 0.0;
                }
                let out = waveform.sample(*phase);
                let hz = (frequency.value_at(t) + modulation) as f64;
                *phase = (*phase + hz / sample_rate).rem_euclid(1.0);
                out
            }
            NodeKind::Buffer {
                samples,
                looping,
                position,
            } => {
                if !sounding || samples.is_empty() {
                    return 0.0;
                }
                if *position >= samples.len() {
                    if !*looping {
                        return 0.0;
                    }
                    *position = 0;
                }
                let out = samples[*position];
                *position += 1;
                out
            }
            NodeKind::Filter(biquad) => biquad.process(input),
            NodeKind::Gain(gain) => input * (gain.value_at(t) + modulation),
        }
    }
}

#[derive(Debug, Clone)]
struct Slot {
    generation: u32,
    node: Option<Node>,
}

/// A set of short-lived nodes released together once `end` has passed.
#[derive(Debug, Clone)]
struct Transient {
    nodes: Vec<NodeId>,
    end: f64,
}

/// The live signal graph. Output is whatever reaches the master node.
#[derive(Debug, Clone)]
pub struct SignalGraph {
    sample_rate: u32,
    frames: u64,
    slots: Vec<Slot>,
    free: Vec<u32>,
    transients: Vec<Transient>,
    master: NodeId,
}

impl SignalGraph {
    /// Create a graph with a unity-gain master node.
    pub fn new(sample_rate: u32) -> Self {
        let mut graph = Self {
            sample_rate: sample_rate.max(1),
            frames: 0,
            slots: Vec::new(),
            free: Vec::new(),
            transients: Vec::new(),
            master: NodeId {
                index: 0,
                generation: 0,
            },
        };
        graph.master = graph.add_gain(1.0);
        graph
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Seconds of audio rendered so far.
    pub fn current_time(&self) -> f64 {
        self.frames as f64 / self.sample_rate as f64
    }

    /// Samples rendered so far.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn master(&self) -> NodeId {
        self.master
    }

    fn insert(&mut self, node: Node) -> NodeId {
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.node = Some(node);
            return NodeId {
                index,
                generation: slot.generation,
            };
        }
        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            node: Some(node),
        });
        NodeId {
            index,
            generation: 0,
        }
    }

    fn node(&self, id: NodeId) -> Option<&Node> {
        let slot = self.slots.get(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.node.as_ref()
    }

    fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.node.as_mut()
    }

    /// Oscillator source. Silent until started.
    pub fn add_oscillator(&mut self, waveform: Waveform, frequency: f32) -> NodeId {
        self.insert(Node::new(NodeKind::Oscillator {
            waveform,
            frequency: Param::new(frequency),
            phase: 0.0,
        }))
    }

    /// Sample-buffer source. Silent until started.
    pub fn add_buffer(&mut self, samples: Vec<f32>, looping: bool) -> NodeId {
        self.insert(Node::new(NodeKind::Buffer {
            samples,
            looping,
            position: 0,
        }))
    }

    pub fn add_filter(&mut self, kind: FilterKind, frequency: f32, q: f32) -> NodeId {
        let biquad = Biquad::new(kind, frequency, q, self.sample_rate as f64);
        let mut node = Node::new(NodeKind::Filter(biquad));
        node.start = 0.0;
        self.insert(node)
    }

    pub fn add_gain(&mut self, gain: f32) -> NodeId {
        let mut node = Node::new(NodeKind::Gain(Param::new(gain)));
        node.start = 0.0;
        self.insert(node)
    }

    /// Route `from`'s output into `to`'s input.
    pub fn connect(&mut self, from: NodeId, to: NodeId) {
        if self.node(from).is_none() {
            return;
        }
        if let Some(node) = self.node_mut(to) {
            node.inputs.push(from);
        }
    }

    /// Add `from`'s output to `to`'s parameter (gain for gains, frequency
    /// for oscillators).
    pub fn connect_param(&mut self, from: NodeId, to: NodeId) {
        if self.node(from).is_none() {
            return;
        }
        if let Some(param) = self.node_mut(to).and_then(|n| n.kind.param_mut()) {
            param.modulators.push(from);
        }
    }

    /// Set a parameter's base value immediately, dropping its automation.
    pub fn set_value(&mut self, id: NodeId, value: f32) {
        if let Some(param) = self.node_mut(id).and_then(|n| n.kind.param_mut()) {
            param.value = value;
            param.events.clear();
        }
    }

    pub fn set_value_at(&mut self, id: NodeId, value: f32, time: f64) {
        if let Some(param) = self.node_mut(id).and_then(|n| n.kind.param_mut()) {
            param.push(Automation::Set { value, time });
        }
    }

    /// Ramp exponentially from the previous event's value to `value`,
    /// arriving at `time`. Both ends must be positive.
    pub fn exponential_ramp_to(&mut self, id: NodeId, value: f32, time: f64) {
        if let Some(param) = self.node_mut(id).and_then(|n| n.kind.param_mut()) {
            param.push(Automation::ExpRamp { value, time });
        }
    }

    /// Parameter value at the current time, before modulation.
    pub fn param_value(&self, id: NodeId) -> Option<f32> {
        let t = self.current_time();
        self.node(id)?.kind.param().map(|p| p.value_at(t))
    }

    pub fn start_at(&mut self, id: NodeId, time: f64) {
        if let Some(node) = self.node_mut(id) {
            node.start = time;
        }
    }

    pub fn stop_at(&mut self, id: NodeId, time: f64) {
        if let Some(node) = self.node_mut(id) {
            node.stop = Some(time);
        }
    }

    /// Stop and remove a node, disconnecting it everywhere. Idempotent.
    pub fn release(&mut self, id: NodeId) {
        if id == self.master {
            return;
        }
        let Some(slot) = self.slots.get_mut(id.index as usize) else {
            return;
        };
        if slot.generation != id.generation || slot.node.is_none() {
            return;
        }
        slot.node = None;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);

        for slot in &mut self.slots {
            if let Some(node) = slot.node.as_mut() {
                node.inputs.retain(|&i| i != id);
                if let Some(param) = node.kind.param_mut() {
                    param.modulators.retain(|&m| m != id);
                }
            }
        }
    }

    /// Release `nodes` automatically once `end` (seconds) has been rendered.
    pub fn release_at(&mut self, nodes: Vec<NodeId>, end: f64) {
        self.transients.push(Transient { nodes, end });
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.node(id).is_some()
    }

    /// Number of live nodes, master included.
    pub fn live_nodes(&self) -> usize {
        self.slots.iter().filter(|s| s.node.is_some()).count()
    }

    /// Render mono samples into `out`, advancing the graph clock.
    pub fn render(&mut self, out: &mut [f32]) {
        let rate = self.sample_rate as f64;
        let mut cache: Vec<Option<f32>> = vec![None; self.slots.len()];
        for sample in out.iter_mut() {
            let t = self.frames as f64 / rate;
            cache.iter_mut().for_each(|c| *c = None);
            *sample = self.eval(self.master, t, &mut cache);
            self.frames += 1;
        }
        self.collect_finished();
    }

    fn eval(&mut self, id: NodeId, t: f64, cache: &mut [Option<f32>]) -> f32 {
        if !self.contains(id) {
            return 0.0;
        }
        let idx = id.index as usize;
        if let Some(v) = cache[idx] {
            return v;
        }
        // Guards against cycles: a node reached again mid-evaluation reads 0.
        cache[idx] = Some(0.0);

        let mut input = 0.0;
        let mut k = 0;
        while let Some(src) = self.node(id).and_then(|n| n.inputs.get(k).copied()) {
            input += self.eval(src, t, cache);
            k += 1;
        }

        let mut modulation = 0.0;
        let mut k = 0;
        while let Some(src) = self
            .node(id)
            .and_then(|n| n.kind.param())
            .and_then(|p| p.modulators.get(k).copied())
        {
            modulation += self.eval(src, t, cache);
            k += 1;
        }

        let rate = self.sample_rate as f64;
        let out = match self.node_mut(id) {
            Some(node) => node.process(input, modulation, t, rate),
            None => 0.0,
        };
        cache[idx] = Some(out);
        out
    }

    fn collect_finished(&mut self) {
        let now = self.current_time();
        let (done, pending): (Vec<_>, Vec<_>) = std::mem::take(&mut self.transients)
            .into_iter()
            .partition(|tr| tr.end <= now);
        self.transients = pending;
        for transient in done {
            for id in transient.nodes {
                self.release(id);
            }
        }
    }
}
