use std::f32::consts::PI;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FilterMode {
    LowPass,
    HighPass,
}

/// Topology-preserving state variable filter (12 dB/oct).
/// Cutoff can move every sample, which the bass filter envelope relies on.
#[derive(Clone, Debug)]
pub struct Svf {
    mode: FilterMode,
    q: f32,
    sample_rate: f32,
    ic1: f32,
    ic2: f32,
}

impl Svf {
    pub fn new(mode: FilterMode, q: f32, sample_rate: u32) -> Self {
        Self { mode, q: q.max(0.05), sample_rate: sample_rate as f32, ic1: 0.0, ic2: 0.0 }
    }

    pub fn reset(&mut self) {
        self.ic1 = 0.0;
        self.ic2 = 0.0;
    }

    pub fn process(&mut self, input: f32, cutoff: f32) -> f32 {
        // max/min rather than clamp: at very low rates the upper bound wins
        let cutoff = cutoff.max(10.0).min(self.sample_rate * 0.49);
        let g = (PI * cutoff / self.sample_rate).tan();
        let k = 1.0 / self.q;
        let a1 = 1.0 / (1.0 + g * (g + k));
        let a2 = g * a1;
        let a3 = g * a2;

        let v3 = input - self.ic2;
        let v1 = a1 * self.ic1 + a2 * v3;
        let v2 = self.ic2 + a2 * self.ic1 + a3 * v3;
        self.ic1 = 2.0 * v1 - self.ic1;
        self.ic2 = 2.0 * v2 - self.ic2;

        match self.mode {
            FilterMode::LowPass => v2,
            FilterMode::HighPass => input - k * v1 - v2,
        }
    }
}
