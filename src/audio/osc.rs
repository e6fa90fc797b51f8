// Oscillators and noise sources. Phases are normalized to 0..1.

use std::f32::consts::TAU;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Waveform {
    Sine,
    Triangle,
    Sawtooth,
    Square,
}

// polyBLEP residual, smooths the discontinuity of saw/square edges
fn poly_blep(t: f32, dt: f32) -> f32 {
    if dt <= 0.0 {
        0.0
    } else if t < dt {
        let t = t / dt;
        t + t - t * t - 1.0
    } else if t > 1.0 - dt {
        let t = (t - 1.0) / dt;
        t * t + t + t + 1.0
    } else {
        0.0
    }
}

impl Waveform {
    /// One sample at `phase` for a phase increment of `dt` per sample.
    pub fn sample(self, phase: f32, dt: f32) -> f32 {
        match self {
            Waveform::Sine => (TAU * phase).sin(),
            Waveform::Triangle => 1.0 - 4.0 * (phase - 0.5).abs(),
            Waveform::Sawtooth => 2.0 * phase - 1.0 - poly_blep(phase, dt),
            Waveform::Square => {
                let naive = if phase < 0.5 { 1.0 } else { -1.0 };
                naive + poly_blep(phase, dt) - poly_blep((phase + 0.5).fract(), dt)
            }
        }
    }
}

/// Phase accumulator driving a [`Waveform`].
#[derive(Clone, Debug)]
pub struct Oscillator {
    pub waveform: Waveform,
    phase: f32,
}

impl Oscillator {
    pub fn new(waveform: Waveform) -> Self {
        Self { waveform, phase: 0.0 }
    }

    pub fn reset(&mut self) {
        self.phase = 0.0;
    }

    /// Next sample at `freq` Hz, offset by `phase_mod` cycles (for FM/PM).
    pub fn next(&mut self, freq: f32, sample_rate: f32, phase_mod: f32) -> f32 {
        let dt = (freq / sample_rate).abs();
        let phase = (self.phase + phase_mod).rem_euclid(1.0);
        let out = self.waveform.sample(phase, dt);
        self.phase = (self.phase + dt).fract();
        out
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NoiseColor {
    White,
    Pink,
}

/// Seeded noise. The same seed always yields the same stream, which keeps
/// offline renders reproducible.
#[derive(Clone, Debug)]
pub struct Noise {
    color: NoiseColor,
    seed: u64,
    state: u64,
    pink: [f32; 3],
}

impl Noise {
    pub fn new(color: NoiseColor, seed: u64) -> Self {
        Self { color, seed, state: seed, pink: [0.0; 3] }
    }

    pub fn reset(&mut self) {
        self.state = self.seed;
        self.pink = [0.0; 3];
    }

    fn next_white(&mut self) -> f32 {
        self.state = self
            .state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        ((self.state >> 33) as f32 / (u32::MAX >> 1) as f32) * 2.0 - 1.0
    }

    pub fn next(&mut self) -> f32 {
        let white = self.next_white();
        match self.color {
            NoiseColor::White => white,
            NoiseColor::Pink => {
                // Paul Kellet's economy pinking filter
                let b = &mut self.pink;
                b[0] = 0.99765 * b[0] + white * 0.0990460;
                b[1] = 0.96300 * b[1] + white * 0.2965164;
                b[2] = 0.57000 * b[2] + white * 1.0526913;
                (b[0] + b[1] + b[2] + white * 0.1848) * 0.25
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_waveforms_in_range() {
        for wf in [Waveform::Sine, Waveform::Triangle, Waveform::Sawtooth, Waveform::Square] {
            let mut osc = Oscillator::new(wf);
            for _ in 0..10_000 {
                let s = osc.next(440.0, 44100.0, 0.0);
                assert!(s.abs() <= 1.01, "{wf:?} produced {s}");
            }
        }
    }

    #[test]
    fn test_sine_period() {
        let mut osc = Oscillator::new(Waveform::Sine);
        // 100 Hz at 1 kHz: 10 samples per period
        let first: Vec<f32> = (0..10).map(|_| osc.next(100.0, 1000.0, 0.0)).collect();
        let second: Vec<f32> = (0..10).map(|_| osc.next(100.0, 1000.0, 0.0)).collect();
        for (a, b) in first.iter().zip(&second) {
            assert!((a - b).abs() < 1e-4);
        }
        assert!(first[0].abs() < 1e-6);
    }

    #[test]
    fn test_noise_is_deterministic() {
        let mut a = Noise::new(NoiseColor::White, 7);
        let mut b = Noise::new(NoiseColor::White, 7);
        for _ in 0..1000 {
            assert_eq!(a.next(), b.next());
        }
        let mut c = Noise::new(NoiseColor::White, 8);
        let differs = (0..100).any(|_| a.next() != c.next());
        assert!(differs);
    }

    #[test]
    fn test_noise_reset_replays() {
        let mut n = Noise::new(NoiseColor::Pink, 3);
        let first: Vec<f32> = (0..64).map(|_| n.next()).collect();
        n.reset();
        let again: Vec<f32> = (0..64).map(|_| n.next()).collect();
        assert_eq!(first, again);
    }

    #[test]
    fn test_white_noise_range() {
        let mut n = Noise::new(NoiseColor::White, 1);
        for _ in 0..10_000 {
            let s = n.next();
            assert!((-1.0..=1.0).contains(&s));
        }
    }
}
