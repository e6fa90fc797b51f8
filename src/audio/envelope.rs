/// Attack/decay/sustain/release times in seconds, sustain as a level in 0..=1.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EnvelopeSpec {
    pub attack: f32,
    pub decay: f32,
    pub sustain: f32,
    pub release: f32,
}

impl EnvelopeSpec {
    pub const fn new(attack: f32, decay: f32, sustain: f32, release: f32) -> Self {
        Self { attack, decay, sustain, release }
    }

    pub fn is_valid(&self) -> bool {
        [self.attack, self.decay, self.release].iter().all(|t| t.is_finite() && *t >= 0.0)
            && (0.0..=1.0).contains(&self.sustain)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Idle,
    Attack,
    Decay,
    Sustain,
    Release,
}

// below this the voice counts as silent
const SILENCE: f32 = 1.0e-4;

/// Gated ADSR envelope.
///
/// Attack is a linear ramp from wherever the level currently is, so a retrigger
/// while sounding never clicks. Decay and release approach their targets
/// exponentially, reaching ~98% of the way in the configured time.
/// `trigger` arms an automatic release after the gate length.
#[derive(Clone, Debug)]
pub struct Envelope {
    spec: EnvelopeSpec,
    sample_rate: f32,
    stage: Stage,
    level: f32,
    attack_step: f32,
    decay_coef: f32,
    release_coef: f32,
    gate_remaining: u64,
}

fn approach_coef(seconds: f32, sample_rate: f32) -> f32 {
    let samples = seconds * sample_rate / 4.0;
    if samples <= 1.0 { 0.0 } else { (-1.0 / samples).exp() }
}

impl Envelope {
    pub fn new(spec: EnvelopeSpec, sample_rate: u32) -> Self {
        let sample_rate = sample_rate as f32;
        Self {
            spec,
            sample_rate,
            stage: Stage::Idle,
            level: 0.0,
            attack_step: 0.0,
            decay_coef: approach_coef(spec.decay, sample_rate),
            release_coef: approach_coef(spec.release, sample_rate),
            gate_remaining: 0,
        }
    }

    /// Start the attack now and release after `gate` seconds.
    pub fn trigger(&mut self, gate: f64) {
        let attack_samples = (self.spec.attack * self.sample_rate).max(1.0);
        self.attack_step = (1.0 - self.level).max(0.0) / attack_samples;
        self.stage = Stage::Attack;
        self.gate_remaining = (gate.max(0.0) * self.sample_rate as f64).round() as u64;
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn level(&self) -> f32 {
        self.level
    }

    pub fn is_idle(&self) -> bool {
        self.stage == Stage::Idle
    }

    pub fn next(&mut self) -> f32 {
        if self.stage != Stage::Idle && self.stage != Stage::Release {
            if self.gate_remaining == 0 {
                self.stage = Stage::Release;
            } else {
                self.gate_remaining -= 1;
            }
        }

        match self.stage {
            Stage::Idle => {}
            Stage::Attack => {
                self.level += self.attack_step;
                if self.level >= 1.0 {
                    self.level = 1.0;
                    self.stage = Stage::Decay;
                }
            }
            Stage::Decay => {
                let target = self.spec.sustain;
                self.level = target + (self.level - target) * self.decay_coef;
                if (self.level - target).abs() < SILENCE {
                    self.level = target;
                    self.stage = Stage::Sustain;
                }
            }
            Stage::Sustain => self.level = self.spec.sustain,
            Stage::Release => {
                self.level *= self.release_coef;
                if self.level < SILENCE {
                    self.level = 0.0;
                    self.stage = Stage::Idle;
                }
            }
        }
        self.level
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SR: u32 = 1000;

    fn run(env: &mut Envelope, samples: usize) -> Vec<f32> {
        (0..samples).map(|_| env.next()).collect()
    }

    #[test]
    fn test_full_envelope() {
        let mut env = Envelope::new(EnvelopeSpec::new(0.1, 0.1, 0.5, 0.1), SR);
        assert!(env.is_idle());
        env.trigger(1.0);

        let attack = run(&mut env, 100);
        assert!((attack[99] - 1.0).abs() < 1e-3);
        assert!(attack.windows(2).all(|w| w[1] >= w[0]));

        run(&mut env, 400);
        assert_eq!(env.stage(), Stage::Sustain);
        assert!((env.level() - 0.5).abs() < 1e-3);

        // gate closes at 1s
        run(&mut env, 501);
        assert_eq!(env.stage(), Stage::Release);
        run(&mut env, 1000);
        assert!(env.is_idle());
        assert_eq!(env.level(), 0.0);
    }

    #[test]
    fn test_levels_stay_in_bounds() {
        let mut env = Envelope::new(EnvelopeSpec::new(0.01, 0.3, 0.8, 0.8), SR);
        env.trigger(0.2);
        while !env.is_idle() {
            let v = env.next();
            assert!((0.0..=1.0).contains(&v), "level {v} out of range");
        }
    }

    #[test]
    fn test_retrigger_starts_from_current_level() {
        let mut env = Envelope::new(EnvelopeSpec::new(0.1, 0.1, 0.5, 0.5), SR);
        env.trigger(0.05);
        run(&mut env, 80);
        let before = env.level();
        assert!(before > 0.0);
        env.trigger(0.5);
        let after = env.next();
        assert!(after >= before, "retrigger dropped from {before} to {after}");
    }

    #[test]
    fn test_short_gate_releases_during_attack() {
        let mut env = Envelope::new(EnvelopeSpec::new(0.5, 0.1, 0.5, 0.1), SR);
        env.trigger(0.01);
        run(&mut env, 20);
        assert_eq!(env.stage(), Stage::Release);
        assert!(env.level() < 0.1);
    }

    #[test]
    fn test_zero_times_are_valid() {
        let spec = EnvelopeSpec::new(0.0, 0.0, 0.0, 0.0);
        assert!(spec.is_valid());
        let mut env = Envelope::new(spec, SR);
        env.trigger(0.001);
        run(&mut env, 10);
        assert!(env.is_idle());
        assert!(!EnvelopeSpec::new(0.1, -1.0, 0.5, 0.1).is_valid());
        assert!(!EnvelopeSpec::new(0.1, 0.1, 1.5, 0.1).is_valid());
    }
}
