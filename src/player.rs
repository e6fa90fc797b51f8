// The playback controller: owns transport state and the mixer, talks to the
// real-time engine over a channel, and runs offline renders on request.

use std::sync::Arc;
use std::thread;

use crossbeam_channel::{Receiver, Sender};
use log::{debug, info, warn};

use crate::arrangement::{Arrangement, Sequence};
use crate::audio::{AudioOutput, Engine, InstrumentBank, Mixer, SynthesisBackend};
use crate::audio_api::EngineCommand;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::pipeline::render::{RenderedBuffer, render_offline};
use crate::pipeline::sequencer::{Schedules, Sequencer};
use crate::pipeline::wav;
use crate::pitch::note_to_freq;
use crate::shared::{Notification, TrackId, TrackState};
use crate::timing::clamp_bpm;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlayerState {
    /// No arrangement loaded.
    Idle,
    /// Arrangement bound, transport stopped at the origin.
    Loaded,
    Playing,
}

struct LiveAudio {
    commands: Sender<EngineCommand>,
    sample_rate: u32,
}

/// `<style>-<key>-<bpm>bpm.wav`
pub fn export_file_name(style: &str, key: &str, bpm: f64) -> String {
    let clean = |s: &str| {
        let s: String = s
            .trim()
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '#' { c.to_ascii_lowercase() } else { '-' })
            .collect();
        s.trim_matches('-').to_string()
    };
    format!("{}-{}-{}bpm.wav", clean(style), clean(key), bpm.round() as i64)
}

pub struct Player {
    backend: Arc<dyn SynthesisBackend>,
    output: Box<dyn AudioOutput>,
    audio: Option<LiveAudio>,
    mixer: Arc<Mixer>,
    sequence: Option<Arc<Sequence>>,
    state: PlayerState,
    looping: bool,
    bpm: f64,
    config: Config,
    notify_tx: Sender<Notification>,
    notify_rx: Receiver<Notification>,
}

impl Player {
    pub fn new(backend: Arc<dyn SynthesisBackend>, output: Box<dyn AudioOutput>, config: Config) -> Self {
        let config = config.sanitized();
        let (notify_tx, notify_rx) = crossbeam_channel::bounded(1024);
        Self {
            backend,
            output,
            audio: None,
            mixer: Arc::new(Mixer::new()),
            sequence: None,
            state: PlayerState::Idle,
            looping: config.looping,
            bpm: config.bpm,
            config,
            notify_tx,
            notify_rx,
        }
    }

    /// Everything the player and its engine report. Clone freely; each
    /// notification goes to exactly one receiver.
    pub fn notifications(&self) -> Receiver<Notification> {
        self.notify_rx.clone()
    }

    fn notify(&self, n: Notification) {
        let _ = self.notify_tx.try_send(n);
    }

    // Blocks while the queue is full so Load and Stop are never lost; the
    // audio callback drains it every block.
    fn send(&self, cmd: EngineCommand) {
        if let Some(audio) = &self.audio {
            if let Err(e) = audio.commands.send(cmd) {
                warn!("audio engine gone, command dropped: {e}");
            }
        }
    }

    // first play or preview: open the device and start the engine
    fn ensure_audio(&mut self) -> Result<()> {
        if self.audio.is_some() {
            return Ok(());
        }
        let sample_rate = self.output.open()?;
        let bank = InstrumentBank::create(self.backend.as_ref(), sample_rate)?;
        let mut sequencer = Sequencer::new(bank, sample_rate, self.bpm);
        sequencer.set_looping(self.looping);
        if let Some(seq) = &self.sequence {
            sequencer.install(Schedules::from_sequence(seq));
        }

        let (tx, rx) = crossbeam_channel::bounded(256);
        let engine = Engine::new(
            sequencer,
            rx,
            self.notify_tx.clone(),
            Arc::clone(&self.mixer),
            sample_rate,
            self.config.position_interval_ms,
        );
        self.output.run(engine)?;
        info!("live audio started at {sample_rate} Hz");
        self.audio = Some(LiveAudio { commands: tx, sample_rate });
        Ok(())
    }

    /// Parse and load generator output in one step. A structurally invalid
    /// arrangement is rejected before anything else happens.
    pub fn load_json(&mut self, json: &str, total_bars: u32) -> Result<()> {
        let arrangement = Arrangement::from_json(json)?;
        self.load_arrangement(&arrangement, total_bars)
    }

    /// Replace the current arrangement. If playing, stops first; nothing from
    /// the old arrangement fires after this.
    pub fn load_arrangement(&mut self, arrangement: &Arrangement, total_bars: u32) -> Result<()> {
        if self.state == PlayerState::Playing {
            self.stop();
        }
        let sequence = Arc::new(arrangement.prepare(total_bars));
        self.send(EngineCommand::Load(Box::new(Schedules::from_sequence(&sequence))));
        info!(
            "arrangement loaded: {} events over {} bars",
            arrangement.event_count(),
            sequence.total_bars
        );
        self.sequence = Some(sequence);
        self.state = PlayerState::Loaded;
        self.notify(Notification::ArrangementLoaded);
        Ok(())
    }

    /// Start playback from the origin. Opens audio on first use; a failure
    /// there is returned as-is and not retried.
    pub fn play(&mut self) -> Result<()> {
        if self.sequence.is_none() {
            return Err(Error::NoArrangement);
        }
        if self.state == PlayerState::Playing {
            return Ok(());
        }
        self.ensure_audio()?;
        self.send(EngineCommand::Play);
        self.state = PlayerState::Playing;
        self.notify(Notification::PlayStateChanged(true));
        Ok(())
    }

    /// Halt and rewind. Safe to call in any state, any number of times.
    pub fn stop(&mut self) {
        self.send(EngineCommand::Stop);
        if self.state == PlayerState::Playing {
            self.state = PlayerState::Loaded;
            self.notify(Notification::PlayStateChanged(false));
        }
    }

    pub fn toggle_loop(&mut self) -> bool {
        self.looping = !self.looping;
        self.send(EngineCommand::SetLooping(self.looping));
        self.notify(Notification::LoopChanged(self.looping));
        self.looping
    }

    /// Clamped to 60..=200; returns the applied value.
    pub fn set_bpm(&mut self, bpm: f64) -> f64 {
        self.bpm = clamp_bpm(bpm);
        self.send(EngineCommand::SetBpm(self.bpm));
        self.bpm
    }

    pub fn set_volume(&mut self, track: TrackId, db: f32) -> f32 {
        self.mixer.set_volume(track, db)
    }

    pub fn toggle_mute(&mut self, track: TrackId) -> bool {
        let muted = self.mixer.toggle_mute(track);
        self.notify(Notification::MuteChanged(track, muted));
        muted
    }

    pub fn track_state(&self, track: TrackId) -> TrackState {
        self.mixer.track_state(track)
    }

    pub fn state(&self) -> PlayerState {
        self.state
    }

    pub fn is_playing(&self) -> bool {
        self.state == PlayerState::Playing
    }

    pub fn is_looping(&self) -> bool {
        self.looping
    }

    pub fn bpm(&self) -> f64 {
        self.bpm
    }

    pub fn has_arrangement(&self) -> bool {
        self.sequence.is_some()
    }

    pub fn total_bars(&self) -> Option<u32> {
        self.sequence.as_ref().map(|s| s.total_bars)
    }

    /// Live output rate, once audio has been opened.
    pub fn sample_rate(&self) -> Option<u32> {
        self.audio.as_ref().map(|a| a.sample_rate)
    }

    /// Sound one note on the live melody voice (keyboard preview).
    pub fn preview_note(&mut self, note: &str) -> Result<()> {
        let Some(freq) = note_to_freq(note) else {
            warn!("preview: not a note name: {note:?}");
            return Ok(());
        };
        self.ensure_audio()?;
        self.send(EngineCommand::Preview(freq));
        Ok(())
    }

    /// Current settings, for saving on quit.
    pub fn config(&self) -> Config {
        Config {
            bpm: self.bpm,
            looping: self.looping,
            total_bars: self.total_bars().unwrap_or(self.config.total_bars),
            ..self.config.clone()
        }
    }

    /// Offline render of the loaded arrangement at the current bpm.
    pub fn render(&self) -> Result<RenderedBuffer> {
        let sequence = self.sequence.as_ref().ok_or(Error::NoArrangement)?;
        render_offline(sequence, self.bpm, self.backend.as_ref(), self.config.sample_rate)
    }

    pub fn render_to_wav(&self) -> Result<Vec<u8>> {
        wav::encode(&self.render()?)
    }

    /// Same as [`Player::render_to_wav`] on a worker thread. Live playback is
    /// untouched; the single result arrives on the returned channel.
    pub fn spawn_render(&self) -> Result<Receiver<Result<Vec<u8>>>> {
        let sequence = Arc::clone(self.sequence.as_ref().ok_or(Error::NoArrangement)?);
        let backend = Arc::clone(&self.backend);
        let bpm = self.bpm;
        let sample_rate = self.config.sample_rate;
        let (tx, rx) = crossbeam_channel::bounded(1);

        thread::Builder::new()
            .name("conductr-render".into())
            .spawn(move || {
                let result =
                    render_offline(&sequence, bpm, backend.as_ref(), sample_rate).and_then(|b| wav::encode(&b));
                debug!("background render finished: ok={}", result.is_ok());
                let _ = tx.send(result);
            })?;
        Ok(rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::BuiltinSynth;

    struct NoDevice;

    impl AudioOutput for NoDevice {
        fn open(&mut self) -> Result<u32> {
            Err(Error::AudioInit("blocked".into()))
        }

        fn run(&mut self, _engine: Engine) -> Result<()> {
            Err(Error::AudioInit("blocked".into()))
        }
    }

    fn player() -> Player {
        let config = Config { sample_rate: 8000, ..Config::default() };
        Player::new(Arc::new(BuiltinSynth), Box::new(NoDevice), config)
    }

    #[test]
    fn test_play_without_arrangement() {
        let mut p = player();
        assert!(matches!(p.play(), Err(Error::NoArrangement)));
        assert!(matches!(p.render(), Err(Error::NoArrangement)));
        assert!(p.spawn_render().is_err());
        assert_eq!(p.state(), PlayerState::Idle);
    }

    #[test]
    fn test_audio_failure_is_surfaced() {
        let mut p = player();
        p.load_arrangement(&Arrangement::default(), 1).unwrap();
        assert!(matches!(p.play(), Err(Error::AudioInit(_))));
        assert_eq!(p.state(), PlayerState::Loaded);
    }

    #[test]
    fn test_invalid_json_is_rejected_before_load() {
        let mut p = player();
        let err = p.load_json(r#"{"bass": [], "drums": [], "harmony": []}"#, 4).unwrap_err();
        assert!(matches!(err, Error::InvalidArrangement(_)));
        assert!(!p.has_arrangement());
    }

    #[test]
    fn test_controls_without_audio() {
        let mut p = player();
        let rx = p.notifications();
        assert!(p.toggle_loop());
        assert_eq!(p.set_bpm(20.0), 60.0);
        assert!(p.toggle_mute(TrackId::Drums));
        p.stop();
        p.stop();
        let got: Vec<Notification> = rx.try_iter().collect();
        assert_eq!(
            got,
            vec![Notification::LoopChanged(true), Notification::MuteChanged(TrackId::Drums, true)]
        );
    }

    #[test]
    fn test_export_file_name() {
        assert_eq!(export_file_name("Lo-Fi Hip Hop", "C minor", 85.0), "lo-fi-hip-hop-c-minor-85bpm.wav");
        assert_eq!(export_file_name("jazz", "F#", 120.4), "jazz-f#-120bpm.wav");
    }

    #[test]
    fn test_config_snapshot() {
        let mut p = player();
        p.set_bpm(140.0);
        p.toggle_loop();
        p.load_arrangement(&Arrangement::default(), 8).unwrap();
        let cfg = p.config();
        assert_eq!(cfg.bpm, 140.0);
        assert!(cfg.looping);
        assert_eq!(cfg.total_bars, 8);
        assert_eq!(cfg.sample_rate, 8000);
    }
}
