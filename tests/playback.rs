// End-to-end checks through the public Player API with a headless output
// that pulls engine blocks on demand.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use conductr::audio::{AudioOutput, Engine, StereoFrame};
use conductr::pipeline::render::render_frames;
use conductr::pipeline::wav::HEADER_LEN;
use conductr::timing::NoteValue;
use conductr::{Arrangement, BuiltinSynth, Config, Error, Event, Notification, Player, PlayerState, TrackId};

const SR: u32 = 8000;

#[derive(Clone, Default)]
struct Headless {
    engine: Arc<Mutex<Option<Engine>>>,
}

impl AudioOutput for Headless {
    fn open(&mut self) -> conductr::Result<u32> {
        Ok(SR)
    }

    fn run(&mut self, engine: Engine) -> conductr::Result<()> {
        *self.engine.lock().unwrap() = Some(engine);
        Ok(())
    }
}

impl Headless {
    // pull `seconds` of audio in 256-frame blocks
    fn pull(&self, seconds: f64) -> Vec<StereoFrame> {
        let mut guard = self.engine.lock().unwrap();
        let engine = guard.as_mut().expect("audio not started");
        let total = (seconds * SR as f64) as usize;
        let mut out = Vec::with_capacity(total);
        let mut block = [StereoFrame::zero(); 256];
        while out.len() < total {
            let n = (total - out.len()).min(block.len());
            engine.render_block(&mut block[..n]);
            out.extend_from_slice(&block[..n]);
        }
        out
    }
}

fn player() -> (Player, Headless) {
    let output = Headless::default();
    let config = Config { sample_rate: SR, ..Config::default() };
    let player = Player::new(Arc::new(BuiltinSynth), Box::new(output.clone()), config);
    (player, output)
}

fn four_tracks() -> Arrangement {
    let mut arr = Arrangement::default();
    for bar in 0..2 {
        arr.bass.push(Event::note(&format!("{bar}:0:0"), "C2", "4n"));
        arr.drums.push(Event::note(&format!("{bar}:0:0"), "kick", "8n"));
        arr.drums.push(Event::note(&format!("{bar}:1:0"), "snare", "16n"));
        arr.harmony.push(Event::chord(&format!("{bar}:0:0"), &["C4", "E4", "G4"], "1m"));
        arr.melody.push(Event::note(&format!("{bar}:2:0"), "G5", "8n"));
    }
    arr
}

fn triggers(rx: &crossbeam_channel::Receiver<Notification>, track: TrackId) -> usize {
    rx.try_iter().filter(|n| *n == Notification::TrackTriggered(track)).count()
}

#[test]
fn test_wav_export_length() {
    let (mut p, _) = player();
    p.load_arrangement(&four_tracks(), 2).unwrap();
    p.set_bpm(120.0);
    let bytes = p.render_to_wav().unwrap();

    // 2 bars at 120 bpm is 4 s, plus the 1.5 s tail
    let frames = 44_000;
    assert_eq!(render_frames(2, 120.0, SR), frames);
    assert_eq!(bytes.len(), HEADER_LEN + frames * 2 * 2);
    assert_eq!(u32::from_le_bytes([bytes[40], bytes[41], bytes[42], bytes[43]]) as usize, frames * 4);
}

#[test]
fn test_export_is_a_readable_wav() {
    let (mut p, _) = player();
    p.load_arrangement(&four_tracks(), 1).unwrap();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("take.wav");
    std::fs::write(&path, p.render_to_wav().unwrap()).unwrap();

    let reader = hound::WavReader::open(&path).unwrap();
    assert_eq!(reader.spec().channels, 2);
    assert_eq!(reader.spec().sample_rate, SR);
    assert_eq!(reader.len() as usize, render_frames(1, 120.0, SR) * 2);
}

#[test]
fn test_renders_are_deterministic() {
    let (mut p, _) = player();
    p.load_arrangement(&four_tracks(), 2).unwrap();
    let first = p.render_to_wav().unwrap();
    let second = p.render_to_wav().unwrap();
    assert_eq!(first, second);
    assert!(first[HEADER_LEN..].iter().any(|b| *b != 0));
}

#[test]
fn test_background_render_matches_foreground() {
    let (mut p, _) = player();
    p.load_arrangement(&four_tracks(), 1).unwrap();
    let rx = p.spawn_render().unwrap();
    let background = rx.recv().unwrap().unwrap();
    assert_eq!(background, p.render_to_wav().unwrap());
}

#[test]
fn test_live_playback_reaches_every_track() {
    let (mut p, out) = player();
    let rx = p.notifications();
    p.load_arrangement(&four_tracks(), 2).unwrap();
    p.play().unwrap();
    assert_eq!(p.state(), PlayerState::Playing);

    // the melody enters on beat 3, one second in
    let audio = out.pull(1.5);
    assert!(audio.iter().any(|f| f.left.abs() > 1e-3));

    let got: Vec<Notification> = rx.try_iter().collect();
    for track in TrackId::ALL {
        assert!(got.contains(&Notification::TrackTriggered(track)), "{track} never fired");
    }
}

#[test]
fn test_stop_is_idempotent_and_silences_triggers() {
    let (mut p, out) = player();
    let rx = p.notifications();
    p.load_arrangement(&four_tracks(), 2).unwrap();
    p.play().unwrap();
    out.pull(0.25);
    p.stop();
    p.stop();
    assert_eq!(p.state(), PlayerState::Loaded);

    let stops = rx.try_iter().filter(|n| *n == Notification::PlayStateChanged(false)).count();
    assert_eq!(stops, 1);

    out.pull(2.0);
    assert_eq!(rx.try_iter().filter(|n| matches!(n, Notification::TrackTriggered(_))).count(), 0);
}

#[test]
fn test_loop_fires_last_sixteenth_every_pass() {
    let (mut p, out) = player();
    let rx = p.notifications();
    let mut arr = Arrangement::default();
    arr.melody.push(Event::note("1:3:3", "A4", "16n"));
    p.load_arrangement(&arr, 2).unwrap();
    assert!(p.toggle_loop());
    p.play().unwrap();

    // 1:3:3 is 3.875 s into a 4 s loop at 120 bpm
    out.pull(9.0);
    assert_eq!(triggers(&rx, TrackId::Melody), 2);
}

#[test]
fn test_without_loop_playback_runs_past_the_end() {
    let (mut p, out) = player();
    let rx = p.notifications();
    let mut arr = Arrangement::default();
    arr.melody.push(Event::note("0:0:0", "A4", "16n"));
    p.load_arrangement(&arr, 1).unwrap();
    p.play().unwrap();
    out.pull(5.0);
    assert_eq!(triggers(&rx, TrackId::Melody), 1);
}

#[test]
fn test_mute_skips_triggers_and_volume_round_trips() {
    let (mut p, out) = player();
    let rx = p.notifications();
    p.load_arrangement(&four_tracks(), 2).unwrap();

    assert_eq!(p.set_volume(TrackId::Bass, -12.0), -12.0);
    assert_eq!(p.track_state(TrackId::Bass).volume_db, -12.0);
    assert_eq!(p.set_volume(TrackId::Bass, -100.0), -30.0);
    assert_eq!(p.set_volume(TrackId::Bass, 40.0), 6.0);

    assert!(p.toggle_mute(TrackId::Melody));
    p.play().unwrap();
    out.pull(1.5);
    assert_eq!(triggers(&rx, TrackId::Melody), 0);

    assert!(!p.toggle_mute(TrackId::Melody));
    assert!(!p.track_state(TrackId::Melody).muted);
}

#[test]
fn test_missing_melody_is_rejected() {
    let (mut p, _) = player();
    let err = p.load_json(r#"{"bass": [], "drums": [], "harmony": []}"#, 4).unwrap_err();
    assert!(matches!(err, Error::InvalidArrangement(_)));
    assert_eq!(p.state(), PlayerState::Idle);
}

#[test]
fn test_unknown_drum_is_tolerated() {
    let (mut p, _) = player();
    let json = r#"{
        "bass": [],
        "drums": [
            {"time": "0:0:0", "note": "cowbell", "duration": "8n"},
            {"time": "0:1:0", "note": "snare", "duration": "16n"}
        ],
        "harmony": [],
        "melody": []
    }"#;
    p.load_json(json, 1).unwrap();
    let bytes = p.render_to_wav().unwrap();
    assert_eq!(bytes.len(), HEADER_LEN + render_frames(1, 120.0, SR) * 4);
}

#[test]
fn test_dotted_quarter_is_one_and_a_half_quarters() {
    let dotted: NoteValue = "4n.".parse().unwrap();
    assert_eq!(dotted.ticks() * 2, NoteValue::QUARTER.ticks() * 3);
    assert!((dotted.to_seconds(120.0) - 0.75).abs() < 1e-9);
}

#[test]
fn test_reload_while_playing_stops_first() {
    let (mut p, out) = player();
    let rx = p.notifications();
    p.load_arrangement(&four_tracks(), 2).unwrap();
    p.play().unwrap();
    out.pull(0.1);
    p.load_arrangement(&Arrangement::default(), 1).unwrap();
    assert_eq!(p.state(), PlayerState::Loaded);
    assert!(rx.try_iter().any(|n| n == Notification::PlayStateChanged(false)));

    out.pull(1.0);
    assert_eq!(rx.try_iter().filter(|n| matches!(n, Notification::TrackTriggered(_))).count(), 0);
}

#[test]
fn test_load_survives_a_flooded_command_queue() {
    let (mut p, out) = player();
    let rx = p.notifications();
    p.load_arrangement(&four_tracks(), 2).unwrap();
    p.play().unwrap();

    // an audio thread that keeps pulling small blocks
    let done = Arc::new(AtomicBool::new(false));
    let puller = {
        let (out, done) = (out.clone(), Arc::clone(&done));
        thread::spawn(move || {
            while !done.load(Ordering::Relaxed) {
                out.pull(0.01);
            }
        })
    };

    // far more commands than the queue holds, then a reload
    for i in 0..1000 {
        p.set_bpm(if i % 2 == 0 { 90.0 } else { 150.0 });
    }
    p.load_arrangement(&Arrangement::default(), 1).unwrap();

    done.store(true, Ordering::Relaxed);
    puller.join().unwrap();
    rx.try_iter().for_each(drop);

    out.pull(4.0);
    assert_eq!(rx.try_iter().filter(|n| matches!(n, Notification::TrackTriggered(_))).count(), 0);
}
