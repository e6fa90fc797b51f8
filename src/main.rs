mod tui;

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, bail};
use crossbeam_channel::Receiver;
use crossterm::terminal;
use log::{error, info};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;

use conductr::audio::CpalOutput;
use conductr::pipeline::{persistence, wav};
use conductr::progression::Progression;
use conductr::{Arrangement, BuiltinSynth, Player, export_file_name};

use tui::input::InputEvent;
use tui::mode::{DisplayState, TuiState};

const USAGE: &str = "usage: conductr <arrangement.json> [--bars N] [--chords \"C G Am F\"] [--bpm N] \
                     [--render [OUT.wav]] [--style S] [--key K] [-v]";

// note sounded by the preview key
const PREVIEW_NOTE: &str = "A4";

#[derive(Debug, Default, PartialEq)]
struct Args {
    arrangement: PathBuf,
    bars: Option<u32>,
    chords: Option<String>,
    bpm: Option<f64>,
    // Some(None): render to the generated export name
    render: Option<Option<PathBuf>>,
    style: String,
    key: String,
    verbose: bool,
}

fn parse_args(args: &[String]) -> anyhow::Result<Args> {
    let mut out = Args { style: "arrangement".into(), key: "c".into(), ..Args::default() };
    let mut arrangement = None;
    let mut i = 0;

    while i < args.len() {
        let value = |i: usize| args.get(i + 1).with_context(|| format!("{} needs a value", args[i]));
        match args[i].as_str() {
            "-v" | "--verbose" => out.verbose = true,
            "--bars" => {
                out.bars = Some(value(i)?.parse().context("--bars expects a whole number")?);
                i += 1;
            }
            "--bpm" => {
                out.bpm = Some(value(i)?.parse().context("--bpm expects a number")?);
                i += 1;
            }
            "--chords" => {
                out.chords = Some(value(i)?.clone());
                i += 1;
            }
            "--style" => {
                out.style = value(i)?.clone();
                i += 1;
            }
            "--key" => {
                out.key = value(i)?.clone();
                i += 1;
            }
            "--render" => match args.get(i + 1) {
                Some(path) if !path.starts_with('-') && path.ends_with(".wav") => {
                    out.render = Some(Some(PathBuf::from(path)));
                    i += 1;
                }
                _ => out.render = Some(None),
            },
            other if other.starts_with('-') => bail!("unknown option {other}\n{USAGE}"),
            other => {
                if arrangement.replace(PathBuf::from(other)).is_some() {
                    bail!("more than one arrangement given\n{USAGE}");
                }
            }
        }
        i += 1;
    }

    out.arrangement = arrangement.with_context(|| USAGE.to_string())?;
    Ok(out)
}

// log to <config dir>/conductr/conductr.log; the terminal belongs to the tui
fn init_logging(verbose: bool) {
    use simplelog::{Config, LevelFilter, WriteLogger};

    let level = if verbose { LevelFilter::Debug } else { LevelFilter::Warn };
    let log_path = dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("conductr")
        .join("conductr.log");
    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    let file = File::create(&log_path).or_else(|_| File::create(std::env::temp_dir().join("conductr.log")));
    match file {
        Ok(file) => {
            let _ = WriteLogger::init(level, Config::default(), file);
        }
        Err(e) => eprintln!("logging disabled: {e}"),
    }
}

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    let argv: Vec<String> = std::env::args().skip(1).collect();
    let args = parse_args(&argv)?;
    init_logging(args.verbose);

    let project_dir = std::env::current_dir()?;
    let mut config = persistence::load_config(&project_dir).unwrap_or_default();
    if let Some(bpm) = args.bpm {
        config.bpm = bpm;
    }

    let json = std::fs::read_to_string(&args.arrangement)
        .with_context(|| format!("could not read {}", args.arrangement.display()))?;
    let arrangement = Arrangement::from_json(&json)?;

    // one bar per chord unless --bars says otherwise
    let progression = args.chords.as_deref().map(|c| Progression::from_chords(c.split_whitespace()));
    let bars = args
        .bars
        .or_else(|| progression.as_ref().map(Progression::total_bars).filter(|b| *b > 0))
        .unwrap_or(config.total_bars);

    let mut player = Player::new(Arc::new(BuiltinSynth), Box::new(CpalOutput::new()), config);
    player.load_arrangement(&arrangement, bars)?;

    if let Some(out) = &args.render {
        let path = out
            .clone()
            .unwrap_or_else(|| project_dir.join(export_file_name(&args.style, &args.key, player.bpm())));
        let buffer = player.render()?;
        wav::write_wav(&path, &buffer).with_context(|| format!("could not write {}", path.display()))?;
        println!("wrote {}", path.display());
        return Ok(());
    }

    let chords = progression.map(|p| p.chords().to_vec()).unwrap_or_default();
    run_tui(&mut player, &project_dir, &args, &chords)
}

fn run_tui(player: &mut Player, project_dir: &Path, args: &Args, chords: &[String]) -> anyhow::Result<()> {
    terminal::enable_raw_mode()?;
    // Enable keyboard enhancement for real press/release detection.
    // Falls back gracefully if the terminal doesn't support it.
    let _ = crossterm::execute!(
        std::io::stdout(),
        crossterm::event::PushKeyboardEnhancementFlags(
            crossterm::event::KeyboardEnhancementFlags::REPORT_EVENT_TYPES
        )
    );
    let _guard = RawModeGuard; // auto drops when out of scope

    let backend = CrosstermBackend::new(std::io::stdout());
    let mut term = Terminal::new(backend)?;
    term.clear()?;

    let notifications = player.notifications();
    let tick_rate = Duration::from_millis(16); // ~60fps
    let mut tui_state = TuiState::default();
    let mut export: Option<Receiver<conductr::Result<Vec<u8>>>> = None;

    loop {
        let now = Instant::now();
        for n in notifications.try_iter() {
            tui_state.apply(&n, now);
        }

        let ds = DisplayState::capture(player, &tui_state, chords, now);
        term.draw(|frame| {
            tui::view::render(frame, frame.area(), &ds);
        })?;

        for event in tui::input::poll_input(tick_rate)? {
            let track = tui_state.selected;
            match event {
                InputEvent::Quit => {
                    player.stop();
                    // save before quitting
                    if let Err(e) = persistence::save_config(project_dir, &player.config()) {
                        error!("could not save config: {e}");
                    }
                    return Ok(());
                }
                InputEvent::TogglePlay => {
                    let result = if player.is_playing() {
                        player.stop();
                        Ok(())
                    } else {
                        player.play()
                    };
                    if let Err(e) = result {
                        error!("play failed: {e}");
                        tui_state.status = e.to_string();
                    }
                }
                InputEvent::ToggleLoop => {
                    player.toggle_loop();
                }
                InputEvent::SelectTrack(t) => tui_state.selected = t,
                InputEvent::ToggleMute => {
                    player.toggle_mute(track);
                }
                InputEvent::VolumeStep(step) => {
                    let db = player.set_volume(track, player.track_state(track).volume_db + step);
                    tui_state.status = format!("{} {db:+.0} dB", track.label());
                }
                InputEvent::BpmStep(step) => {
                    player.set_bpm(player.bpm() + step);
                }
                InputEvent::Export if export.is_none() => match player.spawn_render() {
                    Ok(rx) => {
                        tui_state.rendering = true;
                        export = Some(rx);
                    }
                    Err(e) => tui_state.status = e.to_string(),
                },
                InputEvent::Export => {}
                InputEvent::Preview => {
                    if let Err(e) = player.preview_note(PREVIEW_NOTE) {
                        tui_state.status = e.to_string();
                    }
                }
            }
        }

        // a finished background render lands in the project dir
        if let Some(result) = export.as_ref().and_then(|rx| rx.try_recv().ok()) {
            export = None;
            tui_state.rendering = false;
            let path = project_dir.join(export_file_name(&args.style, &args.key, player.bpm()));
            tui_state.status = match result.map(|bytes| std::fs::write(&path, bytes)) {
                Ok(Ok(())) => {
                    info!("exported {}", path.display());
                    format!("exported {}", path.display())
                }
                Ok(Err(e)) => format!("export failed: {e}"),
                Err(e) => format!("render failed: {e}"),
            };
        }
    }
}

struct RawModeGuard;
impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = crossterm::execute!(
            std::io::stdout(),
            crossterm::event::PopKeyboardEnhancementFlags
        );
        let _ = terminal::disable_raw_mode();
    }
}
