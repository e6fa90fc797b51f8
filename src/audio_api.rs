use crate::pipeline::sequencer::Schedules;

// Commands from the controller to the audio thread. The engine can't
// allocate or build anything, so a new arrangement arrives with its
// schedules already built
#[derive(Debug)]
pub enum EngineCommand {
    Load(Box<Schedules>),
    Play,
    Stop,
    SetLooping(bool),
    SetBpm(f64),
    // one melody note outside the schedule, for the keyboard preview
    Preview(f32),
}
