use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender};

use crate::audio_api::EngineCommand;
use crate::pipeline::sequencer::Sequencer;
use crate::shared::Notification;

use super::frame::StereoFrame;
use super::mixer::Mixer;

/// The real-time side of live playback. Lives inside the output callback,
/// takes commands over a channel and reports back without ever blocking.
pub struct Engine {
    sequencer: Sequencer,
    commands: Receiver<EngineCommand>,
    notify: Sender<Notification>,
    mixer: Arc<Mixer>,
    position_every: usize,
    since_position: usize,
}

impl Engine {
    pub fn new(
        sequencer: Sequencer,
        commands: Receiver<EngineCommand>,
        notify: Sender<Notification>,
        mixer: Arc<Mixer>,
        sample_rate: u32,
        position_interval_ms: u64,
    ) -> Self {
        let position_every = ((sample_rate as u64 * position_interval_ms.max(1)) / 1000).max(1) as usize;
        Self { sequencer, commands, notify, mixer, position_every, since_position: 0 }
    }

    pub fn handle_cmd(&mut self, cmd: EngineCommand) {
        match cmd {
            EngineCommand::Load(schedules) => self.sequencer.install(*schedules),
            EngineCommand::Play => {
                if !self.sequencer.is_playing() {
                    self.sequencer.play();
                    self.since_position = 0;
                    let _ = self.notify.try_send(Notification::Position(self.sequencer.position()));
                }
            }
            EngineCommand::Stop => self.sequencer.stop(),
            EngineCommand::SetLooping(on) => self.sequencer.set_looping(on),
            EngineCommand::SetBpm(bpm) => {
                self.sequencer.set_bpm(bpm);
            }
            EngineCommand::Preview(freq) => self.sequencer.preview(freq),
        }
    }

    pub fn drain_commands(&mut self) {
        while let Ok(cmd) = self.commands.try_recv() {
            self.handle_cmd(cmd);
        }
    }

    /// Fill `out` with the next block. Overwrites, does not mix.
    pub fn render_block(&mut self, out: &mut [StereoFrame]) {
        self.drain_commands();
        out.fill(StereoFrame::zero());

        let notify = &self.notify;
        self.sequencer.render(out, &*self.mixer, &mut |track| {
            let _ = notify.try_send(Notification::TrackTriggered(track));
        });

        if self.sequencer.is_playing() {
            self.since_position += out.len();
            if self.since_position >= self.position_every {
                self.since_position %= self.position_every;
                let _ = self.notify.try_send(Notification::Position(self.sequencer.position()));
            }
        }
    }

    pub fn is_playing(&self) -> bool {
        self.sequencer.is_playing()
    }
}
