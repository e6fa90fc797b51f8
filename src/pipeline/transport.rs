use crate::timing::{PPQ, Position, clamp_bpm};

/// A contiguous run of frames within one block, and the tick range it covers.
///
/// Events with `scan_from <= tick < scan_to` fall inside this run.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Segment {
    pub scan_from: u64,
    pub scan_to: u64,
    /// Transport position (in ticks) at `frame_offset`.
    pub origin_tick: f64,
    pub frame_offset: usize,
    pub frames: usize,
    ticks_per_frame: f64,
}

impl Segment {
    /// The first frame of the block at or after `tick`.
    pub fn frame_of(&self, tick: u64) -> usize {
        let ahead = (tick as f64 - self.origin_tick).max(0.0);
        let k = (ahead / self.ticks_per_frame).ceil() as usize;
        self.frame_offset + k.min(self.frames.saturating_sub(1))
    }
}

/// The musical clock. Position is kept in (fractional) ticks; seconds only
/// enter through the current bpm when a block is advanced, so a tempo change
/// re-times everything that has not fired yet.
#[derive(Clone, Debug)]
pub struct Transport {
    sample_rate: f64,
    bpm: f64,
    playing: bool,
    looping: bool,
    loop_end: u64,
    position: f64,
    // first tick the next advance scans; integer so float drift at a wrap
    // can never open a gap or an overlap between blocks
    next_scan: u64,
}

impl Transport {
    pub fn new(sample_rate: u32, bpm: f64) -> Self {
        Self {
            sample_rate: sample_rate.max(1) as f64,
            bpm: clamp_bpm(bpm),
            playing: false,
            looping: false,
            loop_end: 0,
            position: 0.0,
            next_scan: 0,
        }
    }

    pub fn start(&mut self) {
        self.playing = true;
    }

    /// Halt and rewind to the origin.
    pub fn stop(&mut self) {
        self.playing = false;
        self.position = 0.0;
        self.next_scan = 0;
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn set_bpm(&mut self, bpm: f64) -> f64 {
        self.bpm = clamp_bpm(bpm);
        self.bpm
    }

    pub fn bpm(&self) -> f64 {
        self.bpm
    }

    pub fn set_looping(&mut self, looping: bool) {
        self.looping = looping;
    }

    pub fn is_looping(&self) -> bool {
        self.looping
    }

    pub fn set_loop_end(&mut self, ticks: u64) {
        self.loop_end = ticks;
    }

    pub fn loop_end(&self) -> u64 {
        self.loop_end
    }

    pub fn ticks(&self) -> f64 {
        self.position
    }

    pub fn position(&self) -> Position {
        Position::from_ticks(self.position)
    }

    pub fn ticks_per_frame(&self) -> f64 {
        self.bpm * PPQ as f64 / (60.0 * self.sample_rate)
    }

    /// Move the clock forward by `frames`, reporting each segment between loop
    /// wraps. Does nothing while stopped.
    pub fn advance(&mut self, frames: usize, mut visit: impl FnMut(Segment)) {
        if !self.playing || frames == 0 {
            return;
        }
        let tpf = self.ticks_per_frame();
        let mut offset = 0;
        let mut scan_from = self.next_scan;

        while offset < frames {
            let remaining = frames - offset;
            let end = self.position + remaining as f64 * tpf;
            let wraps = self.looping && self.loop_end > 0 && end >= self.loop_end as f64;

            if !wraps {
                let scan_to = (end.ceil() as u64).max(scan_from);
                visit(Segment {
                    scan_from,
                    scan_to,
                    origin_tick: self.position,
                    frame_offset: offset,
                    frames: remaining,
                    ticks_per_frame: tpf,
                });
                self.position = end;
                self.next_scan = scan_to;
                return;
            }

            // frames whose start still lies before the loop end
            let loop_end = self.loop_end as f64;
            let before = (((loop_end - self.position) / tpf).ceil().max(0.0) as usize).min(remaining);
            if before > 0 {
                visit(Segment {
                    scan_from,
                    scan_to: self.loop_end,
                    origin_tick: self.position,
                    frame_offset: offset,
                    frames: before,
                    ticks_per_frame: tpf,
                });
            }
            // carry the overshoot into the next pass; it rescans from the origin
            self.position = if before == 0 {
                0.0
            } else {
                (self.position + before as f64 * tpf - loop_end).max(0.0)
            };
            offset += before;
            scan_from = 0;
            self.next_scan = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::scheduler::TrackScheduler;
    use crate::timing::TICKS_PER_BAR;

    fn collect(transport: &mut Transport, frames: usize) -> Vec<Segment> {
        let mut segs = Vec::new();
        transport.advance(frames, |s| segs.push(s));
        segs
    }

    #[test]
    fn test_stopped_transport_does_not_move() {
        let mut t = Transport::new(48000, 120.0);
        assert!(collect(&mut t, 512).is_empty());
        assert_eq!(t.ticks(), 0.0);
    }

    #[test]
    fn test_advance_covers_contiguous_ticks() {
        // 120 bpm at 384 Hz: one tick per frame
        let mut t = Transport::new(384, 120.0);
        assert!((t.ticks_per_frame() - 1.0).abs() < 1e-12);
        t.start();
        let a = collect(&mut t, 100);
        let b = collect(&mut t, 100);
        assert_eq!(a.len(), 1);
        assert_eq!((a[0].scan_from, a[0].scan_to), (0, 100));
        assert_eq!((b[0].scan_from, b[0].scan_to), (100, 200));
        assert_eq!(b[0].frame_of(150), 50);
    }

    #[test]
    fn test_stop_rewinds() {
        let mut t = Transport::new(384, 120.0);
        t.start();
        collect(&mut t, 1000);
        t.stop();
        t.stop();
        assert!(!t.is_playing());
        assert_eq!(t.ticks(), 0.0);
        assert_eq!(t.position(), Position::ORIGIN);
    }

    #[test]
    fn test_loop_wrap_splits_the_block() {
        let mut t = Transport::new(384, 120.0);
        t.set_looping(true);
        t.set_loop_end(TICKS_PER_BAR);
        t.start();
        collect(&mut t, 700);
        let segs = collect(&mut t, 100);
        assert_eq!(segs.len(), 2);
        assert_eq!((segs[0].scan_from, segs[0].scan_to), (700, 768));
        assert_eq!(segs[0].frames, 68);
        assert_eq!(segs[1].scan_from, 0);
        assert_eq!(segs[1].frame_offset, 68);
        assert_eq!(segs[1].frames, 32);
        assert_eq!(segs[1].frame_of(0), 68);
        assert!((t.ticks() - 32.0).abs() < 1e-9);
    }

    #[test]
    fn test_without_looping_runs_past_the_end() {
        let mut t = Transport::new(384, 120.0);
        t.set_loop_end(TICKS_PER_BAR);
        t.start();
        let segs = collect(&mut t, 1000);
        assert_eq!(segs.len(), 1);
        assert_eq!(segs[0].scan_to, 1000);
    }

    #[test]
    fn test_bpm_change_rescales_ticks_per_frame() {
        let mut t = Transport::new(384, 120.0);
        t.start();
        collect(&mut t, 10);
        t.set_bpm(60.0);
        collect(&mut t, 10);
        assert!((t.ticks() - 15.0).abs() < 1e-9);
        assert_eq!(t.set_bpm(500.0), 200.0);
    }

    #[test]
    fn test_loop_origin_fires_once_per_cycle() {
        let loop_end = 2 * TICKS_PER_BAR;
        // the first three divide the cycle into whole blocks
        for (sr, bpm, block) in
            [(48000, 120.0, 256), (8000, 120.0, 256), (44100, 90.0, 128), (44100, 120.0, 441), (48000, 97.0, 64)]
        {
            let mut t = Transport::new(sr, bpm);
            t.set_loop_end(loop_end);
            t.set_looping(true);
            t.start();
            let mut s = TrackScheduler::new(vec![(0u64, ())]);
            s.set_loop(Some(loop_end));
            s.start();

            // stop one frame short of the seventh pass
            let cycle = loop_end as f64 / t.ticks_per_frame();
            let total = (cycle * 6.0 - 1.0).floor() as usize;
            let mut fired = 0;
            let mut done = 0;
            while done < total {
                let n = (total - done).min(block);
                t.advance(n, |seg| s.fire(seg.scan_from, seg.scan_to, |_, _| fired += 1));
                done += n;
            }
            assert_eq!(fired, 6, "sr={sr} bpm={bpm} block={block}");
        }
    }

    #[test]
    fn test_scans_stay_contiguous_across_blocks() {
        let mut t = Transport::new(44100, 97.0);
        t.set_looping(true);
        t.set_loop_end(TICKS_PER_BAR);
        t.start();
        let mut expected = 0;
        for _ in 0..2000 {
            for seg in collect(&mut t, 333) {
                if seg.scan_from != expected {
                    assert_eq!(seg.scan_from, 0, "gap or overlap at {expected}");
                    assert_eq!(expected, TICKS_PER_BAR);
                }
                expected = seg.scan_to;
            }
        }
    }
}
