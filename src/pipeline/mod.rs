pub mod persistence;
pub mod render;
pub mod scheduler;
pub mod sequencer;
pub mod transport;
pub mod wav;
