pub mod sequencer;

pub use sequencer::QueueSequencer;
