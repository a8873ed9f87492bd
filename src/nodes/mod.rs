mod delay_reader;
mod delay_writer;
mod host_input;
mod multitap;
mod single_line;
mod stereo_taps;

pub use delay_reader::{zero_delay_adjustment, DelayReader, ReaderMode};
pub use delay_writer::{DelayWriter, DelayWriterState, SharedWriter};
pub use host_input::GraphInput;
pub use multitap::MultiTapDelay;
pub use single_line::{LineState, ReadMode, SingleLineDelay};
pub use stereo_taps::StereoTapDelay;
