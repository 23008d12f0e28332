//! Wavepeak Processing Library
//!
//! Scratch-file management and the `audiowaveform` invocation that turn
//! downloaded audio into peak data.

pub mod analysis;
pub mod temp;

// Re-export commonly used types
pub use analysis::{AudiowaveformAnalyzer, WaveformAnalyzer};
pub use temp::{TempFilePair, TempStorage};
