//! Data models for the waveform service
//!
//! Each sub-module covers one stage of the pipeline: stored Dropbox
//! credentials, audio source locators, parsed waveform output and the
//! reference items peaks are persisted onto.

mod credential;
mod reference;
mod source;
mod waveform;

pub use credential::*;
pub use reference::*;
pub use source::*;
pub use waveform::*;
