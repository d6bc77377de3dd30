//! Murmur Engine — texture synthesis, mixing bus and the public controller.
//!
//! Crate layout:
//! - [`texture`]    : static recipe table and the synthesis routine
//! - [`bus`]        : layer registry, gain ramps, block mixer, command/event messages
//! - [`graph`]      : `Generator` trait and `Engine<G>` wrapper the render path drives
//! - [`output`]     : render side (`Renderer`) and the cpal device backend
//! - [`controller`] : `SoundController`, the API the application calls
//! - [`config`]     : `EngineConfig`, ramp lengths
//! - [`error`]      : `EngineError`
//!
//! The render path owns the bus outright and never allocates for a layer;
//! buffers are synthesized on background threads and returned to the control
//! side for freeing.

pub mod bus;
pub mod config;
pub mod controller;
pub mod error;
pub mod graph;
pub mod output;
pub mod texture;

pub use bus::{effective_gain, MixingBus, PlaybackState, SoundLayer};
pub use config::{EngineConfig, RampTimes};
pub use controller::{EngineState, LayerStatus, SoundController, Status};
pub use error::EngineError;
pub use graph::{Engine, Generator};
pub use output::Renderer;
pub use texture::{TextureId, TextureRecipe, TextureSynthesizer};
