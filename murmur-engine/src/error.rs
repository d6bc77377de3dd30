use thiserror::Error;

/// Failures local to engine setup. Control operations never surface these;
/// they report [`Status`](crate::controller::Status) instead.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("unknown texture: {0:?}")]
    UnknownTexture(String),

    #[error("audio output unavailable: {0}")]
    OutputUnavailable(String),

    #[cfg(feature = "realtime")]
    #[error("requested output device not found: {0}")]
    DeviceNotFound(String),

    #[cfg(feature = "realtime")]
    #[error("failed to enumerate output devices: {0}")]
    Devices(#[from] cpal::DevicesError),

    #[cfg(feature = "realtime")]
    #[error("failed to read device name: {0}")]
    DeviceName(#[from] cpal::DeviceNameError),

    #[cfg(feature = "realtime")]
    #[error("failed to query default output config: {0}")]
    DefaultConfig(#[from] cpal::DefaultStreamConfigError),

    #[cfg(feature = "realtime")]
    #[error("unsupported device sample format: {0:?}")]
    UnsupportedFormat(cpal::SampleFormat),

    #[cfg(feature = "realtime")]
    #[error("failed to build output stream: {0}")]
    BuildStream(#[from] cpal::BuildStreamError),

    #[cfg(feature = "realtime")]
    #[error("failed to start output stream: {0}")]
    PlayStream(#[from] cpal::PlayStreamError),
}
