//! Error types for the viewer.
//!
//! Only start-up can fail fatally. Asset failures are reported through
//! `anyhow` by the loaders in [`crate::resources`] and never stop the frame
//! loop; the per-frame update path has no error cases at all.

/// Fatal failures while bringing up the rendering environment.
#[derive(thiserror::Error, Debug)]
pub enum ViewerError {
    /// The window could not be turned into a rendering surface.
    #[error("unsupported environment: cannot create a surface ({0})")]
    Surface(#[from] wgpu::CreateSurfaceError),

    /// No adapter matches the surface, e.g. WebGL2 is not available.
    #[error("unsupported environment: no compatible graphics adapter ({0})")]
    Adapter(#[from] wgpu::RequestAdapterError),

    /// The adapter refused to hand out a device.
    #[error("unsupported environment: cannot open a graphics device ({0})")]
    Device(#[from] wgpu::RequestDeviceError),

    /// The surface reports no usable texture format.
    #[error("unsupported environment: the surface exposes no texture format")]
    NoSurfaceFormat,
}

/// Failures while reading a [`crate::config::ViewerConfig`].
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] ron::error::SpannedError),
}
