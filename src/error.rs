use thiserror::Error;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("out of memory allocating render buffers")]
    OutOfMemory,

    #[error("BVH build failed: {0}")]
    BvhBuildFailed(String),

    #[error("missing asset: {0}")]
    MissingAsset(String),
}
