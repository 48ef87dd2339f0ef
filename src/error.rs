use thiserror::Error;

/// Encoding and validation failures. All of these are raised while a scene is being built
/// or uploaded, never from inside the tracing loop.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SceneError {
    #[error("{op} is not valid on {found} BVH node")]
    NodeKindMismatch { op: &'static str, found: &'static str },

    #[error("index {0} does not fit in the 31 bits available to the node encoding")]
    UnrepresentableIndex(u64),

    #[error("{0} is not a valid child pointer (interior children must be > 0)")]
    InvalidChildIndex(u32),

    #[error("{what} index {index} is out of range (len {len})")]
    IndexOutOfRange { what: &'static str, index: u64, len: usize },

    #[error("unknown BRDF type {0}")]
    UnknownBrdfType(i32),

    #[error("unknown material blend function {0}")]
    UnknownBlendFunc(i32),

    #[error("unknown texture format {0}")]
    UnknownTextureFormat(u32),

    #[error("texture data is {actual} bytes, expected {expected}")]
    TextureDataSize { expected: usize, actual: usize },

    #[error("material tree rooted at node {root} is deeper than {max} levels or cyclic")]
    MaterialTreeTooDeep { root: u32, max: usize },

    #[error("transform of mesh instance {0} is not invertible")]
    SingularTransform(u32),

    #[error("invalid geometry: {0}")]
    InvalidGeometry(&'static str),

    #[error("{buffer} buffer is {size} bytes, exceeding the {limit} byte upload limit")]
    BufferTooLarge { buffer: &'static str, size: usize, limit: usize },
}

pub(crate) fn check_index(what: &'static str, index: u64, len: usize) -> Result<(), SceneError> {
    if index < len as u64 {
        Ok(())
    } else {
        Err(SceneError::IndexOutOfRange { what, index, len })
    }
}
