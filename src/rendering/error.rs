use thiserror::Error;

use crate::rendering::{backend::BackendError, object_registry::ObjectId};

/// Errors surfaced by the object registry, frame selection and batch assembly.
///
/// Variants fall into three classes: invariant violations (fatal, the shared
/// slot state can no longer be trusted), backend resource failures and
/// precondition violations made by the caller.
#[derive(Debug, Error)]
pub enum BatchError {
    /// A destroy or relocation found no registry entry for an object that the
    /// slot table or the caller still refers to.
    #[error("object {0:?} is not registered")]
    ObjectNotFound(ObjectId),

    #[error("relocating instance state of {object:?} to slot {slot} failed: {source}")]
    RelocationConflict {
        object: ObjectId,
        slot: u32,
        #[source]
        source: BackendError,
    },

    #[error("slot table is no longer dense ({occupied} slots occupied, highest slot {highest})")]
    SlotTableCorrupted { occupied: u32, highest: u32 },

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error("object {0:?} is not live and cannot be selected or drawn")]
    UnknownObject(ObjectId),

    #[error("begin_frame_selection was not called before selecting or drawing")]
    FrameNotBegun,

    #[error("instance {instance} of object {object:?} was already selected this frame")]
    DuplicateSelection { object: ObjectId, instance: u32 },

    #[error("vertex stride {actual} does not match the frame's stride {expected}")]
    VertexStrideMismatch { expected: u32, actual: u32 },

    #[error("instance {instance} out of range for {object:?} ({instance_count} instances)")]
    InstanceOutOfRange {
        object: ObjectId,
        instance: u32,
        instance_count: u32,
    },

    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),
}

impl BatchError {
    /// Whether this error signals broken internal state rather than a bad call.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            BatchError::ObjectNotFound(_)
                | BatchError::RelocationConflict { .. }
                | BatchError::SlotTableCorrupted { .. }
        )
    }
}

pub type BatchResult<T> = Result<T, BatchError>;
