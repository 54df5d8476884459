//! The seam between the object registry / batcher and whatever owns the GPU.

use thiserror::Error;

/// Opaque handle to a per-instance state buffer living in the binding table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceStateHandle(u64);

impl InstanceStateHandle {
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveTopology {
    PointList,
    LineList,
    LineStrip,
    TriangleList,
    TriangleStrip,
    LineListAdjacency,
    LineStripAdjacency,
    TriangleListAdjacency,
    TriangleStripAdjacency,
    /// Patch list with the given number of control points (1..=32).
    PatchList(u8),
}

/// Arguments of a single indexed, instanced draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawIndexed {
    pub index_count: u32,
    pub instance_count: u32,
    pub start_index: u32,
    pub start_vertex: u32,
    pub start_instance: u32,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("binding offset {offset} is already occupied by {occupant:?}")]
    BindingOffsetOccupied {
        offset: u32,
        occupant: InstanceStateHandle,
    },

    #[error("unknown instance state handle {0:?}")]
    UnknownHandle(InstanceStateHandle),

    #[error("binding offset {offset} exceeds the table capacity of {capacity} units")]
    CapacityExceeded { offset: u32, capacity: u32 },

    #[error("instance state of {size} bytes does not fit a {capacity} byte slot")]
    StateTooLarge { size: usize, capacity: usize },

    #[error("primitive topology {0:?} is not supported by this backend")]
    UnsupportedTopology(PrimitiveTopology),

    #[error("vertex stride of {0} bytes is not supported by this backend")]
    UnsupportedVertexStride(u32),

    #[error("injected failure: {0}")]
    Injected(&'static str),
}

/// GPU primitives consumed by [`crate::rendering::scene::RenderScene`].
///
/// Binding offsets are expressed in binding units: slot `s` of a table with
/// binding stride `k` lives at offset `k * s`.
pub trait GpuBackend {
    fn create_instance_state_buffer(
        &mut self,
        binding_offset: u32,
    ) -> Result<InstanceStateHandle, BackendError>;

    fn destroy_buffer(&mut self, handle: InstanceStateHandle) -> Result<(), BackendError>;

    /// Moves a live binding and the state behind it to `new_binding_offset`.
    ///
    /// Must fail with [`BackendError::BindingOffsetOccupied`] if another live
    /// binding already sits at the destination.
    fn relocate_binding(
        &mut self,
        handle: InstanceStateHandle,
        new_binding_offset: u32,
    ) -> Result<(), BackendError>;

    fn upload_bytes(&mut self, handle: InstanceStateHandle, bytes: &[u8])
        -> Result<(), BackendError>;

    fn set_vertex_buffer(&mut self, bytes: &[u8], stride: u32) -> Result<(), BackendError>;

    fn set_index_buffer(&mut self, indices: &[u32]) -> Result<(), BackendError>;

    fn set_topology(&mut self, topology: PrimitiveTopology) -> Result<(), BackendError>;

    fn bind_instance_state(&mut self, handle: InstanceStateHandle) -> Result<(), BackendError>;

    fn draw_indexed(&mut self, draw: DrawIndexed) -> Result<(), BackendError>;
}
