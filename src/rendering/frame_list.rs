use std::collections::HashSet;

use crate::rendering::{
    backend::{GpuBackend, PrimitiveTopology},
    error::{BatchError, BatchResult},
    object_registry::{ObjectId, ObjectRegistry},
};

/// One selected object. Holds the object's id, not the object itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameEntry {
    pub object: ObjectId,
    pub vertex_count: u32,
    pub index_count: u32,
    pub topology: PrimitiveTopology,
}

/// Objects selected for the current frame and their concatenated geometry.
///
/// Geometry is appended once per object, in selection order. Selecting further
/// instances of an object that is already in the list only uploads their state.
#[derive(Debug, Default)]
pub struct FrameList {
    begun: bool,
    entries: Vec<FrameEntry>,
    selected_instances: HashSet<(ObjectId, u32)>,
    vertex_bytes: Vec<u8>,
    indices: Vec<u32>,
    vertex_stride: Option<u32>,
}

impl FrameList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops everything selected so far and opens a new selection phase.
    pub fn begin(&mut self) {
        self.entries.clear();
        self.selected_instances.clear();
        self.vertex_bytes.clear();
        self.indices.clear();
        self.vertex_stride = None;
        self.begun = true;
    }

    pub fn is_begun(&self) -> bool {
        self.begun
    }

    pub fn select(
        &mut self,
        registry: &ObjectRegistry,
        backend: &mut impl GpuBackend,
        id: ObjectId,
        instance: u32,
        state: &[u8],
    ) -> BatchResult<()> {
        if !self.begun {
            return Err(BatchError::FrameNotBegun);
        }

        let object = registry.get(id).ok_or(BatchError::UnknownObject(id))?;

        let handle = *object.instance_states().get(instance as usize).ok_or(
            BatchError::InstanceOutOfRange {
                object: id,
                instance,
                instance_count: object.instance_count(),
            },
        )?;

        if self.selected_instances.contains(&(id, instance)) {
            return Err(BatchError::DuplicateSelection {
                object: id,
                instance,
            });
        }

        let first_selection = !self.entries.iter().any(|entry| entry.object == id);
        if first_selection {
            if let Some(expected) = self.vertex_stride {
                if expected != object.vertex_stride() {
                    return Err(BatchError::VertexStrideMismatch {
                        expected,
                        actual: object.vertex_stride(),
                    });
                }
            }
        }

        backend.upload_bytes(handle, state)?;
        self.selected_instances.insert((id, instance));

        if first_selection {
            let mesh = object.mesh();
            self.vertex_bytes.extend_from_slice(mesh.vertex_bytes());
            self.indices.extend_from_slice(&mesh.indices);
            if self.vertex_stride.is_none() {
                self.vertex_stride = Some(object.vertex_stride());
            }

            self.entries.push(FrameEntry {
                object: id,
                vertex_count: object.vertex_count(),
                index_count: object.index_count(),
                topology: object.topology(),
            });
        }

        Ok(())
    }

    /// Closes the selection phase; the next frame must call [`FrameList::begin`].
    pub(crate) fn finish(&mut self) {
        self.begin();
        self.begun = false;
    }

    pub fn entries(&self) -> &[FrameEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn vertex_bytes(&self) -> &[u8] {
        &self.vertex_bytes
    }

    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    /// Stride shared by every selected object, once anything is selected.
    pub fn vertex_stride(&self) -> Option<u32> {
        self.vertex_stride
    }

    pub fn selected_instance_count(&self) -> usize {
        self.selected_instances.len()
    }
}
