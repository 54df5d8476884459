//! A CPU-only [`GpuBackend`] that keeps the binding table in memory and records
//! every call, for tests and dry runs without a device.

use std::collections::{BTreeMap, HashMap};

use crate::rendering::backend::{
    BackendError, DrawIndexed, GpuBackend, InstanceStateHandle, PrimitiveTopology,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendCall {
    CreateInstanceState {
        handle: InstanceStateHandle,
        offset: u32,
    },
    DestroyBuffer(InstanceStateHandle),
    Relocate {
        handle: InstanceStateHandle,
        from: u32,
        to: u32,
    },
    Upload {
        handle: InstanceStateHandle,
        len: usize,
    },
    SetVertexBuffer {
        len: usize,
        stride: u32,
    },
    SetIndexBuffer {
        count: usize,
    },
    SetTopology(PrimitiveTopology),
    BindInstanceState {
        handle: InstanceStateHandle,
        offset: u32,
    },
    DrawIndexed(DrawIndexed),
}

#[derive(Debug)]
struct Binding {
    offset: u32,
    state: Vec<u8>,
}

#[derive(Debug, Default)]
pub struct RecordingBackend {
    next_handle: u64,
    bindings: HashMap<InstanceStateHandle, Binding>,
    occupancy: BTreeMap<u32, InstanceStateHandle>,
    calls: Vec<BackendCall>,
    vertex_bytes: Vec<u8>,
    vertex_stride: u32,
    indices: Vec<u32>,
    create_budget: Option<u32>,
    destroy_budget: Option<u32>,
    failing_relocation_target: Option<u32>,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> &[BackendCall] {
        &self.calls
    }

    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    /// `(handle, from, to)` of every relocation, in call order.
    pub fn relocations(&self) -> Vec<(InstanceStateHandle, u32, u32)> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                BackendCall::Relocate { handle, from, to } => Some((*handle, *from, *to)),
                _ => None,
            })
            .collect()
    }

    pub fn draws(&self) -> Vec<DrawIndexed> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                BackendCall::DrawIndexed(draw) => Some(*draw),
                _ => None,
            })
            .collect()
    }

    pub fn binding_offset(&self, handle: InstanceStateHandle) -> Option<u32> {
        self.bindings.get(&handle).map(|binding| binding.offset)
    }

    /// Last bytes uploaded to whichever binding currently lives at `offset`.
    pub fn state_at(&self, offset: u32) -> Option<&[u8]> {
        let handle = self.occupancy.get(&offset)?;
        self.bindings
            .get(handle)
            .map(|binding| binding.state.as_slice())
    }

    /// Offsets of all live bindings, ascending.
    pub fn live_offsets(&self) -> Vec<u32> {
        self.occupancy.keys().copied().collect()
    }

    /// Contents of the last vertex buffer upload.
    pub fn vertex_bytes(&self) -> &[u8] {
        &self.vertex_bytes
    }

    pub fn vertex_stride(&self) -> u32 {
        self.vertex_stride
    }

    /// Contents of the last index buffer upload.
    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    /// Lets `count` more buffer creations succeed, then fails the rest.
    pub fn fail_create_after(&mut self, count: u32) {
        self.create_budget = Some(count);
    }

    /// Lets `count` more buffer destructions succeed, then fails the rest.
    pub fn fail_destroy_after(&mut self, count: u32) {
        self.destroy_budget = Some(count);
    }

    /// Makes any relocation onto `offset` report a conflict.
    pub fn fail_relocation_to(&mut self, offset: u32) {
        self.failing_relocation_target = Some(offset);
    }

    fn binding(&self, handle: InstanceStateHandle) -> Result<&Binding, BackendError> {
        self.bindings
            .get(&handle)
            .ok_or(BackendError::UnknownHandle(handle))
    }
}

impl GpuBackend for RecordingBackend {
    fn create_instance_state_buffer(
        &mut self,
        binding_offset: u32,
    ) -> Result<InstanceStateHandle, BackendError> {
        if let Some(budget) = self.create_budget.as_mut() {
            if *budget == 0 {
                return Err(BackendError::Injected("buffer creation budget exhausted"));
            }
            *budget -= 1;
        }

        if let Some(&occupant) = self.occupancy.get(&binding_offset) {
            return Err(BackendError::BindingOffsetOccupied {
                offset: binding_offset,
                occupant,
            });
        }

        let handle = InstanceStateHandle::from_raw(self.next_handle);
        self.next_handle += 1;

        self.bindings.insert(
            handle,
            Binding {
                offset: binding_offset,
                state: Vec::new(),
            },
        );
        self.occupancy.insert(binding_offset, handle);
        self.calls.push(BackendCall::CreateInstanceState {
            handle,
            offset: binding_offset,
        });

        Ok(handle)
    }

    fn destroy_buffer(&mut self, handle: InstanceStateHandle) -> Result<(), BackendError> {
        if let Some(budget) = self.destroy_budget.as_mut() {
            if *budget == 0 {
                return Err(BackendError::Injected("buffer destruction budget exhausted"));
            }
            *budget -= 1;
        }

        let binding = self
            .bindings
            .remove(&handle)
            .ok_or(BackendError::UnknownHandle(handle))?;

        self.occupancy.remove(&binding.offset);
        self.calls.push(BackendCall::DestroyBuffer(handle));

        Ok(())
    }

    fn relocate_binding(
        &mut self,
        handle: InstanceStateHandle,
        new_binding_offset: u32,
    ) -> Result<(), BackendError> {
        let from = self.binding(handle)?.offset;

        if self.failing_relocation_target == Some(new_binding_offset) {
            return Err(BackendError::BindingOffsetOccupied {
                offset: new_binding_offset,
                occupant: InstanceStateHandle::from_raw(u64::MAX),
            });
        }

        match self.occupancy.get(&new_binding_offset) {
            Some(&occupant) if occupant != handle => {
                return Err(BackendError::BindingOffsetOccupied {
                    offset: new_binding_offset,
                    occupant,
                });
            }
            _ => {}
        }

        self.occupancy.remove(&from);
        self.occupancy.insert(new_binding_offset, handle);
        if let Some(binding) = self.bindings.get_mut(&handle) {
            binding.offset = new_binding_offset;
        }
        self.calls.push(BackendCall::Relocate {
            handle,
            from,
            to: new_binding_offset,
        });

        Ok(())
    }

    fn upload_bytes(
        &mut self,
        handle: InstanceStateHandle,
        bytes: &[u8],
    ) -> Result<(), BackendError> {
        let binding = self
            .bindings
            .get_mut(&handle)
            .ok_or(BackendError::UnknownHandle(handle))?;

        binding.state = bytes.to_vec();
        self.calls.push(BackendCall::Upload {
            handle,
            len: bytes.len(),
        });

        Ok(())
    }

    fn set_vertex_buffer(&mut self, bytes: &[u8], stride: u32) -> Result<(), BackendError> {
        self.vertex_bytes = bytes.to_vec();
        self.vertex_stride = stride;
        self.calls.push(BackendCall::SetVertexBuffer {
            len: bytes.len(),
            stride,
        });

        Ok(())
    }

    fn set_index_buffer(&mut self, indices: &[u32]) -> Result<(), BackendError> {
        self.indices = indices.to_vec();
        self.calls.push(BackendCall::SetIndexBuffer {
            count: indices.len(),
        });

        Ok(())
    }

    fn set_topology(&mut self, topology: PrimitiveTopology) -> Result<(), BackendError> {
        self.calls.push(BackendCall::SetTopology(topology));
        Ok(())
    }

    fn bind_instance_state(&mut self, handle: InstanceStateHandle) -> Result<(), BackendError> {
        let offset = self.binding(handle)?.offset;
        self.calls
            .push(BackendCall::BindInstanceState { handle, offset });

        Ok(())
    }

    fn draw_indexed(&mut self, draw: DrawIndexed) -> Result<(), BackendError> {
        self.calls.push(BackendCall::DrawIndexed(draw));
        Ok(())
    }
}
