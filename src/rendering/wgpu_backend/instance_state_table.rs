use std::{num::NonZeroU64, ops::Range};

use wgpu::{BindingType, BufferBindingType, BufferUsages, ShaderStages};

use crate::rendering::{
    backend::{BackendError, InstanceStateHandle},
    config::RenderConfig,
};

use super::instance_state_shadow::InstanceStateShadow;

/// Per-instance state for every slot, in one uniform buffer addressed with
/// dynamic offsets.
///
/// An [`InstanceStateShadow`] mirrors the buffer so a relocation can rewrite the
/// destination region without reading back from the GPU.
pub struct InstanceStateTable {
    buffer: wgpu::Buffer,
    bind_group_layout: wgpu::BindGroupLayout,
    bind_group: wgpu::BindGroup,
    shadow: InstanceStateShadow,
}

impl InstanceStateTable {
    pub fn new(device: &wgpu::Device, config: &RenderConfig) -> Self {
        let shadow = InstanceStateShadow::new(config);

        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Instance state table"),
            size: shadow.size(),
            usage: BufferUsages::UNIFORM | BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let bind_group_layout = Self::create_bind_group_layout(device);
        let bind_group =
            Self::create_bind_group(device, &bind_group_layout, &buffer, shadow.slot_size());

        Self {
            buffer,
            bind_group_layout,
            bind_group,
            shadow,
        }
    }

    fn create_bind_group_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
        device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Instance state bind group layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: ShaderStages::VERTEX | ShaderStages::FRAGMENT,
                ty: BindingType::Buffer {
                    ty: BufferBindingType::Uniform,
                    has_dynamic_offset: true,
                    min_binding_size: None,
                },
                count: None,
            }],
        })
    }

    fn create_bind_group(
        device: &wgpu::Device,
        layout: &wgpu::BindGroupLayout,
        buffer: &wgpu::Buffer,
        slot_size: u64,
    ) -> wgpu::BindGroup {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Instance state bind group"),
            layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                    buffer,
                    offset: 0,
                    size: NonZeroU64::new(slot_size),
                }),
            }],
        })
    }

    pub fn bind_group_layout(&self) -> &wgpu::BindGroupLayout {
        &self.bind_group_layout
    }

    pub fn bind_group(&self) -> &wgpu::BindGroup {
        &self.bind_group
    }

    fn flush(&self, queue: &wgpu::Queue, range: Range<usize>) {
        if !range.is_empty() {
            queue.write_buffer(&self.buffer, range.start as u64, self.shadow.bytes(range));
        }
    }

    pub fn create(
        &mut self,
        queue: &wgpu::Queue,
        binding_offset: u32,
    ) -> Result<InstanceStateHandle, BackendError> {
        let (handle, range) = self.shadow.create(binding_offset)?;
        self.flush(queue, range);

        Ok(handle)
    }

    pub fn destroy(
        &mut self,
        queue: &wgpu::Queue,
        handle: InstanceStateHandle,
    ) -> Result<(), BackendError> {
        let range = self.shadow.destroy(handle)?;
        self.flush(queue, range);

        Ok(())
    }

    pub fn relocate(
        &mut self,
        queue: &wgpu::Queue,
        handle: InstanceStateHandle,
        new_binding_offset: u32,
    ) -> Result<(), BackendError> {
        let ranges = self.shadow.relocate(handle, new_binding_offset)?;
        self.flush(queue, ranges.destination);
        self.flush(queue, ranges.vacated);

        Ok(())
    }

    pub fn upload(
        &mut self,
        queue: &wgpu::Queue,
        handle: InstanceStateHandle,
        bytes: &[u8],
    ) -> Result<(), BackendError> {
        let range = self.shadow.upload(handle, bytes)?;
        self.flush(queue, range);

        Ok(())
    }

    /// Dynamic offset in bytes for binding the handle's slot.
    pub fn dynamic_offset(&self, handle: InstanceStateHandle) -> Result<u32, BackendError> {
        self.shadow.dynamic_offset(handle)
    }

    pub fn live_bindings(&self) -> usize {
        self.shadow.live_bindings()
    }
}
