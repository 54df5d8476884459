//! [`GpuBackend`] on wgpu.
//!
//! State uploads and relocations go straight to the queue. Draw submission is
//! recorded and replayed into a caller-owned render pass by
//! [`WgpuBackend::encode`].

mod frame_buffers;
mod instance_state_shadow;
mod instance_state_table;
mod pipeline;

pub use pipeline::VERTEX_STRIDE;

use crate::rendering::{
    backend::{BackendError, DrawIndexed, GpuBackend, InstanceStateHandle, PrimitiveTopology},
    config::RenderConfig,
};

use self::{
    frame_buffers::FrameBuffers,
    instance_state_table::InstanceStateTable,
    pipeline::{wgpu_topology, PipelineKey, Pipelines},
};

#[derive(Debug, Clone, Copy)]
enum RecordedCommand {
    SetPipeline(PipelineKey),
    BindInstanceState { dynamic_offset: u32 },
    Draw(DrawIndexed),
}

pub struct WgpuBackend {
    device: wgpu::Device,
    queue: wgpu::Queue,
    instance_states: InstanceStateTable,
    frame_buffers: FrameBuffers,
    pipelines: Pipelines,
    wireframe: bool,
    commands: Vec<RecordedCommand>,
}

impl WgpuBackend {
    pub fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        config: &RenderConfig,
        color_format: wgpu::TextureFormat,
    ) -> Self {
        let instance_states = InstanceStateTable::new(device, config);
        let pipelines = Pipelines::new(device, instance_states.bind_group_layout(), color_format);

        Self {
            device: device.clone(),
            queue: queue.clone(),
            instance_states,
            frame_buffers: FrameBuffers::new(device),
            pipelines,
            wireframe: false,
            commands: Vec::new(),
        }
    }

    /// Draws triangle topologies as outlines from the next `set_topology` on.
    ///
    /// Needs `Features::POLYGON_MODE_LINE`; without it the request is ignored.
    pub fn set_wireframe(&mut self, enabled: bool) {
        if enabled
            && !self
                .device
                .features()
                .contains(wgpu::Features::POLYGON_MODE_LINE)
        {
            log::warn!("Wireframe requested but POLYGON_MODE_LINE is not enabled, drawing filled");
            return;
        }

        self.wireframe = enabled;
    }

    pub fn live_instance_states(&self) -> usize {
        self.instance_states.live_bindings()
    }

    /// Replays everything recorded since the last frame's geometry upload.
    pub fn encode(&mut self, render_pass: &mut wgpu::RenderPass<'_>) {
        let commands = std::mem::take(&mut self.commands);

        let (Some(vertices), Some(indices)) = (
            self.frame_buffers.vertices.slice(),
            self.frame_buffers.indices.slice(),
        ) else {
            return;
        };

        render_pass.set_vertex_buffer(0, vertices);
        render_pass.set_index_buffer(indices, wgpu::IndexFormat::Uint32);

        for command in commands {
            match command {
                RecordedCommand::SetPipeline(key) => match self.pipelines.get(key) {
                    Some(pipeline) => render_pass.set_pipeline(pipeline),
                    None => log::error!("Pipeline {:?} was never created", key),
                },
                RecordedCommand::BindInstanceState { dynamic_offset } => {
                    render_pass.set_bind_group(
                        0,
                        self.instance_states.bind_group(),
                        &[dynamic_offset],
                    );
                }
                RecordedCommand::Draw(draw) => {
                    render_pass.draw_indexed(
                        draw.start_index..draw.start_index + draw.index_count,
                        draw.start_vertex as i32,
                        draw.start_instance..draw.start_instance + draw.instance_count,
                    );
                }
            }
        }
    }
}

impl GpuBackend for WgpuBackend {
    fn create_instance_state_buffer(
        &mut self,
        binding_offset: u32,
    ) -> Result<InstanceStateHandle, BackendError> {
        self.instance_states.create(&self.queue, binding_offset)
    }

    fn destroy_buffer(&mut self, handle: InstanceStateHandle) -> Result<(), BackendError> {
        self.instance_states.destroy(&self.queue, handle)
    }

    fn relocate_binding(
        &mut self,
        handle: InstanceStateHandle,
        new_binding_offset: u32,
    ) -> Result<(), BackendError> {
        self.instance_states
            .relocate(&self.queue, handle, new_binding_offset)
    }

    fn upload_bytes(
        &mut self,
        handle: InstanceStateHandle,
        bytes: &[u8],
    ) -> Result<(), BackendError> {
        self.instance_states.upload(&self.queue, handle, bytes)
    }

    fn set_vertex_buffer(&mut self, bytes: &[u8], stride: u32) -> Result<(), BackendError> {
        if stride != VERTEX_STRIDE {
            return Err(BackendError::UnsupportedVertexStride(stride));
        }

        if !self.commands.is_empty() {
            log::warn!(
                "Dropping {} commands recorded for a frame that was never encoded",
                self.commands.len()
            );
            self.commands.clear();
        }

        self.frame_buffers
            .vertices
            .write(&self.device, &self.queue, bytes);

        Ok(())
    }

    fn set_index_buffer(&mut self, indices: &[u32]) -> Result<(), BackendError> {
        self.frame_buffers
            .indices
            .write(&self.device, &self.queue, bytemuck::cast_slice(indices));

        Ok(())
    }

    fn set_topology(&mut self, topology: PrimitiveTopology) -> Result<(), BackendError> {
        let key = PipelineKey {
            topology: wgpu_topology(topology)?,
            wireframe: self.wireframe,
        };

        self.pipelines.ensure(&self.device, key);
        self.commands.push(RecordedCommand::SetPipeline(key));

        Ok(())
    }

    fn bind_instance_state(&mut self, handle: InstanceStateHandle) -> Result<(), BackendError> {
        let dynamic_offset = self.instance_states.dynamic_offset(handle)?;
        self.commands
            .push(RecordedCommand::BindInstanceState { dynamic_offset });

        Ok(())
    }

    fn draw_indexed(&mut self, draw: DrawIndexed) -> Result<(), BackendError> {
        self.commands.push(RecordedCommand::Draw(draw));
        Ok(())
    }
}
