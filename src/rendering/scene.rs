use crate::{
    model::MeshData,
    rendering::{
        backend::GpuBackend,
        batch_assembler::{self, FrameStats},
        config::RenderConfig,
        error::BatchResult,
        frame_list::FrameList,
        object_registry::{ObjectId, ObjectRegistry},
    },
};

/// Owns the backend, every live object and the current frame's selection.
///
/// All mutation goes through `&mut self`; wrap the scene in a mutex to share it
/// between threads.
pub struct RenderScene<B: GpuBackend> {
    backend: B,
    registry: ObjectRegistry,
    frame: FrameList,
}

impl<B: GpuBackend> RenderScene<B> {
    pub fn new(backend: B, config: &RenderConfig) -> Self {
        Self {
            backend,
            registry: ObjectRegistry::new(config.binding_stride),
            frame: FrameList::new(),
        }
    }

    pub fn create_object(&mut self, mesh: &MeshData, instance_count: u32) -> BatchResult<ObjectId> {
        self.registry
            .create_object(&mut self.backend, mesh, instance_count)
    }

    pub fn destroy_object(&mut self, id: ObjectId) -> BatchResult<()> {
        self.registry.destroy_object(&mut self.backend, id)
    }

    pub fn begin_frame_selection(&mut self) {
        self.frame.begin();
    }

    /// Uploads `state` for one instance and adds the object to this frame.
    pub fn select(&mut self, id: ObjectId, instance: u32, state: &[u8]) -> BatchResult<()> {
        self.frame
            .select(&self.registry, &mut self.backend, id, instance, state)
    }

    pub fn select_state<T: bytemuck::Pod>(
        &mut self,
        id: ObjectId,
        instance: u32,
        state: &T,
    ) -> BatchResult<()> {
        self.select(id, instance, bytemuck::bytes_of(state))
    }

    /// Draws the current selection and closes the frame.
    ///
    /// The selection is discarded even if a draw fails.
    pub fn assemble_and_draw(&mut self) -> BatchResult<FrameStats> {
        let result =
            batch_assembler::assemble_and_draw(&self.frame, &self.registry, &mut self.backend);
        self.frame.finish();
        result
    }

    pub fn registry(&self) -> &ObjectRegistry {
        &self.registry
    }

    pub fn frame(&self) -> &FrameList {
        &self.frame
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }
}
