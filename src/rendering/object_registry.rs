use slotmap::{new_key_type, SlotMap};

use crate::{
    model::MeshData,
    rendering::{
        backend::{GpuBackend, InstanceStateHandle, PrimitiveTopology},
        error::{BatchError, BatchResult},
        slot_table::{SlotRange, SlotTable},
    },
};

new_key_type! {
    /// Generational handle to a live [`RenderObject`].
    pub struct ObjectId;
}

/// A renderable unit: owned geometry plus one instance state buffer per instance.
#[derive(Debug)]
pub struct RenderObject {
    mesh: MeshData,
    instance_states: Vec<InstanceStateHandle>,
}

impl RenderObject {
    pub fn mesh(&self) -> &MeshData {
        &self.mesh
    }

    pub fn topology(&self) -> PrimitiveTopology {
        self.mesh.topology
    }

    pub fn vertex_count(&self) -> u32 {
        self.mesh.vertex_count()
    }

    pub fn index_count(&self) -> u32 {
        self.mesh.index_count()
    }

    pub fn vertex_stride(&self) -> u32 {
        self.mesh.vertex_stride()
    }

    pub fn instance_count(&self) -> u32 {
        self.instance_states.len() as u32
    }

    /// Instance state handles, in slot order.
    pub fn instance_states(&self) -> &[InstanceStateHandle] {
        &self.instance_states
    }
}

/// Owns every live object and keeps their binding slots dense.
pub struct ObjectRegistry {
    objects: SlotMap<ObjectId, RenderObject>,
    slots: SlotTable<ObjectId>,
    binding_stride: u32,
}

impl ObjectRegistry {
    pub fn new(binding_stride: u32) -> Self {
        Self {
            objects: SlotMap::with_key(),
            slots: SlotTable::new(),
            binding_stride,
        }
    }

    pub fn binding_stride(&self) -> u32 {
        self.binding_stride
    }

    /// Binding offset (in binding units) of a slot.
    pub fn binding_offset(&self, slot: u32) -> u32 {
        self.binding_stride * slot
    }

    pub fn create_object(
        &mut self,
        backend: &mut impl GpuBackend,
        mesh: &MeshData,
        instance_count: u32,
    ) -> BatchResult<ObjectId> {
        validate_mesh(mesh, instance_count)?;

        let id = self.objects.insert(RenderObject {
            mesh: mesh.clone(),
            instance_states: Vec::with_capacity(instance_count as usize),
        });
        let range = self.slots.allocate(id, instance_count);

        let mut instance_states = Vec::with_capacity(instance_count as usize);
        for slot in range.slots() {
            match backend.create_instance_state_buffer(self.binding_offset(slot)) {
                Ok(handle) => instance_states.push(handle),
                Err(err) => {
                    self.roll_back_creation(backend, id, &instance_states);
                    return Err(err.into());
                }
            }
        }

        if let Some(object) = self.objects.get_mut(id) {
            object.instance_states = instance_states;
        }

        log::info!(
            "Created object {:?}: {} vertices, {} indices, {:?}, slots {}..{}",
            id,
            mesh.vertex_count(),
            mesh.index_count(),
            mesh.topology,
            range.first,
            range.end()
        );

        Ok(id)
    }

    /// The new object's slots sit at the tail, so releasing them moves nothing.
    fn roll_back_creation(
        &mut self,
        backend: &mut impl GpuBackend,
        id: ObjectId,
        created: &[InstanceStateHandle],
    ) {
        for handle in created {
            if let Err(err) = backend.destroy_buffer(*handle) {
                log::warn!("Failed to destroy {:?} during rollback: {}", handle, err);
            }
        }

        self.slots.release(id);
        self.objects.remove(id);
    }

    /// Removes the object and compacts the slots behind it.
    ///
    /// A failing `destroy_buffer` does not stop the destruction: the remaining
    /// buffers are still destroyed, the slots released and survivors relocated.
    /// The first backend error is returned afterwards.
    pub fn destroy_object(
        &mut self,
        backend: &mut impl GpuBackend,
        id: ObjectId,
    ) -> BatchResult<()> {
        let object = self.objects.remove(id).ok_or(BatchError::ObjectNotFound(id))?;

        let mut destroy_error = None;
        for handle in &object.instance_states {
            if let Err(err) = backend.destroy_buffer(*handle) {
                log::error!("Failed to destroy {:?} of object {:?}: {}", handle, id, err);
                if destroy_error.is_none() {
                    destroy_error = Some(err);
                }
            }
        }

        let release = self.slots.release(id).ok_or(BatchError::ObjectNotFound(id))?;

        for relocation in &release.relocations {
            let survivor = self
                .objects
                .get(relocation.owner)
                .ok_or(BatchError::ObjectNotFound(relocation.owner))?;

            for (handle, slot) in survivor.instance_states.iter().zip(relocation.to.slots()) {
                backend
                    .relocate_binding(*handle, self.binding_stride * slot)
                    .map_err(|source| {
                        log::error!(
                            "Relocation of {:?} to slot {} failed: {}",
                            relocation.owner,
                            slot,
                            source
                        );
                        BatchError::RelocationConflict {
                            object: relocation.owner,
                            slot,
                            source,
                        }
                    })?;
            }
        }

        self.check_density()?;

        log::info!(
            "Destroyed object {:?}: released slots {}..{}, relocated {} objects",
            id,
            release.released.first,
            release.released.end(),
            release.relocations.len()
        );

        match destroy_error {
            Some(err) => Err(err.into()),
            None => Ok(()),
        }
    }

    pub fn get(&self, id: ObjectId) -> Option<&RenderObject> {
        self.objects.get(id)
    }

    pub fn contains(&self, id: ObjectId) -> bool {
        self.objects.contains_key(id)
    }

    pub fn slot_range(&self, id: ObjectId) -> Option<SlotRange> {
        self.slots.range_of(id)
    }

    pub fn slot_table(&self) -> &SlotTable<ObjectId> {
        &self.slots
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Total instances across all live objects.
    pub fn instance_count(&self) -> u32 {
        self.slots.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ObjectId, &RenderObject)> {
        self.objects.iter()
    }

    fn check_density(&self) -> BatchResult<()> {
        if self.slots.is_dense() {
            return Ok(());
        }

        let highest = self.slots.occupied_slots().max().unwrap_or(0);
        log::error!("Slot table lost density, highest slot {}", highest);

        Err(BatchError::SlotTableCorrupted {
            occupied: self.slots.occupied_slots().count() as u32,
            highest,
        })
    }
}

fn validate_mesh(mesh: &MeshData, instance_count: u32) -> BatchResult<()> {
    let invalid = |reason: String| Err(BatchError::InvalidGeometry(reason));

    if instance_count == 0 {
        return invalid("an object needs at least one instance".to_string());
    }
    if mesh.floats_per_vertex == 0 {
        return invalid("vertices must have at least one float".to_string());
    }
    if mesh.vertices.len() % mesh.floats_per_vertex as usize != 0 {
        return invalid(format!(
            "{} floats do not divide into vertices of {} floats",
            mesh.vertices.len(),
            mesh.floats_per_vertex
        ));
    }
    if let Some(index) = mesh.indices.iter().find(|&&i| i >= mesh.vertex_count()) {
        return invalid(format!(
            "index {} references one of only {} vertices",
            index,
            mesh.vertex_count()
        ));
    }

    Ok(())
}
