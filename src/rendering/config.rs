#[derive(Debug, Clone)]
pub struct RenderConfig {
    /// Binding units between consecutive slots (`k`).
    pub binding_stride: u32,
    /// Number of slots the GPU binding table can hold.
    pub max_instance_slots: u32,
    /// Bytes per binding unit on the GPU.
    pub binding_unit_size: u32,
}

impl RenderConfig {
    /// Bytes of per-instance state one slot can hold.
    pub fn slot_size(&self) -> u64 {
        self.binding_stride as u64 * self.binding_unit_size as u64
    }

    /// Total binding units addressable by the table.
    pub fn binding_capacity(&self) -> u32 {
        self.binding_stride * self.max_instance_slots
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            binding_stride: 2,
            max_instance_slots: 1024,
            binding_unit_size: 256,
        }
    }
}
