use wgpu::BufferUsages;

/// A GPU buffer rewritten every frame, grown by doubling when a frame outgrows it.
pub struct GrowableBuffer {
    buffer: wgpu::Buffer,
    label: &'static str,
    usage: BufferUsages,
    capacity: u64,
    len: u64,
}

impl GrowableBuffer {
    pub fn new(
        device: &wgpu::Device,
        label: &'static str,
        usage: BufferUsages,
        initial_capacity: u64,
    ) -> Self {
        let capacity = initial_capacity.max(wgpu::COPY_BUFFER_ALIGNMENT);

        Self {
            buffer: Self::create_buffer(device, label, usage, capacity),
            label,
            usage,
            capacity,
            len: 0,
        }
    }

    fn create_buffer(
        device: &wgpu::Device,
        label: &'static str,
        usage: BufferUsages,
        capacity: u64,
    ) -> wgpu::Buffer {
        device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size: capacity,
            usage: usage | BufferUsages::COPY_DST,
            mapped_at_creation: false,
        })
    }

    fn ensure_capacity(&mut self, device: &wgpu::Device, required_capacity: u64) {
        if required_capacity > self.capacity {
            let new_capacity = required_capacity * 2;
            log::debug!(
                "Growing {} from {} to {} bytes",
                self.label,
                self.capacity,
                new_capacity
            );
            self.buffer = Self::create_buffer(device, self.label, self.usage, new_capacity);
            self.capacity = new_capacity;
        }
    }

    /// Replaces the buffer's contents. `bytes` must be a multiple of 4 bytes long.
    pub fn write(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, bytes: &[u8]) {
        self.len = bytes.len() as u64;
        if bytes.is_empty() {
            return;
        }

        self.ensure_capacity(device, self.len);
        queue.write_buffer(&self.buffer, 0, bytes);
    }

    /// The written part of the buffer.
    pub fn slice(&self) -> Option<wgpu::BufferSlice<'_>> {
        (self.len > 0).then(|| self.buffer.slice(..self.len))
    }
}

/// Shared vertex and index buffers holding one frame's concatenated geometry.
pub struct FrameBuffers {
    pub vertices: GrowableBuffer,
    pub indices: GrowableBuffer,
}

impl FrameBuffers {
    pub fn new(device: &wgpu::Device) -> Self {
        Self {
            vertices: GrowableBuffer::new(
                device,
                "Frame vertex megabuffer",
                BufferUsages::VERTEX,
                64 * 1024,
            ),
            indices: GrowableBuffer::new(
                device,
                "Frame index megabuffer",
                BufferUsages::INDEX,
                16 * 1024,
            ),
        }
    }
}
