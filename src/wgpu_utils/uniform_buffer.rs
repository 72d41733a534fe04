//! Growable uniform buffer holding one aligned slot per draw.
//!
//! Draws push their uniform bytes during a frame, and the whole staging area
//! is written to the GPU in a single `write_buffer` at submission time. Each
//! slot is addressed with a dynamic offset.

pub struct DynamicUniformBuffer {
    label: String,
    buffer: Option<wgpu::Buffer>,
    staging: Vec<u8>,
    stride: u64,
}

impl DynamicUniformBuffer {
    /// `alignment` is the device's `min_uniform_buffer_offset_alignment`.
    pub fn new(label: &str, alignment: u32, slot_size: u64) -> Self {
        let alignment = u64::from(alignment.max(1));
        Self {
            label: label.to_string(),
            buffer: None,
            staging: Vec::new(),
            stride: slot_size.div_ceil(alignment) * alignment,
        }
    }

    pub fn stride(&self) -> u64 {
        self.stride
    }

    /// Appends one slot and returns its dynamic offset.
    ///
    /// `data` longer than the slot is truncated.
    pub fn push(&mut self, data: &[u8]) -> u32 {
        let offset = self.staging.len();
        let len = data.len().min(self.stride as usize);
        self.staging.extend_from_slice(&data[..len]);
        self.staging.resize(offset + self.stride as usize, 0);
        offset as u32
    }

    pub fn len(&self) -> usize {
        self.staging.len() / self.stride.max(1) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.staging.is_empty()
    }

    pub fn clear(&mut self) {
        self.staging.clear();
    }

    /// Writes the staged slots, reallocating when they outgrow the buffer.
    ///
    /// Returns `true` if a new buffer was created, which invalidates bind
    /// groups built on the previous one.
    pub fn upload(&mut self, device: &wgpu::Device, queue: &wgpu::Queue) -> bool {
        let required = (self.staging.len() as u64).max(self.stride);
        let mut reallocated = false;

        if self.buffer.as_ref().map_or(true, |b| b.size() < required) {
            let size = required.next_power_of_two();
            self.buffer = Some(device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(&self.label),
                size,
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            }));
            log::debug!("{}: grew to {} bytes", self.label, size);
            reallocated = true;
        }

        if let Some(buffer) = &self.buffer {
            if !self.staging.is_empty() {
                queue.write_buffer(buffer, 0, &self.staging);
            }
        }
        reallocated
    }

    pub fn buffer(&self) -> Option<&wgpu::Buffer> {
        self.buffer.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slots_are_aligned() {
        let mut ubo = DynamicUniformBuffer::new("test", 256, 64);
        assert_eq!(ubo.stride(), 256);
        assert_eq!(ubo.push(&[1u8; 64]), 0);
        assert_eq!(ubo.push(&[2u8; 64]), 256);
        assert_eq!(ubo.len(), 2);

        ubo.clear();
        assert!(ubo.is_empty());
        assert_eq!(ubo.push(&[3u8; 64]), 0);
    }

    #[test]
    fn test_stride_covers_slot() {
        let ubo = DynamicUniformBuffer::new("test", 64, 128);
        assert_eq!(ubo.stride(), 128);
        let ubo = DynamicUniformBuffer::new("test", 256, 300);
        assert_eq!(ubo.stride(), 512);
    }
}
