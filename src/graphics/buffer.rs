//! Host-visible buffers for data the CPU rewrites (vertices, per-frame uniforms)

use crate::graphics::{
    context::{GraphicsContext, VulkanContext},
    error::GraphicsError,
    memory::{self, Allocation},
};
use ash::vk;
use std::sync::Arc;

/// A buffer backed by host-visible, host-coherent memory
///
/// Writes go straight through a map/copy/unmap, so no flush is needed and the
/// device sees the data at the next submit.
pub struct HostVisibleBuffer {
    context: Arc<VulkanContext>,
    buffer: vk::Buffer,
    allocation: Option<Allocation>,
    size: vk::DeviceSize,
}

impl HostVisibleBuffer {
    pub fn new(
        context: Arc<VulkanContext>,
        size: vk::DeviceSize,
        usage: vk::BufferUsageFlags,
    ) -> Result<Self, GraphicsError> {
        let device = context.device();
        let buffer = unsafe {
            device.create_buffer(
                &vk::BufferCreateInfo::default()
                    .size(size)
                    .usage(usage)
                    .sharing_mode(vk::SharingMode::EXCLUSIVE),
                None,
            )
        }
        .map_err(GraphicsError::BufferCreationFailed)?;

        let mut this = Self {
            context,
            buffer,
            allocation: None,
            size,
        };

        let requirements = unsafe { this.context.device().get_buffer_memory_requirements(buffer) };
        let allocation = memory::allocate(
            &*this.context,
            &requirements,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        )?;
        this.allocation = Some(allocation);

        unsafe {
            this.context
                .device()
                .bind_buffer_memory(buffer, allocation.memory, 0)
        }
        .map_err(GraphicsError::MemoryBindFailed)?;

        Ok(this)
    }

    /// Buffer sized for `data` with its contents already uploaded.
    pub fn with_data(
        context: Arc<VulkanContext>,
        data: &[u8],
        usage: vk::BufferUsageFlags,
    ) -> Result<Self, GraphicsError> {
        let buffer = Self::new(context, data.len() as vk::DeviceSize, usage)?;
        buffer.write(data)?;
        Ok(buffer)
    }

    /// Copy `data` to the start of the buffer.
    pub fn write(&self, data: &[u8]) -> Result<(), GraphicsError> {
        let written = data.len() as vk::DeviceSize;
        if written > self.size {
            return Err(GraphicsError::BufferOverflow {
                written,
                capacity: self.size,
            });
        }
        if data.is_empty() {
            return Ok(());
        }
        let Some(allocation) = self.allocation else {
            return Err(GraphicsError::MemoryMapFailed(vk::Result::ERROR_MEMORY_MAP_FAILED));
        };

        let device = self.context.device();
        unsafe {
            let ptr = device
                .map_memory(allocation.memory, 0, written, vk::MemoryMapFlags::empty())
                .map_err(GraphicsError::MemoryMapFailed)?;
            std::ptr::copy_nonoverlapping(data.as_ptr(), ptr.cast::<u8>(), data.len());
            device.unmap_memory(allocation.memory);
        }
        Ok(())
    }

    pub fn buffer(&self) -> vk::Buffer {
        self.buffer
    }

    pub fn size(&self) -> vk::DeviceSize {
        self.size
    }
}

impl Drop for HostVisibleBuffer {
    fn drop(&mut self) {
        unsafe {
            self.context.device().destroy_buffer(self.buffer, None);
        }
        if let Some(allocation) = self.allocation.take() {
            self.context.free_memory(allocation.memory);
        }
    }
}
