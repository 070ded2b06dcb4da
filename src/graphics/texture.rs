//! The procedural checkerboard texture sampled by the triangle

use crate::graphics::{
    context::{GraphicsContext, VulkanContext},
    error::GraphicsError,
    memory::{self, Allocation},
};
use ash::vk;
use std::sync::Arc;

/// Edge length of the checkerboard, in texels.
pub const CHECKERBOARD_SIZE: u32 = 64;

const TEXEL_SIZE: usize = 4;

/// Tightly packed RGBA8 texels of a `size`×`size` checkerboard with 16-texel cells.
///
/// A cell is magenta where bit 4 of `x ^ y` is set and green elsewhere; alpha is opaque.
pub fn checkerboard_texels(size: u32) -> Vec<u8> {
    let mut texels = Vec::with_capacity((size * size) as usize * TEXEL_SIZE);
    for y in 0..size {
        for x in 0..size {
            let v: u8 = if (x ^ y) & 16 != 0 { 0xFF } else { 0x00 };
            texels.extend_from_slice(&[v, !v, v, 0xFF]);
        }
    }
    texels
}

/// A linear-tiled, host-written 2D texture with its view and sampler
pub struct Texture {
    context: Arc<VulkanContext>,
    image: vk::Image,
    allocation: Option<Allocation>,
    view: vk::ImageView,
    sampler: vk::Sampler,
    extent: vk::Extent2D,
}

impl Texture {
    const FORMAT: vk::Format = vk::Format::R8G8B8A8_UNORM;

    /// Create the checkerboard texture. The image is left in `PREINITIALIZED`
    /// layout; record [`Texture::record_layout_transition`] before sampling it.
    pub fn checkerboard(context: Arc<VulkanContext>) -> Result<Self, GraphicsError> {
        let size = CHECKERBOARD_SIZE;
        let extent = vk::Extent2D {
            width: size,
            height: size,
        };

        let image = context
            .create_image(
                &vk::ImageCreateInfo::default()
                    .image_type(vk::ImageType::TYPE_2D)
                    .format(Self::FORMAT)
                    .extent(vk::Extent3D {
                        width: size,
                        height: size,
                        depth: 1,
                    })
                    .mip_levels(1)
                    .array_layers(1)
                    .samples(vk::SampleCountFlags::TYPE_1)
                    .tiling(vk::ImageTiling::LINEAR)
                    .usage(vk::ImageUsageFlags::SAMPLED)
                    .sharing_mode(vk::SharingMode::EXCLUSIVE)
                    .initial_layout(vk::ImageLayout::PREINITIALIZED),
            )
            .map_err(GraphicsError::ImageCreationFailed)?;

        let mut texture = Self {
            context,
            image,
            allocation: None,
            view: vk::ImageView::null(),
            sampler: vk::Sampler::null(),
            extent,
        };

        let requirements = texture.context.image_memory_requirements(image);
        let allocation = memory::allocate(
            &*texture.context,
            &requirements,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        )?;
        texture.allocation = Some(allocation);
        texture
            .context
            .bind_image_memory(image, allocation.memory, 0)
            .map_err(GraphicsError::MemoryBindFailed)?;

        texture.upload(allocation, &checkerboard_texels(size))?;

        texture.view = texture
            .context
            .create_image_view(
                &vk::ImageViewCreateInfo::default()
                    .image(image)
                    .view_type(vk::ImageViewType::TYPE_2D)
                    .format(Self::FORMAT)
                    .components(vk::ComponentMapping {
                        r: vk::ComponentSwizzle::R,
                        g: vk::ComponentSwizzle::G,
                        b: vk::ComponentSwizzle::B,
                        a: vk::ComponentSwizzle::A,
                    })
                    .subresource_range(color_subresource_range()),
            )
            .map_err(|result| GraphicsError::ViewCreationFailed {
                base_layer: 0,
                layer_count: 1,
                result,
            })?;

        let anisotropy = texture.context.supports_sampler_anisotropy();
        texture.sampler = unsafe {
            texture.context.device().create_sampler(
                &vk::SamplerCreateInfo::default()
                    .mag_filter(vk::Filter::LINEAR)
                    .min_filter(vk::Filter::LINEAR)
                    .mipmap_mode(vk::SamplerMipmapMode::LINEAR)
                    .address_mode_u(vk::SamplerAddressMode::REPEAT)
                    .address_mode_v(vk::SamplerAddressMode::REPEAT)
                    .address_mode_w(vk::SamplerAddressMode::REPEAT)
                    .anisotropy_enable(anisotropy)
                    .max_anisotropy(if anisotropy { 8.0 } else { 1.0 })
                    .compare_op(vk::CompareOp::NEVER)
                    .border_color(vk::BorderColor::FLOAT_OPAQUE_WHITE),
                None,
            )
        }
        .map_err(GraphicsError::SamplerCreationFailed)?;

        log::debug!("created {size}x{size} checkerboard texture (anisotropy: {anisotropy})");
        Ok(texture)
    }

    /// Write tightly packed texels row by row, honouring the driver's row pitch.
    fn upload(&self, allocation: Allocation, texels: &[u8]) -> Result<(), GraphicsError> {
        let device = self.context.device();
        let layout = unsafe {
            device.get_image_subresource_layout(
                self.image,
                vk::ImageSubresource {
                    aspect_mask: vk::ImageAspectFlags::COLOR,
                    mip_level: 0,
                    array_layer: 0,
                },
            )
        };
        let row_bytes = self.extent.width as usize * TEXEL_SIZE;

        unsafe {
            let ptr = device
                .map_memory(
                    allocation.memory,
                    0,
                    vk::WHOLE_SIZE,
                    vk::MemoryMapFlags::empty(),
                )
                .map_err(GraphicsError::MemoryMapFailed)?
                .cast::<u8>()
                .add(layout.offset as usize);
            for (row, src) in texels.chunks_exact(row_bytes).enumerate() {
                let dst = ptr.add(row * layout.row_pitch as usize);
                std::ptr::copy_nonoverlapping(src.as_ptr(), dst, row_bytes);
            }
            device.unmap_memory(allocation.memory);
        }
        Ok(())
    }

    /// Move the image from `PREINITIALIZED` to `SHADER_READ_ONLY_OPTIMAL`,
    /// making the host writes visible to fragment shader reads.
    pub fn record_layout_transition(&self, command_buffer: vk::CommandBuffer) {
        let barrier = vk::ImageMemoryBarrier::default()
            .src_access_mask(vk::AccessFlags::HOST_WRITE)
            .dst_access_mask(vk::AccessFlags::SHADER_READ)
            .old_layout(vk::ImageLayout::PREINITIALIZED)
            .new_layout(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL)
            .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .image(self.image)
            .subresource_range(color_subresource_range());

        unsafe {
            self.context.device().cmd_pipeline_barrier(
                command_buffer,
                vk::PipelineStageFlags::HOST,
                vk::PipelineStageFlags::FRAGMENT_SHADER,
                vk::DependencyFlags::empty(),
                &[],
                &[],
                &[barrier],
            );
        }
    }

    pub fn view(&self) -> vk::ImageView {
        self.view
    }

    pub fn sampler(&self) -> vk::Sampler {
        self.sampler
    }

    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }
}

fn color_subresource_range() -> vk::ImageSubresourceRange {
    vk::ImageSubresourceRange {
        aspect_mask: vk::ImageAspectFlags::COLOR,
        base_mip_level: 0,
        level_count: 1,
        base_array_layer: 0,
        layer_count: 1,
    }
}

impl Drop for Texture {
    fn drop(&mut self) {
        if self.sampler != vk::Sampler::null() {
            unsafe { self.context.device().destroy_sampler(self.sampler, None) };
        }
        if self.view != vk::ImageView::null() {
            self.context.destroy_image_view(self.view);
        }
        self.context.destroy_image(self.image);
        if let Some(allocation) = self.allocation.take() {
            self.context.free_memory(allocation.memory);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texel(texels: &[u8], size: u32, x: u32, y: u32) -> [u8; 4] {
        let i = ((y * size + x) as usize) * TEXEL_SIZE;
        [texels[i], texels[i + 1], texels[i + 2], texels[i + 3]]
    }

    #[test]
    fn checkerboard_is_tightly_packed() {
        let texels = checkerboard_texels(CHECKERBOARD_SIZE);
        assert_eq!(texels.len(), 64 * 64 * 4);
    }

    #[test]
    fn checkerboard_alternates_every_sixteen_texels() {
        const MAGENTA: [u8; 4] = [0xFF, 0x00, 0xFF, 0xFF];
        const GREEN: [u8; 4] = [0x00, 0xFF, 0x00, 0xFF];
        let texels = checkerboard_texels(CHECKERBOARD_SIZE);

        assert_eq!(texel(&texels, 64, 0, 0), GREEN);
        assert_eq!(texel(&texels, 64, 15, 15), GREEN);
        assert_eq!(texel(&texels, 64, 16, 0), MAGENTA);
        assert_eq!(texel(&texels, 64, 0, 16), MAGENTA);
        assert_eq!(texel(&texels, 64, 16, 16), GREEN);
        assert_eq!(texel(&texels, 64, 63, 32), MAGENTA);
    }

    #[test]
    fn every_texel_is_opaque() {
        let texels = checkerboard_texels(CHECKERBOARD_SIZE);
        assert!(texels.chunks_exact(4).all(|t| t[3] == 0xFF));
    }
}
