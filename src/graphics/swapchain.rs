//! Swapchain negotiation and the per-image views rendered into

use crate::{
    error::{CrateResult, DemoError},
    graphics::context::{GraphicsContext, VulkanContext},
};
use ash::vk;
use std::sync::Arc;

/// `MAILBOX` when offered, otherwise the first reported mode.
pub fn choose_present_mode(available: &[vk::PresentModeKHR]) -> Option<vk::PresentModeKHR> {
    available
        .iter()
        .copied()
        .find(|&mode| mode == vk::PresentModeKHR::MAILBOX)
        .or_else(|| available.first().copied())
}

/// One more than the minimum, capped by the maximum (0 means no maximum).
pub fn choose_image_count(capabilities: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let desired = capabilities.min_image_count + 1;
    if capabilities.max_image_count > 0 {
        desired.min(capabilities.max_image_count)
    } else {
        desired
    }
}

/// The surface's current extent, or `preferred` clamped to the supported
/// range when the surface lets the swapchain decide.
pub fn choose_extent(
    capabilities: &vk::SurfaceCapabilitiesKHR,
    preferred: vk::Extent2D,
) -> vk::Extent2D {
    if capabilities.current_extent.width != u32::MAX {
        return capabilities.current_extent;
    }
    let min = capabilities.min_image_extent;
    let max = capabilities.max_image_extent;
    vk::Extent2D {
        width: preferred.width.clamp(min.width, max.width.max(min.width)),
        height: preferred.height.clamp(min.height, max.height.max(min.height)),
    }
}

/// A swapchain together with its images and one color view per image
pub struct SwapchainBundle {
    context: Arc<VulkanContext>,
    loader: ash::khr::swapchain::Device,
    swapchain: vk::SwapchainKHR,
    format: vk::SurfaceFormatKHR,
    extent: vk::Extent2D,
    images: Vec<vk::Image>,
    views: Vec<vk::ImageView>,
}

impl SwapchainBundle {
    pub fn new(context: Arc<VulkanContext>, preferred_extent: vk::Extent2D) -> CrateResult<Self> {
        let surface_loader = context.surface_loader();
        let physical_device = context.physical_device();
        let surface = context.surface();

        let (formats, present_modes, capabilities) = unsafe {
            (
                surface_loader.get_physical_device_surface_formats(physical_device, surface)?,
                surface_loader
                    .get_physical_device_surface_present_modes(physical_device, surface)?,
                surface_loader
                    .get_physical_device_surface_capabilities(physical_device, surface)?,
            )
        };

        let format = *formats.first().ok_or(DemoError::NoSurfaceFormat)?;
        let present_mode = choose_present_mode(&present_modes).ok_or(DemoError::NoPresentMode)?;
        let image_count = choose_image_count(&capabilities);
        let extent = choose_extent(&capabilities, preferred_extent);
        if extent.width == 0 || extent.height == 0 {
            return Err(DemoError::UnsizedWindow(extent.width, extent.height));
        }

        let loader = ash::khr::swapchain::Device::new(context.instance(), context.device());
        let swapchain = unsafe {
            loader.create_swapchain(
                &vk::SwapchainCreateInfoKHR::default()
                    .surface(surface)
                    .min_image_count(image_count)
                    .image_format(format.format)
                    .image_color_space(format.color_space)
                    .image_extent(extent)
                    .image_array_layers(1)
                    .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
                    .image_sharing_mode(vk::SharingMode::EXCLUSIVE)
                    .pre_transform(vk::SurfaceTransformFlagsKHR::IDENTITY)
                    .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
                    .present_mode(present_mode)
                    .clipped(true),
                None,
            )?
        };

        log::info!(
            "Swapchain: {}x{}, {:?}/{:?}, {:?}, {} images requested",
            extent.width,
            extent.height,
            format.format,
            format.color_space,
            present_mode,
            image_count
        );

        let mut bundle = Self {
            context,
            loader,
            swapchain,
            format,
            extent,
            images: Vec::new(),
            views: Vec::new(),
        };

        bundle.images = unsafe { bundle.loader.get_swapchain_images(swapchain)? };
        for &image in &bundle.images {
            let view = bundle.context.create_image_view(
                &vk::ImageViewCreateInfo::default()
                    .image(image)
                    .view_type(vk::ImageViewType::TYPE_2D)
                    .format(format.format)
                    .components(vk::ComponentMapping {
                        r: vk::ComponentSwizzle::R,
                        g: vk::ComponentSwizzle::G,
                        b: vk::ComponentSwizzle::B,
                        a: vk::ComponentSwizzle::A,
                    })
                    .subresource_range(vk::ImageSubresourceRange {
                        aspect_mask: vk::ImageAspectFlags::COLOR,
                        base_mip_level: 0,
                        level_count: 1,
                        base_array_layer: 0,
                        layer_count: 1,
                    }),
            )?;
            bundle.views.push(view);
        }

        Ok(bundle)
    }

    /// Block until the next image is available, signalling `semaphore` when it can be rendered.
    ///
    /// A suboptimal swapchain is logged and used anyway.
    pub fn acquire_next_image(&self, semaphore: vk::Semaphore) -> CrateResult<u32> {
        let (index, suboptimal) = unsafe {
            self.loader
                .acquire_next_image(self.swapchain, u64::MAX, semaphore, vk::Fence::null())?
        };
        if suboptimal {
            log::warn!("swapchain is suboptimal for the surface");
        }
        Ok(index)
    }

    /// Queue image `index` for presentation once `wait_semaphore` is signalled.
    pub fn present(
        &self,
        queue: vk::Queue,
        index: u32,
        wait_semaphore: vk::Semaphore,
    ) -> CrateResult<()> {
        let wait_semaphores = [wait_semaphore];
        let swapchains = [self.swapchain];
        let image_indices = [index];
        let suboptimal = unsafe {
            self.loader.queue_present(
                queue,
                &vk::PresentInfoKHR::default()
                    .wait_semaphores(&wait_semaphores)
                    .swapchains(&swapchains)
                    .image_indices(&image_indices),
            )?
        };
        if suboptimal {
            log::warn!("swapchain is suboptimal for the surface");
        }
        Ok(())
    }

    pub fn format(&self) -> vk::Format {
        self.format.format
    }

    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    pub fn views(&self) -> &[vk::ImageView] {
        &self.views
    }
}

impl Drop for SwapchainBundle {
    fn drop(&mut self) {
        for view in self.views.drain(..) {
            self.context.destroy_image_view(view);
        }
        unsafe { self.loader.destroy_swapchain(self.swapchain, None) };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn capabilities(min: u32, max: u32) -> vk::SurfaceCapabilitiesKHR {
        vk::SurfaceCapabilitiesKHR {
            min_image_count: min,
            max_image_count: max,
            current_extent: vk::Extent2D {
                width: u32::MAX,
                height: u32::MAX,
            },
            min_image_extent: vk::Extent2D {
                width: 1,
                height: 1,
            },
            max_image_extent: vk::Extent2D {
                width: 4096,
                height: 4096,
            },
            ..Default::default()
        }
    }

    #[test]
    fn mailbox_is_preferred() {
        let modes = [
            vk::PresentModeKHR::FIFO,
            vk::PresentModeKHR::IMMEDIATE,
            vk::PresentModeKHR::MAILBOX,
        ];
        assert_eq!(choose_present_mode(&modes), Some(vk::PresentModeKHR::MAILBOX));
    }

    #[test]
    fn falls_back_to_first_present_mode() {
        let modes = [vk::PresentModeKHR::IMMEDIATE, vk::PresentModeKHR::FIFO];
        assert_eq!(choose_present_mode(&modes), Some(vk::PresentModeKHR::IMMEDIATE));
        assert_eq!(choose_present_mode(&[]), None);
    }

    #[test]
    fn image_count_is_min_plus_one_within_max() {
        assert_eq!(choose_image_count(&capabilities(2, 8)), 3);
        assert_eq!(choose_image_count(&capabilities(2, 2)), 2);
        assert_eq!(choose_image_count(&capabilities(3, 0)), 4);
    }

    #[test]
    fn extent_follows_the_surface_when_fixed() {
        let mut caps = capabilities(2, 0);
        caps.current_extent = vk::Extent2D {
            width: 800,
            height: 600,
        };
        let preferred = vk::Extent2D {
            width: 1280,
            height: 720,
        };
        assert_eq!(choose_extent(&caps, preferred), caps.current_extent);
    }

    #[test]
    fn extent_is_clamped_when_free() {
        let caps = capabilities(2, 0);
        let preferred = vk::Extent2D {
            width: 1280,
            height: 720,
        };
        assert_eq!(choose_extent(&caps, preferred), preferred);

        let huge = vk::Extent2D {
            width: 10_000,
            height: 0,
        };
        assert_eq!(
            choose_extent(&caps, huge),
            vk::Extent2D {
                width: 4096,
                height: 1
            }
        );
    }
}
