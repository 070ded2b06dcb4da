//! The device context the rest of the graphics module is built on
//!
//! [`GraphicsContext`] is the narrow contract the render-target allocator
//! consumes: create/destroy images, views and memory, query an image's memory
//! requirements, and list the device's memory types. [`VulkanContext`] is the
//! ash implementation, and additionally owns the instance, surface, device and
//! graphics queue that the renderer drives directly.

use crate::{
    error::CrateResult,
    graphics::device::{create_instance, create_logical_device, select_physical_device},
};
use ash::{prelude::VkResult, vk, Device, Entry, Instance};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};

/// Creation, query and destruction primitives for images, views and device memory.
///
/// Every call either returns an opaque handle or the API's error code.
/// Handles passed to the destroy/free calls must have come from the same
/// context and must not be in use by the device.
pub trait GraphicsContext {
    /// The device's memory types, in enumeration order.
    fn memory_types(&self) -> &[vk::MemoryType];

    fn create_image(&self, info: &vk::ImageCreateInfo<'_>) -> VkResult<vk::Image>;

    fn image_memory_requirements(&self, image: vk::Image) -> vk::MemoryRequirements;

    fn allocate_memory(&self, info: &vk::MemoryAllocateInfo<'_>) -> VkResult<vk::DeviceMemory>;

    fn bind_image_memory(
        &self,
        image: vk::Image,
        memory: vk::DeviceMemory,
        offset: vk::DeviceSize,
    ) -> VkResult<()>;

    fn create_image_view(&self, info: &vk::ImageViewCreateInfo<'_>) -> VkResult<vk::ImageView>;

    fn destroy_image_view(&self, view: vk::ImageView);

    fn destroy_image(&self, image: vk::Image);

    fn free_memory(&self, memory: vk::DeviceMemory);
}

/// Vulkan instance, window surface, logical device and graphics queue
pub struct VulkanContext {
    _entry: Entry,
    instance: Instance,
    surface_loader: ash::khr::surface::Instance,
    surface: vk::SurfaceKHR,
    physical_device: vk::PhysicalDevice,
    memory_properties: vk::PhysicalDeviceMemoryProperties,
    device: Device,
    queue_family_index: u32,
    queue: vk::Queue,
    device_name: String,
    sampler_anisotropy: bool,
}

impl VulkanContext {
    /// Load Vulkan, create an instance and a surface for `window`, then pick a
    /// device with a queue family that can both draw and present to it.
    pub fn new<W>(app_name: &str, window: &W) -> CrateResult<Self>
    where
        W: HasDisplayHandle + HasWindowHandle,
    {
        let display_handle = window.display_handle()?.as_raw();
        let window_handle = window.window_handle()?.as_raw();

        unsafe {
            // Load Vulkan entry point
            let entry = Entry::load()?;

            let instance = create_instance(&entry, app_name, display_handle)?;
            let instance_guard = SetupGuard::new({
                let instance = instance.clone();
                move || instance.destroy_instance(None)
            });

            let surface =
                ash_window::create_surface(&entry, &instance, display_handle, window_handle, None)?;
            let surface_loader = ash::khr::surface::Instance::new(&entry, &instance);
            let surface_guard = SetupGuard::new({
                let surface_loader = surface_loader.clone();
                move || surface_loader.destroy_surface(surface, None)
            });

            let (physical_device, queue_family_index) =
                select_physical_device(&instance, &surface_loader, surface)?;

            let properties = instance.get_physical_device_properties(physical_device);
            let device_name = std::ffi::CStr::from_ptr(properties.device_name.as_ptr())
                .to_string_lossy()
                .to_string();
            log::info!(
                "Selected device: {} (type: {:?}, queue family {})",
                device_name,
                properties.device_type,
                queue_family_index
            );

            let memory_properties = instance.get_physical_device_memory_properties(physical_device);
            let features = instance.get_physical_device_features(physical_device);
            let sampler_anisotropy = features.sampler_anisotropy == vk::TRUE;

            let device = create_logical_device(
                &instance,
                physical_device,
                queue_family_index,
                sampler_anisotropy,
            )?;
            let queue = device.get_device_queue(queue_family_index, 0);

            // From here on `Drop for VulkanContext` owns the surface and instance
            surface_guard.disarm();
            instance_guard.disarm();

            Ok(Self {
                _entry: entry,
                instance,
                surface_loader,
                surface,
                physical_device,
                memory_properties,
                device,
                queue_family_index,
                queue,
                device_name,
                sampler_anisotropy,
            })
        }
    }

    pub fn instance(&self) -> &Instance {
        &self.instance
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    pub fn physical_device(&self) -> vk::PhysicalDevice {
        self.physical_device
    }

    pub fn surface(&self) -> vk::SurfaceKHR {
        self.surface
    }

    pub fn surface_loader(&self) -> &ash::khr::surface::Instance {
        &self.surface_loader
    }

    pub fn queue(&self) -> vk::Queue {
        self.queue
    }

    pub fn queue_family_index(&self) -> u32 {
        self.queue_family_index
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    /// Whether the device was created with the sampler anisotropy feature enabled.
    pub fn supports_sampler_anisotropy(&self) -> bool {
        self.sampler_anisotropy
    }

    /// Block until the graphics queue has finished all submitted work.
    pub fn wait_queue_idle(&self) -> VkResult<()> {
        unsafe { self.device.queue_wait_idle(self.queue) }
    }
}

/// Runs its cleanup on drop unless disarmed
///
/// Covers the window between creating an object and handing it to an owner
/// whose `Drop` releases it, so an early `?` return does not leak it.
struct SetupGuard<F: FnOnce()> {
    cleanup: Option<F>,
}

impl<F: FnOnce()> SetupGuard<F> {
    fn new(cleanup: F) -> Self {
        Self {
            cleanup: Some(cleanup),
        }
    }

    fn disarm(mut self) {
        self.cleanup = None;
    }
}

impl<F: FnOnce()> Drop for SetupGuard<F> {
    fn drop(&mut self) {
        if let Some(cleanup) = self.cleanup.take() {
            cleanup();
        }
    }
}

impl GraphicsContext for VulkanContext {
    fn memory_types(&self) -> &[vk::MemoryType] {
        let count = self.memory_properties.memory_type_count as usize;
        &self.memory_properties.memory_types[..count.min(vk::MAX_MEMORY_TYPES)]
    }

    fn create_image(&self, info: &vk::ImageCreateInfo<'_>) -> VkResult<vk::Image> {
        unsafe { self.device.create_image(info, None) }
    }

    fn image_memory_requirements(&self, image: vk::Image) -> vk::MemoryRequirements {
        unsafe { self.device.get_image_memory_requirements(image) }
    }

    fn allocate_memory(&self, info: &vk::MemoryAllocateInfo<'_>) -> VkResult<vk::DeviceMemory> {
        unsafe { self.device.allocate_memory(info, None) }
    }

    fn bind_image_memory(
        &self,
        image: vk::Image,
        memory: vk::DeviceMemory,
        offset: vk::DeviceSize,
    ) -> VkResult<()> {
        unsafe { self.device.bind_image_memory(image, memory, offset) }
    }

    fn create_image_view(&self, info: &vk::ImageViewCreateInfo<'_>) -> VkResult<vk::ImageView> {
        unsafe { self.device.create_image_view(info, None) }
    }

    fn destroy_image_view(&self, view: vk::ImageView) {
        unsafe { self.device.destroy_image_view(view, None) }
    }

    fn destroy_image(&self, image: vk::Image) {
        unsafe { self.device.destroy_image(image, None) }
    }

    fn free_memory(&self, memory: vk::DeviceMemory) {
        unsafe { self.device.free_memory(memory, None) }
    }
}

impl Drop for VulkanContext {
    fn drop(&mut self) {
        unsafe {
            if let Err(e) = self.device.device_wait_idle() {
                log::warn!("device_wait_idle failed during teardown: {e}");
            }
            self.device.destroy_device(None);
            self.surface_loader.destroy_surface(self.surface, None);
            self.instance.destroy_instance(None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[test]
    fn guard_runs_cleanup_on_early_return() {
        let released = RefCell::new(Vec::new());

        let setup = || -> Result<(), &'static str> {
            let _instance = SetupGuard::new(|| released.borrow_mut().push("instance"));
            let _surface = SetupGuard::new(|| released.borrow_mut().push("surface"));
            Err("no suitable device")
        };

        assert_eq!(setup(), Err("no suitable device"));
        // Released in reverse order of creation
        assert_eq!(*released.borrow(), vec!["surface", "instance"]);
    }

    #[test]
    fn disarmed_guard_leaves_object_alive() {
        let released = RefCell::new(Vec::new());

        let instance = SetupGuard::new(|| released.borrow_mut().push("instance"));
        let surface = SetupGuard::new(|| released.borrow_mut().push("surface"));
        surface.disarm();
        instance.disarm();

        assert!(released.borrow().is_empty());
    }
}
