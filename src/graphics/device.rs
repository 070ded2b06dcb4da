//! Instance and device setup for graphics rendering
//!
//! This module handles finding and creating a Vulkan device that supports
//! both graphics operations and presentation to a window surface.

use crate::error::{CrateResult, DemoError};
use ash::{prelude::VkResult, vk, Device, Entry, Instance};
use raw_window_handle::RawDisplayHandle;
use std::ffi::{CStr, CString};

/// Create a Vulkan instance with the extensions required for windowing
pub fn create_instance(
    entry: &Entry,
    app_name: &str,
    display_handle: RawDisplayHandle,
) -> CrateResult<Instance> {
    let app_name = CString::new(app_name).map_err(|e| DemoError::Other(e.to_string()))?;
    let engine_name = c"ash-triangle-demo";

    let app_info = vk::ApplicationInfo::default()
        .application_name(&app_name)
        .application_version(vk::make_api_version(0, 1, 0, 0))
        .engine_name(engine_name)
        .engine_version(vk::make_api_version(0, 1, 0, 0))
        .api_version(vk::API_VERSION_1_0);

    #[allow(unused_mut)] // Only modified on macOS
    let mut extension_names = ash_window::enumerate_required_extensions(display_handle)?.to_vec();
    #[allow(unused_mut)] // Only modified on macOS
    let mut create_flags = vk::InstanceCreateFlags::empty();

    // Enable portability extensions for MoltenVK on macOS
    #[cfg(target_os = "macos")]
    {
        extension_names.push(ash::khr::portability_enumeration::NAME.as_ptr());
        extension_names.push(ash::khr::get_physical_device_properties2::NAME.as_ptr());
        create_flags |= vk::InstanceCreateFlags::ENUMERATE_PORTABILITY_KHR;
    }

    let instance = unsafe {
        entry.create_instance(
            &vk::InstanceCreateInfo::default()
                .application_info(&app_info)
                .enabled_extension_names(&extension_names)
                .flags(create_flags),
            None,
        )?
    };
    Ok(instance)
}

/// Find a suitable physical device and queue family for graphics + presentation
///
/// This function filters devices by:
/// 1. Support for the swapchain extension (required for presentation)
/// 2. A queue family that supports both GRAPHICS operations and surface presentation
/// 3. Preference for discrete GPUs over integrated/virtual/CPU devices
pub fn select_physical_device(
    instance: &Instance,
    surface_loader: &ash::khr::surface::Instance,
    surface: vk::SurfaceKHR,
) -> CrateResult<(vk::PhysicalDevice, u32)> {
    let physical_devices = unsafe { instance.enumerate_physical_devices()? };
    let device_count = physical_devices.len();

    physical_devices
        .into_iter()
        .filter(|&p| supports_swapchain(instance, p))
        .filter_map(|p| {
            let families = unsafe { instance.get_physical_device_queue_family_properties(p) };
            families
                .iter()
                .enumerate()
                .position(|(i, q)| {
                    q.queue_flags.contains(vk::QueueFlags::GRAPHICS)
                        && unsafe {
                            surface_loader
                                .get_physical_device_surface_support(p, i as u32, surface)
                                .unwrap_or(false)
                        }
                })
                .map(|q| (p, q as u32))
        })
        .min_by_key(|&(p, _)| {
            let properties = unsafe { instance.get_physical_device_properties(p) };
            device_type_rank(properties.device_type)
        })
        .ok_or(DemoError::NoVulkanDevice(device_count))
}

/// Prefer discrete GPUs, then integrated, then virtual, then CPU
pub fn device_type_rank(device_type: vk::PhysicalDeviceType) -> u8 {
    match device_type {
        vk::PhysicalDeviceType::DISCRETE_GPU => 0,
        vk::PhysicalDeviceType::INTEGRATED_GPU => 1,
        vk::PhysicalDeviceType::VIRTUAL_GPU => 2,
        vk::PhysicalDeviceType::CPU => 3,
        _ => 4,
    }
}

fn supports_swapchain(instance: &Instance, physical_device: vk::PhysicalDevice) -> bool {
    let extensions =
        match unsafe { instance.enumerate_device_extension_properties(physical_device) } {
            Ok(extensions) => extensions,
            Err(_) => return false,
        };
    extensions.iter().any(|ext| {
        let name = unsafe { CStr::from_ptr(ext.extension_name.as_ptr()) };
        name == ash::khr::swapchain::NAME
    })
}

/// Create the logical device with one graphics queue and the swapchain extension
pub fn create_logical_device(
    instance: &Instance,
    physical_device: vk::PhysicalDevice,
    queue_family_index: u32,
    sampler_anisotropy: bool,
) -> VkResult<Device> {
    let queue_priorities = [1.0];
    let queue_info = vk::DeviceQueueCreateInfo::default()
        .queue_family_index(queue_family_index)
        .queue_priorities(&queue_priorities);
    let queue_infos = [queue_info];

    let device_features = vk::PhysicalDeviceFeatures::default().sampler_anisotropy(sampler_anisotropy);

    #[allow(unused_mut)] // Only modified on macOS
    let mut device_extension_names = vec![ash::khr::swapchain::NAME.as_ptr()];

    // MoltenVK exposes the portability subset and requires it to be enabled
    #[cfg(target_os = "macos")]
    device_extension_names.push(ash::khr::portability_subset::NAME.as_ptr());

    unsafe {
        instance.create_device(
            physical_device,
            &vk::DeviceCreateInfo::default()
                .queue_create_infos(&queue_infos)
                .enabled_features(&device_features)
                .enabled_extension_names(&device_extension_names),
            None,
        )
    }
}

/// Depth formats tried, in order, for the depth attachment.
pub const DEPTH_FORMAT_CANDIDATES: [vk::Format; 2] = [vk::Format::D32_SFLOAT, vk::Format::D16_UNORM];

/// Pick the first candidate whose optimal-tiling features allow depth attachments
pub fn select_depth_format(
    candidates: &[vk::Format],
    mut optimal_features: impl FnMut(vk::Format) -> vk::FormatFeatureFlags,
) -> Option<vk::Format> {
    candidates.iter().copied().find(|&format| {
        optimal_features(format).contains(vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT)
    })
}

/// Find a depth format usable as an optimal-tiling attachment
pub fn find_depth_format(
    instance: &Instance,
    physical_device: vk::PhysicalDevice,
) -> CrateResult<vk::Format> {
    select_depth_format(&DEPTH_FORMAT_CANDIDATES, |format| unsafe {
        instance
            .get_physical_device_format_properties(physical_device, format)
            .optimal_tiling_features
    })
    .ok_or_else(|| DemoError::NoSupportedDepthFormat(DEPTH_FORMAT_CANDIDATES.to_vec()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discrete_gpus_rank_first() {
        let mut types = [
            vk::PhysicalDeviceType::CPU,
            vk::PhysicalDeviceType::OTHER,
            vk::PhysicalDeviceType::INTEGRATED_GPU,
            vk::PhysicalDeviceType::DISCRETE_GPU,
            vk::PhysicalDeviceType::VIRTUAL_GPU,
        ];
        types.sort_by_key(|&t| device_type_rank(t));
        assert_eq!(
            types,
            [
                vk::PhysicalDeviceType::DISCRETE_GPU,
                vk::PhysicalDeviceType::INTEGRATED_GPU,
                vk::PhysicalDeviceType::VIRTUAL_GPU,
                vk::PhysicalDeviceType::CPU,
                vk::PhysicalDeviceType::OTHER,
            ]
        );
    }

    #[test]
    fn depth_format_prefers_earlier_candidates() {
        let all = |_: vk::Format| vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT;
        assert_eq!(
            select_depth_format(&DEPTH_FORMAT_CANDIDATES, all),
            Some(vk::Format::D32_SFLOAT)
        );
    }

    #[test]
    fn depth_format_skips_unsupported() {
        let only_d16 = |format: vk::Format| {
            if format == vk::Format::D16_UNORM {
                vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT
                    | vk::FormatFeatureFlags::SAMPLED_IMAGE
            } else {
                vk::FormatFeatureFlags::SAMPLED_IMAGE
            }
        };
        assert_eq!(
            select_depth_format(&DEPTH_FORMAT_CANDIDATES, only_d16),
            Some(vk::Format::D16_UNORM)
        );
        assert_eq!(
            select_depth_format(&DEPTH_FORMAT_CANDIDATES, |_| vk::FormatFeatureFlags::empty()),
            None
        );
    }
}
