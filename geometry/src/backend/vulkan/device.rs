//! Vulkan physical and logical device management.

use std::ffi::CStr;

use ash::vk;

use crate::backend::DeviceError;

/// Select the physical device that will own geometry buffers.
///
/// Prefers discrete GPUs, then integrated GPUs, then anything else that
/// exposes a graphics queue.
pub fn select_physical_device(instance: &ash::Instance) -> Result<vk::PhysicalDevice, DeviceError> {
    let devices = unsafe { instance.enumerate_physical_devices() }.map_err(|e| {
        DeviceError::InitializationFailed(format!("Failed to enumerate physical devices: {:?}", e))
    })?;

    if devices.is_empty() {
        return Err(DeviceError::InitializationFailed(
            "No Vulkan-capable GPU found".to_string(),
        ));
    }

    let mut best_device = None;
    let mut best_score = 0;

    for device in devices {
        if find_graphics_queue_family(instance, device).is_err() {
            continue;
        }

        let properties = unsafe { instance.get_physical_device_properties(device) };

        // Every usable device scores at least 1 so software rasterizers still qualify.
        let mut score = 1;
        if properties.device_type == vk::PhysicalDeviceType::DISCRETE_GPU {
            score += 1000;
        } else if properties.device_type == vk::PhysicalDeviceType::INTEGRATED_GPU {
            score += 100;
        }

        let device_name = unsafe { CStr::from_ptr(properties.device_name.as_ptr()) };
        log::info!(
            "Found GPU: {:?} (type: {:?}, score: {})",
            device_name,
            properties.device_type,
            score
        );

        if score > best_score {
            best_score = score;
            best_device = Some(device);
        }
    }

    best_device
        .ok_or_else(|| DeviceError::InitializationFailed("No suitable GPU found".to_string()))
}

/// Find a queue family that supports graphics operations.
///
/// Geometry buffers are created with exclusive sharing, so copies go through
/// the same family the renderer draws on.
pub fn find_graphics_queue_family(
    instance: &ash::Instance,
    physical_device: vk::PhysicalDevice,
) -> Result<u32, DeviceError> {
    let queue_families =
        unsafe { instance.get_physical_device_queue_family_properties(physical_device) };

    queue_families
        .iter()
        .position(|family| family.queue_flags.contains(vk::QueueFlags::GRAPHICS))
        .map(|index| index as u32)
        .ok_or_else(|| {
            DeviceError::InitializationFailed("No graphics queue family found".to_string())
        })
}

/// Create a logical device with a single graphics queue.
pub fn create_logical_device(
    instance: &ash::Instance,
    physical_device: vk::PhysicalDevice,
    queue_family: u32,
) -> Result<ash::Device, DeviceError> {
    let queue_priorities = [1.0f32];
    let queue_create_infos = [vk::DeviceQueueCreateInfo::default()
        .queue_family_index(queue_family)
        .queue_priorities(&queue_priorities)];

    let features = vk::PhysicalDeviceFeatures::default();

    let create_info = vk::DeviceCreateInfo::default()
        .queue_create_infos(&queue_create_infos)
        .enabled_features(&features);

    unsafe { instance.create_device(physical_device, &create_info, None) }.map_err(|e| {
        DeviceError::InitializationFailed(format!("Failed to create logical device: {:?}", e))
    })
}
