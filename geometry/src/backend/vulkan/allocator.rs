//! GPU memory allocator integration using gpu-allocator.

use ash::vk;
use gpu_allocator::AllocationError;
use gpu_allocator::vulkan::{Allocator, AllocatorCreateDesc};

use crate::backend::DeviceError;

/// Create a memory allocator for the Vulkan device.
pub fn create_allocator(
    instance: &ash::Instance,
    physical_device: vk::PhysicalDevice,
    device: ash::Device,
) -> Result<Allocator, DeviceError> {
    Allocator::new(&AllocatorCreateDesc {
        instance: instance.clone(),
        device,
        physical_device,
        debug_settings: Default::default(),
        buffer_device_address: false,
        allocation_sizes: gpu_allocator::AllocationSizes::default(),
    })
    .map_err(|e| {
        DeviceError::InitializationFailed(format!("Failed to create memory allocator: {}", e))
    })
}

/// Map an allocator failure to a device error.
pub fn convert_allocation_error(error: AllocationError) -> DeviceError {
    match error {
        AllocationError::OutOfMemory => DeviceError::OutOfMemory,
        other => {
            DeviceError::ResourceCreationFailed(format!("Failed to allocate buffer memory: {}", other))
        }
    }
}
