//! Conversions between crate types and Vulkan types.

use ash::vk;
use gpu_allocator::MemoryLocation;

use crate::backend::DeviceError;
use crate::types::{BufferDescriptor, BufferKind, BufferUsage, MemoryProfile};

/// Convert buffer usage flags to Vulkan usage flags.
pub fn convert_buffer_usage(usage: BufferUsage) -> vk::BufferUsageFlags {
    let mut result = vk::BufferUsageFlags::empty();

    if usage.contains(BufferUsage::VERTEX) {
        result |= vk::BufferUsageFlags::VERTEX_BUFFER;
    }
    if usage.contains(BufferUsage::INDEX) {
        result |= vk::BufferUsageFlags::INDEX_BUFFER;
    }
    if usage.contains(BufferUsage::COPY_SRC) {
        result |= vk::BufferUsageFlags::TRANSFER_SRC;
    }
    if usage.contains(BufferUsage::COPY_DST) {
        result |= vk::BufferUsageFlags::TRANSFER_DST;
    }

    result
}

/// Pick the gpu-allocator memory location for a buffer.
pub fn memory_location(descriptor: &BufferDescriptor) -> MemoryLocation {
    match (descriptor.kind, descriptor.profile) {
        (BufferKind::Staging, _) => MemoryLocation::CpuToGpu,
        (_, MemoryProfile::Automatic | MemoryProfile::DeviceOnly) => MemoryLocation::GpuOnly,
        (_, MemoryProfile::CpuOnly) => MemoryLocation::GpuToCpu,
        (_, MemoryProfile::TransferFriendly) => MemoryLocation::CpuToGpu,
    }
}

/// Map a Vulkan result code to a device error, naming the failed operation.
pub fn convert_result(result: vk::Result, operation: &str) -> DeviceError {
    match result {
        vk::Result::ERROR_OUT_OF_DEVICE_MEMORY | vk::Result::ERROR_OUT_OF_HOST_MEMORY => {
            DeviceError::OutOfMemory
        }
        vk::Result::ERROR_DEVICE_LOST => DeviceError::DeviceLost,
        other => DeviceError::CopyFailed(format!("Failed to {}: {:?}", operation, other)),
    }
}
