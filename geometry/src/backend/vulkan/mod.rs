//! Native Vulkan backend implementation using ash.
//!
//! Buffers are allocated through gpu-allocator. Every device copy is recorded
//! into a one-time command buffer, submitted to the graphics queue and waited
//! on with a fence before returning. Host-visible allocations are persistently
//! mapped by gpu-allocator, so mapping hands out the allocation's pointer.

mod allocator;
mod command;
pub(crate) mod conversion;
mod debug;
mod device;
mod instance;

use std::mem::ManuallyDrop;
use std::ptr::NonNull;

use ash::vk;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme, Allocator};
use parking_lot::Mutex;

use crate::config::DeviceParameters;
use crate::types::{BufferCopyRegion, BufferDescriptor};

use super::{DeviceError, GpuBackend, GpuBuffer};

use self::command::OneTimeCommands;
use self::conversion::{convert_buffer_usage, memory_location};

type AllocationSlot = Mutex<Option<Allocation>>;

/// Vulkan-based GPU backend using ash.
pub struct VulkanBackend {
    /// Vulkan entry points. Keeps the loader library alive.
    #[allow(dead_code)]
    entry: ash::Entry,
    instance: ash::Instance,
    debug_messenger: Option<vk::DebugUtilsMessengerEXT>,
    debug_utils: Option<ash::ext::debug_utils::Instance>,
    device: ash::Device,
    queue: vk::Queue,
    queue_family: u32,
    /// Dropped by hand before the device is destroyed.
    allocator: ManuallyDrop<Mutex<Allocator>>,
    /// Guards both the pool and queue submission, which Vulkan requires to be
    /// externally synchronized.
    command_pool: Mutex<vk::CommandPool>,
    validation_enabled: bool,
}

impl std::fmt::Debug for VulkanBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VulkanBackend")
            .field("queue_family", &self.queue_family)
            .field("validation_enabled", &self.validation_enabled)
            .finish_non_exhaustive()
    }
}

impl VulkanBackend {
    /// Create a new Vulkan backend.
    ///
    /// This initializes the Vulkan instance, selects a physical device,
    /// creates a logical device, and sets up the memory allocator.
    pub fn with_params(params: &DeviceParameters) -> Result<Self, DeviceError> {
        let entry = unsafe { ash::Entry::load() }.map_err(|e| {
            DeviceError::InitializationFailed(format!("Failed to load Vulkan: {}", e))
        })?;

        let validation_enabled = params.validation;
        let (instance, debug_messenger, debug_utils) =
            instance::create_instance(&entry, validation_enabled)?;

        let destroy_instance = |instance: &ash::Instance| unsafe {
            if let (Some(debug_utils), Some(messenger)) = (&debug_utils, debug_messenger) {
                debug_utils.destroy_debug_utils_messenger(messenger, None);
            }
            instance.destroy_instance(None);
        };

        let (physical_device, queue_family) = match device::select_physical_device(&instance)
            .and_then(|pd| Ok((pd, device::find_graphics_queue_family(&instance, pd)?)))
        {
            Ok(selection) => selection,
            Err(e) => {
                destroy_instance(&instance);
                return Err(e);
            }
        };

        let device =
            match device::create_logical_device(&instance, physical_device, queue_family) {
                Ok(device) => device,
                Err(e) => {
                    destroy_instance(&instance);
                    return Err(e);
                }
            };

        let queue = unsafe { device.get_device_queue(queue_family, 0) };

        let setup = allocator::create_allocator(&instance, physical_device, device.clone())
            .and_then(|allocator| {
                let pool = command::create_command_pool(&device, queue_family)?;
                Ok((allocator, pool))
            });
        let (allocator, command_pool) = match setup {
            Ok(parts) => parts,
            Err(e) => {
                unsafe { device.destroy_device(None) };
                destroy_instance(&instance);
                return Err(e);
            }
        };

        log::info!(
            "Vulkan backend initialized (validation: {})",
            validation_enabled
        );

        Ok(Self {
            entry,
            instance,
            debug_messenger,
            debug_utils,
            device,
            queue,
            queue_family,
            allocator: ManuallyDrop::new(Mutex::new(allocator)),
            command_pool: Mutex::new(command_pool),
            validation_enabled,
        })
    }

    /// Get the Vulkan device.
    pub fn device(&self) -> &ash::Device {
        &self.device
    }

    /// Get the queue family used for transfers.
    pub fn queue_family(&self) -> u32 {
        self.queue_family
    }

    fn raw<'a>(
        &self,
        buffer: &'a GpuBuffer,
    ) -> Result<(vk::Buffer, &'a AllocationSlot), DeviceError> {
        match buffer {
            GpuBuffer::Vulkan {
                buffer, allocation, ..
            } => Ok((*buffer, allocation)),
            #[allow(unreachable_patterns)]
            _ => Err(DeviceError::BackendMismatch(self.name())),
        }
    }
}

impl Drop for VulkanBackend {
    fn drop(&mut self) {
        unsafe {
            let _ = self.device.device_wait_idle();

            self.device
                .destroy_command_pool(*self.command_pool.get_mut(), None);

            // The allocator frees its memory blocks on drop and needs a live device.
            ManuallyDrop::drop(&mut self.allocator);

            self.device.destroy_device(None);

            if let (Some(debug_utils), Some(messenger)) = (&self.debug_utils, self.debug_messenger)
            {
                debug_utils.destroy_debug_utils_messenger(messenger, None);
            }

            self.instance.destroy_instance(None);
        }
    }
}

impl GpuBackend for VulkanBackend {
    fn name(&self) -> &'static str {
        "Vulkan Backend (ash)"
    }

    fn create_buffer(&self, descriptor: &BufferDescriptor) -> Result<GpuBuffer, DeviceError> {
        let usage = convert_buffer_usage(descriptor.usage());
        let location = memory_location(descriptor);

        let buffer_info = vk::BufferCreateInfo::default()
            .size(descriptor.size)
            .usage(usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        let buffer = unsafe { self.device.create_buffer(&buffer_info, None) }.map_err(|e| {
            DeviceError::ResourceCreationFailed(format!("Failed to create buffer: {:?}", e))
        })?;

        let requirements = unsafe { self.device.get_buffer_memory_requirements(buffer) };

        let allocation = self
            .allocator
            .lock()
            .allocate(&AllocationCreateDesc {
                name: descriptor.label.as_deref().unwrap_or("geometry buffer"),
                requirements,
                location,
                linear: true,
                allocation_scheme: AllocationScheme::GpuAllocatorManaged,
            })
            .map_err(allocator::convert_allocation_error);

        let allocation = match allocation {
            Ok(allocation) => allocation,
            Err(e) => {
                unsafe { self.device.destroy_buffer(buffer, None) };
                return Err(e);
            }
        };

        if let Err(e) = unsafe {
            self.device
                .bind_buffer_memory(buffer, allocation.memory(), allocation.offset())
        } {
            let _ = self.allocator.lock().free(allocation);
            unsafe { self.device.destroy_buffer(buffer, None) };
            return Err(DeviceError::ResourceCreationFailed(format!(
                "Failed to bind buffer memory: {:?}",
                e
            )));
        }

        log::trace!(
            "VulkanBackend: created {} buffer {:?} (size: {}, location: {:?})",
            descriptor.kind,
            descriptor.label,
            descriptor.size,
            location
        );

        Ok(GpuBuffer::Vulkan {
            buffer,
            allocation: Mutex::new(Some(allocation)),
            size: descriptor.size,
        })
    }

    fn destroy_buffer(&self, buffer: &GpuBuffer) {
        let Ok((raw, allocation)) = self.raw(buffer) else {
            log::warn!("VulkanBackend: asked to destroy a foreign buffer");
            return;
        };

        if let Some(allocation) = allocation.lock().take()
            && let Err(e) = self.allocator.lock().free(allocation)
        {
            log::warn!("VulkanBackend: failed to free buffer memory: {}", e);
        }

        unsafe { self.device.destroy_buffer(raw, None) };
        log::trace!("VulkanBackend: destroyed buffer {:?}", raw);
    }

    fn copy_buffer(
        &self,
        src: &GpuBuffer,
        dst: &GpuBuffer,
        region: BufferCopyRegion,
    ) -> Result<(), DeviceError> {
        let (src_raw, _) = self.raw(src)?;
        let (dst_raw, _) = self.raw(dst)?;

        let pool = self.command_pool.lock();
        let commands = OneTimeCommands::begin(&self.device, *pool)?;

        let copy = vk::BufferCopy::default()
            .src_offset(region.src_offset)
            .dst_offset(region.dst_offset)
            .size(region.size);

        unsafe {
            self.device
                .cmd_copy_buffer(commands.command_buffer(), src_raw, dst_raw, &[copy]);
        }
        commands.transfer_to_host_barrier(dst_raw, region.dst_offset, region.size);

        commands.submit_and_wait(self.queue)?;

        log::trace!(
            "VulkanBackend: copied {} bytes ({:?}+{} -> {:?}+{})",
            region.size,
            src_raw,
            region.src_offset,
            dst_raw,
            region.dst_offset
        );
        Ok(())
    }

    fn map_buffer(
        &self,
        buffer: &GpuBuffer,
        offset: u64,
        size: u64,
    ) -> Result<NonNull<u8>, DeviceError> {
        let (_, allocation) = self.raw(buffer)?;
        let guard = allocation.lock();
        let Some(allocation) = guard.as_ref() else {
            return Err(DeviceError::Internal(
                "Buffer allocation is None".to_string(),
            ));
        };

        if offset.saturating_add(size) > allocation.size() {
            return Err(DeviceError::InvalidParameter(format!(
                "map range exceeds allocation size {}",
                allocation.size()
            )));
        }

        let mapped = allocation.mapped_ptr().ok_or(DeviceError::NotHostVisible)?;

        // SAFETY: offset + size is within the persistently mapped allocation
        let ptr = unsafe { mapped.cast::<u8>().add(offset as usize) };
        Ok(ptr)
    }

    fn unmap_buffer(&self, buffer: &GpuBuffer) -> Result<(), DeviceError> {
        // gpu-allocator keeps host-visible memory mapped and coherent for the
        // allocation's lifetime.
        self.raw(buffer).map(|_| ())
    }
}
