//! Vulkan command pool and one-time command submission.

use ash::vk;

use crate::backend::DeviceError;

use super::conversion::convert_result;

/// Create a command pool for short-lived transfer command buffers.
pub fn create_command_pool(
    device: &ash::Device,
    queue_family_index: u32,
) -> Result<vk::CommandPool, DeviceError> {
    let pool_info = vk::CommandPoolCreateInfo::default()
        .queue_family_index(queue_family_index)
        .flags(
            vk::CommandPoolCreateFlags::TRANSIENT
                | vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER,
        );

    unsafe { device.create_command_pool(&pool_info, None) }.map_err(|e| {
        DeviceError::InitializationFailed(format!("Failed to create command pool: {:?}", e))
    })
}

/// A command buffer recorded once, submitted once and waited on.
///
/// The command buffer is freed when this value drops, whether or not it was
/// submitted.
pub struct OneTimeCommands<'a> {
    device: &'a ash::Device,
    pool: vk::CommandPool,
    command_buffer: vk::CommandBuffer,
}

impl<'a> OneTimeCommands<'a> {
    /// Allocate a primary command buffer from `pool` and begin recording.
    ///
    /// The caller must hold exclusive access to `pool` until this value drops.
    pub fn begin(device: &'a ash::Device, pool: vk::CommandPool) -> Result<Self, DeviceError> {
        let alloc_info = vk::CommandBufferAllocateInfo::default()
            .command_pool(pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(1);

        let command_buffer = unsafe { device.allocate_command_buffers(&alloc_info) }
            .map_err(|e| convert_result(e, "allocate command buffer"))?
            .into_iter()
            .next()
            .ok_or_else(|| DeviceError::Internal("no command buffer allocated".to_string()))?;

        let commands = Self {
            device,
            pool,
            command_buffer,
        };

        let begin_info = vk::CommandBufferBeginInfo::default()
            .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
        unsafe { device.begin_command_buffer(command_buffer, &begin_info) }
            .map_err(|e| convert_result(e, "begin command buffer"))?;

        Ok(commands)
    }

    /// The command buffer being recorded.
    pub fn command_buffer(&self) -> vk::CommandBuffer {
        self.command_buffer
    }

    /// Record a dependency making transfer writes to `buffer` visible to host reads.
    ///
    /// A fence wait alone only guarantees completion, not host visibility.
    pub fn transfer_to_host_barrier(&self, buffer: vk::Buffer, offset: u64, size: u64) {
        let barrier = host_read_barrier(buffer, offset, size);
        unsafe {
            self.device.cmd_pipeline_barrier(
                self.command_buffer,
                vk::PipelineStageFlags::TRANSFER,
                vk::PipelineStageFlags::HOST,
                vk::DependencyFlags::empty(),
                &[],
                &[barrier],
                &[],
            );
        }
    }

    /// End recording, submit to `queue` and block until the GPU is done.
    pub fn submit_and_wait(self, queue: vk::Queue) -> Result<(), DeviceError> {
        unsafe { self.device.end_command_buffer(self.command_buffer) }
            .map_err(|e| convert_result(e, "end command buffer"))?;

        let fence = unsafe {
            self.device
                .create_fence(&vk::FenceCreateInfo::default(), None)
        }
        .map_err(|e| convert_result(e, "create fence"))?;

        let command_buffers = [self.command_buffer];
        let submit_info = vk::SubmitInfo::default().command_buffers(&command_buffers);

        let result = unsafe {
            self.device
                .queue_submit(queue, &[submit_info], fence)
                .and_then(|()| self.device.wait_for_fences(&[fence], true, u64::MAX))
        };

        unsafe { self.device.destroy_fence(fence, None) };

        result.map_err(|e| convert_result(e, "submit transfer commands"))
    }
}

fn host_read_barrier(buffer: vk::Buffer, offset: u64, size: u64) -> vk::BufferMemoryBarrier<'static> {
    vk::BufferMemoryBarrier::default()
        .src_access_mask(vk::AccessFlags::TRANSFER_WRITE)
        .dst_access_mask(vk::AccessFlags::HOST_READ)
        .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .buffer(buffer)
        .offset(offset)
        .size(size)
}

impl Drop for OneTimeCommands<'_> {
    fn drop(&mut self) {
        unsafe {
            self.device
                .free_command_buffers(self.pool, &[self.command_buffer]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ash::vk::Handle;

    #[test]
    fn test_host_read_barrier_covers_copied_range() {
        let buffer = vk::Buffer::from_raw(0x42);
        let barrier = host_read_barrier(buffer, 16, 36);

        assert_eq!(barrier.buffer, buffer);
        assert_eq!((barrier.offset, barrier.size), (16, 36));
        assert_eq!(barrier.src_access_mask, vk::AccessFlags::TRANSFER_WRITE);
        assert_eq!(barrier.dst_access_mask, vk::AccessFlags::HOST_READ);
        assert_eq!(barrier.src_queue_family_index, vk::QUEUE_FAMILY_IGNORED);
    }
}
