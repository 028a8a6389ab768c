use crate::flat_set::{FlatSet, NameSet};
use crate::physical_device::{PhysicalDevice, QueueFamily};
use crate::{Result, VulkanError};
use ash::vk;
use std::ffi::CStr;

/// Plain value describing a device queue retrieved at creation.
#[derive(Copy, Clone, Debug)]
pub struct Queue {
    pub family_index: u32,
    pub handle: vk::Queue,
    pub flags: vk::QueueFlags,
}

/// Queue families and extensions requested for a logical device, kept
/// separate from the adapter so the assembly logic is testable on its own.
#[derive(Debug, Default)]
struct DeviceRequest {
    queue_family_indices: FlatSet<u32>,
    extensions: NameSet,
}

impl DeviceRequest {
    fn queue_family_index(&mut self, index: u32) {
        self.queue_family_indices.insert(index);
    }

    /// One create info per distinct family, one queue each.
    fn queue_create_infos(&self, queue_priorities: &[f32]) -> Vec<vk::DeviceQueueCreateInfo> {
        self.queue_family_indices
            .iter()
            .map(|&family_index| {
                vk::DeviceQueueCreateInfo::builder()
                    .queue_family_index(family_index)
                    .queue_priorities(queue_priorities)
                    .build()
            })
            .collect()
    }

    /// First requested index the adapter does not have, if any.
    fn out_of_range_index(&self, family_count: usize) -> Option<u32> {
        self.queue_family_indices
            .iter()
            .find(|&&index| index as usize >= family_count)
            .copied()
    }
}

/// Builds a logical [`Device`] from a chosen adapter, a set of queue
/// families and a set of device extensions.
///
/// One queue per requested family, priority 1.0. Requesting the same family
/// twice collapses into a single `VkDeviceQueueCreateInfo`.
pub struct DeviceBuilder {
    physical_device: PhysicalDevice,
    request: DeviceRequest,
}

impl DeviceBuilder {
    pub(crate) fn new(physical_device: PhysicalDevice) -> Self {
        Self {
            physical_device,
            request: DeviceRequest::default(),
        }
    }

    pub fn queue_family(mut self, family: &QueueFamily) -> Self {
        self.request.queue_family_index(family.index);
        self
    }

    pub fn queue_family_index(mut self, index: u32) -> Self {
        self.request.queue_family_index(index);
        self
    }

    pub fn extension(mut self, name: &CStr) -> Self {
        self.request.extensions.add(name);
        self
    }

    /// Checks the requested device extensions against the adapter, logging
    /// each name.
    pub fn check_support(&self) -> Result<bool> {
        let available = self.physical_device.supported_extensions()?;

        info!(
            "Checking device extension support on {}",
            self.physical_device.info.name
        );
        let missing = self
            .request
            .extensions
            .missing_from(available.iter().map(|name| name.as_c_str()));

        Ok(missing.is_empty())
    }

    pub fn build(self) -> Result<Device> {
        if self.request.queue_family_indices.is_empty() {
            return Err(VulkanError::String(
                "Device creation requires at least one queue family".to_string(),
            ));
        }

        let queue_family_properties = unsafe {
            self.physical_device
                .instance
                .core
                .get_physical_device_queue_family_properties(self.physical_device.handle)
        };

        if let Some(index) = self
            .request
            .out_of_range_index(queue_family_properties.len())
        {
            return Err(VulkanError::String(format!(
                "Queue family index {} is out of range, adapter has {} families",
                index,
                queue_family_properties.len()
            )));
        }

        let queue_priorities = [1.0];
        let queue_create_infos = self.request.queue_create_infos(&queue_priorities);
        let extension_names_raw = self.request.extensions.as_ptrs();

        let core = unsafe {
            self.physical_device.instance.core.create_device(
                self.physical_device.handle,
                &vk::DeviceCreateInfo::builder()
                    .queue_create_infos(&queue_create_infos)
                    .enabled_extension_names(&extension_names_raw),
                None,
            )
        }?;

        let queues = self
            .request
            .queue_family_indices
            .iter()
            .map(|&family_index| Queue {
                family_index,
                handle: unsafe { core.get_device_queue(family_index, 0) },
                flags: queue_family_properties[family_index as usize].queue_flags,
            })
            .collect();

        Ok(Device {
            physical_device: self.physical_device,
            core,
            queues,
        })
    }
}

/// Logical device plus the queues it was created with.
///
/// Holds on to its [`PhysicalDevice`], which keeps the instance alive for
/// as long as the device exists.
pub struct Device {
    physical_device: PhysicalDevice,
    core: ash::Device,
    queues: Vec<Queue>,
}

impl Device {
    pub fn physical_device(&self) -> &PhysicalDevice {
        &self.physical_device
    }

    pub fn handle(&self) -> vk::Device {
        self.core.handle()
    }

    pub fn core(&self) -> &ash::Device {
        &self.core
    }

    pub fn queues(&self) -> &[Queue] {
        &self.queues
    }

    pub fn queue(&self, family_index: u32) -> Option<Queue> {
        self.queues
            .iter()
            .find(|queue| queue.family_index == family_index)
            .copied()
    }

    pub fn wait_idle(&self) -> Result<()> {
        unsafe { self.core.device_wait_idle() }?;
        Ok(())
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        unsafe {
            let _ = self.core.device_wait_idle();
            self.core.destroy_device(None);
        }
        trace!("Drop Device");
    }
}
