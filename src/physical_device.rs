use crate::device::DeviceBuilder;
use crate::instance::AshInstance;
use crate::surface::Surface;
use crate::version::Version;
use crate::Result;
use ash::vk;
use std::ffi::{c_char, CStr, CString};
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

fn c_str_to_string(c_str: &[c_char]) -> String {
    unsafe {
        CStr::from_ptr(c_str.as_ptr())
            .to_string_lossy()
            .into_owned()
    }
}

pub(crate) fn find_queue_family_index(
    queue_family_properties: &[vk::QueueFamilyProperties],
    contains_flags: vk::QueueFlags,
    exclude_flags: vk::QueueFlags,
) -> Option<u32> {
    queue_family_properties
        .iter()
        .enumerate()
        .find(|(_index, queue_family)| {
            queue_family.queue_flags.contains(contains_flags)
                && !queue_family.queue_flags.intersects(exclude_flags)
        })
        .map(|(index, _queue_family)| index as u32)
}

fn sum_memory_heaps(
    memory_heaps: &[vk::MemoryHeap],
    contains_flags: vk::MemoryHeapFlags,
    exclude_flags: vk::MemoryHeapFlags,
) -> usize {
    memory_heaps
        .iter()
        .filter(|memory_heap| {
            memory_heap.flags.contains(contains_flags)
                && !memory_heap.flags.intersects(exclude_flags)
        })
        .map(|memory_heap| memory_heap.size as usize)
        .sum()
}

#[derive(Debug, Clone, Copy, Ord, PartialOrd, Eq, PartialEq)]
pub enum AdapterVendor {
    Amd,
    Arm,
    ImgTec,
    Intel,
    Nvidia,
    Qualcomm,
    Broadcom,
    Unknown { vendor_id: u32 },
}

impl AdapterVendor {
    pub(crate) fn from_vulkan(vendor_id: u32) -> Self {
        match vendor_id {
            0x1002 => Self::Amd,
            0x10DE => Self::Nvidia,
            0x8086 => Self::Intel,
            0x1010 => Self::ImgTec,
            0x13B5 => Self::Arm,
            0x5132 => Self::Qualcomm,
            0x14E4 => Self::Broadcom,
            vendor_id => Self::Unknown { vendor_id },
        }
    }
}

#[derive(Debug, Clone, Copy, Ord, PartialOrd, Eq, PartialEq)]
pub enum AdapterType {
    Integrated,
    Discrete,
    Unknown,
}

impl AdapterType {
    pub(crate) fn from_vulkan(device_type: vk::PhysicalDeviceType) -> Self {
        match device_type {
            vk::PhysicalDeviceType::DISCRETE_GPU => Self::Discrete,
            vk::PhysicalDeviceType::INTEGRATED_GPU => Self::Integrated,
            _ => Self::Unknown,
        }
    }
}

/// Driver versions are vendor-encoded; only the default case follows the
/// Vulkan version packing.
pub(crate) fn driver_version_string(driver_version: u32, vendor: AdapterVendor) -> String {
    match vendor {
        AdapterVendor::Nvidia => {
            format!(
                "{}.{}.{}.{}",
                (driver_version >> 22) & 0x3ff,
                (driver_version >> 14) & 0x0ff,
                (driver_version >> 6) & 0x0ff,
                driver_version & 0x003f
            )
        }
        #[cfg(target_os = "windows")]
        AdapterVendor::Intel => {
            format!("{}.{}", driver_version >> 14, driver_version & 0x3fff)
        }
        _ => {
            format!(
                "{}.{}.{}",
                driver_version >> 22,
                (driver_version >> 12) & 0x3ff,
                driver_version & 0xfff,
            )
        }
    }
}

#[derive(Clone, Debug)]
pub struct AdapterInfo {
    pub name: String,
    pub device_id: u32,
    pub api_version: Version,
    pub driver_version: String,
    pub vendor: AdapterVendor,
    pub device_type: AdapterType,
}

#[derive(Clone, Debug)]
pub struct AdapterMemoryInfo {
    pub device_local_bytes: usize,
    pub host_visible_bytes: usize,
}

/// Handle to a GPU plus a cached snapshot of what it can do.
///
/// Cheap to clone; all queries go through the owning instance.
#[derive(Clone)]
pub struct PhysicalDevice {
    pub(crate) instance: Arc<AshInstance>,
    pub(crate) handle: vk::PhysicalDevice,

    pub info: AdapterInfo,
    pub memory: AdapterMemoryInfo,
}

impl PhysicalDevice {
    pub(crate) fn new(instance: Arc<AshInstance>, handle: vk::PhysicalDevice) -> Self {
        let properties = unsafe { instance.core.get_physical_device_properties(handle) };

        let vendor = AdapterVendor::from_vulkan(properties.vendor_id);
        let info = AdapterInfo {
            name: c_str_to_string(&properties.device_name),
            device_id: properties.device_id,
            api_version: Version::from_vulkan(properties.api_version),
            driver_version: driver_version_string(properties.driver_version, vendor),
            vendor,
            device_type: AdapterType::from_vulkan(properties.device_type),
        };

        let device_memory = unsafe { instance.core.get_physical_device_memory_properties(handle) };
        let memory_heaps = &device_memory.memory_heaps[0..device_memory.memory_heap_count as usize];
        let memory = AdapterMemoryInfo {
            device_local_bytes: sum_memory_heaps(
                memory_heaps,
                vk::MemoryHeapFlags::DEVICE_LOCAL,
                vk::MemoryHeapFlags::empty(),
            ),
            host_visible_bytes: sum_memory_heaps(
                memory_heaps,
                vk::MemoryHeapFlags::empty(),
                vk::MemoryHeapFlags::DEVICE_LOCAL,
            ),
        };

        Self {
            instance,
            handle,
            info,
            memory,
        }
    }

    pub fn handle(&self) -> vk::PhysicalDevice {
        self.handle
    }

    pub fn properties(&self) -> vk::PhysicalDeviceProperties {
        unsafe { self.instance.core.get_physical_device_properties(self.handle) }
    }

    pub fn features(&self) -> vk::PhysicalDeviceFeatures {
        unsafe { self.instance.core.get_physical_device_features(self.handle) }
    }

    pub fn queue_families(&self) -> Vec<QueueFamily> {
        let properties = unsafe {
            self.instance
                .core
                .get_physical_device_queue_family_properties(self.handle)
        };

        properties
            .iter()
            .enumerate()
            .map(|(index, properties)| QueueFamily {
                instance: self.instance.clone(),
                physical_device: self.handle,
                index: index as u32,
                flags: properties.queue_flags,
                count: properties.queue_count,
            })
            .collect()
    }

    /// First queue family covering graphics, compute and transfer. Desktop
    /// GPUs always expose one of these.
    pub fn graphics_queue_family(&self) -> Option<QueueFamily> {
        let properties = unsafe {
            self.instance
                .core
                .get_physical_device_queue_family_properties(self.handle)
        };

        find_queue_family_index(
            &properties,
            vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE | vk::QueueFlags::TRANSFER,
            vk::QueueFlags::empty(),
        )
        .map(|index| QueueFamily {
            instance: self.instance.clone(),
            physical_device: self.handle,
            index,
            flags: properties[index as usize].queue_flags,
            count: properties[index as usize].queue_count,
        })
    }

    pub fn supported_extensions(&self) -> Result<Vec<CString>> {
        let extensions = unsafe {
            self.instance
                .core
                .enumerate_device_extension_properties(self.handle)
        }?;

        Ok(extensions
            .iter()
            .map(|extension| {
                unsafe { CStr::from_ptr(extension.extension_name.as_ptr()) }.to_owned()
            })
            .collect())
    }

    pub fn supports_extension(&self, name: &CStr) -> bool {
        let extensions = unsafe {
            self.instance
                .core
                .enumerate_device_extension_properties(self.handle)
        }
        .unwrap_or_default();

        extensions.iter().any(|extension| {
            name == unsafe { CStr::from_ptr(extension.extension_name.as_ptr()) }
        })
    }

    /// Whether any graphics-capable queue family can present to `surface`.
    pub fn supports_surface(&self, surface: &Surface) -> bool {
        self.queue_families()
            .iter()
            .filter(|family| family.supports_graphics())
            .any(|family| family.supports_present(surface))
    }

    pub fn device_builder(self) -> DeviceBuilder {
        DeviceBuilder::new(self)
    }
}

impl Debug for PhysicalDevice {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PhysicalDevice")
            .field("handle", &self.handle)
            .field("info", &self.info)
            .field("memory", &self.memory)
            .finish()
    }
}

/// A group of queues on one adapter sharing capabilities.
#[derive(Clone)]
pub struct QueueFamily {
    instance: Arc<AshInstance>,
    physical_device: vk::PhysicalDevice,

    pub index: u32,
    pub flags: vk::QueueFlags,
    pub count: u32,
}

impl QueueFamily {
    pub fn supports_graphics(&self) -> bool {
        self.flags.contains(vk::QueueFlags::GRAPHICS)
    }

    pub fn supports_compute(&self) -> bool {
        self.flags.contains(vk::QueueFlags::COMPUTE)
    }

    pub fn supports_transfer(&self) -> bool {
        self.flags.contains(vk::QueueFlags::TRANSFER)
    }

    pub fn supports_present(&self, surface: &Surface) -> bool {
        match unsafe {
            self.instance.surface_ext.get_physical_device_surface_support(
                self.physical_device,
                self.index,
                surface.handle(),
            )
        } {
            Ok(supported) => supported,
            Err(err) => {
                error!("vkGetPhysicalDeviceSurfaceSupportKHR failed: {}", err);
                false
            }
        }
    }
}

impl Debug for QueueFamily {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueFamily")
            .field("index", &self.index)
            .field("flags", &self.flags)
            .field("count", &self.count)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vendor_from_pci_id() {
        assert_eq!(AdapterVendor::from_vulkan(0x1002), AdapterVendor::Amd);
        assert_eq!(AdapterVendor::from_vulkan(0x10DE), AdapterVendor::Nvidia);
        assert_eq!(AdapterVendor::from_vulkan(0x8086), AdapterVendor::Intel);
        assert_eq!(
            AdapterVendor::from_vulkan(0xBEEF),
            AdapterVendor::Unknown { vendor_id: 0xBEEF }
        );
    }

    #[test]
    fn adapter_type_from_vulkan() {
        assert_eq!(
            AdapterType::from_vulkan(vk::PhysicalDeviceType::DISCRETE_GPU),
            AdapterType::Discrete
        );
        assert_eq!(
            AdapterType::from_vulkan(vk::PhysicalDeviceType::INTEGRATED_GPU),
            AdapterType::Integrated
        );
        assert_eq!(
            AdapterType::from_vulkan(vk::PhysicalDeviceType::CPU),
            AdapterType::Unknown
        );
    }

    #[test]
    fn nvidia_driver_version_encoding() {
        // 535.129.3 in Nvidia's 10.8.8.6 bit packing.
        let packed = (535 << 22) | (129 << 14) | (3 << 6);
        assert_eq!(
            driver_version_string(packed, AdapterVendor::Nvidia),
            "535.129.3.0"
        );
    }

    #[test]
    fn default_driver_version_uses_vulkan_packing() {
        let packed = vk::make_api_version(0, 2, 0, 302);
        assert_eq!(
            driver_version_string(packed, AdapterVendor::Amd),
            "2.0.302"
        );
    }

    #[test]
    fn queue_family_search_respects_exclusions() {
        let families = [
            vk::QueueFamilyProperties::builder()
                .queue_flags(
                    vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE | vk::QueueFlags::TRANSFER,
                )
                .queue_count(1)
                .build(),
            vk::QueueFamilyProperties::builder()
                .queue_flags(vk::QueueFlags::COMPUTE | vk::QueueFlags::TRANSFER)
                .queue_count(4)
                .build(),
            vk::QueueFamilyProperties::builder()
                .queue_flags(vk::QueueFlags::TRANSFER)
                .queue_count(2)
                .build(),
        ];

        assert_eq!(
            find_queue_family_index(&families, vk::QueueFlags::GRAPHICS, vk::QueueFlags::empty()),
            Some(0)
        );
        // Async compute: compute without graphics.
        assert_eq!(
            find_queue_family_index(&families, vk::QueueFlags::COMPUTE, vk::QueueFlags::GRAPHICS),
            Some(1)
        );
        assert_eq!(
            find_queue_family_index(
                &families,
                vk::QueueFlags::TRANSFER,
                vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE
            ),
            Some(2)
        );
        assert_eq!(
            find_queue_family_index(
                &families,
                vk::QueueFlags::SPARSE_BINDING,
                vk::QueueFlags::empty()
            ),
            None
        );
    }

    #[test]
    fn memory_heap_summing_splits_by_locality() {
        let heaps = [
            vk::MemoryHeap::builder()
                .size(8 << 30)
                .flags(vk::MemoryHeapFlags::DEVICE_LOCAL)
                .build(),
            vk::MemoryHeap::builder().size(16 << 30).build(),
        ];

        assert_eq!(
            sum_memory_heaps(
                &heaps,
                vk::MemoryHeapFlags::DEVICE_LOCAL,
                vk::MemoryHeapFlags::empty()
            ),
            8 << 30
        );
        assert_eq!(
            sum_memory_heaps(
                &heaps,
                vk::MemoryHeapFlags::empty(),
                vk::MemoryHeapFlags::DEVICE_LOCAL
            ),
            16 << 30
        );
    }
}
