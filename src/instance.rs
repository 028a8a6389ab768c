use crate::debug_utils::{messenger_create_info, DebugUtils};
use crate::flat_set::NameSet;
use crate::physical_device::PhysicalDevice;
use crate::surface::Surface;
use crate::version::Version;
use crate::{Result, VulkanError};
use ash::vk;
use raw_window_handle::{HasRawDisplayHandle, HasRawWindowHandle};
use std::ffi::{CStr, CString};
use std::sync::Arc;

const ENGINE_NAME: &str = "sgfx";
const VALIDATION_LAYER_NAME: &[u8] = b"VK_LAYER_KHRONOS_validation\0";

fn validation_layer_name() -> &'static CStr {
    CStr::from_bytes_with_nul(VALIDATION_LAYER_NAME).unwrap()
}

/// Builds an [`Instance`] from an application description plus requested
/// layer and extension sets.
pub struct InstanceBuilder {
    app_name: String,
    app_version: Version,
    api_version: Version,
    layers: NameSet,
    extensions: NameSet,
    validation: bool,
}

impl Default for InstanceBuilder {
    fn default() -> Self {
        Self {
            app_name: String::new(),
            app_version: Version::default(),
            api_version: Version::V1_2,
            layers: NameSet::new(),
            extensions: NameSet::new(),
            validation: false,
        }
    }
}

impl InstanceBuilder {
    pub fn app_name(mut self, name: &str) -> Self {
        self.app_name = name.to_string();
        self
    }

    pub fn app_version(mut self, version: Version) -> Self {
        self.app_version = version;
        self
    }

    pub fn api_version(mut self, version: Version) -> Self {
        self.api_version = version;
        self
    }

    pub fn layer(mut self, name: &CStr) -> Self {
        self.layers.add(name);
        self
    }

    pub fn extension(mut self, name: &CStr) -> Self {
        self.extensions.add(name);
        self
    }

    /// Requests the Khronos validation layer and the debug utils extension,
    /// and wires a debug messenger into the created instance.
    pub fn enable_validation(mut self, toggle: bool) -> Self {
        self.validation = toggle;
        if toggle {
            self.layers.add(validation_layer_name());
            self.extensions
                .add(ash::extensions::ext::DebugUtils::name());
        }
        self
    }

    /// Requests `VK_KHR_surface` plus the platform surface extensions for
    /// the given display.
    pub fn surface_support(mut self, display: &impl HasRawDisplayHandle) -> Result<Self> {
        let required = ash_window::enumerate_required_extensions(display.raw_display_handle())?;
        for &name in required {
            self.extensions.add(unsafe { CStr::from_ptr(name) });
        }
        Ok(self)
    }

    pub fn layers(&self) -> &NameSet {
        &self.layers
    }

    pub fn extensions(&self) -> &NameSet {
        &self.extensions
    }

    /// Checks the requested layers and extensions against what the loader
    /// reports, logging each name. Missing names are logged but not fatal;
    /// `vkCreateInstance` will report them itself.
    pub fn check_support(&self, entry: &ash::Entry) -> Result<bool> {
        let available_layers = entry.enumerate_instance_layer_properties()?;
        let available_extensions = entry.enumerate_instance_extension_properties(None)?;

        info!("Checking instance layer support");
        let missing_layers = self.layers.missing_from(
            available_layers
                .iter()
                .map(|layer| unsafe { CStr::from_ptr(layer.layer_name.as_ptr()) }),
        );

        info!("Checking instance extension support");
        let missing_extensions = self.extensions.missing_from(
            available_extensions
                .iter()
                .map(|extension| unsafe { CStr::from_ptr(extension.extension_name.as_ptr()) }),
        );

        Ok(missing_layers.is_empty() && missing_extensions.is_empty())
    }

    pub fn build(self) -> Result<Instance> {
        let entry = unsafe { ash::Entry::load() }?;

        // vkEnumerateInstanceVersion is absent on 1.0-only loaders.
        let loader_version = entry
            .try_enumerate_instance_version()?
            .map(Version::from_vulkan)
            .unwrap_or(Version::V1_0);
        info!("Vulkan loader: {}", loader_version);

        if !self.check_support(&entry)? {
            warn!("Some requested layers/extensions are unsupported, instance creation may fail");
        }

        let app_name = CString::new(self.app_name.as_str())
            .map_err(|_| VulkanError::String("Application name contains a nul byte".to_string()))?;
        let engine_name = CString::new(ENGINE_NAME).unwrap();

        let app_info = vk::ApplicationInfo::builder()
            .application_name(app_name.as_c_str())
            .application_version(self.app_version.to_vulkan())
            .engine_name(engine_name.as_c_str())
            .engine_version(vk::make_api_version(0, 0, 1, 0))
            .api_version(self.api_version.to_vulkan());

        let layer_names_raw = self.layers.as_ptrs();
        let extension_names_raw = self.extensions.as_ptrs();

        let mut create_info = vk::InstanceCreateInfo::builder()
            .application_info(&app_info)
            .enabled_layer_names(&layer_names_raw)
            .enabled_extension_names(&extension_names_raw);

        let mut debug_info = messenger_create_info();
        if self.validation {
            create_info = create_info.push_next(&mut debug_info);
        }

        let core = unsafe { entry.create_instance(&create_info, None) }?;

        let debug_utils = if self.validation {
            match DebugUtils::new(&entry, &core) {
                Ok(debug_utils) => Some(debug_utils),
                Err(e) => {
                    error!("Failed to create debug messenger: {}", e);
                    None
                }
            }
        } else {
            None
        };

        let surface_ext = ash::extensions::khr::Surface::new(&entry, &core);

        Ok(Instance(Arc::new(AshInstance {
            entry,
            core,
            surface_ext,
            debug_utils,
            loader_version,
        })))
    }
}

pub(crate) struct AshInstance {
    pub(crate) entry: ash::Entry,
    pub(crate) core: ash::Instance,
    pub(crate) surface_ext: ash::extensions::khr::Surface,
    pub(crate) debug_utils: Option<DebugUtils>,
    pub(crate) loader_version: Version,
}

impl Drop for AshInstance {
    fn drop(&mut self) {
        // The messenger has to go before the instance it was created from.
        drop(self.debug_utils.take());
        unsafe {
            self.core.destroy_instance(None);
        }
        trace!("Drop Instance");
    }
}

/// Entry point for accessing the Vulkan API.
///
/// Everything derived from an instance ([`Surface`], [`PhysicalDevice`],
/// [`crate::Device`]) holds an `Arc` of the underlying state, so the raw
/// `VkInstance` is destroyed only after the last derived object is gone.
pub struct Instance(pub(crate) Arc<AshInstance>);

impl Instance {
    pub fn builder() -> InstanceBuilder {
        InstanceBuilder::default()
    }

    /// The version reported by `vkEnumerateInstanceVersion`, not the version
    /// requested at creation.
    pub fn loader_version(&self) -> Version {
        self.0.loader_version
    }

    pub fn validation_enabled(&self) -> bool {
        self.0.debug_utils.is_some()
    }

    pub fn handle(&self) -> vk::Instance {
        self.0.core.handle()
    }

    pub fn enumerate_physical_devices(&self) -> Result<Vec<PhysicalDevice>> {
        let handles = unsafe { self.0.core.enumerate_physical_devices() }?;
        Ok(handles
            .into_iter()
            .map(|handle| PhysicalDevice::new(self.0.clone(), handle))
            .collect())
    }

    pub fn create_surface<T: HasRawWindowHandle + HasRawDisplayHandle>(
        &self,
        window: &T,
    ) -> Result<Surface> {
        Surface::new(self.0.clone(), window)
    }

    /// Picks the highest-scoring adapter. Adapters scored zero are skipped,
    /// as are adapters that cannot present to `surface` when one is given.
    pub fn select_physical_device(
        &self,
        surface: Option<&Surface>,
        score: impl Fn(&PhysicalDevice) -> u32,
    ) -> Result<PhysicalDevice> {
        self.enumerate_physical_devices()?
            .into_iter()
            .filter(|physical_device| match surface {
                Some(surface) => physical_device.supports_surface(surface),
                None => true,
            })
            .map(|physical_device| (score(&physical_device), physical_device))
            .filter(|(score, _)| *score > 0)
            .max_by_key(|(score, _)| *score)
            .map(|(_, physical_device)| physical_device)
            .ok_or(VulkanError::NoSuitableDevice)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_requests_layer_and_extension() {
        let builder = Instance::builder().enable_validation(true);

        assert!(builder.layers().contains(validation_layer_name()));
        assert!(builder
            .extensions()
            .contains(ash::extensions::ext::DebugUtils::name()));
    }

    #[test]
    fn validation_names_are_not_duplicated() {
        let builder = Instance::builder()
            .extension(ash::extensions::ext::DebugUtils::name())
            .enable_validation(true)
            .enable_validation(true);

        assert_eq!(builder.layers().len(), 1);
        assert_eq!(builder.extensions().len(), 1);
    }

    #[test]
    fn default_targets_vulkan_1_2() {
        let builder = InstanceBuilder::default();
        assert_eq!(builder.api_version, Version::V1_2);
        assert!(builder.layers().is_empty());
        assert!(builder.extensions().is_empty());
    }
}
