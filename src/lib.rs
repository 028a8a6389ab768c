mod debug_utils;
mod device;
mod flat_set;
mod instance;
mod physical_device;
mod surface;
mod version;

pub use device::*;
pub use flat_set::*;
pub use instance::*;
pub use physical_device::*;
pub use surface::*;
pub use version::*;

pub use ash;

#[macro_use]
extern crate log;

#[derive(thiserror::Error, Debug)]
pub enum VulkanError {
    #[error("Vk error: {0}")]
    Vk(#[from] ash::vk::Result),

    #[error("Failed to load Vulkan library: {0}")]
    Library(#[from] ash::LoadingError),

    #[error("No suitable physical device found")]
    NoSuitableDevice,

    #[error("Error: {0}")]
    String(String),
}

pub type Result<T> = std::result::Result<T, VulkanError>;
