use ash::vk;
use std::ffi::CStr;

/// Create info shared between the messenger itself and the instance
/// `p_next` chain, so validation also covers `vkCreateInstance` and
/// `vkDestroyInstance`.
pub(crate) fn messenger_create_info() -> vk::DebugUtilsMessengerCreateInfoEXT {
    vk::DebugUtilsMessengerCreateInfoEXT::builder()
        .message_severity(
            vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
        )
        .message_type(
            vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE
                | vk::DebugUtilsMessageTypeFlagsEXT::DEVICE_ADDRESS_BINDING,
        )
        .pfn_user_callback(Some(vulkan_debug_callback))
        .build()
}

/// Validation-layer messenger. Messages are forwarded to the `log` crate at
/// the matching level rather than printed to stdout.
pub(crate) struct DebugUtils {
    debug_utils: ash::extensions::ext::DebugUtils,
    messenger: vk::DebugUtilsMessengerEXT,
}

impl DebugUtils {
    pub(crate) fn new(entry: &ash::Entry, instance: &ash::Instance) -> ash::prelude::VkResult<Self> {
        let debug_utils = ash::extensions::ext::DebugUtils::new(entry, instance);
        let messenger =
            unsafe { debug_utils.create_debug_utils_messenger(&messenger_create_info(), None)? };

        Ok(Self {
            debug_utils,
            messenger,
        })
    }
}

impl Drop for DebugUtils {
    fn drop(&mut self) {
        unsafe {
            self.debug_utils
                .destroy_debug_utils_messenger(self.messenger, None);
        }
    }
}

unsafe extern "system" fn vulkan_debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    p_callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _user_data: *mut std::os::raw::c_void,
) -> vk::Bool32 {
    use std::borrow::Cow;

    let callback_data = *p_callback_data;
    let message = if callback_data.p_message.is_null() {
        Cow::from("")
    } else {
        CStr::from_ptr(callback_data.p_message).to_string_lossy()
    };
    let id_name = if callback_data.p_message_id_name.is_null() {
        Cow::from("")
    } else {
        CStr::from_ptr(callback_data.p_message_id_name).to_string_lossy()
    };

    match message_severity {
        vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE => {
            trace!("{:?} [{}]: {}", message_type, id_name, message)
        }
        vk::DebugUtilsMessageSeverityFlagsEXT::INFO => {
            info!("{:?} [{}]: {}", message_type, id_name, message)
        }
        vk::DebugUtilsMessageSeverityFlagsEXT::WARNING => {
            warn!("{:?} [{}]: {}", message_type, id_name, message)
        }
        vk::DebugUtilsMessageSeverityFlagsEXT::ERROR => {
            error!("{:?} [{}]: {}", message_type, id_name, message)
        }
        _ => info!(
            "Unknown severity {:?} {:?} [{}]: {}",
            message_severity, message_type, id_name, message
        ),
    }

    vk::FALSE
}
