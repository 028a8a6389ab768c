use crate::instance::AshInstance;
use crate::Result;
use ash::vk;
use raw_window_handle::{HasRawDisplayHandle, HasRawWindowHandle};
use std::sync::Arc;

/// Presentable target tied to a window, created through `ash-window` from
/// the platform's raw window/display handles.
///
/// The window itself stays owned by the caller and must outlive the surface.
pub struct Surface {
    instance: Arc<AshInstance>,
    handle: vk::SurfaceKHR,
}

impl Surface {
    pub(crate) fn new<T: HasRawWindowHandle + HasRawDisplayHandle>(
        instance: Arc<AshInstance>,
        window: &T,
    ) -> Result<Self> {
        let handle = unsafe {
            ash_window::create_surface(
                &instance.entry,
                &instance.core,
                window.raw_display_handle(),
                window.raw_window_handle(),
                None,
            )
        }?;

        Ok(Self { instance, handle })
    }

    pub fn handle(&self) -> vk::SurfaceKHR {
        self.handle
    }
}

impl Drop for Surface {
    fn drop(&mut self) {
        unsafe {
            self.instance.surface_ext.destroy_surface(self.handle, None);
        }
    }
}
