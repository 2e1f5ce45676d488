// SPDX-License-Identifier: CEPL-1.0
use std::ffi::{c_void, CStr};
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use ash::ext::debug_utils;
use ash::khr::surface;
use ash::{vk, Entry, Instance};
use raw_window_handle::{HasDisplayHandle, RawDisplayHandle};
use tracing::{debug, error, info, warn};

const APP_NAME: &CStr = c"swapline";
const VALIDATION_LAYER: &CStr = c"VK_LAYER_KHRONOS_validation";

/// Loader entry, instance and the instance-level surface functions.
pub struct VkInstance {
    entry: Entry,
    instance: Instance,
    surface_loader: surface::Instance,
    debug: Option<(debug_utils::Instance, vk::DebugUtilsMessengerEXT)>,
}

impl VkInstance {
    /// Create an instance with the window-system extensions `display` needs.
    /// Debug builds also enable validation and route its messages to
    /// `tracing` when the layer is installed.
    pub fn new(display: &dyn HasDisplayHandle) -> Result<Arc<Self>> {
        let dh = display
            .display_handle()
            .map_err(|e| anyhow!("{e}"))?
            .as_raw();

        let entry = Entry::linked();
        let validation = cfg!(debug_assertions) && has_validation_layer(&entry);

        // SAFETY: `entry` is a loaded Vulkan entry; the create info only
        // borrows locals that outlive the call.
        let instance = unsafe { create_instance(&entry, dh, validation) }
            .context("create_instance")?;
        let surface_loader = surface::Instance::new(&entry, &instance);

        let debug = if validation {
            // SAFETY: the instance was created with VK_EXT_debug_utils.
            match unsafe { create_debug_messenger(&entry, &instance) } {
                Ok(d) => Some(d),
                Err(e) => {
                    warn!("debug messenger unavailable: {e}");
                    None
                }
            }
        } else {
            None
        };

        info!("Vulkan instance created (validation={})", validation);
        Ok(Arc::new(Self {
            entry,
            instance,
            surface_loader,
            debug,
        }))
    }

    pub(crate) fn entry(&self) -> &Entry {
        &self.entry
    }

    pub(crate) fn raw(&self) -> &Instance {
        &self.instance
    }

    pub(crate) fn surface_loader(&self) -> &surface::Instance {
        &self.surface_loader
    }
}

impl Drop for VkInstance {
    fn drop(&mut self) {
        // SAFETY: surfaces and devices hold an `Arc` to this instance, so
        // every child object is already gone.
        unsafe {
            if let Some((loader, messenger)) = self.debug.take() {
                loader.destroy_debug_utils_messenger(messenger, None);
            }
            self.instance.destroy_instance(None);
        }
    }
}

fn has_validation_layer(entry: &Entry) -> bool {
    // SAFETY: plain enumeration on a loaded entry.
    unsafe { entry.enumerate_instance_layer_properties() }
        .unwrap_or_default()
        .iter()
        .any(|l| l.layer_name_as_c_str() == Ok(VALIDATION_LAYER))
}

unsafe fn create_instance(
    entry: &Entry,
    display_raw: RawDisplayHandle,
    validation: bool,
) -> Result<Instance> {
    let app_info = vk::ApplicationInfo {
        s_type: vk::StructureType::APPLICATION_INFO,
        p_application_name: APP_NAME.as_ptr(),
        application_version: 0,
        p_engine_name: APP_NAME.as_ptr(),
        engine_version: 0,
        api_version: vk::API_VERSION_1_0,
        ..Default::default()
    };

    let ext_slice = ash_window::enumerate_required_extensions(display_raw)
        .context("enumerate_required_extensions")?;
    let mut ext_vec = ext_slice.to_vec();
    if validation {
        ext_vec.push(debug_utils::NAME.as_ptr());
    }

    let layers = [VALIDATION_LAYER.as_ptr()];
    let (enabled_layer_count, pp_enabled_layer_names) = if validation {
        (layers.len() as u32, layers.as_ptr())
    } else {
        (0, std::ptr::null())
    };

    let create_info = vk::InstanceCreateInfo {
        s_type: vk::StructureType::INSTANCE_CREATE_INFO,
        p_application_info: &app_info,
        enabled_extension_count: ext_vec.len() as u32,
        pp_enabled_extension_names: ext_vec.as_ptr(),
        enabled_layer_count,
        pp_enabled_layer_names,
        ..Default::default()
    };

    // SAFETY: every pointer in `create_info` refers to a local above.
    Ok(unsafe { entry.create_instance(&create_info, None) }?)
}

unsafe extern "system" fn debug_callback(
    severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    _types: vk::DebugUtilsMessageTypeFlagsEXT,
    data: *const vk::DebugUtilsMessengerCallbackDataEXT<'_>,
    _user: *mut c_void,
) -> vk::Bool32 {
    if data.is_null() {
        return vk::FALSE;
    }
    // SAFETY: the loader passes a valid callback struct whose message is a
    // NUL-terminated string for the duration of the call.
    let msg = unsafe {
        let p = (*data).p_message;
        if p.is_null() {
            return vk::FALSE;
        }
        CStr::from_ptr(p).to_string_lossy()
    };
    if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR) {
        error!("[vulkan] {msg}");
    } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING) {
        warn!("[vulkan] {msg}");
    } else {
        debug!("[vulkan] {msg}");
    }
    vk::FALSE
}

unsafe fn create_debug_messenger(
    entry: &Entry,
    instance: &Instance,
) -> Result<(debug_utils::Instance, vk::DebugUtilsMessengerEXT)> {
    let loader = debug_utils::Instance::new(entry, instance);
    let ci = vk::DebugUtilsMessengerCreateInfoEXT {
        s_type: vk::StructureType::DEBUG_UTILS_MESSENGER_CREATE_INFO_EXT,
        message_severity: vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE
            | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
            | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
        message_type: vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
            | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
            | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
        pfn_user_callback: Some(debug_callback),
        ..Default::default()
    };
    // SAFETY: `ci` is fully initialised; the callback is a plain function.
    let messenger = unsafe { loader.create_debug_utils_messenger(&ci, None) }?;
    Ok((loader, messenger))
}
