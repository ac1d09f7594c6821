//! Vulkan instance creation.
//!
//! The central type is [`Instance`], which wraps an `ash::Instance` and
//! owns the entry-point loader. It is the root of the object hierarchy:
//! debug reporters and logical devices hold an `Arc<Instance>` and must be
//! dropped before it.
//!
//! [`ApiVersion`] is a thin newtype over the packed Vulkan version word.

use std::ffi::{CStr, CString, c_char};
use std::fmt::{self, Debug};
use std::str::FromStr;

use ash::vk;
use raw_window_handle::HasDisplayHandle;
use thiserror::Error;

use crate::config::ContextConfig;
use crate::layers;

/// A packed Vulkan API version number, as reported by
/// `vkEnumerateInstanceVersion`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApiVersion(u32);

impl ApiVersion {
    pub fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    pub fn major(&self) -> u32 {
        vk::api_version_major(self.0)
    }

    pub fn minor(&self) -> u32 {
        vk::api_version_minor(self.0)
    }

    pub fn patch(&self) -> u32 {
        vk::api_version_patch(self.0)
    }

    pub fn to_raw(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for ApiVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major(), self.minor(), self.patch())
    }
}

/// The root Vulkan object.
///
/// Owns the `ash::Entry` loader and the `ash::Instance` handle, and
/// remembers which layers were enabled so that logical device creation can
/// propagate the same set. Construct via [`Instance::new`], which is
/// `unsafe` because it loads the Vulkan shared library at runtime.
pub struct Instance {
    entry: ash::Entry,
    handle: ash::Instance,
    enabled_layers: Vec<CString>,
    ver: ApiVersion,
}

impl Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("handle", &self.handle.handle())
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Error)]
pub enum InstanceCreationError {
    #[error("Could not load Vulkan: {0}")]
    Loading(ash::LoadingError),
    #[error("Invalid app name was passed to Instance::new")]
    InvalidAppName,
    #[error("Couldn't get display handle from passed value: {0}")]
    InvalidDisplayHandle(crate::RwhHandleError),
    #[error("Required instance layers are not installed on this host: {0:?}")]
    MissingLayers(Vec<String>),
    #[error("Missing mandatory instance extensions: {0:?}")]
    MissingExtensions(Vec<String>),
    #[error("Instance creation failed: {0}")]
    CreationFailed(vk::Result),
    #[error("Unknown Vulkan Error {0}")]
    UnknownVulkan(vk::Result),
}

impl From<vk::Result> for InstanceCreationError {
    fn from(value: vk::Result) -> Self {
        InstanceCreationError::UnknownVulkan(value)
    }
}

impl Drop for Instance {
    fn drop(&mut self) {
        tracing::debug!("Dropping instance {:?}", self.handle.handle());
        //SAFETY: We are in drop so this is the last use of instance. Any
        //derived object (reporter, device) holds an Arc to us and is
        //already gone
        unsafe { self.handle.destroy_instance(None) };
    }
}

/// Checks the configured layer requirements against the host's enumerated
/// layer list. Only called when diagnostics are enabled; with diagnostics
/// off no layer is required and no check happens.
fn validate_layer_requirements(
    required: &[CString],
    available: &[vk::LayerProperties],
) -> Result<(), InstanceCreationError> {
    let missing = layers::missing_layers(required, available);
    if missing.is_empty() {
        Ok(())
    } else {
        Err(InstanceCreationError::MissingLayers(missing))
    }
}

impl Instance {
    /// Creates a new instance.
    ///
    /// The enabled extension set is the union of whatever the windowing
    /// collaborator mandates for `display_handle_source` and, when
    /// `config.diagnostics` is set, `VK_EXT_debug_report`. With diagnostics
    /// enabled, `config.validation_layers` must all be present on the host
    /// or creation fails with [`InstanceCreationError::MissingLayers`]
    /// before any backend call is attempted.
    ///
    /// # Safety
    /// This loads vulkan using libloading, meaning that there can be
    /// arbitrary code executed. This is not great but it's *probably*
    /// fine?
    pub unsafe fn new(
        app_name: impl AsRef<str>,
        config: &ContextConfig,
        display_handle_source: Option<&impl HasDisplayHandle>,
    ) -> Result<Self, InstanceCreationError> {
        use InstanceCreationError as Error;

        let app_name_cstring = match CString::from_str(app_name.as_ref()) {
            Ok(cstr) => cstr,
            Err(_) => Err(Error::InvalidAppName)?,
        };
        //SAFETY: We pass on the burden of the safety from loading dlls to
        //the caller. As for Entry, we ensure all other vulkan objects are
        //dropped before Entry is dropped (handled in the Drop impl of
        //Instance)
        let entry = unsafe { ash::Entry::load() }.map_err(Error::Loading)?;

        //SAFETY: entry is a live Vulkan entry;
        //vkEnumerateInstanceVersion has no preconditions beyond a valid
        //entry point
        let api_version = unsafe { entry.try_enumerate_instance_version() }
            .unwrap_or(Some(vk::API_VERSION_1_0))
            .unwrap_or(vk::API_VERSION_1_0);

        let mut window_exts: Vec<&CStr> = Vec::new();
        if let Some(display_handle_source) = display_handle_source {
            // The windowing collaborator decides which platform surface
            // extensions the instance needs.
            let mandated = ash_window::enumerate_required_extensions(
                display_handle_source
                    .display_handle()
                    .map_err(Error::InvalidDisplayHandle)?
                    .as_raw(),
            )?;

            window_exts.extend(
                mandated
                    .iter()
                    //SAFETY: ash_window promises to hand us null terminated
                    //C strings in its API. This isn't enforced anywhere
                    //through any safety means but it is documented
                    .map(|ext_cstr_ptr| unsafe { CStr::from_ptr(*ext_cstr_ptr) }),
            );
        }

        //SAFETY: entry is a live Vulkan entry; passing None queries global
        //extensions and does not dereference any layer name
        let instance_exts_avail =
            unsafe { entry.enumerate_instance_extension_properties(None) }?;

        let missing_exts = layers::missing_extensions(&window_exts, &instance_exts_avail);
        if !missing_exts.is_empty() {
            return Err(Error::MissingExtensions(missing_exts));
        }

        let enabled_layers: Vec<CString> = if config.diagnostics {
            //SAFETY: entry is a live Vulkan entry;
            //vkEnumerateInstanceLayerProperties has no additional
            //preconditions
            let layers_avail = unsafe { entry.enumerate_instance_layer_properties() }?;
            validate_layer_requirements(&config.validation_layers, &layers_avail)?;
            config.validation_layers.clone()
        } else {
            Vec::new()
        };

        let enabled_exts = layers::requested_extensions(&window_exts, config.diagnostics);
        let enabled_ext_ptrs: Vec<*const c_char> =
            enabled_exts.iter().map(|ext| ext.as_ptr()).collect();
        let enabled_layer_ptrs: Vec<*const c_char> =
            enabled_layers.iter().map(|layer| layer.as_ptr()).collect();

        let engine_name = c"vkboot";

        let app_info = vk::ApplicationInfo::default()
            .application_name(&app_name_cstring)
            .application_version(vk::make_api_version(0, 0, 1, 0))
            .engine_name(engine_name)
            .engine_version(vk::make_api_version(0, 0, 1, 0))
            .api_version(api_version);

        let instance_create_info = vk::InstanceCreateInfo::default()
            .application_info(&app_info)
            .enabled_extension_names(&enabled_ext_ptrs)
            .enabled_layer_names(&enabled_layer_ptrs);

        //SAFETY: We made a valid instance_create_info and every pointer in
        //it lives until the call returns
        let instance = unsafe { entry.create_instance(&instance_create_info, None) }
            .map_err(Error::CreationFailed)?;

        tracing::debug!(
            "Created instance {:?} (api version {})",
            instance.handle(),
            ApiVersion::from_raw(api_version),
        );

        Ok(Instance {
            entry,
            handle: instance,
            enabled_layers,
            ver: ApiVersion::from_raw(api_version),
        })
    }

    /// Get a vector of handles to available physical devices. These handles
    /// are ONLY valid in the context of this instance.
    pub fn fetch_raw_physical_devices(
        &self,
    ) -> Result<Vec<vk::PhysicalDevice>, FetchPhysicalDeviceError> {
        //SAFETY: Pretty much always fine
        match unsafe { self.handle.enumerate_physical_devices() } {
            Ok(v) => Ok(v),
            Err(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY)
            | Err(vk::Result::ERROR_OUT_OF_HOST_MEMORY) => {
                Err(FetchPhysicalDeviceError::MemoryExhaustion)
            }
            Err(e) => Err(FetchPhysicalDeviceError::UnknownVulkan(e)),
        }
    }

    /// Get the properties of a physical device.
    ///
    /// # Safety
    /// `physical_device` must be a valid handle derived from this instance.
    pub unsafe fn get_raw_physical_device_properties(
        &self,
        physical_device: vk::PhysicalDevice,
    ) -> vk::PhysicalDeviceProperties {
        //SAFETY: physical_device was derived from this instance
        unsafe { self.handle.get_physical_device_properties(physical_device) }
    }

    /// Get the queue family properties of a physical device.
    ///
    /// # Safety
    /// `physical_device` must be a valid handle derived from this instance.
    pub unsafe fn get_raw_physical_device_queue_family_properties(
        &self,
        physical_device: vk::PhysicalDevice,
    ) -> Vec<vk::QueueFamilyProperties> {
        //SAFETY: physical_device was derived from this instance
        unsafe {
            self.handle
                .get_physical_device_queue_family_properties(physical_device)
        }
    }

    /// Create a logical device from a physical device.
    ///
    /// # Safety
    /// `physical_device` must be a valid handle derived from this instance.
    /// `create_info` must be a valid DeviceCreateInfo. Any handles
    /// referenced by `create_info` must also be derived from this instance
    /// and remain valid for the duration of the call.
    pub unsafe fn create_ash_device(
        &self,
        physical_device: vk::PhysicalDevice,
        create_info: &vk::DeviceCreateInfo<'_>,
    ) -> Result<ash::Device, vk::Result> {
        //SAFETY: physical_device was derived from this instance,
        //create_info is valid
        unsafe { self.handle.create_device(physical_device, create_info, None) }
    }

    /// The layer names that were enabled at instance creation time. Empty
    /// unless diagnostics were requested.
    pub fn enabled_layer_names(&self) -> &[CString] {
        &self.enabled_layers
    }

    /// The Vulkan API version negotiated at instance creation time.
    pub fn supported_ver(&self) -> ApiVersion {
        self.ver
    }

    pub fn raw_instance(&self) -> vk::Instance {
        self.handle.handle()
    }

    pub fn ash_instance(&self) -> &ash::Instance {
        &self.handle
    }

    pub(crate) fn ash_entry(&self) -> &ash::Entry {
        &self.entry
    }
}

#[derive(Debug, Error)]
pub enum FetchPhysicalDeviceError {
    #[error("Error fetching physical devices, memory exhaustion")]
    MemoryExhaustion,
    #[error("Error fetching physical devices, Unknown vulkan: {0}")]
    UnknownVulkan(vk::Result),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::c_char;

    fn layer_props(name: &CStr) -> vk::LayerProperties {
        let mut props = vk::LayerProperties::default();
        for (dst, src) in props.layer_name.iter_mut().zip(name.to_bytes_with_nul()) {
            *dst = *src as c_char;
        }
        props
    }

    #[test]
    fn layer_validation_fails_on_empty_host_list() {
        let required = vec![c"VK_LAYER_KHRONOS_validation".to_owned()];

        let result = validate_layer_requirements(&required, &[]);
        assert!(matches!(
            result,
            Err(InstanceCreationError::MissingLayers(missing))
                if missing == vec!["VK_LAYER_KHRONOS_validation".to_owned()]
        ));
    }

    #[test]
    fn layer_validation_passes_when_layers_present() {
        let required = vec![c"VK_LAYER_KHRONOS_validation".to_owned()];
        let available = vec![layer_props(c"VK_LAYER_KHRONOS_validation")];

        assert!(validate_layer_requirements(&required, &available).is_ok());
    }

    #[test]
    fn api_version_decodes_components() {
        let ver = ApiVersion::from_raw(vk::make_api_version(0, 1, 3, 275));

        assert_eq!(ver.major(), 1);
        assert_eq!(ver.minor(), 3);
        assert_eq!(ver.patch(), 275);
        assert_eq!(ver.to_string(), "1.3.275");
    }

    #[test]
    fn api_version_raw_roundtrip() {
        let raw = vk::make_api_version(0, 1, 2, 198);
        assert_eq!(ApiVersion::from_raw(raw).to_raw(), raw);
    }
}
