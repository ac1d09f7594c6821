//! Debug report callback install/remove.
//!
//! `VK_EXT_debug_report` is not part of the core API, so its entry points
//! must be resolved by name at runtime. Resolution goes through the
//! [`ProcResolver`] trait rather than the raw backend so the bridge logic
//! can be exercised against fakes; [`Instance`] is the production resolver,
//! backed by `vkGetInstanceProcAddr`.

use std::ffi::{CStr, c_char, c_void};
use std::ptr;
use std::sync::Arc;

use ash::vk;
use thiserror::Error;

use crate::instance::Instance;

/// Resolves optional instance-level entry points by name.
///
/// Returns `None` when the implementation does not provide the named entry
/// point.
pub trait ProcResolver {
    fn resolve(&self, name: &CStr) -> vk::PFN_vkVoidFunction;
}

impl ProcResolver for Instance {
    fn resolve(&self, name: &CStr) -> vk::PFN_vkVoidFunction {
        //SAFETY: the instance handle is valid for the lifetime of self and
        //name is a null terminated C string
        unsafe {
            (self.ash_entry().static_fn().get_instance_proc_addr)(
                self.raw_instance(),
                name.as_ptr(),
            )
        }
    }
}

#[derive(Debug, Error)]
pub enum InstallDebugError {
    #[error("Entry point {0} is not provided by this Vulkan implementation")]
    EntryPointNotFound(&'static str),
    #[error("Failed to create debug report callback: {0}")]
    CreationFailed(vk::Result),
}

/// The debug report entry points, resolved by name.
struct DebugReportFns {
    create: vk::PFN_vkCreateDebugReportCallbackEXT,
    destroy: vk::PFN_vkDestroyDebugReportCallbackEXT,
}

impl DebugReportFns {
    fn resolve(resolver: &dyn ProcResolver) -> Result<Self, InstallDebugError> {
        let create = resolver
            .resolve(c"vkCreateDebugReportCallbackEXT")
            .ok_or(InstallDebugError::EntryPointNotFound(
                "vkCreateDebugReportCallbackEXT",
            ))?;
        let destroy = resolver
            .resolve(c"vkDestroyDebugReportCallbackEXT")
            .ok_or(InstallDebugError::EntryPointNotFound(
                "vkDestroyDebugReportCallbackEXT",
            ))?;

        Ok(Self {
            //SAFETY: the resolver returned this pointer for exactly this
            //name, so it has the vkCreateDebugReportCallbackEXT signature
            create: unsafe {
                std::mem::transmute::<
                    unsafe extern "system" fn(),
                    vk::PFN_vkCreateDebugReportCallbackEXT,
                >(create)
            },
            //SAFETY: as above, for vkDestroyDebugReportCallbackEXT
            destroy: unsafe {
                std::mem::transmute::<
                    unsafe extern "system" fn(),
                    vk::PFN_vkDestroyDebugReportCallbackEXT,
                >(destroy)
            },
        })
    }
}

unsafe extern "system" fn debug_report_callback(
    flags: vk::DebugReportFlagsEXT,
    _object_type: vk::DebugReportObjectTypeEXT,
    _object: u64,
    _location: usize,
    message_code: i32,
    p_layer_prefix: *const c_char,
    p_message: *const c_char,
    _p_user_data: *mut c_void,
) -> vk::Bool32 {
    //SAFETY: Vulkan guarantees both strings are valid null terminated C
    //strings for the duration of the callback
    let layer_prefix = unsafe { CStr::from_ptr(p_layer_prefix) }.to_string_lossy();
    //SAFETY: as above
    let message = unsafe { CStr::from_ptr(p_message) }.to_string_lossy();

    if flags.contains(vk::DebugReportFlagsEXT::ERROR) {
        tracing::error!(
            target: "vkboot-debug-report",
            "[{}] ({}) {}",
            layer_prefix,
            message_code,
            message
        );
    } else if flags.contains(vk::DebugReportFlagsEXT::WARNING)
        || flags.contains(vk::DebugReportFlagsEXT::PERFORMANCE_WARNING)
    {
        tracing::warn!(
            target: "vkboot-debug-report",
            "[{}] ({}) {}",
            layer_prefix,
            message_code,
            message
        );
    } else if flags.contains(vk::DebugReportFlagsEXT::INFORMATION) {
        tracing::info!(
            target: "vkboot-debug-report",
            "[{}] ({}) {}",
            layer_prefix,
            message_code,
            message
        );
    } else {
        tracing::debug!(
            target: "vkboot-debug-report",
            "[{}] ({}) {}",
            layer_prefix,
            message_code,
            message
        );
    }

    // Tell the triggering call to proceed rather than abort.
    vk::FALSE
}

/// # Safety
/// `instance` must be a live instance handle and `fns` must have been
/// resolved against it (or against a fake backend in tests).
unsafe fn install_raw(
    fns: &DebugReportFns,
    instance: vk::Instance,
    flags: vk::DebugReportFlagsEXT,
) -> Result<vk::DebugReportCallbackEXT, InstallDebugError> {
    let create_info = vk::DebugReportCallbackCreateInfoEXT::default()
        .flags(flags)
        .pfn_callback(Some(debug_report_callback));

    let mut callback = vk::DebugReportCallbackEXT::null();
    //SAFETY: create_info is valid and outlives the call; caller guarantees
    //instance validity and fns provenance
    let result =
        unsafe { (fns.create)(instance, &create_info, ptr::null(), &mut callback) };

    match result {
        vk::Result::SUCCESS => Ok(callback),
        e => Err(InstallDebugError::CreationFailed(e)),
    }
}

/// An installed debug report callback, bound 1:1 to its parent
/// [`Instance`].
///
/// Dropping removes the callback; the parent `Arc` guarantees the instance
/// outlives it.
pub struct DebugReporter {
    parent: Arc<Instance>,
    handle: vk::DebugReportCallbackEXT,
    fns: DebugReportFns,
}

impl std::fmt::Debug for DebugReporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DebugReporter")
            .field("handle", &self.handle)
            .finish_non_exhaustive()
    }
}

impl DebugReporter {
    /// Resolves the debug report entry points against `instance` and
    /// installs the callback. `flags` selects which severities the
    /// implementation reports.
    pub fn install(
        instance: &Arc<Instance>,
        flags: vk::DebugReportFlagsEXT,
    ) -> Result<Self, InstallDebugError> {
        let fns = DebugReportFns::resolve(instance.as_ref())?;
        //SAFETY: fns was resolved against this instance on the line above
        let handle = unsafe { install_raw(&fns, instance.raw_instance(), flags) }?;

        tracing::debug!("Installed debug report callback {:?}", handle);

        Ok(Self {
            parent: Arc::clone(instance),
            handle,
            fns,
        })
    }

    pub fn raw_handle(&self) -> vk::DebugReportCallbackEXT {
        self.handle
    }
}

impl Drop for DebugReporter {
    fn drop(&mut self) {
        tracing::debug!("Removing debug report callback {:?}", self.handle);
        // A null handle means install never took effect; removal is a
        // no-op then.
        if self.handle != vk::DebugReportCallbackEXT::null() {
            //SAFETY: handle was created from this instance through
            //fns.create and this is its last use
            unsafe {
                (self.fns.destroy)(self.parent.raw_instance(), self.handle, ptr::null())
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ash::vk::Handle;
    use std::mem;
    use std::sync::Mutex;

    struct NullResolver;

    impl ProcResolver for NullResolver {
        fn resolve(&self, _name: &CStr) -> vk::PFN_vkVoidFunction {
            None
        }
    }

    #[test]
    fn resolve_fails_when_entry_points_are_missing() {
        let result = DebugReportFns::resolve(&NullResolver);
        assert!(matches!(
            result,
            Err(InstallDebugError::EntryPointNotFound(
                "vkCreateDebugReportCallbackEXT"
            ))
        ));
    }

    static BACKEND_CALLS: Mutex<Vec<&'static str>> = Mutex::new(Vec::new());

    unsafe extern "system" fn recording_create(
        _instance: vk::Instance,
        _create_info: *const vk::DebugReportCallbackCreateInfoEXT<'_>,
        _allocator: *const vk::AllocationCallbacks<'_>,
        p_callback: *mut vk::DebugReportCallbackEXT,
    ) -> vk::Result {
        BACKEND_CALLS.lock().unwrap().push("create");
        //SAFETY: the caller passes a valid out pointer
        unsafe { *p_callback = vk::DebugReportCallbackEXT::from_raw(0x1d) };
        vk::Result::SUCCESS
    }

    unsafe extern "system" fn recording_destroy(
        _instance: vk::Instance,
        _callback: vk::DebugReportCallbackEXT,
        _allocator: *const vk::AllocationCallbacks<'_>,
    ) {
        BACKEND_CALLS.lock().unwrap().push("destroy");
    }

    unsafe extern "system" fn failing_create(
        _instance: vk::Instance,
        _create_info: *const vk::DebugReportCallbackCreateInfoEXT<'_>,
        _allocator: *const vk::AllocationCallbacks<'_>,
        _p_callback: *mut vk::DebugReportCallbackEXT,
    ) -> vk::Result {
        vk::Result::ERROR_EXTENSION_NOT_PRESENT
    }

    struct FakeBackendResolver {
        create: vk::PFN_vkCreateDebugReportCallbackEXT,
    }

    impl ProcResolver for FakeBackendResolver {
        fn resolve(&self, name: &CStr) -> vk::PFN_vkVoidFunction {
            if name == c"vkCreateDebugReportCallbackEXT" {
                //SAFETY: transmuting to the untyped fn pointer for
                //transport; the consumer transmutes back to the same
                //signature
                Some(unsafe {
                    mem::transmute::<
                        vk::PFN_vkCreateDebugReportCallbackEXT,
                        unsafe extern "system" fn(),
                    >(self.create)
                })
            } else if name == c"vkDestroyDebugReportCallbackEXT" {
                let destroy: vk::PFN_vkDestroyDebugReportCallbackEXT =
                    recording_destroy;
                //SAFETY: as above
                Some(unsafe {
                    mem::transmute::<
                        vk::PFN_vkDestroyDebugReportCallbackEXT,
                        unsafe extern "system" fn(),
                    >(destroy)
                })
            } else {
                None
            }
        }
    }

    #[test]
    fn install_then_remove_hits_backend_in_order() {
        let resolver = FakeBackendResolver {
            create: recording_create,
        };
        let fns = DebugReportFns::resolve(&resolver).unwrap();

        BACKEND_CALLS.lock().unwrap().clear();

        //SAFETY: fns points at the recording fakes, which tolerate a null
        //instance
        let handle = unsafe {
            install_raw(
                &fns,
                vk::Instance::null(),
                vk::DebugReportFlagsEXT::ERROR | vk::DebugReportFlagsEXT::WARNING,
            )
        }
        .unwrap();
        assert_eq!(handle.as_raw(), 0x1d);

        //SAFETY: as above
        unsafe { (fns.destroy)(vk::Instance::null(), handle, ptr::null()) };

        let calls = BACKEND_CALLS.lock().unwrap();
        assert_eq!(*calls, vec!["create", "destroy"]);
    }

    #[test]
    fn install_maps_backend_failure() {
        let resolver = FakeBackendResolver {
            create: failing_create,
        };
        let fns = DebugReportFns::resolve(&resolver).unwrap();

        //SAFETY: fns points at fakes, which tolerate a null instance
        let result = unsafe {
            install_raw(&fns, vk::Instance::null(), vk::DebugReportFlagsEXT::ERROR)
        };
        assert!(matches!(
            result,
            Err(InstallDebugError::CreationFailed(
                vk::Result::ERROR_EXTENSION_NOT_PRESENT
            ))
        ));
    }
}
