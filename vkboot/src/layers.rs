//! Layer and extension bookkeeping for instance creation.
//!
//! These helpers are pure list logic over the property structs returned by
//! the two-call enumeration entry points; the enumeration itself lives in
//! [`Instance::new`](crate::instance::Instance::new).

use std::ffi::{CStr, CString};

use ash::vk;

/// Names from `required` that do not appear in the host's enumerated layer
/// list. An empty result means every required layer is available.
pub fn missing_layers(
    required: &[CString],
    available: &[vk::LayerProperties],
) -> Vec<String> {
    required
        .iter()
        .filter(|req| {
            !available
                .iter()
                .any(|layer| layer.layer_name_as_c_str() == Ok(req.as_c_str()))
        })
        .map(|req| req.to_string_lossy().into_owned())
        .collect()
}

/// Names from `required` that do not appear in the host's enumerated
/// instance extension list.
pub fn missing_extensions(
    required: &[&CStr],
    available: &[vk::ExtensionProperties],
) -> Vec<String> {
    required
        .iter()
        .filter(|req| {
            !available
                .iter()
                .any(|ext| ext.extension_name_as_c_str() == Ok(**req))
        })
        .map(|ext| ext.to_string_lossy().into_owned())
        .collect()
}

/// The full extension set to enable on the instance: everything the
/// windowing collaborator mandates, plus `VK_EXT_debug_report` if and only
/// if diagnostics are enabled.
pub fn requested_extensions<'a>(
    window_exts: &[&'a CStr],
    diagnostics: bool,
) -> Vec<&'a CStr> {
    let mut exts = window_exts.to_vec();
    if diagnostics {
        exts.push(ash::ext::debug_report::NAME);
    }
    exts
}
