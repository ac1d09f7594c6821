//! Configuration passed explicitly into instance creation and device
//! selection. There is no process-wide state; callers construct these and
//! hand them down.

use std::ffi::CString;

use ash::vk;

/// Settings consumed by [`Instance::new`](crate::instance::Instance::new).
///
/// `validation_layers` is the layer set required whenever `diagnostics` is
/// true; instance creation fails up front if any of them is absent from the
/// host. `report_flags` selects which debug report severities are forwarded
/// to the log.
#[derive(Debug, Clone)]
pub struct ContextConfig {
    pub diagnostics: bool,
    pub validation_layers: Vec<CString>,
    pub report_flags: vk::DebugReportFlagsEXT,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            diagnostics: false,
            validation_layers: vec![c"VK_LAYER_KHRONOS_validation".to_owned()],
            report_flags: vk::DebugReportFlagsEXT::ERROR
                | vk::DebugReportFlagsEXT::WARNING
                | vk::DebugReportFlagsEXT::PERFORMANCE_WARNING,
        }
    }
}

/// Capabilities a physical device must expose to be selectable.
///
/// A device qualifies when at least one of its queue families advertises
/// every bit in `queue_flags` and has a nonzero queue count.
#[derive(Debug, Clone, Copy)]
pub struct DeviceRequirements {
    pub queue_flags: vk::QueueFlags,
}

impl Default for DeviceRequirements {
    fn default() -> Self {
        Self {
            queue_flags: vk::QueueFlags::GRAPHICS | vk::QueueFlags::TRANSFER,
        }
    }
}
