//! The full initialization sequence, bundled.
//!
//! [`GraphicsContext::initialize`] runs the strict linear sequence
//! instance → debug reporter → enumerate → select → logical device. Every
//! failure aborts the sequence and surfaces unmodified through
//! [`BootstrapError`]; nothing is retried.

use std::sync::Arc;

use raw_window_handle::HasDisplayHandle;
use thiserror::Error;

use crate::config::{ContextConfig, DeviceRequirements};
use crate::debug::{DebugReporter, InstallDebugError};
use crate::device::{Device, DeviceCreationError};
use crate::instance::{FetchPhysicalDeviceError, Instance, InstanceCreationError};
use crate::select::{self, SelectDeviceError};

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("Error creating instance: {0}")]
    Instance(#[from] InstanceCreationError),
    #[error("Error installing debug reporter: {0}")]
    Debug(#[from] InstallDebugError),
    #[error("Error enumerating physical devices: {0}")]
    Enumerate(#[from] FetchPhysicalDeviceError),
    #[error("Error selecting physical device: {0}")]
    Select(#[from] SelectDeviceError),
    #[error("Error creating logical device: {0}")]
    Device(#[from] DeviceCreationError),
}

/// Everything produced by a successful bootstrap.
///
/// Field declaration order is load-bearing: Rust drops fields in
/// declaration order, so teardown runs device → debug reporter →
/// instance, the exact reverse of initialization.
#[derive(Debug)]
pub struct GraphicsContext {
    device: Device,
    debug: Option<DebugReporter>,
    instance: Arc<Instance>,
}

impl GraphicsContext {
    /// Runs the whole initialization sequence.
    ///
    /// The debug reporter is installed only when `config.diagnostics` is
    /// set; in that case a missing debug-report entry point is fatal.
    /// Device selection takes the first enumerated device satisfying
    /// `requirements`, in enumeration order.
    ///
    /// # Safety
    /// Shares [`Instance::new`]'s contract: the Vulkan shared library is
    /// loaded at runtime and can execute arbitrary code.
    pub unsafe fn initialize(
        app_name: impl AsRef<str>,
        config: &ContextConfig,
        requirements: &DeviceRequirements,
        display_handle_source: Option<&impl HasDisplayHandle>,
    ) -> Result<Self, BootstrapError> {
        //SAFETY: passed on to the caller
        let instance =
            Arc::new(unsafe { Instance::new(app_name, config, display_handle_source) }?);

        let debug = if config.diagnostics {
            Some(DebugReporter::install(&instance, config.report_flags)?)
        } else {
            None
        };

        let devices = select::enumerate_devices(&instance)?;
        let selected = select::select_physical_device(&devices, |candidate| {
            candidate.supports(requirements)
        })?;
        let queue_family =
            select::find_queue_family(&selected.queue_families, requirements.queue_flags)
                .ok_or(SelectDeviceError::NoSuitableDevice)?;

        tracing::info!(
            "Selected physical device: {:?} (type: {:?}, queue family: {})",
            selected.name,
            selected.device_type,
            queue_family
        );

        //SAFETY: selected was enumerated from instance and queue_family
        //came from find_queue_family on it
        let device = unsafe { Device::new(&instance, selected, queue_family) }?;

        Ok(Self {
            device,
            debug,
            instance,
        })
    }

    pub fn instance(&self) -> &Arc<Instance> {
        &self.instance
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    pub fn has_diagnostics(&self) -> bool {
        self.debug.is_some()
    }
}
