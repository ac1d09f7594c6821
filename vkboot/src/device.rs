//! Logical device creation and the submission queue handle.

use std::ffi::c_char;
use std::slice;
use std::sync::Arc;

use ash::vk;
use thiserror::Error;

use crate::instance::Instance;
use crate::select::PhysicalDeviceInfo;

/// A logical device bound to one physical device and one queue family,
/// holding the single submission queue retrieved at creation time.
pub struct Device {
    parent: Arc<Instance>,
    handle: ash::Device,
    physical_device: vk::PhysicalDevice,
    queue: vk::Queue,
    queue_family: u32,
}

impl std::fmt::Debug for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Device")
            .field("handle", &self.handle.handle())
            .field("queue_family", &self.queue_family)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Error)]
pub enum DeviceCreationError {
    #[error("Failed to create logical device: {0}")]
    CreationFailed(vk::Result),
}

impl Drop for Device {
    fn drop(&mut self) {
        tracing::debug!("Dropping device {:?}", self.handle.handle());
        //SAFETY: All objects derived from this device should be dropped
        //before this device is dropped.
        unsafe { self.handle.destroy_device(None) };
    }
}

impl Device {
    /// Creates a logical device on `physical` with exactly one queue from
    /// `queue_family`, at priority 1.0. The layer set enabled on the
    /// instance is propagated into the device create info; device-level
    /// layers are ignored by modern implementations but older loaders
    /// still read them.
    ///
    /// # Safety
    /// `physical` must stem from
    /// [`enumerate_devices`](crate::select::enumerate_devices) on this
    /// same instance, and `queue_family` must be a valid family index for
    /// it (as returned by
    /// [`find_queue_family`](crate::select::find_queue_family)).
    pub unsafe fn new(
        instance: &Arc<Instance>,
        physical: &PhysicalDeviceInfo,
        queue_family: u32,
    ) -> Result<Self, DeviceCreationError> {
        let queue_priorities = [1.0f32];
        let queue_create_info = vk::DeviceQueueCreateInfo::default()
            .queue_family_index(queue_family)
            .queue_priorities(&queue_priorities);

        let layer_ptrs: Vec<*const c_char> = instance
            .enabled_layer_names()
            .iter()
            .map(|layer| layer.as_ptr())
            .collect();

        #[allow(deprecated)]
        let device_create_info = vk::DeviceCreateInfo::default()
            .queue_create_infos(slice::from_ref(&queue_create_info))
            .enabled_layer_names(&layer_ptrs);

        //SAFETY: physical stems from this instance (caller guarantees) and
        //device_create_info is valid for the duration of the call
        let device = unsafe {
            instance.create_ash_device(physical.raw_handle(), &device_create_info)
        }
        .map_err(DeviceCreationError::CreationFailed)?;

        //SAFETY: device was just created with one queue in queue_family
        let queue = unsafe { device.get_device_queue(queue_family, 0) };

        tracing::info!(
            "Created logical device on {:?} (queue family {})",
            physical.name,
            queue_family
        );

        Ok(Self {
            parent: Arc::clone(instance),
            handle: device,
            physical_device: physical.raw_handle(),
            queue,
            queue_family,
        })
    }

    pub fn get_parent(&self) -> &Arc<Instance> {
        &self.parent
    }

    pub fn get_physical_device(&self) -> vk::PhysicalDevice {
        self.physical_device
    }

    /// The work-submission queue retrieved at creation time. Valid for as
    /// long as this device lives.
    pub fn submission_queue(&self) -> vk::Queue {
        self.queue
    }

    pub fn queue_family(&self) -> u32 {
        self.queue_family
    }

    pub fn ash_handle(&self) -> &ash::Device {
        &self.handle
    }

    pub fn raw_handle(&self) -> vk::Device {
        self.handle.handle()
    }

    /// Wait until all submitted work on this device has completed.
    ///
    /// This may block the calling thread and should generally be used for
    /// coarse-grained transitions (shutdown, suspend) rather than hot
    /// per-frame paths.
    pub fn wait_idle(&self) -> Result<(), vk::Result> {
        let _span = tracing::debug_span!("device_wait_idle").entered();
        //SAFETY: self.handle is a valid logical device for the lifetime of
        //self, and this call has no additional pointer preconditions
        unsafe { self.handle.device_wait_idle() }
    }
}
