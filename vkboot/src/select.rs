//! Physical device enumeration, capability matching, and selection.
//!
//! Enumeration produces plain [`PhysicalDeviceInfo`] values so the
//! selection logic stays independent of the backend and can be tested on
//! synthetic device lists.

use ash::vk;
use thiserror::Error;

use crate::config::DeviceRequirements;
use crate::instance::{FetchPhysicalDeviceError, Instance};

/// One queue family of a physical device: its capability flags and how
/// many queues it exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueFamilyInfo {
    pub flags: vk::QueueFlags,
    pub queue_count: u32,
}

/// Identity and queue-family capability table of one candidate physical
/// device. The raw handle is only valid in the context of the instance
/// that enumerated it.
#[derive(Debug, Clone)]
pub struct PhysicalDeviceInfo {
    handle: vk::PhysicalDevice,
    pub name: String,
    pub device_type: vk::PhysicalDeviceType,
    pub queue_families: Vec<QueueFamilyInfo>,
}

impl PhysicalDeviceInfo {
    pub fn raw_handle(&self) -> vk::PhysicalDevice {
        self.handle
    }

    /// Whether this device exposes a queue family covering every
    /// capability in `requirements`.
    pub fn supports(&self, requirements: &DeviceRequirements) -> bool {
        find_queue_family(&self.queue_families, requirements.queue_flags).is_some()
    }
}

#[derive(Debug, Error)]
pub enum SelectDeviceError {
    #[error("No Vulkan physical devices are present")]
    NoDevices,
    #[error("No physical device satisfies the requested capabilities")]
    NoSuitableDevice,
}

/// Gather identity and queue-family information for every physical device
/// exposed by `instance`. Properties are queried once per device, in
/// enumeration order.
pub fn enumerate_devices(
    instance: &Instance,
) -> Result<Vec<PhysicalDeviceInfo>, FetchPhysicalDeviceError> {
    let handles = instance.fetch_raw_physical_devices()?;

    Ok(handles
        .iter()
        .map(|&dev| {
            //SAFETY: dev was just enumerated from instance
            let props = unsafe { instance.get_raw_physical_device_properties(dev) };
            //SAFETY: dev was just enumerated from instance
            let families = unsafe {
                instance.get_raw_physical_device_queue_family_properties(dev)
            };

            PhysicalDeviceInfo {
                handle: dev,
                name: props
                    .device_name_as_c_str()
                    .unwrap_or(c"unknown")
                    .to_string_lossy()
                    .into_owned(),
                device_type: props.device_type,
                queue_families: families
                    .iter()
                    .map(|family| QueueFamilyInfo {
                        flags: family.queue_flags,
                        queue_count: family.queue_count,
                    })
                    .collect(),
            }
        })
        .collect())
}

/// Picks the first device in enumeration order that satisfies `predicate`.
///
/// Deliberately not a scoring search: candidates are tested in the order
/// the backend reported them and the first acceptable one wins, so the
/// same host always yields the same device.
pub fn select_physical_device<'a, P>(
    devices: &'a [PhysicalDeviceInfo],
    predicate: P,
) -> Result<&'a PhysicalDeviceInfo, SelectDeviceError>
where
    P: Fn(&PhysicalDeviceInfo) -> bool,
{
    if devices.is_empty() {
        return Err(SelectDeviceError::NoDevices);
    }

    devices
        .iter()
        .find(|device| predicate(device))
        .ok_or(SelectDeviceError::NoSuitableDevice)
}

/// First family index whose capability set contains every bit of
/// `required` and which exposes at least one queue; `None` if the list is
/// exhausted.
///
/// Matching is full-superset (`flags & required == required`): a family
/// that merely overlaps `required` on some bits is skipped.
pub fn find_queue_family(
    families: &[QueueFamilyInfo],
    required: vk::QueueFlags,
) -> Option<u32> {
    families.iter().enumerate().find_map(|(idx, family)| {
        (family.queue_count > 0 && family.flags.contains(required))
            .then_some(idx as u32)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device(name: &str, families: &[QueueFamilyInfo]) -> PhysicalDeviceInfo {
        PhysicalDeviceInfo {
            handle: vk::PhysicalDevice::null(),
            name: name.to_owned(),
            device_type: vk::PhysicalDeviceType::DISCRETE_GPU,
            queue_families: families.to_vec(),
        }
    }

    fn family(flags: vk::QueueFlags, queue_count: u32) -> QueueFamilyInfo {
        QueueFamilyInfo { flags, queue_count }
    }

    #[test]
    fn selects_first_match_in_enumeration_order() {
        let devices = [
            device("a", &[family(vk::QueueFlags::COMPUTE, 1)]),
            device(
                "b",
                &[family(
                    vk::QueueFlags::GRAPHICS
                        | vk::QueueFlags::TRANSFER
                        | vk::QueueFlags::COMPUTE,
                    4,
                )],
            ),
            device(
                "c",
                &[family(vk::QueueFlags::GRAPHICS | vk::QueueFlags::TRANSFER, 1)],
            ),
        ];
        let requirements = DeviceRequirements::default();

        let selected =
            select_physical_device(&devices, |d| d.supports(&requirements)).unwrap();
        assert_eq!(selected.name, "b");

        let family_idx =
            find_queue_family(&selected.queue_families, requirements.queue_flags);
        assert_eq!(family_idx, Some(0));
    }

    #[test]
    fn empty_device_list_is_its_own_error() {
        let result = select_physical_device(&[], |_| true);
        assert!(matches!(result, Err(SelectDeviceError::NoDevices)));
    }

    #[test]
    fn no_candidate_satisfying_predicate_is_an_error() {
        let devices = [device("a", &[family(vk::QueueFlags::COMPUTE, 1)])];
        let requirements = DeviceRequirements::default();

        let result = select_physical_device(&devices, |d| d.supports(&requirements));
        assert!(matches!(result, Err(SelectDeviceError::NoSuitableDevice)));
    }

    #[test]
    fn queue_family_match_requires_full_superset() {
        // GRAPHICS alone overlaps GRAPHICS|TRANSFER on one bit but is not a
        // superset, so it must not match.
        let families = [
            family(vk::QueueFlags::GRAPHICS, 1),
            family(vk::QueueFlags::TRANSFER, 1),
            family(
                vk::QueueFlags::GRAPHICS
                    | vk::QueueFlags::TRANSFER
                    | vk::QueueFlags::COMPUTE,
                2,
            ),
        ];

        let idx = find_queue_family(
            &families,
            vk::QueueFlags::GRAPHICS | vk::QueueFlags::TRANSFER,
        );
        assert_eq!(idx, Some(2));
    }

    #[test]
    fn queue_family_with_zero_queues_is_skipped() {
        let families = [
            family(vk::QueueFlags::GRAPHICS | vk::QueueFlags::TRANSFER, 0),
            family(vk::QueueFlags::GRAPHICS | vk::QueueFlags::TRANSFER, 1),
        ];

        let idx = find_queue_family(
            &families,
            vk::QueueFlags::GRAPHICS | vk::QueueFlags::TRANSFER,
        );
        assert_eq!(idx, Some(1));
    }

    #[test]
    fn queue_family_lookup_is_deterministic() {
        let families = [
            family(vk::QueueFlags::GRAPHICS | vk::QueueFlags::TRANSFER, 1),
            family(vk::QueueFlags::GRAPHICS | vk::QueueFlags::TRANSFER, 1),
        ];
        let required = vk::QueueFlags::GRAPHICS | vk::QueueFlags::TRANSFER;

        let first = find_queue_family(&families, required);
        let second = find_queue_family(&families, required);
        assert_eq!(first, Some(0));
        assert_eq!(first, second);
    }

    #[test]
    fn exhausted_family_list_yields_none() {
        let families = [family(vk::QueueFlags::COMPUTE, 1)];

        let idx = find_queue_family(
            &families,
            vk::QueueFlags::GRAPHICS | vk::QueueFlags::TRANSFER,
        );
        assert_eq!(idx, None);
    }
}
