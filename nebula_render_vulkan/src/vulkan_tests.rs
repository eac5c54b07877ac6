use ash::vk;

use super::*;

#[test]
fn test_device_type_score_prefers_discrete() {
    let mut types = [
        vk::PhysicalDeviceType::CPU,
        vk::PhysicalDeviceType::DISCRETE_GPU,
        vk::PhysicalDeviceType::VIRTUAL_GPU,
        vk::PhysicalDeviceType::INTEGRATED_GPU,
        vk::PhysicalDeviceType::OTHER,
    ];
    types.sort_by_key(|t| std::cmp::Reverse(device_type_score(*t)));

    assert_eq!(types[0], vk::PhysicalDeviceType::DISCRETE_GPU);
    assert_eq!(types[1], vk::PhysicalDeviceType::INTEGRATED_GPU);
    assert_eq!(types[2], vk::PhysicalDeviceType::VIRTUAL_GPU);
}

#[test]
fn test_software_devices_score_lowest() {
    assert_eq!(device_type_score(vk::PhysicalDeviceType::CPU), 0);
    assert_eq!(device_type_score(vk::PhysicalDeviceType::OTHER), 0);
}
