//! Device memory selection and allocation
//!
//! Selection is first-match: the lowest memory-type index that is allowed by
//! the resource's requirement mask and whose property flags include every
//! requested flag. There is no best-fit scoring and no fallback to a weaker
//! property set.

use crate::graphics::{context::GraphicsContext, error::GraphicsError};
use ash::vk;

/// One committed block of device memory.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Allocation {
    pub memory: vk::DeviceMemory,
    pub size: vk::DeviceSize,
    pub memory_type_index: u32,
}

/// Index of the first memory type allowed by `type_bits` that provides `required`.
pub fn find_memory_type_index(
    memory_types: &[vk::MemoryType],
    type_bits: u32,
    required: vk::MemoryPropertyFlags,
) -> Option<u32> {
    memory_types
        .iter()
        .take(vk::MAX_MEMORY_TYPES)
        .enumerate()
        .find(|&(i, memory_type)| {
            (type_bits >> i) & 1 == 1 && memory_type.property_flags.contains(required)
        })
        .map(|(i, _)| i as u32)
}

/// Allocate one block satisfying `requirements` from a memory type providing `required`.
///
/// The block is exactly `requirements.size` bytes; binding it is left to the caller.
pub fn allocate<C>(
    context: &C,
    requirements: &vk::MemoryRequirements,
    required: vk::MemoryPropertyFlags,
) -> Result<Allocation, GraphicsError>
where
    C: GraphicsContext + ?Sized,
{
    let memory_type_index =
        find_memory_type_index(context.memory_types(), requirements.memory_type_bits, required)
            .ok_or(GraphicsError::NoCompatibleMemoryType {
                type_bits: requirements.memory_type_bits,
                required,
            })?;

    let memory = context
        .allocate_memory(
            &vk::MemoryAllocateInfo::default()
                .allocation_size(requirements.size)
                .memory_type_index(memory_type_index),
        )
        .map_err(|result| GraphicsError::MemoryAllocationFailed {
            size: requirements.size,
            memory_type_index,
            result,
        })?;

    log::debug!(
        "allocated {} bytes from memory type {} ({:?})",
        requirements.size,
        memory_type_index,
        required
    );

    Ok(Allocation {
        memory,
        size: requirements.size,
        memory_type_index,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_type(property_flags: vk::MemoryPropertyFlags) -> vk::MemoryType {
        vk::MemoryType {
            property_flags,
            heap_index: 0,
        }
    }

    // A typical discrete-GPU table: device-local, host-visible staging,
    // host-visible cached, device-local + host-visible (BAR).
    fn discrete_table() -> Vec<vk::MemoryType> {
        use vk::MemoryPropertyFlags as F;
        vec![
            memory_type(F::DEVICE_LOCAL),
            memory_type(F::HOST_VISIBLE | F::HOST_COHERENT),
            memory_type(F::HOST_VISIBLE | F::HOST_COHERENT | F::HOST_CACHED),
            memory_type(F::DEVICE_LOCAL | F::HOST_VISIBLE | F::HOST_COHERENT),
        ]
    }

    #[test]
    fn picks_lowest_matching_index() {
        let table = discrete_table();
        assert_eq!(
            find_memory_type_index(&table, 0b1111, vk::MemoryPropertyFlags::DEVICE_LOCAL),
            Some(0)
        );
        assert_eq!(
            find_memory_type_index(&table, 0b1111, vk::MemoryPropertyFlags::HOST_VISIBLE),
            Some(1)
        );
    }

    #[test]
    fn respects_requirement_mask() {
        let table = discrete_table();
        // type 0 is excluded by the mask, so the next device-local type wins
        assert_eq!(
            find_memory_type_index(&table, 0b1110, vk::MemoryPropertyFlags::DEVICE_LOCAL),
            Some(3)
        );
        assert_eq!(
            find_memory_type_index(&table, 0b0110, vk::MemoryPropertyFlags::DEVICE_LOCAL),
            None
        );
    }

    #[test]
    fn requires_every_requested_flag() {
        let table = discrete_table();
        let wanted = vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_CACHED;
        assert_eq!(find_memory_type_index(&table, 0b1111, wanted), Some(2));
    }

    #[test]
    fn fails_when_no_type_has_the_flags() {
        let table = discrete_table();
        let wanted = vk::MemoryPropertyFlags::DEVICE_LOCAL | vk::MemoryPropertyFlags::LAZILY_ALLOCATED;
        assert_eq!(find_memory_type_index(&table, u32::MAX, wanted), None);
        assert_eq!(
            find_memory_type_index(&table, u32::MAX, vk::MemoryPropertyFlags::PROTECTED),
            None
        );
    }

    #[test]
    fn empty_requirements_match_first_allowed_type() {
        let table = discrete_table();
        assert_eq!(
            find_memory_type_index(&table, 0b1000, vk::MemoryPropertyFlags::empty()),
            Some(3)
        );
        assert_eq!(find_memory_type_index(&table, 0, vk::MemoryPropertyFlags::empty()), None);
        assert_eq!(find_memory_type_index(&[], u32::MAX, vk::MemoryPropertyFlags::empty()), None);
    }

    #[test]
    fn selection_is_deterministic() {
        let table = discrete_table();
        let first = find_memory_type_index(&table, 0b1011, vk::MemoryPropertyFlags::HOST_COHERENT);
        for _ in 0..16 {
            assert_eq!(
                find_memory_type_index(&table, 0b1011, vk::MemoryPropertyFlags::HOST_COHERENT),
                first
            );
        }
        assert_eq!(first, Some(1));
    }
}
