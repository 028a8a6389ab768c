use ash::vk;
use std::cmp::Ordering;
use std::fmt::{Display, Formatter};

/// Unpacked Vulkan version word.
///
/// The packed `u32` encoding puts the variant in the top bits, so comparing
/// raw words orders by variant last. Variant selects a whole API flavor and
/// has to dominate the comparison, which is why `Ord` is written out by hand.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Version {
    pub variant: u32,
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl Version {
    pub const V1_0: Self = Self::new(1, 0, 0);
    pub const V1_1: Self = Self::new(1, 1, 0);
    pub const V1_2: Self = Self::new(1, 2, 0);
    pub const V1_3: Self = Self::new(1, 3, 0);

    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            variant: 0,
            major,
            minor,
            patch,
        }
    }

    pub const fn from_vulkan(version: u32) -> Self {
        Self {
            variant: vk::api_version_variant(version),
            major: vk::api_version_major(version),
            minor: vk::api_version_minor(version),
            patch: vk::api_version_patch(version),
        }
    }

    pub const fn to_vulkan(self) -> u32 {
        vk::make_api_version(self.variant, self.major, self.minor, self.patch)
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.variant, self.major, self.minor, self.patch).cmp(&(
            other.variant,
            other.major,
            other.minor,
            other.patch,
        ))
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Display for Version {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?;
        if self.variant != 0 {
            write!(f, " variant({})", self.variant)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packed_roundtrip() {
        let version = Version::from_vulkan(vk::make_api_version(0, 1, 3, 275));
        assert_eq!(version, Version::new(1, 3, 275));
        assert_eq!(version.to_vulkan(), vk::make_api_version(0, 1, 3, 275));
    }

    #[test]
    fn variant_dominates_ordering() {
        let vulkan = Version::new(1, 3, 0);
        let variant = Version {
            variant: 1,
            major: 1,
            minor: 0,
            patch: 0,
        };

        // A higher variant outranks any major/minor/patch, even though the
        // packed encoding would sort these the other way around.
        assert!(variant > vulkan);
        assert!(vulkan.to_vulkan() > variant.to_vulkan());
    }

    #[test]
    fn ordering_within_variant() {
        assert!(Version::V1_3 > Version::V1_2);
        assert!(Version::new(1, 2, 200) > Version::new(1, 2, 199));
        assert_eq!(Version::V1_0, Version::new(1, 0, 0));
    }

    #[test]
    fn display_hides_zero_variant() {
        assert_eq!(Version::new(1, 2, 170).to_string(), "1.2.170");

        let weird = Version {
            variant: 2,
            major: 1,
            minor: 0,
            patch: 0,
        };
        assert_eq!(weird.to_string(), "1.0.0 variant(2)");
    }
}
