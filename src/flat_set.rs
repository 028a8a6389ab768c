use std::ffi::{CStr, CString};
use std::os::raw::c_char;

/// Set stored as a contiguous sorted vector.
///
/// Layer and extension name lists are tiny and only built once at startup,
/// so a sorted `Vec` beats a tree or hash set: dense storage, cheap
/// iteration, and the backing slice can be handed straight to Vulkan.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FlatSet<T: Ord> {
    data: Vec<T>,
}

impl<T: Ord> FlatSet<T> {
    pub fn new() -> Self {
        Self { data: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn contains(&self, value: &T) -> bool {
        self.data.binary_search(value).is_ok()
    }

    /// Inserts while keeping the vector sorted. Duplicates are ignored.
    /// Returns whether the value was actually added.
    pub fn insert(&mut self, value: T) -> bool {
        match self.data.binary_search(&value) {
            Ok(_) => false,
            Err(index) => {
                self.data.insert(index, value);
                true
            }
        }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.data.iter()
    }

    pub fn as_slice(&self) -> &[T] {
        &self.data
    }
}

impl<T: Ord> FromIterator<T> for FlatSet<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut set = Self::new();
        for value in iter {
            set.insert(value);
        }
        set
    }
}

impl<'a, T: Ord> IntoIterator for &'a FlatSet<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.data.iter()
    }
}

/// Deduplicated, sorted list of C string names, as passed to
/// `enabled_layer_names`/`enabled_extension_names` at instance and device
/// creation.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct NameSet {
    names: FlatSet<CString>,
}

impl NameSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, name: &CStr) -> bool {
        self.names.insert(name.to_owned())
    }

    pub fn contains(&self, name: &CStr) -> bool {
        self.names
            .as_slice()
            .binary_search_by(|candidate| candidate.as_c_str().cmp(name))
            .is_ok()
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CStr> {
        self.names.iter().map(|name| name.as_c_str())
    }

    /// Pointer array for Vulkan create infos. The pointers borrow from this
    /// set and are valid until it is mutated or dropped.
    pub fn as_ptrs(&self) -> Vec<*const c_char> {
        self.names.iter().map(|name| name.as_ptr()).collect()
    }

    /// Checks every requested name against an enumerated property list,
    /// logging each one, and returns the names that are not available.
    pub fn missing_from<'a>(&self, available: impl IntoIterator<Item = &'a CStr>) -> Vec<CString> {
        let available: Vec<&CStr> = available.into_iter().collect();

        let mut missing = Vec::new();
        for name in self.iter() {
            if available.contains(&name) {
                info!("[x] {}", name.to_string_lossy());
            } else {
                warn!("[ ] {}", name.to_string_lossy());
                missing.push(name.to_owned());
            }
        }
        missing
    }
}

impl<'a> FromIterator<&'a CStr> for NameSet {
    fn from_iter<I: IntoIterator<Item = &'a CStr>>(iter: I) -> Self {
        Self {
            names: iter.into_iter().map(CStr::to_owned).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cstr(s: &str) -> CString {
        CString::new(s).unwrap()
    }

    #[test]
    fn flat_set_stays_sorted_and_unique() {
        let mut set = FlatSet::new();
        assert!(set.insert(3));
        assert!(set.insert(1));
        assert!(set.insert(2));
        assert!(!set.insert(2));

        assert_eq!(set.as_slice(), &[1, 2, 3]);
        assert_eq!(set.len(), 3);
    }

    #[test]
    fn flat_set_contains() {
        let set: FlatSet<u32> = [5, 1, 5, 9].into_iter().collect();
        assert_eq!(set.len(), 3);
        assert!(set.contains(&5));
        assert!(!set.contains(&2));
    }

    #[test]
    fn name_set_deduplicates() {
        let mut names = NameSet::new();
        assert!(names.add(&cstr("VK_LAYER_KHRONOS_validation")));
        assert!(!names.add(&cstr("VK_LAYER_KHRONOS_validation")));
        assert!(names.add(&cstr("VK_EXT_debug_utils")));

        assert_eq!(names.len(), 2);
        assert!(names.contains(&cstr("VK_EXT_debug_utils")));
        assert_eq!(names.as_ptrs().len(), 2);
    }

    #[test]
    fn name_set_iteration_matches_pointer_order() {
        let mut names = NameSet::new();
        names.add(&cstr("b"));
        names.add(&cstr("a"));

        let order: Vec<_> = names.iter().map(|n| n.to_owned()).collect();
        assert_eq!(order, vec![cstr("a"), cstr("b")]);

        let ptrs = names.as_ptrs();
        let via_ptrs: Vec<CString> = ptrs
            .iter()
            .map(|&p| unsafe { CStr::from_ptr(p) }.to_owned())
            .collect();
        assert_eq!(via_ptrs, order);
    }

    #[test]
    fn missing_from_reports_unavailable_names() {
        let mut names = NameSet::new();
        names.add(&cstr("VK_KHR_surface"));
        names.add(&cstr("VK_EXT_debug_utils"));

        let surface = cstr("VK_KHR_surface");
        let swapchain = cstr("VK_KHR_swapchain");
        let available = [surface.as_c_str(), swapchain.as_c_str()];

        let missing = names.missing_from(available);
        assert_eq!(missing, vec![cstr("VK_EXT_debug_utils")]);

        let debug_utils = cstr("VK_EXT_debug_utils");
        let all = [surface.as_c_str(), debug_utils.as_c_str()];
        assert!(names.missing_from(all).is_empty());
    }
}
