use std::collections::HashMap;
use vec_map::VecMap;

/// The fixed display set: general-purpose registers, instruction pointer,
/// flags, and segment selectors, in presentation order.
pub const CANONICAL_REGISTERS: [&str; 24] = [
    "rax", "rbx", "rcx", "rdx", //
    "rsi", "rdi", "rbp", "rsp", //
    "r8", "r9", "r10", "r11", "r12", "r13", "r14", "r15", //
    "rip", "eflags", //
    "cs", "ss", "ds", "es", "fs", "gs",
];

/// Sentinel for a register the backend did not report.
pub const REGISTER_NA: &str = "N/A";

/// The bijective name↔index mapping reported by the backend, populated once
/// per connection and read-only afterwards.
///
/// Indices are dense non-negative integers; empty names (gdb pads its list
/// with them) are kept out of both directions.
#[derive(Debug, Default)]
pub struct RegisterMap {
    by_number: VecMap<String>,
    by_name: HashMap<String, usize>,
}

impl RegisterMap {
    pub(crate) fn from_names<I>(names: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        let mut by_number = VecMap::new();
        let mut by_name = HashMap::new();
        for (number, name) in names.into_iter().enumerate() {
            if name.is_empty() {
                continue;
            }
            by_name.insert(name.clone(), number);
            by_number.insert(number, name);
        }
        Self {
            by_number,
            by_name,
        }
    }

    /// The backend's index for a register name.
    pub fn number_of(&self, name: &str) -> Option<usize> {
        self.by_name.get(name).copied()
    }

    /// The register name behind a backend index.
    pub fn name_of(&self, number: usize) -> Option<&str> {
        self.by_number.get(number).map(String::as_str)
    }

    /// Number of named registers.
    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    /// True when no register names were reported.
    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

/// One coherent register read: every canonical name is present, mapped to
/// the backend-reported hex string or to [`REGISTER_NA`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RegisterSnapshot(HashMap<String, String>);

impl Default for RegisterSnapshot {
    fn default() -> Self {
        Self::not_available()
    }
}

impl RegisterSnapshot {
    /// The snapshot shown before the first successful read: all canonical
    /// registers mapped to [`REGISTER_NA`].
    #[must_use]
    pub fn not_available() -> Self {
        Self(
            CANONICAL_REGISTERS
                .iter()
                .map(|name| ((*name).to_string(), REGISTER_NA.to_string()))
                .collect(),
        )
    }

    // Builds the canonical snapshot from a by-index value map. A canonical
    // name that is missing from the register map, or whose index the
    // backend left out of the response, reads as "N/A".
    pub(crate) fn from_values(map: &RegisterMap, by_number: &HashMap<usize, String>) -> Self {
        Self(
            CANONICAL_REGISTERS
                .iter()
                .map(|name| {
                    let value = map
                        .number_of(name)
                        .and_then(|number| by_number.get(&number))
                        .cloned()
                        .unwrap_or_else(|| REGISTER_NA.to_string());
                    ((*name).to_string(), value)
                })
                .collect(),
        )
    }

    /// The value for a register name, or [`REGISTER_NA`].
    pub fn value(&self, name: &str) -> &str {
        self.0.get(name).map_or(REGISTER_NA, String::as_str)
    }

    /// True when the named register holds a real backend-reported value.
    pub fn has_value(&self, name: &str) -> bool {
        self.value(name) != REGISTER_NA
    }
}

#[cfg(test)]
mod tests {
    use super::{RegisterMap, RegisterSnapshot, CANONICAL_REGISTERS, REGISTER_NA};
    use std::collections::HashMap;

    fn map() -> RegisterMap {
        RegisterMap::from_names(
            ["rax", "rbx", "", "rip"]
                .iter()
                .map(|s| (*s).to_string()),
        )
    }

    #[test]
    fn empty_names_are_excluded_but_keep_their_index() {
        let map = map();
        assert_eq!(map.len(), 3);
        assert_eq!(map.number_of("rax"), Some(0));
        assert_eq!(map.number_of("rip"), Some(3));
        assert_eq!(map.name_of(2), None);
        assert_eq!(map.name_of(3), Some("rip"));
    }

    #[test]
    fn snapshot_is_never_partial() {
        let mut values = HashMap::new();
        values.insert(0, "0x1".to_string());
        values.insert(3, "0xffffffff81000000".to_string());
        let snap = RegisterSnapshot::from_values(&map(), &values);
        assert_eq!(snap.value("rax"), "0x1");
        assert_eq!(snap.value("rip"), "0xffffffff81000000");
        // rbx is in the map but absent from the response
        assert_eq!(snap.value("rbx"), REGISTER_NA);
        // r15 is not even in the map
        assert_eq!(snap.value("r15"), REGISTER_NA);
        for name in CANONICAL_REGISTERS {
            assert!(!snap.value(name).is_empty());
        }
    }

    #[test]
    fn default_snapshot_is_all_na() {
        let snap = RegisterSnapshot::default();
        for name in CANONICAL_REGISTERS {
            assert_eq!(snap.value(name), REGISTER_NA);
            assert!(!snap.has_value(name));
        }
    }
}
