//! Known-alarm registry.
//!
//! # Invariants
//!
//! - **Ordered**: ids are kept in discovery order, oldest first.
//! - **No duplicates**: [`AlarmRegistry::add`] refuses an id that is already present.
//! - **Benign removal**: removing an unknown id is a no-op, never an error.

/// Ordered set of alarm ids the scheduler currently believes are active.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AlarmRegistry {
    known_ids: Vec<String>,
}

impl AlarmRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.known_ids.iter().any(|k| k == id)
    }

    /// Append `id`. Returns `false` (and changes nothing) if it is already known.
    pub fn add(&mut self, id: impl Into<String>) -> bool {
        let id = id.into();
        if self.contains(&id) {
            return false;
        }
        self.known_ids.push(id);
        true
    }

    /// Remove the first occurrence of `id`. Returns `false` if it was not known.
    pub fn remove(&mut self, id: &str) -> bool {
        match self.known_ids.iter().position(|k| k == id) {
            Some(pos) => {
                self.known_ids.remove(pos);
                true
            }
            None => false,
        }
    }

    pub fn ids(&self) -> &[String] {
        &self.known_ids
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.known_ids.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.known_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.known_ids.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for AlarmRegistry {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut registry = AlarmRegistry::new();
        for id in iter {
            registry.add(id);
        }
        registry
    }
}
