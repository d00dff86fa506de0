//! Ordered overload sets.

use std::slice;

use bindery_core::{FunctionEntry, RegistrationError, TypeHash};

/// Every candidate bound to one name, in registration order.
///
/// Append-only during registration and read-only once the registry is
/// sealed. Candidate order is significant: ties in overload ranking go to the
/// earliest candidate.
#[derive(Debug, Clone, Default)]
pub struct OverloadSet {
    name: String,
    candidates: Vec<FunctionEntry>,
}

impl OverloadSet {
    /// Create an empty set.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            candidates: Vec::new(),
        }
    }

    /// The bound name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Append a candidate.
    ///
    /// Fails when a candidate with the same signature hash is already bound.
    pub fn push(&mut self, entry: FunctionEntry) -> Result<(), RegistrationError> {
        let hash = entry.hash();
        if self.contains(hash) {
            return Err(RegistrationError::DuplicateRegistration {
                name: entry.signature(),
                kind: "overload".to_string(),
            });
        }
        self.candidates.push(entry);
        Ok(())
    }

    /// Check if a candidate with this signature hash exists.
    pub fn contains(&self, hash: TypeHash) -> bool {
        self.candidates.iter().any(|c| c.hash() == hash)
    }

    /// Candidates in registration order.
    pub fn iter(&self) -> slice::Iter<'_, FunctionEntry> {
        self.candidates.iter()
    }

    /// Candidate by position.
    pub fn get(&self, index: usize) -> Option<&FunctionEntry> {
        self.candidates.get(index)
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    /// Rendered signatures, for diagnostics.
    pub fn signatures(&self) -> Vec<String> {
        self.candidates.iter().map(FunctionEntry::signature).collect()
    }

    /// Check if any candidate may be overridden dynamically.
    pub fn is_virtual(&self) -> bool {
        self.candidates.iter().any(FunctionEntry::is_virtual)
    }
}

impl<'a> IntoIterator for &'a OverloadSet {
    type Item = &'a FunctionEntry;
    type IntoIter = slice::Iter<'a, FunctionEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
