use fnv::FnvHashMap;

/// Assigns a stable integer identity to each distinct (clean sequence,
/// modification description) pair seen during one run.
///
/// # Invariants
/// * IDs are 1-based, dense, and issued in first-seen order
/// * IDs are never reused or renumbered for the lifetime of the registry
#[derive(Default, Debug)]
pub struct UniqueSequenceRegistry {
    ids: FnvHashMap<String, u32>,
}

impl UniqueSequenceRegistry {
    fn key(clean_sequence: &str, mod_description: &str) -> String {
        // `_` never occurs in a clean sequence, so the key is unambiguous
        let mut key = String::with_capacity(clean_sequence.len() + mod_description.len() + 1);
        key.push_str(clean_sequence);
        key.push('_');
        key.push_str(mod_description);
        key
    }

    /// Return the ID for this combination, and whether it was already known.
    /// `mod_description` must be in canonical (position-sorted) form.
    pub fn get_or_assign_id(&mut self, clean_sequence: &str, mod_description: &str) -> (u32, bool) {
        let next = self.ids.len() as u32 + 1;
        let key = Self::key(clean_sequence, mod_description);
        match self.ids.get(&key) {
            Some(&id) => (id, true),
            None => {
                self.ids.insert(key, next);
                (next, false)
            }
        }
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }
}
