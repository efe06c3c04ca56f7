//! Bidirectional key map
//!
//! Indexes `(type, key name, key value) -> local id` and the reverse
//! `(type, key name, local id) -> key value`. Entries are only ever added.

use std::collections::HashMap;

use crate::error::IdentityError;
use crate::identity::{LocalId, RecordIdentity};
use crate::schema::RecordType;

type KeySlot = (RecordType, String, String);

#[derive(Debug, Clone, Default)]
pub struct KeyMap {
    key_to_id: HashMap<KeySlot, LocalId>,
    id_to_key: HashMap<KeySlot, String>,
}

impl KeyMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Local id bound to `key_name = value`, if any.
    pub fn id_from_key(
        &self,
        record_type: RecordType,
        key_name: &str,
        value: &str,
    ) -> Option<&LocalId> {
        self.key_to_id
            .get(&(record_type, key_name.to_string(), value.to_string()))
    }

    /// Value of `key_name` bound to a local id, if any.
    pub fn id_to_key(
        &self,
        record_type: RecordType,
        key_name: &str,
        id: &LocalId,
    ) -> Option<&String> {
        self.id_to_key
            .get(&(record_type, key_name.to_string(), id.as_str().to_string()))
    }

    /// Bind one key value to a local id.
    ///
    /// Returns `true` if a new binding was written, `false` if the identical
    /// binding already existed.
    pub fn bind(
        &mut self,
        record_type: RecordType,
        key_name: &str,
        value: &str,
        id: &LocalId,
    ) -> Result<bool, IdentityError> {
        self.check(record_type, key_name, value, id)?;
        Ok(self.insert(record_type, key_name, value, id))
    }

    /// Register every key carried by `identity`.
    ///
    /// All keys are checked before any is written, so a conflict leaves the
    /// map untouched. Returns the number of new bindings.
    pub fn push_record(&mut self, identity: &RecordIdentity) -> Result<usize, IdentityError> {
        let Some(keys) = &identity.keys else {
            return Ok(0);
        };
        let bindable: Vec<(&str, &str)> = keys
            .iter()
            .filter(|(_, value)| !value.is_empty())
            .collect();

        for (name, value) in &bindable {
            self.check(identity.record_type, name, value, &identity.id)?;
        }
        let mut added = 0;
        for (name, value) in bindable {
            if self.insert(identity.record_type, name, value, &identity.id) {
                added += 1;
            }
        }
        Ok(added)
    }

    /// Number of key values bound for `record_type`
    pub fn bindings_for(&self, record_type: RecordType) -> usize {
        self.key_to_id
            .keys()
            .filter(|(t, _, _)| *t == record_type)
            .count()
    }

    pub fn len(&self) -> usize {
        self.key_to_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.key_to_id.is_empty()
    }

    fn check(
        &self,
        record_type: RecordType,
        key_name: &str,
        value: &str,
        id: &LocalId,
    ) -> Result<(), IdentityError> {
        if let Some(existing) = self.id_from_key(record_type, key_name, value) {
            if existing != id {
                return Err(IdentityError::KeyConflict {
                    record_type: record_type.to_string(),
                    key: key_name.to_string(),
                    value: value.to_string(),
                    existing: existing.to_string(),
                });
            }
        }
        if let Some(existing) = self.id_to_key(record_type, key_name, id) {
            if existing != value {
                return Err(IdentityError::KeyConflict {
                    record_type: record_type.to_string(),
                    key: key_name.to_string(),
                    value: value.to_string(),
                    existing: existing.clone(),
                });
            }
        }
        Ok(())
    }

    fn insert(
        &mut self,
        record_type: RecordType,
        key_name: &str,
        value: &str,
        id: &LocalId,
    ) -> bool {
        let forward = (record_type, key_name.to_string(), value.to_string());
        if self.key_to_id.contains_key(&forward) {
            return false;
        }
        self.key_to_id.insert(forward, id.clone());
        self.id_to_key.insert(
            (record_type, key_name.to_string(), id.as_str().to_string()),
            value.to_string(),
        );
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::{RecordKeys, REMOTE_ID};

    fn identity(id: &str, remote: &str) -> RecordIdentity {
        RecordIdentity::new(RecordType::Project, LocalId::new(id))
            .with_keys(RecordKeys::with_remote_id(remote))
    }

    #[test]
    fn push_registers_both_directions() {
        let mut map = KeyMap::new();
        assert_eq!(map.push_record(&identity("local-1", "42")).unwrap(), 1);

        assert_eq!(
            map.id_from_key(RecordType::Project, REMOTE_ID, "42"),
            Some(&LocalId::new("local-1"))
        );
        assert_eq!(
            map.id_to_key(RecordType::Project, REMOTE_ID, &LocalId::new("local-1")),
            Some(&"42".to_string())
        );
    }

    #[test]
    fn repeated_push_is_a_noop() {
        let mut map = KeyMap::new();
        map.push_record(&identity("local-1", "42")).unwrap();
        assert_eq!(map.push_record(&identity("local-1", "42")).unwrap(), 0);
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn types_are_separate_namespaces() {
        let mut map = KeyMap::new();
        map.push_record(&identity("local-1", "7")).unwrap();
        assert!(map.id_from_key(RecordType::User, REMOTE_ID, "7").is_none());
        assert_eq!(map.bindings_for(RecordType::Project), 1);
        assert_eq!(map.bindings_for(RecordType::User), 0);
    }

    #[test]
    fn rebinding_remote_id_conflicts() {
        let mut map = KeyMap::new();
        map.push_record(&identity("local-1", "42")).unwrap();
        let err = map.push_record(&identity("local-2", "42")).unwrap_err();
        assert!(matches!(err, IdentityError::KeyConflict { .. }));
        assert!(map
            .id_to_key(RecordType::Project, REMOTE_ID, &LocalId::new("local-2"))
            .is_none());
    }

    #[test]
    fn second_value_for_same_local_id_conflicts() {
        let mut map = KeyMap::new();
        map.push_record(&identity("local-1", "42")).unwrap();
        let err = map.push_record(&identity("local-1", "43")).unwrap_err();
        assert!(matches!(err, IdentityError::KeyConflict { .. }));
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn identity_without_keys_binds_nothing() {
        let mut map = KeyMap::new();
        let bare = RecordIdentity::new(RecordType::Task, LocalId::new("local-9"));
        assert_eq!(map.push_record(&bare).unwrap(), 0);
        assert!(map.is_empty());
    }

    #[test]
    fn empty_key_values_are_skipped() {
        let mut map = KeyMap::new();
        assert_eq!(map.push_record(&identity("local-1", "")).unwrap(), 0);
        assert!(map.is_empty());
    }
}
