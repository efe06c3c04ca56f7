//! Identity reconciliation between local and remote ids
//!
//! Every record in the client cache has a local id, generated on the client
//! before the server has seen the record. Once persisted, the server's id is
//! recorded under the `remoteId` key. [`IdentityReconciler`] owns the key map
//! that binds the two and hands out stable local ids for remote ones.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::IdentityError;
use crate::key_map::KeyMap;
use crate::schema::RecordType;

/// Key name under which server-assigned ids are stored
pub const REMOTE_ID: &str = "remoteId";

/// Client-generated record id
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocalId(String);

impl LocalId {
    pub fn new(id: impl Into<String>) -> Self {
        LocalId(id.into())
    }

    /// Generate a new random LocalId
    pub fn generate() -> Self {
        LocalId(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LocalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for LocalId {
    fn from(id: &str) -> Self {
        LocalId::new(id)
    }
}

impl From<String> for LocalId {
    fn from(id: String) -> Self {
        LocalId(id)
    }
}

/// Named external keys of a record (e.g. `remoteId`)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordKeys(BTreeMap<String, String>);

impl RecordKeys {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_remote_id(remote_id: impl Into<String>) -> Self {
        let mut keys = Self::new();
        keys.insert(REMOTE_ID, remote_id);
        keys
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn remote_id(&self) -> Option<&str> {
        self.get(REMOTE_ID).filter(|v| !v.is_empty())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// (type, local id, optional keys): names one record in the client cache
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordIdentity {
    #[serde(rename = "type")]
    pub record_type: RecordType,
    pub id: LocalId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keys: Option<RecordKeys>,
}

impl RecordIdentity {
    pub fn new(record_type: RecordType, id: LocalId) -> Self {
        Self {
            record_type,
            id,
            keys: None,
        }
    }

    pub fn with_keys(mut self, keys: RecordKeys) -> Self {
        self.keys = Some(keys);
        self
    }

    /// Remote id carried in the identity's own keys (no key map lookup)
    pub fn remote_id(&self) -> Option<&str> {
        self.keys.as_ref().and_then(RecordKeys::remote_id)
    }
}

impl fmt::Display for RecordIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.record_type, self.id)
    }
}

/// Partial identity passed to [`IdentityReconciler::identity_from_keys`]
#[derive(Debug, Clone, Default)]
pub struct IdentitySeed {
    pub id: Option<LocalId>,
    pub keys: Option<RecordKeys>,
}

impl IdentitySeed {
    pub fn from_id(id: impl Into<LocalId>) -> Self {
        Self {
            id: Some(id.into()),
            keys: None,
        }
    }

    pub fn from_keys(keys: RecordKeys) -> Self {
        Self {
            id: None,
            keys: Some(keys),
        }
    }
}

/// Produces a fresh local id for a record of the given type
pub type IdGenerator = Box<dyn Fn(RecordType) -> LocalId + Send + Sync>;

/// Owns the key map and reconciles local and remote identities.
///
/// Share one instance (behind an `Arc`) between every consumer of a cache.
/// The id generator runs while the key map is locked and must not call back
/// into the reconciler.
pub struct IdentityReconciler {
    key_map: Mutex<KeyMap>,
    generate_id: IdGenerator,
}

impl fmt::Debug for IdentityReconciler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityReconciler")
            .field("bindings", &self.len())
            .finish()
    }
}

impl Default for IdentityReconciler {
    fn default() -> Self {
        Self::new()
    }
}

impl IdentityReconciler {
    /// Reconciler that generates UUID v4 local ids
    pub fn new() -> Self {
        Self::with_id_generator(Box::new(|_| LocalId::generate()))
    }

    pub fn with_id_generator(generate_id: IdGenerator) -> Self {
        Self {
            key_map: Mutex::new(KeyMap::new()),
            generate_id,
        }
    }

    fn key_map(&self) -> MutexGuard<'_, KeyMap> {
        self.key_map.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Local id bound to `remote_id`, generating and registering one on miss.
    ///
    /// The returned id is always bound. A generated id that is already bound
    /// to another remote id is replaced by a UUID v4 id.
    pub fn resolve_local_id(&self, record_type: RecordType, remote_id: &str) -> LocalId {
        let mut map = self.key_map();
        if let Some(id) = map.id_from_key(record_type, REMOTE_ID, remote_id) {
            return id.clone();
        }

        let mut id = (self.generate_id)(record_type);
        while let Err(err) = map.bind(record_type, REMOTE_ID, remote_id, &id) {
            warn!(
                event = "identity.generated_id_taken",
                record_type = %record_type,
                remote_id = %remote_id,
                local_id = %id,
                error = %err,
            );
            id = LocalId::generate();
        }
        debug!(
            event = "identity.registered",
            record_type = %record_type,
            remote_id = %remote_id,
            local_id = %id,
        );
        id
    }

    /// Remote id of a record, or its local id when none is known.
    ///
    /// Records that only exist locally have no remote id yet; returning the
    /// local id keeps callers working but can hide a record that should have
    /// been synced, so the fallback is logged.
    pub fn remote_id_of(&self, identity: &RecordIdentity) -> String {
        if let Some(keys) = &identity.keys {
            return keys
                .remote_id()
                .unwrap_or(identity.id.as_str())
                .to_string();
        }

        self.bound_remote_id(identity).unwrap_or_else(|| {
            debug!(
                event = "identity.unsynced",
                record_type = %identity.record_type,
                local_id = %identity.id,
            );
            identity.id.to_string()
        })
    }

    /// Remote id from the identity's keys or the key map, without fallback
    pub fn bound_remote_id(&self, identity: &RecordIdentity) -> Option<String> {
        if let Some(remote_id) = identity.remote_id() {
            return Some(remote_id.to_string());
        }
        self.key_map()
            .id_to_key(identity.record_type, REMOTE_ID, &identity.id)
            .cloned()
    }

    /// Local id of a record.
    ///
    /// An identity without keys may still carry a remote id in its `id`
    /// slot; it is looked up as such before falling back to the id as given.
    pub fn local_id_of(&self, identity: &RecordIdentity) -> LocalId {
        if identity.keys.is_some() {
            return identity.id.clone();
        }
        self.key_map()
            .id_from_key(identity.record_type, REMOTE_ID, identity.id.as_str())
            .cloned()
            .unwrap_or_else(|| identity.id.clone())
    }

    /// Full identity for a remote id. Registers the binding as a side effect.
    pub fn build_identity(&self, remote_id: &str, record_type: RecordType) -> RecordIdentity {
        let id = self.resolve_local_id(record_type, remote_id);
        RecordIdentity::new(record_type, id).with_keys(RecordKeys::with_remote_id(remote_id))
    }

    /// Complete a partial identity and register it.
    ///
    /// Missing keys are filled from the key map by local id; a missing local
    /// id is looked up by key and generated when no key is bound.
    pub fn identity_from_keys(
        &self,
        record_type: RecordType,
        seed: IdentitySeed,
    ) -> Result<RecordIdentity, IdentityError> {
        let mut map = self.key_map();

        let keys = match seed.keys {
            Some(keys) => Some(keys),
            None => seed
                .id
                .as_ref()
                .and_then(|id| map.id_to_key(record_type, REMOTE_ID, id))
                .map(|remote_id| RecordKeys::with_remote_id(remote_id.as_str())),
        };

        let id = match seed.id {
            Some(id) => id,
            None => keys
                .as_ref()
                .and_then(|keys| {
                    keys.iter()
                        .find_map(|(name, value)| map.id_from_key(record_type, name, value))
                        .cloned()
                })
                .unwrap_or_else(|| (self.generate_id)(record_type)),
        };

        let identity = RecordIdentity {
            record_type,
            id,
            keys,
        };
        let added = map.push_record(&identity)?;
        if added > 0 {
            debug!(event = "identity.registered", identity = %identity, keys = added);
        }
        Ok(identity)
    }

    /// Identity for a record that has not been persisted: fresh local id, no keys
    pub fn new_identity(&self, record_type: RecordType) -> RecordIdentity {
        RecordIdentity::new(record_type, (self.generate_id)(record_type))
    }

    /// Bind a server-assigned id to an existing local identity.
    pub fn register_remote_id(
        &self,
        identity: &RecordIdentity,
        remote_id: &str,
    ) -> Result<RecordIdentity, IdentityError> {
        let mut keys = identity.keys.clone().unwrap_or_default();
        keys.insert(REMOTE_ID, remote_id);
        let registered = RecordIdentity {
            record_type: identity.record_type,
            id: identity.id.clone(),
            keys: Some(keys),
        };
        self.key_map().push_record(&registered)?;
        debug!(
            event = "identity.remote_assigned",
            identity = %registered,
            remote_id = %remote_id,
        );
        Ok(registered)
    }

    /// Number of `remoteId` bindings held for `record_type`
    pub fn bindings_for(&self, record_type: RecordType) -> usize {
        self.key_map().bindings_for(record_type)
    }

    /// Total number of key bindings
    pub fn len(&self) -> usize {
        self.key_map().len()
    }

    pub fn is_empty(&self) -> bool {
        self.key_map().is_empty()
    }
}
