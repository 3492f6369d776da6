use std::sync::Arc;

use dashmap::DashMap;

use crate::codec::StructuralCodec;
use crate::described::Described;
use crate::error::Result;
use crate::ids::Identity;

/// Parsed schemas, keyed by the identity of the type they belong to.
///
/// Safe to share between threads. Entries are never evicted.
pub struct SchemaCache<C: StructuralCodec> {
    schemas: DashMap<Identity, Arc<C::Schema>>,
}

impl<C: StructuralCodec> Default for SchemaCache<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: StructuralCodec> SchemaCache<C> {
    pub fn new() -> Self {
        Self {
            schemas: DashMap::new(),
        }
    }

    /// Get the parsed schema for `T`, parsing its schema text on first use.
    ///
    /// Two threads missing at once may both parse; the first insert is kept.
    pub fn get_or_parse<T: Described>(&self, codec: &C) -> Result<Arc<C::Schema>> {
        let identity = T::identity();
        if let Some(schema) = self.schemas.get(&identity) {
            return Ok(Arc::clone(schema.value()));
        }
        tracing::debug!(%identity, "schema cache miss");
        let parsed = Arc::new(codec.parse(T::SCHEMA_TEXT)?);
        Ok(Arc::clone(self.schemas.entry(identity).or_insert(parsed).value()))
    }

    pub fn get(&self, identity: Identity) -> Option<Arc<C::Schema>> {
        self.schemas.get(&identity).map(|s| Arc::clone(s.value()))
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }

    pub fn clear(&self) {
        self.schemas.clear()
    }
}
