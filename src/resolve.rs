//! Decoding a message whose type is one of several candidates.
//!
//! Candidates are scanned in order, and the first whose identity matches the envelope header
//! receives the decoded value. Duplicate identities are not rejected; the earlier candidate
//! simply wins.

use std::any::Any;

use crate::codec::{MsgPack, StructuralCodec};
use crate::described::Described;
use crate::error::{Error, Result};
use crate::header::{Header, HEADER_LEN};
use crate::ids::Identity;
use crate::protocol::Marshaller;

/// A type-erased destination for a described value.
///
/// Every `Described + Default` type is a `Schemer`. After resolution, get the concrete value back
/// with [`downcast`](#method.downcast) or [`downcast_ref`](#method.downcast_ref).
pub trait Schemer<C = MsgPack>: Any + Send {
    fn schema_identity(&self) -> Identity;

    fn schema_text(&self) -> &'static str;

    /// Unmarshal into this value, enforcing its identity.
    fn unmarshal_from(&mut self, marshaller: &Marshaller<C>, data: &[u8]) -> Result<()>;

    fn into_any(self: Box<Self>) -> Box<dyn Any>;

    fn as_any(&self) -> &dyn Any;
}

impl<C, T> Schemer<C> for T
where
    C: StructuralCodec,
    T: Described + Default + Send + 'static,
{
    fn schema_identity(&self) -> Identity {
        <T as Described>::identity()
    }

    fn schema_text(&self) -> &'static str {
        T::SCHEMA_TEXT
    }

    fn unmarshal_from(&mut self, marshaller: &Marshaller<C>, data: &[u8]) -> Result<()> {
        marshaller.unmarshal(data, self, None)
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl<C: 'static> dyn Schemer<C> {
    /// Take the concrete value out, if it is a `T`.
    pub fn downcast<T: 'static>(self: Box<Self>) -> Option<T> {
        self.into_any().downcast::<T>().ok().map(|b| *b)
    }

    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }

    pub fn is<T: 'static>(&self) -> bool {
        self.as_any().is::<T>()
    }
}

impl<C: 'static> std::fmt::Debug for dyn Schemer<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("Schemer")
            .field("identity", &self.schema_identity())
            .finish()
    }
}

enum Slot<C> {
    /// A value provided up front.
    Value(Box<dyn Schemer<C>>),
    /// Allocated only if the candidate matches.
    Unset(fn() -> Box<dyn Schemer<C>>),
    /// Identity only, nothing to decode into.
    Detached,
}

fn make_default<C, T>() -> Box<dyn Schemer<C>>
where
    C: StructuralCodec + 'static,
    T: Described + Default + Send + 'static,
{
    Box::new(T::default())
}

/// One possible type for a message being resolved.
pub struct Candidate<C = MsgPack> {
    identity: Identity,
    slot: Slot<C>,
}

impl<C: StructuralCodec + 'static> Candidate<C> {
    /// Decode into this value if it matches.
    pub fn value<T>(value: T) -> Self
    where
        T: Described + Default + Send + 'static,
    {
        Self {
            identity: <T as Described>::identity(),
            slot: Slot::Value(Box::new(value)),
        }
    }

    /// Decode into a fresh `T::default()` if `T` matches.
    pub fn of<T>() -> Self
    where
        T: Described + Default + Send + 'static,
    {
        Self {
            identity: <T as Described>::identity(),
            slot: Slot::Unset(make_default::<C, T>),
        }
    }

    /// A candidate with an identity but no destination. Matching it is an error.
    pub fn detached(identity: Identity) -> Self {
        Self {
            identity,
            slot: Slot::Detached,
        }
    }

    pub fn identity(&self) -> Identity {
        self.identity
    }
}

impl<C> std::fmt::Debug for Candidate<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let slot = match self.slot {
            Slot::Value(_) => "value",
            Slot::Unset(_) => "unset",
            Slot::Detached => "detached",
        };
        f.debug_struct("Candidate")
            .field("identity", &self.identity)
            .field("slot", &slot)
            .finish()
    }
}

impl<C: StructuralCodec + 'static> Marshaller<C> {
    /// Decode a message into whichever candidate matches its header.
    ///
    /// Returns `None` for empty input. The header is decoded without checking it against any
    /// candidate first, so malformed headers fail before the scan.
    pub fn resolve<I>(&self, data: &[u8], candidates: I) -> Result<Option<Box<dyn Schemer<C>>>>
    where
        I: IntoIterator<Item = Candidate<C>>,
    {
        if data.is_empty() {
            return Ok(None);
        }
        if data.len() < HEADER_LEN {
            return Err(Error::NotAnEnvelope(data.len()));
        }
        let identity = Header::parse(&data[..HEADER_LEN])?.identity();

        let Some(found) = candidates.into_iter().find(|c| c.identity == identity) else {
            tracing::debug!(%identity, "no candidate matched");
            return Err(Error::SchemerNotFound(identity));
        };
        let mut schemer = match found.slot {
            Slot::Value(value) => value,
            Slot::Unset(make) => make(),
            Slot::Detached => return Err(Error::NoReferenceDestination(identity)),
        };
        tracing::debug!(%identity, "resolved candidate");
        schemer.unmarshal_from(self, data)?;
        Ok(Some(schemer))
    }
}

/// Decode a message into whichever candidate matches its header, using the default codec.
pub fn resolve<I>(data: &[u8], candidates: I) -> Result<Option<Box<dyn Schemer>>>
where
    I: IntoIterator<Item = Candidate>,
{
    Marshaller::new().resolve(data, candidates)
}

struct Entry<C> {
    identity: Identity,
    schema_text: &'static str,
    make: fn() -> Box<dyn Schemer<C>>,
}

/// A reusable set of candidate types.
pub struct Registry<C = MsgPack> {
    marshaller: Marshaller<C>,
    entries: Vec<Entry<C>>,
}

impl Default for Registry<MsgPack> {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry<MsgPack> {
    pub fn new() -> Self {
        Self::with_marshaller(Marshaller::new())
    }
}

impl<C: StructuralCodec + 'static> Registry<C> {
    pub fn with_marshaller(marshaller: Marshaller<C>) -> Self {
        Self {
            marshaller,
            entries: Vec::new(),
        }
    }

    /// Add a type. Registration order is resolution order.
    pub fn register<T>(&mut self) -> &mut Self
    where
        T: Described + Default + Send + 'static,
    {
        let identity = <T as Described>::identity();
        if self.contains(identity) {
            tracing::debug!(%identity, "identity registered twice, first one wins");
        }
        self.entries.push(Entry {
            identity,
            schema_text: T::SCHEMA_TEXT,
            make: make_default::<C, T>,
        });
        self
    }

    pub fn contains(&self, identity: Identity) -> bool {
        self.entries.iter().any(|e| e.identity == identity)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn identities(&self) -> impl Iterator<Item = Identity> + '_ {
        self.entries.iter().map(|e| e.identity)
    }

    /// Decode a message into a fresh value of whichever registered type matches.
    pub fn resolve(&self, data: &[u8]) -> Result<Option<Box<dyn Schemer<C>>>> {
        let candidates = self.entries.iter().map(|e| Candidate {
            identity: e.identity,
            slot: Slot::Unset(e.make),
        });
        self.marshaller.resolve(data, candidates)
    }

    /// All registered schema texts, as one JSON array.
    pub fn joined_schemas(&self) -> Result<String> {
        let schemas = self
            .entries
            .iter()
            .map(|e| {
                serde_json::from_str::<serde_json::Value>(e.schema_text)
                    .map_err(|err| Error::SchemaInvalid(Box::new(err)))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(serde_json::Value::Array(schemas).to_string())
    }
}
