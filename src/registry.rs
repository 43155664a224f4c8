//! Per data-id message handlers.
//!
//! Each data-id can have up to three roles:
//! - **read**: the scheduler asks the boiler for this id with a `READ_DATA` request
//! - **write**: a [`WriteSource`] supplies the value sent with a `WRITE_DATA` request
//! - **response**: a [`ResponseSink`] receives the value of every response for this id
//!
//! Handlers are borrowed, not owned, so the registry can point at sensors and
//! inputs living elsewhere in the firmware. Closures implement both traits.
//!
//! ```rust
//! use core::cell::Cell;
//! use opentherm::message::{MessageId, Value};
//! use opentherm::registry::Registry;
//! use opentherm::frame::Frame;
//!
//! let setpoint = || Value::F88(55.0);
//! let feed_temp = Cell::new(0.0);
//! let mut on_feed_temp = |_: &Frame, value: Value| {
//!     if let Value::F88(t) = value {
//!         feed_temp.set(t);
//!     }
//! };
//!
//! let mut registry = Registry::new();
//! registry.register_write(MessageId::ChSetpoint, &setpoint).unwrap();
//! registry.register_read(MessageId::FeedTemp).unwrap();
//! registry.register_response(MessageId::FeedTemp, &mut on_feed_temp).unwrap();
//! assert!(registry.is_read(MessageId::FeedTemp.into()));
//! ```

use core::fmt;

use heapless::FnvIndexMap;

use crate::consts::MAX_MESSAGES;
use crate::error::RegistryError;
use crate::frame::Frame;
use crate::message::{MessageId, Value, ValueKind};

/// Supplies the value of a `WRITE_DATA` request.
pub trait WriteSource {
    /// The value to send.
    fn value(&self) -> Value;
}

impl<F: Fn() -> Value> WriteSource for F {
    fn value(&self) -> Value {
        self()
    }
}

/// Receives the value of a response.
pub trait ResponseSink {
    /// Called with every response frame for the registered data-id and its
    /// data decoded with the id's [`ValueKind`].
    fn publish(&mut self, frame: &Frame, value: Value);
}

impl<F: FnMut(&Frame, Value)> ResponseSink for F {
    fn publish(&mut self, frame: &Frame, value: Value) {
        self(frame, value)
    }
}

#[derive(Default)]
struct Slot<'a> {
    read: bool,
    write: Option<&'a dyn WriteSource>,
    response: Option<&'a mut dyn ResponseSink>,
}

/// Runtime table of message handlers, keyed by data-id.
pub struct Registry<'a> {
    slots: FnvIndexMap<u8, Slot<'a>, MAX_MESSAGES>,
}

impl<'a> Registry<'a> {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            slots: FnvIndexMap::new(),
        }
    }

    /// Marks `id` as read from the boiler.
    pub fn register_read(&mut self, id: MessageId) -> Result<(), RegistryError> {
        let slot = self.slot_mut(id)?;
        if slot.read {
            return Err(RegistryError::Occupied(id.into()));
        }
        slot.read = true;
        Ok(())
    }

    /// Makes `source` supply the value written to `id`.
    pub fn register_write(
        &mut self,
        id: MessageId,
        source: &'a dyn WriteSource,
    ) -> Result<(), RegistryError> {
        let slot = self.slot_mut(id)?;
        if slot.write.is_some() {
            return Err(RegistryError::Occupied(id.into()));
        }
        slot.write = Some(source);
        Ok(())
    }

    /// Makes `sink` receive every response for `id`.
    pub fn register_response(
        &mut self,
        id: MessageId,
        sink: &'a mut dyn ResponseSink,
    ) -> Result<(), RegistryError> {
        let slot = self.slot_mut(id)?;
        if slot.response.is_some() {
            return Err(RegistryError::Occupied(id.into()));
        }
        slot.response = Some(sink);
        Ok(())
    }

    /// Whether `id` has the read role.
    pub fn is_read(&self, id: u8) -> bool {
        self.slots.get(&id).is_some_and(|slot| slot.read)
    }

    /// The write source of `id`, if any.
    pub fn write_source(&self, id: u8) -> Option<&'a dyn WriteSource> {
        self.slots.get(&id).and_then(|slot| slot.write)
    }

    /// Hands a response to the sink registered for its data-id.
    ///
    /// Ids missing from the catalog are decoded as [`ValueKind::U16`].
    /// Returns whether a sink took the frame.
    pub fn publish(&mut self, frame: &Frame) -> bool {
        let Some(sink) = self
            .slots
            .get_mut(&frame.id)
            .and_then(|slot| slot.response.as_deref_mut())
        else {
            return false;
        };
        let kind = frame
            .message_id()
            .map_or(ValueKind::U16, MessageId::value_kind);
        sink.publish(frame, Value::decode(frame, kind));
        true
    }

    /// Number of data-ids with at least one role.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether no handler is registered.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    fn slot_mut(&mut self, id: MessageId) -> Result<&mut Slot<'a>, RegistryError> {
        let key = u8::from(id);
        if !self.slots.contains_key(&key) {
            let _ = self
                .slots
                .insert(key, Slot::default())
                .map_err(|_| RegistryError::Full)?;
        }
        self.slots.get_mut(&key).ok_or(RegistryError::Full)
    }
}

impl Default for Registry<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Registry<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (id, slot) in self.slots.iter() {
            let _ = map.entry(
                id,
                &(slot.read, slot.write.is_some(), slot.response.is_some()),
            );
        }
        map.finish()
    }
}

#[cfg(all(test, feature = "std"))]
mod tests {
    use super::*;
    use crate::frame::MessageType;

    #[test]
    fn test_roles_are_independent() {
        let source = || Value::F88(40.0);
        let mut sink = |_: &Frame, _: Value| {};
        let mut registry = Registry::new();

        registry.register_read(MessageId::ChSetpoint).unwrap();
        registry.register_write(MessageId::ChSetpoint, &source).unwrap();
        registry
            .register_response(MessageId::ChSetpoint, &mut sink)
            .unwrap();

        assert_eq!(registry.len(), 1);
        assert!(registry.is_read(MessageId::ChSetpoint.into()));
        assert_eq!(
            registry
                .write_source(MessageId::ChSetpoint.into())
                .map(|s| s.value()),
            Some(Value::F88(40.0))
        );
        assert!(!registry.is_read(MessageId::Status.into()));
    }

    #[test]
    fn test_occupied_role_is_rejected() {
        let a = || Value::U16(1);
        let b = || Value::U16(2);
        let mut registry = Registry::new();

        registry.register_write(MessageId::DhwSetpoint, &a).unwrap();
        assert_eq!(
            registry.register_write(MessageId::DhwSetpoint, &b),
            Err(RegistryError::Occupied(56))
        );
        registry.register_read(MessageId::FeedTemp).unwrap();
        assert_eq!(
            registry.register_read(MessageId::FeedTemp),
            Err(RegistryError::Occupied(25))
        );
    }

    #[test]
    fn test_publish_decodes_with_catalog_kind() {
        let mut seen = Vec::new();
        let mut sink = |frame: &Frame, value: Value| seen.push((frame.id, value));
        let mut registry = Registry::new();
        registry
            .register_response(MessageId::BurnerStarts, &mut sink)
            .unwrap();

        let mut frame = Frame::new(MessageType::ReadAck, MessageId::BurnerStarts);
        frame.set_u16(1234);
        assert!(registry.publish(&frame));
        assert!(!registry.publish(&Frame::new(MessageType::ReadAck, MessageId::Status)));
        drop(registry);

        assert_eq!(seen, vec![(116, Value::U16(1234))]);
    }

    #[test]
    fn test_debug_lists_roles() {
        let mut registry = Registry::new();
        registry.register_read(MessageId::Status).unwrap();
        assert_eq!(format!("{registry:?}"), "{0: (true, false, false)}");
    }
}
