//! Reference tracking (xlang spec: reference flags).
//!
//! A value whose declared ref mode is `NullOnly` carries one flag byte out
//! of {Null, NotNullValue}; `NullAndRef` values may additionally carry
//! {RefValue, Ref}, where `Ref` is followed by a varuint ref-id naming a
//! prior value of the same message. Ref-ids are assigned in the order of
//! first `RefValue` emission, 0-based.
//!
//! Der Writer verfolgt Objektidentität über die Allokationsadresse des
//! `Rc`; der Reader hält pro Nachricht eine Slot-Liste der bereits
//! gelesenen Werte. Beide Tabellen sind per-Message und werden von `reset`
//! geleert.

use std::any::Any;
use std::rc::Rc;

use crate::error::{Error, Result};
use crate::FastHashMap;

/// Wire value: the value is null.
pub const NULL_FLAG: i8 = -3;
/// Wire value: a back-reference; a varuint ref-id follows.
pub const REF_FLAG: i8 = -2;
/// Wire value: a non-null value that is not identity-tracked.
pub const NOT_NULL_VALUE_FLAG: i8 = -1;
/// Wire value: a non-null value that is identity-tracked (registers the
/// next ref-id).
pub const REF_VALUE_FLAG: i8 = 0;

/// Declared per-field / per-type reference policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RefMode {
    /// No flag byte at all (primitives).
    #[default]
    None,
    /// One flag byte out of {Null, NotNullValue}.
    NullOnly,
    /// Full identity tracking; all four flags are legal.
    NullAndRef,
}

/// Write-side identity tracker: allocation address → assigned ref-id.
#[derive(Default)]
pub struct RefWriter {
    ids: FastHashMap<usize, u32>,
    /// Hält die Allokationen am Leben, damit Adressen innerhalb einer
    /// Nachricht nicht wiederverwendet werden können.
    pinned: Vec<Rc<dyn Any>>,
}

impl RefWriter {
    /// Creates an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Clears all tracked identities (message boundary).
    pub fn reset(&mut self) {
        self.ids.clear();
        self.pinned.clear();
    }

    /// Looks up or assigns the ref-id for `value`'s allocation. Returns
    /// `Ok(id)` when the value was already written (emit `Ref` + id) or
    /// `Err(())`-like `None` when it is new (emit `RefValue` and the body).
    pub fn track<T: Any>(&mut self, value: &Rc<T>) -> Option<u32> {
        let key = Rc::as_ptr(value) as usize;
        if let Some(&id) = self.ids.get(&key) {
            return Some(id);
        }
        let id = self.ids.len() as u32;
        self.ids.insert(key, id);
        self.pinned.push(value.clone());
        None
    }
}

/// Read-side slot table: ref-id → reconstructed value.
#[derive(Default)]
pub struct RefReader {
    slots: Vec<Option<Rc<dyn Any>>>,
}

impl RefReader {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Clears all slots (message boundary).
    pub fn reset(&mut self) {
        self.slots.clear();
    }

    /// Reserves the next ref-id before its body is read. The slot is
    /// filled via [`fill`](Self::fill) once the value exists.
    pub fn reserve(&mut self) -> u32 {
        self.slots.push(None);
        self.slots.len() as u32 - 1
    }

    /// Stores the reconstructed value in a reserved slot.
    pub fn fill(&mut self, id: u32, value: Rc<dyn Any>) {
        self.slots[id as usize] = Some(value);
    }

    /// Resolves a back-reference to a previously read value.
    pub fn get<T: Any>(&self, id: u32) -> Result<Rc<T>> {
        let slot = self
            .slots
            .get(id as usize)
            .ok_or_else(|| Error::invalid_ref(format!("ref id {id} out of range")))?;
        let value = slot
            .as_ref()
            .ok_or_else(|| Error::invalid_ref(format!("ref id {id} not yet materialized")))?;
        value
            .clone()
            .downcast::<T>()
            .map_err(|_| Error::invalid_ref(format!("ref id {id} resolves to a different type")))
    }
}
