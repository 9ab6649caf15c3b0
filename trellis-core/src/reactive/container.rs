//! Observed Containers
//!
//! A [`Container`] is a plain map or list of [`Value`]s. Reading or writing
//! it directly is invisible to the reactive system. Wrapping it with
//! [`reactive`] (or one of its variants) yields an [`Observed`] handle whose
//! accessors call `track` on every read and `trigger` on every effective
//! write.
//!
//! # Wrapper identity
//!
//! Wrapping is idempotent: as long as a wrapper of a given flavour is alive,
//! wrapping the same container again returns that wrapper. The cache keeps
//! only weak references, so it never keeps a wrapper (or the container it
//! wraps) alive.
//!
//! # Synthetic keys
//!
//! - Enumerating a map's keys tracks [`DepKey::Iterate`], which is triggered
//!   when a key is added or deleted but not when an existing key is
//!   overwritten.
//! - Reading a list's length (or iterating it) tracks [`DepKey::Length`],
//!   which is triggered when elements are appended past the end and when the
//!   length is set. Setting the length also triggers every index at or past
//!   the new length.
//!
//! # Bulk list operations
//!
//! `push`, `pop`, `insert`, `remove`, `splice` and friends read the list
//! internally. They run with tracking paused so those reads do not subscribe
//! whatever computation happens to be running, and they write through the
//! same tracked path as `set` so every affected index is triggered.

use std::cell::{Ref, RefCell, RefMut};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};

use indexmap::IndexMap;
use tracing::warn;

use super::context::pause_tracking;
use super::runtime::{DepKey, Runtime, TriggerOp};
use super::subscriber::TargetId;
use super::value::{Key, Value};
use crate::error::{ReactiveError, Result};

/// The raw contents of a container.
#[derive(Debug, Clone)]
pub enum Data {
    Map(IndexMap<Rc<str>, Value>),
    List(Vec<Value>),
}

struct ContainerInner {
    id: TargetId,
    data: RefCell<Data>,
}

impl Drop for ContainerInner {
    fn drop(&mut self) {
        Runtime::release_target(self.id);
    }
}

/// A plain, unobserved map or list.
///
/// Cloning a `Container` clones the handle, not the contents.
#[derive(Clone)]
pub struct Container(Rc<ContainerInner>);

impl Container {
    fn from_data(data: Data) -> Self {
        Self(Rc::new(ContainerInner {
            id: TargetId::new(),
            data: RefCell::new(data),
        }))
    }

    /// An empty map.
    pub fn map() -> Self {
        Self::from_data(Data::Map(IndexMap::new()))
    }

    /// An empty list.
    pub fn list() -> Self {
        Self::from_data(Data::List(Vec::new()))
    }

    /// A map built from key/value pairs.
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<Rc<str>>,
        V: Into<Value>,
    {
        Self::from_data(Data::Map(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        ))
    }

    /// A list built from values.
    pub fn from_values<V: Into<Value>>(values: impl IntoIterator<Item = V>) -> Self {
        Self::from_data(Data::List(values.into_iter().map(Into::into).collect()))
    }

    /// The container's identity in the dependency store.
    pub fn id(&self) -> TargetId {
        self.0.id
    }

    pub fn is_list(&self) -> bool {
        matches!(*self.0.data.borrow(), Data::List(_))
    }

    /// Whether both handles point at the same container.
    pub fn ptr_eq(&self, other: &Container) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Read a slot without tracking.
    pub fn get(&self, key: impl Into<Key>) -> Option<Value> {
        let key = key.into();
        match &*self.0.data.borrow() {
            Data::Map(map) => map.get(&*key.as_prop()).cloned(),
            Data::List(list) => key.as_index().and_then(|i| list.get(i).cloned()),
        }
    }

    /// Write a slot without triggering. Writing past the end of a list pads
    /// it with nulls.
    pub fn insert(&self, key: impl Into<Key>, value: impl Into<Value>) {
        let key = key.into();
        let value = value.into();
        match &mut *self.0.data.borrow_mut() {
            Data::Map(map) => {
                map.insert(key.as_prop(), value);
            }
            Data::List(list) => {
                if let Some(index) = key.as_index() {
                    if index >= list.len() {
                        list.resize(index + 1, Value::Null);
                    }
                    list[index] = value;
                }
            }
        }
    }

    /// Number of entries, without tracking.
    pub fn len(&self) -> usize {
        match &*self.0.data.borrow() {
            Data::Map(map) => map.len(),
            Data::List(list) => list.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Borrow the raw contents.
    pub fn data(&self) -> Ref<'_, Data> {
        self.0.data.borrow()
    }

    pub(crate) fn data_mut(&self) -> RefMut<'_, Data> {
        self.0.data.borrow_mut()
    }
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Container")
            .field("id", &self.0.id)
            .field("len", &self.len())
            .finish()
    }
}

/// Which kind of wrapper an [`Observed`] is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Flavor {
    /// Tracks reads, triggers writes, wraps nested containers on read.
    Reactive,
    /// Like `Reactive`, but nested containers are handed out unwrapped.
    ShallowReactive,
    /// Rejects writes; reads are not tracked.
    Readonly,
    /// Rejects writes, does not wrap nested containers.
    ShallowReadonly,
}

impl Flavor {
    pub fn is_readonly(self) -> bool {
        matches!(self, Self::Readonly | Self::ShallowReadonly)
    }

    pub fn is_shallow(self) -> bool {
        matches!(self, Self::ShallowReactive | Self::ShallowReadonly)
    }
}

struct ObservedInner {
    raw: Container,
    flavor: Flavor,
}

impl Drop for ObservedInner {
    fn drop(&mut self) {
        let key = (self.raw.id(), self.flavor);
        let _ = WRAPPERS.try_with(|wrappers| {
            if let Ok(mut wrappers) = wrappers.try_borrow_mut() {
                if wrappers.get(&key).is_some_and(|w| w.strong_count() == 0) {
                    wrappers.remove(&key);
                }
            }
        });
    }
}

thread_local! {
    static WRAPPERS: RefCell<HashMap<(TargetId, Flavor), Weak<ObservedInner>>> =
        RefCell::new(HashMap::new());
}

fn wrap(raw: &Container, flavor: Flavor) -> Observed {
    WRAPPERS.with(|wrappers| {
        let mut wrappers = wrappers.borrow_mut();
        let key = (raw.id(), flavor);
        if let Some(existing) = wrappers.get(&key).and_then(Weak::upgrade) {
            return Observed(existing);
        }

        let inner = Rc::new(ObservedInner {
            raw: raw.clone(),
            flavor,
        });
        wrappers.insert(key, Rc::downgrade(&inner));
        Observed(inner)
    })
}

/// Wrap a container so reads are tracked and writes trigger, deeply.
pub fn reactive(raw: &Container) -> Observed {
    wrap(raw, Flavor::Reactive)
}

/// Wrap a container so only its own slots are observed.
pub fn shallow_reactive(raw: &Container) -> Observed {
    wrap(raw, Flavor::ShallowReactive)
}

/// Wrap a container so every write is rejected, deeply.
pub fn readonly(raw: &Container) -> Observed {
    wrap(raw, Flavor::Readonly)
}

/// Wrap a container so writes to its own slots are rejected.
pub fn shallow_readonly(raw: &Container) -> Observed {
    wrap(raw, Flavor::ShallowReadonly)
}

fn has_live_wrapper(raw: &Container, flavors: &[Flavor]) -> bool {
    WRAPPERS.with(|wrappers| {
        let wrappers = wrappers.borrow();
        flavors.iter().any(|&flavor| {
            wrappers
                .get(&(raw.id(), flavor))
                .is_some_and(|w| w.strong_count() > 0)
        })
    })
}

/// Whether a live reactive (deep, writable) wrapper exists for `raw`.
pub fn is_reactive(raw: &Container) -> bool {
    has_live_wrapper(raw, &[Flavor::Reactive])
}

/// Whether a live readonly wrapper, deep or shallow, exists for `raw`.
pub fn is_readonly(raw: &Container) -> bool {
    has_live_wrapper(raw, &[Flavor::Readonly, Flavor::ShallowReadonly])
}

/// Whether any live wrapper of any flavour exists for `raw`.
pub fn is_observed(raw: &Container) -> bool {
    has_live_wrapper(
        raw,
        &[
            Flavor::Reactive,
            Flavor::ShallowReactive,
            Flavor::Readonly,
            Flavor::ShallowReadonly,
        ],
    )
}

/// An observed view of a [`Container`].
///
/// Cloning an `Observed` clones the handle; all clones are the same wrapper.
#[derive(Clone)]
pub struct Observed(Rc<ObservedInner>);

impl Observed {
    /// The wrapped container.
    pub fn raw(&self) -> &Container {
        &self.0.raw
    }

    pub fn id(&self) -> TargetId {
        self.0.raw.id()
    }

    pub fn flavor(&self) -> Flavor {
        self.0.flavor
    }

    pub fn is_readonly(&self) -> bool {
        self.0.flavor.is_readonly()
    }

    pub fn is_shallow(&self) -> bool {
        self.0.flavor.is_shallow()
    }

    pub fn is_list(&self) -> bool {
        self.0.raw.is_list()
    }

    /// Whether both handles are the same wrapper.
    pub fn ptr_eq(&self, other: &Observed) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    fn track(&self, key: DepKey) {
        if !self.is_readonly() {
            Runtime::track(self.id(), key);
        }
    }

    fn trigger(&self, key: DepKey, op: TriggerOp, new_len: Option<usize>) {
        Runtime::trigger(self.id(), &key, op, new_len);
    }

    /// Normalize a key for this container: property names for maps, indices
    /// for lists.
    fn resolve(&self, key: Key) -> Result<Key> {
        if self.is_list() {
            key.as_index()
                .map(Key::Index)
                .ok_or_else(|| ReactiveError::InvalidIndex {
                    key: key.to_string(),
                })
        } else {
            Ok(Key::Prop(key.as_prop()))
        }
    }

    fn check_writable(&self, operation: &'static str, key: &Key) -> Result<()> {
        if self.is_readonly() {
            return Err(ReactiveError::Readonly {
                operation,
                key: key.to_string(),
            });
        }
        Ok(())
    }

    fn check_list(&self, operation: &'static str) -> Result<()> {
        if !self.is_list() {
            return Err(ReactiveError::NotAList { operation });
        }
        Ok(())
    }

    /// Read a slot, tracking it. Missing slots read as [`Value::Null`].
    pub fn get(&self, key: impl Into<Key>) -> Value {
        let key = match self.resolve(key.into()) {
            Ok(key) => key,
            Err(err) => {
                warn!(%err, "read ignored");
                return Value::Null;
            }
        };
        self.track(DepKey::Key(key.clone()));
        self.0.raw.get(key).unwrap_or_default()
    }

    /// Read a slot holding a container and wrap it like this wrapper.
    ///
    /// Shallow wrappers do not observe nested containers and return `None`
    /// (the slot is still tracked).
    pub fn get_nested(&self, key: impl Into<Key>) -> Option<Observed> {
        let value = self.get(key);
        if self.is_shallow() {
            return None;
        }
        let flavor = if self.is_readonly() {
            Flavor::Readonly
        } else {
            Flavor::Reactive
        };
        value.as_container().map(|raw| wrap(raw, flavor))
    }

    /// Whether a slot exists, tracking it.
    pub fn has(&self, key: impl Into<Key>) -> bool {
        let Ok(key) = self.resolve(key.into()) else {
            return false;
        };
        self.track(DepKey::Key(key.clone()));
        match &*self.0.raw.data() {
            Data::Map(map) => map.contains_key(&*key.as_prop()),
            Data::List(list) => key.as_index().is_some_and(|i| i < list.len()),
        }
    }

    fn track_enumeration(&self) {
        if self.is_list() {
            self.track(DepKey::Length);
        } else {
            self.track(DepKey::Iterate);
        }
    }

    /// All keys in order, tracking enumeration.
    pub fn keys(&self) -> Vec<Key> {
        self.track_enumeration();
        match &*self.0.raw.data() {
            Data::Map(map) => map.keys().cloned().map(Key::Prop).collect(),
            Data::List(list) => (0..list.len()).map(Key::Index).collect(),
        }
    }

    /// All entries in order, tracking enumeration and every slot read.
    pub fn entries(&self) -> Vec<(Key, Value)> {
        self.keys()
            .into_iter()
            .map(|key| {
                let value = self.get(key.clone());
                (key, value)
            })
            .collect()
    }

    /// Number of entries, tracking enumeration (the length for lists).
    pub fn len(&self) -> usize {
        self.track_enumeration();
        self.0.raw.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Write a slot, triggering if the value changed or the slot is new.
    pub fn try_set(&self, key: impl Into<Key>, value: impl Into<Value>) -> Result<()> {
        let key = key.into();
        self.check_writable("set", &key)?;
        let key = self.resolve(key)?;
        let value = value.into();

        let (op, changed) = {
            let mut data = self.0.raw.data_mut();
            match &mut *data {
                Data::Map(map) => match map.get_mut(&*key.as_prop()) {
                    Some(slot) => {
                        let changed = !slot.same_value(&value);
                        *slot = value;
                        (TriggerOp::Set, changed)
                    }
                    None => {
                        map.insert(key.as_prop(), value);
                        (TriggerOp::Add, true)
                    }
                },
                Data::List(list) => {
                    let index = key.as_index().unwrap_or(list.len());
                    if index < list.len() {
                        let changed = !list[index].same_value(&value);
                        list[index] = value;
                        (TriggerOp::Set, changed)
                    } else {
                        list.resize(index, Value::Null);
                        list.push(value);
                        (TriggerOp::Add, true)
                    }
                }
            }
        };

        if changed {
            self.trigger(DepKey::Key(key), op, None);
        }
        Ok(())
    }

    /// Write a slot; a rejected write is logged and ignored.
    pub fn set(&self, key: impl Into<Key>, value: impl Into<Value>) {
        if let Err(err) = self.try_set(key, value) {
            warn!(%err, "write ignored");
        }
    }

    /// Remove a slot. Returns whether it existed.
    ///
    /// Deleting a list element leaves a null hole, like `delete` on an array.
    pub fn try_delete(&self, key: impl Into<Key>) -> Result<bool> {
        let key = key.into();
        self.check_writable("delete", &key)?;
        let key = self.resolve(key)?;

        let existed = {
            let mut data = self.0.raw.data_mut();
            match &mut *data {
                Data::Map(map) => map.shift_remove(&*key.as_prop()).is_some(),
                Data::List(list) => match key.as_index().and_then(|i| list.get_mut(i)) {
                    Some(slot) => {
                        *slot = Value::Null;
                        true
                    }
                    None => false,
                },
            }
        };

        if existed {
            self.trigger(DepKey::Key(key), TriggerOp::Delete, None);
        }
        Ok(existed)
    }

    /// Remove a slot; a rejected delete is logged and reports `false`.
    pub fn delete(&self, key: impl Into<Key>) -> bool {
        self.try_delete(key).unwrap_or_else(|err| {
            warn!(%err, "delete ignored");
            false
        })
    }

    /// Set a list's length, truncating or padding with nulls.
    pub fn set_len(&self, len: usize) -> Result<()> {
        self.check_list("set_len")?;
        self.check_writable("set", &Key::from("length"))?;

        let changed = match &mut *self.0.raw.data_mut() {
            Data::List(list) if list.len() != len => {
                list.resize(len, Value::Null);
                true
            }
            _ => false,
        };

        if changed {
            self.trigger(DepKey::Length, TriggerOp::Set, Some(len));
        }
        Ok(())
    }

    fn raw_list(&self) -> Vec<Value> {
        match &*self.0.raw.data() {
            Data::List(list) => list.clone(),
            Data::Map(_) => Vec::new(),
        }
    }

    /// Write `next` over the list from `from` onwards, then fix the length.
    ///
    /// Unchanged slots do not trigger.
    fn rewrite_from(&self, from: usize, next: Vec<Value>) -> Result<()> {
        let len = next.len();
        for (index, value) in next.into_iter().enumerate().skip(from) {
            self.try_set(index, value)?;
        }
        self.set_len(len)
    }

    /// Remove `delete_count` elements at `start` and insert `items` there.
    /// Returns the removed elements.
    pub fn splice(
        &self,
        start: usize,
        delete_count: usize,
        items: impl IntoIterator<Item = Value>,
    ) -> Result<Vec<Value>> {
        self.check_list("splice")?;
        self.check_writable("splice", &Key::Index(start))?;
        let _pause = pause_tracking();

        let mut next = self.raw_list();
        let start = start.min(next.len());
        let end = start + delete_count.min(next.len() - start);
        let removed: Vec<Value> = next.splice(start..end, items).collect();

        self.rewrite_from(start, next)?;
        Ok(removed)
    }

    /// Append a value. Returns the new length.
    pub fn push(&self, value: impl Into<Value>) -> Result<usize> {
        self.check_list("push")?;
        let _pause = pause_tracking();
        let len = self.0.raw.len();
        self.try_set(len, value)?;
        Ok(len + 1)
    }

    /// Remove and return the last value.
    pub fn pop(&self) -> Result<Option<Value>> {
        self.check_list("pop")?;
        let _pause = pause_tracking();
        let len = self.0.raw.len();
        if len == 0 {
            return Ok(None);
        }
        Ok(self.splice(len - 1, 1, [])?.pop())
    }

    /// Insert a value at `index` (clamped to the length), shifting the rest.
    pub fn insert(&self, index: usize, value: impl Into<Value>) -> Result<()> {
        self.splice(index, 0, [value.into()]).map(drop)
    }

    /// Remove the value at `index`, shifting the rest.
    pub fn remove(&self, index: usize) -> Result<Option<Value>> {
        Ok(self.splice(index, 1, [])?.pop())
    }

    /// Remove and return the first value.
    pub fn shift(&self) -> Result<Option<Value>> {
        self.remove(0)
    }

    /// Prepend a value.
    pub fn unshift(&self, value: impl Into<Value>) -> Result<()> {
        self.insert(0, value)
    }

    /// Reverse the list in place.
    pub fn reverse(&self) -> Result<()> {
        self.check_list("reverse")?;
        self.check_writable("reverse", &Key::Index(0))?;
        let _pause = pause_tracking();
        let mut next = self.raw_list();
        next.reverse();
        self.rewrite_from(0, next)
    }

    /// Sort the list in place with a comparator.
    pub fn sort_by(&self, compare: impl FnMut(&Value, &Value) -> Ordering) -> Result<()> {
        self.check_list("sort")?;
        self.check_writable("sort", &Key::Index(0))?;
        let _pause = pause_tracking();
        let mut next = self.raw_list();
        next.sort_by(compare);
        self.rewrite_from(0, next)
    }

    /// Swap two elements.
    pub fn swap(&self, a: usize, b: usize) -> Result<()> {
        self.check_list("swap")?;
        let _pause = pause_tracking();
        let first = self.get(a);
        let second = self.get(b);
        self.try_set(a, second)?;
        self.try_set(b, first)
    }

    /// Position of the first element equal to `needle`, tracking every
    /// element read.
    pub fn index_of(&self, needle: &Value) -> Option<usize> {
        (0..self.len()).find(|&i| self.get(i) == *needle)
    }

    /// Position of the last element equal to `needle`.
    pub fn last_index_of(&self, needle: &Value) -> Option<usize> {
        (0..self.len()).rev().find(|&i| self.get(i) == *needle)
    }

    /// Whether the list contains `needle`.
    pub fn includes(&self, needle: &Value) -> bool {
        self.index_of(needle).is_some()
    }
}

impl PartialEq for Observed {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Debug for Observed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observed")
            .field("id", &self.id())
            .field("flavor", &self.flavor())
            .finish()
    }
}
