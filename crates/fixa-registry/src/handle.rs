use std::fmt;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use fixa_wire::{Color, FixableId, FixableValue, ValueKind};

use crate::registry::Shared;

mod sealed {
    pub trait Sealed {}
    impl Sealed for bool {}
    impl Sealed for f32 {}
    impl Sealed for fixa_wire::Color {}
}

/// Rust types a [`Fixable`] handle can hold: `bool`, `f32` and [`Color`].
pub trait FixableType: sealed::Sealed + Copy + Send + Sync + 'static {
    const KIND: ValueKind;

    fn from_value(value: &FixableValue) -> Option<Self>;

    fn into_value(self) -> FixableValue;
}

impl FixableType for bool {
    const KIND: ValueKind = ValueKind::Bool;

    fn from_value(value: &FixableValue) -> Option<Self> {
        value.as_bool()
    }

    fn into_value(self) -> FixableValue {
        FixableValue::Bool(self)
    }
}

impl FixableType for f32 {
    const KIND: ValueKind = ValueKind::Float;

    fn from_value(value: &FixableValue) -> Option<Self> {
        value.as_f32()
    }

    fn into_value(self) -> FixableValue {
        FixableValue::Float(self)
    }
}

impl FixableType for Color {
    const KIND: ValueKind = ValueKind::Color;

    fn from_value(value: &FixableValue) -> Option<Self> {
        value.as_color()
    }

    fn into_value(self) -> FixableValue {
        FixableValue::Color(self)
    }
}

/// Registry-side view of a bound handle.
pub(crate) trait BoundSlot: Send + Sync {
    /// Push a new value. Returns `false` if the value has the wrong kind.
    fn deliver(&self, value: &FixableValue) -> bool;
}

type Callback<T> = Arc<dyn Fn(T) + Send + Sync>;

pub(crate) struct Slot<T> {
    id: FixableId,
    state: Mutex<SlotState<T>>,
}

struct SlotState<T> {
    value: T,
    subscribers: Vec<Sender<T>>,
    callbacks: Vec<Callback<T>>,
}

impl<T: FixableType> Slot<T> {
    pub(crate) fn new(id: FixableId, value: T) -> Self {
        Self {
            id,
            state: Mutex::new(SlotState {
                value,
                subscribers: Vec::new(),
                callbacks: Vec::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SlotState<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T: FixableType> BoundSlot for Slot<T> {
    fn deliver(&self, value: &FixableValue) -> bool {
        let Some(value) = T::from_value(value) else {
            return false;
        };

        let callbacks = {
            let mut state = self.lock();
            state.value = value;
            state.subscribers.retain(|tx| tx.send(value).is_ok());
            state.callbacks.clone()
        };
        for callback in callbacks {
            callback(value);
        }
        true
    }
}

/// An application-held handle to one declared fixable.
///
/// The handle caches the current value and is updated by
/// [`Registry::apply`](crate::Registry::apply). The registry only keeps a
/// weak reference; dropping the handle unregisters it.
pub struct Fixable<T: FixableType> {
    slot: Arc<Slot<T>>,
    token: u64,
    registry: Weak<Shared>,
}

pub type FixableBool = Fixable<bool>;
pub type FixableFloat = Fixable<f32>;
pub type FixableColor = Fixable<Color>;

impl<T: FixableType> Fixable<T> {
    pub(crate) fn new(slot: Arc<Slot<T>>, token: u64, registry: Weak<Shared>) -> Self {
        Self {
            slot,
            token,
            registry,
        }
    }

    pub fn id(&self) -> &FixableId {
        &self.slot.id
    }

    /// The most recently applied value.
    pub fn value(&self) -> T {
        self.slot.lock().value
    }

    /// Receive every value applied from now on, once each, in apply order.
    ///
    /// Dropping the receiver unsubscribes it on the next apply.
    pub fn subscribe(&self) -> Receiver<T> {
        let (tx, rx) = mpsc::channel();
        self.slot.lock().subscribers.push(tx);
        rx
    }

    /// Run `callback` on the applying thread for every value applied from
    /// now on.
    pub fn on_change(&self, callback: impl Fn(T) + Send + Sync + 'static) {
        self.slot.lock().callbacks.push(Arc::new(callback));
    }
}

impl<T: FixableType> Drop for Fixable<T> {
    fn drop(&mut self) {
        if let Some(shared) = self.registry.upgrade() {
            shared.unregister(&self.slot.id, self.token);
        }
    }
}

impl<T: FixableType + fmt::Debug> fmt::Debug for Fixable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fixable")
            .field("id", self.id())
            .field("value", &self.value())
            .finish()
    }
}
