use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use fixa_wire::{
    FixableConfig, FixableId, FixableSetup, FixableValue, RegistrationMessage, ValueKind,
};
use tracing::{debug, trace, warn};

use crate::error::{BindError, RegistryError, Result};
use crate::handle::{BoundSlot, Fixable, FixableType, Slot};

/// What happened to one applied value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// Stored and pushed to `delivered` live handles.
    Applied { delivered: usize },
    /// No fixable with that id was declared.
    Unknown,
    /// The value kind does not match the declaration. `expected` is `None`
    /// for dividers and groups.
    KindMismatch {
        expected: Option<ValueKind>,
        found: ValueKind,
    },
}

impl ApplyOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied { .. })
    }
}

/// Index of declared fixables, their current values and bound handles.
///
/// Cloning is cheap and every clone refers to the same registry. All
/// mutation is serialized by one lock, so declarations, binds and applies
/// from different threads never interleave.
#[derive(Clone, Default)]
pub struct Registry {
    shared: Arc<Shared>,
}

#[derive(Default)]
pub(crate) struct Shared {
    state: Mutex<State>,
    /// Held across an apply so deliveries keep apply order without holding
    /// `state` while handles and callbacks run.
    applying: Mutex<()>,
}

#[derive(Default)]
struct State {
    entries: HashMap<FixableId, Entry>,
    next_seq: u64,
    next_token: u64,
}

struct Entry {
    /// Groups are stored with an empty `children` list; `Entry::children`
    /// holds the tree.
    config: FixableConfig,
    value: Option<FixableValue>,
    seq: u64,
    parent: Option<FixableId>,
    children: Vec<FixableId>,
    instances: Vec<(u64, Weak<dyn BoundSlot>)>,
}

/// One entry of a declaration, flattened out of its group tree.
struct Planned {
    id: FixableId,
    parent: Option<FixableId>,
    config: FixableConfig,
    children: Vec<FixableId>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_apply(&self) -> MutexGuard<'_, ()> {
        self.applying.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn unregister(&self, id: &FixableId, token: u64) {
        if let Some(entry) = self.lock().entries.get_mut(id) {
            entry.instances.retain(|(t, _)| *t != token);
        }
    }
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a fixable, or replace the config of an existing one.
    ///
    /// New fixables start at [`FixableConfig::default_value`]. Redeclaring
    /// keeps the current value, the declaration sequence and bound handles,
    /// but must use the same variant. Group children are declared with the
    /// group.
    pub fn declare(&self, id: impl Into<FixableId>, config: FixableConfig) -> Result<()> {
        self.declare_inner(id.into(), config, None)
    }

    /// Declare a fixable with an explicit value.
    ///
    /// If the fixable already exists the value is applied to its handles.
    pub fn declare_with_value(
        &self,
        id: impl Into<FixableId>,
        config: FixableConfig,
        value: impl Into<FixableValue>,
    ) -> Result<()> {
        self.declare_inner(id.into(), config, Some(value.into()))
    }

    /// Declare every setup in order, stopping at the first error.
    pub fn declare_all(&self, setups: impl IntoIterator<Item = FixableSetup>) -> Result<()> {
        setups
            .into_iter()
            .try_for_each(|setup| self.declare_inner(setup.id, setup.config, setup.value))
    }

    fn declare_inner(
        &self,
        id: FixableId,
        config: FixableConfig,
        value: Option<FixableValue>,
    ) -> Result<()> {
        if let Some(value) = &value {
            if config.kind() != Some(value.kind()) {
                return Err(RegistryError::ValueKindMismatch {
                    id,
                    expected: config.kind(),
                    found: value.kind(),
                });
            }
        }

        let mut plan = Vec::new();
        plan_declaration(id.clone(), None, config, &mut plan);

        let mut declared = HashSet::new();
        for item in &plan {
            if !declared.insert(item.id.clone()) {
                return Err(RegistryError::DuplicateId {
                    id: item.id.clone(),
                });
            }
        }

        let mut state = self.shared.lock();
        let previous = state.descendants(&id);

        for (index, item) in plan.iter().enumerate() {
            let Some(existing) = state.entries.get(&item.id) else {
                continue;
            };
            let is_root = index == 0;
            if (is_root && existing.parent.is_some()) || (!is_root && !previous.contains(&item.id))
            {
                return Err(RegistryError::DuplicateId {
                    id: item.id.clone(),
                });
            }
            if !existing.config.same_variant(&item.config) {
                return Err(RegistryError::ConflictingDeclaration {
                    id: item.id.clone(),
                    existing: existing.config.variant_name(),
                    requested: item.config.variant_name(),
                });
            }
        }

        for stale in previous.iter().filter(|child| !declared.contains(*child)) {
            debug!(id = %stale, "removing child no longer in its group");
            state.entries.remove(stale);
        }

        let mut value = value;
        for item in plan {
            state.upsert(item, value.take());
        }
        debug!(id = %id, "declared fixable");
        Ok(())
    }

    /// Bind a handle of type `T` to a declared fixable.
    pub fn try_bind<T: FixableType>(&self, id: &str) -> std::result::Result<Fixable<T>, BindError> {
        let mut state = self.shared.lock();
        let token = state.next_token;

        let Some((key, entry)) = state.entries.get_key_value(id) else {
            return Err(BindError::NotDeclared { id: id.into() });
        };
        let declared = entry.config.kind().ok_or_else(|| BindError::NotBindable {
            id: key.clone(),
            variant: entry.config.variant_name(),
        })?;
        if declared != T::KIND {
            return Err(BindError::TypeMismatch {
                id: key.clone(),
                declared,
                requested: T::KIND,
            });
        }
        let current = entry
            .value
            .or_else(|| entry.config.default_value())
            .and_then(|value| T::from_value(&value))
            .ok_or_else(|| BindError::NotBindable {
                id: key.clone(),
                variant: entry.config.variant_name(),
            })?;

        let slot = Arc::new(Slot::new(key.clone(), current));
        let weak: Weak<Slot<T>> = Arc::downgrade(&slot);
        let weak: Weak<dyn BoundSlot> = weak;
        if let Some(entry) = state.entries.get_mut(id) {
            entry.instances.push((token, weak));
        }
        state.next_token += 1;
        trace!(id, token, "bound handle");

        Ok(Fixable::new(slot, token, Arc::downgrade(&self.shared)))
    }

    /// Bind a handle of type `T`, panicking if the id is undeclared, holds
    /// no value or holds a different kind.
    ///
    /// Use this at setup time where a wrong id or type is a programming
    /// error; use [`Registry::try_bind`] to handle the error instead.
    #[track_caller]
    pub fn bind<T: FixableType>(&self, id: &str) -> Fixable<T> {
        match self.try_bind(id) {
            Ok(handle) => handle,
            Err(err) => panic!("{err}"),
        }
    }

    /// Store `value` and push it to every live handle bound to `id`.
    ///
    /// When this returns each live handle has the new value and one message
    /// queued per subscriber. Handles that have been dropped are pruned.
    ///
    /// Handles are updated after the registry lock is released, so
    /// `on_change` callbacks may read the registry, bind or drop handles.
    /// They must not apply values themselves.
    pub fn apply(&self, id: &str, value: FixableValue) -> ApplyOutcome {
        let _applying = self.shared.lock_apply();
        let slots = {
            let mut state = self.shared.lock();
            let Some(entry) = state.entries.get_mut(id) else {
                warn!(id, "ignoring value for unknown fixable");
                return ApplyOutcome::Unknown;
            };
            let expected = entry.config.kind();
            if expected != Some(value.kind()) {
                warn!(
                    id,
                    expected = ?expected,
                    found = %value.kind(),
                    "ignoring value of the wrong kind"
                );
                return ApplyOutcome::KindMismatch {
                    expected,
                    found: value.kind(),
                };
            }
            entry.value = Some(value);
            entry.live_slots()
        };

        let delivered = slots.iter().filter(|slot| slot.deliver(&value)).count();
        trace!(id, delivered, "applied value");
        ApplyOutcome::Applied { delivered }
    }

    /// Apply each update independently, in order. Returns the ids that were
    /// applied; a rejected entry does not undo earlier ones.
    pub fn apply_all(
        &self,
        updates: impl IntoIterator<Item = (FixableId, FixableValue)>,
    ) -> Vec<FixableId> {
        updates
            .into_iter()
            .filter(|(id, value)| self.apply(id.as_str(), *value).is_applied())
            .map(|(id, _)| id)
            .collect()
    }

    /// Top-level configs in presentation order, groups with their children
    /// nested and sorted the same way.
    pub fn snapshot_configs(&self) -> Vec<(FixableId, FixableConfig)> {
        self.shared.lock().configs()
    }

    /// Current values of every fixable that holds one, group children
    /// included.
    pub fn snapshot_values(&self) -> BTreeMap<FixableId, FixableValue> {
        self.shared.lock().values()
    }

    /// A consistent registration snapshot.
    pub fn registration(&self, stream_name: impl Into<String>) -> RegistrationMessage {
        let state = self.shared.lock();
        RegistrationMessage {
            stream_name: stream_name.into(),
            fixables: state.configs(),
            values: state.values(),
        }
    }

    pub fn value(&self, id: &str) -> Option<FixableValue> {
        self.shared.lock().entries.get(id).and_then(|entry| entry.value)
    }

    pub fn config(&self, id: &str) -> Option<FixableConfig> {
        self.shared.lock().assemble(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.shared.lock().entries.contains_key(id)
    }

    /// Number of declared fixables, group children included.
    pub fn len(&self) -> usize {
        self.shared.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of handles bound to `id` that are still alive.
    pub fn live_instances(&self, id: &str) -> usize {
        self.shared.lock().entries.get(id).map_or(0, |entry| {
            entry
                .instances
                .iter()
                .filter(|(_, weak)| weak.strong_count() > 0)
                .count()
        })
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("fixables", &self.len())
            .finish_non_exhaustive()
    }
}

impl Entry {
    /// Prune dropped handles and return the rest.
    fn live_slots(&mut self) -> Vec<Arc<dyn BoundSlot>> {
        let mut live = Vec::with_capacity(self.instances.len());
        self.instances.retain(|(_, weak)| match weak.upgrade() {
            Some(slot) => {
                live.push(slot);
                true
            }
            None => false,
        });
        live
    }

    fn sort_key(&self) -> (i64, u64) {
        (self.config.order(), self.seq)
    }
}

impl State {
    fn upsert(&mut self, item: Planned, value: Option<FixableValue>) {
        if let Some(entry) = self.entries.get_mut(&item.id) {
            entry.config = item.config;
            entry.parent = item.parent;
            entry.children = item.children;
            if let Some(value) = value {
                entry.value = Some(value);
                entry.push(&value);
            }
            return;
        }

        let seq = self.next_seq;
        self.next_seq += 1;
        let value = value.or_else(|| item.config.default_value());
        self.entries.insert(
            item.id,
            Entry {
                config: item.config,
                value,
                seq,
                parent: item.parent,
                children: item.children,
                instances: Vec::new(),
            },
        );
    }

    /// Every id nested under `id`, at any depth.
    fn descendants(&self, id: &FixableId) -> HashSet<FixableId> {
        let mut out = HashSet::new();
        let mut pending = vec![id.clone()];
        while let Some(next) = pending.pop() {
            if let Some(entry) = self.entries.get(&next) {
                for child in &entry.children {
                    if out.insert(child.clone()) {
                        pending.push(child.clone());
                    }
                }
            }
        }
        out
    }

    fn sorted<'a>(&'a self, ids: impl Iterator<Item = &'a FixableId>) -> Vec<&'a FixableId> {
        let mut ids: Vec<_> = ids
            .filter_map(|id| self.entries.get_key_value(id))
            .collect();
        ids.sort_by_key(|(_, entry)| entry.sort_key());
        ids.into_iter().map(|(id, _)| id).collect()
    }

    fn assemble(&self, id: &str) -> Option<FixableConfig> {
        let entry = self.entries.get(id)?;
        match &entry.config {
            FixableConfig::Group { display, .. } => {
                let children = self
                    .sorted(entry.children.iter())
                    .into_iter()
                    .filter_map(|child| Some((child.clone(), self.assemble(child.as_str())?)))
                    .collect();
                Some(FixableConfig::Group {
                    children,
                    display: display.clone(),
                })
            }
            other => Some(other.clone()),
        }
    }

    fn configs(&self) -> Vec<(FixableId, FixableConfig)> {
        let top_level = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.parent.is_none())
            .map(|(id, _)| id);
        self.sorted(top_level)
            .into_iter()
            .filter_map(|id| Some((id.clone(), self.assemble(id.as_str())?)))
            .collect()
    }

    fn values(&self) -> BTreeMap<FixableId, FixableValue> {
        self.entries
            .iter()
            .filter_map(|(id, entry)| Some((id.clone(), entry.value?)))
            .collect()
    }
}

fn plan_declaration(
    id: FixableId,
    parent: Option<FixableId>,
    config: FixableConfig,
    plan: &mut Vec<Planned>,
) {
    let (shape, children) = match config {
        FixableConfig::Group { children, display } => (
            FixableConfig::Group {
                children: Vec::new(),
                display,
            },
            children,
        ),
        other => (other, Vec::new()),
    };
    plan.push(Planned {
        id: id.clone(),
        parent,
        config: shape,
        children: children.iter().map(|(child, _)| child.clone()).collect(),
    });
    for (child, config) in children {
        plan_declaration(child, Some(id.clone()), config, plan);
    }
}
