use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// Something the scripting layer wants to hear about once an animation ends.
pub trait ActionCallback: Send + Sync {
    fn on_event(&self);
}

impl<F> ActionCallback for F
where
    F: Fn() + Send + Sync,
{
    fn on_event(&self) {
        self()
    }
}

pub type CallbackHandle = Arc<dyn ActionCallback>;

pub fn callback<F>(f: F) -> CallbackHandle
where
    F: Fn() + Send + Sync + 'static,
{
    Arc::new(f)
}

/// A completion callback as the actor stores it.
///
/// Live handles are process-local; only the key form survives a save.
#[derive(Clone)]
pub enum CallbackRef {
    Live(CallbackHandle),
    Key(String),
}

impl CallbackRef {
    pub fn key(&self) -> Option<&str> {
        match self {
            CallbackRef::Key(key) => Some(key.as_str()),
            CallbackRef::Live(_) => None,
        }
    }

    /// Key used when persisting this reference.
    pub fn persist_key(&self, registry: &dyn CallbackRegistry) -> String {
        match self {
            CallbackRef::Live(handle) => registry.register_or_find(handle),
            CallbackRef::Key(key) => key.clone(),
        }
    }

    pub fn resolve(self, registry: &dyn CallbackRegistry) -> Option<CallbackHandle> {
        match self {
            CallbackRef::Live(handle) => Some(handle),
            CallbackRef::Key(key) => registry.resolve(&key),
        }
    }
}

impl fmt::Debug for CallbackRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallbackRef::Live(handle) => write!(f, "Live({:p})", Arc::as_ptr(handle)),
            CallbackRef::Key(key) => write!(f, "Key({key})"),
        }
    }
}

impl From<CallbackHandle> for CallbackRef {
    fn from(handle: CallbackHandle) -> Self {
        CallbackRef::Live(handle)
    }
}

/// Maps live callbacks to persistable keys and back.
pub trait CallbackRegistry {
    fn register_or_find(&self, handle: &CallbackHandle) -> String;
    fn resolve(&self, key: &str) -> Option<CallbackHandle>;
}

const AUTO_KEY_PREFIX: &str = "callback#";

#[derive(Default)]
struct ArenaSlots {
    handles: Vec<CallbackHandle>,
    keys: Vec<String>,
    by_key: HashMap<String, usize>,
}

impl ArenaSlots {
    fn find(&self, handle: &CallbackHandle) -> Option<usize> {
        self.handles.iter().position(|existing| same_callback(existing, handle))
    }

    fn insert(&mut self, key: String, handle: CallbackHandle) -> usize {
        let index = self.handles.len();
        self.handles.push(handle);
        self.keys.push(key.clone());
        self.by_key.insert(key, index);
        index
    }
}

/// Indirection table from keys to callback handles.
///
/// Handles registered under a name keep that name across process restarts as
/// long as the scripting layer registers them again on startup. Anonymous
/// handles get a random key, so a save reloaded elsewhere never resolves to an
/// unrelated callback.
#[derive(Default)]
pub struct CallbackArena {
    slots: Mutex<ArenaSlots>,
}

impl CallbackArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handle` under `name`, replacing whatever was there.
    pub fn register(&self, name: impl Into<String>, handle: CallbackHandle) {
        let name = name.into();
        let mut slots = self.lock();
        if let Some(&index) = slots.by_key.get(&name) {
            slots.handles[index] = handle;
        } else {
            slots.insert(name, handle);
        }
    }

    pub fn len(&self) -> usize {
        self.lock().handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ArenaSlots> {
        match self.slots.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl CallbackRegistry for CallbackArena {
    fn register_or_find(&self, handle: &CallbackHandle) -> String {
        let mut slots = self.lock();
        if let Some(index) = slots.find(handle) {
            return slots.keys[index].clone();
        }
        let key = loop {
            let candidate = format!("{AUTO_KEY_PREFIX}{}", Uuid::new_v4().simple());
            if !slots.by_key.contains_key(&candidate) {
                break candidate;
            }
        };
        slots.insert(key.clone(), Arc::clone(handle));
        key
    }

    fn resolve(&self, key: &str) -> Option<CallbackHandle> {
        let slots = self.lock();
        slots.by_key.get(key).map(|&index| Arc::clone(&slots.handles[index]))
    }
}

fn same_callback(a: &CallbackHandle, b: &CallbackHandle) -> bool {
    std::ptr::eq(Arc::as_ptr(a) as *const u8, Arc::as_ptr(b) as *const u8)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn register_or_find_is_stable_per_handle() {
        let arena = CallbackArena::new();
        let a = callback(|| {});
        let b = callback(|| {});
        let key_a = arena.register_or_find(&a);
        assert_eq!(arena.register_or_find(&a), key_a);
        let key_b = arena.register_or_find(&b);
        assert_ne!(key_a, key_b);
        assert_eq!(arena.len(), 2);
    }

    #[test]
    fn named_registration_wins_over_auto_keys() {
        let arena = CallbackArena::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let hits = Arc::clone(&counter);
        let handle = callback(move || {
            hits.fetch_add(1, Ordering::SeqCst);
        });
        arena.register("scene1/door/open", Arc::clone(&handle));
        assert_eq!(arena.register_or_find(&handle), "scene1/door/open");

        let resolved = arena.resolve("scene1/door/open").expect("named callback resolves");
        resolved.on_event();
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert!(arena.resolve("scene1/door/close").is_none());
    }

    #[test]
    fn anonymous_keys_do_not_resolve_in_another_arena() {
        let saving = CallbackArena::new();
        let key = saving.register_or_find(&callback(|| {}));
        assert!(key.starts_with(AUTO_KEY_PREFIX));

        let fresh = CallbackArena::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let hits = Arc::clone(&counter);
        let unrelated = callback(move || {
            hits.fetch_add(1, Ordering::SeqCst);
        });
        let other_key = fresh.register_or_find(&unrelated);
        assert_ne!(other_key, key);
        assert!(fresh.resolve(&key).is_none());
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn auto_keys_skip_names_already_taken() {
        let arena = CallbackArena::new();
        arena.register("callback#0", callback(|| {}));
        let handle = callback(|| {});
        let key = arena.register_or_find(&handle);
        assert_ne!(key, "callback#0");
        let resolved = arena.resolve(&key).expect("auto key resolves");
        assert!(same_callback(&resolved, &handle));
        assert_eq!(arena.len(), 2);
    }

    #[test]
    fn callback_ref_normalises_to_key() {
        let arena = CallbackArena::new();
        let handle = callback(|| {});
        let live = CallbackRef::from(Arc::clone(&handle));
        let key = live.persist_key(&arena);
        let keyed = CallbackRef::Key(key.clone());
        assert_eq!(keyed.persist_key(&arena), key);
        let resolved = keyed.resolve(&arena).expect("key resolves");
        assert!(same_callback(&resolved, &handle));
    }
}
