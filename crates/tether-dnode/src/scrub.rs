//! The per-session registrar that mints callback IDs and resolves them.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::arg::{Arg, ArgObject, Callback, Function, Member};
use crate::errors::ScrubError;
use crate::message::{Path, PathElement};

/// Callback ID (decimal string) to the path of the callable inside the
/// argument tree. This is what travels in a message's `callbacks` field.
pub type CallbackMap = HashMap<String, Path>;

/// Maps session-local numeric IDs to local callables.
///
/// IDs are minted from an atomic counter starting at zero and are unique for
/// the lifetime of the session. `scrub`, `callback`, and `remove_callback`
/// are all safe to call concurrently.
#[derive(Default)]
pub struct Scrubber {
    seq: AtomicU64,
    callbacks: Mutex<HashMap<u64, Callback>>,
}

impl Scrubber {
    pub fn new() -> Self {
        Scrubber::default()
    }

    /// Walk `tree`, register every callable reachable by traversal, and
    /// return the path map to send alongside the serialized arguments.
    ///
    /// Traversal: plain JSON contributes nothing; sequences are visited by
    /// index and composites by member name; members added with
    /// `skip_callbacks` are serialized but not walked; embedded composites
    /// contribute at the current path level; exported methods register at
    /// the camel-cased method name. A callable at the root (empty path) is
    /// an error.
    pub fn scrub(&self, tree: &Arg) -> Result<CallbackMap, ScrubError> {
        let mut map = CallbackMap::new();
        let mut path = Path::new();
        self.collect(tree, &mut path, &mut map)?;
        Ok(map)
    }

    fn collect(
        &self,
        arg: &Arg,
        path: &mut Path,
        map: &mut CallbackMap,
    ) -> Result<(), ScrubError> {
        match arg {
            Arg::Value(_) => Ok(()),
            Arg::Array(items) => {
                for (i, item) in items.iter().enumerate() {
                    path.push(PathElement::Index(i));
                    self.collect(item, path, map)?;
                    path.pop();
                }
                Ok(())
            }
            Arg::Object(obj) => self.collect_object(obj, path, map),
            Arg::Function(f) => self.register(f, path, map),
        }
    }

    fn collect_object(
        &self,
        obj: &ArgObject,
        path: &mut Path,
        map: &mut CallbackMap,
    ) -> Result<(), ScrubError> {
        for member in &obj.members {
            match member {
                Member::Field {
                    name,
                    value,
                    collect,
                } => {
                    if !collect {
                        continue;
                    }
                    path.push(PathElement::Key(name.clone()));
                    self.collect(value, path, map)?;
                    path.pop();
                }
                Member::Embedded(inner) => self.collect_object(inner, path, map)?,
            }
        }

        for (name, func) in &obj.methods {
            path.push(PathElement::Key(camel_case(name)));
            self.register(func, path, map)?;
            path.pop();
        }

        Ok(())
    }

    fn register(
        &self,
        func: &Function,
        path: &Path,
        map: &mut CallbackMap,
    ) -> Result<(), ScrubError> {
        if path.is_empty() {
            return Err(ScrubError::CallbackAtRoot);
        }

        // Every callable position gets an entry, reconstructed proxies
        // included: a forwarded proxy registers under a fresh local ID whose
        // callback relays the invocation back through its own session.
        let id = self.seq.fetch_add(1, Ordering::SeqCst);
        self.callbacks.lock().insert(id, func.to_callback());
        // The path buffer is reused during traversal; snapshot it.
        map.insert(id.to_string(), path.clone());
        Ok(())
    }

    /// Registry lookup.
    pub fn callback(&self, id: u64) -> Option<Callback> {
        self.callbacks.lock().get(&id).cloned()
    }

    /// Drop a registration. Removing an unknown ID is a no-op.
    pub fn remove_callback(&self, id: u64) {
        self.callbacks.lock().remove(&id);
    }

    /// Number of live registrations.
    pub fn callback_count(&self) -> usize {
        self.callbacks.lock().len()
    }
}

/// Lowercase the first character, retain the rest.
fn camel_case(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}
