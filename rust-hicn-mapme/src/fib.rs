//! Exact-match FIB of hICN prefixes.

use log::{debug, info};
use parking_lot::{Mutex, MutexGuard, RwLock};
use rust_hicn_common::{
    types::{FaceId, Seq},
    Prefix,
};
use std::collections::HashMap;
use std::sync::Arc;

use crate::adjacency::Adjacencies;
use crate::error::MapMeError;
use crate::face::FaceTable;
use crate::tfib::Tfib;

/// FIB-resident object bound to a prefix.
///
/// The mobility state sits behind a per-entry mutex so that updates for the
/// same prefix arriving on different faces are serialized.
#[derive(Debug)]
pub struct ForwardingEntry {
    prefix: Prefix,
    tfib: Mutex<Tfib>,
}

impl ForwardingEntry {
    pub fn new(tfib: Tfib) -> Self {
        Self {
            prefix: *tfib.prefix(),
            tfib: Mutex::new(tfib),
        }
    }

    pub fn prefix(&self) -> &Prefix {
        &self.prefix
    }

    pub fn lock(&self) -> MutexGuard<'_, Tfib> {
        self.tfib.lock()
    }

    pub fn seq(&self) -> Seq {
        self.tfib.lock().seq()
    }

    pub fn current(&self) -> Vec<FaceId> {
        self.tfib.lock().current()
    }

    pub fn previous(&self) -> Vec<FaceId> {
        self.tfib.lock().previous()
    }
}

/// What a FIB lookup resolves to.
#[derive(Debug, Clone)]
pub enum ForwardingObject {
    /// hICN forwarding entry with mobility support.
    Hicn(Arc<ForwardingEntry>),
    /// Plain IP route towards a locator, without hICN support.
    Locator(Prefix),
}

/// Exact prefix match lookup.
pub trait Lookup: Send + Sync {
    fn lookup(&self, prefix: &Prefix) -> Option<ForwardingObject>;

    /// Every hICN entry.
    fn entries(&self) -> Vec<Arc<ForwardingEntry>>;
}

/// In-memory FIB.
pub struct Fib {
    faces: Arc<dyn FaceTable>,
    adjacencies: Arc<dyn Adjacencies>,
    capacity: usize,
    routes: RwLock<HashMap<Prefix, ForwardingObject>>,
}

impl Fib {
    pub fn new(
        faces: Arc<dyn FaceTable>,
        adjacencies: Arc<dyn Adjacencies>,
        capacity: usize,
    ) -> Self {
        Self {
            faces,
            adjacencies,
            capacity,
            routes: RwLock::new(HashMap::new()),
        }
    }

    /// Add an hICN route for `prefix` through `nexthops`.
    ///
    /// Adding a route that already exists adds the next hops to it.
    pub fn add_route(
        &self,
        prefix: Prefix,
        nexthops: &[FaceId],
    ) -> Result<Arc<ForwardingEntry>, MapMeError> {
        let entry = {
            let mut routes = self.routes.write();
            match routes.get(&prefix) {
                Some(ForwardingObject::Hicn(entry)) => Arc::clone(entry),
                _ => {
                    let tfib = Tfib::new(
                        prefix,
                        Arc::clone(&self.faces),
                        Arc::clone(&self.adjacencies),
                        self.capacity,
                    );
                    let entry = Arc::new(ForwardingEntry::new(tfib));
                    routes.insert(prefix, ForwardingObject::Hicn(Arc::clone(&entry)));
                    info!("Added hICN route {}", prefix);
                    entry
                }
            }
        };

        let mut tfib = entry.lock();
        for face in nexthops {
            tfib.add_current(*face)?;
        }
        drop(tfib);
        Ok(entry)
    }

    /// Add a plain IP route for `prefix`.
    pub fn add_locator(&self, prefix: Prefix) {
        self.routes
            .write()
            .insert(prefix, ForwardingObject::Locator(prefix));
        debug!("Added locator route {}", prefix);
    }

    /// Remove the route for `prefix`, withdrawing its adjacencies.
    pub fn remove_route(&self, prefix: &Prefix) -> bool {
        let removed = self.routes.write().remove(prefix);
        match removed {
            Some(ForwardingObject::Hicn(entry)) => {
                let mut tfib = entry.lock();
                for face in tfib.current() {
                    tfib.remove_current(face);
                }
                tfib.clear_previous();
                info!("Removed hICN route {}", prefix);
                true
            }
            Some(ForwardingObject::Locator(_)) => true,
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.routes.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.read().is_empty()
    }
}

impl Lookup for Fib {
    fn lookup(&self, prefix: &Prefix) -> Option<ForwardingObject> {
        self.routes.read().get(prefix).cloned()
    }

    fn entries(&self) -> Vec<Arc<ForwardingEntry>> {
        let mut entries: Vec<_> = self
            .routes
            .read()
            .values()
            .filter_map(|object| match object {
                ForwardingObject::Hicn(entry) => Some(Arc::clone(entry)),
                ForwardingObject::Locator(_) => None,
            })
            .collect();
        entries.sort_by_key(|entry| *entry.prefix());
        entries
    }
}
