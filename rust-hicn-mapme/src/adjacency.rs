//! Data-plane adjacencies installed for current next hops.

use log::{debug, trace};
use parking_lot::RwLock;
use rust_hicn_common::{types::FaceId, Prefix};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use crate::error::MapMeError;
use crate::face::FaceTable;

/// FIB mutation interface consulted by the forwarding fast path.
pub trait Adjacencies: Send + Sync {
    fn install_nexthop(&self, prefix: &Prefix, face: FaceId) -> Result<(), MapMeError>;

    fn remove_nexthop(&self, prefix: &Prefix, face: FaceId);
}

/// In-memory adjacency table.
pub struct AdjacencyTable {
    faces: Arc<dyn FaceTable>,
    table: RwLock<HashMap<Prefix, BTreeSet<FaceId>>>,
}

impl AdjacencyTable {
    pub fn new(faces: Arc<dyn FaceTable>) -> Self {
        Self {
            faces,
            table: RwLock::new(HashMap::new()),
        }
    }

    /// Faces a packet for `prefix` would be forwarded to.
    pub fn nexthops(&self, prefix: &Prefix) -> Vec<FaceId> {
        self.table
            .read()
            .get(prefix)
            .map(|faces| faces.iter().copied().collect())
            .unwrap_or_default()
    }
}

impl Adjacencies for AdjacencyTable {
    fn install_nexthop(&self, prefix: &Prefix, face: FaceId) -> Result<(), MapMeError> {
        if !self.faces.is_valid(face) {
            return Err(MapMeError::FaceInvalid(face));
        }
        if self.table.write().entry(*prefix).or_default().insert(face) {
            debug!("Installed adjacency {} -> {}", prefix, face);
        }
        Ok(())
    }

    fn remove_nexthop(&self, prefix: &Prefix, face: FaceId) {
        let mut table = self.table.write();
        if let Some(faces) = table.get_mut(prefix) {
            if faces.remove(&face) {
                trace!("Removed adjacency {} -> {}", prefix, face);
            }
            if faces.is_empty() {
                table.remove(prefix);
            }
        }
    }
}
