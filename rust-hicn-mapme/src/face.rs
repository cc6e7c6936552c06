//! Face table interface and reference-counted face locks.
//!
//! The face table is owned outside of MAP-Me; forwarding entries only hold
//! counted references on the faces they point to. A reference is a
//! [`FaceLock`]: acquiring it locks the face, dropping it unlocks it, so the
//! lock count of a face always matches the number of next-hop slots that
//! refer to it.

use log::{debug, warn};
use parking_lot::RwLock;
use rust_hicn_common::types::{FaceId, FaceKind, FaceProto};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use crate::error::MapMeError;

/// What MAP-Me needs to know about a face.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FaceDescriptor {
    pub id: FaceId,
    pub kind: FaceKind,
    pub proto: FaceProto,
}

/// Reference-counting access to the external face table.
pub trait FaceTable: Send + Sync {
    /// Take a reference on `face`.
    fn lock(&self, face: FaceId) -> Result<(), MapMeError>;

    /// Release a reference on `face`. Releasing the last one lets the owner
    /// tear the face down.
    fn unlock(&self, face: FaceId);

    fn get(&self, face: FaceId) -> Option<FaceDescriptor>;

    fn is_valid(&self, face: FaceId) -> bool {
        self.get(face).is_some()
    }
}

/// A counted reference on a face, released on drop.
pub struct FaceLock {
    face: FaceId,
    table: Arc<dyn FaceTable>,
}

impl FaceLock {
    pub fn acquire(table: &Arc<dyn FaceTable>, face: FaceId) -> Result<Self, MapMeError> {
        table.lock(face)?;
        Ok(Self {
            face,
            table: Arc::clone(table),
        })
    }

    pub fn face(&self) -> FaceId {
        self.face
    }
}

impl Drop for FaceLock {
    fn drop(&mut self) {
        self.table.unlock(self.face);
    }
}

impl fmt::Debug for FaceLock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("FaceLock").field(&self.face.0).finish()
    }
}

/* ---------------------------------------------------------------- *
 * In-memory face table
 * ---------------------------------------------------------------- */

#[derive(Debug)]
struct FaceSlot {
    descriptor: FaceDescriptor,
    locks: AtomicU32,
}

/// In-memory face table used by the CLI and the tests.
#[derive(Debug, Default)]
pub struct Faces {
    slots: RwLock<HashMap<FaceId, FaceSlot>>,
    next_id: AtomicU32,
}

impl Faces {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a face. The caller owns the single initial reference.
    pub fn create(&self, kind: FaceKind, proto: FaceProto) -> FaceId {
        let id = FaceId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let descriptor = FaceDescriptor { id, kind, proto };
        self.slots.write().insert(
            id,
            FaceSlot {
                descriptor,
                locks: AtomicU32::new(1),
            },
        );
        debug!("Created {} face {}", kind, id);
        id
    }

    /// Current number of references on `face`, `None` once torn down.
    pub fn locks(&self, face: FaceId) -> Option<u32> {
        self.slots
            .read()
            .get(&face)
            .map(|slot| slot.locks.load(Ordering::Acquire))
    }

    /// Tear a face down regardless of outstanding references.
    pub fn remove(&self, face: FaceId) -> bool {
        self.slots.write().remove(&face).is_some()
    }

    pub fn len(&self) -> usize {
        self.slots.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.read().is_empty()
    }
}

impl FaceTable for Faces {
    fn lock(&self, face: FaceId) -> Result<(), MapMeError> {
        let slots = self.slots.read();
        let slot = slots.get(&face).ok_or(MapMeError::FaceInvalid(face))?;
        slot.locks.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }

    fn unlock(&self, face: FaceId) {
        let remaining = {
            let slots = self.slots.read();
            let Some(slot) = slots.get(&face) else {
                debug!("Unlock of torn down face {}", face);
                return;
            };
            match slot
                .locks
                .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
            {
                Ok(previous) => previous - 1,
                Err(_) => {
                    warn!("Unbalanced unlock of face {}", face);
                    return;
                }
            }
        };

        if remaining == 0 {
            let mut slots = self.slots.write();
            // Somebody may have locked it again in between.
            let unused = slots
                .get(&face)
                .map_or(false, |slot| slot.locks.load(Ordering::Acquire) == 0);
            if unused {
                slots.remove(&face);
                debug!("Face {} released its last lock, tearing down", face);
            }
        }
    }

    fn get(&self, face: FaceId) -> Option<FaceDescriptor> {
        self.slots.read().get(&face).map(|slot| slot.descriptor)
    }
}
