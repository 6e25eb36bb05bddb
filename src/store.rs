//! Artifact store boundary
//!
//! The core hands finished outputs to an [`ArtifactStore`] and never dictates
//! retention: the surrounding deployment owns durability and cleanup. The
//! in-memory implementation is the in-process default and the test double.

use std::collections::HashMap;
use std::sync::RwLock;
use uuid::Uuid;

/// One encoded output of a succeeded job
#[derive(Debug, Clone)]
pub struct Artifact {
    pub name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Storage boundary for finished job outputs
pub trait ArtifactStore: Send + Sync {
    /// Store all outputs of a job, replacing any previous set
    fn put(&self, job_id: Uuid, artifacts: Vec<Artifact>);

    /// Retrieve a job's outputs, if still retained
    fn get(&self, job_id: Uuid) -> Option<Vec<Artifact>>;

    /// Drop a job's outputs
    fn evict(&self, job_id: Uuid);
}

/// In-memory artifact store
#[derive(Default)]
pub struct MemoryArtifactStore {
    artifacts: RwLock<HashMap<Uuid, Vec<Artifact>>>,
}

impl MemoryArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ArtifactStore for MemoryArtifactStore {
    fn put(&self, job_id: Uuid, artifacts: Vec<Artifact>) {
        self.artifacts.write().unwrap().insert(job_id, artifacts);
    }

    fn get(&self, job_id: Uuid) -> Option<Vec<Artifact>> {
        self.artifacts.read().unwrap().get(&job_id).cloned()
    }

    fn evict(&self, job_id: Uuid) {
        self.artifacts.write().unwrap().remove(&job_id);
    }
}
