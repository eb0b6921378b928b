//! Labeled sample store backing both classifier output decoding and training
//! data capture.
//!
//! Poses and gestures live in two independent namespaces. Each entry maps a
//! name to a stable index (the training label and classifier output slot)
//! and the feature vectors recorded for it. Every mutation rewrites the whole
//! store to disk.

use std::{
    collections::BTreeMap,
    fmt, fs,
    path::{Path, PathBuf},
    str::FromStr,
    sync::{Arc, Mutex, MutexGuard},
};

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

pub const STORE_FILE_NAME: &str = "PoseGestureData.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SampleKind {
    Pose,
    Gesture,
}

impl fmt::Display for SampleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SampleKind::Pose => "pose",
            SampleKind::Gesture => "gesture",
        })
    }
}

impl FromStr for SampleKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pose" | "poses" => Ok(SampleKind::Pose),
            "gesture" | "gestures" => Ok(SampleKind::Gesture),
            other => Err(format!("expected pose or gesture, got '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabeledSample {
    pub index: usize,
    #[serde(default)]
    pub data: Vec<Vec<f32>>,
}

/// On-disk layout of the store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreData {
    #[serde(default)]
    pub poses: BTreeMap<String, LabeledSample>,
    #[serde(default)]
    pub gestures: BTreeMap<String, LabeledSample>,
}

impl StoreData {
    fn namespace(&self, kind: SampleKind) -> &BTreeMap<String, LabeledSample> {
        match kind {
            SampleKind::Pose => &self.poses,
            SampleKind::Gesture => &self.gestures,
        }
    }

    fn namespace_mut(&mut self, kind: SampleKind) -> &mut BTreeMap<String, LabeledSample> {
        match kind {
            SampleKind::Pose => &mut self.poses,
            SampleKind::Gesture => &mut self.gestures,
        }
    }
}

/// Pose samples flattened into parallel input/label arrays.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TrainingSet {
    pub inputs: Vec<Vec<f32>>,
    pub labels: Vec<usize>,
}

pub type SharedStore = Arc<Mutex<SampleStore>>;

/// Locks a shared store. A poisoned lock is recovered: each mutation is
/// applied and persisted as a whole, so the data is still consistent.
pub fn lock(store: &SharedStore) -> MutexGuard<'_, SampleStore> {
    store.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Debug, Clone, Default)]
pub struct SampleStore {
    data: StoreData,
    path: Option<PathBuf>,
}

impl SampleStore {
    /// Store without a backing file.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Loads the store at `path`; a missing or unreadable file yields an
    /// empty store that will be written there on the first mutation.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let data = match fs::read_to_string(&path) {
            Ok(txt) => match serde_json::from_str::<StoreData>(&txt) {
                Ok(data) => {
                    info!(
                        "loaded {} poses and {} gestures from {}",
                        data.poses.len(),
                        data.gestures.len(),
                        path.display()
                    );
                    data
                }
                Err(e) => {
                    warn!("ignoring corrupt store {}: {e}", path.display());
                    StoreData::default()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => StoreData::default(),
            Err(e) => {
                warn!("failed to read {}: {e}; starting empty", path.display());
                StoreData::default()
            }
        };
        Self {
            data,
            path: Some(path),
        }
    }

    pub fn into_shared(self) -> SharedStore {
        Arc::new(Mutex::new(self))
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn data(&self) -> &StoreData {
        &self.data
    }

    pub fn to_json(&self) -> Result<String, StoreError> {
        Ok(serde_json::to_string_pretty(&self.data)?)
    }

    pub fn from_json(txt: &str) -> Result<Self, StoreError> {
        Ok(Self {
            data: serde_json::from_str(txt)?,
            path: None,
        })
    }

    // ---------- queries ----------

    pub fn get(&self, kind: SampleKind, name: &str) -> Option<&LabeledSample> {
        self.data.namespace(kind).get(name)
    }

    pub fn names(&self, kind: SampleKind) -> Vec<String> {
        self.data.namespace(kind).keys().cloned().collect()
    }

    pub fn len(&self, kind: SampleKind) -> usize {
        self.data.namespace(kind).len()
    }

    /// A classifier needs at least two classes to mean anything.
    pub fn has_enough_classes(&self, kind: SampleKind) -> bool {
        self.len(kind) > 1
    }

    pub fn index_to_name(&self, kind: SampleKind, index: usize) -> Option<&str> {
        self.data
            .namespace(kind)
            .iter()
            .find(|(_, s)| s.index == index)
            .map(|(name, _)| name.as_str())
    }

    pub fn name_to_index(&self, kind: SampleKind, name: &str) -> Option<usize> {
        self.get(kind, name).map(|s| s.index)
    }

    /// Flattens every pose sample into parallel input and label arrays.
    pub fn assemble_training_set(&self) -> TrainingSet {
        let mut set = TrainingSet::default();
        for sample in self.data.poses.values() {
            for vector in &sample.data {
                set.inputs.push(vector.clone());
                set.labels.push(sample.index);
            }
        }
        set
    }

    // ---------- mutations ----------

    /// Adds a new label at the lowest free index, or enhances an existing one.
    /// Returns the label's index.
    pub fn add(
        &mut self,
        kind: SampleKind,
        name: &str,
        vectors: Vec<Vec<f32>>,
    ) -> Result<usize, StoreError> {
        if let Some(index) = self.name_to_index(kind, name) {
            self.enhance(kind, name, vectors)?;
            return Ok(index);
        }
        let mut next = self.data.clone();
        let ns = next.namespace_mut(kind);
        let mut index = 0;
        while ns.values().any(|s| s.index == index) {
            index += 1;
        }
        ns.insert(
            name.to_string(),
            LabeledSample {
                index,
                data: vectors,
            },
        );
        self.commit(next)?;
        info!("added {kind} '{name}' at index {index}");
        Ok(index)
    }

    /// Appends `vectors` to an existing label.
    pub fn enhance(
        &mut self,
        kind: SampleKind,
        name: &str,
        vectors: Vec<Vec<f32>>,
    ) -> Result<(), StoreError> {
        let mut next = self.data.clone();
        entry_mut(&mut next, kind, name)?.data.extend(vectors);
        self.commit(next)
    }

    /// Replaces the samples of an existing label.
    pub fn retrain(
        &mut self,
        kind: SampleKind,
        name: &str,
        vectors: Vec<Vec<f32>>,
    ) -> Result<(), StoreError> {
        let mut next = self.data.clone();
        entry_mut(&mut next, kind, name)?.data = vectors;
        self.commit(next)
    }

    /// Removes a label. When it did not hold the highest index, the label that
    /// did takes over the freed index. Returns whether anything was removed.
    pub fn delete(&mut self, kind: SampleKind, name: &str) -> Result<bool, StoreError> {
        let mut next = self.data.clone();
        let ns = next.namespace_mut(kind);
        let Some(removed) = ns.remove(name) else {
            return Ok(false);
        };
        let mut moved = None;
        if let Some((max_name, max_entry)) = ns.iter_mut().max_by_key(|(_, s)| s.index) {
            if max_entry.index > removed.index {
                moved = Some((max_name.clone(), max_entry.index));
                max_entry.index = removed.index;
            }
        }
        self.commit(next)?;
        if let Some((max_name, from)) = moved {
            info!("{kind} '{max_name}' moves from index {from} to {}", removed.index);
        }
        info!("deleted {kind} '{name}'");
        Ok(true)
    }

    pub fn reset_kind(&mut self, kind: SampleKind) -> Result<(), StoreError> {
        let mut next = self.data.clone();
        next.namespace_mut(kind).clear();
        self.commit(next)
    }

    pub fn reset(&mut self) -> Result<(), StoreError> {
        self.commit(StoreData::default())
    }

    /// Writes the store out even if nothing changed.
    pub fn flush(&self) -> Result<(), StoreError> {
        self.persist(&self.data)
    }

    /// Persists `next` and only then makes it the live data, so a failed
    /// write leaves memory matching the disk.
    fn commit(&mut self, next: StoreData) -> Result<(), StoreError> {
        self.persist(&next)?;
        self.data = next;
        Ok(())
    }

    fn persist(&self, data: &StoreData) -> Result<(), StoreError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let io_err = |source| StoreError::Io {
            path: path.clone(),
            source,
        };
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(io_err)?;
        }
        let json = serde_json::to_string_pretty(data)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json).map_err(io_err)?;
        fs::rename(&tmp, path).map_err(io_err)?;
        Ok(())
    }
}

fn entry_mut<'a>(
    data: &'a mut StoreData,
    kind: SampleKind,
    name: &str,
) -> Result<&'a mut LabeledSample, StoreError> {
    data.namespace_mut(kind)
        .get_mut(name)
        .ok_or_else(|| StoreError::UnknownLabel {
            kind,
            name: name.to_string(),
        })
}
