use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::mpsc::{self, Receiver, Sender};

use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};

use crate::{LoopscapeError, Result, Rgb};

pub type GroupId = u64;

/// Request for a shape outline file to be loaded at runtime.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ShapeAsset {
    pub path: String,
    pub scale: f32,
    pub position: Vec3,
    /// Overrides the palette colour when set.
    pub color: Option<Rgb>,
    pub opacity: f32,
    /// Recentre the outlines on their own bounding box.
    pub center: bool,
}

impl Default for ShapeAsset {
    fn default() -> Self {
        Self {
            path: String::new(),
            scale: 1.0,
            position: Vec3::ZERO,
            color: None,
            opacity: 0.3,
            center: true,
        }
    }
}

/// A loaded, drawable group of outlines.
#[derive(Debug, Clone, PartialEq)]
pub struct ShapeGroup {
    pub id: GroupId,
    pub path: String,
    pub outlines: Vec<Vec<Vec2>>,
    pub position: Vec3,
    pub color: Option<Rgb>,
    pub opacity: f32,
}

struct LoadOutcome {
    id: GroupId,
    result: Result<Vec<Vec<Vec2>>>,
}

/// One-shot handle a loader resolves exactly once, from any thread.
pub struct LoadCompletion {
    id: GroupId,
    sender: Sender<LoadOutcome>,
}

impl LoadCompletion {
    pub fn id(&self) -> GroupId {
        self.id
    }

    pub fn resolve(self, result: Result<Vec<Vec<Vec2>>>) {
        // The store may already be gone at shutdown; nothing to deliver to.
        let _ = self.sender.send(LoadOutcome {
            id: self.id,
            result,
        });
    }
}

impl std::fmt::Debug for LoadCompletion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadCompletion").field("id", &self.id).finish()
    }
}

/// Loads shape outlines. Implementations may complete synchronously or hand
/// the work to another thread; there is no cancellation and no retry.
pub trait AssetLoader {
    fn load(&self, request: ShapeAsset, completion: LoadCompletion);
}

/// Reads JSON outline files (`{"outlines": [[[x, y], ...], ...]}`) on a
/// background thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct OutlineFileLoader;

impl AssetLoader for OutlineFileLoader {
    fn load(&self, request: ShapeAsset, completion: LoadCompletion) {
        std::thread::spawn(move || completion.resolve(read_outlines(&request)));
    }
}

#[derive(Deserialize)]
struct OutlineFile {
    outlines: Vec<Vec<[f32; 2]>>,
}

/// Parses, scales and optionally recentres the outlines named by `asset`.
pub fn read_outlines(asset: &ShapeAsset) -> Result<Vec<Vec<Vec2>>> {
    let raw = std::fs::read_to_string(Path::new(&asset.path))
        .map_err(|err| LoopscapeError::asset(&asset.path, err.to_string()))?;
    let file: OutlineFile = serde_json::from_str(&raw)
        .map_err(|err| LoopscapeError::asset(&asset.path, err.to_string()))?;

    if file.outlines.is_empty() {
        return Err(LoopscapeError::asset(&asset.path, "file contains no outlines"));
    }
    let mut outlines = Vec::with_capacity(file.outlines.len());
    for (index, outline) in file.outlines.iter().enumerate() {
        if outline.len() < 2 {
            return Err(LoopscapeError::asset(
                &asset.path,
                format!("outline {index} has fewer than two points"),
            ));
        }
        let points: Vec<Vec2> = outline.iter().map(|&p| Vec2::from(p) * asset.scale).collect();
        if points.iter().any(|p| !p.is_finite()) {
            return Err(LoopscapeError::asset(
                &asset.path,
                format!("outline {index} contains a non-finite point"),
            ));
        }
        outlines.push(points);
    }

    if asset.center {
        let (min, max) = outlines.iter().flatten().fold(
            (Vec2::splat(f32::INFINITY), Vec2::splat(f32::NEG_INFINITY)),
            |(min, max), &p| (min.min(p), max.max(p)),
        );
        let middle = (min + max) * 0.5;
        for point in outlines.iter_mut().flatten() {
            *point -= middle;
        }
    }

    Ok(outlines)
}

/// Registry of loaded shape groups plus the queue of loads still in flight.
///
/// Completions are only picked up by [`AssetStore::drain`], which the engine
/// calls at the start of a tick.
#[derive(Debug)]
pub struct AssetStore {
    sender: Sender<LoadOutcome>,
    receiver: Receiver<LoadOutcome>,
    pending: HashMap<GroupId, ShapeAsset>,
    groups: BTreeMap<GroupId, ShapeGroup>,
    next_id: GroupId,
}

impl Default for AssetStore {
    fn default() -> Self {
        Self::new()
    }
}

impl AssetStore {
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::channel();
        Self {
            sender,
            receiver,
            pending: HashMap::new(),
            groups: BTreeMap::new(),
            next_id: 1,
        }
    }

    /// Starts loading `asset` and returns the id the group will be registered
    /// under if the load succeeds.
    pub fn request(&mut self, loader: &dyn AssetLoader, asset: ShapeAsset) -> GroupId {
        let id = self.next_id;
        self.next_id += 1;
        self.pending.insert(id, asset.clone());
        tracing::debug!(id, path = %asset.path, "requested shape asset");
        loader.load(
            asset,
            LoadCompletion {
                id,
                sender: self.sender.clone(),
            },
        );
        id
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Registers every load that completed since the last call and returns
    /// the ids of the new groups. Failed loads are logged and dropped.
    pub fn drain(&mut self) -> Vec<GroupId> {
        let mut registered = Vec::new();
        while let Ok(outcome) = self.receiver.try_recv() {
            let Some(asset) = self.pending.remove(&outcome.id) else {
                continue;
            };
            match outcome.result {
                Ok(outlines) => {
                    tracing::debug!(id = outcome.id, path = %asset.path, "registered shape group");
                    self.groups.insert(
                        outcome.id,
                        ShapeGroup {
                            id: outcome.id,
                            path: asset.path,
                            outlines,
                            position: asset.position,
                            color: asset.color,
                            opacity: asset.opacity,
                        },
                    );
                    registered.push(outcome.id);
                }
                Err(err) => {
                    tracing::warn!(id = outcome.id, error = %err, "shape asset failed to load");
                }
            }
        }
        registered
    }

    pub fn group(&self, id: GroupId) -> Option<&ShapeGroup> {
        self.groups.get(&id)
    }

    pub fn groups(&self) -> impl Iterator<Item = &ShapeGroup> {
        self.groups.values()
    }

    /// Removes a registered group, or abandons a load still in flight so
    /// that its completion is discarded by [`AssetStore::drain`].
    pub fn remove(&mut self, id: GroupId) -> bool {
        let abandoned = self.pending.remove(&id).is_some();
        if abandoned {
            tracing::debug!(id, "abandoned pending shape asset");
        }
        self.groups.remove(&id).is_some() || abandoned
    }

    pub fn set_opacity(&mut self, id: GroupId, opacity: f32) -> bool {
        match self.groups.get_mut(&id) {
            Some(group) => {
                group.opacity = opacity.clamp(0.0, 1.0);
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::time::Duration;

    use super::*;

    /// Resolves on the calling thread with a fixed result.
    struct ImmediateLoader {
        fail: bool,
    }

    impl AssetLoader for ImmediateLoader {
        fn load(&self, request: ShapeAsset, completion: LoadCompletion) {
            if self.fail {
                completion.resolve(Err(LoopscapeError::asset(request.path, "missing")));
            } else {
                completion.resolve(Ok(vec![vec![Vec2::ZERO, Vec2::ONE]]));
            }
        }
    }

    /// Holds completions until the test resolves them.
    #[derive(Default)]
    struct DeferredLoader {
        held: RefCell<Vec<LoadCompletion>>,
    }

    impl AssetLoader for DeferredLoader {
        fn load(&self, _request: ShapeAsset, completion: LoadCompletion) {
            self.held.borrow_mut().push(completion);
        }
    }

    impl DeferredLoader {
        fn finish(&self) {
            for completion in self.held.borrow_mut().drain(..) {
                completion.resolve(Ok(vec![vec![Vec2::ZERO, Vec2::X]]));
            }
        }
    }

    fn asset(path: &str) -> ShapeAsset {
        ShapeAsset {
            path: path.to_string(),
            ..ShapeAsset::default()
        }
    }

    #[test]
    fn completions_wait_for_drain() {
        let mut store = AssetStore::new();
        let id = store.request(&ImmediateLoader { fail: false }, asset("logo.json"));
        assert!(store.group(id).is_none());
        assert_eq!(store.pending(), 1);

        assert_eq!(store.drain(), vec![id]);
        assert_eq!(store.pending(), 0);
        assert_eq!(store.group(id).unwrap().path, "logo.json");
        assert!(store.drain().is_empty());
    }

    #[test]
    fn failed_loads_never_populate_the_registry() {
        let mut store = AssetStore::new();
        store.request(&ImmediateLoader { fail: true }, asset("missing.json"));
        assert!(store.drain().is_empty());
        assert_eq!(store.pending(), 0);
        assert_eq!(store.groups().count(), 0);
    }

    #[test]
    fn groups_support_opacity_updates_and_removal() {
        let mut store = AssetStore::new();
        let id = store.request(&ImmediateLoader { fail: false }, asset("logo.json"));
        store.drain();

        assert!(store.set_opacity(id, 2.0));
        assert_eq!(store.group(id).unwrap().opacity, 1.0);
        assert!(store.remove(id));
        assert!(!store.remove(id));
        assert!(!store.set_opacity(id, 0.5));
    }

    #[test]
    fn removing_a_pending_load_discards_its_completion() {
        let loader = DeferredLoader::default();
        let mut store = AssetStore::new();
        let dropped = store.request(&loader, asset("late.json"));
        let kept = store.request(&loader, asset("kept.json"));

        assert!(store.remove(dropped));
        assert_eq!(store.pending(), 1);

        loader.finish();
        assert_eq!(store.drain(), vec![kept]);
        assert!(store.group(dropped).is_none());
        assert!(store.group(kept).is_some());
    }

    #[test]
    fn reads_scales_and_centres_outline_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("square.json");
        std::fs::write(&path, r#"{ "outlines": [[[0, 0], [2, 0], [2, 2], [0, 2]]] }"#).unwrap();

        let request = ShapeAsset {
            path: path.display().to_string(),
            scale: 2.0,
            center: true,
            ..ShapeAsset::default()
        };
        let outlines = read_outlines(&request).unwrap();
        assert_eq!(outlines[0][0], Vec2::new(-2.0, -2.0));
        assert_eq!(outlines[0][2], Vec2::new(2.0, 2.0));

        let uncentred = read_outlines(&ShapeAsset {
            center: false,
            ..request
        })
        .unwrap();
        assert_eq!(uncentred[0][2], Vec2::new(4.0, 4.0));
    }

    #[test]
    fn rejects_malformed_outline_files() {
        let dir = tempfile::tempdir().unwrap();
        let cases = [
            ("empty.json", r#"{ "outlines": [] }"#),
            ("dot.json", r#"{ "outlines": [[[1, 1]]] }"#),
            ("broken.json", "<svg>"),
        ];
        for (name, body) in cases {
            let path = dir.path().join(name);
            std::fs::write(&path, body).unwrap();
            let err = read_outlines(&asset(&path.display().to_string())).unwrap_err();
            assert!(matches!(err, LoopscapeError::Asset { .. }), "{name}: {err}");
        }
        assert!(read_outlines(&asset("/definitely/not/here.json")).is_err());
    }

    #[test]
    fn file_loader_completes_off_thread() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("line.json");
        std::fs::write(&path, r#"{ "outlines": [[[0, 0], [1, 1]]] }"#).unwrap();

        let mut store = AssetStore::new();
        let id = store.request(&OutlineFileLoader, asset(&path.display().to_string()));

        let mut registered = Vec::new();
        for _ in 0..200 {
            registered = store.drain();
            if !registered.is_empty() {
                break;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(registered, vec![id]);
        assert_eq!(store.group(id).unwrap().outlines[0].len(), 2);
    }
}
