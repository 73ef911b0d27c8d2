use std::any::TypeId;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use rowmap_api::scan::{FieldDef, FieldKind, Layout, Scan, ScanKind};

use crate::normalize::NameNormalizer;

/// Structural address of a field: declaration positions from the outer
/// struct down through flattened structs. Empty path = no such field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Traversal {
    path: Vec<usize>,
    leaf: Option<usize>,
}

impl Traversal {
    /// Sentinel for a name with no matching field.
    pub fn missing() -> Self {
        Self { path: Vec::new(), leaf: None }
    }

    pub fn path(&self) -> &[usize] {
        &self.path
    }

    /// Ordinal of the field in binding order, `None` when missing.
    pub fn leaf(&self) -> Option<usize> {
        self.leaf
    }

    pub fn is_missing(&self) -> bool {
        self.path.is_empty()
    }
}

/// One mappable field of a composite type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldInfo {
    /// Canonical name (rename, or normalized declared name).
    pub name: String,
    /// Identifier as declared.
    pub declared: &'static str,
    pub path: Vec<usize>,
    /// Position in binding order; equals the index in [`StructureMap::fields`].
    pub leaf: usize,
}

/// Memoized structure of one type: canonical name → traversal, and the
/// fields in path order.
#[derive(Debug)]
pub struct StructureMap {
    type_name: &'static str,
    kind: ScanKind,
    fields: Vec<FieldInfo>,
    by_name: HashMap<String, usize>,
}

impl StructureMap {
    /// Walk `layout` and compute every field's path and canonical name.
    ///
    /// Duplicate canonical names: the first declared field wins.
    pub fn build(layout: &Layout, normalizer: &NameNormalizer) -> Self {
        let mut map = Self {
            type_name: layout.type_name(),
            kind: layout.kind(),
            fields: Vec::new(),
            by_name: HashMap::new(),
        };
        if let Layout::Composite { fields, .. } = layout {
            let mut prefix = Vec::new();
            map.walk(fields, &mut prefix, normalizer);
        }
        map
    }

    fn walk(&mut self, defs: &[FieldDef], prefix: &mut Vec<usize>, normalizer: &NameNormalizer) {
        for (position, def) in defs.iter().enumerate() {
            if def.skip {
                continue;
            }
            prefix.push(position);
            match def.kind {
                FieldKind::Flatten(nested) => match nested() {
                    Layout::Composite { fields, .. } => self.walk(&fields, prefix, normalizer),
                    _ => self.leaf(def, prefix, normalizer),
                },
                FieldKind::Value => self.leaf(def, prefix, normalizer),
            }
            prefix.pop();
        }
    }

    fn leaf(&mut self, def: &FieldDef, path: &[usize], normalizer: &NameNormalizer) {
        let name = match def.rename {
            Some(rename) => rename.to_string(),
            None => normalizer.normalize(def.name),
        };
        let leaf = self.fields.len();
        if let Entry::Vacant(slot) = self.by_name.entry(name.clone()) {
            slot.insert(leaf);
        }
        self.fields.push(FieldInfo {
            name,
            declared: def.name,
            path: path.to_vec(),
            leaf,
        });
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn kind(&self) -> ScanKind {
        self.kind
    }

    /// Number of mappable fields (binding order length).
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Fields in path order.
    pub fn fields(&self) -> &[FieldInfo] {
        &self.fields
    }

    /// Canonical names in path order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    pub fn field(&self, name: &str) -> Option<&FieldInfo> {
        self.by_name.get(name).map(|&i| &self.fields[i])
    }

    pub fn traversal(&self, name: &str) -> Traversal {
        match self.field(name) {
            Some(field) => Traversal {
                path: field.path.clone(),
                leaf: Some(field.leaf),
            },
            None => Traversal::missing(),
        }
    }

    /// One traversal per name, positionally aligned; unknown names get
    /// [`Traversal::missing`].
    pub fn traversals_by_names<S: AsRef<str>>(&self, names: &[S]) -> Vec<Traversal> {
        names.iter().map(|n| self.traversal(n.as_ref())).collect()
    }
}

struct CacheState {
    normalizer: NameNormalizer,
    /// Bumped on every normalizer replacement.
    generation: u64,
    maps: HashMap<TypeId, Arc<StructureMap>>,
}

/// Per-type structure cache, keyed by type identity.
///
/// Lookups share a read lock. A miss computes the map outside the lock and
/// inserts it if still absent, so every caller sees the same `Arc`.
pub struct StructureCache {
    state: RwLock<CacheState>,
}

impl std::fmt::Debug for StructureCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let guard = self.read();
        f.debug_struct("StructureCache")
            .field("normalizer", &guard.normalizer)
            .field("generation", &guard.generation)
            .field("types", &guard.maps.len())
            .finish()
    }
}

impl Default for StructureCache {
    fn default() -> Self {
        Self::new(NameNormalizer::default())
    }
}

impl StructureCache {
    pub fn new(normalizer: NameNormalizer) -> Self {
        Self {
            state: RwLock::new(CacheState {
                normalizer,
                generation: 0,
                maps: HashMap::new(),
            }),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, CacheState> {
        match self.state.read() {
            Ok(g) => g,
            Err(poisoned) => {
                tracing::warn!("structure cache read lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, CacheState> {
        match self.state.write() {
            Ok(g) => g,
            Err(poisoned) => {
                tracing::warn!("structure cache write lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    /// Structure map of `T`, computed on first request.
    pub fn resolve<T: Scan>(&self) -> Arc<StructureMap> {
        let key = T::type_key();
        loop {
            let (normalizer, generation) = {
                let guard = self.read();
                if let Some(map) = guard.maps.get(&key) {
                    return Arc::clone(map);
                }
                (guard.normalizer.clone(), guard.generation)
            };

            let computed = StructureMap::build(&T::layout(), &normalizer);

            let mut guard = self.write();
            if guard.generation != generation {
                // Normalizer replaced while computing; the result is stale.
                continue;
            }
            return match guard.maps.entry(key) {
                Entry::Occupied(existing) => Arc::clone(existing.get()),
                Entry::Vacant(slot) => {
                    tracing::debug!(
                        type_name = computed.type_name(),
                        kind = ?computed.kind(),
                        fields = computed.len(),
                        normalizer = normalizer.label(),
                        "resolved structure map"
                    );
                    Arc::clone(slot.insert(Arc::new(computed)))
                }
            };
        }
    }

    /// Positionally aligned traversals of `names` through `T`.
    pub fn traversals_by_names<T: Scan, S: AsRef<str>>(&self, names: &[S]) -> Vec<Traversal> {
        self.resolve::<T>().traversals_by_names(names)
    }

    /// Install a new normalizer and drop every cached map in the same
    /// critical section.
    pub fn set_normalizer(&self, normalizer: NameNormalizer) {
        let mut guard = self.write();
        tracing::debug!(
            from = guard.normalizer.label(),
            to = normalizer.label(),
            dropped = guard.maps.len(),
            "name normalizer replaced"
        );
        guard.normalizer = normalizer;
        guard.generation += 1;
        guard.maps.clear();
    }

    pub fn normalizer(&self) -> NameNormalizer {
        self.read().normalizer.clone()
    }

    /// Number of cached types.
    pub fn len(&self) -> usize {
        self.read().maps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().maps.is_empty()
    }
}
