//! The vertex identity index: a disjoint-set-like map from vertex ids to
//! position "masters", used to answer welding and adjacency queries after
//! a Boolean call.

use crate::float_types::{EPSILON, Real};
use hashbrown::HashMap;
use nalgebra::Point3;

#[derive(Debug, Clone)]
struct Entry {
    id: usize,
    pos: Point3<Real>,
    /// Entry slot of this vertex's master, or `None` when it is a master
    /// itself.
    master: Option<usize>,
}

/// Per-vertex position identity. Each registered vertex is either its own
/// master or a slave of the earliest vertex found within epsilon of its
/// position; removal promotes the first remaining slave.
#[derive(Debug, Clone)]
pub struct WeldIndex {
    entries: Vec<Option<Entry>>,
    /// Entry slots of the current masters.
    masters: Vec<usize>,
    by_id: HashMap<usize, usize>,
    epsilon: Real,
}

impl Default for WeldIndex {
    fn default() -> Self {
        Self::new(EPSILON)
    }
}

impl WeldIndex {
    pub fn new(epsilon: Real) -> Self {
        WeldIndex {
            entries: Vec::new(),
            masters: Vec::new(),
            by_id: HashMap::new(),
            epsilon,
        }
    }

    /// Number of registered vertices.
    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    /// Register a vertex. Registering an id twice is a no-op.
    pub fn register(&mut self, id: usize, pos: Point3<Real>) {
        if self.by_id.contains_key(&id) {
            return;
        }
        let eps2 = self.epsilon * self.epsilon;
        let slot = self.entries.len();
        for &m in &self.masters {
            let master = self.entries[m].as_ref().expect("master slot occupied");
            if (master.pos - pos).norm_squared() < eps2 {
                self.entries.push(Some(Entry {
                    id,
                    pos,
                    master: Some(m),
                }));
                self.by_id.insert(id, slot);
                return;
            }
        }
        self.entries.push(Some(Entry {
            id,
            pos,
            master: None,
        }));
        self.masters.push(slot);
        self.by_id.insert(id, slot);
    }

    /// Unlink a vertex. Removing a master promotes its first remaining
    /// slave; removing an unknown id is a no-op.
    pub fn remove(&mut self, id: usize) {
        let Some(slot) = self.by_id.remove(&id) else {
            return;
        };
        let entry = self.entries[slot].take().expect("registered slot occupied");
        if entry.master.is_some() {
            return;
        }
        self.masters.retain(|&m| m != slot);
        let mut promoted: Option<usize> = None;
        for (s, candidate) in self.entries.iter_mut().enumerate() {
            if let Some(candidate) = candidate {
                if candidate.master == Some(slot) {
                    match promoted {
                        None => {
                            candidate.master = None;
                            promoted = Some(s);
                        },
                        Some(p) => candidate.master = Some(p),
                    }
                }
            }
        }
        if let Some(p) = promoted {
            self.masters.push(p);
        }
    }

    /// The id of the vertex's position master (its own id when it is a
    /// master), or `None` for an unregistered id.
    pub fn master_of(&self, id: usize) -> Option<usize> {
        let slot = *self.by_id.get(&id)?;
        let entry = self.entries[slot].as_ref()?;
        match entry.master {
            None => Some(id),
            Some(m) => self.entries[m].as_ref().map(|master| master.id),
        }
    }

    /// All other registered ids sharing this vertex's position master.
    pub fn matches(&self, id: usize) -> Vec<usize> {
        let Some(&slot) = self.by_id.get(&id) else {
            return Vec::new();
        };
        let Some(entry) = self.entries[slot].as_ref() else {
            return Vec::new();
        };
        let master_slot = entry.master.unwrap_or(slot);
        self.entries
            .iter()
            .enumerate()
            .filter_map(|(s, e)| e.as_ref().map(|e| (s, e)))
            .filter(|&(s, e)| (s == master_slot || e.master == Some(master_slot)) && e.id != id)
            .map(|(_, e)| e.id)
            .collect()
    }

    /// Start offsets of the triangles in `indices[start..]` that touch
    /// every seed (a vertex, edge or whole triangle given as 1-3 ids),
    /// resolving each seed through its matches so co-located vertices
    /// count as one adjacency node.
    pub fn connected_triangles(
        &self,
        seeds: &[usize],
        indices: &[u32],
        start: usize,
    ) -> Vec<usize> {
        let groups: Vec<Vec<usize>> = seeds
            .iter()
            .map(|&seed| {
                let mut group = self.matches(seed);
                group.push(seed);
                group
            })
            .collect();

        let mut connected = Vec::new();
        let mut off = start;
        while off + 3 <= indices.len() {
            let corners = [
                indices[off] as usize,
                indices[off + 1] as usize,
                indices[off + 2] as usize,
            ];
            let hit = groups
                .iter()
                .all(|group| corners.iter().any(|c| group.contains(c)));
            if hit {
                connected.push(off);
            }
            off += 3;
        }
        connected
    }

    /// Ids reachable from `id` through a shared triangle corner, resolved
    /// through masters and deduplicated. The seed's own identity group is
    /// excluded.
    pub fn connected_vertices(&self, id: usize, indices: &[u32], start: usize) -> Vec<usize> {
        let own_master = self.master_of(id).unwrap_or(id);
        let mut connected = Vec::new();
        for off in self.connected_triangles(&[id], indices, start) {
            for l in 0..3 {
                let corner = indices[off + l] as usize;
                let resolved = self.master_of(corner).unwrap_or(corner);
                if resolved != own_master && !connected.contains(&resolved) {
                    connected.push(resolved);
                }
            }
        }
        connected
    }
}
