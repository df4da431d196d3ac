//! The shared vertex/index buffer, its cursor stack, and the buffer-level
//! maintenance passes (batch deletion, cleanup, merge, separate).

use crate::errors::CsgError;
use crate::float_types::{EPSILON, Real};
use crate::plane::Plane;
use crate::vertex::Vertex;
use crate::weld::WeldIndex;
use hashbrown::HashSet;
use nalgebra::{Point3, Vector3, Vector4};
use std::ops::Range;

/// A checkpoint of the buffer counts taken when a bracketed sub-mesh scope
/// opens. The stack is monotonically non-decreasing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cursor {
    pub vertices: usize,
    pub indices: usize,
}

/// An indexed triangle mesh: one growable vertex sequence, one index
/// sequence (always a multiple of 3 long), and the cursor stack delimiting
/// procedural sub-mesh scopes.
///
/// All state is instance-local; operations on different `Mesh` instances
/// never share anything, so they are safe to run concurrently. Operations
/// on one instance mutate it in place and must be serialized by the caller.
#[derive(Debug, Clone)]
pub struct Mesh {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
    pub(crate) cursors: Vec<Cursor>,
    pub(crate) epsilon: Real,
    pub(crate) weld: WeldIndex,
}

impl Default for Mesh {
    fn default() -> Self {
        Self::new()
    }
}

impl Mesh {
    /// Create an empty mesh with the default [`EPSILON`] tolerance.
    pub fn new() -> Self {
        Self::with_epsilon(EPSILON)
    }

    /// Create an empty mesh with a custom coincidence/welding tolerance.
    pub fn with_epsilon(epsilon: Real) -> Self {
        Mesh {
            vertices: Vec::new(),
            indices: Vec::new(),
            cursors: Vec::new(),
            epsilon,
            weld: WeldIndex::new(epsilon),
        }
    }

    /// The tolerance governing plane-distance coincidence and welding.
    pub const fn epsilon(&self) -> Real {
        self.epsilon
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// The open scope checkpoints, bottom of the stack first.
    pub fn cursors(&self) -> &[Cursor] {
        &self.cursors
    }

    /// The vertex identity index rebuilt by the last CSG/merge call.
    pub const fn weld_index(&self) -> &WeldIndex {
        &self.weld
    }

    /// Append a vertex record; returns its index.
    pub fn add_vertex(
        &mut self,
        pos: Point3<Real>,
        normal: Vector3<Real>,
        color: Vector4<Real>,
    ) -> u32 {
        self.vertices.push(Vertex::new(pos, normal, color));
        (self.vertices.len() - 1) as u32
    }

    /// Clone the vertex record at `id` as a fresh vertex; returns the
    /// clone's index.
    pub fn duplicate_vertex(&mut self, id: u32) -> u32 {
        let vertex = self.vertices[id as usize];
        self.vertices.push(vertex);
        (self.vertices.len() - 1) as u32
    }

    /// Append one triangle as three vertex indices.
    pub fn add_triangle(&mut self, a: u32, b: u32, c: u32) {
        debug_assert!((a as usize) < self.vertices.len());
        debug_assert!((b as usize) < self.vertices.len());
        debug_assert!((c as usize) < self.vertices.len());
        self.indices.extend([a, b, c]);
    }

    /// Open a bracketed sub-mesh scope, checkpointing the current counts.
    pub fn open_scope(&mut self) {
        self.cursors.push(Cursor {
            vertices: self.vertices.len(),
            indices: self.indices.len(),
        });
    }

    /// Close the innermost scope. A close without a matching open is a
    /// silent no-op.
    pub fn close_scope(&mut self) {
        self.cursors.pop();
    }

    /// `true` when the buffer upholds its structural invariants: index
    /// count a multiple of 3, every index in bounds, cursors a
    /// non-decreasing stack within bounds.
    pub fn is_well_formed(&self) -> bool {
        if self.indices.len() % 3 != 0 {
            return false;
        }
        if !self.indices.iter().all(|&i| (i as usize) < self.vertices.len()) {
            return false;
        }
        let mut prev = Cursor { vertices: 0, indices: 0 };
        for cursor in &self.cursors {
            if cursor.vertices < prev.vertices
                || cursor.indices < prev.indices
                || cursor.vertices > self.vertices.len()
                || cursor.indices > self.indices.len()
            {
                return false;
            }
            prev = *cursor;
        }
        true
    }

    /// Recompute the stored normals of every triangle in the index range
    /// `range` from its winding, overwriting the normals of the referenced
    /// vertices. Degenerate triangles are left alone.
    pub fn set_face_normals(&mut self, range: Range<usize>) {
        let mut off = range.start;
        while off + 3 <= range.end {
            let [a, b, c] = [
                self.indices[off] as usize,
                self.indices[off + 1] as usize,
                self.indices[off + 2] as usize,
            ];
            if let Some(plane) = Plane::from_points(
                &self.vertices[a].pos,
                &self.vertices[b].pos,
                &self.vertices[c].pos,
                self.epsilon,
            ) {
                let normal = plane.normal();
                self.vertices[a].normal = normal;
                self.vertices[b].normal = normal;
                self.vertices[c].normal = normal;
            }
            off += 3;
        }
    }

    /// Remove every triangle whose start offset appears in `offsets`.
    ///
    /// Offsets may arrive unordered and duplicated; they are deduplicated
    /// and removed back to front so earlier removals never invalidate
    /// later offsets. The top cursor (if any) is rewritten to the new
    /// end-of-buffer counts. An offset past the buffer end fails fast with
    /// [`CsgError::TriangleOutOfRange`].
    pub fn delete_triangles<I>(&mut self, offsets: I) -> Result<(), CsgError>
    where
        I: IntoIterator<Item = usize>,
    {
        let dedup: HashSet<usize> = offsets.into_iter().collect();
        let mut sorted: Vec<usize> = dedup.into_iter().collect();
        sorted.sort_unstable_by(|a, b| b.cmp(a));
        for off in sorted {
            if off + 3 > self.indices.len() {
                return Err(CsgError::TriangleOutOfRange {
                    offset: off,
                    len: self.indices.len(),
                });
            }
            self.indices.drain(off..off + 3);
        }
        let (vcount, icount) = (self.vertices.len(), self.indices.len());
        if let Some(top) = self.cursors.last_mut() {
            top.vertices = vcount;
            top.indices = icount;
        }
        Ok(())
    }

    /// Drop triangles with two corners on the same spot, then compact away
    /// unreferenced vertices, remapping indices and cursor checkpoints.
    pub fn vertices_cleanup(&mut self) {
        // 1: remove triangles with two corners on each other
        let old_indices = std::mem::take(&mut self.indices);
        let mut index_live = Vec::with_capacity(old_indices.len());
        for tri in old_indices.chunks_exact(3) {
            let degenerate = (0..3).any(|j| {
                self.vertices[tri[j] as usize]
                    .distance_to(&self.vertices[tri[(j + 1) % 3] as usize])
                    < self.epsilon
            });
            index_live.extend([!degenerate; 3]);
            if !degenerate {
                self.indices.extend_from_slice(tri);
            }
        }

        // 2: compact away unused vertices
        let mut used = vec![false; self.vertices.len()];
        for &i in &self.indices {
            used[i as usize] = true;
        }
        let mut remap = vec![u32::MAX; self.vertices.len()];
        let old_vertices = std::mem::take(&mut self.vertices);
        for (i, vertex) in old_vertices.into_iter().enumerate() {
            if used[i] {
                remap[i] = self.vertices.len() as u32;
                self.vertices.push(vertex);
            }
        }

        // 3: rewrite the indices and shift the cursor checkpoints
        for idx in self.indices.iter_mut() {
            *idx = remap[*idx as usize];
        }
        for cursor in self.cursors.iter_mut() {
            cursor.indices = index_live[..cursor.indices].iter().filter(|&&l| l).count();
            cursor.vertices = used[..cursor.vertices].iter().filter(|&&u| u).count();
        }
    }

    /// Weld vertices of the active scope that sit on the same spot:
    /// repoint indices at each position master, then clean up the now
    /// unreferenced slaves.
    pub fn vertices_merge(&mut self) {
        let start = self.cursors.last().map_or(0, |c| c.vertices);
        let mut weld = WeldIndex::new(self.epsilon);
        for id in start..self.vertices.len() {
            weld.register(id, self.vertices[id].pos);
        }
        for idx in self.indices.iter_mut() {
            if let Some(master) = weld.master_of(*idx as usize) {
                *idx = master as u32;
            }
        }
        self.vertices_cleanup();
        self.rebuild_weld_index();
    }

    /// The inverse of [`vertices_merge`](Self::vertices_merge): give every
    /// triangle corner in the active scope its own vertex record.
    pub fn vertices_separate(&mut self) {
        let vbase = self.cursors.last().map_or(0, |c| c.vertices);
        let mut use_count = vec![0usize; self.vertices.len()];
        for &i in &self.indices {
            use_count[i as usize] += 1;
        }
        let mut spare: Vec<Vec<u32>> = vec![Vec::new(); self.vertices.len()];
        for id in vbase..spare.len() {
            while use_count[id] > 1 {
                let clone = self.duplicate_vertex(id as u32);
                spare[id].push(clone);
                use_count[id] -= 1;
            }
        }
        for idx in self.indices.iter_mut() {
            if let Some(new_id) = spare[*idx as usize].pop() {
                *idx = new_id;
            }
        }
        self.vertices_cleanup();
    }

    /// Re-register every vertex in the identity index, replacing whatever
    /// the previous pass left there.
    pub fn rebuild_weld_index(&mut self) {
        let mut weld = WeldIndex::new(self.epsilon);
        for (id, vertex) in self.vertices.iter().enumerate() {
            weld.register(id, vertex.pos);
        }
        self.weld = weld;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn white() -> Vector4<Real> {
        Vector4::new(1.0, 1.0, 1.0, 1.0)
    }

    fn quad(mesh: &mut Mesh, z: Real) -> [u32; 4] {
        let n = Vector3::z();
        let a = mesh.add_vertex(Point3::new(0.0, 0.0, z), n, white());
        let b = mesh.add_vertex(Point3::new(1.0, 0.0, z), n, white());
        let c = mesh.add_vertex(Point3::new(1.0, 1.0, z), n, white());
        let d = mesh.add_vertex(Point3::new(0.0, 1.0, z), n, white());
        mesh.add_triangle(a, b, c);
        mesh.add_triangle(a, c, d);
        [a, b, c, d]
    }

    #[test]
    fn scopes_checkpoint_counts() {
        let mut mesh = Mesh::new();
        quad(&mut mesh, 0.0);
        mesh.open_scope();
        assert_eq!(
            mesh.cursors(),
            &[Cursor {
                vertices: 4,
                indices: 6
            }]
        );
        quad(&mut mesh, 1.0);
        mesh.close_scope();
        assert!(mesh.cursors().is_empty());
        // Unbalanced close is a no-op.
        mesh.close_scope();
        assert!(mesh.is_well_formed());
    }

    #[test]
    fn delete_triangles_dedups_and_removes_descending() {
        let mut mesh = Mesh::new();
        quad(&mut mesh, 0.0);
        quad(&mut mesh, 1.0);
        quad(&mut mesh, 2.0);
        mesh.open_scope();
        // Duplicated and unordered on purpose.
        mesh.delete_triangles([0, 6, 0, 6]).unwrap();
        assert_eq!(mesh.indices.len(), 12);
        assert_eq!(mesh.cursors()[0].indices, 12);
        assert!(mesh.is_well_formed());
        // Surviving triangles are the second halves of each quad plus the
        // third quad.
        assert_eq!(mesh.indices[0..3], [0, 2, 3]);
    }

    #[test]
    fn delete_triangles_out_of_range_fails_fast() {
        let mut mesh = Mesh::new();
        quad(&mut mesh, 0.0);
        let err = mesh.delete_triangles([6]).unwrap_err();
        assert_eq!(
            err,
            CsgError::TriangleOutOfRange {
                offset: 6,
                len: 6
            }
        );
    }

    #[test]
    fn cleanup_drops_slivers_and_unused_vertices() {
        let mut mesh = Mesh::new();
        let [a, b, c, _] = quad(&mut mesh, 0.0);
        // A sliver: two corners on the same spot.
        let dup = mesh.duplicate_vertex(a);
        mesh.add_triangle(a, dup, b);
        // An unused vertex.
        mesh.add_vertex(Point3::new(9.0, 9.0, 9.0), Vector3::z(), white());
        mesh.vertices_cleanup();
        assert_eq!(mesh.indices.len(), 6);
        assert_eq!(mesh.vertex_count(), 4);
        assert!(mesh.is_well_formed());
        let _ = (b, c);
    }

    #[test]
    fn cleanup_shifts_cursors() {
        let mut mesh = Mesh::new();
        let [a, b, ..] = quad(&mut mesh, 0.0);
        let dup = mesh.duplicate_vertex(a);
        mesh.add_triangle(a, dup, b); // degenerate, will be dropped
        mesh.open_scope();
        quad(&mut mesh, 1.0);
        mesh.vertices_cleanup();
        // The degenerate triangle and its duplicate vertex sat below the
        // cursor; the checkpoint moves back accordingly.
        assert_eq!(
            mesh.cursors(),
            &[Cursor {
                vertices: 4,
                indices: 6
            }]
        );
        assert!(mesh.is_well_formed());
    }

    #[test]
    fn merge_welds_coincident_vertices() {
        let mut mesh = Mesh::new();
        // Two triangles sharing an edge geometrically but not by index.
        let n = Vector3::z();
        let a = mesh.add_vertex(Point3::new(0.0, 0.0, 0.0), n, white());
        let b = mesh.add_vertex(Point3::new(1.0, 0.0, 0.0), n, white());
        let c = mesh.add_vertex(Point3::new(1.0, 1.0, 0.0), n, white());
        let b2 = mesh.add_vertex(Point3::new(1.0, 0.0, 0.0), n, white());
        let c2 = mesh.add_vertex(Point3::new(1.0, 1.0, 0.0), n, white());
        let d = mesh.add_vertex(Point3::new(2.0, 0.5, 0.0), n, white());
        mesh.add_triangle(a, b, c);
        mesh.add_triangle(b2, d, c2);
        mesh.vertices_merge();
        assert_eq!(mesh.vertex_count(), 4);
        assert_eq!(mesh.indices.len(), 6);
        assert!(mesh.is_well_formed());
    }

    #[test]
    fn separate_disconnects_shared_corners() {
        let mut mesh = Mesh::new();
        quad(&mut mesh, 0.0); // shares two corners between its triangles
        mesh.vertices_separate();
        assert_eq!(mesh.indices.len(), 6);
        assert_eq!(mesh.vertex_count(), 6);
        // Every vertex referenced exactly once.
        let mut seen = vec![0; mesh.vertex_count()];
        for &i in &mesh.indices {
            seen[i as usize] += 1;
        }
        assert!(seen.iter().all(|&c| c == 1));
    }

    #[test]
    fn set_face_normals_follows_winding() {
        let mut mesh = Mesh::new();
        quad(&mut mesh, 0.0);
        mesh.indices.swap(1, 2); // flip the first triangle
        mesh.set_face_normals(0..3);
        assert!((mesh.vertices[0].normal - (-Vector3::z())).norm() < 1e-9);
    }
}
