//! Boolean mesh combination: the operator table and the driver that walks
//! both operands against each other's BSP tree.
//!
//! The two operands are the two innermost scopes of the mesh's cursor
//! stack: mesh A is everything between the second-innermost checkpoint (or
//! the buffer start) and the innermost one, mesh B is everything after the
//! innermost checkpoint.

use crate::bsp::{BspTree, TriangleClass};
use crate::errors::CsgError;
use crate::mesh::Mesh;
use crate::plane::BACK;
use hashbrown::HashSet;

/// The supported Boolean operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CsgOp {
    /// A ∪ B: drop everything inside the other solid.
    Union,
    /// A − B: keep A's outside, keep B's inside inverted as the cavity
    /// wall.
    Subtract,
    /// A − B without the cavity wall: B contributes nothing, leaving the
    /// carved mesh open.
    SubtractLoss,
    /// A ∩ B: drop everything outside the other solid.
    Intersect,
    /// Symmetric difference: keep every triangle, inverting and detaching
    /// the parts inside the other solid.
    Xor,
}

/// Which operand a triangle belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeshSide {
    A,
    B,
}

/// What to do with one classified triangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpRule {
    pub discard: bool,
    pub invert: bool,
    /// Give the triangle its own vertex records before inverting, so
    /// neighbours welded to it keep their orientation and attributes.
    pub detach: bool,
}

const KEEP: OpRule = OpRule {
    discard: false,
    invert: false,
    detach: false,
};
const DISCARD: OpRule = OpRule {
    discard: true,
    invert: false,
    detach: false,
};
const INVERT: OpRule = OpRule {
    discard: false,
    invert: true,
    detach: false,
};
const INVERT_DETACHED: OpRule = OpRule {
    discard: false,
    invert: true,
    detach: true,
};

/// The keep/discard/invert table, keyed by operator, operand and whether
/// the triangle fell inside the other solid.
pub const fn op_rule(op: CsgOp, mesh: MeshSide, inside: bool) -> OpRule {
    match (op, mesh, inside) {
        (CsgOp::Union, _, true) => DISCARD,
        (CsgOp::Union, _, false) => KEEP,

        (CsgOp::Subtract, MeshSide::A, true) => DISCARD,
        (CsgOp::Subtract, MeshSide::A, false) => KEEP,
        (CsgOp::Subtract, MeshSide::B, true) => INVERT,
        (CsgOp::Subtract, MeshSide::B, false) => DISCARD,

        (CsgOp::SubtractLoss, MeshSide::A, true) => DISCARD,
        (CsgOp::SubtractLoss, MeshSide::A, false) => KEEP,
        (CsgOp::SubtractLoss, MeshSide::B, _) => DISCARD,

        (CsgOp::Intersect, _, true) => KEEP,
        (CsgOp::Intersect, _, false) => DISCARD,

        (CsgOp::Xor, _, true) => INVERT_DETACHED,
        (CsgOp::Xor, _, false) => KEEP,
    }
}

/// Map a classification-local slot back to a buffer index: slots `0..3`
/// are the triangle's original corners, slot `3 + k` is the `k`-th cut
/// vertex appended at `base`.
const fn resolve_slot(original: [u32; 3], base: usize, slot: usize) -> u32 {
    if slot < 3 {
        original[slot]
    } else {
        (base + slot - 3) as u32
    }
}

impl Mesh {
    /// Combine the two innermost scopes with `op`, in place.
    ///
    /// With no open scope this is a no-op. With one open scope, mesh A is
    /// everything before its checkpoint. Afterward the innermost
    /// checkpoint is rewritten to the end of the buffer, the buffer is
    /// compacted, and the vertex identity index is rebuilt.
    pub fn apply_csg(&mut self, op: CsgOp) -> Result<(), CsgError> {
        let Some(&split) = self.cursors.last() else {
            return Ok(());
        };
        let a_start = if self.cursors.len() >= 2 {
            self.cursors[self.cursors.len() - 2].indices
        } else {
            0
        };
        let split_at = split.indices;
        let b_end = self.indices.len();

        let tree_a = BspTree::build(&self.vertices, &self.indices, a_start..split_at, self.epsilon);
        let tree_b = BspTree::build(&self.vertices, &self.indices, split_at..b_end, self.epsilon);

        let mut kill: HashSet<usize> = HashSet::new();
        let passes = [
            (MeshSide::A, a_start..split_at, &tree_b),
            (MeshSide::B, split_at..b_end, &tree_a),
        ];
        for (mesh_side, range, tree) in passes {
            let mut off = range.start;
            while off + 3 <= range.end {
                let corners = [
                    self.vertices[self.indices[off] as usize].pos,
                    self.vertices[self.indices[off + 1] as usize].pos,
                    self.vertices[self.indices[off + 2] as usize].pos,
                ];
                match tree.classify(corners)? {
                    TriangleClass::Front => self.resolve_triangle(op, mesh_side, false, off, &mut kill),
                    TriangleClass::Back => self.resolve_triangle(op, mesh_side, true, off, &mut kill),
                    TriangleClass::Split { vertices, triangles } => {
                        kill.insert(off);
                        let original = [
                            self.indices[off],
                            self.indices[off + 1],
                            self.indices[off + 2],
                        ];
                        let base = self.vertices.len();
                        for cut in &vertices {
                            let ea = resolve_slot(original, base, cut.edge.0) as usize;
                            let eb = resolve_slot(original, base, cut.edge.1) as usize;
                            let mut vertex =
                                self.vertices[ea].interpolate(&self.vertices[eb], cut.t);
                            // The classifier's cut point is exact; the
                            // interpolation only supplies the attributes.
                            vertex.pos = cut.pos;
                            self.vertices.push(vertex);
                        }
                        for sub in &triangles {
                            let new_off = self.indices.len();
                            for &slot in &sub.corners {
                                self.indices.push(resolve_slot(original, base, slot));
                            }
                            let inside = sub.side == BACK;
                            self.resolve_triangle(op, mesh_side, inside, new_off, &mut kill);
                        }
                    },
                }
                off += 3;
            }
        }

        self.delete_triangles(kill)?;
        self.vertices_cleanup();
        self.rebuild_weld_index();
        Ok(())
    }

    /// Apply the operator table to one classified triangle.
    fn resolve_triangle(
        &mut self,
        op: CsgOp,
        mesh: MeshSide,
        inside: bool,
        off: usize,
        kill: &mut HashSet<usize>,
    ) {
        let rule = op_rule(op, mesh, inside);
        if rule.discard {
            kill.insert(off);
            return;
        }
        if rule.invert {
            if rule.detach {
                for l in 0..3 {
                    let dup = self.duplicate_vertex(self.indices[off + l]);
                    self.indices[off + l] = dup;
                }
            }
            self.indices.swap(off + 1, off + 2);
            self.set_face_normals(off..off + 3);
        }
    }
}
