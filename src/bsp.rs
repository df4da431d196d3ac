//! [BSP](https://en.wikipedia.org/wiki/Binary_space_partitioning) tree build
//! and triangle classification.
//!
//! Nodes live in an arena addressed by integer index, so a tree built fresh
//! for one Boolean call carries no lifetimes into the mesh buffer it was
//! built from. A tree built from one operand is only ever queried with the
//! *other* operand's triangles.

use crate::errors::CsgError;
use crate::float_types::Real;
use crate::plane::{BACK, COPLANAR, FRONT, Plane, SPANNING};
use crate::vertex::Vertex;
use nalgebra::Point3;
use std::ops::Range;

/// Upper bound on classification work-queue iterations. A well-formed tree
/// finishes orders of magnitude below this; hitting it means the tree is
/// malformed.
const MAX_CLASSIFY_STEPS: usize = 1 << 20;

/// One splitting plane plus its children and the triangles coincident with
/// it.
#[derive(Debug, Clone)]
pub struct BspNode {
    pub plane: Plane,
    pub front: Option<u32>,
    pub back: Option<u32>,
    /// Start offsets of source triangles lying on `plane`.
    pub coplanar: Vec<u32>,
}

/// A cut point produced while classifying a triangle.
///
/// `edge` references the classification-local vertex list: slots `0..3` are
/// the three original corners, slot `3 + k` is the `k`-th entry of
/// [`TriangleClass::Split`]'s vertex list (so an endpoint may itself be an
/// earlier cut). `t` is the interpolation parameter from `edge.0` toward
/// `edge.1`.
#[derive(Debug, Clone, PartialEq)]
pub struct CutVertex {
    pub pos: Point3<Real>,
    pub edge: (usize, usize),
    pub t: Real,
}

/// A triangle emitted by classification, with corners in the same local
/// slot space as [`CutVertex::edge`] and original winding preserved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubTriangle {
    pub corners: [usize; 3],
    pub side: i8,
}

/// Result of classifying one triangle against a tree.
#[derive(Debug, Clone, PartialEq)]
pub enum TriangleClass {
    /// Wholly outside the solid the tree was built from.
    Front,
    /// Wholly inside.
    Back,
    /// The triangle straddles the solid's boundary and was subdivided.
    Split {
        vertices: Vec<CutVertex>,
        triangles: Vec<SubTriangle>,
    },
}

/// A splitting-plane tree over one triangle range of a mesh buffer,
/// rebuilt per Boolean call and discarded afterward.
#[derive(Debug, Clone)]
pub struct BspTree {
    nodes: Vec<BspNode>,
    epsilon: Real,
}

impl BspTree {
    /// Build a tree from the triangles in `range` (an index-buffer range,
    /// a multiple of 3 long). The first non-degenerate triangle of each
    /// sub-range supplies the node plane; spanning triangles are routed to
    /// both children, their subdivision deferred to classify time.
    pub fn build(
        vertices: &[Vertex],
        indices: &[u32],
        range: Range<usize>,
        epsilon: Real,
    ) -> Self {
        let mut tree = BspTree {
            nodes: Vec::new(),
            epsilon,
        };
        let offsets: Vec<usize> = range.step_by(3).collect();
        if offsets.is_empty() {
            return tree;
        }

        // (parent link, triangles for this subtree)
        let mut stack: Vec<(Option<(usize, i8)>, Vec<usize>)> = vec![(None, offsets)];
        while let Some((link, offs)) = stack.pop() {
            let Some((pivot, plane)) = offs.iter().enumerate().find_map(|(k, &off)| {
                let c = triangle_positions(vertices, indices, off);
                Plane::from_points(&c[0], &c[1], &c[2], epsilon).map(|p| (k, p))
            }) else {
                // Only degenerate triangles left; they define no half-space.
                continue;
            };

            let node_idx = tree.nodes.len();
            if let Some((parent, side)) = link {
                if side == FRONT {
                    tree.nodes[parent].front = Some(node_idx as u32);
                } else {
                    tree.nodes[parent].back = Some(node_idx as u32);
                }
            }

            let mut coplanar = vec![offs[pivot] as u32];
            let mut front_offs = Vec::new();
            let mut back_offs = Vec::new();
            for (k, &off) in offs.iter().enumerate() {
                if k == pivot {
                    continue;
                }
                let c = triangle_positions(vertices, indices, off);
                match plane.orient_triangle(&c, epsilon) {
                    COPLANAR => coplanar.push(off as u32),
                    FRONT => front_offs.push(off),
                    BACK => back_offs.push(off),
                    _ => {
                        front_offs.push(off);
                        back_offs.push(off);
                    },
                }
            }

            tree.nodes.push(BspNode {
                plane,
                front: None,
                back: None,
                coplanar,
            });
            if !front_offs.is_empty() {
                stack.push((Some((node_idx, FRONT)), front_offs));
            }
            if !back_offs.is_empty() {
                stack.push((Some((node_idx, BACK)), back_offs));
            }
        }
        tree
    }

    /// Number of splitting planes in the tree.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Arena nodes, root first. [`BspNode::coplanar`] on each node lists
    /// the source triangles lying on that node's plane.
    pub fn nodes(&self) -> &[BspNode] {
        &self.nodes
    }

    /// Classify a triangle (given by corner positions, not indices, since
    /// it always belongs to the *other* mesh) against this tree.
    ///
    /// Corners within `epsilon` of a node plane count toward FRONT, so a
    /// triangle lying exactly on the boundary is kept outside. Degenerate
    /// input classifies [`TriangleClass::Front`] without failure.
    pub fn classify(&self, corners: [Point3<Real>; 3]) -> Result<TriangleClass, CsgError> {
        if self.nodes.is_empty() {
            return Ok(TriangleClass::Front);
        }
        let eps = self.epsilon;
        let area2 = (corners[1] - corners[0])
            .cross(&(corners[2] - corners[1]))
            .norm_squared();
        if area2 < eps * eps {
            return Ok(TriangleClass::Front);
        }

        let mut positions: Vec<Point3<Real>> = corners.to_vec();
        let mut cuts: Vec<CutVertex> = Vec::new();
        let mut done: Vec<SubTriangle> = Vec::new();
        let mut work: Vec<(u32, [usize; 3])> = vec![(0, [0, 1, 2])];
        let mut steps = 0usize;

        while let Some((node_idx, tri)) = work.pop() {
            steps += 1;
            if steps > MAX_CLASSIFY_STEPS {
                return Err(CsgError::MalformedTree {
                    iterations: MAX_CLASSIFY_STEPS,
                });
            }
            let node = &self.nodes[node_idx as usize];
            let types = [
                node.plane.orient_point(&positions[tri[0]], eps),
                node.plane.orient_point(&positions[tri[1]], eps),
                node.plane.orient_point(&positions[tri[2]], eps),
            ];
            let mask = types[0] | types[1] | types[2];

            if mask != SPANNING {
                // Coplanar corners count toward FRONT.
                let side = if mask == BACK { BACK } else { FRONT };
                let child = if side == FRONT { node.front } else { node.back };
                match child {
                    Some(c) => work.push((c, tri)),
                    None => done.push(SubTriangle { corners: tri, side }),
                }
                continue;
            }

            // The triangle crosses this node's plane: cut the 1-2 crossed
            // edges and route each side's piece independently.
            let mut front_poly: Vec<usize> = Vec::with_capacity(4);
            let mut back_poly: Vec<usize> = Vec::with_capacity(4);
            for i in 0..3 {
                let j = (i + 1) % 3;
                let (type_i, type_j) = (types[i], types[j]);
                if type_i != BACK {
                    front_poly.push(tri[i]);
                }
                if type_i != FRONT {
                    back_poly.push(tri[i]);
                }
                if (type_i | type_j) == SPANNING {
                    let pi = positions[tri[i]];
                    let pj = positions[tri[j]];
                    let denom = node.plane.normal().dot(&(pj - pi));
                    if denom.abs() <= Real::EPSILON {
                        continue;
                    }
                    let t = (node.plane.offset() - node.plane.normal().dot(&pi.coords)) / denom;
                    let pos = pi + (pj - pi) * t;
                    // A cut within epsilon of an existing corner reuses
                    // that corner instead of minting a near-duplicate.
                    let slot = if (pos - pi).norm_squared() < eps * eps {
                        tri[i]
                    } else if (pos - pj).norm_squared() < eps * eps {
                        tri[j]
                    } else {
                        let slot = positions.len();
                        positions.push(pos);
                        cuts.push(CutVertex {
                            pos,
                            edge: (tri[i], tri[j]),
                            t,
                        });
                        slot
                    };
                    front_poly.push(slot);
                    back_poly.push(slot);
                }
            }

            emit_fan(&front_poly, FRONT, node.front, &positions, eps, &mut work, &mut done);
            emit_fan(&back_poly, BACK, node.back, &positions, eps, &mut work, &mut done);
        }

        if cuts.is_empty() && done.len() == 1 {
            return Ok(if done[0].side == BACK {
                TriangleClass::Back
            } else {
                TriangleClass::Front
            });
        }
        Ok(TriangleClass::Split {
            vertices: cuts,
            triangles: done,
        })
    }
}

/// Fan-triangulate a 3- or 4-gon split piece, dropping slivers whose
/// corners coincide within epsilon, and either descend into `child` or
/// finalize with `side`.
fn emit_fan(
    poly: &[usize],
    side: i8,
    child: Option<u32>,
    positions: &[Point3<Real>],
    epsilon: Real,
    work: &mut Vec<(u32, [usize; 3])>,
    done: &mut Vec<SubTriangle>,
) {
    for k in 1..poly.len().saturating_sub(1) {
        let tri = [poly[0], poly[k], poly[k + 1]];
        let degenerate = (0..3).any(|l| {
            (positions[tri[l]] - positions[tri[(l + 1) % 3]]).norm_squared()
                < epsilon * epsilon
        });
        if degenerate {
            continue;
        }
        match child {
            Some(c) => work.push((c, tri)),
            None => done.push(SubTriangle { corners: tri, side }),
        }
    }
}

fn triangle_positions(vertices: &[Vertex], indices: &[u32], off: usize) -> [Point3<Real>; 3] {
    [
        vertices[indices[off] as usize].pos,
        vertices[indices[off + 1] as usize].pos,
        vertices[indices[off + 2] as usize].pos,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::float_types::EPSILON;
    use nalgebra::{Vector3, Vector4};

    /// Unit-style cube as a raw vertex/index pair: 8 shared corners,
    /// 12 CCW-outward triangles.
    fn cube(min: Real, max: Real) -> (Vec<Vertex>, Vec<u32>) {
        let corners = [
            [min, min, min],
            [max, min, min],
            [max, max, min],
            [min, max, min],
            [min, min, max],
            [max, min, max],
            [max, max, max],
            [min, max, max],
        ];
        let center = Point3::new(
            (min + max) / 2.0,
            (min + max) / 2.0,
            (min + max) / 2.0,
        );
        let vertices = corners
            .iter()
            .map(|&[x, y, z]| {
                let pos = Point3::new(x, y, z);
                Vertex::new(
                    pos,
                    (pos - center).normalize(),
                    Vector4::new(1.0, 1.0, 1.0, 1.0),
                )
            })
            .collect();
        let indices = vec![
            0, 3, 2, 0, 2, 1, // -z
            4, 5, 6, 4, 6, 7, // +z
            0, 1, 5, 0, 5, 4, // -y
            3, 7, 6, 3, 6, 2, // +y
            0, 4, 7, 0, 7, 3, // -x
            1, 2, 6, 1, 6, 5, // +x
        ];
        (vertices, indices)
    }

    fn small_triangle_at(center: [Real; 3]) -> [Point3<Real>; 3] {
        let [x, y, z] = center;
        [
            Point3::new(x - 0.01, y - 0.01, z),
            Point3::new(x + 0.01, y - 0.01, z),
            Point3::new(x, y + 0.01, z),
        ]
    }

    #[test]
    fn empty_tree_classifies_front() {
        let tree = BspTree::build(&[], &[], 0..0, EPSILON);
        assert_eq!(tree.node_count(), 0);
        let class = tree.classify(small_triangle_at([0.0, 0.0, 0.0])).unwrap();
        assert_eq!(class, TriangleClass::Front);
    }

    #[test]
    fn cube_tree_classifies_inside_and_outside() {
        let (vertices, indices) = cube(-1.0, 1.0);
        let tree = BspTree::build(&vertices, &indices, 0..indices.len(), EPSILON);
        assert!(tree.node_count() >= 6);

        let inside = tree.classify(small_triangle_at([0.0, 0.0, 0.0])).unwrap();
        assert_eq!(inside, TriangleClass::Back);

        let outside = tree.classify(small_triangle_at([3.0, 0.0, 0.0])).unwrap();
        assert_eq!(outside, TriangleClass::Front);
    }

    #[test]
    fn coplanar_face_triangles_share_one_node() {
        let (vertices, indices) = cube(-1.0, 1.0);
        let tree = BspTree::build(&vertices, &indices, 0..indices.len(), EPSILON);
        // One plane per cube face; each face's second triangle lands on
        // the first one's coplanar list instead of adding a node.
        assert_eq!(tree.node_count(), 6);
        for node in tree.nodes() {
            assert_eq!(node.coplanar.len(), 2);
        }
        let mut recorded: Vec<u32> = tree
            .nodes()
            .iter()
            .flat_map(|node| node.coplanar.iter().copied())
            .collect();
        recorded.sort_unstable();
        let expected: Vec<u32> = (0..12).map(|t| t * 3).collect();
        assert_eq!(recorded, expected);
    }

    #[test]
    fn boundary_triangle_is_biased_front() {
        let (vertices, indices) = cube(-1.0, 1.0);
        let tree = BspTree::build(&vertices, &indices, 0..indices.len(), EPSILON);
        // Lies exactly on the +z face plane, within the face.
        let coplanar = small_triangle_at([0.0, 0.0, 1.0]);
        assert_eq!(tree.classify(coplanar).unwrap(), TriangleClass::Front);
    }

    #[test]
    fn straddling_triangle_splits_both_sides() {
        let (vertices, indices) = cube(-1.0, 1.0);
        let tree = BspTree::build(&vertices, &indices, 0..indices.len(), EPSILON);
        // Crosses the +x face: one corner inside, two outside.
        let straddling = [
            Point3::new(0.5, 0.0, 0.0),
            Point3::new(2.0, -0.5, 0.0),
            Point3::new(2.0, 0.5, 0.0),
        ];
        match tree.classify(straddling).unwrap() {
            TriangleClass::Split { vertices, triangles } => {
                assert!(!vertices.is_empty());
                assert!(triangles.iter().any(|t| t.side == FRONT));
                assert!(triangles.iter().any(|t| t.side == BACK));
                // Cut points sit on the x = 1 plane.
                for cut in &vertices {
                    assert!((cut.pos.x - 1.0).abs() < 1e-6);
                    assert!(cut.t > 0.0 && cut.t < 1.0);
                }
                // Slots stay within the local vertex list.
                let len = 3 + vertices.len();
                for tri in &triangles {
                    assert!(tri.corners.iter().all(|&c| c < len));
                }
            },
            other => panic!("expected split, got {:?}", other),
        }
    }

    #[test]
    fn degenerate_triangle_classifies_front() {
        let (vertices, indices) = cube(-1.0, 1.0);
        let tree = BspTree::build(&vertices, &indices, 0..indices.len(), EPSILON);
        let p = Point3::new(0.0, 0.0, 0.0);
        assert_eq!(tree.classify([p, p, p]).unwrap(), TriangleClass::Front);
    }

    #[test]
    fn cut_reuses_corner_on_plane() {
        let (vertices, indices) = cube(-1.0, 1.0);
        let tree = BspTree::build(&vertices, &indices, 0..indices.len(), EPSILON);
        // One corner exactly on the +x face plane, the others straddling:
        // the cut through the on-plane corner must not mint a new vertex
        // at the same spot.
        let touching = [
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(2.0, -0.5, 0.0),
            Point3::new(0.5, -0.5, 0.0),
        ];
        match tree.classify(touching).unwrap() {
            TriangleClass::Split { vertices, .. } => {
                for cut in &vertices {
                    let corner = Point3::new(1.0, 0.0, 0.0);
                    assert!((cut.pos - corner).norm() > EPSILON);
                }
            },
            // Also acceptable: the sliver outside may be dropped entirely.
            TriangleClass::Front | TriangleClass::Back => {},
        }
    }
}
