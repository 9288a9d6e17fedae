//
// fmg_r - face morph generation
// Copyright (c) 2017 Filip Szczerek <ga.software@yahoo.com>
//
// This project is licensed under the terms of the MIT license
// (see the LICENSE file for details).
//
//
// File description:
//   Delaunay triangulation of landmark points.
//

use crate::defs::{CanvasBounds, Point, Rect};
use log::{debug, warn};


const EMPTY: usize = usize::MAX;

/// Size of the initial covering triangle relative to the triangulated area.
const SUPER_TRIANGLE_SCALE: i32 = 1000;


/// Triangle of a landmark mesh: three distinct indices into the landmark sequence.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct TriangleIndices {
    pub a: usize,
    pub b: usize,
    pub c: usize
}


impl TriangleIndices {
    pub fn as_array(&self) -> [usize; 3] {
        [self.a, self.b, self.c]
    }


    pub fn contains(&self, idx: usize) -> bool {
        self.a == idx || self.b == idx || self.c == idx
    }
}


impl std::fmt::Display for TriangleIndices {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> Result<(), std::fmt::Error> {
        write!(f, "[{}, {}, {}]", self.a, self.b, self.c)
    }
}


/// Triangulates the points of `points` lying inside `bounds`.
///
/// Points outside of `bounds` keep their index position but are not part of the mesh.
/// If a position occurs more than once, only its first occurrence is used.
/// The result is deterministic for a given input.
///
pub fn triangulate(points: &[Point], bounds: CanvasBounds) -> Vec<TriangleIndices> {
    let envelope = bounds.as_rect();

    // Points actually inserted and their indices in `points`
    let mut mesh_points = Vec::<Point>::with_capacity(points.len());
    let mut orig_indices = Vec::<usize>::with_capacity(points.len());

    for (i, p) in points.iter().enumerate() {
        if !envelope.contains_point(p) {
            debug!("Point {} {} is outside of {} and will not be triangulated.", i, p, bounds);
            continue;
        }
        if mesh_points.contains(p) {
            debug!("Point {} {} is a duplicate and will not be triangulated.", i, p);
            continue;
        }
        mesh_points.push(*p);
        orig_indices.push(i);
    }

    let tri = Triangulation::find_delaunay_triangulation(&mesh_points, &envelope);

    // Triangles touching the initial covering triangle's vertices are dropped
    let num_pts = mesh_points.len();
    tri.triangles.iter()
        .filter(|t| t.v0 < num_pts && t.v1 < num_pts && t.v2 < num_pts)
        .map(|t| TriangleIndices{ a: orig_indices[t.v0], b: orig_indices[t.v1], c: orig_indices[t.v2] })
        .collect()
}


#[derive(Copy, Clone, Default)]
struct Edge {
    /// First vertex
    v0: usize,
    /// Second vertex
    v1: usize,

    /// First adjacent triangle (if EMPTY, `t1` is not EMPTY)
    t0: usize,
    /// Second adjacent triangle (if EMPTY, `t0` is not EMPTY)
    t1: usize,

    /// First opposite vertex (if EMPTY, `w1` is not EMPTY)
    w0: usize,
    /// Second opposite vertex (if EMPTY, `w0` is not EMPTY)
    w1: usize
}


impl Edge {
    fn is_boundary(&self) -> bool {
        self.t0 == EMPTY || self.t1 == EMPTY
    }


    fn replace_opposing_vertex(&mut self, wold: usize, wnew: usize) {
        if self.w0 == wold {
            self.w0 = wnew;
        } else if self.w1 == wold {
            self.w1 = wnew;
        } else if self.w0 == EMPTY {
            self.w0 = wnew;
        } else if self.w1 == EMPTY {
            self.w1 = wnew;
        }
    }


    fn replace_adjacent_triangle(&mut self, told: usize, tnew: usize) {
        if self.t0 == told {
            self.t0 = tnew;
        } else if self.t1 == told {
            self.t1 = tnew;
        } else if self.t0 == EMPTY {
            self.t0 = tnew;
        } else if self.t1 == EMPTY {
            self.t1 = tnew;
        }
    }
}


/// Vertices and edges are specified in CCW order.
///
/// Note: in `Triangulation.edges` the edges' vertices may not be specified in the order
/// mentioned below for `e0`, `e1`, `e2`.
///
#[derive(Copy, Clone, Default)]
struct Triangle {
    v0: usize,
    v1: usize,
    v2: usize,

    /// Contains v0, v1
    e0: usize,
    /// Contains v1, v2
    e1: usize,
    /// Contains v2, v0
    e2: usize
}


impl Triangle {
    fn edges(&self) -> [usize; 3] {
        [self.e0, self.e1, self.e2]
    }


    fn contains(&self, vertex: usize) -> bool {
        vertex == self.v0 || vertex == self.v1 || vertex == self.v2
    }


    fn next_vertex(&self, vertex: usize) -> usize {
        if vertex == self.v0 {
            self.v1
        } else if vertex == self.v1 {
            self.v2
        } else if vertex == self.v2 {
            self.v0
        } else {
            panic!("Vertex {} does not belong to triangle ({}, {}, {}).", vertex, self.v0, self.v1, self.v2);
        }
    }


    /// Returns the edge which contains `vertex` and the vertex succeeding it in CCW order.
    fn leading_edge(&self, vertex: usize) -> usize {
        if vertex == self.v0 {
            self.e0
        } else if vertex == self.v1 {
            self.e1
        } else if vertex == self.v2 {
            self.e2
        } else {
            panic!("Vertex {} does not belong to triangle ({}, {}, {}).", vertex, self.v0, self.v1, self.v2);
        }
    }
}


struct Triangulation {
    vertices:  Vec<Point>,
    edges:     Vec<Edge>,
    triangles: Vec<Triangle>
}


impl Triangulation {
    /// Finds Delaunay triangulation for the specified point set (all have to be different).
    ///
    /// Also adds three additional points (at the end of `vertices`) for the initial triangle
    /// which covers `envelope`. `envelope` has to contain all `points`.
    ///
    fn find_delaunay_triangulation(points: &[Point], envelope: &Rect) -> Triangulation {
        let n = points.len();
        let mut tri = Triangulation{ vertices: Vec::with_capacity(n + 3),
                                     edges: Vec::with_capacity(3 * n + 3),
                                     triangles: Vec::with_capacity(2 * n + 1) };

        tri.vertices.extend_from_slice(points);

        // The covering triangle is far larger than the envelope, so that its vertices do not
        // fall into circumcircles of triangles formed by the points along the envelope border
        let w = envelope.width as i32;
        let h = envelope.height as i32;
        let margin = SUPER_TRIANGLE_SCALE * w.max(h) + 16;
        let cx = envelope.x + w / 2;
        let cy = envelope.y + h / 2;

        tri.vertices.push(Point{ x: cx - 2 * margin, y: cy - margin });
        tri.vertices.push(Point{ x: cx + 2 * margin, y: cy - margin });
        tri.vertices.push(Point{ x: cx,              y: cy + 2 * margin });

        tri.edges.push(Edge{ v0: n,     v1: n + 1, t0: 0, t1: EMPTY, w0: n + 2, w1: EMPTY });
        tri.edges.push(Edge{ v0: n + 1, v1: n + 2, t0: 0, t1: EMPTY, w0: n,     w1: EMPTY });
        tri.edges.push(Edge{ v0: n + 2, v1: n,     t0: 0, t1: EMPTY, w0: n + 1, w1: EMPTY });

        tri.triangles.push(Triangle{ v0: n, v1: n + 1, v2: n + 2, e0: 0, e1: 1, e2: 2 });

        for pidx in 0..n {
            let tidx = match (0..tri.triangles.len()).find(|&j| tri.is_inside_triangle(pidx, j)) {
                Some(t) => t,
                None => {
                    warn!("Point {} is not covered by the triangulation; skipping.", points[pidx]);
                    continue;
                }
            };

            let p = &points[pidx];
            let insertion_edge = tri.triangles[tidx].edges().iter().cloned().find(|&e| {
                let edge = &tri.edges[e];
                !edge.is_boundary() && point_belongs_to_line(p, &tri.vertices[edge.v0], &tri.vertices[edge.v1])
            });

            match insertion_edge {
                Some(eidx) => tri.add_point_on_edge(pidx, eidx),
                None => tri.add_point_inside_triangle(pidx, tidx)
            }
        }

        tri
    }


    /// Checks if vertex `pidx` lies inside (or on the border of) triangle `tidx`.
    fn is_inside_triangle(&self, pidx: usize, tidx: usize) -> bool {
        let t = &self.triangles[tidx];
        let p = &self.vertices[pidx];

        let o0 = orientation(&self.vertices[t.v0], &self.vertices[t.v1], p);
        let o1 = orientation(&self.vertices[t.v1], &self.vertices[t.v2], p);
        let o2 = orientation(&self.vertices[t.v2], &self.vertices[t.v0], p);

        (o0 >= 0 && o1 >= 0 && o2 >= 0) || (o0 <= 0 && o1 <= 0 && o2 <= 0)
    }


    /// Adds new point `pidx` that lies on an existing edge `eidx`.
    fn add_point_on_edge(&mut self, pidx: usize, eidx: usize) {
        //    Starting configuration: (| = edge 'e')
        //
        //                k0
        //               .|.
        //              . | .
        //            q0  |  .
        //            .   |   q3
        //           .    |    .
        //         wt0    p     wt1
        //          .  t0 | t1  .
        //           .    |    .
        //           q1   |   q2
        //             .  |  .
        //              . | .
        //               k1
        //
        //    Edge 'e' is subdivided into e0 (containing k0) and e1 (containing k1).
        //    New edges e2 (p-wt0) and e3 (p-wt1) split t0 into t0a/t0b and t1 into t1a/t1b:
        //
        //                k0
        //               .|.
        //              . | .
        //            q0  |  .
        //            .   e0  . q3
        //           .    |    .
        //          . t0a | t1b .
        //         .      |      .
        //      wt0...e2..p...e3..wt1
        //        .       |       .
        //         .  t0b |      .
        //          .     | t1a .
        //           .    |    .
        //           q1   e1  q2
        //             .  |  .
        //              . | .
        //               k1
        //
        //    Afterwards the Delaunay condition is checked for e0..3, q0..3.

        let e = self.edges[eidx];
        let t0_idx = e.t0;
        let t1_idx = e.t1;
        let t0 = self.triangles[t0_idx];
        let t1 = self.triangles[t1_idx];

        let (wt0_idx, wt1_idx) = if t0.contains(e.w0) { (e.w0, e.w1) } else { (e.w1, e.w0) };

        let k0 = t1.next_vertex(wt1_idx);
        let k1 = t0.next_vertex(wt0_idx);

        // Edges of the quadrilateral (k0, wt0, k1, wt1) in CCW order, starting with (k0, wt0)
        let q0_idx = t0.leading_edge(k0);
        let q1_idx = t0.leading_edge(wt0_idx);
        let q2_idx = t1.leading_edge(k1);
        let q3_idx = t1.leading_edge(wt1_idx);

        // 't0a', 't1a' and 'e0' reuse the storage of 't0', 't1' and 'e'
        let t0a_idx = t0_idx;
        let t1a_idx = t1_idx;
        let t0b_idx = self.triangles.len();
        let t1b_idx = t0b_idx + 1;

        let e0_idx = eidx;
        let e1_idx = self.edges.len();
        let e2_idx = e1_idx + 1;
        let e3_idx = e1_idx + 2;

        self.edges[e0_idx] = Edge{ v0: pidx, v1: k0, t0: t0a_idx, t1: t1b_idx, w0: wt0_idx, w1: wt1_idx };
        self.edges.push(Edge{ v0: pidx, v1: k1,      t0: t0b_idx, t1: t1a_idx, w0: wt0_idx, w1: wt1_idx });
        self.edges.push(Edge{ v0: pidx, v1: wt0_idx, t0: t0a_idx, t1: t0b_idx, w0: k0,      w1: k1 });
        self.edges.push(Edge{ v0: pidx, v1: wt1_idx, t0: t1a_idx, t1: t1b_idx, w0: k0,      w1: k1 });

        self.triangles[t0a_idx] = Triangle{ v0: pidx, v1: k0,      v2: wt0_idx, e0: e0_idx, e1: q0_idx, e2: e2_idx };
        self.triangles[t1a_idx] = Triangle{ v0: pidx, v1: k1,      v2: wt1_idx, e0: e1_idx, e1: q2_idx, e2: e3_idx };
        self.triangles.push(Triangle{       v0: pidx, v1: wt0_idx, v2: k1,      e0: e2_idx, e1: q1_idx, e2: e1_idx });
        self.triangles.push(Triangle{       v0: pidx, v1: wt1_idx, v2: k0,      e0: e3_idx, e1: q3_idx, e2: e0_idx });

        self.edges[q0_idx].replace_adjacent_triangle(t0_idx, t0a_idx);
        self.edges[q0_idx].replace_opposing_vertex(k1, pidx);

        self.edges[q1_idx].replace_adjacent_triangle(t0_idx, t0b_idx);
        self.edges[q1_idx].replace_opposing_vertex(k0, pidx);

        self.edges[q2_idx].replace_adjacent_triangle(t1_idx, t1a_idx);
        self.edges[q2_idx].replace_opposing_vertex(k0, pidx);

        self.edges[q3_idx].replace_adjacent_triangle(t1_idx, t1b_idx);
        self.edges[q3_idx].replace_opposing_vertex(k1, pidx);

        for &i in &[e0_idx, e1_idx, e2_idx, e3_idx, q0_idx, q1_idx, q2_idx, q3_idx] {
            self.test_and_swap_edge(i, EMPTY, EMPTY);
        }
    }


    /// Adds a new point `pidx` inside an existing triangle `tidx`.
    fn add_point_inside_triangle(&mut self, pidx: usize, tidx: usize) {
        // Subdivide 't' into 'tsub0', 'tsub1', 'tsub2' using 'pidx'. Existing triangles are
        // referenced by index from the edges, so 'tsub0' replaces 't' and the others are appended.

        let t = self.triangles[tidx];

        let tsub0idx = tidx;
        let tsub1idx = self.triangles.len();
        let tsub2idx = tsub1idx + 1;

        // New edges connecting 't.v0', 't.v1', 't.v2' with 'pidx'
        let enew0 = self.edges.len();
        let enew1 = enew0 + 1;
        let enew2 = enew0 + 2;

        self.edges.push(Edge{ v0: t.v0, v1: pidx, t0: tsub0idx, t1: tsub2idx, w0: t.v1, w1: t.v2 });
        self.edges.push(Edge{ v0: t.v1, v1: pidx, t0: tsub0idx, t1: tsub1idx, w0: t.v0, w1: t.v2 });
        self.edges.push(Edge{ v0: t.v2, v1: pidx, t0: tsub1idx, t1: tsub2idx, w0: t.v1, w1: t.v0 });

        self.triangles[tsub0idx] = Triangle{ v0: pidx, v1: t.v0, v2: t.v1, e0: enew0, e1: t.e0, e2: enew1 };
        self.triangles.push(Triangle{        v0: pidx, v1: t.v1, v2: t.v2, e0: enew1, e1: t.e1, e2: enew2 });
        self.triangles.push(Triangle{        v0: pidx, v1: t.v2, v2: t.v0, e0: enew2, e1: t.e2, e2: enew0 });

        self.edges[t.e0].replace_opposing_vertex(t.v2, pidx);
        self.edges[t.e0].replace_adjacent_triangle(tidx, tsub0idx);

        self.edges[t.e1].replace_opposing_vertex(t.v0, pidx);
        self.edges[t.e1].replace_adjacent_triangle(tidx, tsub1idx);

        self.edges[t.e2].replace_opposing_vertex(t.v1, pidx);
        self.edges[t.e2].replace_adjacent_triangle(tidx, tsub2idx);

        self.test_and_swap_edge(t.e0, enew0, enew1);
        self.test_and_swap_edge(t.e1, enew1, enew2);
        self.test_and_swap_edge(t.e2, enew2, enew0);
    }


    /// Checks if point `pidx` is strictly inside the triangle's `tidx` circumcircle.
    ///
    /// Uses exact integer arithmetic.
    ///
    fn is_inside_circumcircle(&self, pidx: usize, tidx: usize) -> bool {
        let p = &self.vertices[pidx];
        let t = &self.triangles[tidx];

        let a = &self.vertices[t.v0];
        let b = &self.vertices[t.v1];
        let c = &self.vertices[t.v2];

        let orient = orientation(a, b, c);

        if orient == 0 {
            // Collinear vertices; use the circle spanned by the two extreme ones
            let dist_ab = dist_sq(a, b);
            let dist_ac = dist_sq(a, c);
            let dist_bc = dist_sq(b, c);

            let (ext1, ext2) = if dist_ab >= dist_ac && dist_ab >= dist_bc {
                (a, b)
            } else if dist_ac >= dist_ab && dist_ac >= dist_bc {
                (a, c)
            } else {
                (b, c)
            };

            // Doubled coordinates keep the center integral
            let ux = ext1.x as i64 + ext2.x as i64;
            let uy = ext1.y as i64 + ext2.y as i64;

            return sqr!(2 * p.x as i64 - ux) + sqr!(2 * p.y as i64 - uy) < dist_sq(ext1, ext2);
        }

        let (adx, ady) = ((a.x - p.x) as i128, (a.y - p.y) as i128);
        let (bdx, bdy) = ((b.x - p.x) as i128, (b.y - p.y) as i128);
        let (cdx, cdy) = ((c.x - p.x) as i128, (c.y - p.y) as i128);

        let det = (sqr!(adx) + sqr!(ady)) * (bdx * cdy - cdx * bdy) -
                  (sqr!(bdx) + sqr!(bdy)) * (adx * cdy - cdx * ady) +
                  (sqr!(cdx) + sqr!(cdy)) * (adx * bdy - bdx * ady);

        // The sign of the determinant depends on the vertex order of the triangle
        if orient > 0 { det > 0 } else { det < 0 }
    }


    /// Ensures the specified edge satisfies the Delaunay condition.
    ///
    /// If edge `e` violates the Delaunay condition, swaps it and recursively
    /// continues to test the neighboring edges (except `eskip1`, `eskip2`).
    ///
    /// Before:
    ///
    /// ```text
    ///     v3--e2---v2
    ///    / t1 ___/ /
    ///  e3  __e4   e1
    ///  / _/   t0 /
    /// v0---e0--v1
    /// ```
    ///
    /// After swapping e4:
    ///
    /// ```text
    ///     v3--e2---v2
    ///    / \   t0 /
    ///  e3   e4   e1
    ///  /  t1 \  /
    /// v0--e0--v1
    /// ```
    ///
    /// For each triangle adjacent to `e4` before the swap, its vertex opposite to `e4` and the next
    /// vertex stay together after the swap; this decides which new triangle is `t0` and which `t1`.
    ///
    fn test_and_swap_edge(&mut self, e: usize, eskip1: usize, eskip2: usize) {
        let eprev = self.edges[e];

        if eprev.is_boundary() {
            return;
        }

        let t0prev = eprev.t0;
        let t1prev = eprev.t1;
        let tri0 = self.triangles[t0prev];
        let tri1 = self.triangles[t1prev];

        let swap_needed =
            tri0.contains(eprev.w0) && self.is_inside_circumcircle(eprev.w1, t0prev) ||
            tri0.contains(eprev.w1) && self.is_inside_circumcircle(eprev.w0, t0prev) ||
            tri1.contains(eprev.w0) && self.is_inside_circumcircle(eprev.w1, t1prev) ||
            tri1.contains(eprev.w1) && self.is_inside_circumcircle(eprev.w0, t1prev);

        if !swap_needed {
            return;
        }

        let edges_to_check: Vec<usize> = tri0.edges().iter().chain(tri1.edges().iter())
            .cloned()
            .filter(|&x| x != e && x != eskip1 && x != eskip2)
            .collect();

        // The only vertex of each triangle not belonging to 'e'
        let (t0refv, t1refv) = if tri0.contains(eprev.w0) { (eprev.w0, eprev.w1) } else { (eprev.w1, eprev.w0) };

        //    Before:                    After:
        //
        //        D---------C           D-------C
        //       / t1 ___/ /           / \  t0 /
        //      /  __e    /           /   e   /
        //     / _/   t0 /           / t1  \ /
        //    A---------B           A-------B
        //
        //    t0: v0=A, v1=B, v2=C    t0: v0=B, v1=C, v2=D
        //    t1: v0=D, v1=A, v2=C    t1: v0=D, v1=A, v2=B

        let mut t0new = Triangle{ v0: t0refv, v1: tri0.next_vertex(t0refv), v2: t1refv, ..Default::default() };
        let mut t1new = Triangle{ v0: t1refv, v1: tri1.next_vertex(t1refv), v2: t0refv, ..Default::default() };

        // The reference vertex's leading edge stays, the second edge comes from the other triangle,
        // the third is the swapped 'e'
        t0new.e0 = tri0.leading_edge(t0new.v0);
        t0new.e1 = tri1.leading_edge(t0new.v1);
        t0new.e2 = e;

        t1new.e0 = tri1.leading_edge(t1new.v0);
        t1new.e1 = tri0.leading_edge(t1new.v1);
        t1new.e2 = e;

        self.edges[t0new.e0].replace_opposing_vertex(t1new.v1, t0new.v2);
        self.edges[t0new.e1].replace_opposing_vertex(t1new.v1, t0new.v0);
        self.edges[t1new.e0].replace_opposing_vertex(t0new.v1, t1new.v2);
        self.edges[t1new.e1].replace_opposing_vertex(t0new.v1, t1new.v0);

        self.edges[t0new.e1].replace_adjacent_triangle(t1prev, t0prev);
        self.edges[t1new.e1].replace_adjacent_triangle(t0prev, t1prev);

        {
            let swapped = &mut self.edges[e];
            swapped.w0 = t0new.v1;
            swapped.w1 = t1new.v1;
            swapped.v0 = t0new.v0;
            swapped.v1 = t1new.v0;
        }

        self.triangles[t0prev] = t0new;
        self.triangles[t1prev] = t1new;

        for &i in &edges_to_check {
            self.test_and_swap_edge(i, e, EMPTY);
        }
    }
}


/// Checks if point `p` belongs to the line specified by `v0`, `v1`.
fn point_belongs_to_line(p: &Point, v0: &Point, v1: &Point) -> bool {
    orientation(v0, v1, p) == 0
}


/// Returns the doubled signed area of triangle `(a, b, c)`.
fn orientation(a: &Point, b: &Point, c: &Point) -> i64 {
    (b.x as i64 - a.x as i64) * (c.y as i64 - a.y as i64) -
    (c.x as i64 - a.x as i64) * (b.y as i64 - a.y as i64)
}


fn dist_sq(a: &Point, b: &Point) -> i64 {
    sqr!(a.x as i64 - b.x as i64) + sqr!(a.y as i64 - b.y as i64)
}
