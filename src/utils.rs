//
// fmg_r - face morph generation
// Copyright (c) 2017 Filip Szczerek <ga.software@yahoo.com>
//
// This project is licensed under the terms of the MIT license
// (see the LICENSE file for details).
//
//
// File description:
//   Utilities.
//


macro_rules! sqr {
    ($x:expr) => { ($x) * ($x) }
}


/// Produces a range of specified length.
macro_rules! range { ($start:expr, $len:expr) => { $start .. $start + $len } }


/// Returns barycentric coordinates `(u, v)` (as `f64`) of point `p` in the triangle `(v0, v1, v2)`
/// (`p` can be outside the triangle). Works for integer and floating-point points.
macro_rules! calc_barycentric_coords {
    ($p:expr, $v0:expr, $v1:expr, $v2:expr) => {{
        let denom = ($v1.y as f64 - $v2.y as f64) * ($v0.x as f64 - $v2.x as f64) +
                    ($v2.x as f64 - $v1.x as f64) * ($v0.y as f64 - $v2.y as f64);

        ((($v1.y as f64 - $v2.y as f64) * ($p.x as f64 - $v2.x as f64) +
          ($v2.x as f64 - $v1.x as f64) * ($p.y as f64 - $v2.y as f64)) / denom,
         (($v2.y as f64 - $v0.y as f64) * ($p.x as f64 - $v2.x as f64) +
          ($v0.x as f64 - $v2.x as f64) * ($p.y as f64 - $v2.y as f64)) / denom)
    }}
}


/// Rounds `x` half away from zero and clamps it to the 8-bit channel range.
pub fn saturate_u8(x: f32) -> u8 {
    if x.is_nan() {
        0
    } else {
        x.round().max(0.0).min(255.0) as u8
    }
}


/// Maps `i` into `[0, n)` by reflection without repeating the edge element
/// (`...cb|abcd|cb...`).
pub fn reflect_101(i: i32, n: i32) -> usize {
    debug_assert!(n > 0);
    if n == 1 {
        return 0;
    }
    let period = 2 * n as i64 - 2;
    let r = (i as i64).rem_euclid(period);

    (if r >= n as i64 { period - r } else { r }) as usize
}


/// Clamps `i` into `[0, n)` (replicates the edge element).
pub fn clamp_index(i: i32, n: i32) -> usize {
    i.max(0).min(n - 1) as usize
}
