//! Residue-residue contact maps in RR format.
//!
//! Each line is `i j 0 distance` with 1-based residue indices, listing the
//! pairs at least `min_separation` apart in sequence whose predicted distance
//! falls below the contact threshold.

use std::fmt::Write;

use super::WriteError;

pub fn contact_map(
    distances: &[Vec<f32>],
    threshold: f32,
    min_separation: usize,
) -> Result<String, WriteError> {
    let len = distances.len();
    if let Some(row) = distances.iter().position(|row| row.len() != len) {
        return Err(WriteError::Malformed(format!(
            "distance matrix row {} has {} columns, expected {len}",
            row + 1,
            distances[row].len()
        )));
    }

    let mut out = String::new();
    for (i, row) in distances.iter().enumerate() {
        for (j, &distance) in row.iter().enumerate().skip(i + min_separation) {
            if distance < threshold {
                let _ = writeln!(out, "{} {} 0 {distance:.2}", i + 1, j + 1);
            }
        }
    }
    Ok(out)
}
