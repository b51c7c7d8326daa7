// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

//! Deterministic synthetic captures for benchmarks.

use gpubound_core::{Capture, CounterRow, Result};

pub const SYNTHETIC_HEADERS: [&str; 16] = [
    "gpu__time_duration.sum",
    "gpu__time_active.sum",
    "Samples Passed",
    "Rasterized Primitives",
    "PS Invocations",
    "CS Invocations",
    "sm__inst_executed.sum",
    "dram__bytes_op_read.sum",
    "dram__bytes_op_write.sum",
    "l1tex__t_sector_hit_rate.pct",
    "lts__t_sector_hit_rate.pct",
    "smsp__warp_issue_stalled_long_scoreboard_per_warp_active.pct",
    "smsp__warp_issue_stalled_tex_throttle_per_warp_active.pct",
    "smsp__warp_issue_stalled_math_pipe_throttle_per_warp_active.pct",
    "smsp__warp_issue_stalled_not_selected_per_warp_active.pct",
    "smsp__warp_issue_stalled_barrier_per_warp_active.pct",
];

fn lcg_next(state: &mut u64) -> u64 {
    *state = state
        .wrapping_mul(6364136223846793005)
        .wrapping_add(1442695040888963407);
    *state
}

fn unit(state: &mut u64) -> f64 {
    (lcg_next(state) >> 11) as f64 / (1u64 << 53) as f64
}

/// Capture of `rows` draws with plausible counter ranges; every 17th cell is
/// left empty so missing-data paths are exercised.
pub fn synthetic_capture(rows: usize, seed: u64) -> Result<Capture> {
    let mut state = seed;
    let rows = (0..rows)
        .map(|_| {
            let time = 1.0e3 + unit(&mut state) * 5.0e6;
            let mut row = CounterRow::new();
            for (idx, header) in SYNTHETIC_HEADERS.iter().enumerate() {
                if lcg_next(&mut state) % 17 == 0 {
                    continue;
                }
                let value = match idx {
                    0 => time,
                    1 => time * (0.3 + 0.7 * unit(&mut state)),
                    2..=6 => (unit(&mut state) * 4.0e6).round(),
                    7 | 8 => unit(&mut state) * 6.4e7,
                    _ => unit(&mut state) * 100.0,
                };
                row.insert(*header, value);
            }
            row
        })
        .collect();

    Capture::new(
        SYNTHETIC_HEADERS.iter().map(|h| (*h).to_string()).collect(),
        rows,
    )
}

#[cfg(test)]
mod tests {
    use super::{SYNTHETIC_HEADERS, synthetic_capture};

    #[test]
    fn synthetic_capture_is_deterministic() {
        let a = synthetic_capture(32, 7).expect("synthetic headers are unique");
        let b = synthetic_capture(32, 7).expect("synthetic headers are unique");
        assert_eq!(a.rows(), b.rows());
        assert_eq!(a.headers().len(), SYNTHETIC_HEADERS.len());
    }
}
