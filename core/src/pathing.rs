//! Mouse-click pathing (component I): a 4-neighborhood flood-fill over the
//! tile grid used to turn "click here" into a single next-step direction.
//!
//! Grounded on spec's description of the reference's `FUN_004081b8`: a
//! labels array seeded with 0=free/2=target/3=blocked and the origin cell
//! set to 6, flooded one ring at a time with three rotating labels
//! (6→4→5→6) so the wavefront can later be unwound into a direction by
//! reading which label is adjacent to the origin.

use crate::grid::Grid;

const FREE: u8 = 0;
const TARGET: u8 = 2;
const BLOCKED: u8 = 3;
const WAVE: [u8; 3] = [6, 4, 5];
/// Ring distance sentinel for a cell the flood fill never reached.
const UNVISITED: i32 = -1;

/// One of eight compass octants, matching the reference's direction encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Octant(pub u8);

/// `{primary direction, diagonal hint}` result of a path search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathStep {
    pub primary: Octant,
    pub diagonal: Octant,
}

const NEIGHBORS: [(i32, i32, u8); 4] = [(0, -1, 0), (1, 0, 2), (0, 1, 4), (-1, 0, 6)];

/// Builds the labels array for `grid`, marking `blocked` cells per `is_blocked`.
fn build_labels(grid: &Grid, is_blocked: impl Fn(i32, i32) -> bool) -> Vec<u8> {
    let (w, h) = (grid.width() as i32, grid.height() as i32);
    let mut labels = vec![FREE; (w * h) as usize];
    for y in 0..h {
        for x in 0..w {
            if is_blocked(x, y) {
                labels[(x + y * w) as usize] = BLOCKED;
            }
        }
    }
    labels
}

/// Flood-fills from `from` toward `to`, returning the first step's
/// direction octant, or `None` if `to` is unreachable.
pub fn find_path(
    grid: &Grid,
    from: (i32, i32),
    to: (i32, i32),
    is_blocked: impl Fn(i32, i32) -> bool,
) -> Option<PathStep> {
    let (w, h) = (grid.width() as i32, grid.height() as i32);
    if w == 0 || h == 0 {
        return None;
    }
    let mut labels = build_labels(grid, is_blocked);
    let idx = |x: i32, y: i32| -> usize {
        (x.rem_euclid(w) + y.rem_euclid(h) * w) as usize
    };

    labels[idx(to.0, to.1)] = TARGET;
    labels[idx(from.0, from.1)] = WAVE[0];

    if from == to {
        return None;
    }

    // Ring distance from `from`, tracked alongside the rotating display
    // labels so the unwind below can always step to the strict predecessor
    // ring instead of any same-or-earlier-ring neighbor (the rotating
    // 3-label wave repeats, so label equality alone can't tell ring N from
    // ring N+3).
    let mut rings = vec![UNVISITED; labels.len()];
    rings[idx(from.0, from.1)] = 0;

    let mut frontier = vec![from];
    let mut wave_idx = 0usize;
    let mut found = false;

    'outer: while !frontier.is_empty() {
        let label = WAVE[wave_idx % WAVE.len()];
        let ring = wave_idx as i32 + 1;
        let mut next = Vec::new();
        for &(cx, cy) in &frontier {
            for &(dx, dy, _dir) in &NEIGHBORS {
                let (nx, ny) = (cx + dx, cy + dy);
                let cell = idx(nx, ny);
                if labels[cell] == TARGET {
                    found = true;
                    break 'outer;
                }
                if labels[cell] == FREE {
                    labels[cell] = label;
                    rings[cell] = ring;
                    next.push((nx, ny));
                }
            }
        }
        if next.is_empty() {
            break;
        }
        frontier = next;
        wave_idx += 1;
    }

    if !found {
        return None;
    }

    // Unwind: walk back from `to` toward `from` by always stepping onto the
    // neighbor one ring closer to `from`, until we land on a cell adjacent
    // to `from` itself.
    let mut cur = to;
    let mut cur_ring = wave_idx as i32 + 1;
    let mut prev = to;
    loop {
        if cur == from {
            break;
        }
        let mut stepped = false;
        for &(dx, dy, _dir) in &NEIGHBORS {
            let (nx, ny) = (cur.0 + dx, cur.1 + dy);
            let cell = idx(nx, ny);
            if (nx, ny) == from {
                prev = cur;
                cur = (nx, ny);
                stepped = true;
                break;
            }
            if rings[cell] == cur_ring - 1 {
                prev = cur;
                cur = (nx, ny);
                cur_ring -= 1;
                stepped = true;
                break;
            }
        }
        if !stepped {
            break;
        }
        if cur == from {
            break;
        }
    }

    let step_dx = (prev.0 - from.0).signum();
    let step_dy = (prev.1 - from.1).signum();
    let (primary, diagonal) = octants_from_delta(step_dx, step_dy);
    Some(PathStep { primary, diagonal })
}

fn octants_from_delta(dx: i32, dy: i32) -> (Octant, Octant) {
    let oct = match (dx.signum(), dy.signum()) {
        (0, -1) => 0,
        (1, -1) => 1,
        (1, 0) => 2,
        (1, 1) => 3,
        (0, 1) => 4,
        (-1, 1) => 5,
        (-1, 0) => 6,
        (-1, -1) => 7,
        _ => 0,
    };
    let diag = (oct + 1) % 8;
    (Octant(oct), Octant(diag))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn straight_line_path_has_no_blockers() {
        let grid = Grid::new(8, 8);
        let step = find_path(&grid, (0, 0), (3, 0), |_, _| false);
        assert!(step.is_some());
    }

    #[test]
    fn same_cell_has_no_path() {
        let grid = Grid::new(8, 8);
        assert!(find_path(&grid, (2, 2), (2, 2), |_, _| false).is_none());
    }

    #[test]
    fn fully_blocked_target_is_unreachable() {
        let grid = Grid::new(4, 4);
        let step = find_path(&grid, (0, 0), (2, 2), |x, y| !(x == 0 && y == 0) && !(x == 2 && y == 2));
        assert!(step.is_none());
    }
}
