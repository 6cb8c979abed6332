//! Single-step collision-free movement planning
//!
//! Given a unit and its goal, produce exactly one command and claim its
//! destination in the reservation table. Planning is greedy: primary
//! axis first, sidesteps next, backtrack last, stay as the final
//! fallback. Committed claims make later units route around earlier
//! ones, so processing order doubles as movement priority.

use rand::Rng;

use crate::control::reservation::ReservationTable;
use crate::core::types::{Command, Direction, Pos, UnitId};
use crate::world::grid::{Occupant, WorldGrid};

/// The cardinal direction from `from` to an adjacent cell `to`, if
/// they really are one step apart (wrap included)
pub fn direction_between(grid: &WorldGrid, from: Pos, to: Pos) -> Option<Direction> {
    let delta = grid.wrapped_delta(from, to);
    Direction::ALL.into_iter().find(|d| d.delta() == delta)
}

/// Destination cell of one step in `dir` from `from`, normalized
pub fn step(grid: &WorldGrid, from: Pos, dir: Direction) -> Pos {
    let (dx, dy) = dir.delta();
    grid.normalize(from.offset(dx, dy))
}

/// Whether an own unit may be routed onto `pos` this tick: the cell
/// must be unclaimed and not hold one of our own units. Opponents and
/// structures are acceptable destinations.
fn enterable(grid: &WorldGrid, reservations: &ReservationTable, pos: Pos) -> bool {
    if reservations.is_claimed(grid, pos) {
        return false;
    }
    !matches!(grid.occupant(pos), Occupant::Own(_))
}

/// Ordered candidate directions toward `goal`: primary axis, the two
/// sidesteps (goal-ward one first), then the reverse of the primary.
/// Axis ties are broken by the controller's seeded rng.
fn candidate_dirs<R: Rng>(grid: &WorldGrid, from: Pos, goal: Pos, rng: &mut R) -> [Direction; 4] {
    let (dx, dy) = grid.wrapped_delta(from, goal);
    let x_dir = if dx >= 0 { Direction::East } else { Direction::West };
    let y_dir = if dy >= 0 { Direction::South } else { Direction::North };

    let x_primary = match dx.abs().cmp(&dy.abs()) {
        std::cmp::Ordering::Greater => true,
        std::cmp::Ordering::Less => false,
        std::cmp::Ordering::Equal => rng.gen_bool(0.5),
    };

    if x_primary {
        let (side_a, side_b) = if dy != 0 {
            (y_dir, y_dir.reverse())
        } else if rng.gen_bool(0.5) {
            (Direction::North, Direction::South)
        } else {
            (Direction::South, Direction::North)
        };
        [x_dir, side_a, side_b, x_dir.reverse()]
    } else {
        let (side_a, side_b) = if dx != 0 {
            (x_dir, x_dir.reverse())
        } else if rng.gen_bool(0.5) {
            (Direction::East, Direction::West)
        } else {
            (Direction::West, Direction::East)
        };
        [y_dir, side_a, side_b, y_dir.reverse()]
    }
}

/// Plan one move toward `goal`, with sidestep and backtrack fallbacks.
/// Always commits: the returned command's destination is claimed, and a
/// stay claims the unit's own cell when still free.
pub fn plan_move<R: Rng>(
    grid: &WorldGrid,
    reservations: &mut ReservationTable,
    rng: &mut R,
    unit: UnitId,
    from: Pos,
    goal: Pos,
) -> Command {
    let from = grid.normalize(from);
    let goal = grid.normalize(goal);
    if from == goal {
        reservations.claim(grid, from, unit);
        return Command::Stay { unit };
    }

    for dir in candidate_dirs(grid, from, goal, rng) {
        let dest = step(grid, from, dir);
        if enterable(grid, reservations, dest) {
            reservations.claim(grid, dest, unit);
            return Command::Move { unit, dir };
        }
    }

    reservations.claim(grid, from, unit);
    Command::Stay { unit }
}

/// Plan the most direct move toward `goal` with no sidesteps; used by
/// homing units. Only goal-ward axes are tried, so a homing unit never
/// detours; an opponent on the goal cell does not stop it.
pub fn plan_direct(
    grid: &WorldGrid,
    reservations: &mut ReservationTable,
    unit: UnitId,
    from: Pos,
    goal: Pos,
) -> Command {
    let from = grid.normalize(from);
    let goal = grid.normalize(goal);
    if from == goal {
        reservations.claim(grid, from, unit);
        return Command::Stay { unit };
    }

    let (dx, dy) = grid.wrapped_delta(from, goal);
    let mut axes = [None, None];
    let x_dir = if dx > 0 { Direction::East } else { Direction::West };
    let y_dir = if dy > 0 { Direction::South } else { Direction::North };
    if dx.abs() >= dy.abs() {
        axes[0] = (dx != 0).then_some(x_dir);
        axes[1] = (dy != 0).then_some(y_dir);
    } else {
        axes[0] = (dy != 0).then_some(y_dir);
        axes[1] = (dx != 0).then_some(x_dir);
    }

    for dir in axes.into_iter().flatten() {
        let dest = step(grid, from, dir);
        if enterable(grid, reservations, dest) {
            reservations.claim(grid, dest, unit);
            return Command::Move { unit, dir };
        }
    }

    reservations.claim(grid, from, unit);
    Command::Stay { unit }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn rng() -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(42)
    }

    #[test]
    fn test_direction_between_adjacent_cells() {
        let grid = WorldGrid::new(8, 8);
        assert_eq!(
            direction_between(&grid, Pos::new(3, 3), Pos::new(4, 3)),
            Some(Direction::East)
        );
        // Across the seam
        assert_eq!(
            direction_between(&grid, Pos::new(0, 0), Pos::new(7, 0)),
            Some(Direction::West)
        );
        assert_eq!(direction_between(&grid, Pos::new(0, 0), Pos::new(2, 0)), None);
    }

    #[test]
    fn test_plan_move_prefers_primary_axis() {
        let grid = WorldGrid::new(16, 16);
        let mut table = ReservationTable::new();
        let cmd = plan_move(&grid, &mut table, &mut rng(), UnitId(1), Pos::new(2, 2), Pos::new(7, 4));
        assert_eq!(cmd, Command::Move { unit: UnitId(1), dir: Direction::East });
        assert!(table.is_claimed(&grid, Pos::new(3, 2)));
    }

    #[test]
    fn test_plan_move_sidesteps_reserved_cell() {
        let grid = WorldGrid::new(16, 16);
        let mut table = ReservationTable::new();
        table.claim(&grid, Pos::new(3, 2), UnitId(9));
        let cmd = plan_move(&grid, &mut table, &mut rng(), UnitId(1), Pos::new(2, 2), Pos::new(7, 4));
        // Primary (East) blocked, goal-ward sidestep is South
        assert_eq!(cmd, Command::Move { unit: UnitId(1), dir: Direction::South });
    }

    #[test]
    fn test_plan_move_never_targets_own_unit() {
        let mut grid = WorldGrid::new(16, 16);
        grid.cell_mut(Pos::new(3, 2)).occupant = Occupant::Own(UnitId(9));
        let mut table = ReservationTable::new();
        let cmd = plan_move(&grid, &mut table, &mut rng(), UnitId(1), Pos::new(2, 2), Pos::new(7, 2));
        match cmd {
            Command::Move { dir, .. } => assert_ne!(dir, Direction::East),
            other => panic!("expected a sidestep move, got {other:?}"),
        }
    }

    #[test]
    fn test_plan_move_stays_when_fully_blocked() {
        let grid = WorldGrid::new(16, 16);
        let mut table = ReservationTable::new();
        let from = Pos::new(5, 5);
        for neighbor in grid.neighbors(from) {
            table.claim(&grid, neighbor, UnitId(99));
        }
        let cmd = plan_move(&grid, &mut table, &mut rng(), UnitId(1), from, Pos::new(9, 9));
        assert_eq!(cmd, Command::Stay { unit: UnitId(1) });
        assert_eq!(table.claimant(&grid, from), Some(UnitId(1)));
    }

    #[test]
    fn test_plan_move_at_goal_stays_and_claims() {
        let grid = WorldGrid::new(16, 16);
        let mut table = ReservationTable::new();
        let cmd = plan_move(&grid, &mut table, &mut rng(), UnitId(1), Pos::new(4, 4), Pos::new(4, 4));
        assert_eq!(cmd, Command::Stay { unit: UnitId(1) });
        assert!(table.is_claimed(&grid, Pos::new(4, 4)));
    }

    #[test]
    fn test_plan_direct_pushes_onto_contested_goal() {
        let mut grid = WorldGrid::new(16, 16);
        grid.cell_mut(Pos::new(5, 4)).occupant = Occupant::Opponent;
        grid.cell_mut(Pos::new(5, 4)).structure = true;
        let mut table = ReservationTable::new();
        let cmd = plan_direct(&grid, &mut table, UnitId(1), Pos::new(5, 5), Pos::new(5, 4));
        assert_eq!(cmd, Command::Move { unit: UnitId(1), dir: Direction::North });
    }

    #[test]
    fn test_plan_direct_never_detours_backward() {
        let mut grid = WorldGrid::new(16, 16);
        // Both goal-ward axes blocked by own units
        grid.cell_mut(Pos::new(6, 5)).occupant = Occupant::Own(UnitId(8));
        grid.cell_mut(Pos::new(5, 6)).occupant = Occupant::Own(UnitId(9));
        let mut table = ReservationTable::new();
        let cmd = plan_direct(&grid, &mut table, UnitId(1), Pos::new(5, 5), Pos::new(8, 8));
        assert_eq!(cmd, Command::Stay { unit: UnitId(1) });
    }

    #[test]
    fn test_wrapped_routing_takes_seam_shortcut() {
        let grid = WorldGrid::new(16, 16);
        let mut table = ReservationTable::new();
        let cmd = plan_move(&grid, &mut table, &mut rng(), UnitId(1), Pos::new(0, 8), Pos::new(14, 8));
        assert_eq!(cmd, Command::Move { unit: UnitId(1), dir: Direction::West });
    }
}
