//! Core type definitions used throughout the codebase

use serde::{Deserialize, Serialize};

/// Unique identifier for a fleet unit, assigned by the host engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UnitId(pub u32);

/// Unique identifier for a storage node (0 is always the home base)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u32);

impl NodeId {
    /// The home base node, present from game start
    pub const HOME: NodeId = NodeId(0);
}

/// Game tick counter (simulation time unit)
pub type Tick = u32;

/// Grid position. Coordinates are meaningful only after normalization
/// by a `WorldGrid`, which wraps them into map bounds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Pos {
    pub x: i32,
    pub y: i32,
}

impl Pos {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Raw component-wise offset; the result is unnormalized
    pub fn offset(&self, dx: i32, dy: i32) -> Self {
        Self { x: self.x + dx, y: self.y + dy }
    }
}

/// The four cardinal movement directions. "Stay" is not a direction;
/// it is expressed as `Command::Stay`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    North,
    South,
    East,
    West,
}

impl Direction {
    pub const ALL: [Direction; 4] =
        [Direction::North, Direction::South, Direction::East, Direction::West];

    /// Unnormalized cell delta for one step in this direction.
    /// North decreases y, South increases it.
    pub fn delta(&self) -> (i32, i32) {
        match self {
            Direction::North => (0, -1),
            Direction::South => (0, 1),
            Direction::East => (1, 0),
            Direction::West => (-1, 0),
        }
    }

    pub fn reverse(&self) -> Direction {
        match self {
            Direction::North => Direction::South,
            Direction::South => Direction::North,
            Direction::East => Direction::West,
            Direction::West => Direction::East,
        }
    }
}

/// One command in the per-tick batch sent back to the host.
///
/// Every owned unit gets exactly one of `Move`, `Stay`, or `Construct`
/// per tick; at most one `Spawn` is appended per tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Command {
    /// Move the unit one cell in the given direction
    Move { unit: UnitId, dir: Direction },
    /// Hold position (and harvest, if the cell has resource)
    Stay { unit: UnitId },
    /// Convert the unit into a storage node at its current position
    Construct { unit: UnitId },
    /// Produce a new unit at the home base
    Spawn,
}

impl Command {
    /// The unit this command addresses, if any
    pub fn unit(&self) -> Option<UnitId> {
        match self {
            Command::Move { unit, .. }
            | Command::Stay { unit }
            | Command::Construct { unit } => Some(*unit),
            Command::Spawn => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direction_reverse_is_involution() {
        for dir in Direction::ALL {
            assert_eq!(dir.reverse().reverse(), dir);
        }
    }

    #[test]
    fn test_direction_deltas_are_unit_steps() {
        for dir in Direction::ALL {
            let (dx, dy) = dir.delta();
            assert_eq!(dx.abs() + dy.abs(), 1);
        }
    }

    #[test]
    fn test_command_unit_extraction() {
        let id = UnitId(7);
        assert_eq!(Command::Move { unit: id, dir: Direction::North }.unit(), Some(id));
        assert_eq!(Command::Stay { unit: id }.unit(), Some(id));
        assert_eq!(Command::Construct { unit: id }.unit(), Some(id));
        assert_eq!(Command::Spawn.unit(), None);
    }

    #[test]
    fn test_unit_id_hash_lookup() {
        use std::collections::HashMap;
        let mut map: HashMap<UnitId, &str> = HashMap::new();
        map.insert(UnitId(3), "scout");
        assert_eq!(map.get(&UnitId(3)), Some(&"scout"));
        assert_eq!(map.get(&UnitId(4)), None);
    }
}
