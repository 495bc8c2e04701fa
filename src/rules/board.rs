use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashSet;

use super::color::Color;

/// A single intersection on the board.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Point {
    pub color: Option<Color>,
    pub marked_dead: bool,
    pub counted: bool,
    pub counts_for: Option<Color>,
}

/// Wire shape of a `Point`: `[colorShort, markedDead, counted, countsForShort]`.
#[derive(Serialize, Deserialize)]
struct PointTuple(String, bool, bool, String);

impl Serialize for Point {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        PointTuple(
            self.color.map(Color::to_short).unwrap_or("").to_string(),
            self.marked_dead,
            self.counted,
            self.counts_for.map(Color::to_short).unwrap_or("").to_string(),
        )
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Point {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let PointTuple(color, marked_dead, counted, counts_for) =
            PointTuple::deserialize(deserializer)?;
        Ok(Point {
            color: Color::from_short(&color).map_err(DeError::custom)?,
            marked_dead,
            counted,
            counts_for: Color::from_short(&counts_for).map_err(DeError::custom)?,
        })
    }
}

/// Square board of `size * size` points. `board[row][col]` addresses a point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Board {
    pub size: usize,
    points: Vec<Vec<Point>>,
}

#[derive(Serialize, Deserialize)]
struct BoardWire {
    size: usize,
    points: Vec<Vec<Point>>,
}

impl Serialize for Board {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        BoardWire {
            size: self.size,
            points: self.points.clone(),
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Board {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let wire = BoardWire::deserialize(deserializer)?;
        Ok(Board {
            size: wire.size,
            points: wire.points,
        })
    }
}

impl Board {
    pub fn new(size: usize) -> Self {
        Board {
            size,
            points: vec![vec![Point::default(); size]; size],
        }
    }

    pub fn in_bounds(&self, coords: (usize, usize)) -> bool {
        coords.0 < self.size && coords.1 < self.size
    }

    pub fn get(&self, coords: (usize, usize)) -> &Point {
        &self.points[coords.0][coords.1]
    }

    pub fn get_mut(&mut self, coords: (usize, usize)) -> &mut Point {
        &mut self.points[coords.0][coords.1]
    }

    pub fn neighbors(&self, coords: (usize, usize)) -> Vec<(usize, usize)> {
        let (r, c) = coords;
        let mut out = Vec::with_capacity(4);
        if r > 0 {
            out.push((r - 1, c));
        }
        if c > 0 {
            out.push((r, c - 1));
        }
        if r + 1 < self.size {
            out.push((r + 1, c));
        }
        if c + 1 < self.size {
            out.push((r, c + 1));
        }
        out
    }

    /// Flood-fill the connected group of same-colored stones containing
    /// `coords`, and report whether that group has at least one liberty
    /// (adjacent empty point).
    pub fn group_and_liberties(&self, coords: (usize, usize)) -> (HashSet<(usize, usize)>, bool) {
        let color = self.get(coords).color;
        let mut group = HashSet::new();
        let mut stack = vec![coords];
        let mut has_liberty = false;

        while let Some(cur) = stack.pop() {
            if !group.insert(cur) {
                continue;
            }
            for n in self.neighbors(cur) {
                match self.get(n).color {
                    None => has_liberty = true,
                    Some(c) if Some(c) == color => {
                        if !group.contains(&n) {
                            stack.push(n);
                        }
                    }
                    Some(_) => {}
                }
            }
        }

        (group, has_liberty)
    }

    /// Flood-fill an empty region starting at `coords` (treating dead-marked
    /// stones as already-removed, i.e. empty), returning the region's points
    /// and the set of live colors bordering it.
    pub fn empty_region(
        &self,
        coords: (usize, usize),
        is_empty: impl Fn(&Point) -> bool,
    ) -> (HashSet<(usize, usize)>, HashSet<Color>) {
        let mut region = HashSet::new();
        let mut borders = HashSet::new();
        let mut stack = vec![coords];

        while let Some(cur) = stack.pop() {
            if !region.insert(cur) {
                continue;
            }
            for n in self.neighbors(cur) {
                let p = self.get(n);
                if is_empty(p) {
                    if !region.contains(&n) {
                        stack.push(n);
                    }
                } else if let Some(c) = p.color {
                    borders.insert(c);
                }
            }
        }

        (region, borders)
    }

    pub fn all_coords(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        (0..self.size).flat_map(move |r| (0..self.size).map(move |c| (r, c)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn point_round_trips() {
        let p = Point {
            color: Some(Color::White),
            marked_dead: true,
            counted: false,
            counts_for: None,
        };
        let json = serde_json::to_value(&p).unwrap();
        assert_eq!(json, serde_json::json!(["w", true, false, ""]));
        let back: Point = serde_json::from_value(json).unwrap();
        assert_eq!(back, p);
    }

    #[test]
    fn board_round_trips() {
        let b = Board::new(9);
        let json = serde_json::to_value(&b).unwrap();
        let back: Board = serde_json::from_value(json).unwrap();
        assert_eq!(b, back);
    }

    #[test]
    fn neighbors_respect_edges() {
        let b = Board::new(3);
        assert_eq!(b.neighbors((0, 0)).len(), 2);
        assert_eq!(b.neighbors((1, 1)).len(), 4);
        assert_eq!(b.neighbors((2, 2)).len(), 2);
    }
}
