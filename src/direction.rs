use std::fmt;
use std::str::FromStr;

use crate::error::ActorError;

/// Named facings understood by `lookat`, measured about +Y in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Front,
    Right,
    Back,
    Left,
    FrontRight,
    BackRight,
    BackLeft,
    FrontLeft,
}

impl Direction {
    pub const ALL: [Direction; 8] = [
        Direction::Front,
        Direction::Right,
        Direction::Back,
        Direction::Left,
        Direction::FrontRight,
        Direction::BackRight,
        Direction::BackLeft,
        Direction::FrontLeft,
    ];

    pub fn angle_degrees(self) -> f32 {
        match self {
            Direction::Front => 0.0,
            Direction::Right => 90.0,
            Direction::Back => 180.0,
            Direction::Left => 270.0,
            Direction::FrontRight => 45.0,
            Direction::BackRight => 135.0,
            Direction::BackLeft => 225.0,
            Direction::FrontLeft => -45.0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Front => "front",
            Direction::Right => "right",
            Direction::Back => "back",
            Direction::Left => "left",
            Direction::FrontRight => "frontright",
            Direction::BackRight => "backright",
            Direction::BackLeft => "backleft",
            Direction::FrontLeft => "frontleft",
        }
    }
}

impl FromStr for Direction {
    type Err = ActorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Direction::ALL
            .iter()
            .copied()
            .find(|dir| dir.as_str() == s)
            .ok_or_else(|| ActorError::UnknownDirection(s.to_string()))
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
