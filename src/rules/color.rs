use serde::{Deserialize, Serialize};

/// One of the two players in a game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    White,
    Black,
}

impl Color {
    pub fn inverse(self) -> Color {
        match self {
            Color::White => Color::Black,
            Color::Black => Color::White,
        }
    }

    /// First letter of the color's name, used in the compact point encoding.
    pub fn to_short(self) -> &'static str {
        match self {
            Color::White => "w",
            Color::Black => "b",
        }
    }

    /// Inverse of `to_short`. Returns `None` for the empty string.
    pub fn from_short(short: &str) -> Result<Option<Color>, String> {
        match short {
            "" => Ok(None),
            "w" => Ok(Some(Color::White)),
            "b" => Ok(Some(Color::Black)),
            other => Err(format!("'{other}' is not a valid short color name")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inverse_round_trips() {
        assert_eq!(Color::White.inverse(), Color::Black);
        assert_eq!(Color::Black.inverse().inverse(), Color::Black);
    }

    #[test]
    fn short_round_trips() {
        for c in [Color::White, Color::Black] {
            assert_eq!(Color::from_short(c.to_short()).unwrap(), Some(c));
        }
        assert_eq!(Color::from_short("").unwrap(), None);
        assert!(Color::from_short("x").is_err());
    }
}
