use std::fmt;
use std::str::FromStr;

/// Background offset of a sprite sheet, in pixels.
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

impl Position {
    #[inline]
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

impl From<(f32, f32)> for Position {
    fn from((x, y): (f32, f32)) -> Self {
        Self::new(x, y)
    }
}

/// CSS form, e.g. `-174px -852px`.
impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}px {}px", self.x, self.y)
    }
}

/// Error returned when a sprite-sheet position string cannot be parsed.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionParseError {
    pub message: String,
    /// The offending input, verbatim.
    pub input: String,
}

impl PositionParseError {
    fn new(msg: impl Into<String>, input: &str) -> Self {
        Self { message: msg.into(), input: input.to_string() }
    }
}

impl fmt::Display for PositionParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid position {:?}: {}", self.input, self.message)
    }
}

impl std::error::Error for PositionParseError {}

/// Parses `"x y"` with optional `px` suffixes: `"-174 -852"`, `"0px 12.5px"`.
impl FromStr for Position {
    type Err = PositionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split_whitespace();
        let (Some(x), Some(y), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(PositionParseError::new("expected two whitespace-separated numbers", s));
        };
        let axis = |v: &str, name: &str| {
            v.strip_suffix("px")
                .unwrap_or(v)
                .parse::<f32>()
                .map_err(|e| PositionParseError::new(format!("{name}: {e}"), s))
        };
        Ok(Self::new(axis(x, "x")?, axis(y, "y")?))
    }
}

/// Parses a whole sprite map, failing on the first bad entry.
pub fn parse_positions<S: AsRef<str>>(list: &[S]) -> Result<Vec<Position>, PositionParseError> {
    list.iter().map(|s| s.as_ref().parse()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_pair() {
        assert_eq!("-174 -852".parse::<Position>().unwrap(), Position::new(-174.0, -852.0));
    }

    #[test]
    fn parses_px_suffix_and_extra_spaces() {
        assert_eq!("  0px   12.5px ".parse::<Position>().unwrap(), Position::new(0.0, 12.5));
    }

    #[test]
    fn rejects_wrong_arity() {
        assert!("10".parse::<Position>().is_err());
        assert!("1 2 3".parse::<Position>().is_err());
        assert!("".parse::<Position>().is_err());
    }

    #[test]
    fn rejects_non_numbers() {
        let err = "left top".parse::<Position>().unwrap_err();
        assert_eq!(err.input, "left top");
        assert!(err.to_string().contains("x:"));
    }

    #[test]
    fn displays_as_css() {
        assert_eq!(Position::new(-10.0, 0.0).to_string(), "-10px 0px");
    }

    #[test]
    fn parse_positions_stops_at_first_error() {
        let ok = parse_positions(&["0 0", "-10 0"]).unwrap();
        assert_eq!(ok, vec![Position::new(0.0, 0.0), Position::new(-10.0, 0.0)]);
        assert!(parse_positions(&["0 0", "oops"]).is_err());
    }
}
