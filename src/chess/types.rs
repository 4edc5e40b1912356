use serde::{Deserialize, Serialize};
use std::fmt;

// --- Enums and Basic Structs ---

#[derive(Debug, Serialize, Deserialize, Copy, Clone, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Color { White, Black }

impl Color {
    pub fn opponent(&self) -> Color {
        match self { Color::White => Color::Black, Color::Black => Color::White }
    }

    /// Row the back-rank pieces start on.
    pub fn home_row(&self) -> u8 {
        match self { Color::White => 1, Color::Black => 8 }
    }

    /// Row a pawn of this color promotes on.
    pub fn promotion_row(&self) -> u8 {
        self.opponent().home_row()
    }

    /// Row a pawn of this color starts on (and may double-step from).
    pub fn pawn_row(&self) -> u8 {
        match self { Color::White => 2, Color::Black => 7 }
    }

    /// Row delta of a single pawn step forward.
    pub fn forward(&self) -> i8 {
        match self { Color::White => 1, Color::Black => -1 }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Color::White => write!(f, "WHITE"),
            Color::Black => write!(f, "BLACK"),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Copy, Clone, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PieceType { King, Queen, Rook, Bishop, Knight, Pawn }

impl PieceType {
    /// Types a pawn may promote to, in the order they are offered.
    pub const PROMOTIONS: [PieceType; 4] = [PieceType::Queen, PieceType::Rook, PieceType::Bishop, PieceType::Knight];

    pub fn symbol(&self) -> char {
        match self {
            PieceType::Pawn => 'p', PieceType::Knight => 'n', PieceType::Bishop => 'b',
            PieceType::Rook => 'r', PieceType::Queen => 'q', PieceType::King => 'k',
        }
    }

    pub fn from_symbol(c: char) -> Option<PieceType> {
        match c.to_ascii_lowercase() {
            'p' => Some(PieceType::Pawn), 'n' => Some(PieceType::Knight), 'b' => Some(PieceType::Bishop),
            'r' => Some(PieceType::Rook), 'q' => Some(PieceType::Queen), 'k' => Some(PieceType::King),
            _ => None,
        }
    }
}

impl fmt::Display for PieceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PieceType::King => "KING", PieceType::Queen => "QUEEN", PieceType::Rook => "ROOK",
            PieceType::Bishop => "BISHOP", PieceType::Knight => "KNIGHT", PieceType::Pawn => "PAWN",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Serialize, Deserialize, Copy, Clone, PartialEq, Eq, Hash)]
pub struct Piece {
    pub color: Color,
    #[serde(rename = "type")]
    pub kind: PieceType,
}

impl Piece {
    pub fn new(color: Color, kind: PieceType) -> Self { Piece { color, kind } }

    /// Parses a FEN-style letter: uppercase is WHITE, lowercase is BLACK.
    pub fn from_char(c: char) -> Option<Self> {
        let color = if c.is_ascii_uppercase() { Color::White } else { Color::Black };
        PieceType::from_symbol(c).map(|kind| Piece::new(color, kind))
    }
}

impl fmt::Display for Piece {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self.color {
            Color::White => self.kind.symbol().to_ascii_uppercase(),
            Color::Black => self.kind.symbol(),
        };
        write!(f, "{}", symbol)
    }
}

// --- Positions ---

/// A square, 1-based: row 1 is WHITE's back rank, column 1 is the a-file.
#[derive(Debug, Serialize, Deserialize, Copy, Clone, PartialEq, Eq, Hash)]
#[serde(try_from = "RawPosition")]
pub struct Position {
    row: u8,
    col: u8,
}

/// Unchecked coordinates as they appear in stored or received JSON.
#[derive(Deserialize)]
struct RawPosition {
    row: i32,
    col: i32,
}

impl TryFrom<RawPosition> for Position {
    type Error = String;

    fn try_from(raw: RawPosition) -> Result<Self, Self::Error> {
        Position::try_new(raw.row, raw.col)
            .ok_or_else(|| format!("square ({}, {}) is off the board", raw.row, raw.col))
    }
}

impl Position {
    /// Builds a position from coordinates already known to be on the board.
    pub const fn new(row: u8, col: u8) -> Self {
        debug_assert!(row >= 1 && row <= 8 && col >= 1 && col <= 8);
        Position { row, col }
    }

    /// Builds a position from untrusted coordinates.
    pub fn try_new(row: i32, col: i32) -> Option<Self> {
        if (1..=8).contains(&row) && (1..=8).contains(&col) {
            Some(Position { row: row as u8, col: col as u8 })
        } else {
            None
        }
    }

    pub fn row(&self) -> u8 { self.row }
    pub fn col(&self) -> u8 { self.col }

    /// The square `(dr, dc)` away, or None if that falls off the board.
    pub fn offset(&self, dr: i8, dc: i8) -> Option<Position> {
        Position::try_new(self.row as i32 + dr as i32, self.col as i32 + dc as i32)
    }

    /// Iterates all 64 squares, row by row from row 1.
    pub fn all() -> impl Iterator<Item = Position> {
        (1..=8u8).flat_map(|row| (1..=8u8).map(move |col| Position { row, col }))
    }

    /// Parses a square name such as "e4".
    pub fn from_algebraic(s: &str) -> Option<Position> {
        let mut chars = s.chars();
        let file_char = chars.next()?.to_ascii_lowercase();
        let rank_char = chars.next()?;
        if chars.next().is_some() { return None; }
        let col = match file_char { 'a'..='h' => file_char as u8 - b'a' + 1, _ => return None };
        let row = match rank_char { '1'..='8' => rank_char as u8 - b'0', _ => return None };
        Some(Position { row, col })
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let file_char = (b'a' + self.col - 1) as char;
        write!(f, "{}{}", file_char, self.row)
    }
}

// --- Move Representation ---

/// A move from `start` to `end`. Equality covers the promotion too, so a promotion move
/// and a plain move between the same squares are different moves.
#[derive(Debug, Serialize, Deserialize, Copy, Clone, PartialEq, Eq, Hash)]
pub struct Move {
    pub start: Position,
    pub end: Position,
    pub promotion: Option<PieceType>,
}

impl Move {
    pub fn new(start: Position, end: Position, promotion: Option<PieceType>) -> Self {
        Move { start, end, promotion }
    }

    pub fn plain(start: Position, end: Position) -> Self {
        Move { start, end, promotion: None }
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.start, self.end)?;
        if let Some(kind) = self.promotion {
            write!(f, "{}", kind.symbol())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn positions_print_and_parse_as_square_names() {
        let e4 = Position::new(4, 5);
        assert_eq!(e4.to_string(), "e4");
        assert_eq!(Position::from_algebraic("e4"), Some(e4));
        assert_eq!(Position::from_algebraic("H8"), Some(Position::new(8, 8)));
        assert_eq!(Position::from_algebraic("i1"), None);
        assert_eq!(Position::from_algebraic("a9"), None);
        assert_eq!(Position::from_algebraic("a10"), None);
    }

    #[test]
    fn off_board_coordinates_do_not_deserialize() {
        let e4: Position = serde_json::from_str(r#"{"row":4,"col":5}"#).expect("on the board");
        assert_eq!(e4, Position::new(4, 5));
        assert!(serde_json::from_str::<Position>(r#"{"row":0,"col":1}"#).is_err());
        assert!(serde_json::from_str::<Position>(r#"{"row":3,"col":9}"#).is_err());
        assert!(serde_json::from_str::<Position>(r#"{"row":-1,"col":2}"#).is_err());
    }

    #[test]
    fn offsets_stop_at_the_edge() {
        let a1 = Position::new(1, 1);
        assert_eq!(a1.offset(-1, 0), None);
        assert_eq!(a1.offset(0, -1), None);
        assert_eq!(a1.offset(2, 1), Some(Position::new(3, 2)));
        assert_eq!(Position::all().count(), 64);
    }

    #[test]
    fn promotion_is_part_of_move_identity() {
        let start = Position::new(7, 1);
        let end = Position::new(8, 1);
        assert_ne!(Move::plain(start, end), Move::new(start, end, Some(PieceType::Queen)));
        assert_ne!(Move::new(start, end, Some(PieceType::Rook)), Move::new(start, end, Some(PieceType::Queen)));
        assert_eq!(Move::new(start, end, Some(PieceType::Knight)).to_string(), "a7a8n");
    }

    #[test]
    fn pieces_serialize_with_screaming_names() {
        let json = serde_json::to_string(&Piece::new(Color::White, PieceType::Knight)).expect("piece serializes");
        assert_eq!(json, r#"{"color":"WHITE","type":"KNIGHT"}"#);
        assert_eq!(Piece::from_char('q'), Some(Piece::new(Color::Black, PieceType::Queen)));
        assert_eq!(Piece::new(Color::White, PieceType::King).to_string(), "K");
    }
}
