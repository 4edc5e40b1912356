//! The 8×8 board: piece placement and the raw move primitive.
//!
//! `Board::apply` does no legality checking. The rules engine uses it both for real moves
//! and, on a `copy()`, to try a move out before accepting it.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::chess::movegen;
use crate::chess::types::{Color, Move, Piece, PieceType, Position};
use crate::error::BoardError;

const BACK_ROW: [PieceType; 8] = [
    PieceType::Rook, PieceType::Knight, PieceType::Bishop, PieceType::Queen,
    PieceType::King, PieceType::Bishop, PieceType::Knight, PieceType::Rook,
];

/// Grid of optional pieces, `squares[row - 1][col - 1]`. This is also the wire shape of a board.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Board {
    squares: [[Option<Piece>; 8]; 8],
}

impl Board {
    /// An empty board.
    pub fn new() -> Self {
        Board::default()
    }

    /// The standard starting layout.
    pub fn starting() -> Self {
        let mut board = Board::new();
        for color in [Color::White, Color::Black] {
            for (i, kind) in BACK_ROW.iter().enumerate() {
                board.place(Position::new(color.home_row(), i as u8 + 1), Piece::new(color, *kind));
                board.place(Position::new(color.pawn_row(), i as u8 + 1), Piece::new(color, PieceType::Pawn));
            }
        }
        board
    }

    #[inline]
    fn slot(&self, position: Position) -> &Option<Piece> {
        &self.squares[position.row() as usize - 1][position.col() as usize - 1]
    }

    #[inline]
    fn slot_mut(&mut self, position: Position) -> &mut Option<Piece> {
        &mut self.squares[position.row() as usize - 1][position.col() as usize - 1]
    }

    /// Puts `piece` on `position`, replacing whatever was there.
    pub fn place(&mut self, position: Position, piece: Piece) {
        *self.slot_mut(position) = Some(piece);
    }

    /// Empties `position`, returning the piece that stood there.
    pub fn remove(&mut self, position: Position) -> Option<Piece> {
        self.slot_mut(position).take()
    }

    pub fn get(&self, position: Position) -> Option<Piece> {
        *self.slot(position)
    }

    /// Every occupied square holding a piece of `color`.
    pub fn pieces(&self, color: Color) -> impl Iterator<Item = (Position, Piece)> + '_ {
        Position::all().filter_map(move |pos| match self.get(pos) {
            Some(piece) if piece.color == color => Some((pos, piece)),
            _ => None,
        })
    }

    /// Union of the pseudo-legal moves of every `color` piece. Self-check is not filtered.
    pub fn legal_raw_moves(&self, color: Color) -> Vec<Move> {
        let mut moves = Vec::with_capacity(48);
        for (pos, piece) in self.pieces(color) {
            movegen::piece_moves(self, pos, piece, &mut moves);
        }
        moves
    }

    /// True if some `attacker` piece has a pseudo-legal move ending on `target`.
    pub fn is_reachable_by(&self, target: Position, attacker: Color) -> bool {
        self.legal_raw_moves(attacker).iter().any(|mv| mv.end == target)
    }

    pub fn find_king(&self, color: Color) -> Result<Position, BoardError> {
        self.pieces(color)
            .find(|(_, piece)| piece.kind == PieceType::King)
            .map(|(pos, _)| pos)
            .ok_or(BoardError::KingNotFound(color))
    }

    /// Relocates the piece on `mv.start` to `mv.end`, moving the rook along on a two-column
    /// king move, removing the bypassed pawn on a diagonal pawn move into an empty square,
    /// and swapping in the promotion type if one is given.
    pub fn apply(&mut self, mv: &Move) {
        let Some(mut piece) = self.remove(mv.start) else {
            return; // Nothing to move
        };
        let dc = mv.end.col() as i8 - mv.start.col() as i8;

        match piece.kind {
            PieceType::King if dc.abs() == 2 => {
                let row = mv.start.row();
                let (rook_from, rook_to) = if dc > 0 {
                    (Position::new(row, 8), Position::new(row, 6))
                } else {
                    (Position::new(row, 1), Position::new(row, 4))
                };
                if let Some(rook) = self.remove(rook_from) {
                    self.place(rook_to, rook);
                }
            }
            PieceType::Pawn if dc != 0 && self.get(mv.end).is_none() => {
                self.remove(Position::new(mv.start.row(), mv.end.col())); // En passant capture
            }
            _ => {}
        }

        if let Some(kind) = mv.promotion {
            piece.kind = kind;
        }
        self.place(mv.end, piece);
    }

    /// Independent copy for trying moves out without touching this board.
    pub fn copy(&self) -> Board {
        self.clone()
    }

    /// Builds a board from eight rank strings, row 8 first, `.` for empty squares.
    /// Used for setting up positions in tests and tools.
    pub fn from_rows(rows: [&str; 8]) -> Option<Board> {
        let mut board = Board::new();
        for (i, line) in rows.iter().enumerate() {
            let row = 8 - i as u8;
            let chars: Vec<char> = line.chars().filter(|c| !c.is_whitespace()).collect();
            if chars.len() != 8 { return None; }
            for (j, c) in chars.into_iter().enumerate() {
                if c == '.' { continue; }
                board.place(Position::new(row, j as u8 + 1), Piece::from_char(c)?);
            }
        }
        Some(board)
    }
}

impl Board {
    /// Text grid seen from `perspective`'s side: WHITE gets row 8 on top, BLACK row 1.
    pub fn render(&self, perspective: Color) -> String {
        self.render_marked(perspective, &[])
    }

    /// Like [`Board::render`], with each square in `marks` drawn as `*` when empty and `x`
    /// when a piece stands on it.
    pub fn render_marked(&self, perspective: Color, marks: &[Position]) -> String {
        let (rows, cols): (Vec<u8>, Vec<u8>) = match perspective {
            Color::White => ((1..=8).rev().collect(), (1..=8).collect()),
            Color::Black => ((1..=8).collect(), (1..=8).rev().collect()),
        };
        let mut out = String::from("  +-----------------+\n");
        for &row in &rows {
            out.push_str(&format!("{} | ", row));
            for &col in &cols {
                let square = Position::new(row, col);
                match (self.get(square), marks.contains(&square)) {
                    (Some(_), true) => out.push_str("x "),
                    (None, true) => out.push_str("* "),
                    (Some(piece), false) => out.push_str(&format!("{} ", piece)),
                    (None, false) => out.push_str(". "),
                }
            }
            out.push_str("|\n");
        }
        out.push_str("  +-----------------+\n    ");
        let files: Vec<String> = cols.iter().map(|&c| ((b'a' + c - 1) as char).to_string()).collect();
        out.push_str(&files.join(" "));
        out
    }
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.render(Color::White))
    }
}
