//! Rules engine: turns pseudo-legal moves into legal ones and answers check, checkmate and
//! stalemate queries.
//!
//! Terminal conditions are queries, not stored states. `make_move` keeps accepting moves
//! after checkmate or stalemate; stopping play is up to the caller. The one stored terminal
//! fact is a resignation, set through [`ChessGame::resign`].

use serde::{Deserialize, Serialize};

use crate::chess::board::Board;
use crate::chess::movegen;
use crate::chess::types::{Color, Move, PieceType, Position};
use crate::error::MoveError;

/// How a finished game ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE", tag = "reason")]
pub enum Outcome {
    Checkmate { winner: Color },
    Stalemate,
    Resignation { winner: Color },
}

/// Board, side to move and move history. Serializes as the engine snapshot of a game record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChessGame {
    board: Board,
    turn: Color,
    history: Vec<Move>,
    #[serde(default)]
    resigned: Option<Color>,
}

impl Default for ChessGame {
    fn default() -> Self {
        ChessGame::new()
    }
}

impl ChessGame {
    /// Starting position, WHITE to move.
    pub fn new() -> Self {
        ChessGame::with_board(Board::starting(), Color::White)
    }

    /// A game from an arbitrary position with an empty history.
    pub fn with_board(board: Board, turn: Color) -> Self {
        ChessGame { board, turn, history: Vec::new(), resigned: None }
    }

    pub fn board(&self) -> &Board { &self.board }
    pub fn turn(&self) -> Color { self.turn }
    pub fn history(&self) -> &[Move] { &self.history }

    pub fn set_board(&mut self, board: Board) {
        self.board = board;
    }

    pub fn set_turn(&mut self, turn: Color) {
        self.turn = turn;
    }

    // --- Legal Move Generation ---

    /// Legal moves of the piece on `start`, or None if the square is empty. Includes castling
    /// for kings and en passant for pawns.
    pub fn valid_moves(&self, start: Position) -> Option<Vec<Move>> {
        let piece = self.board.get(start)?;
        let mut candidates = movegen::moves_from(&self.board, start);
        match piece.kind {
            PieceType::King => self.add_castle_moves(start, piece.color, &mut candidates),
            PieceType::Pawn => self.add_en_passant(start, piece.color, &mut candidates),
            _ => {}
        }
        candidates.retain(|mv| !self.leaves_in_check(mv, piece.color));
        Some(candidates)
    }

    /// Every legal move available to `color`.
    pub fn all_valid_moves(&self, color: Color) -> Vec<Move> {
        self.board
            .pieces(color)
            .filter_map(|(pos, _)| self.valid_moves(pos))
            .flatten()
            .collect()
    }

    fn has_any_valid_move(&self, color: Color) -> bool {
        self.board
            .pieces(color)
            .any(|(pos, _)| self.valid_moves(pos).is_some_and(|moves| !moves.is_empty()))
    }

    /// Tries `mv` on a copy of the board and reports whether `color`'s king is then attacked.
    fn leaves_in_check(&self, mv: &Move, color: Color) -> bool {
        let mut copy = self.board.copy();
        copy.apply(mv);
        in_check_on(&copy, color)
    }

    // --- Check Detection ---

    pub fn is_in_check(&self, color: Color) -> bool {
        in_check_on(&self.board, color)
    }

    pub fn is_in_checkmate(&self, color: Color) -> bool {
        self.is_in_check(color) && !self.has_any_valid_move(color)
    }

    pub fn is_in_stalemate(&self, color: Color) -> bool {
        !self.is_in_check(color) && !self.has_any_valid_move(color)
    }

    // --- Move Execution ---

    /// Validates `mv` against the side to move and its legal moves, then applies it.
    pub fn make_move(&mut self, mv: &Move) -> Result<(), MoveError> {
        let piece = self.board.get(mv.start).ok_or(MoveError::NoPiece(mv.start))?;
        if piece.color != self.turn {
            return Err(MoveError::NotYourTurn { piece: piece.color, turn: self.turn });
        }
        let legal = self.valid_moves(mv.start).unwrap_or_default();
        if !legal.contains(mv) {
            return Err(MoveError::Illegal(*mv));
        }

        self.board.apply(mv);
        self.history.push(*mv);
        self.turn = self.turn.opponent();
        Ok(())
    }

    // --- Game End ---

    /// Records that `color` gave up. Has no effect on a game that is already over.
    pub fn resign(&mut self, color: Color) {
        if !self.is_over() {
            self.resigned = Some(color);
        }
    }

    /// The result, if the game has ended by resignation or the side to move has no legal move.
    pub fn outcome(&self) -> Option<Outcome> {
        if let Some(loser) = self.resigned {
            return Some(Outcome::Resignation { winner: loser.opponent() });
        }
        if self.has_any_valid_move(self.turn) {
            return None;
        }
        if self.is_in_check(self.turn) {
            Some(Outcome::Checkmate { winner: self.turn.opponent() })
        } else {
            Some(Outcome::Stalemate)
        }
    }

    pub fn is_over(&self) -> bool {
        self.outcome().is_some()
    }

    // --- Special Moves ---

    fn has_moved_from(&self, position: Position) -> bool {
        self.history.iter().any(|mv| mv.start == position)
    }

    /// Castling candidates: king and rook unmoved, king not in check, the two squares the king
    /// crosses empty and not attacked (tested one step at a time), and for the long side the
    /// square next to the rook empty.
    fn add_castle_moves(&self, king_pos: Position, color: Color, moves: &mut Vec<Move>) {
        let row = color.home_row();
        if king_pos != Position::new(row, 5) || self.has_moved_from(king_pos) || self.is_in_check(color) {
            return;
        }

        for (rook_col, step) in [(8u8, 1i8), (1u8, -1i8)] {
            let rook_pos = Position::new(row, rook_col);
            let rook_ready = matches!(self.board.get(rook_pos), Some(p) if p.kind == PieceType::Rook && p.color == color)
                && !self.has_moved_from(rook_pos);
            if !rook_ready {
                continue;
            }
            if rook_col == 1 && self.board.get(Position::new(row, 2)).is_some() {
                continue;
            }
            if self.king_path_is_safe(king_pos, color, step) {
                moves.push(Move::plain(king_pos, Position::new(row, (5 + 2 * step) as u8)));
            }
        }
    }

    fn king_path_is_safe(&self, king_pos: Position, color: Color, step: i8) -> bool {
        let mut copy = self.board.copy();
        let mut current = king_pos;
        for _ in 0..2 {
            let Some(next) = current.offset(0, step) else { return false; };
            if self.board.get(next).is_some() {
                return false;
            }
            copy.apply(&Move::plain(current, next));
            if in_check_on(&copy, color) {
                return false;
            }
            current = next;
        }
        true
    }

    /// En passant candidate: the last move was an enemy pawn's double step landing beside `start`.
    fn add_en_passant(&self, start: Position, color: Color, moves: &mut Vec<Move>) {
        let Some(last) = self.history.last() else { return; };
        let Some(pawn) = self.board.get(last.end) else { return; };
        if pawn.kind != PieceType::Pawn || pawn.color == color {
            return;
        }
        let advanced = (last.end.row() as i8 - last.start.row() as i8).abs();
        let beside = start.row() == last.end.row() && (start.col() as i8 - last.end.col() as i8).abs() == 1;
        if advanced == 2 && beside {
            let skipped_row = (last.start.row() + last.end.row()) / 2;
            moves.push(Move::plain(start, Position::new(skipped_row, last.end.col())));
        }
    }
}

/// Whether `color`'s king stands on a square the other side can move to. A board without that
/// king is never in check.
fn in_check_on(board: &Board, color: Color) -> bool {
    match board.find_king(color) {
        Ok(king) => board.is_reachable_by(king, color.opponent()),
        Err(_) => false,
    }
}
