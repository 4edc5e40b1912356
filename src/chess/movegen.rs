//! Pseudo-legal move generation. Nothing here looks at whether the mover's king ends up in
//! check; `ChessGame` filters that afterwards.

use lazy_static::lazy_static;

use crate::chess::board::Board;
use crate::chess::types::{Color, Move, Piece, PieceType, Position};

const ORTHOGONALS: [(i8, i8); 4] = [(1, 0), (-1, 0), (0, 1), (0, -1)];
const DIAGONALS: [(i8, i8); 4] = [(1, 1), (1, -1), (-1, 1), (-1, -1)];
const KNIGHT_OFFSETS: [(i8, i8); 8] = [(2, 1), (2, -1), (-2, 1), (-2, -1), (1, 2), (1, -2), (-1, 2), (-1, -2)];

// --- Precomputed Jump Tables ---

lazy_static! {
    static ref KNIGHT_TARGETS: Vec<Vec<Position>> = compute_jump_targets(&KNIGHT_OFFSETS);
    static ref KING_TARGETS: Vec<Vec<Position>> = {
        let offsets: Vec<(i8, i8)> = ORTHOGONALS.iter().chain(DIAGONALS.iter()).copied().collect();
        compute_jump_targets(&offsets)
    };
}

#[inline]
fn square_index(position: Position) -> usize {
    (position.row() as usize - 1) * 8 + (position.col() as usize - 1)
}

/// For every square, the on-board squares reachable by one of `offsets`.
fn compute_jump_targets(offsets: &[(i8, i8)]) -> Vec<Vec<Position>> {
    let mut table = vec![Vec::new(); 64];
    for from in Position::all() {
        table[square_index(from)] = offsets.iter().filter_map(|&(dr, dc)| from.offset(dr, dc)).collect();
    }
    table
}

/// Appends the pseudo-legal moves of `piece` standing on `from`.
pub fn piece_moves(board: &Board, from: Position, piece: Piece, moves: &mut Vec<Move>) {
    match piece.kind {
        PieceType::Bishop => slide_moves(board, from, piece.color, &DIAGONALS, moves),
        PieceType::Rook => slide_moves(board, from, piece.color, &ORTHOGONALS, moves),
        PieceType::Queen => {
            slide_moves(board, from, piece.color, &DIAGONALS, moves);
            slide_moves(board, from, piece.color, &ORTHOGONALS, moves);
        }
        PieceType::Knight => jump_moves(board, from, piece.color, &KNIGHT_TARGETS[square_index(from)], moves),
        PieceType::King => jump_moves(board, from, piece.color, &KING_TARGETS[square_index(from)], moves),
        PieceType::Pawn => pawn_moves(board, from, piece.color, moves),
    }
}

/// Convenience wrapper returning the moves of whatever stands on `from`.
pub fn moves_from(board: &Board, from: Position) -> Vec<Move> {
    let mut moves = Vec::new();
    if let Some(piece) = board.get(from) {
        piece_moves(board, from, piece, &mut moves);
    }
    moves
}

/// Slides one square at a time in each direction, stopping at the first occupied square
/// and including it only if it holds an enemy piece.
fn slide_moves(board: &Board, from: Position, color: Color, directions: &[(i8, i8)], moves: &mut Vec<Move>) {
    for &(dr, dc) in directions {
        let mut current = from;
        while let Some(next) = current.offset(dr, dc) {
            match board.get(next) {
                None => moves.push(Move::plain(from, next)),
                Some(other) => {
                    if other.color != color {
                        moves.push(Move::plain(from, next));
                    }
                    break;
                }
            }
            current = next;
        }
    }
}

fn jump_moves(board: &Board, from: Position, color: Color, targets: &[Position], moves: &mut Vec<Move>) {
    for &to in targets {
        if board.get(to).map_or(true, |other| other.color != color) {
            moves.push(Move::plain(from, to));
        }
    }
}

/// Single push, double push from the start row, diagonal captures. Landing on the last row
/// yields the four promotion moves instead of a plain one. En passant is added by the engine.
fn pawn_moves(board: &Board, from: Position, color: Color, moves: &mut Vec<Move>) {
    let forward = color.forward();

    if let Some(one) = from.offset(forward, 0) {
        if board.get(one).is_none() {
            add_pawn_move(from, one, color, moves);
            if from.row() == color.pawn_row() {
                if let Some(two) = one.offset(forward, 0) {
                    if board.get(two).is_none() {
                        moves.push(Move::plain(from, two));
                    }
                }
            }
        }
    }

    for dc in [-1i8, 1i8] {
        let Some(target) = from.offset(forward, dc) else { continue; };
        if matches!(board.get(target), Some(other) if other.color != color) {
            add_pawn_move(from, target, color, moves);
        }
    }
}

fn add_pawn_move(from: Position, to: Position, color: Color, moves: &mut Vec<Move>) {
    if to.row() == color.promotion_row() {
        for kind in PieceType::PROMOTIONS {
            moves.push(Move::new(from, to, Some(kind)));
        }
    } else {
        moves.push(Move::plain(from, to));
    }
}
