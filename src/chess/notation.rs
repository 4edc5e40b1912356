//! Coordinate notation: `e2e4`, `e2 e4`, `e7e8q`, `e7-e8=Q`.

use lazy_static::lazy_static;
use regex::Regex;

use crate::chess::types::{Move, PieceType, Position};
use crate::error::NotationError;

lazy_static! {
    static ref MOVE_PATTERN: Regex =
        Regex::new(r"^(?i)([a-h][1-8])\s*[-x]?\s*([a-h][1-8])\s*=?\s*([a-z])?$").expect("move pattern compiles");
}

/// Parses a move typed by a person. Only the format is checked, not legality.
pub fn parse_move(input: &str) -> Result<Move, NotationError> {
    let trimmed = input.trim();
    let caps = MOVE_PATTERN
        .captures(trimmed)
        .ok_or_else(|| NotationError::InvalidFormat(trimmed.to_string()))?;

    let square = |i: usize| {
        caps.get(i)
            .and_then(|m| Position::from_algebraic(m.as_str()))
            .ok_or_else(|| NotationError::InvalidFormat(trimmed.to_string()))
    };
    let start = square(1)?;
    let end = square(2)?;

    let promotion = match caps.get(3).and_then(|m| m.as_str().chars().next()) {
        None => None,
        Some(c) => match PieceType::from_symbol(c) {
            Some(kind) if PieceType::PROMOTIONS.contains(&kind) => Some(kind),
            _ => return Err(NotationError::InvalidPromotion(c)),
        },
    };

    Ok(Move::new(start, end, promotion))
}

/// Human-readable description used in notifications, e.g. "e7 to e8, promoting to QUEEN".
pub fn describe_move(mv: &Move) -> String {
    match mv.promotion {
        Some(kind) => format!("{} to {}, promoting to {}", mv.start, mv.end, kind),
        None => format!("{} to {}", mv.start, mv.end),
    }
}
