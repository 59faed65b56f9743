use eframe::egui::{Vec2, vec2};

use crate::layout::Viewport;

/// Upper end of the normalized coordinate range used in shared layouts.
pub const POSITION_SCALE: f32 = 1000.0;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PositionParseError {
    #[error("layout token {token:?} is not a number")]
    InvalidNumber { token: String },
    #[error("layout has {count} coordinates; expected x,y pairs")]
    OddCount { count: usize },
    #[error("layout describes {found} nodes but the subgraph has {expected}")]
    CountMismatch { expected: usize, found: usize },
}

/// Serializes node origins as `x1,y1,x2,y2,...` on the normalized scale.
pub fn export_positions(positions: impl IntoIterator<Item = Vec2>, viewport: Viewport) -> String {
    positions
        .into_iter()
        .flat_map(|pos| {
            [
                normalize(pos.x, viewport.width),
                normalize(pos.y, viewport.height),
            ]
        })
        .map(|value| value.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

fn normalize(value: f32, extent: f32) -> i64 {
    if extent <= 0.0 || !value.is_finite() {
        return 0;
    }
    (value / extent * POSITION_SCALE).round() as i64
}

/// Parses a shared layout into pixel positions, one per node in order.
/// Accepts commas, whitespace, or both as separators.
pub fn parse_positions(
    payload: &str,
    node_count: usize,
    viewport: Viewport,
) -> Result<Vec<Vec2>, PositionParseError> {
    let values = payload
        .split(|ch: char| ch == ',' || ch.is_whitespace())
        .filter(|token| !token.is_empty())
        .map(|token| {
            token
                .parse::<f32>()
                .ok()
                .filter(|value| value.is_finite())
                .ok_or_else(|| PositionParseError::InvalidNumber {
                    token: token.to_owned(),
                })
        })
        .collect::<Result<Vec<_>, _>>()?;

    if values.len() % 2 != 0 {
        return Err(PositionParseError::OddCount {
            count: values.len(),
        });
    }

    let found = values.len() / 2;
    if found != node_count {
        return Err(PositionParseError::CountMismatch {
            expected: node_count,
            found,
        });
    }

    Ok(values
        .chunks_exact(2)
        .map(|pair| {
            vec2(
                pair[0] / POSITION_SCALE * viewport.width,
                pair[1] / POSITION_SCALE * viewport.height,
            )
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exports_normalized_integers() {
        let viewport = Viewport::new(500.0, 200.0);
        let payload = export_positions([vec2(250.0, 50.0), vec2(0.0, 200.0)], viewport);
        assert_eq!(payload, "500,250,0,1000");
    }

    #[test]
    fn parses_comma_and_space_separated_payloads() {
        let viewport = Viewport::new(500.0, 200.0);
        let expected = vec![vec2(250.0, 50.0), vec2(0.0, 200.0)];
        assert_eq!(
            parse_positions("500,250,0,1000", 2, viewport),
            Ok(expected.clone())
        );
        assert_eq!(parse_positions("500 250 0 1000", 2, viewport), Ok(expected));
    }

    #[test]
    fn rejects_malformed_payloads() {
        let viewport = Viewport::new(100.0, 100.0);
        assert_eq!(
            parse_positions("1,2,x,4", 2, viewport),
            Err(PositionParseError::InvalidNumber {
                token: "x".to_owned()
            })
        );
        assert_eq!(
            parse_positions("1,2,3", 2, viewport),
            Err(PositionParseError::OddCount { count: 3 })
        );
        assert_eq!(
            parse_positions("1,2", 2, viewport),
            Err(PositionParseError::CountMismatch {
                expected: 2,
                found: 1
            })
        );
        assert_eq!(parse_positions("", 0, viewport), Ok(Vec::new()));
    }
}
