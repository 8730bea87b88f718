//! Well-known-text geometry values.
//!
//! Remote stores ship geometries as WKT strings, optionally carrying an
//! `SRID=<n>;` prefix. [`Geometry::parse`] accepts that shape loosely
//! (any case, any spacing) and re-renders it in one canonical form so
//! that two spellings of the same shape hash identically.

use crate::canon::round6;
use std::fmt;

const KINDS: [&str; 7] = [
    "POINT",
    "LINESTRING",
    "POLYGON",
    "MULTIPOINT",
    "MULTILINESTRING",
    "MULTIPOLYGON",
    "GEOMETRYCOLLECTION",
];

const MODIFIERS: [&str; 4] = ["Z", "M", "ZM", "EMPTY"];

/// A parsed geometry: canonical WKT plus an optional spatial reference.
///
/// The WKT body is normalized on construction: keywords uppercased, one
/// space between keyword and opening paren, `, ` between coordinate
/// tuples, and coordinates rounded to six decimal places with trailing
/// zeros dropped (`POINT (1.123457 2.1)`).
#[derive(Debug, Clone, PartialEq)]
pub struct Geometry {
    srid: Option<u32>,
    kind: String,
    wkt: String,
    numbers: Vec<f64>,
}

impl Geometry {
    /// Parses a WKT string, with or without an `SRID=<n>;` prefix.
    ///
    /// Returns `None` when the text is not recognizable geometry:
    /// unknown type keyword, unbalanced parentheses, or stray tokens.
    /// Callers fall back to treating the text as a plain string.
    pub fn parse(text: &str) -> Option<Geometry> {
        let (srid, body) = split_srid(text);
        let tokens = tokenize(body)?;
        validate(&tokens)?;

        let kind = match &tokens[0] {
            Token::Word(word) => word.clone(),
            _ => return None,
        };
        let numbers = tokens
            .iter()
            .filter_map(|token| match token {
                Token::Num(value) => Some(*value),
                _ => None,
            })
            .collect();

        Some(Geometry {
            srid,
            kind,
            wkt: render(&tokens),
            numbers,
        })
    }

    /// Builds a two-dimensional point.
    pub fn point(x: f64, y: f64, srid: Option<u32>) -> Geometry {
        let x = round6(x);
        let y = round6(y);
        Geometry {
            srid,
            kind: "POINT".to_string(),
            wkt: format!("POINT ({} {})", fmt_num(x), fmt_num(y)),
            numbers: vec![x, y],
        }
    }

    /// Quick check whether a string starts like WKT, before a full parse.
    pub fn looks_like(text: &str) -> bool {
        let (_, body) = split_srid(text);
        let keyword: String = body
            .trim_start()
            .chars()
            .take_while(|c| c.is_ascii_alphabetic())
            .collect();
        KINDS.iter().any(|kind| keyword.eq_ignore_ascii_case(kind))
    }

    /// The spatial reference identifier, when one was given.
    pub fn srid(&self) -> Option<u32> {
        self.srid
    }

    /// The geometry type keyword, uppercase (`POINT`, `POLYGON`, ...).
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// The canonical WKT body, without any SRID prefix.
    pub fn wkt(&self) -> &str {
        &self.wkt
    }

    /// The canonical extended WKT, with the SRID prefix when present.
    pub fn ewkt(&self) -> String {
        match self.srid {
            Some(srid) => format!("SRID={};{}", srid, self.wkt),
            None => self.wkt.clone(),
        }
    }

    /// Returns a copy carrying the given spatial reference.
    pub fn with_srid(&self, srid: u32) -> Geometry {
        Geometry {
            srid: Some(srid),
            ..self.clone()
        }
    }

    /// The `(x, y)` of a plain two-dimensional point, `None` otherwise.
    pub fn point_coordinates(&self) -> Option<(f64, f64)> {
        if self.kind == "POINT" && self.numbers.len() == 2 {
            Some((self.numbers[0], self.numbers[1]))
        } else {
            None
        }
    }

    /// Expands a point into an axis-aligned square polygon.
    ///
    /// `buffer` is the half-width in coordinate units. The ring is
    /// closed (first tuple repeated last) and winds counter-clockwise.
    /// Returns `None` for anything that is not a 2D point.
    pub fn to_square(&self, buffer: f64) -> Option<Geometry> {
        let (x, y) = self.point_coordinates()?;
        let (x0, y0) = (round6(x - buffer), round6(y - buffer));
        let (x1, y1) = (round6(x + buffer), round6(y + buffer));
        let ring = [(x0, y0), (x1, y0), (x1, y1), (x0, y1), (x0, y0)];
        let tuples: Vec<String> = ring
            .iter()
            .map(|(x, y)| format!("{} {}", fmt_num(*x), fmt_num(*y)))
            .collect();
        let numbers = ring.iter().flat_map(|(x, y)| [*x, *y]).collect();
        Some(Geometry {
            srid: self.srid,
            kind: "POLYGON".to_string(),
            wkt: format!("POLYGON (({}))", tuples.join(", ")),
            numbers,
        })
    }
}

impl fmt::Display for Geometry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.ewkt())
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Word(String),
    Num(f64),
    Open,
    Close,
    Comma,
}

fn split_srid(text: &str) -> (Option<u32>, &str) {
    let trimmed = text.trim_start();
    // Byte comparison: a multi-byte char near the prefix must not panic.
    if trimmed.len() > 5 && trimmed.as_bytes()[..5].eq_ignore_ascii_case(b"SRID=") {
        if let Some(semi) = trimmed.find(';') {
            if let Ok(srid) = trimmed[5..semi].trim().parse::<u32>() {
                return (Some(srid), &trimmed[semi + 1..]);
            }
        }
    }
    (None, text)
}

fn tokenize(body: &str) -> Option<Vec<Token>> {
    let mut tokens = Vec::new();
    let bytes = body.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        let c = bytes[i] as char;
        if c.is_ascii_whitespace() {
            i += 1;
        } else if c == '(' {
            tokens.push(Token::Open);
            i += 1;
        } else if c == ')' {
            tokens.push(Token::Close);
            i += 1;
        } else if c == ',' {
            tokens.push(Token::Comma);
            i += 1;
        } else if c.is_ascii_alphabetic() {
            let start = i;
            while i < bytes.len() && (bytes[i] as char).is_ascii_alphabetic() {
                i += 1;
            }
            tokens.push(Token::Word(body[start..i].to_ascii_uppercase()));
        } else if c.is_ascii_digit() || c == '-' || c == '+' || c == '.' {
            let start = i;
            i += 1;
            while i < bytes.len() && matches!(bytes[i] as char, '0'..='9' | '.' | 'e' | 'E' | '+' | '-') {
                i += 1;
            }
            let value: f64 = body[start..i].parse().ok()?;
            if !value.is_finite() {
                return None;
            }
            tokens.push(Token::Num(value));
        } else {
            return None;
        }
    }
    if tokens.is_empty() {
        None
    } else {
        Some(tokens)
    }
}

fn validate(tokens: &[Token]) -> Option<()> {
    match &tokens[0] {
        Token::Word(word) if KINDS.contains(&word.as_str()) => {}
        _ => return None,
    }

    let mut depth = 0i32;
    let mut has_coords = false;
    let mut is_empty = false;
    for token in tokens {
        match token {
            Token::Word(word) => {
                if !KINDS.contains(&word.as_str()) && !MODIFIERS.contains(&word.as_str()) {
                    return None;
                }
                if word == "EMPTY" {
                    is_empty = true;
                }
            }
            Token::Open => depth += 1,
            Token::Close => {
                depth -= 1;
                if depth < 0 {
                    return None;
                }
            }
            Token::Num(_) => {
                if depth == 0 {
                    return None;
                }
                has_coords = true;
            }
            Token::Comma => {
                if depth == 0 {
                    return None;
                }
            }
        }
    }
    if depth != 0 || (!has_coords && !is_empty) {
        return None;
    }
    Some(())
}

fn render(tokens: &[Token]) -> String {
    let mut out = String::new();
    for token in tokens {
        match token {
            Token::Word(word) => {
                if !out.is_empty() && !out.ends_with('(') && !out.ends_with(' ') {
                    out.push(' ');
                }
                out.push_str(word);
            }
            Token::Open => {
                if out.ends_with(|c: char| c.is_ascii_alphabetic()) {
                    out.push(' ');
                }
                out.push('(');
            }
            Token::Close => out.push(')'),
            Token::Comma => out.push_str(", "),
            Token::Num(value) => {
                if out.ends_with(|c: char| c.is_ascii_digit()) {
                    out.push(' ');
                }
                out.push_str(&fmt_num(round6(*value)));
            }
        }
    }
    out
}

fn fmt_num(value: f64) -> String {
    // -0.0 == 0.0, so this folds negative zero away.
    let value = if value == 0.0 { 0.0 } else { value };
    format!("{}", value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_normalizes_case_and_spacing() {
        let g = Geometry::parse("point( 1.1234567   2.10 )").unwrap();
        assert_eq!(g.kind(), "POINT");
        assert_eq!(g.wkt(), "POINT (1.123457 2.1)");
        assert_eq!(g.srid(), None);
    }

    #[test]
    fn parse_srid_prefix() {
        let g = Geometry::parse("SRID=4326;POINT(30 10)").unwrap();
        assert_eq!(g.srid(), Some(4326));
        assert_eq!(g.wkt(), "POINT (30 10)");
        assert_eq!(g.ewkt(), "SRID=4326;POINT (30 10)");
    }

    #[test]
    fn parse_polygon_ring() {
        let g = Geometry::parse("POLYGON((0 0,0 1,1 1,0 0))").unwrap();
        assert_eq!(g.wkt(), "POLYGON ((0 0, 0 1, 1 1, 0 0))");
    }

    #[test]
    fn parse_collection_keeps_nested_keywords() {
        let g = Geometry::parse("GEOMETRYCOLLECTION(POINT(1 2),LINESTRING(0 0,1 1))").unwrap();
        assert_eq!(
            g.wkt(),
            "GEOMETRYCOLLECTION (POINT (1 2), LINESTRING (0 0, 1 1))"
        );
    }

    #[test]
    fn parse_empty_geometry() {
        let g = Geometry::parse("POINT EMPTY").unwrap();
        assert_eq!(g.wkt(), "POINT EMPTY");
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(Geometry::parse("CIRCLE (1 2)").is_none());
        assert!(Geometry::parse("POINT (1 2").is_none());
        assert!(Geometry::parse("POINT (a b)").is_none());
        assert!(Geometry::parse("hello world").is_none());
        assert!(Geometry::parse("1 2").is_none());
        assert!(Geometry::parse("").is_none());
    }

    #[test]
    fn malformed_srid_prefix_fails_parse() {
        // `=` is not a WKT token, so a bad prefix sinks the whole parse.
        assert!(Geometry::parse("SRID=abc;POINT (1 2)").is_none());
    }

    #[test]
    fn looks_like_is_cheap_prefix_check() {
        assert!(Geometry::looks_like("POINT (1 2)"));
        assert!(Geometry::looks_like("srid=4326;polygon((0 0,1 1,1 0,0 0))"));
        assert!(!Geometry::looks_like("POINTER (1 2)"));
        assert!(!Geometry::looks_like("a plain sentence"));
    }

    #[test]
    fn point_constructor_rounds() {
        let g = Geometry::point(1.12345678, -0.0000001, Some(4326));
        assert_eq!(g.wkt(), "POINT (1.123457 0)");
        assert_eq!(g.ewkt(), "SRID=4326;POINT (1.123457 0)");
    }

    #[test]
    fn point_expands_to_square() {
        let g = Geometry::point(10.0, 20.0, Some(4326));
        let square = g.to_square(0.5).unwrap();
        assert_eq!(
            square.wkt(),
            "POLYGON ((9.5 19.5, 10.5 19.5, 10.5 20.5, 9.5 20.5, 9.5 19.5))"
        );
        assert_eq!(square.srid(), Some(4326));
        assert!(square.to_square(0.5).is_none());
    }

    #[test]
    fn equal_shapes_from_different_spellings() {
        let a = Geometry::parse("SRID=4326; POINT (30.0 10.00)").unwrap();
        let b = Geometry::parse("srid=4326;point(30 10)").unwrap();
        assert_eq!(a, b);
    }
}
