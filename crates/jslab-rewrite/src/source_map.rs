//! Source maps: rewritten-code position → submitted-source position.
//!
//! The JSON form follows the revision 3 source map format: one source, a
//! `mappings` string of Base64 VLQ segments separated by `,` within a
//! generated line and `;` between lines, and 0-based columns. Segments
//! that print an identifier carry a fifth field indexing `names`. In memory,
//! mappings are kept decoded with 1-based lines and columns, matching
//! [`jslab_types::Span`].

use jslab_types::Position;
use serde::{Deserialize, Serialize};

/// One generated → original correlation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mapping {
    pub generated: Position,
    pub original: Position,
    /// Index into [`SourceMap::names`].
    pub name: Option<u32>,
}

/// A decoded source map for one rewritten submission.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceMap {
    /// Name of the generated file (`jsl-eval-<id>`).
    pub file: String,
    /// Name of the original source.
    pub source: String,
    /// The submitted text, embedded for tooling.
    pub source_content: Option<String>,
    names: Vec<String>,
    mappings: Vec<Mapping>,
}

/// Serialized v3 layout.
#[derive(Debug, Serialize, Deserialize)]
struct RawSourceMap {
    version: u8,
    #[serde(default)]
    file: String,
    sources: Vec<String>,
    #[serde(rename = "sourcesContent", default)]
    sources_content: Vec<Option<String>>,
    #[serde(default)]
    names: Vec<String>,
    mappings: String,
}

impl SourceMap {
    pub fn new(file: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            source: source.into(),
            source_content: None,
            names: Vec::new(),
            mappings: Vec::new(),
        }
    }

    /// Record a mapping. Mappings must be added in generated order; an
    /// entry identical in generated position to the previous one replaces
    /// nothing and is dropped.
    pub fn add_mapping(&mut self, generated: Position, original: Position) {
        if let Some(last) = self.mappings.last() {
            if last.generated == generated {
                return;
            }
        }
        self.mappings.push(Mapping {
            generated,
            original,
            name: None,
        });
    }

    /// Record a mapping for an identifier. At the generated position of the
    /// previous mapping, the innermost node wins and that entry is replaced.
    pub fn add_named_mapping(&mut self, generated: Position, original: Position, name: &str) {
        let index = match self.names.iter().position(|n| n == name) {
            Some(i) => i as u32,
            None => {
                self.names.push(name.to_string());
                (self.names.len() - 1) as u32
            }
        };
        let mapping = Mapping {
            generated,
            original,
            name: Some(index),
        };
        match self.mappings.last_mut() {
            Some(last) if last.generated == generated => *last = mapping,
            _ => self.mappings.push(mapping),
        }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn mappings(&self) -> &[Mapping] {
        &self.mappings
    }

    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }

    /// Translate a generated position to the original position.
    ///
    /// Uses the greatest mapping on the same generated line whose column is
    /// at or before `column`. Returns `None` when the line has no such
    /// mapping.
    pub fn original_position_for(&self, line: u32, column: u32) -> Option<Position> {
        self.mappings
            .iter()
            .filter(|m| m.generated.line == line && m.generated.column <= column)
            .max_by_key(|m| m.generated.column)
            .map(|m| m.original)
    }

    /// Original position of the first identifier `name` printed at or after
    /// the generated position.
    pub fn name_position_after(&self, line: u32, column: u32, name: &str) -> Option<Position> {
        let index = self.names.iter().position(|n| n == name)? as u32;
        self.mappings
            .iter()
            .filter(|m| m.name == Some(index))
            .filter(|m| (m.generated.line, m.generated.column) >= (line, column))
            .min_by_key(|m| (m.generated.line, m.generated.column))
            .map(|m| m.original)
    }

    /// Serialize to v3 JSON.
    pub fn to_json(&self) -> String {
        let raw = RawSourceMap {
            version: 3,
            file: self.file.clone(),
            sources: vec![self.source.clone()],
            sources_content: vec![self.source_content.clone()],
            names: self.names.clone(),
            mappings: encode_mappings(&self.mappings),
        };
        serde_json::to_string(&raw).unwrap_or_default()
    }

    /// Deserialize from v3 JSON. Only single-source maps are accepted.
    pub fn from_json(json: &str) -> Option<Self> {
        let raw: RawSourceMap = serde_json::from_str(json).ok()?;
        if raw.version != 3 || raw.sources.len() != 1 {
            return None;
        }
        let mappings = decode_mappings(&raw.mappings)?;
        let known = raw.names.len() as u32;
        if mappings.iter().any(|m| m.name.is_some_and(|i| i >= known)) {
            return None;
        }
        Some(Self {
            file: raw.file,
            source: raw.sources.into_iter().next()?,
            source_content: raw.sources_content.into_iter().next().flatten(),
            names: raw.names,
            mappings,
        })
    }
}

// ── VLQ ──────────────────────────────────────────────────────────────────────

const BASE64: &[u8; 64] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

/// Append the Base64 VLQ encoding of `value`.
pub fn encode_vlq(value: i64, out: &mut String) {
    let mut v: u64 = if value < 0 {
        ((-value as u64) << 1) | 1
    } else {
        (value as u64) << 1
    };
    loop {
        let mut digit = (v & 0b11111) as u8;
        v >>= 5;
        if v > 0 {
            digit |= 0b100000;
        }
        out.push(BASE64[digit as usize] as char);
        if v == 0 {
            break;
        }
    }
}

/// Decode one VLQ value from the iterator.
pub fn decode_vlq(chars: &mut impl Iterator<Item = u8>) -> Option<i64> {
    let mut result: u64 = 0;
    let mut shift = 0;
    loop {
        let c = chars.next()?;
        let digit = BASE64.iter().position(|&b| b == c)? as u64;
        result |= (digit & 0b11111) << shift;
        if digit & 0b100000 == 0 {
            break;
        }
        shift += 5;
        if shift > 60 {
            return None;
        }
    }
    let negative = result & 1 == 1;
    let magnitude = (result >> 1) as i64;
    Some(if negative { -magnitude } else { magnitude })
}

fn encode_mappings(mappings: &[Mapping]) -> String {
    let mut sorted = mappings.to_vec();
    sorted.sort_by_key(|m| (m.generated.line, m.generated.column));

    let mut out = String::new();
    let mut line = 1;
    let mut prev_src_line = 0i64;
    let mut prev_src_col = 0i64;
    let mut prev_gen_col = 0i64;
    let mut prev_name = 0i64;
    let mut first_in_line = true;

    for m in &sorted {
        while line < m.generated.line {
            out.push(';');
            line += 1;
            prev_gen_col = 0;
            first_in_line = true;
        }
        if !first_in_line {
            out.push(',');
        }
        first_in_line = false;
        let gen_col = i64::from(m.generated.column) - 1;
        let src_line = i64::from(m.original.line) - 1;
        let src_col = i64::from(m.original.column) - 1;
        encode_vlq(gen_col - prev_gen_col, &mut out);
        encode_vlq(0, &mut out);
        encode_vlq(src_line - prev_src_line, &mut out);
        encode_vlq(src_col - prev_src_col, &mut out);
        if let Some(name) = m.name {
            encode_vlq(i64::from(name) - prev_name, &mut out);
            prev_name = i64::from(name);
        }
        prev_gen_col = gen_col;
        prev_src_line = src_line;
        prev_src_col = src_col;
    }
    out
}

fn decode_mappings(text: &str) -> Option<Vec<Mapping>> {
    let mut mappings = Vec::new();
    let mut src_line = 0i64;
    let mut src_col = 0i64;
    let mut name = 0i64;

    for (idx, line_text) in text.split(';').enumerate() {
        let mut gen_col = 0i64;
        for segment in line_text.split(',').filter(|s| !s.is_empty()) {
            let mut bytes = segment.bytes().peekable();
            gen_col += decode_vlq(&mut bytes)?;
            if bytes.peek().is_none() {
                continue;
            }
            let _source = decode_vlq(&mut bytes)?;
            src_line += decode_vlq(&mut bytes)?;
            src_col += decode_vlq(&mut bytes)?;
            let named = if bytes.peek().is_some() {
                name += decode_vlq(&mut bytes)?;
                Some(u32::try_from(name).ok()?)
            } else {
                None
            };
            mappings.push(Mapping {
                generated: Position::new(idx as u32 + 1, (gen_col + 1) as u32),
                original: Position::new((src_line + 1) as u32, (src_col + 1) as u32),
                name: named,
            });
        }
    }
    Some(mappings)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vlq(value: i64) -> String {
        let mut s = String::new();
        encode_vlq(value, &mut s);
        s
    }

    #[test]
    fn vlq_reference_values() {
        assert_eq!(vlq(0), "A");
        assert_eq!(vlq(1), "C");
        assert_eq!(vlq(-1), "D");
        assert_eq!(vlq(15), "e");
        assert_eq!(vlq(16), "gB");
        assert_eq!(vlq(-17), "jB");
        assert_eq!(vlq(1000), "w+B");
    }

    #[test]
    fn vlq_decode_inverts_encode() {
        for v in [0, 1, -1, 31, 32, -33, 123_456, -987_654] {
            let s = vlq(v);
            let mut it = s.bytes();
            assert_eq!(decode_vlq(&mut it), Some(v));
        }
    }

    #[test]
    fn mapping_string_matches_reference_layout() {
        let mut map = SourceMap::new("gen.js", "src.js");
        map.add_mapping(Position::new(1, 1), Position::new(1, 1));
        map.add_mapping(Position::new(1, 5), Position::new(1, 3));
        map.add_mapping(Position::new(3, 3), Position::new(2, 1));
        // (0,0,0,0) (4,0,0,2) ; ; (2,0,1,-2)
        assert_eq!(encode_mappings(map.mappings()), "AAAA,IAAE;;EACF");
    }

    #[test]
    fn greatest_lower_bound_lookup() {
        let mut map = SourceMap::new("gen.js", "src.js");
        map.add_mapping(Position::new(2, 3), Position::new(1, 1));
        map.add_mapping(Position::new(2, 10), Position::new(1, 8));
        assert_eq!(map.original_position_for(2, 12), Some(Position::new(1, 8)));
        assert_eq!(map.original_position_for(2, 9), Some(Position::new(1, 1)));
        assert_eq!(map.original_position_for(2, 1), None);
        assert_eq!(map.original_position_for(5, 1), None);
    }

    #[test]
    fn json_round_trip_preserves_mappings() {
        let mut map = SourceMap::new("jsl-eval-abc", "console");
        map.source_content = Some("1+1".into());
        map.add_mapping(Position::new(2, 3), Position::new(1, 1));
        map.add_mapping(Position::new(2, 10), Position::new(1, 3));
        let json = map.to_json();
        assert!(json.contains("\"version\":3"));
        assert!(json.contains("\"sourcesContent\":[\"1+1\"]"));
        let back = SourceMap::from_json(&json).expect("decode");
        assert_eq!(back, map);
    }

    #[test]
    fn named_segments_carry_a_fifth_field() {
        let mut map = SourceMap::new("gen.js", "src.js");
        map.add_mapping(Position::new(1, 1), Position::new(1, 1));
        map.add_named_mapping(Position::new(1, 5), Position::new(1, 3), "foo");
        map.add_named_mapping(Position::new(2, 1), Position::new(2, 1), "bar");
        assert_eq!(encode_mappings(map.mappings()), "AAAA,IAAEA;AACFC");

        let back = SourceMap::from_json(&map.to_json()).expect("decode");
        assert_eq!(back.names(), ["foo", "bar"]);
        assert_eq!(back.mappings()[2].name, Some(1));
        assert_eq!(back, map);
    }

    #[test]
    fn named_mapping_replaces_one_at_the_same_position() {
        let mut map = SourceMap::new("g", "s");
        map.add_mapping(Position::new(1, 1), Position::new(1, 1));
        map.add_named_mapping(Position::new(1, 1), Position::new(1, 2), "x");
        assert_eq!(map.mappings().len(), 1);
        assert_eq!(map.original_position_for(1, 1), Some(Position::new(1, 2)));
    }

    #[test]
    fn name_lookup_starts_at_the_given_position() {
        let mut map = SourceMap::new("g", "s");
        map.add_named_mapping(Position::new(1, 3), Position::new(1, 1), "a");
        map.add_named_mapping(Position::new(2, 3), Position::new(2, 7), "a");
        map.add_named_mapping(Position::new(2, 9), Position::new(2, 9), "b");
        assert_eq!(map.name_position_after(1, 1, "a"), Some(Position::new(1, 1)));
        assert_eq!(map.name_position_after(2, 1, "a"), Some(Position::new(2, 7)));
        assert_eq!(map.name_position_after(2, 4, "a"), None);
        assert_eq!(map.name_position_after(1, 1, "c"), None);
    }

    #[test]
    fn unknown_name_index_is_rejected() {
        let json = r#"{"version":3,"sources":["s"],"names":[],"mappings":"AAAAA"}"#;
        assert!(SourceMap::from_json(json).is_none());
    }

    #[test]
    fn duplicate_generated_positions_are_dropped() {
        let mut map = SourceMap::new("g", "s");
        map.add_mapping(Position::new(1, 1), Position::new(1, 1));
        map.add_mapping(Position::new(1, 1), Position::new(4, 4));
        assert_eq!(map.mappings().len(), 1);
    }
}
