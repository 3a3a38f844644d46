//! DEX segment tokenizer.
//!
//! One segment per non-empty line: `CODE*field*field*...`. The tokenizer is
//! a pure function over the raw text; re-tokenizing the same blob yields
//! identical output. Nothing is validated here — a one-field line is still a
//! segment, and consumers that need positional data skip segments that are
//! too short.

/// A single parsed DEX line: leading segment code plus positional fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    /// Segment code, e.g. `"CA17"`, `"PA1"`, `"MA5"`.
    pub code: String,
    /// Positional data fields after the code, in document order.
    pub fields: Vec<String>,
}

impl Segment {
    /// Field at `idx`, or `None` when the segment is too short.
    pub fn field(&self, idx: usize) -> Option<&str> {
        self.fields.get(idx).map(String::as_str)
    }
}

/// Tokenize a raw DEX document into segments.
///
/// Accepts `\r\n` or `\n` separators. Blank lines are skipped. Splitting is
/// on `*`; the first token becomes the segment code, the rest the fields.
pub fn tokenize(raw: &str) -> Vec<Segment> {
    raw.lines()
        .map(|line| line.trim_end_matches('\r'))
        .filter(|line| !line.trim().is_empty())
        .map(|line| {
            let mut tokens = line.split('*');
            // split() always yields at least one token for a non-empty line.
            let code = tokens.next().unwrap_or_default().to_string();
            Segment {
                code,
                fields: tokens.map(str::to_string).collect(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenize_splits_code_and_fields() {
        let segs = tokenize("CA17*0*25*4\r\nVA1*100*4\n");
        assert_eq!(segs.len(), 2);
        assert_eq!(segs[0].code, "CA17");
        assert_eq!(segs[0].fields, vec!["0", "25", "4"]);
        assert_eq!(segs[1].code, "VA1");
        assert_eq!(segs[1].fields, vec!["100", "4"]);
    }

    #[test]
    fn tokenize_skips_blank_lines() {
        let segs = tokenize("\r\nPA1*10*150\n\n  \nPA2*3*450\n");
        assert_eq!(segs.len(), 2);
        assert_eq!(segs[0].code, "PA1");
        assert_eq!(segs[1].code, "PA2");
    }

    #[test]
    fn tokenize_keeps_short_lines_as_code_only_segments() {
        let segs = tokenize("DXS\nST*001*0001");
        assert_eq!(segs[0].code, "DXS");
        assert!(segs[0].fields.is_empty());
        assert_eq!(segs[1].fields.len(), 2);
    }

    #[test]
    fn tokenize_is_restartable() {
        let raw = "CA17*0*25*4\nMA5*ERROR*EGS";
        assert_eq!(tokenize(raw), tokenize(raw));
    }

    #[test]
    fn tokenize_preserves_empty_trailing_fields() {
        let segs = tokenize("MA5*ERROR*EGS**dS");
        assert_eq!(segs[0].fields, vec!["ERROR", "EGS", "", "dS"]);
    }
}
