use log::warn;
use std::{fmt, str::FromStr};
use thiserror::Error;

/// Placeholder for an artist or title that is empty after trimming.
pub const UNKNOWN: &str = "Unknown";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub artist: String,
    pub title: String,
    pub lyrics: String,
}

#[derive(Debug, Error)]
#[error("unknown {kind} {value:?}")]
pub struct ParseError {
    kind: &'static str,
    value: String,
}

impl ParseError {
    pub fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_owned(),
        }
    }
}

/// Delimited-text flavour of the dataset. One dialect per deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    /// `artist,title,link,lyrics`, fields optionally quoted, lyrics may span lines.
    QuotedComma,
    /// `artist|title|lyrics`, one physical line per row, no escaping.
    Pipe,
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dialect::QuotedComma => write!(f, "comma"),
            Dialect::Pipe => write!(f, "pipe"),
        }
    }
}

impl FromStr for Dialect {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "comma" | "csv" | "quoted-comma" => Ok(Dialect::QuotedComma),
            "pipe" | "psv" => Ok(Dialect::Pipe),
            _ => Err(ParseError::new("dialect", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FieldLimits {
    pub artist: Option<usize>,
    pub title: Option<usize>,
    pub lyrics: Option<usize>,
}

impl FieldLimits {
    /// Truncates oversized fields in place. Returns whether anything was cut.
    pub fn apply(&self, record: &mut Record) -> bool {
        let mut truncated = false;
        for (name, field, limit) in [
            ("artist", &mut record.artist, self.artist),
            ("title", &mut record.title, self.title),
            ("lyrics", &mut record.lyrics, self.lyrics),
        ] {
            if let Some(original) = truncate_chars(field, limit) {
                warn!(
                    "{} field truncated from {} to {} characters",
                    name,
                    original,
                    limit.unwrap_or_default()
                );
                truncated = true;
            }
        }
        truncated
    }
}

/// Returns the original character count when `field` had to be cut.
fn truncate_chars(field: &mut String, limit: Option<usize>) -> Option<usize> {
    let limit = limit?;
    let (cut, _) = field.char_indices().nth(limit)?;
    let original = field.chars().count();
    field.truncate(cut);
    Some(original)
}

/// Parses one logical row. `None` means the row is malformed.
pub(crate) fn parse_row(row: &str, dialect: Dialect) -> Option<Record> {
    let (artist, title, lyrics) = match dialect {
        Dialect::QuotedComma => {
            let (artist, rest) = next_quoted_field(row)?;
            let (title, rest) = next_quoted_field(rest)?;
            let (_link, rest) = next_quoted_field(rest)?;
            (artist, title, unquote_lyrics(rest))
        }
        Dialect::Pipe => {
            let mut fields = row.splitn(3, '|');
            let artist = fields.next()?.to_owned();
            let title = fields.next()?.to_owned();
            let lyrics = fields.next()?.to_owned();
            (artist, title, lyrics)
        }
    };

    Some(Record {
        artist: clean_name(&artist),
        title: clean_name(&title),
        lyrics: flatten_lines(&lyrics),
    })
}

/// Splits off the next comma-terminated field, honouring double quotes.
/// `None` when no unquoted separator follows.
fn next_quoted_field(input: &str) -> Option<(String, &str)> {
    let mut field = String::new();
    let mut quoted = false;
    let mut chars = input.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        match c {
            '"' if quoted => {
                if let Some((_, '"')) = chars.peek() {
                    field.push('"');
                    chars.next();
                } else {
                    quoted = false;
                }
            }
            '"' if field.trim().is_empty() => {
                field.clear();
                quoted = true;
            }
            ',' if !quoted => return Some((field, &input[i + 1..])),
            c => field.push(c),
        }
    }
    None
}

/// The lyrics take everything after the third separator. A quoted lyrics
/// field is unescaped, an unquoted one is kept verbatim (commas included).
fn unquote_lyrics(rest: &str) -> String {
    let rest = rest.trim_end_matches(|c| c == '\r' || c == '\n');
    let trimmed = rest.trim_start();
    match trimmed.strip_prefix('"') {
        Some(inner) => {
            let inner = inner.trim_end();
            let inner = inner.strip_suffix('"').unwrap_or(inner);
            inner.replace("\"\"", "\"")
        }
        None => rest.to_owned(),
    }
}

fn clean_name(raw: &str) -> String {
    let name = raw.trim_matches(|c: char| c.is_whitespace() || c == '"');
    if name.is_empty() {
        UNKNOWN.to_owned()
    } else {
        name.to_owned()
    }
}

fn flatten_lines(lyrics: &str) -> String {
    lyrics
        .trim()
        .chars()
        .map(|c| if c == '\n' || c == '\r' { ' ' } else { c })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quoted_comma_row() {
        let record = parse_row(
            "ABBA,\"Ahe's My Kind Of Girl\",/a/abba/ahes.html,\"Look at her face, it's a \"\"wonderful\"\" face\n  And it means\"\n",
            Dialect::QuotedComma,
        )
        .unwrap();
        assert_eq!(record.artist, "ABBA");
        assert_eq!(record.title, "Ahe's My Kind Of Girl");
        assert_eq!(
            record.lyrics,
            "Look at her face, it's a \"wonderful\" face   And it means"
        );
    }

    #[test]
    fn quotes_inside_an_unquoted_field_are_literal() {
        let record = parse_row("A,Don't say \"no\" twice,/l,lyrics", Dialect::QuotedComma).unwrap();
        assert_eq!(record.artist, "A");
        assert_eq!(record.title, "Don't say \"no\" twice");
        assert_eq!(record.lyrics, "lyrics");

        let record = parse_row("A, \"B, C\" ,/l,x", Dialect::QuotedComma).unwrap();
        assert_eq!(record.title, "B, C");
    }

    #[test]
    fn quoted_comma_artist_may_hold_a_comma() {
        let record = parse_row(
            "\"Earth, Wind & Fire\", September ,/e/ewf.html,do you remember",
            Dialect::QuotedComma,
        )
        .unwrap();
        assert_eq!(record.artist, "Earth, Wind & Fire");
        assert_eq!(record.title, "September");
        assert_eq!(record.lyrics, "do you remember");
    }

    #[test]
    fn unquoted_lyrics_keep_commas() {
        let record = parse_row("A,B,link,one, two, three\r\n", Dialect::QuotedComma).unwrap();
        assert_eq!(record.lyrics, "one, two, three");
    }

    #[test]
    fn missing_separators_are_malformed() {
        assert_eq!(parse_row("only,two fields\n", Dialect::QuotedComma), None);
        assert_eq!(parse_row("\n", Dialect::QuotedComma), None);
        assert_eq!(parse_row("artist|title without lyrics\n", Dialect::Pipe), None);
    }

    #[test]
    fn pipe_row() {
        let record = parse_row(" Queen |Bohemian Rhapsody|Is this the real life|x\n", Dialect::Pipe)
            .unwrap();
        assert_eq!(record.artist, "Queen");
        assert_eq!(record.title, "Bohemian Rhapsody");
        assert_eq!(record.lyrics, "Is this the real life|x");
    }

    #[test]
    fn empty_names_become_unknown() {
        let record = parse_row("\"\"|  |la la\n", Dialect::Pipe).unwrap();
        assert_eq!(record.artist, UNKNOWN);
        assert_eq!(record.title, UNKNOWN);
    }

    #[test]
    fn limits_truncate_on_char_boundaries() {
        let mut record = Record {
            artist: "Beyoncé Knowles".to_owned(),
            title: "Halo".to_owned(),
            lyrics: "ééééé".to_owned(),
        };
        let limits = FieldLimits {
            artist: Some(7),
            title: Some(10),
            lyrics: Some(3),
        };
        assert!(limits.apply(&mut record));
        assert_eq!(record.artist, "Beyoncé");
        assert_eq!(record.title, "Halo");
        assert_eq!(record.lyrics, "ééé");

        assert!(!limits.apply(&mut record));
    }

    #[test]
    fn dialect_from_str() {
        assert_eq!("comma".parse::<Dialect>().unwrap(), Dialect::QuotedComma);
        assert_eq!("PIPE".parse::<Dialect>().unwrap(), Dialect::Pipe);
        assert!("tsv".parse::<Dialect>().is_err());
    }
}
