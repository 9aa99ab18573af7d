//! Tokenizer for the declarative CI format.
//!
//! The format is whitespace-insensitive outside quoted strings and braced
//! blocks:
//! ```text
//! uniquekey "UK_Name" {
//!   description "Unique \"name\" key"
//!   enable
//!   field "attribute\[Name\]" size 20
//! }
//! ```
//!
//! Braced blocks are returned as opaque text together with their absolute
//! offset so a nested [`Cursor`] can keep reporting positions relative to
//! the whole file.

use crate::error::{Error, Result};

/// A single token of declarative text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// Bare word (keyword, flag, choice value)
    Word(String),
    /// Quoted string, already decoded
    Str(String),
    /// Integer literal
    Number(i64),
    /// Content between a matching `{`/`}` pair
    Block {
        /// Raw text inside the braces
        content: String,
        /// Absolute byte offset of the first content byte
        offset: usize,
    },
}

impl Token {
    /// Short human-readable description for error messages.
    pub fn describe(&self) -> String {
        match self {
            Token::Word(w) => format!("word '{w}'"),
            Token::Str(s) => format!("string \"{s}\""),
            Token::Number(n) => format!("number {n}"),
            Token::Block { .. } => "block".to_string(),
        }
    }
}

/// Cursor over declarative text producing successive [`Token`]s.
#[derive(Debug, Clone)]
pub struct Cursor<'a> {
    src: &'a str,
    pos: usize,
    base: usize,
}

impl<'a> Cursor<'a> {
    /// Create a cursor over a whole document.
    pub fn new(src: &'a str) -> Self {
        Self::with_offset(src, 0)
    }

    /// Create a cursor over text that starts at `base` in the enclosing document.
    pub fn with_offset(src: &'a str, base: usize) -> Self {
        Self { src, pos: 0, base }
    }

    /// Absolute offset of the cursor.
    pub fn offset(&self) -> usize {
        self.base + self.pos
    }

    /// Whether only whitespace and comments remain.
    pub fn is_at_end(&mut self) -> bool {
        self.skip_trivia();
        self.pos >= self.src.len()
    }

    /// Absolute offset of the next token (after whitespace and comments).
    pub fn next_offset(&mut self) -> usize {
        self.skip_trivia();
        self.offset()
    }

    /// Look at the next token without consuming it.
    pub fn peek(&self) -> Result<Option<Token>> {
        self.clone().next_token()
    }

    /// Consume and return the next token, or `None` at end of input.
    pub fn next_token(&mut self) -> Result<Option<Token>> {
        self.skip_trivia();
        let Some(c) = self.src[self.pos..].chars().next() else {
            return Ok(None);
        };

        match c {
            '"' => self.read_string().map(Some),
            '{' => self.read_block().map(Some),
            '}' => Err(Error::parse(self.offset(), "unbalanced '}'")),
            _ => Ok(Some(self.read_word())),
        }
    }

    /// Consume a bare word.
    pub fn expect_word(&mut self, what: &str) -> Result<String> {
        let offset = self.next_offset();
        match self.next_token()? {
            Some(Token::Word(w)) => Ok(w),
            other => Err(unexpected(offset, what, other.as_ref())),
        }
    }

    /// Consume a text value: a quoted string, or a bare word or number
    /// taken literally.
    pub fn expect_text(&mut self, what: &str) -> Result<String> {
        let offset = self.next_offset();
        match self.next_token()? {
            Some(Token::Str(s) | Token::Word(s)) => Ok(s),
            Some(Token::Number(n)) => Ok(n.to_string()),
            other => Err(unexpected(offset, what, other.as_ref())),
        }
    }

    /// Consume an integer literal.
    pub fn expect_number(&mut self, what: &str) -> Result<i64> {
        let offset = self.next_offset();
        match self.next_token()? {
            Some(Token::Number(n)) => Ok(n),
            other => Err(unexpected(offset, what, other.as_ref())),
        }
    }

    /// Consume a braced block, returning its content and absolute offset.
    pub fn expect_block(&mut self, what: &str) -> Result<(String, usize)> {
        let offset = self.next_offset();
        match self.next_token()? {
            Some(Token::Block { content, offset }) => Ok((content, offset)),
            other => Err(unexpected(offset, what, other.as_ref())),
        }
    }

    /// Consume the next token if it is the bare word `word`.
    pub fn eat_word(&mut self, word: &str) -> Result<bool> {
        if matches!(self.peek()?, Some(Token::Word(ref w)) if w == word) {
            self.next_token()?;
            return Ok(true);
        }
        Ok(false)
    }

    /// Peek at the next token if it is a bare word.
    pub fn peek_word(&self) -> Result<Option<String>> {
        match self.peek()? {
            Some(Token::Word(w)) => Ok(Some(w)),
            _ => Ok(None),
        }
    }

    fn skip_trivia(&mut self) {
        loop {
            let rest = &self.src[self.pos..];
            let trimmed = rest.trim_start();
            self.pos += rest.len() - trimmed.len();

            if trimmed.starts_with('#') {
                let line_end = trimmed.find('\n').unwrap_or(trimmed.len());
                self.pos += line_end;
                continue;
            }
            break;
        }
    }

    fn read_string(&mut self) -> Result<Token> {
        let start = self.pos;
        let end = scan_string(self.src.as_bytes(), start)
            .ok_or_else(|| Error::parse(self.base + start, "unterminated quoted string"))?;
        let raw = &self.src[start + 1..end];
        self.pos = end + 1;
        Ok(Token::Str(decode(raw)))
    }

    fn read_block(&mut self) -> Result<Token> {
        let start = self.pos;
        let bytes = self.src.as_bytes();
        let mut depth = 0usize;
        let mut i = start;

        while i < bytes.len() {
            match bytes[i] {
                b'\\' => i += 1,
                b'"' => {
                    let open = i;
                    i = scan_string(bytes, open).ok_or_else(|| {
                        Error::parse(self.base + open, "unterminated quoted string")
                    })?;
                }
                b'#' if ends_token(bytes[i - 1]) => {
                    while i < bytes.len() && bytes[i] != b'\n' {
                        i += 1;
                    }
                    continue;
                }
                b'{' => depth += 1,
                b'}' => {
                    depth -= 1;
                    if depth == 0 {
                        let content = self.src[start + 1..i].to_string();
                        self.pos = i + 1;
                        return Ok(Token::Block {
                            content,
                            offset: self.base + start + 1,
                        });
                    }
                }
                _ => {}
            }
            i += 1;
        }

        Err(Error::parse(self.base + start, "unbalanced '{'"))
    }

    fn read_word(&mut self) -> Token {
        let rest = &self.src[self.pos..];
        let end = rest
            .find(|c: char| c.is_whitespace() || matches!(c, '"' | '{' | '}'))
            .unwrap_or(rest.len());
        let word = &rest[..end];
        self.pos += end;

        match word.parse::<i64>() {
            Ok(n) => Token::Number(n),
            Err(_) => Token::Word(word.to_string()),
        }
    }
}

/// Find the index of the closing quote for the string opening at `start`.
fn scan_string(bytes: &[u8], start: usize) -> Option<usize> {
    let mut i = start + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'"' => return Some(i),
            _ => i += 1,
        }
    }
    None
}

fn unexpected(offset: usize, what: &str, found: Option<&Token>) -> Error {
    let found = found.map_or_else(|| "end of input".to_string(), Token::describe);
    Error::parse(offset, format!("expected {what}, found {found}"))
}

/// Characters escaped by [`encode`].
const ESCAPED: [char; 6] = ['\\', '"', '$', '[', '{', '}'];

/// Escape text for embedding inside a quoted string.
pub fn encode(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if ESCAPED.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Reverse [`encode`].
///
/// Also understands `\]`, `\n` and `\t`, which hand-written files may use.
/// Any other escape sequence is kept literally.
pub fn decode(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();

    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some(e @ ('\\' | '"' | '$' | '[' | ']' | '{' | '}')) => out.push(e),
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

/// Encode and wrap text in double quotes.
pub fn quote(text: &str) -> String {
    format!("\"{}\"", encode(text))
}

/// Whether `text` can be written as a bare word and read back unchanged
/// as a word (not a number, not a comment, not a negated flag).
pub fn is_bare_word(text: &str) -> bool {
    !text.is_empty()
        && !text.starts_with('#')
        && !text.starts_with('!')
        && text.parse::<i64>().is_err()
        && text
            .chars()
            .all(|c| !c.is_whitespace() && !matches!(c, '"' | '{' | '}' | '\\'))
}

/// Whether a `#` right after `byte` starts a comment rather than
/// continuing a bare word.
fn ends_token(byte: u8) -> bool {
    byte.is_ascii_whitespace() || matches!(byte, b'"' | b'{' | b'}')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(src: &str) -> Vec<Token> {
        let mut cursor = Cursor::new(src);
        let mut out = Vec::new();
        while let Some(tok) = cursor.next_token().unwrap() {
            out.push(tok);
        }
        out
    }

    #[test]
    fn test_words_strings_numbers() {
        assert_eq!(
            tokens("field \"name\" size 20 !hidden"),
            vec![
                Token::Word("field".into()),
                Token::Str("name".into()),
                Token::Word("size".into()),
                Token::Number(20),
                Token::Word("!hidden".into()),
            ]
        );
    }

    #[test]
    fn test_whitespace_and_newlines_are_insignificant() {
        let a = tokens("description\n\n   \"x\"\t hidden");
        let b = tokens("description \"x\" hidden");
        assert_eq!(a, b);
    }

    #[test]
    fn test_comments_skipped() {
        let toks = tokens("# header\nhidden # trailing\n!enable");
        assert_eq!(
            toks,
            vec![Token::Word("hidden".into()), Token::Word("!enable".into())]
        );
    }

    #[test]
    fn test_comment_right_after_string_in_block() {
        let toks = tokens("{\n  description \"x\"# note { b\n}");
        assert_eq!(
            toks,
            vec![Token::Block {
                content: "\n  description \"x\"# note { b\n".into(),
                offset: 1,
            }]
        );

        let mut inner = Cursor::new("description \"x\"# note { b\n");
        assert_eq!(inner.next_token().unwrap(), Some(Token::Word("description".into())));
        assert_eq!(inner.next_token().unwrap(), Some(Token::Str("x".into())));
        assert_eq!(inner.next_token().unwrap(), None);
    }

    #[test]
    fn test_hash_inside_word_is_not_a_comment() {
        let toks = tokens("{ a#b { } }");
        assert!(matches!(&toks[..], [Token::Block { .. }]));
    }

    #[test]
    fn test_quoted_escapes() {
        let toks = tokens(r#""a\"b\\c\{d\}e\[f\]g\$h\ni\tj""#);
        assert_eq!(toks, vec![Token::Str("a\"b\\c{d}e[f]g$h\ni\tj".into())]);
    }

    #[test]
    fn test_block_offsets_and_nesting() {
        let src = "access {read {nested} \"}\"} x";
        let toks = tokens(src);
        assert_eq!(toks.len(), 3);
        match &toks[1] {
            Token::Block { content, offset } => {
                assert_eq!(content, "read {nested} \"}\"");
                assert_eq!(*offset, 8);
                assert_eq!(&src[*offset..*offset + 4], "read");
            }
            other => panic!("unexpected token {other:?}"),
        }
    }

    #[test]
    fn test_nested_cursor_reports_absolute_offset() {
        let src = "rule \"R\" {  bogus }";
        let mut cursor = Cursor::new(src);
        cursor.next_token().unwrap();
        cursor.next_token().unwrap();
        let (content, offset) = cursor.expect_block("body").unwrap();
        let mut inner = Cursor::with_offset(&content, offset);
        assert_eq!(inner.next_offset(), src.find("bogus").unwrap());
    }

    #[test]
    fn test_unterminated_quote_reports_offset() {
        let mut cursor = Cursor::new("description \"abc");
        cursor.next_token().unwrap();
        match cursor.next_token().unwrap_err() {
            Error::Parse { offset, message } => {
                assert_eq!(offset, 12);
                assert!(message.contains("unterminated"));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_unbalanced_braces() {
        match Cursor::new("  { a { b }").next_token().unwrap_err() {
            Error::Parse { offset, message } => {
                assert_eq!(offset, 2);
                assert!(message.contains("unbalanced"));
            }
            other => panic!("unexpected error {other:?}"),
        }

        let mut cursor = Cursor::new("a }");
        cursor.next_token().unwrap();
        assert!(matches!(
            cursor.next_token(),
            Err(Error::Parse { offset: 2, .. })
        ));
    }

    #[test]
    fn test_escaped_brace_inside_block() {
        let toks = tokens(r#"{ "a\}" \} }"#);
        assert_eq!(toks.len(), 1);
    }

    #[test]
    fn test_encode_decode_identity() {
        let samples = [
            "",
            "plain",
            "\\\"$[]{}",
            "multi\nline\ttext\n",
            "trailing backslash \\",
            "\\n is not a newline",
            "ünïcödé { $var } [cmd]",
        ];
        for s in samples {
            assert_eq!(decode(&encode(s)), s, "sample {s:?}");
        }
    }

    #[test]
    fn test_quote_round_trips_through_tokenizer() {
        let text = "say \"hi\" {to} [everyone] $HOME\\";
        let toks = tokens(&quote(text));
        assert_eq!(toks, vec![Token::Str(text.to_string())]);
    }

    #[test]
    fn test_is_bare_word() {
        assert!(is_bare_word("read"));
        assert!(is_bare_word("attribute[Name]"));
        assert!(!is_bare_word(""));
        assert!(!is_bare_word("two words"));
        assert!(!is_bare_word("42"));
        assert!(!is_bare_word("!neg"));
    }

    #[test]
    fn test_expect_helpers() {
        let mut cursor = Cursor::new("size 20 \"txt\" word");
        assert!(cursor.eat_word("size").unwrap());
        assert_eq!(cursor.expect_number("size").unwrap(), 20);
        assert_eq!(cursor.expect_text("text").unwrap(), "txt");
        assert_eq!(cursor.peek_word().unwrap().as_deref(), Some("word"));
        assert!(!cursor.eat_word("other").unwrap());
        assert!(cursor.expect_number("number").is_err());
    }
}
