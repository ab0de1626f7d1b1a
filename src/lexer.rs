use logos::Logos;

#[derive(Logos, Debug, PartialEq, Clone)]
#[logos(skip r"[ \t\r\n\f]+|;[^\n]*")] // whitespace, comment
pub enum Token {
    // ── Separators ───────────────────────────
    #[token(",")]
    Comma,

    // ── Words (mnemonic, directive, id, operand) ─
    #[regex(r"[^ \t\r\n\f,;]+", |lex| lex.slice().to_string())]
    Word(String),
}

/// One line of the source as typed, with its 1-based number.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceLine {
    pub number: usize,
    pub text: String,
}

impl SourceLine {
    /// Whitespace/comma separated words of the line, comment removed.
    /// An empty result means there is nothing to assemble on this line.
    pub fn words(&self) -> Vec<String> {
        Token::lexer(&self.text)
            .filter_map(Result::ok)
            .filter_map(|tok| match tok {
                Token::Word(w) => Some(w),
                _ => None,
            })
            .collect()
    }
}

/// Split the source into trimmed, numbered lines. A trailing newline
/// still yields a last, empty line.
pub fn source_lines(src: &str) -> Vec<SourceLine> {
    src.split('\n')
        .enumerate()
        .map(|(i, text)| SourceLine {
            number: i + 1,
            text: text.trim().to_string(),
        })
        .collect()
}
