//! A module implementing lexical analysis (tokenization) of a command line.
//!
//! Tokens are exactly the runs of characters between whitespace. No quoting,
//! escaping or substitution is interpreted.

/// Token that requests background execution of the whole line.
pub const BACKGROUND_MARKER: &str = "&";

/// The result of tokenizing one command line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenizedLine {
    /// Every token of the line except background markers, in order.
    pub words: Vec<String>,
    /// Set when at least one `&` token was present, wherever it appeared.
    pub background: bool,
}

impl TokenizedLine {
    /// `true` when the line holds nothing to run (blank, or only `&`).
    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}

/// The main entry point function to perform lexical analysis.
///
/// Splits the line on whitespace and pulls out `&` tokens into the
/// background flag.
///
/// # Arguments
/// * `line` - The command line to be tokenized, without its trailing newline.
///
/// # Returns
/// A [`TokenizedLine`]; its `words` are empty when the line was blank.
pub fn split_into_tokens(line: &str) -> TokenizedLine {
    let mut out = TokenizedLine::default();
    for token in line.split_whitespace() {
        if token == BACKGROUND_MARKER {
            out.background = true;
        } else {
            out.words.push(token.to_string());
        }
    }
    out
}
