//! Bracket, parenthesis and quote tracking for splitting argument lists.

/// Delimits string literals. There is no escape sequence: every occurrence
/// toggles the quoted state.
pub const QUOTE_CHARACTER: char = '\'';

/// Tracks nesting depth over a character stream.
///
/// Bracket and parenthesis characters inside a quoted literal are ignored.
/// The quote character toggles state everywhere, including inside brackets or
/// parentheses. Depths may go negative on unbalanced input; detecting that is
/// left to whoever parses the resulting segments.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct NestingTracker {
    bracket_depth: isize,
    paren_depth: isize,
    in_quotes: bool,
}

impl NestingTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consumes one character.
    pub fn advance(&mut self, c: char) {
        if !self.in_quotes {
            match c {
                ']' => self.bracket_depth -= 1,
                '[' => self.bracket_depth += 1,
                ')' => self.paren_depth -= 1,
                '(' => self.paren_depth += 1,
                _ => {}
            }
        }
        if c == QUOTE_CHARACTER {
            self.in_quotes = !self.in_quotes;
        }
    }

    /// True outside every bracket, parenthesis and quoted literal.
    pub fn is_top_level(&self) -> bool {
        self.bracket_depth == 0 && self.paren_depth == 0 && !self.in_quotes
    }

    pub fn bracket_depth(&self) -> isize {
        self.bracket_depth
    }

    pub fn paren_depth(&self) -> isize {
        self.paren_depth
    }

    pub fn in_quotes(&self) -> bool {
        self.in_quotes
    }
}
