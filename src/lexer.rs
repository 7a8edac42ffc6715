use crate::Real;
use crate::error::{ExprError, Result};
use crate::nesting::{NestingTracker, QUOTE_CHARACTER};
use crate::types::TokenKind;

/// A token produced by the lexer.
///
/// `position` and `length` count characters, not bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub value: Option<Real>,
    pub text: String,
    pub position: usize,
    pub length: usize,
}

/// Raw text between a pair of delimiters, with the character offset of its
/// first character.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    pub text: String,
    pub position: usize,
}

const TWO_CHAR_OPERATORS: [&str; 9] = ["&&", "||", "<=", ">=", "<>", "<<", ">>", "==", "!="];
const ONE_CHAR_OPERATORS: &str = "+-*/%^!~&|<>=";

/// The lexer struct, which produces tokens from an input string.
#[derive(Clone)]
pub struct Lexer<'a> {
    input: &'a str,
    pos: usize,
    char_pos: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            input,
            pos: 0,
            char_pos: 0,
        }
    }

    /// Character offset of the next unread character.
    pub fn position(&self) -> usize {
        self.char_pos
    }

    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn peek_second(&self) -> Option<char> {
        self.input[self.pos..].chars().nth(1)
    }

    fn advance(&mut self) {
        if let Some(c) = self.peek() {
            self.pos += c.len_utf8();
            self.char_pos += 1;
        }
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.advance();
        }
    }

    fn token(&self, kind: TokenKind, start: usize, start_char: usize) -> Token {
        Token {
            kind,
            value: None,
            text: self.input[start..self.pos].to_string(),
            position: start_char,
            length: self.char_pos - start_char,
        }
    }

    /// Get the next token from the input, or `None` at the end.
    pub fn next_token(&mut self) -> Result<Option<Token>> {
        self.skip_whitespace();
        let start = self.pos;
        let start_char = self.char_pos;
        let Some(c) = self.peek() else {
            return Ok(None);
        };

        if c.is_ascii_digit() || (c == '.' && self.peek_second().is_some_and(|d| d.is_ascii_digit())) {
            return self.number(start, start_char).map(Some);
        }

        if c == QUOTE_CHARACTER {
            self.advance();
            while let Some(nc) = self.peek() {
                self.advance();
                if nc == QUOTE_CHARACTER {
                    let mut tok = self.token(TokenKind::Str, start, start_char);
                    // Strip the delimiters.
                    tok.text = tok.text[1..tok.text.len() - 1].to_string();
                    return Ok(Some(tok));
                }
            }
            return Err(ExprError::positioned(
                "Unterminated string literal",
                start_char,
                self.char_pos - start_char,
            ));
        }

        if c.is_alphabetic() || c == '_' {
            while self
                .peek()
                .is_some_and(|nc| nc.is_alphanumeric() || nc == '_' || nc == '.')
            {
                self.advance();
            }
            return Ok(Some(self.token(TokenKind::Identifier, start, start_char)));
        }

        let kind = match c {
            '(' | '[' => Some(TokenKind::Open),
            ')' | ']' => Some(TokenKind::Close),
            ',' => Some(TokenKind::Separator),
            _ => None,
        };
        if let Some(kind) = kind {
            self.advance();
            return Ok(Some(self.token(kind, start, start_char)));
        }

        let rest = &self.input[self.pos..];
        if TWO_CHAR_OPERATORS.iter().any(|op| rest.starts_with(op)) {
            self.advance();
            self.advance();
            return Ok(Some(self.token(TokenKind::Operator, start, start_char)));
        }
        if ONE_CHAR_OPERATORS.contains(c) {
            self.advance();
            return Ok(Some(self.token(TokenKind::Operator, start, start_char)));
        }

        Err(ExprError::positioned(
            format!("Unexpected character '{}'", c),
            start_char,
            1,
        ))
    }

    fn number(&mut self, start: usize, start_char: usize) -> Result<Token> {
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.advance();
        }
        if self.peek() == Some('.') {
            self.advance();
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                self.advance();
            }
        }
        if matches!(self.peek(), Some('e' | 'E')) {
            self.advance();
            if matches!(self.peek(), Some('+' | '-')) {
                self.advance();
            }
            let mut has_exp_digits = false;
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                has_exp_digits = true;
                self.advance();
            }
            if !has_exp_digits {
                return Err(ExprError::positioned(
                    "Missing exponent digits",
                    start_char,
                    self.char_pos - start_char,
                ));
            }
        }

        let mut tok = self.token(TokenKind::Number, start, start_char);
        let value = tok.text.parse::<Real>().map_err(|_| {
            ExprError::positioned(
                format!("Invalid number '{}'", tok.text),
                start_char,
                tok.length,
            )
        })?;
        tok.value = Some(value);
        Ok(tok)
    }

    /// Consumes raw text up to the delimiter closing an already consumed
    /// `open` delimiter, and the closing delimiter itself.
    ///
    /// Nesting and quotes are honoured the same way the argument splitter
    /// honours them, so the group can be split later without surprises.
    pub fn take_group(&mut self, open: char, open_position: usize) -> Result<Group> {
        let start = self.pos;
        let position = self.char_pos;
        let mut tracker = NestingTracker::new();

        while let Some(c) = self.peek() {
            let end = self.pos;
            tracker.advance(c);
            self.advance();
            let closed = match open {
                '[' => tracker.bracket_depth() < 0,
                _ => tracker.paren_depth() < 0,
            };
            if closed {
                return Ok(Group {
                    text: self.input[start..end].to_string(),
                    position,
                });
            }
        }

        Err(ExprError::positioned(
            format!("Unmatched '{}'", open),
            open_position,
            1,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(input: &str) -> Vec<Token> {
        let mut lexer = Lexer::new(input);
        let mut out = Vec::new();
        while let Some(tok) = lexer.next_token().unwrap() {
            out.push(tok);
        }
        out
    }

    #[test]
    fn test_token_kinds_and_positions() {
        let toks = tokens("5 * x >= 'a b'");
        let kinds: Vec<_> = toks.iter().map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::Number,
                TokenKind::Operator,
                TokenKind::Identifier,
                TokenKind::Operator,
                TokenKind::Str
            ]
        );
        assert_eq!(toks[0].value, Some(5.0));
        assert_eq!(toks[3].text, ">=");
        assert_eq!(toks[3].position, 6);
        assert_eq!(toks[4].text, "a b");
        assert_eq!(toks[4].position, 9);
        assert_eq!(toks[4].length, 5);
    }

    #[test]
    fn test_numbers() {
        let toks = tokens("1.5 .25 2e3 7E-1");
        let values: Vec<_> = toks.iter().map(|t| t.value.unwrap()).collect();
        assert_eq!(values, vec![1.5, 0.25, 2000.0, 0.7]);
        assert!(Lexer::new("2e").next_token().is_err());
    }

    #[test]
    fn test_dotted_identifiers() {
        let toks = tokens("prm.attribut.test2='good'");
        assert_eq!(toks[0].text, "prm.attribut.test2");
        assert_eq!(toks[1].text, "=");
        assert_eq!(toks[2].kind, TokenKind::Str);
    }

    #[test]
    fn test_positions_count_characters() {
        let toks = tokens("'été' + x");
        assert_eq!(toks[1].position, 6);
        assert_eq!(toks[2].position, 8);
    }

    #[test]
    fn test_errors_are_positioned() {
        let mut lexer = Lexer::new("1 + 'abc");
        lexer.next_token().unwrap();
        lexer.next_token().unwrap();
        assert_eq!(
            lexer.next_token().unwrap_err(),
            ExprError::positioned("Unterminated string literal", 4, 4)
        );

        let mut lexer = Lexer::new("a $ b");
        lexer.next_token().unwrap();
        assert_eq!(lexer.next_token().unwrap_err().span(), Some((2, 1)));
    }

    #[test]
    fn test_take_group() {
        let mut lexer = Lexer::new("[1, [2, ')'], (3)] + 1");
        let open = lexer.next_token().unwrap().unwrap();
        let group = lexer.take_group('[', open.position).unwrap();
        assert_eq!(group.text, "1, [2, ')'], (3)");
        assert_eq!(group.position, 1);
        assert_eq!(lexer.next_token().unwrap().unwrap().text, "+");

        let mut lexer = Lexer::new("(1, 2");
        lexer.next_token().unwrap();
        assert_eq!(
            lexer.take_group('(', 0).unwrap_err(),
            ExprError::positioned("Unmatched '('", 0, 1)
        );
    }
}
