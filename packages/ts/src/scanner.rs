// Scanner
//
// Splits source text into tokens. Whitespace and comments are trivia and are
// skipped.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Identifier,
    StringLiteral,
    NumericLiteral,
    OpenBrace,
    CloseBrace,
    OpenParen,
    CloseParen,
    OpenBracket,
    CloseBracket,
    Semicolon,
    Colon,
    Comma,
    Dot,
    Equals,
    Question,
    Unknown,
    EndOfFile,
    UnterminatedString,
}

impl TokenKind {
    pub fn describe(self) -> &'static str {
        match self {
            TokenKind::Identifier => "identifier",
            TokenKind::StringLiteral | TokenKind::UnterminatedString => "string literal",
            TokenKind::NumericLiteral => "numeric literal",
            TokenKind::OpenBrace => "{",
            TokenKind::CloseBrace => "}",
            TokenKind::OpenParen => "(",
            TokenKind::CloseParen => ")",
            TokenKind::OpenBracket => "[",
            TokenKind::CloseBracket => "]",
            TokenKind::Semicolon => ";",
            TokenKind::Colon => ":",
            TokenKind::Comma => ",",
            TokenKind::Dot => ".",
            TokenKind::Equals => "=",
            TokenKind::Question => "?",
            TokenKind::Unknown => "unknown token",
            TokenKind::EndOfFile => "end of file",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    /// Identifier name, literal value (unquoted), or the raw punctuation.
    pub value: String,
    pub pos: usize,
    pub end: usize,
}

impl Token {
    pub fn is_keyword(&self, keyword: &str) -> bool {
        self.kind == TokenKind::Identifier && self.value == keyword
    }
}

pub struct Scanner<'a> {
    text: &'a str,
    pos: usize,
}

impl<'a> Scanner<'a> {
    pub fn new(text: &'a str) -> Self {
        Self { text, pos: 0 }
    }

    /// Scan the entire text; the final token is always `EndOfFile`.
    pub fn scan_all(mut self) -> Vec<Token> {
        let mut tokens = Vec::new();
        loop {
            let token = self.scan();
            let done = token.kind == TokenKind::EndOfFile;
            tokens.push(token);
            if done {
                return tokens;
            }
        }
    }

    fn peek_char(&self) -> Option<char> {
        self.text[self.pos..].chars().next()
    }

    fn peek_second(&self) -> Option<char> {
        let mut chars = self.text[self.pos..].chars();
        chars.next();
        chars.next()
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.peek_char()?;
        self.pos += ch.len_utf8();
        Some(ch)
    }

    fn skip_trivia(&mut self) {
        loop {
            match (self.peek_char(), self.peek_second()) {
                (Some(c), _) if c.is_whitespace() => {
                    self.bump();
                }
                (Some('/'), Some('/')) => {
                    while let Some(c) = self.peek_char() {
                        if c == '\n' {
                            break;
                        }
                        self.bump();
                    }
                }
                (Some('/'), Some('*')) => {
                    self.pos += 2;
                    match self.text[self.pos..].find("*/") {
                        Some(offset) => self.pos += offset + 2,
                        None => self.pos = self.text.len(),
                    }
                }
                _ => return,
            }
        }
    }

    fn scan(&mut self) -> Token {
        self.skip_trivia();
        let start = self.pos;
        let Some(ch) = self.bump() else {
            return Token {
                kind: TokenKind::EndOfFile,
                value: String::new(),
                pos: start,
                end: start,
            };
        };

        let kind = match ch {
            '{' => TokenKind::OpenBrace,
            '}' => TokenKind::CloseBrace,
            '(' => TokenKind::OpenParen,
            ')' => TokenKind::CloseParen,
            '[' => TokenKind::OpenBracket,
            ']' => TokenKind::CloseBracket,
            ';' => TokenKind::Semicolon,
            ':' => TokenKind::Colon,
            ',' => TokenKind::Comma,
            '.' => TokenKind::Dot,
            '=' => TokenKind::Equals,
            '?' => TokenKind::Question,
            '"' | '\'' | '`' => return self.scan_string(ch, start),
            c if c.is_ascii_digit() => {
                while matches!(self.peek_char(), Some(c) if c.is_ascii_alphanumeric() || c == '.' || c == '_')
                {
                    self.bump();
                }
                TokenKind::NumericLiteral
            }
            c if is_identifier_start(c) => {
                while matches!(self.peek_char(), Some(c) if is_identifier_part(c)) {
                    self.bump();
                }
                TokenKind::Identifier
            }
            _ => TokenKind::Unknown,
        };

        Token {
            kind,
            value: self.text[start..self.pos].to_string(),
            pos: start,
            end: self.pos,
        }
    }

    fn scan_string(&mut self, quote: char, start: usize) -> Token {
        let mut value = String::new();
        loop {
            match self.bump() {
                None | Some('\n') if quote != '`' => {
                    return Token {
                        kind: TokenKind::UnterminatedString,
                        value,
                        pos: start,
                        end: self.pos,
                    };
                }
                None => {
                    return Token {
                        kind: TokenKind::UnterminatedString,
                        value,
                        pos: start,
                        end: self.pos,
                    };
                }
                Some(c) if c == quote => break,
                Some('\\') => match self.bump() {
                    Some('n') => value.push('\n'),
                    Some('t') => value.push('\t'),
                    Some('r') => value.push('\r'),
                    Some('0') => value.push('\0'),
                    Some(other) => value.push(other),
                    None => {}
                },
                Some(c) => value.push(c),
            }
        }
        Token {
            kind: TokenKind::StringLiteral,
            value,
            pos: start,
            end: self.pos,
        }
    }
}

fn is_identifier_start(c: char) -> bool {
    c == '_' || c == '$' || c.is_alphabetic()
}

fn is_identifier_part(c: char) -> bool {
    is_identifier_start(c) || c.is_ascii_digit()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(text: &str) -> Vec<TokenKind> {
        Scanner::new(text).scan_all().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn should_skip_comments_and_whitespace() {
        assert_eq!(
            kinds("// lead\nconst /* inline */ a = 1;"),
            vec![
                TokenKind::Identifier,
                TokenKind::Identifier,
                TokenKind::Equals,
                TokenKind::NumericLiteral,
                TokenKind::Semicolon,
                TokenKind::EndOfFile,
            ]
        );
    }

    #[test]
    fn should_unescape_string_literals() {
        let tokens = Scanner::new(r#"'it\'s' "a\"b""#).scan_all();
        assert_eq!(tokens[0].value, "it's");
        assert_eq!(tokens[1].value, "a\"b");
    }

    #[test]
    fn should_flag_unterminated_strings() {
        let tokens = Scanner::new("\"abc\nx").scan_all();
        assert_eq!(tokens[0].kind, TokenKind::UnterminatedString);
    }
}
