use std::str::Chars;

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    // Objective keywords
    Max,
    Min,

    // Sign restriction tags
    Plus,
    Minus,
    Urs,
    Int,
    Bin,

    // Literals
    Number,
    Ident,

    // Relations
    Le,
    Ge,
    Eq,

    // Special
    Newline,
    Comment,
    Eof,
    Error,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
    /// 1-based source line
    pub line: usize,
    pub text: String,
}

impl Token {
    pub fn new(kind: TokenKind, span: Span, line: usize, text: impl Into<String>) -> Self {
        Self {
            kind,
            span,
            line,
            text: text.into(),
        }
    }
}

pub struct Lexer<'a> {
    source: &'a str,
    chars: Chars<'a>,
    pos: usize,
    line: usize,
    current: Option<char>,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        let mut chars = source.chars();
        let current = chars.next();
        Self {
            source,
            chars,
            pos: 0,
            line: 1,
            current,
        }
    }

    pub fn tokenize(source: &str) -> Vec<Token> {
        let mut lexer = Lexer::new(source);
        let mut tokens = Vec::new();
        loop {
            let token = lexer.next_token();
            let is_eof = token.kind == TokenKind::Eof;
            tokens.push(token);
            if is_eof {
                break;
            }
        }
        tokens
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.current?;
        self.current = self.chars.next();
        self.pos += c.len_utf8();
        Some(c)
    }

    fn peek(&self) -> Option<char> {
        self.current
    }

    fn peek_next(&self) -> Option<char> {
        self.chars.clone().next()
    }

    fn token(&self, kind: TokenKind, start: usize) -> Token {
        Token::new(kind, Span::new(start, self.pos), self.line, &self.source[start..self.pos])
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek() {
            if c == ' ' || c == '\t' || c == '\r' {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn skip_comment(&mut self) -> Token {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c == '\n' {
                break;
            }
            self.advance();
        }
        self.token(TokenKind::Comment, start)
    }

    fn eat_digits(&mut self) -> usize {
        let mut count = 0;
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                self.advance();
                count += 1;
            } else {
                break;
            }
        }
        count
    }

    /// `[+-]digits[.digits][e[+-]digits]`. Malformed exponents are kept in
    /// the token text for the parser to reject.
    fn read_number(&mut self) -> Token {
        let start = self.pos;

        if matches!(self.peek(), Some('+' | '-')) {
            self.advance();
        }

        self.eat_digits();

        if self.peek() == Some('.') {
            self.advance();
            self.eat_digits();
        }

        if matches!(self.peek(), Some('e' | 'E')) {
            self.advance();
            if matches!(self.peek(), Some('+' | '-')) {
                self.advance();
            }
            self.eat_digits();
        }

        self.token(TokenKind::Number, start)
    }

    fn read_word(&mut self) -> Token {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || c == '_' {
                self.advance();
            } else {
                break;
            }
        }
        let kind = match self.source[start..self.pos].to_ascii_lowercase().as_str() {
            "max" => TokenKind::Max,
            "min" => TokenKind::Min,
            "urs" => TokenKind::Urs,
            "int" => TokenKind::Int,
            "bin" => TokenKind::Bin,
            _ => TokenKind::Ident,
        };
        self.token(kind, start)
    }

    /// `<=`, `>=`, `=`; a lone `<` or `>` is an error token.
    fn read_relation(&mut self, first: char) -> Token {
        let start = self.pos;
        self.advance();
        let kind = match first {
            '=' => TokenKind::Eq,
            _ if self.peek() != Some('=') => TokenKind::Error,
            '<' => {
                self.advance();
                TokenKind::Le
            }
            _ => {
                self.advance();
                TokenKind::Ge
            }
        };
        self.token(kind, start)
    }

    pub fn next_token(&mut self) -> Token {
        self.skip_whitespace();

        let start = self.pos;

        let Some(c) = self.peek() else {
            return Token::new(TokenKind::Eof, Span::new(start, start), self.line, "");
        };

        match c {
            '\n' => {
                self.advance();
                let token = Token::new(TokenKind::Newline, Span::new(start, self.pos), self.line, "\n");
                self.line += 1;
                token
            }
            '#' => self.skip_comment(),
            '<' | '>' | '=' => self.read_relation(c),
            '+' | '-' => {
                // a sign glued to a digit or dot starts a number, otherwise it is a tag
                if matches!(self.peek_next(), Some(d) if d.is_ascii_digit() || d == '.') {
                    return self.read_number();
                }
                self.advance();
                let kind = if c == '+' { TokenKind::Plus } else { TokenKind::Minus };
                self.token(kind, start)
            }
            c if c.is_ascii_digit() || c == '.' => self.read_number(),
            c if c.is_alphabetic() || c == '_' => self.read_word(),
            _ => {
                self.advance();
                self.token(TokenKind::Error, start)
            }
        }
    }
}
