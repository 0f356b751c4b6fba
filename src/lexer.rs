use crate::token::{self, Position, Token, TokenKind, TokenStream};

#[derive(Debug)]
pub struct Lexer {
    input: Vec<char>,
    position: usize,      // current position in input (points to current char)
    read_position: usize, // current reading position in input (after current char)
    ch: Option<char>,     // current char under examination
    line: usize,
    column: usize,
}

impl Lexer {
    pub fn new(input: &str) -> Self {
        let mut l = Lexer {
            input: input.chars().collect(),
            position: 0,
            read_position: 0,
            ch: None,
            line: 1,
            column: 0,
        };

        l.read_char();
        l
    }

    fn read_char(&mut self) {
        if self.ch == Some('\n') {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }

        self.ch = self.input.get(self.read_position).copied();
        self.position = self.read_position;
        self.read_position += 1;
    }

    fn peek_char(&self) -> Option<char> {
        self.input.get(self.read_position).copied()
    }

    fn read_while(&mut self, pred: fn(Option<char>) -> bool) -> String {
        let position = self.position;
        while pred(self.peek_char()) {
            self.read_char();
        }
        self.input[position..=self.position].iter().collect()
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.ch, Some(' ' | '\t' | '\n' | '\r')) {
            self.read_char()
        }
    }

    fn two_char_or(&mut self, single: TokenKind, double: TokenKind) -> (TokenKind, String) {
        let first = self.ch.unwrap_or_default();
        if self.peek_char() == Some('=') {
            self.read_char();
            (double, format!("{first}="))
        } else {
            (single, first.to_string())
        }
    }
}

impl TokenStream for Lexer {
    fn next_token(&mut self) -> Token {
        self.skip_whitespace();

        let start = Position {
            line: self.line,
            column: self.column,
        };

        let Some(ch) = self.ch else {
            return Token::new(TokenKind::Eof, "", start);
        };

        let (kind, literal) = match ch {
            '=' => self.two_char_or(TokenKind::Assign, TokenKind::Eq),
            '!' => self.two_char_or(TokenKind::Bang, TokenKind::NotEq),
            ';' => (TokenKind::Semicolon, ch.to_string()),
            '(' => (TokenKind::LParen, ch.to_string()),
            ')' => (TokenKind::RParen, ch.to_string()),
            ',' => (TokenKind::Comma, ch.to_string()),
            '+' => (TokenKind::Plus, ch.to_string()),
            '{' => (TokenKind::LBrace, ch.to_string()),
            '}' => (TokenKind::RBrace, ch.to_string()),
            '-' => (TokenKind::Minus, ch.to_string()),
            '*' => (TokenKind::Asterisk, ch.to_string()),
            '/' => (TokenKind::Slash, ch.to_string()),
            '<' => (TokenKind::Lt, ch.to_string()),
            '>' => (TokenKind::Gt, ch.to_string()),
            c if is_letter(Some(c)) => {
                let ident = self.read_while(is_letter);
                (token::lookup_ident(&ident), ident)
            }
            c if is_digit(Some(c)) => (TokenKind::Int, self.read_while(is_digit)),
            c => (TokenKind::Illegal, c.to_string()),
        };

        self.read_char();
        Token::new(kind, literal, start)
    }
}

fn is_letter(ch: Option<char>) -> bool {
    ch.is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
}

fn is_digit(ch: Option<char>) -> bool {
    ch.is_some_and(|c| c.is_ascii_digit())
}
