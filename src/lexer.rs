use std::iter::Peekable;
use std::str::Chars;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Ident(String),
    Str(String),
    /// `'''...'''` multi-line string, body kept verbatim.
    TripleStr(String),
    Num(i64),
    /// `#RRGGBB` color literal, stored with the leading `#`.
    Color(String),
    /// `// ...` trailing comment, body trimmed.
    Comment(String),

    LBrace,   // {
    RBrace,   // }
    LParen,   // (
    RParen,   // )
    LBracket, // [
    RBracket, // ]
    Comma,    // ,
    Colon,    // :
    Dot,      // .
    Gt,       // >
    Lt,       // <
    Dash,     // -
    Newline,  // \n (significant: field declarations are line-terminated)

    Eof,
}

#[derive(Debug, thiserror::Error)]
pub enum LexError {
    #[error("Unexpected character: {0}")]
    UnexpectedChar(char),
    #[error("Unterminated string")]
    UnterminatedString,
    #[error("Invalid number: {0}")]
    InvalidNumber(String),
}

pub struct Lexer<'a> {
    chars: Peekable<Chars<'a>>,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            chars: input.chars().peekable(),
        }
    }

    fn skip_whitespace(&mut self) {
        while let Some(&c) = self.chars.peek() {
            if c.is_whitespace() && c != '\n' {
                self.chars.next();
            } else {
                break;
            }
        }
    }

    fn read_ident(&mut self, first: char) -> String {
        let mut s = String::from(first);
        while let Some(&c) = self.chars.peek() {
            if c.is_alphanumeric() || c == '_' {
                s.push(c);
                self.chars.next();
            } else {
                break;
            }
        }
        s
    }

    fn read_string(&mut self) -> Result<String, LexError> {
        let mut s = String::new();
        loop {
            match self.chars.next() {
                Some('"') => return Ok(s),
                Some('\\') => {
                    if let Some(c) = self.chars.next() {
                        match c {
                            'n' => s.push('\n'),
                            't' => s.push('\t'),
                            'r' => s.push('\r'),
                            _ => s.push(c),
                        }
                    }
                }
                Some(c) => s.push(c),
                None => return Err(LexError::UnterminatedString),
            }
        }
    }

    /// Called after the opening `'''`. Reads verbatim until the closing `'''`.
    fn read_triple_string(&mut self) -> Result<String, LexError> {
        let mut s = String::new();
        let mut quotes = 0;
        loop {
            match self.chars.next() {
                Some('\'') => {
                    quotes += 1;
                    if quotes == 3 {
                        return Ok(s);
                    }
                }
                Some(c) => {
                    for _ in 0..quotes {
                        s.push('\'');
                    }
                    quotes = 0;
                    s.push(c);
                }
                None => return Err(LexError::UnterminatedString),
            }
        }
    }

    fn read_number(&mut self, first: char) -> Result<i64, LexError> {
        let mut s = String::from(first);
        while let Some(&c) = self.chars.peek() {
            if c.is_ascii_digit() {
                s.push(c);
                self.chars.next();
            } else {
                break;
            }
        }
        s.parse().map_err(|_| LexError::InvalidNumber(s))
    }

    fn read_color(&mut self) -> String {
        let mut s = String::from('#');
        while let Some(&c) = self.chars.peek() {
            if c.is_ascii_hexdigit() {
                s.push(c);
                self.chars.next();
            } else {
                break;
            }
        }
        s
    }

    fn read_line_comment(&mut self) -> String {
        let mut s = String::new();
        while let Some(&c) = self.chars.peek() {
            if c == '\n' {
                break;
            }
            s.push(c);
            self.chars.next();
        }
        s.trim().to_string()
    }

    pub fn next_token(&mut self) -> Result<Token, LexError> {
        self.skip_whitespace();

        let c = match self.chars.next() {
            Some(c) => c,
            None => return Ok(Token::Eof),
        };

        let tok = match c {
            '\n' => Token::Newline,
            '{' => Token::LBrace,
            '}' => Token::RBrace,
            '(' => Token::LParen,
            ')' => Token::RParen,
            '[' => Token::LBracket,
            ']' => Token::RBracket,
            ',' => Token::Comma,
            ':' => Token::Colon,
            '.' => Token::Dot,
            '>' => Token::Gt,
            '<' => Token::Lt,
            '-' => Token::Dash,
            '#' => Token::Color(self.read_color()),
            '/' => {
                if self.chars.peek() == Some(&'/') {
                    self.chars.next();
                    Token::Comment(self.read_line_comment())
                } else {
                    return Err(LexError::UnexpectedChar(c));
                }
            }
            '\'' => {
                // Only the triple-quoted form exists in this grammar.
                if self.chars.next_if_eq(&'\'').is_some() {
                    if self.chars.next_if_eq(&'\'').is_some() {
                        Token::TripleStr(self.read_triple_string()?)
                    } else {
                        return Err(LexError::UnexpectedChar('\''));
                    }
                } else {
                    return Err(LexError::UnexpectedChar('\''));
                }
            }
            '"' => Token::Str(self.read_string()?),
            c if c.is_ascii_digit() => Token::Num(self.read_number(c)?),
            c if c.is_alphabetic() || c == '_' => Token::Ident(self.read_ident(c)),
            _ => return Err(LexError::UnexpectedChar(c)),
        };

        Ok(tok)
    }

    pub fn tokenize(mut self) -> Result<Vec<Token>, LexError> {
        let mut tokens = Vec::new();
        loop {
            let tok = self.next_token()?;
            if tok == Token::Eof {
                tokens.push(tok);
                break;
            }
            tokens.push(tok);
        }
        Ok(tokens)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_tokens() {
        let tokens = Lexer::new("Table user { }").tokenize().unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::Ident("Table".into()),
                Token::Ident("user".into()),
                Token::LBrace,
                Token::RBrace,
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_quoted_name() {
        let tokens = Lexer::new("Table \"user accounts\" {").tokenize().unwrap();
        assert_eq!(tokens[1], Token::Str("user accounts".into()));
    }

    #[test]
    fn test_ref_operators() {
        let tokens = Lexer::new("a.b > c.d").tokenize().unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::Ident("a".into()),
                Token::Dot,
                Token::Ident("b".into()),
                Token::Gt,
                Token::Ident("c".into()),
                Token::Dot,
                Token::Ident("d".into()),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_color_literal() {
        let tokens = Lexer::new("[color: #4CAF50]").tokenize().unwrap();
        assert_eq!(tokens[3], Token::Color("#4CAF50".into()));
    }

    #[test]
    fn test_line_comment_captured() {
        let tokens = Lexer::new("user // main account table\n").tokenize().unwrap();
        assert_eq!(tokens[1], Token::Comment("main account table".into()));
        assert_eq!(tokens[2], Token::Newline);
    }

    #[test]
    fn test_triple_string() {
        let tokens = Lexer::new("Note: '''line one\nline two'''").tokenize().unwrap();
        assert_eq!(tokens[2], Token::TripleStr("line one\nline two".into()));
    }

    #[test]
    fn test_triple_string_with_inner_quote() {
        let tokens = Lexer::new("'''it's fine'''").tokenize().unwrap();
        assert_eq!(tokens[0], Token::TripleStr("it's fine".into()));
    }

    #[test]
    fn test_braces_inside_string_are_opaque() {
        let tokens = Lexer::new("Note: \"curly {braces} inside\"").tokenize().unwrap();
        assert_eq!(tokens[2], Token::Str("curly {braces} inside".into()));
        assert!(!tokens.contains(&Token::LBrace));
    }

    #[test]
    fn test_overflowing_number_is_an_error() {
        assert!(matches!(
            Lexer::new("varchar(99999999999999999999)").tokenize(),
            Err(LexError::InvalidNumber(_))
        ));
    }

    #[test]
    fn test_unterminated_string() {
        assert!(matches!(
            Lexer::new("\"oops").tokenize(),
            Err(LexError::UnterminatedString)
        ));
    }
}
