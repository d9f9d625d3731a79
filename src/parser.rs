use crate::ast::*;
use crate::lexer::{LexError, Lexer, Token};

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("Lex error: {0}")]
    Lex(#[from] LexError),
    #[error("No tables defined in schema text")]
    NoTablesDefined,
    #[error("Unbalanced braces in schema text")]
    UnbalancedBraces,
    #[error("Unexpected token: {0:?}, expected {1}")]
    Unexpected(Token, &'static str),
}

/// Parse schema text into a [`Schema`]. Pure function of the input; no
/// partial schema is ever returned on error.
pub fn parse(text: &str) -> Result<Schema, ParseError> {
    Parser::new(text)?.parse()
}

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    pub fn new(input: &str) -> Result<Self, ParseError> {
        let tokens = Lexer::new(input).tokenize()?;

        // Structural validation happens before any parsing: malformed input
        // must never produce a partial schema.
        if !tokens.iter().any(|t| matches!(t, Token::Ident(s) if s == "Table")) {
            return Err(ParseError::NoTablesDefined);
        }
        let opens = tokens.iter().filter(|t| **t == Token::LBrace).count();
        let closes = tokens.iter().filter(|t| **t == Token::RBrace).count();
        if opens != closes {
            return Err(ParseError::UnbalancedBraces);
        }

        Ok(Self { tokens, pos: 0 })
    }

    fn peek(&self) -> &Token {
        self.tokens.get(self.pos).unwrap_or(&Token::Eof)
    }

    fn peek_at(&self, offset: usize) -> &Token {
        self.tokens.get(self.pos + offset).unwrap_or(&Token::Eof)
    }

    fn advance(&mut self) -> Token {
        let tok = self.tokens.get(self.pos).cloned().unwrap_or(Token::Eof);
        self.pos += 1;
        tok
    }

    fn expect(&mut self, expected: Token, what: &'static str) -> Result<(), ParseError> {
        let tok = self.advance();
        if tok == expected {
            Ok(())
        } else {
            Err(ParseError::Unexpected(tok, what))
        }
    }

    fn check_ident(&self, name: &str) -> bool {
        matches!(self.peek(), Token::Ident(s) if s == name)
    }

    fn skip_trivia(&mut self) {
        while matches!(self.peek(), Token::Newline | Token::Comment(_)) {
            self.pos += 1;
        }
    }

    /// Table and group names may be bare identifiers or quoted strings.
    fn expect_name(&mut self) -> Result<String, ParseError> {
        match self.advance() {
            Token::Ident(s) => Ok(s),
            Token::Str(s) => Ok(s),
            tok => Err(ParseError::Unexpected(tok, "name or quoted name")),
        }
    }

    fn expect_ident(&mut self) -> Result<String, ParseError> {
        match self.advance() {
            Token::Ident(s) => Ok(s),
            tok => Err(ParseError::Unexpected(tok, "identifier")),
        }
    }

    pub fn parse(&mut self) -> Result<Schema, ParseError> {
        let mut schema = Schema::default();

        loop {
            self.skip_trivia();
            if *self.peek() == Token::Eof {
                break;
            }

            if self.check_ident("Table") {
                self.advance();
                let table = self.parse_table(&mut schema.refs)?;
                schema.tables.push(table);
            } else if self.check_ident("Ref") {
                self.advance();
                self.expect(Token::Colon, "':' after Ref")?;
                schema.refs.push(self.parse_ref()?);
            } else if self.check_ident("TableGroup") {
                self.advance();
                schema.groups.push(self.parse_group()?);
            } else {
                return Err(ParseError::Unexpected(
                    self.peek().clone(),
                    "Table, Ref, or TableGroup",
                ));
            }
        }

        Ok(schema)
    }

    fn at_note(&self) -> bool {
        matches!(self.peek(), Token::Ident(s) if s.eq_ignore_ascii_case("note"))
            && *self.peek_at(1) == Token::Colon
    }

    fn parse_note_value(&mut self) -> Result<String, ParseError> {
        self.advance(); // note keyword
        self.advance(); // colon
        match self.advance() {
            Token::Str(s) => Ok(s),
            Token::TripleStr(s) => Ok(s),
            tok => Err(ParseError::Unexpected(tok, "note string")),
        }
    }

    fn parse_table(&mut self, refs: &mut Vec<Ref>) -> Result<Table, ParseError> {
        let name = self.expect_name()?;
        self.expect(Token::LBrace, "'{' after table name")?;

        let mut note = None;
        let mut fields = Vec::new();

        loop {
            self.skip_trivia();
            if *self.peek() == Token::RBrace {
                self.advance();
                break;
            }
            // A `Ref:` line is accepted at table scope too; the colon
            // lookahead keeps a field named `Ref` parsing as a field.
            if self.check_ident("Ref") && *self.peek_at(1) == Token::Colon {
                self.advance();
                self.advance();
                refs.push(self.parse_ref()?);
            } else if self.at_note() {
                let text = self.parse_note_value()?;
                // First note wins as the table note.
                if note.is_none() {
                    note = Some(text);
                }
            } else {
                fields.push(self.parse_field()?);
            }
        }

        Ok(Table { name, note, fields })
    }

    fn parse_field(&mut self) -> Result<Field, ParseError> {
        let name = self.expect_ident()?;
        let typ = self.parse_type()?;

        let mut field = Field::new(name, typ);

        if *self.peek() == Token::LBracket {
            self.advance();
            self.parse_constraint_list(&mut field)?;
        }

        Ok(field)
    }

    /// A type is an identifier with optional parenthesized arguments, kept
    /// as one raw string (`varchar(255)`, `decimal(10,2)`).
    fn parse_type(&mut self) -> Result<String, ParseError> {
        let mut typ = self.expect_ident()?;
        if *self.peek() == Token::LParen {
            self.advance();
            typ.push('(');
            loop {
                match self.advance() {
                    Token::RParen => break,
                    Token::Num(n) => typ.push_str(&n.to_string()),
                    Token::Ident(s) => typ.push_str(&s),
                    Token::Comma => typ.push(','),
                    tok => return Err(ParseError::Unexpected(tok, "type argument")),
                }
            }
            typ.push(')');
        }
        Ok(typ)
    }

    /// Parse bracket entries up to the closing `]`. A `Note:` entry is
    /// hoisted into the field's note and removed from the constraint list.
    fn parse_constraint_list(&mut self, field: &mut Field) -> Result<(), ParseError> {
        loop {
            if *self.peek() == Token::RBracket {
                self.advance();
                return Ok(());
            }
            if self.at_note() {
                field.note = Some(self.parse_note_value()?);
            } else {
                field.constraints.push(self.parse_constraint_entry()?);
            }
            match self.advance() {
                Token::Comma => continue,
                Token::RBracket => return Ok(()),
                tok => return Err(ParseError::Unexpected(tok, "',' or ']'")),
            }
        }
    }

    /// Reassemble one constraint entry as raw text, up to (not consuming)
    /// the next top-level `,` or `]`.
    fn parse_constraint_entry(&mut self) -> Result<String, ParseError> {
        let mut out = String::new();
        let mut pending_space = false;
        loop {
            match self.peek().clone() {
                Token::Comma | Token::RBracket | Token::Eof => return Ok(out),
                Token::Dot => {
                    self.advance();
                    out.push('.');
                    pending_space = false;
                }
                Token::Colon => {
                    self.advance();
                    out.push(':');
                    pending_space = true;
                }
                tok => {
                    self.advance();
                    if pending_space || (!out.is_empty() && !out.ends_with('.')) {
                        out.push(' ');
                    }
                    pending_space = false;
                    match tok {
                        Token::Ident(s) => out.push_str(&s),
                        Token::Num(n) => out.push_str(&n.to_string()),
                        Token::Str(s) => {
                            out.push('"');
                            out.push_str(&s);
                            out.push('"');
                        }
                        Token::Color(s) => out.push_str(&s),
                        Token::Gt => out.push('>'),
                        Token::Lt => out.push('<'),
                        Token::Dash => out.push('-'),
                        tok => return Err(ParseError::Unexpected(tok, "constraint entry")),
                    }
                }
            }
        }
    }

    fn parse_ref(&mut self) -> Result<Ref, ParseError> {
        let from = self.parse_ref_end()?;
        let op = match self.advance() {
            Token::Gt => RefOp::ManyToOne,
            Token::Lt => RefOp::OneToMany,
            Token::Dash => RefOp::OneToOne,
            tok => return Err(ParseError::Unexpected(tok, "ref operator (>, <, -)")),
        };
        let to = self.parse_ref_end()?;
        Ok(Ref { from, op, to })
    }

    fn parse_ref_end(&mut self) -> Result<RefEnd, ParseError> {
        let table = self.expect_name()?;
        self.expect(Token::Dot, "'.' in ref endpoint")?;
        let field = self.expect_ident()?;
        Ok(RefEnd { table, field })
    }

    fn parse_group(&mut self) -> Result<TableGroup, ParseError> {
        let name = self.expect_name()?;

        let mut color = None;
        if *self.peek() == Token::LBracket {
            self.advance();
            if self.check_ident("color") {
                self.advance();
                self.expect(Token::Colon, "':' after color")?;
                match self.advance() {
                    Token::Color(c) => color = Some(c),
                    tok => return Err(ParseError::Unexpected(tok, "color value")),
                }
            }
            self.expect(Token::RBracket, "']' after group settings")?;
        }

        self.expect(Token::LBrace, "'{' after group name")?;

        let mut members = Vec::new();
        let mut note = None;

        loop {
            self.skip_trivia();
            if *self.peek() == Token::RBrace {
                self.advance();
                break;
            }
            if self.at_note() {
                note = Some(self.parse_note_value()?);
            } else {
                let table = self.expect_name()?;
                // A trailing comment on a member line is the per-table
                // explanation, not part of the name.
                let comment = match self.peek() {
                    Token::Comment(c) => {
                        let c = c.clone();
                        self.advance();
                        Some(c)
                    }
                    _ => None,
                };
                members.push(GroupMember { table, comment });
            }
        }

        Ok(TableGroup {
            name,
            color,
            members,
            note,
        })
    }
}
