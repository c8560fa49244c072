//! Tokenizer for evaluation expressions.

use super::parser::{Expected, Found, SyntaxFault};

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Token {
    Int(i64),
    Float(f64),
    Str(String),
    Name(String),
    True,
    False,
    And,
    Or,
    Not,
    Plus,
    Minus,
    Star,
    Slash,
    SlashSlash,
    Percent,
    Caret,
    EqEq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    Dot,
    End,
}

impl Token {
    pub(crate) const fn class(&self) -> Found {
        match self {
            Self::Int(_)
            | Self::Float(_)
            | Self::Str(_)
            | Self::Name(_)
            | Self::True
            | Self::False => Found::Value,
            Self::And
            | Self::Or
            | Self::Plus
            | Self::Star
            | Self::Slash
            | Self::SlashSlash
            | Self::Percent
            | Self::Caret => Found::Operator,
            Self::Minus => Found::Minus,
            Self::Not => Found::Not,
            Self::EqEq | Self::NotEq | Self::Lt | Self::Le | Self::Gt | Self::Ge => {
                Found::Comparison
            }
            Self::LParen => Found::OpenParen,
            Self::RParen => Found::CloseParen,
            Self::LBracket => Found::OpenBracket,
            Self::RBracket => Found::CloseBracket,
            Self::Comma => Found::Comma,
            Self::Dot => Found::Dot,
            Self::End => Found::End,
        }
    }
}

/// A token with the byte offset where it starts.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Spanned {
    pub token: Token,
    pub pos: usize,
    pub text: String,
}

pub(crate) fn tokenize(src: &str) -> Result<Vec<Spanned>, SyntaxFault> {
    let mut lexer = Lexer {
        src,
        chars: src.char_indices().peekable(),
        tokens: Vec::new(),
    };
    lexer.run()?;
    Ok(lexer.tokens)
}

struct Lexer<'a> {
    src: &'a str,
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
    tokens: Vec<Spanned>,
}

impl Lexer<'_> {
    fn run(&mut self) -> Result<(), SyntaxFault> {
        while let Some(&(pos, c)) = self.chars.peek() {
            if c.is_whitespace() {
                self.chars.next();
                continue;
            }

            let token = match c {
                '0'..='9' => self.number(pos)?,
                '"' => self.string(pos)?,
                c if c.is_ascii_alphabetic() || c == '_' => self.word(),
                _ => self.symbol(pos, c)?,
            };
            let end = self.chars.peek().map_or(self.src.len(), |&(p, _)| p);
            self.tokens.push(Spanned {
                token,
                pos,
                text: self.src[pos..end].to_string(),
            });
        }

        self.tokens.push(Spanned {
            token: Token::End,
            pos: self.src.len(),
            text: String::new(),
        });
        Ok(())
    }

    fn after_dot(&self) -> bool {
        self.tokens.last().is_some_and(|t| t.token == Token::Dot)
    }

    fn take_digits(&mut self, out: &mut String) {
        while let Some(&(_, c)) = self.chars.peek() {
            if !c.is_ascii_digit() {
                break;
            }
            out.push(c);
            self.chars.next();
        }
    }

    fn number(&mut self, pos: usize) -> Result<Token, SyntaxFault> {
        let mut text = String::new();
        self.take_digits(&mut text);

        // Path segments like `a.0.1` are integer indexes, never floats.
        let mut is_float = false;
        if !self.after_dot() {
            let mut lookahead = self.chars.clone();
            if let (Some((_, '.')), Some((_, d))) = (lookahead.next(), lookahead.next()) {
                if d.is_ascii_digit() {
                    self.chars.next();
                    text.push('.');
                    self.take_digits(&mut text);
                    is_float = true;
                }
            }
            if let Some(&(_, 'e' | 'E')) = self.chars.peek() {
                let mut lookahead = self.chars.clone();
                lookahead.next();
                let mut next = lookahead.next();
                if let Some((_, '+' | '-')) = next {
                    next = lookahead.next();
                }
                if next.is_some_and(|(_, d)| d.is_ascii_digit()) {
                    for (_, c) in self.chars.by_ref() {
                        text.push(c);
                        if c == 'e' || c == 'E' || c == '+' || c == '-' {
                            continue;
                        }
                        break;
                    }
                    self.take_digits(&mut text);
                    is_float = true;
                }
            }
        }

        let bad_number = || SyntaxFault::new(pos, Expected::Token, Found::BadNumber, &text);
        if is_float {
            text.parse().map(Token::Float).map_err(|_| bad_number())
        } else {
            text.parse().map(Token::Int).map_err(|_| bad_number())
        }
    }

    fn string(&mut self, pos: usize) -> Result<Token, SyntaxFault> {
        self.chars.next();
        let mut value = String::new();
        while let Some((_, c)) = self.chars.next() {
            match c {
                '"' => return Ok(Token::Str(value)),
                '\\' => match self.chars.next() {
                    Some((_, 'n')) => value.push('\n'),
                    Some((_, 't')) => value.push('\t'),
                    Some((_, escaped)) => value.push(escaped),
                    None => break,
                },
                _ => value.push(c),
            }
        }
        Err(SyntaxFault::new(
            pos,
            Expected::Token,
            Found::UnterminatedString,
            &self.src[pos..],
        ))
    }

    fn word(&mut self) -> Token {
        let mut word = String::new();
        while let Some(&(_, c)) = self.chars.peek() {
            if !(c.is_ascii_alphanumeric() || c == '_') {
                break;
            }
            word.push(c);
            self.chars.next();
        }
        match word.as_str() {
            "and" => Token::And,
            "or" => Token::Or,
            "not" => Token::Not,
            "true" | "True" => Token::True,
            "false" | "False" => Token::False,
            _ => Token::Name(word),
        }
    }

    fn symbol(&mut self, pos: usize, c: char) -> Result<Token, SyntaxFault> {
        self.chars.next();
        let next = self.chars.peek().map(|&(_, n)| n);
        let mut pair = |token: Token| -> Result<Token, SyntaxFault> {
            self.chars.next();
            Ok(token)
        };

        match (c, next) {
            ('/', Some('/')) => pair(Token::SlashSlash),
            ('=', Some('=')) => pair(Token::EqEq),
            ('!', Some('=')) => pair(Token::NotEq),
            ('<', Some('=')) => pair(Token::Le),
            ('>', Some('=')) => pair(Token::Ge),
            ('&', Some('&')) | ('|', Some('|')) => Err(SyntaxFault::new(
                pos,
                Expected::Token,
                Found::LogicalSymbol,
                &self.src[pos..pos + 2],
            )),
            ('=', _) => Err(SyntaxFault::new(
                pos,
                Expected::Token,
                Found::SingleEquals,
                "=",
            )),
            ('+', _) => Ok(Token::Plus),
            ('-', _) => Ok(Token::Minus),
            ('*', _) => Ok(Token::Star),
            ('/', _) => Ok(Token::Slash),
            ('%', _) => Ok(Token::Percent),
            ('^', _) => Ok(Token::Caret),
            ('<', _) => Ok(Token::Lt),
            ('>', _) => Ok(Token::Gt),
            ('(', _) => Ok(Token::LParen),
            (')', _) => Ok(Token::RParen),
            ('[', _) => Ok(Token::LBracket),
            (']', _) => Ok(Token::RBracket),
            (',', _) => Ok(Token::Comma),
            ('.', _) => Ok(Token::Dot),
            _ => Err(SyntaxFault::new(
                pos,
                Expected::Token,
                Found::BadChar,
                &c.to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Result<Vec<Token>, SyntaxFault> {
        Ok(tokenize(src)?.into_iter().map(|s| s.token).collect())
    }

    #[test]
    fn test_tokenize_arithmetic() -> Result<(), SyntaxFault> {
        assert_eq!(
            kinds("a + 2.5 // 3")?,
            vec![
                Token::Name("a".into()),
                Token::Plus,
                Token::Float(2.5),
                Token::SlashSlash,
                Token::Int(3),
                Token::End,
            ]
        );
        Ok(())
    }

    #[test]
    fn test_tokenize_path_indexes() -> Result<(), SyntaxFault> {
        assert_eq!(
            kinds("a.0.1")?,
            vec![
                Token::Name("a".into()),
                Token::Dot,
                Token::Int(0),
                Token::Dot,
                Token::Int(1),
                Token::End,
            ]
        );
        Ok(())
    }

    #[test]
    fn test_tokenize_exponent() -> Result<(), SyntaxFault> {
        assert_eq!(kinds("1e3")?, vec![Token::Float(1000.0), Token::End]);
        assert_eq!(kinds("2.5E-1")?, vec![Token::Float(0.25), Token::End]);
        Ok(())
    }

    #[test]
    fn test_tokenize_keywords_and_strings() -> Result<(), SyntaxFault> {
        assert_eq!(
            kinds(r#"not True or x == "a \"b\"""#)?,
            vec![
                Token::Not,
                Token::True,
                Token::Or,
                Token::Name("x".into()),
                Token::EqEq,
                Token::Str("a \"b\"".into()),
                Token::End,
            ]
        );
        Ok(())
    }

    #[test]
    fn test_tokenize_positions() -> Result<(), SyntaxFault> {
        let tokens = tokenize("ab <= 10")?;
        let positions: Vec<usize> = tokens.iter().map(|t| t.pos).collect();
        assert_eq!(positions, vec![0, 3, 6, 8]);
        assert_eq!(tokens[1].text, "<=");
        Ok(())
    }

    #[test]
    fn test_tokenize_errors() {
        assert!(matches!(
            tokenize("\"open"),
            Err(SyntaxFault {
                found: Found::UnterminatedString,
                ..
            })
        ));
        assert!(matches!(
            tokenize("a $ b"),
            Err(SyntaxFault {
                found: Found::BadChar,
                pos: 2,
                ..
            })
        ));
        assert!(matches!(
            tokenize("a = b"),
            Err(SyntaxFault {
                found: Found::SingleEquals,
                ..
            })
        ));
        assert!(matches!(
            tokenize("99999999999999999999"),
            Err(SyntaxFault {
                found: Found::BadNumber,
                ..
            })
        ));
    }
}
