//! Tokenizer for formula strings.

use crate::error::{DriftError, Result};

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Token {
    Num(f64),
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    /// `**` or `^`.
    Caret,
    LParen,
    RParen,
}

pub(crate) fn tokenize(input: &str) -> Result<Vec<Token>> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            _ if c.is_whitespace() => i += 1,
            '+' => {
                tokens.push(Token::Plus);
                i += 1;
            }
            '-' => {
                tokens.push(Token::Minus);
                i += 1;
            }
            '*' if chars.get(i + 1) == Some(&'*') => {
                tokens.push(Token::Caret);
                i += 2;
            }
            '*' => {
                tokens.push(Token::Star);
                i += 1;
            }
            '/' => {
                tokens.push(Token::Slash);
                i += 1;
            }
            '^' => {
                tokens.push(Token::Caret);
                i += 1;
            }
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            _ if c.is_ascii_digit() || c == '.' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                // exponent only when digits follow, so `2*E` stays a constant
                if matches!(chars.get(i), Some('e' | 'E')) {
                    let mut j = i + 1;
                    if matches!(chars.get(j), Some('+' | '-')) {
                        j += 1;
                    }
                    if chars.get(j).is_some_and(char::is_ascii_digit) {
                        i = j;
                        while i < chars.len() && chars[i].is_ascii_digit() {
                            i += 1;
                        }
                    }
                }
                let text: String = chars[start..i].iter().collect();
                let value: f64 = text.parse().map_err(|_| {
                    DriftError::formula(input, format!("invalid number '{text}'"))
                })?;
                tokens.push(Token::Num(value));
            }
            _ if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                tokens.push(Token::Ident(chars[start..i].iter().collect()));
            }
            _ => {
                return Err(DriftError::formula(
                    input,
                    format!("unexpected character '{c}' at position {i}"),
                ))
            }
        }
    }

    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_power_operators() {
        assert_eq!(
            tokenize("x**2 ^ y").unwrap(),
            vec![
                Token::Ident("x".into()),
                Token::Caret,
                Token::Num(2.0),
                Token::Caret,
                Token::Ident("y".into()),
            ]
        );
    }

    #[test]
    fn test_scientific_notation_and_constant() {
        assert_eq!(tokenize("1.5e2").unwrap(), vec![Token::Num(150.0)]);
        assert_eq!(tokenize("3E-1").unwrap(), vec![Token::Num(0.3)]);
        assert_eq!(
            tokenize("2*E").unwrap(),
            vec![Token::Num(2.0), Token::Star, Token::Ident("E".into())]
        );
    }

    #[test]
    fn test_rejects_unknown_characters() {
        let err = tokenize("x % 2").unwrap_err();
        assert!(err.is_config_error());
        assert!(tokenize("1..2").is_err());
    }
}
