//! Arithmetic calculator tool.
//!
//! Evaluates expressions with a hand-rolled recursive-descent parser over an
//! explicit allow-list of math functions and constants. There is no name
//! resolution beyond the allow-list and no access to anything outside pure
//! arithmetic.

use std::collections::BTreeMap;

use super::{Tool, ToolError, ToolParameter};

/// A tool for performing mathematical calculations.
pub struct CalculatorTool;

const PARAMETERS: &[ToolParameter] = &[ToolParameter {
    name: "expression",
    kind: "string",
    description: "The mathematical expression to evaluate",
}];

impl Tool for CalculatorTool {
    fn name(&self) -> &str {
        "calculator"
    }

    fn description(&self) -> &str {
        "Evaluates mathematical expressions. Use this for calculations."
    }

    fn parameters(&self) -> &[ToolParameter] {
        PARAMETERS
    }

    fn execute(&self, args: &BTreeMap<String, String>) -> Result<String, ToolError> {
        let expression = args
            .get("expression")
            .ok_or_else(|| ToolError::new("missing required parameter 'expression'"))?;

        let value = evaluate(expression)
            .map_err(|e| ToolError::new(format!("Error evaluating expression: {e}")))?;
        Ok(format_number(value))
    }
}

/// Whole results print without a trailing `.0` so `2 + 2` yields `"4"`.
fn format_number(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

fn evaluate(expression: &str) -> Result<f64, String> {
    let tokens = tokenize(expression)?;
    let mut parser = Parser { tokens, pos: 0 };
    let value = parser.expr()?;
    match parser.peek() {
        None => Ok(value),
        Some(tok) => Err(format!("unexpected token '{tok}'")),
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Caret,
    LParen,
    RParen,
    Comma,
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Token::Number(n) => write!(f, "{n}"),
            Token::Ident(s) => write!(f, "{s}"),
            Token::Plus => write!(f, "+"),
            Token::Minus => write!(f, "-"),
            Token::Star => write!(f, "*"),
            Token::Slash => write!(f, "/"),
            Token::Percent => write!(f, "%"),
            Token::Caret => write!(f, "^"),
            Token::LParen => write!(f, "("),
            Token::RParen => write!(f, ")"),
            Token::Comma => write!(f, ","),
        }
    }
}

fn tokenize(expression: &str) -> Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let mut chars = expression.chars().peekable();

    while let Some(&ch) = chars.peek() {
        match ch {
            ' ' | '\t' | '\n' | '\r' => {
                chars.next();
            }
            '0'..='9' | '.' => {
                let mut literal = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_ascii_digit() || c == '.' {
                        literal.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                let number = literal
                    .parse::<f64>()
                    .map_err(|_| format!("invalid number '{literal}'"))?;
                tokens.push(Token::Number(number));
            }
            'a'..='z' | 'A'..='Z' | '_' => {
                let mut ident = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_ascii_alphanumeric() || c == '_' {
                        ident.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Token::Ident(ident));
            }
            '+' => {
                chars.next();
                tokens.push(Token::Plus);
            }
            '-' => {
                chars.next();
                tokens.push(Token::Minus);
            }
            '*' => {
                chars.next();
                // Accept Python-style ** as exponentiation.
                if chars.peek() == Some(&'*') {
                    chars.next();
                    tokens.push(Token::Caret);
                } else {
                    tokens.push(Token::Star);
                }
            }
            '/' => {
                chars.next();
                tokens.push(Token::Slash);
            }
            '%' => {
                chars.next();
                tokens.push(Token::Percent);
            }
            '^' => {
                chars.next();
                tokens.push(Token::Caret);
            }
            '(' => {
                chars.next();
                tokens.push(Token::LParen);
            }
            ')' => {
                chars.next();
                tokens.push(Token::RParen);
            }
            ',' => {
                chars.next();
                tokens.push(Token::Comma);
            }
            other => return Err(format!("unexpected character '{other}'")),
        }
    }

    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn expect(&mut self, expected: Token) -> Result<(), String> {
        match self.next() {
            Some(tok) if tok == expected => Ok(()),
            Some(tok) => Err(format!("expected '{expected}', found '{tok}'")),
            None => Err("unexpected end of expression".to_string()),
        }
    }

    fn expr(&mut self) -> Result<f64, String> {
        let mut value = self.term()?;
        loop {
            match self.peek() {
                Some(Token::Plus) => {
                    self.next();
                    value += self.term()?;
                }
                Some(Token::Minus) => {
                    self.next();
                    value -= self.term()?;
                }
                _ => return Ok(value),
            }
        }
    }

    fn term(&mut self) -> Result<f64, String> {
        let mut value = self.unary()?;
        loop {
            match self.peek() {
                Some(Token::Star) => {
                    self.next();
                    value *= self.unary()?;
                }
                Some(Token::Slash) => {
                    self.next();
                    let rhs = self.unary()?;
                    if rhs == 0.0 {
                        return Err("division by zero".to_string());
                    }
                    value /= rhs;
                }
                Some(Token::Percent) => {
                    self.next();
                    let rhs = self.unary()?;
                    if rhs == 0.0 {
                        return Err("division by zero".to_string());
                    }
                    value %= rhs;
                }
                _ => return Ok(value),
            }
        }
    }

    fn unary(&mut self) -> Result<f64, String> {
        if self.peek() == Some(&Token::Minus) {
            self.next();
            return Ok(-self.unary()?);
        }
        self.power()
    }

    fn power(&mut self) -> Result<f64, String> {
        let base = self.atom()?;
        if self.peek() == Some(&Token::Caret) {
            self.next();
            // Right-associative exponent.
            let exponent = self.unary()?;
            return Ok(base.powf(exponent));
        }
        Ok(base)
    }

    fn atom(&mut self) -> Result<f64, String> {
        match self.next() {
            Some(Token::Number(n)) => Ok(n),
            Some(Token::LParen) => {
                let value = self.expr()?;
                self.expect(Token::RParen)?;
                Ok(value)
            }
            Some(Token::Ident(name)) => {
                if self.peek() == Some(&Token::LParen) {
                    self.next();
                    let mut args = vec![self.expr()?];
                    while self.peek() == Some(&Token::Comma) {
                        self.next();
                        args.push(self.expr()?);
                    }
                    self.expect(Token::RParen)?;
                    apply_function(&name, &args)
                } else {
                    constant(&name)
                }
            }
            Some(tok) => Err(format!("unexpected token '{tok}'")),
            None => Err("unexpected end of expression".to_string()),
        }
    }
}

/// Allow-listed constants.
fn constant(name: &str) -> Result<f64, String> {
    match name {
        "pi" => Ok(std::f64::consts::PI),
        "e" => Ok(std::f64::consts::E),
        other => Err(format!("name '{other}' is not defined")),
    }
}

/// Allow-listed functions; anything else is rejected by name.
fn apply_function(name: &str, args: &[f64]) -> Result<f64, String> {
    let unary = |args: &[f64]| -> Result<f64, String> {
        match args {
            [x] => Ok(*x),
            _ => Err(format!("{name}() takes exactly one argument")),
        }
    };

    match name {
        "abs" => Ok(unary(args)?.abs()),
        "round" => Ok(unary(args)?.round()),
        "sin" => Ok(unary(args)?.sin()),
        "cos" => Ok(unary(args)?.cos()),
        "tan" => Ok(unary(args)?.tan()),
        "asin" => Ok(unary(args)?.asin()),
        "acos" => Ok(unary(args)?.acos()),
        "atan" => Ok(unary(args)?.atan()),
        "sqrt" => {
            let x = unary(args)?;
            if x < 0.0 {
                return Err("sqrt of a negative number".to_string());
            }
            Ok(x.sqrt())
        }
        "exp" => Ok(unary(args)?.exp()),
        "log" => match args {
            [x] if *x > 0.0 => Ok(x.ln()),
            [x, base] if *x > 0.0 && *base > 0.0 => Ok(x.log(*base)),
            [_] | [_, _] => Err("log of a non-positive number".to_string()),
            _ => Err("log() takes one or two arguments".to_string()),
        },
        "log10" => {
            let x = unary(args)?;
            if x <= 0.0 {
                return Err("log of a non-positive number".to_string());
            }
            Ok(x.log10())
        }
        "min" => {
            if args.len() < 2 {
                return Err("min() takes at least two arguments".to_string());
            }
            Ok(args.iter().copied().fold(f64::INFINITY, f64::min))
        }
        "max" => {
            if args.len() < 2 {
                return Err("max() takes at least two arguments".to_string());
            }
            Ok(args.iter().copied().fold(f64::NEG_INFINITY, f64::max))
        }
        other => Err(format!("name '{other}' is not defined")),
    }
}
