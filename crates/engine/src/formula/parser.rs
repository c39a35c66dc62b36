// Formula parser - converts formula expressions into an AST.
// Supports: numbers, cell refs (A1), basic math (+, -, *, /), unary sign,
// parentheses. The expression is the part after the '=' prefix.

use std::fmt;

use crate::position::{letters_to_col, Position};

/// Expression AST for the formula language.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    /// Cell reference. May denote an out-of-grid position, in which case
    /// evaluation yields `#REF!`.
    CellRef(Position),
    UnaryOp {
        op: UnOp,
        operand: Box<Expr>,
    },
    BinaryOp {
        op: BinOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl BinOp {
    fn symbol(self) -> char {
        match self {
            BinOp::Add => '+',
            BinOp::Sub => '-',
            BinOp::Mul => '*',
            BinOp::Div => '/',
        }
    }

    fn precedence(self) -> u8 {
        match self {
            BinOp::Add | BinOp::Sub => 1,
            BinOp::Mul | BinOp::Div => 2,
        }
    }

    /// Whether the right operand needs parentheses at equal precedence:
    /// subtraction and division are not associative.
    fn right_assoc_guard(self) -> bool {
        matches!(self, BinOp::Sub | BinOp::Div)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnOp {
    Plus,
    Minus,
}

impl UnOp {
    fn symbol(self) -> char {
        match self {
            UnOp::Plus => '+',
            UnOp::Minus => '-',
        }
    }
}

// Precedence of a unary node; atoms sit above everything.
const UNARY_PRECEDENCE: u8 = 3;

impl Expr {
    /// Write the canonical text form, parenthesizing only where the tree
    /// shape requires it.
    fn write(&self, f: &mut fmt::Formatter<'_>, min_precedence: u8) -> fmt::Result {
        match self {
            Expr::Number(n) => write!(f, "{}", n),
            Expr::CellRef(pos) => write!(f, "{}", pos),
            Expr::UnaryOp { op, operand } => {
                write!(f, "{}", op.symbol())?;
                operand.write(f, UNARY_PRECEDENCE)
            }
            Expr::BinaryOp { op, left, right } => {
                let precedence = op.precedence();
                let parens = precedence < min_precedence;
                if parens {
                    write!(f, "(")?;
                }
                left.write(f, precedence)?;
                write!(f, "{}", op.symbol())?;
                let right_min = precedence + u8::from(op.right_assoc_guard());
                right.write(f, right_min)?;
                if parens {
                    write!(f, ")")?;
                }
                Ok(())
            }
        }
    }
}

/// Canonical re-printing: the parse of the output is identical to the
/// parse of the input, but redundant parentheses and whitespace are gone.
impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write(f, 0)
    }
}

/// Parse a formula expression (without the leading `=`) into an AST.
pub fn parse(expression: &str) -> Result<Expr, String> {
    let tokens = tokenize(expression)?;
    if tokens.is_empty() {
        return Err("empty formula".to_string());
    }
    let (expr, pos) = parse_add_sub(&tokens, 0)?;
    if pos != tokens.len() {
        return Err(format!("unexpected token after expression: {:?}", tokens[pos]));
    }
    Ok(expr)
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    CellRef(Position),
    Plus,
    Minus,
    Star,
    Slash,
    LParen,
    RParen,
}

fn tokenize(input: &str) -> Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            ' ' | '\t' => {
                chars.next();
            }
            '+' => {
                tokens.push(Token::Plus);
                chars.next();
            }
            '-' => {
                tokens.push(Token::Minus);
                chars.next();
            }
            '*' => {
                tokens.push(Token::Star);
                chars.next();
            }
            '/' => {
                tokens.push(Token::Slash);
                chars.next();
            }
            '(' => {
                tokens.push(Token::LParen);
                chars.next();
            }
            ')' => {
                tokens.push(Token::RParen);
                chars.next();
            }
            'A'..='Z' | 'a'..='z' => {
                let mut ident = String::new();
                while let Some(&ch) = chars.peek() {
                    if ch.is_ascii_alphanumeric() {
                        ident.push(ch);
                        chars.next();
                    } else {
                        break;
                    }
                }
                match try_parse_cell_ref(&ident) {
                    Some(token) => tokens.push(token),
                    None => return Err(format!("invalid cell reference: {}", ident)),
                }
            }
            '0'..='9' | '.' => {
                let mut num_str = String::new();
                while let Some(&d) = chars.peek() {
                    if d.is_ascii_digit() || d == '.' {
                        num_str.push(d);
                        chars.next();
                    } else {
                        break;
                    }
                }
                let num: f64 = num_str
                    .parse()
                    .map_err(|_| format!("invalid number: {}", num_str))?;
                tokens.push(Token::Number(num));
            }
            _ => return Err(format!("unexpected character: {}", c)),
        }
    }

    Ok(tokens)
}

fn try_parse_cell_ref(s: &str) -> Option<Token> {
    let split = s.find(|c: char| !c.is_ascii_alphabetic())?;
    let (letters, digits) = s.split_at(split);
    if letters.is_empty() || digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    // Rows past any real grid stay representable so the reference can
    // surface as #REF! at evaluation instead of failing the parse.
    let row: usize = digits.parse().unwrap_or(usize::MAX);
    if row == 0 {
        return None;
    }

    Some(Token::CellRef(Position {
        row: row - 1,
        col: letters_to_col(letters),
    }))
}

fn parse_add_sub(tokens: &[Token], pos: usize) -> Result<(Expr, usize), String> {
    let (mut left, mut pos) = parse_mul_div(tokens, pos)?;

    while pos < tokens.len() {
        let op = match &tokens[pos] {
            Token::Plus => BinOp::Add,
            Token::Minus => BinOp::Sub,
            _ => break,
        };
        let (right, new_pos) = parse_mul_div(tokens, pos + 1)?;
        left = Expr::BinaryOp {
            op,
            left: Box::new(left),
            right: Box::new(right),
        };
        pos = new_pos;
    }

    Ok((left, pos))
}

fn parse_mul_div(tokens: &[Token], pos: usize) -> Result<(Expr, usize), String> {
    let (mut left, mut pos) = parse_unary(tokens, pos)?;

    while pos < tokens.len() {
        let op = match &tokens[pos] {
            Token::Star => BinOp::Mul,
            Token::Slash => BinOp::Div,
            _ => break,
        };
        let (right, new_pos) = parse_unary(tokens, pos + 1)?;
        left = Expr::BinaryOp {
            op,
            left: Box::new(left),
            right: Box::new(right),
        };
        pos = new_pos;
    }

    Ok((left, pos))
}

fn parse_unary(tokens: &[Token], pos: usize) -> Result<(Expr, usize), String> {
    let op = match tokens.get(pos) {
        Some(Token::Plus) => UnOp::Plus,
        Some(Token::Minus) => UnOp::Minus,
        _ => return parse_primary(tokens, pos),
    };
    let (operand, new_pos) = parse_unary(tokens, pos + 1)?;
    Ok((
        Expr::UnaryOp {
            op,
            operand: Box::new(operand),
        },
        new_pos,
    ))
}

fn parse_primary(tokens: &[Token], pos: usize) -> Result<(Expr, usize), String> {
    match tokens.get(pos) {
        Some(Token::Number(n)) => Ok((Expr::Number(*n), pos + 1)),
        Some(Token::CellRef(cell)) => Ok((Expr::CellRef(*cell), pos + 1)),
        Some(Token::LParen) => {
            let (expr, new_pos) = parse_add_sub(tokens, pos + 1)?;
            match tokens.get(new_pos) {
                Some(Token::RParen) => Ok((expr, new_pos + 1)),
                _ => Err("missing closing parenthesis".to_string()),
            }
        }
        Some(token) => Err(format!("unexpected token: {:?}", token)),
        None => Err("unexpected end of formula".to_string()),
    }
}
