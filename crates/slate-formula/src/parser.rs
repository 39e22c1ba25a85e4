//! Formula parser
//!
//! A recursive descent parser for Slate formulas with proper operator
//! precedence. The grammar is deliberately small: arithmetic, comparisons,
//! `and`/`or`, cell references and ranges, and allow-listed function calls.
//! Anything outside it is a parse fault, which is how the engine guarantees
//! formula text can never execute arbitrary code.

use crate::ast::{BinaryOperator, Expr, UnaryOperator};
use crate::error::{FormulaError, FormulaResult};
use slate_core::{CellAddress, CellRange};

/// Parse a formula string into an AST
///
/// # Example
/// ```rust
/// use slate_formula::parse_formula;
///
/// let ast = parse_formula("=1+2").unwrap();
/// let ast = parse_formula("=SUM(A1:A10)").unwrap();
/// let ast = parse_formula("=IF(A1>0,\"Yes\",\"No\")").unwrap();
/// ```
pub fn parse_formula(formula: &str) -> FormulaResult<Expr> {
    let formula = formula.trim();

    // Formula must start with '='
    let formula = formula
        .strip_prefix('=')
        .ok_or_else(|| FormulaError::Parse("Formula must start with '='".into()))?;

    parse_expression_text(formula)
}

/// Parse a bare expression (no leading '=')
pub fn parse_expression_text(text: &str) -> FormulaResult<Expr> {
    let mut parser = Parser::new(text);
    let expr = parser.parse_expression()?;

    // Make sure we consumed all input
    if !matches!(parser.current_token(), Token::Eof) {
        return Err(FormulaError::Parse(format!(
            "Unexpected token after expression: {:?}",
            parser.current_token()
        )));
    }

    Ok(expr)
}

/// Token types
#[derive(Debug, Clone, PartialEq)]
enum Token {
    // Literals
    Number(f64),
    String(String),
    Boolean(bool),

    // Identifiers and references
    Identifier(String), // Function name or bare constant
    CellRef(String),    // Cell reference like A1, B12

    // Operators
    Plus,
    Minus,
    Star,
    Slash,
    DoubleSlash,
    Percent,
    Power, // Both '**' and '^'
    Equal, // Both '==' and the lone '=' spreadsheet convention
    NotEqual,
    LessThan,
    LessEqual,
    GreaterThan,
    GreaterEqual,
    And,
    Or,
    Colon,
    Comma,

    // Delimiters
    LeftParen,
    RightParen,

    // Character outside the grammar
    Unknown(char),

    // End of input
    Eof,
}

/// Formula parser
struct Parser<'a> {
    input: &'a str,
    pos: usize,
    current_token: Option<Token>,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        let mut parser = Self {
            input,
            pos: 0,
            current_token: None,
        };
        parser.advance_token();
        parser
    }

    // === Token scanning ===

    fn advance_token(&mut self) {
        self.skip_whitespace();
        self.current_token = Some(self.scan_token());
    }

    fn scan_token(&mut self) -> Token {
        self.skip_whitespace();

        if self.is_at_end() {
            return Token::Eof;
        }

        let c = match self.peek_char() {
            Some(c) => c,
            None => return Token::Eof,
        };

        // Single-character tokens
        match c {
            '+' => {
                self.advance();
                return Token::Plus;
            }
            '-' => {
                self.advance();
                return Token::Minus;
            }
            '%' => {
                self.advance();
                return Token::Percent;
            }
            '^' => {
                self.advance();
                return Token::Power;
            }
            ':' => {
                self.advance();
                return Token::Colon;
            }
            ',' => {
                self.advance();
                return Token::Comma;
            }
            '(' => {
                self.advance();
                return Token::LeftParen;
            }
            ')' => {
                self.advance();
                return Token::RightParen;
            }
            _ => {}
        }

        // Two-character operators
        if c == '*' {
            self.advance();
            if self.peek_char() == Some('*') {
                self.advance();
                return Token::Power;
            }
            return Token::Star;
        }

        if c == '/' {
            self.advance();
            if self.peek_char() == Some('/') {
                self.advance();
                return Token::DoubleSlash;
            }
            return Token::Slash;
        }

        if c == '<' {
            self.advance();
            if self.peek_char() == Some('=') {
                self.advance();
                return Token::LessEqual;
            } else if self.peek_char() == Some('>') {
                self.advance();
                return Token::NotEqual;
            }
            return Token::LessThan;
        }

        if c == '>' {
            self.advance();
            if self.peek_char() == Some('=') {
                self.advance();
                return Token::GreaterEqual;
            }
            return Token::GreaterThan;
        }

        // A lone '=' is the spreadsheet equality convention; '==' also works
        if c == '=' {
            self.advance();
            if self.peek_char() == Some('=') {
                self.advance();
            }
            return Token::Equal;
        }

        if c == '!' {
            self.advance();
            if self.peek_char() == Some('=') {
                self.advance();
                return Token::NotEqual;
            }
            return Token::Unknown('!');
        }

        // String literal
        if c == '"' || c == '\'' {
            return self.scan_string(c);
        }

        // Number
        if c.is_ascii_digit()
            || (c == '.' && self.peek_char_at(1).map_or(false, |c| c.is_ascii_digit()))
        {
            return self.scan_number();
        }

        // Identifier, keyword, or cell reference
        if c.is_ascii_alphabetic() || c == '_' {
            return self.scan_identifier_or_ref();
        }

        self.advance();
        Token::Unknown(c)
    }

    fn scan_string(&mut self, quote: char) -> Token {
        self.advance(); // Skip opening quote

        let mut s = String::new();
        while let Some(c) = self.peek_char() {
            if c == quote {
                // A doubled quote is an escaped quote character
                if self.peek_char_at(1) == Some(quote) {
                    s.push(quote);
                    self.advance();
                    self.advance();
                    continue;
                }
                break;
            }
            s.push(c);
            self.advance();
        }

        // Skip closing quote
        if self.peek_char() == Some(quote) {
            self.advance();
        }

        Token::String(s)
    }

    fn scan_number(&mut self) -> Token {
        let start = self.pos;

        // Integer part
        while self.peek_char().map_or(false, |c| c.is_ascii_digit()) {
            self.advance();
        }

        // Decimal part
        if self.peek_char() == Some('.') {
            self.advance();
            while self.peek_char().map_or(false, |c| c.is_ascii_digit()) {
                self.advance();
            }
        }

        // Exponent part, only when a digit actually follows: the 'e' in
        // '=2e' is not part of the literal, so it surfaces as a trailing
        // token and the formula is a parse fault
        if self.peek_char().map_or(false, |c| c == 'e' || c == 'E') {
            let mut digit_offset = 1;
            if self.peek_char_at(1).map_or(false, |c| c == '+' || c == '-') {
                digit_offset = 2;
            }
            if self
                .peek_char_at(digit_offset)
                .map_or(false, |c| c.is_ascii_digit())
            {
                for _ in 0..digit_offset {
                    self.advance();
                }
                while self.peek_char().map_or(false, |c| c.is_ascii_digit()) {
                    self.advance();
                }
            }
        }

        let num_str = &self.input[start..self.pos];
        let num: f64 = num_str.parse().unwrap_or(0.0);
        Token::Number(num)
    }

    fn scan_identifier_or_ref(&mut self) -> Token {
        let start = self.pos;

        while self
            .peek_char()
            .map_or(false, |c| c.is_ascii_alphanumeric() || c == '_')
        {
            self.advance();
        }

        let text = &self.input[start..self.pos];

        // Logical keywords are lowercase only
        if text == "and" {
            return Token::And;
        }
        if text == "or" {
            return Token::Or;
        }

        // Boolean literals (but not if followed by '(' - then it's a function call)
        let upper = text.to_uppercase();
        if upper == "TRUE" && self.peek_char() != Some('(') {
            return Token::Boolean(true);
        }
        if upper == "FALSE" && self.peek_char() != Some('(') {
            return Token::Boolean(false);
        }

        // Check if it looks like a cell reference (uppercase letters then digits)
        // BUT if followed by '(' it's a function call (LOG10(100) is a function,
        // not cell ref). Lowercase stays an identifier: `b12` is not a reference.
        if CellAddress::is_reference(text) && self.peek_char() != Some('(') {
            return Token::CellRef(text.to_string());
        }

        Token::Identifier(text.to_string())
    }

    // === Helper methods ===

    fn peek_char(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn peek_char_at(&self, offset: usize) -> Option<char> {
        self.input[self.pos..].chars().nth(offset)
    }

    fn advance(&mut self) {
        if let Some(c) = self.peek_char() {
            self.pos += c.len_utf8();
        }
    }

    fn skip_whitespace(&mut self) {
        while self.peek_char().map_or(false, |c| c.is_whitespace()) {
            self.advance();
        }
    }

    fn is_at_end(&self) -> bool {
        self.pos >= self.input.len()
    }

    fn current_token(&self) -> &Token {
        self.current_token.as_ref().unwrap_or(&Token::Eof)
    }

    fn consume(&mut self) -> Token {
        let token = self.current_token.take().unwrap_or(Token::Eof);
        self.advance_token();
        token
    }

    fn expect(&mut self, expected: &Token) -> FormulaResult<()> {
        if self.current_token() == expected {
            self.consume();
            Ok(())
        } else {
            Err(FormulaError::Parse(format!(
                "Expected {:?}, got {:?}",
                expected,
                self.current_token()
            )))
        }
    }

    // === Expression parsing with precedence ===
    // Precedence (lowest to highest):
    // 1. or
    // 2. and
    // 3. Comparison: =, ==, !=, <>, <, <=, >, >= (non-associative)
    // 4. Addition/Subtraction: +, -
    // 5. Multiplication/Division: *, /, //, %
    // 6. Unary: -, +
    // 7. Exponentiation: ** / ^ (right associative, binds tighter than a
    //    unary minus on its left: -3**2 is -(3**2))
    // 8. Primary: literals, references, function calls, parentheses

    fn parse_expression(&mut self) -> FormulaResult<Expr> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> FormulaResult<Expr> {
        let mut left = self.parse_and()?;

        while matches!(self.current_token(), Token::Or) {
            self.consume();
            let right = self.parse_and()?;
            left = Expr::BinaryOp {
                op: BinaryOperator::Or,
                left: Box::new(left),
                right: Box::new(right),
            };
        }

        Ok(left)
    }

    fn parse_and(&mut self) -> FormulaResult<Expr> {
        let mut left = self.parse_comparison()?;

        while matches!(self.current_token(), Token::And) {
            self.consume();
            let right = self.parse_comparison()?;
            left = Expr::BinaryOp {
                op: BinaryOperator::And,
                left: Box::new(left),
                right: Box::new(right),
            };
        }

        Ok(left)
    }

    fn comparison_op(&self) -> Option<BinaryOperator> {
        match self.current_token() {
            Token::Equal => Some(BinaryOperator::Equal),
            Token::NotEqual => Some(BinaryOperator::NotEqual),
            Token::LessThan => Some(BinaryOperator::LessThan),
            Token::LessEqual => Some(BinaryOperator::LessEqual),
            Token::GreaterThan => Some(BinaryOperator::GreaterThan),
            Token::GreaterEqual => Some(BinaryOperator::GreaterEqual),
            _ => None,
        }
    }

    fn parse_comparison(&mut self) -> FormulaResult<Expr> {
        let left = self.parse_additive()?;

        let op = match self.comparison_op() {
            Some(op) => op,
            None => return Ok(left),
        };
        self.consume();
        let right = self.parse_additive()?;

        // Comparison is non-associative: a < b < c is a fault, not a chain
        if self.comparison_op().is_some() {
            return Err(FormulaError::Parse(
                "Chained comparisons are not supported".into(),
            ));
        }

        Ok(Expr::BinaryOp {
            op,
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    fn parse_additive(&mut self) -> FormulaResult<Expr> {
        let mut left = self.parse_multiplicative()?;

        loop {
            let op = match self.current_token() {
                Token::Plus => BinaryOperator::Add,
                Token::Minus => BinaryOperator::Subtract,
                _ => break,
            };

            self.consume();
            let right = self.parse_multiplicative()?;
            left = Expr::BinaryOp {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }

        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> FormulaResult<Expr> {
        let mut left = self.parse_unary()?;

        loop {
            let op = match self.current_token() {
                Token::Star => BinaryOperator::Multiply,
                Token::Slash => BinaryOperator::Divide,
                Token::DoubleSlash => BinaryOperator::FloorDivide,
                Token::Percent => BinaryOperator::Modulo,
                _ => break,
            };

            self.consume();
            let right = self.parse_unary()?;
            left = Expr::BinaryOp {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }

        Ok(left)
    }

    fn parse_unary(&mut self) -> FormulaResult<Expr> {
        if matches!(self.current_token(), Token::Minus) {
            self.consume();
            let operand = self.parse_unary()?;
            return Ok(Expr::UnaryOp {
                op: UnaryOperator::Negate,
                operand: Box::new(operand),
            });
        }

        if matches!(self.current_token(), Token::Plus) {
            self.consume();
            let operand = self.parse_unary()?;
            return Ok(Expr::UnaryOp {
                op: UnaryOperator::Plus,
                operand: Box::new(operand),
            });
        }

        self.parse_power()
    }

    fn parse_power(&mut self) -> FormulaResult<Expr> {
        let left = self.parse_primary()?;

        if matches!(self.current_token(), Token::Power) {
            self.consume();
            // Right associative; the exponent may carry its own unary sign
            // (2**-1 is valid)
            let right = self.parse_unary()?;
            return Ok(Expr::BinaryOp {
                op: BinaryOperator::Power,
                left: Box::new(left),
                right: Box::new(right),
            });
        }

        Ok(left)
    }

    fn parse_primary(&mut self) -> FormulaResult<Expr> {
        match self.current_token().clone() {
            Token::Number(n) => {
                self.consume();
                Ok(Expr::Number(n))
            }

            Token::String(s) => {
                self.consume();
                Ok(Expr::String(s))
            }

            Token::Boolean(b) => {
                self.consume();
                Ok(Expr::Boolean(b))
            }

            Token::LeftParen => {
                self.consume();
                let expr = self.parse_expression()?;
                self.expect(&Token::RightParen)?;
                Ok(expr)
            }

            Token::CellRef(ref_str) => {
                self.consume();
                self.parse_reference(&ref_str)
            }

            Token::Identifier(name) => {
                self.consume();
                // Check if it's a function call
                if matches!(self.current_token(), Token::LeftParen) {
                    self.parse_function_call(name)
                } else {
                    // Bare name: constants resolve, everything else faults
                    Ok(Expr::NameRef(name))
                }
            }

            token => Err(FormulaError::Parse(format!(
                "Unexpected token: {:?}",
                token
            ))),
        }
    }

    fn parse_reference(&mut self, ref_str: &str) -> FormulaResult<Expr> {
        let start = CellAddress::parse(ref_str)
            .map_err(|e| FormulaError::Parse(format!("Invalid cell reference: {}", e)))?;

        // Check for a range (A1:B2)
        if matches!(self.current_token(), Token::Colon) {
            self.consume();
            let end_str = match self.consume() {
                Token::CellRef(s) => s,
                token => {
                    return Err(FormulaError::Parse(format!(
                        "Expected cell reference after ':', got {:?}",
                        token
                    )))
                }
            };
            let end = CellAddress::parse(&end_str)
                .map_err(|e| FormulaError::Parse(format!("Invalid cell reference: {}", e)))?;

            return Ok(Expr::RangeRef(CellRange::new(start, end)));
        }

        Ok(Expr::CellRef(start))
    }

    fn parse_function_call(&mut self, name: String) -> FormulaResult<Expr> {
        self.expect(&Token::LeftParen)?;

        let mut args = Vec::new();

        if !matches!(self.current_token(), Token::RightParen) {
            args.push(self.parse_expression()?);

            while matches!(self.current_token(), Token::Comma) {
                self.consume();
                args.push(self.parse_expression()?);
            }
        }

        self.expect(&Token::RightParen)?;

        Ok(Expr::Function {
            name: name.to_uppercase(),
            args,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn num(n: f64) -> Box<Expr> {
        Box::new(Expr::Number(n))
    }

    #[test]
    fn test_parse_number() {
        assert_eq!(parse_formula("=42").unwrap(), Expr::Number(42.0));
        assert_eq!(parse_formula("=3.14").unwrap(), Expr::Number(3.14));
        assert_eq!(parse_formula("=1e10").unwrap(), Expr::Number(1e10));
        assert_eq!(parse_formula("=2e-3").unwrap(), Expr::Number(2e-3));
        assert_eq!(parse_formula("=.5").unwrap(), Expr::Number(0.5));
    }

    #[test]
    fn test_parse_dangling_exponent_rejected() {
        // The 'e' is not part of the literal and nothing valid follows it
        assert!(parse_formula("=2e").is_err());
        assert!(parse_formula("=2e+").is_err());
        assert!(parse_formula("=2E*3").is_err());
    }

    #[test]
    fn test_parse_string() {
        assert_eq!(
            parse_formula("=\"Hello\"").unwrap(),
            Expr::String("Hello".into())
        );
        assert_eq!(
            parse_formula("='World'").unwrap(),
            Expr::String("World".into())
        );
        // Doubled quote escapes
        assert_eq!(
            parse_formula("=\"say \"\"hi\"\"\"").unwrap(),
            Expr::String("say \"hi\"".into())
        );
    }

    #[test]
    fn test_parse_boolean() {
        assert_eq!(parse_formula("=TRUE").unwrap(), Expr::Boolean(true));
        assert_eq!(parse_formula("=false").unwrap(), Expr::Boolean(false));
    }

    #[test]
    fn test_parse_requires_equals_prefix() {
        assert!(parse_formula("1+2").is_err());
    }

    #[test]
    fn test_parse_precedence_mul_over_add() {
        // 2+3*4 groups as 2+(3*4)
        let ast = parse_formula("=2+3*4").unwrap();
        assert_eq!(
            ast,
            Expr::BinaryOp {
                op: BinaryOperator::Add,
                left: num(2.0),
                right: Box::new(Expr::BinaryOp {
                    op: BinaryOperator::Multiply,
                    left: num(3.0),
                    right: num(4.0),
                }),
            }
        );
    }

    #[test]
    fn test_parse_power_right_associative() {
        // 2**3**2 groups as 2**(3**2)
        let ast = parse_formula("=2**3**2").unwrap();
        assert_eq!(
            ast,
            Expr::BinaryOp {
                op: BinaryOperator::Power,
                left: num(2.0),
                right: Box::new(Expr::BinaryOp {
                    op: BinaryOperator::Power,
                    left: num(3.0),
                    right: num(2.0),
                }),
            }
        );
    }

    #[test]
    fn test_parse_power_binds_tighter_than_unary_minus() {
        // -3**2 groups as -(3**2)
        let ast = parse_formula("=-3**2").unwrap();
        assert_eq!(
            ast,
            Expr::UnaryOp {
                op: UnaryOperator::Negate,
                operand: Box::new(Expr::BinaryOp {
                    op: BinaryOperator::Power,
                    left: num(3.0),
                    right: num(2.0),
                }),
            }
        );
    }

    #[test]
    fn test_parse_caret_is_power() {
        assert_eq!(parse_formula("=2^8").unwrap(), parse_formula("=2**8").unwrap());
    }

    #[test]
    fn test_parse_lone_equals_is_equality() {
        let ast = parse_formula("=A1=B1").unwrap();
        assert_eq!(
            ast,
            Expr::BinaryOp {
                op: BinaryOperator::Equal,
                left: Box::new(Expr::CellRef(CellAddress::parse("A1").unwrap())),
                right: Box::new(Expr::CellRef(CellAddress::parse("B1").unwrap())),
            }
        );
        // '==' parses identically
        assert_eq!(parse_formula("=A1==B1").unwrap(), ast);
    }

    #[test]
    fn test_parse_comparison_operators() {
        for (text, op) in [
            ("=1<2", BinaryOperator::LessThan),
            ("=1<=2", BinaryOperator::LessEqual),
            ("=1>2", BinaryOperator::GreaterThan),
            ("=1>=2", BinaryOperator::GreaterEqual),
            ("=1!=2", BinaryOperator::NotEqual),
            ("=1<>2", BinaryOperator::NotEqual),
        ] {
            let ast = parse_formula(text).unwrap();
            assert_eq!(
                ast,
                Expr::BinaryOp {
                    op,
                    left: num(1.0),
                    right: num(2.0),
                },
                "parsing {}",
                text
            );
        }
    }

    #[test]
    fn test_parse_chained_comparison_rejected() {
        assert!(parse_formula("=1<2<3").is_err());
    }

    #[test]
    fn test_parse_floor_div_and_modulo() {
        let ast = parse_formula("=7//2").unwrap();
        assert_eq!(
            ast,
            Expr::BinaryOp {
                op: BinaryOperator::FloorDivide,
                left: num(7.0),
                right: num(2.0),
            }
        );

        let ast = parse_formula("=7%2").unwrap();
        assert_eq!(
            ast,
            Expr::BinaryOp {
                op: BinaryOperator::Modulo,
                left: num(7.0),
                right: num(2.0),
            }
        );
    }

    #[test]
    fn test_parse_and_or() {
        let ast = parse_formula("=1 and 2 or 3").unwrap();
        // or binds looser than and: (1 and 2) or 3
        assert_eq!(
            ast,
            Expr::BinaryOp {
                op: BinaryOperator::Or,
                left: Box::new(Expr::BinaryOp {
                    op: BinaryOperator::And,
                    left: num(1.0),
                    right: num(2.0),
                }),
                right: num(3.0),
            }
        );
    }

    #[test]
    fn test_parse_cell_reference() {
        assert_eq!(
            parse_formula("=B12").unwrap(),
            Expr::CellRef(CellAddress::parse("B12").unwrap())
        );
    }

    #[test]
    fn test_parse_lowercase_ref_is_name() {
        // Lowercase is not a reference; it surfaces as a bare name
        assert_eq!(
            parse_formula("=b12").unwrap(),
            Expr::NameRef("b12".into())
        );
    }

    #[test]
    fn test_parse_range() {
        assert_eq!(
            parse_formula("=SUM(A1:A5)").unwrap(),
            Expr::Function {
                name: "SUM".into(),
                args: vec![Expr::RangeRef(CellRange::parse("A1:A5").unwrap())],
            }
        );
    }

    #[test]
    fn test_parse_function_case_insensitive() {
        let ast = parse_formula("=sum(5,10)").unwrap();
        assert_eq!(
            ast,
            Expr::Function {
                name: "SUM".into(),
                args: vec![Expr::Number(5.0), Expr::Number(10.0)],
            }
        );
    }

    #[test]
    fn test_parse_function_vs_cell_ref() {
        // LOG10 followed by '(' is a function; bare LOG10 is a reference
        assert_eq!(
            parse_formula("=LOG10(100)").unwrap(),
            Expr::Function {
                name: "LOG10".into(),
                args: vec![Expr::Number(100.0)],
            }
        );
        assert_eq!(
            parse_formula("=LOG10").unwrap(),
            Expr::CellRef(CellAddress::parse("LOG10").unwrap())
        );
    }

    #[test]
    fn test_parse_nested_function() {
        let ast = parse_formula("=IF(A1>0,SUM(A1:A3),0)").unwrap();
        match ast {
            Expr::Function { name, args } => {
                assert_eq!(name, "IF");
                assert_eq!(args.len(), 3);
            }
            other => panic!("expected function, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_rejects_disallowed_constructs() {
        // Attribute access, subscripts, and statements are outside the grammar
        assert!(parse_formula("=a.b").is_err());
        assert!(parse_formula("=[1,2]").is_err());
        assert!(parse_formula("=1;2").is_err());
        assert!(parse_formula("=invalid formula").is_err());
    }

    #[test]
    fn test_parse_trailing_garbage_rejected() {
        assert!(parse_formula("=1+2)").is_err());
        assert!(parse_formula("=SUM(1,2").is_err());
    }
}
