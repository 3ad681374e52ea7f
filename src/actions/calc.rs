//! Restricted arithmetic expression evaluator
//!
//! Spoken math goes through this instead of any eval-style mechanism: the
//! input is reduced to digits, + - * /, parentheses, decimal points and
//! spaces, and anything else left after operator-word translation rejects
//! the expression.

/// Translate localized operator words to symbols, then strip everything
/// that is not part of an arithmetic expression.
pub fn sanitize(expr: &str) -> String {
    let symbolized = expr
        .replace("除以", "/")
        .replace('加', "+")
        .replace('減', "-")
        .replace('乘', "*")
        .replace('除', "/")
        .replace('x', "*")
        .replace('÷', "/");

    symbolized
        .chars()
        .filter(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | '*' | '/' | '.' | '(' | ')' | ' '))
        .collect()
}

/// Evaluate a sanitized arithmetic expression
pub fn evaluate(expr: &str) -> Option<f64> {
    let tokens: Vec<char> = expr.chars().filter(|c| !c.is_whitespace()).collect();
    if tokens.is_empty() {
        return None;
    }
    let mut parser = Parser { tokens, pos: 0 };
    let value = parser.expression()?;
    if parser.pos != parser.tokens.len() {
        return None;
    }
    if value.is_finite() {
        Some(value)
    } else {
        None
    }
}

/// Render a result without a trailing ".0" for whole numbers
pub fn format_result(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

struct Parser {
    tokens: Vec<char>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<char> {
        self.tokens.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        Some(c)
    }

    // expression := term (('+' | '-') term)*
    fn expression(&mut self) -> Option<f64> {
        let mut value = self.term()?;
        while let Some(op) = self.peek() {
            match op {
                '+' => {
                    self.bump();
                    value += self.term()?;
                }
                '-' => {
                    self.bump();
                    value -= self.term()?;
                }
                _ => break,
            }
        }
        Some(value)
    }

    // term := factor (('*' | '/') factor)*
    fn term(&mut self) -> Option<f64> {
        let mut value = self.factor()?;
        while let Some(op) = self.peek() {
            match op {
                '*' => {
                    self.bump();
                    value *= self.factor()?;
                }
                '/' => {
                    self.bump();
                    let divisor = self.factor()?;
                    value /= divisor;
                }
                _ => break,
            }
        }
        Some(value)
    }

    // factor := '-' factor | '(' expression ')' | number
    fn factor(&mut self) -> Option<f64> {
        match self.peek()? {
            '-' => {
                self.bump();
                Some(-self.factor()?)
            }
            '(' => {
                self.bump();
                let value = self.expression()?;
                if self.bump()? != ')' {
                    return None;
                }
                Some(value)
            }
            _ => self.number(),
        }
    }

    fn number(&mut self) -> Option<f64> {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() || c == '.' {
                self.pos += 1;
            } else {
                break;
            }
        }
        if self.pos == start {
            return None;
        }
        let literal: String = self.tokens[start..self.pos].iter().collect();
        literal.parse().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_translates_operator_words() {
        assert_eq!(sanitize("3加5"), "3+5");
        assert_eq!(sanitize("10除以2"), "10/2");
        assert_eq!(sanitize("4乘6減1"), "4*6-1");
        assert_eq!(sanitize("2x3"), "2*3");
        assert_eq!(sanitize("8÷4"), "8/4");
    }

    #[test]
    fn test_sanitize_drops_other_text() {
        assert_eq!(sanitize("請問3加5等於多少"), "3+5");
    }

    #[test]
    fn test_evaluate_basic() {
        assert_eq!(evaluate("3+5"), Some(8.0));
        assert_eq!(evaluate("10/4"), Some(2.5));
        assert_eq!(evaluate("2*(3+4)"), Some(14.0));
        assert_eq!(evaluate("-5+3"), Some(-2.0));
        assert_eq!(evaluate("1.5*2"), Some(3.0));
    }

    #[test]
    fn test_evaluate_precedence() {
        assert_eq!(evaluate("2+3*4"), Some(14.0));
        assert_eq!(evaluate("(2+3)*4"), Some(20.0));
    }

    #[test]
    fn test_evaluate_rejects_garbage() {
        assert_eq!(evaluate(""), None);
        assert_eq!(evaluate("3+"), None);
        assert_eq!(evaluate("(3+5"), None);
        assert_eq!(evaluate("++"), None);
    }

    #[test]
    fn test_division_by_zero_rejected() {
        assert_eq!(evaluate("1/0"), None);
    }

    #[test]
    fn test_format_result() {
        assert_eq!(format_result(8.0), "8");
        assert_eq!(format_result(2.5), "2.5");
        assert_eq!(format_result(-3.0), "-3");
    }
}
