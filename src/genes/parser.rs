//! Recursive-descent parser for the canonical expression syntax.
//!
//! Accepts everything the formatter emits plus ordinary infix input:
//! `2a`, `3(a + b)`, `-x`, `a/b`, `sqrt(a)`, `ln(a*b)`, `[27]`.

use crate::error::{EqforgeError, Result};
use crate::genes::catalog::FunctionKind;
use crate::genes::gene::Gene;
use std::str::FromStr;

impl FromStr for Gene {
    type Err = EqforgeError;

    fn from_str(input: &str) -> Result<Self> {
        let mut parser = Parser::new(input);
        let mut terms = parser.sum_terms()?;
        parser.skip_whitespace();
        if let Some(c) = parser.peek() {
            return Err(EqforgeError::parse(parser.position, format!("Unexpected '{}'", c)));
        }
        Ok(match terms.len() {
            0 => return Err(EqforgeError::parse(0, "Empty expression")),
            1 => terms.remove(0).gene,
            _ => Gene::sum(terms.into_iter().map(|t| t.gene).collect()),
        })
    }
}

/// One additive term and whether it was written as a bare `x*y` / `x/y` chain.
struct Term {
    gene: Gene,
    direct_product: bool,
}

struct Parser {
    chars: Vec<char>,
    position: usize,
}

impl Parser {
    fn new(input: &str) -> Self {
        Self {
            chars: input.chars().collect(),
            position: 0,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.position).copied()
    }

    fn skip_whitespace(&mut self) {
        while self.peek().map_or(false, char::is_whitespace) {
            self.position += 1;
        }
    }

    fn peek_token(&mut self) -> Option<char> {
        self.skip_whitespace();
        self.peek()
    }

    fn expect(&mut self, expected: char) -> Result<()> {
        match self.peek_token() {
            Some(c) if c == expected => {
                self.position += 1;
                Ok(())
            }
            Some(c) => Err(EqforgeError::parse(
                self.position,
                format!("Expected '{}', found '{}'", expected, c),
            )),
            None => Err(EqforgeError::parse(
                self.position,
                format!("Expected '{}', found end of input", expected),
            )),
        }
    }

    fn sum_terms(&mut self) -> Result<Vec<Term>> {
        let mut terms = Vec::new();
        let mut negate = false;
        if self.peek_token() == Some('-') {
            self.position += 1;
            negate = true;
        }
        loop {
            let mut term = self.product()?;
            if negate {
                term.gene.multiple = -term.gene.multiple;
            }
            terms.push(term);
            match self.peek_token() {
                Some('+') => {
                    self.position += 1;
                    negate = false;
                }
                Some('-') => {
                    self.position += 1;
                    negate = true;
                }
                _ => return Ok(terms),
            }
        }
    }

    fn product(&mut self) -> Result<Term> {
        let first = self.factor()?;
        let mut factors = vec![first];
        loop {
            match self.peek_token() {
                Some('*') => {
                    self.position += 1;
                    factors.push(self.factor()?);
                }
                Some('/') => {
                    self.position += 1;
                    factors.push(Gene::division(self.factor()?));
                }
                _ => break,
            }
        }
        if factors.len() == 1 {
            Ok(Term {
                gene: factors.remove(0),
                direct_product: false,
            })
        } else {
            Ok(Term {
                gene: Gene::product(factors),
                direct_product: true,
            })
        }
    }

    fn factor(&mut self) -> Result<Gene> {
        match self.peek_token() {
            Some('-') => {
                self.position += 1;
                let gene = self.factor()?;
                let multiple = -gene.multiple;
                Ok(gene.with_multiple(multiple))
            }
            Some(c) if c.is_ascii_digit() || c == '.' => {
                let value = self.number()?;
                match self.peek_token() {
                    Some(next) if next == '(' || next == '[' || next.is_ascii_alphabetic() => {
                        let atom = self.atom()?;
                        let multiple = atom.multiple * value;
                        Ok(atom.with_multiple(multiple))
                    }
                    _ => Ok(Gene::constant(value)),
                }
            }
            _ => self.atom(),
        }
    }

    fn number(&mut self) -> Result<f64> {
        let start = self.position;
        while self
            .peek()
            .map_or(false, |c| c.is_ascii_digit() || c == '.')
        {
            self.position += 1;
        }
        // exponent, e.g. 1e-7
        if matches!(self.peek(), Some('e') | Some('E')) {
            let mark = self.position;
            self.position += 1;
            if matches!(self.peek(), Some('+') | Some('-')) {
                self.position += 1;
            }
            if self.peek().map_or(false, |c| c.is_ascii_digit()) {
                while self.peek().map_or(false, |c| c.is_ascii_digit()) {
                    self.position += 1;
                }
            } else {
                self.position = mark;
            }
        }
        let text: String = self.chars[start..self.position].iter().collect();
        text.parse::<f64>()
            .map_err(|_| EqforgeError::parse(start, format!("Invalid number '{}'", text)))
    }

    fn atom(&mut self) -> Result<Gene> {
        match self.peek_token() {
            Some('(') => {
                self.position += 1;
                let mut terms = self.sum_terms()?;
                self.expect(')')?;
                if terms.len() == 1 && terms[0].direct_product {
                    return Ok(terms.remove(0).gene);
                }
                Ok(Gene::sum(terms.into_iter().map(|t| t.gene).collect()))
            }
            Some('[') => {
                self.position += 1;
                let start = self.position;
                while self.peek().map_or(false, |c| c.is_ascii_digit()) {
                    self.position += 1;
                }
                let text: String = self.chars[start..self.position].iter().collect();
                let id = text
                    .parse::<usize>()
                    .map_err(|_| EqforgeError::parse(start, "Invalid parameter index"))?;
                self.expect(']')?;
                Ok(Gene::parameter(id))
            }
            Some(c) if c.is_ascii_alphabetic() => {
                let start = self.position;
                while self.peek().map_or(false, |c| c.is_ascii_alphabetic()) {
                    self.position += 1;
                }
                let word: String = self.chars[start..self.position].iter().collect();
                if let Some(func) = FunctionKind::from_symbol(&word) {
                    let argument = self.atom()?;
                    return Ok(Gene::function(func, argument));
                }
                let mut letters = word.chars();
                match (letters.next(), letters.next()) {
                    (Some(letter), None) if letter.is_ascii_lowercase() => {
                        Ok(Gene::parameter((letter as u8 - b'a') as usize))
                    }
                    _ => Err(EqforgeError::parse(start, format!("Unknown name '{}'", word))),
                }
            }
            Some(c) => Err(EqforgeError::parse(self.position, format!("Unexpected '{}'", c))),
            None => Err(EqforgeError::parse(self.position, "Unexpected end of input")),
        }
    }
}
