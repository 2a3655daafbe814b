//! Rule DSL parser.
//!
//! Recursive descent parser for the rule grammar. Converts text to AST with
//! meaningful error messages including character offset, expected/found
//! tokens. Keywords are case sensitive; price fields are lowercase.

use crate::domain::error::ParseError;
use crate::domain::indicator::{IndicatorField, IndicatorId, RankSeed};
use crate::domain::rule::{CmpOp, IndicatorRef, Operand, Rule};

struct Parser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn remaining(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.remaining().chars().next()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        Some(ch)
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.peek() {
            if ch.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn expect_char(&mut self, expected: char) -> Result<(), ParseError> {
        self.skip_whitespace();
        match self.peek() {
            Some(ch) if ch == expected => {
                self.advance();
                Ok(())
            }
            Some(ch) => Err(ParseError {
                message: format!("expected '{}', found '{}'", expected, ch),
                position: self.pos,
            }),
            None => Err(ParseError {
                message: format!("expected '{}', found end of input", expected),
                position: self.pos,
            }),
        }
    }

    fn peek_keyword(&self, keyword: &str) -> bool {
        let remaining = self.remaining();
        remaining.starts_with(keyword)
            && (remaining.len() == keyword.len()
                || !remaining[keyword.len()..]
                    .chars()
                    .next()
                    .map(|c| c.is_alphanumeric() || c == '_')
                    .unwrap_or(false))
    }

    fn consume_keyword(&mut self, keyword: &str) -> bool {
        if self.peek_keyword(keyword) {
            self.pos += keyword.len();
            true
        } else {
            false
        }
    }

    fn expect_keyword(&mut self, keyword: &str) -> Result<(), ParseError> {
        if self.consume_keyword(keyword) {
            Ok(())
        } else {
            let found = self.peek_word();
            Err(ParseError {
                message: format!("expected '{}', found '{}'", keyword, found),
                position: self.pos,
            })
        }
    }

    fn peek_word(&self) -> String {
        let mut word = String::new();
        for ch in self.remaining().chars() {
            if ch.is_alphanumeric() || ch == '_' {
                word.push(ch);
            } else {
                break;
            }
        }
        if word.is_empty() {
            self.peek()
                .map(|c| c.to_string())
                .unwrap_or_else(|| "end of input".to_string())
        } else {
            word
        }
    }

    fn parse_number(&mut self) -> Result<f64, ParseError> {
        self.skip_whitespace();
        let start = self.pos;
        let mut has_dot = false;
        let mut digits = 0;

        if self.peek() == Some('-') {
            self.advance();
        }

        while let Some(ch) = self.peek() {
            if ch.is_ascii_digit() {
                digits += 1;
                self.advance();
            } else if ch == '.' && !has_dot {
                has_dot = true;
                self.advance();
            } else {
                break;
            }
        }

        if digits == 0 {
            return Err(ParseError {
                message: "expected number".to_string(),
                position: start,
            });
        }

        let num_str = &self.input[start..self.pos];
        num_str.parse::<f64>().map_err(|_| ParseError {
            message: format!("invalid number: {}", num_str),
            position: start,
        })
    }

    fn parse_integer(&mut self) -> Result<usize, ParseError> {
        self.skip_whitespace();
        let start = self.pos;
        let mut digits = 0;

        while let Some(ch) = self.peek() {
            if ch.is_ascii_digit() {
                digits += 1;
                self.advance();
            } else {
                break;
            }
        }

        if digits == 0 {
            return Err(ParseError {
                message: "expected integer".to_string(),
                position: start,
            });
        }

        let num_str = &self.input[start..self.pos];
        num_str.parse::<usize>().map_err(|_| ParseError {
            message: format!("invalid integer: {}", num_str),
            position: start,
        })
    }

    fn parse_price_field(&mut self) -> Result<Operand, ParseError> {
        self.skip_whitespace();
        let word = self.peek_word();
        let operand = match word.as_str() {
            "open" => Operand::Open,
            "high" => Operand::High,
            "low" => Operand::Low,
            "close" => Operand::Close,
            "volume" => Operand::Volume,
            _ => {
                return Err(ParseError {
                    message: format!(
                        "expected price field (open, high, low, close, volume), found '{}'",
                        word
                    ),
                    position: self.pos,
                });
            }
        };
        self.pos += word.len();
        Ok(operand)
    }

    fn consume_exact(&mut self, s: &str) -> bool {
        if self.remaining().starts_with(s) {
            self.pos += s.len();
            true
        } else {
            false
        }
    }

    fn single_period(&mut self, make: fn(usize) -> IndicatorId) -> Result<Operand, ParseError> {
        let period = self.parse_integer()?;
        self.expect_char(')')?;
        Ok(Operand::Indicator(IndicatorRef {
            id: make(period),
            field: IndicatorField::Value,
        }))
    }

    fn ha_field(&self, field: IndicatorField) -> Operand {
        Operand::Indicator(IndicatorRef {
            id: IndicatorId::HeikinAshi,
            field,
        })
    }

    fn parse_indicator(&mut self) -> Result<Operand, ParseError> {
        self.skip_whitespace();

        if self.consume_exact("SMA(") {
            return self.single_period(IndicatorId::Sma);
        }
        if self.consume_exact("EMA(") {
            return self.single_period(IndicatorId::Ema);
        }
        if self.consume_exact("WMA(") {
            return self.single_period(IndicatorId::Wma);
        }
        if self.consume_exact("RSI(") {
            return self.single_period(IndicatorId::Rsi);
        }
        if self.consume_exact("ROC(") {
            return self.single_period(IndicatorId::Roc);
        }
        if self.consume_exact("ATR(") {
            return self.single_period(IndicatorId::Atr);
        }

        if self.consume_keyword("VWAP") {
            return Ok(Operand::Indicator(IndicatorRef {
                id: IndicatorId::Vwap,
                field: IndicatorField::Value,
            }));
        }

        if self.consume_keyword("HA_OPEN") {
            return Ok(self.ha_field(IndicatorField::CandleOpen));
        }
        if self.consume_keyword("HA_HIGH") {
            return Ok(self.ha_field(IndicatorField::CandleHigh));
        }
        if self.consume_keyword("HA_LOW") {
            return Ok(self.ha_field(IndicatorField::CandleLow));
        }
        if self.consume_keyword("HA_CLOSE") {
            return Ok(self.ha_field(IndicatorField::CandleClose));
        }

        if self.consume_exact("PERCENT_RANK(") {
            let period = self.parse_integer()?;
            // optional second argument: neutral pre-fill value for the
            // warmup window, e.g. PERCENT_RANK(100, 50)
            self.skip_whitespace();
            let seed = if self.peek() == Some(',') {
                self.advance();
                let neutral = self.parse_number()?;
                RankSeed::neutral(neutral)
            } else {
                RankSeed::Skip
            };
            self.expect_char(')')?;
            return Ok(Operand::Indicator(IndicatorRef {
                id: IndicatorId::PercentRank { period, seed },
                field: IndicatorField::Value,
            }));
        }

        if self.consume_exact("CONNORS_RSI(") {
            let rsi = self.parse_integer()?;
            self.expect_char(',')?;
            let streak = self.parse_integer()?;
            self.expect_char(',')?;
            let rank = self.parse_integer()?;
            self.expect_char(')')?;
            return Ok(Operand::Indicator(IndicatorRef {
                id: IndicatorId::ConnorsRsi { rsi, streak, rank },
                field: IndicatorField::Value,
            }));
        }

        let word = self.peek_word();
        Err(ParseError {
            message: format!("expected indicator, found '{}'", word),
            position: self.pos,
        })
    }

    fn parse_operand(&mut self) -> Result<Operand, ParseError> {
        self.skip_whitespace();

        if self
            .peek()
            .is_some_and(|ch| ch.is_ascii_digit() || ch == '-' || ch == '.')
        {
            let num = self.parse_number()?;
            return Ok(Operand::Constant(num));
        }

        let word = self.peek_word();
        match word.as_str() {
            "open" | "high" | "low" | "close" | "volume" => self.parse_price_field(),
            _ => self.parse_indicator(),
        }
    }

    fn parse_pair(&mut self, keyword: &str) -> Result<(Operand, Operand), ParseError> {
        self.expect_keyword(keyword)?;
        self.expect_char('(')?;
        let left = self.parse_operand()?;
        self.expect_char(',')?;
        let right = self.parse_operand()?;
        self.expect_char(')')?;
        Ok((left, right))
    }

    fn parse_comparison(&mut self, keyword: &str, op: CmpOp) -> Result<Rule, ParseError> {
        let (left, right) = self.parse_pair(keyword)?;
        Ok(Rule::Compare { left, op, right })
    }

    /// A rule is a composite (`ALL`/`ANY`/`NOT`), a prefix comparison
    /// call like `ABOVE(close, 100)`, or the infix form
    /// `<operand> ABOVE <operand>`. An operand can never start with a
    /// comparison keyword, so a leading keyword always means the prefix
    /// form.
    fn parse_rule(&mut self) -> Result<Rule, ParseError> {
        self.skip_whitespace();

        if self.peek_keyword("ALL") {
            return self.parse_composite("ALL");
        }
        if self.peek_keyword("ANY") {
            return self.parse_composite("ANY");
        }
        if self.peek_keyword("NOT") {
            return self.parse_not();
        }

        if self.peek_keyword("CROSS_ABOVE") {
            let (left, right) = self.parse_pair("CROSS_ABOVE")?;
            return Ok(Rule::CrossAbove { left, right });
        }
        if self.peek_keyword("CROSS_BELOW") {
            let (left, right) = self.parse_pair("CROSS_BELOW")?;
            return Ok(Rule::CrossBelow { left, right });
        }
        if self.peek_keyword("ABOVE") {
            return self.parse_comparison("ABOVE", CmpOp::Gt);
        }
        if self.peek_keyword("BELOW") {
            return self.parse_comparison("BELOW", CmpOp::Lt);
        }
        if self.peek_keyword("AT_LEAST") {
            return self.parse_comparison("AT_LEAST", CmpOp::Ge);
        }
        if self.peek_keyword("AT_MOST") {
            return self.parse_comparison("AT_MOST", CmpOp::Le);
        }

        let left = self.parse_operand()?;
        self.skip_whitespace();
        let word = self.peek_word();
        match word.as_str() {
            "ABOVE" => self.parse_infix(left, "ABOVE", CmpOp::Gt),
            "BELOW" => self.parse_infix(left, "BELOW", CmpOp::Lt),
            "AT_LEAST" => self.parse_infix(left, "AT_LEAST", CmpOp::Ge),
            "AT_MOST" => self.parse_infix(left, "AT_MOST", CmpOp::Le),
            "CROSS_ABOVE" => {
                self.expect_keyword("CROSS_ABOVE")?;
                let right = self.parse_operand()?;
                Ok(Rule::CrossAbove { left, right })
            }
            "CROSS_BELOW" => {
                self.expect_keyword("CROSS_BELOW")?;
                let right = self.parse_operand()?;
                Ok(Rule::CrossBelow { left, right })
            }
            found => Err(ParseError {
                message: format!("expected comparison keyword, found '{}'", found),
                position: self.pos,
            }),
        }
    }

    fn parse_infix(&mut self, left: Operand, keyword: &str, op: CmpOp) -> Result<Rule, ParseError> {
        self.expect_keyword(keyword)?;
        let right = self.parse_operand()?;
        Ok(Rule::Compare { left, op, right })
    }

    fn parse_composite(&mut self, keyword: &str) -> Result<Rule, ParseError> {
        self.expect_keyword(keyword)?;
        self.expect_char('(')?;

        let mut rules = Vec::new();
        rules.push(self.parse_rule()?);

        loop {
            self.skip_whitespace();
            if self.peek() == Some(')') {
                self.advance();
                break;
            }
            self.expect_char(',')?;
            rules.push(self.parse_rule()?);
        }

        if rules.len() < 2 {
            return Err(ParseError {
                message: format!("{} requires at least 2 rules", keyword),
                position: self.pos,
            });
        }

        match keyword {
            "ALL" => Ok(Rule::All(rules)),
            _ => Ok(Rule::Any(rules)),
        }
    }

    fn parse_not(&mut self) -> Result<Rule, ParseError> {
        self.expect_keyword("NOT")?;
        self.expect_char('(')?;
        let rule = self.parse_rule()?;
        self.expect_char(')')?;
        Ok(Rule::Not(Box::new(rule)))
    }

    fn parse(&mut self) -> Result<Rule, ParseError> {
        let rule = self.parse_rule()?;
        self.skip_whitespace();
        if self.pos < self.input.len() {
            return Err(ParseError {
                message: format!("unexpected input after rule: '{}'", self.remaining()),
                position: self.pos,
            });
        }
        Ok(rule)
    }
}

pub fn parse(input: &str) -> Result<Rule, ParseError> {
    let mut parser = Parser::new(input);
    parser.parse()
}

/// Parse a bare operand expression, e.g. a ranking expression like
/// `CONNORS_RSI(3,2,100)` or `volume`.
pub fn parse_operand(input: &str) -> Result<Operand, ParseError> {
    let mut parser = Parser::new(input);
    let operand = parser.parse_operand()?;
    parser.skip_whitespace();
    if parser.pos < parser.input.len() {
        return Err(ParseError {
            message: format!("unexpected input after operand: '{}'", parser.remaining()),
            position: parser.pos,
        });
    }
    Ok(operand)
}
