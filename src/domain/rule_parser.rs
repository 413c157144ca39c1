//! Rule DSL parser.
//!
//! Recursive descent parser for the vote rule grammar. Converts text to an AST
//! with error messages that carry the character offset and the expected/found
//! tokens.
//!
//! ```text
//! rule     := CROSS_ABOVE(op, op) | CROSS_BELOW(op, op) | ABOVE(op, op)
//!           | BELOW(op, op) | EQUALS(op, op) | BETWEEN(op, num, num)
//!           | AND(rule, rule, ...) | OR(rule, rule, ...) | NOT(rule)
//!           | CONSECUTIVE(rule, int) | ANY_OF(rule, int)
//!           | BULLISH_DIVERGENCE(ind, int, int) | BEARISH_DIVERGENCE(ind, int, int)
//! op       := open | high | low | close | volume | num | ind
//! ```

use crate::domain::error::ParseError;
use crate::domain::indicator::IndicatorType;
use crate::domain::rule::{IndicatorField, IndicatorRef, Operand, Rule};

struct Parser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn error(&self, message: impl Into<String>, position: usize) -> ParseError {
        ParseError {
            message: message.into(),
            position,
        }
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
        while self.peek().is_some_and(char::is_whitespace) {
            self.advance();
        }
    }

    fn expect_char(&mut self, expected: char) -> Result<(), ParseError> {
        self.skip_whitespace();
        match self.peek() {
            Some(ch) if ch == expected => {
                self.advance();
                Ok(())
            }
            Some(ch) => Err(self.error(format!("expected '{}', found '{}'", expected, ch), self.pos)),
            None => Err(self.error(
                format!("expected '{}', found end of input", expected),
                self.pos,
            )),
        }
    }

    fn peek_keyword(&self, keyword: &str) -> bool {
        let remaining = self.remaining();
        remaining.starts_with(keyword)
            && !remaining[keyword.len()..]
                .chars()
                .next()
                .is_some_and(|c| c.is_alphanumeric() || c == '_')
    }

    fn expect_keyword(&mut self, keyword: &str) -> Result<(), ParseError> {
        if self.peek_keyword(keyword) {
            self.pos += keyword.len();
            Ok(())
        } else {
            let found = self.peek_word();
            Err(self.error(format!("expected '{}', found '{}'", keyword, found), self.pos))
        }
    }

    /// Next identifier, or a description of the next token when there is none.
    fn peek_word(&self) -> String {
        let word: String = self
            .remaining()
            .chars()
            .take_while(|c| c.is_alphanumeric() || *c == '_')
            .collect();
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
            } else if ch == '.' && !has_dot {
                has_dot = true;
            } else {
                break;
            }
            self.advance();
        }

        if digits == 0 {
            return Err(self.error("expected number", start));
        }

        let num_str = &self.input[start..self.pos];
        num_str
            .parse::<f64>()
            .map_err(|_| self.error(format!("invalid number: {}", num_str), start))
    }

    fn parse_integer(&mut self) -> Result<usize, ParseError> {
        self.skip_whitespace();
        let start = self.pos;
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.advance();
        }
        if self.pos == start {
            return Err(self.error("expected integer", start));
        }
        let num_str = &self.input[start..self.pos];
        num_str
            .parse::<usize>()
            .map_err(|_| self.error(format!("invalid integer: {}", num_str), start))
    }

    /// Integer that must be at least 1 (periods, counts, pivot widths).
    fn parse_positive(&mut self, what: &str) -> Result<usize, ParseError> {
        self.skip_whitespace();
        let start = self.pos;
        let value = self.parse_integer()?;
        if value == 0 {
            return Err(self.error(format!("{} must be at least 1", what), start));
        }
        Ok(value)
    }

    /// Band multiplier such as `2` or `1.5`, stored in hundredths.
    fn parse_multiplier(&mut self) -> Result<u32, ParseError> {
        self.skip_whitespace();
        let start = self.pos;
        let mult = self.parse_number()?;
        if mult <= 0.0 {
            return Err(self.error("multiplier must be positive", start));
        }
        Ok((mult * 100.0).round() as u32)
    }

    /// `(n)` argument list.
    fn parse_period_args(&mut self) -> Result<usize, ParseError> {
        self.expect_char('(')?;
        let period = self.parse_positive("period")?;
        self.expect_char(')')?;
        Ok(period)
    }

    /// `(n, mult)` argument list.
    fn parse_band_args(&mut self) -> Result<(usize, u32), ParseError> {
        self.expect_char('(')?;
        let period = self.parse_positive("period")?;
        self.expect_char(',')?;
        let mult = self.parse_multiplier()?;
        self.expect_char(')')?;
        Ok((period, mult))
    }

    /// `(a, b, c)` argument list of positive integers.
    fn parse_triple_args(&mut self) -> Result<(usize, usize, usize), ParseError> {
        self.expect_char('(')?;
        let a = self.parse_positive("period")?;
        self.expect_char(',')?;
        let b = self.parse_positive("period")?;
        self.expect_char(',')?;
        let c = self.parse_positive("period")?;
        self.expect_char(')')?;
        Ok((a, b, c))
    }

    fn parse_indicator(&mut self) -> Result<IndicatorRef, ParseError> {
        use IndicatorField as F;
        use IndicatorType as T;

        self.skip_whitespace();
        let start = self.pos;
        let word = self.peek_word();
        let simple = |indicator_type| IndicatorRef {
            indicator_type,
            field: F::Value,
        };
        self.pos += word.len();

        let iref = match word.as_str() {
            "SMA" => simple(T::Sma(self.parse_period_args()?)),
            "EMA" => simple(T::Ema(self.parse_period_args()?)),
            "WMA" => simple(T::Wma(self.parse_period_args()?)),
            "RSI" => simple(T::Rsi(self.parse_period_args()?)),
            "ROC" => simple(T::Roc(self.parse_period_args()?)),
            "MOMENTUM" => simple(T::Momentum(self.parse_period_args()?)),
            "ATR" => simple(T::Atr(self.parse_period_args()?)),
            "STDDEV" => simple(T::Stddev(self.parse_period_args()?)),
            "ZSCORE" => simple(T::ZScore(self.parse_period_args()?)),
            "CCI" => simple(T::Cci(self.parse_period_args()?)),
            "WILLIAMS_R" => simple(T::WilliamsR(self.parse_period_args()?)),
            "MFI" => simple(T::Mfi(self.parse_period_args()?)),
            "OBV" => simple(T::Obv),
            "VWAP" => simple(T::Vwap),
            "MACD_LINE" | "MACD_SIGNAL" | "MACD_HISTOGRAM" => {
                let (fast, slow, signal) = self.parse_triple_args()?;
                let field = match word.as_str() {
                    "MACD_SIGNAL" => F::MacdSignal,
                    "MACD_HISTOGRAM" => F::MacdHistogram,
                    _ => F::MacdLine,
                };
                IndicatorRef {
                    indicator_type: T::Macd { fast, slow, signal },
                    field,
                }
            }
            "STOCHASTIC_K" | "STOCHASTIC_D" => {
                self.expect_char('(')?;
                let k_period = self.parse_positive("period")?;
                self.expect_char(',')?;
                let d_period = self.parse_positive("period")?;
                self.expect_char(')')?;
                IndicatorRef {
                    indicator_type: T::Stochastic { k_period, d_period },
                    field: if word == "STOCHASTIC_D" {
                        F::StochasticD
                    } else {
                        F::StochasticK
                    },
                }
            }
            "BOLLINGER_UPPER" | "BOLLINGER_MIDDLE" | "BOLLINGER_LOWER" => {
                let (period, stddev_mult_x100) = self.parse_band_args()?;
                IndicatorRef {
                    indicator_type: T::Bollinger {
                        period,
                        stddev_mult_x100,
                    },
                    field: band_field(&word),
                }
            }
            "KELTNER_UPPER" | "KELTNER_MIDDLE" | "KELTNER_LOWER" => {
                let (period, atr_mult_x100) = self.parse_band_args()?;
                IndicatorRef {
                    indicator_type: T::Keltner {
                        period,
                        atr_mult_x100,
                    },
                    field: band_field(&word),
                }
            }
            "DONCHIAN_UPPER" | "DONCHIAN_MIDDLE" | "DONCHIAN_LOWER" => IndicatorRef {
                indicator_type: T::Donchian(self.parse_period_args()?),
                field: band_field(&word),
            },
            "ICHIMOKU_TENKAN" | "ICHIMOKU_KIJUN" | "ICHIMOKU_SENKOU_A" | "ICHIMOKU_SENKOU_B" => {
                let (tenkan, kijun, senkou_b) = self.parse_triple_args()?;
                let field = match word.as_str() {
                    "ICHIMOKU_KIJUN" => F::Kijun,
                    "ICHIMOKU_SENKOU_A" => F::SenkouA,
                    "ICHIMOKU_SENKOU_B" => F::SenkouB,
                    _ => F::Tenkan,
                };
                IndicatorRef {
                    indicator_type: T::Ichimoku {
                        tenkan,
                        kijun,
                        senkou_b,
                    },
                    field,
                }
            }
            "ADX" | "PLUS_DI" | "MINUS_DI" => {
                let field = match word.as_str() {
                    "PLUS_DI" => F::PlusDi,
                    "MINUS_DI" => F::MinusDi,
                    _ => F::Adx,
                };
                IndicatorRef {
                    indicator_type: T::Adx(self.parse_period_args()?),
                    field,
                }
            }
            "PIVOT" | "PIVOT_R1" | "PIVOT_R2" | "PIVOT_R3" | "PIVOT_S1" | "PIVOT_S2"
            | "PIVOT_S3" => {
                let field = match word.as_str() {
                    "PIVOT_R1" => F::R1,
                    "PIVOT_R2" => F::R2,
                    "PIVOT_R3" => F::R3,
                    "PIVOT_S1" => F::S1,
                    "PIVOT_S2" => F::S2,
                    "PIVOT_S3" => F::S3,
                    _ => F::Pivot,
                };
                IndicatorRef {
                    indicator_type: T::Pivot,
                    field,
                }
            }
            "PARABOLA_CURVATURE" | "PARABOLA_SLOPE" | "PARABOLA_FITTED" => {
                let field = match word.as_str() {
                    "PARABOLA_CURVATURE" => F::Curvature,
                    "PARABOLA_SLOPE" => F::Slope,
                    _ => F::Fitted,
                };
                self.skip_whitespace();
                let arg_pos = self.pos;
                let period = self.parse_period_args()?;
                if period < 3 {
                    return Err(self.error("parabola period must be at least 3", arg_pos));
                }
                IndicatorRef {
                    indicator_type: T::Parabola(period),
                    field,
                }
            }
            "NY_OPEN" | "LONDON_HIGH" | "LONDON_LOW" => IndicatorRef {
                indicator_type: T::Session,
                field: match word.as_str() {
                    "LONDON_HIGH" => F::LondonHigh,
                    "LONDON_LOW" => F::LondonLow,
                    _ => F::NyOpen,
                },
            },
            "DIVERGENCE" => {
                let (source, pivot, lookback) = self.parse_divergence_args()?;
                simple(T::Divergence {
                    source: Box::new(source),
                    pivot,
                    lookback,
                })
            }
            _ => {
                self.pos = start;
                return Err(self.error(format!("expected indicator, found '{}'", word), start));
            }
        };
        Ok(iref)
    }

    /// `(indicator, pivot, lookback)` as used by the divergence forms.
    fn parse_divergence_args(&mut self) -> Result<(IndicatorRef, usize, usize), ParseError> {
        self.expect_char('(')?;
        self.skip_whitespace();
        let source_pos = self.pos;
        let source = self.parse_indicator()?;
        if matches!(source.indicator_type, IndicatorType::Divergence { .. }) {
            return Err(self.error("divergence source cannot itself be a divergence", source_pos));
        }
        self.expect_char(',')?;
        let pivot = self.parse_positive("pivot")?;
        self.expect_char(',')?;
        let lookback = self.parse_positive("lookback")?;
        self.expect_char(')')?;
        Ok((source, pivot, lookback))
    }

    fn parse_operand(&mut self) -> Result<Operand, ParseError> {
        self.skip_whitespace();

        if self
            .peek()
            .is_some_and(|ch| ch.is_ascii_digit() || ch == '-' || ch == '.')
        {
            return Ok(Operand::Constant(self.parse_number()?));
        }

        let word = self.peek_word();
        let price = match word.as_str() {
            "open" => Some(Operand::Open),
            "high" => Some(Operand::High),
            "low" => Some(Operand::Low),
            "close" => Some(Operand::Close),
            "volume" => Some(Operand::Volume),
            _ => None,
        };
        match price {
            Some(operand) => {
                self.pos += word.len();
                Ok(operand)
            }
            None => Ok(Operand::Indicator(self.parse_indicator()?)),
        }
    }

    fn parse_comparison(&mut self, keyword: &str) -> Result<Rule, ParseError> {
        self.expect_keyword(keyword)?;
        self.expect_char('(')?;

        let left = self.parse_operand()?;
        self.expect_char(',')?;
        let right = self.parse_operand()?;
        self.expect_char(')')?;

        Ok(match keyword {
            "CROSS_ABOVE" => Rule::CrossAbove { left, right },
            "CROSS_BELOW" => Rule::CrossBelow { left, right },
            "ABOVE" => Rule::Above { left, right },
            "BELOW" => Rule::Below { left, right },
            _ => Rule::Equals { left, right },
        })
    }

    fn parse_between(&mut self) -> Result<Rule, ParseError> {
        self.expect_keyword("BETWEEN")?;
        self.expect_char('(')?;

        let operand = self.parse_operand()?;
        self.expect_char(',')?;
        let lower = self.parse_number()?;
        self.expect_char(',')?;
        self.skip_whitespace();
        let upper_pos = self.pos;
        let upper = self.parse_number()?;
        self.expect_char(')')?;

        if lower > upper {
            return Err(self.error("BETWEEN lower bound exceeds upper bound", upper_pos));
        }

        Ok(Rule::Between {
            operand,
            lower,
            upper,
        })
    }

    /// `KEYWORD(rule, rule, ...)` with at least two children.
    fn parse_rule_list(&mut self, keyword: &str) -> Result<Vec<Rule>, ParseError> {
        self.expect_keyword(keyword)?;
        self.expect_char('(')?;

        let mut rules = vec![self.parse_rule()?];
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
            return Err(self.error(format!("{} requires at least 2 rules", keyword), self.pos));
        }
        Ok(rules)
    }

    /// `KEYWORD(rule, count)`.
    fn parse_windowed(&mut self, keyword: &str) -> Result<(Box<Rule>, usize), ParseError> {
        self.expect_keyword(keyword)?;
        self.expect_char('(')?;
        let rule = self.parse_rule()?;
        self.expect_char(',')?;
        let count = self.parse_positive("count")?;
        self.expect_char(')')?;
        Ok((Box::new(rule), count))
    }

    fn parse_rule(&mut self) -> Result<Rule, ParseError> {
        self.skip_whitespace();

        for keyword in ["CROSS_ABOVE", "CROSS_BELOW", "ABOVE", "BELOW", "EQUALS"] {
            if self.peek_keyword(keyword) {
                return self.parse_comparison(keyword);
            }
        }
        if self.peek_keyword("BETWEEN") {
            return self.parse_between();
        }
        if self.peek_keyword("AND") {
            return Ok(Rule::And(self.parse_rule_list("AND")?));
        }
        if self.peek_keyword("OR") {
            return Ok(Rule::Or(self.parse_rule_list("OR")?));
        }
        if self.peek_keyword("NOT") {
            self.expect_keyword("NOT")?;
            self.expect_char('(')?;
            let rule = self.parse_rule()?;
            self.expect_char(')')?;
            return Ok(Rule::Not(Box::new(rule)));
        }
        if self.peek_keyword("CONSECUTIVE") {
            let (rule, count) = self.parse_windowed("CONSECUTIVE")?;
            return Ok(Rule::Consecutive { rule, count });
        }
        if self.peek_keyword("ANY_OF") {
            let (rule, count) = self.parse_windowed("ANY_OF")?;
            return Ok(Rule::AnyOf { rule, count });
        }
        if self.peek_keyword("BULLISH_DIVERGENCE") {
            self.expect_keyword("BULLISH_DIVERGENCE")?;
            let (source, pivot, lookback) = self.parse_divergence_args()?;
            return Ok(Rule::BullishDivergence {
                source,
                pivot,
                lookback,
            });
        }
        if self.peek_keyword("BEARISH_DIVERGENCE") {
            self.expect_keyword("BEARISH_DIVERGENCE")?;
            let (source, pivot, lookback) = self.parse_divergence_args()?;
            return Ok(Rule::BearishDivergence {
                source,
                pivot,
                lookback,
            });
        }

        let word = self.peek_word();
        Err(self.error(format!("expected rule, found '{}'", word), self.pos))
    }

    fn parse(&mut self) -> Result<Rule, ParseError> {
        let rule = self.parse_rule()?;
        self.finish("rule")?;
        Ok(rule)
    }

    fn finish(&mut self, what: &str) -> Result<(), ParseError> {
        self.skip_whitespace();
        if self.pos < self.input.len() {
            return Err(self.error(
                format!("unexpected input after {}: '{}'", what, self.remaining()),
                self.pos,
            ));
        }
        Ok(())
    }
}

fn band_field(word: &str) -> IndicatorField {
    if word.ends_with("_UPPER") {
        IndicatorField::Upper
    } else if word.ends_with("_LOWER") {
        IndicatorField::Lower
    } else {
        IndicatorField::Middle
    }
}

pub fn parse(input: &str) -> Result<Rule, ParseError> {
    Parser::new(input).parse()
}

/// Parse a lone indicator reference such as `RSI(14)` or `MACD_LINE(12,26,9)`.
pub fn parse_indicator(input: &str) -> Result<IndicatorRef, ParseError> {
    let mut parser = Parser::new(input);
    let indicator = parser.parse_indicator()?;
    parser.finish("indicator")?;
    Ok(indicator)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ind(indicator_type: IndicatorType, field: IndicatorField) -> Operand {
        Operand::Indicator(IndicatorRef {
            indicator_type,
            field,
        })
    }

    #[test]
    fn parse_above() {
        let rule = parse("ABOVE(close, 100)").unwrap();
        assert_eq!(
            rule,
            Rule::Above {
                left: Operand::Close,
                right: Operand::Constant(100.0)
            }
        );
    }

    #[test]
    fn parse_below_with_indicator() {
        let rule = parse("BELOW(SMA(20), SMA(50))").unwrap();
        assert_eq!(
            rule,
            Rule::Below {
                left: ind(IndicatorType::Sma(20), IndicatorField::Value),
                right: ind(IndicatorType::Sma(50), IndicatorField::Value),
            }
        );
    }

    #[test]
    fn parse_cross_rules() {
        assert!(matches!(
            parse("CROSS_ABOVE(EMA(20), EMA(50))").unwrap(),
            Rule::CrossAbove { .. }
        ));
        assert!(matches!(
            parse("CROSS_BELOW(close, VWAP)").unwrap(),
            Rule::CrossBelow { .. }
        ));
    }

    #[test]
    fn parse_between() {
        let rule = parse("BETWEEN(RSI(14), 30, 70)").unwrap();
        assert_eq!(
            rule,
            Rule::Between {
                operand: ind(IndicatorType::Rsi(14), IndicatorField::Value),
                lower: 30.0,
                upper: 70.0,
            }
        );
    }

    #[test]
    fn parse_composites() {
        let rule = parse("AND(OR(ABOVE(close, 100), BELOW(close, 50)), NOT(EQUALS(volume, 0)))")
            .unwrap();
        match rule {
            Rule::And(rules) => {
                assert_eq!(rules.len(), 2);
                assert!(matches!(rules[0], Rule::Or(_)));
                assert!(matches!(rules[1], Rule::Not(_)));
            }
            _ => panic!("expected And rule"),
        }
    }

    #[test]
    fn parse_temporal() {
        assert!(matches!(
            parse("CONSECUTIVE(ABOVE(close, VWAP), 3)").unwrap(),
            Rule::Consecutive { count: 3, .. }
        ));
        assert!(matches!(
            parse("ANY_OF(CROSS_ABOVE(close, NY_OPEN), 5)").unwrap(),
            Rule::AnyOf { count: 5, .. }
        ));
    }

    #[test]
    fn parse_whitespace_handling() {
        let rule = parse("  ABOVE  (  close  ,  SMA ( 20 )  )  ").unwrap();
        assert!(matches!(rule, Rule::Above { .. }));
    }

    #[test]
    fn parse_all_indicators() {
        for text in [
            "SMA(20)",
            "EMA(20)",
            "WMA(20)",
            "RSI(14)",
            "ROC(10)",
            "MOMENTUM(10)",
            "ATR(14)",
            "STDDEV(20)",
            "ZSCORE(20)",
            "CCI(20)",
            "WILLIAMS_R(14)",
            "MFI(14)",
            "OBV",
            "VWAP",
            "MACD_LINE(12,26,9)",
            "MACD_SIGNAL(12,26,9)",
            "MACD_HISTOGRAM(12,26,9)",
            "STOCHASTIC_K(14,3)",
            "STOCHASTIC_D(14,3)",
            "BOLLINGER_UPPER(20,2)",
            "BOLLINGER_MIDDLE(20,2)",
            "BOLLINGER_LOWER(20,2)",
            "KELTNER_UPPER(20,1.5)",
            "KELTNER_LOWER(20,1.5)",
            "DONCHIAN_UPPER(20)",
            "DONCHIAN_MIDDLE(20)",
            "ICHIMOKU_TENKAN(9,26,52)",
            "ICHIMOKU_SENKOU_B(9,26,52)",
            "ADX(14)",
            "PLUS_DI(14)",
            "MINUS_DI(14)",
            "PIVOT",
            "PIVOT_R1",
            "PIVOT_S3",
            "PARABOLA_CURVATURE(20)",
            "PARABOLA_SLOPE(20)",
            "PARABOLA_FITTED(20)",
            "NY_OPEN",
            "LONDON_HIGH",
            "LONDON_LOW",
            "DIVERGENCE(RSI(14),3,40)",
        ] {
            let input = format!("ABOVE({}, 0)", text);
            let rule = parse(&input).unwrap_or_else(|e| panic!("{}: {}", input, e));
            // Display round-trips to the same text.
            assert_eq!(rule.to_string(), format!("ABOVE({}, 0)", text));
        }
    }

    #[test]
    fn parse_divergence_rules() {
        let rule = parse("BULLISH_DIVERGENCE(RSI(14), 3, 40)").unwrap();
        assert_eq!(
            rule,
            Rule::BullishDivergence {
                source: IndicatorRef {
                    indicator_type: IndicatorType::Rsi(14),
                    field: IndicatorField::Value,
                },
                pivot: 3,
                lookback: 40,
            }
        );
        let rule = parse("BEARISH_DIVERGENCE(MACD_HISTOGRAM(12,26,9), 2, 30)").unwrap();
        assert!(matches!(rule, Rule::BearishDivergence { pivot: 2, .. }));
    }

    #[test]
    fn parse_negative_and_float_numbers() {
        let rule = parse("BETWEEN(close, -10.5, 99.99)").unwrap();
        assert_eq!(
            rule,
            Rule::Between {
                operand: Operand::Close,
                lower: -10.5,
                upper: 99.99,
            }
        );
    }

    #[test]
    fn parse_bollinger_with_float_multiplier() {
        let rule = parse("ABOVE(BOLLINGER_UPPER(20, 2.5), 100)").unwrap();
        match rule {
            Rule::Above { left, .. } => assert_eq!(
                left,
                ind(
                    IndicatorType::Bollinger {
                        period: 20,
                        stddev_mult_x100: 250
                    },
                    IndicatorField::Upper
                )
            ),
            _ => panic!("expected Above rule"),
        }
    }

    #[test]
    fn display_round_trips_nested_rule() {
        let text = "NOT(AND(OR(ABOVE(close, 100), BELOW(close, 50)), CONSECUTIVE(ABOVE(volume, 1000), 3)))";
        let rule = parse(text).unwrap();
        assert_eq!(parse(&rule.to_string()).unwrap(), rule);
        assert_eq!(rule.to_string(), text);
    }

    #[test]
    fn error_unexpected_token() {
        let err = parse("ABOVE(close, )").unwrap_err();
        assert_eq!(err.position, 13);
    }

    #[test]
    fn error_missing_paren() {
        let err = parse("ABOVE(close, 100").unwrap_err();
        assert!(err.message.contains("end of input"));
    }

    #[test]
    fn error_invalid_rule() {
        let err = parse("INVALID(close, 100)").unwrap_err();
        assert_eq!(err.position, 0);
        assert!(err.message.contains("expected rule"));
    }

    #[test]
    fn error_unknown_indicator() {
        let err = parse("ABOVE(FOO(3), 1)").unwrap_err();
        assert_eq!(err.position, 6);
        assert!(err.message.contains("FOO"));
    }

    #[test]
    fn error_trailing_input() {
        let err = parse("ABOVE(close, 100) garbage").unwrap_err();
        assert!(err.message.contains("garbage"));
    }

    #[test]
    fn error_missing_comma() {
        let err = parse("ABOVE(close 100)").unwrap_err();
        assert_eq!(err.position, 12);
    }

    #[test]
    fn error_single_child_and_or() {
        assert!(parse("AND(ABOVE(close, 100))").is_err());
        assert!(parse("OR(ABOVE(close, 100))").is_err());
    }

    #[test]
    fn error_zero_period_and_count() {
        let err = parse("ABOVE(SMA(0), 1)").unwrap_err();
        assert!(err.message.contains("period"));
        let err = parse("ANY_OF(ABOVE(close, 1), 0)").unwrap_err();
        assert!(err.message.contains("count"));
    }

    #[test]
    fn error_inverted_between() {
        assert!(parse("BETWEEN(close, 10, 5)").is_err());
    }

    #[test]
    fn error_nested_divergence_source() {
        assert!(parse("BULLISH_DIVERGENCE(DIVERGENCE(RSI(14),3,40), 3, 40)").is_err());
    }

    #[test]
    fn case_sensitive_keywords() {
        assert!(parse("above(close, 100)").is_err());
    }

    #[test]
    fn error_empty_input() {
        let err = parse("").unwrap_err();
        assert_eq!(err.position, 0);
        assert!(parse("   ").is_err());
    }

    #[test]
    fn error_display_with_context() {
        let input = "CROSS_ABOVE(SMA(20), , SMA(50))";
        let err = parse(input).unwrap_err();
        let rendered = err.display_with_context(input);
        assert!(rendered.contains('^'));
        assert!(rendered.starts_with(input));
    }

    #[test]
    fn parse_lone_indicator() {
        let r = parse_indicator(" RSI(14) ").unwrap();
        assert_eq!(r.indicator_type, IndicatorType::Rsi(14));
        assert_eq!(r.field, IndicatorField::Value);

        let err = parse_indicator("RSI(14) extra").unwrap_err();
        assert_eq!(err.position, 8);
        assert!(parse_indicator("close").is_err());
    }
}
