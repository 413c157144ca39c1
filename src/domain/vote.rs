//! Voters and the weighted vote tally.
//!
//! A voter owns up to two rules. Each bar it votes bullish when its bullish
//! rule holds and bearish when its bearish rule holds; both may hold at once.
//! Scores are the integer sums of the weights of the voters on each side.

use std::collections::{HashMap, HashSet};

use crate::domain::bar::Bar;
use crate::domain::error::ScanError;
use crate::domain::indicator::{IndicatorSeries, IndicatorType};
use crate::domain::rule::{extract_indicators, lookback_bars, Rule};
use crate::domain::rule_eval::evaluate;
use crate::domain::rule_parser;

#[derive(Debug, Clone, PartialEq)]
pub struct Voter {
    pub name: String,
    pub weight: u32,
    pub bullish: Option<Rule>,
    pub bearish: Option<Rule>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Vote {
    Bullish,
    Bearish,
    Abstain,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tally {
    pub buy_score: u32,
    pub sell_score: u32,
    /// Names of the voters that voted bullish on this bar.
    pub bullish: Vec<String>,
    /// Names of the voters that voted bearish on this bar.
    pub bearish: Vec<String>,
}

impl Voter {
    /// Build a voter from DSL text. At least one side must be given.
    pub fn parse(
        name: impl Into<String>,
        weight: u32,
        bullish: Option<&str>,
        bearish: Option<&str>,
    ) -> Result<Self, ScanError> {
        let name = name.into();
        if bullish.is_none() && bearish.is_none() {
            return Err(ScanError::RuleInvalid {
                reason: format!("voter '{}' has neither a bullish nor a bearish rule", name),
            });
        }
        let parse_side = |text: Option<&str>| -> Result<Option<Rule>, ScanError> {
            text.map(rule_parser::parse)
                .transpose()
                .map_err(ScanError::from)
        };
        Ok(Self {
            bullish: parse_side(bullish)?,
            bearish: parse_side(bearish)?,
            name,
            weight,
        })
    }

    /// (bullish, bearish) for the bar at `index`.
    pub fn cast(
        &self,
        bars: &[Bar],
        indicators: &HashMap<IndicatorType, IndicatorSeries>,
        index: usize,
    ) -> (bool, bool) {
        let holds = |rule: &Option<Rule>| {
            rule.as_ref()
                .is_some_and(|r| evaluate(r, bars, indicators, index))
        };
        (holds(&self.bullish), holds(&self.bearish))
    }

    /// The votes cast on one bar; `[Abstain]` when neither rule holds.
    pub fn votes(
        &self,
        bars: &[Bar],
        indicators: &HashMap<IndicatorType, IndicatorSeries>,
        index: usize,
    ) -> Vec<Vote> {
        match self.cast(bars, indicators, index) {
            (true, true) => vec![Vote::Bullish, Vote::Bearish],
            (true, false) => vec![Vote::Bullish],
            (false, true) => vec![Vote::Bearish],
            (false, false) => vec![Vote::Abstain],
        }
    }

    pub fn required_indicators(&self) -> HashSet<IndicatorType> {
        self.bullish
            .iter()
            .chain(self.bearish.iter())
            .flat_map(extract_indicators)
            .collect()
    }

    /// Past bars the voter's rules look at.
    pub fn lookback(&self) -> usize {
        self.bullish
            .iter()
            .chain(self.bearish.iter())
            .map(lookback_bars)
            .max()
            .unwrap_or(0)
    }
}

/// Upper bound for both scores. Saturates at `u32::MAX`.
pub fn max_score(voters: &[Voter]) -> u32 {
    voters
        .iter()
        .fold(0u32, |total, v| total.saturating_add(v.weight))
}

/// Tally one bar.
pub fn tally_at(
    voters: &[Voter],
    bars: &[Bar],
    indicators: &HashMap<IndicatorType, IndicatorSeries>,
    index: usize,
) -> Tally {
    let mut tally = Tally::default();
    for voter in voters {
        let (bullish, bearish) = voter.cast(bars, indicators, index);
        if bullish {
            tally.buy_score = tally.buy_score.saturating_add(voter.weight);
            tally.bullish.push(voter.name.clone());
        }
        if bearish {
            tally.sell_score = tally.sell_score.saturating_add(voter.weight);
            tally.bearish.push(voter.name.clone());
        }
    }
    tally
}

/// One tally per bar, aligned with `bars`.
pub fn tally(
    voters: &[Voter],
    bars: &[Bar],
    indicators: &HashMap<IndicatorType, IndicatorSeries>,
) -> Vec<Tally> {
    (0..bars.len())
        .map(|i| tally_at(voters, bars, indicators, i))
        .collect()
}
