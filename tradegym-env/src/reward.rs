//! Reward functions for episode feedback.

use crate::env::EnvError;

/// One day's inputs to a reward function. The price slices cover only the
/// instruments that actually traded this session, in code order.
#[derive(Debug, Clone, Copy)]
pub struct DayContext<'a> {
    pub daily_return: f64,
    pub highs: &'a [f64],
    pub lows: &'a [f64],
    pub closes: &'a [f64],
    pub sell_prices: &'a [f64],
    pub buy_prices: &'a [f64],
}

/// Reward shaping applied to each day's result, selected by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RewardKind {
    /// Sign of the day's P&L: +1 on a profitable day, −1 otherwise. A blunt
    /// signal; prefer a smooth function when the learner supports it.
    Simple,
    /// The day's portfolio return itself.
    DailyReturn,
    /// Daily return plus fill-success and profitable-side rates computed
    /// from the day's bids against the session range.
    PriceBound,
}

impl RewardKind {
    pub fn from_name(name: &str) -> Result<Self, EnvError> {
        match name {
            "simple" => Ok(Self::Simple),
            "daily_return" => Ok(Self::DailyReturn),
            "price_bound" => Ok(Self::PriceBound),
            other => Err(EnvError::UnknownReward(other.to_string())),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Simple => "simple",
            Self::DailyReturn => "daily_return",
            Self::PriceBound => "price_bound",
        }
    }

    pub fn compute(&self, day: &DayContext<'_>) -> f64 {
        match self {
            Self::Simple => {
                if day.daily_return <= 0.0 {
                    -1.0
                } else {
                    1.0
                }
            }
            Self::DailyReturn => day.daily_return,
            Self::PriceBound => price_bound(day),
        }
    }
}

/// Counts how many of the day's bids could fill and how many landed on the
/// profitable side of the close, then adds both rates to the daily return.
fn price_bound(day: &DayContext<'_>) -> f64 {
    let mut fail = 0u32;
    let mut success = 0u32;
    let mut profit_count = 0u32;
    let mut loss_count = 0u32;

    for i in 0..day.highs.len() {
        // buy side: a bid at or above the low could fill
        if day.buy_prices[i] >= day.lows[i] {
            success += 1;
            if day.buy_prices[i] <= day.closes[i] {
                profit_count += 1;
            } else {
                loss_count += 1;
            }
        } else {
            fail += 1;
        }

        // sell side: an ask at or below the high could fill
        if day.sell_prices[i] <= day.highs[i] {
            success += 1;
            if day.sell_prices[i] <= day.closes[i] {
                loss_count += 1;
            } else {
                profit_count += 1;
            }
        } else {
            fail += 1;
        }
    }

    let success_rate = if success + fail == 0 {
        0.0
    } else {
        (success * 2) as f64 / (success + fail) as f64
    };
    let profit_rate = if profit_count + loss_count == 0 {
        0.0
    } else {
        (profit_count * 2) as f64 / (profit_count + loss_count) as f64
    };

    day.daily_return + success_rate + profit_rate
}
