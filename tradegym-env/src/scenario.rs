//! Trading scenarios: how raw action vectors become per-instrument orders.
//!
//! There is one ledger type and one simulator; scenarios differ only in how
//! the caller assembles bid prices and target fractions per instrument.
//! Every price component maps to ±10% around the previous close, rounded to
//! the cent; every volume component maps to a target fraction in [0, 1].

use crate::env::EnvError;
use serde::{Deserialize, Serialize};
use tradegym_core::portfolio::InstrumentOrder;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Scenario {
    /// Single instrument; sell everything at the sell bid, then re-enter
    /// fully at the buy bid. Action: `[v_sell_price, v_buy_price]`.
    #[default]
    Simple,
    /// n instruments with an even 1/n allocation each.
    /// Action: `[v_sell_price, v_buy_price] × n`.
    Average,
    /// n instruments with per-instrument target fractions.
    /// Action: `[v_sell_price, v_sell_pct, v_buy_price, v_buy_pct] × n`.
    MultiVol,
}

impl Scenario {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "simple" => Some(Self::Simple),
            "average" => Some(Self::Average),
            "multi_vol" => Some(Self::MultiVol),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Simple => "simple",
            Self::Average => "average",
            Self::MultiVol => "multi_vol",
        }
    }

    pub fn action_len(&self, n_instruments: usize) -> usize {
        match self {
            Self::Simple => 2,
            Self::Average => 2 * n_instruments,
            Self::MultiVol => 4 * n_instruments,
        }
    }

    /// Decode a raw action vector into one order per instrument.
    ///
    /// Components are clamped to [-1, 1] before scaling, so a policy's
    /// unsquashed output cannot produce an invalid order. `pre_closes` holds
    /// each instrument's previous-close reference price in code order.
    pub fn decode(
        &self,
        action: &[f64],
        pre_closes: &[f64],
    ) -> Result<Vec<InstrumentOrder>, EnvError> {
        let n = pre_closes.len();
        let expected = self.action_len(n);
        if action.len() != expected {
            return Err(EnvError::ActionLength {
                expected,
                got: action.len(),
            });
        }

        let orders = match self {
            Self::Simple | Self::Average => {
                let buy_target = if matches!(self, Self::Simple) {
                    1.0
                } else {
                    1.0 / n as f64
                };
                (0..n)
                    .map(|i| InstrumentOrder {
                        sell_price: action_price(pre_closes[i], action[2 * i]),
                        sell_target: 0.0,
                        buy_price: action_price(pre_closes[i], action[2 * i + 1]),
                        buy_target,
                    })
                    .collect()
            }
            Self::MultiVol => (0..n)
                .map(|i| InstrumentOrder {
                    sell_price: action_price(pre_closes[i], action[4 * i]),
                    sell_target: action_target(action[4 * i + 1]),
                    buy_price: action_price(pre_closes[i], action[4 * i + 2]),
                    buy_target: action_target(action[4 * i + 3]),
                })
                .collect(),
        };
        Ok(orders)
    }
}

/// Bid price from a scaled component: `pre_close × (1 + 0.1 v)`, to the cent.
fn action_price(pre_close: f64, v: f64) -> f64 {
    let pct = v.clamp(-1.0, 1.0) * 0.1;
    (pre_close * (1.0 + pct) * 100.0).round() / 100.0
}

/// Target fraction from a scaled component: [-1, 1] → [0, 1].
fn action_target(v: f64) -> f64 {
    v.clamp(-1.0, 1.0) * 0.5 + 0.5
}
