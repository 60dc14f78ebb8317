//! The trading environment: gym-style reset/step over the open-date
//! calendar.
//!
//! An episode starts `look_back_days` into the calendar (the window needs
//! history behind it) and ends on the calendar's last date. Each step decodes
//! the action through the configured scenario, runs one simulated day, shapes
//! the reward, and rolls the observation window forward.

use crate::config::EpisodeConfig;
use crate::observation::{self, Observation, ROW_WIDTH};
use crate::reward::{DayContext, RewardKind};
use chrono::NaiveDate;
use rand::Rng;
use thiserror::Error;
use tradegym_core::domain::Fill;
use tradegym_core::market::{HistoryStore, MarketError, MatchingEngine};
use tradegym_core::portfolio::{StepError, TradingSim};

#[derive(Debug, Error)]
pub enum EnvError {
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("unknown reward function '{0}'")]
    UnknownReward(String),
    #[error("action length {got} does not match scenario (expected {expected})")]
    ActionLength { expected: usize, got: usize },
    #[error("not enough history: {have} open dates, need more than {need}")]
    NotEnoughHistory { have: usize, need: usize },
    #[error(transparent)]
    Step(#[from] StepError),
    #[error(transparent)]
    Market(#[from] MarketError),
}

/// Side information reported with every step.
#[derive(Debug, Clone)]
pub struct StepInfo {
    pub date: NaiveDate,
    pub fills: Vec<Fill>,
    pub portfolio_value: f64,
    pub daily_pnl: f64,
}

/// The result of one environment step.
#[derive(Debug, Clone)]
pub struct Transition {
    pub obs: Observation,
    pub reward: f64,
    pub done: bool,
    pub info: StepInfo,
}

/// Gym-style episode wrapper around the core simulator.
#[derive(Debug)]
pub struct TradingEnv {
    config: EpisodeConfig,
    store: HistoryStore,
    sim: TradingSim,
    reward: RewardKind,
    time_id: usize,
    current_date: NaiveDate,
    obs: Observation,
    done: bool,
    total_reward: f64,
    portfolio_value_log: Vec<f64>,
}

/// Build an environment for the configured scenario (the factory used by the
/// CLI and tests). The store should already cover `config.codes`.
pub fn make_env(config: EpisodeConfig, store: HistoryStore) -> Result<TradingEnv, EnvError> {
    TradingEnv::new(config, store)
}

impl TradingEnv {
    pub fn new(config: EpisodeConfig, store: HistoryStore) -> Result<Self, EnvError> {
        if config.codes.is_empty() {
            return Err(EnvError::Config("at least one instrument code".into()));
        }
        if config.scenario == crate::scenario::Scenario::Simple && config.codes.len() != 1 {
            return Err(EnvError::Config(format!(
                "the simple scenario trades exactly one instrument, got {}",
                config.codes.len()
            )));
        }
        let have = store.open_dates().len();
        if have <= config.look_back_days {
            return Err(EnvError::NotEnoughHistory {
                have,
                need: config.look_back_days,
            });
        }
        let reward = RewardKind::from_name(&config.reward)?;

        let sim = TradingSim::new(
            config.codes.clone(),
            config.investment,
            MatchingEngine::new(config.limit_pct),
            config.cost,
        );
        let n = config.codes.len();
        let look_back = config.look_back_days;
        let mut env = Self {
            config,
            store,
            sim,
            reward,
            time_id: 0,
            current_date: NaiveDate::MIN,
            obs: Observation::zeroed(n, look_back),
            done: false,
            total_reward: 0.0,
            portfolio_value_log: Vec::new(),
        };
        env.reset()?;
        Ok(env)
    }

    /// Rewind to the first tradable session. Two consecutive resets produce
    /// identical observations and account state.
    pub fn reset(&mut self) -> Result<Observation, EnvError> {
        self.time_id = self.config.look_back_days;
        self.current_date = self.store.open_dates()[self.time_id];
        self.sim.reset(&self.store, self.current_date)?;
        self.obs = observation::initial(
            &self.store,
            self.sim.codes(),
            &self.store.open_dates()[..self.time_id],
        );
        self.done = false;
        self.total_reward = 0.0;
        self.portfolio_value_log.clear();
        Ok(self.obs.clone())
    }

    /// Process one day. With `only_update` the account is marked to market
    /// without trading (the buy-and-hold baseline) and the action is ignored.
    pub fn step(&mut self, action: &[f64], only_update: bool) -> Result<Transition, EnvError> {
        let date = self.current_date;
        let codes: Vec<String> = self.sim.codes().to_vec();

        let orders = if only_update {
            None
        } else {
            let mut pre_closes = Vec::with_capacity(codes.len());
            for code in &codes {
                pre_closes.push(self.store.pre_close_on(code, date)?);
            }
            Some(self.config.scenario.decode(action, &pre_closes)?)
        };

        let out = self.sim.step(&self.store, date, orders.as_deref())?;

        // reward context covers the instruments that actually traded today;
        // a baseline day bids zero on both sides, as if standing aside
        let mut highs = Vec::new();
        let mut lows = Vec::new();
        let mut closes = Vec::new();
        let mut sell_prices = Vec::new();
        let mut buy_prices = Vec::new();
        for (i, code) in codes.iter().enumerate() {
            let Some(bar) = self.store.history(code).and_then(|h| h.bar(date)) else {
                continue;
            };
            highs.push(bar.high);
            lows.push(bar.low);
            closes.push(bar.close);
            match &orders {
                Some(orders) => {
                    sell_prices.push(orders[i].sell_price);
                    buy_prices.push(orders[i].buy_price);
                }
                None => {
                    sell_prices.push(0.0);
                    buy_prices.push(0.0);
                }
            }
        }
        let reward = self.reward.compute(&DayContext {
            daily_return: out.snapshot.daily_return,
            highs: &highs,
            lows: &lows,
            closes: &closes,
            sell_prices: &sell_prices,
            buy_prices: &buy_prices,
        });
        self.total_reward += reward;
        self.portfolio_value_log.push(out.snapshot.portfolio_value);

        // roll the windows with today's (carry-forward) features and the
        // per-instrument account columns
        for (i, code) in codes.iter().enumerate() {
            let summary = &out.snapshot.instruments[i];
            let row = match self.store.history(code).and_then(|h| h.bar_at_or_before(date)) {
                Some(bar) => observation::bar_row(bar, summary.daily_return, summary.value_percent),
                None => [0.0; ROW_WIDTH],
            };
            self.obs.push_row(i, row);
        }

        self.done = self.sim.is_done();
        if !self.done {
            self.time_id += 1;
            self.current_date = self.store.open_dates()[self.time_id];
        }

        Ok(Transition {
            obs: self.obs.clone(),
            reward,
            done: self.done,
            info: StepInfo {
                date,
                fills: out.fills,
                portfolio_value: out.snapshot.portfolio_value,
                daily_pnl: out.snapshot.daily_pnl,
            },
        })
    }

    /// Length of the action vector this environment expects.
    pub fn action_len(&self) -> usize {
        self.config.scenario.action_len(self.config.codes.len())
    }

    /// Uniform random action, each component in [-1, 1].
    pub fn random_action<R: Rng>(&self, rng: &mut R) -> Vec<f64> {
        (0..self.action_len())
            .map(|_| rng.gen_range(-1.0..=1.0))
            .collect()
    }

    pub fn config(&self) -> &EpisodeConfig {
        &self.config
    }

    pub fn current_date(&self) -> NaiveDate {
        self.current_date
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    pub fn total_reward(&self) -> f64 {
        self.total_reward
    }

    pub fn portfolio_value(&self) -> f64 {
        self.sim.portfolio_value()
    }

    pub fn cash(&self) -> f64 {
        self.sim.cash()
    }

    /// Portfolio value after each processed day.
    pub fn portfolio_value_log(&self) -> &[f64] {
        &self.portfolio_value_log
    }

    /// Read access for drivers that inspect market state between steps.
    pub fn store(&self) -> &HistoryStore {
        &self.store
    }
}
