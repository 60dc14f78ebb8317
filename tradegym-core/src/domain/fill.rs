use serde::{Deserialize, Serialize};

/// Order direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderSide {
    Buy,
    Sell,
}

/// One accepted trade.
///
/// Transient: nothing persists a `Fill`; only its cash/volume effect is folded
/// into the owning ledger. The ordered list of a day's fills is part of the
/// step output so callers can build reward signals and trade logs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fill {
    pub side: OrderSide,
    pub code: String,
    /// Signed cash effect: positive for sells, negative for buys, commission
    /// included.
    pub cash_delta: f64,
    pub clearing_price: f64,
    pub volume: u64,
}
