//! 4x4 cross-venue premium matrix.
//!
//! `PremiumCalculator` holds the four venues' latest prices and the current
//! USD/KRW rate behind a `parking_lot::RwLock`, recomputing the full matrix
//! on every price or FX update (spec.md §4.3). Writes are infrequent enough
//! (one per inbound ticker) that a full recompute under a writer lock is
//! simpler and fast enough; readers never block a writer for longer than
//! one matrix copy.

use parking_lot::RwLock;

use crate::venue::{Venue, ALL_VENUES, VENUE_COUNT};

pub type PremiumMatrix = [[f64; VENUE_COUNT]; VENUE_COUNT];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Opportunity {
    pub buy: Venue,
    pub sell: Venue,
    pub premium_pct: f64,
}

type AlertCallback = Box<dyn Fn(Opportunity) + Send + Sync>;

struct Inner {
    prices: [f64; VENUE_COUNT],
    fx_rate: f64,
    fx_valid: bool,
    matrix: PremiumMatrix,
}

/// Maintains the dense premium matrix and gates an alert callback on a
/// configurable threshold (spec.md §4.3 "Alerting").
pub struct PremiumCalculator {
    inner: RwLock<Inner>,
    alert_threshold_pct: f64,
    on_alert: Option<AlertCallback>,
}

impl PremiumCalculator {
    pub fn new(alert_threshold_pct: f64) -> Self {
        Self {
            inner: RwLock::new(Inner {
                prices: [0.0; VENUE_COUNT],
                fx_rate: 0.0,
                fx_valid: false,
                matrix: [[f64::NAN; VENUE_COUNT]; VENUE_COUNT],
            }),
            alert_threshold_pct,
            on_alert: None,
        }
    }

    pub fn with_alert_callback(mut self, callback: AlertCallback) -> Self {
        self.on_alert = Some(callback);
        self
    }

    pub fn update_price(&self, venue: Venue, price: f64) {
        let alerts = {
            let mut inner = self.inner.write();
            inner.prices[venue.index()] = price;
            recompute(&mut inner);
            self.collect_alerts(&inner)
        };
        self.fire_alerts(alerts);
    }

    pub fn update_fx(&self, rate: f64) {
        let alerts = {
            let mut inner = self.inner.write();
            inner.fx_rate = rate;
            inner.fx_valid = rate > 0.0;
            recompute(&mut inner);
            self.collect_alerts(&inner)
        };
        self.fire_alerts(alerts);
    }

    fn collect_alerts(&self, inner: &Inner) -> Vec<Opportunity> {
        if self.on_alert.is_none() {
            return Vec::new();
        }
        opportunities_at_least(&inner.matrix, self.alert_threshold_pct)
    }

    fn fire_alerts(&self, alerts: Vec<Opportunity>) {
        if let Some(cb) = &self.on_alert {
            for alert in alerts {
                cb(alert);
            }
        }
    }

    pub fn get_premium(&self, buy: Venue, sell: Venue) -> f64 {
        self.inner.read().matrix[buy.index()][sell.index()]
    }

    pub fn get_matrix(&self) -> PremiumMatrix {
        self.inner.read().matrix
    }

    /// Max over finite off-diagonal cells, tie-broken by lowest buy index
    /// then lowest sell index (spec.md §4.3 "Tie-breaking").
    pub fn get_best_opportunity(&self) -> Option<Opportunity> {
        let matrix = self.inner.read().matrix;
        best_opportunity(&matrix)
    }

    pub fn get_opportunities(&self, min_pct: f64) -> Vec<Opportunity> {
        let matrix = self.inner.read().matrix;
        opportunities_at_least(&matrix, min_pct)
    }
}

fn to_krw(price: f64, venue: Venue, fx_rate: f64, fx_valid: bool) -> Option<f64> {
    if price <= 0.0 {
        return None;
    }
    if venue.is_krw_quoted() {
        Some(price)
    } else if fx_valid {
        Some(price * fx_rate)
    } else {
        None
    }
}

fn recompute(inner: &mut Inner) {
    for buy in ALL_VENUES {
        for sell in ALL_VENUES {
            let cell = if buy == sell {
                0.0
            } else {
                match (
                    to_krw(inner.prices[buy.index()], buy, inner.fx_rate, inner.fx_valid),
                    to_krw(inner.prices[sell.index()], sell, inner.fx_rate, inner.fx_valid),
                ) {
                    (Some(buy_krw), Some(sell_krw)) => (sell_krw - buy_krw) / buy_krw * 100.0,
                    _ => f64::NAN,
                }
            };
            inner.matrix[buy.index()][sell.index()] = cell;
        }
    }
}

fn best_opportunity(matrix: &PremiumMatrix) -> Option<Opportunity> {
    let mut best: Option<Opportunity> = None;
    for buy in ALL_VENUES {
        for sell in ALL_VENUES {
            if buy == sell {
                continue;
            }
            let pct = matrix[buy.index()][sell.index()];
            if !pct.is_finite() {
                continue;
            }
            let better = match best {
                None => true,
                Some(current) => pct > current.premium_pct,
            };
            if better {
                best = Some(Opportunity {
                    buy,
                    sell,
                    premium_pct: pct,
                });
            }
        }
    }
    best
}

fn opportunities_at_least(matrix: &PremiumMatrix, min_pct: f64) -> Vec<Opportunity> {
    let mut out = Vec::new();
    for buy in ALL_VENUES {
        for sell in ALL_VENUES {
            if buy == sell {
                continue;
            }
            let pct = matrix[buy.index()][sell.index()];
            if pct.is_finite() && pct >= min_pct {
                out.push(Opportunity {
                    buy,
                    sell,
                    premium_pct: pct,
                });
            }
        }
    }
    out.sort_by(|a, b| b.premium_pct.partial_cmp(&a.premium_pct).unwrap());
    out
}
