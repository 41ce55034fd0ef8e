use crate::db::models::Watch;
use serde::Serialize;

pub fn round_cents(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// Realized profit on a sold watch; `None` while it is still in inventory.
///
/// `price_sold - purchase_price - platform_fees - shipping_cost - taxes - accessories_cost`,
/// with missing costs counted as zero.
pub fn watch_profit(w: &Watch) -> Option<f64> {
    let sold = w.price_sold?;
    let costs = [
        w.purchase_price,
        w.platform_fees,
        w.shipping_cost,
        w.taxes,
        w.accessories_cost,
    ]
    .into_iter()
    .flatten()
    .sum::<f64>();
    Some(round_cents(sold - costs))
}

/// Inventory summary for one user.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct InventoryStats {
    pub total_watches: usize,
    pub in_stock: usize,
    pub sold: usize,
    /// Purchase cost of unsold watches.
    pub inventory_cost: f64,
    pub revenue: f64,
    pub realized_profit: f64,
    pub average_profit: Option<f64>,
    pub average_days_to_sell: Option<f64>,
}

pub fn inventory_stats(watches: &[Watch]) -> InventoryStats {
    let mut stats = InventoryStats {
        total_watches: watches.len(),
        ..Default::default()
    };
    let mut hold_days: Vec<i64> = Vec::new();

    for w in watches {
        match watch_profit(w) {
            Some(profit) => {
                stats.sold += 1;
                stats.revenue += w.price_sold.unwrap_or_default();
                stats.realized_profit += profit;
                if let (Some(bought), Some(sold)) = (w.date_purchased, w.date_sold) {
                    hold_days.push((sold - bought).num_days());
                }
            }
            None => {
                stats.in_stock += 1;
                stats.inventory_cost += w.purchase_price.unwrap_or_default();
            }
        }
    }

    stats.inventory_cost = round_cents(stats.inventory_cost);
    stats.revenue = round_cents(stats.revenue);
    stats.realized_profit = round_cents(stats.realized_profit);
    if stats.sold > 0 {
        stats.average_profit = Some(round_cents(stats.realized_profit / stats.sold as f64));
    }
    if !hold_days.is_empty() {
        let total: i64 = hold_days.iter().sum();
        stats.average_days_to_sell = Some(round_cents(total as f64 / hold_days.len() as f64));
    }
    stats
}
