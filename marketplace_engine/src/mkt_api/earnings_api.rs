use std::fmt::Debug;

use log::*;

use crate::{
    order_objects::CommissionBreakdown,
    traits::{DateRange, EarningsReporting, EarningsSummary, MarketplaceError},
};

/// Read-only reporting on seller earnings and platform commission. Only paid sub-orders are counted.
pub struct EarningsApi<B> {
    db: B,
}

impl<B> Debug for EarningsApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "EarningsApi")
    }
}

impl<B> EarningsApi<B>
where B: EarningsReporting
{
    pub fn new(db: B) -> Self {
        Self { db }
    }

    pub async fn seller_earnings(&self, seller_id: &str, range: DateRange) -> Result<EarningsSummary, MarketplaceError> {
        let summary = self.db.seller_earnings(seller_id, &range).await?;
        trace!("💰️ Earnings for {seller_id}: {} over {} sub-order(s)", summary.total_earnings, summary.order_count);
        Ok(summary)
    }

    /// Commission and earnings per seller, highest commission first, with the platform-wide total.
    pub async fn commission_breakdown(&self, range: DateRange) -> Result<CommissionBreakdown, MarketplaceError> {
        let sellers = self.db.commission_by_seller(&range).await?;
        let totals = sellers.iter().fold(EarningsSummary::default(), |acc, s| acc.accumulate(&s.summary));
        trace!("💰️ Commission breakdown: {} across {} seller(s)", totals.total_commission, sellers.len());
        Ok(CommissionBreakdown { range, sellers, totals })
    }
}
