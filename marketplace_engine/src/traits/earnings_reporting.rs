use crate::traits::{
    data_objects::{DateRange, EarningsSummary, SellerCommission},
    MarketplaceError,
};

/// Read-only aggregation over sub-orders with a `paid` payment status.
#[allow(async_fn_in_trait)]
pub trait EarningsReporting {
    /// Totals for one seller. An empty result yields a zeroed summary.
    async fn seller_earnings(&self, seller_id: &str, range: &DateRange) -> Result<EarningsSummary, MarketplaceError>;

    /// Totals grouped by seller, ordered by commission, highest first.
    async fn commission_by_seller(&self, range: &DateRange) -> Result<Vec<SellerCommission>, MarketplaceError>;
}
