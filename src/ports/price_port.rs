//! Price and macro indicator provider port.

use crate::domain::error::RebalancerError;
use crate::domain::series::PricePoint;
use chrono::NaiveDate;

/// Source of date-ordered samples. Implementations return rows sorted
/// ascending by date with no duplicates, restricted to `[start, end]`.
pub trait PricePort {
    fn fetch_prices(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PricePoint>, RebalancerError>;

    fn fetch_indicator(
        &self,
        name: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PricePoint>, RebalancerError>;
}
