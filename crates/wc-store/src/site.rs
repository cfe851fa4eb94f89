//! Site model and site-local dates

use chrono::{FixedOffset, NaiveDate, Offset, Utc};
use serde::{Deserialize, Serialize};

/// Date format used for stored end dates and custom ranges
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// A WooCommerce site as known to the application
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteModel {
    /// Local id, the owner key of every persisted row
    pub id: i32,

    /// Remote id used by the API
    pub site_id: i64,

    pub name: String,

    /// UTC offset in hours, fractional allowed ("5.5", "-12", "")
    pub timezone: String,
}

impl SiteModel {
    pub fn new(id: i32, site_id: i64) -> Self {
        Self {
            id,
            site_id,
            ..Self::default()
        }
    }

    pub fn with_timezone(mut self, timezone: impl Into<String>) -> Self {
        self.timezone = timezone.into();
        self
    }

    /// The site's UTC offset; empty or invalid offsets fall back to UTC
    pub fn utc_offset(&self) -> FixedOffset {
        let utc = Utc.fix();
        let hours = self.timezone.trim();
        if hours.is_empty() {
            return utc;
        }

        match hours.parse::<f64>() {
            Ok(hours) if hours.is_finite() => {
                let seconds = (hours * 3600.0).round() as i32;
                FixedOffset::east_opt(seconds).unwrap_or_else(|| {
                    log::warn!("Site {}: timezone {} out of range", self.id, self.timezone);
                    utc
                })
            }
            _ => {
                log::warn!("Site {}: invalid timezone {:?}", self.id, self.timezone);
                utc
            }
        }
    }

    /// Today's date on the site
    pub fn today(&self) -> NaiveDate {
        Utc::now().with_timezone(&self.utc_offset()).date_naive()
    }
}

/// Parse a `%Y-%m-%d` date, ignoring surrounding whitespace
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_utc_offset_parsing() {
        let site = SiteModel::new(1, 100);
        assert_eq!(site.utc_offset().local_minus_utc(), 0);
        assert_eq!(
            site.clone().with_timezone("-12").utc_offset().local_minus_utc(),
            -12 * 3600
        );
        assert_eq!(
            site.clone().with_timezone("5.5").utc_offset().local_minus_utc(),
            5 * 3600 + 1800
        );
        assert_eq!(site.with_timezone("soon").utc_offset().local_minus_utc(), 0);
    }

    #[test]
    fn test_sites_24_hours_apart_differ_by_a_day() {
        let east = SiteModel::new(1, 1).with_timezone("12");
        let west = SiteModel::new(2, 2).with_timezone("-12");

        let diff = east.today() - west.today();
        // Exactly 24h apart, unless the clock ticked between the two calls.
        assert!(diff == Duration::days(1) || diff == Duration::days(0));
        let utc = Utc::now().date_naive();
        assert!(east.today() >= utc && west.today() <= utc);
    }

    #[test]
    fn test_parse_date() {
        assert_eq!(parse_date(" 2019-01-28 "), NaiveDate::from_ymd_opt(2019, 1, 28));
        assert_eq!(parse_date("2019-13-01"), None);
        assert_eq!(parse_date(""), None);
    }
}
