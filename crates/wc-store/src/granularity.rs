//! Stats granularity and the date-range quantity calculator

use crate::site::parse_date;
use chrono::{Datelike, Duration, NaiveDate};
use flux_config::{StatsConfig, WeekStart};
use serde::{Deserialize, Serialize};
use std::fmt;
use wc_client::OrderStatsApiUnit;

/// Time bucket used to size a stats query window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatsGranularity {
    Days,
    Weeks,
    Months,
    Years,
}

impl StatsGranularity {
    pub fn api_unit(&self) -> OrderStatsApiUnit {
        match self {
            StatsGranularity::Days => OrderStatsApiUnit::Day,
            StatsGranularity::Weeks => OrderStatsApiUnit::Week,
            StatsGranularity::Months => OrderStatsApiUnit::Month,
            StatsGranularity::Years => OrderStatsApiUnit::Year,
        }
    }

    /// Format of the period date sent to the API
    pub fn api_date_format(&self) -> &'static str {
        match self {
            StatsGranularity::Days => "%Y-%m-%d",
            StatsGranularity::Weeks => "%G-W%V",
            StatsGranularity::Months => "%Y-%m",
            StatsGranularity::Years => "%Y",
        }
    }

    /// Window size of a default (non-custom) query
    pub fn default_quantity(&self, config: &StatsConfig) -> u32 {
        match self {
            StatsGranularity::Days => config.default_quantity_days,
            StatsGranularity::Weeks => config.default_quantity_weeks,
            StatsGranularity::Months => config.default_quantity_months,
            StatsGranularity::Years => config.default_quantity_years,
        }
    }
}

impl fmt::Display for StatsGranularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            StatsGranularity::Days => "days",
            StatsGranularity::Weeks => "weeks",
            StatsGranularity::Months => "months",
            StatsGranularity::Years => "years",
        };
        f.write_str(label)
    }
}

/// Number of `granularity` periods touched by the range between two dates
///
/// The dates may come in either order. When either one is absent, empty or
/// not a `%Y-%m-%d` date, `default_quantity` is returned.
pub fn quantity_by_granularity(
    start_date: Option<&str>,
    end_date: Option<&str>,
    granularity: StatsGranularity,
    default_quantity: u32,
    week_start: WeekStart,
) -> u32 {
    let (Some(start), Some(end)) = (
        start_date.and_then(parse_date),
        end_date.and_then(parse_date),
    ) else {
        return default_quantity;
    };

    let (first, last) = (start.min(end), start.max(end));
    let periods = match granularity {
        StatsGranularity::Days => (last - first).num_days(),
        StatsGranularity::Weeks => {
            (week_start_of(last, week_start) - week_start_of(first, week_start)).num_days() / 7
        }
        StatsGranularity::Months => month_index(last) - month_index(first),
        StatsGranularity::Years => i64::from(last.year() - first.year()),
    };

    u32::try_from(periods + 1).unwrap_or(default_quantity)
}

fn week_start_of(date: NaiveDate, week_start: WeekStart) -> NaiveDate {
    let offset = match week_start {
        WeekStart::Sunday => date.weekday().num_days_from_sunday(),
        WeekStart::Monday => date.weekday().num_days_from_monday(),
    };
    date - Duration::days(i64::from(offset))
}

fn month_index(date: NaiveDate) -> i64 {
    i64::from(date.year()) * 12 + i64::from(date.month0())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn quantity(start: &str, end: &str, granularity: StatsGranularity, default: u32) -> u32 {
        quantity_by_granularity(
            Some(start),
            Some(end),
            granularity,
            default,
            WeekStart::Sunday,
        )
    }

    /// Checks the expected value in both argument orders
    fn assert_quantity(start: &str, end: &str, granularity: StatsGranularity, expected: u32) {
        assert_eq!(quantity(start, end, granularity, 99), expected, "{start}..{end}");
        assert_eq!(quantity(end, start, granularity, 99), expected, "{end}..{start}");
    }

    #[test]
    fn test_quantity_for_days() {
        assert_quantity("2018-01-25", "2018-01-28", StatsGranularity::Days, 4);
        assert_quantity("2018-01-01", "2018-01-01", StatsGranularity::Days, 1);
        assert_quantity("2018-01-01", "2018-01-31", StatsGranularity::Days, 31);
    }

    #[test]
    fn test_quantity_for_weeks() {
        assert_quantity("2018-10-22", "2018-10-23", StatsGranularity::Weeks, 1);
        assert_quantity("2017-01-01", "2018-01-01", StatsGranularity::Weeks, 53);
        assert_quantity("2019-01-20", "2019-01-13", StatsGranularity::Weeks, 2);
        assert_quantity("2017-01-01", "2018-03-01", StatsGranularity::Weeks, 61);
        assert_quantity("2018-01-01", "2018-01-31", StatsGranularity::Weeks, 5);
        assert_quantity("2018-12-01", "2018-12-31", StatsGranularity::Weeks, 6);
        assert_quantity("2018-11-01", "2018-11-30", StatsGranularity::Weeks, 5);
    }

    #[test]
    fn test_quantity_for_weeks_starting_monday() {
        let monday = |start, end| {
            quantity_by_granularity(
                Some(start),
                Some(end),
                StatsGranularity::Weeks,
                17,
                WeekStart::Monday,
            )
        };
        // Sunday and the following Monday straddle a Monday week boundary.
        assert_eq!(monday("2019-01-13", "2019-01-14"), 2);
        // Monday 14th through Sunday 20th is a single Monday week.
        assert_eq!(monday("2019-01-14", "2019-01-20"), 1);
    }

    #[test]
    fn test_quantity_for_months() {
        assert_quantity("2018-10-22", "2018-10-23", StatsGranularity::Months, 1);
        assert_quantity("2017-01-01", "2018-01-01", StatsGranularity::Months, 13);
        assert_quantity("2018-01-01", "2018-01-01", StatsGranularity::Months, 1);
        assert_quantity("2017-01-01", "2018-03-01", StatsGranularity::Months, 15);
        assert_quantity("2017-01-01", "2018-01-31", StatsGranularity::Months, 13);
        assert_eq!(
            quantity("2018-12-31", "2019-01-01", StatsGranularity::Months, 1),
            2
        );
    }

    #[test]
    fn test_quantity_for_years() {
        assert_quantity("2017-01-01", "2018-01-01", StatsGranularity::Years, 2);
        assert_quantity("2017-01-01", "2018-03-01", StatsGranularity::Years, 2);
        assert_quantity("2017-01-01", "2018-01-05", StatsGranularity::Years, 2);
        assert_quantity("2017-01-01", "2019-03-01", StatsGranularity::Years, 3);
        assert_quantity("2015-03-05", "2017-01-01", StatsGranularity::Years, 3);
        assert_quantity("2018-12-31", "2019-01-01", StatsGranularity::Years, 2);
        assert_quantity("2019-01-25", "2019-01-25", StatsGranularity::Years, 1);
    }

    #[test]
    fn test_missing_dates_use_default() {
        for (granularity, default) in [
            (StatsGranularity::Days, 30),
            (StatsGranularity::Weeks, 17),
            (StatsGranularity::Months, 12),
            (StatsGranularity::Years, 1),
        ] {
            assert_eq!(quantity("", "", granularity, default), default);
            assert_eq!(
                quantity_by_granularity(None, None, granularity, default, WeekStart::Sunday),
                default
            );
            assert_eq!(
                quantity_by_granularity(
                    Some("2019-01-01"),
                    None,
                    granularity,
                    default,
                    WeekStart::Sunday
                ),
                default
            );
        }
    }

    #[test]
    fn test_unparseable_date_uses_default() {
        assert_eq!(quantity("yesterday", "2019-01-01", StatsGranularity::Days, 30), 30);
    }

    #[test]
    fn test_api_date_formats() {
        let date = NaiveDate::from_ymd_opt(2019, 1, 28).unwrap();
        let render = |g: StatsGranularity| date.format(g.api_date_format()).to_string();
        assert_eq!(render(StatsGranularity::Days), "2019-01-28");
        assert_eq!(render(StatsGranularity::Weeks), "2019-W05");
        assert_eq!(render(StatsGranularity::Months), "2019-01");
        assert_eq!(render(StatsGranularity::Years), "2019");
    }

    #[test]
    fn test_default_quantity_from_config() {
        let config = StatsConfig::default();
        assert_eq!(StatsGranularity::Days.default_quantity(&config), 30);
        assert_eq!(StatsGranularity::Weeks.default_quantity(&config), 17);
        assert_eq!(StatsGranularity::Months.default_quantity(&config), 12);
        assert_eq!(StatsGranularity::Years.default_quantity(&config), 1);
        assert_eq!(StatsGranularity::Weeks.api_unit(), OrderStatsApiUnit::Week);
    }
}
