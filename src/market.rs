//! Market and resolution enums.
//!
//! Every table or view name used in SQL is resolved from these enums via
//! static lookup.  Request text never reaches a query string directly, so
//! parsing here doubles as the injection whitelist.

/// One bettable outcome proposition, identified by its wire code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Market {
    IndWins,
    VkCentury,
}

impl Market {
    pub const ALL: [Market; 2] = [Market::IndWins, Market::VkCentury];

    /// Parse a wire code.  Anything outside the whitelist is rejected.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ind_wins" => Some(Self::IndWins),
            "vk_century" => Some(Self::VkCentury),
            _ => None,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::IndWins => "ind_wins",
            Self::VkCentury => "vk_century",
        }
    }

    /// Append-only trade log table for this market.
    pub fn price_table(&self) -> &'static str {
        match self {
            Self::IndWins => "ind_wins_prices",
            Self::VkCentury => "vk_century_prices",
        }
    }
}

const MINUTE_MS: i64 = 60 * 1000;
const HOUR_MS: i64 = 60 * MINUTE_MS;
const WEEK_MS: i64 = 7 * 24 * HOUR_MS;

/// Weekly buckets start on Monday.  1969-12-29T00:00:00Z is the Monday
/// preceding the Unix epoch (the epoch itself fell on a Thursday).
const WEEK_ORIGIN_MS: i64 = -3 * 24 * HOUR_MS;

/// Candle bucket width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resolution {
    M1,
    H1,
    W1,
}

impl Resolution {
    pub const ALL: [Resolution; 3] = [Resolution::M1, Resolution::H1, Resolution::W1];

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "1m" => Some(Self::M1),
            "1h" => Some(Self::H1),
            "1w" => Some(Self::W1),
            _ => None,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::M1 => "1m",
            Self::H1 => "1h",
            Self::W1 => "1w",
        }
    }

    pub fn width_ms(&self) -> i64 {
        match self {
            Self::M1 => MINUTE_MS,
            Self::H1 => HOUR_MS,
            Self::W1 => WEEK_MS,
        }
    }

    /// Start of the bucket containing `ts_ms`: truncation to the bucket
    /// width against a fixed calendar origin, so boundaries are stable
    /// across recomputations.
    pub fn bucket_of(&self, ts_ms: i64) -> i64 {
        let origin = match self {
            Self::W1 => WEEK_ORIGIN_MS,
            _ => 0,
        };
        origin + (ts_ms - origin).div_euclid(self.width_ms()) * self.width_ms()
    }
}

/// Candle table for a validated `(market, resolution)` pair.
///
/// The ind_wins namespace uses market-suffixed names, vk_century the
/// shared unsuffixed ones.  The split is historical; both sides filter
/// on `currency_code` regardless.
pub fn kline_table(market: Market, resolution: Resolution) -> &'static str {
    match (market, resolution) {
        (Market::IndWins, Resolution::M1) => "klines_1m_ind_wins",
        (Market::IndWins, Resolution::H1) => "klines_1h_ind_wins",
        (Market::IndWins, Resolution::W1) => "klines_1w_ind_wins",
        (Market::VkCentury, Resolution::M1) => "klines_1m",
        (Market::VkCentury, Resolution::H1) => "klines_1h",
        (Market::VkCentury, Resolution::W1) => "klines_1w",
    }
}
