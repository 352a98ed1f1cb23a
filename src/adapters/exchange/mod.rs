//! HTTP exchange-rate feed.

mod http_rate_source;

pub use http_rate_source::HttpRateSource;
