//! External service clients.

pub mod rates;

pub use rates::{RateProvider, RatesClient, RatesError};
