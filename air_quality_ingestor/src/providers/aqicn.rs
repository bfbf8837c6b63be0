//! aqicn.org (World Air Quality Index) JSON feed.

pub mod provider;
pub mod response;

pub use provider::AqicnProvider;

use std::num::NonZeroU32;

use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use nonzero_ext::nonzero;

/// Client-side limiter shared by the HTTP providers.
pub(crate) fn rate_limiter(requests_per_second: u32) -> DefaultDirectRateLimiter {
    let rps = NonZeroU32::new(requests_per_second).unwrap_or(nonzero!(1u32));
    RateLimiter::direct(Quota::per_second(rps))
}
