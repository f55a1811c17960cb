//! Shared cache lifetimes, so call sites agree on a small set of TTLs
//! instead of scattering ad hoc durations.

use std::time::Duration;

pub const TTL_5S: Duration = Duration::from_secs(5);
pub const TTL_10S: Duration = Duration::from_secs(10);
pub const TTL_15S: Duration = Duration::from_secs(15);
pub const TTL_30S: Duration = Duration::from_secs(30);

pub const TTL_1M: Duration = Duration::from_secs(60);
pub const TTL_2M: Duration = Duration::from_secs(2 * 60);
pub const TTL_5M: Duration = Duration::from_secs(5 * 60);
pub const TTL_10M: Duration = Duration::from_secs(10 * 60);
pub const TTL_15M: Duration = Duration::from_secs(15 * 60);
pub const TTL_30M: Duration = Duration::from_secs(30 * 60);

pub const TTL_1H: Duration = Duration::from_secs(60 * 60);
pub const TTL_3H: Duration = Duration::from_secs(3 * 60 * 60);
pub const TTL_6H: Duration = Duration::from_secs(6 * 60 * 60);
pub const TTL_9H: Duration = Duration::from_secs(9 * 60 * 60);
pub const TTL_12H: Duration = Duration::from_secs(12 * 60 * 60);

pub const TTL_1D: Duration = Duration::from_secs(24 * 60 * 60);
pub const TTL_2D: Duration = Duration::from_secs(2 * 24 * 60 * 60);
pub const TTL_3D: Duration = Duration::from_secs(3 * 24 * 60 * 60);
pub const TTL_7D: Duration = Duration::from_secs(7 * 24 * 60 * 60);
pub const TTL_15D: Duration = Duration::from_secs(15 * 24 * 60 * 60);
pub const TTL_30D: Duration = Duration::from_secs(30 * 24 * 60 * 60);
