//! Connection pool construction and idle-eviction policy (§4.4, §8).

use std::time::Duration;

use fast_azure_storage::pool::{Pool, IDLE_TIMEOUT};

#[test]
fn idle_timeout_leaves_margin_under_the_load_balancers_60s_drop() {
    assert_eq!(IDLE_TIMEOUT, Duration::from_secs(55));
}

#[test]
fn default_pool_is_constructible_without_dialing_anything() {
    // Constructing the pool must not touch the network; host pools are
    // created lazily per-host on first checkout.
    let _pool = Pool::with_defaults();
}

#[test]
fn a_pool_with_custom_limits_is_also_constructible() {
    let _pool = Pool::new(10, 5);
}
