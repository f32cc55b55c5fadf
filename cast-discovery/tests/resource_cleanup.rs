//! Tests for daemon shutdown and early iterator termination

use cast_discovery::{get_iter_with_timeout, get_with_timeout};
use std::time::Duration;

#[test]
fn test_early_iterator_termination() {
    let mut iter = get_iter_with_timeout(Duration::from_millis(100));

    // Take only the first item (if any) and drop the iterator early;
    // the mDNS daemon thread must be shut down by Drop
    let _first = iter.next();
}

#[test]
fn test_iterator_drop_without_iteration() {
    let _iter = get_iter_with_timeout(Duration::from_millis(100));
}

#[test]
fn test_exhausted_iterator_stays_exhausted() {
    let mut iter = get_iter_with_timeout(Duration::from_millis(100));
    while iter.next().is_some() {}

    assert!(iter.next().is_none());
    assert!(iter.next().is_none());
}

#[test]
fn test_multiple_daemons_sequential() {
    // The multicast socket must be released between runs
    for _ in 0..3 {
        let _devices = get_with_timeout(Duration::from_millis(100));
    }
}
