use cryptoalerts::error::AlertError;
use cryptoalerts::services::ema_tracker::{EmaTracker, DEFAULT_EMA_PERIOD};
use rust_decimal_macros::dec;

const BTC: &str = "BTC-USDT";

#[test]
fn default_period_gives_five_percent_smoothing() {
    let t = EmaTracker::default();
    assert_eq!(t.period(), DEFAULT_EMA_PERIOD);
    assert_eq!(t.smoothing(), dec!(0.05));
}

#[test]
fn first_sample_seeds_then_smooths() {
    let t = EmaTracker::new(9);

    assert_eq!(t.update(BTC, dec!(100), 1).unwrap(), dec!(100));
    assert_eq!(t.update(BTC, dec!(110), 2).unwrap(), dec!(102.00));
    assert_eq!(t.current(BTC), Some(dec!(102)));
}

#[test]
fn markets_are_tracked_independently() {
    let t = EmaTracker::new(9);

    t.update(BTC, dec!(100), 1).unwrap();
    t.update("ETH-USDT", dec!(10), 1).unwrap();
    t.update(BTC, dec!(110), 2).unwrap();

    assert_eq!(t.current("ETH-USDT"), Some(dec!(10)));
    assert!(!t.is_tracking("SOL-USDT"));
}

#[test]
fn non_positive_price_is_rejected_without_mutation() {
    let t = EmaTracker::new(9);

    let err = t.update(BTC, dec!(0), 1).unwrap_err();
    assert!(matches!(err, AlertError::InvalidSample { .. }));
    assert!(!t.is_tracking(BTC));

    t.update(BTC, dec!(100), 2).unwrap();
    assert!(t.update(BTC, dec!(-5), 3).is_err());
    assert_eq!(t.current(BTC), Some(dec!(100)));
}

#[test]
fn stale_sample_is_rejected_and_equal_timestamp_applied() {
    let t = EmaTracker::new(9);
    t.update(BTC, dec!(100), 10).unwrap();

    let err = t.update(BTC, dec!(200), 5).unwrap_err();
    assert!(matches!(err, AlertError::InvalidSample { .. }));
    assert_eq!(t.current(BTC), Some(dec!(100)));

    assert_eq!(t.update(BTC, dec!(110), 10).unwrap(), dec!(102));
}

#[test]
fn restore_seeds_only_untracked_markets() {
    let t = EmaTracker::new(9);

    assert!(t.restore(BTC, dec!(50)));
    assert!(!t.restore(BTC, dec!(70)));
    assert!(!t.restore("ETH-USDT", dec!(0)));

    // restored value has no timestamp, any live sample is accepted
    assert_eq!(t.update(BTC, dec!(60), 0).unwrap(), dec!(52));
}

#[test]
fn huge_period_does_not_overflow() {
    let t = EmaTracker::new(u32::MAX);
    assert!(t.smoothing() > dec!(0));

    assert_eq!(t.update(BTC, dec!(100), 1).unwrap(), dec!(100));
    assert!(t.update(BTC, dec!(200), 2).unwrap() >= dec!(100));
}
