//! End-to-end scan passes over the in-memory venue.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Mutex;
use std::time::Duration;

use triarb::engine::reporter::ScanReporter;
use triarb::engine::scanner::{ScanSettings, Scanner};
use triarb::exchanges::paper::PaperExchange;
use triarb::strategy::ProfitEvaluator;
use triarb::types::*;

use crate::mock_exchange::{MockExchange, BRIDGE, QUOTE};

/// Records failures and completed trades for later assertions.
#[derive(Default)]
struct RecordingReporter {
    discovered: Mutex<Option<usize>>,
    failures: Mutex<Vec<(String, ArbError)>>,
    trades: Mutex<Vec<String>>,
}

impl ScanReporter for RecordingReporter {
    fn symbols_discovered(&self, count: usize) {
        *self.discovered.lock().unwrap() = Some(count);
    }

    fn trade_completed(&self, trade: &TradeResult) {
        self.trades.lock().unwrap().push(trade.base.clone());
    }

    fn symbol_failed(&self, symbol: &str, error: &ArbError) {
        self.failures
            .lock()
            .unwrap()
            .push((symbol.to_string(), error.clone()));
    }
}

fn settings() -> ScanSettings {
    ScanSettings {
        bridge_asset: BRIDGE.into(),
        settlement_asset: QUOTE.into(),
        throttle_every: 2,
        throttle_pause: Duration::ZERO,
        error_cooldown: Duration::ZERO,
    }
}

fn evaluator() -> ProfitEvaluator {
    ProfitEvaluator::with_margin(dec!(10000), dec!(0.005))
}

/// Four symbols, each about 0.78% cheaper on the direct book than through
/// the bridge, so every forward direction clears a 0.5% margin.
fn profitable_venue() -> MockExchange {
    let mock = MockExchange::new(dec!(1000));
    mock.list_triangle("ADA", dec!(0.645), dec!(0.00001));
    mock.list_triangle("ETH", dec!(129), dec!(0.002));
    mock.list_triangle("SOL", dec!(64.5), dec!(0.001));
    mock.list_triangle("XRP", dec!(1.29), dec!(0.00002));
    mock
}

fn bases(result: &PassResult) -> Vec<&str> {
    result.trades.iter().map(|t| t.base.as_str()).collect()
}

#[tokio::test]
async fn test_every_symbol_trades_forward() {
    let venue = profitable_venue();
    let reporter = RecordingReporter::default();
    let scanner = Scanner::new(&venue, evaluator(), settings(), &reporter);

    let result = scanner.run_pass().await.unwrap();

    assert_eq!(result.status, PassStatus::Success);
    assert_eq!(bases(&result), vec!["ADA", "ETH", "SOL", "XRP"]);
    assert!(result.trades.iter().all(|t| t.direction == Direction::Forward));
    assert!(result.trades.iter().all(|t| t.realized_profit > Decimal::ZERO));
    assert!(reporter.failures.lock().unwrap().is_empty());
    assert_eq!(*reporter.discovered.lock().unwrap(), Some(4));

    // Each trade reinvests the full settlement balance.
    assert_eq!(result.trades[0].invested, dec!(1000));
    assert_eq!(result.trades[1].invested, result.trades[0].returned);
    assert!(venue.balance_of(QUOTE) > dec!(1030));

    let first: Vec<String> = venue.orders().into_iter().take(3).collect();
    assert_eq!(first, vec!["BUY ADA/USDT", "SELL ADA/BTC", "SELL BTC/USDT"]);
    assert_eq!(
        result.trades[0].trace,
        vec!["ADA/USDT", "ADA/BTC", "BTC/USDT"]
    );
}

#[tokio::test]
async fn test_ticker_failure_skips_only_that_symbol() {
    let venue = profitable_venue();
    venue.fail_ticker("SOL/BTC");
    let reporter = RecordingReporter::default();
    let scanner = Scanner::new(&venue, evaluator(), settings(), &reporter);

    let result = scanner.run_pass().await.unwrap();

    assert_eq!(result.status, PassStatus::Success);
    assert_eq!(bases(&result), vec!["ADA", "ETH", "XRP"]);

    let failures = reporter.failures.lock().unwrap();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].0, "SOL");
    assert!(matches!(
        failures[0].1,
        ArbError::Transport { ref operation, .. } if operation.contains("SOL/BTC")
    ));
    assert!(!venue.orders().iter().any(|o| o.contains("SOL")));
}

#[tokio::test]
async fn test_missing_price_is_data_unavailable() {
    let venue = profitable_venue();
    // Listed, but quoting a zero price against the bridge.
    venue.list("DOT", QUOTE, dec!(7));
    venue.list("DOT", BRIDGE, Decimal::ZERO);
    let reporter = RecordingReporter::default();
    let scanner = Scanner::new(&venue, evaluator(), settings(), &reporter);

    let result = scanner.run_pass().await.unwrap();

    assert_eq!(result.trades.len(), 4);
    let failures = reporter.failures.lock().unwrap();
    assert_eq!(failures.len(), 1);
    assert!(matches!(
        failures[0].1,
        ArbError::DataUnavailable { ref symbol, .. } if symbol == "DOT"
    ));
}

#[tokio::test]
async fn test_partial_execution_reported_and_pass_continues() {
    let venue = profitable_venue();
    venue.fail_orders("SOL/BTC");
    let reporter = RecordingReporter::default();
    let scanner = Scanner::new(&venue, evaluator(), settings(), &reporter);

    let result = scanner.run_pass().await.unwrap();

    assert_eq!(result.status, PassStatus::Success);
    assert_eq!(bases(&result), vec!["ADA", "ETH"]);

    let failures = reporter.failures.lock().unwrap();
    assert_eq!(failures.len(), 2);

    match &failures[0] {
        (symbol, ArbError::PartialExecution { failed_leg, held_asset, held_amount, .. }) => {
            assert_eq!(symbol, "SOL");
            assert_eq!(*failed_leg, 2);
            assert_eq!(held_asset, "SOL");
            assert_eq!(*held_amount, venue.balance_of("SOL"));
        }
        other => panic!("expected PartialExecution, got {other:?}"),
    }
    assert!(failures[0].1.needs_operator());

    // SOL leg 1 spent the whole settlement balance, so XRP has nothing to trade.
    assert!(matches!(
        failures[1],
        (ref symbol, ArbError::InsufficientBalance { .. }) if symbol == "XRP"
    ));
    assert_eq!(venue.balance_of(QUOTE), Decimal::ZERO);
}

#[tokio::test]
async fn test_balanced_prices_yield_empty_success() {
    let venue = MockExchange::new(dec!(1000));
    // 130 = 65000 × 0.002: both directions net zero.
    venue.list_triangle("ETH", dec!(130), dec!(0.002));
    venue.list_triangle("SOL", dec!(65), dec!(0.001));
    let reporter = RecordingReporter::default();
    let scanner = Scanner::new(&venue, evaluator(), settings(), &reporter);

    let result = scanner.run_pass().await.unwrap();

    assert!(result.trades.is_empty());
    assert_eq!(result.status, PassStatus::Success);
    assert_eq!(result.total_profit(), Decimal::ZERO);
    assert!(venue.orders().is_empty());
    assert!(reporter.failures.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_inactive_markets_not_scanned() {
    let venue = profitable_venue();
    venue.deactivate("ETH/BTC");
    venue.deactivate("XRP/USDT");
    // Listed against the bridge only.
    venue.list("LTC", BRIDGE, dec!(0.0012));
    let reporter = RecordingReporter::default();
    let scanner = Scanner::new(&venue, evaluator(), settings(), &reporter);

    let result = scanner.run_pass().await.unwrap();

    assert_eq!(*reporter.discovered.lock().unwrap(), Some(2));
    assert_eq!(bases(&result), vec!["ADA", "SOL"]);
}

#[tokio::test]
async fn test_untradable_bridge_market_skips_every_triangle() {
    let venue = profitable_venue();
    venue.deactivate("BTC/USDT");
    let reporter = RecordingReporter::default();
    let scanner = Scanner::new(&venue, evaluator(), settings(), &reporter);

    let result = scanner.run_pass().await.unwrap();

    assert_eq!(result.status, PassStatus::Success);
    assert!(result.trades.is_empty());
    assert_eq!(*reporter.discovered.lock().unwrap(), Some(0));
    assert!(reporter.failures.lock().unwrap().is_empty());
    assert!(venue.orders().is_empty());
    assert_eq!(venue.balance_of(QUOTE), dec!(1000));
}

#[tokio::test]
async fn test_catalog_failure_aborts_pass() {
    let venue = profitable_venue();
    venue.fail_catalog("exchangeInfo returned 503");
    let reporter = RecordingReporter::default();
    let scanner = Scanner::new(&venue, evaluator(), settings(), &reporter);

    let err = scanner.run_pass().await.unwrap_err();

    assert!(matches!(err, ArbError::Catalog(ref msg) if msg.contains("503")));
    assert!(venue.orders().is_empty());
    assert!(reporter.discovered.lock().unwrap().is_none());
}

#[tokio::test]
async fn test_dry_run_pass_over_paper_venue() {
    let live = profitable_venue();
    let paper = PaperExchange::new(Box::new(live.clone()), dec!(0.001))
        .with_balance(QUOTE, dec!(500));
    let reporter = RecordingReporter::default();
    let scanner = Scanner::new(&paper, evaluator(), settings(), &reporter);

    let result = scanner.run_pass().await.unwrap();

    // 0.78% edge less three 0.1% fees still profits.
    assert_eq!(result.trades.len(), 4);
    assert_eq!(result.trades[0].invested, dec!(500));
    assert!(result.total_profit() > Decimal::ZERO);
    assert!(result.trades.iter().all(|t| t.legs.iter().all(|l| l.fee_cost > Decimal::ZERO)));
    // Nothing reached the live venue.
    assert!(live.orders().is_empty());
    assert_eq!(live.balance_of(QUOTE), dec!(1000));
}
