//! Casual Market - Binary Entry Point
//!
//! Runs a short scripted session against an in-memory market and prints
//! the resulting state root. Useful as a smoke test of a configuration.

use casual_market::book::FillRange;
use casual_market::external::{InMemorySettlement, ManualFrontier, SettlementMode};
use casual_market::pricing::{Piece, PiecewiseCurve, Term};
use casual_market::types::price::from_fixed_trimmed;
use casual_market::{CasualListing, CasualOrder, MarketConfig, MarketError, Marketplace, Pricing};

const ALICE: u64 = 1;
const BOB: u64 = 2;
const CAROL: u64 = 3;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing_subscriber::filter::LevelFilter::INFO.into()),
        )
        .init();

    let config = match MarketConfig::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = run(config) {
        eprintln!("Demo failed: {}", e);
        std::process::exit(1);
    }
}

fn run(config: MarketConfig) -> Result<(), MarketError> {
    let decimals = config.price_decimals;
    let fmt = |amount: u128| from_fixed_trimmed(amount, decimals).unwrap_or_else(|| amount.to_string());

    let mut bank = InMemorySettlement::new();
    bank.deposit_external(BOB, config.parse_amount("1000")?);
    bank.deposit_external(CAROL, config.parse_amount("1000")?);

    let mut market = Marketplace::new(config, ManualFrontier::new(0), bank);
    market.issue_turf(ALICE, 10_000, 1_000)?;

    println!("===========================================");
    println!("  Casual Market");
    println!("===========================================");
    println!();

    // Flat listing: 0.5 per unit.
    let listing = CasualListing {
        lister: ALICE,
        range_start: 10_000,
        range_offset: 0,
        length: 1_000,
        pricing: Pricing::flat_decimal("0.5", &config)?,
        expiry_position: 50_000,
        min_fill_length: 0,
        settlement_mode: SettlementMode::ExternalWallet,
    };
    market.create_listing(ALICE, &listing)?;
    let payment = config.parse_amount("250")?;
    let fill = market.fill_listing(BOB, &listing, payment, SettlementMode::ExternalWallet)?;
    println!(
        "Bob bought {} units at {} for {}",
        fill.filled_length,
        fill.position,
        fmt(fill.amount_paid)
    );

    // Curve order: 0.3 per unit within 5000 of the frontier, 0.1 beyond.
    let curve = PiecewiseCurve::new(vec![
        Piece::new(0, vec![Term::positive(config.parse_amount("0.3")?)]),
        Piece::new(5_000, vec![Term::positive(config.parse_amount("0.1")?)]),
    ])?;
    let order = CasualOrder {
        buyer: CAROL,
        pricing: Pricing::curve(curve),
        max_queue_position: 20_000,
        min_fill_length: 10,
    };
    let key = market.create_order(CAROL, &order, config.parse_amount("100")?, SettlementMode::ExternalWallet)?;

    market.frontier_mut().advance_to(6_000);
    let range = FillRange {
        range_start: 10_000,
        offset: 100,
        length: 200,
    };
    let sold = market.fill_order(BOB, &order, range, SettlementMode::InternalBalance)?;
    println!(
        "Bob sold {} units at {} to Carol for {}",
        sold.length,
        sold.position,
        fmt(sold.amount_paid)
    );
    println!("Carol's order {} has {} left in escrow", key, config.format_amount(market.order_escrow(&key)));

    println!();
    for turf in market.ledger().iter() {
        println!("  turf [{}, {}) owned by {}", turf.start, turf.end(), turf.owner);
    }
    println!("  listings: {}, orders: {}", market.listings().len(), market.orders().len());
    println!("  events recorded: {}", market.drain_events().len());
    println!("  state root: {}", market.state_root());

    Ok(())
}
