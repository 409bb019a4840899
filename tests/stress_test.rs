//! Randomized invariant tests for the Casual marketplace.
//!
//! These tests verify, over long seeded operation sequences:
//! 1. Turfs always partition the issued ranges (no overlap, no loss)
//! 2. Funds are conserved across accounts and escrow
//! 3. A rejected operation leaves state and balances untouched
//! 4. Identical seeds produce identical state roots
//! 5. Curve integration is exactly additive
//!
//! ## Running Stress Tests
//!
//! ```bash
//! cargo test --release --test stress_test -- --nocapture
//! ```

use std::time::Instant;

use casual_market::book::FillRange;
use casual_market::external::{InMemorySettlement, ManualFrontier, Settlement, SettlementMode};
use casual_market::pricing::{evaluate_definite_integral, Piece, PiecewiseCurve, Sign, Term};
use casual_market::types::ESCROW_ACCOUNT;
use casual_market::{CasualListing, CasualOrder, Commitment, MarketConfig, Marketplace, Pricing};

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

type Market = Marketplace<ManualFrontier, InMemorySettlement>;

// ============================================================================
// TEST CONSTANTS
// ============================================================================

/// Accounts 1..=ACCOUNTS take part in every run
const ACCOUNTS: u64 = 6;

/// Queue units issued to each account
const TURF_LENGTH: u64 = 10_000;

/// Starting balance per account, per bucket
const STARTING_BALANCE: u128 = 1_000_000_000_000;

/// Operations per randomized run
const STEPS: usize = 3_000;

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

fn new_market() -> Market {
    let mut bank = InMemorySettlement::new();
    for account in 1..=ACCOUNTS {
        bank.deposit_external(account, STARTING_BALANCE);
        bank.deposit_internal(account, STARTING_BALANCE);
    }
    let mut market = Marketplace::new(MarketConfig::default(), ManualFrontier::new(0), bank);
    for account in 1..=ACCOUNTS {
        market
            .issue_turf(account, account * 2 * TURF_LENGTH, TURF_LENGTH)
            .unwrap();
    }
    market
}

fn random_mode(rng: &mut ChaCha8Rng) -> SettlementMode {
    match rng.gen_range(0..3) {
        0 => SettlementMode::ExternalWallet,
        1 => SettlementMode::InternalBalance,
        _ => SettlementMode::InternalTolerant,
    }
}

/// Curve with up to `max_pieces` pieces of degree <= 3.
///
/// Roughly half the pieces with a quadratic or cubic term carry a negative
/// linear term. It is small next to the constant and the positive leading
/// term (at most 0.001 per unit against a constant of at least 1000), so
/// every piece stays above zero and the curve is always accepted.
fn random_curve(rng: &mut ChaCha8Rng, max_pieces: usize) -> PiecewiseCurve {
    let pieces = rng.gen_range(1..=max_pieces);
    let mut breakpoint = rng.gen_range(0..1_000u64);
    let mut out = Vec::with_capacity(pieces);
    for _ in 0..pieces {
        let count = rng.gen_range(1..=4);
        let terms = (0..count)
            .map(|k| match k {
                0 => Term::new(rng.gen_range(1_000..1_000_000u128), 0, Sign::Positive),
                1 if count > 2 && rng.gen_bool(0.5) => {
                    Term::new(rng.gen_range(1..1_000u128), rng.gen_range(6..=9), Sign::Negative)
                }
                _ => Term::new(rng.gen_range(1..1_000_000u128), rng.gen_range(0..=9), Sign::Positive),
            })
            .collect();
        out.push(Piece::new(breakpoint, terms));
        breakpoint += rng.gen_range(1..20_000u64);
    }
    PiecewiseCurve::new(out).unwrap()
}

fn has_negative_term(curve: &PiecewiseCurve) -> bool {
    curve
        .pieces()
        .iter()
        .any(|piece| piece.terms.iter().any(|t| t.sign == Sign::Negative && t.coefficient > 0))
}

fn random_pricing(rng: &mut ChaCha8Rng) -> Pricing {
    if rng.gen_bool(0.7) {
        Pricing::flat(rng.gen_range(1..=2_000_000))
    } else {
        Pricing::curve(random_curve(rng, 4))
    }
}

fn balances(market: &Market) -> Vec<(u128, u128)> {
    let bank = market.settlement();
    (1..=ACCOUNTS)
        .chain(std::iter::once(ESCROW_ACCOUNT))
        .map(|a| (bank.external_balance(a), bank.internal_balance(a)))
        .collect()
}

fn check_invariants(market: &Market) {
    // Turfs are disjoint, sorted, and cover exactly the issued length.
    let mut previous_end = 0;
    let mut total = 0;
    for turf in market.ledger().iter() {
        assert!(turf.start >= previous_end, "overlapping turf at {}", turf.start);
        assert!(turf.length > 0);
        previous_end = turf.end();
        total += turf.length;
    }
    assert_eq!(total, ACCOUNTS * TURF_LENGTH);

    // Every unit of money is somewhere.
    let held: u128 = balances(market).iter().map(|(e, i)| e + i).sum();
    assert_eq!(held, 2 * STARTING_BALANCE * ACCOUNTS as u128);

    // Escrow custody matches the sum of open orders.
    assert_eq!(
        market.settlement().internal_balance(ESCROW_ACCOUNT),
        market.orders().total_escrow()
    );
    assert_eq!(market.settlement().external_balance(ESCROW_ACCOUNT), 0);
}

/// Drive `STEPS` random operations and return the final state root.
fn run_random_sequence(seed: u64) -> Commitment {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut market = new_market();
    let mut listings: Vec<CasualListing> = Vec::new();
    let mut orders: Vec<CasualOrder> = Vec::new();

    for _ in 0..STEPS {
        let root_before = market.state_root();
        let balances_before = balances(&market);
        let events_before = market.events().len();

        let turfs: Vec<_> = market.ledger().iter().copied().collect();
        let turf = turfs[rng.gen_range(0..turfs.len())];
        let offset = rng.gen_range(0..turf.length);
        let length = rng.gen_range(1..=turf.length - offset);
        let account = rng.gen_range(1..=ACCOUNTS);
        let frontier = market.current_frontier();

        let rejected = match rng.gen_range(0..100) {
            0..=24 => {
                let listing = CasualListing {
                    lister: turf.owner,
                    range_start: turf.start,
                    range_offset: offset,
                    length,
                    pricing: random_pricing(&mut rng),
                    expiry_position: frontier + rng.gen_range(1..200_000),
                    min_fill_length: rng.gen_range(0..=length / 4),
                    settlement_mode: random_mode(&mut rng),
                };
                let result = market.create_listing(listing.lister, &listing);
                if result.is_ok() {
                    listings.push(listing);
                }
                result.is_err()
            }
            25..=49 if !listings.is_empty() => {
                let index = rng.gen_range(0..listings.len());
                let payment = rng.gen_range(1..10_000_000_000u128);
                let mode = random_mode(&mut rng);
                match market.fill_listing(account, &listings[index], payment, mode) {
                    Ok(fill) => {
                        assert!(fill.amount_paid <= payment);
                        match fill.remainder {
                            Some(rest) => listings[index] = rest,
                            None => {
                                listings.swap_remove(index);
                            }
                        }
                        false
                    }
                    Err(_) => true,
                }
            }
            50..=64 => {
                let order = CasualOrder {
                    buyer: account,
                    pricing: random_pricing(&mut rng),
                    max_queue_position: rng.gen_range(0..(ACCOUNTS + 1) * 2 * TURF_LENGTH),
                    min_fill_length: rng.gen_range(0..100),
                };
                let amount = rng.gen_range(0..100_000_000_000u128);
                let result = market.create_order(order.buyer, &order, amount, random_mode(&mut rng));
                if result.is_ok() {
                    orders.push(order);
                }
                result.is_err()
            }
            65..=84 if !orders.is_empty() => {
                let order = orders[rng.gen_range(0..orders.len())].clone();
                let range = FillRange {
                    range_start: turf.start,
                    offset,
                    length,
                };
                market
                    .fill_order(turf.owner, &order, range, random_mode(&mut rng))
                    .is_err()
            }
            85..=88 if !orders.is_empty() => {
                let order = orders[rng.gen_range(0..orders.len())].clone();
                market.cancel_order(order.buyer, &order, random_mode(&mut rng)).is_err()
            }
            89..=91 => {
                let position = turf.start + offset;
                market.cancel_listing(turf.owner, position).is_err()
            }
            92..=97 => market
                .transfer_range(turf.owner, turf.owner, account, turf.start, offset, length)
                .is_err(),
            _ => {
                let step = rng.gen_range(0..500);
                market.frontier_mut().advance_by(step);
                false
            }
        };

        if rejected {
            assert_eq!(market.state_root(), root_before);
            assert_eq!(balances(&market), balances_before);
            assert_eq!(market.events().len(), events_before);
        }
        check_invariants(&market);
        market.drain_events();
    }

    market.state_root()
}

// ============================================================================
// STRESS TESTS
// ============================================================================

#[test]
fn stress_random_operations_preserve_invariants() {
    let start = Instant::now();
    for seed in [1, 2, 3] {
        run_random_sequence(seed);
    }
    println!("3 x {} operations in {:.2?}", STEPS, start.elapsed());
}

#[test]
fn stress_determinism() {
    let first = run_random_sequence(42);
    let second = run_random_sequence(42);
    assert_eq!(first, second, "same seed must produce the same state root");

    let other = run_random_sequence(43);
    assert_ne!(first, other);
}

#[test]
fn stress_integral_additivity() {
    let mut rng = ChaCha8Rng::seed_from_u64(7);
    let mut signed = 0;
    for _ in 0..500 {
        let curve = random_curve(&mut rng, 8);
        if has_negative_term(&curve) {
            signed += 1;
        }
        let mut points: Vec<u64> = (0..3).map(|_| rng.gen_range(0..200_000)).collect();
        points.sort_unstable();
        let (a, b, c) = (points[0], points[1], points[2]);

        let whole = evaluate_definite_integral(&curve, a, c);
        let left = evaluate_definite_integral(&curve, a, b);
        let right = evaluate_definite_integral(&curve, b, c);
        assert_eq!(whole, left + right, "a={} b={} c={}", a, b, c);

        // Unit steps never cost less than zero and sum to the whole range.
        let stepped: u128 = (a..a + 50).map(|x| evaluate_definite_integral(&curve, x, x + 1)).sum();
        assert_eq!(stepped, evaluate_definite_integral(&curve, a, a + 50));
    }
    assert!(signed > 50, "only {} curves carried a negative term", signed);
}

#[test]
fn stress_settlement_conservation() {
    let mut rng = ChaCha8Rng::seed_from_u64(99);
    let mut bank = InMemorySettlement::new();
    for account in 1..=ACCOUNTS {
        bank.deposit_external(account, 1_000);
    }

    for _ in 0..10_000 {
        let from = rng.gen_range(1..=ACCOUNTS);
        let to = rng.gen_range(1..=ACCOUNTS);
        let amount = rng.gen_range(0..600);
        let _ = bank.move_funds(from, to, amount, random_mode(&mut rng), random_mode(&mut rng));

        let total: u128 = (1..=ACCOUNTS).map(|a| bank.total_balance(a)).sum();
        assert_eq!(total, 1_000 * ACCOUNTS as u128);
    }
}
