//! Custody Hardening Tests
//!
//! Comprehensive adversarial testing of the custody contracts:
//! - Conservation of value (tracked balances vs custodied funds)
//! - Reentrancy guard behavior across error paths
//! - Arithmetic overflow
//! - Permission escalation
//! - Pause and migration semantics
//! - End-to-end deposit/lock/mass-refund/factory scenarios
//! - Fuzz testing (proptest)

use contracts::errors::{EscrowError, FactoryError, LedgerError};
use contracts::events::ContractEvent;
use contracts::factory::StakedAccessFactory;
use contracts::ledger::DepositLedger;
use contracts::CONTRACT_ABI_VERSION;
use rust_decimal::Decimal;
use types::ids::Address;
use types::token::{MockToken, Token};

const FIVE_DAYS: i64 = 432_000;
const THIRTY_DAYS: i64 = 30 * 86_400;

// ═══════════════════════════════════════════════════════════════════
// Conservation
// ═══════════════════════════════════════════════════════════════════

#[test]
fn test_tracked_balances_match_custody_through_lifecycle() {
    let (mut ledger, mut token) = setup_ledger();
    let provider = addr("provider");

    ledger
        .deposit(&mut token, &addr("sender"), dec(1000), &provider, "Foo", 1000)
        .unwrap();
    ledger
        .deposit(&mut token, &addr("sender2"), dec(500), &provider, "Foo", 1001)
        .unwrap();
    assert_conservation(&ledger, &token);

    ledger
        .withdraw(&mut token, &addr("sender"), &provider, "Foo", 1002)
        .unwrap();
    assert_conservation(&ledger, &token);

    ledger
        .refund(&mut token, &provider, &addr("sender2"), "Foo")
        .unwrap();
    assert_conservation(&ledger, &token);
    assert_eq!(token.balance_of(ledger.address()), Decimal::ZERO);
}

#[test]
fn test_failed_operations_leave_no_trace() {
    let (mut ledger, mut token) = setup_ledger();
    let before_vault = token.balance_of(ledger.address());

    // zero amount
    assert!(ledger
        .deposit(&mut token, &addr("sender"), Decimal::ZERO, &Address::zero(), "Foo", 1000)
        .is_err());
    // no allowance
    assert!(ledger
        .deposit(&mut token, &addr("stranger"), dec(100), &Address::zero(), "Foo", 1000)
        .is_err());
    // no deposit to withdraw
    assert!(ledger
        .withdraw(&mut token, &addr("sender"), &Address::zero(), "Foo", 1000)
        .is_err());

    assert_eq!(token.balance_of(ledger.address()), before_vault);
    assert_eq!(ledger.total_tracked(), Decimal::ZERO);
    assert!(ledger.events().is_empty());
}

// ═══════════════════════════════════════════════════════════════════
// Reentrancy / guard release
// ═══════════════════════════════════════════════════════════════════

#[test]
fn test_guard_released_after_success_and_error() {
    let (mut ledger, mut token) = setup_ledger();

    // error path releases the guard
    assert!(ledger
        .deposit(&mut token, &addr("sender"), Decimal::ZERO, &Address::zero(), "Foo", 1000)
        .is_err());

    // next operations still succeed
    ledger
        .deposit(&mut token, &addr("sender"), dec(100), &Address::zero(), "Foo", 1000)
        .unwrap();
    ledger
        .withdraw(&mut token, &addr("sender"), &Address::zero(), "Foo", 1001)
        .unwrap();
}

// ═══════════════════════════════════════════════════════════════════
// Overflow
// ═══════════════════════════════════════════════════════════════════

#[test]
fn test_deposit_overflow_rejected_before_transfer() {
    let (mut ledger, mut token) = setup_ledger();
    let whale = addr("whale");
    token.free_money(&whale, Decimal::MAX);
    token
        .approve(&whale, ledger.address(), Decimal::MAX)
        .unwrap();

    ledger
        .deposit(&mut token, &whale, Decimal::MAX, &Address::zero(), "Foo", 1000)
        .unwrap();

    // topping up past Decimal::MAX must fail without moving funds
    token.free_money(&whale, dec(1));
    token.approve(&whale, ledger.address(), dec(1)).unwrap();
    let result = ledger.deposit(&mut token, &whale, dec(1), &Address::zero(), "Foo", 1001);
    assert_eq!(result, Err(LedgerError::Overflow));
    assert_eq!(token.balance_of(&whale), dec(1));
    assert_eq!(
        ledger.balance(&whale, &Address::zero(), "Foo"),
        Decimal::MAX
    );
}

// ═══════════════════════════════════════════════════════════════════
// Permissions
// ═══════════════════════════════════════════════════════════════════

#[test]
fn test_non_owner_cannot_pause_or_migrate() {
    let (mut ledger, _token) = setup_ledger();
    assert_eq!(ledger.pause(&addr("attacker")), Err(LedgerError::Unauthorized));
    assert_eq!(
        ledger.pause_and_upgrade(&addr("attacker"), addr("evil")),
        Err(LedgerError::Unauthorized)
    );
    assert_eq!(
        ledger.set_owner(&addr("attacker"), addr("attacker")),
        Err(LedgerError::Unauthorized)
    );
}

#[test]
fn test_counterparties_manage_only_their_own_keys() {
    let (mut ledger, mut token) = setup_ledger();

    // two counterparties configure the same key string independently
    ledger.set_lock_period(&addr("provider"), "Foo", FIVE_DAYS).unwrap();
    ledger.set_lock_period(&addr("other"), "Foo", 7).unwrap();
    assert_eq!(ledger.lock_period(&addr("provider"), "Foo"), FIVE_DAYS);
    assert_eq!(ledger.lock_period(&addr("other"), "Foo"), 7);

    // deposits under one counterparty are invisible to the other
    ledger
        .deposit(&mut token, &addr("sender"), dec(100), &addr("provider"), "Foo", 1000)
        .unwrap();
    assert!(matches!(
        ledger.refund(&mut token, &addr("other"), &addr("sender"), "Foo"),
        Err(LedgerError::NoDeposit { .. })
    ));
}

// ═══════════════════════════════════════════════════════════════════
// Pause & migration semantics
// ═══════════════════════════════════════════════════════════════════

#[test]
fn test_pause_blocks_deposits_but_not_exits() {
    let (mut ledger, mut token) = setup_ledger();
    ledger
        .deposit(&mut token, &addr("sender"), dec(1000), &Address::zero(), "Foo", 1000)
        .unwrap();
    ledger.pause(&addr("admin")).unwrap();

    assert_eq!(
        ledger.deposit(&mut token, &addr("sender2"), dec(100), &Address::zero(), "Foo", 1001),
        Err(LedgerError::Paused)
    );
    // pre-existing unlocked balance withdraws fine
    ledger
        .withdraw(&mut token, &addr("sender"), &Address::zero(), "Foo", 1002)
        .unwrap();
}

#[test]
fn test_unpause_fails_permanently_after_migration() {
    let (mut ledger, _token) = setup_ledger();
    ledger
        .pause_and_upgrade(&addr("admin"), addr("successor"))
        .unwrap();

    for _ in 0..3 {
        assert!(matches!(
            ledger.unpause(&addr("admin")),
            Err(LedgerError::Lifecycle(_))
        ));
    }
    assert_eq!(ledger.migration_target(), Some(&addr("successor")));
}

// ═══════════════════════════════════════════════════════════════════
// Scenario: deposit / withdraw
// ═══════════════════════════════════════════════════════════════════

#[test]
fn scenario_deposit_then_withdraw_then_withdraw_again() {
    let (mut ledger, mut token) = setup_ledger();
    let c = addr("provider");

    ledger
        .deposit(&mut token, &addr("sender"), dec(1000), &c, "Foo", 1000)
        .unwrap();
    assert_eq!(ledger.balance(&addr("sender"), &c, "Foo"), dec(1000));

    ledger
        .withdraw(&mut token, &addr("sender"), &c, "Foo", 1001)
        .unwrap();
    assert_eq!(ledger.balance(&addr("sender"), &c, "Foo"), Decimal::ZERO);

    let second = ledger.withdraw(&mut token, &addr("sender"), &c, "Foo", 1002);
    assert!(matches!(second, Err(LedgerError::NoDeposit { .. })));
}

// ═══════════════════════════════════════════════════════════════════
// Scenario: time-lock
// ═══════════════════════════════════════════════════════════════════

#[test]
fn scenario_lock_period_gates_withdrawal() {
    let (mut ledger, mut token) = setup_ledger();
    let c = addr("provider");

    ledger.set_lock_period(&c, "Foo", FIVE_DAYS).unwrap();
    ledger
        .deposit(&mut token, &addr("sender"), dec(1000), &c, "Foo", 1000)
        .unwrap();

    assert_eq!(
        ledger.withdraw(&mut token, &addr("sender"), &c, "Foo", 1001),
        Err(LedgerError::StillLocked {
            release_date: 1000 + FIVE_DAYS
        })
    );

    ledger
        .withdraw(&mut token, &addr("sender"), &c, "Foo", 1000 + FIVE_DAYS)
        .unwrap();
    assert_eq!(ledger.balance(&addr("sender"), &c, "Foo"), Decimal::ZERO);
}

#[test]
fn test_lock_monotonicity_across_config_changes() {
    let (mut ledger, mut token) = setup_ledger();
    let c = addr("provider");

    ledger.set_lock_period(&c, "Foo", FIVE_DAYS).unwrap();
    ledger
        .deposit(&mut token, &addr("sender"), dec(100), &c, "Foo", 1000)
        .unwrap();
    let mut last_stamp = ledger.release_date(&addr("sender"), &c, "Foo");

    // alternate config shrink/grow with top-ups; the stamp never decreases
    for (i, period) in [1_i64, FIVE_DAYS, 10, THIRTY_DAYS].iter().enumerate() {
        ledger.set_lock_period(&c, "Foo", *period).unwrap();
        ledger
            .deposit(&mut token, &addr("sender"), dec(10), &c, "Foo", 1001 + i as i64)
            .unwrap();
        let stamp = ledger.release_date(&addr("sender"), &c, "Foo");
        assert!(stamp >= last_stamp, "release date moved backwards");
        last_stamp = stamp;
    }
}

// ═══════════════════════════════════════════════════════════════════
// Scenario: mass refund
// ═══════════════════════════════════════════════════════════════════

#[test]
fn scenario_mass_refund_drains_key() {
    let (mut ledger, mut token) = setup_ledger();
    let c = addr("provider");

    for who in ["sender", "sender2", "sender3"] {
        ledger
            .deposit(&mut token, &addr(who), dec(1000), &c, "Bar", 1000)
            .unwrap();
    }
    assert_eq!(ledger.depositor_count(&c, "Bar"), 3);
    assert_eq!(token.balance_of(ledger.address()), dec(3000));

    let refunded = ledger.refund_all(&mut token, &c, "Bar").unwrap();
    assert_eq!(refunded, 3);
    assert_eq!(ledger.depositor_count(&c, "Bar"), 0);
    assert_eq!(token.balance_of(ledger.address()), Decimal::ZERO);
    for who in ["sender", "sender2", "sender3"] {
        assert_eq!(ledger.balance(&addr(who), &c, "Bar"), Decimal::ZERO);
    }
    assert_conservation(&ledger, &token);
}

#[test]
fn test_mass_refund_spares_other_keys() {
    let (mut ledger, mut token) = setup_ledger();
    let c = addr("provider");

    ledger
        .deposit(&mut token, &addr("sender"), dec(1000), &c, "Bar", 1000)
        .unwrap();
    ledger
        .deposit(&mut token, &addr("sender2"), dec(500), &c, "Baz", 1000)
        .unwrap();

    ledger.refund_all(&mut token, &c, "Bar").unwrap();
    assert_eq!(ledger.balance(&addr("sender2"), &c, "Baz"), dec(500));
    assert_eq!(ledger.depositor_count(&c, "Baz"), 1);
}

// ═══════════════════════════════════════════════════════════════════
// Scenario: factory
// ═══════════════════════════════════════════════════════════════════

#[test]
fn scenario_factory_validates_then_deploys() {
    let mut factory = StakedAccessFactory::new(addr("factory"), addr("superuser")).unwrap();
    let now = 1000;
    let expiry = now + THIRTY_DAYS;

    // zero price fails without deploying
    assert_eq!(
        factory.create_staked_access(&addr("superuser"), expiry, Decimal::ZERO, now),
        Err(FactoryError::InvalidPrice)
    );
    assert_eq!(factory.count(), 0);

    // valid parameters deploy an instance with the requested terms
    let id = factory
        .create_staked_access(&addr("superuser"), expiry, dec(10), now)
        .unwrap();
    let escrow = factory.get(&id).unwrap();
    assert_eq!(escrow.price(), Some(dec(10)));
    assert_eq!(escrow.expiry(), Some(expiry));
}

#[test]
fn test_factory_instance_full_stake_cycle() {
    let mut factory = StakedAccessFactory::new(addr("factory"), addr("superuser")).unwrap();
    let now = 1000;
    let id = factory
        .create_staked_access(&addr("superuser"), now + THIRTY_DAYS, dec(10), now)
        .unwrap();
    let escrow_address = factory.address_of(&id).unwrap().clone();

    let mut token = MockToken::new();
    token.free_money(&addr("punter"), dec(10));
    token
        .approve(&addr("punter"), &escrow_address, dec(10))
        .unwrap();

    let escrow = factory.get_mut(&id).unwrap();
    escrow
        .stake_at_price(&mut token, &addr("punter"), now)
        .unwrap();
    assert_eq!(token.balance_of(&addr("punter")), Decimal::ZERO);

    // staking again under the single-stake policy fails
    assert_eq!(
        escrow.stake_at_price(&mut token, &addr("punter"), now + 1),
        Err(EscrowError::AlreadyStaked)
    );

    // after expiry the punter exits in full
    escrow
        .retrieve_all(&mut token, &addr("punter"), now + THIRTY_DAYS)
        .unwrap();
    assert_eq!(token.balance_of(&addr("punter")), dec(10));
    assert_eq!(token.balance_of(&escrow_address), Decimal::ZERO);
}

// ═══════════════════════════════════════════════════════════════════
// Index consistency
// ═══════════════════════════════════════════════════════════════════

#[test]
fn test_index_matches_nonzero_balances_after_mixed_ops() {
    let (mut ledger, mut token) = setup_ledger();
    let c = addr("provider");

    ledger
        .deposit(&mut token, &addr("sender"), dec(100), &c, "Foo", 1000)
        .unwrap();
    ledger
        .deposit(&mut token, &addr("sender2"), dec(100), &c, "Foo", 1000)
        .unwrap();
    ledger
        .deposit(&mut token, &addr("sender3"), dec(100), &c, "Foo", 1000)
        .unwrap();
    ledger
        .withdraw(&mut token, &addr("sender2"), &c, "Foo", 1001)
        .unwrap();
    ledger
        .withdraw_partial(&mut token, &addr("sender3"), &c, "Foo", dec(40), 1001)
        .unwrap();
    ledger
        .release(&mut token, &addr("sender"), &c, "Foo")
        .unwrap();

    assert_index_consistent(&ledger, &c, "Foo", &["sender", "sender2", "sender3"]);
    assert_eq!(ledger.depositor_count(&c, "Foo"), 1);
    assert_eq!(ledger.depositors(&c, "Foo"), vec![addr("sender3")]);
}

// ═══════════════════════════════════════════════════════════════════
// Event serialization
// ═══════════════════════════════════════════════════════════════════

#[test]
fn test_emitted_events_serialize_round_trip() {
    let (mut ledger, mut token) = setup_ledger();
    ledger
        .deposit(&mut token, &addr("sender"), dec(1000), &Address::zero(), "Foo", 1000)
        .unwrap();
    ledger
        .withdraw(&mut token, &addr("sender"), &Address::zero(), "Foo", 1001)
        .unwrap();

    for event in ledger.events() {
        let json = serde_json::to_string(event).unwrap();
        let back: ContractEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(event, &back);
    }
}

// ═══════════════════════════════════════════════════════════════════
// Upgrade path (ABI freeze)
// ═══════════════════════════════════════════════════════════════════

#[test]
fn test_contract_abi_version_frozen() {
    assert_eq!(CONTRACT_ABI_VERSION, "1.0.0");
}

// ═══════════════════════════════════════════════════════════════════
// Fuzz Tests (Proptest)
// ═══════════════════════════════════════════════════════════════════

mod fuzz {
    use super::*;
    use proptest::prelude::*;

    /// Strategy for valid deposit amounts (positive, reasonable range)
    fn deposit_amount() -> impl Strategy<Value = Decimal> {
        (1u64..=1_000_000u64).prop_map(Decimal::from)
    }

    /// Strategy for service keys
    fn service_key() -> impl Strategy<Value = &'static str> {
        prop_oneof![Just("Foo"), Just("Bar"), Just("serviceHarrb")]
    }

    /// Strategy for depositor identities known to the funded fixture
    fn depositor() -> impl Strategy<Value = &'static str> {
        prop_oneof![Just("sender"), Just("sender2"), Just("sender3")]
    }

    proptest! {
        /// Invariant: conservation holds across arbitrary deposit sequences
        /// followed by full drains.
        #[test]
        fn fuzz_conservation_over_deposits_and_drains(
            ops in prop::collection::vec((depositor(), deposit_amount(), service_key()), 1..25),
        ) {
            let mut ledger = DepositLedger::new(addr("vault"), addr("admin")).unwrap();
            let mut token = MockToken::new();
            for who in ["sender", "sender2", "sender3"] {
                token.free_money(&addr(who), Decimal::from(100_000_000u64));
                token.approve(&addr(who), ledger.address(), Decimal::from(100_000_000u64)).unwrap();
            }

            let c = addr("provider");
            for (i, (who, amount, key)) in ops.iter().enumerate() {
                ledger.deposit(&mut token, &addr(who), *amount, &c, key, 1000 + i as i64).unwrap();
                prop_assert!(ledger.total_tracked() <= token.balance_of(ledger.address()));
            }

            for key in ["Foo", "Bar", "serviceHarrb"] {
                ledger.refund_all(&mut token, &c, key).unwrap();
            }
            prop_assert_eq!(ledger.total_tracked(), Decimal::ZERO);
            prop_assert_eq!(token.balance_of(ledger.address()), Decimal::ZERO);
        }

        /// Invariant: the depositor index tracks exactly the nonzero balances.
        #[test]
        fn fuzz_index_consistency(
            deposits in prop::collection::vec((depositor(), deposit_amount()), 1..15),
            withdraw_mask in prop::collection::vec(any::<bool>(), 15),
        ) {
            let mut ledger = DepositLedger::new(addr("vault"), addr("admin")).unwrap();
            let mut token = MockToken::new();
            for who in ["sender", "sender2", "sender3"] {
                token.free_money(&addr(who), Decimal::from(100_000_000u64));
                token.approve(&addr(who), ledger.address(), Decimal::from(100_000_000u64)).unwrap();
            }

            let c = addr("provider");
            for (i, (who, amount)) in deposits.iter().enumerate() {
                ledger.deposit(&mut token, &addr(who), *amount, &c, "Foo", 1000 + i as i64).unwrap();
                if withdraw_mask[i % withdraw_mask.len()] {
                    ledger.withdraw(&mut token, &addr(who), &c, "Foo", 1000 + i as i64).unwrap();
                }
            }

            let expected: usize = ["sender", "sender2", "sender3"]
                .iter()
                .filter(|who| ledger.balance(&addr(who), &c, "Foo") > Decimal::ZERO)
                .count();
            prop_assert_eq!(ledger.depositor_count(&c, "Foo"), expected);
        }

        /// Invariant: deposit then full withdraw round-trips every amount.
        #[test]
        fn fuzz_deposit_withdraw_round_trip(amount in deposit_amount()) {
            let mut ledger = DepositLedger::new(addr("vault"), addr("admin")).unwrap();
            let mut token = MockToken::new();
            token.free_money(&addr("sender"), amount);
            token.approve(&addr("sender"), ledger.address(), amount).unwrap();

            ledger.deposit(&mut token, &addr("sender"), amount, &Address::zero(), "Foo", 1000).unwrap();
            ledger.withdraw(&mut token, &addr("sender"), &Address::zero(), "Foo", 1001).unwrap();

            prop_assert_eq!(token.balance_of(&addr("sender")), amount);
            prop_assert_eq!(ledger.total_tracked(), Decimal::ZERO);
        }

        /// Invariant: a stamped release date never decreases across top-ups,
        /// whatever lock periods the counterparty configures in between.
        #[test]
        fn fuzz_release_date_monotonic(
            periods in prop::collection::vec(0i64..1_000_000, 1..10),
        ) {
            let mut ledger = DepositLedger::new(addr("vault"), addr("admin")).unwrap();
            let mut token = MockToken::new();
            token.free_money(&addr("sender"), Decimal::from(1_000_000u64));
            token.approve(&addr("sender"), ledger.address(), Decimal::from(1_000_000u64)).unwrap();

            let c = addr("provider");
            let mut last_stamp = 0;
            for (i, period) in periods.iter().enumerate() {
                ledger.set_lock_period(&c, "Foo", *period).unwrap();
                ledger.deposit(&mut token, &addr("sender"), dec(1), &c, "Foo", 1000 + i as i64).unwrap();
                let stamp = ledger.release_date(&addr("sender"), &c, "Foo");
                prop_assert!(stamp >= last_stamp, "stamp {} < previous {}", stamp, last_stamp);
                last_stamp = stamp;
            }
        }
    }
}

// ═══════════════════════════════════════════════════════════════════
// Helpers
// ═══════════════════════════════════════════════════════════════════

fn addr(s: &str) -> Address {
    Address::new(s)
}

fn dec(n: i64) -> Decimal {
    Decimal::from(n)
}

fn setup_ledger() -> (DepositLedger, MockToken) {
    let ledger = DepositLedger::new(addr("vault"), addr("admin")).unwrap();
    let mut token = MockToken::new();
    for who in ["sender", "sender2", "sender3"] {
        token.free_money(&addr(who), dec(10_000));
        token.approve(&addr(who), ledger.address(), dec(10_000)).unwrap();
    }
    (ledger, token)
}

fn assert_conservation(ledger: &DepositLedger, token: &MockToken) {
    assert!(
        ledger.total_tracked() <= token.balance_of(ledger.address()),
        "tracked {} exceeds custody {}",
        ledger.total_tracked(),
        token.balance_of(ledger.address())
    );
}

fn assert_index_consistent(ledger: &DepositLedger, c: &Address, key: &str, universe: &[&str]) {
    let with_balance: Vec<Address> = universe
        .iter()
        .map(|s| addr(s))
        .filter(|d| ledger.balance(d, c, key) > Decimal::ZERO)
        .collect();
    let mut listed = ledger.depositors(c, key);
    let mut expected = with_balance;
    listed.sort();
    expected.sort();
    assert_eq!(listed, expected);
}
