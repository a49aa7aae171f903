//! Ledger/account consistency law
//!
//! For any sequence of settlements — including arbitrary replays — every
//! user's materialized balances must equal the aggregate of their ledger
//! entries, and each settled trade must contribute exactly two entries with
//! equal-and-opposite deltas.

use ledger_store::{LedgerStore, MemoryLedgerStore, SettlementLeg, SettlementPlan};
use proptest::prelude::*;
use rust_decimal::Decimal;
use std::collections::HashMap;
use types::ids::{Symbol, TradeId, UserId};
use types::messages::TradeFill;

const USERS: [&str; 3] = ["u1", "u2", "mm"];
const SYMBOLS: [&str; 3] = ["AAPL", "MSFT", "GOOG"];

#[derive(Debug, Clone)]
struct TradeCase {
    trade_no: u8,
    symbol_idx: usize,
    buyer_idx: usize,
    qty: u32,
    price: i64,
    replays: usize,
}

fn trade_case() -> impl Strategy<Value = TradeCase> {
    (0u8..=255, 0usize..SYMBOLS.len(), 0usize..USERS.len(), 1u32..=100, 1i64..=2000, 1usize..=3)
        .prop_map(|(trade_no, symbol_idx, buyer_idx, qty, price, replays)| TradeCase {
            trade_no,
            symbol_idx,
            buyer_idx,
            qty,
            price,
            replays,
        })
}

fn plan_from(case: &TradeCase) -> SettlementPlan {
    let buyer = UserId::new(USERS[case.buyer_idx]);
    let seller = UserId::new(USERS[(case.buyer_idx + 1) % USERS.len()]);
    let fill = TradeFill {
        trade_id: TradeId::from_string(format!("t-{}", case.trade_no)),
        symbol: Symbol::new(SYMBOLS[case.symbol_idx]),
        qty: case.qty,
        price: Decimal::from(case.price),
        buy_user: buyer.clone(),
        sell_user: seller.clone(),
    };
    let gross = fill.gross();
    SettlementPlan {
        buyer: SettlementLeg {
            user_id: buyer,
            delta_cash: -gross,
            delta_qty: i64::from(fill.qty),
        },
        seller: SettlementLeg {
            user_id: seller,
            delta_cash: gross,
            delta_qty: -i64::from(fill.qty),
        },
        trade: fill,
    }
}

proptest! {
    #[test]
    fn ledger_aggregate_equals_account_state(cases in proptest::collection::vec(trade_case(), 1..20)) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .build()
            .expect("runtime");
        runtime.block_on(async {
            let store = MemoryLedgerStore::new();

            for case in &cases {
                let plan = plan_from(case);
                for _ in 0..case.replays {
                    store.apply_settlement(&plan).await.expect("apply");
                }
            }

            for user in USERS {
                let user = UserId::new(user);
                let entries = store.entries_for(&user);

                let cash_sum: Decimal = entries.iter().map(|e| e.delta_cash).sum();
                prop_assert_eq!(store.cash_balance(&user).await.expect("cash"), cash_sum);

                let mut qty_sums: HashMap<Symbol, i64> = HashMap::new();
                for entry in &entries {
                    *qty_sums.entry(entry.symbol.clone()).or_insert(0) += entry.delta_qty;
                }
                for symbol in SYMBOLS {
                    let symbol = Symbol::new(symbol);
                    let expected = qty_sums.get(&symbol).copied().unwrap_or(0);
                    prop_assert_eq!(
                        store.position(&user, &symbol).await.expect("position"),
                        expected
                    );
                }
            }
            Ok(())
        })?;
    }

    #[test]
    fn every_settled_trade_has_two_opposing_entries(case in trade_case()) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .build()
            .expect("runtime");
        runtime.block_on(async {
            let store = MemoryLedgerStore::new();
            let plan = plan_from(&case);
            for _ in 0..case.replays {
                store.apply_settlement(&plan).await.expect("apply");
            }

            let buyer_entries = store.entries_for(&plan.buyer.user_id);
            let seller_entries = store.entries_for(&plan.seller.user_id);
            prop_assert_eq!(buyer_entries.len(), 1);
            prop_assert_eq!(seller_entries.len(), 1);

            let buyer = &buyer_entries[0];
            let seller = &seller_entries[0];
            prop_assert_eq!(buyer.delta_cash, -seller.delta_cash);
            prop_assert_eq!(buyer.delta_qty, -seller.delta_qty);
            prop_assert_eq!(buyer.delta_cash.abs(), plan.trade.gross());
            Ok(())
        })?;
    }
}
