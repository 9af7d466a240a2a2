//! End-to-end ledger tests
//!
//! Exercises a full season of activity across polls and chests, then checks
//! the books: every balance must equal the starting balance plus the sum of
//! that user's transaction log.

#[cfg(test)]
mod tests {
    use crate::account::Accounts;
    use crate::chests::{ChestShop, WeightedSampler};
    use crate::polls::PollEngine;
    use crate::storage::testutil::temp_db;
    use crate::storage::Database;

    const STARTING: i64 = 1000;

    async fn balance_reconciles(db: &Database, accounts: &Accounts, user_id: i64) {
        let user = accounts.get_user(user_id).await.unwrap().unwrap();
        let logged: i64 = db.transaction_sum(user_id).await.unwrap();
        assert_eq!(
            user.balance,
            STARTING + logged,
            "user {user_id} balance diverged from transaction log"
        );
    }

    #[tokio::test]
    async fn full_betting_round_keeps_books_balanced() {
        let (db, _dir) = temp_db().await;
        let accounts = Accounts::new(db.clone());
        let polls = PollEngine::new(db.clone());

        for id in 1..=3 {
            accounts.ensure_user(id, Some(&format!("user{id}"))).await.unwrap();
        }

        let poll_id = polls
            .create_poll(1, "Who takes the derby?", &["Home".into(), "Away".into()])
            .await
            .unwrap();
        let detail = polls.poll_detail(poll_id).await.unwrap().unwrap();
        let home = detail.options[0].id;
        let away = detail.options[1].id;

        polls.place_bet(1, poll_id, home, 100).await.unwrap();
        polls.place_bet(2, poll_id, home, 50).await.unwrap();
        polls.place_bet(3, poll_id, away, 150).await.unwrap();

        let outcome = polls.resolve(1, poll_id, home).await.unwrap();
        assert_eq!(outcome.pool, 300);
        assert_eq!(outcome.win_total, 150);

        // Proportional payout: each winner gets stake * pool / win_total.
        let u1 = accounts.get_user(1).await.unwrap().unwrap();
        let u2 = accounts.get_user(2).await.unwrap().unwrap();
        let u3 = accounts.get_user(3).await.unwrap().unwrap();
        assert_eq!(u1.balance, STARTING - 100 + 200);
        assert_eq!(u2.balance, STARTING - 50 + 100);
        assert_eq!(u3.balance, STARTING - 150);
        assert_eq!(u1.wins, 1);
        assert_eq!(u2.wins, 1);
        assert_eq!(u3.losses, 1);

        for id in 1..=3 {
            balance_reconciles(&db, &accounts, id).await;
        }
    }

    #[tokio::test]
    async fn mixed_polls_and_chests_reconcile() {
        let (db, _dir) = temp_db().await;
        let accounts = Accounts::new(db.clone());
        let polls = PollEngine::new(db.clone());
        let chests =
            ChestShop::with_sampler(db.clone(), Box::new(WeightedSampler::seeded(42)));

        accounts.ensure_user(1, Some("alice")).await.unwrap();
        accounts.ensure_user(2, Some("bob")).await.unwrap();

        // A resolved poll where bob forfeits his stake.
        let poll_id = polls
            .create_poll(1, "Rain tomorrow?", &["Yes".into(), "No".into()])
            .await
            .unwrap();
        let detail = polls.poll_detail(poll_id).await.unwrap().unwrap();
        polls.place_bet(1, poll_id, detail.options[0].id, 200).await.unwrap();
        polls.place_bet(2, poll_id, detail.options[1].id, 300).await.unwrap();
        polls.resolve(1, poll_id, detail.options[0].id).await.unwrap();

        // Both open the cheapest chest a few times.
        let catalog = chests.list().await.unwrap();
        let small = catalog[0].id;
        for _ in 0..3 {
            chests.open(1, small).await.unwrap();
            chests.open(2, small).await.unwrap();
        }

        // An admin adjustment also lands in the log.
        accounts.add_balance(2, 250).await.unwrap();

        balance_reconciles(&db, &accounts, 1).await;
        balance_reconciles(&db, &accounts, 2).await;
    }

    #[tokio::test]
    async fn resolve_conserves_value_minus_rounding() {
        let (db, _dir) = temp_db().await;
        let accounts = Accounts::new(db.clone());
        let polls = PollEngine::new(db.clone());

        for id in 1..=4 {
            accounts.ensure_user(id, None).await.unwrap();
        }

        let poll_id = polls
            .create_poll(1, "Odd pool split", &["X".into(), "Y".into()])
            .await
            .unwrap();
        let detail = polls.poll_detail(poll_id).await.unwrap().unwrap();
        let x = detail.options[0].id;
        let y = detail.options[1].id;

        polls.place_bet(1, poll_id, x, 250).await.unwrap();
        polls.place_bet(2, poll_id, x, 150).await.unwrap();
        polls.place_bet(3, poll_id, y, 100).await.unwrap();
        polls.place_bet(4, poll_id, y, 170).await.unwrap();

        let outcome = polls.resolve(1, poll_id, x).await.unwrap();
        let paid: i64 = outcome.winners.iter().map(|w| w.payout).sum();

        // Floor division retains the remainder; payouts never exceed the pool.
        assert!(paid <= outcome.pool);
        assert!(outcome.pool - paid < outcome.winners.len() as i64);

        let total: i64 = {
            let mut sum = 0;
            for id in 1..=4 {
                sum += accounts.get_user(id).await.unwrap().unwrap().balance;
            }
            sum
        };
        // System-wide, value only leaks through the rounding remainder.
        assert_eq!(total, 4 * STARTING - (outcome.pool - paid));
    }
}
