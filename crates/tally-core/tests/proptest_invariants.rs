use proptest::prelude::*;
use rust_decimal::Decimal;
use tally_core::db::{self, query};
use tally_core::engine::ChangeOrderEngine;
use tally_core::model::{
    ChangeOrder, ChangeOrderId, ChangeOrderStatus, NewProject, NewTicket, TicketId,
};
use tally_core::store::TicketStore;

#[derive(Debug, Clone)]
enum Op {
    Add(Vec<usize>),
    Remove(usize),
    Submit,
    Approve,
    Reject,
}

fn arb_op(pool: usize) -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => prop::collection::vec(0..pool, 1..4).prop_map(Op::Add),
        3 => (0..pool).prop_map(Op::Remove),
        1 => Just(Op::Submit),
        1 => Just(Op::Approve),
        1 => Just(Op::Reject),
    ]
}

/// Ticket amounts in cents so totals carry two decimal places.
fn arb_amounts() -> impl Strategy<Value = Vec<i64>> {
    prop::collection::vec(0_i64..250_000, 1..8)
}

fn apply(engine: &ChangeOrderEngine<'_>, co: ChangeOrderId, tickets: &[TicketId], op: &Op) {
    // Refusals are expected; only the stored state is checked.
    let _ = match op {
        Op::Add(picks) => {
            let ids: Vec<TicketId> = picks.iter().map(|&i| tickets[i]).collect();
            engine.add_tickets_to_change_order(co, &ids).map(|_| ())
        }
        Op::Remove(pick) => engine
            .remove_ticket_from_change_order(tickets[*pick], co)
            .map(|_| ()),
        Op::Submit => engine.submit_change_order(co).map(|_| ()),
        Op::Approve => engine.approve_change_order(co, "Owner").map(|_| ()),
        Op::Reject => engine.reject_change_order(co, "Owner").map(|_| ()),
    };
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn amounts_and_status_stay_consistent(
        amounts in arb_amounts(),
        ops in prop::collection::vec(arb_op(8), 1..24),
    ) {
        let conn = db::open_in_memory().expect("db");
        let store = TicketStore::new(&conn);
        let project = store
            .create_project(&NewProject {
                code: "P1".to_string(),
                name: "Clinic".to_string(),
                budget: Decimal::ZERO,
            })
            .expect("project")
            .id;
        let tickets: Vec<TicketId> = (0..8)
            .map(|i| {
                let cents = amounts[i % amounts.len()];
                store
                    .create_ticket(&NewTicket {
                        project_id: Some(project),
                        labor_total: Decimal::new(cents, 2),
                        ..NewTicket::default()
                    })
                    .expect("ticket")
                    .id
            })
            .collect();

        let engine = ChangeOrderEngine::new(&conn);
        let co = engine.create_change_order("Prop", Some(project), None).expect("co").id;
        let mut locked: Option<Decimal> = None;
        let mut previous: Option<ChangeOrder> = None;

        for op in &ops {
            apply(&engine, co, &tickets, op);

            let stored = query::get_change_order(&conn, co).expect("read").expect("exists");
            let (linked_total, _) = query::linked_ticket_totals(&conn, co).expect("totals");

            prop_assert_eq!(stored.current_amount, linked_total);

            if stored.status == ChangeOrderStatus::Draft {
                prop_assert_eq!(stored.original_amount, Decimal::ZERO);
                prop_assert!(locked.is_none(), "returned to draft after submit");
            } else {
                let original = *locked.get_or_insert(stored.original_amount);
                prop_assert_eq!(stored.original_amount, original);
                prop_assert!(stored.submitted_at.is_some());
            }

            if let Some(prev) = &previous {
                if prev.status.is_terminal() {
                    prop_assert_eq!(&stored, prev);
                }
                prop_assert!(stored.version >= prev.version);
            }
            previous = Some(stored);
        }
    }
}
