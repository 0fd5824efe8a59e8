//! Turns an ownership graph and a payment into a priced invoice document.
//!
//! Pure functions over their inputs. Grouping rule: one top-level line item per owner, one sub-item per distinct
//! (catalog item, unit price) pair with quantities aggregated. The processing fee comes from the provider's declared
//! fee schedule, and tax is inclusive: it is carried in the total and displayed, never added on top.
use std::collections::BTreeMap;

use rbg_common::Cents;

use crate::{
    billing_api::invoice_objects::{FeeConfig, InvoicePreview, OwnershipGraph},
    db_types::{OwnerLineItem, Payment, TicketLineItem},
};

pub fn assemble(graph: &OwnershipGraph, payment: &Payment, fees: &FeeConfig) -> InvoicePreview {
    let mut line_items: Vec<OwnerLineItem> = Vec::with_capacity(graph.owners.len());
    for owner in &graph.owners {
        // Aggregate quantity per (catalog item, unit price). The BTreeMap keeps sub-item order stable.
        let mut groups: BTreeMap<(String, i64), TicketLineItem> = BTreeMap::new();
        for ticket in owner.tickets.iter().filter(|t| t.billable) {
            let key = (ticket.event_ticket_id.clone(), ticket.unit_price.value());
            let entry = groups.entry(key).or_insert_with(|| TicketLineItem {
                event_ticket_id: ticket.event_ticket_id.clone(),
                description: ticket.description.clone(),
                quantity: 0,
                unit_price: ticket.unit_price,
                amount: Cents::default(),
            });
            entry.quantity += ticket.quantity;
            entry.amount += ticket.unit_price * ticket.quantity;
        }
        if groups.is_empty() {
            continue;
        }
        let sub_items: Vec<TicketLineItem> = groups.into_values().collect();
        let total: Cents = sub_items.iter().map(|i| i.amount).sum();
        line_items.push(OwnerLineItem { description: owner.owner.description().to_string(), sub_items, total });
    }

    let subtotal: Cents = line_items.iter().map(|item| item.total).sum();
    let schedule = fees.schedule_for(payment);
    let processing_fee = schedule.fee_on(subtotal);
    let total = subtotal + processing_fee;
    let tax_included = total.apply_basis_points(fees.tax_rate_basis_points);

    InvoicePreview {
        line_items,
        resolution_gaps: graph.gaps.clone(),
        subtotal,
        processing_fee,
        tax_included,
        total,
    }
}

#[cfg(test)]
mod test {
    use chrono::Utc;

    use super::*;
    use crate::{
        billing_api::invoice_objects::{BillableOwner, FeeSchedule, OwnerTickets, ResolvedTicket},
        db_types::{PaymentId, PaymentStatus, Provider, RegistrationId},
    };

    fn payment(provider: Provider, transaction_id: &str) -> Payment {
        Payment {
            id: PaymentId("pay-1".to_string()),
            provider,
            amount: Cents::from(20_470),
            currency: "AUD".to_string(),
            status: PaymentStatus::Settled,
            transaction_id: transaction_id.to_string(),
            intent_id: None,
            linked_registration_id: None,
            customer_email: None,
            settled_at: Utc::now(),
            invoice_created: false,
            invoice_id: None,
            customer_invoice_number: None,
            supplier_invoice_number: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn ticket(id: i64, catalog_id: &str, price: i64, qty: i64, billable: bool) -> ResolvedTicket {
        ResolvedTicket {
            ticket_id: id,
            event_ticket_id: catalog_id.to_string(),
            description: format!("{catalog_id} ticket"),
            unit_price: Cents::from(price),
            quantity: qty,
            billable,
        }
    }

    fn attendee_owner(name: &str, tickets: Vec<ResolvedTicket>) -> OwnerTickets {
        OwnerTickets {
            owner: BillableOwner::Attendee { id: name.to_lowercase(), name: name.to_string() },
            tickets,
        }
    }

    fn graph(owners: Vec<OwnerTickets>) -> OwnershipGraph {
        OwnershipGraph { registration_id: RegistrationId::from("reg-1"), owners, gaps: Vec::new() }
    }

    #[test]
    fn two_attendees_at_catalog_price_with_stripe_fees() {
        // Catalog says $100 each, regardless of any stale cached price on the ticket rows.
        let graph = graph(vec![
            attendee_owner("Alice Example", vec![ticket(1, "gala-dinner", 10_000, 1, true)]),
            attendee_owner("Bob Example", vec![ticket(2, "gala-dinner", 10_000, 1, true)]),
        ]);
        let preview = assemble(&graph, &payment(Provider::Stripe, "pi_TEST1"), &FeeConfig::default());
        assert_eq!(preview.subtotal, Cents::from(20_000));
        // 2.2% + $0.30
        assert_eq!(preview.processing_fee, Cents::from(470));
        assert_eq!(preview.total, Cents::from(20_470));
        // 10% of the fee-inclusive total, displayed only.
        assert_eq!(preview.tax_included, Cents::from(2_047));
    }

    #[test]
    fn sub_items_aggregate_by_catalog_item_and_price() {
        let graph = graph(vec![attendee_owner("Alice Example", vec![
            ticket(1, "banquet", 5_000, 2, true),
            ticket(2, "banquet", 5_000, 1, true),
            // same catalog item at a different unit price stays a separate sub-item
            ticket(3, "banquet", 4_000, 1, true),
            ticket(4, "ceremony", 2_500, 1, true),
        ])]);
        let preview = assemble(&graph, &payment(Provider::Stripe, "pi_X"), &FeeConfig::default());
        let owner = &preview.line_items[0];
        assert_eq!(owner.sub_items.len(), 3);
        let banquet_full =
            owner.sub_items.iter().find(|i| i.event_ticket_id == "banquet" && i.unit_price == Cents::from(5_000));
        assert_eq!(banquet_full.unwrap().quantity, 3);
        assert_eq!(preview.subtotal, Cents::from(21_500));
    }

    #[test]
    fn totals_conserve_across_levels() {
        let graph = graph(vec![
            attendee_owner("A", vec![ticket(1, "x", 1_234, 3, true), ticket(2, "y", 999, 1, true)]),
            attendee_owner("B", vec![ticket(3, "x", 1_234, 1, true)]),
        ]);
        let preview = assemble(&graph, &payment(Provider::Square, "SQPAYMENT123456789"), &FeeConfig::default());
        for owner in &preview.line_items {
            let sub_total: Cents = owner.sub_items.iter().map(|i| i.amount).sum();
            assert_eq!(sub_total, owner.total);
        }
        let owners_total: Cents = preview.line_items.iter().map(|o| o.total).sum();
        assert_eq!(owners_total, preview.subtotal);
        assert_eq!(preview.subtotal, graph.billable_total());
    }

    #[test]
    fn cancelled_tickets_are_excluded_from_billing() {
        let graph = graph(vec![attendee_owner("A", vec![
            ticket(1, "x", 10_000, 1, true),
            ticket(2, "x", 10_000, 1, false),
        ])]);
        let preview = assemble(&graph, &payment(Provider::Stripe, "pi_Y"), &FeeConfig::default());
        assert_eq!(preview.subtotal, Cents::from(10_000));
        // An owner with only cancelled tickets contributes no line item at all.
        let graph = self::graph(vec![attendee_owner("B", vec![ticket(3, "x", 10_000, 2, false)])]);
        let preview = assemble(&graph, &payment(Provider::Stripe, "pi_Z"), &FeeConfig::default());
        assert!(preview.line_items.is_empty());
        assert_eq!(preview.subtotal, Cents::from(0));
    }

    #[test]
    fn fee_schedule_follows_the_identifier_pattern() {
        let fees = FeeConfig::default();
        let g = graph(vec![attendee_owner("A", vec![ticket(1, "x", 10_000, 1, true)])]);

        let stripe = assemble(&g, &payment(Provider::Unknown, "pi_FROM_PATTERN"), &fees);
        assert_eq!(stripe.processing_fee, Cents::from(250));

        let square = assemble(&g, &payment(Provider::Unknown, "F0ZZBARQUUX12345678"), &fees);
        assert_eq!(square.processing_fee, Cents::from(320));

        // Nothing matches the patterns and the provider tag is unknown: the default schedule applies.
        let fallback = assemble(&g, &payment(Provider::Unknown, "odd-id"), &fees);
        assert_eq!(fallback.processing_fee, Cents::from(280));
    }

    #[test]
    fn custom_fee_config_is_honoured() {
        let mut fees = FeeConfig::default();
        fees.default_schedule = FeeSchedule::new(0, Cents::from(0));
        fees.rules.clear();
        fees.tax_rate_basis_points = 0;
        let g = graph(vec![attendee_owner("A", vec![ticket(1, "x", 9_999, 1, true)])]);
        let preview = assemble(&g, &payment(Provider::Stripe, "pi_A"), &fees);
        assert_eq!(preview.processing_fee, Cents::from(0));
        assert_eq!(preview.total, preview.subtotal);
        assert_eq!(preview.tax_included, Cents::from(0));
    }
}
