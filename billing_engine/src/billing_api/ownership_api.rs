use std::collections::HashMap;

use log::{debug, warn};

use crate::{
    billing_api::invoice_objects::{BillableOwner, OwnerTickets, OwnershipGraph, ResolvedTicket},
    db_types::{Registration, RegistrationId, RegistrationType, ResolutionGap, TicketOwnerType, TicketStatus},
    traits::{BillingDatabase, BillingGatewayError},
};

/// `OwnershipApi` assembles the billable ownership graph for a registration.
///
/// Read-only. Unit prices come from the ticket catalog; the price cached on a ticket row is never trusted. Tickets
/// whose owner reference does not resolve are attributed to the registration and the gap is recorded, never dropped.
#[derive(Debug, Clone)]
pub struct OwnershipApi<B> {
    db: B,
}

impl<B> OwnershipApi<B> {
    pub fn new(db: B) -> Self {
        Self { db }
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}

impl<B> OwnershipApi<B>
where B: BillingDatabase
{
    pub async fn resolve(&self, registration_id: &RegistrationId) -> Result<OwnershipGraph, BillingGatewayError> {
        let registration = self
            .db
            .fetch_registration(registration_id)
            .await?
            .ok_or_else(|| BillingGatewayError::RegistrationNotFound(registration_id.clone()))?;
        let attendees = self.db.fetch_attendees(registration_id).await?;
        let tickets = self.db.fetch_tickets(registration_id).await?;

        let mut catalog_ids: Vec<String> = tickets.iter().map(|t| t.event_ticket_id.clone()).collect();
        catalog_ids.sort();
        catalog_ids.dedup();
        let catalog: HashMap<String, _> =
            self.db.fetch_event_tickets(&catalog_ids).await?.into_iter().map(|et| (et.id.clone(), et)).collect();

        let attendee_index: HashMap<&str, usize> =
            attendees.iter().enumerate().map(|(i, a)| (a.id.as_str(), i)).collect();
        // One bucket per attendee (in id order), plus a trailing bucket for registration-level tickets.
        let mut attendee_buckets: Vec<OwnerTickets> = attendees
            .iter()
            .map(|a| OwnerTickets {
                owner: BillableOwner::Attendee { id: a.id.clone(), name: a.full_name() },
                tickets: Vec::new(),
            })
            .collect();
        let mut registration_bucket: Vec<ResolvedTicket> = Vec::new();
        let mut gaps: Vec<ResolutionGap> = Vec::new();

        for ticket in &tickets {
            let (unit_price, description) = match catalog.get(&ticket.event_ticket_id) {
                Some(entry) => (entry.price, entry.name.clone()),
                None => {
                    warn!(
                        "🧩️ Ticket {} references catalog item '{}' which does not exist. Falling back to the \
                         cached price.",
                        ticket.id, ticket.event_ticket_id
                    );
                    gaps.push(ResolutionGap {
                        ticket_id: ticket.id,
                        owner_type: ticket.owner_type,
                        owner_id: ticket.owner_id.clone(),
                        detail: format!("Catalog item '{}' not found; cached price used", ticket.event_ticket_id),
                    });
                    (ticket.cached_price, ticket.event_ticket_id.clone())
                },
            };
            let resolved = ResolvedTicket {
                ticket_id: ticket.id,
                event_ticket_id: ticket.event_ticket_id.clone(),
                description,
                unit_price,
                quantity: ticket.quantity,
                billable: ticket.status == TicketStatus::Active && ticket.quantity > 0,
            };
            match ticket.owner_type {
                TicketOwnerType::Attendee => {
                    let owner = ticket.owner_id.as_deref().and_then(|id| attendee_index.get(id));
                    match owner {
                        Some(&idx) => attendee_buckets[idx].tickets.push(resolved),
                        None => {
                            warn!(
                                "🧩️ Ticket {} names attendee {:?} who is not on registration [{}]. Billing it to \
                                 the registration.",
                                ticket.id, ticket.owner_id, registration_id
                            );
                            gaps.push(ResolutionGap {
                                ticket_id: ticket.id,
                                owner_type: ticket.owner_type,
                                owner_id: ticket.owner_id.clone(),
                                detail: "Owner reference did not resolve; attributed to the registration".to_string(),
                            });
                            registration_bucket.push(resolved);
                        },
                    }
                },
                TicketOwnerType::Lodge | TicketOwnerType::Registration => registration_bucket.push(resolved),
            }
        }

        let mut owners: Vec<OwnerTickets> =
            attendee_buckets.into_iter().filter(|b| !b.tickets.is_empty()).collect();
        if !registration_bucket.is_empty() {
            owners.push(OwnerTickets {
                owner: BillableOwner::Registration { label: registration_label(&registration) },
                tickets: registration_bucket,
            });
        }
        debug!(
            "🧩️ Ownership graph for registration [{registration_id}]: {} owner(s), {} ticket(s), {} gap(s)",
            owners.len(),
            tickets.len(),
            gaps.len()
        );
        Ok(OwnershipGraph { registration_id: registration_id.clone(), owners, gaps })
    }
}

fn registration_label(registration: &Registration) -> String {
    match registration.reg_type {
        RegistrationType::Individual => "Additional tickets".to_string(),
        RegistrationType::Lodge | RegistrationType::Delegation => {
            format!("{} {}", registration.reg_type, registration.confirmation_number)
        },
    }
}
