use std::{future::Future, pin::Pin, sync::Arc};

use crate::events::{EventHandler, EventProducer, Handler, InvoiceCreatedEvent, InvoiceVoidedEvent};

#[derive(Default, Clone)]
pub struct EventProducers {
    pub invoice_created_producer: Vec<EventProducer<InvoiceCreatedEvent>>,
    pub invoice_voided_producer: Vec<EventProducer<InvoiceVoidedEvent>>,
}

pub struct EventHandlers {
    pub on_invoice_created: Option<EventHandler<InvoiceCreatedEvent>>,
    pub on_invoice_voided: Option<EventHandler<InvoiceVoidedEvent>>,
}

impl EventHandlers {
    pub fn new(buffer_size: usize, hooks: EventHooks) -> Self {
        let on_invoice_created = hooks.on_invoice_created.map(|f| EventHandler::new(buffer_size, f));
        let on_invoice_voided = hooks.on_invoice_voided.map(|f| EventHandler::new(buffer_size, f));
        Self { on_invoice_created, on_invoice_voided }
    }

    pub fn producers(&self) -> EventProducers {
        let mut result = EventProducers::default();
        if let Some(handler) = &self.on_invoice_created {
            result.invoice_created_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_invoice_voided {
            result.invoice_voided_producer.push(handler.subscribe());
        }
        result
    }

    pub async fn start_handlers(self) {
        if let Some(handler) = self.on_invoice_created {
            tokio::spawn(async move {
                handler.start_handler().await;
            });
        }
        if let Some(handler) = self.on_invoice_voided {
            tokio::spawn(async move {
                handler.start_handler().await;
            });
        }
    }
}

#[derive(Default, Clone)]
pub struct EventHooks {
    pub on_invoice_created: Option<Handler<InvoiceCreatedEvent>>,
    pub on_invoice_voided: Option<Handler<InvoiceVoidedEvent>>,
}

impl EventHooks {
    pub fn on_invoice_created<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(InvoiceCreatedEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_invoice_created = Some(Arc::new(f));
        self
    }

    pub fn on_invoice_voided<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(InvoiceVoidedEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_invoice_voided = Some(Arc::new(f));
        self
    }
}
