use std::{future::Future, pin::Pin, sync::Arc};

use crate::events::{EventHandler, EventProducer, Handler, PaymentStatusChangedEvent};

#[derive(Default, Clone)]
pub struct EventProducers {
    pub status_changed_producer: Vec<EventProducer<PaymentStatusChangedEvent>>,
}

pub struct EventHandlers {
    pub on_status_changed: Option<EventHandler<PaymentStatusChangedEvent>>,
}

impl EventHandlers {
    pub fn new(buffer_size: usize, hooks: EventHooks) -> Self {
        let on_status_changed = hooks.on_status_changed.map(|f| EventHandler::new(buffer_size, f));
        Self { on_status_changed }
    }

    pub fn producers(&self) -> EventProducers {
        let mut result = EventProducers::default();
        if let Some(handler) = &self.on_status_changed {
            result.status_changed_producer.push(handler.subscribe());
        }
        result
    }

    pub async fn start_handlers(self) {
        if let Some(handler) = self.on_status_changed {
            tokio::spawn(async move {
                handler.start_handler().await;
            });
        }
    }
}

#[derive(Default, Clone)]
pub struct EventHooks {
    pub on_status_changed: Option<Handler<PaymentStatusChangedEvent>>,
}

impl EventHooks {
    pub fn on_status_changed<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(PaymentStatusChangedEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_status_changed = Some(Arc::new(f));
        self
    }
}
