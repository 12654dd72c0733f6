use std::{future::Future, pin::Pin, sync::Arc};

use crate::events::{
    EarningsReleasedEvent,
    EventHandler,
    EventProducer,
    Handler,
    OrderAnnulledEvent,
    OrderCreatedEvent,
    OrderPaidEvent,
    OrderRefundedEvent,
};

/// Declares the producer, handler and hook plumbing for every engine event in one place.
macro_rules! event_hooks {
    ($($hook:ident, $handler:ident, $producer:ident: $event:ty;)+) => {
        #[derive(Default, Clone)]
        pub struct EventProducers {
            $(pub $producer: Vec<EventProducer<$event>>,)+
        }

        pub struct EventHandlers {
            $(pub $handler: Option<EventHandler<$event>>,)+
        }

        impl EventHandlers {
            pub fn new(buffer_size: usize, hooks: EventHooks) -> Self {
                Self { $($handler: hooks.$hook.map(|f| EventHandler::new(buffer_size, f)),)+ }
            }

            pub fn producers(&self) -> EventProducers {
                let mut result = EventProducers::default();
                $(
                    if let Some(handler) = &self.$handler {
                        result.$producer.push(handler.subscribe());
                    }
                )+
                result
            }

            pub async fn start_handlers(self) {
                $(
                    if let Some(handler) = self.$handler {
                        tokio::spawn(async move {
                            handler.start_handler().await;
                        });
                    }
                )+
            }
        }

        #[derive(Default, Clone)]
        pub struct EventHooks {
            $(pub $hook: Option<Handler<$event>>,)+
        }

        impl EventHooks {
            $(
                pub fn $hook<F>(&mut self, f: F) -> &mut Self
                where F: (Fn($event) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
                    self.$hook = Some(Arc::new(f));
                    self
                }
            )+
        }
    };
}

event_hooks! {
    on_order_created, on_order_created_handler, order_created_producer: OrderCreatedEvent;
    on_order_paid, on_order_paid_handler, order_paid_producer: OrderPaidEvent;
    on_order_annulled, on_order_annulled_handler, order_annulled_producer: OrderAnnulledEvent;
    on_earnings_released, on_earnings_released_handler, earnings_released_producer: EarningsReleasedEvent;
    on_order_refunded, on_order_refunded_handler, order_refunded_producer: OrderRefundedEvent;
}

impl EventProducers {
    pub fn is_empty(&self) -> bool {
        self.order_created_producer.is_empty()
            && self.order_paid_producer.is_empty()
            && self.order_annulled_producer.is_empty()
            && self.earnings_released_producer.is_empty()
            && self.order_refunded_producer.is_empty()
    }
}
