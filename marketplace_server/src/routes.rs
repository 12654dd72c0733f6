//! Request handler definitions
//!
//! Define each route and its handler here. Handlers that are more than a line or two belong in a separate module.
//!
//! Handlers run on actix worker threads, each of which processes its requests sequentially. Anything slow (database
//! access, processor calls) must be awaited, never blocked on.
use actix_web::{get, web, HttpRequest, HttpResponse, Responder};
use bytes::Bytes;
use log::*;
use marketplace_engine::{order_objects::ProcessorEventOutcome, MarketplaceDatabase, PaymentApi, PaymentProcessor};
use stripe_tools::{verify_webhook_signature, StripeConfig, StripeEvent, WebhookError};

use crate::{data_objects::WebhookAck, errors::ServerError, integrations::stripe::processor_event_from};

pub const SIGNATURE_HEADER: &str = "Stripe-Signature";

// Web-actix cannot handle generics in handlers, so it's implemented manually using the `route!` macro
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+) => {
        paste::paste! { pub struct [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ >( $( core::marker::PhantomData<fn() -> [< T $bounds:camel> ] >,)+ );}
        paste::paste! { impl< $( [< T $bounds:camel> ],)+ > [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ > {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self($( core::marker::PhantomData::<fn() -> [< T $bounds:camel> ] >,)+)
            }
        }}
        paste::paste! { impl<$( [< T $bounds:camel >] , )+> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<$([<T $bounds:camel>],)+>
        where
            $([<T $bounds:camel>]: $bounds + 'static,)+
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::< $( [< T $bounds:camel >], )+>);
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };
}

#[get("/health")]
pub async fn health() -> impl Responder {
    HttpResponse::Ok().body("👍️\n")
}

route!(processor_webhook => Post "/webhook" impl MarketplaceDatabase, PaymentProcessor);
/// Receives signed card processor events.
///
/// A bad or missing signature is rejected with a 400. Every authentic event is acknowledged with a 200, including
/// those the engine chooses to ignore, so that the processor does not redeliver them. Storage failures surface as
/// errors, which lets the processor retry the delivery later.
pub async fn processor_webhook<B, P>(
    req: HttpRequest,
    body: Bytes,
    api: web::Data<PaymentApi<B, P>>,
    config: web::Data<StripeConfig>,
) -> Result<HttpResponse, ServerError>
where
    B: MarketplaceDatabase,
    P: PaymentProcessor,
{
    let signature = req
        .headers()
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or(ServerError::InvalidSignature(WebhookError::MalformedHeader))?;
    verify_webhook_signature(&body, signature, config.webhook_secret.reveal()).map_err(|e| {
        warn!("🛍️ Rejected processor webhook. {e}");
        ServerError::from(e)
    })?;
    let event = serde_json::from_slice::<StripeEvent>(&body)
        .map_err(|e| ServerError::CouldNotDeserializePayload(e.to_string()))?;
    info!("🛍️ Received processor event {} ({})", event.id, event.event_type);
    let processor_event = processor_event_from(&event)?;
    let response = match api.handle_processor_event(processor_event).await? {
        ProcessorEventOutcome::Updated(order) => {
            info!("🛍️ Order {} payment is now {}", order.id, order.payment_status);
            WebhookAck::handled(&event.id, format!("Order {} payment is {}", order.id, order.payment_status))
        },
        ProcessorEventOutcome::Ignored(reason) => WebhookAck::ignored(&event.id, format!("Event ignored. {reason}")),
    };
    Ok(HttpResponse::Ok().json(response))
}
