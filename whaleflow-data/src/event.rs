use derive_more::Display;
use serde::{Deserialize, Serialize};

/// Side of a derived whale order.
#[derive(
    Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Display, Deserialize, Serialize,
)]
#[serde(rename_all = "snake_case")]
pub enum OrderSide {
    #[display("long")]
    Long,
    #[display("short")]
    Short,
}

impl OrderSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderSide::Long => "long",
            OrderSide::Short => "short",
        }
    }
}

/// Order payload carried by [`RealtimeEvent::NewOrder`] and
/// [`RealtimeEvent::OrderFilled`] frames.
#[derive(Clone, PartialEq, PartialOrd, Debug, Deserialize, Serialize)]
pub struct OrderPayload {
    pub size: f64,
    #[serde(rename = "type")]
    pub side: OrderSide,
    pub price: f64,
    pub exchange: String,
}

/// Event pushed from the server to every connected subscriber, one JSON text
/// frame per event. Never persisted, at-most-once delivery per connection: a
/// reconnecting consumer treats the fresh [`InitialData`](Self::InitialData)
/// frame as its resynchronization point.
///
/// ### Wire Examples
/// ```json
/// {"type": "initial_data"}
/// {"type": "new_order", "order": {"size": 150.0, "type": "long", "price": 93000.0, "exchange": "binance"}}
/// {"type": "order_filled", "order": {"size": 150.0, "type": "long", "price": 93000.0, "exchange": "binance"}}
/// ```
#[derive(Clone, PartialEq, Debug, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RealtimeEvent {
    InitialData,
    NewOrder {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        order: Option<OrderPayload>,
    },
    OrderFilled {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        order: Option<OrderPayload>,
    },
}
