//! Domain entities and request payloads for the storefront API.

pub mod address;
pub mod order;
pub mod session;

pub use address::{AddressPayload, ShippingAddress};
pub use order::{CreateOrderRequest, NewOrder, NewOrderItem, Order, OrderItem};
pub use session::{CurrentUser, session_keys};
