//! Domain types shared by the store, router and projector.

pub mod notification;
pub mod ticket;

pub use notification::{Notification, NotificationId, NotificationPayload};
pub use ticket::{TicketSnapshot, TicketUpdateEvent};
