//! WebSocket Real-Time Notifications
//!
//! ## Architecture
//!
//! - **ConnectionHub**: active connections and their topic subscriptions
//! - **Handler**: WebSocket upgrade and per-connection message loop
//! - **Forwarder**: pushes notifications from the store change feed to the hub
//! - **Messages**: client and server frame formats
//!
//! ## Topics
//!
//! - `notifications.{uid}` - notifications of one user: `notification`
//!   when created, `notification_read` when marked read
//! - `system` - system events
//!
//! Topics are exact; wildcard subscriptions are refused.
//!
//! ## Example
//!
//! ```javascript
//! const ws = new WebSocket('ws://localhost:8090/api/v1/ws');
//!
//! ws.onopen = () => {
//!   ws.send(JSON.stringify({type: 'subscribe', topics: ['notifications.' + uid]}));
//! };
//!
//! ws.onmessage = (event) => {
//!   const msg = JSON.parse(event.data);
//!   if (msg.type === 'notification') showToast(msg.notification.title);
//! };
//! ```

mod forwarder;
mod handler;
mod hub;
mod messages;

pub use forwarder::spawn_notification_forwarder;
pub use handler::websocket_handler;
pub use hub::{ConnectionHub, HubConfig, HubError};
pub use messages::{notification_topic, ClientMessage, ServerMessage, WsEvent};
