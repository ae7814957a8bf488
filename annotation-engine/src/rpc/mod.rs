//! JSON-RPC 2.0 bridge between a host process and the annotation engine.
//!
//! The host writes one JSON document per line to stdin and reads replies and
//! notifications from stdout, one per line.
//!
//! ```text
//! host                                   engine
//!   ├─ Request (with id) ──────────────────> │
//!   │                                        ├─ handle_rpc_request
//!   │ <──────────────── Response (with id) ──┤
//!   │ <───────── Notification (no id) ───────┤  engine events
//! ```
//!
//! ## Methods
//!
//! ### Entities
//! - `add_entity`: `{name, position, rotation?, dimension?, category?, active?, point_count?}`
//! - `select_entity`, `soft_delete`, `restore_entity`, `dispose_entity`: `{name}`
//! - `deselect`, `delete_active`
//! - `transform_active`: `{"op": "translate", "delta": [..]}`, `{"op": "rotate", "angle": ..}`,
//!   `{"op": "resize", "factor": [..]}`
//! - `get_entities`
//!
//! ### Views
//! - `set_draw_mode`: `{mode: none | click_to_place | drag_to_size}`
//! - `set_render_mode`: `{mode: continuous | on_demand}`
//! - `get_zoom`
//!
//! ## Notifications
//!
//! Every engine event is forwarded: `entity_added`, `entity_selected`, `entity_deselected`,
//! `entity_transformed`, `entity_soft_deleted`, `entity_ghosted`, `entity_restored`,
//! `entity_disposed`, `draw_mode_changed`, `point_cloud_swapped`, `frame_loaded`,
//! `frame_load_failed`.
//!
//! ## Error codes
//! - `-32700`: Parse error
//! - `-32601`: Method not found
//! - `-32602`: Invalid params
//! - `-32603`: Internal error
//! - `-32000`: Engine refused the operation

pub mod handlers;
pub mod web_rpc;

pub use handlers::{EntitySummary, handle_rpc_request};
pub use web_rpc::{RpcError, RpcNotification, RpcRequest, RpcResponse, WebRpcInterface, WebRpcPlugin};
