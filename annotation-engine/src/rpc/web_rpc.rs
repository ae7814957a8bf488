use super::handlers::handle_rpc_request;
use crate::app::Engine;
use crate::engine::AnnotationEngine;
use crate::engine::events::EngineEvent;
use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use std::io::{BufRead, Write};
use std::sync::{Arc, Mutex};

/// Host call. Without an id it is a notification and gets no reply.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct RpcRequest {
    pub jsonrpc: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
    pub id: Option<serde_json::Value>,
}

/// Reply to a request carrying an id. Exactly one of `result` and `error` is set.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct RpcResponse {
    pub jsonrpc: String,
    pub result: Option<serde_json::Value>,
    pub error: Option<RpcError>,
    pub id: Option<serde_json::Value>,
}

/// Engine-to-host message with no reply expected.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct RpcNotification {
    pub jsonrpc: String,
    pub method: String,
    pub params: serde_json::Value,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct RpcError {
    pub code: i32,
    pub message: String,
    pub data: Option<serde_json::Value>,
}

impl RpcError {
    pub fn parse_error(message: &str) -> Self {
        Self {
            code: -32700,
            message: message.to_string(),
            data: None,
        }
    }

    pub fn invalid_params(message: &str) -> Self {
        Self {
            code: -32602,
            message: message.to_string(),
            data: None,
        }
    }

    pub fn internal_error(message: &str) -> Self {
        Self {
            code: -32603,
            message: message.to_string(),
            data: None,
        }
    }

    /// Engine refused the operation. `data.entity` names the entity when there is one.
    pub fn engine(error: &crate::error::EngineError) -> Self {
        use crate::error::EngineError;
        let entity = match error {
            EngineError::UnknownEntity(name)
            | EngineError::DuplicateEntity(name)
            | EngineError::EntityHidden(name) => Some(serde_json::json!({ "entity": name })),
            _ => None,
        };
        Self {
            code: -32000,
            message: error.to_string(),
            data: entity,
        }
    }
}

/// Outgoing traffic queued by systems and flushed once per frame.
#[derive(Resource, Default)]
pub struct WebRpcInterface {
    outgoing_notifications: Vec<RpcNotification>,
    outgoing_responses: Vec<RpcResponse>,
}

impl WebRpcInterface {
    pub fn send_notification(&mut self, method: &str, params: serde_json::Value) {
        self.outgoing_notifications.push(RpcNotification {
            jsonrpc: "2.0".to_string(),
            method: method.to_string(),
            params,
        });
    }

    fn queue_response(&mut self, response: RpcResponse) {
        self.outgoing_responses.push(response);
    }

    /// Everything queued, notifications before responses.
    pub fn take_outgoing(&mut self) -> (Vec<RpcNotification>, Vec<RpcResponse>) {
        (
            std::mem::take(&mut self.outgoing_notifications),
            std::mem::take(&mut self.outgoing_responses),
        )
    }
}

/// Notification method and params for an engine event.
pub fn notification_for(event: &EngineEvent) -> (&'static str, serde_json::Value) {
    use serde_json::json;
    match event {
        EngineEvent::EntityAdded { name, pick_id } => {
            ("entity_added", json!({ "name": name, "pick_id": pick_id }))
        }
        EngineEvent::EntitySelected { name } => ("entity_selected", json!({ "name": name })),
        EngineEvent::EntityDeselected { name } => ("entity_deselected", json!({ "name": name })),
        EngineEvent::EntityTransformed {
            name,
            contained_points,
        } => (
            "entity_transformed",
            json!({ "name": name, "contained_points": contained_points }),
        ),
        EngineEvent::EntitySoftDeleted { name } => ("entity_soft_deleted", json!({ "name": name })),
        EngineEvent::EntityGhosted { name } => ("entity_ghosted", json!({ "name": name })),
        EngineEvent::EntityRestored { name } => ("entity_restored", json!({ "name": name })),
        EngineEvent::EntityDisposed { name } => ("entity_disposed", json!({ "name": name })),
        EngineEvent::DrawModeChanged { mode } => {
            ("draw_mode_changed", json!({ "mode": mode.as_str() }))
        }
        EngineEvent::PointCloudSwapped { points } => {
            ("point_cloud_swapped", json!({ "points": points }))
        }
        EngineEvent::FrameLoaded { index } => ("frame_loaded", json!({ "index": index })),
        EngineEvent::FrameLoadFailed { index, error } => (
            "frame_load_failed",
            json!({ "index": index, "error": error }),
        ),
    }
}

/// Collects engine events from a subscription until the next flush.
#[derive(Resource, Clone, Default)]
pub struct EventForwarder(Arc<Mutex<Vec<EngineEvent>>>);

impl EventForwarder {
    pub fn attach(engine: &mut AnnotationEngine) -> Self {
        let forwarder = Self::default();
        let sink = forwarder.0.clone();
        engine.subscribe(move |event| {
            if let Ok(mut queue) = sink.lock() {
                queue.push(event.clone());
            }
        });
        forwarder
    }

    pub fn drain(&self) -> Vec<EngineEvent> {
        self.0
            .lock()
            .map(|mut queue| std::mem::take(&mut *queue))
            .unwrap_or_default()
    }
}

/// Plugin routing JSON-RPC lines on stdin to the engine and writing replies to stdout.
pub struct WebRpcPlugin;

impl Plugin for WebRpcPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<WebRpcInterface>()
            .add_event::<IncomingRpcMessage>()
            .add_systems(Startup, (setup_message_listener, attach_event_forwarder))
            .add_systems(
                Update,
                (
                    process_incoming_messages,
                    handle_rpc_messages,
                    forward_engine_events,
                    send_outgoing_messages,
                )
                    .chain(),
            );
    }
}

/// Lines read off the transport thread, waiting for the next frame.
#[derive(Resource)]
struct MessageQueue(Arc<Mutex<Vec<String>>>);

#[derive(Event)]
struct IncomingRpcMessage {
    content: String,
}

fn setup_message_listener(mut commands: Commands) {
    let lines: Arc<Mutex<Vec<String>>> = Arc::default();
    let sink = lines.clone();

    let spawned = std::thread::Builder::new()
        .name("rpc-stdin".into())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                let Ok(line) = line else {
                    break;
                };
                if !line.contains("jsonrpc") {
                    continue;
                }
                if let Ok(mut queue) = sink.lock() {
                    queue.push(line);
                }
            }
        });
    if let Err(e) = spawned {
        error!("Failed to start RPC listener: {}", e);
        return;
    }
    commands.insert_resource(MessageQueue(lines));
}

fn attach_event_forwarder(mut commands: Commands, engine: Option<ResMut<Engine>>) {
    if let Some(mut engine) = engine {
        commands.insert_resource(EventForwarder::attach(&mut engine));
    }
}

fn process_incoming_messages(
    message_queue: Option<Res<MessageQueue>>,
    mut message_events: EventWriter<IncomingRpcMessage>,
) {
    let Some(queue_res) = message_queue else {
        return;
    };
    let messages = if let Ok(mut queue) = queue_res.0.lock() {
        std::mem::take(&mut *queue)
    } else {
        Vec::new()
    };
    for message_str in messages {
        message_events.write(IncomingRpcMessage {
            content: message_str,
        });
    }
}

fn handle_rpc_messages(
    mut events: EventReader<IncomingRpcMessage>,
    engine: Option<ResMut<Engine>>,
    mut rpc_interface: ResMut<WebRpcInterface>,
) {
    let Some(mut engine) = engine else {
        return;
    };
    for event in events.read() {
        if let Some(response) = handle_rpc_message(&event.content, &mut engine) {
            rpc_interface.queue_response(response);
        }
    }
}

/// Parse one raw message and dispatch it. Malformed JSON answers with a null id.
pub fn handle_rpc_message(content: &str, engine: &mut AnnotationEngine) -> Option<RpcResponse> {
    match serde_json::from_str::<RpcRequest>(content) {
        Ok(request) => {
            debug!("Processing RPC method: {}", request.method);
            handle_rpc_request(&request, engine)
        }
        Err(parse_error) => {
            warn!("RPC parse error: {}", parse_error);
            Some(RpcResponse {
                jsonrpc: "2.0".to_string(),
                result: None,
                error: Some(RpcError::parse_error(&parse_error.to_string())),
                id: Some(serde_json::Value::Null),
            })
        }
    }
}

fn forward_engine_events(
    forwarder: Option<Res<EventForwarder>>,
    mut rpc_interface: ResMut<WebRpcInterface>,
) {
    let Some(forwarder) = forwarder else {
        return;
    };
    for event in forwarder.drain() {
        let (method, params) = notification_for(&event);
        rpc_interface.send_notification(method, params);
    }
}

fn send_outgoing_messages(mut rpc_interface: ResMut<WebRpcInterface>) {
    let (notifications, responses) = rpc_interface.take_outgoing();
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    for notification in &notifications {
        send_message(&mut out, notification);
    }
    for response in &responses {
        send_message(&mut out, response);
    }
}

/// One JSON document per line.
fn send_message<T: Serialize>(out: &mut impl Write, message: &T) {
    match serde_json::to_string(message) {
        Ok(json) => {
            if let Err(e) = writeln!(out, "{}", json) {
                error!("Failed to write RPC message: {}", e);
            }
        }
        Err(e) => error!("Failed to serialize RPC message: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;

    #[test]
    fn malformed_json_is_a_parse_error() {
        let mut engine = AnnotationEngine::with_defaults(EngineConfig::default()).unwrap();
        let response = handle_rpc_message("{not json", &mut engine).unwrap();
        assert_eq!(response.error.unwrap().code, -32700);
        assert_eq!(response.id, Some(serde_json::Value::Null));
    }

    #[test]
    fn forwarded_events_become_notifications() {
        let mut engine = AnnotationEngine::with_defaults(EngineConfig::default()).unwrap();
        let forwarder = EventForwarder::attach(&mut engine);
        engine
            .add_entity(crate::engine::entity::BoxSpec::new("a", Vec3::ZERO, Vec3::ONE).activated())
            .unwrap();

        let methods: Vec<_> = forwarder
            .drain()
            .iter()
            .map(|e| notification_for(e).0)
            .collect();
        assert_eq!(methods, ["entity_added", "entity_selected"]);
        assert!(forwarder.drain().is_empty());
    }

    #[test]
    fn messages_go_out_one_per_line() {
        let mut buffer = Vec::new();
        send_message(&mut buffer, &RpcNotification {
            jsonrpc: "2.0".into(),
            method: "frame_loaded".into(),
            params: serde_json::json!({ "index": 3 }),
        });
        let text = String::from_utf8(buffer).unwrap();
        assert_eq!(text.lines().count(), 1);
        assert!(text.ends_with('\n'));
        assert!(text.contains("\"frame_loaded\""));
    }
}
