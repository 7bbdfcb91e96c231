use bevy::diagnostic::{DiagnosticsStore, FrameTimeDiagnosticsPlugin};
use bevy::prelude::*;
use serde::{Deserialize, Serialize};

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::JsValue;

#[cfg(target_arch = "wasm32")]
use web_sys::{MessageEvent, window};

use super::overlay::OverlayOutbox;
use crate::boundary::UiCommand;
use crate::engine::core::viewer::{ArViewerHandle, UiCommandQueue};

/// JSON-RPC 2.0 request structure.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct RpcRequest {
    pub jsonrpc: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
    pub id: Option<serde_json::Value>,
}

/// JSON-RPC 2.0 response structure.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct RpcResponse {
    pub jsonrpc: String,
    pub result: Option<serde_json::Value>,
    pub error: Option<RpcError>,
    pub id: Option<serde_json::Value>,
}

/// JSON-RPC 2.0 notification structure for one-way communication.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct RpcNotification {
    pub jsonrpc: String,
    pub method: String,
    pub params: serde_json::Value,
}

/// JSON-RPC 2.0 error object.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct RpcError {
    pub code: i32,
    pub message: String,
    pub data: Option<serde_json::Value>,
}

/// Outgoing notifications and responses waiting for the end of the frame.
#[derive(Resource, Default)]
pub struct WebRpcInterface {
    outgoing_notifications: Vec<RpcNotification>,
    outgoing_responses: Vec<RpcResponse>,
}

impl WebRpcInterface {
    fn queue_response(&mut self, response: RpcResponse) {
        self.outgoing_responses.push(response);
    }
}

/// Plugin establishing the postMessage bridge.
pub struct WebRpcPlugin;

impl Plugin for WebRpcPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<WebRpcInterface>()
            .init_resource::<OverlayOutbox>()
            .init_resource::<UiCommandQueue>()
            .add_event::<IncomingRpcMessage>()
            .add_systems(
                Update,
                (
                    process_incoming_messages,
                    handle_rpc_messages,
                    forward_overlay_notifications,
                    send_outgoing_messages,
                )
                    .chain(),
            );

        #[cfg(target_arch = "wasm32")]
        app.add_systems(Startup, setup_message_listener);
    }
}

#[cfg(target_arch = "wasm32")]
fn setup_message_listener(mut commands: Commands) {
    use std::sync::Arc;
    use std::sync::Mutex;

    let message_queue: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let queue_clone = message_queue.clone();

    let closure = Closure::wrap(Box::new(move |event: MessageEvent| {
        if let Ok(data) = event.data().dyn_into::<js_sys::JsString>() {
            let message_str: String = data.into();

            if message_str.contains("jsonrpc") {
                if let Ok(mut queue) = queue_clone.lock() {
                    queue.push(message_str);
                }
            }
        }
    }) as Box<dyn FnMut(MessageEvent)>);

    if let Some(window) = window() {
        window
            .add_event_listener_with_callback("message", closure.as_ref().unchecked_ref())
            .expect("Failed to register message listener");
    }

    // Ownership passes to JS so the listener outlives this system.
    closure.forget();
    commands.insert_resource(MessageQueue(message_queue));
}

#[derive(Resource)]
struct MessageQueue(std::sync::Arc<std::sync::Mutex<Vec<String>>>);

#[derive(Event)]
struct IncomingRpcMessage {
    content: String,
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
        message_events.write(IncomingRpcMessage { content: message_str });
    }
}

fn handle_rpc_messages(
    mut events: EventReader<IncomingRpcMessage>,
    diagnostics: Res<DiagnosticsStore>,
    viewer: NonSend<ArViewerHandle>,
    mut commands: ResMut<UiCommandQueue>,
    mut rpc_interface: ResMut<WebRpcInterface>,
) {
    for event in events.read() {
        match serde_json::from_str::<RpcRequest>(&event.content) {
            Ok(request) => {
                debug!("RPC {}", request.method);
                if let Some(response) = handle_rpc_request(&request, &diagnostics, &viewer, &mut commands) {
                    rpc_interface.queue_response(response);
                }
            }
            Err(parse_error) => {
                warn!("Unparseable RPC message: {}", parse_error);
            }
        }
    }
}

/// Handle one request; notifications (no id) get no response.
fn handle_rpc_request(
    request: &RpcRequest,
    diagnostics: &DiagnosticsStore,
    viewer: &ArViewerHandle,
    commands: &mut UiCommandQueue,
) -> Option<RpcResponse> {
    let result = match request.method.as_str() {
        "ui_command" => handle_ui_command(&request.params, commands),
        "get_session_state" => handle_get_session_state(viewer),
        "get_fps" => handle_get_fps(diagnostics),
        _ => {
            warn!("Unknown RPC method: {}", request.method);
            let id = request.id.clone()?;
            return Some(create_error_response(
                id,
                -32601,
                "Method not found",
                Some(serde_json::json!({"method": request.method})),
            ));
        }
    };

    let id = request.id.clone()?;
    match result {
        Ok(result_value) => Some(RpcResponse {
            jsonrpc: "2.0".to_string(),
            result: Some(result_value),
            error: None,
            id: Some(id),
        }),
        Err(error) => Some(RpcResponse {
            jsonrpc: "2.0".to_string(),
            result: None,
            error: Some(error),
            id: Some(id),
        }),
    }
}

/// Queue an overlay command; it is applied on the router's next tick.
fn handle_ui_command(params: &serde_json::Value, commands: &mut UiCommandQueue) -> Result<serde_json::Value, RpcError> {
    #[derive(serde::Deserialize)]
    struct UiCommandParams {
        command: String,
    }

    let parsed = serde_json::from_value::<UiCommandParams>(params.clone())
        .map_err(|_| RpcError::invalid_params("Expected 'command' parameter"))?;

    let command = UiCommand::from_string(&parsed.command)
        .ok_or_else(|| RpcError::invalid_params(&format!("Unknown command: {}", parsed.command)))?;

    commands.push(command);
    info!("UI command queued: {:?}", command);

    Ok(serde_json::json!({
        "success": true,
        "command": parsed.command
    }))
}

fn handle_get_session_state(viewer: &ArViewerHandle) -> Result<serde_json::Value, RpcError> {
    let Some(status) = viewer.status() else {
        return Ok(serde_json::json!({ "ready": false }));
    };
    serde_json::to_value(status)
        .map(|state| serde_json::json!({ "ready": true, "state": state }))
        .map_err(|err| RpcError::internal_error(&err.to_string()))
}

fn handle_get_fps(diagnostics: &DiagnosticsStore) -> Result<serde_json::Value, RpcError> {
    let fps = diagnostics
        .get(&FrameTimeDiagnosticsPlugin::FPS)
        .and_then(|fps_diagnostic| fps_diagnostic.smoothed())
        .unwrap_or(0.0) as f32;

    Ok(serde_json::json!({
        "fps": fps
    }))
}

fn create_error_response(
    id: serde_json::Value,
    code: i32,
    message: &str,
    data: Option<serde_json::Value>,
) -> RpcResponse {
    RpcResponse {
        jsonrpc: "2.0".to_string(),
        result: None,
        error: Some(RpcError {
            code,
            message: message.to_string(),
            data,
        }),
        id: Some(id),
    }
}

/// Move overlay and quiz notifications into the outgoing queue.
fn forward_overlay_notifications(outbox: Res<OverlayOutbox>, mut rpc_interface: ResMut<WebRpcInterface>) {
    rpc_interface.outgoing_notifications.extend(outbox.drain());
}

fn send_outgoing_messages(mut rpc_interface: ResMut<WebRpcInterface>) {
    for notification in rpc_interface.outgoing_notifications.drain(..) {
        send_message_to_parent(&notification);
    }

    for response in rpc_interface.outgoing_responses.drain(..) {
        send_message_to_parent(&response);
    }
}

/// Send serialized message to the parent window.
fn send_message_to_parent<T: Serialize>(message: &T) {
    #[cfg(target_arch = "wasm32")]
    {
        match serde_json::to_string(message) {
            Ok(json) => {
                if let Some(window) = window() {
                    if let Some(parent) = window.parent().ok().flatten() {
                        if let Err(e) = parent.post_message(&JsValue::from_str(&json), "*") {
                            error!("Failed to send message to parent: {:?}", e);
                        }
                    } else {
                        warn!("No parent window available for message transmission");
                    }
                } else {
                    error!("Window object not available");
                }
            }
            Err(e) => {
                error!("Failed to serialize message: {}", e);
            }
        }
    }

    #[cfg(not(target_arch = "wasm32"))]
    {
        if let Ok(json) = serde_json::to_string(message) {
            debug!("rpc -> {}", json);
        }
    }
}

impl RpcError {
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
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ui_command_is_queued() {
        let mut queue = UiCommandQueue::default();
        let result = handle_ui_command(&serde_json::json!({"command": "continue_to_quiz"}), &mut queue);
        assert!(result.is_ok());
        assert_eq!(queue.drain(), vec![UiCommand::ContinueToQuiz]);
    }

    #[test]
    fn unknown_command_is_invalid_params() {
        let mut queue = UiCommandQueue::default();
        let err = handle_ui_command(&serde_json::json!({"command": "fly"}), &mut queue).unwrap_err();
        assert_eq!(err.code, -32602);
        assert!(queue.drain().is_empty());
    }

    #[test]
    fn session_state_before_ready() {
        let viewer = ArViewerHandle::default();
        let state = handle_get_session_state(&viewer).unwrap();
        assert_eq!(state["ready"], false);
    }
}
