/// Engine-facing JSON-RPC methods
use super::web_rpc::{RpcError, RpcRequest, RpcResponse};
use crate::camera::sync::RenderMode;
use crate::engine::AnnotationEngine;
use crate::engine::entity::{BoxEntity, BoxSpec, quat_to_euler};
use crate::tools::draw::DrawMode;
use crate::tools::manipulation::TransformOp;
use bevy::log::{info, warn};
use bevy::math::Vec3;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// Wire view of one entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntitySummary {
    pub name: String,
    pub pick_id: u32,
    pub category: String,
    pub label: String,
    pub position: [f32; 3],
    pub rotation: [f32; 3],
    pub dimension: [f32; 3],
    pub contained_points: usize,
    pub active: bool,
    pub hidden: bool,
    pub ghosted: bool,
}

impl From<&BoxEntity> for EntitySummary {
    fn from(entity: &BoxEntity) -> Self {
        Self {
            name: entity.name.clone(),
            pick_id: entity.pick_id,
            category: entity.category.clone(),
            label: entity.label.clone(),
            position: entity.transform.translation.to_array(),
            rotation: quat_to_euler(entity.transform.rotation).to_array(),
            dimension: entity.dimension().to_array(),
            contained_points: entity.contained_points,
            active: entity.active,
            hidden: entity.hidden,
            ghosted: entity.ghosted,
        }
    }
}

/// Dispatch one request. Notifications (no id) are applied but get no response.
pub fn handle_rpc_request(request: &RpcRequest, engine: &mut AnnotationEngine) -> Option<RpcResponse> {
    let result = match request.method.as_str() {
        "add_entity" => handle_add_entity(&request.params, engine),
        "select_entity" => handle_select_entity(&request.params, engine),
        "deselect" => Ok(json!({ "deselected": engine.deselect() })),
        "delete_active" => Ok(json!({ "deleted": engine.soft_delete_active() })),
        "soft_delete" => with_name(&request.params, |name| engine.soft_delete(name)),
        "restore_entity" => with_name(&request.params, |name| engine.restore(name)),
        "dispose_entity" => with_name(&request.params, |name| engine.dispose_entity(name).map(|_| ())),
        "transform_active" => handle_transform_active(&request.params, engine),
        "get_entities" => handle_get_entities(engine),
        "set_draw_mode" => handle_set_draw_mode(&request.params, engine),
        "set_render_mode" => handle_set_render_mode(&request.params, engine),
        "get_zoom" => Ok(json!({
            "zoom": engine.viewports().resolve_zoom(),
            "main_distance": engine.viewports().rig(crate::camera::rig::ViewKind::Main).distance(),
        })),
        _ => {
            warn!("Unknown RPC method: {}", request.method);
            let id = request.id.clone()?;
            return Some(create_error_response(
                id,
                -32601,
                "Method not found",
                Some(json!({ "method": request.method })),
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

fn handle_add_entity(params: &Value, engine: &mut AnnotationEngine) -> Result<Value, RpcError> {
    #[derive(Deserialize)]
    struct AddParams {
        name: String,
        position: [f32; 3],
        #[serde(default)]
        rotation: [f32; 3],
        dimension: Option<[f32; 3]>,
        category: Option<String>,
        #[serde(default)]
        active: bool,
        point_count: Option<usize>,
    }

    let parsed = serde_json::from_value::<AddParams>(params.clone())
        .map_err(|_| RpcError::invalid_params("Expected 'name' and 'position' parameters"))?;
    let dimension = parsed.dimension.unwrap_or(engine.config().default_dimension);
    let category = parsed
        .category
        .unwrap_or_else(|| engine.config().default_category.clone());

    let mut spec = BoxSpec::new(
        parsed.name,
        Vec3::from_array(parsed.position),
        Vec3::from_array(dimension),
    )
    .with_rotation(Vec3::from_array(parsed.rotation))
    .with_category(category);
    spec.point_count = parsed.point_count;
    if parsed.active {
        spec = spec.activated();
    }

    let name = spec.name.clone();
    let pick_id = engine.add_entity(spec).map_err(|e| RpcError::engine(&e))?;
    info!("RPC added entity '{}'", name);
    Ok(json!({ "success": true, "name": name, "pick_id": pick_id }))
}

fn handle_select_entity(params: &Value, engine: &mut AnnotationEngine) -> Result<Value, RpcError> {
    with_name(params, |name| engine.select(name))?;
    Ok(json!({ "success": true, "active": engine.active() }))
}

fn handle_transform_active(params: &Value, engine: &mut AnnotationEngine) -> Result<Value, RpcError> {
    let op = serde_json::from_value::<TransformOp>(params.clone())
        .map_err(|_| RpcError::invalid_params("Expected a transform op: translate, rotate or resize"))?;
    let contained_points = engine.transform_active(op).map_err(|e| RpcError::engine(&e))?;
    Ok(json!({ "success": true, "contained_points": contained_points }))
}

fn handle_get_entities(engine: &AnnotationEngine) -> Result<Value, RpcError> {
    let entities: Vec<EntitySummary> = engine.entities().iter().map(EntitySummary::from).collect();
    serde_json::to_value(entities).map_err(|e| RpcError::internal_error(&e.to_string()))
}

fn handle_set_draw_mode(params: &Value, engine: &mut AnnotationEngine) -> Result<Value, RpcError> {
    #[derive(Deserialize)]
    struct ModeParams {
        mode: String,
    }

    let parsed = serde_json::from_value::<ModeParams>(params.clone())
        .map_err(|_| RpcError::invalid_params("Expected 'mode' parameter"))?;
    let mode = DrawMode::from_string(&parsed.mode)
        .ok_or_else(|| RpcError::invalid_params(&format!("Unknown draw mode: {}", parsed.mode)))?;
    engine.set_draw_mode(mode);
    Ok(json!({ "success": true, "draw_mode": mode.as_str() }))
}

fn handle_set_render_mode(params: &Value, engine: &mut AnnotationEngine) -> Result<Value, RpcError> {
    #[derive(Deserialize)]
    struct ModeParams {
        mode: RenderMode,
    }

    let parsed = serde_json::from_value::<ModeParams>(params.clone())
        .map_err(|_| RpcError::invalid_params("Expected 'mode': continuous or on_demand"))?;
    engine.viewports_mut().set_mode(parsed.mode);
    Ok(json!({ "success": true }))
}

fn with_name(
    params: &Value,
    action: impl FnOnce(&str) -> crate::error::Result<()>,
) -> Result<Value, RpcError> {
    #[derive(Deserialize)]
    struct NameParams {
        name: String,
    }

    let parsed = serde_json::from_value::<NameParams>(params.clone())
        .map_err(|_| RpcError::invalid_params("Expected 'name' parameter"))?;
    action(&parsed.name).map_err(|e| RpcError::engine(&e))?;
    Ok(json!({ "success": true, "name": parsed.name }))
}

fn create_error_response(
    id: Value,
    code: i32,
    message: &str,
    data: Option<Value>,
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
