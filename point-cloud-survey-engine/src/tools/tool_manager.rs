use crate::engine::shading::PointShading;
use crate::tools::clip::{ClipCollection, ClipSession};
use crate::tools::measure::{DistanceMode, MeasureSession, deactivate_measure};
use crate::tools::snap::SnapSettings;
use bevy::prelude::*;

/// Enumeration of available tools in the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolType {
    Measure,
    ClipRectangle,
    ClipPolygon,
}

impl ToolType {
    /// Convert string identifier to tool type for RPC compatibility.
    pub fn from_string(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "measure" => Some(Self::Measure),
            "clip_rectangle" => Some(Self::ClipRectangle),
            "clip_polygon" => Some(Self::ClipPolygon),
            _ => None,
        }
    }

    /// Convert tool type to string identifier for frontend communication.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Measure => "measure",
            Self::ClipRectangle => "clip_rectangle",
            Self::ClipPolygon => "clip_polygon",
        }
    }
}

/// Resource tracking the currently active tool.
#[derive(Resource, Default)]
pub struct ToolManager {
    active_tool: Option<ToolType>,
}

impl ToolManager {
    /// Activate specified tool, returning whether the selection changed.
    pub fn activate_tool(&mut self, tool_type: ToolType) -> bool {
        if self.active_tool == Some(tool_type) {
            return false; // No change needed.
        }
        self.active_tool = Some(tool_type);
        info!("Tool manager activated: {}", tool_type.as_str());
        true
    }

    /// Deactivate currently active tool.
    pub fn deactivate_current_tool(&mut self) -> Option<ToolType> {
        let previous = self.active_tool.take();
        if let Some(tool) = previous {
            info!("Tool manager deactivated: {}", tool.as_str());
        }
        previous
    }

    pub fn active_tool(&self) -> Option<ToolType> {
        self.active_tool
    }

    pub fn is_tool_active(&self, tool_type: ToolType) -> bool {
        self.active_tool == Some(tool_type)
    }
}

/// Event fired when tool selection changes via RPC or keyboard shortcuts.
#[derive(Event)]
pub struct ToolSelectionEvent {
    pub tool_type: ToolType,
    pub source: ToolSelectionSource,
}

/// Event fired to deactivate the current tool entirely.
#[derive(Event)]
pub struct ClearToolEvent;

/// Source of tool selection for debugging and conditional logic.
#[derive(Debug, Clone, Copy)]
pub enum ToolSelectionSource {
    Rpc,
    Keyboard,
}

/// Session-level actions triggered via RPC or keyboard.
#[derive(Debug, Clone, Copy)]
pub enum SurveyAction {
    SetDistanceMode(DistanceMode),
    ClearMeasurements,
    SetSnapEnabled(bool),
    SetSnapRadius(f32),
    SetSnapTargetOnly(bool),
    SetClipInverse(bool),
    ClearClip,
    CompletePolygon,
}

#[derive(Event)]
pub struct SurveyActionEvent {
    pub action: SurveyAction,
}

/// System handling tool selection events with proper state coordination.
///
/// Switching tools force-terminates whatever capture is mid-flight before
/// the new tool may bind input; a stale capture left capturing would keep
/// orphaned claim on the pointer channel.
pub fn handle_tool_selection_events(
    mut events: EventReader<ToolSelectionEvent>,
    mut tool_manager: ResMut<ToolManager>,
    mut measure: ResMut<MeasureSession>,
    mut shading: ResMut<PointShading>,
    mut clip_session: ResMut<ClipSession>,
    mut rpc: ResMut<crate::rpc::web_rpc::WebRpcInterface>,
) {
    for event in events.read() {
        let tool_changed = tool_manager.activate_tool(event.tool_type);
        if !tool_changed {
            continue; // Tool already active, skip redundant operations.
        }

        // Deactivate every session before the new tool takes over.
        deactivate_measure(&mut measure, &mut shading);
        if clip_session.cancel_captures() {
            info!("In-progress clip capture force-cancelled by tool switch");
        }

        info!("{} tool activated via {:?}", event.tool_type.as_str(), event.source);
        rpc.send_notification(
            "tool_state_changed",
            serde_json::json!({
                "tool": event.tool_type.as_str(),
                "active": true,
            }),
        );
    }
}

/// System deactivating the current tool and tearing down session state.
pub fn handle_clear_tool_events(
    mut events: EventReader<ClearToolEvent>,
    mut tool_manager: ResMut<ToolManager>,
    mut measure: ResMut<MeasureSession>,
    mut shading: ResMut<PointShading>,
    mut clip_session: ResMut<ClipSession>,
    mut rpc: ResMut<crate::rpc::web_rpc::WebRpcInterface>,
) {
    for _ in events.read() {
        let previous = tool_manager.deactivate_current_tool();
        deactivate_measure(&mut measure, &mut shading);
        clip_session.cancel_captures();

        rpc.send_notification(
            "tool_state_changed",
            serde_json::json!({
                "tool": previous.map(|tool| tool.as_str()),
                "active": false,
            }),
        );
    }
}

/// System applying session-level actions from RPC and keyboard.
pub fn handle_survey_action_events(
    mut events: EventReader<SurveyActionEvent>,
    mut measure: ResMut<MeasureSession>,
    mut shading: ResMut<PointShading>,
    mut snap_settings: ResMut<SnapSettings>,
    mut clip_session: ResMut<ClipSession>,
    mut collection: ResMut<ClipCollection>,
    mut rpc: ResMut<crate::rpc::web_rpc::WebRpcInterface>,
) {
    for event in events.read() {
        match event.action {
            SurveyAction::SetDistanceMode(mode) => {
                measure.mode = mode;
                rpc.send_notification(
                    "distance_mode_changed",
                    serde_json::json!({ "mode": mode.as_str() }),
                );
            }
            SurveyAction::ClearMeasurements => {
                deactivate_measure(&mut measure, &mut shading);
                measure.clear_all();
                rpc.send_notification("measure_clear", serde_json::json!({}));
            }
            SurveyAction::SetSnapEnabled(enabled) => {
                snap_settings.enabled = enabled;
                notify_snap_state(&snap_settings, &mut rpc);
            }
            SurveyAction::SetSnapRadius(radius) => {
                snap_settings.set_radius(radius);
                notify_snap_state(&snap_settings, &mut rpc);
            }
            SurveyAction::SetSnapTargetOnly(target_only) => {
                snap_settings.target_only = target_only;
                notify_snap_state(&snap_settings, &mut rpc);
            }
            SurveyAction::SetClipInverse(inverse) => {
                collection.set_inverse(inverse);
                rpc.send_notification(
                    "clip_inverse_changed",
                    serde_json::json!({ "inverse": inverse }),
                );
            }
            SurveyAction::ClearClip => {
                clip_session.cancel_captures();
                collection.clear();
                rpc.send_notification("clip_cleared", serde_json::json!({}));
            }
            SurveyAction::CompletePolygon => {
                let was_capturing = clip_session.polygon.is_capturing();
                match clip_session.polygon.finalize() {
                    Some(vertices) => {
                        let vertex_count = vertices.len();
                        collection.apply_region(vertices);
                        rpc.send_notification(
                            "clip_applied",
                            serde_json::json!({
                                "shape": "polygon",
                                "vertex_count": vertex_count,
                                "inverse": collection.inverse(),
                            }),
                        );
                    }
                    None if was_capturing => {
                        warn!("Cannot complete polygon: need at least 3 points");
                        rpc.send_notification(
                            "clip_aborted",
                            serde_json::json!({ "reason": "too few vertices" }),
                        );
                    }
                    None => {}
                }
            }
        }
    }
}

fn notify_snap_state(
    snap_settings: &SnapSettings,
    rpc: &mut crate::rpc::web_rpc::WebRpcInterface,
) {
    rpc.send_notification(
        "snap_state_changed",
        serde_json::json!({
            "enabled": snap_settings.enabled,
            "radius_px": snap_settings.radius_px,
            "target_only": snap_settings.target_only,
        }),
    );
}

/// System handling keyboard shortcuts for tool selection (native builds only).
#[cfg(not(target_arch = "wasm32"))]
pub fn handle_tool_keyboard_shortcuts(
    keyboard: Res<ButtonInput<KeyCode>>,
    snap_settings: Res<SnapSettings>,
    collection: Res<ClipCollection>,
    mut tool_events: EventWriter<ToolSelectionEvent>,
    mut action_events: EventWriter<SurveyActionEvent>,
) {
    for (key, tool_type) in [
        (KeyCode::KeyM, ToolType::Measure),
        (KeyCode::KeyR, ToolType::ClipRectangle),
        (KeyCode::KeyP, ToolType::ClipPolygon),
    ] {
        if keyboard.just_pressed(key) {
            tool_events.write(ToolSelectionEvent {
                tool_type,
                source: ToolSelectionSource::Keyboard,
            });
        }
    }

    for (key, mode) in [
        (KeyCode::Digit1, DistanceMode::ThreeD),
        (KeyCode::Digit2, DistanceMode::Surface),
        (KeyCode::Digit3, DistanceMode::SurfaceWithHeight),
    ] {
        if keyboard.just_pressed(key) {
            action_events.write(SurveyActionEvent {
                action: SurveyAction::SetDistanceMode(mode),
            });
        }
    }

    if keyboard.just_pressed(KeyCode::KeyN) {
        action_events.write(SurveyActionEvent {
            action: SurveyAction::SetSnapEnabled(!snap_settings.enabled),
        });
    }
    if keyboard.just_pressed(KeyCode::KeyT) {
        action_events.write(SurveyActionEvent {
            action: SurveyAction::SetSnapTargetOnly(!snap_settings.target_only),
        });
    }
    if keyboard.just_pressed(KeyCode::BracketLeft) {
        action_events.write(SurveyActionEvent {
            action: SurveyAction::SetSnapRadius(snap_settings.radius_px - 2.0),
        });
    }
    if keyboard.just_pressed(KeyCode::BracketRight) {
        action_events.write(SurveyActionEvent {
            action: SurveyAction::SetSnapRadius(snap_settings.radius_px + 2.0),
        });
    }

    if keyboard.just_pressed(KeyCode::KeyI) {
        action_events.write(SurveyActionEvent {
            action: SurveyAction::SetClipInverse(!collection.inverse()),
        });
    }
    if keyboard.just_pressed(KeyCode::KeyC) {
        action_events.write(SurveyActionEvent {
            action: SurveyAction::ClearClip,
        });
    }
    if keyboard.just_pressed(KeyCode::KeyX) {
        action_events.write(SurveyActionEvent {
            action: SurveyAction::ClearMeasurements,
        });
    }
}

/// Placeholder system for WASM builds where keyboard shortcuts are disabled.
#[cfg(target_arch = "wasm32")]
pub fn handle_tool_keyboard_shortcuts() {
    // No keyboard shortcuts in WASM builds - tools controlled via RPC only.
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn activation_is_exclusive_and_idempotent() {
        let mut manager = ToolManager::default();
        assert!(manager.activate_tool(ToolType::Measure));
        assert!(!manager.activate_tool(ToolType::Measure));
        assert!(manager.is_tool_active(ToolType::Measure));

        assert!(manager.activate_tool(ToolType::ClipPolygon));
        assert!(!manager.is_tool_active(ToolType::Measure));
        assert!(manager.is_tool_active(ToolType::ClipPolygon));
    }

    #[test]
    fn deactivation_returns_the_previous_tool() {
        let mut manager = ToolManager::default();
        assert_eq!(manager.deactivate_current_tool(), None);

        manager.activate_tool(ToolType::ClipRectangle);
        assert_eq!(
            manager.deactivate_current_tool(),
            Some(ToolType::ClipRectangle)
        );
        assert_eq!(manager.active_tool(), None);
    }

    #[test]
    fn tool_names_round_trip_through_strings() {
        for tool in [
            ToolType::Measure,
            ToolType::ClipRectangle,
            ToolType::ClipPolygon,
        ] {
            assert_eq!(ToolType::from_string(tool.as_str()), Some(tool));
        }
        assert_eq!(ToolType::from_string("lasso"), None);
    }
}
