use bevy::asset::AssetMetaCheck;
use bevy::diagnostic::{DiagnosticsStore, FrameTimeDiagnosticsPlugin};
use bevy::prelude::*;
use bevy::render::extract_resource::ExtractResourcePlugin;
use bevy::window::PresentMode;
use bevy_common_assets::json::JsonAssetPlugin;

mod engine;
mod error;
mod rpc;
mod tools;

use constants::render_settings::EDL_SETTINGS;
use engine::{
    assets::scene_manifest::SceneManifest,
    assets::survey_target::{SurveyCloud, SurveyTarget},
    camera::{ViewportCamera, camera_controller},
    core::app_state::AppState,
    shading::{PointShading, sync_edl_settings},
};
use rpc::web_rpc::WebRpcPlugin;
use tools::{
    clip::{ClipToolPlugin, ClipUniformState},
    measure::{MeasureHudText, MeasureToolPlugin},
    snap::SnapSettings,
    tool_manager::{
        ClearToolEvent, SurveyActionEvent, ToolManager, ToolSelectionEvent,
        handle_clear_tool_events, handle_survey_action_events, handle_tool_keyboard_shortcuts,
        handle_tool_selection_events,
    },
};

const RELATIVE_ASSET_PATH: &str = "pre_processor_data/riga_survey/riga_scene";

/// Tracks manifest loading until the survey target is bound.
#[derive(Resource, Default)]
struct ManifestLoader {
    handle: Option<Handle<SceneManifest>>,
    bound: bool,
}

fn main() {
    let mut app = create_app();

    #[cfg(target_arch = "wasm32")]
    {
        wasm_bindgen_futures::spawn_local(async move {
            app.run();
        });
    }

    #[cfg(not(target_arch = "wasm32"))]
    {
        app.run();
    }
}

fn create_app() -> App {
    let mut app = App::new();

    app.add_plugins(create_default_plugins())
        .add_plugins(FrameTimeDiagnosticsPlugin::default())
        .add_plugins(JsonAssetPlugin::<SceneManifest>::new(&["json"]))
        .add_plugins(ExtractResourcePlugin::<ClipUniformState>::default())
        .add_plugins(WebRpcPlugin)
        .add_plugins(MeasureToolPlugin)
        .add_plugins(ClipToolPlugin);

    app.init_state::<AppState>()
        .init_resource::<ManifestLoader>()
        .init_resource::<ToolManager>()
        .init_resource::<SnapSettings>()
        .init_resource::<PointShading>()
        .init_resource::<ViewportCamera>()
        .add_event::<ToolSelectionEvent>()
        .add_event::<ClearToolEvent>()
        .add_event::<SurveyActionEvent>()
        .add_systems(Startup, setup)
        .add_systems(
            Update,
            load_manifest_system.run_if(in_state(AppState::Loading)),
        )
        .add_systems(
            Update,
            (
                camera_controller,
                sync_edl_settings,
                fps_text_update_system,
                handle_tool_selection_events,
                handle_clear_tool_events,
                handle_survey_action_events,
                handle_tool_keyboard_shortcuts,
            ),
        );

    app
}

/// Load the scene manifest and bind the survey target once it arrives.
fn load_manifest_system(
    mut loader: ResMut<ManifestLoader>,
    mut commands: Commands,
    asset_server: Res<AssetServer>,
    manifests: Res<Assets<SceneManifest>>,
    mut next_state: ResMut<NextState<AppState>>,
) {
    if loader.handle.is_none() {
        let manifest_path = get_manifest_path();
        info!("Loading scene manifest from: {}", manifest_path);
        loader.handle = Some(asset_server.load(&manifest_path));
        return;
    }

    if loader.bound {
        return;
    }
    let Some(handle) = &loader.handle else {
        return;
    };
    let Some(manifest) = manifests.get(handle) else {
        return;
    };

    let heightmap = asset_server.load(&manifest.terrain.texture_files.heightmap);
    let entity = commands
        .spawn((SurveyCloud, Transform::default(), Visibility::default()))
        .id();

    match SurveyTarget::bind(manifest, entity, heightmap) {
        Ok(target) => {
            commands.insert_resource(ViewportCamera::with_bounds(&target.bounds));
            commands.insert_resource(target);
            loader.bound = true;
            next_state.set(AppState::Running);
            info!("Survey target bound; tools ready");
        }
        Err(err) => {
            // No session may bind to a missing target; leave the tools
            // without a SurveyTarget resource so every capture refuses.
            error!("Failed to bind survey target: {err}");
            commands.entity(entity).despawn();
            loader.bound = true;
        }
    }
}

fn get_manifest_path() -> String {
    format!("{}_manifest.json", RELATIVE_ASSET_PATH)
}

fn create_default_plugins() -> impl PluginGroup {
    let window_config = WindowPlugin {
        primary_window: Some(create_window_config()),
        ..default()
    };

    let asset_config = AssetPlugin {
        meta_check: AssetMetaCheck::Never,
        ..default()
    };

    DefaultPlugins.set(window_config).set(asset_config)
}

fn create_window_config() -> Window {
    #[cfg(target_arch = "wasm32")]
    {
        Window {
            canvas: Some("#bevy".into()),
            fit_canvas_to_parent: true,
            prevent_default_event_handling: false,
            present_mode: PresentMode::AutoVsync,
            ..default()
        }
    }

    #[cfg(not(target_arch = "wasm32"))]
    {
        Window {
            present_mode: PresentMode::AutoVsync,
            ..default()
        }
    }
}

#[derive(Component)]
struct FpsText;

fn setup(mut commands: Commands) {
    spawn_lighting(&mut commands);
    spawn_camera(&mut commands);
    spawn_ui(&mut commands);
}

fn spawn_lighting(commands: &mut Commands) {
    commands.spawn((
        DirectionalLight {
            shadows_enabled: false,
            ..default()
        },
        Transform::from_rotation(Quat::from_euler(
            EulerRot::ZYX,
            0.0,
            1.0,
            -std::f32::consts::FRAC_PI_4,
        )),
    ));
}

fn spawn_camera(commands: &mut Commands) {
    commands.spawn((
        Camera3d::default(),
        Transform::from_xyz(-2.5, 4.5, 9.0).looking_at(Vec3::ZERO, Vec3::Y),
        EDL_SETTINGS,
    ));
}

fn spawn_ui(commands: &mut Commands) {
    commands
        .spawn(Node {
            width: Val::Percent(100.0),
            height: Val::Percent(100.0),
            ..default()
        })
        .with_children(|parent| {
            parent.spawn((
                Text::new("FPS: "),
                TextFont {
                    font_size: 16.0,
                    ..default()
                },
                TextColor(Color::srgb(1., 0., 0.)),
                Node {
                    position_type: PositionType::Absolute,
                    bottom: Val::Px(12.0),
                    right: Val::Px(12.0),
                    ..default()
                },
                FpsText,
            ));

            parent.spawn((
                Text::new(""),
                TextFont {
                    font_size: 18.0,
                    ..default()
                },
                TextColor(Color::srgb(1., 1., 0.2)),
                Node {
                    position_type: PositionType::Absolute,
                    bottom: Val::Px(12.0),
                    left: Val::Px(12.0),
                    ..default()
                },
                MeasureHudText,
            ));
        });
}

fn fps_text_update_system(
    diagnostics: Res<DiagnosticsStore>,
    mut query: Query<&mut Text, With<FpsText>>,
) {
    for mut text in &mut query {
        if let Some(fps) = diagnostics.get(&FrameTimeDiagnosticsPlugin::FPS) {
            if let Some(value) = fps.smoothed() {
                text.0 = format!("FPS: {value:.1}");
            }
        }
    }
}
