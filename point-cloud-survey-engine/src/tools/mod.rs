//! Interactive survey tools for the point-cloud scene.
//!
//! Provides distance measurement and clip-region capture with a unified
//! tool manager coordinating exclusive activation and RPC integration for
//! frontend control.
//!
//! ## Tool Manager Architecture
//!
//! The `ToolManager` resource maintains exclusive tool activation state:
//! - Only one tool can be active at a time
//! - Tools are activated via keyboard shortcuts (native) or RPC events (WASM)
//! - Switching tools force-cancels any capture that is mid-flight, so no
//!   two capture loops ever own the pointer channel together
//!
//! ## Available Tools
//!
//! ### Measure Tool (`ToolType::Measure`)
//! - **Activation**: `M` key (native) or `tool_selection` RPC with `"measure"`
//! - **Workflow**:
//!   1. First click sets the start point through the snap resolver
//!   2. Mouse movement drives a live preview line and distance label
//!   3. Second click commits the measurement into history
//!   4. Right click or Escape discards the preview
//! - **Features**:
//!   - Neighbourhood snap sampling with adjustable radius
//!   - ThreeD / surface / surface-with-height distance modes
//!   - Enhanced point shading while placing, restored on every exit path
//!
//! ### Rectangle Clip (`ToolType::ClipRectangle`)
//! - **Activation**: `R` key (native) or RPC with `"clip_rectangle"`
//! - Press-drag-release captures a screen rectangle whose four corners are
//!   projected onto the scene and applied as the clip region. Unresolvable
//!   corners abort the capture without touching the active region.
//!
//! ### Polygon Clip (`ToolType::ClipPolygon`)
//! - **Activation**: `P` key (native) or RPC with `"clip_polygon"`
//! - Left click commits vertices, right click or Escape finalises at three
//!   or more vertices, fewer are discarded.
//!
//! Escape is recognised by whichever capture is mid-flight and cancels only
//! that capture.

/// Screen-to-world snap resolution over unreliable picking tiers.
pub mod snap;

/// Two-point distance measurement session.
pub mod measure;

/// Rectangle and polygon clip capture sessions.
pub mod clip;

/// Unified tool manager coordinating exclusive tool activation and state.
pub mod tool_manager;
