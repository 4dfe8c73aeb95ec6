//! Shared numeric constants for the map engine.

// ── Camera ──────────────────────────────────────────────────────

/// Lower zoom bound used when no configuration overrides it.
pub const DEFAULT_MIN_SCALE: f64 = 0.5;

/// Upper zoom bound used when no configuration overrides it.
pub const DEFAULT_MAX_SCALE: f64 = 2.2;

/// Duration of fit-to-bounds camera animations, in milliseconds.
pub const FIT_ANIMATION_MS: f64 = 300.0;

/// Padding added on each side of a bounding box before fitting, as a ratio of its size.
pub const FIT_PADDING_RATIO: f64 = 0.08;

/// Wheel delta (pixels) to zoom exponent conversion.
pub const WHEEL_ZOOM_STEP: f64 = 0.0015;

// ── Layout ──────────────────────────────────────────────────────

/// Radius of every domain circle in world units.
pub const DOMAIN_RADIUS: f64 = 420.0;

/// Horizontal gap between neighbouring domain circles.
pub const DOMAIN_GAP: f64 = 160.0;

/// Smallest radius a project circle may have.
pub const PROJECT_MIN_RADIUS: f64 = 70.0;

/// Clearance between a project and its domain rim, and padding around packed tasks.
pub const PROJECT_MARGIN: f64 = 12.0;

/// Oversizing factor applied to the summed task area when sizing a project.
pub const PROJECT_AREA_FACTOR: f64 = 1.5;

/// Ring spacing as a multiple of the largest sibling task radius.
pub const RING_SPACING_FACTOR: f64 = 2.2;

/// Extra clearance added to ring spacing.
pub const TASK_MARGIN: f64 = 8.0;

/// Radius of a priority-0 task.
pub const TASK_BASE_RADIUS: f64 = 14.0;

/// Radius added per priority level.
pub const TASK_PRIORITY_STEP: f64 = 3.0;

/// Highest priority level that still grows the task circle.
pub const TASK_MAX_PRIORITY: u8 = 3;

/// Distance outside the domain rim where independent tasks are belted.
pub const BELT_OFFSET: f64 = 60.0;

/// Width of the band around a domain that counts as its belt for drops.
pub const BELT_WIDTH: f64 = 120.0;

/// π·(3 − √5): successive belt slots never line up.
pub const GOLDEN_ANGLE: f64 = 2.399_963_229_728_653;

/// Gap between the rightmost domain and the free-task grid.
pub const GRID_GAP: f64 = 200.0;

/// Cell size of the free-task grid.
pub const GRID_CELL: f64 = 80.0;

/// Columns in the free-task grid.
pub const GRID_COLUMNS: usize = 6;

/// Tags shared by more tasks than this produce no edges.
pub const MAX_TAG_FANOUT: usize = 8;

// ── Hit-testing ─────────────────────────────────────────────────

/// Multi-hit inflation for tasks, in world units.
pub const HIT_INFLATE_TASK: f64 = 6.0;

/// Multi-hit inflation for projects, in world units.
pub const HIT_INFLATE_PROJECT: f64 = 10.0;

/// Multi-hit inflation for domains, in world units.
pub const HIT_INFLATE_DOMAIN: f64 = 16.0;

/// Screen-space margin kept around the viewport when culling.
pub const CULL_MARGIN_PX: f64 = 64.0;

// ── Input ───────────────────────────────────────────────────────

/// Pointer travel in screen pixels before a press becomes a pan or drag.
pub const DRAG_THRESHOLD_PX: f64 = 4.0;

// ── Transactions ────────────────────────────────────────────────

/// Distance beyond a project's rim a task must be dropped to propose a detach.
pub const DETACH_MARGIN: f64 = 24.0;

/// Maximum number of undo entries retained.
pub const UNDO_CAPACITY: usize = 50;

// ── Adaptive rendering ──────────────────────────────────────────

/// Weight of history in the frame-time moving average.
pub const FRAME_EMA_DECAY: f64 = 0.9;

/// Initial frame-time estimate (one 60 Hz frame).
pub const FRAME_EMA_SEED_MS: f64 = 16.0;

/// Average frame time above which a frame counts as slow.
pub const SLOW_FRAME_MS: f64 = 22.0;

/// Average frame time below which a frame counts as fast.
pub const FAST_FRAME_MS: f64 = 12.0;

/// Consecutive slow or fast frames required before quality changes.
pub const QUALITY_STREAK_FRAMES: u32 = 8;

/// The edge cap never degrades below this.
pub const MIN_EDGE_CAP: usize = 40;

/// Age at which a task reaches its faintest aging alpha.
pub const AGING_FULL_DAYS: f64 = 30.0;

/// Alpha of a fully aged task.
pub const AGING_MIN_ALPHA: f64 = 0.45;

/// Milliseconds in a day.
pub const MS_PER_DAY: f64 = 86_400_000.0;
