use serde::{Deserialize, Serialize};

/// Configuration of the packing engine.
///
/// The defaults reproduce the classic pipeline: coarse quarter-turn
/// rotation sets, dive steps of a third of the piece width, and a sweep
/// grid of (w/10, h/2).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PackConfig {
    /// Rotations tried by the stage-1 bounding-box placer.
    #[serde(default = "quarter_rotations")]
    pub stage1_rotations: Vec<f64>,
    /// Rotations tried by the dive drop and the island placer.
    #[serde(default = "quarter_rotations")]
    pub stage23_rotations: Vec<f64>,
    /// Division factor for the horizontal dive grid; larger values mean
    /// smaller steps.
    #[serde(default = "default_dive_factor")]
    pub dive_horizontal_factor: u32,
    /// Division factor for the horizontal sweep step.
    #[serde(default = "default_dx_sweep")]
    pub dx_sweep_factor: u32,
    /// Division factor for the vertical sweep step.
    #[serde(default = "default_dy_sweep")]
    pub dy_sweep_factor: u32,
    /// Intersections up to this area are not collisions: pieces may touch.
    #[serde(default = "default_collision_tolerance")]
    pub collision_tolerance: f64,
    /// Route the collision oracle through the NFP module instead of the
    /// R-tree + precise-intersection pair.
    #[serde(default)]
    pub nfp_collision: bool,
    /// Enable the optional island placement stage between stage 2 and the
    /// final drop pass.
    #[serde(default)]
    pub island_placement: bool,
    /// Fan the free-rectangle slot search out over a thread pool.
    #[serde(default)]
    pub parallel_search: bool,
    /// Minimum number of free rectangles before a parallel search pays off.
    #[serde(default = "default_parallel_threshold")]
    pub parallel_free_rect_threshold: usize,
}

fn quarter_rotations() -> Vec<f64> {
    vec![0.0, 90.0, 180.0, 270.0]
}

fn default_dive_factor() -> u32 {
    3
}

fn default_dx_sweep() -> u32 {
    10
}

fn default_dy_sweep() -> u32 {
    2
}

fn default_collision_tolerance() -> f64 {
    1e-9
}

fn default_parallel_threshold() -> usize {
    250
}

impl Default for PackConfig {
    fn default() -> Self {
        PackConfig {
            stage1_rotations: quarter_rotations(),
            stage23_rotations: quarter_rotations(),
            dive_horizontal_factor: default_dive_factor(),
            dx_sweep_factor: default_dx_sweep(),
            dy_sweep_factor: default_dy_sweep(),
            collision_tolerance: default_collision_tolerance(),
            nfp_collision: false,
            island_placement: false,
            parallel_search: false,
            parallel_free_rect_threshold: default_parallel_threshold(),
        }
    }
}

impl PackConfig {
    /// The 5°-step rotation set for stages 2 and 3, trading speed for
    /// utilisation.
    pub fn fine_rotations() -> Vec<f64> {
        (0..72).map(|i| i as f64 * 5.0).collect()
    }

    /// Default configuration with the fine stage-2/3 rotation set.
    pub fn with_fine_rotations() -> Self {
        PackConfig {
            stage23_rotations: Self::fine_rotations(),
            ..Self::default()
        }
    }
}
