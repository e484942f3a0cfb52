use crate::kde::KernelDensity;
use crate::nbody::ThreeBodySimulator;
use wasm_bindgen::prelude::*;

#[cfg(target_arch = "wasm32")]
use wasm_bindgen_rayon::init_thread_pool;

#[cfg(target_arch = "wasm32")]
#[wasm_bindgen]
pub fn init_threads(n: usize) -> js_sys::Promise {
    init_thread_pool(n)
}

#[wasm_bindgen(typescript_custom_section)]
const TS_CONSTANTS_DEFAULTS: &'static str = r#"
export const DEFAULT_LEAF_SIZE = 20;
export const DEFAULT_ABSOLUTE_ERROR = 0.1;
"#;

fn kde_flat<const D: usize>(
    queries: &[f64],
    references: &[f64],
    bandwidth: f64,
    absolute_error: f64,
    relative_error: f64,
) -> Result<Vec<f64>, JsError> {
    let kde = KernelDensity::builder()
        .bandwidth(bandwidth)
        .absolute_error(absolute_error)
        .relative_error(relative_error)
        .build()?;
    Ok(kde.estimate_flat::<D>(queries, references)?.estimates())
}

/// Gaussian kernel density of `references` at each query. Both arrays hold
/// interleaved `x, y` coordinates; the result holds one density per query.
#[wasm_bindgen(js_name = kde2d)]
pub fn kde_2d(
    queries: &[f64],
    references: &[f64],
    bandwidth: f64,
    absolute_error: f64,
    relative_error: f64,
) -> Result<Vec<f64>, JsError> {
    kde_flat::<2>(queries, references, bandwidth, absolute_error, relative_error)
}

/// Like `kde2d` for interleaved `x, y, z` coordinates.
#[wasm_bindgen(js_name = kde3d)]
pub fn kde_3d(
    queries: &[f64],
    references: &[f64],
    bandwidth: f64,
    absolute_error: f64,
    relative_error: f64,
) -> Result<Vec<f64>, JsError> {
    kde_flat::<3>(queries, references, bandwidth, absolute_error, relative_error)
}

/// Axilrod-Teller potential at every point of interleaved `x, y, z` coordinates.
#[wasm_bindgen(js_name = threeBody3d)]
pub fn three_body_3d(points: &[f64], strength: f64, absolute_error: f64, relative_error: f64) -> Result<Vec<f64>, JsError> {
    let simulator = ThreeBodySimulator::builder()
        .strength(strength)
        .absolute_error(absolute_error)
        .relative_error(relative_error)
        .build()?;
    Ok(simulator.simulate_flat::<3>(points)?.potentials())
}
