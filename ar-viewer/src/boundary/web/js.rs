//! Untyped calls into page objects.
//!
//! WebXR and page-provided trackers are reached through `Reflect` so the
//! build does not depend on unstable `web-sys` bindings.

use js_sys::{Array, Float32Array, Function, Object, Promise, Reflect};
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::JsFuture;

use crate::boundary::runtime::RuntimeError;
use crate::engine::math::Pose;

use super::snapshot::pose_from_floats;

/// `name: message` of a thrown error or rejected promise.
pub fn describe(err: &JsValue) -> String {
    let field = |key: &str| Reflect::get(err, &JsValue::from_str(key)).ok().and_then(|v| v.as_string());
    match (field("name"), field("message")) {
        (Some(name), Some(message)) => format!("{name}: {message}"),
        (None, Some(message)) => message,
        _ => err.as_string().unwrap_or_else(|| format!("{err:?}")),
    }
}

pub fn fault(err: JsValue) -> RuntimeError {
    RuntimeError::Fault(describe(&err))
}

pub fn is_absent(value: &JsValue) -> bool {
    value.is_undefined() || value.is_null()
}

pub fn get(target: &JsValue, key: &str) -> Result<JsValue, RuntimeError> {
    Reflect::get(target, &JsValue::from_str(key)).map_err(fault)
}

pub fn set(target: &JsValue, key: &str, value: &JsValue) -> Result<(), RuntimeError> {
    Reflect::set(target, &JsValue::from_str(key), value)
        .map(|_| ())
        .map_err(fault)
}

pub fn has_method(target: &JsValue, method: &str) -> bool {
    get(target, method).is_ok_and(|f| f.is_function())
}

/// Call `target[method](...args)`.
pub fn invoke(target: &JsValue, method: &str, args: &[&JsValue]) -> Result<JsValue, RuntimeError> {
    let function: Function = get(target, method)?
        .dyn_into()
        .map_err(|_| RuntimeError::Fault(format!("{method} is not a function")))?;
    let args: Array = args.iter().copied().collect();
    function.apply(target, &args).map_err(fault)
}

/// `new globalThis[class](...args)`.
pub fn construct(class: &str, args: &[&JsValue]) -> Result<JsValue, RuntimeError> {
    let constructor: Function = get(&js_sys::global(), class)?
        .dyn_into()
        .map_err(|_| RuntimeError::Fault(format!("{class} is not available")))?;
    let args: Array = args.iter().copied().collect();
    Reflect::construct(&constructor, &args).map_err(fault)
}

pub fn object(entries: &[(&str, JsValue)]) -> Result<JsValue, RuntimeError> {
    let object: JsValue = Object::new().into();
    for (key, value) in entries {
        set(&object, key, value)?;
    }
    Ok(object)
}

/// Await a promise-returning value. A non-promise is returned as the error.
pub async fn settle(value: JsValue) -> Result<JsValue, JsValue> {
    let promise: Promise = value.dyn_into()?;
    JsFuture::from(promise).await
}

/// Pose of an `{ matrix }` holder such as `XRRigidTransform`, or a bare
/// matrix. `None` for null, short or non-finite matrices.
pub fn pose_of(value: &JsValue) -> Option<Pose> {
    if is_absent(value) {
        return None;
    }
    let matrix = match get(value, "matrix") {
        Ok(matrix) if !is_absent(&matrix) => matrix,
        _ => value.clone(),
    };
    if !matrix.is_instance_of::<Float32Array>() && !Array::is_array(&matrix) {
        return None;
    }
    pose_from_floats(&Float32Array::new(&matrix).to_vec())
}

/// `pose.transform` of an `XRPose`, which is `null` while untracked.
pub fn transform_pose(xr_pose: &JsValue) -> Option<Pose> {
    if is_absent(xr_pose) {
        return None;
    }
    get(xr_pose, "transform").ok().as_ref().and_then(pose_of)
}

/// Strings of an array-like, skipping anything that is not a string.
pub fn strings(value: &JsValue) -> Vec<String> {
    if is_absent(value) {
        return Vec::new();
    }
    Array::from(value).iter().filter_map(|v| v.as_string()).collect()
}

pub fn array(value: &JsValue) -> Vec<JsValue> {
    if is_absent(value) {
        return Vec::new();
    }
    Array::from(value).iter().collect()
}
