use crate::{
    body::{Body, BodyKind},
    config::SandboxConfig,
    error::SandboxError,
    possession::Handoff,
    sandbox::{Sandbox, SpawnRequest},
};

use std::ffi::{CStr, CString, c_char};

/// Status codes returned by the C interface.
pub const SANDBOX_OK: i32 = 0;
pub const SANDBOX_NULL_HANDLE: i32 = -1;
pub const SANDBOX_INDEX_OUT_OF_RANGE: i32 = -2;
pub const SANDBOX_INVALID_VALUE: i32 = -3;
pub const SANDBOX_POSSESSION_CONFLICT: i32 = -4;
pub const SANDBOX_INVALID_CONFIG: i32 = -5;
/// Returned by release calls whose body no longer exists. Not an error.
pub const SANDBOX_DROPPED: i32 = 1;

/// Plain-data body record copied out to C callers.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct RawBody {
    pub id: u64,
    pub x: f64,
    pub y: f64,
    pub vx: f64,
    pub vy: f64,
    pub mass: f64,
    pub radius: f64,
    pub size: f64,
    pub elasticity: f64,
    /// [`BodyKind`] discriminant.
    pub kind: u8,
    pub possessed: u8,
}

impl From<&Body> for RawBody {
    fn from(body: &Body) -> Self {
        Self {
            id: body.id.to_bits(),
            x: body.pos.x,
            y: body.pos.y,
            vx: body.vel.x,
            vy: body.vel.y,
            mass: body.mass,
            radius: body.radius,
            size: body.size,
            elasticity: body.elasticity,
            kind: body.kind as u8,
            possessed: body.possessed as u8,
        }
    }
}

fn status_code(err: &SandboxError) -> i32 {
    match err {
        SandboxError::IndexOutOfRange { .. } => SANDBOX_INDEX_OUT_OF_RANGE,
        SandboxError::Validation { .. } => SANDBOX_INVALID_VALUE,
        SandboxError::PossessionConflict { .. } => SANDBOX_POSSESSION_CONFLICT,
        SandboxError::Config(_) => SANDBOX_INVALID_CONFIG,
    }
}

fn to_code(result: crate::Result<()>) -> i32 {
    match result {
        Ok(()) => SANDBOX_OK,
        Err(err) => {
            log::debug!("c api call failed: {err}");
            status_code(&err)
        }
    }
}

#[unsafe(no_mangle)]
pub extern "C" fn Sandbox_Create() -> *mut Sandbox {
    Box::into_raw(Box::new(Sandbox::new()))
}

/// Builds a sandbox from a JSON configuration. Returns null if the document is
/// not valid UTF-8, fails to parse, or holds an out-of-range value.
///
/// # Safety
/// `json` must be null or point to a NUL-terminated string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn Sandbox_CreateFromJson(json: *const c_char) -> *mut Sandbox {
    if json.is_null() {
        return std::ptr::null_mut();
    }
    let text = unsafe { CStr::from_ptr(json) };
    let built = match text.to_str() {
        Ok(text) => SandboxConfig::from_json_str(text).and_then(Sandbox::with_config),
        Err(_) => {
            log::warn!("sandbox configuration is not valid UTF-8");
            return std::ptr::null_mut();
        }
    };
    match built {
        Ok(sandbox) => Box::into_raw(Box::new(sandbox)),
        Err(err) => {
            log::warn!("rejected sandbox configuration: {err}");
            std::ptr::null_mut()
        }
    }
}

/// # Safety
/// `handle` must be null or a pointer returned by one of the create functions,
/// not yet destroyed.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn Sandbox_Destroy(handle: *mut Sandbox) {
    if !handle.is_null() {
        unsafe { drop(Box::from_raw(handle)) };
    }
}

/// # Safety
/// `handle` must be null or a live sandbox handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn Sandbox_Step(handle: *mut Sandbox) {
    if let Some(sandbox) = unsafe { handle.as_mut() } {
        sandbox.step();
    }
}

/// # Safety
/// `handle` must be null or a live sandbox handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn Sandbox_Reset(handle: *mut Sandbox) {
    if let Some(sandbox) = unsafe { handle.as_mut() } {
        sandbox.reset();
    }
}

/// # Safety
/// `handle` must be null or a live sandbox handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn Sandbox_GetBodyCount(handle: *const Sandbox) -> usize {
    unsafe { handle.as_ref() }.map_or(0, Sandbox::len)
}

/// Copies up to `capacity` bodies into `out`, returning how many were written.
///
/// # Safety
/// `handle` must be null or a live sandbox handle; `out` must be null or valid
/// for `capacity` writes of [`RawBody`].
#[unsafe(no_mangle)]
pub unsafe extern "C" fn Sandbox_CopyBodies(
    handle: *const Sandbox,
    out: *mut RawBody,
    capacity: usize,
) -> usize {
    let Some(sandbox) = (unsafe { handle.as_ref() }) else {
        return 0;
    };
    if out.is_null() {
        return 0;
    }
    let bodies = sandbox.store().bodies();
    let count = bodies.len().min(capacity);
    let out = unsafe { std::slice::from_raw_parts_mut(out, count) };
    for (slot, body) in out.iter_mut().zip(bodies) {
        *slot = RawBody::from(body);
    }
    count
}

/// Returns the body snapshot as a JSON array. Free it with [`Sandbox_FreeString`].
///
/// # Safety
/// `handle` must be null or a live sandbox handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn Sandbox_SnapshotJson(handle: *const Sandbox) -> *mut c_char {
    let Some(sandbox) = (unsafe { handle.as_ref() }) else {
        return std::ptr::null_mut();
    };
    match serde_json::to_string(&sandbox.bodies()).map(CString::new) {
        Ok(Ok(json)) => json.into_raw(),
        _ => std::ptr::null_mut(),
    }
}

/// # Safety
/// `text` must be null or a pointer returned by [`Sandbox_SnapshotJson`], not yet freed.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn Sandbox_FreeString(text: *mut c_char) {
    if !text.is_null() {
        unsafe { drop(CString::from_raw(text)) };
    }
}

/// Drag update: possesses the body and moves it to `(x, y)`.
///
/// # Safety
/// `handle` must be null or a live sandbox handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn Sandbox_Move(handle: *mut Sandbox, index: usize, x: f64, y: f64) -> i32 {
    let Some(sandbox) = (unsafe { handle.as_mut() }) else {
        return SANDBOX_NULL_HANDLE;
    };
    to_code(sandbox.move_body(index, x, y, None))
}

/// Throw: moves the body to `(x, y)`, sets its velocity and frees it.
///
/// # Safety
/// `handle` must be null or a live sandbox handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn Sandbox_Throw(
    handle: *mut Sandbox,
    index: usize,
    x: f64,
    y: f64,
    vx: f64,
    vy: f64,
) -> i32 {
    let Some(sandbox) = (unsafe { handle.as_mut() }) else {
        return SANDBOX_NULL_HANDLE;
    };
    to_code(sandbox.move_body(index, x, y, Some((vx, vy))))
}

/// Releases the dragged body with the accumulated throw velocity.
///
/// # Safety
/// `handle` must be null or a live sandbox handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn Sandbox_Release(handle: *mut Sandbox, index: usize) -> i32 {
    let Some(sandbox) = (unsafe { handle.as_mut() }) else {
        return SANDBOX_NULL_HANDLE;
    };
    match sandbox.release(index) {
        Ok(Handoff::Applied) => SANDBOX_OK,
        Ok(Handoff::Dropped) => SANDBOX_DROPPED,
        Err(err) => status_code(&err),
    }
}

/// # Safety
/// `handle` must be null or a live sandbox handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn Sandbox_SetSize(handle: *mut Sandbox, index: usize, size: f64) -> i32 {
    let Some(sandbox) = (unsafe { handle.as_mut() }) else {
        return SANDBOX_NULL_HANDLE;
    };
    to_code(sandbox.set_size(index, size))
}

/// Spawns a body and returns its index, or a negative status code. A negative
/// `elasticity` selects the configured default.
///
/// # Safety
/// `handle` must be null or a live sandbox handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn Sandbox_Spawn(
    handle: *mut Sandbox,
    x: f64,
    y: f64,
    mass: f64,
    size: f64,
    elasticity: f64,
    kind: u8,
) -> i64 {
    let Some(sandbox) = (unsafe { handle.as_mut() }) else {
        return SANDBOX_NULL_HANDLE as i64;
    };
    let Some(kind) = BodyKind::from_code(kind) else {
        return SANDBOX_INVALID_VALUE as i64;
    };
    let mut request = SpawnRequest::new(x, y).mass(mass).size(size).kind(kind);
    if elasticity >= 0.0 {
        request = request.elasticity(elasticity);
    }
    match sandbox.spawn(request) {
        Ok(index) => index as i64,
        Err(err) => status_code(&err) as i64,
    }
}

/// # Safety
/// `handle` must be null or a live sandbox handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn Sandbox_ToggleGravity(handle: *mut Sandbox) -> bool {
    unsafe { handle.as_mut() }.is_some_and(Sandbox::toggle_gravity)
}

/// # Safety
/// `handle` must be null or a live sandbox handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn Sandbox_ToggleDecay(handle: *mut Sandbox) -> bool {
    unsafe { handle.as_mut() }.is_some_and(Sandbox::toggle_decay)
}

/// # Safety
/// `handle` must be null or a live sandbox handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn Sandbox_SetGravityForce(handle: *mut Sandbox, force: f64) -> i32 {
    let Some(sandbox) = (unsafe { handle.as_mut() }) else {
        return SANDBOX_NULL_HANDLE;
    };
    to_code(sandbox.set_gravity_force(force))
}

/// # Safety
/// `handle` must be null or a live sandbox handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn Sandbox_SetDecayFactor(handle: *mut Sandbox, factor: f64) -> i32 {
    let Some(sandbox) = (unsafe { handle.as_mut() }) else {
        return SANDBOX_NULL_HANDLE;
    };
    to_code(sandbox.set_decay_factor(factor))
}

/// Sets one body's elasticity, or every body's and the default when `index` is negative.
///
/// # Safety
/// `handle` must be null or a live sandbox handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn Sandbox_SetElasticity(
    handle: *mut Sandbox,
    elasticity: f64,
    index: i64,
) -> i32 {
    let Some(sandbox) = (unsafe { handle.as_mut() }) else {
        return SANDBOX_NULL_HANDLE;
    };
    let index = usize::try_from(index).ok();
    to_code(sandbox.set_elasticity(elasticity, index))
}

/// Writes the gravity and decay toggles.
///
/// # Safety
/// `handle` must be null or a live sandbox handle; `gravity` and `decay` must
/// be null or valid for a write.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn Sandbox_GetStatus(
    handle: *const Sandbox,
    gravity: *mut bool,
    decay: *mut bool,
) -> i32 {
    let Some(sandbox) = (unsafe { handle.as_ref() }) else {
        return SANDBOX_NULL_HANDLE;
    };
    let status = sandbox.status();
    if let Some(gravity) = unsafe { gravity.as_mut() } {
        *gravity = status.gravity;
    }
    if let Some(decay) = unsafe { decay.as_mut() } {
        *decay = status.decay;
    }
    SANDBOX_OK
}
