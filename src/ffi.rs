//! FFI bindings for the screening flow
//!
//! C-compatible functions so a host UI shell can drive a `ScreeningFlow`.
//! All functions take null-terminated C strings and return allocated memory
//! that must be freed by the caller using `screening_free_string`.

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::ptr;

use serde_json::json;

use crate::config::FlowConfig;
use crate::error::FlowError;
use crate::flow::ScreeningFlow;
use crate::games::StageInput;
use crate::recorder::RecordOutcome;
use crate::session::QuestionnaireForm;
use crate::store::FileStore;
use crate::summary::CleanExport;
use crate::types::ActivityResult;

// Thread-local storage for the last error message
thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

fn set_last_error(msg: &str) {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = CString::new(msg).ok();
    });
}

fn clear_last_error() {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = None;
    });
}

/// Helper to convert C string to Rust string
unsafe fn cstr_to_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    CStr::from_ptr(ptr).to_str().ok().map(|s| s.to_string())
}

/// Helper to convert Rust string to C string (caller must free)
fn string_to_cstr(s: &str) -> *mut c_char {
    match CString::new(s) {
        Ok(cstr) => cstr.into_raw(),
        Err(_) => ptr::null_mut(),
    }
}

/// Return a JSON string, or NULL with the error recorded
fn json_or_null(result: Result<String, FlowError>) -> *mut c_char {
    match result {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Return 0, or -1 with the error recorded
fn status_code(result: Result<(), FlowError>) -> i32 {
    match result {
        Ok(()) => 0,
        Err(e) => {
            set_last_error(&e.to_string());
            -1
        }
    }
}

/// Mode plus the live stage, as handed back after every call that moves the flow
fn state_json(flow: &ScreeningFlow) -> serde_json::Value {
    json!({
        "mode": flow.mode(),
        "view": flow.view(),
    })
}

// ============================================================================
// Flow API
// ============================================================================

/// Opaque handle to a ScreeningFlow
pub struct ScreeningFlowHandle {
    flow: ScreeningFlow,
}

/// Create a flow that keeps its record in `store_dir`.
///
/// # Safety
/// - `store_dir` must be a valid null-terminated C string.
/// - `config_json` may be NULL for the default configuration.
/// - Returns a pointer that must be freed with `screening_flow_free`.
/// - Returns NULL on error; call `screening_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn screening_flow_new(
    store_dir: *const c_char,
    config_json: *const c_char,
) -> *mut ScreeningFlowHandle {
    clear_last_error();

    let dir = match cstr_to_string(store_dir) {
        Some(s) => s,
        None => {
            set_last_error("Invalid store_dir string pointer");
            return ptr::null_mut();
        }
    };

    let config = if config_json.is_null() {
        FlowConfig::default()
    } else {
        let parsed = match cstr_to_string(config_json) {
            Some(s) => FlowConfig::from_json(&s),
            None => Err(FlowError::InvalidConfig("config is not valid UTF-8".to_string())),
        };
        match parsed {
            Ok(config) => config,
            Err(e) => {
                set_last_error(&e.to_string());
                return ptr::null_mut();
            }
        }
    };

    let store = FileStore::new(dir, config.storage_key.clone());
    match ScreeningFlow::new(config, Box::new(store)) {
        Ok(flow) => Box::into_raw(Box::new(ScreeningFlowHandle { flow })),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Free a flow.
///
/// # Safety
/// - `handle` must be a valid pointer returned by `screening_flow_new`, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn screening_flow_free(handle: *mut ScreeningFlowHandle) {
    if !handle.is_null() {
        drop(Box::from_raw(handle));
    }
}

/// Start from the first stage and return `{mode, view}` as JSON.
///
/// # Safety
/// - `handle` must be a valid pointer returned by `screening_flow_new`.
/// - Returns a newly allocated string that must be freed with `screening_free_string`.
#[no_mangle]
pub unsafe extern "C" fn screening_flow_start(handle: *mut ScreeningFlowHandle) -> *mut c_char {
    clear_last_error();

    if handle.is_null() {
        set_last_error("Null flow pointer");
        return ptr::null_mut();
    }
    let handle = &mut *handle;

    handle.flow.start();
    json_or_null(serde_json::to_string(&state_json(&handle.flow)).map_err(FlowError::from))
}

/// Send one stage input (tagged JSON, e.g. `{"type": "start"}`) to the live
/// stage. Returns `{status, mode, view}` as JSON.
///
/// # Safety
/// - `handle` must be a valid pointer returned by `screening_flow_new`.
/// - `input_json` must be a valid null-terminated C string.
/// - Returns a newly allocated string that must be freed with `screening_free_string`.
/// - Returns NULL on error; call `screening_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn screening_flow_send(
    handle: *mut ScreeningFlowHandle,
    input_json: *const c_char,
) -> *mut c_char {
    clear_last_error();

    if handle.is_null() {
        set_last_error("Null flow pointer");
        return ptr::null_mut();
    }
    let handle = &mut *handle;

    let input_str = match cstr_to_string(input_json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid input string pointer");
            return ptr::null_mut();
        }
    };

    let result = serde_json::from_str::<StageInput>(&input_str)
        .map_err(FlowError::from)
        .and_then(|input| handle.flow.handle(input))
        .and_then(|status| {
            let mut state = state_json(&handle.flow);
            state["status"] = serde_json::to_value(&status)?;
            Ok(serde_json::to_string(&state)?)
        });
    json_or_null(result)
}

/// Submit the questionnaire form (camelCase JSON) and return the new record.
///
/// # Safety
/// - `handle` must be a valid pointer returned by `screening_flow_new`.
/// - `form_json` must be a valid null-terminated C string.
/// - Returns a newly allocated string that must be freed with `screening_free_string`.
/// - Returns NULL on error; call `screening_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn screening_flow_submit(
    handle: *mut ScreeningFlowHandle,
    form_json: *const c_char,
) -> *mut c_char {
    clear_last_error();

    if handle.is_null() {
        set_last_error("Null flow pointer");
        return ptr::null_mut();
    }
    let handle = &mut *handle;

    let form_str = match cstr_to_string(form_json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid form string pointer");
            return ptr::null_mut();
        }
    };

    let result = QuestionnaireForm::from_json(&form_str)
        .and_then(|form| handle.flow.submit_questionnaire(form))
        .and_then(|record| Ok(record.to_json()?));
    json_or_null(result)
}

/// Record an activity score (0 or 1) under `key`.
///
/// # Safety
/// - `handle` must be a valid pointer returned by `screening_flow_new`.
/// - `key` must be a valid null-terminated C string.
/// - Returns 0 when the record was written, non-zero otherwise.
/// - On error, call `screening_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn screening_flow_record(
    handle: *mut ScreeningFlowHandle,
    key: *const c_char,
    score: i32,
) -> i32 {
    clear_last_error();

    if handle.is_null() {
        set_last_error("Null flow pointer");
        return -1;
    }
    let handle = &mut *handle;

    let key_str = match cstr_to_string(key) {
        Some(s) => s,
        None => {
            set_last_error("Invalid key string pointer");
            return -1;
        }
    };

    let score = match score {
        0 | 1 => score as u8,
        other => {
            set_last_error(&format!("Score must be 0 or 1, got {}", other));
            return -1;
        }
    };

    match handle.flow.record(&key_str, ActivityResult::Score(score)) {
        Ok(RecordOutcome::Written) => 0,
        Ok(outcome) => {
            set_last_error(&format!("Result for {} not written: {:?}", key_str, outcome));
            1
        }
        Err(e) => {
            set_last_error(&e.to_string());
            -1
        }
    }
}

/// Return the summary as JSON (`{"state": "no_data"}` when nothing is stored).
///
/// # Safety
/// - `handle` must be a valid pointer returned by `screening_flow_new`.
/// - Returns a newly allocated string that must be freed with `screening_free_string`.
#[no_mangle]
pub unsafe extern "C" fn screening_flow_summary_json(
    handle: *const ScreeningFlowHandle,
) -> *mut c_char {
    clear_last_error();

    if handle.is_null() {
        set_last_error("Null flow pointer");
        return ptr::null_mut();
    }
    let handle = &*handle;

    json_or_null(serde_json::to_string(&handle.flow.summary()).map_err(FlowError::from))
}

/// Return the clean export of the stored record as JSON.
///
/// # Safety
/// - `handle` must be a valid pointer returned by `screening_flow_new`.
/// - Returns a newly allocated string that must be freed with `screening_free_string`.
/// - Returns NULL when nothing is stored; call `screening_last_error` for details.
#[no_mangle]
pub unsafe extern "C" fn screening_flow_export_json(
    handle: *const ScreeningFlowHandle,
) -> *mut c_char {
    clear_last_error();

    if handle.is_null() {
        set_last_error("Null flow pointer");
        return ptr::null_mut();
    }
    let handle = &*handle;

    let result = handle
        .flow
        .session()
        .load()
        .ok_or(FlowError::NoSession)
        .and_then(|record| {
            Ok(serde_json::to_string_pretty(&CleanExport::from_record(
                &record,
            ))?)
        });
    json_or_null(result)
}

/// Delete the stored record and restart the flow.
///
/// # Safety
/// - `handle` must be a valid pointer returned by `screening_flow_new`.
/// - Returns 0 on success, non-zero on error.
#[no_mangle]
pub unsafe extern "C" fn screening_flow_clear(handle: *mut ScreeningFlowHandle) -> i32 {
    clear_last_error();

    if handle.is_null() {
        set_last_error("Null flow pointer");
        return -1;
    }
    let handle = &mut *handle;

    status_code(handle.flow.reset())
}

// ============================================================================
// Memory Management
// ============================================================================

/// Free a string returned by screening functions.
///
/// # Safety
/// - `ptr` must be a valid pointer returned by a screening function, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn screening_free_string(ptr: *mut c_char) {
    if !ptr.is_null() {
        drop(CString::from_raw(ptr));
    }
}

// ============================================================================
// Error Handling
// ============================================================================

/// Get the last error message.
///
/// # Safety
/// - Returns a pointer to a thread-local error string.
/// - The returned pointer is valid until the next screening function call on this thread.
/// - Do NOT free the returned pointer.
/// - Returns NULL if no error occurred.
#[no_mangle]
pub unsafe extern "C" fn screening_last_error() -> *const c_char {
    LAST_ERROR.with(|e| match &*e.borrow() {
        Some(cstr) => cstr.as_ptr(),
        None => ptr::null(),
    })
}

// ============================================================================
// Version Information
// ============================================================================

/// Get the library version.
///
/// # Safety
/// - Returns a pointer to a static string. Do NOT free.
#[no_mangle]
pub unsafe extern "C" fn screening_version() -> *const c_char {
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr() as *const c_char
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CString;

    const SAM_FORM: &str = r#"{
        "childName": "Sam",
        "childAge": "3",
        "parentName": "Jordan",
        "answers": {"A1": "yes", "A2": "no", "A3": "yes", "A4": "yes", "A5": "yes", "A6": "yes"}
    }"#;

    unsafe fn take_string(ptr: *mut c_char) -> String {
        assert!(!ptr.is_null());
        let s = CStr::from_ptr(ptr).to_str().unwrap().to_string();
        screening_free_string(ptr);
        s
    }

    unsafe fn new_flow(dir: &tempfile::TempDir) -> *mut ScreeningFlowHandle {
        let dir = CString::new(dir.path().to_str().unwrap()).unwrap();
        let handle = screening_flow_new(dir.as_ptr(), ptr::null());
        assert!(!handle.is_null());
        handle
    }

    #[test]
    fn test_ffi_flow_lifecycle() {
        let dir = tempfile::tempdir().unwrap();
        unsafe {
            let handle = new_flow(&dir);

            let form = CString::new(SAM_FORM).unwrap();
            let record = take_string(screening_flow_submit(handle, form.as_ptr()));
            assert!(record.contains(r#""name":"Sam""#));

            let key = CString::new("responseToName").unwrap();
            assert_eq!(screening_flow_record(handle, key.as_ptr(), 1), 0);

            let summary: serde_json::Value =
                serde_json::from_str(&take_string(screening_flow_summary_json(handle))).unwrap();
            assert_eq!(summary["state"], "ready");
            assert_eq!(summary["gamesPassed"], 1);

            let export: serde_json::Value =
                serde_json::from_str(&take_string(screening_flow_export_json(handle))).unwrap();
            assert_eq!(export["games"]["responseToName"], 1);

            assert_eq!(screening_flow_clear(handle), 0);
            let summary = take_string(screening_flow_summary_json(handle));
            assert_eq!(summary, r#"{"state":"no_data"}"#);

            screening_flow_free(handle);
        }
    }

    #[test]
    fn test_ffi_send_inputs() {
        let dir = tempfile::tempdir().unwrap();
        unsafe {
            let handle = new_flow(&dir);

            let state: serde_json::Value =
                serde_json::from_str(&take_string(screening_flow_start(handle))).unwrap();
            assert_eq!(state["mode"], "running");
            assert_eq!(state["view"]["stage"], "questionnaire");

            let input = CString::new(format!(
                r#"{{"type": "submit_questionnaire", {}"#,
                SAM_FORM.trim().trim_start_matches('{')
            ))
            .unwrap();
            let state: serde_json::Value =
                serde_json::from_str(&take_string(screening_flow_send(handle, input.as_ptr())))
                    .unwrap();
            assert_eq!(state["status"]["status"], "advanced");
            assert_eq!(state["view"]["stage"], "welcome");

            let bad = CString::new(r#"{"type": "start"}"#).unwrap();
            assert!(screening_flow_send(handle, bad.as_ptr()).is_null());
            let error = CStr::from_ptr(screening_last_error()).to_str().unwrap();
            assert_eq!(error, "Stage welcome does not accept start");

            screening_flow_free(handle);
        }
    }

    #[test]
    fn test_ffi_error_handling() {
        let dir = tempfile::tempdir().unwrap();
        unsafe {
            let handle = new_flow(&dir);

            // Nothing to record into yet
            let key = CString::new("pointing").unwrap();
            assert_eq!(screening_flow_record(handle, key.as_ptr(), 1), -1);
            assert!(!screening_last_error().is_null());

            assert_eq!(screening_flow_record(handle, key.as_ptr(), 7), -1);
            let error = CStr::from_ptr(screening_last_error()).to_str().unwrap();
            assert!(error.contains("0 or 1"));

            let form = CString::new(r#"{"childName": "", "parentName": "Jordan"}"#).unwrap();
            assert!(screening_flow_submit(handle, form.as_ptr()).is_null());

            assert!(screening_flow_export_json(handle).is_null());
            assert!(screening_flow_start(ptr::null_mut()).is_null());

            screening_flow_free(handle);
        }
    }

    #[test]
    fn test_ffi_rejects_bad_config() {
        let dir = CString::new("/tmp").unwrap();
        let config = CString::new(r#"{"storageKey": ""}"#).unwrap();
        unsafe {
            let handle = screening_flow_new(dir.as_ptr(), config.as_ptr());
            assert!(handle.is_null());
            let error = CStr::from_ptr(screening_last_error()).to_str().unwrap();
            assert!(error.starts_with("Invalid configuration"));
        }
    }

    #[test]
    fn test_ffi_version() {
        unsafe {
            let version = screening_version();
            assert!(!version.is_null());

            let version_str = CStr::from_ptr(version).to_str().unwrap();
            assert_eq!(version_str, crate::VERSION);
        }
    }
}
