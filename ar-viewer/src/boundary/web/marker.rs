use bevy::log::{debug, info, warn};
use wasm_bindgen::JsValue;

use super::js;
use super::snapshot::{FrameSnapshot, image_result};
use crate::boundary::LocalBoxFuture;
use crate::boundary::runtime::{MarkerDescriptor, MarkerRuntime, MarkerSession, RuntimeError, SessionEvent, XrFrame};

/// Image tracker provided by a page script.
///
/// The script object exposes `start({ path, widthM, heightM })`, resolving
/// to a session with `poll()` and `stop()`. `poll()` returns `null` when no
/// new camera frame was processed, otherwise
/// `{ timestamp, results: [{ index, matrix, state }], ended }` with `state`
/// one of `"tracked"` or `"emulated"`. `timestamp` must grow from one
/// camera frame to the next.
pub struct PageMarkerRuntime {
    tracker: JsValue,
}

impl PageMarkerRuntime {
    pub fn new(tracker: JsValue) -> Self {
        Self { tracker }
    }
}

impl MarkerRuntime for PageMarkerRuntime {
    fn start<'a>(
        &'a self,
        descriptor: &'a MarkerDescriptor,
    ) -> LocalBoxFuture<'a, Result<Box<dyn MarkerSession>, RuntimeError>> {
        Box::pin(async move {
            let target = js::object(&[
                ("path", JsValue::from_str(&descriptor.path)),
                ("widthM", descriptor.width_m.into()),
                ("heightM", descriptor.height_m.into()),
            ])?;
            let started = js::invoke(&self.tracker, "start", &[&target])?;
            let session = js::settle(started).await.map_err(js::fault)?;
            if !js::has_method(&session, "poll") {
                return Err(RuntimeError::Fault("tracker session has no poll()".into()));
            }
            info!("Page tracker started for {}", descriptor.path);
            Ok(Box::new(PageMarkerSession {
                session,
                events: Vec::new(),
                last_timestamp: None,
                yielded_fault: false,
                stopped: false,
            }) as Box<dyn MarkerSession>)
        })
    }
}

struct PageMarkerSession {
    session: JsValue,
    events: Vec<SessionEvent>,
    last_timestamp: Option<f64>,
    yielded_fault: bool,
    stopped: bool,
}

/// One `poll()` answer; `None` when the tracker had nothing new or handed
/// back the camera frame it already reported.
fn read_poll(polled: &JsValue, last_timestamp: Option<f64>) -> Option<(FrameSnapshot, bool)> {
    if js::is_absent(polled) {
        return None;
    }
    let timestamp = js::get(polled, "timestamp").ok().and_then(|t| t.as_f64())?;
    if last_timestamp.is_some_and(|last| timestamp <= last) {
        return None;
    }
    let ended = js::get(polled, "ended").ok().and_then(|e| e.as_bool()).unwrap_or(false);
    let results = js::get(polled, "results").unwrap_or(JsValue::UNDEFINED);

    let images = js::array(&results)
        .iter()
        .filter_map(|result| {
            let index = js::get(result, "index").ok()?.as_f64()?;
            let state = js::get(result, "state").ok()?.as_string()?;
            let pose = js::pose_of(result)?;
            image_result(index as usize, &pose.to_cols_array(), &state)
        })
        .collect();

    let mut frame = FrameSnapshot::at(timestamp);
    frame.images = Some(Ok(images));
    Some((frame, ended))
}

impl MarkerSession for PageMarkerSession {
    fn poll_frame(&mut self) -> Option<Box<dyn XrFrame>> {
        if self.stopped {
            return None;
        }
        let polled = match js::invoke(&self.session, "poll", &[]) {
            Ok(polled) => {
                self.yielded_fault = false;
                polled
            }
            // One fault frame per pump, so the caller's drain loop ends.
            Err(_) if std::mem::take(&mut self.yielded_fault) => return None,
            Err(err) => {
                self.yielded_fault = true;
                let mut frame = FrameSnapshot::at(self.last_timestamp.unwrap_or(0.0));
                frame.images = Some(Err(err));
                return Some(Box::new(frame));
            }
        };
        let (frame, ended) = read_poll(&polled, self.last_timestamp)?;
        self.last_timestamp = Some(frame.timestamp_ms);
        if ended {
            debug!("Page tracker reported its end");
            self.events.push(SessionEvent::End);
        }
        Some(Box::new(frame))
    }

    fn poll_events(&mut self) -> Vec<SessionEvent> {
        std::mem::take(&mut self.events)
    }

    fn stop(&mut self) {
        if std::mem::replace(&mut self.stopped, true) {
            return;
        }
        if let Err(err) = js::invoke(&self.session, "stop", &[]) {
            warn!("Tracker stop failed: {}", err);
        }
    }
}

impl Drop for PageMarkerSession {
    fn drop(&mut self) {
        self.stop();
    }
}
