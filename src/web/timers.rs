//! Host clock and one-shot timers.

use gloo_timers::callback::Timeout;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;

use crate::debounce::Millis;
use crate::error::AmpersoundError;

pub fn now() -> Millis {
    js_sys::Date::now() as Millis
}

/// Stringify a thrown JS value for logs and error messages.
pub(crate) fn js_error(value: JsValue) -> String {
    if let Some(err) = value.dyn_ref::<js_sys::Error>() {
        return String::from(err.message());
    }
    value.as_string().unwrap_or_else(|| format!("{:?}", value))
}

pub(crate) fn window() -> Result<web_sys::Window, AmpersoundError> {
    web_sys::window().ok_or_else(|| AmpersoundError::Dom("no window".into()))
}

/// Run `f` once at `deadline` (host clock). The engines expect to be ticked
/// with the exact deadline they handed out, so pass it through to `f`.
pub fn arm<F>(deadline: Millis, f: F)
where
    F: FnOnce(Millis) + 'static,
{
    let delay = deadline.saturating_sub(now()).min(u32::MAX as Millis) as u32;
    // Dropping a `Timeout` cancels it.
    Timeout::new(delay, move || f(deadline)).forget();
}
