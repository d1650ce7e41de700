//! `HtmlAudioElement` playback.

use std::rc::Rc;

use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::JsFuture;
use web_sys::HtmlAudioElement;

use crate::audio::{AudioBackend, AudioHandle};
use crate::error::AmpersoundError;
use crate::web::timers::js_error;

#[derive(Debug, Clone, Copy, Default)]
pub struct WebAudio;

impl AudioBackend for WebAudio {
    type Handle = WebAudioHandle;

    fn open(&self, url: &str) -> Result<WebAudioHandle, AmpersoundError> {
        let element = HtmlAudioElement::new_with_src(url)
            .map_err(|e| AmpersoundError::Playback(js_error(e)))?;
        Ok(WebAudioHandle {
            element,
            pending_play: None,
            listeners: Vec::new(),
        })
    }
}

/// Media element plus the listeners wired to it. Dropping the handle drops
/// the listeners, so callbacks must never release the slot synchronously.
pub struct WebAudioHandle {
    element: HtmlAudioElement,
    /// `play()` promise; autoplay rejections settle it after the hover step.
    pending_play: Option<js_sys::Promise>,
    listeners: Vec<Closure<dyn FnMut()>>,
}

impl WebAudioHandle {
    /// Call `on_end` when the medium finishes and `on_error` when it fails,
    /// including a late rejection of the `play()` that started it.
    pub fn watch<E, F>(&mut self, on_end: E, on_error: F)
    where
        E: Fn() + 'static,
        F: Fn(String) + 'static,
    {
        let on_error = Rc::new(on_error);

        let ended = Closure::wrap(Box::new(on_end) as Box<dyn FnMut()>);
        self.element.set_onended(Some(ended.as_ref().unchecked_ref()));

        let element = self.element.clone();
        let report = Rc::clone(&on_error);
        let failed = Closure::wrap(Box::new(move || {
            let message = element
                .error()
                .map(|e| format!("media error {}", e.code()))
                .unwrap_or_else(|| "media error".to_string());
            report(message);
        }) as Box<dyn FnMut()>);
        self.element.set_onerror(Some(failed.as_ref().unchecked_ref()));

        self.listeners.push(ended);
        self.listeners.push(failed);

        if let Some(promise) = self.pending_play.take() {
            wasm_bindgen_futures::spawn_local(async move {
                if let Err(e) = JsFuture::from(promise).await {
                    on_error(js_error(e));
                }
            });
        }
    }
}

impl AudioHandle for WebAudioHandle {
    fn play(&mut self) -> Result<(), AmpersoundError> {
        let promise = self
            .element
            .play()
            .map_err(|e| AmpersoundError::Playback(js_error(e)))?;
        self.pending_play = Some(promise);
        Ok(())
    }

    fn pause(&mut self) {
        let _ = self.element.pause();
    }

    fn detach(&mut self) {
        self.element.set_onended(None);
        self.element.set_onerror(None);
        self.element.remove_attribute("src").ok();
        self.element.load();
        self.pending_play = None;
        self.listeners.clear();
    }
}
