//! Browser host glue.
//!
//! Binds a [`ViewerSession`] to a DOM element: the element is the
//! [`Container`], a [`WgpuBackend`] draws into its canvas, progress text goes
//! into the configured progress elements, assets are streamed with
//! `window.fetch`, and frames are driven by `requestAnimationFrame`.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::JsFuture;

use crate::asset::source::{AssetSource, SourceError, SourceFuture};
use crate::asset::progress::ChunkedBody;
use crate::asset::{AssetLoader, ProgressSink, ProgressTracker};
use crate::backend::{RenderBackend, WgpuBackend};
use crate::cancel::CancellationToken;
use crate::config::{DomSettings, ViewerConfig};
use crate::error::ViewerError;
use crate::session::{Container, FrameStatus, ViewerSession};

fn js_error(value: JsValue) -> SourceError {
    SourceError::Js(format!("{value:?}"))
}

fn js_message(err: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&err.to_string())
}

/// Fetches assets with the browser's `fetch`, reading the body chunk by
/// chunk so progress advances while bytes arrive.
#[derive(Debug, Clone, Copy, Default)]
pub struct FetchSource;

impl AssetSource for FetchSource {
    fn fetch<'a>(
        &'a self,
        url: &'a str,
        progress: &'a ProgressTracker,
    ) -> SourceFuture<'a, Vec<u8>> {
        Box::pin(async move {
            let window = web_sys::window().ok_or_else(|| SourceError::Js("no window".into()))?;
            let response: web_sys::Response = JsFuture::from(window.fetch_with_str(url))
                .await
                .map_err(js_error)?
                .dyn_into()
                .map_err(js_error)?;

            if !response.ok() {
                return Err(SourceError::Http {
                    url: url.to_string(),
                    status: response.status(),
                });
            }

            let total = response
                .headers()
                .get("content-length")
                .ok()
                .flatten()
                .and_then(|len| len.parse::<u64>().ok());
            progress.update(0, total);

            let data = match response.body() {
                Some(body) => read_body(body, total, progress).await?,
                None => {
                    let buffer = JsFuture::from(response.array_buffer().map_err(js_error)?)
                        .await
                        .map_err(js_error)?;
                    js_sys::Uint8Array::new(&buffer).to_vec()
                }
            };
            let len = data.len() as u64;
            progress.update(len, Some(total.unwrap_or(len)));
            Ok::<_, SourceError>(data)
        })
    }
}

async fn read_body(
    body: web_sys::ReadableStream,
    total: Option<u64>,
    progress: &ProgressTracker,
) -> Result<Vec<u8>, SourceError> {
    let reader: web_sys::ReadableStreamDefaultReader =
        body.get_reader().dyn_into().map_err(js_error)?;
    let mut data = ChunkedBody::new(total, progress);

    loop {
        let chunk = JsFuture::from(reader.read()).await.map_err(js_error)?;
        let done = js_sys::Reflect::get(&chunk, &JsValue::from_str("done"))
            .map_err(js_error)?
            .as_bool()
            .unwrap_or(true);
        if done {
            break;
        }
        let bytes: js_sys::Uint8Array = js_sys::Reflect::get(&chunk, &JsValue::from_str("value"))
            .map_err(js_error)?
            .dyn_into()
            .map_err(js_error)?;

        data.push(&bytes.to_vec());
    }
    Ok(data.into_bytes())
}

/// Writes progress text into every matching element
pub struct DomProgressSink {
    elements: Vec<web_sys::Element>,
}

impl DomProgressSink {
    pub fn new(document: &web_sys::Document, classes: &[String]) -> Self {
        let mut elements = Vec::new();
        for class in classes {
            let found = document.get_elements_by_class_name(class);
            for i in 0..found.length() {
                if let Some(element) = found.item(i) {
                    elements.push(element);
                }
            }
        }
        Self { elements }
    }
}

impl ProgressSink for DomProgressSink {
    fn report(&self, text: &str) {
        for element in &self.elements {
            element.set_text_content(Some(text));
        }
    }
}

/// A DOM element hosting the viewer canvas
pub struct DomContainer {
    element: web_sys::HtmlElement,
    canvas: web_sys::HtmlCanvasElement,
    loaded_class: String,
}

impl DomContainer {
    pub fn new(
        document: &web_sys::Document,
        element: web_sys::HtmlElement,
        dom: &DomSettings,
    ) -> Result<Self, JsValue> {
        let canvas: web_sys::HtmlCanvasElement =
            document.create_element("canvas")?.dyn_into()?;
        let style = canvas.style();
        style.set_property("max-width", "100%")?;
        style.set_property("max-height", "100%")?;
        style.set_property("object-fit", "contain")?;
        style.set_property("display", "block")?;
        Ok(Self {
            element,
            canvas,
            loaded_class: dom.loaded_class.clone(),
        })
    }

    pub fn canvas(&self) -> &web_sys::HtmlCanvasElement {
        &self.canvas
    }
}

impl Container for DomContainer {
    fn is_loaded(&self) -> bool {
        self.element.class_list().contains(&self.loaded_class)
    }

    fn set_loaded(&self, loaded: bool) {
        let classes = self.element.class_list();
        let result = if loaded {
            classes.add_1(&self.loaded_class)
        } else {
            classes.remove_1(&self.loaded_class)
        };
        if let Err(err) = result {
            log::warn!("Could not update container class: {err:?}");
        }
    }

    fn attach_surface(&self) {
        if let Err(err) = self.element.append_child(&self.canvas) {
            log::error!("Could not attach canvas: {err:?}");
        }
    }

    fn detach_surface(&self) {
        self.canvas.remove();
    }

    fn display_size(&self) -> (u32, u32) {
        let width = self.element.client_width().max(0) as u32;
        let height = self.element.client_height().max(0) as u32;
        (width, height)
    }

    fn resize_surface(&self, width: u32, height: u32) {
        self.canvas.set_width(width);
        self.canvas.set_height(height);
    }
}

type FrameCallback = Closure<dyn FnMut(f64)>;

/// Running viewer. Dropping it stops the frame loop, removes the resize
/// listener and releases the container.
pub struct ViewerHandle<R: RenderBackend + 'static> {
    session: Rc<RefCell<ViewerSession<DomContainer, R>>>,
    cancel: CancellationToken,
    running: Rc<Cell<bool>>,
    frame_id: Rc<Cell<Option<i32>>>,
    frame_callback: Rc<RefCell<Option<FrameCallback>>>,
    resize_listener: Closure<dyn FnMut(web_sys::Event)>,
}

impl<R: RenderBackend + 'static> ViewerHandle<R> {
    pub fn session(&self) -> &Rc<RefCell<ViewerSession<DomContainer, R>>> {
        &self.session
    }
}

impl<R: RenderBackend + 'static> Drop for ViewerHandle<R> {
    fn drop(&mut self) {
        self.running.set(false);
        if let Some(window) = web_sys::window() {
            if let Some(id) = self.frame_id.take() {
                let _ = window.cancel_animation_frame(id);
            }
            let _ = window.remove_event_listener_with_callback(
                "resize",
                self.resize_listener.as_ref().unchecked_ref(),
            );
        }
        self.frame_callback.borrow_mut().take();
        match self.session.try_borrow_mut() {
            Ok(mut session) => session.shutdown(),
            // Still loading: the session shuts down once the cancelled load lets go of it.
            Err(_) => self.cancel.cancel(),
        }
    }
}

/// Mount a viewer on `container` with the given backend and start loading.
pub fn mount<R: RenderBackend + 'static>(
    container: DomContainer,
    config: ViewerConfig,
    backend: R,
) -> Result<ViewerHandle<R>, JsValue> {
    let window = web_sys::window().ok_or_else(|| JsValue::from_str("no window"))?;
    let document = window
        .document()
        .ok_or_else(|| JsValue::from_str("no document"))?;

    let progress: Rc<dyn ProgressSink> =
        Rc::new(DomProgressSink::new(&document, &config.dom.progress_classes));
    let session = ViewerSession::new(container, backend, config).map_err(js_message)?;
    let cancel = session.cancel_handle();
    let session = Rc::new(RefCell::new(session));

    {
        let session = session.clone();
        wasm_bindgen_futures::spawn_local(async move {
            let loader = AssetLoader::new(FetchSource);
            let mut session = match session.try_borrow_mut() {
                Ok(session) => session,
                Err(_) => return,
            };
            if let Err(err) = session.load(&loader, progress).await {
                log::error!("Viewer failed to load: {err}");
            }
        });
    }

    let resize_listener = {
        let session = session.clone();
        Closure::<dyn FnMut(web_sys::Event)>::new(move |_event: web_sys::Event| {
            if let Ok(mut session) = session.try_borrow_mut() {
                session.on_window_resize();
            }
        })
    };
    window
        .add_event_listener_with_callback("resize", resize_listener.as_ref().unchecked_ref())?;

    let running = Rc::new(Cell::new(true));
    let frame_id = Rc::new(Cell::new(None));
    let frame_callback: Rc<RefCell<Option<FrameCallback>>> = Rc::new(RefCell::new(None));
    {
        let session = session.clone();
        let running = running.clone();
        let frame_id = frame_id.clone();
        let next = frame_callback.clone();
        let last_time = Cell::new(None::<f64>);

        *frame_callback.borrow_mut() = Some(Closure::new(move |now: f64| {
            if !running.get() {
                return;
            }
            let dt = last_time.get().map_or(0.0, |last| ((now - last) / 1000.0) as f32);
            last_time.set(Some(now));

            // Busy while a load holds the session
            if let Ok(mut session) = session.try_borrow_mut() {
                match session.frame(dt) {
                    Ok(FrameStatus::Stopped) => running.set(false),
                    Ok(_) => {}
                    Err(err) => log::warn!("Frame failed: {err}"),
                }
            }

            if running.get() {
                let next = next.borrow();
                if let (Some(window), Some(callback)) = (web_sys::window(), next.as_ref()) {
                    frame_id.set(
                        window
                            .request_animation_frame(callback.as_ref().unchecked_ref())
                            .ok(),
                    );
                }
            }
        }));
    }
    if let Some(callback) = frame_callback.borrow().as_ref() {
        frame_id.set(Some(
            window.request_animation_frame(callback.as_ref().unchecked_ref())?,
        ));
    }

    log::debug!("Viewer mounted");
    Ok(ViewerHandle {
        session,
        cancel,
        running,
        frame_id,
        frame_callback,
        resize_listener,
    })
}

/// JavaScript entry point.
///
/// `await WebViewer.create(settings)` parses the settings object, finds the
/// first container element, brings up the GPU surface on a fresh canvas and
/// mounts a viewer on it. The model keeps loading after the promise
/// resolves. The returned object must be kept alive by the page.
#[wasm_bindgen]
pub struct WebViewer {
    _handle: ViewerHandle<WgpuBackend>,
}

#[wasm_bindgen]
impl WebViewer {
    pub async fn create(settings_json: String) -> Result<WebViewer, JsValue> {
        crate::init_logging();
        let config = ViewerConfig::from_json(&settings_json).map_err(js_message)?;

        let document = web_sys::window()
            .and_then(|w| w.document())
            .ok_or_else(|| JsValue::from_str("no document"))?;
        let element = config
            .dom
            .container_classes
            .iter()
            .find_map(|class| document.get_elements_by_class_name(class).item(0))
            .ok_or_else(|| JsValue::from_str("no viewer container found"))?
            .dyn_into::<web_sys::HtmlElement>()?;

        let container = DomContainer::new(&document, element, &config.dom)?;
        // Refused before a GPU device exists; the session checks again after the await
        if container.is_loaded() {
            log::error!("Attempted to load viewer, but it has already been loaded");
            return Err(js_message(ViewerError::DuplicateSession));
        }

        let (width, height) = container.display_size();
        let backend = WgpuBackend::from_canvas(container.canvas(), width.max(1), height.max(1))
            .await
            .map_err(js_message)?;
        let handle = mount(container, config, backend)?;
        Ok(WebViewer { _handle: handle })
    }
}
