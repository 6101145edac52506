//! Content-script wiring
//!
//! The controller lives in a thread-local and is only borrowed inside
//! synchronous callbacks, never across an `.await`. Async work (storage reads,
//! the remote fetch) runs on `spawn_local` and re-enters the controller once
//! it has a result.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::spawn_local;
use web_sys::{Element, MutationObserver, MutationObserverInit, Window};

use sieve_runtime::{load_state, Controller, RootPoll, RuntimeConfig, StorageChange};

use crate::fetch::WindowFetcher;
use crate::storage::{self, ChromeStore};
use crate::surface::DocumentSurface;

thread_local! {
    static CONTROLLER: RefCell<Option<Controller<DocumentSurface>>> = const { RefCell::new(None) };
    static OBSERVER: RefCell<Option<MutationObserver>> = const { RefCell::new(None) };
}

fn with_controller<R>(f: impl FnOnce(&mut Controller<DocumentSurface>) -> R) -> Option<R> {
    CONTROLLER.with(|cell| cell.borrow_mut().as_mut().map(f))
}

pub fn is_running() -> bool {
    CONTROLLER.with(|cell| cell.borrow().is_some())
}

/// Install the controller and start every trigger.
pub fn start(config: RuntimeConfig) -> Result<(), JsValue> {
    if is_running() {
        return Err(JsValue::from_str("Already started. Reload the page to restart."));
    }
    let window = web_sys::window().ok_or_else(|| JsValue::from_str("No window"))?;
    let document = window
        .document()
        .ok_or_else(|| JsValue::from_str("No document"))?;
    let href = window.location().href()?;

    let root_poll_ms = config.root_poll_ms as i32;
    let url_poll_ms = config.url_poll_ms as i32;
    let controller = Controller::new(config, DocumentSurface::new(document), &href);
    CONTROLLER.with(|cell| *cell.borrow_mut() = Some(controller));

    install_observer()?;
    storage::on_changed(on_storage_changed)?;
    start_root_poll(&window, root_poll_ms)?;
    start_url_poll(&window, url_poll_ms)?;
    spawn_local(reload());

    log::info!("filter started on {href}");
    Ok(())
}

// =============================================================================
// Mutations
// =============================================================================

fn install_observer() -> Result<(), JsValue> {
    let callback = Closure::wrap(Box::new(
        move |_mutations: js_sys::Array, _observer: MutationObserver| {
            if with_controller(|c| c.notify_mutation()) == Some(true) {
                // One microtask per burst.
                spawn_local(async {
                    with_controller(|c| c.flush());
                });
            }
        },
    ) as Box<dyn FnMut(js_sys::Array, MutationObserver)>);

    let observer = MutationObserver::new(callback.as_ref().unchecked_ref())?;
    callback.forget();
    OBSERVER.with(|cell| *cell.borrow_mut() = Some(observer));
    Ok(())
}

/// Point the observer at a (new) results root.
fn observe(root: &Element) {
    OBSERVER.with(|cell| {
        let Some(observer) = cell.borrow().clone() else {
            return;
        };
        observer.disconnect();

        let options = MutationObserverInit::new();
        options.set_child_list(true);
        options.set_subtree(true);
        if let Err(e) = observer.observe_with_options(root, &options) {
            log::warn!("failed to observe results root: {e:?}");
        }
    });
}

fn attach_if_new() {
    let attached = with_controller(|c| match c.poll_root() {
        RootPoll::Attached(_) => c.root().cloned(),
        RootPoll::Missing | RootPoll::Unchanged => None,
    })
    .flatten();
    if let Some(root) = attached {
        observe(&root);
    }
}

// =============================================================================
// Settings
// =============================================================================

fn on_storage_changed(changes: Vec<StorageChange>) {
    if with_controller(|c| c.wants_reload(&changes)) == Some(true) {
        spawn_local(reload());
    }
}

async fn reload() {
    let Some((ticket, config)) = with_controller(|c| (c.begin_reload(), c.config().clone())) else {
        return;
    };
    let now_ms = js_sys::Date::now() as u64;

    match load_state(&ChromeStore, &WindowFetcher, &config, now_ms).await {
        Ok(snapshot) => {
            with_controller(|c| c.apply_snapshot(ticket, &snapshot));
        }
        Err(e) => log::warn!("failed to load settings: {e}"),
    }
}

// =============================================================================
// Timers
// =============================================================================

/// Poll for a late results root until it appears or the attempts run out.
fn start_root_poll(window: &Window, interval_ms: i32) -> Result<(), JsValue> {
    let handle: Rc<Cell<Option<i32>>> = Rc::new(Cell::new(None));
    let handle_in_tick = Rc::clone(&handle);

    let tick = Closure::wrap(Box::new(move || {
        let outcome = with_controller(|c| {
            let poll = c.poll_root();
            let done = matches!(poll, RootPoll::Attached(_) | RootPoll::Unchanged) || c.root_poll_exhausted();
            let root = match poll {
                RootPoll::Attached(_) => c.root().cloned(),
                _ => None,
            };
            (done, root)
        });
        let (done, root) = outcome.unwrap_or((true, None));
        if let Some(root) = root {
            observe(&root);
        }
        if done {
            if let (Some(id), Some(window)) = (handle_in_tick.take(), web_sys::window()) {
                window.clear_interval_with_handle(id);
            }
        }
    }) as Box<dyn FnMut()>);

    let id = window.set_interval_with_callback_and_timeout_and_arguments_0(
        tick.as_ref().unchecked_ref(),
        interval_ms,
    )?;
    handle.set(Some(id));
    tick.forget();
    Ok(())
}

/// Detect in-page navigation and root replacement.
fn start_url_poll(window: &Window, interval_ms: i32) -> Result<(), JsValue> {
    let tick = Closure::wrap(Box::new(move || {
        let Some(href) = web_sys::window().and_then(|w| w.location().href().ok()) else {
            return;
        };
        with_controller(|c| c.check_url(&href));
        attach_if_new();
    }) as Box<dyn FnMut()>);

    window.set_interval_with_callback_and_timeout_and_arguments_0(
        tick.as_ref().unchecked_ref(),
        interval_ms,
    )?;
    tick.forget();
    Ok(())
}
