//! `fetch`-backed remote list retrieval

use async_trait::async_trait;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::JsFuture;
use web_sys::{RequestCache, RequestInit, Response};

use sieve_runtime::{FetchError, ListFetcher};

/// Fetches list text through `window.fetch`, bypassing the HTTP cache.
#[derive(Debug, Default, Clone, Copy)]
pub struct WindowFetcher;

#[async_trait(?Send)]
impl ListFetcher for WindowFetcher {
    async fn fetch_text(&self, url: &str) -> Result<String, FetchError> {
        let transport = |reason: String| FetchError::Transport {
            url: url.to_string(),
            reason,
        };

        let window = web_sys::window().ok_or_else(|| transport("no window".to_string()))?;
        let init = RequestInit::new();
        init.set_cache(RequestCache::NoStore);

        let response = JsFuture::from(window.fetch_with_str_and_init(url, &init))
            .await
            .map_err(|e| transport(format!("{e:?}")))?;
        let response: Response = response
            .dyn_into()
            .map_err(|e| transport(format!("not a response: {e:?}")))?;

        if !response.ok() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: response.status(),
            });
        }

        let body = |reason: String| FetchError::Body {
            url: url.to_string(),
            reason,
        };
        let text = response.text().map_err(|e| body(format!("{e:?}")))?;
        JsFuture::from(text)
            .await
            .map_err(|e| body(format!("{e:?}")))?
            .as_string()
            .ok_or_else(|| body("body is not text".to_string()))
    }
}
