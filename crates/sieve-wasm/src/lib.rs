//! WebAssembly bindings for ResultSieve
//!
//! `start` runs the filter as a content script on a results page. The other
//! exports are small helpers for the options page.

pub mod content;
pub mod fetch;
pub mod logger;
pub mod storage;
pub mod surface;

use log::LevelFilter;
use wasm_bindgen::prelude::*;

use sieve_core::domain::{normalize, Domain};
use sieve_core::MatchDecision;
use sieve_lists::{effective_from_domains, parse_domain_list};
use sieve_runtime::RuntimeConfig;

/// Start filtering the current page. `config_json` overrides the defaults
/// field by field.
#[wasm_bindgen]
pub fn start(config_json: Option<String>, debug: bool) -> Result<(), JsValue> {
    logger::init(if debug { LevelFilter::Debug } else { LevelFilter::Info });

    let config = match config_json.as_deref() {
        Some(json) if !json.trim().is_empty() => RuntimeConfig::from_json(json)
            .map_err(|e| JsValue::from_str(&format!("Invalid config: {}", e)))?,
        _ => RuntimeConfig::default(),
    };
    content::start(config)
}

#[wasm_bindgen]
pub fn is_started() -> bool {
    content::is_running()
}

/// Canonical domain for one list line, or `undefined`.
#[wasm_bindgen]
pub fn normalize_domain(line: &str) -> Option<String> {
    normalize(line).map(Domain::into_string)
}

/// Parse list text into an array of canonical domains plus line counts.
#[wasm_bindgen]
pub fn parse_list(text: &str) -> JsValue {
    let parsed = parse_domain_list(text);
    let domains: js_sys::Array = parsed
        .domains
        .iter()
        .map(|d| JsValue::from_str(d.as_str()))
        .collect();

    let result = js_sys::Object::new();
    let _ = js_sys::Reflect::set(&result, &"domains".into(), &domains);
    let _ = js_sys::Reflect::set(&result, &"lines".into(), &JsValue::from(parsed.stats.lines as u32));
    let _ = js_sys::Reflect::set(&result, &"rejected".into(), &JsValue::from(parsed.stats.rejected as u32));
    let _ = js_sys::Reflect::set(&result, &"duplicates".into(), &JsValue::from(parsed.stats.duplicates as u32));
    result.into()
}

/// Decide `host` against a blocklist and allowlist given as string arrays.
/// Returns `"block"`, `"allow"` or `"none"`.
#[wasm_bindgen]
pub fn check_host(host: &str, blocklist: JsValue, allowlist: JsValue) -> String {
    let lists = effective_from_domains(domains_of(&blocklist), domains_of(&allowlist));
    match lists.decide(&host.to_ascii_lowercase()) {
        MatchDecision::Block => "block",
        MatchDecision::Allow => "allow",
        MatchDecision::NotListed => "none",
    }
    .to_string()
}

fn domains_of(value: &JsValue) -> Vec<Domain> {
    if !js_sys::Array::is_array(value) {
        return Vec::new();
    }
    js_sys::Array::from(value)
        .iter()
        .filter_map(|v| v.as_string())
        .filter_map(|s| normalize(&s))
        .collect()
}
