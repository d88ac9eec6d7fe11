use ahash::AHashSet;
use policy_schema::{ParamValue, Parameter, PolicyState};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

/// Conventions for the query-string representation of a reform.
///
/// Historical deployments diverged on several of these (two-field vs
/// three-field parameter semantics, `unit == "/1"` vs `type == "rate"` for
/// fractional rates, renamed parameters in old shared links); they are
/// configuration here rather than forked code paths.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodecConfig {
    /// Decimal places numbers are rounded to before encoding.
    pub decimals: u32,
    /// Key prefix for baseline overrides. `None` selects the two-field
    /// convention where the reform is measured against the default alone.
    pub baseline_prefix: Option<String>,
    /// Also treat `type == "rate"` payload metadata as a fractional marker.
    pub legacy_rate_tag: bool,
    /// Old query key to current parameter name, applied before lookup so
    /// links minted against retired names keep loading.
    pub renames: Vec<(String, String)>,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            decimals: 2,
            baseline_prefix: Some("baseline_".to_string()),
            legacy_rate_tag: false,
            renames: Vec::new(),
        }
    }
}

/// What the lenient decode path skipped over. Decoding never fails; links
/// with retired or mangled keys still load, but the skips are recorded
/// here (and on the debug log) instead of vanishing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DecodeReport {
    pub unknown_keys: Vec<String>,
    pub malformed: Vec<MalformedKey>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MalformedKey {
    pub key: String,
    pub payload: String,
}

impl DecodeReport {
    pub fn is_clean(&self) -> bool {
        self.unknown_keys.is_empty() && self.malformed.is_empty()
    }
}

fn is_fractional(parameter: &Parameter, config: &CodecConfig) -> bool {
    if parameter.is_fractional_rate() {
        return true;
    }
    config.legacy_rate_tag
        && parameter.extra.get("type").and_then(Value::as_str) == Some("rate")
}

fn round_to(value: f64, decimals: u32) -> f64 {
    let scale = 10f64.powi(decimals as i32);
    (value * scale).round() / scale
}

fn encode_value(parameter: &Parameter, value: &ParamValue, config: &CodecConfig) -> String {
    match value {
        ParamValue::Number(number) => {
            let scaled = if is_fractional(parameter, config) {
                number * 100.0
            } else {
                *number
            };
            // f64 Display prints the shortest round-trip form, so 25.0
            // encodes as "25" and 12.5 as "12_5".
            round_to(scaled, config.decimals)
                .to_string()
                .replace('.', "_")
        }
        ParamValue::Bool(flag) => if *flag { "1" } else { "0" }.to_string(),
        ParamValue::Key(key) => key.clone(),
    }
}

fn decode_value(parameter: &Parameter, payload: &str, config: &CodecConfig) -> Option<ParamValue> {
    match parameter.default_value {
        ParamValue::Number(_) => {
            let number: f64 = payload.replace('_', ".").parse().ok()?;
            let unscaled = if is_fractional(parameter, config) {
                number / 100.0
            } else {
                number
            };
            Some(ParamValue::Number(unscaled))
        }
        ParamValue::Bool(_) => match payload {
            "1" | "true" => Some(ParamValue::Bool(true)),
            "0" | "false" => Some(ParamValue::Bool(false)),
            _ => None,
        },
        ParamValue::Key(_) => parameter
            .allows_key(payload)
            .then(|| ParamValue::Key(payload.to_string())),
    }
}

/// Encode the non-default subset of `state` as a query string.
///
/// Reform keys come first in catalog order, then baseline overrides under
/// the configured prefix. A state with no active parameter encodes as "".
pub fn serialize_query(state: &PolicyState, config: &CodecConfig) -> String {
    let mut pairs = Vec::new();
    for parameter in state.iter() {
        let emit = match config.baseline_prefix {
            Some(_) => parameter.value != *parameter.baseline(),
            None => parameter.is_active(),
        };
        if emit {
            pairs.push(format!(
                "{}={}",
                parameter.name,
                encode_value(parameter, &parameter.value, config)
            ));
        }
    }
    if let Some(prefix) = &config.baseline_prefix {
        for parameter in state.iter() {
            if let Some(baseline) = &parameter.baseline_value {
                if *baseline != parameter.default_value {
                    pairs.push(format!(
                        "{prefix}{}={}",
                        parameter.name,
                        encode_value(parameter, baseline, config)
                    ));
                }
            }
        }
    }
    pairs.join("&")
}

/// Rebuild a policy state from a query string, starting from a copy of
/// `defaults`.
///
/// Unknown keys and malformed payloads never abort decoding: the parameter
/// stays at its default, the skip lands in the returned [`DecodeReport`]
/// and on the `debug` log. A baseline key with no matching reform key also
/// moves the reform value, so a baseline-only link compares like the
/// original it was minted from.
pub fn deserialize_query(
    defaults: &PolicyState,
    query: &str,
    config: &CodecConfig,
) -> (PolicyState, DecodeReport) {
    let mut state = defaults.clone();
    let mut report = DecodeReport::default();

    let mut pairs: Vec<(String, String)> = Vec::new();
    for chunk in query.trim_start_matches('?').split('&') {
        if chunk.is_empty() {
            continue;
        }
        let (key, payload) = chunk.split_once('=').unwrap_or((chunk, ""));
        let key = config
            .renames
            .iter()
            .find(|(old, _)| old == key)
            .map(|(_, current)| current.clone())
            .unwrap_or_else(|| key.to_string());
        pairs.push((key, payload.to_string()));
    }
    let present_keys: AHashSet<&str> = pairs.iter().map(|(key, _)| key.as_str()).collect();

    for (key, payload) in &pairs {
        let (is_baseline, name) = match &config.baseline_prefix {
            Some(prefix) if key.starts_with(prefix.as_str()) => (true, &key[prefix.len()..]),
            _ => (false, key.as_str()),
        };
        let decoded = match state.get(name) {
            None => {
                debug!(key = %key, "ignoring unknown parameter in reform query");
                report.unknown_keys.push(key.clone());
                continue;
            }
            Some(parameter) => match decode_value(parameter, payload, config) {
                None => {
                    debug!(key = %key, payload = %payload, "skipping malformed reform value");
                    report.malformed.push(MalformedKey {
                        key: key.clone(),
                        payload: payload.clone(),
                    });
                    continue;
                }
                Some(decoded) => decoded,
            },
        };
        if let Some(parameter) = state.get_mut(name) {
            if is_baseline {
                parameter.baseline_value = Some(decoded.clone());
                if !present_keys.contains(name) {
                    parameter.value = decoded;
                }
            } else {
                parameter.value = decoded;
            }
        }
    }

    (state, report)
}
