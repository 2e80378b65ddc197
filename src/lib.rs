pub mod config;
pub mod dsp;
pub mod encoder;
pub mod error;
pub mod output;
pub mod reveal;
pub mod scheduler;
pub mod synth;
pub mod transmitter;

#[cfg(feature = "driver")]
pub mod driver;

use crate::config::TransmitConfig;
use crate::dsp::engine::check_sample_rate;
use crate::error::{render_report, TalkwireError};
use crate::transmitter::prepare;
use wasm_bindgen::prelude::*;

pub use crate::transmitter::{Prepared, Transmitter};

/// The crate version, read from Cargo.toml at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// WASM-exposed: return the talkwire-core version string.
#[wasm_bindgen]
pub fn core_version() -> String {
    VERSION.to_string()
}

/// Parse a JSON config; an empty string selects the default preset.
pub fn config_from_json(json: &str) -> error::Result<TransmitConfig> {
    if json.trim().is_empty() {
        Ok(TransmitConfig::default())
    } else {
        TransmitConfig::from_json(json)
    }
}

/// Prepare `text` and render it to WAV bytes.
pub fn render_text_to_wav(
    text: &str,
    config: &TransmitConfig,
    sample_rate: u32,
) -> error::Result<Vec<u8>> {
    check_sample_rate(sample_rate)?;
    let prepared = prepare(text, config)?;
    dsp::renderer::render_wav(&prepared.timeline, config.master_gain, sample_rate)
}

/// Prepare `text` and render it to mono samples.
pub fn render_text_to_samples(
    text: &str,
    config: &TransmitConfig,
    sample_rate: u32,
) -> error::Result<Vec<f32>> {
    check_sample_rate(sample_rate)?;
    let prepared = prepare(text, config)?;
    let engine = dsp::engine::AudioEngine::new(sample_rate as f64);
    engine.checked_len(prepared.timeline.end_time())?;
    let samples = engine.render(&prepared.timeline, config.master_gain);
    Ok(samples.iter().map(|&s| s as f32).collect())
}

fn js_error(text: &str, err: TalkwireError) -> JsValue {
    JsValue::from_str(&render_report(text.trim(), &err))
}

/// WASM-exposed: encode and schedule `text`, returning the timeline, timing
/// and reveal plan as a JS object.
#[wasm_bindgen]
pub fn schedule_text(text: &str, config_json: &str) -> Result<JsValue, JsValue> {
    let config = config_from_json(config_json).map_err(|e| js_error(text, e))?;
    let prepared = prepare(text, &config).map_err(|e| js_error(text, e))?;
    serde_wasm_bindgen::to_value(&prepared).map_err(|e| JsValue::from_str(&format!("{e}")))
}

/// WASM-exposed: render `text` to a WAV byte array.
#[wasm_bindgen]
pub fn render_text_wav(text: &str, config_json: &str, sample_rate: u32) -> Result<Vec<u8>, JsValue> {
    let config = config_from_json(config_json).map_err(|e| js_error(text, e))?;
    render_text_to_wav(text, &config, sample_rate).map_err(|e| js_error(text, e))
}

/// WASM-exposed: render `text` to mono f32 samples for AudioWorklet playback.
#[wasm_bindgen]
pub fn render_text_samples(text: &str, config_json: &str, sample_rate: u32) -> Result<Vec<f32>, JsValue> {
    let config = config_from_json(config_json).map_err(|e| js_error(text, e))?;
    render_text_to_samples(text, &config, sample_rate).map_err(|e| js_error(text, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_json_is_default() {
        assert_eq!(config_from_json("  ").unwrap(), TransmitConfig::default());
    }

    #[test]
    fn full_pipeline_text_to_wav() {
        let config = TransmitConfig::bit_fixed();
        let wav = render_text_to_wav("Hi", &config, 8000).unwrap();
        assert_eq!(&wav[0..4], b"RIFF");
        // 44-byte header + 1.48s * 8000 * 2 bytes
        assert_eq!(wav.len(), 44 + 11840 * 2);
    }

    #[test]
    fn samples_match_timing() {
        let config = TransmitConfig::char_tones();
        let prepared = prepare("Hello", &config).unwrap();
        let samples = render_text_to_samples("Hello", &config, 10000).unwrap();
        let expected = (prepared.timing.total_duration * 10000.0).round() as usize;
        assert!(
            samples.len().abs_diff(expected) <= 1,
            "{} samples for {:.3}s",
            samples.len(),
            prepared.timing.total_duration
        );
    }

    #[test]
    fn empty_text_renders_nothing() {
        let err = render_text_to_wav("   ", &TransmitConfig::default(), 8000).unwrap_err();
        assert_eq!(err, TalkwireError::EmptyInput);
    }

    #[test]
    fn wasm_exports_keep_js_error_signatures() {
        let _: fn(&str, &str) -> Result<JsValue, JsValue> = schedule_text;
        let _: fn(&str, &str, u32) -> Result<Vec<u8>, JsValue> = render_text_wav;
        let _: fn(&str, &str, u32) -> Result<Vec<f32>, JsValue> = render_text_samples;
    }

    #[test]
    fn runaway_config_is_an_error_not_a_crash() {
        let json = r#"{ "handshake": { "frequencies": [800.0], "duration": 1e20 } }"#;
        assert!(matches!(config_from_json(json), Err(TalkwireError::InvalidConfig(_))));

        let err = render_text_to_samples("a", &TransmitConfig::default(), 0).unwrap_err();
        assert!(matches!(err, TalkwireError::InvalidConfig(_)));
    }

    #[test]
    fn prepared_serializes_to_json() {
        let prepared = prepare("Hi", &TransmitConfig::default()).unwrap();
        let json = serde_json::to_value(&prepared).unwrap();
        assert_eq!(json["timing"]["symbol_count"], 2);
        assert_eq!(json["timeline"]["body"][0]["symbol"]["kind"], "char");
        assert_eq!(json["timeline"]["body"][0]["tones"][2]["waveform"], "sawtooth");
    }
}
