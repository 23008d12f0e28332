use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};
use utoipa::ToSchema;

use crate::error::AppError;

use super::WaveformUpdate;

/// Parsed `audiowaveform` JSON output.
#[derive(Debug, Clone, PartialEq)]
pub struct WaveformResult {
    /// The `data` array, kept exactly as the analyzer emitted it.
    pub peaks: Vec<Number>,
    pub version: Option<u32>,
    pub channels: Option<u32>,
    pub sample_rate: Option<u32>,
    pub samples_per_pixel: Option<u32>,
    pub bits: Option<u32>,
    pub length: Option<u64>,
}

#[derive(Deserialize)]
struct RawWaveform {
    data: Option<Value>,
    version: Option<u32>,
    channels: Option<u32>,
    sample_rate: Option<u32>,
    samples_per_pixel: Option<u32>,
    bits: Option<u32>,
    length: Option<u64>,
}

impl WaveformResult {
    /// Parse the analyzer's JSON artifact. Fails with `MalformedOutput` when
    /// the document is not valid JSON or `data` is missing, not an array of
    /// numbers, or empty.
    pub fn from_json_slice(raw: &[u8]) -> Result<Self, AppError> {
        let parsed: RawWaveform = serde_json::from_slice(raw)
            .map_err(|e| AppError::MalformedOutput(format!("invalid JSON: {}", e)))?;

        let data = match parsed.data {
            Some(Value::Array(items)) => items,
            Some(_) => {
                return Err(AppError::MalformedOutput(
                    "data is not an array".to_string(),
                ))
            }
            None => return Err(AppError::MalformedOutput("data is missing".to_string())),
        };

        if data.is_empty() {
            return Err(AppError::MalformedOutput("data array is empty".to_string()));
        }

        let peaks = data
            .into_iter()
            .map(|item| match item {
                Value::Number(n) => Ok(n),
                other => Err(AppError::MalformedOutput(format!(
                    "data contains a non-numeric value: {}",
                    other
                ))),
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            peaks,
            version: parsed.version,
            channels: parsed.channels,
            sample_rate: parsed.sample_rate,
            samples_per_pixel: parsed.samples_per_pixel,
            bits: parsed.bits,
            length: parsed.length,
        })
    }

    pub fn num_peaks(&self) -> usize {
        self.peaks.len()
    }

    /// Audio duration derived from `length * samples_per_pixel / sample_rate`.
    pub fn duration_seconds(&self) -> Option<f64> {
        let length = self.length?;
        let samples_per_pixel = self.samples_per_pixel?;
        let sample_rate = self.sample_rate.filter(|rate| *rate > 0)?;
        Some(length as f64 * samples_per_pixel as f64 / sample_rate as f64)
    }

    pub fn to_update(&self) -> WaveformUpdate {
        WaveformUpdate {
            peaks: self.peaks.clone(),
            duration_seconds: self.duration_seconds(),
            sample_rate: self.sample_rate,
        }
    }
}

/// Body of `POST /generate-waveform`.
///
/// Fields are optional at the serde level so a missing field surfaces as
/// `Missing <field>` rather than a deserialization error.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GenerateWaveformRequest {
    /// Dropbox shared link or path
    pub url: Option<String>,
    /// Accepted for compatibility; the stored credential is used instead
    pub access_token: Option<String>,
    /// Reference item id, or `"preview"` for anonymous one-off generation
    pub reference_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct WaveformPayload {
    #[schema(value_type = Vec<f64>)]
    pub data: Vec<Number>,
    pub version: Option<u32>,
    pub channels: Option<u32>,
    pub sample_rate: Option<u32>,
    pub samples_per_pixel: Option<u32>,
    pub bits: Option<u32>,
    pub length: Option<u64>,
    pub num_peaks: usize,
}

impl From<WaveformResult> for WaveformPayload {
    fn from(result: WaveformResult) -> Self {
        let num_peaks = result.num_peaks();
        WaveformPayload {
            data: result.peaks,
            version: result.version,
            channels: result.channels,
            sample_rate: result.sample_rate,
            samples_per_pixel: result.samples_per_pixel,
            bits: result.bits,
            length: result.length,
            num_peaks,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct GenerateWaveformResponse {
    pub waveform: WaveformPayload,
    /// `false` for preview requests
    pub saved: bool,
}
