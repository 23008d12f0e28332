use serde_json::Number;

/// Owner lookup row for a reference item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceItem {
    pub id: String,
    pub user_id: String,
}

/// Waveform columns merged onto a reference item after analysis.
#[derive(Debug, Clone, PartialEq)]
pub struct WaveformUpdate {
    /// Stored exactly as parsed from the analyzer output.
    pub peaks: Vec<Number>,
    pub duration_seconds: Option<f64>,
    pub sample_rate: Option<u32>,
}
