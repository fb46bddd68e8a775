//! Fan-curve recommendations
//!
//! Two sources. `LocalPolicy` is a deterministic table adjusted by the
//! summary and is always available. `RemoteAdvisor` asks a hosted model via
//! the Anthropic Messages API; every failure on that path falls back to the
//! local policy, so `Recommender::recommend` never fails.

use crate::config::AdvisoryConfig;
use anyhow::anyhow;
use chrono::Utc;
use pcx_core::model::{
    FanCurveRecommendation, FanCurves, Preference, RecommendationSource, CPU_CURVE_BREAKPOINTS,
    GPU_CURVE_BREAKPOINTS,
};
use pcx_core::{TelemetryError, TemperatureSummary};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::time::Duration;
use tracing::{debug, info, warn};

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Deterministic fan-curve policy
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalPolicy;

impl LocalPolicy {
    pub const CPU_HOT_AVG: f64 = 70.0;
    pub const GPU_HOT_AVG: f64 = 75.0;
    pub const GPU_HOT_MAX: f64 = 80.0;
    pub const HEAVY_INTENSITY: f64 = 0.7;
    pub const FREQUENT_GAMING_PCT: f64 = 30.0;

    pub const CPU_BUMP: u32 = 200;
    pub const GPU_BUMP: u32 = 200;
    pub const CASE_BUMP: u32 = 150;

    /// Unadjusted setpoints for a preference
    pub fn base_curves(preference: Preference) -> FanCurves {
        match preference {
            Preference::BestTemps => FanCurves {
                cpu_fan: [800, 1400, 2200, 3600, 4500],
                gpu_fan: [0, 1200, 2400, 3900, 4200],
                case_fan: [600, 1000, 1600, 2400, 2800],
            },
            Preference::MostQuiet => FanCurves {
                cpu_fan: [600, 1000, 1600, 2400, 3200],
                gpu_fan: [0, 800, 1800, 3000, 3400],
                case_fan: [400, 700, 1200, 1800, 2200],
            },
            Preference::Balanced => FanCurves {
                cpu_fan: [700, 1200, 1900, 3000, 3800],
                gpu_fan: [0, 1000, 2100, 3400, 3800],
                case_fan: [500, 850, 1400, 2100, 2500],
            },
        }
    }

    /// Base curves with the summary's thermal adjustments applied
    pub fn curves(summary: &TemperatureSummary, preference: Preference) -> FanCurves {
        let mut curves = Self::base_curves(preference);
        if summary.cpu.avg > Self::CPU_HOT_AVG {
            bump(&mut curves.cpu_fan, Self::CPU_BUMP);
        }
        if summary.gpu.avg > Self::GPU_HOT_AVG {
            bump(&mut curves.gpu_fan, Self::GPU_BUMP);
        }
        if summary.gaming.avg_intensity > Self::HEAVY_INTENSITY {
            bump(&mut curves.case_fan, Self::CASE_BUMP);
        }
        curves
    }

    pub fn notes(summary: &TemperatureSummary) -> BTreeMap<String, String> {
        let cpu = if summary.cpu.avg > Self::CPU_HOT_AVG {
            "aggressive cooling recommended"
        } else {
            "current cooling adequate"
        };
        let gpu = if summary.gpu.max > Self::GPU_HOT_MAX {
            "enhanced cooling suggested"
        } else {
            "cooling performance good"
        };
        let gaming = if summary.gaming.percentage > Self::FREQUENT_GAMING_PCT {
            "optimized for gaming workloads"
        } else {
            "general usage optimization"
        };

        BTreeMap::from([
            (
                "cpu".to_string(),
                format!("CPU averaging {:.1}°C - {}", summary.cpu.avg, cpu),
            ),
            (
                "gpu".to_string(),
                format!("GPU reaching {:.1}°C max - {}", summary.gpu.max, gpu),
            ),
            (
                "gaming".to_string(),
                format!(
                    "Gaming detected {:.1}% of time - {}",
                    summary.gaming.percentage, gaming
                ),
            ),
        ])
    }

    pub fn recommend(
        &self,
        summary: &TemperatureSummary,
        preference: Preference,
    ) -> FanCurveRecommendation {
        FanCurveRecommendation {
            preference,
            fan_curves: Self::curves(summary, preference),
            summary: summary.clone(),
            notes: Self::notes(summary),
            generated_at: Utc::now(),
            source: RecommendationSource::Local,
        }
    }
}

fn bump(curve: &mut [u32; 5], by: u32) {
    for rpm in curve.iter_mut() {
        *rpm += by;
    }
}

/// Curves and commentary extracted from an advisory reply
#[derive(Debug, Clone, PartialEq)]
pub struct Advice {
    pub fan_curves: FanCurves,
    pub analysis: BTreeMap<String, String>,
}

#[derive(Deserialize)]
struct RawAdvice {
    fan_curves: RawCurves,
    #[serde(default)]
    analysis: BTreeMap<String, serde_json::Value>,
}

#[derive(Deserialize)]
struct RawCurves {
    cpu_fan: Vec<f64>,
    gpu_fan: Vec<f64>,
    case_fan: Vec<f64>,
}

fn setpoints(name: &str, values: &[f64]) -> Result<[u32; 5], TelemetryError> {
    let invalid = |reason: String| TelemetryError::AdvisoryUnavailable(reason);

    if values.len() != 5 {
        return Err(invalid(format!(
            "{} has {} setpoints, expected 5",
            name,
            values.len()
        )));
    }
    let mut out = [0u32; 5];
    for (slot, &v) in out.iter_mut().zip(values) {
        if !v.is_finite() || v < 0.0 || v > f64::from(u32::MAX) {
            return Err(invalid(format!("{} has invalid setpoint {}", name, v)));
        }
        *slot = v.round() as u32;
    }
    Ok(out)
}

/// Extract and validate advice from free text
///
/// The JSON object is taken from the first `{` to the last `}`, so prose
/// around it is ignored.
pub fn parse_advice(text: &str) -> Result<Advice, TelemetryError> {
    let (start, end) = match (text.find('{'), text.rfind('}')) {
        (Some(s), Some(e)) if s < e => (s, e),
        _ => {
            return Err(TelemetryError::AdvisoryUnavailable(
                "no JSON object in advisory reply".to_string(),
            ))
        }
    };

    let raw: RawAdvice = serde_json::from_str(&text[start..=end]).map_err(|e| {
        TelemetryError::AdvisoryUnavailable(format!("unparseable advisory reply: {}", e))
    })?;

    let fan_curves = FanCurves {
        cpu_fan: setpoints("cpu_fan", &raw.fan_curves.cpu_fan)?,
        gpu_fan: setpoints("gpu_fan", &raw.fan_curves.gpu_fan)?,
        case_fan: setpoints("case_fan", &raw.fan_curves.case_fan)?,
    };
    let analysis = raw
        .analysis
        .into_iter()
        .map(|(k, v)| match v {
            serde_json::Value::String(s) => (k, s),
            other => (k, other.to_string()),
        })
        .collect();

    Ok(Advice {
        fan_curves,
        analysis,
    })
}

/// Prompt describing the summary and the requested output shape
pub fn build_prompt(summary: &TemperatureSummary, preference: Preference) -> String {
    let mut p = String::new();
    let _ = writeln!(
        p,
        "You are an expert PC cooling specialist. Analyze this gaming PC's temperature data \
         and provide optimized fan curve recommendations."
    );
    let _ = writeln!(
        p,
        "\nTEMPERATURE ANALYSIS ({} data points over {:.1} hours):",
        summary.data_points, summary.time_span_hours
    );
    for (label, ch) in [
        ("CPU", &summary.cpu),
        ("GPU", &summary.gpu),
        ("SSD", &summary.ssd),
        ("Motherboard", &summary.motherboard),
    ] {
        let _ = writeln!(
            p,
            "- {}: Avg {:.1}°C, Max {:.1}°C, Min {:.1}°C",
            label, ch.avg, ch.max, ch.min
        );
    }
    let _ = writeln!(p, "\nCURRENT FAN PERFORMANCE:");
    for (label, fan) in [
        ("CPU Fan", &summary.fans.cpu_fan),
        ("GPU Fan", &summary.fans.gpu_fan),
        ("Case Fan", &summary.fans.case_fan),
    ] {
        let _ = writeln!(
            p,
            "- {}: Avg {:.0} RPM, Max {:.0} RPM",
            label, fan.avg, fan.max
        );
    }
    let _ = writeln!(
        p,
        "\nGAMING USAGE:\n- Gaming readings: {} ({:.1}% of time)\n- Average gaming intensity: {:.2}",
        summary.gaming.sessions, summary.gaming.percentage, summary.gaming.avg_intensity
    );
    let _ = writeln!(
        p,
        "\nUSER PREFERENCE: {}\n\
         - 'balanced': Balance between cooling performance and noise\n\
         - 'best_temps': Prioritize lowest temperatures (aggressive cooling)\n\
         - 'most_quiet': Prioritize noise reduction (conservative cooling)",
        preference
    );
    let _ = writeln!(
        p,
        "\nProvide five RPM setpoints per fan:\n\
         1. CPU Fan at {:?}°C\n\
         2. GPU Fan at {:?}°C\n\
         3. Case Fan at {:?}°C",
        CPU_CURVE_BREAKPOINTS, GPU_CURVE_BREAKPOINTS, GPU_CURVE_BREAKPOINTS
    );
    let _ = writeln!(
        p,
        "\nRespond with JSON only, in this structure:\n\
         {{\"fan_curves\": {{\"cpu_fan\": [5 rpm], \"gpu_fan\": [5 rpm], \"case_fan\": [5 rpm]}}, \
         \"analysis\": {{\"efficiency\": \"...\", \"recommendations\": \"...\", \
         \"temperature_improvement\": \"...\", \"noise_impact\": \"...\"}}}}"
    );
    p
}

#[derive(Debug, Serialize)]
struct ApiMessage<'a> {
    role: &'a str,
    content: String,
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<ApiMessage<'a>>,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    text: Option<String>,
}

/// Pull the reply text out of a response body
///
/// A Messages API envelope yields its text blocks; any other body is
/// treated as the reply itself.
fn reply_text(body: &str) -> String {
    match serde_json::from_str::<MessagesResponse>(body) {
        Ok(resp) => resp
            .content
            .into_iter()
            .filter_map(|block| block.text)
            .collect::<Vec<_>>()
            .join("\n"),
        Err(_) => body.to_string(),
    }
}

/// Client for the hosted advisory model
pub struct RemoteAdvisor {
    client: reqwest::Client,
    api_key: String,
    endpoint: String,
    model: String,
    max_tokens: u32,
    timeout: Duration,
}

impl RemoteAdvisor {
    pub fn new(api_key: String, config: &AdvisoryConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| anyhow!("Failed to build HTTP client: {}", e))?;

        Ok(Self {
            client,
            api_key,
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            timeout: config.timeout(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub async fn advise(
        &self,
        summary: &TemperatureSummary,
        preference: Preference,
    ) -> Result<FanCurveRecommendation, TelemetryError> {
        let body = tokio::time::timeout(self.timeout, self.request(build_prompt(summary, preference)))
            .await
            .map_err(|_| {
                TelemetryError::AdvisoryUnavailable(format!(
                    "no reply within {}s",
                    self.timeout.as_secs()
                ))
            })??;

        let advice = parse_advice(&reply_text(&body))?;
        let mut notes = advice.analysis;
        notes.insert("model".to_string(), self.model.clone());

        Ok(FanCurveRecommendation {
            preference,
            fan_curves: advice.fan_curves,
            summary: summary.clone(),
            notes,
            generated_at: Utc::now(),
            source: RecommendationSource::Remote,
        })
    }

    async fn request(&self, prompt: String) -> Result<String, TelemetryError> {
        let request = MessagesRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            messages: vec![ApiMessage {
                role: "user",
                content: prompt,
            }],
        };
        let unavailable = |e: reqwest::Error| TelemetryError::AdvisoryUnavailable(e.to_string());

        let response = self
            .client
            .post(&self.endpoint)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&request)
            .send()
            .await
            .map_err(unavailable)?;

        let status = response.status();
        if !status.is_success() {
            return Err(TelemetryError::AdvisoryUnavailable(format!(
                "advisory service returned {}",
                status
            )));
        }
        response.text().await.map_err(unavailable)
    }
}

/// Recommendation source selected at startup
pub enum Recommender {
    Local(LocalPolicy),
    Remote {
        advisor: RemoteAdvisor,
        fallback: LocalPolicy,
    },
}

impl Default for Recommender {
    fn default() -> Self {
        Recommender::Local(LocalPolicy)
    }
}

impl Recommender {
    /// Remote when an API key is configured, local otherwise
    pub fn from_config(config: &AdvisoryConfig) -> Self {
        let Some(key) = config.api_key.clone() else {
            info!("no advisory API key configured, using local fan-curve policy");
            return Recommender::default();
        };
        match RemoteAdvisor::new(key, config) {
            Ok(advisor) => {
                info!(model = advisor.model(), "remote fan-curve advisor enabled");
                Recommender::Remote {
                    advisor,
                    fallback: LocalPolicy,
                }
            }
            Err(e) => {
                warn!("remote advisor unavailable, using local policy: {:#}", e);
                Recommender::default()
            }
        }
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, Recommender::Remote { .. })
    }

    pub async fn recommend(
        &self,
        summary: &TemperatureSummary,
        preference: Preference,
    ) -> FanCurveRecommendation {
        match self {
            Recommender::Local(policy) => policy.recommend(summary, preference),
            Recommender::Remote { advisor, fallback } => {
                match advisor.advise(summary, preference).await {
                    Ok(rec) => {
                        debug!(%preference, "remote recommendation accepted");
                        rec
                    }
                    Err(e) => {
                        warn!("{}; falling back to local policy", e);
                        fallback.recommend(summary, preference)
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pcx_core::units::Celsius;
    use pcx_core::{summarize, SensorReading};

    fn summary_at(cpu: f64, gpu: f64, gaming: bool, intensity: f64) -> TemperatureSummary {
        let readings: Vec<SensorReading> = (0..10)
            .map(|i| SensorReading {
                timestamp: 1_750_263_292 + i,
                device_id: "GamingPC4".to_string(),
                cpu_temp: Celsius(cpu),
                gpu_temp: Celsius(gpu),
                ssd_temp: Celsius(36.0),
                motherboard_temp: Celsius(33.0),
                cpu_fan_rpm: 1500,
                gpu_fan_rpm: 1300,
                case_fan_rpm: 900,
                gaming_session: gaming,
                gaming_intensity: intensity,
            })
            .collect();
        summarize(&readings).unwrap()
    }

    #[test]
    fn test_cool_idle_summary_uses_base_curves() {
        let summary = summary_at(45.0, 40.0, false, 0.0);
        for pref in Preference::ALL {
            assert_eq!(LocalPolicy::curves(&summary, pref), LocalPolicy::base_curves(pref));
        }
    }

    #[test]
    fn test_hot_summary_bumps_every_setpoint() {
        let summary = summary_at(80.0, 78.0, true, 0.9);
        let base = LocalPolicy::base_curves(Preference::Balanced);
        let curves = LocalPolicy::curves(&summary, Preference::Balanced);

        for i in 0..5 {
            assert_eq!(curves.cpu_fan[i], base.cpu_fan[i] + 200);
            assert_eq!(curves.gpu_fan[i], base.gpu_fan[i] + 200);
            assert_eq!(curves.case_fan[i], base.case_fan[i] + 150);
        }
    }

    #[test]
    fn test_thresholds_are_strict() {
        // Exact threshold values; averaging repeated 0.7s drifts above 0.7
        let mut summary = summary_at(45.0, 40.0, true, 0.0);
        summary.cpu.avg = LocalPolicy::CPU_HOT_AVG;
        summary.gpu.avg = LocalPolicy::GPU_HOT_AVG;
        summary.gaming.avg_intensity = LocalPolicy::HEAVY_INTENSITY;
        let curves = LocalPolicy::curves(&summary, Preference::MostQuiet);
        assert_eq!(curves, LocalPolicy::base_curves(Preference::MostQuiet));

        summary.gaming.avg_intensity = 0.71;
        let curves = LocalPolicy::curves(&summary, Preference::MostQuiet);
        let base = LocalPolicy::base_curves(Preference::MostQuiet);
        assert_eq!(curves.cpu_fan, base.cpu_fan);
        assert_eq!(curves.gpu_fan, base.gpu_fan);
        assert_eq!(curves.case_fan[0], base.case_fan[0] + LocalPolicy::CASE_BUMP);
    }

    #[test]
    fn test_preferences_order_cpu_curves() {
        let quiet = LocalPolicy::base_curves(Preference::MostQuiet);
        let balanced = LocalPolicy::base_curves(Preference::Balanced);
        let best = LocalPolicy::base_curves(Preference::BestTemps);
        for i in 0..5 {
            assert!(quiet.cpu_fan[i] <= balanced.cpu_fan[i]);
            assert!(balanced.cpu_fan[i] <= best.cpu_fan[i]);
        }
    }

    #[test]
    fn test_notes_text() {
        let notes = LocalPolicy::notes(&summary_at(80.0, 85.0, true, 0.9));
        assert_eq!(notes["cpu"], "CPU averaging 80.0°C - aggressive cooling recommended");
        assert_eq!(notes["gpu"], "GPU reaching 85.0°C max - enhanced cooling suggested");
        assert_eq!(
            notes["gaming"],
            "Gaming detected 100.0% of time - optimized for gaming workloads"
        );

        let calm = LocalPolicy::notes(&summary_at(45.0, 40.0, false, 0.0));
        assert!(calm["cpu"].ends_with("current cooling adequate"));
        assert!(calm["gpu"].ends_with("cooling performance good"));
        assert!(calm["gaming"].ends_with("general usage optimization"));
    }

    #[test]
    fn test_parse_advice_with_surrounding_prose() {
        let text = r#"Here are my suggestions:
{"fan_curves": {"cpu_fan": [700, 1300, 2000, 3100, 3900],
                "gpu_fan": [0, 1100, 2200, 3500, 3900.0],
                "case_fan": [500, 900, 1500, 2200, 2600]},
 "analysis": {"efficiency": "good", "noise_impact": "moderate", "score": 7}}
Let me know if you need anything else."#;

        let advice = parse_advice(text).unwrap();
        assert_eq!(advice.fan_curves.cpu_fan, [700, 1300, 2000, 3100, 3900]);
        assert_eq!(advice.fan_curves.gpu_fan[4], 3900);
        assert_eq!(advice.analysis["efficiency"], "good");
        assert_eq!(advice.analysis["score"], "7");
    }

    #[test]
    fn test_parse_advice_rejects_bad_shapes() {
        let cases = [
            "no json here",
            "} backwards {",
            r#"{"fan_curves": {"cpu_fan": [1, 2, 3], "gpu_fan": [1,2,3,4,5], "case_fan": [1,2,3,4,5]}}"#,
            r#"{"fan_curves": {"cpu_fan": [1,2,3,4,-5], "gpu_fan": [1,2,3,4,5], "case_fan": [1,2,3,4,5]}}"#,
            r#"{"fan_curves": {"cpu_fan": [1,2,3,4,5], "gpu_fan": [1,2,3,4,5]}}"#,
            r#"{"analysis": {}}"#,
        ];
        for text in cases {
            assert!(
                matches!(parse_advice(text), Err(TelemetryError::AdvisoryUnavailable(_))),
                "should reject: {}",
                text
            );
        }
    }

    #[test]
    fn test_reply_text_unwraps_messages_envelope() {
        let body = r#"{"id":"msg_1","type":"message","role":"assistant",
            "content":[{"type":"text","text":"{\"fan_curves\": {}}"}]}"#;
        assert_eq!(reply_text(body), r#"{"fan_curves": {}}"#);
        assert_eq!(reply_text("plain"), "plain");
    }

    #[test]
    fn test_prompt_mentions_preference_and_stats() {
        let prompt = build_prompt(&summary_at(72.5, 66.0, true, 0.8), Preference::MostQuiet);
        assert!(prompt.contains("USER PREFERENCE: most_quiet"));
        assert!(prompt.contains("CPU: Avg 72.5°C"));
        assert!(prompt.contains("\"fan_curves\""));
    }

    #[test]
    fn test_without_key_uses_local() {
        let recommender = Recommender::from_config(&AdvisoryConfig::default());
        assert!(!recommender.is_remote());
    }
}
