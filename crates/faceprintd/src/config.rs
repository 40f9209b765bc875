use std::path::PathBuf;

const DEFAULT_CORS_ORIGINS: [&str; 4] = [
    "http://localhost:5173",
    "http://127.0.0.1:5173",
    "http://localhost:5000",
    "http://127.0.0.1:5000",
];

/// Daemon configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Listen address (default: 127.0.0.1:8000).
    pub bind_addr: String,
    /// Directory containing the InsightFace ONNX model files.
    pub model_dir: PathBuf,
    /// Model name reported by /health and /enroll.
    pub model_name: String,
    /// Cosine similarity threshold used when /verify omits one.
    pub match_threshold: f64,
    /// Minimum SCRFD score for a face to be reported.
    pub detection_threshold: f32,
    /// ONNX Runtime intra-op threads per session.
    pub intra_threads: usize,
    /// Browser origins allowed by CORS.
    pub cors_origins: Vec<String>,
    /// Request body limit for uploads, in bytes.
    pub max_upload_bytes: usize,
}

impl Config {
    /// Load configuration from `FACEPRINT_*` environment variables with defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup. Unparsable values fall back to defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let cors_origins = lookup("FACEPRINT_CORS_ORIGINS")
            .map(|v| {
                v.split(',')
                    .map(str::trim)
                    .filter(|o| !o.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_else(|| DEFAULT_CORS_ORIGINS.iter().map(|o| o.to_string()).collect());

        Self {
            bind_addr: lookup("FACEPRINT_BIND_ADDR").unwrap_or_else(|| "127.0.0.1:8000".to_string()),
            model_dir: lookup("FACEPRINT_MODEL_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(faceprint_core::default_model_dir),
            model_name: lookup("FACEPRINT_MODEL_NAME")
                .unwrap_or_else(|| "insightface_arcface".to_string()),
            match_threshold: parsed(&lookup, "FACEPRINT_MATCH_THRESHOLD")
                .unwrap_or(faceprint_core::DEFAULT_MATCH_THRESHOLD),
            detection_threshold: parsed(&lookup, "FACEPRINT_DETECTION_THRESHOLD")
                .unwrap_or(faceprint_core::detector::SCRFD_CONFIDENCE_THRESHOLD),
            intra_threads: parsed(&lookup, "FACEPRINT_INTRA_THREADS").unwrap_or(2),
            cors_origins,
            max_upload_bytes: parsed(&lookup, "FACEPRINT_MAX_UPLOAD_BYTES").unwrap_or(10 * 1024 * 1024),
        }
    }

    /// Path to the SCRFD detection model.
    pub fn detector_model_path(&self) -> String {
        self.model_dir
            .join(faceprint_core::DETECTOR_MODEL_FILE)
            .to_string_lossy()
            .into_owned()
    }

    /// Path to the ArcFace recognition model.
    pub fn recognizer_model_path(&self) -> String {
        self.model_dir
            .join(faceprint_core::RECOGNIZER_MODEL_FILE)
            .to_string_lossy()
            .into_owned()
    }
}

fn parsed<T: std::str::FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    lookup(key).and_then(|v| v.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_with(vars: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> =
            vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_with(&[]);
        assert_eq!(config.bind_addr, "127.0.0.1:8000");
        assert_eq!(config.model_name, "insightface_arcface");
        assert_eq!(config.match_threshold, 0.55);
        assert_eq!(config.detection_threshold, 0.5);
        assert_eq!(config.intra_threads, 2);
        assert_eq!(config.cors_origins.len(), 4);
        assert!(config.cors_origins.contains(&"http://localhost:5173".to_string()));
        assert_eq!(config.max_upload_bytes, 10 * 1024 * 1024);
    }

    #[test]
    fn test_overrides() {
        let config = config_with(&[
            ("FACEPRINT_BIND_ADDR", "0.0.0.0:9000"),
            ("FACEPRINT_MODEL_DIR", "/opt/models"),
            ("FACEPRINT_MATCH_THRESHOLD", "0.42"),
            ("FACEPRINT_CORS_ORIGINS", "https://a.example, https://b.example,"),
        ]);
        assert_eq!(config.bind_addr, "0.0.0.0:9000");
        assert_eq!(config.match_threshold, 0.42);
        assert_eq!(config.cors_origins, vec!["https://a.example", "https://b.example"]);
        assert_eq!(config.detector_model_path(), "/opt/models/det_10g.onnx");
        assert_eq!(config.recognizer_model_path(), "/opt/models/w600k_r50.onnx");
    }

    #[test]
    fn test_unparsable_values_fall_back() {
        let config = config_with(&[
            ("FACEPRINT_MATCH_THRESHOLD", "high"),
            ("FACEPRINT_INTRA_THREADS", "-3"),
        ]);
        assert_eq!(config.match_threshold, 0.55);
        assert_eq!(config.intra_threads, 2);
    }
}
