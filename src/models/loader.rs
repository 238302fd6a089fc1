//! ONNX artifact loading for the two model roles.

use std::path::Path;

use anyhow::{Context, Result};
use ort::session::{builder::GraphOptimizationLevel, Session};
use tracing::{info, warn};

/// Artifact filename for the unsupervised anomaly scorer.
pub const ANOMALY_ARTIFACT: &str = "anomaly.onnx";

/// Artifact filename for the supervised fraud classifier.
pub const CLASSIFIER_ARTIFACT: &str = "classifier.onnx";

/// A loaded ONNX session with resolved tensor names.
pub struct LoadedModel {
    /// Role name, for logging
    pub name: String,
    /// ONNX Runtime session
    pub session: Session,
    /// Input tensor name
    pub input_name: String,
    /// Output name carrying scores/probabilities
    pub output_name: String,
}

/// The artifacts found for the two model roles. A missing role is not
/// an error; the scoring service degrades to heuristics for it.
#[derive(Default)]
pub struct ArtifactSet {
    pub anomaly: Option<LoadedModel>,
    pub classifier: Option<LoadedModel>,
}

/// Loader for ONNX model artifacts.
pub struct ModelLoader {
    onnx_threads: usize,
}

impl ModelLoader {
    pub fn new() -> Self {
        Self::with_threads(1)
    }

    pub fn with_threads(onnx_threads: usize) -> Self {
        Self { onnx_threads }
    }

    /// Load one ONNX artifact and resolve its input/output names.
    pub fn load_model<P: AsRef<Path>>(&self, path: P, name: &str) -> Result<LoadedModel> {
        let path = path.as_ref();

        // Runtime initialization is deferred to the first actual load, so
        // heuristic-only deployments never require the ONNX runtime.
        ort::init().commit()?;

        info!(model = %name, path = %path.display(), threads = self.onnx_threads, "Loading ONNX model");

        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(self.onnx_threads)?
            .commit_from_file(path)
            .context(format!("Failed to load model from {:?}", path))?;

        let input_name = session
            .inputs
            .first()
            .map(|i| i.name.clone())
            .unwrap_or_else(|| "float_input".to_string());

        let output_name = session
            .outputs
            .iter()
            .find(|o| o.name.contains("prob") || o.name.contains("score") || o.name.contains("output"))
            .map(|o| o.name.clone())
            .unwrap_or_else(|| {
                session
                    .outputs
                    .last()
                    .map(|o| o.name.clone())
                    .unwrap_or_else(|| "scores".to_string())
            });

        info!(
            model = %name,
            input = %input_name,
            output = %output_name,
            "Model loaded successfully"
        );

        Ok(LoadedModel {
            name: name.to_string(),
            session,
            input_name,
            output_name,
        })
    }

    /// Load whichever of the two role artifacts exist in a directory.
    /// Missing or unloadable artifacts are logged and skipped.
    pub fn load_artifacts<P: AsRef<Path>>(&self, models_dir: P) -> ArtifactSet {
        let models_dir = models_dir.as_ref();
        let mut artifacts = ArtifactSet::default();

        for (slot, name, filename) in [
            (&mut artifacts.anomaly, "anomaly", ANOMALY_ARTIFACT),
            (&mut artifacts.classifier, "classifier", CLASSIFIER_ARTIFACT),
        ] {
            let path = models_dir.join(filename);
            if !path.exists() {
                warn!(model = %name, path = %path.display(), "Model artifact not found");
                continue;
            }
            match self.load_model(&path, name) {
                Ok(model) => *slot = Some(model),
                Err(e) => {
                    warn!(model = %name, error = %e, "Failed to load model artifact, skipping");
                }
            }
        }

        artifacts
    }
}

impl Default for ModelLoader {
    fn default() -> Self {
        Self::new()
    }
}
