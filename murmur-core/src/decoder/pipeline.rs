//! Ordered initialization pipeline.
//!
//! Stages run strictly in [`Stage`] order and each only after every earlier
//! stage succeeded. Optional resources (feature transform, `sendump`,
//! filler dictionary, feature parameters) fall back explicitly and are
//! counted in the diagnostics; everything else is fatal.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, warn};

use super::{Decoder, DecoderDiagnostics};
use crate::engine::MixtureWeights;
use crate::error::{MurmurError, Result};
use crate::grammar::{fsg_text, jsgf, LogMath};
use crate::resource::ResourceLoader;

/// One step of decoder initialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Validate,
    FeatureParams,
    Cleanup,
    Frontend,
    Feature,
    AcousticModelPre,
    Mdef,
    Tmat,
    Gmm,
    AcousticModelPost,
    Dictionary,
    Grammar,
    /// Attaching a rebuilt frontend to an existing acoustic model.
    Rewire,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Validate => "configuration validation",
            Stage::FeatureParams => "feature parameter ingestion",
            Stage::Cleanup => "cleanup",
            Stage::Frontend => "frontend construction",
            Stage::Feature => "dynamic feature module",
            Stage::AcousticModelPre => "acoustic model pre-initialization",
            Stage::Mdef => "model definition",
            Stage::Tmat => "transition matrices",
            Stage::Gmm => "gaussian mixtures",
            Stage::AcousticModelPost => "acoustic model post-initialization",
            Stage::Dictionary => "dictionary",
            Stage::Grammar => "grammar",
            Stage::Rewire => "feature rewiring",
        })
    }
}

impl Stage {
    /// Wrap an engine failure in this stage. Errors that already carry
    /// their own context pass through unchanged.
    pub(crate) fn failed(self, err: MurmurError) -> MurmurError {
        match err {
            MurmurError::Engine(reason) => MurmurError::Pipeline { stage: self, reason },
            other => other,
        }
    }
}

/// Fetch the resource for `key`, backing off to `file` in the model
/// directory.
async fn fetch_model(
    decoder: &Decoder,
    loader: &dyn ResourceLoader,
    key: &str,
    file: &str,
) -> Result<Vec<u8>> {
    let path = decoder.config.model_file_path(key, file)?;
    debug!(key, %path, "fetching model resource");
    loader.fetch_bytes(&path).await
}

fn utf8(path: &str, bytes: Vec<u8>) -> Result<String> {
    String::from_utf8(bytes).map_err(|e| MurmurError::Resource {
        path: path.to_string(),
        reason: format!("not UTF-8: {e}"),
    })
}

impl Decoder {
    fn completed(&self, stage: Stage) {
        DecoderDiagnostics::bump(&self.diagnostics.stages_completed, 1);
        debug!(%stage, "stage complete");
    }

    fn fell_back(&self, stage: Stage, what: &str, err: &MurmurError) {
        DecoderDiagnostics::bump(&self.diagnostics.fallbacks_taken, 1);
        info!(%stage, "{what}: {err}");
    }

    pub(super) async fn run_pipeline(&mut self) -> Result<()> {
        let loader = Arc::clone(&self.loader);

        self.config.validate()?;
        self.completed(Stage::Validate);

        self.ingest_feature_params(loader.as_ref()).await?;
        let lmath = LogMath::new(self.config.get_float("logbase")?)?;
        self.completed(Stage::FeatureParams);

        self.engine.cleanup();
        self.grammar = None;
        self.completed(Stage::Cleanup);

        self.run_audio_stages().await?;

        self.engine
            .acmod_pre_init(&self.config)
            .map_err(|e| Stage::AcousticModelPre.failed(e))?;
        self.completed(Stage::AcousticModelPre);

        let mdef = fetch_model(self, loader.as_ref(), "mdef", "mdef").await?;
        self.engine.load_mdef(&mdef).map_err(|e| Stage::Mdef.failed(e))?;
        self.completed(Stage::Mdef);

        let tmat = fetch_model(self, loader.as_ref(), "tmat", "transition_matrices").await?;
        self.engine.load_tmat(&tmat).map_err(|e| Stage::Tmat.failed(e))?;
        self.completed(Stage::Tmat);

        self.load_gmm(loader.as_ref()).await?;
        self.completed(Stage::Gmm);

        self.engine
            .acmod_post_init()
            .map_err(|e| Stage::AcousticModelPost.failed(e))?;
        self.completed(Stage::AcousticModelPost);

        let dict = fetch_model(self, loader.as_ref(), "dict", "dict.txt").await?;
        let filler = match fetch_model(self, loader.as_ref(), "fdict", "noisedict.txt").await {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                self.fell_back(Stage::Dictionary, "no filler dictionary", &e);
                None
            }
        };
        self.engine
            .load_dict(&dict, filler.as_deref())
            .map_err(|e| Stage::Dictionary.failed(e))?;
        self.completed(Stage::Dictionary);

        self.lmath = Some(lmath);
        self.load_configured_grammar(loader.as_ref()).await?;
        self.completed(Stage::Grammar);
        Ok(())
    }

    /// Apply every recognized entry of the feature parameter file. A missing
    /// file is tolerated; a malformed value is not.
    async fn ingest_feature_params(&mut self, loader: &dyn ResourceLoader) -> Result<()> {
        let path = match self.config.model_file_path("featparams", "feat_params.json") {
            Ok(path) => path,
            Err(MurmurError::MissingModelPath(_)) => {
                debug!("no feature parameter file configured");
                return Ok(());
            }
            Err(e) => return Err(e),
        };
        let entries: Vec<(String, Value)> = match loader.fetch_params(&path).await {
            Ok(entries) => entries,
            Err(e) => {
                DecoderDiagnostics::bump(&self.diagnostics.fallbacks_taken, 1);
                warn!(%path, "feature parameters unavailable, keeping current values: {e}");
                return Ok(());
            }
        };

        let (mut applied, mut ignored) = (0, 0);
        for (key, value) in &entries {
            if self.config.has(key) {
                self.config.set_json(key, value)?;
                applied += 1;
            } else {
                debug!(%key, "ignoring unknown feature parameter");
                ignored += 1;
            }
        }
        DecoderDiagnostics::bump(&self.diagnostics.params_applied, applied);
        DecoderDiagnostics::bump(&self.diagnostics.params_ignored, ignored);
        info!(%path, applied, ignored, "parsed model-specific feature parameters");
        Ok(())
    }

    /// Frontend and feature module. Shared with `reinitialize_audio`.
    pub(super) async fn run_audio_stages(&mut self) -> Result<()> {
        let loader = Arc::clone(&self.loader);

        self.engine
            .init_frontend(&self.config)
            .map_err(|e| Stage::Frontend.failed(e))?;
        self.completed(Stage::Frontend);

        let transform = match fetch_model(self, loader.as_ref(), "lda", "feature_transform").await {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                self.fell_back(Stage::Feature, "no feature transform", &e);
                None
            }
        };
        self.engine
            .init_feature(&self.config, transform.as_deref())
            .map_err(|e| Stage::Feature.failed(e))?;
        self.completed(Stage::Feature);
        Ok(())
    }

    async fn load_gmm(&mut self, loader: &dyn ResourceLoader) -> Result<()> {
        let means = fetch_model(self, loader, "mean", "means").await?;
        let variances = fetch_model(self, loader, "var", "variances").await?;

        let sendump = fetch_model(self, loader, "sendump", "sendump").await;
        let (bytes, compressed) = match sendump {
            Ok(bytes) => (bytes, true),
            Err(e) => {
                self.fell_back(Stage::Gmm, "no sendump, using mixture weights", &e);
                let mixw = fetch_model(self, loader, "mixw", "mixture_weights").await?;
                (mixw, false)
            }
        };
        let weights = if compressed {
            MixtureWeights::Sendump(&bytes)
        } else {
            MixtureWeights::Mixw(&bytes)
        };
        self.engine
            .load_gmm(&means, &variances, weights)
            .map_err(|e| Stage::Gmm.failed(e))
    }

    /// Compile and activate the grammar named by `jsgf` or `fsg`, if any.
    async fn load_configured_grammar(&mut self, loader: &dyn ResourceLoader) -> Result<()> {
        let jsgf_path = self.config.get_str("jsgf")?.map(str::to_string);
        let fsg_path = self.config.get_str("fsg")?.map(str::to_string);

        let fsg = match (jsgf_path, fsg_path) {
            (Some(path), _) => {
                let text = utf8(&path, loader.fetch_bytes(&path).await?)?;
                let rule = self.config.get_str("toprule")?.map(str::to_string);
                let (lmath, lw) = self.lmath_and_lw()?;
                jsgf::Grammar::parse(&text)?.build_fsg(rule.as_deref(), &*self.engine, &lmath, lw)?
            }
            (None, Some(path)) => {
                let text = utf8(&path, loader.fetch_bytes(&path).await?)?;
                let (lmath, lw) = self.lmath_and_lw()?;
                fsg_text::parse(&text, &*self.engine, &lmath, lw)?
            }
            (None, None) => {
                debug!("no grammar configured");
                return Ok(());
            }
        };
        self.engine
            .set_grammar(&fsg)
            .map_err(|e| Stage::Grammar.failed(e))?;
        info!(name = fsg.name(), "configured grammar activated");
        self.grammar = Some(fsg);
        Ok(())
    }
}
