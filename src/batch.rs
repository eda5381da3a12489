//! Batch driver: applies a catalog, a retina derivation or a preview to
//! explicit source files.
//!
//! One source is decoded once; every output is produced from that raster by
//! the strategy its [`GeometrySpec`] names, encoded by the [`Codec`] and
//! written to disk. A failing output is recorded in the [`BatchReport`] and
//! the rest keep going: a bad entry never aborts the batch.
//!
//! ## Output layout
//!
//! ```text
//! icon.png                         # catalog source
//! appicon/ios/.../AppIcon.appiconset/
//! ├── .assetgen-cache.json         # generation cache (see crate::cache)
//! ├── Icon-29x29.png
//! └── ...
//!
//! res/button@2x.png                # retina source (template 2x)
//! res/button.png                   # derived 1x
//! res/button@3x.png                # derived 3x
//!
//! shop/item.jpg                    # preview source
//! shop/item-m.jpg                  # derived preview
//! ```
//!
//! Re-running with the same inputs writes byte-identical files.

use crate::cache::{self, CacheManifest, CacheStats};
use crate::catalog::{Catalog, GeometrySpec};
use crate::config::PreviewConfig;
use crate::imaging::{Codec, CodecError, Quality, TransformError, format_for_path, strategies};
use crate::naming::{self, NamingError, RetinaScale};
use image::DynamicImage;
use rayon::prelude::*;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum GenerateError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Decode failed: {0}")]
    DecodeFailure(CodecError),
    #[error(transparent)]
    MalformedPath(#[from] NamingError),
    #[error("{0}")]
    CropOutOfBounds(TransformError),
    #[error("Encode failed: {0}")]
    EncodeFailure(CodecError),
    #[error("{0}")]
    EmptyTarget(TransformError),
}

impl From<TransformError> for GenerateError {
    fn from(err: TransformError) -> Self {
        match err {
            TransformError::CropOutOfBounds { .. } => GenerateError::CropOutOfBounds(err),
            TransformError::EmptySource | TransformError::EmptyTarget { .. } => {
                GenerateError::EmptyTarget(err)
            }
        }
    }
}

/// An output (or a whole source) that could not be produced.
#[derive(Debug)]
pub struct Failure {
    pub path: PathBuf,
    pub reason: GenerateError,
}

/// What a batch run did, per output path.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub written: Vec<PathBuf>,
    pub failed: Vec<Failure>,
    /// Outputs skipped because the cache showed them current.
    pub unchanged: Vec<PathBuf>,
}

impl BatchReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn cache_stats(&self) -> CacheStats {
        CacheStats {
            hits: self.unchanged.len() as u32,
            misses: (self.written.len() + self.failed.len()) as u32,
        }
    }

    /// Fold another report into this one.
    pub fn merge(&mut self, other: BatchReport) {
        self.written.extend(other.written);
        self.failed.extend(other.failed);
        self.unchanged.extend(other.unchanged);
    }

    fn fail(&mut self, path: &Path, reason: GenerateError) {
        self.failed.push(Failure {
            path: path.to_path_buf(),
            reason,
        });
    }
}

/// How an output was satisfied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryStatus {
    Cached,
    Generated,
}

/// Progress reported while a batch runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchEvent {
    SourceStarted {
        source: PathBuf,
        label: String,
        output_count: usize,
    },
    OutputDone {
        output: PathBuf,
        width: u32,
        height: u32,
        status: EntryStatus,
    },
    OutputFailed {
        output: PathBuf,
        reason: String,
    },
    SourceRenamed {
        from: PathBuf,
        to: PathBuf,
    },
}

/// Applies catalogs and derivations to source files.
pub struct BatchDriver<C: Codec> {
    codec: C,
    quality: Quality,
    use_cache: bool,
    events: Option<Sender<BatchEvent>>,
}

impl<C: Codec> BatchDriver<C> {
    pub fn new(codec: C) -> Self {
        Self {
            codec,
            quality: Quality::default(),
            use_cache: true,
            events: None,
        }
    }

    pub fn with_quality(mut self, quality: Quality) -> Self {
        self.quality = quality;
        self
    }

    /// Enable or disable the generation cache for catalog runs.
    pub fn with_cache(mut self, use_cache: bool) -> Self {
        self.use_cache = use_cache;
        self
    }

    pub fn with_events(mut self, events: Sender<BatchEvent>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn codec(&self) -> &C {
        &self.codec
    }

    fn emit(&self, event: BatchEvent) {
        if let Some(tx) = &self.events {
            // A gone printer must not stop generation
            let _ = tx.send(event);
        }
    }

    /// Produce every catalog entry from `source` into `out_dir`.
    pub fn generate(&self, source: &Path, catalog: &Catalog, out_dir: &Path) -> BatchReport {
        self.generate_with_emblem(source, None, catalog, out_dir)
    }

    /// Like [`generate`](Self::generate), with an emblem drawn by
    /// pad-composite entries.
    pub fn generate_with_emblem(
        &self,
        background: &Path,
        emblem: Option<&Path>,
        catalog: &Catalog,
        out_dir: &Path,
    ) -> BatchReport {
        let mut report = BatchReport::default();
        self.emit(BatchEvent::SourceStarted {
            source: background.to_path_buf(),
            label: catalog.name.to_string(),
            output_count: catalog.entries.len(),
        });

        let bg_bytes = match std::fs::read(background) {
            Ok(b) => b,
            Err(e) => {
                warn!(source = %background.display(), error = %e, "cannot read source");
                report.fail(background, e.into());
                return report;
            }
        };
        let emblem_bytes = match emblem.map(std::fs::read).transpose() {
            Ok(b) => b,
            Err(e) => {
                let path = emblem.unwrap_or(background);
                warn!(emblem = %path.display(), error = %e, "cannot read emblem");
                report.fail(path, e.into());
                return report;
            }
        };
        if let Err(e) = std::fs::create_dir_all(out_dir) {
            report.fail(out_dir, e.into());
            return report;
        }

        let mut manifest = if self.use_cache {
            CacheManifest::load(out_dir)
        } else {
            CacheManifest::empty()
        };
        let source_hash = cache::hash_sources(&bg_bytes, emblem_bytes.as_deref());

        let mut pending: Vec<(&GeometrySpec, String)> = Vec::new();
        for entry in &catalog.entries {
            let params_hash = cache::hash_entry_params(entry, self.quality, catalog.matte.as_ref());
            if manifest.is_fresh(&entry.name, &source_hash, &params_hash, out_dir) {
                let output = out_dir.join(&entry.name);
                debug!(output = %output.display(), "cache hit");
                self.emit(BatchEvent::OutputDone {
                    output: output.clone(),
                    width: entry.width,
                    height: entry.height,
                    status: EntryStatus::Cached,
                });
                report.unchanged.push(output);
            } else {
                pending.push((entry, params_hash));
            }
        }

        if !pending.is_empty() {
            match self.decode_sources(background, &bg_bytes, catalog, emblem_bytes.as_deref()) {
                Ok((raster, emblem_raster)) => {
                    for (entry, params_hash) in pending {
                        let output = out_dir.join(&entry.name);
                        let result = strategies::apply(entry, &raster, emblem_raster.as_ref())
                            .map_err(GenerateError::from)
                            .and_then(|img| self.write_image(&img, &output).map(|()| img));
                        match result {
                            Ok(img) => {
                                manifest.insert(entry.name.clone(), source_hash.clone(), params_hash);
                                self.record_written(&mut report, output, &img);
                            }
                            Err(e) => {
                                manifest.remove(&entry.name);
                                self.record_failed(&mut report, output, e);
                            }
                        }
                    }
                }
                Err(e) => {
                    warn!(source = %background.display(), error = %e, "cannot decode source");
                    report.fail(background, e);
                }
            }
        }

        if let Err(e) = manifest.save(out_dir) {
            warn!(dir = %out_dir.display(), error = %e, "cannot save cache manifest");
        }
        info!(
            source = %background.display(),
            catalog = catalog.name,
            written = report.written.len(),
            cached = report.unchanged.len(),
            failed = report.failed.len(),
            "catalog done"
        );
        report
    }

    /// Decode the background (matted when the catalog asks for it) and the
    /// optional emblem.
    fn decode_sources(
        &self,
        background: &Path,
        bg_bytes: &[u8],
        catalog: &Catalog,
        emblem_bytes: Option<&[u8]>,
    ) -> Result<(DynamicImage, Option<DynamicImage>), GenerateError> {
        let (mut raster, _) = self
            .codec
            .decode(bg_bytes)
            .map_err(GenerateError::DecodeFailure)?;
        if let Some(matte) = &catalog.matte {
            debug!(source = %background.display(), inset = matte.inset_percent, "applying matte");
            raster = strategies::matte(&raster, matte)?;
        }
        let emblem = emblem_bytes
            .map(|b| self.codec.decode(b).map(|(img, _)| img))
            .transpose()
            .map_err(GenerateError::DecodeFailure)?;
        Ok((raster, emblem))
    }

    /// Derive the two missing retina scales next to `supplied`.
    ///
    /// The supplied file's own scale is read from its name. An unsuffixed
    /// file is taken to be authored at `template` and renamed to carry the
    /// template suffix first (unless the template is 1x). Derivatives keep
    /// the source's extension and format.
    pub fn derive_retina(&self, supplied: &Path, template: RetinaScale) -> BatchReport {
        let mut report = BatchReport::default();
        match self.try_derive_retina(supplied, template, &mut report) {
            Ok(()) => {}
            Err(e) => {
                warn!(source = %supplied.display(), error = %e, "retina derivation failed");
                report.fail(supplied, e);
            }
        }
        report
    }

    fn try_derive_retina(
        &self,
        supplied: &Path,
        template: RetinaScale,
        report: &mut BatchReport,
    ) -> Result<(), GenerateError> {
        let mut source = supplied.to_path_buf();
        if naming::scale_of(supplied)? == RetinaScale::X1 && template != RetinaScale::X1 {
            let renamed = naming::derive(supplied, template)?;
            if renamed.exists() {
                return Err(GenerateError::Io(std::io::Error::new(
                    std::io::ErrorKind::AlreadyExists,
                    format!("{} already exists", renamed.display()),
                )));
            }
            std::fs::rename(supplied, &renamed)?;
            info!(from = %supplied.display(), to = %renamed.display(), "renamed source to template scale");
            self.emit(BatchEvent::SourceRenamed {
                from: supplied.to_path_buf(),
                to: renamed.clone(),
            });
            source = renamed;
        }

        let from = naming::scale_of(&source)?;
        let plans = naming::retina_plans(&source)?;
        self.emit(BatchEvent::SourceStarted {
            source: source.clone(),
            label: format!("retina from {from}"),
            output_count: plans.len(),
        });

        let bytes = std::fs::read(&source)?;
        let (raster, _) = self
            .codec
            .decode(&bytes)
            .map_err(GenerateError::DecodeFailure)?;
        for plan in plans {
            let result = strategies::rescale(&raster, from.factor(), plan.scale.factor())
                .map_err(GenerateError::from)
                .and_then(|img| self.write_image(&img, &plan.output_path).map(|()| img));
            match result {
                Ok(img) => self.record_written(report, plan.output_path, &img),
                Err(e) => self.record_failed(report, plan.output_path, e),
            }
        }
        Ok(())
    }

    /// Derive retina siblings for many files.
    ///
    /// Files of one family (`icon.png`, `icon@2x.png`) write each other's
    /// paths, so each family runs serially while families run in parallel.
    /// A file named twice is processed once.
    pub fn derive_retina_all(&self, files: &[PathBuf], template: RetinaScale) -> BatchReport {
        let family = |path: &Path| naming::strip_scale(path).unwrap_or_else(|_| path.to_path_buf());
        run_groups(serial_groups(files, family), |file| {
            self.derive_retina(file, template)
        })
    }

    /// Write previews for many sources, each distinct file once.
    pub fn generate_previews(&self, sources: &[PathBuf], settings: &PreviewConfig) -> BatchReport {
        run_groups(serial_groups(sources, Path::to_path_buf), |source| {
            self.generate_preview(source, settings)
        })
    }

    /// Write the `<stem><suffix>.<ext>` preview sibling of `source`.
    pub fn generate_preview(&self, source: &Path, settings: &PreviewConfig) -> BatchReport {
        let mut report = BatchReport::default();
        match self.try_generate_preview(source, settings) {
            Ok((output, img)) => self.record_written(&mut report, output, &img),
            Err(e) => {
                warn!(source = %source.display(), error = %e, "preview failed");
                report.fail(source, e);
            }
        }
        report
    }

    fn try_generate_preview(
        &self,
        source: &Path,
        settings: &PreviewConfig,
    ) -> Result<(PathBuf, DynamicImage), GenerateError> {
        let output = naming::preview_path(source, &settings.suffix)?;
        let name = output
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let geometry = settings.geometry(name).map_err(|_| {
            GenerateError::EmptyTarget(TransformError::EmptyTarget {
                width: settings.max_width,
                height: settings.max_height,
            })
        })?;
        self.emit(BatchEvent::SourceStarted {
            source: source.to_path_buf(),
            label: "preview".to_string(),
            output_count: 1,
        });
        let bytes = std::fs::read(source)?;
        let (raster, _) = self
            .codec
            .decode(&bytes)
            .map_err(GenerateError::DecodeFailure)?;
        let img = strategies::apply(&geometry, &raster, None)?;
        self.write_image(&img, &output)?;
        Ok((output, img))
    }

    /// Encode in the format implied by `path` and write it.
    fn write_image(&self, image: &DynamicImage, path: &Path) -> Result<(), GenerateError> {
        let format = format_for_path(path).map_err(GenerateError::EncodeFailure)?;
        let bytes = self
            .codec
            .encode(image, format, self.quality)
            .map_err(GenerateError::EncodeFailure)?;
        std::fs::write(path, bytes)?;
        Ok(())
    }

    fn record_written(&self, report: &mut BatchReport, output: PathBuf, image: &DynamicImage) {
        debug!(output = %output.display(), width = image.width(), height = image.height(), "written");
        self.emit(BatchEvent::OutputDone {
            output: output.clone(),
            width: image.width(),
            height: image.height(),
            status: EntryStatus::Generated,
        });
        report.written.push(output);
    }

    fn record_failed(&self, report: &mut BatchReport, output: PathBuf, reason: GenerateError) {
        warn!(output = %output.display(), error = %reason, "output failed");
        self.emit(BatchEvent::OutputFailed {
            output: output.clone(),
            reason: reason.to_string(),
        });
        report.failed.push(Failure {
            path: output,
            reason,
        });
    }
}

/// Split `paths` into groups sharing `key`, in first-seen order.
///
/// Paths naming the same file (after canonicalization) are kept once.
fn serial_groups(paths: &[PathBuf], key: impl Fn(&Path) -> PathBuf) -> Vec<Vec<PathBuf>> {
    let mut seen = HashSet::new();
    let mut index: HashMap<PathBuf, usize> = HashMap::new();
    let mut groups: Vec<Vec<PathBuf>> = Vec::new();
    for path in paths {
        let canonical = path.canonicalize().unwrap_or_else(|_| path.clone());
        if !seen.insert(canonical.clone()) {
            debug!(path = %path.display(), "duplicate input skipped");
            continue;
        }
        let slot = *index.entry(key(&canonical)).or_insert_with(|| {
            groups.push(Vec::new());
            groups.len() - 1
        });
        groups[slot].push(path.clone());
    }
    groups
}

/// Run groups in parallel, the members of one group in order.
fn run_groups(
    groups: Vec<Vec<PathBuf>>,
    work: impl Fn(&Path) -> BatchReport + Sync,
) -> BatchReport {
    groups
        .par_iter()
        .map(|group| {
            let mut report = BatchReport::default();
            for path in group {
                report.merge(work(path));
            }
            report
        })
        .reduce(BatchReport::default, |mut acc, r| {
            acc.merge(r);
            acc
        })
}
