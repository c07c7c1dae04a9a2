//! Media lifecycle operations.
//!
//! [`MediaService`] is the entry point for everything that changes a media
//! item: upload, responsive generation, conversions, deletion, moving to
//! another disk, and renaming the original. Each operation validates first,
//! then mutates storage, then saves the record, so no storage side effect is
//! hidden behind a plain field assignment.
//!
//! The work that can run in the background lives on [`Pipeline`], which is
//! also the [`TaskRunner`] a queue worker drives:
//!
//! ```text
//! MediaService ──inline──► Pipeline ──► ResponsiveImageGenerator
//!      │                     ▲    └───► ImageManipulator
//!      └──enqueue──► TaskQueue ──worker──┘
//! ```
//!
//! Known limitations, kept on purpose:
//!
//! - Moving to another disk copies only the original. Responsive and
//!   conversion files stay behind and must be regenerated.
//! - Renaming the original leaves responsive paths as they were baked at
//!   generation time, while conversion paths follow the new file name.

use crate::collections::{self, Selector};
use crate::config::{MediaConfig, ResponsiveImagesConfig};
use crate::conversions::{
    ConversionPathResolver, ConversionRegistry, ImageManipulator, ManipulateOutcome,
};
use crate::error::MediaError;
use crate::format::{self, ImageFormat};
use crate::imaging::{Dimensions, ImageBackend};
use crate::media::{MediaId, MediaItem, sanitize_file_name};
use crate::queue::{Task, TaskQueue, TaskRunner};
use crate::records::{MediaDraft, RecordStore};
use crate::responsive::{GenerateOutcome, ResponsiveImageGenerator, ResponsiveOptions};
use crate::storage::Disks;
use serde_json::{Map, Value};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Result of an operation that may have been handed to the queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatched<T> {
    Queued,
    Completed(T),
}

impl<T> Dispatched<T> {
    pub fn is_queued(&self) -> bool {
        matches!(self, Dispatched::Queued)
    }

    pub fn completed(self) -> Option<T> {
        match self {
            Dispatched::Completed(value) => Some(value),
            Dispatched::Queued => None,
        }
    }
}

/// Generation and conversions for stored media, looked up by id.
pub struct Pipeline {
    records: Arc<dyn RecordStore>,
    disks: Disks,
    backend: Arc<dyn ImageBackend>,
    generator: ResponsiveImageGenerator,
    manipulator: ImageManipulator,
    resolver: Arc<ConversionPathResolver>,
    app_key: String,
}

impl Pipeline {
    pub fn new(
        config: &MediaConfig,
        backend: Arc<dyn ImageBackend>,
        disks: Disks,
        records: Arc<dyn RecordStore>,
        registry: ConversionRegistry,
    ) -> Self {
        let app_key = config.app_key.clone();
        let generator = ResponsiveImageGenerator::new(
            backend.clone(),
            disks.clone(),
            records.clone(),
            app_key.as_str(),
        )
        .with_calculator(config.responsive_images.calculator())
        .with_defaults(config.responsive_images.defaults());
        let resolver = Arc::new(ConversionPathResolver::new(
            Arc::new(registry),
            disks.clone(),
            app_key.as_str(),
        ));
        let manipulator =
            ImageManipulator::new(resolver.clone(), backend.clone(), disks.clone(), app_key.as_str());

        Self {
            records,
            disks,
            backend,
            generator,
            manipulator,
            resolver,
            app_key,
        }
    }

    fn load(&self, id: MediaId) -> Result<MediaItem, MediaError> {
        Ok(self.records.load(id)?)
    }

    pub fn generate(&self, id: MediaId, options: &ResponsiveOptions) -> Result<GenerateOutcome, MediaError> {
        let mut media = self.load(id)?;
        self.generator.generate(&mut media, options)
    }

    pub fn clear(&self, id: MediaId) -> Result<(), MediaError> {
        let mut media = self.load(id)?;
        self.generator.clear(&mut media)
    }

    pub fn convert(
        &self,
        id: MediaId,
        conversions: &[String],
        only_if_missing: bool,
    ) -> Result<ManipulateOutcome, MediaError> {
        let media = self.load(id)?;
        self.manipulator.manipulate(&media, conversions, only_if_missing)
    }
}

impl TaskRunner for Pipeline {
    fn run(&self, task: &Task) -> Result<(), MediaError> {
        match task {
            Task::GenerateResponsive { media_id, options } => {
                self.generate(*media_id, options)?;
            }
            Task::PerformConversions {
                media_id,
                conversions,
                only_if_missing,
            } => {
                self.convert(*media_id, conversions, *only_if_missing)?;
            }
        }
        Ok(())
    }
}

/// Everything needed to store a new original.
#[derive(Debug, Clone, Default)]
pub struct UploadRequest {
    /// Client file name; sanitized before use.
    pub file_name: String,
    pub bytes: Vec<u8>,
    /// Display name. Defaults to the file stem.
    pub name: Option<String>,
    /// Target disk. Defaults to `default_disk`.
    pub disk: Option<String>,
    /// Collection to attach, created if missing. Without one the default
    /// collection is attached when it exists.
    pub collection: Option<String>,
    pub custom_properties: Map<String, Value>,
    /// Generate a responsive set now (`Some(true)`), never (`Some(false)`),
    /// or per `auto_generate` (`None`).
    pub generate_responsive: Option<bool>,
    pub responsive_options: ResponsiveOptions,
}

impl UploadRequest {
    pub fn new(file_name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes: bytes.into(),
            ..Self::default()
        }
    }

    pub fn to_disk(mut self, disk: impl Into<String>) -> Self {
        self.disk = Some(disk.into());
        self
    }

    pub fn to_collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = Some(collection.into());
        self
    }

    pub fn with_responsive(mut self, options: ResponsiveOptions) -> Self {
        self.generate_responsive = Some(true);
        self.responsive_options = options;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Uploaded {
    pub media: MediaItem,
    /// Set when generation was triggered by the upload.
    pub responsive: Option<Dispatched<GenerateOutcome>>,
}

static PROBE_COUNTER: AtomicU64 = AtomicU64::new(0);

pub struct MediaService {
    pipeline: Arc<Pipeline>,
    queue: Option<Arc<dyn TaskQueue>>,
    default_disk: String,
    default_collection: String,
    check_disk_accessibility: bool,
    responsive: ResponsiveImagesConfig,
}

impl MediaService {
    pub fn new(config: &MediaConfig, pipeline: Arc<Pipeline>) -> Self {
        Self {
            pipeline,
            queue: None,
            default_disk: config.default_disk.clone(),
            default_collection: config.default_collection.clone(),
            check_disk_accessibility: config.check_disk_accessibility,
            responsive: config.responsive_images.clone(),
        }
    }

    /// Send queued work to `queue`. Without one, everything runs inline.
    pub fn with_queue(mut self, queue: Arc<dyn TaskQueue>) -> Self {
        self.queue = Some(queue);
        self
    }

    pub fn pipeline(&self) -> &Arc<Pipeline> {
        &self.pipeline
    }

    pub fn records(&self) -> &dyn RecordStore {
        self.pipeline.records.as_ref()
    }

    pub fn responsive_config(&self) -> &ResponsiveImagesConfig {
        &self.responsive
    }

    pub fn resolver(&self) -> &ConversionPathResolver {
        &self.pipeline.resolver
    }

    pub fn app_key(&self) -> &str {
        &self.pipeline.app_key
    }

    pub fn media(&self, id: MediaId) -> Result<MediaItem, MediaError> {
        self.pipeline.load(id)
    }

    // =========================================================================
    // Upload
    // =========================================================================

    /// Store a new original and create its record.
    pub fn upload(&self, request: UploadRequest) -> Result<Uploaded, MediaError> {
        let file_name = valid_file_name(&request.file_name)?;
        let disk_name = request.disk.unwrap_or_else(|| self.default_disk.clone());
        let disk = self.pipeline.disks.get(&disk_name)?;

        let draft = MediaDraft {
            name: request
                .name
                .unwrap_or_else(|| format::file_stem(&file_name).to_string()),
            mime_type: detect_mime_type(&request.bytes, &file_name),
            size_bytes: request.bytes.len() as u64,
            file_name,
            disk: disk_name,
            custom_properties: request.custom_properties,
        };

        let records = self.records();
        let media = records.create(draft)?;
        let path = media.original_path(self.app_key());
        if let Err(e) = disk.put(&path, &request.bytes) {
            if let Err(cleanup) = records.delete(media.id) {
                tracing::warn!(media_id = %media.id, error = %cleanup, "Could not remove record after failed upload");
            }
            return Err(e.into());
        }
        tracing::info!(media_id = %media.id, disk = %media.disk, %path, mime = %media.mime_type, "Uploaded media");

        self.attach_upload_collection(media.id, request.collection.as_deref())?;

        let wants_responsive = request
            .generate_responsive
            .unwrap_or(self.responsive.auto_generate);
        let responsive = if wants_responsive && self.responsive.enabled && media.is_image() {
            Some(self.generate_responsive(media.id, request.responsive_options, None)?)
        } else {
            None
        };

        Ok(Uploaded {
            media: self.media(media.id)?,
            responsive,
        })
    }

    fn attach_upload_collection(&self, media: MediaId, requested: Option<&str>) -> Result<(), MediaError> {
        let records = self.records();
        let collection = match requested {
            Some(name) => match records.collections()?.into_iter().find(|c| c.name == name) {
                Some(existing) => existing,
                None => records.create_collection(name)?,
            },
            None => {
                let default = records
                    .collections()?
                    .into_iter()
                    .find(|c| c.name == self.default_collection);
                match default {
                    Some(collection) => collection,
                    None => return Ok(()),
                }
            }
        };
        collections::attach(records, media, &Selector::from(collection))?;
        Ok(())
    }

    // =========================================================================
    // Dispatch
    // =========================================================================

    /// The queue to use, if this call should be queued.
    fn queue_for(&self, queued: Option<bool>) -> Option<&Arc<dyn TaskQueue>> {
        if !queued.unwrap_or(self.responsive.queue) {
            return None;
        }
        if self.queue.is_none() {
            tracing::debug!("No task queue configured, running inline");
        }
        self.queue.as_ref()
    }

    /// Generate the responsive set, queued or inline. `queued` overrides
    /// `responsive_images.queue`.
    pub fn generate_responsive(
        &self,
        id: MediaId,
        options: ResponsiveOptions,
        queued: Option<bool>,
    ) -> Result<Dispatched<GenerateOutcome>, MediaError> {
        if let Some(queue) = self.queue_for(queued) {
            queue.enqueue(Task::GenerateResponsive { media_id: id, options })?;
            return Ok(Dispatched::Queued);
        }
        Ok(Dispatched::Completed(self.pipeline.generate(id, &options)?))
    }

    pub fn clear_responsive(&self, id: MediaId) -> Result<(), MediaError> {
        self.pipeline.clear(id)
    }

    /// Run named conversions, queued or inline. Unknown names fail before
    /// anything is enqueued.
    pub fn perform_conversions(
        &self,
        id: MediaId,
        conversions: Vec<String>,
        only_if_missing: bool,
        queued: Option<bool>,
    ) -> Result<Dispatched<ManipulateOutcome>, MediaError> {
        let registry = self.pipeline.resolver.registry();
        for name in &conversions {
            registry.get(name)?;
        }
        if let Some(queue) = self.queue_for(queued) {
            queue.enqueue(Task::PerformConversions {
                media_id: id,
                conversions,
                only_if_missing,
            })?;
            return Ok(Dispatched::Queued);
        }
        Ok(Dispatched::Completed(
            self.pipeline.convert(id, &conversions, only_if_missing)?,
        ))
    }

    // =========================================================================
    // Delete, relocate, rename
    // =========================================================================

    /// Delete the media's whole directory and its record.
    ///
    /// If the directory delete fails, only the original is removed and the
    /// derived files are left behind.
    pub fn delete(&self, id: MediaId) -> Result<(), MediaError> {
        let media = self.media(id)?;
        let disk = self.pipeline.disks.get(&media.disk)?;
        let directory = media.directory(self.app_key());

        if let Err(e) = disk.delete_directory(&directory) {
            tracing::warn!(media_id = %id, disk = %media.disk, %directory, error = %e, "Directory delete failed, deleting original only");
            disk.delete(&media.original_path(self.app_key()))?;
        }

        self.records().delete(id)?;
        self.pipeline.resolver.forget_media(id);
        tracing::info!(media_id = %id, "Deleted media");
        Ok(())
    }

    /// Write then delete a probe file on `disk_name`.
    pub fn ensure_disk_usability(&self, disk_name: &str) -> Result<(), MediaError> {
        let disk = self.pipeline.disks.get(disk_name)?;
        let probe = format!(
            ".mediaforge-probe-{}-{}",
            std::process::id(),
            PROBE_COUNTER.fetch_add(1, Ordering::Relaxed)
        );
        let unwritable = |source| MediaError::DiskUnwritable {
            disk: disk_name.to_string(),
            source,
        };
        disk.put(&probe, b"probe").map_err(unwritable)?;
        disk.delete(&probe).map_err(unwritable)?;
        Ok(())
    }

    /// Move the original to another disk and update the record.
    ///
    /// Responsive and conversion files are not moved.
    pub fn relocate_disk(&self, id: MediaId, new_disk: &str) -> Result<MediaItem, MediaError> {
        let mut media = self.media(id)?;
        if media.disk == new_disk {
            return Ok(media);
        }
        let target = self.pipeline.disks.get(new_disk)?;
        if self.check_disk_accessibility {
            self.ensure_disk_usability(new_disk)?;
        }
        let source = self.pipeline.disks.get(&media.disk)?;
        let path = media.original_path(self.app_key());

        let bytes = source.get(&path)?;
        target.put(&path, &bytes)?;

        let old_disk = std::mem::replace(&mut media.disk, new_disk.to_string());
        self.records().save(&media)?;
        source.delete(&path)?;

        tracing::info!(media_id = %id, from = %old_disk, to = %new_disk, "Relocated media");
        if media.has_responsive_images() {
            tracing::warn!(media_id = %id, "Responsive images were not moved; regenerate them");
        }
        Ok(media)
    }

    /// Rename the original on its disk and update the record.
    ///
    /// If the record cannot be saved the original is moved back.
    pub fn rename_file(&self, id: MediaId, new_file_name: &str) -> Result<MediaItem, MediaError> {
        let new_file_name = valid_file_name(new_file_name)?;
        let mut media = self.media(id)?;
        if media.file_name == new_file_name {
            return Ok(media);
        }
        let disk = self.pipeline.disks.get(&media.disk)?;
        let from = media.original_path(self.app_key());

        let old_name = std::mem::replace(&mut media.file_name, new_file_name);
        let to = media.original_path(self.app_key());
        disk.move_file(&from, &to)?;
        if let Err(e) = self.records().save(&media) {
            // The record still names the old file
            if let Err(rollback) = disk.move_file(&to, &from) {
                tracing::error!(media_id = %id, path = %to, error = %rollback, "Could not move original back after failed save");
            }
            return Err(e.into());
        }
        self.pipeline.resolver.forget_media(id);

        tracing::info!(media_id = %id, from = %old_name, to = %media.file_name, "Renamed media file");
        Ok(media)
    }

    // =========================================================================
    // Reads
    // =========================================================================

    pub fn original_url(&self, media: &MediaItem) -> Result<String, MediaError> {
        let disk = self.pipeline.disks.get(&media.disk)?;
        Ok(disk.url(&media.original_path(self.app_key())))
    }

    pub fn conversion_url(&self, media: &MediaItem, conversion: &str) -> Result<String, MediaError> {
        self.pipeline.resolver.conversion_url(media, conversion)
    }

    pub fn has_conversion(&self, media: &MediaItem, conversion: &str) -> Result<bool, MediaError> {
        self.pipeline.resolver.has_conversion(media, conversion)
    }

    /// Pixel size of the original: from the manifest when present, else by
    /// reading the original's header. `None` for non-images.
    pub fn image_dimensions(&self, media: &MediaItem) -> Result<Option<Dimensions>, MediaError> {
        if let Some((width, height)) = media.manifest_dimensions() {
            return Ok(Some(Dimensions { width, height }));
        }
        if !media.is_image() {
            return Ok(None);
        }
        let disk = self.pipeline.disks.get(&media.disk)?;
        let bytes = disk.get(&media.original_path(self.app_key()))?;
        Ok(Some(self.pipeline.backend.identify(&bytes)?))
    }
}

fn valid_file_name(file_name: &str) -> Result<String, MediaError> {
    let sanitized = sanitize_file_name(file_name.trim());
    if sanitized.is_empty() || sanitized == "." || sanitized == ".." {
        return Err(MediaError::InvalidFileName(file_name.to_string()));
    }
    Ok(sanitized)
}

/// MIME type from the bytes, then the extension, then a binary fallback.
fn detect_mime_type(bytes: &[u8], file_name: &str) -> String {
    if let Some(format) = image::guess_format(bytes)
        .ok()
        .and_then(ImageFormat::from_codec)
    {
        return format.mime_type().to_string();
    }
    let extension = format::file_extension(file_name).map(str::to_ascii_lowercase);
    if let Some(format) = extension.as_deref().and_then(ImageFormat::from_extension) {
        return format.mime_type().to_string();
    }
    let mime = match extension.as_deref() {
        Some("pdf") => "application/pdf",
        Some("txt") => "text/plain",
        Some("csv") => "text/csv",
        Some("json") => "application/json",
        Some("mp4") => "video/mp4",
        Some("mp3") => "audio/mpeg",
        Some("zip") => "application/zip",
        _ => "application/octet-stream",
    };
    mime.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversions::ConversionOutput;
    use crate::imaging::backend::tests::MockBackend;
    use crate::records::MediaFilter;
    use crate::storage::{MemoryDisk, Storage};
    use crate::test_helpers::*;

    fn config() -> MediaConfig {
        let mut config = MediaConfig::default();
        config.app_key = APP_KEY.to_string();
        config.responsive_images.queue = false;
        config
    }

    fn registry() -> ConversionRegistry {
        let mut registry = ConversionRegistry::new();
        registry.register(
            "thumb",
            |image: image::DynamicImage| Ok(ConversionOutput::Decoded(image.thumbnail(8, 8))),
            None,
        );
        registry
    }

    fn service_with(ctx: &TestContext, config: &MediaConfig) -> MediaService {
        let pipeline = Pipeline::new(
            config,
            Arc::new(MockBackend::new()),
            ctx.disks.clone(),
            ctx.records.clone(),
            registry(),
        );
        MediaService::new(config, Arc::new(pipeline))
    }

    fn service(ctx: &TestContext) -> MediaService {
        service_with(ctx, &config())
    }

    // =========================================================================
    // Upload
    // =========================================================================

    #[test]
    fn upload_stores_original_and_record() {
        let ctx = TestContext::new();
        let service = service(&ctx);

        let uploaded = service
            .upload(UploadRequest::new("my photo#1.jpg", jpeg_bytes(32, 24)))
            .unwrap();
        let media = uploaded.media;

        assert_eq!(media.file_name, "my-photo-1.jpg");
        assert_eq!(media.name, "my-photo-1");
        assert_eq!(media.mime_type, "image/jpeg");
        assert_eq!(media.disk, "public");
        assert!(ctx.disk.exists(&media.original_path(APP_KEY)).unwrap());
        assert_eq!(uploaded.responsive, None);
    }

    #[test]
    fn upload_sniffs_mime_before_extension() {
        let ctx = TestContext::new();
        let service = service(&ctx);

        let media = service
            .upload(UploadRequest::new("actually-jpeg.png", jpeg_bytes(8, 8)))
            .unwrap()
            .media;
        assert_eq!(media.mime_type, "image/jpeg");

        let doc = service.upload(UploadRequest::new("doc.pdf", b"%PDF-1.7".to_vec())).unwrap().media;
        assert_eq!(doc.mime_type, "application/pdf");

        let blob = service.upload(UploadRequest::new("blob", b"\x00\x01".to_vec())).unwrap().media;
        assert_eq!(blob.mime_type, "application/octet-stream");
    }

    #[test]
    fn upload_rejects_empty_name_and_unknown_disk() {
        let ctx = TestContext::new();
        let service = service(&ctx);

        assert!(matches!(
            service.upload(UploadRequest::new("  ", b"x".to_vec())),
            Err(MediaError::InvalidFileName(_))
        ));
        assert!(matches!(
            service.upload(UploadRequest::new("a.jpg", b"x".to_vec()).to_disk("s3")),
            Err(MediaError::DiskMisconfigured(_))
        ));
        assert!(ctx.records.query(&MediaFilter::default()).unwrap().is_empty());
    }

    #[test]
    fn upload_write_failure_removes_record() {
        let ctx = TestContext::new();
        let mut faulty = FaultyDisk::new(Arc::new(MemoryDisk::new("/faulty")));
        faulty.fail_put = true;
        let ctx_disks = ctx.disks.clone().with("faulty", Arc::new(faulty));
        let config = config();
        let pipeline = Pipeline::new(
            &config,
            Arc::new(MockBackend::new()),
            ctx_disks,
            ctx.records.clone(),
            registry(),
        );
        let service = MediaService::new(&config, Arc::new(pipeline));

        let result = service.upload(UploadRequest::new("a.jpg", jpeg_bytes(8, 8)).to_disk("faulty"));
        assert!(matches!(result, Err(MediaError::Storage(_))));
        assert!(ctx.records.query(&MediaFilter::default()).unwrap().is_empty());
    }

    #[test]
    fn upload_attaches_requested_or_default_collection() {
        let ctx = TestContext::new();
        let service = service(&ctx);

        // No default collection yet: nothing attached
        let loose = service.upload(UploadRequest::new("a.jpg", jpeg_bytes(8, 8))).unwrap().media;
        assert!(ctx.records.collections_of(loose.id).unwrap().is_empty());

        let default = ctx.records.create_collection("Default").unwrap();
        let media = service.upload(UploadRequest::new("b.jpg", jpeg_bytes(8, 8))).unwrap().media;
        assert_eq!(ctx.records.collections_of(media.id).unwrap(), vec![default.id]);

        // A named collection is created on first use
        let media = service
            .upload(UploadRequest::new("c.jpg", jpeg_bytes(8, 8)).to_collection("Gallery"))
            .unwrap()
            .media;
        let gallery = ctx
            .records
            .collections()
            .unwrap()
            .into_iter()
            .find(|c| c.name == "Gallery")
            .unwrap();
        assert_eq!(ctx.records.collections_of(media.id).unwrap(), vec![gallery.id]);
    }

    #[test]
    fn upload_generates_when_requested() {
        let ctx = TestContext::new();
        let service = service(&ctx);

        let uploaded = service
            .upload(
                UploadRequest::new("photo.jpg", jpeg_bytes(8, 8))
                    .with_responsive(ResponsiveOptions::new().with_formats([ImageFormat::Webp])),
            )
            .unwrap();

        let outcome = uploaded.responsive.unwrap().completed().unwrap();
        assert_eq!(outcome.variants().len(), 5);
        assert!(uploaded.media.has_responsive_images());
    }

    #[test]
    fn auto_generate_respects_enabled_and_media_type() {
        let ctx = TestContext::new();
        let mut config = config();
        config.responsive_images.auto_generate = true;
        let service = service_with(&ctx, &config);

        let image = service.upload(UploadRequest::new("a.jpg", jpeg_bytes(8, 8))).unwrap();
        assert!(image.responsive.is_some());

        let pdf = service.upload(UploadRequest::new("a.pdf", b"%PDF".to_vec())).unwrap();
        assert!(pdf.responsive.is_none());

        config.responsive_images.enabled = false;
        let disabled = service_with(&ctx, &config);
        let image = disabled.upload(UploadRequest::new("b.jpg", jpeg_bytes(8, 8))).unwrap();
        assert!(image.responsive.is_none());
    }

    // =========================================================================
    // Dispatch
    // =========================================================================

    #[test]
    fn queued_generation_enqueues_task() {
        let ctx = TestContext::new();
        let queue = Arc::new(MemoryQueue::default());
        let mut config = config();
        config.responsive_images.queue = true;
        let service = service_with(&ctx, &config).with_queue(queue.clone());
        let media = ctx.stored_image("photo.jpg");

        let dispatched = service
            .generate_responsive(media.id, ResponsiveOptions::new().with_widths([640]), None)
            .unwrap();

        assert!(dispatched.is_queued());
        assert_eq!(
            queue.tasks(),
            vec![Task::GenerateResponsive {
                media_id: media.id,
                options: ResponsiveOptions::new().with_widths([640]),
            }]
        );
        assert!(!service.media(media.id).unwrap().has_responsive_images());

        // The caller can force inline execution
        let inline = service
            .generate_responsive(media.id, ResponsiveOptions::new(), Some(false))
            .unwrap();
        assert!(!inline.is_queued());
        assert!(service.media(media.id).unwrap().has_responsive_images());
    }

    #[test]
    fn queue_requested_without_queue_runs_inline() {
        let ctx = TestContext::new();
        let service = service(&ctx);
        let media = ctx.stored_image("photo.jpg");

        let dispatched = service
            .generate_responsive(media.id, ResponsiveOptions::new(), Some(true))
            .unwrap();
        assert!(matches!(dispatched, Dispatched::Completed(GenerateOutcome::Generated(_))));
    }

    #[test]
    fn conversions_validate_names_before_enqueue() {
        let ctx = TestContext::new();
        let queue = Arc::new(MemoryQueue::default());
        let service = service(&ctx).with_queue(queue.clone());
        let media = ctx.stored_image("photo.jpg");

        let result = service.perform_conversions(media.id, vec!["nope".into()], true, Some(true));
        assert!(matches!(result, Err(MediaError::ConversionNotFound(_))));
        assert!(queue.tasks().is_empty());

        service
            .perform_conversions(media.id, vec!["thumb".into()], true, Some(true))
            .unwrap();
        assert_eq!(queue.tasks()[0].name(), "perform_conversions");

        let done = service
            .perform_conversions(media.id, vec!["thumb".into()], true, Some(false))
            .unwrap();
        assert!(matches!(
            done.completed(),
            Some(ManipulateOutcome::Performed { written, .. }) if written.len() == 1
        ));
        assert!(service.has_conversion(&media, "thumb").unwrap());
    }

    #[test]
    fn pipeline_runs_tasks_by_id() {
        let ctx = TestContext::new();
        let service = service(&ctx);
        let media = ctx.stored_image("photo.jpg");

        service
            .pipeline()
            .run(&Task::GenerateResponsive {
                media_id: media.id,
                options: ResponsiveOptions::new().with_widths([320]),
            })
            .unwrap();
        assert_eq!(service.media(media.id).unwrap().responsive_variants().len(), 2);

        let missing = service.pipeline().run(&Task::GenerateResponsive {
            media_id: MediaId(999),
            options: ResponsiveOptions::new(),
        });
        assert!(matches!(missing, Err(MediaError::MediaNotFound(MediaId(999)))));
    }

    // =========================================================================
    // Delete
    // =========================================================================

    #[test]
    fn delete_removes_directory_and_record() {
        let ctx = TestContext::new();
        let service = service(&ctx);
        let media = ctx.stored_image("photo.jpg");
        service
            .generate_responsive(media.id, ResponsiveOptions::new(), None)
            .unwrap();
        service
            .perform_conversions(media.id, vec!["thumb".into()], true, None)
            .unwrap();
        assert!(ctx.disk.paths_under(&media.directory(APP_KEY)).len() > 2);

        service.delete(media.id).unwrap();

        assert!(ctx.disk.paths_under(&media.directory(APP_KEY)).is_empty());
        assert!(matches!(service.media(media.id), Err(MediaError::MediaNotFound(_))));
    }

    #[test]
    fn delete_falls_back_to_original_file() {
        let ctx = TestContext::new();
        let mut faulty = FaultyDisk::new(ctx.disk.clone());
        faulty.fail_directory_delete = true;
        let disks = Disks::new().with("public", Arc::new(faulty));
        let config = config();
        let pipeline = Pipeline::new(
            &config,
            Arc::new(MockBackend::new()),
            disks,
            ctx.records.clone(),
            registry(),
        );
        let service = MediaService::new(&config, Arc::new(pipeline));

        let media = ctx.stored_image("photo.jpg");
        let leftover = media.responsive_path(APP_KEY, 320, ImageFormat::Webp);
        ctx.disk.put(&leftover, b"variant").unwrap();

        service.delete(media.id).unwrap();

        assert!(!ctx.disk.exists(&media.original_path(APP_KEY)).unwrap());
        assert!(ctx.disk.exists(&leftover).unwrap());
        assert!(ctx.records.load(media.id).is_err());
    }

    // =========================================================================
    // Relocate and rename
    // =========================================================================

    fn two_disk_service(ctx: &TestContext, archive: Arc<dyn Storage>, check: bool) -> MediaService {
        let mut config = config();
        config.check_disk_accessibility = check;
        let pipeline = Pipeline::new(
            &config,
            Arc::new(MockBackend::new()),
            ctx.disks.clone().with("archive", archive),
            ctx.records.clone(),
            registry(),
        );
        MediaService::new(&config, Arc::new(pipeline))
    }

    #[test]
    fn relocate_copies_original_and_updates_record() {
        let ctx = TestContext::new();
        let archive = Arc::new(MemoryDisk::new("/archive"));
        let service = two_disk_service(&ctx, archive.clone(), true);
        let media = ctx.stored_image("photo.jpg");
        let path = media.original_path(APP_KEY);

        let moved = service.relocate_disk(media.id, "archive").unwrap();

        assert_eq!(moved.disk, "archive");
        assert_eq!(service.media(media.id).unwrap().disk, "archive");
        assert!(archive.exists(&path).unwrap());
        assert!(!ctx.disk.exists(&path).unwrap());
        // The probe file does not linger
        assert_eq!(archive.paths(), vec![path]);
    }

    #[test]
    fn relocate_does_not_move_variants() {
        let ctx = TestContext::new();
        let archive = Arc::new(MemoryDisk::new("/archive"));
        let service = two_disk_service(&ctx, archive.clone(), false);
        let media = ctx.stored_image("photo.jpg");
        service
            .generate_responsive(media.id, ResponsiveOptions::new().with_widths([320]), None)
            .unwrap();

        service.relocate_disk(media.id, "archive").unwrap();
        assert!(!ctx.disk.paths_under(&media.responsive_dir(APP_KEY)).is_empty());
        assert!(archive.paths_under(&media.responsive_dir(APP_KEY)).is_empty());
    }

    #[test]
    fn relocate_to_unknown_or_unwritable_disk_fails() {
        let ctx = TestContext::new();
        let mut faulty = FaultyDisk::new(Arc::new(MemoryDisk::new("/ro")));
        faulty.fail_put = true;
        let service = two_disk_service(&ctx, Arc::new(faulty), true);
        let media = ctx.stored_image("photo.jpg");

        assert!(matches!(
            service.relocate_disk(media.id, "s3"),
            Err(MediaError::DiskMisconfigured(_))
        ));
        assert!(matches!(
            service.relocate_disk(media.id, "archive"),
            Err(MediaError::DiskUnwritable { disk, .. }) if disk == "archive"
        ));
        assert_eq!(service.media(media.id).unwrap().disk, "public");
        assert!(ctx.disk.exists(&media.original_path(APP_KEY)).unwrap());
    }

    #[test]
    fn rename_moves_original_only() {
        let ctx = TestContext::new();
        let service = service(&ctx);
        let media = ctx.stored_image("photo.jpg");
        service
            .generate_responsive(media.id, ResponsiveOptions::new().with_widths([320]), None)
            .unwrap();
        let variant_path = service.media(media.id).unwrap().responsive_variants()[0].path.clone();

        let renamed = service.rename_file(media.id, "new name.jpg").unwrap();

        assert_eq!(renamed.file_name, "new-name.jpg");
        assert!(ctx.disk.exists(&renamed.original_path(APP_KEY)).unwrap());
        assert!(!ctx.disk.exists(&media.original_path(APP_KEY)).unwrap());
        // Responsive entries keep their baked paths
        let stored = service.media(media.id).unwrap();
        assert_eq!(stored.responsive_variants()[0].path, variant_path);
        assert!(ctx.disk.exists(&variant_path).unwrap());
        // Conversion paths follow the live file name
        assert!(service.conversion_url(&stored, "thumb").unwrap().ends_with("/conversions/thumb/new-name.jpg"));
    }

    #[test]
    fn rename_moves_original_back_when_save_fails() {
        let ctx = TestContext::new();
        let media = ctx.stored_image("photo.jpg");
        let mut records = FaultyRecords::new(ctx.records.clone());
        records.fail_save = true;
        let pipeline = Pipeline::new(
            &config(),
            Arc::new(MockBackend::new()),
            ctx.disks.clone(),
            Arc::new(records),
            registry(),
        );
        let service = MediaService::new(&config(), Arc::new(pipeline));

        let result = service.rename_file(media.id, "new name.jpg");

        assert!(matches!(result, Err(MediaError::Record(_))));
        assert_eq!(service.media(media.id).unwrap().file_name, "photo.jpg");
        assert!(ctx.disk.exists(&media.original_path(APP_KEY)).unwrap());
        let mut renamed = media.clone();
        renamed.file_name = "new-name.jpg".to_string();
        assert!(!ctx.disk.exists(&renamed.original_path(APP_KEY)).unwrap());
    }

    // =========================================================================
    // Reads
    // =========================================================================

    #[test]
    fn dimensions_prefer_manifest_then_backend() {
        let ctx = TestContext::new();
        let service = service(&ctx);
        let media = ctx.stored_image("photo.jpg");

        // MockBackend identifies everything as 1920x1080
        assert_eq!(
            service.image_dimensions(&media).unwrap(),
            Some(Dimensions { width: 1920, height: 1080 })
        );

        service
            .generate_responsive(media.id, ResponsiveOptions::new().with_widths([640]), None)
            .unwrap();
        let media = service.media(media.id).unwrap();
        assert_eq!(
            service.image_dimensions(&media).unwrap(),
            Some(Dimensions { width: 640, height: 360 })
        );

        let pdf = ctx.stored_file("a.pdf", "application/pdf", b"%PDF");
        assert_eq!(service.image_dimensions(&pdf).unwrap(), None);
        assert_eq!(
            service.original_url(&pdf).unwrap(),
            format!("/storage/{}/a.pdf", pdf.directory(APP_KEY))
        );
    }
}
