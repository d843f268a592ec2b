use std::fs;
use std::path::Path;

use tracing::{info, warn};

use crate::fetch::{FetchError, MediaFetcher};
use crate::media::{MediaDescriptor, MediaKind};
use crate::metadata::{self, MetadataRecord, METADATA_FILENAME};
use crate::probe;

/// Structured events emitted while reconciling, for the caller's
/// progress/summary output. Purely diagnostic.
#[derive(Debug)]
pub enum ReconcileEvent<'a> {
    ItemStarted { index: usize, total: usize, pk: u64 },
    ItemDownloaded { pk: u64, filename: &'a str },
    ItemExists { pk: u64, filename: &'a str },
    ItemMetadataOnly { pk: u64 },
    ItemUnsupported { pk: u64, media_type: i64 },
    ItemFailed { pk: u64, reason: String },
    ResourceDownloaded { album_pk: u64, pk: u64, filename: &'a str },
    ResourceFailed { album_pk: u64, pk: u64, reason: String },
}

/// Type alias for the event observer callback.
pub type EventCallback<'a> = dyn Fn(&ReconcileEvent<'_>) + Send + Sync + 'a;

/// Operator-facing counters for one reconciliation run. Diagnostic only,
/// not correctness-bearing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileSummary {
    pub downloaded_photos: u64,
    pub downloaded_videos: u64,
    pub downloaded_resources: u64,
    pub skipped_existing: u64,
    pub metadata_only: u64,
    pub skipped_unsupported: u64,
    pub errors: u64,
    pub records_written: u64,
}

/// Outcome of the three-way per-item decision.
enum Disposition {
    /// A file matching the identifier is already on disk; adopt it.
    Existing(String),
    /// Nothing on disk and downloads were not requested.
    MetadataOnly,
    /// Nothing on disk; a fetch is needed.
    Fetch,
}

/// Decide what to do for one item or album resource. An existing file
/// always wins, even in metadata-only mode: there is nothing left to skip.
fn dispose(existing: Option<String>, metadata_only: bool) -> Disposition {
    match existing {
        Some(name) => Disposition::Existing(name),
        None if metadata_only => Disposition::MetadataOnly,
        None => Disposition::Fetch,
    }
}

async fn fetch_media(
    fetcher: &dyn MediaFetcher,
    kind: MediaKind,
    pk: u64,
    folder: &Path,
) -> Result<std::path::PathBuf, FetchError> {
    match kind {
        MediaKind::Photo => fetcher.fetch_photo(pk, folder).await,
        MediaKind::Video => fetcher.fetch_video(pk, folder).await,
        // Albums never reach here; their resources are fetched one by one.
        MediaKind::Album => unreachable!("albums are fetched per resource"),
    }
}

/// Reconcile one collection: ensure every supported item is downloaded at
/// most once and represented by exactly one metadata record, then replace
/// `metadata.json` wholesale.
///
/// Items are processed strictly in input order, one at a time. Individual
/// fetch failures are counted and leave the record's path null; only a
/// failure to create the collection directory (before any item) or to
/// write the final metadata file is returned as `Err`.
pub async fn reconcile(
    fetcher: &dyn MediaFetcher,
    descriptors: &[MediaDescriptor],
    collection_name: &str,
    base_dir: &Path,
    metadata_only: bool,
    on_event: &EventCallback<'_>,
) -> anyhow::Result<ReconcileSummary> {
    let collection_dir = base_dir.join(collection_name);
    fs::create_dir_all(&collection_dir).map_err(|e| {
        anyhow::anyhow!("failed to create collection directory {}: {e}", collection_dir.display())
    })?;

    let mut summary = ReconcileSummary::default();
    let mut records: Vec<MetadataRecord> = Vec::with_capacity(descriptors.len());
    let total = descriptors.len();

    for (index, item) in descriptors.iter().enumerate() {
        let Some(kind) = item.kind() else {
            summary.skipped_unsupported += 1;
            on_event(&ReconcileEvent::ItemUnsupported { pk: item.pk, media_type: item.media_type });
            continue;
        };

        on_event(&ReconcileEvent::ItemStarted { index, total, pk: item.pk });

        let mut record = MetadataRecord {
            relative_path: None,
            caption: item.caption.clone().unwrap_or_default(),
            url: item.permalink(),
            pk: item.pk,
            media_type: item.media_type,
            product_type: item.product_type.clone(),
            caption_analysis: None,
            google_maps_enrichment: None,
        };

        match kind {
            MediaKind::Photo | MediaKind::Video => {
                match dispose(probe::existing_for(item.pk, &collection_dir), metadata_only) {
                    Disposition::Existing(name) => {
                        summary.skipped_existing += 1;
                        on_event(&ReconcileEvent::ItemExists { pk: item.pk, filename: &name });
                        record.relative_path = Some(name);
                    }
                    Disposition::MetadataOnly => {
                        summary.metadata_only += 1;
                        on_event(&ReconcileEvent::ItemMetadataOnly { pk: item.pk });
                    }
                    Disposition::Fetch => {
                        match fetch_media(fetcher, kind, item.pk, &collection_dir).await {
                            Ok(path) => match path.file_name().and_then(|n| n.to_str()) {
                                Some(name) => {
                                    match kind {
                                        MediaKind::Photo => summary.downloaded_photos += 1,
                                        _ => summary.downloaded_videos += 1,
                                    }
                                    on_event(&ReconcileEvent::ItemDownloaded { pk: item.pk, filename: name });
                                    record.relative_path = Some(name.to_string());
                                }
                                None => {
                                    summary.errors += 1;
                                    let reason = format!("no filename in fetched path {}", path.display());
                                    warn!(pk = item.pk, %reason, "download result unusable");
                                    on_event(&ReconcileEvent::ItemFailed { pk: item.pk, reason });
                                }
                            },
                            Err(e) => {
                                summary.errors += 1;
                                warn!(pk = item.pk, error = %e, "download failed");
                                on_event(&ReconcileEvent::ItemFailed { pk: item.pk, reason: e.to_string() });
                            }
                        }
                    }
                }
            }
            MediaKind::Album => {
                let album_dir = collection_dir.join(item.pk.to_string());
                if probe::existing_album_dir(item.pk, &collection_dir) {
                    summary.skipped_existing += 1;
                    let name = format!("{}/", item.pk);
                    on_event(&ReconcileEvent::ItemExists { pk: item.pk, filename: &name });
                    record.relative_path = Some(name);
                } else if let Err(e) = fs::create_dir_all(&album_dir) {
                    // Per-item failure, not fatal: siblings still get processed.
                    summary.errors += 1;
                    warn!(pk = item.pk, error = %e, "album directory creation failed");
                    on_event(&ReconcileEvent::ItemFailed { pk: item.pk, reason: e.to_string() });
                } else {
                    record.relative_path = Some(format!("{}/", item.pk));
                    if metadata_only {
                        // Subdirectory is still created for structural consistency.
                        summary.metadata_only += 1;
                        on_event(&ReconcileEvent::ItemMetadataOnly { pk: item.pk });
                    } else {
                        for res in &item.resources {
                            let Some(res_kind) = MediaKind::from_discriminator(res.media_type) else {
                                summary.skipped_unsupported += 1;
                                continue;
                            };
                            match dispose(probe::existing_for(res.pk, &album_dir), false) {
                                Disposition::Existing(_) => summary.skipped_existing += 1,
                                Disposition::MetadataOnly => unreachable!(),
                                Disposition::Fetch => {
                                    match fetch_media(fetcher, res_kind, res.pk, &album_dir).await {
                                        Ok(path) => match path.file_name().and_then(|n| n.to_str()) {
                                            Some(name) => {
                                                summary.downloaded_resources += 1;
                                                on_event(&ReconcileEvent::ResourceDownloaded {
                                                    album_pk: item.pk,
                                                    pk: res.pk,
                                                    filename: name,
                                                });
                                            }
                                            None => {
                                                summary.errors += 1;
                                                let reason = format!("no filename in fetched path {}", path.display());
                                                warn!(album_pk = item.pk, pk = res.pk, %reason, "resource download result unusable");
                                                on_event(&ReconcileEvent::ResourceFailed {
                                                    album_pk: item.pk,
                                                    pk: res.pk,
                                                    reason,
                                                });
                                            }
                                        },
                                        Err(e) => {
                                            summary.errors += 1;
                                            warn!(album_pk = item.pk, pk = res.pk, error = %e, "resource download failed");
                                            on_event(&ReconcileEvent::ResourceFailed {
                                                album_pk: item.pk,
                                                pk: res.pk,
                                                reason: e.to_string(),
                                            });
                                        }
                                    }
                                }
                            }
                        }
                    }
                }
            }
        }

        records.push(record);
    }

    let metadata_path = collection_dir.join(METADATA_FILENAME);
    metadata::save_records(&records, &metadata_path).map_err(|e| {
        anyhow::anyhow!("failed to write {}: {e}", metadata_path.display())
    })?;
    summary.records_written = records.len() as u64;

    info!(
        collection = collection_name,
        records = summary.records_written,
        downloaded = summary.downloaded_photos + summary.downloaded_videos + summary.downloaded_resources,
        skipped_existing = summary.skipped_existing,
        errors = summary.errors,
        "reconciliation complete"
    );

    Ok(summary)
}
