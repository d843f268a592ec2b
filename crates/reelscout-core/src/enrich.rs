use std::path::Path;

use anyhow::Result;
use async_trait::async_trait;
use tracing::{info, warn};

use crate::analyzer::CaptionAnalyzer;
use crate::metadata::{self, CaptionAnalysis, PlaceDetails, PlaceEnrichment};
use crate::places::PlaceResolver;

/// Caption analysis boundary, mockable in tests.
#[async_trait]
pub trait AnalyzesCaptions: Send + Sync {
    async fn analyze(&self, caption: &str) -> CaptionAnalysis;
}

#[async_trait]
impl AnalyzesCaptions for CaptionAnalyzer {
    async fn analyze(&self, caption: &str) -> CaptionAnalysis {
        CaptionAnalyzer::analyze(self, caption).await
    }
}

/// Place resolution boundary, mockable in tests.
#[async_trait]
pub trait ResolvesPlaces: Send + Sync {
    async fn resolve(&self, name: &str) -> Result<Option<PlaceDetails>>;
}

#[async_trait]
impl ResolvesPlaces for PlaceResolver {
    async fn resolve(&self, name: &str) -> Result<Option<PlaceDetails>> {
        PlaceResolver::resolve(self, name).await
    }
}

/// Counters for one enrichment pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EnrichSummary {
    pub analyzed: u64,
    pub skipped_analyzed: u64,
    pub places_resolved: u64,
    pub places_unresolved: u64,
    pub place_errors: u64,
}

/// Annotate every record of a metadata file with caption analysis and
/// Google Maps data, then rewrite the same file in place.
///
/// Records that already carry a `caption_analysis` are skipped unless
/// `force` is set. Per-record and per-place failures are recorded in the
/// data (`error` fields), never returned; only reading or rewriting the
/// file itself is fatal.
pub async fn enrich_metadata(
    analyzer: &dyn AnalyzesCaptions,
    resolver: &dyn ResolvesPlaces,
    metadata_path: &Path,
    force: bool,
) -> Result<EnrichSummary> {
    let mut records = metadata::load_records(metadata_path)?;
    let mut summary = EnrichSummary::default();

    for record in records.iter_mut() {
        if record.caption_analysis.is_some() && !force {
            summary.skipped_analyzed += 1;
            continue;
        }

        let analysis = analyzer.analyze(&record.caption).await;
        summary.analyzed += 1;

        let mut enrichments = Vec::new();
        if let Some(locations) = analysis.locations.as_deref() {
            for name in locations {
                match resolver.resolve(name).await {
                    Ok(Some(details)) => {
                        summary.places_resolved += 1;
                        enrichments.push(PlaceEnrichment {
                            original_name: name.clone(),
                            google_maps_data: Some(details),
                            error: None,
                        });
                    }
                    Ok(None) => {
                        summary.places_unresolved += 1;
                        enrichments.push(PlaceEnrichment {
                            original_name: name.clone(),
                            google_maps_data: None,
                            error: None,
                        });
                    }
                    Err(e) => {
                        summary.place_errors += 1;
                        warn!(pk = record.pk, %name, error = %e, "place resolution failed");
                        enrichments.push(PlaceEnrichment {
                            original_name: name.clone(),
                            google_maps_data: None,
                            error: Some(e.to_string()),
                        });
                    }
                }
            }
        }

        record.caption_analysis = Some(analysis);
        record.google_maps_enrichment = if enrichments.is_empty() {
            None
        } else {
            Some(enrichments)
        };
    }

    metadata::save_records(&records, metadata_path)?;
    info!(
        path = %metadata_path.display(),
        analyzed = summary.analyzed,
        resolved = summary.places_resolved,
        "enrichment complete"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::MetadataRecord;
    use anyhow::anyhow;
    use tempfile::tempdir;

    struct StubAnalyzer;

    #[async_trait]
    impl AnalyzesCaptions for StubAnalyzer {
        async fn analyze(&self, caption: &str) -> CaptionAnalysis {
            if caption.contains("Lisboa") {
                CaptionAnalysis {
                    location_found: true,
                    locations: Some(vec![
                        "Time Out Market, Lisboa".to_string(),
                        "Nowhere Plaza".to_string(),
                        "Broken Place".to_string(),
                    ]),
                    error: None,
                }
            } else {
                CaptionAnalysis { location_found: false, locations: None, error: None }
            }
        }
    }

    struct StubResolver;

    #[async_trait]
    impl ResolvesPlaces for StubResolver {
        async fn resolve(&self, name: &str) -> Result<Option<PlaceDetails>> {
            match name {
                "Time Out Market, Lisboa" => Ok(Some(PlaceDetails {
                    name: Some("Time Out Market".to_string()),
                    address: Some("Av. 24 de Julho, Lisboa".to_string()),
                    place_id: "tom-1".to_string(),
                    latitude: Some(38.707),
                    longitude: Some(-9.146),
                    google_maps_uri: Some("https://maps.google.com/?cid=9".to_string()),
                })),
                "Broken Place" => Err(anyhow!("quota exceeded")),
                _ => Ok(None),
            }
        }
    }

    fn record(pk: u64, caption: &str) -> MetadataRecord {
        MetadataRecord {
            relative_path: Some(format!("{pk}.mp4")),
            caption: caption.to_string(),
            url: format!("https://www.instagram.com/p/C{pk}/"),
            pk,
            media_type: 2,
            product_type: "clips".to_string(),
            caption_analysis: None,
            google_maps_enrichment: None,
        }
    }

    #[tokio::test]
    async fn enrichment_attaches_analysis_and_places_in_place() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("metadata.json");
        metadata::save_records(
            &[record(111, "great food tour in Lisboa"), record(222, "no places here")],
            &path,
        )
        .unwrap();

        let summary = enrich_metadata(&StubAnalyzer, &StubResolver, &path, false)
            .await
            .unwrap();
        assert_eq!(summary.analyzed, 2);
        assert_eq!(summary.places_resolved, 1);
        assert_eq!(summary.places_unresolved, 1);
        assert_eq!(summary.place_errors, 1);

        let records = metadata::load_records(&path).unwrap();
        let first = &records[0];
        assert!(first.caption_analysis.as_ref().unwrap().location_found);
        let enrichment = first.google_maps_enrichment.as_ref().unwrap();
        assert_eq!(enrichment.len(), 3);
        assert!(enrichment[0].google_maps_data.is_some());
        assert!(enrichment[1].google_maps_data.is_none());
        assert!(enrichment[1].error.is_none());
        assert_eq!(enrichment[2].error.as_deref(), Some("quota exceeded"));

        // Reconciler fields survive the rewrite.
        assert_eq!(first.relative_path.as_deref(), Some("111.mp4"));
        assert_eq!(records[1].google_maps_enrichment, None);
        assert!(!records[1].caption_analysis.as_ref().unwrap().location_found);
    }

    #[tokio::test]
    async fn already_analyzed_records_are_skipped_unless_forced() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("metadata.json");
        let mut r = record(111, "great food tour in Lisboa");
        r.caption_analysis = Some(CaptionAnalysis {
            location_found: false,
            locations: None,
            error: None,
        });
        metadata::save_records(std::slice::from_ref(&r), &path).unwrap();

        let summary = enrich_metadata(&StubAnalyzer, &StubResolver, &path, false)
            .await
            .unwrap();
        assert_eq!(summary.skipped_analyzed, 1);
        assert_eq!(summary.analyzed, 0);

        let summary = enrich_metadata(&StubAnalyzer, &StubResolver, &path, true)
            .await
            .unwrap();
        assert_eq!(summary.analyzed, 1);
        let records = metadata::load_records(&path).unwrap();
        assert!(records[0].caption_analysis.as_ref().unwrap().location_found);
    }

    #[tokio::test]
    async fn missing_metadata_file_is_fatal() {
        let dir = tempdir().unwrap();
        let result = enrich_metadata(
            &StubAnalyzer,
            &StubResolver,
            &dir.path().join("metadata.json"),
            false,
        )
        .await;
        assert!(result.is_err());
    }
}
