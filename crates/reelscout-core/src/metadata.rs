use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Filename of the per-collection sidecar.
pub const METADATA_FILENAME: &str = "metadata.json";

/// Google Maps place details attached during enrichment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlaceDetails {
    pub name: Option<String>,
    pub address: Option<String>,
    pub place_id: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub google_maps_uri: Option<String>,
}

/// Result of the AI caption analysis pass for one record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CaptionAnalysis {
    pub location_found: bool,
    pub locations: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// One resolved (or failed) place lookup for a location name the
/// analyzer discovered.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlaceEnrichment {
    pub original_name: String,
    pub google_maps_data: Option<PlaceDetails>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// One persisted record per top-level media item, in collection order.
///
/// `relative_path` is always relative to the collection directory: a bare
/// filename for photos/videos, a `"<pk>/"` directory string for albums,
/// or null when nothing was downloaded or found.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MetadataRecord {
    pub relative_path: Option<String>,
    pub caption: String,
    pub url: String,
    pub pk: u64,
    pub media_type: i64,
    pub product_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caption_analysis: Option<CaptionAnalysis>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub google_maps_enrichment: Option<Vec<PlaceEnrichment>>,
}

/// Write the full record list as one pretty-printed JSON array.
///
/// 4-space indent, declaration key order, non-ASCII left unescaped.
/// The file is replaced wholesale on every run.
pub fn save_records(records: &[MetadataRecord], path: &Path) -> anyhow::Result<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut writer, formatter);
    records.serialize(&mut ser)?;
    writer.flush()?;
    Ok(())
}

/// Read a previously written metadata file.
pub fn load_records(path: &Path) -> anyhow::Result<Vec<MetadataRecord>> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    Ok(serde_json::from_reader(reader)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn record(pk: u64) -> MetadataRecord {
        MetadataRecord {
            relative_path: Some(format!("{pk}.mp4")),
            caption: "Café de Flore ☕".to_string(),
            url: "https://www.instagram.com/p/CVideo1/".to_string(),
            pk,
            media_type: 2,
            product_type: "clips".to_string(),
            caption_analysis: None,
            google_maps_enrichment: None,
        }
    }

    #[test]
    fn save_load_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(METADATA_FILENAME);
        let records = vec![record(111), record(222)];

        save_records(&records, &path).unwrap();
        let loaded = load_records(&path).unwrap();
        assert_eq!(loaded, records);
    }

    #[test]
    fn non_ascii_is_not_escaped() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(METADATA_FILENAME);
        save_records(&[record(111)], &path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("Café de Flore ☕"));
        assert!(!text.contains("\\u"));
        // 4-space indent on array elements
        assert!(text.contains("\n    {"));
    }

    #[test]
    fn enrichment_fields_survive_rewrite() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(METADATA_FILENAME);

        let mut r = record(111);
        r.caption_analysis = Some(CaptionAnalysis {
            location_found: true,
            locations: Some(vec!["Café de Flore, Paris".to_string()]),
            error: None,
        });
        r.google_maps_enrichment = Some(vec![PlaceEnrichment {
            original_name: "Café de Flore, Paris".to_string(),
            google_maps_data: Some(PlaceDetails {
                name: Some("Café de Flore".to_string()),
                address: Some("172 Bd Saint-Germain, 75006 Paris".to_string()),
                place_id: "ChIJ...".to_string(),
                latitude: Some(48.854),
                longitude: Some(2.332),
                google_maps_uri: Some("https://maps.google.com/?cid=1".to_string()),
            }),
            error: None,
        }]);

        save_records(std::slice::from_ref(&r), &path).unwrap();
        let loaded = load_records(&path).unwrap();
        // A read-then-rewrite cycle must not drop enrichment data.
        save_records(&loaded, &path).unwrap();
        let again = load_records(&path).unwrap();
        assert_eq!(again, vec![r]);
    }

    #[test]
    fn absent_enrichment_keys_are_omitted() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(METADATA_FILENAME);
        save_records(&[record(111)], &path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(!text.contains("caption_analysis"));
        assert!(!text.contains("google_maps_enrichment"));
    }
}
