pub mod analyzer;
pub mod enrich;
pub mod fetch;
pub mod instagram;
pub mod media;
pub mod metadata;
pub mod places;
pub mod probe;
pub mod reconcile;

pub use analyzer::CaptionAnalyzer;
pub use enrich::{enrich_metadata, EnrichSummary};
pub use fetch::{FetchError, MediaFetcher};
pub use instagram::{Collection, InstagramClient, SessionSettings};
pub use media::{AlbumResource, MediaDescriptor, MediaKind};
pub use metadata::{MetadataRecord, METADATA_FILENAME};
pub use places::PlaceResolver;
pub use reconcile::{reconcile, EventCallback, ReconcileEvent, ReconcileSummary};
