/// Instagram media type discriminators as reported by the private API.
pub const MEDIA_TYPE_PHOTO: i64 = 1;
pub const MEDIA_TYPE_VIDEO: i64 = 2;
pub const MEDIA_TYPE_ALBUM: i64 = 8;

/// Kind of a media item, derived from the raw `media_type` discriminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Photo,
    Video,
    Album,
}

impl MediaKind {
    /// Map a raw discriminator to a kind. Unknown values are unsupported
    /// and excluded from processing entirely.
    pub fn from_discriminator(media_type: i64) -> Option<Self> {
        match media_type {
            MEDIA_TYPE_PHOTO => Some(MediaKind::Photo),
            MEDIA_TYPE_VIDEO => Some(MediaKind::Video),
            MEDIA_TYPE_ALBUM => Some(MediaKind::Album),
            _ => None,
        }
    }

    pub fn discriminator(self) -> i64 {
        match self {
            MediaKind::Photo => MEDIA_TYPE_PHOTO,
            MediaKind::Video => MEDIA_TYPE_VIDEO,
            MediaKind::Album => MEDIA_TYPE_ALBUM,
        }
    }
}

/// One nested item inside a carousel album (photo or video only,
/// the API never nests albums).
#[derive(Debug, Clone)]
pub struct AlbumResource {
    pub pk: u64,
    pub media_type: i64,
}

/// One top-level media item of a collection, as fetched from the API.
/// Read-only input to the reconciler.
#[derive(Debug, Clone)]
pub struct MediaDescriptor {
    /// Stable numeric identifier, unique within a collection.
    pub pk: u64,
    /// Raw media type discriminator (1=photo, 2=video, 8=album).
    pub media_type: i64,
    /// Shortcode used to form the permalink.
    pub code: String,
    /// Caption text; None when the post has no caption.
    pub caption: Option<String>,
    /// Product type passthrough ("feed", "clips", "igtv", ...).
    pub product_type: String,
    /// Nested resources for albums, in carousel order. Empty otherwise.
    pub resources: Vec<AlbumResource>,
}

impl MediaDescriptor {
    pub fn kind(&self) -> Option<MediaKind> {
        MediaKind::from_discriminator(self.media_type)
    }

    /// Permalink derived from the shortcode.
    pub fn permalink(&self) -> String {
        format!("https://www.instagram.com/p/{}/", self.code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_from_discriminator() {
        assert_eq!(MediaKind::from_discriminator(1), Some(MediaKind::Photo));
        assert_eq!(MediaKind::from_discriminator(2), Some(MediaKind::Video));
        assert_eq!(MediaKind::from_discriminator(8), Some(MediaKind::Album));
        assert_eq!(MediaKind::from_discriminator(0), None);
        assert_eq!(MediaKind::from_discriminator(42), None);
    }

    #[test]
    fn permalink_from_code() {
        let m = MediaDescriptor {
            pk: 111,
            media_type: 2,
            code: "CVideo1".to_string(),
            caption: None,
            product_type: "clips".to_string(),
            resources: vec![],
        };
        assert_eq!(m.permalink(), "https://www.instagram.com/p/CVideo1/");
    }
}
