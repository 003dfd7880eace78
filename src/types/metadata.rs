/// Track metadata pushed to the receiver via `SET_PARAMETER`.
///
/// Produced by the external metadata-extraction collaborator; the core only
/// consumes these fields when building DMAP text and artwork payloads.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Metadata {
    /// Track title.
    pub title: String,

    /// Artist name.
    pub artist: String,

    /// Album name.
    pub album: String,

    /// Album artwork bytes (JPEG/PNG), if available.
    pub artwork: Option<Vec<u8>>,

    /// Track duration in seconds, used to compute the `progress` end bound.
    pub duration_secs: Option<f64>,
}

impl Metadata {
    /// Create metadata with the required title/artist/album fields.
    #[must_use]
    pub fn new(
        title: impl Into<String>,
        artist: impl Into<String>,
        album: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            artist: artist.into(),
            album: album.into(),
            artwork: None,
            duration_secs: None,
        }
    }

    /// Builder method to attach artwork bytes.
    #[must_use]
    pub fn with_artwork(mut self, artwork: Vec<u8>) -> Self {
        self.artwork = Some(artwork);
        self
    }

    /// Builder method to set duration.
    #[must_use]
    pub fn with_duration(mut self, duration_secs: f64) -> Self {
        self.duration_secs = Some(duration_secs);
        self
    }
}
