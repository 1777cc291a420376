pub mod assembler;
pub mod color;
pub mod fetcher;
pub mod models;
pub mod prerender;
pub mod provider;
pub mod session;

pub use assembler::RenderDataAssembler;
pub use color::ColorExtractor;
pub use fetcher::{AssetFetcher, HttpAssetFetcher};
pub use models::{
    Bitmap, FriendTrack, RenderSnapshot, RenderSnapshotBuilder, Rgb, ShareSnapshot, Style, Track,
    TrackKey,
};
pub use prerender::{Artifact, ArtifactCache, ArtifactOrigin, PopulateReport, PrerenderCache};
pub use provider::{JsonFileShareDataProvider, ShareDataProvider, StaticShareDataProvider};
pub use session::{ShareServices, ShareSession};
