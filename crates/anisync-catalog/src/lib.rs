pub mod anilist;
pub mod error;
pub mod traits;

pub use anilist::AniListClient;
pub use error::CatalogError;
pub use traits::{CatalogPage, CatalogSource};
