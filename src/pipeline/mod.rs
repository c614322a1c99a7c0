//! Work around the renderers: image compression, output caching, size
//! reduction and the browser render pool.

pub mod cache;
pub mod images;
pub mod pool;
pub mod reducer;

pub use cache::{cache_key, OutputCache};
pub use images::{compress_all, compress_image};
pub use pool::{BrowserEngine, BrowserPage, ChromiumEngine, PageLease, PoolHealth, RenderPool};
pub use reducer::reduce;
