/// Default document title
pub const DEFAULT_TITLE: &str = "Report";

/// Default page margin in points
pub const DEFAULT_PAGE_MARGIN: f32 = 40.0;

/// Default body line height in points
pub const DEFAULT_LINE_HEIGHT: f32 = 14.0;

/// Vertical gap after each block in points
pub const DEFAULT_BLOCK_SPACING: f32 = 20.0;

/// Default title font size in points
pub const DEFAULT_TITLE_FONT_SIZE: f32 = 16.0;

/// Default body font size in points
pub const DEFAULT_BODY_FONT_SIZE: f32 = 12.0;

/// Table row height in points
pub const DEFAULT_ROW_HEIGHT: f32 = 25.0;

/// Table body font size in points
pub const DEFAULT_TABLE_FONT_SIZE: f32 = 10.0;

/// Table header font size in points
pub const DEFAULT_TABLE_HEADER_FONT_SIZE: f32 = 12.0;

/// Horizontal padding inside a table cell in points
pub const DEFAULT_CELL_PADDING: f32 = 5.0;

/// Column whose value selects an accent color
pub const DEFAULT_STATUS_FIELD: &str = "status";

/// Column always drawn in the muted color
pub const DEFAULT_MUTED_FIELD: &str = "email";

/// Default table columns: (header, field key, nominal width in points)
pub const DEFAULT_COLUMNS: [(&str, &str, f32); 6] = [
    ("ID", "id", 50.0),
    ("Customer", "customer", 120.0),
    ("Email", "email", 200.0),
    ("Amount", "amount", 80.0),
    ("Status", "status", 80.0),
    ("Date", "date", 100.0),
];

/// Image width ceiling / JPEG quality for the vector builder
pub const VECTOR_IMAGE_MAX_WIDTH: u32 = 1600;
pub const VECTOR_IMAGE_QUALITY: u8 = 98;

/// Image width ceiling / JPEG quality for the streaming builder
pub const STREAMING_IMAGE_MAX_WIDTH: u32 = 1200;
pub const STREAMING_IMAGE_QUALITY: u8 = 80;

/// Image width ceiling / JPEG quality for browser print (aggressive)
pub const BROWSER_IMAGE_MAX_WIDTH: u32 = 400;
pub const BROWSER_IMAGE_QUALITY: u8 = 30;

/// Maximum number of cached documents
pub const DEFAULT_CACHE_CAPACITY: usize = 50;

/// Cached document lifetime in seconds
pub const DEFAULT_CACHE_TTL_SECS: u64 = 600;

/// Browser output above this size is compacted when requested
pub const DEFAULT_COMPACTION_THRESHOLD: usize = 5 * 1024 * 1024;

/// Ghostscript-compatible compaction binary
pub const DEFAULT_COMPACTION_BINARY: &str = "gs";

/// Print margin passed to the browser, in millimetres
pub const DEFAULT_PRINT_MARGIN_MM: f32 = 10.0;

/// Concurrent browser pages
pub const DEFAULT_MAX_BROWSER_PAGES: usize = 4;

/// Seconds before a browser print is abandoned
pub const DEFAULT_PRINT_TIMEOUT_SECS: u64 = 60;

/// How long the browser connection may sit without traffic before it is dropped
pub const DEFAULT_BROWSER_IDLE_TIMEOUT_SECS: u64 = 24 * 60 * 60;

/// Streaming output chunk size in bytes
pub const DEFAULT_STREAM_CHUNK_SIZE: usize = 64 * 1024;

/// Bounded channel capacity (in chunks) between the writer and the consumer
pub const DEFAULT_STREAM_CHANNEL_CAPACITY: usize = 16;

/// Streamed documents larger than this are not cached
pub const DEFAULT_STREAM_MAX_CACHED_BYTES: usize = 32 * 1024 * 1024;
