pub mod defaults;
pub mod settings;

pub use settings::{
    BrowserSettings, CacheSettings, CompactionPreset, CompactionSettings, ImageProfile,
    ImageProfiles, Settings, StreamSettings, TableSettings,
};
