pub mod config;
pub mod error;
pub mod escape;
pub mod flush;
pub mod naming;
pub mod path;
pub mod store;
pub mod types;

// Re-export commonly used types
pub use config::RandomizerConfig;
pub use error::{StoreError, StoreResult};
pub use escape::{class_selector, escape_class};
pub use flush::DebouncedFlusher;
pub use path::{project_root, resolve_secure_path};
pub use store::ClassMapStore;
pub use types::{
    ClassMap, CollisionPolicy, IdMode, DEFAULT_ID_LENGTH, DEFAULT_MAP_PATH, MIN_ID_LENGTH,
};
