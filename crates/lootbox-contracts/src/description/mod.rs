//! Pure text and record construction from sampled attributes.

mod metadata;
mod prompt;

pub use metadata::{
    build_metadata, custom_metadata, instantiate_metadata, MetadataRecord, TraitEntry,
    IMAGE_PLACEHOLDER, NAME_TEMPLATE, TOKEN_ID_PLACEHOLDER,
};
pub use prompt::build_prompt;
