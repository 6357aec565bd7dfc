pub mod domain;
pub mod error;
pub mod media;
pub mod protocol;
pub mod validation;
