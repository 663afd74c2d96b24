mod codec;
pub mod handler;
mod local;
mod remover;
mod types;
mod upstream;

pub use codec::{CodecError, decode_to_rgba, encode_png};
pub use handler::create_background_router;
pub use local::BorderKeyRemover;
pub use remover::{BackgroundRemover, RemovalError, build_remover};
pub use types::RemoveBgUpload;
pub use upstream::HttpRemover;
