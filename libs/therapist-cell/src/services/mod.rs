pub mod directory;
pub mod therapist;

pub use directory::{apply_directory_query, directory_request, DirectoryRequest};
pub use therapist::TherapistService;
