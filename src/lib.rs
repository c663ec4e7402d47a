/// Grading tools for bulk submission downloads. The binary in `src/bin` is a
/// thin command line layer over these modules.
pub mod archive;
pub mod error;
pub mod identity;
pub mod layout;
pub mod pipeline;
pub mod report;
pub mod roster;
pub mod settings;
pub mod stage;
pub mod supervisor;
pub mod utils;
