pub mod filesystem;

pub use filesystem::{issue_file_name, ProductionStorage, ISSUES_DIR_NAME};
