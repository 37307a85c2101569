use crate::error::{FetchError, ProvisionError};

pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FAILURE: i32 = 1;
pub const EXIT_CONFIG: i32 = 2;
pub const EXIT_SKIPPED: i32 = 3;
pub const EXIT_UNSUPPORTED: i32 = 4;
/// `status` found no running instance of the application.
pub const EXIT_NOT_RUNNING: i32 = 5;
pub const EXIT_LOCKED: i32 = 16;
pub const EXIT_FETCH: i32 = 20;
pub const EXIT_INSTALL_ARCHIVE: i32 = 21;
pub const EXIT_PACKAGE_MANAGER: i32 = 22;
pub const EXIT_CANCELLED: i32 = 130;

pub fn get_exit_code(error: &ProvisionError) -> i32 {
    if error.is_cancellation() {
        return EXIT_CANCELLED;
    }

    match error {
        ProvisionError::ConfigError(_) | ProvisionError::InvalidConfig(_) => EXIT_CONFIG,

        ProvisionError::Unsupported(_) | ProvisionError::MissingArtifact { .. } => {
            EXIT_UNSUPPORTED
        }

        ProvisionError::Locked { .. } => EXIT_LOCKED,

        ProvisionError::Fetch(FetchError::Insecure(_)) => EXIT_CONFIG,
        ProvisionError::Fetch(_) => EXIT_FETCH,

        ProvisionError::Install(_) => EXIT_INSTALL_ARCHIVE,

        ProvisionError::PackageManager(_) => EXIT_PACKAGE_MANAGER,

        _ => EXIT_FAILURE,
    }
}
