//! Host machine identity.
//!
//! Machine-bound licenses compare a UUID in the record against the host's
//! stable 128-bit machine id. The id is treated as opaque: read once, parsed
//! as a UUID, never derived or hashed here. Callers that already know the
//! host identity (tests, fleet controllers) pass it through
//! [`crate::VerifyOptions`] and this module is never consulted.

use crate::error::LicenseError;
use uuid::Uuid;

/// Candidate machine-id files, in preference order.
#[cfg(target_os = "linux")]
const MACHINE_ID_PATHS: [&str; 2] = ["/etc/machine-id", "/var/lib/dbus/machine-id"];

/// Reads the host's machine id.
///
/// # Errors
/// Returns [`LicenseError::MachineIdUnavailable`] when no readable id
/// exists or the content does not parse as a UUID.
#[cfg(target_os = "linux")]
pub fn host_machine_id() -> Result<Uuid, LicenseError> {
    for path in MACHINE_ID_PATHS {
        let Ok(text) = std::fs::read_to_string(path) else {
            continue;
        };
        return Uuid::try_parse(text.trim()).map_err(|e| LicenseError::MachineIdUnavailable {
            reason: format!("{path} does not hold a UUID: {e}"),
        });
    }
    Err(LicenseError::MachineIdUnavailable { reason: "no machine-id file found".to_owned() })
}

/// Reads the host's machine id.
///
/// # Errors
/// Always errors on platforms without a supported machine-id source; supply
/// the identity through [`crate::VerifyOptions::machine`] instead.
#[cfg(not(target_os = "linux"))]
pub fn host_machine_id() -> Result<Uuid, LicenseError> {
    Err(LicenseError::MachineIdUnavailable {
        reason: "no machine-id source on this platform; pass the machine explicitly".to_owned(),
    })
}

#[cfg(all(test, target_os = "linux"))]
mod tests {
    use super::*;

    #[test]
    fn host_id_parses_when_present() {
        // Not every build environment has systemd; only assert shape when
        // the file exists.
        if std::path::Path::new("/etc/machine-id").exists() {
            let id = host_machine_id().unwrap();
            assert_ne!(id, Uuid::nil());
        }
    }
}
