//! Version gate for database verification.
//!
//! A full integrity sweep is expensive, so it only runs when crossing
//! the verification checkpoint: a database last touched by a version
//! older than the checkpoint must be re-verified once by any application
//! at or past it. After a clean sweep the database records the running
//! version and later startups skip the sweep.

use semver::Version;
use thiserror::Error;

/// Databases written before this version must pass a full integrity
/// sweep before use
pub const DB_VERIFY_CHECKPOINT_VERSION: &str = "0.2.0";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum VersionError {
    #[error("database version {db} is newer than application version {app}")]
    DbNewerThanApp { db: Version, app: Version },
    #[error("invalid version string: {0}")]
    Parse(String),
}

fn checkpoint() -> Version {
    // The constant is a valid semver literal
    match Version::parse(DB_VERIFY_CHECKPOINT_VERSION) {
        Ok(v) => v,
        Err(_) => unreachable!(),
    }
}

/// Reject databases written by a newer application than the one running
pub fn check_db_version(app: &Version, db: &Version) -> Result<(), VersionError> {
    if db > app {
        return Err(VersionError::DbNewerThanApp {
            db: db.clone(),
            app: app.clone(),
        });
    }
    Ok(())
}

/// Whether startup must run the full integrity sweep.
///
/// A database with no recorded version is always verified. Otherwise the
/// sweep runs only when the database predates the checkpoint and the
/// running application has reached it.
pub fn should_verify(app: &Version, db: Option<&Version>) -> bool {
    let checkpoint = checkpoint();
    match db {
        None => true,
        Some(db) => *db < checkpoint && *app >= checkpoint,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    #[test]
    fn test_unversioned_db_always_verified() {
        assert!(should_verify(&v("0.1.0"), None));
        assert!(should_verify(&v("9.9.9"), None));
    }

    #[test]
    fn test_verify_when_crossing_checkpoint() {
        assert!(should_verify(&v("0.2.0"), Some(&v("0.1.0"))));
        assert!(should_verify(&v("0.3.1"), Some(&v("0.1.9"))));
    }

    #[test]
    fn test_skip_when_db_at_or_past_checkpoint() {
        assert!(!should_verify(&v("0.2.1"), Some(&v("0.2.0"))));
        assert!(!should_verify(&v("0.3.0"), Some(&v("0.2.5"))));
    }

    #[test]
    fn test_skip_when_app_predates_checkpoint() {
        assert!(!should_verify(&v("0.1.5"), Some(&v("0.1.0"))));
    }

    #[test]
    fn test_db_newer_than_app_rejected() {
        assert_eq!(
            check_db_version(&v("0.2.1"), &v("0.3.0")),
            Err(VersionError::DbNewerThanApp {
                db: v("0.3.0"),
                app: v("0.2.1"),
            })
        );
        assert!(check_db_version(&v("0.2.1"), &v("0.2.1")).is_ok());
        assert!(check_db_version(&v("0.2.1"), &v("0.1.0")).is_ok());
    }
}
