pub mod completion;
pub mod goal;
pub mod task;
pub mod user;
pub mod workspace;

use validator::ValidationError;

/// Rejects values that are empty once surrounding whitespace is dropped.
pub(crate) fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut err = ValidationError::new("blank");
        err.message = Some("must not be blank".into());
        return Err(err);
    }
    Ok(())
}
