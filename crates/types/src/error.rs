use core::fmt;

/// Exit status of a successful command launch (including asynchronous
/// launches, which report success at spawn time).
pub const RETURN_OK: i32 = 0;

/// Exit status when the command binary could not be located or loaded.
/// The child's own exit code is never propagated through this path.
pub const COMMAND_NOT_LOADED: i32 = -1;

/// Failures surfaced by the process-execution personality. Each maps to
/// the legacy numeric code stored in the per-process error slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DosError {
    /// Allocation failure anywhere in the personality layer.
    NoFreeStore,
    /// Spawn requested with neither an entry point nor a segment list.
    MissingEntry,
    /// Missing file, malformed image, or truncated read during loading.
    ObjectNotFound,
}

impl DosError {
    /// The legacy numeric code for this error.
    pub fn code(self) -> i32 {
        match self {
            DosError::NoFreeStore => 103,
            DosError::MissingEntry => 116,
            DosError::ObjectNotFound => 205,
        }
    }
}

impl fmt::Display for DosError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            DosError::NoFreeStore => "no free store",
            DosError::MissingEntry => "no entry point or segment list",
            DosError::ObjectNotFound => "object not found",
        };
        write!(f, "{} (error {})", text, self.code())
    }
}

impl core::error::Error for DosError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_match_the_legacy_table() {
        assert_eq!(DosError::NoFreeStore.code(), 103);
        assert_eq!(DosError::MissingEntry.code(), 116);
        assert_eq!(DosError::ObjectNotFound.code(), 205);
    }
}
