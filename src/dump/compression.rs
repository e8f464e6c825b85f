//! Gzip compression level policy.

use flate2::Compression;

/// Normalizes a requested gzip level into a [Compression] setting.
///
/// `-1` selects the library default and `-2` the fastest, lowest-ratio
/// mode. Values outside `-2..=9` fall back to maximum compression instead
/// of erroring; the CLI already rejects them at startup, this keeps the
/// function total for direct library users.
pub fn normalize_level(level: i32) -> Compression {
    match level {
        -1 => Compression::default(),
        -2 => Compression::fast(),
        0..=9 => Compression::new(level as u32),
        _ => Compression::best(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_and_fast_aliases_are_accepted() {
        assert_eq!(normalize_level(-1), Compression::default());
        assert_eq!(normalize_level(-2), Compression::fast());
    }

    #[test]
    fn explicit_levels_pass_through() {
        for level in 0..=9 {
            assert_eq!(normalize_level(level), Compression::new(level as u32));
        }
    }

    #[test]
    fn out_of_range_levels_fall_back_to_best() {
        assert_eq!(normalize_level(15), Compression::best());
        assert_eq!(normalize_level(-5), Compression::best());
        assert_eq!(normalize_level(i32::MAX), Compression::best());
    }
}
