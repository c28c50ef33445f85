//! Mapper configuration.

/// Configuration for opening a [`Mapper`](crate::Mapper).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapperConfig {
    /// Whether to declare unique indexes on the natural-key paths of
    /// embedded and unique-array kinds when the mapper opens.
    pub ensure_indexes: bool,

    /// Whether get-or-create (and `FindOrInsert`) turns a duplicate-key
    /// failure on insert into a fetch of the winning record.
    pub retry_duplicate_as_fetch: bool,

    /// Whether array-kind read-modify-write is guarded against concurrent
    /// modification of the same list.
    pub optimistic_array_writes: bool,

    /// Whether `update` rejects writes to nested key fields and nulling
    /// of required fields. Primary keys are immutable either way.
    pub validate_on_update: bool,
}

impl Default for MapperConfig {
    fn default() -> Self {
        Self {
            ensure_indexes: true,
            retry_duplicate_as_fetch: true,
            optimistic_array_writes: true,
            validate_on_update: true,
        }
    }
}

impl MapperConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether to declare unique indexes on open.
    #[must_use]
    pub const fn ensure_indexes(mut self, value: bool) -> Self {
        self.ensure_indexes = value;
        self
    }

    /// Sets whether duplicate-key inserts are retried as fetches.
    #[must_use]
    pub const fn retry_duplicate_as_fetch(mut self, value: bool) -> Self {
        self.retry_duplicate_as_fetch = value;
        self
    }

    /// Sets whether array-kind list writes are optimistic.
    #[must_use]
    pub const fn optimistic_array_writes(mut self, value: bool) -> Self {
        self.optimistic_array_writes = value;
        self
    }

    /// Sets whether updates are validated.
    #[must_use]
    pub const fn validate_on_update(mut self, value: bool) -> Self {
        self.validate_on_update = value;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_safe() {
        let config = MapperConfig::default();
        assert!(config.ensure_indexes);
        assert!(config.retry_duplicate_as_fetch);
        assert!(config.optimistic_array_writes);
        assert!(config.validate_on_update);
    }

    #[test]
    fn builder_chains() {
        let config = MapperConfig::new()
            .ensure_indexes(false)
            .optimistic_array_writes(false);
        assert!(!config.ensure_indexes);
        assert!(!config.optimistic_array_writes);
        assert!(config.retry_duplicate_as_fetch);
    }
}
