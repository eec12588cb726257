//! Construction-time configuration, gathering the bound checks scattered
//! across the three constructors in
//! `examples/original_source/src/threadpoolexecutor.cpp` into one place.

use crate::error::PoolError;

/// Validated, immutable bundle of construction parameters shared by every
/// executor variant's constructor (`SPEC_FULL.md` §3 "Configuration").
#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub core_size: usize,
    pub max_size: usize,
    pub name_prefix: String,
}

impl PoolConfig {
    pub fn new(core_size: usize, max_size: usize, name_prefix: impl Into<String>) -> Result<Self, PoolError> {
        let config = PoolConfig {
            core_size,
            max_size,
            name_prefix: name_prefix.into(),
        };
        config.validate()?;
        Ok(config)
    }

    /// `core_size >= 0` is implied by `usize`; checks `max_size >= 1` and
    /// `max_size >= core_size` per `SPEC_FULL.md` §4.5.1.
    fn validate(&self) -> Result<(), PoolError> {
        if self.max_size < 1 || self.max_size < self.core_size {
            return Err(PoolError::BadConstruction {
                core_size: self.core_size,
                max_size: self.max_size,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_bounds_construct_successfully() {
        let config = PoolConfig::new(2, 4, "wp").unwrap();
        assert_eq!(config.core_size, 2);
        assert_eq!(config.max_size, 4);
    }

    #[test]
    fn max_size_zero_is_rejected() {
        assert!(matches!(
            PoolConfig::new(0, 0, "wp"),
            Err(PoolError::BadConstruction { .. })
        ));
    }

    #[test]
    fn max_size_below_core_size_is_rejected() {
        assert!(matches!(
            PoolConfig::new(4, 2, "wp"),
            Err(PoolError::BadConstruction { .. })
        ));
    }
}
