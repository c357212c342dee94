use crate::error::ExtractError;

/// Running totals of what the scanner has admitted for one archive. Only the scanner touches
/// this, counters never decrease.
#[derive(Debug)]
pub struct QuotaGuard {
    max_extract_size: u64,
    max_file_count: usize,
    bytes_so_far: u64,
    files_so_far: usize,
}

impl QuotaGuard {
    pub fn new(max_extract_size: u64, max_file_count: usize) -> Self {
        Self {
            max_extract_size,
            max_file_count,
            bytes_so_far: 0,
            files_so_far: 0,
        }
    }

    /// Account for the next entry. Counting happens before the check, an error means the entry
    /// must not be admitted and scanning stops.
    pub fn admit(&mut self, declared_size: u64) -> Result<(), ExtractError> {
        self.files_so_far += 1;
        if self.files_so_far > self.max_file_count {
            return Err(ExtractError::TooManyFiles {
                count: self.files_so_far,
                limit: self.max_file_count,
            });
        }

        self.bytes_so_far = self.bytes_so_far.saturating_add(declared_size);
        if self.bytes_so_far > self.max_extract_size {
            return Err(ExtractError::ExtractSizeExceeded {
                total: self.bytes_so_far,
                limit: self.max_extract_size,
            });
        }

        Ok(())
    }

    pub fn bytes_so_far(&self) -> u64 {
        self.bytes_so_far
    }

    pub fn files_so_far(&self) -> usize {
        self.files_so_far
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admits_up_to_file_limit_test() {
        let mut quota = QuotaGuard::new(u64::MAX, 3);
        assert!(quota.admit(1).is_ok());
        assert!(quota.admit(1).is_ok());
        assert!(quota.admit(1).is_ok());

        match quota.admit(1) {
            Err(ExtractError::TooManyFiles { count, limit }) => {
                assert_eq!(count, 4);
                assert_eq!(limit, 3);
            }
            other => panic!("expected too many files, got {other:?}"),
        }
    }

    #[test]
    fn size_limit_is_inclusive_test() {
        let mut quota = QuotaGuard::new(10, 100);
        assert!(quota.admit(4).is_ok());
        assert!(quota.admit(6).is_ok());
        assert_eq!(quota.bytes_so_far(), 10);

        assert!(matches!(
            quota.admit(1),
            Err(ExtractError::ExtractSizeExceeded { total: 11, limit: 10 })
        ));
    }

    #[test]
    fn file_count_checked_before_size_test() {
        let mut quota = QuotaGuard::new(5, 1);
        assert!(quota.admit(5).is_ok());
        // Both limits would be breached, the count is checked first.
        assert!(matches!(
            quota.admit(5),
            Err(ExtractError::TooManyFiles { .. })
        ));
        assert_eq!(quota.bytes_so_far(), 5);
    }

    #[test]
    fn counters_are_monotonic_test() {
        let mut quota = QuotaGuard::new(100, 100);
        let mut last = (0, 0);
        for size in [0, 7, 0, 30] {
            quota.admit(size).unwrap();
            let now = (quota.files_so_far(), quota.bytes_so_far());
            assert!(now.0 > last.0);
            assert!(now.1 >= last.1);
            last = now;
        }
    }

    #[test]
    fn declared_size_overflow_saturates_test() {
        let mut quota = QuotaGuard::new(u64::MAX - 1, 10);
        assert!(quota.admit(u64::MAX - 1).is_ok());
        assert!(matches!(
            quota.admit(u64::MAX),
            Err(ExtractError::ExtractSizeExceeded { .. })
        ));
    }
}
