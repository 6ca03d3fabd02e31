/// A sorted ascending table of small primes, built once at miner
/// construction, used both for segment elimination and the quick
/// divisibility pre-check before Fermat verification.
pub struct SmallPrimeTable {
    primes: Vec<u64>,
}

impl SmallPrimeTable {
    /// Sieves primes up to `limit`, then truncates to at most `cap` entries.
    pub fn build(limit: u64, cap: usize) -> Self {
        let limit = limit.max(2) as usize;
        let mut is_composite = vec![false; limit + 1];
        let mut primes = Vec::new();
        for n in 2..=limit {
            if !is_composite[n] {
                primes.push(n as u64);
                if primes.len() >= cap {
                    break;
                }
                let mut m = n * n;
                while m <= limit {
                    is_composite[m] = true;
                    m += n;
                }
            }
        }
        Self { primes }
    }

    pub fn as_slice(&self) -> &[u64] {
        &self.primes
    }

    pub fn len(&self) -> usize {
        self.primes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.primes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_ascending_primes() {
        let table = SmallPrimeTable::build(100, 1000);
        assert_eq!(table.as_slice()[..5], [2, 3, 5, 7, 11]);
        assert!(table.as_slice().windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn respects_the_cap() {
        let table = SmallPrimeTable::build(1_000_000, 10);
        assert_eq!(table.len(), 10);
    }
}
