use sieve_core::domain::Domain;
use sieve_core::matcher::DomainSet;

/// Counters for one merge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeStats {
    pub before: usize,
    pub after: usize,
    pub deduped: usize,
}

/// Union several already-normalized sources into one set.
pub fn merge_sources<'a, I>(sources: I) -> (DomainSet, MergeStats)
where
    I: IntoIterator<Item = &'a [Domain]>,
{
    let mut before = 0usize;
    let set: DomainSet = sources
        .into_iter()
        .flat_map(|source| {
            before += source.len();
            source.iter().cloned()
        })
        .collect();

    let after = set.len();
    let stats = MergeStats {
        before,
        after,
        deduped: before - after,
    };
    (set, stats)
}
