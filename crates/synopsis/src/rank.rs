use serde::{Deserialize, Serialize};

use crate::result::{ResultIx, ScoreOrder, SearchResult};

/// Which results compete with each other for rank
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RankGrouping {
    /// All results for a spectrum compete
    Scan,
    /// Results for a spectrum compete only within the same precursor charge
    ScanAndCharge,
}

impl Default for RankGrouping {
    fn default() -> Self {
        Self::Scan
    }
}

impl RankGrouping {
    fn same_group(&self, a: &SearchResult, b: &SearchResult) -> bool {
        match self {
            RankGrouping::Scan => a.scan == b.scan,
            RankGrouping::ScanAndCharge => a.scan == b.scan && a.charge == b.charge,
        }
    }

    /// Order the arena so that every rank partition is contiguous; within a
    /// partition the original order is kept
    pub fn sort(&self, arena: &[SearchResult], indices: &mut [ResultIx]) {
        indices.sort_by(|a, b| {
            let (a, b) = (&arena[a.0 as usize], &arena[b.0 as usize]);
            match self {
                RankGrouping::Scan => a.scan.cmp(&b.scan),
                RankGrouping::ScanAndCharge => {
                    a.scan.cmp(&b.scan).then_with(|| a.charge.cmp(&b.charge))
                }
            }
        });
    }

    /// Split `indices` (already sorted with [`RankGrouping::sort`]) into
    /// partitions at group boundaries
    pub fn partitions<'a>(
        &self,
        arena: &'a [SearchResult],
        indices: &'a [ResultIx],
    ) -> impl Iterator<Item = &'a [ResultIx]> + 'a {
        let grouping = *self;
        indices.chunk_by_group(move |a, b| {
            grouping.same_group(&arena[a.0 as usize], &arena[b.0 as usize])
        })
    }
}

/// Split a slice into runs where consecutive elements satisfy `same`
pub trait ChunkByGroup<T> {
    fn chunk_by_group<'a, F>(&'a self, same: F) -> ChunkBy<'a, T, F>
    where
        F: FnMut(&T, &T) -> bool;
}

impl<T> ChunkByGroup<T> for [T] {
    fn chunk_by_group<'a, F>(&'a self, same: F) -> ChunkBy<'a, T, F>
    where
        F: FnMut(&T, &T) -> bool,
    {
        ChunkBy { slice: self, same }
    }
}

pub struct ChunkBy<'a, T, F> {
    slice: &'a [T],
    same: F,
}

impl<'a, T, F> Iterator for ChunkBy<'a, T, F>
where
    F: FnMut(&T, &T) -> bool,
{
    type Item = &'a [T];

    fn next(&mut self) -> Option<Self::Item> {
        if self.slice.is_empty() {
            return None;
        }
        let mut end = 1;
        while end < self.slice.len() && (self.same)(&self.slice[end - 1], &self.slice[end]) {
            end += 1;
        }
        let (head, tail) = self.slice.split_at(end);
        self.slice = tail;
        Some(head)
    }
}

/// Assign dense competition ranks within one partition: best score first,
/// exact ties (within `f64::EPSILON`) share a rank, and the next distinct
/// score always receives the previous rank + 1.
///
/// `partition` is reordered best-first.
pub fn assign_ranks(arena: &mut [SearchResult], partition: &mut [ResultIx], order: ScoreOrder) {
    partition.sort_by(|a, b| order.compare(arena[a.0 as usize].score, arena[b.0 as usize].score));

    let mut rank = 0;
    let mut previous: Option<f64> = None;
    for ix in partition.iter() {
        let result = &mut arena[ix.0 as usize];
        match previous {
            Some(score) if (result.score - score).abs() <= f64::EPSILON => {}
            _ => rank += 1,
        }
        previous = Some(result.score);
        result.rank = rank;
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn result(scan: u32, charge: u8, score: f64) -> SearchResult {
        SearchResult {
            scan,
            charge,
            score,
            ..Default::default()
        }
    }

    #[test]
    fn dense_ranks_with_ties() {
        let mut arena = vec![
            result(100, 2, 0.80),
            result(100, 2, 0.95),
            result(100, 2, 0.95),
            result(100, 2, 0.10),
        ];
        let mut partition = (0..4).map(ResultIx).collect::<Vec<_>>();
        assign_ranks(&mut arena, &mut partition, ScoreOrder::HigherIsBetter);
        assert_eq!(partition, vec![ResultIx(1), ResultIx(2), ResultIx(0), ResultIx(3)]);
        let ranks = arena.iter().map(|r| r.rank).collect::<Vec<_>>();
        assert_eq!(ranks, vec![2, 1, 1, 3]);
    }

    #[test]
    fn lower_is_better() {
        let mut arena = vec![result(1, 2, 1e-3), result(1, 2, 1e-9), result(1, 2, 1e-5)];
        let mut partition = (0..3).map(ResultIx).collect::<Vec<_>>();
        assign_ranks(&mut arena, &mut partition, ScoreOrder::LowerIsBetter);
        let ranks = arena.iter().map(|r| r.rank).collect::<Vec<_>>();
        assert_eq!(ranks, vec![3, 1, 2]);
    }

    #[test]
    fn partitions() {
        let arena = vec![
            result(2, 3, 1.0),
            result(1, 2, 1.0),
            result(2, 2, 1.0),
            result(1, 2, 1.0),
        ];
        let mut indices = (0..4).map(ResultIx).collect::<Vec<_>>();

        RankGrouping::Scan.sort(&arena, &mut indices);
        let groups = RankGrouping::Scan
            .partitions(&arena, &indices)
            .map(|p| p.to_vec())
            .collect::<Vec<_>>();
        assert_eq!(
            groups,
            vec![
                vec![ResultIx(1), ResultIx(3)],
                vec![ResultIx(0), ResultIx(2)]
            ]
        );

        RankGrouping::ScanAndCharge.sort(&arena, &mut indices);
        let groups = RankGrouping::ScanAndCharge
            .partitions(&arena, &indices)
            .count();
        assert_eq!(groups, 3);
    }

    #[quickcheck_macros::quickcheck]
    fn ranks_are_dense(scores: Vec<u8>) -> bool {
        // Small integer scores guarantee plenty of ties
        let mut arena = scores
            .iter()
            .map(|&s| result(1, 2, s as f64 / 4.0))
            .collect::<Vec<_>>();
        let mut partition = (0..arena.len() as u32).map(ResultIx).collect::<Vec<_>>();
        assign_ranks(&mut arena, &mut partition, ScoreOrder::HigherIsBetter);

        partition.windows(2).all(|w| {
            let (a, b) = (&arena[w[0].0 as usize], &arena[w[1].0 as usize]);
            if a.score == b.score {
                a.rank == b.rank
            } else {
                b.rank == a.rank + 1
            }
        }) && partition
            .first()
            .map(|ix| arena[ix.0 as usize].rank == 1)
            .unwrap_or(true)
    }
}
