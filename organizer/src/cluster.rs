//! Deterministic k-means over dense rows
//!
//! Seeding is farthest-point starting from the first row, so the same input
//! always produces the same partition.

use bookmark_manager_core::TaggingError;

use crate::text::squared_distance;

/// Partition `rows` into at most `k` clusters
///
/// Returns the member indices of every non-empty cluster, in seed order.
/// Fewer than `k` clusters come back when rows coincide.
pub fn kmeans(rows: &[Vec<f64>], k: usize, max_iterations: usize) -> Result<Vec<Vec<usize>>, TaggingError> {
    if rows.is_empty() {
        return Err(TaggingError::ClusteringFailed { reason: "no rows to cluster".to_string() });
    }
    if k == 0 {
        return Err(TaggingError::ClusteringFailed { reason: "cluster count is zero".to_string() });
    }
    let dims = rows[0].len();
    if rows.iter().any(|r| r.len() != dims) {
        return Err(TaggingError::ClusteringFailed { reason: "rows differ in dimension".to_string() });
    }

    let mut centroids = seed_centroids(rows, k);
    let mut assignment: Vec<usize> = rows.iter().map(|r| nearest(&centroids, r)).collect();

    for _ in 0..max_iterations {
        centroids = recompute(rows, &assignment, &centroids);
        let next: Vec<usize> = rows.iter().map(|r| nearest(&centroids, r)).collect();
        if next == assignment {
            break;
        }
        assignment = next;
    }

    let mut clusters = vec![Vec::new(); centroids.len()];
    for (i, &c) in assignment.iter().enumerate() {
        clusters[c].push(i);
    }
    clusters.retain(|members| !members.is_empty());
    Ok(clusters)
}

/// One cluster per `per_cluster` documents, kept within `min..=max` and never above `n`
pub fn cluster_count(n: usize, min: usize, max: usize, per_cluster: usize) -> usize {
    (n / per_cluster.max(1)).max(min).min(max).min(n)
}

fn seed_centroids(rows: &[Vec<f64>], k: usize) -> Vec<Vec<f64>> {
    let mut centroids = vec![rows[0].clone()];
    while centroids.len() < k {
        let farthest = rows
            .iter()
            .enumerate()
            .map(|(i, r)| {
                let d = centroids
                    .iter()
                    .map(|c| squared_distance(c, r))
                    .fold(f64::INFINITY, f64::min);
                (i, d)
            })
            .fold((0, 0.0), |best, cur| if cur.1 > best.1 { cur } else { best });

        // Every row already coincides with a centroid
        if farthest.1 <= 0.0 {
            break;
        }
        centroids.push(rows[farthest.0].clone());
    }
    centroids
}

fn nearest(centroids: &[Vec<f64>], row: &[f64]) -> usize {
    centroids
        .iter()
        .enumerate()
        .map(|(i, c)| (i, squared_distance(c, row)))
        .fold((0, f64::INFINITY), |best, cur| if cur.1 < best.1 { cur } else { best })
        .0
}

fn recompute(rows: &[Vec<f64>], assignment: &[usize], previous: &[Vec<f64>]) -> Vec<Vec<f64>> {
    let dims = rows[0].len();
    let mut sums = vec![vec![0.0; dims]; previous.len()];
    let mut counts = vec![0usize; previous.len()];

    for (row, &c) in rows.iter().zip(assignment) {
        counts[c] += 1;
        for (s, v) in sums[c].iter_mut().zip(row) {
            *s += v;
        }
    }

    sums.into_iter()
        .zip(counts)
        .zip(previous)
        .map(|((sum, count), old)| {
            if count == 0 {
                old.clone()
            } else {
                sum.into_iter().map(|s| s / count as f64).collect()
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cluster_count() {
        assert_eq!(cluster_count(1, 3, 5, 5), 1);
        assert_eq!(cluster_count(2, 3, 5, 5), 2);
        assert_eq!(cluster_count(4, 3, 5, 5), 3);
        assert_eq!(cluster_count(20, 3, 5, 5), 4);
        assert_eq!(cluster_count(100, 3, 5, 5), 5);
    }

    #[test]
    fn test_separates_obvious_groups() {
        let rows = vec![
            vec![1.0, 0.0],
            vec![0.0, 1.0],
            vec![0.9, 0.1],
            vec![0.1, 0.9],
        ];

        let clusters = kmeans(&rows, 2, 100).unwrap();

        assert_eq!(clusters, vec![vec![0, 2], vec![1, 3]]);
    }

    #[test]
    fn test_identical_rows_collapse() {
        let rows = vec![vec![1.0, 0.0]; 4];
        let clusters = kmeans(&rows, 3, 100).unwrap();
        assert_eq!(clusters, vec![vec![0, 1, 2, 3]]);
    }

    #[test]
    fn test_rejects_bad_input() {
        assert!(kmeans(&[], 2, 10).is_err());
        assert!(kmeans(&[vec![1.0]], 0, 10).is_err());
        assert!(kmeans(&[vec![1.0], vec![1.0, 2.0]], 1, 10).is_err());
    }

    #[test]
    fn test_deterministic() {
        let rows: Vec<Vec<f64>> = (0..12)
            .map(|i| vec![(i % 3) as f64, (i % 4) as f64, (i % 5) as f64])
            .collect();
        assert_eq!(kmeans(&rows, 4, 100).unwrap(), kmeans(&rows, 4, 100).unwrap());
    }
}
