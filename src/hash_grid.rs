use glam::Vec3;

fn hash_cell(cell: (i32, i32, i32), bucket_count: u32) -> u32 {
    const P1: i64 = 73856093;
    const P2: i64 = 19349663;
    const P3: i64 = 83492791;
    let h = (cell.0 as i64).wrapping_mul(P1)
        ^ (cell.1 as i64).wrapping_mul(P2)
        ^ (cell.2 as i64).wrapping_mul(P3);
    (h.rem_euclid(bucket_count as i64)) as u32
}

pub struct HashGrid {
    cell_size: f32,
    bucket_count: u32,
    // exclusive prefix sum over bucket occupancy, length bucket_count + 1
    cell_start: Vec<u32>,
    // point indices reordered so points sharing a bucket are contiguous
    sorted_indices: Vec<u32>,
    points: Vec<Vec3>,
    radius: f32,
}

impl HashGrid {
    pub fn build(points: &[Vec3], radius: f32) -> Self {
        assert!(radius >= 0.0, "hash grid radius must be non-negative");

        let n = points.len();
        let cell_size = 2.0 * radius;
        let bucket_count = (n as u32).saturating_mul(2).next_power_of_two().max(16);

        if n == 0 || cell_size <= 0.0 {
            return Self {
                cell_size,
                bucket_count,
                cell_start: vec![0; bucket_count as usize + 1],
                sorted_indices: Vec::new(),
                points: points.to_vec(),
                radius,
            };
        }

        let cell_of = |p: Vec3| -> (i32, i32, i32) {
            (
                (p.x / cell_size).floor() as i32,
                (p.y / cell_size).floor() as i32,
                (p.z / cell_size).floor() as i32,
            )
        };

        let buckets: Vec<u32> = points.iter().map(|&p| hash_cell(cell_of(p), bucket_count)).collect();

        let mut cell_start = vec![0u32; bucket_count as usize + 1];
        for &b in &buckets {
            cell_start[b as usize + 1] += 1;
        }
        for i in 0..bucket_count as usize {
            cell_start[i + 1] += cell_start[i];
        }

        let mut cursor = cell_start.clone();
        let mut sorted_indices = vec![0u32; n];
        for (idx, &b) in buckets.iter().enumerate() {
            let slot = cursor[b as usize];
            sorted_indices[slot as usize] = idx as u32;
            cursor[b as usize] += 1;
        }

        Self {
            cell_size,
            bucket_count,
            cell_start,
            sorted_indices,
            points: points.to_vec(),
            radius,
        }
    }

    // calls cb with the index of every stored point within self.radius of p, each exactly once
    pub fn range(&self, p: Vec3, mut cb: impl FnMut(usize)) {
        if self.points.is_empty() || self.cell_size <= 0.0 {
            return;
        }
        let r2 = self.radius * self.radius;

        let base = (
            (p.x / self.cell_size).floor() as i32,
            (p.y / self.cell_size).floor() as i32,
            (p.z / self.cell_size).floor() as i32,
        );
        let center = (
            (base.0 as f32 + 0.5) * self.cell_size,
            (base.1 as f32 + 0.5) * self.cell_size,
            (base.2 as f32 + 0.5) * self.cell_size,
        );
        let step = |axis_p: f32, axis_c: f32| if axis_p < axis_c { -1 } else { 1 };
        let dx = step(p.x, center.0);
        let dy = step(p.y, center.1);
        let dz = step(p.z, center.2);

        for &ox in &[0, dx] {
            for &oy in &[0, dy] {
                for &oz in &[0, dz] {
                    let cell = (base.0 + ox, base.1 + oy, base.2 + oz);
                    let bucket = hash_cell(cell, self.bucket_count) as usize;
                    let start = self.cell_start[bucket] as usize;
                    let end = self.cell_start[bucket + 1] as usize;
                    for &idx in &self.sorted_indices[start..end] {
                        let idx = idx as usize;
                        if self.points[idx].distance_squared(p) <= r2 {
                            cb(idx);
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_grid_is_a_noop() {
        let grid = HashGrid::build(&[], 1.0);
        let mut count = 0;
        grid.range(Vec3::ZERO, |_| count += 1);
        assert_eq!(count, 0);
    }

    #[test]
    fn range_never_returns_points_farther_than_radius() {
        let points: Vec<Vec3> = (0..200)
            .map(|i| {
                let f = i as f32;
                Vec3::new((f * 0.37).sin() * 5.0, (f * 0.71).cos() * 5.0, (f * 0.13).sin() * 5.0)
            })
            .collect();
        let radius = 0.8;
        let grid = HashGrid::build(&points, radius);
        let query = Vec3::new(1.0, -2.0, 0.5);
        let mut hits = Vec::new();
        grid.range(query, |idx| hits.push(idx));
        for idx in hits {
            assert!(points[idx].distance_squared(query) <= radius * radius + 1e-5);
        }
    }

    #[test]
    fn rebuilding_from_same_points_yields_identical_query_results() {
        let points = vec![Vec3::new(0.0, 0.0, 0.0), Vec3::new(0.1, 0.0, 0.0), Vec3::new(5.0, 5.0, 5.0)];
        let a = HashGrid::build(&points, 0.5);
        let b = HashGrid::build(&points, 0.5);
        let query = Vec3::new(0.05, 0.0, 0.0);
        let mut hits_a = Vec::new();
        let mut hits_b = Vec::new();
        a.range(query, |idx| hits_a.push(idx));
        b.range(query, |idx| hits_b.push(idx));
        hits_a.sort_unstable();
        hits_b.sort_unstable();
        assert_eq!(hits_a, hits_b);
    }
}
