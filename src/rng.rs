use glam::{Vec2, Vec3};

const LDS_MAX_DIMENSIONS: usize = 32;
const LDS_PRIMES: [u32; LDS_MAX_DIMENSIONS] = [
    0x6a09e667, 0xbb67ae84, 0x3c6ef372, 0xa54ff539, 0x510e527f, 0x9b05688a, 0x1f83d9ab, 0x5be0cd18,
    0xcbbb9d5c, 0x629a2929, 0x91590159, 0x452fecd8, 0x67332667, 0x8eb44a86, 0xdb0c2e0b, 0x47b5481d,
    0xae5f9155, 0xcf6c85d1, 0x2f73477d, 0x6d1826ca, 0x8b43d455, 0xe360b595, 0x1c456002, 0x6f196330,
    0xd94ebeaf, 0x9cc4a611, 0x261dc1f2, 0x5815a7bd, 0x70b7ed67, 0xa1513c68, 0x44f93634, 0x720dcdfc,
];

pub fn pcg_hash(input: u32) -> u32 {
    let state = input.wrapping_mul(747796405).wrapping_add(2891336453);
    let word = ((state >> ((state >> 28) + 4)) ^ state).wrapping_mul(277803737);
    (word >> 22) ^ word
}

fn lds(n: u32, dimension: usize, offset: u32) -> f32 {
    const INV_U32_MAX_FLOAT: f32 = 1.0 / 4294967296.0;
    (LDS_PRIMES[dimension % LDS_MAX_DIMENSIONS].wrapping_mul(n.wrapping_add(offset))) as f32 * INV_U32_MAX_FLOAT
}

// dimension tracks how many scalars have been drawn from the current
// sample so repeated gen_r1 calls within one bounce don't alias
pub struct Rng {
    sample: u32,
    seed: u32,
    dimension: usize,
}

impl Rng {
    pub fn new(kernel_index: u64, pass: u32, lane: u32) -> Self {
        let seed = pcg_hash(pcg_hash(kernel_index as u32 ^ (kernel_index >> 32) as u32) ^ pcg_hash(pass) ^ lane);
        Self {
            sample: 0,
            seed,
            dimension: 0,
        }
    }

    pub fn next_sample(&mut self) {
        self.sample = self.sample.wrapping_add(1);
        self.dimension = 0;
    }

    pub fn gen_r1(&mut self) -> f32 {
        self.dimension += 1;
        lds(self.sample, self.dimension, self.seed)
    }

    pub fn gen_r2(&mut self) -> Vec2 {
        Vec2::new(self.gen_r1(), self.gen_r1())
    }

    pub fn gen_r3(&mut self) -> Vec3 {
        Vec3::new(self.gen_r1(), self.gen_r1(), self.gen_r1())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stays_in_unit_range() {
        let mut rng = Rng::new(0, 1, 0);
        for _ in 0..1000 {
            rng.next_sample();
            let r = rng.gen_r3();
            assert!(r.x >= 0.0 && r.x < 1.0);
            assert!(r.y >= 0.0 && r.y < 1.0);
            assert!(r.z >= 0.0 && r.z < 1.0);
        }
    }

    #[test]
    fn distinct_kernel_indices_decorrelate() {
        let mut a = Rng::new(0, 1, 0);
        let mut b = Rng::new(1, 1, 0);
        a.next_sample();
        b.next_sample();
        assert_ne!(a.gen_r1(), b.gen_r1());
    }
}
