//! Seed management for terrain generation
//!
//! Each stochastic stage (value noise, domain warp, rain placement) gets its
//! own seed so that one stage can be varied while the others stay fixed.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Seeds for every randomized stage of a terrain build.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct TerrainSeeds {
    /// Master seed (used for display/reference)
    pub master: u64,
    /// Multi-octave value noise summed onto the final height
    pub noise: u64,
    /// Domain warp offsets fed into the noise lookup
    pub warp: u64,
    /// Rain placement, radius and intensity during hydraulic erosion
    pub erosion: u64,
}

impl TerrainSeeds {
    /// Derive every sub-seed deterministically from a master seed.
    pub fn from_master(master: u64) -> Self {
        Self {
            master,
            noise: derive_seed(master, "noise"),
            warp: derive_seed(master, "warp"),
            erosion: derive_seed(master, "erosion"),
        }
    }

    pub fn builder(master: u64) -> TerrainSeedsBuilder {
        TerrainSeedsBuilder::new(master)
    }

    /// 32-bit seed for the `noise` crate generators.
    pub fn noise_u32(&self) -> u32 {
        fold_u32(self.noise)
    }

    pub fn warp_u32(&self) -> u32 {
        fold_u32(self.warp)
    }
}

impl Default for TerrainSeeds {
    fn default() -> Self {
        Self::from_master(0)
    }
}

/// Builder for overriding individual seeds while deriving the rest from master
pub struct TerrainSeedsBuilder {
    seeds: TerrainSeeds,
}

impl TerrainSeedsBuilder {
    pub fn new(master: u64) -> Self {
        Self {
            seeds: TerrainSeeds::from_master(master),
        }
    }

    pub fn noise(mut self, seed: u64) -> Self {
        self.seeds.noise = seed;
        self
    }

    pub fn warp(mut self, seed: u64) -> Self {
        self.seeds.warp = seed;
        self
    }

    pub fn erosion(mut self, seed: u64) -> Self {
        self.seeds.erosion = seed;
        self
    }

    pub fn build(self) -> TerrainSeeds {
        self.seeds
    }
}

/// Hash the master seed together with a stage name.
fn derive_seed(master: u64, stage: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    master.hash(&mut hasher);
    stage.hash(&mut hasher);
    hasher.finish()
}

fn fold_u32(seed: u64) -> u32 {
    (seed ^ (seed >> 32)) as u32
}

impl std::fmt::Display for TerrainSeeds {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "TerrainSeeds {{ master: {}, noise: {}, warp: {}, erosion: {} }}",
            self.master, self.noise, self.warp, self.erosion,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deterministic_derivation() {
        let a = TerrainSeeds::from_master(12345);
        let b = TerrainSeeds::from_master(12345);
        assert_eq!(a, b);
    }

    #[test]
    fn test_stages_get_different_seeds() {
        let seeds = TerrainSeeds::from_master(12345);
        assert_ne!(seeds.noise, seeds.warp);
        assert_ne!(seeds.warp, seeds.erosion);
    }

    #[test]
    fn test_builder_override() {
        let seeds = TerrainSeeds::builder(12345).erosion(99999).build();
        assert_eq!(seeds.erosion, 99999);
        assert_eq!(seeds.noise, TerrainSeeds::from_master(12345).noise);
    }
}
