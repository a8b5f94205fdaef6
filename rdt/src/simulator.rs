//! Fault-injecting network model for deterministic testing.
//!
//! Real networks drop, reorder, and duplicate packets.  To exercise the
//! reliability mechanisms without depending on actual network conditions,
//! [`Simulator`] sits on a sending path and decides, per datagram, what the
//! far side actually gets:
//!
//! | Fault       | Description                                              |
//! |-------------|----------------------------------------------------------|
//! | Loss        | Drop the datagram with probability `loss_rate`.          |
//! | Reordering  | Hold the datagram back until the next one has passed it. |
//! | Duplication | Deliver the datagram twice.                              |
//! | Corruption  | Flip one random bit.                                     |
//!
//! With a fixed `seed` the same input sequence always yields the same fault
//! pattern, so failures are reproducible.

use std::collections::VecDeque;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Configuration for the fault-injection model.
///
/// All probabilities are in the range `[0.0, 1.0]`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SimulatorConfig {
    /// Probability that any given datagram is silently dropped.
    pub loss_rate: f64,
    /// Probability that a datagram is delivered twice.
    pub duplicate_rate: f64,
    /// Probability that a datagram is held back and overtaken.
    pub reorder_rate: f64,
    /// Probability that one bit of a datagram is flipped.
    pub corrupt_rate: f64,
    /// RNG seed; `None` seeds from the OS.
    pub seed: Option<u64>,
}

impl SimulatorConfig {
    /// `true` when no fault can ever fire.
    pub fn is_transparent(&self) -> bool {
        self.loss_rate <= 0.0
            && self.duplicate_rate <= 0.0
            && self.reorder_rate <= 0.0
            && self.corrupt_rate <= 0.0
    }
}

/// A fault-injecting datagram path.
#[derive(Debug)]
pub struct Simulator {
    config: SimulatorConfig,
    rng: StdRng,
    /// Reordered datagrams waiting for a later one to overtake them.
    held: VecDeque<Vec<u8>>,
}

impl Simulator {
    pub fn new(config: SimulatorConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            config,
            rng,
            held: VecDeque::new(),
        }
    }

    pub fn config(&self) -> &SimulatorConfig {
        &self.config
    }

    /// Push one datagram through the fault model.
    ///
    /// Returns the datagrams to deliver now, in delivery order.
    pub fn process(&mut self, datagram: &[u8]) -> Vec<Vec<u8>> {
        if self.config.is_transparent() {
            return vec![datagram.to_vec()];
        }

        if self.chance(self.config.loss_rate) {
            log::trace!("[rdt:sim] drop {} byte(s)", datagram.len());
            return Vec::new();
        }

        let mut copy = datagram.to_vec();
        if self.chance(self.config.corrupt_rate) && !copy.is_empty() {
            let bit = self.rng.gen_range(0..copy.len() * 8);
            copy[bit / 8] ^= 1 << (bit % 8);
            log::trace!("[rdt:sim] corrupt bit {bit}");
        }

        if self.chance(self.config.reorder_rate) {
            log::trace!("[rdt:sim] hold back {} byte(s)", copy.len());
            self.held.push_back(copy);
            return Vec::new();
        }

        let mut out = Vec::with_capacity(2 + self.held.len());
        if self.chance(self.config.duplicate_rate) {
            log::trace!("[rdt:sim] duplicate {} byte(s)", copy.len());
            out.push(copy.clone());
        }
        out.push(copy);
        out.extend(self.held.drain(..));
        out
    }

    /// Release every held-back datagram.
    pub fn flush(&mut self) -> Vec<Vec<u8>> {
        self.held.drain(..).collect()
    }

    /// Number of datagrams currently held back.
    pub fn held(&self) -> usize {
        self.held.len()
    }

    fn chance(&mut self, p: f64) -> bool {
        p > 0.0 && self.rng.gen_bool(p.min(1.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded(config: SimulatorConfig) -> Simulator {
        Simulator::new(SimulatorConfig {
            seed: Some(7),
            ..config
        })
    }

    #[test]
    fn default_config_is_pass_through() {
        let mut sim = Simulator::new(SimulatorConfig::default());
        for i in 0..50u8 {
            assert_eq!(sim.process(&[i, i]), vec![vec![i, i]]);
        }
        assert_eq!(sim.held(), 0);
    }

    #[test]
    fn full_loss_drops_everything() {
        let mut sim = seeded(SimulatorConfig {
            loss_rate: 1.0,
            ..Default::default()
        });
        for _ in 0..20 {
            assert!(sim.process(b"x").is_empty());
        }
    }

    #[test]
    fn full_duplication_delivers_twice() {
        let mut sim = seeded(SimulatorConfig {
            duplicate_rate: 1.0,
            ..Default::default()
        });
        assert_eq!(sim.process(b"ab"), vec![b"ab".to_vec(), b"ab".to_vec()]);
    }

    #[test]
    fn reordered_datagram_is_overtaken() {
        let mut sim = seeded(SimulatorConfig {
            reorder_rate: 1.0,
            ..Default::default()
        });
        assert!(sim.process(b"first").is_empty());
        assert_eq!(sim.held(), 1);
        sim.config.reorder_rate = 0.0;
        assert_eq!(
            sim.process(b"second"),
            vec![b"second".to_vec(), b"first".to_vec()]
        );
    }

    #[test]
    fn flush_releases_held_datagrams() {
        let mut sim = seeded(SimulatorConfig {
            reorder_rate: 1.0,
            ..Default::default()
        });
        sim.process(b"a");
        sim.process(b"b");
        assert_eq!(sim.flush(), vec![b"a".to_vec(), b"b".to_vec()]);
        assert_eq!(sim.held(), 0);
    }

    #[test]
    fn corruption_flips_exactly_one_bit() {
        let mut sim = seeded(SimulatorConfig {
            corrupt_rate: 1.0,
            ..Default::default()
        });
        let original = [0u8; 16];
        let out = sim.process(&original);
        assert_eq!(out.len(), 1);
        let flipped: u32 = out[0].iter().map(|b| b.count_ones()).sum();
        assert_eq!(flipped, 1);
    }

    #[test]
    fn same_seed_same_faults() {
        let config = SimulatorConfig {
            loss_rate: 0.3,
            duplicate_rate: 0.2,
            reorder_rate: 0.2,
            seed: Some(99),
            ..Default::default()
        };
        let mut a = Simulator::new(config.clone());
        let mut b = Simulator::new(config);
        for i in 0..100u8 {
            assert_eq!(a.process(&[i]), b.process(&[i]));
        }
    }
}
