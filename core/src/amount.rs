//! Transaction amount models for typology edges.

use crate::rng::StageRng;

/// Uniform amount in `[min, max]`.
#[derive(Debug, Clone, Copy)]
pub struct RandomAmount {
    pub min: f64,
    pub max: f64,
}

impl RandomAmount {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn draw(&self, rng: &mut StageRng) -> f64 {
        rng.uniform(self.min, self.max)
    }
}

/// Round-number amounts: a multiple of the largest power of ten that still
/// leaves at least 7 slots across the range.
///
/// Bounds are truncated to whole units first. A range that is empty
/// returns `min`.
#[derive(Debug, Clone, Copy)]
pub struct RoundedAmount {
    pub min: f64,
    pub max: f64,
}

impl RoundedAmount {
    const MIN_SLOTS: i64 = 7;

    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    fn bounds(&self) -> (i64, i64) {
        (self.min as i64, self.max as i64)
    }

    /// The power of ten every drawn amount is a multiple of.
    pub fn step_size(&self) -> i64 {
        let (min, max) = self.bounds();
        let range = max - min;
        if range <= 0 {
            return 1;
        }
        let mut step = 1i64;
        while step < range {
            step *= 10;
        }
        // Only ever shrink. Growing back after a shrink can oscillate
        // between two steps that both miss the slot window.
        while step > 1 && range / step < Self::MIN_SLOTS {
            step /= 10;
        }
        step
    }

    pub fn draw(&self, rng: &mut StageRng) -> f64 {
        let (min, max) = self.bounds();
        if max <= min {
            return self.min;
        }
        let step = self.step_size();
        // Smallest multiple of the step not below min.
        let start = min.div_euclid(step) * step + if min.rem_euclid(step) == 0 { 0 } else { step };
        if start > max {
            return min as f64;
        }
        let slots = ((max - start) / step) as u64;
        let k = rng.range_inclusive(0, slots) as i64;
        (start + k * step) as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draws(model: &RoundedAmount, n: usize) -> Vec<f64> {
        let mut rng = StageRng::new(7, 0);
        (0..n).map(|_| model.draw(&mut rng)).collect()
    }

    #[test]
    fn hundreds_between_42_and_999() {
        let model = RoundedAmount::new(42.0, 999.0);
        assert_eq!(model.step_size(), 100);
        for amount in draws(&model, 200) {
            assert_eq!(amount % 100.0, 0.0);
            assert!((100.0..=900.0).contains(&amount), "{amount}");
        }
    }

    #[test]
    fn thousands_between_45_and_12000() {
        let model = RoundedAmount::new(45.0, 12000.0);
        assert_eq!(model.step_size(), 1000);
        for amount in draws(&model, 200) {
            assert_eq!(amount % 1000.0, 0.0);
            assert!((1000.0..=12000.0).contains(&amount), "{amount}");
        }
    }

    #[test]
    fn tens_between_3000_and_3100() {
        let model = RoundedAmount::new(3000.0, 3100.0);
        assert_eq!(model.step_size(), 10);
        for amount in draws(&model, 200) {
            assert_eq!(amount % 10.0, 0.0);
            assert!((3000.0..=3100.0).contains(&amount), "{amount}");
        }
    }

    #[test]
    fn narrow_range_falls_back_to_unit_steps() {
        // 500 units: 100 gives 5 slots, 10 gives 50; the smaller step wins.
        let model = RoundedAmount::new(100.0, 600.0);
        assert_eq!(model.step_size(), 10);
        assert_eq!(RoundedAmount::new(10.0, 14.0).step_size(), 1);
    }

    #[test]
    fn degenerate_range_returns_min() {
        let mut rng = StageRng::new(1, 0);
        assert_eq!(RoundedAmount::new(250.0, 250.0).draw(&mut rng), 250.0);
        assert_eq!(RandomAmount::new(80.0, 80.0).draw(&mut rng), 80.0);
    }

    #[test]
    fn random_amount_stays_in_range() {
        let mut rng = StageRng::new(3, 0);
        let model = RandomAmount::new(100.0, 1000.0);
        for _ in 0..500 {
            let a = model.draw(&mut rng);
            assert!((100.0..=1000.0).contains(&a));
        }
    }
}
