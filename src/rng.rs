// src/rng.rs
//! Детерминированный генератор случайных чисел
//!
//! Строковый сид хэшируется в `u64` и инициализирует `ChaCha8Rng`.
//! Экземпляр создаётся один раз на прогон и передаётся явно в каждый этап,
//! которому нужна случайность.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Генератор прогона
pub type WorldRng = ChaCha8Rng;

/// Превращает строковый сид в числовой (FNV-1a)
#[must_use]
pub fn hash_seed(seed: &str) -> u64 {
    seed.bytes().fold(FNV_OFFSET, |hash, byte| {
        (hash ^ u64::from(byte)).wrapping_mul(FNV_PRIME)
    })
}

/// Создаёт генератор для прогона с данным сидом
#[must_use]
pub fn seeded(seed: &str) -> WorldRng {
    ChaCha8Rng::seed_from_u64(hash_seed(seed))
}

/// Случайный девятизначный сид для нового мира
#[must_use]
pub fn generate_seed() -> String {
    let value: u32 = rand::thread_rng().gen_range(100_000_000..1_000_000_000);
    value.to_string()
}

/// Округление до `decimals` знаков после запятой
#[must_use]
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let m = 10f64.powi(decimals);
    (value * m).round() / m
}

/// Вспомогательные операции поверх любого `Rng`
pub trait RngExt {
    /// Истина с вероятностью `probability` (значения ≥ 1 всегда истинны)
    fn probability(&mut self, probability: f64) -> bool;

    /// Целое в диапазоне `min..=max`
    fn rand_int(&mut self, min: i32, max: i32) -> i32;

    /// Нормальное распределение, обрезанное в `[min, max]` и округлённое
    fn gauss(&mut self, expected: f64, deviation: f64, min: f64, max: f64, decimals: i32) -> f64;
}

impl<R: Rng> RngExt for R {
    fn probability(&mut self, probability: f64) -> bool {
        if probability >= 1.0 {
            return true;
        }
        if probability <= 0.0 {
            return false;
        }
        self.gen_range(0.0..1.0) < probability
    }

    fn rand_int(&mut self, min: i32, max: i32) -> i32 {
        if max <= min {
            return min;
        }
        self.gen_range(min..=max)
    }

    fn gauss(&mut self, expected: f64, deviation: f64, min: f64, max: f64, decimals: i32) -> f64 {
        // Полярный метод Марсальи
        let normal = loop {
            let x = self.gen_range(-1.0..1.0);
            let y = self.gen_range(-1.0..1.0);
            let r = x * x + y * y;
            if r > 0.0 && r < 1.0 {
                break x * (-2.0 * f64::ln(r) / r).sqrt();
            }
        };
        round_to((expected + deviation * normal).clamp(min, max), decimals)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_seed_same_stream() {
        let mut a = seeded("123456789");
        let mut b = seeded("123456789");
        for _ in 0..16 {
            assert_eq!(a.gen_range(0..1000), b.gen_range(0..1000));
        }
    }

    #[test]
    fn test_different_seeds_differ() {
        assert_ne!(hash_seed("1"), hash_seed("2"));
        assert_ne!(hash_seed(""), hash_seed("0"));
    }

    #[test]
    fn test_rand_int_bounds() {
        let mut rng = seeded("bounds");
        for _ in 0..500 {
            let v = rng.rand_int(10, 20);
            assert!((10..=20).contains(&v));
        }
        assert_eq!(rng.rand_int(5, 5), 5);
    }

    #[test]
    fn test_gauss_is_clamped() {
        let mut rng = seeded("gauss");
        for _ in 0..500 {
            let v = rng.gauss(40.0, 20.0, 25.0, 75.0, 0);
            assert!((25.0..=75.0).contains(&v));
            assert_eq!(v, v.round());
        }
    }

    #[test]
    fn test_probability_edges() {
        let mut rng = seeded("p");
        assert!(rng.probability(1.0));
        assert!(!rng.probability(0.0));
    }

    #[test]
    fn test_generated_seed_is_numeric() {
        let seed = generate_seed();
        assert_eq!(seed.len(), 9);
        assert!(seed.chars().all(|c| c.is_ascii_digit()));
    }
}
