// src/coordinates.rs
//! Положение карты на глобусе
//!
//! Размер карты (доля глобуса по широте) и сдвиги по широте и долготе задаются
//! в конфигурации или выбираются эвристикой по шаблону рельефа. Из них
//! вычисляются географические границы карты, которыми пользуется климат.

use serde::{Deserialize, Serialize};

use crate::config::{MapPlacement, Template};
use crate::features::Features;
use crate::rng::{RngExt, WorldRng, round_to};

/// Размер карты и сдвиги, в процентах
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MapSize {
    pub size: f64,
    pub latitude: f64,
    pub longitude: f64,
}

/// Географические границы карты, в градусах
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MapCoordinates {
    /// Охват по широте
    pub lat_t: f64,
    /// Широта северного края
    pub lat_n: f64,
    /// Широта южного края
    pub lat_s: f64,
    /// Охват по долготе
    pub lon_t: f64,
    /// Долгота западного края
    pub lon_w: f64,
    /// Долгота восточного края
    pub lon_e: f64,
}

impl MapCoordinates {
    /// Широта точки с вертикальной координатой `y` на карте высотой `height`
    #[must_use]
    pub fn latitude_at(&self, y: f64, height: f64) -> f64 {
        self.lat_n - (y / height) * self.lat_t
    }
}

/// Выбирает размер и положение карты
///
/// Значения, заданные в `overrides`, имеют приоритет; остальные выбираются по
/// шаблону. Случайные числа расходуются всегда, чтобы переопределение одного
/// параметра не меняло остальной прогон.
pub fn define_map_size(
    template: Template,
    features: &Features,
    overrides: &MapPlacement,
    rng: &mut WorldRng,
) -> MapSize {
    // Суша уходит за край карты
    let part = features.iter().any(|f| f.land && f.border);
    let heuristic = template_size(template, part, rng);
    MapSize {
        size: overrides.map_size.unwrap_or(heuristic.size),
        latitude: overrides.latitude.unwrap_or(heuristic.latitude),
        longitude: overrides.longitude.unwrap_or(heuristic.longitude),
    }
}

fn template_size(template: Template, part: bool, rng: &mut WorldRng) -> MapSize {
    let max = if part { 80.0 } else { 100.0 };
    let whole_globe = MapSize {
        size: 100.0,
        latitude: 50.0,
        longitude: 50.0,
    };

    if !part {
        let chance = match template {
            Template::Pangea => 1.0,
            Template::Shattered => 0.7,
            Template::Continents => 0.5,
            Template::Archipelago => 0.35,
            Template::HighIsland => 0.25,
            Template::LowIsland => 0.1,
            _ => 0.0,
        };
        if chance > 0.0 && rng.probability(chance) {
            return whole_globe;
        }
    }

    let size = match template {
        Template::Pangea => rng.gauss(70.0, 20.0, 30.0, max, 0),
        Template::Volcano => rng.gauss(20.0, 20.0, 10.0, max, 0),
        Template::Mediterranean => rng.gauss(25.0, 30.0, 15.0, 80.0, 0),
        Template::Peninsula => rng.gauss(15.0, 15.0, 5.0, 80.0, 0),
        Template::Isthmus => rng.gauss(15.0, 20.0, 3.0, 80.0, 0),
        Template::Atoll => rng.gauss(3.0, 2.0, 1.0, 5.0, 1),
        _ => rng.gauss(30.0, 20.0, 15.0, max, 0),
    };
    let expected = if rng.probability(0.5) { 40.0 } else { 60.0 };
    let latitude = rng.gauss(expected, 20.0, 25.0, 75.0, 0);

    MapSize {
        size,
        latitude,
        longitude: 50.0,
    }
}

/// Переводит размер и сдвиги в географические границы карты
#[must_use]
pub fn calculate_map_coordinates(size: &MapSize, width: f64, height: f64) -> MapCoordinates {
    let size_fraction = size.size / 100.0;
    let lat_shift = size.latitude / 100.0;
    let lon_shift = size.longitude / 100.0;

    let lat_t = round_to(size_fraction * 180.0, 1);
    let lat_n = round_to(90.0 - (180.0 - lat_t) * lat_shift, 1);
    let lat_s = round_to(lat_n - lat_t, 1);

    let lon_t = round_to((width / height * lat_t).min(360.0), 1);
    let lon_e = round_to(180.0 - (360.0 - lon_t) * lon_shift, 1);
    let lon_w = round_to(lon_e - lon_t, 1);

    MapCoordinates {
        lat_t,
        lat_n,
        lat_s,
        lon_t,
        lon_w,
        lon_e,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::FeatureKind;
    use crate::rng::seeded;

    #[test]
    fn test_whole_globe_coordinates() {
        let size = MapSize {
            size: 100.0,
            latitude: 50.0,
            longitude: 50.0,
        };
        let coords = calculate_map_coordinates(&size, 2000.0, 1000.0);
        assert_eq!(coords.lat_t, 180.0);
        assert_eq!(coords.lat_n, 90.0);
        assert_eq!(coords.lat_s, -90.0);
        assert_eq!(coords.lon_t, 360.0);
        assert_eq!(coords.lon_e, 180.0);
        assert_eq!(coords.lon_w, -180.0);
        assert_eq!(coords.latitude_at(500.0, 1000.0), 0.0);
    }

    #[test]
    fn test_small_map_in_north() {
        let size = MapSize {
            size: 20.0,
            latitude: 25.0,
            longitude: 50.0,
        };
        let coords = calculate_map_coordinates(&size, 1000.0, 1000.0);
        assert_eq!(coords.lat_t, 36.0);
        assert_eq!(coords.lat_n, 54.0);
        assert_eq!(coords.lat_s, 18.0);
        assert_eq!(coords.lon_t, 36.0);
        assert_eq!(coords.lon_e, 18.0);
        assert_eq!(coords.lon_w, -18.0);
    }

    #[test]
    fn test_overrides_win() {
        let overrides = MapPlacement {
            map_size: Some(42.0),
            latitude: Some(10.0),
            longitude: None,
        };
        let size = define_map_size(Template::Volcano, &Features::default(), &overrides, &mut seeded("o"));
        assert_eq!(size.size, 42.0);
        assert_eq!(size.latitude, 10.0);
        assert_eq!(size.longitude, 50.0);
    }

    #[test]
    fn test_pangea_without_border_land_covers_globe() {
        let mut features = Features::default();
        features.push(FeatureKind::Ocean, false, true);
        features.push(FeatureKind::Island, true, false);
        let size = define_map_size(Template::Pangea, &features, &MapPlacement::default(), &mut seeded("p"));
        assert_eq!((size.size, size.latitude, size.longitude), (100.0, 50.0, 50.0));
    }

    #[test]
    fn test_border_land_limits_size() {
        let mut features = Features::default();
        features.push(FeatureKind::Island, true, true);
        let mut rng = seeded("limit");
        for _ in 0..50 {
            let size = define_map_size(Template::Continents, &features, &MapPlacement::default(), &mut rng);
            assert!((15.0..=80.0).contains(&size.size), "size {}", size.size);
            assert!((25.0..=75.0).contains(&size.latitude));
        }
    }

    #[test]
    fn test_atoll_is_tiny() {
        let mut rng = seeded("atoll");
        for _ in 0..20 {
            let size = template_size(Template::Atoll, true, &mut rng);
            assert!((1.0..=5.0).contains(&size.size));
        }
    }
}
