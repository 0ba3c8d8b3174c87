//! Distance decoration for ranked price listings.
//!
//! Nothing here touches persisted state; the read path hands in the station
//! coordinates it already looked up.

use std::collections::HashMap;

use serde::Serialize;

use crate::{Coordinates, PriceRecord};

/// Mean Earth radius in kilometres (IUGG).
const EARTH_RADIUS_KM: f64 = 6_371.008_8;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TravelEstimate {
    pub distance_km: f64,
    pub eta_minutes: f64,
}

/// Estimates how far a station is from an origin and how long the trip takes.
pub trait TravelModel {
    fn estimate(&self, from: Coordinates, to: Coordinates) -> TravelEstimate;
}

/// Great-circle distance at a fixed assumed average driving speed.
#[derive(Debug, Clone, Copy)]
pub struct GreatCircle {
    pub average_speed_kmh: f64,
}

impl GreatCircle {
    #[must_use]
    pub fn new(average_speed_kmh: f64) -> Self {
        Self { average_speed_kmh }
    }
}

impl TravelModel for GreatCircle {
    fn estimate(&self, from: Coordinates, to: Coordinates) -> TravelEstimate {
        let distance_km = great_circle_km(from, to);
        let eta_minutes = if self.average_speed_kmh > 0.0 {
            distance_km / self.average_speed_kmh * 60.0
        } else {
            f64::INFINITY
        };
        TravelEstimate {
            distance_km: round2(distance_km),
            eta_minutes: round2(eta_minutes),
        }
    }
}

/// Haversine distance between two points, in kilometres.
#[must_use]
pub fn great_circle_km(from: Coordinates, to: Coordinates) -> f64 {
    let lat1 = from.latitude.to_radians();
    let lat2 = to.latitude.to_radians();
    let d_lat = (to.latitude - from.latitude).to_radians();
    let d_lon = (to.longitude - from.longitude).to_radians();

    let a = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_KM * c
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// A price listing row with optional travel figures attached.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedPrice {
    #[serde(flatten)]
    pub record: PriceRecord,
    pub distance_km: Option<f64>,
    pub eta_minutes: Option<f64>,
}

impl RankedPrice {
    #[must_use]
    pub fn bare(record: PriceRecord) -> Self {
        Self {
            record,
            distance_km: None,
            eta_minutes: None,
        }
    }
}

/// Attaches distance and ETA from `origin` to each record's station.
///
/// Stations with no registered coordinates get `None` for both figures;
/// the listing order is left untouched.
pub fn enrich<M: TravelModel>(
    records: Vec<PriceRecord>,
    origin: Coordinates,
    station_locations: &HashMap<String, Coordinates>,
    model: &M,
) -> Vec<RankedPrice> {
    records
        .into_iter()
        .map(|record| match station_locations.get(&record.station) {
            Some(&station) => {
                let estimate = model.estimate(origin, station);
                RankedPrice {
                    record,
                    distance_km: Some(estimate.distance_km),
                    eta_minutes: Some(estimate.eta_minutes),
                }
            }
            None => RankedPrice::bare(record),
        })
        .collect()
}
