//! Station registry. Price ingestion never writes here.

use std::collections::HashMap;

use chrono::Utc;
use fuelwatch_core::{Coordinates, CoreError, Station};
use sqlx::QueryBuilder;

use crate::{DbError, Store};

#[derive(Debug, Clone, sqlx::FromRow)]
struct StationRow {
    name: String,
    latitude: Option<f64>,
    longitude: Option<f64>,
}

impl From<StationRow> for Station {
    fn from(row: StationRow) -> Self {
        let location = match (row.latitude, row.longitude) {
            (Some(latitude), Some(longitude)) => Some(Coordinates {
                latitude,
                longitude,
            }),
            _ => None,
        };
        Station {
            name: row.name,
            location,
        }
    }
}

impl Store {
    /// Registers a station or replaces its coordinates.
    ///
    /// Passing `None` clears a previously stored location.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Validation`] for a blank name, or
    /// [`DbError::Sqlx`] if the write fails.
    pub async fn upsert_station(
        &self,
        name: &str,
        location: Option<Coordinates>,
    ) -> Result<Station, DbError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(CoreError::Validation {
                field: "name",
                reason: "is required".to_string(),
            }
            .into());
        }

        let row = sqlx::query_as::<_, StationRow>(
            "INSERT INTO stations (name, latitude, longitude, updated_at) \
             VALUES (?1, ?2, ?3, ?4) \
             ON CONFLICT (name) DO UPDATE SET \
                 latitude = excluded.latitude, \
                 longitude = excluded.longitude, \
                 updated_at = excluded.updated_at \
             RETURNING name, latitude, longitude",
        )
        .bind(name)
        .bind(location.map(|c| c.latitude))
        .bind(location.map(|c| c.longitude))
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into())
    }

    /// # Errors
    ///
    /// Returns [`DbError::NotFound`] if no station has that name.
    pub async fn get_station(&self, name: &str) -> Result<Station, DbError> {
        sqlx::query_as::<_, StationRow>(
            "SELECT name, latitude, longitude FROM stations WHERE name = ?1",
        )
        .bind(name.trim())
        .fetch_optional(&self.pool)
        .await?
        .map(Station::from)
        .ok_or(DbError::NotFound)
    }

    /// All registered stations ordered by name.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Sqlx`] if the query fails.
    pub async fn list_stations(&self) -> Result<Vec<Station>, DbError> {
        let rows = sqlx::query_as::<_, StationRow>(
            "SELECT name, latitude, longitude FROM stations ORDER BY name ASC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Station::from).collect())
    }

    /// Coordinates for those of `names` that have a stored location.
    ///
    /// Unknown stations and stations without coordinates are simply absent
    /// from the map.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Sqlx`] if the query fails.
    pub async fn station_locations(
        &self,
        names: &[String],
    ) -> Result<HashMap<String, Coordinates>, DbError> {
        if names.is_empty() {
            return Ok(HashMap::new());
        }

        let mut query = QueryBuilder::<sqlx::Sqlite>::new(
            "SELECT name, latitude, longitude FROM stations \
             WHERE latitude IS NOT NULL AND longitude IS NOT NULL AND name IN (",
        );
        let mut separated = query.separated(", ");
        for name in names {
            separated.push_bind(name.as_str());
        }
        separated.push_unseparated(")");

        let rows = query
            .build_query_as::<StationRow>()
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .into_iter()
            .map(Station::from)
            .filter_map(|s| s.location.map(|loc| (s.name, loc)))
            .collect())
    }
}
