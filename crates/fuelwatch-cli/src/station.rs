//! `station` subcommands: the registry of known station coordinates.

use clap::Subcommand;
use fuelwatch_core::Coordinates;
use fuelwatch_db::Store;

#[derive(Debug, Subcommand)]
pub enum StationCommands {
    /// Register a station or update its coordinates
    Set {
        name: String,
        #[arg(long, requires = "longitude", allow_hyphen_values = true)]
        latitude: Option<f64>,
        #[arg(long, requires = "latitude", allow_hyphen_values = true)]
        longitude: Option<f64>,
    },
    /// List registered stations
    List,
}

pub(crate) async fn run(store: &Store, command: StationCommands) -> anyhow::Result<()> {
    match command {
        StationCommands::Set {
            name,
            latitude,
            longitude,
        } => {
            let location = match (latitude, longitude) {
                (Some(lat), Some(lon)) => Some(Coordinates::new(lat, lon)?),
                _ => None,
            };
            let station = store.upsert_station(&name, location).await?;
            println!("saved station {}", station.name);
        }
        StationCommands::List => {
            let stations = store.list_stations().await?;
            if stations.is_empty() {
                println!("no stations registered");
            }
            for station in stations {
                match station.location {
                    Some(at) => println!("{:<30} {:.5}, {:.5}", station.name, at.latitude, at.longitude),
                    None => println!("{:<30} (no location)", station.name),
                }
            }
        }
    }
    Ok(())
}
