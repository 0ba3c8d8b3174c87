use std::str::FromStr;

use super::*;

fn parse(args: &[&str]) -> Cli {
    Cli::try_parse_from(args).expect("expected valid cli args")
}

#[test]
fn no_command_is_none() {
    assert!(parse(&["fuelwatch"]).command.is_none());
}

#[test]
fn parses_migrate_and_cycle() {
    assert!(matches!(parse(&["fuelwatch", "migrate"]).command, Some(Commands::Migrate)));
    assert!(matches!(
        parse(&["fuelwatch", "cycle", "--json"]).command,
        Some(Commands::Cycle { json: true })
    ));
}

#[test]
fn parses_prices_filters() {
    let cli = parse(&["fuelwatch", "prices", "--grade", "diesel", "--email", "u@x.com", "--limit", "3"]);
    assert!(matches!(
        cli.command,
        Some(Commands::Prices {
            grade: Some(ref g),
            email: Some(ref e),
            limit: Some(3),
        }) if g == "diesel" && e == "u@x.com"
    ));
}

#[test]
fn parses_subscribe_with_decimal_threshold() {
    let cli = parse(&["fuelwatch", "subscribe", "u@x.com", "1.45", "95", "--address", "Oulu"]);
    match cli.command {
        Some(Commands::Subscribe {
            email,
            threshold,
            grade,
            address,
        }) => {
            assert_eq!(email, "u@x.com");
            assert_eq!(threshold, Decimal::from_str("1.45").unwrap());
            assert_eq!(grade, "95");
            assert_eq!(address.as_deref(), Some("Oulu"));
        }
        other => panic!("unexpected command: {other:?}"),
    }
}

#[test]
fn rejects_non_numeric_threshold() {
    assert!(Cli::try_parse_from(["fuelwatch", "subscribe", "u@x.com", "cheap", "95"]).is_err());
}

#[test]
fn station_set_requires_both_coordinates() {
    assert!(Cli::try_parse_from(["fuelwatch", "station", "set", "Neste", "--latitude", "65.0"]).is_err());

    let cli = parse(&[
        "fuelwatch", "station", "set", "Neste", "--latitude", "65.0", "--longitude", "-25.4",
    ]);
    assert!(matches!(
        cli.command,
        Some(Commands::Station {
            command: StationCommands::Set {
                latitude: Some(_),
                longitude: Some(lon),
                ..
            }
        }) if (lon + 25.4).abs() < f64::EPSILON
    ));
}

#[test]
fn parses_station_list_and_runs() {
    assert!(matches!(
        parse(&["fuelwatch", "station", "list"]).command,
        Some(Commands::Station {
            command: StationCommands::List
        })
    ));
    assert!(matches!(
        parse(&["fuelwatch", "runs"]).command,
        Some(Commands::Runs { limit: 20 })
    ));
}

#[test]
fn parses_unsubscribe_and_locate() {
    assert!(matches!(
        parse(&["fuelwatch", "unsubscribe", "u@x.com"]).command,
        Some(Commands::Unsubscribe { ref email }) if email == "u@x.com"
    ));
    assert!(matches!(
        parse(&["fuelwatch", "locate", "u@x.com", "Isokatu 1, Oulu"]).command,
        Some(Commands::Locate { ref address, .. }) if address == "Isokatu 1, Oulu"
    ));
}
