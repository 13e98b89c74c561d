use anyhow::{Context, Result};
use clap::{value_parser, Arg, ArgMatches, Command};
use geojoin::{
    write_geojson, JoinSpec, MergeHow, Notice, PipelineConfig, Predicate, Session, Side, SpatialHow,
};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

fn input_arg(name: &'static str, help: &'static str) -> Arg {
    Arg::new(name)
        .long(name)
        .required(true)
        .value_parser(value_parser!(PathBuf))
        .help(help)
}

fn output_arg() -> Arg {
    Arg::new("output")
        .short('o')
        .long("output")
        .value_parser(value_parser!(PathBuf))
        .default_value(geojoin::export::RESULT_FILE_NAME)
        .help("Where to write the joined GeoJSON")
}

fn cli() -> Command {
    Command::new("geojoin")
        .version(env!("CARGO_PKG_VERSION"))
        .author("Jesper Fjellin")
        .about("Joins two geographic layers by location or by attribute and exports GeoJSON")
        .subcommand_required(true)
        .arg(
            Arg::new("cache-entries")
                .long("cache-entries")
                .global(true)
                .value_parser(value_parser!(usize))
                .default_value("8")
                .help("Number of parsed datasets kept in memory"),
        )
        .subcommand(
            Command::new("preview")
                .about("Shows the first rows of a dataset")
                .arg(
                    Arg::new("file")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("Zipped Shapefile or GeoJSON file"),
                )
                .arg(
                    Arg::new("rows")
                        .short('n')
                        .long("rows")
                        .value_parser(value_parser!(usize))
                        .default_value("5")
                        .help("Number of rows to show"),
                ),
        )
        .subcommand(
            Command::new("spatial")
                .about("Joins features whose geometries satisfy a spatial predicate")
                .arg(input_arg("left", "Primary layer (zipped Shapefile or GeoJSON)"))
                .arg(input_arg("right", "Secondary layer (zipped Shapefile or GeoJSON)"))
                .arg(
                    Arg::new("predicate")
                        .short('p')
                        .long("predicate")
                        .value_parser(["intersects", "contains", "within", "touches", "crosses"])
                        .default_value("intersects")
                        .help("Spatial relation between left and right geometries"),
                )
                .arg(
                    Arg::new("how")
                        .long("how")
                        .value_parser(["left", "inner"])
                        .default_value("left")
                        .help("Keep unmatched left features (left) or drop them (inner)"),
                )
                .arg(output_arg()),
        )
        .subcommand(
            Command::new("attribute")
                .about("Joins features on matching attribute values")
                .arg(input_arg("left", "Primary layer (zipped Shapefile or GeoJSON)"))
                .arg(input_arg("right", "Secondary layer (zipped Shapefile or GeoJSON)"))
                .arg(
                    Arg::new("left-key")
                        .long("left-key")
                        .required(true)
                        .help("Key column of the left layer"),
                )
                .arg(
                    Arg::new("right-key")
                        .long("right-key")
                        .required(true)
                        .help("Key column of the right layer"),
                )
                .arg(
                    Arg::new("how")
                        .long("how")
                        .value_parser(["left", "right", "inner", "outer"])
                        .default_value("left")
                        .help("Merge mode"),
                )
                .arg(output_arg()),
        )
}

fn report(notice: &Notice) -> bool {
    match notice {
        Notice::Error(_) => eprintln!("{notice}"),
        _ => println!("{notice}"),
    }
    !notice.is_error()
}

fn load(session: &mut Session, side: Side, path: &Path) -> Result<bool> {
    let bytes = std::fs::read(path).with_context(|| format!("cannot read {}", path.display()))?;
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default();
    Ok(report(&session.load(side, name, &bytes)))
}

fn join_spec(name: &str, matches: &ArgMatches) -> Result<JoinSpec> {
    let how = matches.get_one::<String>("how").map(String::as_str).unwrap_or("left");
    let spec = if name == "spatial" {
        let predicate = matches
            .get_one::<String>("predicate")
            .map(String::as_str)
            .unwrap_or("intersects");
        JoinSpec::Spatial {
            predicate: predicate.parse::<Predicate>()?,
            how: how.parse::<SpatialHow>()?,
        }
    } else {
        let key = |id: &str| {
            matches
                .get_one::<String>(id)
                .cloned()
                .with_context(|| format!("--{id} is required"))
        };
        JoinSpec::Attribute {
            left_key: key("left-key")?,
            right_key: key("right-key")?,
            how: how.parse::<MergeHow>()?,
        }
    };
    Ok(spec)
}

fn run() -> Result<bool> {
    let matches = cli().get_matches();
    let config = PipelineConfig {
        cache_entries: matches.get_one::<usize>("cache-entries").copied().unwrap_or(8),
        ..PipelineConfig::default()
    };

    let (name, sub) = matches.subcommand().context("a subcommand is required")?;
    if name == "preview" {
        let rows = sub.get_one::<usize>("rows").copied().unwrap_or(5);
        let mut session = Session::new(PipelineConfig {
            preview_rows: rows,
            ..config
        });
        let path = sub.get_one::<PathBuf>("file").context("a file is required")?;
        if !load(&mut session, Side::Left, path)? {
            return Ok(false);
        }
        if let Some(preview) = session.preview(Side::Left) {
            print!("{preview}");
        }
        return Ok(true);
    }

    let mut session = Session::new(config);
    let left = sub.get_one::<PathBuf>("left").context("--left is required")?;
    let right = sub.get_one::<PathBuf>("right").context("--right is required")?;
    // load both before bailing so every bad input gets reported
    let left_ok = load(&mut session, Side::Left, left)?;
    let right_ok = load(&mut session, Side::Right, right)?;
    if !(left_ok && right_ok) {
        return Ok(false);
    }

    let spec = join_spec(name, sub)?;
    let notices = session.run_join(&spec);
    let mut ok = true;
    for notice in &notices {
        ok &= report(notice);
    }

    if let Some(outcome) = session.result().filter(|o| !o.collection.is_empty()) {
        print!("{}", geojoin::preview(&outcome.collection, session.config().preview_rows));
        let output = sub.get_one::<PathBuf>("output").context("--output is required")?;
        write_geojson(&outcome.collection, output)
            .with_context(|| format!("cannot write {}", output.display()))?;
        println!("Saved result to {}", output.display());
    }
    Ok(ok)
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match run() {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_is_well_formed() {
        cli().debug_assert();
    }

    #[test]
    fn parses_attribute_join() {
        let matches = cli()
            .try_get_matches_from([
                "geojoin", "attribute", "--left", "a.zip", "--right", "b.geojson", "--left-key", "ID",
                "--right-key", "id", "--how", "outer",
            ])
            .unwrap();
        let (name, sub) = matches.subcommand().unwrap();
        assert_eq!(
            join_spec(name, sub).unwrap(),
            JoinSpec::attribute("ID", "id", MergeHow::Outer)
        );
    }

    #[test]
    fn spatial_join_defaults_to_intersects_left() {
        let matches = cli()
            .try_get_matches_from(["geojoin", "spatial", "--left", "a.zip", "--right", "b.geojson"])
            .unwrap();
        let (name, sub) = matches.subcommand().unwrap();
        assert_eq!(join_spec(name, sub).unwrap(), JoinSpec::spatial(Predicate::Intersects));
        assert_eq!(
            sub.get_one::<PathBuf>("output").unwrap(),
            &PathBuf::from("spatial_join_result.geojson")
        );
    }

    #[test]
    fn rejects_unknown_predicate() {
        let result = cli().try_get_matches_from([
            "geojoin", "spatial", "--left", "a.zip", "--right", "b.geojson", "--predicate", "near",
        ]);
        assert!(result.is_err());
    }
}
