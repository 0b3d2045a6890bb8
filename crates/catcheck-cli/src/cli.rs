use std::path::PathBuf;

/// Options as given on the command line. Unset values fall back to the
/// config file, then to built-in defaults.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct CliArgs {
    pub config: Option<PathBuf>,
    pub snapshot_dir: Option<PathBuf>,
    pub database: Option<String>,
    pub batch_size: Option<usize>,
    pub repair_extra: bool,
    pub repair_dir: Option<PathBuf>,
    pub run_checks: Vec<String>,
    pub skip_checks: Vec<String>,
    pub list: bool,
    pub skip_leaked_schemas: bool,
    pub json: bool,
    pub verbose: bool,
}

#[derive(Debug, PartialEq, Eq)]
pub enum Invocation {
    Run(CliArgs),
    Help,
}

pub fn print_help() {
    let help = "\
catcheck - catalog consistency checker for a coordinator and its segments

USAGE:
    catcheck [OPTIONS]

OPTIONS:
    -c, --config <PATH>        TOML config file
    --snapshot-dir <DIR>       Catalog snapshot directory (coordinator.db, dbid_<n>.db)
    -d, --database <NAME>      Database name used in the report
    -B, --batch-size <N>       Override the segment fan-out batch size
    -E, --repair-extra         Generate repair scripts for extra catalog entries
    -g, --repair-dir <DIR>     Directory for generated repair scripts
    -R, --run-check <NAME>     Run only this check (repeatable)
    -s, --skip-check <NAME>    Skip this check (repeatable)
    -l, --list                 List registered checks and exit
    --skip-leaked-schemas      Do not drop leaked temporary schemas
    --json                     Print the run summary as JSON on stdout
    -v, --verbose              Debug logging
    -h, --help                 Show this help

EXIT CODES:
    0 pass, 1 repair scripts generated, 2 segment failure,
    3 unrepairable issue, 4 usage or configuration error
";
    println!("{help}");
}

fn value<'a>(args: &'a [String], index: usize, flag: &str) -> Result<&'a str, String> {
    args.get(index)
        .map(String::as_str)
        .ok_or_else(|| format!("{flag} requires a value"))
}

pub fn parse_args(args: &[String]) -> Result<Invocation, String> {
    let mut parsed = CliArgs::default();

    let mut index = 0;
    while index < args.len() {
        let flag = args[index].as_str();
        match flag {
            "-c" | "--config" => {
                index += 1;
                parsed.config = Some(PathBuf::from(value(args, index, flag)?));
            }
            "--snapshot-dir" => {
                index += 1;
                parsed.snapshot_dir = Some(PathBuf::from(value(args, index, flag)?));
            }
            "-d" | "--database" => {
                index += 1;
                parsed.database = Some(value(args, index, flag)?.to_owned());
            }
            "-B" | "--batch-size" => {
                index += 1;
                let raw = value(args, index, flag)?;
                let size = raw
                    .parse::<usize>()
                    .map_err(|_| format!("invalid {flag} value: {raw}"))?;
                if size == 0 {
                    return Err(format!("{flag} must be at least 1"));
                }
                parsed.batch_size = Some(size);
            }
            "-E" | "--repair-extra" => parsed.repair_extra = true,
            "-g" | "--repair-dir" => {
                index += 1;
                parsed.repair_dir = Some(PathBuf::from(value(args, index, flag)?));
            }
            "-R" | "--run-check" => {
                index += 1;
                parsed.run_checks.push(value(args, index, flag)?.to_owned());
            }
            "-s" | "--skip-check" => {
                index += 1;
                parsed.skip_checks.push(value(args, index, flag)?.to_owned());
            }
            "-l" | "--list" => parsed.list = true,
            "--skip-leaked-schemas" => parsed.skip_leaked_schemas = true,
            "--json" => parsed.json = true,
            "-v" | "--verbose" => parsed.verbose = true,
            "-h" | "--help" => return Ok(Invocation::Help),
            unknown => return Err(format!("unknown option: {unknown}")),
        }
        index += 1;
    }

    if !parsed.run_checks.is_empty() && !parsed.skip_checks.is_empty() {
        return Err("--run-check and --skip-check cannot be combined".to_owned());
    }

    Ok(Invocation::Run(parsed))
}
