use std::env;
use std::path::PathBuf;
use std::process::ExitCode;

use tracing::info;
use tracing_subscriber::EnvFilter;

use lineal::bind;
use lineal::settings::Settings;
use lineal::{Reader, Result, Root};

const USAGE: &str = "usage: lineal [--json] [--config FILE] [--no-flatten] FILE...";

struct Options {
    json: bool,
    config: Option<PathBuf>,
    flatten: Option<bool>,
    files: Vec<PathBuf>,
}

fn options() -> std::result::Result<Options, String> {
    let mut options = Options {
        json: false,
        config: None,
        flatten: None,
        files: Vec::new(),
    };
    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--json" => options.json = true,
            "--no-flatten" => options.flatten = Some(false),
            "--config" => match args.next() {
                Some(path) => options.config = Some(PathBuf::from(path)),
                None => return Err(String::from("--config needs a file")),
            },
            "-h" | "--help" => return Err(String::from(USAGE)),
            flag if flag.starts_with("--") => return Err(format!("unknown option {}", flag)),
            file => options.files.push(PathBuf::from(file)),
        }
    }
    if options.files.is_empty() {
        return Err(String::from(USAGE));
    }
    Ok(options)
}

fn run(options: &Options, settings: &Settings) -> Result<()> {
    let reader = Reader::from_settings(settings);
    let mut root = Root::new();
    for file in &options.files {
        info!(file = %file.display(), "reading");
        reader.read_file(file, &mut root)?;
    }
    info!(objects = root.len(), types = root.types().len(), "read complete");
    let flatten = options.flatten.unwrap_or(settings.flatten_on_export);
    if options.json {
        let mut exported = serde_json::Map::new();
        for type_name in root.types() {
            let mut objects = serde_json::Map::new();
            for object in root.all_by_type(type_name) {
                let identity = object.identity().unwrap_or_default().to_owned();
                objects.insert(identity, bind::to_json(&object)?);
            }
            exported.insert(type_name.to_owned(), serde_json::Value::Object(objects));
        }
        println!("{}", serde_json::to_string_pretty(&serde_json::Value::Object(exported))?);
    } else {
        for object in root.objects() {
            if flatten {
                let mut flat = (*object).clone();
                flat.flatten()?;
                println!("{}", flat);
            } else {
                println!("{}", object);
            }
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    let options = match options() {
        Ok(options) => options,
        Err(message) => {
            eprintln!("{}", message);
            return ExitCode::from(2);
        }
    };
    let settings = match &options.config {
        Some(path) => Settings::from_file(path),
        None => Settings::load(),
    };
    let settings = match settings {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::from(2);
        }
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&settings.log_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match run(&options, &settings) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}
