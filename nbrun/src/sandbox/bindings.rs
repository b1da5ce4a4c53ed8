//! Filesystem bindings available to scripts.
//!
//! Every path a script passes is resolved against the run's working directory.

use std::fs;
use std::path::PathBuf;

use rhai::{Array, Dynamic, Engine, FLOAT, INT, ImmutableString, Map};

use crate::io::dataset::{CsvData, read_csv};
use crate::io::workspace::{list_files, resolve};
use crate::sandbox::capture::TextSink;
use crate::sandbox::plot::{ScriptResult, runtime_error};

/// Parse one CSV cell: integer, then float, empty as `()`, otherwise text.
pub fn parse_cell(cell: &str) -> Dynamic {
    let trimmed = cell.trim();
    if trimmed.is_empty() {
        return Dynamic::UNIT;
    }
    if let Ok(i) = trimmed.parse::<INT>() {
        return Dynamic::from_int(i);
    }
    if let Ok(f) = trimmed.parse::<FLOAT>() {
        return Dynamic::from_float(f);
    }
    Dynamic::from(cell.to_string())
}

/// One object map per row, keyed by header. Missing cells are `()`.
pub fn records(data: &CsvData) -> Array {
    data.rows
        .iter()
        .map(|row| {
            let mut record = Map::new();
            for (idx, header) in data.headers.iter().enumerate() {
                let value = row.get(idx).map_or(Dynamic::UNIT, |cell| parse_cell(cell));
                record.insert(header.as_str().into(), value);
            }
            Dynamic::from_map(record)
        })
        .collect()
}

/// Register `read_csv`, `read_text`, `write_text`, `file_exists`,
/// `list_files` and `eprint`.
pub fn register(engine: &mut Engine, workdir: PathBuf, diagnostics: TextSink) {
    let dir = workdir.clone();
    engine.register_fn("read_csv", move |path: ImmutableString| -> ScriptResult<Array> {
        let data = read_csv(&resolve(&dir, path.as_str()))
            .map_err(|err| runtime_error(format!("read_csv: {err:#}")))?;
        Ok(records(&data))
    });

    let dir = workdir.clone();
    engine.register_fn("read_text", move |path: ImmutableString| -> ScriptResult<String> {
        let path = resolve(&dir, path.as_str());
        fs::read_to_string(&path)
            .map_err(|err| runtime_error(format!("read_text {}: {err}", path.display())))
    });

    let dir = workdir.clone();
    engine.register_fn(
        "write_text",
        move |path: ImmutableString, text: ImmutableString| -> ScriptResult<()> {
            let path = resolve(&dir, path.as_str());
            fs::write(&path, text.as_bytes())
                .map_err(|err| runtime_error(format!("write_text {}: {err}", path.display())))
        },
    );

    let dir = workdir.clone();
    engine.register_fn("file_exists", move |path: ImmutableString| {
        resolve(&dir, path.as_str()).exists()
    });

    let dir = workdir;
    engine.register_fn("list_files", move || -> ScriptResult<Array> {
        let files = list_files(&dir).map_err(|err| runtime_error(format!("list_files: {err:#}")))?;
        Ok(files
            .into_iter()
            .map(|entry| Dynamic::from(entry.name))
            .collect())
    });

    engine.register_fn("eprint", move |value: Dynamic| {
        diagnostics.write_line(&value.to_string());
    });
}
