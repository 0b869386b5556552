use crate::app::command_support::{client, load_settings, parse_case_id};
use crate::shared::fs_atomic::atomic_write_file;
use std::path::PathBuf;

pub fn cmd_export(args: &[String]) -> Result<String, String> {
    let [raw_case, raw_path] = args else {
        return Err("usage: export <case> <path.pdf>".to_string());
    };
    let case_id = parse_case_id(raw_case)?;
    let path = PathBuf::from(raw_path);
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        if !parent.is_dir() {
            return Err(format!("directory {} does not exist", parent.display()));
        }
    }

    let settings = load_settings()?;
    let bytes = client(&settings)
        .export_pdf(&case_id)
        .map_err(|e| e.to_string())?;
    atomic_write_file(&path, &bytes)
        .map_err(|e| format!("failed to write {}: {e}", path.display()))?;

    Ok([
        format!("case={case_id}"),
        format!("path={}", path.display()),
        format!("bytes={}", bytes.len()),
    ]
    .join("\n"))
}
