use crate::api::ApiClient;
use crate::config::{default_state_root, load_global_settings, ConfigError, Settings};
use crate::shared::ids::CaseId;
use crate::shared::logging::LogSink;
use std::fs;
use std::path::PathBuf;

pub fn map_config_err(err: ConfigError) -> String {
    err.to_string()
}

pub fn load_settings() -> Result<Settings, String> {
    load_global_settings().map_err(map_config_err)
}

pub fn state_root() -> Result<PathBuf, String> {
    default_state_root().map_err(map_config_err)
}

/// Creates `<state_root>/logs` and returns the state root.
pub fn ensure_state_root() -> Result<PathBuf, String> {
    let root = state_root()?;
    let logs = root.join("logs");
    fs::create_dir_all(&logs).map_err(|e| format!("failed to create {}: {e}", logs.display()))?;
    Ok(root)
}

pub fn open_log(settings: &Settings) -> Result<LogSink, String> {
    let root = ensure_state_root()?;
    Ok(settings.log_sink(&root))
}

pub fn client(settings: &Settings) -> ApiClient {
    ApiClient::from_settings(settings)
}

pub fn parse_case_id(raw: &str) -> Result<CaseId, String> {
    CaseId::parse(raw)
}

/// Where `--resume` picks up: an explicit step, or whatever step the backend
/// reports for the case.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResumeFrom {
    Step(u32),
    Backend,
}

/// Positional case ids plus an optional `--resume [<step>]`.
pub fn parse_case_args(args: &[String]) -> Result<(Vec<CaseId>, Option<ResumeFrom>), String> {
    let mut cases = Vec::new();
    let mut resume = None;
    let mut index = 0;
    while index < args.len() {
        match args[index].as_str() {
            "--resume" => match args.get(index + 1).filter(|raw| !raw.starts_with("--")) {
                Some(raw) => {
                    let step = raw
                        .parse::<u32>()
                        .map_err(|_| format!("invalid step `{raw}`"))?;
                    resume = Some(ResumeFrom::Step(step));
                    index += 2;
                }
                None => {
                    resume = Some(ResumeFrom::Backend);
                    index += 1;
                }
            },
            flag if flag.starts_with("--") => return Err(format!("unknown option `{flag}`")),
            raw => {
                cases.push(parse_case_id(raw)?);
                index += 1;
            }
        }
    }
    Ok((cases, resume))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|arg| arg.to_string()).collect()
    }

    #[test]
    fn resume_takes_an_optional_step() {
        let (cases, resume) = parse_case_args(&args(&["7", "--resume", "2"])).expect("parse");
        assert_eq!(cases, vec![CaseId::parse("7").expect("id")]);
        assert_eq!(resume, Some(ResumeFrom::Step(2)));

        let (_, resume) = parse_case_args(&args(&["7", "--resume"])).expect("parse");
        assert_eq!(resume, Some(ResumeFrom::Backend));

        let (_, resume) = parse_case_args(&args(&["--resume", "--resume", "1"])).expect("parse");
        assert_eq!(resume, Some(ResumeFrom::Step(1)));

        let (_, resume) = parse_case_args(&args(&["7"])).expect("parse");
        assert_eq!(resume, None);
    }

    #[test]
    fn resume_rejects_a_non_numeric_step() {
        let err = parse_case_args(&args(&["7", "--resume", "two"])).expect_err("bad step");
        assert_eq!(err, "invalid step `two`");
    }
}
