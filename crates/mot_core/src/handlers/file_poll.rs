//! Handler `file-poll`: lê a primeira linha de cada arquivo.
//!
//! Parâmetros:
//! - `files`: lista de arquivos, na mesma ordem dos campos do sensor
//! - `poll_interval`: segundos entre leituras
//! - `report_unchanged`: reporta mesmo quando nada mudou

use super::{PollSettings, Sampler};
use crate::types::Reading;
use serde::Deserialize;
use serde_json::Value;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize)]
pub struct FilePollParams {
    pub files: Vec<PathBuf>,
    #[serde(flatten)]
    pub poll: PollSettings,
}

/// Amostra a primeira linha (sem espaços nas pontas) de cada arquivo.
#[derive(Debug, Clone)]
pub struct FilePollSampler {
    files: Vec<PathBuf>,
}

impl FilePollSampler {
    pub fn new(files: Vec<PathBuf>) -> Self {
        Self { files }
    }
}

impl Sampler for FilePollSampler {
    fn width(&self) -> usize {
        self.files.len()
    }

    /// Se algum arquivo falhar, a rodada inteira é descartada.
    fn sample(&mut self) -> Result<Reading, String> {
        self.files
            .iter()
            .map(|f| {
                read_first_line(f)
                    .map(Value::String)
                    .map_err(|e| format!("{}: {e}", f.display()))
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Reading::new)
    }
}

fn read_first_line(path: &Path) -> std::io::Result<String> {
    let mut line = String::new();
    BufReader::new(File::open(path)?).read_line(&mut line)?;
    Ok(line.trim().to_string())
}
