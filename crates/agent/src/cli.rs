//! Argumentos de linha de comando.

use clap::{Arg, ArgAction, ArgMatches, Command, value_parser};
use mot_core::config::DEFAULT_CONFIG_PATH;
use mot_core::state::DEFAULT_STATE_PATH;
use std::ffi::OsString;
use std::path::PathBuf;

/// Opções já resolvidas.
#[derive(Debug, Clone, PartialEq)]
pub struct Options {
    pub config: PathBuf,
    pub state: PathBuf,
    pub register_only: bool,
    pub pid_file: Option<PathBuf>,
}

pub fn build_cli() -> Command {
    Command::new("mot_agent")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Registra sensores locais e envia suas leituras ao serviço de telemetria")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Arquivo de configuração (.toml, .json ou .conf)")
                .value_parser(value_parser!(PathBuf))
                .default_value(DEFAULT_CONFIG_PATH),
        )
        .arg(
            Arg::new("state")
                .short('s')
                .long("state")
                .value_name("FILE")
                .help("Arquivo com os ids remotos dos sensores")
                .value_parser(value_parser!(PathBuf))
                .default_value(DEFAULT_STATE_PATH),
        )
        .arg(
            Arg::new("register")
                .short('r')
                .long("register")
                .help("Registra (ou atualiza) todos os sensores e sai")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("pid-file")
                .short('p')
                .long("pid-file")
                .value_name("FILE")
                .help("Grava o PID do processo neste arquivo")
                .value_parser(value_parser!(PathBuf)),
        )
}

/// Parseia os argumentos. `--help`/`--version` também chegam como `Err`.
pub fn parse<I, T>(args: I) -> Result<Options, clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    build_cli().try_get_matches_from(args).map(|m| from_matches(&m))
}

fn from_matches(m: &ArgMatches) -> Options {
    Options {
        config: m
            .get_one::<PathBuf>("config")
            .cloned()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH)),
        state: m
            .get_one::<PathBuf>("state")
            .cloned()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_STATE_PATH)),
        register_only: m.get_flag("register"),
        pid_file: m.get_one::<PathBuf>("pid-file").cloned(),
    }
}

/// Código de saída para um erro de parse: 0 para help/version, 1 para o resto.
pub fn exit_code(err: &clap::Error) -> i32 {
    if err.use_stderr() { 1 } else { 0 }
}
