use std::fs;
use std::fs::File;
use std::path::Path;

use log::LevelFilter;
use simplelog::ColorChoice;
use simplelog::CombinedLogger;
use simplelog::Config;
use simplelog::SharedLogger;
use simplelog::TermLogger;
use simplelog::TerminalMode;
use simplelog::WriteLogger;

use crate::communication::Rank;
use crate::error::NdlocaleError;
use crate::error::Result;

/// Initialises logging for one rank. Every rank writes to its own
/// `rank_<r>.log` under `log_dir`; rank 0 additionally logs to the
/// terminal. The BEG/END lines emitted around every collective end up
/// here.
///
/// Call once per process, before building any topology.
pub fn init_rank_logging(log_dir: &Path, rank: Rank, verbosity: usize) -> Result<()> {
    let level = level_filter(rank, verbosity)?;
    fs::create_dir_all(log_dir).map_err(|err| {
        NdlocaleError::config(
            rank,
            format!("cannot create log directory {:?}: {}", log_dir, err),
        )
    })?;
    let log_file = log_dir.join(format!("rank_{}.log", rank));
    let file = File::create(&log_file).map_err(|err| {
        NdlocaleError::config(rank, format!("cannot create log file {:?}: {}", log_file, err))
    })?;
    let mut loggers: Vec<Box<dyn SharedLogger>> =
        vec![WriteLogger::new(level, Config::default(), file)];
    if rank == 0 {
        loggers.push(TermLogger::new(
            level,
            Config::default(),
            TerminalMode::Mixed,
            ColorChoice::Auto,
        ));
    }
    CombinedLogger::init(loggers)
        .map_err(|err| NdlocaleError::config(rank, format!("logging already initialised: {}", err)))
}

fn level_filter(rank: Rank, verbosity: usize) -> Result<LevelFilter> {
    match verbosity {
        0 => Ok(LevelFilter::Info),
        1 => Ok(LevelFilter::Debug),
        2 => Ok(LevelFilter::Trace),
        v => Err(NdlocaleError::config(
            rank,
            format!("invalid verbosity level {}, valid levels are: 0, 1, 2", v),
        )),
    }
}

#[cfg(test)]
mod tests {
    use log::debug;

    use super::init_rank_logging;
    use crate::error::NdlocaleError;

    #[test]
    fn invalid_verbosity_is_a_configuration_error() {
        let dir = std::env::temp_dir().join("ndlocale_logging_invalid");
        // Verbosity is checked before any logger is installed, so this
        // leaves the global logger untouched for the other test.
        let err = init_rank_logging(&dir, 3, 7).err().expect("must be rejected");
        assert!(matches!(err, NdlocaleError::Config { rank: 3, .. }));
        assert!(err.to_string().contains("valid levels are: 0, 1, 2"));
    }

    #[test]
    fn rank_log_file_is_created() {
        let dir = std::env::temp_dir().join(format!("ndlocale_logging_{}", std::process::id()));
        init_rank_logging(&dir, 1, 1).unwrap();
        debug!("BEG: logging smoke test");
        debug!("END: logging smoke test");
        assert!(dir.join("rank_1.log").exists());
        std::fs::remove_dir_all(&dir).ok();
    }
}
